//! Fixed-width relation sets.
//!
//! A `RelSet` is a 64-bit mask whose bit `i` means "relation `i` is a member".
//! Every set the enumerator touches (plan-store keys, hyperedge sides,
//! eligibility sets, neighborhoods) is one of these, so all operations are
//! `const`, allocation-free, and `Copy`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Widest relation universe a `RelSet` can describe.
pub const MAX_RELATIONS: usize = 64;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RelSet(u64);

impl RelSet {
    pub const EMPTY: RelSet = RelSet(0);

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn empty() -> Self {
        Self(0)
    }

    /// The singleton `{i}`, or the empty set when `i` lies outside the
    /// universe.
    pub const fn of(i: usize) -> Self {
        if i < MAX_RELATIONS {
            Self(1u64 << i)
        } else {
            Self(0)
        }
    }

    /// All indices `0..n`.
    pub const fn full(n: usize) -> Self {
        if n == 0 {
            Self(0)
        } else if n >= MAX_RELATIONS {
            Self(u64::MAX)
        } else {
            Self((1u64 << n) - 1)
        }
    }

    /// All indices `<= i`.
    pub const fn through(i: usize) -> Self {
        Self::full(i.saturating_add(1))
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub const fn contains(self, i: usize) -> bool {
        i < MAX_RELATIONS && self.0 & (1u64 << i) != 0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// `self ⊆ other`. The empty set is a subset of everything.
    pub const fn is_subset(self, other: Self) -> bool {
        self.0 & !other.0 == 0
    }

    pub const fn overlaps(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Lowest member index, or `None` for the empty set.
    pub const fn min(self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            Some(self.0.trailing_zeros() as usize)
        }
    }

    /// The set holding only the lowest member (empty stays empty).
    pub const fn min_subset(self) -> Self {
        Self(self.0 & self.0.wrapping_neg())
    }

    /// Next subset of `universe` after `prev`, in increasing numeric order.
    ///
    /// Starting from `RelSet::EMPTY` and calling until the result equals
    /// `universe` visits every non-empty subset exactly once; together with
    /// the starting empty set that is all `2^|universe|` subsets.
    pub const fn next_subset(prev: Self, universe: Self) -> Self {
        Self(prev.0.wrapping_sub(universe.0) & universe.0)
    }

    /// Iterate member indices in ascending order.
    pub fn iter(self) -> Members {
        Members(self.0)
    }

    /// Iterate the non-empty subsets of `self` in `next_subset` order.
    pub fn subsets(self) -> Subsets {
        Subsets {
            universe: self,
            cur: Self::EMPTY,
            done: self.is_empty(),
        }
    }

    /// Render the set using relation names, e.g. `{orders, lineitem}`.
    pub fn display_with<'a, S: AsRef<str>>(self, names: &'a [S]) -> NamedRelSet<'a, S> {
        NamedRelSet { set: self, names }
    }
}

impl std::ops::BitOr for RelSet {
    type Output = RelSet;
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for RelSet {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::ops::BitAnd for RelSet {
    type Output = RelSet;
    fn bitand(self, rhs: Self) -> Self {
        self.intersection(rhs)
    }
}

impl std::ops::Sub for RelSet {
    type Output = RelSet;
    fn sub(self, rhs: Self) -> Self {
        self.difference(rhs)
    }
}

/// Indices at or above [`MAX_RELATIONS`] are skipped.
impl FromIterator<usize> for RelSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        iter.into_iter()
            .filter(|&i| i < MAX_RELATIONS)
            .fold(RelSet::EMPTY, |acc, i| acc | RelSet::of(i))
    }
}

impl fmt::Display for RelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (n, i) in self.iter().enumerate() {
            if n > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{i}")?;
        }
        f.write_str("}")
    }
}

/// Ascending member iterator.
#[derive(Debug, Clone)]
pub struct Members(u64);

impl Iterator for Members {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.0 == 0 {
            return None;
        }
        let i = self.0.trailing_zeros() as usize;
        self.0 &= self.0 - 1;
        Some(i)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count_ones() as usize;
        (n, Some(n))
    }
}

impl DoubleEndedIterator for Members {
    fn next_back(&mut self) -> Option<usize> {
        if self.0 == 0 {
            return None;
        }
        let i = 63 - self.0.leading_zeros() as usize;
        self.0 &= !(1u64 << i);
        Some(i)
    }
}

impl ExactSizeIterator for Members {}

/// Non-empty subset iterator driven by [`RelSet::next_subset`].
#[derive(Debug, Clone)]
pub struct Subsets {
    universe: RelSet,
    cur: RelSet,
    done: bool,
}

impl Iterator for Subsets {
    type Item = RelSet;

    fn next(&mut self) -> Option<RelSet> {
        if self.done {
            return None;
        }
        self.cur = RelSet::next_subset(self.cur, self.universe);
        if self.cur == self.universe {
            self.done = true;
        }
        Some(self.cur)
    }
}

pub struct NamedRelSet<'a, S> {
    set: RelSet,
    names: &'a [S],
}

impl<S: AsRef<str>> fmt::Display for NamedRelSet<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (n, i) in self.set.iter().enumerate() {
            if n > 0 {
                f.write_str(", ")?;
            }
            match self.names.get(i) {
                Some(name) => f.write_str(name.as_ref())?,
                None => write!(f, "#{i}")?,
            }
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn through_covers_word_edge() {
        assert_eq!(RelSet::through(0), RelSet::of(0));
        assert_eq!(RelSet::through(63).bits(), u64::MAX);
        assert_eq!(RelSet::full(64).bits(), u64::MAX);
        assert_eq!(RelSet::full(3).bits(), 0b111);
    }

    #[test]
    fn out_of_range_indices_never_alias_low_bits() {
        assert_eq!(RelSet::of(64), RelSet::EMPTY);
        assert_eq!(RelSet::of(usize::MAX), RelSet::EMPTY);
        let s: RelSet = [1, 64, 128].into_iter().collect();
        assert_eq!(s, RelSet::of(1));
        assert!(!s.contains(0) && !s.contains(64));
        assert_eq!(RelSet::through(usize::MAX).bits(), u64::MAX);
    }

    #[test]
    fn min_and_min_subset() {
        let s: RelSet = [3, 5, 9].into_iter().collect();
        assert_eq!(s.min(), Some(3));
        assert_eq!(s.min_subset(), RelSet::of(3));
        assert_eq!(RelSet::EMPTY.min(), None);
        assert_eq!(RelSet::EMPTY.min_subset(), RelSet::EMPTY);
    }

    #[test]
    fn next_subset_walks_sparse_mask() {
        let u = RelSet::from_bits(0b101);
        let mut seen = vec![];
        let mut s = RelSet::EMPTY;
        loop {
            s = RelSet::next_subset(s, u);
            seen.push(s.bits());
            if s == u {
                break;
            }
        }
        assert_eq!(seen, vec![0b001, 0b100, 0b101]);
    }

    #[test]
    fn display_uses_names() {
        let names = ["a", "b", "c"];
        let s = RelSet::of(0) | RelSet::of(2);
        assert_eq!(s.display_with(&names).to_string(), "{a, c}");
        assert_eq!(s.to_string(), "{0, 2}");
    }
}
