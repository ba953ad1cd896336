//! Plan classes: the best plan known for each solved relation set.
//!
//! Small runs use a dense array indexed directly by the set's bits (2^n
//! slots); larger runs fall back to a hash map keyed by set. Either way the
//! space is exponential in the relation count in the worst case, which is
//! inherent to dynamic programming over subsets.

use std::collections::HashMap;

use hyperdp_core::config::EnumeratorConfig;
use hyperdp_core::relset::RelSet;

#[derive(Debug, Clone)]
enum Slots<P> {
    Dense(Vec<Option<P>>),
    Sparse(HashMap<RelSet, P>),
}

#[derive(Debug, Clone)]
pub struct PlanStore<P> {
    slots: Slots<P>,
    len: usize,
}

impl<P> PlanStore<P> {
    /// Pick the layout for a run over `n` relations.
    pub fn for_relations(n: usize, config: &EnumeratorConfig) -> Self {
        if config.use_dense_store(n) {
            Self::dense(n)
        } else {
            Self::sparse()
        }
    }

    pub fn dense(n: usize) -> Self {
        let mut v = Vec::new();
        v.resize_with(1usize << n, || None);
        Self {
            slots: Slots::Dense(v),
            len: 0,
        }
    }

    pub fn sparse() -> Self {
        Self {
            slots: Slots::Sparse(HashMap::new()),
            len: 0,
        }
    }

    pub fn is_dense(&self) -> bool {
        matches!(self.slots, Slots::Dense(_))
    }

    /// Number of solved relation sets.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, set: RelSet) -> Option<&P> {
        match &self.slots {
            Slots::Dense(v) => v.get(set.bits() as usize).and_then(Option::as_ref),
            Slots::Sparse(m) => m.get(&set),
        }
    }

    pub fn contains(&self, set: RelSet) -> bool {
        self.get(set).is_some()
    }

    /// Store `plan` as the best for `set`, returning the plan it replaces.
    pub fn insert(&mut self, set: RelSet, plan: P) -> Option<P> {
        let prev = match &mut self.slots {
            Slots::Dense(v) => {
                let i = set.bits() as usize;
                if i >= v.len() {
                    v.resize_with(i + 1, || None);
                }
                v[i].replace(plan)
            }
            Slots::Sparse(m) => m.insert(set, plan),
        };
        if prev.is_none() {
            self.len += 1;
        }
        prev
    }

    /// Remove and return the plan for `set`.
    pub fn take(&mut self, set: RelSet) -> Option<P> {
        let taken = match &mut self.slots {
            Slots::Dense(v) => v.get_mut(set.bits() as usize).and_then(Option::take),
            Slots::Sparse(m) => m.remove(&set),
        };
        if taken.is_some() {
            self.len -= 1;
        }
        taken
    }

    /// Consume the store, keeping only the plan for `set`.
    pub fn into_plan(mut self, set: RelSet) -> Option<P> {
        self.take(set)
    }

    /// Solved sets with their plans, in no particular order.
    pub fn iter(&self) -> Box<dyn Iterator<Item = (RelSet, &P)> + '_> {
        match &self.slots {
            Slots::Dense(v) => Box::new(
                v.iter()
                    .enumerate()
                    .filter_map(|(i, p)| p.as_ref().map(|p| (RelSet::from_bits(i as u64), p))),
            ),
            Slots::Sparse(m) => Box::new(m.iter().map(|(s, p)| (*s, p))),
        }
    }

    /// Solved sets in ascending bit order.
    pub fn classes(&self) -> Vec<RelSet> {
        let mut out: Vec<RelSet> = self.iter().map(|(s, _)| s).collect();
        out.sort_unstable();
        out
    }
}
