//! Relation-set utility tests

use hyperdp_core::relset::{RelSet, MAX_RELATIONS};

#[test]
fn next_subset_visits_every_subset_once() {
    for bits in [0b1u64, 0b1011, 0b1111_0000, 0b1010_1010_1010] {
        let universe = RelSet::from_bits(bits);
        let mut seen = Vec::new();
        let mut s = RelSet::EMPTY;
        loop {
            s = RelSet::next_subset(s, universe);
            assert!(s.is_subset(universe));
            seen.push(s);
            if s == universe {
                break;
            }
        }
        assert_eq!(seen.len(), (1usize << universe.len()) - 1);
        let mut sorted = seen.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted, seen, "subsets of {universe} come out in increasing order");
    }
}

#[test]
fn subsets_iterator_of_empty_set_is_empty() {
    assert_eq!(RelSet::EMPTY.subsets().count(), 0);
    assert_eq!(RelSet::of(5).subsets().collect::<Vec<_>>(), vec![RelSet::of(5)]);
}

#[test]
fn set_algebra() {
    let a: RelSet = [0, 1, 2].into_iter().collect();
    let b: RelSet = [2, 3].into_iter().collect();
    assert_eq!(a | b, RelSet::full(4));
    assert_eq!(a & b, RelSet::of(2));
    assert_eq!(a - b, RelSet::from_bits(0b011));
    assert!(a.overlaps(b));
    assert!(!a.overlaps(RelSet::of(3)));
    assert!(RelSet::EMPTY.is_subset(a));
    assert!(RelSet::of(1).is_subset(a));
    assert!(!b.is_subset(a));
    assert_eq!(a.len(), 3);
}

#[test]
fn iteration_both_ends() {
    let s: RelSet = [1, 4, 63].into_iter().collect();
    assert_eq!(s.iter().collect::<Vec<_>>(), vec![1, 4, 63]);
    assert_eq!(s.iter().rev().collect::<Vec<_>>(), vec![63, 4, 1]);
    assert_eq!(s.iter().len(), 3);
    assert!(s.contains(63));
    assert!(!s.contains(MAX_RELATIONS));
}

#[test]
fn full_universe_is_all_ones() {
    assert_eq!(RelSet::full(MAX_RELATIONS).len(), MAX_RELATIONS);
    assert_eq!(RelSet::full(0), RelSet::EMPTY);
    assert_eq!(RelSet::through(5), RelSet::full(6));
}

#[test]
fn serializes_as_plain_bits() {
    let s: RelSet = [0, 3].into_iter().collect();
    assert_eq!(serde_json::to_string(&s).unwrap(), "9");
    let back: RelSet = serde_json::from_str("9").unwrap();
    assert_eq!(back, s);
}
