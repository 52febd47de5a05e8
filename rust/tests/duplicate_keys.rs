//! Trees configured to keep equal keys.

use pbtree::{BPlusTreeMap, TreeConfig};

fn multimap(capacity: usize) -> BPlusTreeMap<u32, u32> {
    BPlusTreeMap::with_config(TreeConfig::with_capacity(capacity).allow_duplicates(true).self_verify(true)).unwrap()
}

#[test]
fn test_equal_range_spans_leaves() {
    let mut tree = multimap(4);
    for i in 0..30 {
        tree.insert(1, i);
    }
    tree.insert(0, 0);
    tree.insert(2, 0);
    assert!(tree.get_stats().leaves > 5);

    let (first, last) = tree.equal_range(&1);
    let mut position = first;
    let mut seen = 0;
    while position != last {
        assert_eq!(tree.key_at(position), Some(&1));
        position = tree.next_position(position);
        seen += 1;
    }
    assert_eq!(seen, 30);
    assert_eq!(tree.count(&1), 30);
    assert_eq!(tree.key_at(last), Some(&2));
}

#[test]
fn test_newest_duplicate_is_found_first() {
    let mut tree = multimap(4);
    for value in 0..10 {
        tree.insert(5, value);
    }
    assert_eq!(tree.get(&5), Some(&9));
    assert!(tree.erase_by_key(&5));
    assert_eq!(tree.get(&5), Some(&8));
    assert_eq!(tree.count(&5), 9);
}

#[test]
fn test_erase_all_removes_every_copy() {
    let mut tree = multimap(5);
    for i in 0..200 {
        tree.insert(i % 7, i);
    }
    assert_eq!(tree.erase_all(&3), 29);
    assert!(!tree.exists(&3));
    assert_eq!(tree.len(), 171);
    tree.verify();
}

#[test]
fn test_duplicates_survive_bulk_load_and_restore() {
    let mut tree = multimap(4);
    tree.bulk_load((0..120).map(|i| (i / 6, i))).unwrap();
    assert_eq!(tree.count(&10), 6);

    let mut image = Vec::new();
    tree.dump(&mut image).unwrap();
    let mut copy = multimap(4);
    copy.restore(image.as_slice()).unwrap();
    assert_eq!(copy, tree);

    let mut unique = BPlusTreeMap::<u32, u32>::new(4).unwrap();
    assert!(unique.restore(image.as_slice()).is_err());
}
