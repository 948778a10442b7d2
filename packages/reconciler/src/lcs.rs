//! Child-order diff.
//!
//! The keys that may stay in place while a child list is reordered are a
//! longest common subsequence of the old and new lists. Keys are unique, so
//! the LCS reduces to a longest increasing subsequence of the new positions
//! taken in old order, found with patience sorting in O(n log n).

use folio_model::NodeKey;
use std::collections::{HashMap, HashSet};

/// Indices of one longest strictly increasing subsequence of `values`
pub fn longest_increasing_subsequence(values: &[usize]) -> Vec<usize> {
    // tails[len] = index of the smallest tail of an increasing run of length len + 1
    let mut tails: Vec<usize> = Vec::new();
    let mut previous: Vec<Option<usize>> = vec![None; values.len()];

    for (index, value) in values.iter().enumerate() {
        let slot = tails.partition_point(|&tail| values[tail] < *value);
        if slot > 0 {
            previous[index] = Some(tails[slot - 1]);
        }
        if slot == tails.len() {
            tails.push(index);
        } else {
            tails[slot] = index;
        }
    }

    let mut run = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(index) = cursor {
        run.push(index);
        cursor = previous[index];
    }
    run.reverse();
    run
}

/// Keys of `current` that keep their relative order in `target`.
///
/// Every other key of `target` has to be moved or created; keys of
/// `current` missing from `target` are ignored.
pub fn stable_keys(current: &[NodeKey], target: &[NodeKey]) -> HashSet<NodeKey> {
    let positions: HashMap<&NodeKey, usize> = target
        .iter()
        .enumerate()
        .map(|(index, key)| (key, index))
        .collect();

    let (keys, order): (Vec<&NodeKey>, Vec<usize>) = current
        .iter()
        .filter_map(|key| positions.get(key).map(|position| (key, *position)))
        .unzip();

    longest_increasing_subsequence(&order)
        .into_iter()
        .map(|index| keys[index].clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(names: &[&str]) -> Vec<NodeKey> {
        names.iter().map(NodeKey::new).collect()
    }

    #[test]
    fn test_lis_basic() {
        assert_eq!(longest_increasing_subsequence(&[]), Vec::<usize>::new());
        assert_eq!(longest_increasing_subsequence(&[3, 1, 2]), vec![1, 2]);
        assert_eq!(longest_increasing_subsequence(&[0, 1, 2, 3]), vec![0, 1, 2, 3]);
        assert_eq!(longest_increasing_subsequence(&[4, 3, 2, 1]).len(), 1);
    }

    #[test]
    fn test_unchanged_list_is_fully_stable() {
        let list = keys(&["a", "b", "c"]);
        assert_eq!(stable_keys(&list, &list).len(), 3);
    }

    #[test]
    fn test_single_move_leaves_the_rest_stable() {
        let stable = stable_keys(&keys(&["c", "a", "b"]), &keys(&["a", "b", "c"]));
        assert_eq!(stable, keys(&["a", "b"]).into_iter().collect::<HashSet<_>>());
    }

    #[test]
    fn test_foreign_keys_ignored() {
        let stable = stable_keys(&keys(&["x", "a", "y", "b"]), &keys(&["a", "new", "b"]));
        assert_eq!(stable, keys(&["a", "b"]).into_iter().collect::<HashSet<_>>());
    }
}
