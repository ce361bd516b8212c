mod common;

use common::{key, keys, memory_tree, KeyRange};
use gist::CancelToken;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Operation {
    Insert(u64),
    Delete { lo: u64, hi: u64 },
}

fn arb_operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        4 => (0u64..200).prop_map(Operation::Insert),
        1 => (0u64..200, 0u64..20).prop_map(|(lo, span)| Operation::Delete { lo, hi: lo + span }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_tree_matches_model(
        ops in prop::collection::vec(arb_operation(), 1..300),
        page_size in prop::sample::select(vec![64usize, 128, 512]),
    ) {
        let tree = memory_tree(page_size);
        let object = tree.create_object().unwrap();
        let token = CancelToken::new();
        let mut model: Vec<u64> = Vec::new();

        for op in ops {
            match op {
                Operation::Insert(k) => {
                    tree.insert(object, &key(k)).unwrap();
                    model.push(k);
                }
                Operation::Delete { lo, hi } => {
                    let outcome = tree
                        .delete(object, &KeyRange::new(lo, hi), &token, |_| true)
                        .unwrap();
                    let before = model.len();
                    model.retain(|k| *k < lo || *k > hi);
                    prop_assert_eq!(outcome.removed, before - model.len());
                }
            }
        }

        let stats = tree.check(object).unwrap();
        prop_assert_eq!(stats.leaf_entries, model.len());
        prop_assert_eq!(stats.pages, tree.backend().live_pages());

        let mut found = keys(&tree.search_to_vec(object, &KeyRange::all(), &token).unwrap());
        found.sort_unstable();
        model.sort_unstable();
        prop_assert_eq!(found, model);
    }
}
