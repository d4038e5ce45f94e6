#![cfg(test)]

// Property tests for ProgressiveMap kept inside the crate so they can use
// the test-only invariant checks on private state.

use crate::config::Config;
use crate::map::{Handle, ProgressiveMap};
use crate::node::Node;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};

// Pool-indexed operations: indices shrink to earlier keys, pool length
// shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize, i32),
    Lookup(usize),
    Pop(usize),
    Remove(usize),
    Mutate(usize, i32),
    Size,
    Scan,
}

// Hash codes are taken from a small range so chains collide and several
// keys share a bucket in every table size.
fn arb_scenario() -> impl Strategy<Value = (Vec<(u64, String)>, Vec<Op>)> {
    proptest::collection::btree_set("[a-z]{1,4}", 1..=24)
        .prop_flat_map(|names| {
            let n = names.len();
            let names: Vec<String> = names.into_iter().collect();
            (Just(names), proptest::collection::vec(0u64..16, n))
        })
        .prop_flat_map(|(names, hashes)| {
            let pool: Vec<(u64, String)> = hashes.into_iter().zip(names).collect();
            let idx = 0..pool.len();
            let op = prop_oneof![
                3 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Insert(i, v)),
                2 => idx.clone().prop_map(Op::Lookup),
                1 => idx.clone().prop_map(Op::Pop),
                1 => idx.clone().prop_map(Op::Remove),
                1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| Op::Mutate(i, d)),
                1 => Just(Op::Size),
                1 => Just(Op::Scan),
            ];
            (Just(pool), proptest::collection::vec(op, 1..200))
        })
}

fn arb_config() -> impl Strategy<Value = Config> {
    (0u32..3, 1usize..4, 1usize..6).prop_map(|(shift, lf, work)| {
        Config::new()
            .with_initial_capacity(1 << shift)
            .with_max_load_factor(lf)
            .with_resize_work(work)
    })
}

// Property: state-machine equivalence against std::collections::HashMap,
// with small load factors and work budgets so resizes start and finish many
// times per case.
// Invariants exercised after every op (panics inside `assert_invariants`
// fail the case):
// - capacity is a power of two, nodes sit in `hash & mask`, counters match
//   a full walk;
// - `secondary` is exactly half the size of `primary` while present;
// - lookups/pops agree with the model, including mid-resize;
// - handles stay valid across migration and go stale after removal.
proptest! {
    #![proptest_config(ProptestConfig { cases: 96, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine(cfg in arb_config(), (pool, ops) in arb_scenario()) {
        let mut sut: ProgressiveMap<(String, i32)> = ProgressiveMap::with_config(cfg);
        let mut model: HashMap<String, i32> = HashMap::new();
        let mut live: HashMap<String, Handle> = HashMap::new();
        let mut stale: Vec<Handle> = Vec::new();

        for op in ops {
            match op {
                Op::Insert(i, v) => {
                    let (hash, name) = &pool[i];
                    // Upsert: pop before insert, as a server would.
                    let prev = sut.pop(*hash, |p| &p.0 == name);
                    prop_assert_eq!(prev.map(|n| n.into_payload().1), model.get(name).copied());
                    if let Some(h) = live.remove(name) {
                        stale.push(h);
                    }
                    let h = sut.insert(Node::new(*hash, (name.clone(), v)));
                    live.insert(name.clone(), h);
                    model.insert(name.clone(), v);
                }
                Op::Lookup(i) => {
                    let (hash, name) = &pool[i];
                    let got = sut.lookup(*hash, |p| &p.0 == name).map(|n| n.payload().1);
                    prop_assert_eq!(got, model.get(name).copied());
                    let found = sut.find(*hash, |p| &p.0 == name);
                    prop_assert_eq!(found, live.get(name).copied());
                }
                Op::Pop(i) => {
                    let (hash, name) = &pool[i];
                    let got = sut.pop(*hash, |p| &p.0 == name);
                    let expected = model.remove(name);
                    match got {
                        Some(n) => {
                            prop_assert_eq!(n.hash_code(), *hash);
                            prop_assert_eq!(Some(n.payload().1), expected);
                            let h = live.remove(name).expect("tracked handle");
                            stale.push(h);
                        }
                        None => prop_assert!(expected.is_none()),
                    }
                }
                Op::Remove(i) => {
                    let (_, name) = &pool[i];
                    if let Some(h) = live.remove(name) {
                        let n = sut.remove(h).expect("live handle removes");
                        prop_assert_eq!(&n.payload().0, name);
                        prop_assert_eq!(Some(n.payload().1), model.remove(name));
                        stale.push(h);
                    }
                }
                Op::Mutate(i, d) => {
                    let (_, name) = &pool[i];
                    if let Some(&h) = live.get(name) {
                        let p = h.payload_mut(&mut sut).expect("live handle resolves");
                        p.1 = p.1.wrapping_add(d);
                        let mv = model.get_mut(name).expect("present in model");
                        *mv = mv.wrapping_add(d);
                    }
                }
                Op::Size => {
                    prop_assert_eq!(sut.size(), model.len());
                }
                Op::Scan => {
                    let mut seen = Vec::new();
                    sut.scan(|n| seen.push(n.payload().0.clone()));
                    let unique: BTreeSet<String> = seen.iter().cloned().collect();
                    prop_assert_eq!(unique.len(), seen.len(), "node visited twice");
                    let expected: BTreeSet<String> = model.keys().cloned().collect();
                    prop_assert_eq!(unique, expected);
                }
            }

            for &h in &stale {
                prop_assert!(h.node(&sut).is_none());
            }
            prop_assert_eq!(sut.len(), model.len());
            sut.assert_invariants();
        }

        // Drain whatever resize is left; nothing may be lost.
        let before = sut.len();
        let mut calls = 0;
        while sut.is_resizing() {
            sut.size();
            calls += 1;
            prop_assert!(calls < 10_000, "resize never finished");
        }
        prop_assert_eq!(sut.len(), before);
        for (name, v) in &model {
            let hash = pool.iter().find(|(_, n)| n == name).map(|(h, _)| *h).expect("pooled");
            prop_assert_eq!(sut.lookup(hash, |p| &p.0 == name).map(|n| n.payload().1), Some(*v));
        }
    }
}
