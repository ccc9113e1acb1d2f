use std::collections::HashSet;

use itertools::Itertools;
use mocks::{
    build_graph_detailed_example, build_graph_fork, build_graph_from_paper,
    build_graph_some_chain, build_graph_three_nodes, build_graph_three_nodes_fork, TestSetup,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use test_utils::{pair_name, run_tests, test_cases, Test};

use crate::algorithm::event::tests::peer;
use crate::algorithm::event::Transactions;
use crate::algorithm::wire::{WireError, WireEvent};

use super::*;


fn all_setups() -> Vec<TestSetup> {
    vec![
        build_graph_three_nodes().unwrap(),
        build_graph_three_nodes_fork().unwrap(),
        build_graph_from_paper().unwrap(),
        build_graph_some_chain().unwrap(),
        build_graph_detailed_example().unwrap(),
        build_graph_fork().unwrap(),
    ]
}

/// Rebuild the event with changed fields (the hash changes accordingly)
fn forge(event: &Event, change: impl FnOnce(&mut WireEvent)) -> Event {
    let mut wire = WireEvent::from(event);
    change(&mut wire);
    Event::try_from(wire).unwrap()
}

fn pairs(setup: &TestSetup, names: &[(&str, &str)]) -> Vec<(event::Hash, event::Hash)> {
    names
        .iter()
        .map(|(x, y)| (setup.hash(x), setup.hash(y)))
        .collect()
}

// Test simple work + errors

#[test]
fn graph_builds() {
    let setups = all_setups();
    assert_eq!(setups[0].graph.len(), 6);
    assert_eq!(setups[0].graph.creator_count(), 3);
    assert_eq!(setups[1].graph.len(), 7);
    assert_eq!(setups[4].graph.len(), 4 + 31);
}

#[test]
fn honest_setups_have_no_forks() {
    let honest = [
        build_graph_three_nodes().unwrap(),
        build_graph_from_paper().unwrap(),
        build_graph_some_chain().unwrap(),
        build_graph_detailed_example().unwrap(),
    ];
    for setup in &honest {
        for (name, peer_events) in &setup.peers_events {
            assert!(
                !setup.graph.is_forked(&peer_events.id),
                "{}: peer {} forked",
                setup.setup_name,
                name
            );
        }
    }
    for (setup, forked) in [
        (build_graph_fork().unwrap(), "m"),
        (build_graph_three_nodes_fork().unwrap(), "e2"),
    ] {
        for (name, peer_events) in &setup.peers_events {
            assert_eq!(
                setup.graph.is_forked(&peer_events.id),
                name == forked,
                "{}: peer {}",
                setup.setup_name,
                name
            );
        }
    }
}

#[test]
fn peer_name_means_latest_event() {
    let setup = build_graph_fork().unwrap();
    assert_eq!(setup.event("a2").self_parent(), Some(&setup.hash("a1_1")));
    assert_eq!(setup.event("m4").self_parent(), Some(&setup.hash("m3")));
    assert_eq!(setup.event("a1_1").other_parents(), &[setup.hash("m")]);

    let setup = build_graph_some_chain().unwrap();
    assert_eq!(setup.event("e5").self_parent(), Some(&setup.hash("e1")));
    assert_eq!(setup.event("e7").self_parent(), Some(&setup.hash("e4")));
}

#[test]
fn insert_works() {
    let mut graph = Graph::new();
    assert!(graph.is_empty());
    let g0 = Event::new(Transactions::default(), &[], peer(0)).unwrap();
    let g1 = Event::new(Transactions::default(), &[], peer(1)).unwrap();
    assert_eq!(graph.insert(g0.clone()), Ok(InsertOutcome::Inserted));
    assert_eq!(graph.insert(g1.clone()), Ok(InsertOutcome::Inserted));

    let e01 = Event::new(Transactions::default(), &[&g0, &g1], peer(0)).unwrap();
    assert_eq!(graph.insert(e01.clone()), Ok(InsertOutcome::Inserted));
    assert_eq!(graph.len(), 3);
    assert_eq!(graph.event(e01.hash()), Some(&e01));
    assert_eq!(graph.peer_latest_event(&peer(0)), Some(e01.hash()));
    assert_eq!(graph.peer_latest_event(&peer(1)), Some(g1.hash()));
    assert_eq!(graph.peer_origins(&peer(0)), Some(&[g0.hash().clone()][..]));
    assert_eq!(graph.peer_latest_event(&peer(5)), None);
    assert_eq!(graph.children(g1.hash()), Ok(vec![e01.hash().clone()]));
    assert_eq!(graph.children(g0.hash()), Ok(vec![e01.hash().clone()]));
    assert!(graph.children(e01.hash()).unwrap().is_empty());
    assert_eq!(graph.peers().count(), 2);
}

#[test]
fn duplicate_insert_is_noop() {
    let TestSetup { mut graph, .. } = build_graph_from_paper().unwrap();
    let setup = build_graph_from_paper().unwrap();
    let len = graph.len();
    let c6 = setup.event("c6");
    let a = setup.event("a");
    assert_eq!(graph.insert(c6.clone()), Ok(InsertOutcome::AlreadyKnown));
    assert_eq!(graph.insert(a), Ok(InsertOutcome::AlreadyKnown));
    assert_eq!(graph.len(), len);
    assert_eq!(graph.peer_latest_event(c6.creator()), Some(c6.hash()));
    assert!(!graph.is_forked(c6.creator()));
    // relations stay the same
    assert_eq!(graph.ancestor(c6.hash(), &setup.hash("b")), Ok(true));
    assert_eq!(graph.see(c6.hash(), &setup.hash("d2")), Ok(true));
}

#[test]
fn missing_parent_fails() {
    let setup = build_graph_three_nodes().unwrap();
    let e12 = setup.event("e12");
    let mut graph = setup.graph;
    let unknown_genesis = Event::new(Transactions::default(), &[], peer(3)).unwrap();
    let orphan = Event::new(Transactions::default(), &[&e12, &unknown_genesis], peer(1)).unwrap();
    assert_eq!(
        graph.insert(orphan),
        Err(PushError::MissingParent(unknown_genesis.hash().clone()))
    );
    let orphan_child = {
        let orphan_parent =
            Event::new(Transactions::default(), &[&unknown_genesis], peer(3)).unwrap();
        Event::new(Transactions::default(), &[&orphan_parent], peer(3)).unwrap()
    };
    assert!(matches!(
        graph.insert(orphan_child),
        Err(PushError::MissingParent(_))
    ));
    // nothing changed
    assert_eq!(graph.len(), 6);
    assert_eq!(graph.creator_count(), 3);
}

#[test]
fn incorrect_events_fail() {
    let setup = build_graph_three_nodes().unwrap();
    let mut graph = Graph::new();
    // Same events in a separate graph to modify
    for name in ["e0", "e1", "e2", "e01", "e20", "e12"] {
        graph.insert(setup.event(name)).unwrap();
    }
    let (e0, e1, e01, e12) = (
        setup.event("e0"),
        setup.event("e1"),
        setup.event("e01"),
        setup.event("e12"),
    );
    let valid = Event::new(Transactions::default(), &[&e01, &e12], peer(0)).unwrap();

    let wrong_author = forge(&valid, |w| w.self_parent = Some(e1.hash().clone()));
    assert_eq!(
        graph.insert(wrong_author),
        Err(PushError::IncorrectAuthor(peer(1), peer(0)))
    );

    let wrong_seq = forge(&valid, |w| w.creator_seq += 1);
    assert_eq!(
        graph.insert(wrong_seq),
        Err(PushError::InvalidCreatorSeq {
            expected: 2,
            provided: 3
        })
    );

    let wrong_time = forge(&valid, |w| w.lamport_time = 1);
    assert_eq!(
        graph.insert(wrong_time),
        Err(PushError::InvalidLamportTime {
            expected: 4,
            provided: 1
        })
    );

    let late_genesis = forge(&e0, |w| {
        w.creator = peer(7);
        w.creator_seq = 4;
    });
    assert_eq!(
        graph.insert(late_genesis),
        Err(PushError::InvalidCreatorSeq {
            expected: 0,
            provided: 4
        })
    );
    let future_genesis = forge(&e0, |w| {
        w.creator = peer(7);
        w.lamport_time = 4;
    });
    assert!(matches!(
        graph.insert(future_genesis),
        Err(PushError::InvalidLamportTime { expected: 0, .. })
    ));

    let self_as_other = forge(&valid, |w| w.other_parents = vec![e0.hash().clone()]);
    assert_eq!(
        graph.insert(self_as_other),
        Err(PushError::InvalidParents(ParentsError::OtherParentBySelf(
            e0.hash().clone()
        )))
    );

    let wrong_index = forge(&valid, |w| w.index = 999);
    assert_eq!(
        graph.insert(wrong_index),
        Err(PushError::InvalidIndex {
            expected: 2,
            provided: 999
        })
    );
    let indexed_genesis = forge(&e0, |w| {
        w.creator = peer(7);
        w.index = 7;
    });
    assert_eq!(
        graph.insert(indexed_genesis),
        Err(PushError::InvalidIndex {
            expected: 0,
            provided: 7
        })
    );

    let valid_1 = Event::new(Transactions::default(), &[&e12, &e01], peer(1)).unwrap();
    let duplicate_authors = forge(&valid_1, |w| {
        w.other_parents = vec![e01.hash().clone(), e0.hash().clone()];
        w.other_parents.sort();
    });
    assert_eq!(
        graph.insert(duplicate_authors),
        Err(PushError::InvalidParents(
            ParentsError::DuplicateOtherParentAuthor(peer(0))
        ))
    );

    assert_eq!(graph.len(), 6);
    assert_eq!(graph.insert(valid), Ok(InsertOutcome::Inserted));
}

#[test]
fn reordered_parents_are_not_a_new_event() {
    let setup = build_graph_three_nodes().unwrap();
    let e20 = setup.event("e20");
    let wide = Event::new(
        Transactions::default(),
        &[&setup.event("e01"), &setup.event("e12"), &e20],
        peer(0),
    )
    .unwrap();
    let mut graph = setup.graph;
    let mut wire = WireEvent::from(&wide);
    wire.other_parents.reverse();
    assert!(matches!(
        Event::try_from(wire),
        Err(WireError::InvalidParents(ParentsError::OtherParentsNotSorted))
    ));
    assert_eq!(graph.insert(wide), Ok(InsertOutcome::Inserted));
    assert!(!graph.is_forked(&peer(0)));
}

#[test]
fn other_parents_limit() {
    let config = Config {
        max_other_parents: Some(1),
        ..Default::default()
    };
    let mut graph = Graph::with_config(&config);
    let geneses: Vec<_> = (0..3)
        .map(|i| Event::new(Transactions::default(), &[], peer(i)).unwrap())
        .collect();
    for genesis in &geneses {
        graph.insert(genesis.clone()).unwrap();
    }
    let wide = Event::new(
        Transactions::default(),
        &[&geneses[0], &geneses[1], &geneses[2]],
        peer(0),
    )
    .unwrap();
    assert_eq!(graph.insert(wide), Err(PushError::TooManyOtherParents(2, 1)));
    let narrow = Event::new(Transactions::default(), &[&geneses[0], &geneses[2]], peer(0)).unwrap();
    assert_eq!(graph.insert(narrow), Ok(InsertOutcome::Inserted));
}

#[test]
fn queries_on_unknown_events_fail() {
    let setup = build_graph_three_nodes().unwrap();
    let unknown = event::Hash::from_array([1; 64]);
    let known = setup.hash("e01");
    let g = &setup.graph;
    assert_eq!(g.ancestor(&known, &unknown), Err(UnknownEvent(unknown.clone())));
    assert_eq!(g.ancestor(&unknown, &known), Err(UnknownEvent(unknown.clone())));
    assert_eq!(g.self_ancestor(&unknown, &known), Err(UnknownEvent(unknown.clone())));
    assert_eq!(g.detect_fork(&known, &unknown), Err(UnknownEvent(unknown.clone())));
    assert_eq!(g.see(&unknown, &known), Err(UnknownEvent(unknown.clone())));
    assert_eq!(
        g.forked_branches(&unknown, &peer(0)),
        Err(UnknownEvent(unknown.clone()))
    );
    assert!(matches!(g.last_ancestor(&unknown, &peer(0)), Err(UnknownEvent(_))));
    assert_eq!(g.event(&unknown), None);
}

// Relations

#[test]
fn test_ancestor() {
    run_tests!(
        tested_function_name => "ancestor",
        tested_function => |g, (x, y)| g.ancestor(x, y),
        name_lookup => pair_name,
        setup_literal => s,
        tests => [
            (
                setup => build_graph_three_nodes().unwrap(),
                test_case => (
                    expect: Ok(true),
                    arguments: pairs(&s, &[
                        // 1 generation
                        ("e01", "e0"), ("e01", "e1"), ("e20", "e01"), ("e20", "e2"),
                        ("e12", "e20"), ("e12", "e1"),
                        // 2 generations
                        ("e20", "e0"), ("e20", "e1"), ("e12", "e01"), ("e12", "e2"),
                        // 3 generations
                        ("e12", "e0"),
                        // reflexive
                        ("e0", "e0"), ("e12", "e12"),
                    ]),
                ),
                test_case => (
                    expect: Ok(false),
                    arguments: pairs(&s, &[
                        ("e01", "e2"), ("e0", "e01"), ("e1", "e0"), ("e20", "e12"),
                    ]),
                ),
            ),
            (
                setup => build_graph_some_chain().unwrap(),
                test_case => (
                    expect: Ok(true),
                    arguments: pairs(&s, &[("e1", "g1"), ("e7", "g1"), ("e6", "e2"), ("e5", "e3")]),
                ),
                test_case => (
                    expect: Ok(false),
                    arguments: pairs(&s, &[("e3", "e4"), ("e4", "e5"), ("g1", "e1"), ("e2", "g3")]),
                ),
            ),
            (
                setup => build_graph_detailed_example().unwrap(),
                test_case => (
                    expect: Ok(false),
                    arguments: pairs(&s, &[
                        ("c", "c1_1"), ("c", "c3"), ("c", "b1_2"), ("c1_1", "d1_3"),
                        ("a1_1", "c1_1"),
                    ]),
                ),
                test_case => (
                    expect: Ok(true),
                    arguments: pairs(&s, &[
                        // Self parent
                        ("d1_1", "d"),
                        // Self ancestor
                        ("d2", "d"),
                        // Other parent
                        ("b1_3", "d1_3"),
                        ("c2", "a2_1"), ("b1_3", "c"), ("d1_3", "c"), ("d2_2", "a1_1"),
                        ("b2_1", "a1_1"), ("a2_2", "a1_1"),
                    ]),
                ),
            ),
            (
                setup => build_graph_three_nodes_fork().unwrap(),
                test_case => (
                    expect: Ok(true),
                    arguments: pairs(&s, &[("e01", "a"), ("e20", "a"), ("e12", "a"), ("e20", "e2")]),
                ),
                test_case => (
                    expect: Ok(false),
                    arguments: pairs(&s, &[("e01", "e2"), ("a", "e2"), ("e2", "a")]),
                ),
            ),
        ]
    );
}

#[test]
fn test_self_ancestor() {
    run_tests!(
        tested_function_name => "self ancestor",
        tested_function => |g, (x, y)| g.self_ancestor(x, y),
        name_lookup => pair_name,
        setup_literal => s,
        tests => [
            (
                setup => build_graph_three_nodes().unwrap(),
                test_case => (
                    expect: Ok(true),
                    arguments: pairs(&s, &[("e01", "e0"), ("e20", "e2"), ("e12", "e1"), ("e1", "e1")]),
                ),
                test_case => (
                    expect: Ok(false),
                    arguments: pairs(&s, &[
                        ("e01", "e1"), ("e20", "e01"), ("e12", "e20"), ("e20", "e0"),
                        ("e12", "e2"), ("e0", "e01"),
                    ]),
                ),
            ),
            (
                setup => build_graph_fork().unwrap(),
                test_case => (
                    expect: Ok(true),
                    arguments: pairs(&s, &[
                        ("m2", "m"), ("m2_fork", "m"), ("m3", "m2_fork"), ("m4", "m2_fork"),
                        ("m4", "m"), ("a4", "a1_1"),
                    ]),
                ),
                test_case => (
                    expect: Ok(false),
                    arguments: pairs(&s, &[
                        // same sequence numbers, different branches
                        ("m2", "m2_fork"), ("m2_fork", "m2"),
                        // m2 is only an ancestor through `a2`
                        ("m3", "m2"), ("m4", "m2"),
                        ("m", "m2"), ("a4", "m4"),
                    ]),
                ),
            ),
        ]
    );
}

#[test]
fn test_detect_fork() {
    run_tests!(
        tested_function_name => "detect fork",
        tested_function => |g, (x, y)| g.detect_fork(x, y),
        name_lookup => pair_name,
        setup_literal => s,
        tests => [
            (
                setup => build_graph_three_nodes_fork().unwrap(),
                test_case => (
                    expect: Ok(true),
                    arguments: pairs(&s, &[
                        ("e20", "a"), ("e20", "e2"), ("e12", "e20"), ("e12", "a"), ("e12", "e2"),
                    ]),
                ),
                test_case => (
                    expect: Ok(false),
                    arguments: pairs(&s, &[
                        ("e01", "e0"), ("e01", "a"), ("e01", "e2"), ("e20", "e01"), ("e12", "e01"),
                    ]),
                ),
            ),
            (
                setup => build_graph_three_nodes().unwrap(),
                test_case => (
                    expect: Ok(false),
                    arguments: pairs(&s, &[("e12", "e0"), ("e12", "e2"), ("e20", "e2")]),
                ),
            ),
            (
                setup => build_graph_fork().unwrap(),
                test_case => (
                    expect: Ok(true),
                    arguments: pairs(&s, &[("m3", "m"), ("a3", "m2"), ("a4", "m4"), ("m4", "m2_fork")]),
                ),
                test_case => (
                    expect: Ok(false),
                    arguments: pairs(&s, &[
                        ("a2", "m2"), ("a2", "m"), ("m2_fork", "m"), ("a1_1", "m"), ("a4", "a"),
                    ]),
                ),
            ),
        ]
    );
}

#[test]
fn test_see() {
    run_tests!(
        tested_function_name => "see",
        tested_function => |g, (x, y)| g.see(x, y),
        name_lookup => pair_name,
        setup_literal => s,
        tests => [
            (
                setup => build_graph_three_nodes_fork().unwrap(),
                test_case => (
                    expect: Ok(true),
                    arguments: pairs(&s, &[
                        ("e01", "e0"), ("e01", "a"), ("e20", "e0"), ("e20", "e01"),
                        ("e12", "e01"), ("e12", "e0"), ("e12", "e1"),
                    ]),
                ),
                test_case => (
                    expect: Ok(false),
                    arguments: pairs(&s, &[
                        ("e20", "a"), ("e20", "e2"), ("e12", "a"), ("e12", "e2"), ("e12", "e20"),
                    ]),
                ),
            ),
            (
                setup => build_graph_fork().unwrap(),
                test_case => (
                    expect: Ok(true),
                    arguments: pairs(&s, &[("a2", "m2"), ("a2", "m"), ("m3", "a2"), ("a4", "a")]),
                ),
                test_case => (
                    expect: Ok(false),
                    arguments: pairs(&s, &[("m3", "m2_fork"), ("a3", "m2"), ("a2", "m2_fork")]),
                ),
            ),
        ]
    );
}

#[test]
fn forked_branches_listed() {
    let setup = build_graph_fork().unwrap();
    let m = setup.peers_events["m"].id;
    let g = &setup.graph;
    assert!(g.is_forked(&m));
    assert!(!g.is_forked(&setup.peers_events["a"].id));
    assert_eq!(g.forked_branches(&setup.hash("a2"), &m), Ok(vec![]));
    let mut expected = vec![setup.hash("m2"), setup.hash("m2_fork")];
    expected.sort();
    assert_eq!(g.forked_branches(&setup.hash("m3"), &m), Ok(vec![expected]));
    assert_eq!(g.forked_branches(&setup.hash("m3"), &peer(42)), Ok(vec![]));

    let setup = build_graph_three_nodes_fork().unwrap();
    let node_2 = setup.peers_events["e2"].id;
    let mut expected = vec![setup.hash("e2"), setup.hash("a")];
    expected.sort();
    assert_eq!(
        setup.graph.peer_origins(&node_2),
        Some(&[setup.hash("e2"), setup.hash("a")][..])
    );
    assert_eq!(
        setup.graph.forked_branches(&setup.hash("e12"), &node_2),
        Ok(vec![expected])
    );
}

#[test]
fn last_ancestor_reaches_other_branch() {
    let mut graph = Graph::new();
    let m = Event::new(Transactions::default(), &[], peer(1)).unwrap();
    let a = Event::new(Transactions::default(), &[], peer(0)).unwrap();
    let m1 = Event::new(Transactions::default(), &[&m], peer(1)).unwrap();
    let m2 = Event::new(Transactions::default(), &[&m1], peer(1)).unwrap();
    let a1 = Event::new(Transactions::default(), &[&a, &m2], peer(0)).unwrap();
    // second self child of `m`, sees `m2` through `a1`
    let fork = Event::new(Transactions::default(), &[&m, &a1], peer(1)).unwrap();
    for event in [&m, &a, &m1, &m2, &a1, &fork] {
        graph.insert(event.clone()).unwrap();
    }
    assert!(graph.is_forked(&peer(1)));
    assert_eq!(fork.creator_seq(), 1);
    assert_eq!(graph.ancestor(fork.hash(), m2.hash()), Ok(true));
    assert_eq!(
        graph.last_ancestor(fork.hash(), &peer(1)),
        Ok(Some(&sequence::Frontier {
            seq: 2,
            event: m2.hash().clone()
        }))
    );
    assert_eq!(graph.detect_fork(fork.hash(), m.hash()), Ok(true));
    check_vectors(&graph, "fork reaching other branch");
}

#[test]
fn fork_detection_traced() {
    use tracing_subscriber::prelude::*;

    let setup = build_graph_fork().unwrap();
    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .with(test_utils::function_only_filter!("detect_fork"));
    tracing::subscriber::with_default(subscriber, || {
        assert_eq!(
            setup.graph.detect_fork(&setup.hash("m3"), &setup.hash("m")),
            Ok(true)
        );
        assert_eq!(
            setup.graph.detect_fork(&setup.hash("a2"), &setup.hash("m")),
            Ok(false)
        );
    });
}

#[test]
fn multi_way_fork_reported_once() {
    let mut graph = Graph::new();
    let g0 = Event::new(Transactions::default(), &[], peer(0)).unwrap();
    let g1 = Event::new(Transactions::default(), &[], peer(1)).unwrap();
    graph.insert(g0.clone()).unwrap();
    graph.insert(g1.clone()).unwrap();
    // three self children of `g1`
    let branches: Vec<Event> = (0..3u8)
        .map(|i| {
            let payload = Transactions {
                internal: vec![],
                external: vec![vec![i]],
            };
            Event::new(payload, &[&g1], peer(1)).unwrap()
        })
        .collect();
    let mut observer = g0.clone();
    for branch in &branches {
        graph.insert(branch.clone()).unwrap();
        observer = Event::new(Transactions::default(), &[&observer, branch], peer(0)).unwrap();
        graph.insert(observer.clone()).unwrap();
    }
    assert_eq!(graph.detect_fork(observer.hash(), g1.hash()), Ok(true));
    let forks = graph.forked_branches(observer.hash(), &peer(1)).unwrap();
    assert_eq!(forks.len(), 1);
    assert_eq!(forks[0].len(), 3);
    assert_eq!(graph.children(g1.hash()).unwrap().len(), 3);
}

// Properties over all known graphs

#[test]
fn relations_properties_hold() {
    for setup in all_setups() {
        let g = &setup.graph;
        let name = |h: &event::Hash| setup.names[h].clone();
        let events: Vec<event::Hash> = setup.names.keys().cloned().sorted().collect();
        for x in &events {
            assert_eq!(g.ancestor(x, x), Ok(true), "{}: reflexivity of {}", setup.setup_name, name(x));
            assert_eq!(g.self_ancestor(x, x), Ok(true));
            for y in &events {
                let ancestor = g.ancestor(x, y).unwrap();
                let context = format!("{}: ({}, {})", setup.setup_name, name(x), name(y));
                assert_eq!(Ok(ancestor), g.ancestor_by_walk(x, y), "{}", context);
                if x != y {
                    assert!(!(ancestor && g.ancestor(y, x).unwrap()), "antisymmetry {}", context);
                }
                if g.self_ancestor(x, y).unwrap() {
                    assert!(ancestor, "self ancestor must be ancestor {}", context);
                }
                let fork = g.detect_fork(x, y).unwrap();
                assert_eq!(Ok(fork), g.detect_fork_by_walk(x, y), "{}", context);
                let see = g.see(x, y).unwrap();
                assert!(!(see && fork), "see and fork are exclusive {}", context);
                assert_eq!(see, ancestor && !fork, "{}", context);
                // fork detection depends on the creator only
                let creator = g.event(y).unwrap().creator();
                for z in &setup.peers_events.values().find(|p| &p.id == creator).unwrap().events {
                    assert_eq!(g.detect_fork(x, z), Ok(fork), "{} vs {}", context, name(z));
                }
            }
        }
    }
}

#[test]
fn ancestry_is_transitive() {
    let setup = build_graph_from_paper().unwrap();
    let g = &setup.graph;
    let events: Vec<_> = setup.names.keys().collect();
    for (x, y, z) in events.iter().tuple_combinations() {
        for (a, b, c) in [(x, y, z), (x, z, y), (y, x, z), (y, z, x), (z, x, y), (z, y, x)] {
            if g.ancestor(a, b).unwrap() && g.ancestor(b, c).unwrap() {
                assert!(g.ancestor(a, c).unwrap());
            }
        }
    }
}

/// Sequence vectors are equal to the values calculated directly
fn check_vectors(g: &Graph, context: &str) {
    let events: Vec<event::Hash> = g.all_events.keys().cloned().collect();
    let peers: Vec<PeerId> = g.peers().cloned().collect();
    for y in &events {
        for p in &peers {
            let mut ancestors_seq = None;
            let mut descendants_seq = None;
            for x in &events {
                let other = g.event(x).unwrap();
                if other.creator() != p {
                    continue;
                }
                if g.ancestor_by_walk(y, x).unwrap() {
                    ancestors_seq = ancestors_seq.max(Some(other.creator_seq()));
                }
                if g.ancestor_by_walk(x, y).unwrap() {
                    descendants_seq = Some(
                        descendants_seq.map_or(other.creator_seq(), |s: CreatorSeq| {
                            s.min(other.creator_seq())
                        }),
                    );
                }
            }
            assert_eq!(
                g.last_ancestor(y, p).unwrap().map(|f| f.seq),
                ancestors_seq,
                "{}: last ancestor of {} by {}",
                context,
                y,
                p
            );
            assert_eq!(
                g.first_descendant(y, p).unwrap().map(|f| f.seq),
                descendants_seq,
                "{}: first descendant of {} by {}",
                context,
                y,
                p
            );
            if let Some(frontier) = g.first_descendant(y, p).unwrap() {
                assert!(g.ancestor_by_walk(&frontier.event, y).unwrap());
            }
        }
    }
}

#[test]
fn sequence_vectors_correct() {
    for setup in all_setups() {
        check_vectors(&setup.graph, &setup.setup_name);
    }
}

/// Random graph where each peer occasionally builds on an older own event
fn random_graph(seed: u64, peers: u8, events: usize, fork_chance: f64) -> Graph {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut graph = Graph::new();
    let mut by_peer: Vec<Vec<Event>> = (0..peers)
        .map(|i| vec![Event::new(Transactions::default(), &[], peer(i)).unwrap()])
        .collect();
    for lane in &by_peer {
        graph.insert(lane[0].clone()).unwrap();
    }
    for n in 0..events {
        let author = rng.gen_range(0..peers);
        let lane = &by_peer[author as usize];
        let self_parent = if rng.gen_bool(fork_chance) {
            &lane[rng.gen_range(0..lane.len())]
        } else {
            lane.last().expect("lanes start with genesis")
        };
        let mut other_peer = rng.gen_range(0..peers);
        if other_peer == author {
            other_peer = (other_peer + 1) % peers;
        }
        let other_lane = &by_peer[other_peer as usize];
        let other_parent = &other_lane[rng.gen_range(0..other_lane.len())];
        let payload = Transactions {
            internal: vec![],
            external: vec![(n as u64).to_le_bytes().to_vec()],
        };
        let event = Event::new(payload, &[self_parent, other_parent], peer(author)).unwrap();
        graph.insert(event.clone()).unwrap();
        by_peer[author as usize].push(event);
    }
    graph
}

#[test]
fn fast_paths_match_walk_on_random_graphs() {
    for seed in 0..4 {
        let graph = random_graph(seed, 5, 120, 0.1);
        let events: Vec<event::Hash> = graph.all_events.keys().cloned().sorted().collect();
        for x in &events {
            for y in &events {
                assert_eq!(
                    graph.ancestor(x, y),
                    graph.ancestor_by_walk(x, y),
                    "seed {}: ancestor({}, {})",
                    seed,
                    x,
                    y
                );
                assert_eq!(
                    graph.detect_fork(x, y),
                    graph.detect_fork_by_walk(x, y),
                    "seed {}: detect_fork({}, {})",
                    seed,
                    x,
                    y
                );
            }
        }
    }
}

#[test]
fn sequence_vectors_correct_on_random_graphs() {
    let graph = random_graph(1337, 4, 80, 0.3);
    assert!(graph.peers().any(|p| graph.is_forked(p)));
    check_vectors(&graph, "random graph");
}

#[test]
fn honest_random_graph_has_no_forks() {
    let graph = random_graph(7, 4, 100, 0.0);
    let events: HashSet<&event::Hash> = graph.all_events.keys().collect();
    assert!(graph.peers().all(|p| !graph.is_forked(p)));
    for x in &events {
        for y in &events {
            assert_eq!(graph.detect_fork(x, y), Ok(false));
            assert_eq!(graph.see(x, y), graph.ancestor(x, y));
        }
    }
}
