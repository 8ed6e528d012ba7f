/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Tests for the linearizability checker, on hand-written histories.

mod common;

use log::LevelFilter;
use paxos_rs::{
    checker::{graph::Graph, Checker, History, Operation},
    types::command::{Key, Value},
};

use common::logging::setup_logger;

fn w(value: &str, start: i64, end: i64) -> Operation {
    Operation::write(Value::from(value), start, end)
}

fn r(value: &str, start: i64, end: i64) -> Operation {
    Operation::read(Some(Value::from(value)), start, end)
}

#[test]
fn graph_cycle_test() {
    setup_logger(LevelFilter::Debug);
    let mut graph = Graph::new();
    graph.add_edge(1, 2);
    graph.add_edge(2, 3);
    graph.add_edge(1, 3);
    graph.add_edge(3, 3);
    assert_eq!(graph.len(), 3);
    assert!(!graph.has_edge(3, 3));
    assert_eq!(graph.cycle(), None);

    graph.add_edge(3, 1);
    let mut cycle = graph.cycle().unwrap();
    cycle.sort();
    assert_eq!(cycle, vec![1, 2, 3]);

    graph.remove(2);
    assert_eq!(graph.to(3), vec![1]);
    assert_eq!(graph.from(3), vec![1]);
    assert!(graph.cycle().is_some());

    graph.remove_edge(3, 1);
    assert_eq!(graph.cycle(), None);
}

#[test]
fn sequential_history_is_linearizable_test() {
    setup_logger(LevelFilter::Debug);
    let history = vec![w("1", 0, 10), r("1", 20, 30), w("2", 40, 50), r("2", 60, 70)];
    assert!(Checker::new().linearizable(&history).is_empty());
}

#[test]
fn stale_read_is_anomalous_test() {
    setup_logger(LevelFilter::Debug);

    // The read starts after 2 overwrote 1, yet returns 1.
    let history = vec![w("1", 0, 10), w("2", 20, 30), r("1", 40, 50)];
    let anomalies = Checker::new().linearizable(&history);
    assert_eq!(anomalies, vec![r("1", 40, 50)]);
}

#[test]
fn reads_after_anomaly_are_checked_independently_test() {
    setup_logger(LevelFilter::Debug);
    let history = vec![w("1", 0, 10), w("2", 20, 30), r("1", 40, 50), r("2", 60, 70)];
    let anomalies = Checker::new().linearizable(&history);
    assert_eq!(anomalies, vec![r("1", 40, 50)]);
}

#[test]
fn read_may_return_concurrent_later_write_test() {
    setup_logger(LevelFilter::Debug);

    // The write of 2 is invoked after the read, but overlaps it.
    let history = vec![w("1", 0, 10), r("2", 5, 30), w("2", 20, 40)];
    assert!(Checker::new().linearizable(&history).is_empty());
}

#[test]
fn read_may_return_failed_write_test() {
    setup_logger(LevelFilter::Debug);

    // A write without a reply may take effect at any point after it was invoked.
    let history = vec![Operation::failed_write(Value::from("1"), 0), r("1", 10, 20)];
    assert!(Checker::new().linearizable(&history).is_empty());
}

#[test]
fn order_of_input_does_not_matter_test() {
    setup_logger(LevelFilter::Debug);
    let history = vec![r("1", 40, 50), w("2", 20, 30), w("1", 0, 10)];
    assert_eq!(Checker::new().linearizable(&history).len(), 1);
}

#[test]
fn history_report_test() {
    setup_logger(LevelFilter::Debug);
    let mut history = History::new();
    assert!(history.is_empty());
    assert_eq!(history.linearizable().ratio(), 0.0);

    // 1. Key 1 has a stale read, key 2 does not.
    history.add_operation(Key::new(1), w("1", 0, 10));
    history.add_operation(Key::new(1), w("2", 20, 30));
    history.add_operation(Key::new(1), r("1", 40, 50));
    history.add_operation(Key::new(2), w("1", 0, 10));
    history.add_operation(Key::new(2), r("1", 20, 30));
    assert_eq!(history.len(), 5);
    assert_eq!(history.keys().collect::<Vec<Key>>(), vec![Key::new(1), Key::new(2)]);
    assert_eq!(history.operations(Key::new(2)).len(), 2);
    assert!(history.operations(Key::new(3)).is_empty());

    // 2. Only the stale read is reported, under its key.
    let report = history.linearizable();
    assert!(!report.is_linearizable());
    assert_eq!(report.anomaly_count(), 1);
    assert_eq!(report.anomalies[0], (Key::new(1), r("1", 40, 50)));
    assert_eq!(report.operations, 5);
    assert!((report.ratio() - 0.2).abs() < 1e-9);
}
