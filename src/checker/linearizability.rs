/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The graph-based linearizability check of a single key's history.

use super::{graph::Graph, operation::Operation};

/// Finds the reads of a history that no linearizable execution could have produced.
///
/// Operations are vertices of a [Graph], and an edge `u -> v` means `u` must take effect before `v`.
/// Operations are added in invocation order, each with an edge from every operation that completed
/// before it was invoked. A read is then merged into the write it returned the value of: the write
/// inherits the read's predecessors, and its completion is moved up to the read's if that is earlier.
/// If the merge closes a cycle, the read observed a value it could not have seen.
#[derive(Default)]
pub struct Checker {
    graph: Graph<usize>,
    operations: Vec<Operation>,
}

impl Checker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the anomalous reads of `history`, in invocation order. An empty result means the history
    /// is linearizable.
    pub fn linearizable(&mut self, history: &[Operation]) -> Vec<Operation> {
        self.graph = Graph::new();
        self.operations = history.to_vec();
        self.operations.sort_by_key(|operation| operation.start);

        let mut anomalies = Vec::new();
        for i in 0..self.operations.len() {
            self.add(i);
            if !self.operations[i].is_read() {
                continue;
            }

            // A read may return a write that was invoked after it, as long as the two overlap.
            let mut j = i + 1;
            while j < self.operations.len() && self.operations[i].concurrent(&self.operations[j]) {
                if self.operations[j].is_write() {
                    self.add(j);
                }
                j += 1;
            }

            if let Some(write) = self.matching_write(i) {
                self.merge(i, write);
            }

            if let Some(cycle) = self.graph.cycle() {
                log::debug!("Anomalous read {}", self.operations[i]);
                anomalies.push(self.operations[i].clone());
                self.break_cycle(&cycle);
            }
        }
        anomalies
    }

    fn add(&mut self, o: usize) {
        // Writes pulled in early by a concurrent read are already there.
        if self.graph.has(o) {
            return;
        }
        self.graph.add(o);
        let predecessors: Vec<usize> = self
            .graph
            .vertices()
            .filter(|&v| v != o && self.operations[v].happens_before(&self.operations[o]))
            .collect();
        for v in predecessors {
            self.graph.add_edge(v, o);
        }
    }

    // The first write in the graph whose input is the value `read` returned.
    fn matching_write(&self, read: usize) -> Option<usize> {
        let output = self.operations[read].output.as_ref()?;
        self.graph
            .vertices()
            .find(|&v| self.operations[v].input.as_ref() == Some(output))
    }

    fn merge(&mut self, read: usize, write: usize) {
        for s in self.graph.to(read) {
            if s != write {
                self.graph.add_edge(s, write);
            }
        }

        // The write was visible no later than the read that returned it.
        if self.operations[read].end < self.operations[write].end {
            self.operations[write].end = self.operations[read].end;
        }
        self.graph.remove(read);
    }

    // Drop the edges of the cycle that contradict real time, so later reads are checked on their own.
    fn break_cycle(&mut self, cycle: &[usize]) {
        for &u in cycle {
            for &v in cycle {
                if self.graph.has_edge(u, v) && self.operations[u].start > self.operations[v].end {
                    self.graph.remove_edge(u, v);
                }
            }
        }
    }
}
