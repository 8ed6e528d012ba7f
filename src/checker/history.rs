/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Recording the operations of a run, key by key.

use std::collections::BTreeMap;

use crate::types::command::Key;

use super::{linearizability::Checker, operation::Operation};

/// The operations clients performed during a run, grouped by key. Linearizability is checked per key,
/// since operations on different keys never constrain each other.
#[derive(Clone, Debug, Default)]
pub struct History {
    operations: BTreeMap<Key, Vec<Operation>>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_operation(&mut self, key: Key, operation: Operation) {
        self.operations.entry(key).or_default().push(operation);
    }

    pub fn operations(&self, key: Key) -> &[Operation] {
        self.operations.get(&key).map_or(&[], Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.operations.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.operations.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check every key's operations.
    pub fn linearizable(&self) -> LinearizabilityReport {
        let mut checker = Checker::new();
        let anomalies: Vec<(Key, Operation)> = self
            .operations
            .iter()
            .flat_map(|(key, operations)| {
                checker
                    .linearizable(operations)
                    .into_iter()
                    .map(move |operation| (*key, operation))
            })
            .collect();

        let report = LinearizabilityReport {
            anomalies,
            operations: self.len(),
        };
        if report.anomaly_count() == 0 {
            log::info!("The execution is linearizable.");
        } else {
            log::info!(
                "The execution is NOT linearizable: {} anomalous reads out of {} operations ({:.4}).",
                report.anomaly_count(),
                report.operations,
                report.ratio()
            );
        }
        report
    }
}

/// The result of [History::linearizable].
#[derive(Clone, Debug, Default)]
pub struct LinearizabilityReport {
    /// Every read that no linearizable execution could have returned, with its key.
    pub anomalies: Vec<(Key, Operation)>,
    /// Number of operations checked.
    pub operations: usize,
}

impl LinearizabilityReport {
    pub fn anomaly_count(&self) -> usize {
        self.anomalies.len()
    }

    /// Fraction of all operations that are anomalous reads. Zero for an empty history.
    pub fn ratio(&self) -> f64 {
        if self.operations == 0 {
            0.0
        } else {
            self.anomalies.len() as f64 / self.operations as f64
        }
    }

    pub fn is_linearizable(&self) -> bool {
        self.anomalies.is_empty()
    }
}
