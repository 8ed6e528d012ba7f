/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Offline linearizability checking of recorded client histories.
//!
//! After a run, the operations clients performed (what they wrote or read, and when each call started
//! and returned) are collected into a [History]. [History::linearizable] decides, key by key, whether
//! some sequential order of the operations respects both real time and the values reads returned, and
//! reports the reads for which no such order exists.
//!
//! The check follows the graph construction of Lu et al., "Existential Consistency: Measuring and
//! Understanding Consistency at Facebook" (SOSP 2015): each read is merged into the write it observed,
//! and a cycle in the resulting ordering constraints marks the read as an anomaly. Writes that never
//! returned are given an infinite completion time, so they may take effect at any point after their
//! invocation.

pub mod graph;

pub mod history;
pub use history::{History, LinearizabilityReport};

pub mod linearizability;
pub use linearizability::Checker;

pub mod operation;
pub use operation::Operation;
