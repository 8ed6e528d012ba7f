/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A Rust implementation of Multi-Paxos for replicating a key-value state machine, with per-key and
//! per-group consensus instances, flexible quorums, and an offline linearizability checker.
//!
//! Users plug in their own [state machine](state_machine::StateMachine) and
//! [networking provider](networking::network::Network), and [start](replica::ReplicaSpec::start) a
//! [replica](replica::Replica) on every node. The [consensus instance](paxos::Paxos) itself is
//! independent of threads and sockets and can be driven directly.

pub mod types;

pub mod quorum;

pub mod state_machine;

pub mod networking;

pub mod paxos;

pub mod partitioned;

pub mod checker;

pub mod events;

pub(crate) mod event_bus;

pub mod logging;

pub(crate) mod algorithm;

pub mod replica;
