/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Subprotocol for agreeing on the order of [commands](crate::types::command::Command).
//!
//! Each [Paxos] instance maintains a log of slots and decides one command per slot, in three phases:
//! 1. **Phase 1** (leader election and log recovery): a candidate broadcasts a
//!    [`Prepare`](messages::Prepare) for a new ballot. Acceptors that have not seen a higher ballot
//!    adopt it and reply with a [`Promise`](messages::Promise) that carries their log from the
//!    candidate's execute cursor on. Once a Q1 quorum promised, the candidate becomes the active leader.
//! 2. **Phase 2** (replication): the leader assigns a command to the next slot and sends an
//!    [`Accept`](messages::Accept). Acceptors reply with [`Accepted`](messages::Accepted). Once a Q2
//!    quorum accepted, the command is chosen.
//! 3. **Phase 3** (dissemination): the leader broadcasts a [`Commit`](messages::Commit). Every replica
//!    executes committed slots in order. An acceptor asked to accept a slot it knows is committed
//!    answers with the chosen command instead.
//!
//! Which quorums Q1 and Q2 are is configurable (see [`QuorumRule`](crate::quorum::QuorumRule)), as long
//! as every Q1 quorum intersects every Q2 quorum.
//!
//! An instance does not talk to the network directly: it sends through a
//! [`Transport`](crate::networking::sending::Transport) that it owns, which is what allows the
//! [partitioned registry](crate::partitioned) to run many instances over one network.

pub mod implementation;
pub use implementation::{Paxos, PaxosConfiguration};

pub(crate) mod log;

pub mod messages;
