/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the phase messages that are exchanged between replicas as part of the
//! [Paxos](crate::paxos::Paxos) protocol.
//!
//! | Phase | Leader to acceptors | Acceptors to leader |
//! |-------|---------------------|---------------------|
//! | 1     | [Prepare]           | [Promise]           |
//! | 2     | [Accept]            | [Accepted]          |
//! | 3     | [Commit]            | -                   |

use borsh::{BorshDeserialize, BorshSerialize};
use std::collections::BTreeMap;

use crate::types::{
    ballot::{Ballot, Slot},
    command::Command,
    identifier::Identifier,
};

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum PaxosMessage {
    Prepare(Prepare),
    Promise(Promise),
    Accept(Accept),
    Accepted(Accepted),
    Commit(Commit),
}

impl PaxosMessage {
    pub fn prepare(ballot: Ballot, execute: Slot) -> PaxosMessage {
        PaxosMessage::Prepare(Prepare { ballot, execute })
    }

    pub fn promise(ballot: Ballot, id: Identifier, log: BTreeMap<Slot, CommandBallot>) -> PaxosMessage {
        PaxosMessage::Promise(Promise { ballot, id, log })
    }

    pub fn accept(ballot: Ballot, slot: Slot, command: Command) -> PaxosMessage {
        PaxosMessage::Accept(Accept { ballot, slot, command })
    }

    pub fn accepted(ballot: Ballot, id: Identifier, slot: Slot) -> PaxosMessage {
        PaxosMessage::Accepted(Accepted { ballot, id, slot })
    }

    pub fn commit(ballot: Ballot, slot: Slot, command: Command) -> PaxosMessage {
        PaxosMessage::Commit(Commit { ballot, slot, command })
    }

    /// Returns the ballot carried by a given [PaxosMessage].
    pub fn ballot(&self) -> Ballot {
        match self {
            PaxosMessage::Prepare(Prepare { ballot, .. }) => *ballot,
            PaxosMessage::Promise(Promise { ballot, .. }) => *ballot,
            PaxosMessage::Accept(Accept { ballot, .. }) => *ballot,
            PaxosMessage::Accepted(Accepted { ballot, .. }) => *ballot,
            PaxosMessage::Commit(Commit { ballot, .. }) => *ballot,
        }
    }
}

/// Phase 1a. Asks acceptors to promise not to accept anything below `ballot`. `execute` is the
/// candidate's execute cursor: acceptors report their log from that slot on.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Prepare {
    pub ballot: Ballot,
    pub execute: Slot,
}

/// Phase 1b. Carries the acceptor's current ballot, which is the prepared ballot if the acceptor
/// adopted it, and its log entries from the candidate's execute cursor on, committed or not.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Promise {
    pub ballot: Ballot,
    pub id: Identifier,
    pub log: BTreeMap<Slot, CommandBallot>,
}

/// Phase 2a.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Accept {
    pub ballot: Ballot,
    pub slot: Slot,
    pub command: Command,
}

/// Phase 2b. `ballot` is the acceptor's current ballot. If it differs from the ballot of the
/// [Accept], the proposal was rejected. An acceptor that already knows the slot's command is chosen
/// answers with a [Commit] instead.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Accepted {
    pub ballot: Ballot,
    pub id: Identifier,
    pub slot: Slot,
}

/// Phase 3. The command in `slot` has been chosen.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Commit {
    pub ballot: Ballot,
    pub slot: Slot,
    pub command: Command,
}

/// A command together with the ballot it was last accepted under, and whether it is known to be
/// chosen.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct CommandBallot {
    pub command: Command,
    pub ballot: Ballot,
    pub commit: bool,
}
