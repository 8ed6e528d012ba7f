/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of the events that a replica emits for event handling and logging.
//!
//! An event for a given action indicates that the action has been completed. Every event carries the
//! time at which it happened and the [partition](crate::types::partition::Partition) of the consensus
//! instance that emitted it.
//!
//! Handlers for these events can be registered with the
//! [replica's builder](crate::replica::ReplicaSpec), and the events are printed by the
//! [loggers](crate::logging) if the replica is configured to log events.

use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::types::{
    ballot::{Ballot, Slot},
    command::{Command, Key, Value},
    identifier::Identifier,
    partition::Partition,
};

pub enum Event {
    // Phase 1.
    Prepare(PrepareEvent),
    ReceivePromise(ReceivePromiseEvent),
    BecomeLeader(BecomeLeaderEvent),
    StepDown(StepDownEvent),
    // Phases 2 and 3.
    Propose(ProposeEvent),
    Accept(AcceptEvent),
    Commit(CommitEvent),
    Execute(ExecuteEvent),
    // Request routing.
    Forward(ForwardEvent),
    LeaderChange(LeaderChangeEvent),
}

impl Event {
    pub(crate) fn publish(self, event_publisher: &Option<Sender<Event>>) {
        if let Some(event_publisher) = event_publisher {
            // The event bus only goes away while the replica is shutting down.
            let _ = event_publisher.send(self);
        }
    }
}

/// The replica started phase 1 with a new ballot of its own.
pub struct PrepareEvent {
    pub timestamp: SystemTime,
    pub partition: Partition,
    pub ballot: Ballot,
}

/// The replica received a promise for the ballot it is trying to get elected with.
pub struct ReceivePromiseEvent {
    pub timestamp: SystemTime,
    pub partition: Partition,
    pub origin: Identifier,
    pub ballot: Ballot,
}

/// Phase 1 succeeded: the replica is now the active leader for `ballot`.
pub struct BecomeLeaderEvent {
    pub timestamp: SystemTime,
    pub partition: Partition,
    pub ballot: Ballot,
}

/// The replica saw `ballot`, which is higher than its own, and stopped acting as leader.
pub struct StepDownEvent {
    pub timestamp: SystemTime,
    pub partition: Partition,
    pub ballot: Ballot,
}

/// The leader proposed `command` for `slot`.
pub struct ProposeEvent {
    pub timestamp: SystemTime,
    pub partition: Partition,
    pub ballot: Ballot,
    pub slot: Slot,
    pub command: Command,
}

/// The replica, as an acceptor, accepted the proposal for `slot` under `ballot`.
pub struct AcceptEvent {
    pub timestamp: SystemTime,
    pub partition: Partition,
    pub ballot: Ballot,
    pub slot: Slot,
}

/// `command` was chosen for `slot`.
pub struct CommitEvent {
    pub timestamp: SystemTime,
    pub partition: Partition,
    pub ballot: Ballot,
    pub slot: Slot,
    pub command: Command,
}

/// `command` was applied to the state machine, returning `value`.
pub struct ExecuteEvent {
    pub timestamp: SystemTime,
    pub partition: Partition,
    pub slot: Slot,
    pub command: Command,
    pub value: Option<Value>,
}

/// A request was handed to `to`, which the replica believes is (or is about to become) the leader.
pub struct ForwardEvent {
    pub timestamp: SystemTime,
    pub partition: Partition,
    pub to: Identifier,
    pub command: Command,
}

/// The leader of `key` asked `to` to take over leadership of `key`.
pub struct LeaderChangeEvent {
    pub timestamp: SystemTime,
    pub key: Key,
    pub to: Identifier,
    pub ballot: Ballot,
}
