/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Client requests and the replies they produce.
//!
//! A [Request] is a plain value, so it can be forwarded between replicas like any other message. Its
//! reply sink is the pair ([Request::origin], [Request::ticket]): the origin replica holds the client's
//! channel under that ticket in its [reply registry](crate::networking::replies::ReplyRegistry), and
//! whichever replica finally executes the request sends the [Reply] back to the origin.

use borsh::{BorshDeserialize, BorshSerialize};
use std::time::{SystemTime, UNIX_EPOCH};

use super::{
    ballot::{Ballot, Slot},
    command::{Command, Value},
    identifier::Identifier,
};

/// Number that the origin replica assigns to a request to find its client when the reply comes back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, BorshSerialize, BorshDeserialize)]
pub struct Ticket(u64);

impl Ticket {
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    pub const fn int(&self) -> u64 {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Request {
    pub command: Command,
    /// Nanoseconds since the Unix Epoch at which the origin received the request.
    pub timestamp: u64,
    /// The replica that the client is waiting on.
    pub origin: Identifier,
    pub ticket: Ticket,
}

impl Request {
    pub fn new(command: Command, origin: Identifier, ticket: Ticket) -> Self {
        Self {
            command,
            timestamp: nanos_since_unix_epoch(),
            origin,
            ticket,
        }
    }
}

/// Where in the log a reply was produced.
///
/// Exposed so that read paths can reason about how fresh a returned value is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ExecutionInfo {
    pub slot: Slot,
    pub ballot: Ballot,
    /// The execute cursor of the replying instance.
    pub execute: Slot,
    /// `true` if the value was taken from a log entry that had not been executed yet.
    pub in_progress: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Reply {
    pub command: Command,
    /// The previous value of the key for a put, the current value for a get.
    pub value: Option<Value>,
    /// `None` when the reply was sent on commit, before execution.
    pub info: Option<ExecutionInfo>,
    pub timestamp: u64,
}

impl Reply {
    pub fn new(command: Command, value: Option<Value>, info: Option<ExecutionInfo>) -> Self {
        Self {
            command,
            value,
            info,
            timestamp: nanos_since_unix_epoch(),
        }
    }
}

pub(crate) fn nanos_since_unix_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_nanos() as u64)
        .unwrap_or(0)
}
