/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via the replica's
//! [config](crate::replica::Configuration).
//!
//! This crate logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least three values. The first three values
//! are always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//! 3. The partition of the consensus instance that emitted the event: `*` for the whole key space,
//!    `k<key>` for a single key, `g<group>` for a group of keys.
//!
//! For example, the following snippet is how a [Commit](crate::events::CommitEvent) is printed:
//!
//! ```text
//! Commit, 1701329264, k7, 3.1.2, 12, put(7, YWJj)@2.3#41
//! ```
//!
//! In the snippet, the fourth value is the ballot (`round.zone.node`), the fifth value is the slot,
//! and the last value is the committed command. Values are shown as the first seven characters of
//! their Base64 encoding.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use log;
use std::time::SystemTime;

use crate::events::*;

// Names of each event in PascalCase for printing:
pub const PREPARE: &str = "Prepare";
pub const RECEIVE_PROMISE: &str = "ReceivePromise";
pub const BECOME_LEADER: &str = "BecomeLeader";
pub const STEP_DOWN: &str = "StepDown";

pub const PROPOSE: &str = "Propose";
pub const ACCEPT: &str = "Accept";
pub const COMMIT: &str = "Commit";
pub const EXECUTE: &str = "Execute";

pub const FORWARD: &str = "Forward";
pub const LEADER_CHANGE: &str = "LeaderChange";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for PrepareEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |prepare_event: &PrepareEvent| {
            log::info!(
                "{}, {}, {}, {}",
                PREPARE,
                secs_since_unix_epoch(prepare_event.timestamp),
                prepare_event.partition,
                prepare_event.ballot
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceivePromiseEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_promise_event: &ReceivePromiseEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                RECEIVE_PROMISE,
                secs_since_unix_epoch(receive_promise_event.timestamp),
                receive_promise_event.partition,
                receive_promise_event.origin,
                receive_promise_event.ballot
            )
        };
        Box::new(logger)
    }
}

impl Logger for BecomeLeaderEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |become_leader_event: &BecomeLeaderEvent| {
            log::info!(
                "{}, {}, {}, {}",
                BECOME_LEADER,
                secs_since_unix_epoch(become_leader_event.timestamp),
                become_leader_event.partition,
                become_leader_event.ballot
            )
        };
        Box::new(logger)
    }
}

impl Logger for StepDownEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |step_down_event: &StepDownEvent| {
            log::info!(
                "{}, {}, {}, {}",
                STEP_DOWN,
                secs_since_unix_epoch(step_down_event.timestamp),
                step_down_event.partition,
                step_down_event.ballot
            )
        };
        Box::new(logger)
    }
}

impl Logger for ProposeEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |propose_event: &ProposeEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                PROPOSE,
                secs_since_unix_epoch(propose_event.timestamp),
                propose_event.partition,
                propose_event.ballot,
                propose_event.slot,
                propose_event.command
            )
        };
        Box::new(logger)
    }
}

impl Logger for AcceptEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |accept_event: &AcceptEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                ACCEPT,
                secs_since_unix_epoch(accept_event.timestamp),
                accept_event.partition,
                accept_event.ballot,
                accept_event.slot
            )
        };
        Box::new(logger)
    }
}

impl Logger for CommitEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |commit_event: &CommitEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                COMMIT,
                secs_since_unix_epoch(commit_event.timestamp),
                commit_event.partition,
                commit_event.ballot,
                commit_event.slot,
                commit_event.command
            )
        };
        Box::new(logger)
    }
}

impl Logger for ExecuteEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |execute_event: &ExecuteEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                EXECUTE,
                secs_since_unix_epoch(execute_event.timestamp),
                execute_event.partition,
                execute_event.slot,
                execute_event.command,
                match &execute_event.value {
                    Some(value) => first_seven_base64_chars(value.bytes()),
                    None => String::from("-"),
                }
            )
        };
        Box::new(logger)
    }
}

impl Logger for ForwardEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |forward_event: &ForwardEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                FORWARD,
                secs_since_unix_epoch(forward_event.timestamp),
                forward_event.partition,
                forward_event.to,
                forward_event.command
            )
        };
        Box::new(logger)
    }
}

impl Logger for LeaderChangeEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |leader_change_event: &LeaderChangeEvent| {
            log::info!(
                "{}, {}, k{}, {}, {}",
                LEADER_CHANGE,
                secs_since_unix_epoch(leader_change_event.timestamp),
                leader_change_event.key,
                leader_change_event.to,
                leader_change_event.ballot
            )
        };
        Box::new(logger)
    }
}

// Get a more readable representation of a bytesequence by base64-encoding it and taking the first 7 characters.
pub(crate) fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

// Clocks set before the epoch print as 0.
fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}
