/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The trait for the state machine that a replica replicates.

use crate::types::command::{Command, Value};

/// Methods that a type needs to implement to serve as a replica's key-value state machine.
///
/// Besides implementing the method specified in the trait, implementors are expected to be
/// *deterministic*: applying the same sequence of commands to two fresh instances must produce the same
/// sequence of return values and leave both in the same state.
///
/// A replica calls [execute](StateMachine::execute) exactly once per committed slot, in increasing slot
/// order. All the consensus instances of a replica share its single state machine.
pub trait StateMachine: Send + 'static {
    /// Apply `command`.
    ///
    /// # Return value
    /// For a put, the value the key held before the put (if any). For a get, the value the key
    /// currently holds (if any).
    fn execute(&mut self, command: &Command) -> Option<Value>;
}
