//! A simple, volatile, in-memory key-value [`StateMachine`].

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use paxos_rs::{
    state_machine::StateMachine,
    types::command::{Command, Key, Value},
};

/// An in-memory key-value store. Clones share the same data, so a test can keep a clone to inspect
/// what a replica executed.
#[derive(Clone, Default)]
pub(crate) struct MemDB {
    data: Arc<Mutex<HashMap<Key, Value>>>,
    executed: Arc<Mutex<Vec<Command>>>,
}

impl MemDB {
    /// Create a new, empty `MemDB`.
    pub(crate) fn new() -> MemDB {
        MemDB::default()
    }

    pub(crate) fn get(&self, key: Key) -> Option<Value> {
        self.data.lock().unwrap().get(&key).cloned()
    }

    /// Every command executed so far, in execution order.
    pub(crate) fn executed(&self) -> Vec<Command> {
        self.executed.lock().unwrap().clone()
    }
}

impl StateMachine for MemDB {
    // Returns the value the key had before the command.
    fn execute(&mut self, command: &Command) -> Option<Value> {
        self.executed.lock().unwrap().push(command.clone());
        let mut data = self.data.lock().unwrap();
        match &command.value {
            Some(value) => data.insert(command.key, value.clone()),
            None => data.get(&command.key).cloned(),
        }
    }
}
