/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Commands replicated by consensus and applied to the [state machine](crate::state_machine).

use borsh::{BorshDeserialize, BorshSerialize};
use std::fmt::{self, Debug, Display, Formatter};

use super::identifier::Identifier;
use crate::logging::first_seven_base64_chars;

/// An application key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, BorshSerialize, BorshDeserialize)]
pub struct Key(u64);

impl Key {
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    pub const fn int(&self) -> u64 {
        self.0
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// An opaque value stored under a [Key].
#[derive(Clone, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub struct Value(Vec<u8>);

impl Value {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value(value.as_bytes().to_vec())
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => write!(f, "Value({:?})", s),
            Err(_) => write!(f, "Value({:?})", self.0),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&first_seven_base64_chars(&self.0))
    }
}

/// A get or put issued by a client.
///
/// A command with no value is a read (get); a command with a value is a write (put). Two commands are
/// equal only if every field, including the issuing client and its command number, is equal.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Command {
    pub key: Key,
    pub value: Option<Value>,
    pub client_id: Identifier,
    pub command_id: u64,
}

impl Command {
    pub fn get(key: Key, client_id: Identifier, command_id: u64) -> Self {
        Self { key, value: None, client_id, command_id }
    }

    pub fn put(key: Key, value: Value, client_id: Identifier, command_id: u64) -> Self {
        Self { key, value: Some(value), client_id, command_id }
    }

    /// The command a new leader proposes for a slot that no replica in its phase 1 quorum knew about.
    /// It is a read with no client, so applying it leaves the state unchanged.
    pub fn noop() -> Self {
        Self::get(Key::new(0), Identifier::new(0, 0), 0)
    }

    pub fn is_read(&self) -> bool {
        self.value.is_none()
    }

    pub fn is_write(&self) -> bool {
        self.value.is_some()
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "put({}, {})@{}#{}", self.key, value, self.client_id, self.command_id),
            None => write!(f, "get({})@{}#{}", self.key, self.client_id, self.command_id),
        }
    }
}
