/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The record of one client operation on one key.

use std::fmt::{self, Display, Formatter};

use crate::types::command::Value;

/// A read or a write as a client observed it: what it sent, what it got back, and when it was invoked
/// and completed.
///
/// Writes carry an `input` and no `output`. Reads carry no `input`, and an `output` unless the key had
/// no value. A write that never completed has `end == i64::MAX`, which makes it concurrent with every
/// operation invoked after it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operation {
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub start: i64,
    pub end: i64,
}

impl Operation {
    pub fn write(value: Value, start: i64, end: i64) -> Self {
        Self {
            input: Some(value),
            output: None,
            start,
            end,
        }
    }

    pub fn read(value: Option<Value>, start: i64, end: i64) -> Self {
        Self {
            input: None,
            output: value,
            start,
            end,
        }
    }

    /// A write whose reply never arrived.
    pub fn failed_write(value: Value, start: i64) -> Self {
        Self::write(value, start, i64::MAX)
    }

    pub fn is_read(&self) -> bool {
        self.input.is_none()
    }

    pub fn is_write(&self) -> bool {
        self.input.is_some()
    }

    /// Whether `self` completed strictly before `other` was invoked.
    pub fn happens_before(&self, other: &Operation) -> bool {
        self.end < other.start
    }

    /// Whether neither operation happens before the other.
    pub fn concurrent(&self, other: &Operation) -> bool {
        !self.happens_before(other) && !other.happens_before(self)
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let show = |value: &Option<Value>| match value {
            Some(value) => value.to_string(),
            None => String::from("-"),
        };
        write!(
            f,
            "{{input={}, output={}, start={}, end={}}}",
            show(&self.input),
            show(&self.output),
            self.start,
            self.end
        )
    }
}
