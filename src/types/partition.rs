/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use borsh::{BorshDeserialize, BorshSerialize};
use std::fmt::{self, Display, Formatter};

use super::command::Key;

/// Names the consensus instance that a phase message or an event belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, BorshSerialize, BorshDeserialize)]
pub enum Partition {
    /// The only instance of a replica that orders all keys together.
    Whole,
    /// The instance that orders the commands on a single key.
    Key(Key),
    /// The instance that orders the commands on a static group of keys.
    Group(u64),
}

impl Display for Partition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Partition::Whole => write!(f, "*"),
            Partition::Key(key) => write!(f, "k{}", key),
            Partition::Group(group) => write!(f, "g{}", group),
        }
    }
}
