/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::{ballot::Ballot, command::Key, identifier::Identifier};

/// Sent by the leader of `key` (`from`) to ask `to` to run phase 1 for `key`.
///
/// The receiver only acts on it if its ballot for `key` is still `ballot`, so a hint that arrives after
/// a newer election never disturbs it.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct LeaderChange {
    pub key: Key,
    pub to: Identifier,
    pub from: Identifier,
    pub ballot: Ballot,
}
