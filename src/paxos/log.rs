/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The per-slot records of a Paxos instance's log.

use std::sync::Arc;

use crate::{
    quorum::Quorum,
    types::{ballot::Ballot, command::Command, request::Request, topology::Topology},
};

/// What an instance knows about one slot.
///
/// Once `commit` is set, `command` never changes. Until then it may be replaced by the command of a
/// higher ballot. Executed entries are kept, without their request.
#[derive(Clone, Debug)]
pub(crate) struct Entry {
    /// The ballot this slot was last proposed or accepted under.
    pub(crate) ballot: Ballot,
    pub(crate) command: Command,
    pub(crate) commit: bool,
    /// The client request waiting on this slot, if this replica proposed it.
    pub(crate) request: Option<Request>,
    /// Phase 2 acknowledgements for `ballot`.
    pub(crate) quorum: Quorum,
}

impl Entry {
    pub(crate) fn new(ballot: Ballot, command: Command, topology: Arc<Topology>) -> Self {
        Self {
            ballot,
            command,
            commit: false,
            request: None,
            quorum: Quorum::new(topology),
        }
    }
}
