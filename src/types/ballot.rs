/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Ballots and slots.

use borsh::{BorshDeserialize, BorshSerialize};
use std::{
    fmt::{self, Display, Formatter},
    ops::Add,
    str::FromStr,
};

use super::identifier::{Identifier, ParseIdentifierError};

/// A proposal generation number tied to the identity of the replica that proposed it.
///
/// The 64 bits are laid out as `round (32) | zone (16) | node (16)`, so comparing ballots numerically
/// compares rounds first and breaks ties by identifier. [Ballot::ZERO] means that no leader has been
/// elected yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, BorshSerialize, BorshDeserialize)]
pub struct Ballot(u64);

impl Ballot {
    pub const ZERO: Ballot = Ballot(0);

    pub const fn new(round: u32, id: Identifier) -> Self {
        Self(((round as u64) << 32) | ((id.zone() as u64) << 16) | id.node() as u64)
    }

    pub const fn int(&self) -> u64 {
        self.0
    }

    pub const fn round(&self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// The identifier of the replica that produced this ballot.
    pub const fn id(&self) -> Identifier {
        Identifier::new((self.0 >> 16) as u16, self.0 as u16)
    }

    /// Move to the next round, owned by `id`. Rounds stop at `u32::MAX`: from there on, the next ballot
    /// is only higher if `id` is.
    pub fn next(&mut self, id: Identifier) {
        if self.round() == u32::MAX {
            log::warn!("Ballot {} is in the last round", self);
        }
        *self = Ballot::new(self.round().saturating_add(1), id)
    }
}

impl Display for Ballot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.round(), self.id())
    }
}

impl FromStr for Ballot {
    type Err = ParseIdentifierError;

    /// Parse a ballot from its `"round.zone.node"` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (round, id) = s
            .split_once('.')
            .ok_or_else(|| ParseIdentifierError::Malformed(s.to_string()))?;
        Ok(Ballot::new(round.trim().parse()?, id.parse()?))
    }
}

/// Position of a command in the replicated log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, BorshSerialize, BorshDeserialize)]
pub struct Slot(u64);

impl Slot {
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    pub const fn int(&self) -> u64 {
        self.0
    }
}

impl Add<u64> for Slot {
    type Output = Slot;
    fn add(self, rhs: u64) -> Self::Output {
        Slot(self.0 + rhs)
    }
}

impl Display for Slot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}
