/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Node identities.
//!
//! Every replica is identified by the zone (datacenter, region) it runs in and its index within that
//! zone. Identifiers are written as `"zone.node"`, e.g., `"1.2"` is the second node of zone 1.
//!
//! Zone and node are 16-bit so that an identifier always fits in the low half of a
//! [ballot](crate::types::ballot::Ballot). The identifier `0.0` is what the zero ballot decodes to, so
//! it must not be assigned to a replica.

use borsh::{BorshDeserialize, BorshSerialize};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    num::ParseIntError,
    str::FromStr,
};

/// A zone number.
pub type Zone = u16;

/// The identity of a replica: `(zone, node)`. Ordered by zone first, then node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, BorshSerialize, BorshDeserialize)]
pub struct Identifier {
    zone: Zone,
    node: u16,
}

impl Identifier {
    pub const fn new(zone: Zone, node: u16) -> Self {
        Self { zone, node }
    }

    pub const fn zone(&self) -> Zone {
        self.zone
    }

    pub const fn node(&self) -> u16 {
        self.node
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.zone, self.node)
    }
}

impl FromStr for Identifier {
    type Err = ParseIdentifierError;

    /// Parse an identifier from its `"zone.node"` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (zone, node) = s
            .split_once('.')
            .ok_or_else(|| ParseIdentifierError::Malformed(s.to_string()))?;
        Ok(Identifier::new(zone.trim().parse()?, node.trim().parse()?))
    }
}

/// Returned when a string cannot be parsed into an [Identifier] or a [Ballot](crate::types::ballot::Ballot).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseIdentifierError {
    /// The string does not have the expected number of `.`-separated components.
    Malformed(String),
    /// One of the components is not a number in range.
    InvalidNumber(ParseIntError),
}

impl Display for ParseIdentifierError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ParseIdentifierError::Malformed(s) => write!(f, "malformed identifier {:?}", s),
            ParseIdentifierError::InvalidNumber(err) => write!(f, "invalid identifier component: {}", err),
        }
    }
}

impl Error for ParseIdentifierError {}

impl From<ParseIntError> for ParseIdentifierError {
    fn from(value: ParseIntError) -> Self {
        ParseIdentifierError::InvalidNumber(value)
    }
}
