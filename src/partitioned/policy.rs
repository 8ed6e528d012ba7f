/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Leadership migration heuristics.
//!
//! A [Policy] watches which replicas the requests for a key come through and decides when leadership of
//! the key should move closer to them. Policies only affect performance: whatever they return, safety
//! is guaranteed by phase 1.

use std::collections::BTreeMap;

use crate::types::identifier::{Identifier, Zone};

pub trait Policy: Send {
    /// Record a request for the key that arrived through `id`. Returns the replica that should become
    /// the key's leader, if leadership should move.
    fn hit(&mut self, id: Identifier) -> Option<Identifier>;
}

/// Selects and parameterizes a [Policy].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MigrationPolicy {
    /// Move after `threshold` consecutive requests from the same zone.
    Consecutive { threshold: usize },
    /// Every `window` requests, move to the zone that sent more than half of them.
    Majority { window: usize },
}

impl MigrationPolicy {
    pub fn build(&self) -> Box<dyn Policy> {
        match *self {
            MigrationPolicy::Consecutive { threshold } => Box::new(Consecutive::new(threshold)),
            MigrationPolicy::Majority { window } => Box::new(Majority::new(window)),
        }
    }
}

pub struct Consecutive {
    threshold: usize,
    last: Option<Identifier>,
    hits: usize,
}

impl Consecutive {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            last: None,
            hits: 0,
        }
    }
}

impl Policy for Consecutive {
    fn hit(&mut self, id: Identifier) -> Option<Identifier> {
        match self.last {
            Some(last) if last.zone() == id.zone() => self.hits += 1,
            _ => self.hits = 1,
        }
        self.last = Some(id);

        if self.hits >= self.threshold {
            self.hits = 0;
            Some(id)
        } else {
            None
        }
    }
}

pub struct Majority {
    window: usize,
    hits: BTreeMap<Zone, (usize, Identifier)>,
    total: usize,
}

impl Majority {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            hits: BTreeMap::new(),
            total: 0,
        }
    }
}

impl Policy for Majority {
    fn hit(&mut self, id: Identifier) -> Option<Identifier> {
        let zone = self.hits.entry(id.zone()).or_insert((0, id));
        zone.0 += 1;
        zone.1 = id;
        self.total += 1;

        if self.total < self.window {
            return None;
        }

        let winner = self
            .hits
            .values()
            .find(|(hits, _)| *hits * 2 > self.total)
            .map(|(_, id)| *id);
        self.hits.clear();
        self.total = 0;
        winner
    }
}
