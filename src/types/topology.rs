/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Cluster membership as seen by [quorum](crate::quorum) predicates.

use std::collections::{BTreeMap, BTreeSet};

use super::identifier::{Identifier, Zone};

/// The set of replicas in the cluster, and the counts derived from it: the total number of nodes `n`,
/// the number of zones `z`, and the number of nodes in each zone `npz`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Topology {
    members: BTreeSet<Identifier>,
    npz: BTreeMap<Zone, usize>,
}

impl Topology {
    pub fn new(members: impl IntoIterator<Item = Identifier>) -> Self {
        let members: BTreeSet<Identifier> = members.into_iter().collect();
        let mut npz = BTreeMap::new();
        for id in &members {
            *npz.entry(id.zone()).or_insert(0) += 1;
        }
        Self { members, npz }
    }

    /// The part of this topology that lives in `zone`.
    pub fn zone(&self, zone: Zone) -> Topology {
        Topology::new(self.members.iter().copied().filter(|id| id.zone() == zone))
    }

    /// Total number of nodes.
    pub fn n(&self) -> usize {
        self.members.len()
    }

    /// Number of zones.
    pub fn z(&self) -> usize {
        self.npz.len()
    }

    /// Number of nodes in `zone`, 0 if the zone is unknown.
    pub fn npz(&self, zone: Zone) -> usize {
        self.npz.get(&zone).copied().unwrap_or(0)
    }

    pub fn zones(&self) -> impl Iterator<Item = Zone> + '_ {
        self.npz.keys().copied()
    }

    pub fn members(&self) -> impl Iterator<Item = Identifier> + '_ {
        self.members.iter().copied()
    }

    pub fn contains(&self, id: &Identifier) -> bool {
        self.members.contains(id)
    }
}
