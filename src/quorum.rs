/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Acknowledgement counting and the quorum systems evaluated over it.
//!
//! A [Quorum] is created empty when a phase starts, ACKed as replies arrive, and [reset](Quorum::reset)
//! when a new round begins. Whether "enough" replicas have replied is decided by one of the predicates
//! below, evaluated against the cluster [Topology] that the quorum was constructed with.
//!
//! Which predicate a [Paxos](crate::paxos::Paxos) instance uses for its phase 1 and phase 2 is chosen by
//! configuration, in the form of a [QuorumRule].
//!
//! ## Grid quorums
//!
//! Treating each zone as a row of a grid, the flexible grid predicates tolerate `fz` failed zones and
//! `fd` (or `fn`) failed nodes per zone:
//! - [fgrid_q1](Quorum::fgrid_q1) requires at least `z - fz` zones, each with at least `npz - fd` ACKs.
//! - [fgrid_q2](Quorum::fgrid_q2) requires at least `fz + 1` zones, each with at least `fd + 1` ACKs.
//!
//! Any Q1 quorum intersects any Q2 quorum, which is all that Paxos needs from its two phases.

use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

use crate::types::{
    identifier::{Identifier, Zone},
    topology::Topology,
};

/// Records which replicas acknowledged (or rejected) some action.
#[derive(Clone, Debug)]
pub struct Quorum {
    topology: Arc<Topology>,
    acks: HashSet<Identifier>,
    zones: BTreeMap<Zone, usize>,
    nacks: HashSet<Identifier>,
}

impl Quorum {
    pub fn new(topology: Arc<Topology>) -> Self {
        Self {
            topology,
            acks: HashSet::new(),
            zones: BTreeMap::new(),
            nacks: HashSet::new(),
        }
    }

    /// Count `id` as having acknowledged. ACKing the same identifier more than once has no effect.
    pub fn ack(&mut self, id: Identifier) {
        if self.acks.insert(id) {
            *self.zones.entry(id.zone()).or_insert(0) += 1;
        }
    }

    /// Record that `id` rejected. Rejections are not consumed by any predicate.
    pub fn nack(&mut self, id: Identifier) {
        self.nacks.insert(id);
    }

    pub fn reset(&mut self) {
        self.acks.clear();
        self.zones.clear();
        self.nacks.clear();
    }

    /// Number of distinct identifiers that acknowledged.
    pub fn size(&self) -> usize {
        self.acks.len()
    }

    pub fn nack_count(&self) -> usize {
        self.nacks.len()
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Whether all of `ids` have acknowledged.
    pub fn have_ids(&self, ids: &[Identifier]) -> bool {
        ids.iter().all(|id| self.acks.contains(id))
    }

    // Number of zones that have at least `threshold(zone)` ACKs, counting zones without any.
    fn zones_with(&self, threshold: impl Fn(Zone) -> usize) -> usize {
        self.topology
            .zones()
            .filter(|zone| self.zone_size(*zone) >= threshold(*zone))
            .count()
    }

    pub fn majority(&self) -> bool {
        self.size() > self.topology.n() / 2
    }

    pub fn fast_quorum(&self) -> bool {
        self.size() >= self.topology.n() * 3 / 4
    }

    pub fn all(&self) -> bool {
        self.size() == self.topology.n()
    }

    /// At least one ACK from every zone.
    pub fn all_zones(&self) -> bool {
        self.zones.len() == self.topology.z()
    }

    /// A majority of the nodes of some zone.
    pub fn zone_majority(&self) -> bool {
        self.zones
            .iter()
            .any(|(zone, acks)| *acks > self.topology.npz(*zone) / 2)
    }

    /// A grid row is one node from each zone.
    pub fn grid_row(&self) -> bool {
        self.all_zones()
    }

    /// A grid column is every node of some zone.
    pub fn grid_column(&self) -> bool {
        self.zones
            .iter()
            .any(|(zone, acks)| *acks == self.topology.npz(*zone))
    }

    pub fn fgrid_q1(&self, fz: usize, fd: usize) -> bool {
        let zones = self.zones_with(|zone| self.topology.npz(zone).saturating_sub(fd));
        zones >= self.topology.z().saturating_sub(fz)
    }

    pub fn fgrid_q2(&self, fz: usize, fd: usize) -> bool {
        self.zones_with(|_| fd + 1) >= fz + 1
    }

    /// A zone majority in a majority of zones.
    pub fn sgrid_q1(&self) -> bool {
        let zones = self
            .zones
            .iter()
            .filter(|(zone, acks)| **acks > self.topology.npz(**zone) / 2)
            .count();
        zones > self.topology.z() / 2
    }

    pub fn sgrid_q2(&self, fz: usize, fn_: usize) -> bool {
        self.zones_with(|_| fn_ + 1) >= fz + 1
    }

    /// Number of ACKs from `zone`.
    pub fn zone_size(&self, zone: Zone) -> usize {
        self.zones.get(&zone).copied().unwrap_or(0)
    }
}

/// Names one of the [Quorum] predicates, with its parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum QuorumRule {
    #[default]
    Majority,
    FastQuorum,
    All,
    AllZones,
    ZoneMajority,
    GridRow,
    GridColumn,
    FGridQ1 { fz: usize, fd: usize },
    FGridQ2 { fz: usize, fd: usize },
    SGridQ1,
    SGridQ2 { fz: usize, fn_: usize },
}

impl QuorumRule {
    pub fn is_satisfied(&self, quorum: &Quorum) -> bool {
        match *self {
            QuorumRule::Majority => quorum.majority(),
            QuorumRule::FastQuorum => quorum.fast_quorum(),
            QuorumRule::All => quorum.all(),
            QuorumRule::AllZones => quorum.all_zones(),
            QuorumRule::ZoneMajority => quorum.zone_majority(),
            QuorumRule::GridRow => quorum.grid_row(),
            QuorumRule::GridColumn => quorum.grid_column(),
            QuorumRule::FGridQ1 { fz, fd } => quorum.fgrid_q1(fz, fd),
            QuorumRule::FGridQ2 { fz, fd } => quorum.fgrid_q2(fz, fd),
            QuorumRule::SGridQ1 => quorum.sgrid_q1(),
            QuorumRule::SGridQ2 { fz, fn_ } => quorum.sgrid_q2(fz, fn_),
        }
    }
}
