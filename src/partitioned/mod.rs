/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Running many [Paxos](crate::paxos::Paxos) instances on one replica.
//!
//! A replica with a single instance serializes every command through one leader. Partitioning the key
//! space gives each partition its own instance, with its own ballot, log, and leader, so that
//! leadership of different keys can live on different replicas:
//! - [`Partitioning::PerKey`](registry::Partitioning::PerKey) runs one instance per key, created the
//!   first time a request or message for the key shows up.
//! - [`Partitioning::Groups`](registry::Partitioning::Groups) maps keys onto a fixed number of groups,
//!   each run among the replicas of the local zone.
//!
//! Phase messages travel tagged with their [partition](crate::types::partition::Partition), so the
//! [Registry](registry::Registry) of the receiving replica can route them to the matching instance.
//!
//! ## Leadership migration
//!
//! With per-key instances, a key is best led from the zone its clients are in. The leader of a key
//! feeds the origin of every request into a [migration policy](policy::Policy); when the policy
//! nominates a replica in another zone, the leader sends it a [LeaderChange](messages::LeaderChange),
//! which makes it run phase 1 for the key, provided its ballot for the key has not moved on since.

pub mod messages;

pub mod policy;

pub mod registry;
pub use registry::{Partitioning, Registry};
