/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that are used across multiple components of a replica.
//!
//! Types specific to single components, e.g., the phase messages of a Paxos instance, can be found in
//! the modules of those components, e.g., [`crate::paxos::messages`].

pub mod identifier;

pub mod ballot;

pub mod command;

pub mod request;

pub mod topology;

pub mod partition;
