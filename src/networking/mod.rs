/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Pluggable peer-to-peer (P2P) networking.
//!
//! Library users provide the transport by implementing [Network](network::Network). Everything on top
//! of it, i.e., tagging phase messages with their partition, routing forwarded requests and replies,
//! and polling for incoming messages, lives in this module.

pub mod network;

pub mod messages;

pub mod replies;

pub(crate) mod receiving;

pub mod sending;
