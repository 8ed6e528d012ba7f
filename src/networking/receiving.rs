/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions for receiving messages from the P2P network.

use std::{
    sync::mpsc::{Receiver, Sender, TryRecvError},
    thread::{self, JoinHandle},
};

use crate::types::identifier::Identifier;

use super::{messages::Message, network::Network};

/// Spawn the poller thread, which polls the [`Network`] for messages and pushes them onto the replica's
/// inbound queue.
///
/// The inbound queue is the only queue the [algorithm thread](crate::algorithm) reads from. Besides the
/// poller, it is fed by the replica's clients and by the loopback of its own consensus instances.
pub(crate) fn start_polling<N: Network + 'static>(
    mut network: N,
    inbound: Sender<(Identifier, Message)>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) => return,
            Err(TryRecvError::Empty) => (),
            Err(TryRecvError::Disconnected) => {
                panic!("Poller thread disconnected from main thread")
            }
        }

        if let Some((origin, msg)) = network.recv() {
            // The algorithm thread stops before the poller does.
            let _ = inbound.send((origin, msg));
        } else {
            thread::yield_now()
        }
    })
}
