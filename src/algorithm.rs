/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The thread that drives the consensus instances of a replica.
//!
//! The algorithm thread is the only thread that touches the [Registry](crate::partitioned::Registry) and
//! the [state machine](crate::state_machine::StateMachine). It pulls messages off the replica's inbound
//! queue one at a time and hands each to the registry, which routes it to the right instance. Instances
//! react by sending messages through the network (or, for messages addressed to the replica itself,
//! back onto the inbound queue) and by executing committed commands.
//!
//! The inbound queue is fed by:
//! 1. The [poller](crate::networking::receiving), with messages from other replicas.
//! 2. The [replica's](crate::replica::Replica) clients, with requests.
//! 3. The instances themselves, through their loopback.

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::networking::{messages::Message, network::Network};
use crate::partitioned::Registry;
use crate::state_machine::StateMachine;
use crate::types::identifier::Identifier;

// How long the thread blocks on an empty inbound queue before checking for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub(crate) struct Algorithm<S: StateMachine, N: Network + 'static> {
    registry: Registry<N>,
    state_machine: S,
    inbound: Receiver<(Identifier, Message)>,
    shutdown_signal: Receiver<()>,
}

impl<S: StateMachine, N: Network + 'static> Algorithm<S, N> {
    pub(crate) fn new(
        registry: Registry<N>,
        state_machine: S,
        inbound: Receiver<(Identifier, Message)>,
        shutdown_signal: Receiver<()>,
    ) -> Self {
        Self {
            registry,
            state_machine,
            inbound,
            shutdown_signal,
        }
    }

    pub(crate) fn start(mut self) -> JoinHandle<()> {
        thread::spawn(move || loop {
            match self.shutdown_signal.try_recv() {
                Ok(()) => return,
                Err(TryRecvError::Empty) => (),
                Err(TryRecvError::Disconnected) => {
                    panic!("Algorithm thread disconnected from main thread")
                }
            }

            match self.inbound.recv_timeout(POLL_INTERVAL) {
                Ok((origin, msg)) => {
                    self.registry
                        .on_receive_msg(origin, msg, &mut self.state_machine)
                }
                Err(RecvTimeoutError::Timeout) => (),
                // Every instance holds a loopback sender, so the queue outlives the thread.
                Err(RecvTimeoutError::Disconnected) => return,
            }
        })
    }
}
