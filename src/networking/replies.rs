/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The table of clients waiting on a replica for their replies.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        mpsc::{self, Receiver, Sender},
        Arc, Mutex, MutexGuard,
    },
};

use crate::types::request::{Reply, Ticket};

/// Maps the [ticket](Ticket) of every request that a replica received from its clients to the channel
/// its client is waiting on. Each channel is used exactly once: [deliver](ReplyRegistry::deliver)
/// removes it.
///
/// Clones share the same table.
#[derive(Clone, Default)]
pub struct ReplyRegistry {
    next_ticket: Arc<AtomicU64>,
    waiting: Arc<Mutex<HashMap<Ticket, Sender<Reply>>>>,
}

impl ReplyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh ticket and the receiving end its reply will arrive on.
    pub fn register(&self) -> (Ticket, Receiver<Reply>) {
        let ticket = Ticket::new(self.next_ticket.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel();
        self.lock().insert(ticket, sender);
        (ticket, receiver)
    }

    /// Hand `reply` to the client waiting on `ticket`. Returns false if no client is waiting on it.
    pub fn deliver(&self, ticket: Ticket, reply: Reply) -> bool {
        match self.lock().remove(&ticket) {
            // The client may have given up waiting.
            Some(sender) => {
                let _ = sender.send(reply);
                true
            }
            None => false,
        }
    }

    /// Number of requests still waiting for a reply.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Ticket, Sender<Reply>>> {
        self.waiting
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
