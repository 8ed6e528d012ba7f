/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use rand::seq::SliceRandom;

use crate::types::identifier::{Identifier, Zone};

use super::messages::Message;

/// The peer-to-peer networking provider that a replica sends and receives [messages](Message) through.
///
/// Every sending method is fire-and-forget: it must not block on the receiver, and it is allowed to
/// drop messages. None of the sending methods deliver to the local replica itself, i.e., the peers
/// returned by [peers](Network::peers) do not include the local replica.
///
/// Only [peers](Network::peers), [send](Network::send), and [recv](Network::recv) must be implemented.
/// The multicast methods default to sending one copy to each selected peer.
pub trait Network: Clone + Send {
    /// The identifiers of every other replica in the cluster.
    fn peers(&self) -> Vec<Identifier>;

    /// Send a message to the specified peer without blocking.
    fn send(&mut self, peer: Identifier, message: Message);

    /// Receive a message from any peer. Returns immediately with a None if no message is available now.
    fn recv(&mut self) -> Option<(Identifier, Message)>;

    /// Send a message to all peers without blocking.
    fn broadcast(&mut self, message: Message) {
        for peer in self.peers() {
            self.send(peer, message.clone());
        }
    }

    /// Send a message to every peer in `zone`.
    fn multicast_zone(&mut self, zone: Zone, message: Message) {
        for peer in self.peers().into_iter().filter(|peer| peer.zone() == zone) {
            self.send(peer, message.clone());
        }
    }

    /// Send a message to `count` peers chosen at random.
    fn multicast_quorum(&mut self, count: usize, message: Message) {
        let peers = self.peers();
        let chosen: Vec<Identifier> = peers
            .choose_multiple(&mut rand::thread_rng(), count)
            .copied()
            .collect();
        self.multicast_nodes(&chosen, message);
    }

    /// Send a message to each of `peers`.
    fn multicast_nodes(&mut self, peers: &[Identifier], message: Message) {
        for peer in peers {
            self.send(*peer, message.clone());
        }
    }
}
