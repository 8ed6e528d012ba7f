/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions and types for sending messages to the P2P network.

use std::sync::mpsc::Sender;

use crate::{
    paxos::messages::PaxosMessage,
    types::{
        identifier::{Identifier, Zone},
        partition::Partition,
        request::{Reply, Request},
    },
};

use super::{
    messages::{Message, RoutedReply},
    network::Network,
    replies::ReplyRegistry,
};

/// Everything a [Paxos](crate::paxos::Paxos) instance sends out of itself goes through its transport.
///
/// A transport decides how a phase message reaches its peers (which replicas, tagged with which
/// partition) and how a request or a reply reaches the replica that should handle it. All methods are
/// fire-and-forget.
pub trait Transport {
    /// Send a phase message to every other replica taking part in the instance.
    fn broadcast(&mut self, message: PaxosMessage);

    /// Send a phase message to `count` other replicas taking part in the instance.
    fn multicast_quorum(&mut self, count: usize, message: PaxosMessage);

    fn send(&mut self, peer: Identifier, message: PaxosMessage);

    /// Hand a request over to `leader` without waiting for it to be handled.
    fn forward(&mut self, leader: Identifier, request: Request);

    /// Deliver the reply to `request` to the client waiting on it.
    fn reply(&mut self, request: Request, reply: Reply);
}

/// Which replicas a [SenderHandle] broadcasts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Scope {
    Everyone,
    Zone(Zone),
}

/// [Transport] for an instance running inside a replica, over a [Network].
///
/// Phase messages are wrapped in an [Envelope](super::messages::Envelope) carrying the instance's
/// partition, so that the receiving replica can route them to the matching instance.
#[derive(Clone)]
pub struct SenderHandle<N: Network> {
    me: Identifier,
    partition: Partition,
    scope: Scope,
    network: N,
    loopback: Sender<(Identifier, Message)>,
    replies: ReplyRegistry,
}

impl<N: Network> SenderHandle<N> {
    pub(crate) fn new(
        me: Identifier,
        partition: Partition,
        scope: Scope,
        network: N,
        loopback: Sender<(Identifier, Message)>,
        replies: ReplyRegistry,
    ) -> Self {
        Self {
            me,
            partition,
            scope,
            network,
            loopback,
            replies,
        }
    }

    pub(crate) fn send_message<S: Into<Message>>(&mut self, peer: Identifier, message: S) {
        if peer == self.me {
            let _ = self.loopback.send((self.me, message.into()));
        } else {
            self.network.send(peer, message.into())
        }
    }
}

impl<N: Network> Transport for SenderHandle<N> {
    fn broadcast(&mut self, message: PaxosMessage) {
        let message = Message::paxos(self.partition, message);
        match self.scope {
            Scope::Everyone => self.network.broadcast(message),
            Scope::Zone(zone) => self.network.multicast_zone(zone, message),
        }
    }

    fn multicast_quorum(&mut self, count: usize, message: PaxosMessage) {
        let message = Message::paxos(self.partition, message);
        match self.scope {
            Scope::Everyone => self.network.multicast_quorum(count, message),
            // Zone-local instances are small enough to always include the whole zone.
            Scope::Zone(zone) => self.network.multicast_zone(zone, message),
        }
    }

    fn send(&mut self, peer: Identifier, message: PaxosMessage) {
        let message = Message::paxos(self.partition, message);
        self.send_message(peer, message)
    }

    fn forward(&mut self, leader: Identifier, request: Request) {
        self.send_message(leader, Message::Request(request))
    }

    fn reply(&mut self, request: Request, reply: Reply) {
        if request.origin == self.me {
            if !self.replies.deliver(request.ticket, reply) {
                log::debug!("No client waiting on ticket {:?} for {}", request.ticket, request.command);
            }
        } else {
            let routed = RoutedReply {
                ticket: request.ticket,
                reply,
            };
            self.network.send(request.origin, Message::Reply(routed))
        }
    }
}
