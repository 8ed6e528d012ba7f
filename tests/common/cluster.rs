//! A deterministic, single-threaded cluster of [`Paxos`] instances.
//!
//! Messages sent by the instances go into one FIFO queue, and a test decides when each is delivered,
//! dropped, or held back. This makes it possible to replay exact interleavings, e.g., two leaders
//! proposing for the same slot.

use std::{
    cell::RefCell,
    collections::{BTreeMap, VecDeque},
    rc::Rc,
    sync::Arc,
};

use paxos_rs::{
    networking::sending::Transport,
    paxos::{messages::PaxosMessage, Paxos, PaxosConfiguration},
    types::{
        ballot::{Ballot, Slot},
        command::Command,
        identifier::Identifier,
        partition::Partition,
        request::{Reply, Request, Ticket},
        topology::Topology,
    },
};

use super::mem_db::MemDB;

#[derive(Clone, Debug)]
pub(crate) enum Delivery {
    Paxos(PaxosMessage),
    Request(Request),
}

#[derive(Clone, Debug)]
pub(crate) struct InFlight {
    pub(crate) from: Identifier,
    pub(crate) to: Identifier,
    pub(crate) delivery: Delivery,
}

impl InFlight {
    pub(crate) fn paxos(&self) -> Option<&PaxosMessage> {
        match &self.delivery {
            Delivery::Paxos(msg) => Some(msg),
            Delivery::Request(_) => None,
        }
    }

    pub(crate) fn is_accept_for(&self, slot: Slot) -> bool {
        matches!(self.paxos(), Some(PaxosMessage::Accept(accept)) if accept.slot == slot)
    }

    pub(crate) fn is_accepted_for(&self, slot: Slot) -> bool {
        matches!(self.paxos(), Some(PaxosMessage::Accepted(accepted)) if accepted.slot == slot)
    }
}

/// A reply some replica produced for a request.
#[derive(Clone, Debug)]
pub(crate) struct ReplyRecord {
    pub(crate) at: Identifier,
    pub(crate) request: Request,
    pub(crate) reply: Reply,
}

/// A [`Transport`] that pushes everything onto the queue of its [`Cluster`].
pub(crate) struct QueueTransport {
    me: Identifier,
    peers: Vec<Identifier>,
    queue: Rc<RefCell<VecDeque<InFlight>>>,
    replies: Rc<RefCell<Vec<ReplyRecord>>>,
}

impl QueueTransport {
    fn push(&self, to: Identifier, delivery: Delivery) {
        self.queue.borrow_mut().push_back(InFlight {
            from: self.me,
            to,
            delivery,
        });
    }
}

impl Transport for QueueTransport {
    fn broadcast(&mut self, message: PaxosMessage) {
        for peer in &self.peers {
            self.push(*peer, Delivery::Paxos(message.clone()));
        }
    }

    // Always the first `count` peers, so that tests know who was left out.
    fn multicast_quorum(&mut self, count: usize, message: PaxosMessage) {
        for peer in self.peers.iter().take(count) {
            self.push(*peer, Delivery::Paxos(message.clone()));
        }
    }

    fn send(&mut self, peer: Identifier, message: PaxosMessage) {
        self.push(peer, Delivery::Paxos(message));
    }

    fn forward(&mut self, leader: Identifier, request: Request) {
        self.push(leader, Delivery::Request(request));
    }

    fn reply(&mut self, request: Request, reply: Reply) {
        self.replies.borrow_mut().push(ReplyRecord {
            at: self.me,
            request,
            reply,
        });
    }
}

pub(crate) struct Cluster {
    nodes: BTreeMap<Identifier, Paxos<QueueTransport>>,
    dbs: BTreeMap<Identifier, MemDB>,
    queue: Rc<RefCell<VecDeque<InFlight>>>,
    replies: Rc<RefCell<Vec<ReplyRecord>>>,
    next_ticket: u64,
}

impl Cluster {
    pub(crate) fn new(ids: &[Identifier]) -> Cluster {
        Cluster::with_options(ids, false, false)
    }

    pub(crate) fn with_options(ids: &[Identifier], thrifty: bool, reply_when_commit: bool) -> Cluster {
        let topology = Arc::new(Topology::new(ids.iter().copied()));
        let queue = Rc::new(RefCell::new(VecDeque::new()));
        let replies = Rc::new(RefCell::new(Vec::new()));

        let mut nodes = BTreeMap::new();
        let mut dbs = BTreeMap::new();
        for &me in ids {
            let config = PaxosConfiguration::builder()
                .me(me)
                .topology(topology.clone())
                .thrifty(thrifty)
                .reply_when_commit(reply_when_commit)
                .build();
            let transport = QueueTransport {
                me,
                peers: ids.iter().copied().filter(|id| *id != me).collect(),
                queue: queue.clone(),
                replies: replies.clone(),
            };
            nodes.insert(me, Paxos::new(config, Partition::Whole, transport, None));
            dbs.insert(me, MemDB::new());
        }

        Cluster {
            nodes,
            dbs,
            queue,
            replies,
            next_ticket: 0,
        }
    }

    pub(crate) fn node(&self, id: Identifier) -> &Paxos<QueueTransport> {
        &self.nodes[&id]
    }

    pub(crate) fn node_mut(&mut self, id: Identifier) -> &mut Paxos<QueueTransport> {
        self.nodes.get_mut(&id).unwrap()
    }

    pub(crate) fn db(&self, id: Identifier) -> &MemDB {
        &self.dbs[&id]
    }

    pub(crate) fn ids(&self) -> Vec<Identifier> {
        self.nodes.keys().copied().collect()
    }

    /// Make `id` start phase 1.
    pub(crate) fn p1a(&mut self, id: Identifier) {
        let db = self.dbs.get_mut(&id).unwrap();
        self.nodes.get_mut(&id).unwrap().p1a(db);
    }

    /// Hand `command` to `at` as if a client sent it there. Returns the request.
    pub(crate) fn submit(&mut self, at: Identifier, command: Command) -> Request {
        let request = Request::new(command, at, Ticket::new(self.next_ticket));
        self.next_ticket += 1;
        self.route(at, request.clone());
        request
    }

    // What a replica does with a request: handle it if it leads or nobody does yet, forward it otherwise.
    fn route(&mut self, at: Identifier, request: Request) {
        let db = self.dbs.get_mut(&at).unwrap();
        let paxos = self.nodes.get_mut(&at).unwrap();
        if paxos.is_leader() || paxos.ballot() == Ballot::ZERO {
            paxos.handle_request(request, db);
        } else {
            paxos.forward(request);
        }
    }

    pub(crate) fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    pub(crate) fn peek(&self) -> Option<InFlight> {
        self.queue.borrow().front().cloned()
    }

    /// Deliver the oldest message. Returns false if there was none.
    pub(crate) fn step(&mut self) -> bool {
        let in_flight = match self.queue.borrow_mut().pop_front() {
            Some(in_flight) => in_flight,
            None => return false,
        };
        log::debug!("{} -> {}: {:?}", in_flight.from, in_flight.to, in_flight.delivery);

        match in_flight.delivery {
            Delivery::Paxos(msg) => {
                let db = self.dbs.get_mut(&in_flight.to).unwrap();
                self.nodes.get_mut(&in_flight.to).unwrap().on_receive_msg(msg, db);
            }
            Delivery::Request(request) => self.route(in_flight.to, request),
        }
        true
    }

    /// Deliver messages until none are left.
    pub(crate) fn deliver_all(&mut self) {
        let mut steps = 0;
        while self.step() {
            steps += 1;
            assert!(steps < 100_000, "messages kept flowing");
        }
    }

    /// Remove every queued message matching `predicate`, returning them.
    pub(crate) fn drop_where(&mut self, predicate: impl Fn(&InFlight) -> bool) -> Vec<InFlight> {
        let mut queue = self.queue.borrow_mut();
        let (dropped, kept): (Vec<InFlight>, Vec<InFlight>) = queue.drain(..).partition(|m| predicate(m));
        queue.extend(kept);
        dropped
    }

    pub(crate) fn drop_all(&mut self) -> Vec<InFlight> {
        self.drop_where(|_| true)
    }

    /// Queue `message` as if `from` had sent it to `to`.
    pub(crate) fn inject(&mut self, from: Identifier, to: Identifier, message: PaxosMessage) {
        self.queue.borrow_mut().push_back(InFlight {
            from,
            to,
            delivery: Delivery::Paxos(message),
        });
    }

    /// Put previously dropped messages back at the end of the queue.
    pub(crate) fn requeue(&mut self, messages: Vec<InFlight>) {
        self.queue.borrow_mut().extend(messages);
    }

    pub(crate) fn replies(&self) -> Vec<ReplyRecord> {
        self.replies.borrow().clone()
    }

    /// Replies produced for `request`.
    pub(crate) fn replies_to(&self, request: &Request) -> Vec<ReplyRecord> {
        self.replies
            .borrow()
            .iter()
            .filter(|record| record.request.ticket == request.ticket && record.request.origin == request.origin)
            .cloned()
            .collect()
    }
}
