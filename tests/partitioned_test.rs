/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Tests for the registry of per-partition consensus instances, the leader change hint, and the
//! migration policies.
//!
//! The registries are driven on the test thread: [Node::pump] hands every message waiting in any inbox
//! to its registry until the network goes quiet.

mod common;

use std::sync::mpsc::{self, Receiver, TryRecvError};

use log::LevelFilter;
use paxos_rs::{
    networking::{messages::Message, network::Network, replies::ReplyRegistry},
    partitioned::{
        messages::LeaderChange,
        policy::{Consecutive, Majority, MigrationPolicy, Policy},
        Partitioning, Registry,
    },
    replica::{Configuration, ReadMode},
    types::{
        ballot::Ballot,
        command::{Command, Key, Value},
        identifier::Identifier,
        partition::Partition,
        request::{Reply, Request, Ticket},
    },
};

use common::{
    logging::setup_logger,
    mem_db::MemDB,
    network::{mock_network, NetworkStub},
};

const CLIENT: Identifier = Identifier::new(9, 9);

struct Node {
    registry: Registry<NetworkStub>,
    network: NetworkStub,
    loopback: Receiver<(Identifier, Message)>,
    db: MemDB,
    replies: ReplyRegistry,
}

impl Node {
    fn me(&self) -> Identifier {
        self.registry.me()
    }

    // Hand over at most one pending message. Returns whether there was one.
    fn deliver_one(&mut self) -> bool {
        let next = match self.loopback.try_recv() {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty) => self.network.recv(),
            Err(TryRecvError::Disconnected) => panic!("loopback disconnected"),
        };
        match next {
            Some((origin, msg)) => {
                self.registry.on_receive_msg(origin, msg, &mut self.db);
                true
            }
            None => false,
        }
    }

    fn submit(&mut self, command: Command) -> Receiver<Reply> {
        let (ticket, reply) = self.replies.register();
        let request = Request::new(command, self.me(), ticket);
        self.registry.handle_request(request, &mut self.db);
        reply
    }

    /// Deliver messages round-robin across `nodes` until none are left.
    fn pump(nodes: &mut [Node]) {
        let mut rounds = 0;
        loop {
            let mut delivered = false;
            for node in nodes.iter_mut() {
                delivered |= node.deliver_one();
            }
            if !delivered {
                return;
            }
            rounds += 1;
            assert!(rounds < 100_000, "messages kept flowing");
        }
    }
}

fn cluster(ids: &[Identifier], configure: impl Fn(Identifier) -> Configuration) -> Vec<Node> {
    mock_network(ids.iter().copied())
        .into_iter()
        .zip(ids.iter())
        .map(|(network, &me)| {
            let (loopback_sender, loopback) = mpsc::channel();
            let replies = ReplyRegistry::new();
            let registry = Registry::new(configure(me), network.clone(), loopback_sender, replies.clone(), None);
            Node {
                registry,
                network,
                loopback,
                db: MemDB::new(),
                replies,
            }
        })
        .collect()
}

fn per_key(ids: &[Identifier], me: Identifier) -> Configuration {
    Configuration::builder()
        .me(me)
        .peers(ids.to_vec())
        .partitioning(Partitioning::PerKey)
        .build()
}

fn put(key: u64, value: &str, command_id: u64) -> Command {
    Command::put(Key::new(key), Value::from(value), CLIENT, command_id)
}

fn three_replicas() -> Vec<Identifier> {
    vec![Identifier::new(1, 1), Identifier::new(1, 2), Identifier::new(1, 3)]
}

#[test]
fn partition_of_test() {
    setup_logger(LevelFilter::Debug);
    assert_eq!(Partitioning::Single.partition_of(Key::new(42)), Partition::Whole);
    assert_eq!(Partitioning::PerKey.partition_of(Key::new(42)), Partition::Key(Key::new(42)));
    assert_eq!(Partitioning::Groups(4).partition_of(Key::new(42)), Partition::Group(2));
    assert_eq!(Partitioning::Groups(0).partition_of(Key::new(42)), Partition::Group(0));
    assert_eq!(Partition::Key(Key::new(7)).to_string(), "k7");
    assert_eq!(Partition::Group(3).to_string(), "g3");
    assert_eq!(Partition::Whole.to_string(), "*");
}

#[test]
fn per_key_instances_have_their_own_leaders_test() {
    setup_logger(LevelFilter::Debug);
    let ids = three_replicas();
    let mut nodes = cluster(&ids, |me| per_key(&ids, me));

    // 1. Before any traffic, no instance exists.
    log::debug!("Step 1: Checking that instances are created lazily.");
    assert_eq!(nodes[0].registry.partitions().count(), 0);

    // 2. Key 1 is written through the first replica, key 2 through the second.
    log::debug!("Step 2: Writing two keys through two replicas.");
    let first = nodes[0].submit(put(1, "one", 1));
    let second = nodes[1].submit(put(2, "two", 2));
    Node::pump(&mut nodes);

    // 3. Each replica leads the key it was written through, and every replica has both instances.
    log::debug!("Step 3: Checking leaders.");
    assert_eq!(first.try_recv().unwrap().value, None);
    assert_eq!(second.try_recv().unwrap().value, None);
    for node in &nodes {
        assert_eq!(node.registry.partitions().count(), 2);
        let key1 = node.registry.instance(Partition::Key(Key::new(1))).unwrap();
        let key2 = node.registry.instance(Partition::Key(Key::new(2))).unwrap();
        assert_eq!(key1.leader(), ids[0]);
        assert_eq!(key2.leader(), ids[1]);
        assert_eq!(node.db.get(Key::new(1)), Some(Value::from("one")));
        assert_eq!(node.db.get(Key::new(2)), Some(Value::from("two")));
    }
    assert!(nodes[0].registry.instance(Partition::Key(Key::new(1))).unwrap().is_active());
    assert!(!nodes[0].registry.instance(Partition::Key(Key::new(2))).unwrap().is_active());
}

#[test]
fn request_is_forwarded_to_key_leader_and_reply_routed_back_test() {
    setup_logger(LevelFilter::Debug);
    let ids = three_replicas();
    let mut nodes = cluster(&ids, |me| per_key(&ids, me));

    // 1. The first replica becomes the leader of key 3.
    log::debug!("Step 1: Electing a leader for key 3.");
    nodes[0].submit(put(3, "a", 1));
    Node::pump(&mut nodes);

    // 2. A client of the third replica writes key 3. The request is forwarded to the leader.
    log::debug!("Step 2: Writing key 3 through a follower.");
    let reply = nodes[2].submit(put(3, "b", 2));
    assert_eq!(nodes[2].replies.pending(), 1);
    Node::pump(&mut nodes);

    // 3. The reply came back to the replica the client is waiting on, and leadership did not move.
    log::debug!("Step 3: Checking the reply.");
    let reply = reply.try_recv().unwrap();
    assert_eq!(reply.value, Some(Value::from("a")));
    assert_eq!(reply.info.unwrap().slot.int(), 1);
    assert_eq!(nodes[2].replies.pending(), 0);
    for node in &nodes {
        assert_eq!(node.db.get(Key::new(3)), Some(Value::from("b")));
        assert_eq!(node.registry.instance(Partition::Key(Key::new(3))).unwrap().leader(), ids[0]);
    }
}

#[test]
fn groups_stay_within_their_zone_test() {
    setup_logger(LevelFilter::Debug);
    let ids = vec![
        Identifier::new(1, 1),
        Identifier::new(1, 2),
        Identifier::new(2, 1),
        Identifier::new(2, 2),
    ];
    let mut nodes = cluster(&ids, |me| {
        Configuration::builder()
            .me(me)
            .peers(ids.clone())
            .partitioning(Partitioning::Groups(2))
            .build()
    });

    // 1. Key 3 (group 1) is written in zone 1, key 4 (group 0) in zone 2.
    log::debug!("Step 1: Writing one key in each zone.");
    let zone1 = nodes[0].submit(put(3, "z1", 1));
    let zone2 = nodes[2].submit(put(4, "z2", 2));
    Node::pump(&mut nodes);
    assert!(zone1.try_recv().is_ok());
    assert!(zone2.try_recv().is_ok());

    // 2. Each write stayed in its zone.
    log::debug!("Step 2: Checking zones.");
    for node in &nodes[..2] {
        assert_eq!(node.registry.partitions().collect::<Vec<Partition>>(), vec![Partition::Group(1)]);
        assert_eq!(node.db.get(Key::new(3)), Some(Value::from("z1")));
        assert_eq!(node.db.get(Key::new(4)), None);
    }
    for node in &nodes[2..] {
        assert_eq!(node.registry.partitions().collect::<Vec<Partition>>(), vec![Partition::Group(0)]);
        assert_eq!(node.db.get(Key::new(3)), None);
        assert_eq!(node.db.get(Key::new(4)), Some(Value::from("z2")));
    }
}

#[test]
fn leader_change_requires_current_ballot_test() {
    setup_logger(LevelFilter::Debug);
    let ids = three_replicas();
    let mut nodes = cluster(&ids, |me| per_key(&ids, me));
    let key = Key::new(5);
    let partition = Partition::Key(key);

    // 1. The first replica leads key 5 with ballot (1, 1.1).
    log::debug!("Step 1: Electing a leader for key 5.");
    nodes[0].submit(put(5, "x", 1));
    Node::pump(&mut nodes);
    let current = Ballot::new(1, ids[0]);
    assert_eq!(nodes[1].registry.instance(partition).unwrap().ballot(), current);

    // 2. Hints with an old ballot, or addressed to another replica, change nothing.
    log::debug!("Step 2: Delivering hints that must be ignored.");
    let mut db = nodes[1].db.clone();
    nodes[1].registry.on_leader_change(
        LeaderChange {
            key,
            to: ids[1],
            from: ids[0],
            ballot: Ballot::ZERO,
        },
        &mut db,
    );
    nodes[1].registry.on_leader_change(
        LeaderChange {
            key,
            to: ids[2],
            from: ids[0],
            ballot: current,
        },
        &mut db,
    );
    // A hint for a key the replica has never heard of is ignored too.
    nodes[1].registry.on_leader_change(
        LeaderChange {
            key: Key::new(6),
            to: ids[1],
            from: ids[0],
            ballot: current,
        },
        &mut db,
    );
    Node::pump(&mut nodes);
    assert_eq!(nodes[1].registry.instance(partition).unwrap().ballot(), current);
    assert!(nodes[1].registry.instance(Partition::Key(Key::new(6))).is_none());

    // 3. A hint with the current ballot makes the second replica take over.
    log::debug!("Step 3: Delivering a current hint.");
    nodes[1].registry.on_leader_change(
        LeaderChange {
            key,
            to: ids[1],
            from: ids[0],
            ballot: current,
        },
        &mut db,
    );
    Node::pump(&mut nodes);
    assert!(nodes[1].registry.instance(partition).unwrap().is_active());
    assert_eq!(nodes[1].registry.instance(partition).unwrap().ballot(), Ballot::new(2, ids[1]));
    assert!(!nodes[0].registry.instance(partition).unwrap().is_active());
}

#[test]
fn leadership_migrates_towards_requests_test() {
    setup_logger(LevelFilter::Debug);
    let ids = vec![Identifier::new(1, 1), Identifier::new(1, 2), Identifier::new(2, 1)];
    let remote = ids[2];
    let mut nodes = cluster(&ids, |me| {
        Configuration::builder()
            .me(me)
            .peers(ids.clone())
            .partitioning(Partitioning::PerKey)
            .migration(MigrationPolicy::Consecutive { threshold: 2 })
            .build()
    });
    let partition = Partition::Key(Key::new(7));

    // 1. The first replica becomes the leader of key 7.
    log::debug!("Step 1: Electing a leader for key 7.");
    nodes[0].submit(put(7, "local", 1));
    Node::pump(&mut nodes);
    assert!(nodes[0].registry.instance(partition).unwrap().is_active());

    // 2. Two requests in a row arrive through the replica in zone 2.
    log::debug!("Step 2: Sending requests from zone 2.");
    for (i, value) in ["remote1", "remote2"].iter().enumerate() {
        let request = Request::new(put(7, value, 2 + i as u64), remote, Ticket::new(100 + i as u64));
        let mut db = nodes[0].db.clone();
        nodes[0].registry.handle_request(request, &mut db);
    }
    Node::pump(&mut nodes);

    // 3. The replica in zone 2 took over the key, and no write was lost.
    log::debug!("Step 3: Checking the new leader.");
    let instance = nodes[2].registry.instance(partition).unwrap();
    assert!(instance.is_active());
    assert_eq!(instance.ballot(), Ballot::new(2, remote));
    assert!(!nodes[0].registry.instance(partition).unwrap().is_active());
    for node in &nodes {
        assert_eq!(node.db.get(Key::new(7)), Some(Value::from("remote2")));
        assert_eq!(node.db.executed(), nodes[0].db.executed());
    }
}

#[test]
fn local_reads_skip_the_log_test() {
    setup_logger(LevelFilter::Debug);
    let ids = three_replicas();
    let mut nodes = cluster(&ids, |me| {
        Configuration::builder()
            .me(me)
            .peers(ids.clone())
            .read_mode(ReadMode::Local)
            .build()
    });

    // 1. Write key 8 through the first replica.
    log::debug!("Step 1: Writing key 8.");
    nodes[0].submit(put(8, "v", 1));
    Node::pump(&mut nodes);

    // 2. A read at a follower is answered at once, from its own state.
    log::debug!("Step 2: Reading key 8 at a follower.");
    let reply = nodes[2].submit(Command::get(Key::new(8), CLIENT, 2));
    let reply = reply.try_recv().unwrap();
    assert_eq!(reply.value, Some(Value::from("v")));
    let info = reply.info.unwrap();
    assert!(!info.in_progress);
    assert_eq!(info.execute.int(), 1);
    assert_eq!(nodes[2].network.recv(), None);
}

#[test]
fn consecutive_policy_test() {
    setup_logger(LevelFilter::Debug);
    let a = Identifier::new(1, 1);
    let b = Identifier::new(2, 1);
    let b2 = Identifier::new(2, 2);
    let mut policy = Consecutive::new(3);

    assert_eq!(policy.hit(b), None);
    assert_eq!(policy.hit(b2), None);
    // A request from another zone starts the count over.
    assert_eq!(policy.hit(a), None);
    assert_eq!(policy.hit(b), None);
    assert_eq!(policy.hit(b), None);
    assert_eq!(policy.hit(b2), Some(b2));
    // The count restarts after a nomination.
    assert_eq!(policy.hit(b2), None);
}

#[test]
fn majority_policy_test() {
    setup_logger(LevelFilter::Debug);
    let a = Identifier::new(1, 1);
    let b = Identifier::new(2, 1);
    let c = Identifier::new(3, 1);

    let mut policy = Majority::new(4);
    assert_eq!(policy.hit(b), None);
    assert_eq!(policy.hit(a), None);
    assert_eq!(policy.hit(b), None);
    assert_eq!(policy.hit(b), Some(b));

    // No zone sent more than half of the window.
    assert_eq!(policy.hit(a), None);
    assert_eq!(policy.hit(b), None);
    assert_eq!(policy.hit(a), None);
    assert_eq!(policy.hit(c), None);

    let mut built = MigrationPolicy::Majority { window: 1 }.build();
    assert_eq!(built.hit(c), Some(c));
}
