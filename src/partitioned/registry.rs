/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The registry of the consensus instances that run on a replica.

use std::{
    collections::HashMap,
    iter,
    sync::{mpsc::Sender, Arc},
    time::SystemTime,
};

use crate::{
    events::{Event, LeaderChangeEvent},
    networking::{
        messages::{Envelope, Message},
        network::Network,
        replies::ReplyRegistry,
        sending::{Scope, SenderHandle, Transport},
    },
    paxos::{Paxos, PaxosConfiguration},
    replica::{Configuration, ReadMode},
    state_machine::StateMachine,
    types::{
        ballot::Ballot,
        command::Key,
        identifier::Identifier,
        partition::Partition,
        request::Request,
        topology::Topology,
    },
};

use super::{
    messages::LeaderChange,
    policy::{MigrationPolicy, Policy},
};

/// How the keys of the state machine are divided among consensus instances.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Partitioning {
    /// One instance orders all commands.
    #[default]
    Single,
    /// One instance per key, each with its own leader.
    PerKey,
    /// `key % groups` picks one of a fixed number of instances. Each group runs among the replicas of
    /// the local zone only.
    Groups(u64),
}

impl Partitioning {
    pub fn partition_of(&self, key: Key) -> Partition {
        match *self {
            Partitioning::Single => Partition::Whole,
            Partitioning::PerKey => Partition::Key(key),
            Partitioning::Groups(groups) => Partition::Group(key.int() % groups.max(1)),
        }
    }
}

// A consensus instance and the migration policy of its partition.
struct Instance<N: Network> {
    paxos: Paxos<SenderHandle<N>>,
    policy: Option<Box<dyn Policy>>,
}

/// Owns every consensus instance of a replica, creating each one the first time a request or a message
/// refers to its partition.
pub struct Registry<N: Network> {
    factory: InstanceFactory<N>,
    instances: HashMap<Partition, Instance<N>>,
}

impl<N: Network> Registry<N> {
    pub fn new(
        configuration: Configuration,
        network: N,
        loopback: Sender<(Identifier, Message)>,
        replies: ReplyRegistry,
        event_publisher: Option<Sender<Event>>,
    ) -> Self {
        let topology = Arc::new(Topology::new(
            configuration.peers.iter().copied().chain(iter::once(configuration.me)),
        ));
        let zone_topology = Arc::new(topology.zone(configuration.me.zone()));
        Self {
            factory: InstanceFactory {
                configuration,
                topology,
                zone_topology,
                network,
                loopback,
                replies,
                event_publisher,
            },
            instances: HashMap::new(),
        }
    }

    pub fn me(&self) -> Identifier {
        self.factory.configuration.me
    }

    /// The instance of `partition`, created if it does not exist yet.
    pub fn instance_for(&mut self, partition: Partition) -> &mut Paxos<SenderHandle<N>> {
        let Self { factory, instances } = self;
        &mut instances
            .entry(partition)
            .or_insert_with(|| factory.build(partition))
            .paxos
    }

    /// The instance of `partition`, if it has been created.
    pub fn instance(&self, partition: Partition) -> Option<&Paxos<SenderHandle<N>>> {
        self.instances.get(&partition).map(|instance| &instance.paxos)
    }

    pub fn partitions(&self) -> impl Iterator<Item = Partition> + '_ {
        self.instances.keys().copied()
    }

    /// Dispatch a message received from `origin`.
    pub fn on_receive_msg<S: StateMachine>(&mut self, origin: Identifier, msg: Message, state_machine: &mut S) {
        match msg {
            Message::Request(request) => self.handle_request(request, state_machine),
            Message::Reply(routed) => {
                if !self.factory.replies.deliver(routed.ticket, routed.reply) {
                    log::debug!("Reply from {} for unknown ticket {:?}", origin, routed.ticket);
                }
            }
            Message::Paxos(Envelope { partition, message }) => {
                self.instance_for(partition).on_receive_msg(message, state_machine)
            }
            Message::LeaderChange(leader_change) => self.on_leader_change(leader_change, state_machine),
        }
    }

    /// Route `request` to the instance of its key. The instance handles it if it leads the key, if the
    /// key never had a leader, or if every replica is configured to lead. Otherwise the request is
    /// forwarded to the believed leader.
    pub fn handle_request<S: StateMachine>(&mut self, request: Request, state_machine: &mut S) {
        let Self { factory, instances } = self;
        let configuration = &factory.configuration;
        let partition = configuration.partitioning.partition_of(request.command.key);
        let instance = instances
            .entry(partition)
            .or_insert_with(|| factory.build(partition));

        if configuration.read_mode == ReadMode::Local && request.command.is_read() {
            let reply = instance.paxos.read_in_progress(&request.command, state_machine);
            instance.paxos.transport_mut().reply(request, reply);
            return;
        }

        if configuration.ephemeral_leader
            || instance.paxos.is_leader()
            || instance.paxos.ballot() == Ballot::ZERO
        {
            let origin = request.origin;
            instance.paxos.handle_request(request, state_machine);
            if let Partition::Key(key) = partition {
                factory.suggest_migration(instance, key, origin);
            }
        } else {
            instance.paxos.forward(request);
        }
    }

    /// Run phase 1 for the key of `leader_change` if it is addressed to this replica and its ballot is
    /// still current.
    pub fn on_leader_change<S: StateMachine>(&mut self, leader_change: LeaderChange, state_machine: &mut S) {
        if leader_change.to != self.me() {
            return;
        }
        match self.instances.get_mut(&Partition::Key(leader_change.key)) {
            Some(instance) if instance.paxos.ballot() == leader_change.ballot => {
                instance.paxos.p1a(state_machine)
            }
            _ => log::debug!(
                "Ignoring stale leader change for key {} at ballot {}",
                leader_change.key,
                leader_change.ballot
            ),
        }
    }
}

struct InstanceFactory<N: Network> {
    configuration: Configuration,
    topology: Arc<Topology>,
    zone_topology: Arc<Topology>,
    network: N,
    loopback: Sender<(Identifier, Message)>,
    replies: ReplyRegistry,
    event_publisher: Option<Sender<Event>>,
}

impl<N: Network> InstanceFactory<N> {
    fn build(&self, partition: Partition) -> Instance<N> {
        let me = self.configuration.me;
        let (scope, topology) = match self.configuration.partitioning {
            Partitioning::Groups(_) => (Scope::Zone(me.zone()), self.zone_topology.clone()),
            _ => (Scope::Everyone, self.topology.clone()),
        };

        let paxos_config = PaxosConfiguration::builder()
            .me(me)
            .topology(topology)
            .q1(self.configuration.q1)
            .q2(self.configuration.q2)
            .thrifty(self.configuration.thrifty)
            .reply_when_commit(self.configuration.reply_when_commit)
            .buffer_size(self.configuration.buffer_size)
            .build();
        let transport = SenderHandle::new(
            me,
            partition,
            scope,
            self.network.clone(),
            self.loopback.clone(),
            self.replies.clone(),
        );

        let policy = match (partition, self.configuration.migration) {
            (Partition::Key(_), Some(migration)) => Some(MigrationPolicy::build(&migration)),
            _ => None,
        };

        Instance {
            paxos: Paxos::new(paxos_config, partition, transport, self.event_publisher.clone()),
            policy,
        }
    }

    // Ask a replica in another zone to take over `key` if its requests keep coming from there.
    fn suggest_migration(&self, instance: &mut Instance<N>, key: Key, origin: Identifier) {
        if !instance.paxos.is_active() {
            return;
        }
        let me = self.configuration.me;
        let to = match instance.policy.as_mut().and_then(|policy| policy.hit(origin)) {
            Some(to) if to.zone() != me.zone() => to,
            _ => return,
        };

        let ballot = instance.paxos.ballot();
        Event::LeaderChange(LeaderChangeEvent {
            timestamp: SystemTime::now(),
            key,
            to,
            ballot,
        })
        .publish(&self.event_publisher);

        let leader_change = LeaderChange {
            key,
            to,
            from: me,
            ballot,
        };
        instance.paxos.transport_mut().send_message(to, leader_change);
    }
}
