/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Methods to build and run a replica.
//!
//! This crate works to safely replicate a [state machine](crate::state_machine::StateMachine) in
//! multiple processes. In our terminology, these processes are called 'replicas'. Each replica is
//! uniquely identified by an [Identifier], which also names the zone it runs in.
//!
//! The key components of this module are:
//! - The builder-pattern interface to construct a [specification of the replica](ReplicaSpec) with:
//!   1. `ReplicaSpec::builder` to construct a `ReplicaSpecBuilder`,
//!   2. The setters of the `ReplicaSpecBuilder`, and
//!   3. The `ReplicaSpecBuilder::build` method to construct a [ReplicaSpec],
//! - The function to [start](ReplicaSpec::start) a [Replica] given its specification,
//! - [The type](Replica) which keeps the replica alive and accepts commands from clients.
//!
//! ## Starting a replica
//!
//! Here is an example that demonstrates how to build and start running a replica using the builder
//! pattern:
//!
//! ```ignore
//! let replica =
//!     ReplicaSpec::builder()
//!     .state_machine(kv_store)
//!     .network(network)
//!     .configuration(configuration)
//!     .on_commit(commit_handler)
//!     .build()
//!     .start();
//!
//! let reply = replica.submit(Command::put(Key::new(1), Value::from("a"), client, 0))?.recv()?;
//! ```
//!
//! ### Required setters
//!
//! The required setters are for providing the trait implementations required to run a replica:
//! - `.state_machine(...)`
//! - `.network(...)`
//! - `.configuration(...)`
//!
//! ### Optional setters
//!
//! The optional setters are for registering user-defined event handlers for events from [crate::events]:
//! - `.on_prepare(...)`
//! - `.on_receive_promise(...)`
//! - `.on_become_leader(...)`
//! - `.on_step_down(...)`
//! - `.on_propose(...)`
//! - `.on_accept(...)`
//! - `.on_commit(...)`
//! - `.on_execute(...)`
//! - `.on_forward(...)`
//! - `.on_leader_change(...)`
//!
//! The replica's [configuration](Configuration) can also be defined using the builder pattern, for
//! example:
//!
//! ```ignore
//! let configuration =
//!     Configuration::builder()
//!     .me(Identifier::new(1, 1))
//!     .peers(vec![Identifier::new(1, 2), Identifier::new(1, 3)])
//!     .partitioning(Partitioning::PerKey)
//!     .log_events(true)
//!     .build();
//! ```

use std::fmt::{self, Display, Formatter};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

use typed_builder::TypedBuilder;

use crate::algorithm::Algorithm;
use crate::event_bus::*;
use crate::events::*;
use crate::networking::{
    messages::Message, network::Network, receiving::start_polling, replies::ReplyRegistry,
};
use crate::partitioned::{policy::MigrationPolicy, Partitioning, Registry};
use crate::quorum::QuorumRule;
use crate::state_machine::StateMachine;
use crate::types::{
    command::Command,
    identifier::Identifier,
    request::{Reply, Request},
};

/// How a replica answers read commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Reads are ordered through the log like writes.
    #[default]
    Replicated,
    /// Reads are answered right away from the local state machine, together with the position of the
    /// log they were read at. The answer may be stale.
    Local,
}

/// Stores the user-defined parameters required to start the replica, that is:
/// 1. The replica's own [Identifier].
/// 2. The other replicas of the cluster.
/// 3. How the key space is [partitioned](Partitioning) into consensus instances.
/// 4. The [quorum rules](QuorumRule) of phase 1 and phase 2.
/// 5. Protocol options: thrifty phase 3, early replies, ephemeral leaders, local reads.
/// 6. The optional [leadership migration policy](MigrationPolicy) of per-key instances.
/// 7. The "Log Events" flag, if set to "true" then logs should be printed.
///
/// ## Quorum rules
///
/// Every phase-1 quorum must intersect every phase-2 quorum. The default rules (majority in both phases)
/// satisfy this for any cluster. When picking other rules, e.g., [QuorumRule::FGridQ1] and
/// [QuorumRule::FGridQ2] with the same parameters, check that the pair intersects.
///
/// ## Log Events
///
/// This crate logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
/// printed onto a terminal or to a file, set up a [logging
/// implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
#[derive(Clone, TypedBuilder)]
#[builder(builder_method(doc =
    "
    Create a builder for building a [Configuration]. On the builder call the following methods to construct a valid [Configuration].

    Required:
    - `.me(...)`
    - `.peers(...)`

    Optional:
    - `.partitioning(...)`
    - `.q1(...)`
    - `.q2(...)`
    - `.thrifty(...)`
    - `.reply_when_commit(...)`
    - `.buffer_size(...)`
    - `.ephemeral_leader(...)`
    - `.read_mode(...)`
    - `.migration(...)`
    - `.log_events(...)`
"
))]
pub struct Configuration {
    #[builder(setter(doc = "Set the replica's identifier. Required."))]
    pub me: Identifier,
    #[builder(setter(doc = "Set the identifiers of the other replicas of the cluster. Listing `me` as well is harmless. Required."))]
    pub peers: Vec<Identifier>,
    #[builder(default, setter(doc = "Set how keys are divided among consensus instances. Defaults to a single instance. Optional."))]
    pub partitioning: Partitioning,
    #[builder(default, setter(doc = "Set the rule that decides when phase 1 has gathered enough promises. Defaults to majority. Optional."))]
    pub q1: QuorumRule,
    #[builder(default, setter(doc = "Set the rule that decides when a proposal has gathered enough acceptances. Defaults to majority. Optional."))]
    pub q2: QuorumRule,
    #[builder(default = false, setter(doc = "Send proposals to a quorum-sized subset of peers only, and have acceptors commit on their own. Defaults to false. Optional."))]
    pub thrifty: bool,
    #[builder(default = false, setter(doc = "Reply to clients as soon as their command commits, without waiting for it to execute. Defaults to false. Optional."))]
    pub reply_when_commit: bool,
    #[builder(default = 1024, setter(doc = "Set the number of log entries each consensus instance allocates room for up front. Defaults to 1024. Optional."))]
    pub buffer_size: usize,
    #[builder(default = false, setter(doc = "Let every replica handle requests as if it were the leader instead of forwarding them. Defaults to false. Optional."))]
    pub ephemeral_leader: bool,
    #[builder(default, setter(doc = "Set how read commands are answered. Defaults to reads replicated through the log. Optional."))]
    pub read_mode: ReadMode,
    #[builder(default, setter(strip_option, doc = "Set the policy that moves leadership of a key towards the zone its requests come from. Only used with per-key partitioning. Optional."))]
    pub migration: Option<MigrationPolicy>,
    #[builder(default = false, setter(doc = "Enable logging? Defaults to false. Optional."))]
    pub log_events: bool,
}

/// Stores all necessary parameters and trait implementations required to run the [Replica].
#[derive(TypedBuilder)]
#[builder(builder_method(doc =
    "
    Create a builder for building a [ReplicaSpec]. On the builder call the following methods to construct a valid [ReplicaSpec].

    Required:
    - `.state_machine(...)`
    - `.network(...)`
    - `.configuration(...)`

    Optional:
    - `.on_prepare(...)`
    - `.on_receive_promise(...)`
    - `.on_become_leader(...)`
    - `.on_step_down(...)`
    - `.on_propose(...)`
    - `.on_accept(...)`
    - `.on_commit(...)`
    - `.on_execute(...)`
    - `.on_forward(...)`
    - `.on_leader_change(...)`
"
))]
pub struct ReplicaSpec<S: StateMachine, N: Network + 'static> {
    // Required parameters
    #[builder(setter(doc = "Set the state machine that committed commands are applied to. The argument must implement the [StateMachine](crate::state_machine::StateMachine) trait. Required."))]
    state_machine: S,
    #[builder(setter(doc = "Set the implementation of peer-to-peer networking. The argument must implement the [Network](crate::networking::network::Network) trait. Required."))]
    network: N,
    #[builder(setter(doc = "Set the [configuration](Configuration), which contains the necessary parameters to run a replica. Required."))]
    configuration: Configuration,
    // Optional parameters
    #[builder(default, setter(transform = |handler: impl Fn(&PrepareEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<PrepareEvent>),
    doc = "Register a handler closure to be invoked after the replica starts phase 1 with a new ballot. Optional."))]
    on_prepare: Option<HandlerPtr<PrepareEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceivePromiseEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceivePromiseEvent>),
    doc = "Register a handler closure to be invoked after the replica receives a promise for its ballot. Optional."))]
    on_receive_promise: Option<HandlerPtr<ReceivePromiseEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&BecomeLeaderEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<BecomeLeaderEvent>),
    doc = "Register a handler closure to be invoked after the replica becomes the active leader of a partition. Optional."))]
    on_become_leader: Option<HandlerPtr<BecomeLeaderEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&StepDownEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<StepDownEvent>),
    doc = "Register a handler closure to be invoked after the replica sees a higher ballot and stops leading a partition. Optional."))]
    on_step_down: Option<HandlerPtr<StepDownEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ProposeEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ProposeEvent>),
    doc = "Register a handler closure to be invoked after the replica proposes a command for a slot. Optional."))]
    on_propose: Option<HandlerPtr<ProposeEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&AcceptEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<AcceptEvent>),
    doc = "Register a handler closure to be invoked after the replica accepts a proposal. Optional."))]
    on_accept: Option<HandlerPtr<AcceptEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&CommitEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<CommitEvent>),
    doc = "Register a handler closure to be invoked after a command is committed. Optional."))]
    on_commit: Option<HandlerPtr<CommitEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ExecuteEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ExecuteEvent>),
    doc = "Register a handler closure to be invoked after a command is applied to the state machine. Optional."))]
    on_execute: Option<HandlerPtr<ExecuteEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ForwardEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ForwardEvent>),
    doc = "Register a handler closure to be invoked after the replica forwards a request to another replica. Optional."))]
    on_forward: Option<HandlerPtr<ForwardEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&LeaderChangeEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<LeaderChangeEvent>),
    doc = "Register a handler closure to be invoked after the replica asks another replica to take over a key. Optional."))]
    on_leader_change: Option<HandlerPtr<LeaderChangeEvent>>,
}

impl<S: StateMachine, N: Network + 'static> ReplicaSpec<S, N> {
    /// Starts all threads and channels associated with running a replica, and returns the handles to
    /// them in a [Replica] struct.
    pub fn start(self) -> Replica {
        let me = self.configuration.me;

        let event_handlers = EventHandlers::new(
            self.configuration.log_events,
            self.on_prepare,
            self.on_receive_promise,
            self.on_become_leader,
            self.on_step_down,
            self.on_propose,
            self.on_accept,
            self.on_commit,
            self.on_execute,
            self.on_forward,
            self.on_leader_change,
        );

        let (event_publisher, event_subscriber) = if !event_handlers.is_empty() {
            let (publisher, subscriber) = mpsc::channel();
            (Some(publisher), Some(subscriber))
        } else {
            (None, None)
        };

        let (inbound, inbound_receiver) = mpsc::channel();
        let replies = ReplyRegistry::new();

        let (poller_shutdown, poller_shutdown_receiver) = mpsc::channel();
        let poller = start_polling(self.network.clone(), inbound.clone(), poller_shutdown_receiver);

        let registry = Registry::new(
            self.configuration,
            self.network,
            inbound.clone(),
            replies.clone(),
            event_publisher,
        );

        let (algorithm_shutdown, algorithm_shutdown_receiver) = mpsc::channel();
        let algorithm = Algorithm::new(
            registry,
            self.state_machine,
            inbound_receiver,
            algorithm_shutdown_receiver,
        )
        .start();

        let (event_bus, event_bus_shutdown) = match event_subscriber {
            Some(event_subscriber) => {
                let (event_bus_shutdown, event_bus_shutdown_receiver) = mpsc::channel();
                let event_bus = start_event_bus(event_handlers, event_subscriber, event_bus_shutdown_receiver);
                (Some(event_bus), Some(event_bus_shutdown))
            }
            None => (None, None),
        };

        Replica {
            me,
            inbound,
            replies,
            poller: Some(poller),
            poller_shutdown,
            algorithm: Some(algorithm),
            algorithm_shutdown,
            event_bus,
            event_bus_shutdown,
        }
    }
}

/// A handle to the background threads of a replica. When this value is dropped, all background threads
/// are gracefully shut down.
pub struct Replica {
    me: Identifier,
    inbound: Sender<(Identifier, Message)>,
    replies: ReplyRegistry,
    poller: Option<JoinHandle<()>>,
    poller_shutdown: Sender<()>,
    algorithm: Option<JoinHandle<()>>,
    algorithm_shutdown: Sender<()>,
    event_bus: Option<JoinHandle<()>>,
    event_bus_shutdown: Option<Sender<()>>,
}

impl Replica {
    pub fn me(&self) -> Identifier {
        self.me
    }

    /// Submit `command` to the cluster through this replica. The returned receiver yields exactly one
    /// [Reply]: once the command executes if it goes through the log, or right away for local reads.
    pub fn submit(&self, command: Command) -> Result<Receiver<Reply>, SubmitError> {
        let (ticket, reply) = self.replies.register();
        let request = Request::new(command, self.me, ticket);
        self.inbound
            .send((self.me, Message::Request(request)))
            .map_err(|_| SubmitError::ReplicaStopped)?;
        Ok(reply)
    }

    /// Number of submitted commands that have not been replied to yet.
    pub fn pending_replies(&self) -> usize {
        self.replies.pending()
    }
}

impl Drop for Replica {
    fn drop(&mut self) {
        // The order matters: the algorithm thread publishes events and receives from the poller, so it
        // stops after the event bus and before the poller.

        if let Some(shutdown) = &self.event_bus_shutdown {
            let _ = shutdown.send(());
        }
        if let Some(event_bus) = self.event_bus.take() {
            let _ = event_bus.join();
        }

        let _ = self.algorithm_shutdown.send(());
        if let Some(algorithm) = self.algorithm.take() {
            let _ = algorithm.join();
        }

        let _ = self.poller_shutdown.send(());
        if let Some(poller) = self.poller.take() {
            let _ = poller.join();
        }
    }
}

/// Why [Replica::submit] could not take a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// The algorithm thread is no longer running.
    ReplicaStopped,
}

impl Display for SubmitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::ReplicaStopped => write!(f, "the replica is no longer running"),
        }
    }
}

impl std::error::Error for SubmitError {}
