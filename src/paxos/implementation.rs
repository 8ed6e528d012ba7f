/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The multi-Paxos instance.
//!
//! A [Paxos] instance is at any time in one of three roles:
//! 1. **Follower**: not active. It may or may not know who the current leader is.
//! 2. **Candidate**: it sent a [Prepare] for a ballot of its own and is collecting [Promise]s.
//! 3. **Leader**: phase 1 succeeded for its current ballot (`active` is set). It proposes new commands
//!    with [Accept] messages without running phase 1 again.
//!
//! The instance cycles between the roles indefinitely as ballots change. Nothing in here is driven by a
//! timer: a stalled phase waits for the next message that lets it make progress.
//!
//! ## Log reconciliation
//!
//! A candidate merges the entries carried in each [Promise] into its own log. A committed entry is
//! adopted as is; for the others it keeps the command of the highest ballot. Once it becomes leader it
//! re-proposes every uncommitted slot between its execute cursor and its highest known slot under its
//! new ballot, and re-sends a [Commit] for every committed one, before proposing anything new. Slots in
//! that range that no promising acceptor knew about are filled with a [no-op](Command::noop) so that
//! execution does not stall on them.
//!
//! Executed entries stay in the log, so that an acceptor can still tell a lagging candidate, or a
//! leader proposing for a slot it missed, which command was chosen there.
//!
//! ## Conflicting proposals
//!
//! When a slot holding a request proposed by this replica is taken over by a different command under a
//! higher ballot, the request is detached from the slot and forwarded to the owner of the higher ballot.
//! Each request therefore gets exactly one reply: from the replica that finally executes it.

use std::{
    cmp::max,
    collections::{BTreeMap, HashMap},
    mem,
    sync::{mpsc::Sender, Arc},
    time::SystemTime,
};

use typed_builder::TypedBuilder;

use crate::{
    events::*,
    networking::sending::Transport,
    quorum::{Quorum, QuorumRule},
    state_machine::StateMachine,
    types::{
        ballot::{Ballot, Slot},
        command::Command,
        identifier::Identifier,
        partition::Partition,
        request::{ExecutionInfo, Reply, Request},
        topology::Topology,
    },
};

use super::{log::Entry, messages::*};

/// The parameters of a single [Paxos] instance.
#[derive(Clone, Debug, TypedBuilder)]
pub struct PaxosConfiguration {
    #[builder(setter(doc = "Set the identifier of the local replica. Required."))]
    pub me: Identifier,
    #[builder(setter(doc = "Set the replicas taking part in the instance, including the local replica. Required."))]
    pub topology: Arc<Topology>,
    #[builder(default, setter(doc = "Set the quorum that phase 1 waits for. Defaults to a majority."))]
    pub q1: QuorumRule,
    #[builder(default, setter(doc = "Set the quorum that phase 2 waits for. Defaults to a majority."))]
    pub q2: QuorumRule,
    #[builder(default = false, setter(doc = "Send accept messages to only n/2 + 1 peers? Defaults to false."))]
    pub thrifty: bool,
    #[builder(default = false, setter(doc = "Reply to clients on commit instead of on execution? Defaults to false."))]
    pub reply_when_commit: bool,
    #[builder(default = 1024, setter(doc = "Set the number of log entries to allocate room for up front. Defaults to 1024."))]
    pub buffer_size: usize,
}

pub struct Paxos<T: Transport> {
    config: PaxosConfiguration,
    partition: Partition,
    transport: T,

    ballot: Ballot,
    active: bool,
    // Highest slot known to be allocated, None if no slot has been.
    slot: Option<Slot>,
    execute: Slot,
    log: HashMap<Slot, Entry>,

    // Requests waiting for phase 1 to complete.
    requests: Vec<Request>,
    // Phase 1 acknowledgements for `ballot`.
    quorum: Quorum,

    event_publisher: Option<Sender<Event>>,
}

impl<T: Transport> Paxos<T> {
    pub fn new(
        config: PaxosConfiguration,
        partition: Partition,
        transport: T,
        event_publisher: Option<Sender<Event>>,
    ) -> Self {
        let log = HashMap::with_capacity(config.buffer_size);
        let quorum = Quorum::new(config.topology.clone());
        Self {
            config,
            partition,
            transport,
            ballot: Ballot::ZERO,
            active: false,
            slot: None,
            execute: Slot::new(0),
            log,
            requests: Vec::new(),
            quorum,
            event_publisher,
        }
    }

    pub fn id(&self) -> Identifier {
        self.config.me
    }

    pub fn partition(&self) -> Partition {
        self.partition
    }

    pub fn ballot(&self) -> Ballot {
        self.ballot
    }

    pub fn set_ballot(&mut self, ballot: Ballot) {
        self.ballot = ballot
    }

    /// Whether phase 1 has completed for the current ballot.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active
    }

    /// A replica is the leader if it is active, or if it is trying to get elected with its current ballot.
    pub fn is_leader(&self) -> bool {
        self.active || self.is_candidate()
    }

    // The zero ballot decodes to identifier 0.0, but belongs to nobody.
    fn is_candidate(&self) -> bool {
        self.ballot != Ballot::ZERO && self.ballot.id() == self.config.me
    }

    /// The owner of the highest ballot this replica has seen.
    pub fn leader(&self) -> Identifier {
        self.ballot.id()
    }

    /// The next slot to be executed.
    pub fn execute_cursor(&self) -> Slot {
        self.execute
    }

    pub fn highest_slot(&self) -> Option<Slot> {
        self.slot
    }

    /// Number of slots that have not been executed yet.
    pub fn log_len(&self) -> usize {
        self.log.keys().filter(|slot| **slot >= self.execute).count()
    }

    /// Number of requests waiting for phase 1 to complete.
    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub(crate) fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Dispatch a phase message to its handler.
    pub fn on_receive_msg<S: StateMachine>(&mut self, msg: PaxosMessage, state_machine: &mut S) {
        match msg {
            PaxosMessage::Prepare(prepare) => self.handle_p1a(prepare),
            PaxosMessage::Promise(promise) => self.handle_p1b(promise, state_machine),
            PaxosMessage::Accept(accept) => self.handle_p2a(accept),
            PaxosMessage::Accepted(accepted) => self.handle_p2b(accepted, state_machine),
            PaxosMessage::Commit(commit) => self.handle_p3(commit, state_machine),
        }
    }

    /// Propose `request` if this replica is the active leader. Otherwise, buffer it until phase 1
    /// completes, starting phase 1 unless this replica is already a candidate.
    pub fn handle_request<S: StateMachine>(&mut self, request: Request, state_machine: &mut S) {
        if self.active {
            self.p2a(request, state_machine)
        } else {
            self.requests.push(request);
            if !self.is_candidate() {
                self.p1a(state_machine)
            }
        }
    }

    /// Hand `request` to the replica this one believes is the leader.
    pub fn forward(&mut self, request: Request) {
        let leader = self.leader();
        self.forward_to(leader, request)
    }

    /// Start phase 1 with a new ballot of this replica's own. Does nothing if already active.
    pub fn p1a<S: StateMachine>(&mut self, state_machine: &mut S) {
        if self.active {
            return;
        }
        self.ballot.next(self.config.me);
        self.quorum.reset();
        self.quorum.ack(self.config.me);

        Event::Prepare(PrepareEvent {
            timestamp: SystemTime::now(),
            partition: self.partition,
            ballot: self.ballot,
        })
        .publish(&self.event_publisher);

        self.transport.broadcast(PaxosMessage::prepare(self.ballot, self.execute));

        if self.config.q1.is_satisfied(&self.quorum) {
            self.become_active(state_machine)
        }
    }

    /// Promise the highest ballot seen so far, which is `prepare.ballot` if it is higher than the local
    /// ballot. The promise is sent either way: if it carries a different ballot, the candidate knows it
    /// lost.
    pub fn handle_p1a(&mut self, prepare: Prepare) {
        if prepare.ballot > self.ballot {
            self.step_down(prepare.ballot);
        }

        let mut log = BTreeMap::new();
        if let Some(highest) = self.slot {
            for s in prepare.execute.int()..=highest.int() {
                let slot = Slot::new(s);
                if let Some(entry) = self.log.get(&slot) {
                    log.insert(
                        slot,
                        CommandBallot {
                            command: entry.command.clone(),
                            ballot: entry.ballot,
                            commit: entry.commit,
                        },
                    );
                }
            }
        }

        self.transport.send(
            prepare.ballot.id(),
            PaxosMessage::promise(self.ballot, self.config.me, log),
        );
    }

    pub fn handle_p1b<S: StateMachine>(&mut self, promise: Promise, state_machine: &mut S) {
        if promise.ballot < self.ballot || self.active {
            log::trace!("Ignoring promise {} from {} at {}", promise.ballot, promise.id, self.ballot);
            return;
        }

        self.update(promise.log);
        self.exec(state_machine);

        if promise.ballot > self.ballot {
            self.step_down(promise.ballot);
        } else if promise.ballot.id() == self.config.me {
            Event::ReceivePromise(ReceivePromiseEvent {
                timestamp: SystemTime::now(),
                partition: self.partition,
                origin: promise.id,
                ballot: promise.ballot,
            })
            .publish(&self.event_publisher);

            self.quorum.ack(promise.id);
            if self.config.q1.is_satisfied(&self.quorum) {
                self.become_active(state_machine)
            }
        }
    }

    /// Accept `accept` unless a higher ballot has been promised, and tell the proposer which ballot
    /// this replica is at. If the slot is already committed, tell the proposer what was chosen instead.
    pub fn handle_p2a(&mut self, accept: Accept) {
        if accept.ballot >= self.ballot {
            if accept.ballot > self.ballot {
                self.step_down(accept.ballot);
            }

            if let Some(entry) = self.log.get(&accept.slot).filter(|entry| entry.commit) {
                let commit = PaxosMessage::commit(entry.ballot, accept.slot, entry.command.clone());
                self.transport.send(accept.ballot.id(), commit);
                return;
            }

            if accept.slot >= self.execute {
                self.slot = max(self.slot, Some(accept.slot));
                let mut stolen = None;
                match self.log.get_mut(&accept.slot) {
                    Some(entry) => {
                        if !entry.commit && accept.ballot > entry.ballot {
                            if entry.command != accept.command {
                                stolen = entry.request.take();
                            }
                            entry.command = accept.command;
                            entry.ballot = accept.ballot;
                        }
                    }
                    None => {
                        let entry = Entry::new(accept.ballot, accept.command, self.config.topology.clone());
                        self.log.insert(accept.slot, entry);
                    }
                }

                if let Some(request) = stolen {
                    self.forward_to(accept.ballot.id(), request);
                }

                Event::Accept(AcceptEvent {
                    timestamp: SystemTime::now(),
                    partition: self.partition,
                    ballot: accept.ballot,
                    slot: accept.slot,
                })
                .publish(&self.event_publisher);
            }
        }

        self.transport.send(
            accept.ballot.id(),
            PaxosMessage::accepted(self.ballot, self.config.me, accept.slot),
        );
    }

    pub fn handle_p2b<S: StateMachine>(&mut self, accepted: Accepted, state_machine: &mut S) {
        let entry_ballot = match self.log.get(&accepted.slot) {
            Some(entry) if !entry.commit && accepted.ballot >= entry.ballot => entry.ballot,
            _ => return,
        };

        if accepted.ballot > self.ballot {
            self.step_down(accepted.ballot);
        }

        if accepted.ballot.id() == self.config.me && accepted.ballot == entry_ballot {
            if let Some(entry) = self.log.get_mut(&accepted.slot) {
                entry.quorum.ack(accepted.id);
            }
            self.try_commit(accepted.slot, state_machine);
        } else if let Some(entry) = self.log.get_mut(&accepted.slot) {
            entry.quorum.nack(accepted.id);
        }
    }

    pub fn handle_p3<S: StateMachine>(&mut self, commit: Commit, state_machine: &mut S) {
        if commit.slot < self.execute {
            return;
        }
        self.slot = max(self.slot, Some(commit.slot));

        let topology = self.config.topology.clone();
        let entry = self
            .log
            .entry(commit.slot)
            .or_insert_with(|| Entry::new(commit.ballot, commit.command.clone(), topology));

        if entry.commit {
            if entry.command != commit.command {
                log::warn!(
                    "Slot {} already committed with {}, ignoring commit of {}",
                    commit.slot,
                    entry.command,
                    commit.command
                );
            }
            return;
        }

        let stolen = if entry.command != commit.command {
            entry.request.take()
        } else {
            None
        };
        entry.command = commit.command.clone();
        entry.ballot = max(entry.ballot, commit.ballot);
        entry.commit = true;
        let early_reply = if self.config.reply_when_commit {
            entry.request.take()
        } else {
            None
        };

        Event::Commit(CommitEvent {
            timestamp: SystemTime::now(),
            partition: self.partition,
            ballot: commit.ballot,
            slot: commit.slot,
            command: commit.command.clone(),
        })
        .publish(&self.event_publisher);

        if let Some(request) = stolen {
            self.forward_to(commit.ballot.id(), request);
        }
        if let Some(request) = early_reply {
            self.transport.reply(request, Reply::new(commit.command, None, None));
        }

        self.exec(state_machine);
    }

    /// Answer a read from the newest write to its key that is still in the log, falling back to the
    /// state machine if there is none. The reply is not ordered by consensus.
    pub fn read_in_progress<S: StateMachine>(&self, command: &Command, state_machine: &mut S) -> Reply {
        let in_progress = self.slot.and_then(|highest| {
            (self.execute.int()..=highest.int())
                .rev()
                .map(Slot::new)
                .filter_map(|slot| self.log.get(&slot).map(|entry| (slot, entry)))
                .find(|(_, entry)| entry.command.key == command.key && entry.command.is_write())
        });

        let (slot, value, in_progress) = match in_progress {
            Some((slot, entry)) => (slot, entry.command.value.clone(), true),
            None => (self.execute, state_machine.execute(command), false),
        };
        let info = ExecutionInfo {
            slot,
            ballot: self.ballot,
            execute: self.execute,
            in_progress,
        };
        Reply::new(command.clone(), value, Some(info))
    }

    fn p2a<S: StateMachine>(&mut self, request: Request, state_machine: &mut S) {
        let slot = self.slot.map_or(Slot::new(0), |slot| slot + 1);
        self.slot = Some(slot);

        let command = request.command.clone();
        let mut entry = Entry::new(self.ballot, command.clone(), self.config.topology.clone());
        entry.request = Some(request);
        entry.quorum.ack(self.config.me);
        self.log.insert(slot, entry);

        self.propose(slot, command);
        self.try_commit(slot, state_machine);
    }

    fn propose(&mut self, slot: Slot, command: Command) {
        Event::Propose(ProposeEvent {
            timestamp: SystemTime::now(),
            partition: self.partition,
            ballot: self.ballot,
            slot,
            command: command.clone(),
        })
        .publish(&self.event_publisher);

        let accept = PaxosMessage::accept(self.ballot, slot, command);
        if self.config.thrifty {
            let count = self.config.topology.n() / 2 + 1;
            self.transport.multicast_quorum(count, accept)
        } else {
            self.transport.broadcast(accept)
        }
    }

    // Phase 1 succeeded: re-propose what the promises carried, then the buffered requests.
    fn become_active<S: StateMachine>(&mut self, state_machine: &mut S) {
        self.active = true;
        Event::BecomeLeader(BecomeLeaderEvent {
            timestamp: SystemTime::now(),
            partition: self.partition,
            ballot: self.ballot,
        })
        .publish(&self.event_publisher);

        if let Some(highest) = self.slot {
            for s in self.execute.int()..=highest.int() {
                let slot = Slot::new(s);
                // Execution may run ahead of this loop on a cluster of one.
                if slot < self.execute {
                    continue;
                }

                let ballot = self.ballot;
                let me = self.config.me;
                let topology = self.config.topology.clone();
                let entry = self
                    .log
                    .entry(slot)
                    .or_insert_with(|| Entry::new(ballot, Command::noop(), topology.clone()));
                if entry.commit {
                    let commit = PaxosMessage::commit(entry.ballot, slot, entry.command.clone());
                    self.transport.broadcast(commit);
                    continue;
                }
                entry.ballot = ballot;
                entry.quorum = Quorum::new(topology);
                entry.quorum.ack(me);
                let command = entry.command.clone();

                self.propose(slot, command);
                self.try_commit(slot, state_machine);
            }
        }

        for request in mem::take(&mut self.requests) {
            self.p2a(request, state_machine);
        }
    }

    // Merge the entries of a promise into the log.
    fn update(&mut self, log: BTreeMap<Slot, CommandBallot>) {
        for (slot, CommandBallot { command, ballot, commit }) in log {
            if slot < self.execute {
                continue;
            }
            self.slot = max(self.slot, Some(slot));
            if commit {
                self.learn(slot, ballot, command);
                continue;
            }
            match self.log.get_mut(&slot) {
                Some(entry) => {
                    if !entry.commit && ballot > entry.ballot {
                        if entry.command != command {
                            // Propose it again in a slot of its own once phase 1 completes.
                            if let Some(request) = entry.request.take() {
                                self.requests.push(request);
                            }
                        }
                        entry.command = command;
                        entry.ballot = ballot;
                    }
                }
                None => {
                    let entry = Entry::new(ballot, command, self.config.topology.clone());
                    self.log.insert(slot, entry);
                }
            }
        }
    }

    // Adopt a command that a promising acceptor knows was chosen for `slot`.
    fn learn(&mut self, slot: Slot, ballot: Ballot, command: Command) {
        let topology = self.config.topology.clone();
        let entry = self
            .log
            .entry(slot)
            .or_insert_with(|| Entry::new(ballot, command.clone(), topology));
        if entry.commit {
            return;
        }

        if entry.command != command {
            // Propose it again in a slot of its own once phase 1 completes.
            if let Some(request) = entry.request.take() {
                self.requests.push(request);
            }
        }
        entry.command = command.clone();
        entry.ballot = ballot;
        entry.commit = true;
        let early_reply = if self.config.reply_when_commit {
            entry.request.take()
        } else {
            None
        };

        Event::Commit(CommitEvent {
            timestamp: SystemTime::now(),
            partition: self.partition,
            ballot,
            slot,
            command: command.clone(),
        })
        .publish(&self.event_publisher);

        if let Some(request) = early_reply {
            self.transport.reply(request, Reply::new(command, None, None));
        }
    }

    fn try_commit<S: StateMachine>(&mut self, slot: Slot, state_machine: &mut S) {
        let chosen = match self.log.get(&slot) {
            Some(entry) => !entry.commit && self.config.q2.is_satisfied(&entry.quorum),
            None => false,
        };
        if !chosen {
            return;
        }

        let (ballot, command, early_reply) = match self.log.get_mut(&slot) {
            Some(entry) => {
                entry.commit = true;
                let early_reply = if self.config.reply_when_commit {
                    entry.request.take()
                } else {
                    None
                };
                (entry.ballot, entry.command.clone(), early_reply)
            }
            None => return,
        };

        Event::Commit(CommitEvent {
            timestamp: SystemTime::now(),
            partition: self.partition,
            ballot,
            slot,
            command: command.clone(),
        })
        .publish(&self.event_publisher);

        self.transport.broadcast(PaxosMessage::commit(ballot, slot, command.clone()));
        if let Some(request) = early_reply {
            self.transport.reply(request, Reply::new(command, None, None));
        }

        self.exec(state_machine);
    }

    // Apply committed slots in order, stopping at the first gap or uncommitted slot.
    fn exec<S: StateMachine>(&mut self, state_machine: &mut S) {
        loop {
            let slot = self.execute;
            let (command, request) = match self.log.get_mut(&slot) {
                Some(entry) if entry.commit => (entry.command.clone(), entry.request.take()),
                _ => break,
            };

            let value = state_machine.execute(&command);
            if let Some(request) = request {
                let info = ExecutionInfo {
                    slot,
                    ballot: self.ballot,
                    execute: slot,
                    in_progress: false,
                };
                let reply = Reply::new(command.clone(), value.clone(), Some(info));
                self.transport.reply(request, reply);
            }

            Event::Execute(ExecuteEvent {
                timestamp: SystemTime::now(),
                partition: self.partition,
                slot,
                command,
                value,
            })
            .publish(&self.event_publisher);

            self.execute = slot + 1;
        }
    }

    // Adopt a higher ballot: stop acting as leader and hand the buffered requests to its owner.
    fn step_down(&mut self, ballot: Ballot) {
        self.ballot = ballot;
        self.active = false;

        Event::StepDown(StepDownEvent {
            timestamp: SystemTime::now(),
            partition: self.partition,
            ballot,
        })
        .publish(&self.event_publisher);

        for request in mem::take(&mut self.requests) {
            self.forward_to(ballot.id(), request);
        }
    }

    fn forward_to(&mut self, leader: Identifier, request: Request) {
        Event::Forward(ForwardEvent {
            timestamp: SystemTime::now(),
            partition: self.partition,
            to: leader,
            command: request.command.clone(),
        })
        .publish(&self.event_publisher);

        self.transport.forward(leader, request)
    }
}
