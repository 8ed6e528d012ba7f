/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The thread that runs event handlers.
//!
//! Consensus instances publish [events](crate::events) on a channel as they go. The event bus thread
//! receives them and invokes the handlers registered for each kind of event, which include the default
//! [loggers](crate::logging) if the replica is configured to log events. Handlers therefore never slow
//! down the algorithm thread.

use std::sync::mpsc::{Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use crate::events::*;
use crate::logging::Logger;

pub type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

pub(crate) struct EventHandlers {
    pub(crate) prepare_handlers: Vec<HandlerPtr<PrepareEvent>>,
    pub(crate) receive_promise_handlers: Vec<HandlerPtr<ReceivePromiseEvent>>,
    pub(crate) become_leader_handlers: Vec<HandlerPtr<BecomeLeaderEvent>>,
    pub(crate) step_down_handlers: Vec<HandlerPtr<StepDownEvent>>,
    pub(crate) propose_handlers: Vec<HandlerPtr<ProposeEvent>>,
    pub(crate) accept_handlers: Vec<HandlerPtr<AcceptEvent>>,
    pub(crate) commit_handlers: Vec<HandlerPtr<CommitEvent>>,
    pub(crate) execute_handlers: Vec<HandlerPtr<ExecuteEvent>>,
    pub(crate) forward_handlers: Vec<HandlerPtr<ForwardEvent>>,
    pub(crate) leader_change_handlers: Vec<HandlerPtr<LeaderChangeEvent>>,
}

// The handlers registered for one kind of event: the user's, then the logger if enabled.
fn handlers<T: Logger>(log_events: bool, user_handler: Option<HandlerPtr<T>>) -> Vec<HandlerPtr<T>> {
    let mut handlers: Vec<HandlerPtr<T>> = user_handler.into_iter().collect();
    if log_events {
        handlers.push(T::get_logger());
    }
    handlers
}

impl EventHandlers {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        log_events: bool,
        on_prepare: Option<HandlerPtr<PrepareEvent>>,
        on_receive_promise: Option<HandlerPtr<ReceivePromiseEvent>>,
        on_become_leader: Option<HandlerPtr<BecomeLeaderEvent>>,
        on_step_down: Option<HandlerPtr<StepDownEvent>>,
        on_propose: Option<HandlerPtr<ProposeEvent>>,
        on_accept: Option<HandlerPtr<AcceptEvent>>,
        on_commit: Option<HandlerPtr<CommitEvent>>,
        on_execute: Option<HandlerPtr<ExecuteEvent>>,
        on_forward: Option<HandlerPtr<ForwardEvent>>,
        on_leader_change: Option<HandlerPtr<LeaderChangeEvent>>,
    ) -> EventHandlers {
        EventHandlers {
            prepare_handlers: handlers(log_events, on_prepare),
            receive_promise_handlers: handlers(log_events, on_receive_promise),
            become_leader_handlers: handlers(log_events, on_become_leader),
            step_down_handlers: handlers(log_events, on_step_down),
            propose_handlers: handlers(log_events, on_propose),
            accept_handlers: handlers(log_events, on_accept),
            commit_handlers: handlers(log_events, on_commit),
            execute_handlers: handlers(log_events, on_execute),
            forward_handlers: handlers(log_events, on_forward),
            leader_change_handlers: handlers(log_events, on_leader_change),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.prepare_handlers.is_empty()
            && self.receive_promise_handlers.is_empty()
            && self.become_leader_handlers.is_empty()
            && self.step_down_handlers.is_empty()
            && self.propose_handlers.is_empty()
            && self.accept_handlers.is_empty()
            && self.commit_handlers.is_empty()
            && self.execute_handlers.is_empty()
            && self.forward_handlers.is_empty()
            && self.leader_change_handlers.is_empty()
    }

    pub(crate) fn fire_handlers(&self, event: Event) {
        match event {
            Event::Prepare(prepare_event) =>
                self.prepare_handlers.iter().for_each(|handler| handler(&prepare_event)),

            Event::ReceivePromise(receive_promise_event) =>
                self.receive_promise_handlers.iter().for_each(|handler| handler(&receive_promise_event)),

            Event::BecomeLeader(become_leader_event) =>
                self.become_leader_handlers.iter().for_each(|handler| handler(&become_leader_event)),

            Event::StepDown(step_down_event) =>
                self.step_down_handlers.iter().for_each(|handler| handler(&step_down_event)),

            Event::Propose(propose_event) =>
                self.propose_handlers.iter().for_each(|handler| handler(&propose_event)),

            Event::Accept(accept_event) =>
                self.accept_handlers.iter().for_each(|handler| handler(&accept_event)),

            Event::Commit(commit_event) =>
                self.commit_handlers.iter().for_each(|handler| handler(&commit_event)),

            Event::Execute(execute_event) =>
                self.execute_handlers.iter().for_each(|handler| handler(&execute_event)),

            Event::Forward(forward_event) =>
                self.forward_handlers.iter().for_each(|handler| handler(&forward_event)),

            Event::LeaderChange(leader_change_event) =>
                self.leader_change_handlers.iter().for_each(|handler| handler(&leader_change_event)),
        }
    }
}

pub(crate) fn start_event_bus(
    event_handlers: EventHandlers,
    event_subscriber: Receiver<Event>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) => return,
            Err(TryRecvError::Empty) => (),
            Err(TryRecvError::Disconnected) => {
                panic!("event_bus thread disconnected from main thread")
            }
        }

        match event_subscriber.try_recv() {
            Ok(event) => event_handlers.fire_handlers(event),
            Err(TryRecvError::Empty) => thread::yield_now(),
            Err(TryRecvError::Disconnected) => {
                panic!("The algorithm thread (event publisher) was disconnected from the channel")
            }
        }
    })
}
