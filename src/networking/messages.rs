/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The top-level message type that replicas exchange through the [Network](super::network::Network).

use borsh::{BorshDeserialize, BorshSerialize};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    io,
};

use crate::{
    partitioned::messages::LeaderChange,
    paxos::messages::PaxosMessage,
    types::{
        partition::Partition,
        request::{Reply, Request, Ticket},
    },
};

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum Message {
    /// A client request, either fresh from a local client or forwarded by another replica.
    Request(Request),
    /// The reply to a request that originated at the receiving replica.
    Reply(RoutedReply),
    /// A phase message of the consensus instance named by its partition.
    Paxos(Envelope),
    LeaderChange(LeaderChange),
}

impl Message {
    pub fn paxos(partition: Partition, message: PaxosMessage) -> Message {
        Message::Paxos(Envelope { partition, message })
    }

    /// Serialize into the bytes sent over the wire.
    pub fn encode(&self) -> Result<Vec<u8>, MessageCodecError> {
        Ok(self.try_to_vec()?)
    }

    /// Deserialize from bytes produced by [encode](Message::encode).
    pub fn decode(bytes: &[u8]) -> Result<Message, MessageCodecError> {
        Ok(Message::try_from_slice(bytes)?)
    }
}

impl From<Envelope> for Message {
    fn from(envelope: Envelope) -> Self {
        Message::Paxos(envelope)
    }
}

impl From<LeaderChange> for Message {
    fn from(leader_change: LeaderChange) -> Self {
        Message::LeaderChange(leader_change)
    }
}

/// A [PaxosMessage] tagged with the partition of the instance it is for.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Envelope {
    pub partition: Partition,
    pub message: PaxosMessage,
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct RoutedReply {
    pub ticket: Ticket,
    pub reply: Reply,
}

#[derive(Debug)]
pub enum MessageCodecError {
    Borsh(io::Error),
}

impl Display for MessageCodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            MessageCodecError::Borsh(err) => write!(f, "message codec error: {}", err),
        }
    }
}

impl Error for MessageCodecError {}

impl From<io::Error> for MessageCodecError {
    fn from(value: io::Error) -> Self {
        MessageCodecError::Borsh(value)
    }
}
