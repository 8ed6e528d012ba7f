use std::{
    collections::HashMap,
    sync::{
        mpsc::{self, Receiver, Sender, TryRecvError},
        Arc, Mutex,
    },
};

use paxos_rs::{
    networking::{messages::Message, network::Network},
    types::identifier::Identifier,
};

/// A mock network stub which passes messages from and to threads using channels. Messages travel as
/// bytes, so every message goes through its wire encoding.
#[derive(Clone)]
pub(crate) struct NetworkStub {
    me: Identifier,
    all_peers: HashMap<Identifier, Sender<(Identifier, Vec<u8>)>>,
    inbox: Arc<Mutex<Receiver<(Identifier, Vec<u8>)>>>,
}

impl Network for NetworkStub {
    fn peers(&self) -> Vec<Identifier> {
        let mut peers: Vec<Identifier> = self
            .all_peers
            .keys()
            .copied()
            .filter(|peer| *peer != self.me)
            .collect();
        peers.sort();
        peers
    }

    fn send(&mut self, peer: Identifier, message: Message) {
        if let Some(peer) = self.all_peers.get(&peer) {
            let bytes = message.encode().unwrap();
            let _ = peer.send((self.me, bytes));
        }
    }

    fn recv(&mut self) -> Option<(Identifier, Message)> {
        match self.inbox.lock().unwrap().try_recv() {
            Ok((origin, bytes)) => Some((origin, Message::decode(&bytes).unwrap())),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => panic!(),
        }
    }
}

pub(crate) fn mock_network(peers: impl Iterator<Item = Identifier>) -> Vec<NetworkStub> {
    let mut all_peers = HashMap::new();
    let peer_and_inboxes: Vec<(Identifier, Receiver<(Identifier, Vec<u8>)>)> = peers
        .map(|peer| {
            let (sender, receiver) = mpsc::channel();
            all_peers.insert(peer, sender);

            (peer, receiver)
        })
        .collect();

    peer_and_inboxes
        .into_iter()
        .map(|(me, inbox)| NetworkStub {
            me,
            all_peers: all_peers.clone(),
            inbox: Arc::new(Mutex::new(inbox)),
        })
        .collect()
}
