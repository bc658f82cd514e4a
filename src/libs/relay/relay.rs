use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::mpsc;
use std::sync::mpsc::{Receiver, Sender};
use log::{debug, info};
use crate::libs::bridge::bridge_event::RelayMessage;

/// How many of the most recent messages a newly connected subscriber is sent first.
pub const REPLAY_SIZE: usize = 10;

pub type ConnectionId = u64;

struct RelayState {
    next_connection_id: ConnectionId,
    history: VecDeque<RelayMessage>,
    subscribers: Vec<(ConnectionId, Sender<RelayMessage>)>,
}

/// The hub that connected sessions talk through: whatever one connection publishes goes to every
/// other connection.
pub struct Relay {
    state: Mutex<RelayState>,
}

impl Relay {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RelayState {
                next_connection_id: 1,
                history: VecDeque::with_capacity(REPLAY_SIZE),
                subscribers: vec![],
            })
        }
    }

    /// Register a new connection. Its receiver already holds the replayed history.
    pub fn connect(&self) -> Result<(ConnectionId, Receiver<RelayMessage>), String> {
        let mut state = self.state.lock().map_err(|_| "Relay state poisoned".to_owned())?;
        let id = state.next_connection_id;
        state.next_connection_id += 1;
        let (tx, rx) = mpsc::channel();
        for message in &state.history {
            let _ = tx.send(message.clone());
        }
        state.subscribers.push((id, tx));
        info!("Relay connection {} joined; {} connected", id, state.subscribers.len());
        Ok((id, rx))
    }

    pub fn disconnect(&self, id: ConnectionId) {
        if let Ok(mut state) = self.state.lock() {
            state.subscribers.retain(|(subscriber, _)| *subscriber != id);
            info!("Relay connection {} left; {} connected", id, state.subscribers.len());
        }
    }

    /// Forward a message to every connection except the one it came from, and remember it for
    /// replay. Subscribers whose receiver has gone are dropped.
    pub fn publish(&self, from: ConnectionId, message: RelayMessage) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(_) => return,
        };
        debug!("Relay connection {} published {}", from, message);
        if state.history.len() == REPLAY_SIZE {
            state.history.pop_front();
        }
        state.history.push_back(message.clone());
        state.subscribers.retain(|(subscriber, tx)| {
            *subscriber == from || tx.send(message.clone()).is_ok()
        });
    }

    pub fn connection_count(&self) -> usize {
        self.state.lock().map(|state| state.subscribers.len()).unwrap_or(0)
    }
}

#[cfg(test)]
#[path = "./relay_spec.rs"]
mod relay_spec;
