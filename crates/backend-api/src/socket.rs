//! Emit-to-room relay for websocket connections.
//!
//! Every connection is registered with the rooms it belongs to and an
//! outbound queue. Emitting to a set of rooms pushes one frame to each
//! connection that is in at least one of them. Connections whose queue is
//! full or closed are evicted and nothing is retried or replayed. The hub
//! holds the only sender of each queue, so eviction ends the receiver and
//! the session closes its socket.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

const CONNECTION_BUFFER: usize = 64;

pub type ConnectionId = u64;

/// Frame pushed to clients: `{"event": ..., "data": ...}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerFrame {
    pub event: String,
    pub data: Value,
}

impl ServerFrame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// A registered connection. Frames queued for `id` come out of `receiver`
/// in order until the hub evicts the connection.
pub struct Subscription {
    pub id: ConnectionId,
    pub receiver: mpsc::Receiver<ServerFrame>,
}

struct Connection {
    rooms: HashSet<String>,
    sender: mpsc::Sender<ServerFrame>,
}

#[derive(Default)]
struct Registry {
    next_id: ConnectionId,
    connections: HashMap<ConnectionId, Connection>,
}

#[derive(Clone, Default)]
pub struct SocketHub {
    registry: Arc<Mutex<Registry>>,
}

impl SocketHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_room(user_id: i64) -> String {
        format!("user-{user_id}")
    }

    pub fn company_room(company_id: i64) -> String {
        format!("company-{company_id}-mainchannel")
    }

    /// Register a connection in the given rooms
    pub async fn join<I>(&self, rooms: I) -> Subscription
    where
        I: IntoIterator<Item = String>,
    {
        let (sender, receiver) = mpsc::channel(CONNECTION_BUFFER);
        let mut registry = self.registry.lock().await;
        registry.next_id += 1;
        let id = registry.next_id;
        registry.connections.insert(
            id,
            Connection {
                rooms: rooms.into_iter().collect(),
                sender,
            },
        );
        debug!(connection = id, total = registry.connections.len(), "socket joined");

        Subscription { id, receiver }
    }

    pub async fn leave(&self, id: ConnectionId) {
        let mut registry = self.registry.lock().await;
        if registry.connections.remove(&id).is_some() {
            debug!(connection = id, total = registry.connections.len(), "socket left");
        }
    }

    /// Queue a frame for a single connection, evicting it when its queue
    /// is full or closed. Returns whether the frame was queued.
    pub async fn send_to(&self, id: ConnectionId, frame: ServerFrame) -> bool {
        let mut registry = self.registry.lock().await;
        let Some(connection) = registry.connections.get(&id) else {
            return false;
        };
        match connection.sender.try_send(frame) {
            Ok(()) => true,
            Err(error) => {
                warn!(connection = id, %error, "dropping socket connection");
                registry.connections.remove(&id);
                false
            }
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.registry.lock().await.connections.len()
    }

    /// Deliver `event` once to every connection in any of `rooms`.
    /// Returns the number of connections the frame was queued for.
    pub async fn emit_to<I, R>(&self, rooms: I, event: &str, data: Value) -> usize
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        let rooms: HashSet<String> = rooms.into_iter().map(Into::into).collect();
        if rooms.is_empty() {
            return 0;
        }

        let frame = ServerFrame::new(event, data);
        let mut registry = self.registry.lock().await;
        let mut dropped = Vec::new();
        let mut delivered = 0;

        for (id, connection) in &registry.connections {
            if connection.rooms.is_disjoint(&rooms) {
                continue;
            }
            match connection.sender.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(error) => {
                    warn!(connection = id, event, %error, "dropping socket connection");
                    dropped.push(*id);
                }
            }
        }

        for id in dropped {
            registry.connections.remove(&id);
        }

        debug!(event, delivered, "emitted socket event");
        delivered
    }

    /// Broadcast to every connection of one company
    pub async fn emit_to_company(&self, company_id: i64, event: &str, data: Value) -> usize {
        self.emit_to([Self::company_room(company_id)], event, data)
            .await
    }
}
