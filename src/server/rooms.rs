//! Connection registry and room membership
//!
//! Tracks the outbound sender for every live connection and which topic
//! rooms each connection has joined. Membership is connection-scoped: it is
//! dropped wholesale when the connection unregisters, which is why clients
//! replay their joins after a reconnect.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::protocol::ServerMessage;
use crate::topic::Topic;

/// Unique identifier for a live connection
pub type ConnId = String;

pub fn new_conn_id() -> ConnId {
    format!("conn_{}", uuid::Uuid::new_v4().as_simple())
}

/// Registry of live connections and their room memberships
#[derive(Default)]
pub struct RoomRegistry {
    conns: RwLock<HashMap<ConnId, mpsc::UnboundedSender<ServerMessage>>>,
    rooms: RwLock<HashMap<Topic, HashSet<ConnId>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection's outbound sender
    pub fn register(&self, conn: ConnId, sender: mpsc::UnboundedSender<ServerMessage>) {
        self.conns.write().insert(conn, sender);
    }

    /// Drop a connection and all of its room memberships
    pub fn unregister(&self, conn: &ConnId) {
        self.conns.write().remove(conn);
        let mut rooms = self.rooms.write();
        rooms.retain(|_, members| {
            members.remove(conn);
            !members.is_empty()
        });
    }

    /// Add a connection to a room; returns false if it was already a member
    pub fn join(&self, conn: &ConnId, topic: &Topic) -> bool {
        self.rooms.write().entry(topic.clone()).or_default().insert(conn.clone())
    }

    /// Remove a connection from a room
    pub fn leave(&self, conn: &ConnId, topic: &Topic) {
        let mut rooms = self.rooms.write();
        if let Some(members) = rooms.get_mut(topic) {
            members.remove(conn);
            if members.is_empty() {
                rooms.remove(topic);
            }
        }
    }

    /// Current member count of a room
    pub fn member_count(&self, topic: &Topic) -> usize {
        self.rooms.read().get(topic).map_or(0, HashSet::len)
    }

    /// Send a message to one connection
    pub fn send_to(&self, conn: &ConnId, msg: ServerMessage) {
        if let Some(sender) = self.conns.read().get(conn) {
            // A closed receiver means the connection is tearing down
            let _ = sender.send(msg);
        }
    }

    /// Send a message to every member of a room; no members is a no-op
    pub fn broadcast(&self, topic: &Topic, msg: &ServerMessage) {
        let members: Vec<ConnId> = match self.rooms.read().get(topic) {
            Some(members) => members.iter().cloned().collect(),
            None => return,
        };
        let conns = self.conns.read();
        for conn in members {
            if let Some(sender) = conns.get(&conn) {
                let _ = sender.send(msg.clone());
            }
        }
    }
}
