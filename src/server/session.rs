//! Per-connection message dispatch
//!
//! One `Session` per live connection. Messages are handled one at a time in
//! arrival order; room management is fire-and-forget, fetches and actions
//! are acked by request id. A failed action acks the error and never reaches
//! the broadcaster.

use std::sync::Arc;

use crate::protocol::{AckPayload, ClientMessage, ServerMessage};
use crate::server::broadcaster::TopicBroadcaster;
use crate::server::rooms::ConnId;
use crate::server::store::DataStore;
use crate::topic::Topic;

pub struct Session<S> {
    conn: ConnId,
    broadcaster: Arc<TopicBroadcaster<S>>,
}

impl<S: DataStore> Session<S> {
    pub fn new(conn: ConnId, broadcaster: Arc<TopicBroadcaster<S>>) -> Self {
        Self { conn, broadcaster }
    }

    pub fn conn(&self) -> &ConnId {
        &self.conn
    }

    pub async fn handle(&self, msg: ClientMessage) {
        match msg {
            ClientMessage::JoinRoom { topic } => match Topic::parse(&topic) {
                Ok(topic) => {
                    if let Err(e) = self.broadcaster.join(&self.conn, topic).await {
                        tracing::warn!("join failed for {}: {}", self.conn, e);
                    }
                }
                Err(e) => tracing::warn!("{} sent bad join: {}", self.conn, e),
            },

            ClientMessage::LeaveRoom { topic } => match Topic::parse(&topic) {
                Ok(topic) => self.broadcaster.leave(&self.conn, &topic),
                Err(e) => tracing::warn!("{} sent bad leave: {}", self.conn, e),
            },

            ClientMessage::GetData { id, request } => {
                let payload = match self.broadcaster.store().fetch(&request).await {
                    Ok(data) => AckPayload::Ok { data: data.unwrap_or(serde_json::Value::Null) },
                    Err(e) => AckPayload::Error { message: e.to_string() },
                };
                self.ack(id, payload);
            }

            ClientMessage::Action { id, request } => {
                match self.broadcaster.store().apply(request).await {
                    Ok(result) => {
                        self.ack(id, AckPayload::Ok { data: result.data.clone() });
                        self.broadcaster.broadcast_result(&result);
                    }
                    Err(e) => {
                        tracing::debug!("action rejected for {}: {}", self.conn, e);
                        self.ack(id, AckPayload::Error { message: e.to_string() });
                    }
                }
            }
        }
    }

    fn ack(&self, id: u64, payload: AckPayload) {
        self.broadcaster.rooms().send_to(&self.conn, ServerMessage::Ack { id, payload });
    }
}
