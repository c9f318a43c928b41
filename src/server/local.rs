//! In-process transport
//!
//! Wires a `ChannelClient` straight to a `Session` over mpsc queues — the
//! full server loop with no TCP underneath. The integration suite runs on
//! this, including disconnect/reconnect simulation: a disconnect tears down
//! the server-side connection (room membership dies with it, exactly as on
//! a real socket), a reconnect attaches a fresh one and re-emits the
//! client's `Connected` lifecycle event.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::client::channel::{ChannelClient, ChannelWire};
use crate::server::broadcaster::TopicBroadcaster;
use crate::server::rooms::{new_conn_id, RoomRegistry};
use crate::server::session::Session;
use crate::server::store::DataStore;

pub struct LocalServer<S> {
    broadcaster: Arc<TopicBroadcaster<S>>,
}

enum Control {
    Disconnect,
    Reconnect,
}

/// A client connected through the in-process transport
pub struct LocalConnection {
    client: Arc<ChannelClient>,
    control: mpsc::UnboundedSender<Control>,
}

impl LocalConnection {
    pub fn client(&self) -> &Arc<ChannelClient> {
        &self.client
    }

    /// Simulate a transport drop; server-side membership is lost
    pub fn disconnect(&self) {
        let _ = self.control.send(Control::Disconnect);
    }

    /// Re-attach after a simulated drop
    pub fn reconnect(&self) {
        let _ = self.control.send(Control::Reconnect);
    }
}

impl<S: DataStore> LocalServer<S> {
    pub fn new(store: Arc<S>) -> Self {
        let rooms = Arc::new(RoomRegistry::new());
        Self { broadcaster: Arc::new(TopicBroadcaster::new(rooms, store)) }
    }

    pub fn broadcaster(&self) -> &Arc<TopicBroadcaster<S>> {
        &self.broadcaster
    }

    /// Attach a new client connection
    pub fn connect(&self) -> LocalConnection {
        let (client, wire) = ChannelClient::new();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_local_transport(self.broadcaster.clone(), wire, control_rx));
        LocalConnection { client, control: control_tx }
    }
}

async fn run_local_transport<S: DataStore>(
    broadcaster: Arc<TopicBroadcaster<S>>,
    wire: ChannelWire,
    mut control: mpsc::UnboundedReceiver<Control>,
) {
    let ChannelWire { mut outgoing, sink } = wire;
    loop {
        let conn = new_conn_id();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
        broadcaster.rooms().register(conn.clone(), outbound_tx);
        let session = Session::new(conn.clone(), broadcaster.clone());
        sink.connected();

        let mut attached = true;
        while attached {
            tokio::select! {
                ctrl = control.recv() => match ctrl {
                    Some(Control::Disconnect) => attached = false,
                    Some(Control::Reconnect) => {}
                    None => {
                        broadcaster.rooms().unregister(&conn);
                        return;
                    }
                },

                msg = outgoing.recv() => match msg {
                    Some(msg) => session.handle(msg).await,
                    None => {
                        broadcaster.rooms().unregister(&conn);
                        return;
                    }
                },

                pushed = outbound_rx.recv() => {
                    if let Some(msg) = pushed {
                        sink.deliver(msg);
                    }
                }
            }
        }

        broadcaster.rooms().unregister(&conn);
        sink.disconnected();

        // Hold until the client re-attaches
        loop {
            match control.recv().await {
                Some(Control::Reconnect) => break,
                Some(Control::Disconnect) => {}
                None => return,
            }
        }
    }
}
