//! Client channel abstraction
//!
//! A bidirectional, room-addressable event channel: fire-and-forget room
//! management, id-correlated request/ack calls, and a broadcast stream of
//! lifecycle and push events. The transport behind it is swappable — a
//! reconnecting WebSocket in production, an in-process wire in tests — and
//! the client half survives transport restarts: room membership is replayed
//! by the subscription manager on every `Connected` event.
//!
//! There is no request timeout. If the transport stays up but the server
//! never acks, the caller's future pends forever; only dropping the client
//! itself resolves it with `ChannelClosed`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::error::{Result, SyncError};
use crate::protocol::{
    AckPayload, ActionRequest, ClientMessage, FetchRequest, ServerMessage, SyncEvent, UpdateEvent,
};
use crate::topic::Topic;

/// Lifecycle and push events observed on the channel
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    Connected,
    Disconnected,
    Sync { topic: Topic, event: SyncEvent },
    Update(UpdateEvent),
}

/// Join/leave emission seam, so subscription state can be tested without a
/// live channel
pub trait RoomTransport: Send + Sync + 'static {
    fn join_room(&self, topic: &Topic);
    fn leave_room(&self, topic: &Topic);
}

/// The client half of the channel
pub struct ChannelClient {
    outbound: mpsc::UnboundedSender<ClientMessage>,
    pending: Mutex<HashMap<u64, oneshot::Sender<AckPayload>>>,
    next_id: AtomicU64,
    events: broadcast::Sender<ChannelEvent>,
    connected: AtomicBool,
}

impl ChannelClient {
    /// Create a detached client and the wire half a transport drives
    pub fn new() -> (Arc<Self>, ChannelWire) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(256);
        let client = Arc::new(Self {
            outbound: outbound_tx,
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            events,
            connected: AtomicBool::new(false),
        });
        let wire = ChannelWire {
            outgoing: outbound_rx,
            sink: ChannelSink { client: client.clone() },
        };
        (client, wire)
    }

    /// Connect over WebSocket; the transport reconnects until the client is
    /// dropped
    pub fn connect_ws(url: String) -> Arc<Self> {
        let (client, wire) = Self::new();
        tokio::spawn(run_ws_transport(url, wire));
        client
    }

    /// Observe lifecycle and push events
    pub fn subscribe_events(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }

    /// Current connectivity; cached data stays readable while this is false
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Point fetch; `None` when the server has no such entity
    pub async fn get_data(&self, request: FetchRequest) -> Result<Option<serde_json::Value>> {
        let (id, rx) = self.register_pending();
        self.send(ClientMessage::GetData { id, request })?;
        match rx.await.map_err(|_| SyncError::ChannelClosed)? {
            AckPayload::Ok { data: serde_json::Value::Null } => Ok(None),
            AckPayload::Ok { data } => Ok(Some(data)),
            AckPayload::Error { message } => Err(SyncError::RequestFailed { message }),
        }
    }

    /// Mutation round trip; the error branch carries the rejection message
    pub async fn action(&self, request: ActionRequest) -> Result<serde_json::Value> {
        let (id, rx) = self.register_pending();
        self.send(ClientMessage::Action { id, request })?;
        match rx.await.map_err(|_| SyncError::ChannelClosed)? {
            AckPayload::Ok { data } => Ok(data),
            AckPayload::Error { message } => Err(SyncError::ActionRejected { message }),
        }
    }

    fn register_pending(&self) -> (u64, oneshot::Receiver<AckPayload>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);
        (id, rx)
    }

    fn send(&self, msg: ClientMessage) -> Result<()> {
        self.outbound.send(msg).map_err(|_| SyncError::ChannelClosed)
    }
}

impl RoomTransport for ChannelClient {
    fn join_room(&self, topic: &Topic) {
        let _ = self.outbound.send(ClientMessage::JoinRoom { topic: topic.to_string() });
    }

    fn leave_room(&self, topic: &Topic) {
        let _ = self.outbound.send(ClientMessage::LeaveRoom { topic: topic.to_string() });
    }
}

/// Transport-facing half of a channel
///
/// The two parts are separate fields so a transport loop can hold the
/// outgoing receiver mutably while delivering through the sink.
pub struct ChannelWire {
    /// Messages the client wants on the wire
    pub outgoing: mpsc::UnboundedReceiver<ClientMessage>,
    /// Inbound frame and lifecycle delivery
    pub sink: ChannelSink,
}

#[derive(Clone)]
pub struct ChannelSink {
    client: Arc<ChannelClient>,
}

impl ChannelSink {
    /// Route one server frame: acks resolve their pending call, pushes land
    /// on the event stream
    pub fn deliver(&self, msg: ServerMessage) {
        match msg {
            ServerMessage::Ack { id, payload } => {
                if let Some(tx) = self.client.pending.lock().remove(&id) {
                    let _ = tx.send(payload);
                } else {
                    tracing::warn!("ack for unknown request id {}", id);
                }
            }
            ServerMessage::Update { event } => {
                let _ = self.client.events.send(ChannelEvent::Update(event));
            }
            ServerMessage::Sync { topic, event } => match Topic::parse(&topic) {
                Ok(topic) => {
                    let _ = self.client.events.send(ChannelEvent::Sync { topic, event });
                }
                Err(e) => tracing::warn!("sync for unparseable topic: {}", e),
            },
        }
    }

    pub fn connected(&self) {
        self.client.connected.store(true, Ordering::Relaxed);
        let _ = self.client.events.send(ChannelEvent::Connected);
    }

    pub fn disconnected(&self) {
        self.client.connected.store(false, Ordering::Relaxed);
        let _ = self.client.events.send(ChannelEvent::Disconnected);
    }
}

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

async fn run_ws_transport(url: String, wire: ChannelWire) {
    let ChannelWire { mut outgoing, sink } = wire;
    loop {
        let (ws, _) = match connect_async(url.as_str()).await {
            Ok(ok) => ok,
            Err(e) => {
                tracing::warn!("connect to {} failed: {}", url, e);
                tokio::time::sleep(RECONNECT_DELAY).await;
                continue;
            }
        };
        tracing::info!("connected to {}", url);
        let (mut ws_sink, mut ws_stream) = ws.split();
        sink.connected();

        loop {
            tokio::select! {
                msg = outgoing.recv() => {
                    match msg {
                        Some(msg) => {
                            let json = match serde_json::to_string(&msg) {
                                Ok(json) => json,
                                Err(e) => {
                                    tracing::error!("frame encode failed: {}", e);
                                    continue;
                                }
                            };
                            if ws_sink.send(Message::Text(json)).await.is_err() {
                                break;
                            }
                        }
                        // Client dropped; transport has nothing left to do
                        None => return,
                    }
                }

                incoming = ws_stream.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<ServerMessage>(&text) {
                                Ok(msg) => sink.deliver(msg),
                                Err(e) => tracing::warn!("bad server frame: {}", e),
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(e)) => {
                            tracing::warn!("socket error: {}", e);
                            break;
                        }
                        _ => {}
                    }
                }
            }
        }

        sink.disconnected();
        tracing::info!("disconnected from {}; retrying", url);
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}
