//! WebSocket connection handling
//!
//! Accepts the handshake, registers the connection's outbound queue, and
//! pumps frames both ways until the peer goes away. Room membership dies
//! with the connection.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};

use crate::protocol::ClientMessage;
use crate::server::broadcaster::TopicBroadcaster;
use crate::server::rooms::new_conn_id;
use crate::server::session::Session;
use crate::server::store::DataStore;

/// Handle a single WebSocket connection to completion
pub async fn handle_connection<S: DataStore>(
    stream: TcpStream,
    broadcaster: Arc<TopicBroadcaster<S>>,
) {
    let addr = stream.peer_addr().ok();
    let mut ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::error!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let conn = new_conn_id();
    tracing::info!("connection {} opened from {:?}", conn, addr);

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    broadcaster.rooms().register(conn.clone(), outbound_tx);
    let session = Session::new(conn.clone(), broadcaster.clone());

    loop {
        tokio::select! {
            msg = ws.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(msg) => session.handle(msg).await,
                            Err(e) => tracing::warn!("{} sent bad frame: {}", conn, e),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws.send(Message::Pong(data)).await;
                    }
                    Some(Err(e)) => {
                        tracing::warn!("{} socket error: {}", conn, e);
                        break;
                    }
                    _ => {}
                }
            }

            outgoing = outbound_rx.recv() => {
                match outgoing {
                    Some(msg) => {
                        match serde_json::to_string(&msg) {
                            Ok(json) => {
                                if ws.send(Message::Text(json)).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => tracing::error!("{} frame encode failed: {}", conn, e),
                        }
                    }
                    None => break,
                }
            }
        }
    }

    broadcaster.rooms().unregister(&conn);
    tracing::info!("connection {} closed", conn);
}
