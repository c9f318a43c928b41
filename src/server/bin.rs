//! clubsync daemon binary
//!
//! A WebSocket server pushing topic-scoped entity sync to club management
//! clients.
//!
//! # Usage
//!
//! ```bash
//! clubsync-daemon --port 9480
//! clubsync-daemon --port 9480 --host 127.0.0.1
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use clubsync::config::SimilarityConfig;
use clubsync::server::{handle_connection, MemoryStore, RoomRegistry, TopicBroadcaster};

/// Clubsync sync daemon
#[derive(Parser, Debug)]
#[command(name = "clubsync-daemon")]
#[command(about = "Topic-scoped real-time sync daemon for club management")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "9480")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clubsync=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;

    let store = Arc::new(MemoryStore::with_reference_data(SimilarityConfig::default()));
    let rooms = Arc::new(RoomRegistry::new());
    let broadcaster = Arc::new(TopicBroadcaster::new(rooms, store));

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("clubsync daemon listening on ws://{}", addr);

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tracing::info!("accepted connection from {}", peer);
                let broadcaster = Arc::clone(&broadcaster);
                tokio::spawn(async move {
                    handle_connection(stream, broadcaster).await;
                });
            }
            Err(e) => {
                tracing::error!("failed to accept connection: {}", e);
            }
        }
    }
}
