//! Server side of the sync layer
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                   clubsync-daemon                            │
//! │                                                              │
//! │  WebSocket accept ──► Session per connection                 │
//! │    join/leave ──► TopicBroadcaster ──► RoomRegistry          │
//! │    get_data / action ──► DataStore (seam)                    │
//! │                                                              │
//! │  join      ⇒ snapshot push to that connection                │
//! │  mutation  ⇒ delta push to every room the result belongs to  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The dispatch model is one message at a time per connection; room and
//! store state are shared behind locks, and handlers that await the store
//! can interleave with other connections' handlers.

pub mod broadcaster;
pub mod connection;
pub mod local;
pub mod rooms;
pub mod session;
pub mod store;

pub use broadcaster::{topics_for, TopicBroadcaster};
pub use connection::handle_connection;
pub use local::{LocalConnection, LocalServer};
pub use rooms::{ConnId, RoomRegistry};
pub use session::Session;
pub use store::{ActionResult, DataStore, MemoryStore};
