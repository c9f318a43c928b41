//! Client side of the sync layer
//!
//! The channel feeds one event pump per `SyncClient`; everything else hangs
//! off it: the subscription manager decides room membership, the merge
//! cache folds pushes into normalized per-type stores, discovery chases
//! foreign keys the cache has not seen, and the hybrid search scores
//! duplicates before an organization is created.

pub mod cache;
pub mod channel;
pub mod discovery;
pub mod search;
pub mod subscriptions;
pub mod sync_client;

pub use cache::{CacheChange, EntityCache, ListenerId, MutationState, MutationTicket};
pub use channel::{ChannelClient, ChannelEvent, ChannelSink, ChannelWire, RoomTransport};
pub use discovery::DiscoveryResolver;
pub use search::{hybrid_search, RecentOrganizations, SearchOutcome};
pub use subscriptions::{Interest, SubscriptionManager, SubscriptionState};
pub use sync_client::SyncClient;
