//! clubsync: topic-scoped real-time entity sync
//!
//! Keeps many clients' partial, normalized replicas of server-owned club
//! entities (organizations, teams, venues, events, games, people,
//! memberships) fresh in near-real-time, pushing only to the subset each
//! client currently cares about.
//!
//! Server side: a topic broadcaster that scopes deltas to room members and
//! pushes a full snapshot the instant a connection joins a room — there is
//! no window between "subscribed" and "first data". Client side: a
//! subscription lifecycle manager with debounced teardown, an upsert-by-id
//! merge cache with synchronous listener fan-out, lazy discovery of
//! referenced-but-unknown entities, and a hybrid fuzzy search that surfaces
//! probable duplicate organizations before creation.
//!
//! # Example
//!
//! ```ignore
//! use clubsync::client::{Interest, SyncClient};
//! use clubsync::client::channel::ChannelClient;
//! use clubsync::config::SyncConfig;
//!
//! let channel = ChannelClient::connect_ws("ws://127.0.0.1:9480".into());
//! let client = SyncClient::new(channel, SyncConfig::default());
//! client.init();
//!
//! client.subscriptions().subscribe(Interest::OrganizationData("org-1".into()));
//! // ... TEAMS_SYNC etc. arrive and fold into client.cache()
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod protocol;
pub mod server;
pub mod similarity;
pub mod topic;

pub use config::{SimilarityConfig, SyncConfig};
pub use error::{Result, SyncError};
pub use model::{
    EntityKind, EntityRef, Event, Game, GameStatus, Notification, OrgMemberPayload, Organization,
    OrganizationMembership, OrganizationSummary, Person, Record, Role, Sport, Team,
    TeamMemberPayload, TeamMembership, Venue,
};
pub use protocol::{
    AckPayload, ActionRequest, ClientMessage, FetchRequest, ServerMessage, SyncEvent, UpdateEvent,
};
pub use similarity::{rank_organizations, score_organization, ScoredMatch};
pub use topic::{OrgSubtopic, Topic};
