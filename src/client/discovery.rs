//! Lazy discovery of referenced entities
//!
//! Any entity merged into the cache may reference others by foreign key.
//! For each reference absent from the cache, the resolver issues a point
//! fetch and merges the response — which may itself reference further
//! unknowns, so resolution chains (a Game discovers its Teams, a Team its
//! Organization) until everything reachable is present or a fetch misses.
//!
//! Concurrent scans of the same reference are de-duplicated through an
//! in-flight set; merge is idempotent either way, the set just avoids
//! redundant round trips. A failed or empty fetch leaves the relation
//! unresolved until some later merge references it again.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::client::cache::EntityCache;
use crate::client::channel::ChannelClient;
use crate::model::{EntityKind, EntityRef};
use crate::protocol::FetchRequest;

pub struct DiscoveryResolver {
    channel: Arc<ChannelClient>,
    cache: Arc<EntityCache>,
    inflight: Mutex<HashSet<EntityRef>>,
}

impl DiscoveryResolver {
    pub fn new(channel: Arc<ChannelClient>, cache: Arc<EntityCache>) -> Arc<Self> {
        Arc::new(Self { channel, cache, inflight: Mutex::new(HashSet::new()) })
    }

    /// Resolve any of `refs` missing from the cache
    ///
    /// Fetches run as background tasks; completion is eventual, one extra
    /// round trip per missing relation.
    pub fn scan(self: &Arc<Self>, refs: Vec<EntityRef>) {
        for entity_ref in refs {
            if self.cache.contains(&entity_ref) {
                continue;
            }
            let Some(request) = fetch_request_for(&entity_ref) else {
                continue;
            };
            if !self.inflight.lock().insert(entity_ref.clone()) {
                continue;
            }

            let resolver = self.clone();
            tokio::spawn(async move {
                resolver.resolve(entity_ref, request).await;
            });
        }
    }

    async fn resolve(self: Arc<Self>, entity_ref: EntityRef, request: FetchRequest) {
        tracing::debug!("discovering {:?} {}", entity_ref.kind, entity_ref.id);
        let fetched = self.channel.get_data(request).await;
        self.inflight.lock().remove(&entity_ref);

        match fetched {
            Ok(Some(data)) => match self.cache.merge_fetched(entity_ref.kind, data) {
                Ok(next) => self.scan(next),
                Err(e) => {
                    tracing::warn!("discovered {:?} {} unparseable: {}", entity_ref.kind, entity_ref.id, e);
                }
            },
            Ok(None) => {
                tracing::debug!("{:?} {} not found; leaving unresolved", entity_ref.kind, entity_ref.id);
            }
            Err(e) => {
                tracing::warn!("discovery fetch for {:?} {} failed: {}", entity_ref.kind, entity_ref.id, e);
            }
        }
    }
}

/// The point fetch that resolves a reference; membership and notification
/// records are never referenced by foreign key, so they have none
fn fetch_request_for(entity_ref: &EntityRef) -> Option<FetchRequest> {
    let id = entity_ref.id.clone();
    match entity_ref.kind {
        EntityKind::Organization => Some(FetchRequest::Organization { id }),
        EntityKind::Team => Some(FetchRequest::Team { id }),
        EntityKind::Venue => Some(FetchRequest::Venue { id }),
        EntityKind::Event => Some(FetchRequest::Event { id }),
        EntityKind::Game => Some(FetchRequest::Game { id }),
        EntityKind::Person => Some(FetchRequest::Person { id }),
        // Reference lists are fetched whole
        EntityKind::Sport => Some(FetchRequest::Sports),
        EntityKind::Role => Some(FetchRequest::Roles),
        EntityKind::TeamMembership
        | EntityKind::OrganizationMembership
        | EntityKind::Notification => None,
    }
}
