//! Hybrid duplicate search
//!
//! Before creating an organization, the caller searches for likely
//! duplicates. The client scores its bounded recently-seen cache instantly
//! and races that against the server's authoritative scored search under a
//! short timeout: whichever is ready first is returned, and when the local
//! result wins, the authoritative fetch still runs to completion in the
//! background so its organizations merge into the cache and supersede the
//! fast answer on the next read.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::client::cache::EntityCache;
use crate::client::channel::ChannelClient;
use crate::config::SyncConfig;
use crate::model::Organization;
use crate::protocol::FetchRequest;
use crate::similarity::{rank_organizations, ScoredMatch};

/// Bounded most-recently-seen organization cache, evicted oldest-first
pub struct RecentOrganizations {
    capacity: usize,
    entries: Mutex<VecDeque<Organization>>,
}

impl RecentOrganizations {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, entries: Mutex::new(VecDeque::new()) }
    }

    /// Note a seen organization; a known id is refreshed in place
    pub fn note(&self, org: Organization) {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.iter_mut().find(|o| o.id == org.id) {
            *existing = org;
            return;
        }
        entries.push_back(org);
        if entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Score the cached organizations against a query
    pub fn rank(&self, config: &SyncConfig, query: &str) -> Vec<ScoredMatch> {
        let entries = self.entries.lock();
        rank_organizations(&config.similarity, query, entries.iter(), config.similarity.client_limit)
    }
}

/// Result of a hybrid search
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub matches: Vec<ScoredMatch>,
    /// False when the fast local ranking won the race; the authoritative
    /// result still merges into the cache when it lands
    pub authoritative: bool,
}

/// Race the local ranking against the server's authoritative search
pub async fn hybrid_search(
    channel: Arc<ChannelClient>,
    cache: Arc<EntityCache>,
    recent: Arc<RecentOrganizations>,
    config: &SyncConfig,
    query: &str,
) -> SearchOutcome {
    let local = recent.rank(config, query);

    let request = FetchRequest::OrganizationSearch { query: query.to_string(), limit: None };
    let mut authoritative = Box::pin(async move {
        let data = match channel.get_data(request).await {
            Ok(Some(data)) => data,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!("authoritative search failed: {}", e);
                return Vec::new();
            }
        };
        let matches: Vec<ScoredMatch> = match serde_json::from_value(data) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!("authoritative search unparseable: {}", e);
                return Vec::new();
            }
        };
        // Server results may name organizations this client has never seen
        for m in &matches {
            cache.merge_organization(m.organization.clone());
            recent.note(m.organization.clone());
        }
        matches
    });

    match tokio::time::timeout(config.search_race_timeout, &mut authoritative).await {
        Ok(matches) => SearchOutcome { matches, authoritative: true },
        Err(_) => {
            // Let the authoritative search finish merging in the background
            tokio::spawn(authoritative);
            SearchOutcome { matches: local, authoritative: false }
        }
    }
}
