//! The composed client
//!
//! One `SyncClient` per channel: it owns the merge cache, the subscription
//! manager, the discovery resolver, and the recently-seen organization set,
//! and pumps channel events into them. It is an explicit, constructed
//! component — inject the channel, call `init`, pass the client by
//! reference, call `dispose` when done — rather than ambient global state.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::client::cache::{CacheChange, EntityCache, ListenerId};
use crate::client::channel::{ChannelClient, ChannelEvent};
use crate::client::discovery::DiscoveryResolver;
use crate::client::search::{hybrid_search, RecentOrganizations, SearchOutcome};
use crate::client::subscriptions::SubscriptionManager;
use crate::config::SyncConfig;
use crate::error::Result;
use crate::model::{
    Event, Game, GameStatus, EntityKind, OrgMemberPayload, Organization, Team, TeamMemberPayload,
    Venue,
};
use crate::protocol::{ActionRequest, MemberRemoved, UpdateEvent};

pub struct SyncClient {
    channel: Arc<ChannelClient>,
    cache: Arc<EntityCache>,
    subscriptions: SubscriptionManager,
    discovery: Arc<DiscoveryResolver>,
    recent: Arc<RecentOrganizations>,
    config: SyncConfig,
    pump: Mutex<Option<JoinHandle<()>>>,
    recent_listener: Mutex<Option<ListenerId>>,
}

impl SyncClient {
    pub fn new(channel: Arc<ChannelClient>, config: SyncConfig) -> Arc<Self> {
        let cache = Arc::new(EntityCache::new());
        let subscriptions =
            SubscriptionManager::new(channel.clone(), config.teardown_debounce);
        let discovery = DiscoveryResolver::new(channel.clone(), cache.clone());
        let recent = Arc::new(RecentOrganizations::new(config.recent_orgs_capacity));
        Arc::new(Self {
            channel,
            cache,
            subscriptions,
            discovery,
            recent,
            config,
            pump: Mutex::new(None),
            recent_listener: Mutex::new(None),
        })
    }

    /// Start pumping channel events into the cache; call once, right after
    /// construction
    pub fn init(self: &Arc<Self>) {
        // Every organization entering the cache also enters the
        // recently-seen set the local duplicate search scores
        let recent = self.recent.clone();
        let cache_weak = Arc::downgrade(&self.cache);
        let listener = self.cache.add_listener(move |change| {
            if let CacheChange::Merged { kind: EntityKind::Organization, id } = change {
                if let Some(cache) = cache_weak.upgrade() {
                    if let Some(org) = cache.organization(id) {
                        recent.note(org);
                    }
                }
            }
        });
        *self.recent_listener.lock() = Some(listener);

        let mut events = self.channel.subscribe_events();
        let cache = self.cache.clone();
        let subscriptions = self.subscriptions.clone();
        let discovery = self.discovery.clone();
        let pump = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(ChannelEvent::Connected) => {
                        tracing::info!("channel connected; replaying subscriptions");
                        subscriptions.replay();
                    }
                    Ok(ChannelEvent::Disconnected) => {
                        tracing::info!("channel disconnected; cache stays readable");
                    }
                    Ok(ChannelEvent::Sync { topic, event }) => {
                        tracing::debug!("sync for {}", topic);
                        let refs = cache.apply_sync(event);
                        discovery.scan(refs);
                    }
                    Ok(ChannelEvent::Update(event)) => {
                        let refs = cache.apply_update(event);
                        discovery.scan(refs);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("event pump lagged by {} events", n);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        *self.pump.lock() = Some(pump);
    }

    /// Stop the pump and cancel all pending teardown timers
    pub fn dispose(&self) {
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
        if let Some(listener) = self.recent_listener.lock().take() {
            self.cache.remove_listener(listener);
        }
        self.subscriptions.cancel_all();
    }

    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    pub fn channel(&self) -> &Arc<ChannelClient> {
        &self.channel
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }

    /// Rank likely duplicate organizations for `query`
    pub async fn search_organizations(&self, query: &str) -> SearchOutcome {
        hybrid_search(
            self.channel.clone(),
            self.cache.clone(),
            self.recent.clone(),
            &self.config,
            query,
        )
        .await
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    pub async fn create_organization(
        &self,
        name: &str,
        short_name: &str,
        description: Option<String>,
    ) -> Result<Organization> {
        let data = self
            .channel
            .action(ActionRequest::CreateOrganization {
                name: name.to_string(),
                short_name: short_name.to_string(),
                description,
            })
            .await?;
        let org: Organization = serde_json::from_value(data)?;
        self.cache.merge_organization(org.clone());
        Ok(org)
    }

    pub async fn add_team(
        &self,
        organization_id: &str,
        name: &str,
        sport_id: Option<String>,
    ) -> Result<Team> {
        let data = self
            .channel
            .action(ActionRequest::AddTeam {
                organization_id: organization_id.to_string(),
                name: name.to_string(),
                sport_id,
            })
            .await?;
        let team: Team = serde_json::from_value(data)?;
        let refs = self.cache.merge_team(team.clone());
        self.discovery.scan(refs);
        Ok(team)
    }

    /// Optimistic rename: the local record changes and listeners fire before
    /// the round trip; the authoritative response re-merges on success, and
    /// on failure the local write stays (no automatic rollback) while the
    /// error propagates to the caller.
    pub async fn rename_team(&self, id: &str, name: &str) -> Result<Team> {
        let ticket = self.cache.begin_mutation();
        self.cache.patch_team(id, |team| team.name = name.to_string());

        let result = self
            .channel
            .action(ActionRequest::UpdateTeam {
                id: id.to_string(),
                name: Some(name.to_string()),
            })
            .await;
        match result {
            Ok(data) => {
                self.cache.resolve_mutation(ticket, true);
                let team: Team = serde_json::from_value(data)?;
                self.cache.merge_team(team.clone());
                Ok(team)
            }
            Err(e) => {
                self.cache.resolve_mutation(ticket, false);
                Err(e)
            }
        }
    }

    pub async fn delete_team(&self, id: &str) -> Result<()> {
        let data = self
            .channel
            .action(ActionRequest::DeleteTeam { id: id.to_string() })
            .await?;
        let team: Team = serde_json::from_value(data)?;
        self.cache.apply_update(UpdateEvent::TeamDeleted(crate::protocol::TeamDeleted {
            id: team.id,
            organization_id: team.organization_id,
        }));
        Ok(())
    }

    pub async fn add_venue(&self, organization_id: &str, name: &str, address: &str) -> Result<Venue> {
        let data = self
            .channel
            .action(ActionRequest::AddVenue {
                organization_id: organization_id.to_string(),
                name: name.to_string(),
                address: address.to_string(),
            })
            .await?;
        let venue: Venue = serde_json::from_value(data)?;
        self.cache.merge_venue(venue.clone());
        Ok(venue)
    }

    pub async fn add_event(
        &self,
        organization_id: &str,
        name: &str,
        venue_id: Option<String>,
        starts_at: Option<String>,
    ) -> Result<Event> {
        let data = self
            .channel
            .action(ActionRequest::AddEvent {
                organization_id: organization_id.to_string(),
                name: name.to_string(),
                venue_id,
                starts_at,
            })
            .await?;
        let event: Event = serde_json::from_value(data)?;
        let refs = self.cache.merge_event(event.clone());
        self.discovery.scan(refs);
        Ok(event)
    }

    pub async fn add_game(
        &self,
        organization_id: &str,
        home_team_id: &str,
        away_team_id: &str,
        event_id: Option<String>,
        venue_id: Option<String>,
    ) -> Result<Game> {
        let data = self
            .channel
            .action(ActionRequest::AddGame {
                organization_id: organization_id.to_string(),
                home_team_id: home_team_id.to_string(),
                away_team_id: away_team_id.to_string(),
                event_id,
                venue_id,
                starts_at: None,
            })
            .await?;
        let game: Game = serde_json::from_value(data)?;
        let refs = self.cache.merge_game(game.clone());
        self.discovery.scan(refs);
        Ok(game)
    }

    /// Optimistic score update, same two-phase shape as `rename_team`
    pub async fn update_game_score(
        &self,
        id: &str,
        home_score: u32,
        away_score: u32,
        status: Option<GameStatus>,
    ) -> Result<Game> {
        let ticket = self.cache.begin_mutation();
        self.cache.patch_game(id, |game| {
            game.home_score = home_score;
            game.away_score = away_score;
            if let Some(status) = status {
                game.status = status;
            }
        });

        let result = self
            .channel
            .action(ActionRequest::UpdateGame {
                id: id.to_string(),
                status,
                home_score: Some(home_score),
                away_score: Some(away_score),
            })
            .await;
        match result {
            Ok(data) => {
                self.cache.resolve_mutation(ticket, true);
                let game: Game = serde_json::from_value(data)?;
                self.cache.merge_game(game.clone());
                Ok(game)
            }
            Err(e) => {
                self.cache.resolve_mutation(ticket, false);
                Err(e)
            }
        }
    }

    pub async fn add_team_member(
        &self,
        team_id: &str,
        person_id: Option<String>,
        name: Option<String>,
        role_id: Option<String>,
    ) -> Result<TeamMemberPayload> {
        let data = self
            .channel
            .action(ActionRequest::AddTeamMember {
                team_id: team_id.to_string(),
                person_id,
                name,
                email: None,
                role_id,
            })
            .await?;
        let payload: TeamMemberPayload = serde_json::from_value(data)?;
        let refs = self.cache.merge_team_member(payload.clone());
        self.discovery.scan(refs);
        Ok(payload)
    }

    pub async fn remove_team_member(&self, id: &str) -> Result<()> {
        let data = self
            .channel
            .action(ActionRequest::RemoveTeamMember { id: id.to_string() })
            .await?;
        let membership: crate::model::TeamMembership = serde_json::from_value(data)?;
        self.cache.apply_update(UpdateEvent::MemberRemoved(MemberRemoved {
            id: membership.id,
            team_id: membership.team_id,
        }));
        Ok(())
    }

    pub async fn add_org_member(
        &self,
        organization_id: &str,
        person_id: Option<String>,
        name: Option<String>,
        role_id: Option<String>,
    ) -> Result<OrgMemberPayload> {
        let data = self
            .channel
            .action(ActionRequest::AddOrgMember {
                organization_id: organization_id.to_string(),
                person_id,
                name,
                email: None,
                role_id,
            })
            .await?;
        let payload: OrgMemberPayload = serde_json::from_value(data)?;
        let refs = self.cache.merge_org_member(payload.clone());
        self.discovery.scan(refs);
        Ok(payload)
    }
}
