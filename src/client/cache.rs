//! Normalized entity merge cache
//!
//! One ordered, id-unique collection per entity type. A merge replaces the
//! record with a matching id or appends, which makes snapshot application
//! idempotent. The cache is a partial replica: absence means "not subscribed
//! or fetched yet", never "deleted" — records leave only through an explicit
//! delete event, with no tombstone left behind.
//!
//! Every cache mutation notifies listeners synchronously, one notification
//! per merge or removal. Callbacks run outside the store lock but must not
//! register or remove listeners from inside a callback.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::model::{
    EntityKind, EntityRef, Event, Game, Notification, OrgMemberPayload, Organization,
    OrganizationMembership, OrganizationSummary, Person, Record, Role, Sport, Team,
    TeamMemberPayload, TeamMembership, Venue,
};
use crate::protocol::{SyncEvent, UpdateEvent};

/// A cache mutation, as seen by listeners
#[derive(Debug, Clone, PartialEq)]
pub enum CacheChange {
    Merged { kind: EntityKind, id: String },
    Removed { kind: EntityKind, id: String },
    SummaryChanged { organization_id: String },
}

pub type ListenerId = u64;

/// Two-phase state of an optimistic mutation
///
/// The local write lands first (`Applied`); the authoritative ack resolves
/// it. A failed mutation is not rolled back here — surfacing the error and
/// reverting is the caller's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    Applied,
    Committed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MutationTicket(u64);

#[derive(Default)]
struct Stores {
    organizations: Vec<Organization>,
    teams: Vec<Team>,
    venues: Vec<Venue>,
    events: Vec<Event>,
    games: Vec<Game>,
    people: Vec<Person>,
    team_memberships: Vec<TeamMembership>,
    org_memberships: Vec<OrganizationMembership>,
    sports: Vec<Sport>,
    roles: Vec<Role>,
    notifications: Vec<Notification>,
    summaries: Vec<OrganizationSummary>,
}

type Listener = Box<dyn Fn(&CacheChange) + Send + Sync>;

#[derive(Default)]
pub struct EntityCache {
    stores: RwLock<Stores>,
    listeners: RwLock<HashMap<ListenerId, Listener>>,
    next_listener: AtomicU64,
    mutations: Mutex<HashMap<MutationTicket, MutationState>>,
    next_mutation: AtomicU64,
}

fn upsert<T: Record>(list: &mut Vec<T>, entity: T) {
    match list.iter_mut().find(|existing| existing.id() == entity.id()) {
        Some(existing) => *existing = entity,
        None => list.push(entity),
    }
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    pub fn add_listener(&self, listener: impl Fn(&CacheChange) + Send + Sync + 'static) -> ListenerId {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners.write().insert(id, Box::new(listener));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners.write().remove(&id);
    }

    fn notify(&self, change: &CacheChange) {
        for listener in self.listeners.read().values() {
            listener(change);
        }
    }

    // ------------------------------------------------------------------
    // Generic merge/remove plumbing
    // ------------------------------------------------------------------

    fn merge_record<T: Record>(
        &self,
        select: impl FnOnce(&mut Stores) -> &mut Vec<T>,
        entity: T,
    ) -> Vec<EntityRef> {
        let refs = entity.references();
        let change = CacheChange::Merged { kind: T::KIND, id: entity.id().to_string() };
        {
            let mut stores = self.stores.write();
            upsert(select(&mut stores), entity);
        }
        self.notify(&change);
        refs
    }

    fn remove_record<T: Record>(
        &self,
        select: impl FnOnce(&mut Stores) -> &mut Vec<T>,
        id: &str,
    ) {
        let removed = {
            let mut stores = self.stores.write();
            let list = select(&mut stores);
            let before = list.len();
            list.retain(|entity| entity.id() != id);
            list.len() != before
        };
        if removed {
            self.notify(&CacheChange::Removed { kind: T::KIND, id: id.to_string() });
        }
    }

    fn patch_record<T: Record>(
        &self,
        select: impl FnOnce(&mut Stores) -> &mut Vec<T>,
        id: &str,
        patch: impl FnOnce(&mut T),
    ) -> bool {
        let patched = {
            let mut stores = self.stores.write();
            match select(&mut stores).iter_mut().find(|entity| entity.id() == id) {
                Some(entity) => {
                    patch(entity);
                    true
                }
                None => false,
            }
        };
        if patched {
            self.notify(&CacheChange::Merged { kind: T::KIND, id: id.to_string() });
        }
        patched
    }

    // ------------------------------------------------------------------
    // Per-type merges
    // ------------------------------------------------------------------

    pub fn merge_organization(&self, org: Organization) -> Vec<EntityRef> {
        self.merge_record(|s| &mut s.organizations, org)
    }

    pub fn merge_team(&self, team: Team) -> Vec<EntityRef> {
        self.merge_record(|s| &mut s.teams, team)
    }

    pub fn merge_venue(&self, venue: Venue) -> Vec<EntityRef> {
        self.merge_record(|s| &mut s.venues, venue)
    }

    pub fn merge_event(&self, event: Event) -> Vec<EntityRef> {
        self.merge_record(|s| &mut s.events, event)
    }

    pub fn merge_game(&self, game: Game) -> Vec<EntityRef> {
        self.merge_record(|s| &mut s.games, game)
    }

    pub fn merge_person(&self, person: Person) -> Vec<EntityRef> {
        self.merge_record(|s| &mut s.people, person)
    }

    pub fn merge_sport(&self, sport: Sport) -> Vec<EntityRef> {
        self.merge_record(|s| &mut s.sports, sport)
    }

    pub fn merge_role(&self, role: Role) -> Vec<EntityRef> {
        self.merge_record(|s| &mut s.roles, role)
    }

    pub fn merge_notification(&self, notification: Notification) -> Vec<EntityRef> {
        self.merge_record(|s| &mut s.notifications, notification)
    }

    /// Merge a team membership push, decomposing the enriched shape
    ///
    /// The embedded person merges first so the membership's person reference
    /// is already resolved when discovery scans it.
    pub fn merge_team_member(&self, payload: TeamMemberPayload) -> Vec<EntityRef> {
        if let Some(person) = payload.person {
            self.merge_person(person);
        }
        self.merge_record(|s| &mut s.team_memberships, payload.membership)
    }

    pub fn merge_org_member(&self, payload: OrgMemberPayload) -> Vec<EntityRef> {
        if let Some(person) = payload.person {
            self.merge_person(person);
        }
        self.merge_record(|s| &mut s.org_memberships, payload.membership)
    }

    pub fn merge_summary(&self, summary: OrganizationSummary) {
        let organization_id = summary.organization_id.clone();
        {
            let mut stores = self.stores.write();
            match stores
                .summaries
                .iter_mut()
                .find(|s| s.organization_id == organization_id)
            {
                Some(existing) => *existing = summary,
                None => stores.summaries.push(summary),
            }
        }
        self.notify(&CacheChange::SummaryChanged { organization_id });
    }

    // ------------------------------------------------------------------
    // Push application
    // ------------------------------------------------------------------

    /// Fold a delta push into the stores; returns the merged records'
    /// references for discovery
    pub fn apply_update(&self, event: UpdateEvent) -> Vec<EntityRef> {
        match event {
            UpdateEvent::TeamAdded(t) | UpdateEvent::TeamUpdated(t) => self.merge_team(t),
            UpdateEvent::TeamDeleted(d) => {
                self.remove_record(|s| &mut s.teams, &d.id);
                Vec::new()
            }
            UpdateEvent::VenueAdded(v) | UpdateEvent::VenueUpdated(v) => self.merge_venue(v),
            UpdateEvent::VenueDeleted(d) => {
                self.remove_record(|s| &mut s.venues, &d.id);
                Vec::new()
            }
            UpdateEvent::EventAdded(e) => self.merge_event(e),
            UpdateEvent::EventDeleted(d) => {
                self.remove_record(|s| &mut s.events, &d.id);
                Vec::new()
            }
            UpdateEvent::GameAdded(g) | UpdateEvent::GameUpdated(g) => self.merge_game(g),
            UpdateEvent::GameDeleted(d) => {
                self.remove_record(|s| &mut s.games, &d.id);
                Vec::new()
            }
            UpdateEvent::MemberAdded(p) => self.merge_team_member(p),
            UpdateEvent::MemberRemoved(r) => {
                self.remove_record(|s| &mut s.team_memberships, &r.id);
                Vec::new()
            }
            UpdateEvent::OrgMemberAdded(p) => self.merge_org_member(p),
            UpdateEvent::OrgMemberRemoved(r) => {
                self.remove_record(|s| &mut s.org_memberships, &r.id);
                Vec::new()
            }
            UpdateEvent::OrganizationUpdated(o) => self.merge_organization(o),
            UpdateEvent::SummaryUpdated(s) => {
                self.merge_summary(s);
                Vec::new()
            }
            UpdateEvent::NotificationAdded(n) => self.merge_notification(n),
        }
    }

    /// Fold a snapshot push into the stores
    pub fn apply_sync(&self, event: SyncEvent) -> Vec<EntityRef> {
        match event {
            SyncEvent::TeamsSync(list) => {
                list.into_iter().flat_map(|t| self.merge_team(t)).collect()
            }
            SyncEvent::VenuesSync(list) => {
                list.into_iter().flat_map(|v| self.merge_venue(v)).collect()
            }
            SyncEvent::EventsSync(list) => {
                list.into_iter().flat_map(|e| self.merge_event(e)).collect()
            }
            SyncEvent::GamesSync(list) => {
                list.into_iter().flat_map(|g| self.merge_game(g)).collect()
            }
            SyncEvent::MembersSync(list) => {
                list.into_iter().flat_map(|m| self.merge_team_member(m)).collect()
            }
            SyncEvent::OrgMembersSync(list) => {
                list.into_iter().flat_map(|m| self.merge_org_member(m)).collect()
            }
            SyncEvent::SummarySync(s) => {
                self.merge_summary(s);
                Vec::new()
            }
            SyncEvent::TeamSync(t) => self.merge_team(t),
            SyncEvent::VenueSync(v) => self.merge_venue(v),
            SyncEvent::EventSync(e) => self.merge_event(e),
            SyncEvent::GameSync(g) => self.merge_game(g),
            SyncEvent::NotificationsSync(list) => {
                list.into_iter().flat_map(|n| self.merge_notification(n)).collect()
            }
            SyncEvent::SportsSync(list) => {
                list.into_iter().flat_map(|s| self.merge_sport(s)).collect()
            }
            SyncEvent::RolesSync(list) => {
                list.into_iter().flat_map(|r| self.merge_role(r)).collect()
            }
        }
    }

    /// Merge a point-fetched payload by kind; returns its references
    pub fn merge_fetched(
        &self,
        kind: EntityKind,
        data: serde_json::Value,
    ) -> crate::error::Result<Vec<EntityRef>> {
        let refs = match kind {
            EntityKind::Organization => self.merge_organization(serde_json::from_value(data)?),
            EntityKind::Team => self.merge_team(serde_json::from_value(data)?),
            EntityKind::Venue => self.merge_venue(serde_json::from_value(data)?),
            EntityKind::Event => self.merge_event(serde_json::from_value(data)?),
            EntityKind::Game => self.merge_game(serde_json::from_value(data)?),
            EntityKind::Person => self.merge_person(serde_json::from_value(data)?),
            // Sports and roles are fetched as whole reference lists
            EntityKind::Sport => {
                let list: Vec<Sport> = serde_json::from_value(data)?;
                list.into_iter().flat_map(|s| self.merge_sport(s)).collect()
            }
            EntityKind::Role => {
                let list: Vec<Role> = serde_json::from_value(data)?;
                list.into_iter().flat_map(|r| self.merge_role(r)).collect()
            }
            EntityKind::TeamMembership => {
                self.merge_team_member(serde_json::from_value(data)?)
            }
            EntityKind::OrganizationMembership => {
                self.merge_org_member(serde_json::from_value(data)?)
            }
            EntityKind::Notification => self.merge_notification(serde_json::from_value(data)?),
        };
        Ok(refs)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn contains(&self, entity_ref: &EntityRef) -> bool {
        let stores = self.stores.read();
        let id = entity_ref.id.as_str();
        match entity_ref.kind {
            EntityKind::Organization => stores.organizations.iter().any(|e| e.id == id),
            EntityKind::Team => stores.teams.iter().any(|e| e.id == id),
            EntityKind::Venue => stores.venues.iter().any(|e| e.id == id),
            EntityKind::Event => stores.events.iter().any(|e| e.id == id),
            EntityKind::Game => stores.games.iter().any(|e| e.id == id),
            EntityKind::Person => stores.people.iter().any(|e| e.id == id),
            EntityKind::TeamMembership => stores.team_memberships.iter().any(|e| e.id == id),
            EntityKind::OrganizationMembership => {
                stores.org_memberships.iter().any(|e| e.id == id)
            }
            EntityKind::Sport => stores.sports.iter().any(|e| e.id == id),
            EntityKind::Role => stores.roles.iter().any(|e| e.id == id),
            EntityKind::Notification => stores.notifications.iter().any(|e| e.id == id),
        }
    }

    pub fn organizations(&self) -> Vec<Organization> {
        self.stores.read().organizations.clone()
    }

    pub fn organization(&self, id: &str) -> Option<Organization> {
        self.stores.read().organizations.iter().find(|o| o.id == id).cloned()
    }

    pub fn teams(&self) -> Vec<Team> {
        self.stores.read().teams.clone()
    }

    pub fn team(&self, id: &str) -> Option<Team> {
        self.stores.read().teams.iter().find(|t| t.id == id).cloned()
    }

    pub fn teams_of(&self, organization_id: &str) -> Vec<Team> {
        self.stores
            .read()
            .teams
            .iter()
            .filter(|t| t.organization_id == organization_id)
            .cloned()
            .collect()
    }

    pub fn venue(&self, id: &str) -> Option<Venue> {
        self.stores.read().venues.iter().find(|v| v.id == id).cloned()
    }

    pub fn venues_of(&self, organization_id: &str) -> Vec<Venue> {
        self.stores
            .read()
            .venues
            .iter()
            .filter(|v| v.organization_id == organization_id)
            .cloned()
            .collect()
    }

    pub fn event(&self, id: &str) -> Option<Event> {
        self.stores.read().events.iter().find(|e| e.id == id).cloned()
    }

    pub fn events_of(&self, organization_id: &str) -> Vec<Event> {
        self.stores
            .read()
            .events
            .iter()
            .filter(|e| e.organization_id == organization_id)
            .cloned()
            .collect()
    }

    pub fn game(&self, id: &str) -> Option<Game> {
        self.stores.read().games.iter().find(|g| g.id == id).cloned()
    }

    pub fn games_of(&self, organization_id: &str) -> Vec<Game> {
        self.stores
            .read()
            .games
            .iter()
            .filter(|g| g.organization_id == organization_id)
            .cloned()
            .collect()
    }

    pub fn person(&self, id: &str) -> Option<Person> {
        self.stores.read().people.iter().find(|p| p.id == id).cloned()
    }

    pub fn members_of_team(&self, team_id: &str) -> Vec<TeamMembership> {
        self.stores
            .read()
            .team_memberships
            .iter()
            .filter(|m| m.team_id == team_id)
            .cloned()
            .collect()
    }

    pub fn members_of_org(&self, organization_id: &str) -> Vec<OrganizationMembership> {
        self.stores
            .read()
            .org_memberships
            .iter()
            .filter(|m| m.organization_id == organization_id)
            .cloned()
            .collect()
    }

    pub fn sports(&self) -> Vec<Sport> {
        self.stores.read().sports.clone()
    }

    pub fn roles(&self) -> Vec<Role> {
        self.stores.read().roles.clone()
    }

    pub fn notifications_of(&self, person_id: &str) -> Vec<Notification> {
        self.stores
            .read()
            .notifications
            .iter()
            .filter(|n| n.person_id == person_id)
            .cloned()
            .collect()
    }

    pub fn summary_of(&self, organization_id: &str) -> Option<OrganizationSummary> {
        self.stores
            .read()
            .summaries
            .iter()
            .find(|s| s.organization_id == organization_id)
            .cloned()
    }

    // ------------------------------------------------------------------
    // Optimistic mutation
    // ------------------------------------------------------------------

    /// Record the local phase of an optimistic write
    pub fn begin_mutation(&self) -> MutationTicket {
        let ticket = MutationTicket(self.next_mutation.fetch_add(1, Ordering::Relaxed));
        self.mutations.lock().insert(ticket, MutationState::Applied);
        ticket
    }

    /// Resolve an optimistic write once the authoritative ack lands
    pub fn resolve_mutation(&self, ticket: MutationTicket, committed: bool) {
        let state = if committed { MutationState::Committed } else { MutationState::Failed };
        self.mutations.lock().insert(ticket, state);
    }

    pub fn mutation_state(&self, ticket: MutationTicket) -> Option<MutationState> {
        self.mutations.lock().get(&ticket).copied()
    }

    /// Optimistically patch a team in place; listeners fire if it exists
    pub fn patch_team(&self, id: &str, patch: impl FnOnce(&mut Team)) -> bool {
        self.patch_record(|s| &mut s.teams, id, patch)
    }

    /// Optimistically patch a game in place
    pub fn patch_game(&self, id: &str, patch: impl FnOnce(&mut Game)) -> bool {
        self.patch_record(|s| &mut s.games, id, patch)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use super::*;

    fn team(id: &str, org: &str, name: &str) -> Team {
        Team {
            id: id.into(),
            organization_id: org.into(),
            name: name.into(),
            sport_id: None,
        }
    }

    #[test]
    fn merge_upserts_by_id() {
        let cache = EntityCache::new();
        cache.merge_team(team("team-1", "org-1", "Ravens"));
        cache.merge_team(team("team-1", "org-1", "Crows"));

        let teams = cache.teams();
        assert_eq!(teams.len(), 1);
        assert_eq!(teams[0].name, "Crows");
    }

    #[test]
    fn snapshot_application_is_idempotent() {
        let cache = EntityCache::new();
        let sync = SyncEvent::TeamsSync(vec![
            team("team-1", "org-1", "Ravens"),
            team("team-2", "org-1", "Crows"),
        ]);
        cache.apply_sync(sync.clone());
        let first = cache.teams();
        cache.apply_sync(sync);
        assert_eq!(cache.teams(), first);
    }

    #[test]
    fn every_merge_notifies_exactly_once() {
        let cache = EntityCache::new();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        cache.add_listener(move |_| {
            seen.fetch_add(1, Ordering::Relaxed);
        });

        cache.apply_sync(SyncEvent::TeamsSync(vec![
            team("team-1", "org-1", "Ravens"),
            team("team-2", "org-1", "Crows"),
        ]));
        assert_eq!(count.load(Ordering::Relaxed), 2);

        cache.apply_update(UpdateEvent::TeamAdded(team("team-3", "org-1", "Thirds")));
        assert_eq!(count.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn removed_listener_stops_firing() {
        let cache = EntityCache::new();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let id = cache.add_listener(move |_| {
            seen.fetch_add(1, Ordering::Relaxed);
        });

        cache.merge_team(team("team-1", "org-1", "Ravens"));
        cache.remove_listener(id);
        cache.merge_team(team("team-2", "org-1", "Crows"));
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn enriched_member_push_fills_both_stores() {
        let cache = EntityCache::new();
        let payload = TeamMemberPayload {
            membership: TeamMembership {
                id: "tm-1".into(),
                team_id: "team-1".into(),
                person_id: "person-1".into(),
                role_id: None,
            },
            person: Some(Person {
                id: "person-1".into(),
                name: "Sam Ortiz".into(),
                email: None,
            }),
        };
        cache.apply_update(UpdateEvent::MemberAdded(payload));

        assert_eq!(cache.members_of_team("team-1").len(), 1);
        assert_eq!(cache.person("person-1").unwrap().name, "Sam Ortiz");
    }

    #[test]
    fn raw_member_push_merges_membership_only() {
        let cache = EntityCache::new();
        let payload = TeamMemberPayload {
            membership: TeamMembership {
                id: "tm-1".into(),
                team_id: "team-1".into(),
                person_id: "person-1".into(),
                role_id: None,
            },
            person: None,
        };
        cache.apply_update(UpdateEvent::MemberAdded(payload));
        assert_eq!(cache.members_of_team("team-1").len(), 1);
        assert!(cache.person("person-1").is_none());
    }

    #[test]
    fn delete_removes_without_tombstone() {
        let cache = EntityCache::new();
        cache.merge_team(team("team-1", "org-1", "Ravens"));
        cache.apply_update(UpdateEvent::TeamDeleted(crate::protocol::TeamDeleted {
            id: "team-1".into(),
            organization_id: "org-1".into(),
        }));
        assert!(cache.team("team-1").is_none());

        // a later merge brings it back as a fresh record
        cache.merge_team(team("team-1", "org-1", "Ravens"));
        assert!(cache.team("team-1").is_some());
    }

    #[test]
    fn delete_of_absent_record_does_not_notify() {
        let cache = EntityCache::new();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        cache.add_listener(move |_| {
            seen.fetch_add(1, Ordering::Relaxed);
        });
        cache.apply_update(UpdateEvent::TeamDeleted(crate::protocol::TeamDeleted {
            id: "missing".into(),
            organization_id: "org-1".into(),
        }));
        assert_eq!(count.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn optimistic_patch_then_resolve() {
        let cache = EntityCache::new();
        cache.merge_team(team("team-1", "org-1", "Ravens"));

        let ticket = cache.begin_mutation();
        assert!(cache.patch_team("team-1", |t| t.name = "Night Ravens".into()));
        assert_eq!(cache.mutation_state(ticket), Some(MutationState::Applied));
        assert_eq!(cache.team("team-1").unwrap().name, "Night Ravens");

        cache.resolve_mutation(ticket, true);
        assert_eq!(cache.mutation_state(ticket), Some(MutationState::Committed));
    }

    #[test]
    fn failed_mutation_keeps_the_local_write() {
        let cache = EntityCache::new();
        cache.merge_team(team("team-1", "org-1", "Ravens"));
        let ticket = cache.begin_mutation();
        cache.patch_team("team-1", |t| t.name = "Renamed".into());
        cache.resolve_mutation(ticket, false);

        // no automatic rollback; the caller surfaces the failure
        assert_eq!(cache.mutation_state(ticket), Some(MutationState::Failed));
        assert_eq!(cache.team("team-1").unwrap().name, "Renamed");
    }

    #[test]
    fn summary_merge_replaces_in_place() {
        let cache = EntityCache::new();
        let summary = |teams: usize| OrganizationSummary {
            organization_id: "org-1".into(),
            team_count: teams,
            venue_count: 0,
            event_count: 0,
            game_count: 0,
            member_count: 0,
        };
        cache.merge_summary(summary(1));
        cache.merge_summary(summary(2));
        assert_eq!(cache.summary_of("org-1").unwrap().team_count, 2);
    }
}
