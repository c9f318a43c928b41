//! Data-store seam and the in-memory collaborator
//!
//! The persistent store is an external collaborator: the sync layer only
//! needs topic snapshots, point fetches, and mutation application. Handlers
//! may await these calls, so two mutations touching the same aggregate are
//! only as safe as the store's own per-statement atomicity; the sync layer
//! adds no cross-request locking.
//!
//! `MemoryStore` is the in-process implementation used by the daemon and the
//! test suite.

use std::future::Future;

use parking_lot::RwLock;

use crate::config::SimilarityConfig;
use crate::error::{Result, SyncError};
use crate::model::{
    Event, Game, Notification, OrgMemberPayload, Organization, OrganizationMembership,
    OrganizationSummary, Person, Role, Sport, Team, TeamMemberPayload, TeamMembership, Venue,
};
use crate::protocol::{
    ActionRequest, EventDeleted, FetchRequest, GameDeleted, MemberRemoved, OrgMemberRemoved,
    SyncEvent, TeamDeleted, UpdateEvent, VenueDeleted,
};
use crate::similarity::rank_organizations;
use crate::topic::{OrgSubtopic, Topic};

/// Outcome of a successfully applied mutation
///
/// Everything the broadcaster needs is derivable from this value alone:
/// the delta event carries the foreign keys that name its topics, and the
/// refreshed summary rides along when headline counts changed.
#[derive(Debug, Clone)]
pub struct ActionResult {
    /// Entity payload returned in the ack
    pub data: serde_json::Value,
    /// Delta to fan out, when an existing topic is affected
    pub update: Option<UpdateEvent>,
    /// Refreshed headline counts for the owning organization
    pub summary: Option<OrganizationSummary>,
}

/// The store seam the sync layer talks to
pub trait DataStore: Send + Sync + 'static {
    /// Full current state for a topic, as the sync events to push on join
    fn snapshot(&self, topic: &Topic) -> impl Future<Output = Result<Vec<SyncEvent>>> + Send;

    /// Point fetch; `None` when the entity does not exist
    fn fetch(
        &self,
        request: &FetchRequest,
    ) -> impl Future<Output = Result<Option<serde_json::Value>>> + Send;

    /// Apply a mutation; a validation failure rejects without side effects
    fn apply(&self, request: ActionRequest) -> impl Future<Output = Result<ActionResult>> + Send;
}

#[derive(Default)]
struct State {
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
}

impl State {
    fn organization(&self, id: &str) -> Option<&Organization> {
        self.organizations.iter().find(|o| o.id == id)
    }

    fn team(&self, id: &str) -> Option<&Team> {
        self.teams.iter().find(|t| t.id == id)
    }

    fn person(&self, id: &str) -> Option<&Person> {
        self.people.iter().find(|p| p.id == id)
    }

    fn summary(&self, organization_id: &str) -> OrganizationSummary {
        OrganizationSummary {
            organization_id: organization_id.to_string(),
            team_count: self.teams.iter().filter(|t| t.organization_id == organization_id).count(),
            venue_count: self
                .venues
                .iter()
                .filter(|v| v.organization_id == organization_id)
                .count(),
            event_count: self
                .events
                .iter()
                .filter(|e| e.organization_id == organization_id)
                .count(),
            game_count: self.games.iter().filter(|g| g.organization_id == organization_id).count(),
            member_count: self
                .org_memberships
                .iter()
                .filter(|m| m.organization_id == organization_id)
                .count(),
        }
    }

    fn enrich_team_member(&self, membership: &TeamMembership) -> TeamMemberPayload {
        TeamMemberPayload {
            membership: membership.clone(),
            person: self.person(&membership.person_id).cloned(),
        }
    }

    fn enrich_org_member(&self, membership: &OrganizationMembership) -> OrgMemberPayload {
        OrgMemberPayload {
            membership: membership.clone(),
            person: self.person(&membership.person_id).cloned(),
        }
    }
}

/// In-memory store used by the daemon and tests
pub struct MemoryStore {
    state: RwLock<State>,
    similarity: SimilarityConfig,
}

fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().as_simple())
}

fn unknown(kind: &'static str, id: &str) -> SyncError {
    SyncError::UnknownEntity { kind, id: id.to_string() }
}

fn rejected(message: impl Into<String>) -> SyncError {
    SyncError::ActionRejected { message: message.into() }
}

fn json<T: serde::Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).expect("entity serialization is infallible")
}

impl MemoryStore {
    pub fn new(similarity: SimilarityConfig) -> Self {
        Self { state: RwLock::new(State::default()), similarity }
    }

    /// Store pre-loaded with global reference data
    pub fn with_reference_data(similarity: SimilarityConfig) -> Self {
        let store = Self::new(similarity);
        {
            let mut state = store.state.write();
            for name in ["Soccer", "Basketball", "Volleyball", "Hockey"] {
                state.sports.push(Sport { id: new_id("sport"), name: name.to_string() });
            }
            for name in ["Player", "Coach", "Manager", "Referee"] {
                state.roles.push(Role { id: new_id("role"), name: name.to_string() });
            }
        }
        store
    }

    // Seeding helpers for fixtures; these bypass validation and broadcasting.

    pub fn seed_organization(&self, name: &str, short_name: &str) -> Organization {
        let org = Organization {
            id: new_id("org"),
            name: name.to_string(),
            short_name: short_name.to_string(),
            description: None,
        };
        self.state.write().organizations.push(org.clone());
        org
    }

    pub fn seed_team(&self, organization_id: &str, name: &str) -> Team {
        let team = Team {
            id: new_id("team"),
            organization_id: organization_id.to_string(),
            name: name.to_string(),
            sport_id: None,
        };
        self.state.write().teams.push(team.clone());
        team
    }

    /// Seed a team with a caller-chosen id, e.g. to restore a deleted one
    pub fn seed_team_raw(&self, team: Team) {
        self.state.write().teams.push(team);
    }

    pub fn seed_venue(&self, organization_id: &str, name: &str) -> Venue {
        let venue = Venue {
            id: new_id("venue"),
            organization_id: organization_id.to_string(),
            name: name.to_string(),
            address: String::new(),
        };
        self.state.write().venues.push(venue.clone());
        venue
    }

    pub fn seed_event(&self, organization_id: &str, name: &str) -> Event {
        let event = Event {
            id: new_id("event"),
            organization_id: organization_id.to_string(),
            name: name.to_string(),
            venue_id: None,
            starts_at: None,
        };
        self.state.write().events.push(event.clone());
        event
    }

    pub fn seed_game(&self, organization_id: &str, home_team_id: &str, away_team_id: &str) -> Game {
        let game = Game {
            id: new_id("game"),
            organization_id: organization_id.to_string(),
            home_team_id: home_team_id.to_string(),
            away_team_id: away_team_id.to_string(),
            event_id: None,
            venue_id: None,
            status: Default::default(),
            home_score: 0,
            away_score: 0,
            starts_at: None,
        };
        self.state.write().games.push(game.clone());
        game
    }

    pub fn seed_person(&self, name: &str) -> Person {
        let person = Person { id: new_id("person"), name: name.to_string(), email: None };
        self.state.write().people.push(person.clone());
        person
    }

    pub fn seed_notification(&self, person_id: &str, message: &str) -> Notification {
        let notification = Notification {
            id: new_id("notif"),
            person_id: person_id.to_string(),
            message: message.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            read: false,
        };
        self.state.write().notifications.push(notification.clone());
        notification
    }

    fn resolve_person(
        state: &mut State,
        person_id: Option<String>,
        name: Option<String>,
        email: Option<String>,
    ) -> Result<Person> {
        match person_id {
            Some(id) => state.person(&id).cloned().ok_or_else(|| unknown("person", &id)),
            None => {
                let name = name
                    .filter(|n| !n.trim().is_empty())
                    .ok_or_else(|| rejected("A member needs a personId or a name"))?;
                let person = Person { id: new_id("person"), name, email };
                state.people.push(person.clone());
                Ok(person)
            }
        }
    }

    fn apply_sync(&self, request: ActionRequest) -> Result<ActionResult> {
        let mut state = self.state.write();
        match request {
            ActionRequest::CreateOrganization { name, short_name, description } => {
                if name.trim().is_empty() {
                    return Err(rejected("Organization name is required"));
                }
                let org =
                    Organization { id: new_id("org"), name, short_name, description };
                state.organizations.push(org.clone());
                // No one can be subscribed to a brand-new organization's topics
                Ok(ActionResult { data: json(&org), update: None, summary: None })
            }

            ActionRequest::UpdateOrganization { id, name, short_name } => {
                let org = state
                    .organizations
                    .iter_mut()
                    .find(|o| o.id == id)
                    .ok_or_else(|| unknown("organization", &id))?;
                if let Some(name) = name {
                    if name.trim().is_empty() {
                        return Err(rejected("Organization name is required"));
                    }
                    org.name = name;
                }
                if let Some(short_name) = short_name {
                    org.short_name = short_name;
                }
                let org = org.clone();
                Ok(ActionResult {
                    data: json(&org),
                    update: Some(UpdateEvent::OrganizationUpdated(org)),
                    summary: None,
                })
            }

            ActionRequest::AddTeam { organization_id, name, sport_id } => {
                state
                    .organization(&organization_id)
                    .ok_or_else(|| unknown("organization", &organization_id))?;
                if name.trim().is_empty() {
                    return Err(rejected("Team name is required"));
                }
                let team = Team { id: new_id("team"), organization_id, name, sport_id };
                state.teams.push(team.clone());
                let summary = state.summary(&team.organization_id);
                Ok(ActionResult {
                    data: json(&team),
                    update: Some(UpdateEvent::TeamAdded(team)),
                    summary: Some(summary),
                })
            }

            ActionRequest::UpdateTeam { id, name } => {
                let team =
                    state.teams.iter_mut().find(|t| t.id == id).ok_or_else(|| unknown("team", &id))?;
                if let Some(name) = name {
                    if name.trim().is_empty() {
                        return Err(rejected("Team name is required"));
                    }
                    team.name = name;
                }
                let team = team.clone();
                Ok(ActionResult {
                    data: json(&team),
                    update: Some(UpdateEvent::TeamUpdated(team)),
                    summary: None,
                })
            }

            ActionRequest::DeleteTeam { id } => {
                let team = state.team(&id).cloned().ok_or_else(|| unknown("team", &id))?;
                state.teams.retain(|t| t.id != id);
                state.team_memberships.retain(|m| m.team_id != id);
                let summary = state.summary(&team.organization_id);
                Ok(ActionResult {
                    data: json(&team),
                    update: Some(UpdateEvent::TeamDeleted(TeamDeleted {
                        id: team.id,
                        organization_id: team.organization_id,
                    })),
                    summary: Some(summary),
                })
            }

            ActionRequest::AddVenue { organization_id, name, address } => {
                state
                    .organization(&organization_id)
                    .ok_or_else(|| unknown("organization", &organization_id))?;
                if name.trim().is_empty() {
                    return Err(rejected("Venue name is required"));
                }
                let venue = Venue { id: new_id("venue"), organization_id, name, address };
                state.venues.push(venue.clone());
                let summary = state.summary(&venue.organization_id);
                Ok(ActionResult {
                    data: json(&venue),
                    update: Some(UpdateEvent::VenueAdded(venue)),
                    summary: Some(summary),
                })
            }

            ActionRequest::UpdateVenue { id, name, address } => {
                let venue = state
                    .venues
                    .iter_mut()
                    .find(|v| v.id == id)
                    .ok_or_else(|| unknown("venue", &id))?;
                if let Some(name) = name {
                    venue.name = name;
                }
                if let Some(address) = address {
                    venue.address = address;
                }
                let venue = venue.clone();
                Ok(ActionResult {
                    data: json(&venue),
                    update: Some(UpdateEvent::VenueUpdated(venue)),
                    summary: None,
                })
            }

            ActionRequest::DeleteVenue { id } => {
                let venue = state
                    .venues
                    .iter()
                    .find(|v| v.id == id)
                    .cloned()
                    .ok_or_else(|| unknown("venue", &id))?;
                state.venues.retain(|v| v.id != id);
                let summary = state.summary(&venue.organization_id);
                Ok(ActionResult {
                    data: json(&venue),
                    update: Some(UpdateEvent::VenueDeleted(VenueDeleted {
                        id: venue.id,
                        organization_id: venue.organization_id,
                    })),
                    summary: Some(summary),
                })
            }

            ActionRequest::AddEvent { organization_id, name, venue_id, starts_at } => {
                state
                    .organization(&organization_id)
                    .ok_or_else(|| unknown("organization", &organization_id))?;
                if name.trim().is_empty() {
                    return Err(rejected("Event name is required"));
                }
                let event =
                    Event { id: new_id("event"), organization_id, name, venue_id, starts_at };
                state.events.push(event.clone());
                let summary = state.summary(&event.organization_id);
                Ok(ActionResult {
                    data: json(&event),
                    update: Some(UpdateEvent::EventAdded(event)),
                    summary: Some(summary),
                })
            }

            ActionRequest::DeleteEvent { id } => {
                let event = state
                    .events
                    .iter()
                    .find(|e| e.id == id)
                    .cloned()
                    .ok_or_else(|| unknown("event", &id))?;
                state.events.retain(|e| e.id != id);
                let summary = state.summary(&event.organization_id);
                Ok(ActionResult {
                    data: json(&event),
                    update: Some(UpdateEvent::EventDeleted(EventDeleted {
                        id: event.id,
                        organization_id: event.organization_id,
                    })),
                    summary: Some(summary),
                })
            }

            ActionRequest::AddGame {
                organization_id,
                home_team_id,
                away_team_id,
                event_id,
                venue_id,
                starts_at,
            } => {
                state
                    .organization(&organization_id)
                    .ok_or_else(|| unknown("organization", &organization_id))?;
                state.team(&home_team_id).ok_or_else(|| unknown("team", &home_team_id))?;
                state.team(&away_team_id).ok_or_else(|| unknown("team", &away_team_id))?;
                if home_team_id == away_team_id {
                    return Err(rejected("A team cannot play itself"));
                }
                let game = Game {
                    id: new_id("game"),
                    organization_id,
                    home_team_id,
                    away_team_id,
                    event_id,
                    venue_id,
                    status: Default::default(),
                    home_score: 0,
                    away_score: 0,
                    starts_at,
                };
                state.games.push(game.clone());
                let summary = state.summary(&game.organization_id);
                Ok(ActionResult {
                    data: json(&game),
                    update: Some(UpdateEvent::GameAdded(game)),
                    summary: Some(summary),
                })
            }

            ActionRequest::UpdateGame { id, status, home_score, away_score } => {
                let game =
                    state.games.iter_mut().find(|g| g.id == id).ok_or_else(|| unknown("game", &id))?;
                if let Some(status) = status {
                    game.status = status;
                }
                if let Some(home_score) = home_score {
                    game.home_score = home_score;
                }
                if let Some(away_score) = away_score {
                    game.away_score = away_score;
                }
                let game = game.clone();
                Ok(ActionResult {
                    data: json(&game),
                    update: Some(UpdateEvent::GameUpdated(game)),
                    summary: None,
                })
            }

            ActionRequest::DeleteGame { id } => {
                let game = state
                    .games
                    .iter()
                    .find(|g| g.id == id)
                    .cloned()
                    .ok_or_else(|| unknown("game", &id))?;
                state.games.retain(|g| g.id != id);
                let summary = state.summary(&game.organization_id);
                Ok(ActionResult {
                    data: json(&game),
                    update: Some(UpdateEvent::GameDeleted(GameDeleted {
                        id: game.id,
                        organization_id: game.organization_id,
                        event_id: game.event_id,
                    })),
                    summary: Some(summary),
                })
            }

            ActionRequest::AddTeamMember { team_id, person_id, name, email, role_id } => {
                state.team(&team_id).ok_or_else(|| unknown("team", &team_id))?;
                let person = Self::resolve_person(&mut state, person_id, name, email)?;
                if state
                    .team_memberships
                    .iter()
                    .any(|m| m.team_id == team_id && m.person_id == person.id)
                {
                    return Err(rejected("Person is already a member of this team"));
                }
                let membership = TeamMembership {
                    id: new_id("tm"),
                    team_id,
                    person_id: person.id.clone(),
                    role_id,
                };
                state.team_memberships.push(membership.clone());
                let payload = TeamMemberPayload { membership, person: Some(person) };
                Ok(ActionResult {
                    data: json(&payload),
                    update: Some(UpdateEvent::MemberAdded(payload)),
                    summary: None,
                })
            }

            ActionRequest::RemoveTeamMember { id } => {
                let membership = state
                    .team_memberships
                    .iter()
                    .find(|m| m.id == id)
                    .cloned()
                    .ok_or_else(|| unknown("teamMembership", &id))?;
                state.team_memberships.retain(|m| m.id != id);
                Ok(ActionResult {
                    data: json(&membership),
                    update: Some(UpdateEvent::MemberRemoved(MemberRemoved {
                        id: membership.id,
                        team_id: membership.team_id,
                    })),
                    summary: None,
                })
            }

            ActionRequest::AddOrgMember { organization_id, person_id, name, email, role_id } => {
                state
                    .organization(&organization_id)
                    .ok_or_else(|| unknown("organization", &organization_id))?;
                let person = Self::resolve_person(&mut state, person_id, name, email)?;
                if state
                    .org_memberships
                    .iter()
                    .any(|m| m.organization_id == organization_id && m.person_id == person.id)
                {
                    return Err(rejected("Person is already a member of this organization"));
                }
                let membership = OrganizationMembership {
                    id: new_id("om"),
                    organization_id,
                    person_id: person.id.clone(),
                    role_id,
                };
                state.org_memberships.push(membership.clone());
                let summary = state.summary(&membership.organization_id);
                let payload = OrgMemberPayload { membership, person: Some(person) };
                Ok(ActionResult {
                    data: json(&payload),
                    update: Some(UpdateEvent::OrgMemberAdded(payload)),
                    summary: Some(summary),
                })
            }

            ActionRequest::RemoveOrgMember { id } => {
                let membership = state
                    .org_memberships
                    .iter()
                    .find(|m| m.id == id)
                    .cloned()
                    .ok_or_else(|| unknown("organizationMembership", &id))?;
                state.org_memberships.retain(|m| m.id != id);
                let summary = state.summary(&membership.organization_id);
                Ok(ActionResult {
                    data: json(&membership),
                    update: Some(UpdateEvent::OrgMemberRemoved(OrgMemberRemoved {
                        id: membership.id,
                        organization_id: membership.organization_id,
                    })),
                    summary: Some(summary),
                })
            }
        }
    }

    fn snapshot_sync(&self, topic: &Topic) -> Result<Vec<SyncEvent>> {
        let state = self.state.read();
        let events = match topic {
            Topic::Org(org_id, sub) => {
                state.organization(org_id).ok_or_else(|| unknown("organization", org_id))?;
                match sub {
                    OrgSubtopic::Teams => vec![SyncEvent::TeamsSync(
                        state.teams.iter().filter(|t| &t.organization_id == org_id).cloned().collect(),
                    )],
                    OrgSubtopic::Venues => vec![SyncEvent::VenuesSync(
                        state
                            .venues
                            .iter()
                            .filter(|v| &v.organization_id == org_id)
                            .cloned()
                            .collect(),
                    )],
                    OrgSubtopic::Events => vec![SyncEvent::EventsSync(
                        state
                            .events
                            .iter()
                            .filter(|e| &e.organization_id == org_id)
                            .cloned()
                            .collect(),
                    )],
                    OrgSubtopic::Games => vec![SyncEvent::GamesSync(
                        state.games.iter().filter(|g| &g.organization_id == org_id).cloned().collect(),
                    )],
                    OrgSubtopic::Members => vec![SyncEvent::OrgMembersSync(
                        state
                            .org_memberships
                            .iter()
                            .filter(|m| &m.organization_id == org_id)
                            .map(|m| state.enrich_org_member(m))
                            .collect(),
                    )],
                    OrgSubtopic::Summary => vec![SyncEvent::SummarySync(state.summary(org_id))],
                }
            }
            Topic::Team(id) => {
                let team = state.team(id).cloned().ok_or_else(|| unknown("team", id))?;
                let members = state
                    .team_memberships
                    .iter()
                    .filter(|m| &m.team_id == id)
                    .map(|m| state.enrich_team_member(m))
                    .collect();
                vec![SyncEvent::TeamSync(team), SyncEvent::MembersSync(members)]
            }
            Topic::Venue(id) => {
                let venue = state
                    .venues
                    .iter()
                    .find(|v| &v.id == id)
                    .cloned()
                    .ok_or_else(|| unknown("venue", id))?;
                vec![SyncEvent::VenueSync(venue)]
            }
            Topic::Event(id) => {
                let event = state
                    .events
                    .iter()
                    .find(|e| &e.id == id)
                    .cloned()
                    .ok_or_else(|| unknown("event", id))?;
                let games = state
                    .games
                    .iter()
                    .filter(|g| g.event_id.as_deref() == Some(id.as_str()))
                    .cloned()
                    .collect();
                vec![SyncEvent::EventSync(event), SyncEvent::GamesSync(games)]
            }
            Topic::Game(id) => {
                let game = state
                    .games
                    .iter()
                    .find(|g| &g.id == id)
                    .cloned()
                    .ok_or_else(|| unknown("game", id))?;
                vec![SyncEvent::GameSync(game)]
            }
            Topic::Notifications(person_id) => vec![SyncEvent::NotificationsSync(
                state
                    .notifications
                    .iter()
                    .filter(|n| &n.person_id == person_id)
                    .cloned()
                    .collect(),
            )],
            Topic::Sports => vec![SyncEvent::SportsSync(state.sports.clone())],
            Topic::Roles => vec![SyncEvent::RolesSync(state.roles.clone())],
        };
        Ok(events)
    }

    fn fetch_sync(&self, request: &FetchRequest) -> Result<Option<serde_json::Value>> {
        let state = self.state.read();
        let data = match request {
            FetchRequest::Organization { id } => state.organization(id).map(json),
            FetchRequest::Team { id } => state.team(id).map(json),
            FetchRequest::Venue { id } => state.venues.iter().find(|v| &v.id == id).map(json),
            FetchRequest::Event { id } => state.events.iter().find(|e| &e.id == id).map(json),
            FetchRequest::Game { id } => state.games.iter().find(|g| &g.id == id).map(json),
            FetchRequest::Person { id } => state.person(id).map(json),
            FetchRequest::Sports => Some(json(&state.sports)),
            FetchRequest::Roles => Some(json(&state.roles)),
            FetchRequest::OrganizationSearch { query, limit } => {
                let matches = rank_organizations(
                    &self.similarity,
                    query,
                    state.organizations.iter(),
                    limit.unwrap_or(self.similarity.server_limit),
                );
                Some(json(&matches))
            }
        };
        Ok(data)
    }
}

impl DataStore for MemoryStore {
    async fn snapshot(&self, topic: &Topic) -> Result<Vec<SyncEvent>> {
        self.snapshot_sync(topic)
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Option<serde_json::Value>> {
        self.fetch_sync(request)
    }

    async fn apply(&self, request: ActionRequest) -> Result<ActionResult> {
        self.apply_sync(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        MemoryStore::new(SimilarityConfig::default())
    }

    #[tokio::test]
    async fn add_team_returns_update_and_summary() {
        let store = store();
        let org = store.seed_organization("Springvale High", "SPR");
        let result = store
            .apply(ActionRequest::AddTeam {
                organization_id: org.id.clone(),
                name: "Varsity".into(),
                sport_id: None,
            })
            .await
            .unwrap();

        match result.update {
            Some(UpdateEvent::TeamAdded(team)) => assert_eq!(team.organization_id, org.id),
            other => panic!("unexpected update: {other:?}"),
        }
        assert_eq!(result.summary.unwrap().team_count, 1);
    }

    #[tokio::test]
    async fn invalid_action_is_rejected_without_side_effects() {
        let store = store();
        let org = store.seed_organization("Springvale High", "SPR");
        let err = store
            .apply(ActionRequest::AddTeam {
                organization_id: org.id.clone(),
                name: "  ".into(),
                sport_id: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ActionRejected { .. }));

        let snapshot = store
            .snapshot(&Topic::Org(org.id.clone(), OrgSubtopic::Teams))
            .await
            .unwrap();
        match &snapshot[0] {
            SyncEvent::TeamsSync(teams) => assert!(teams.is_empty()),
            other => panic!("unexpected sync: {other:?}"),
        }
    }

    #[tokio::test]
    async fn team_snapshot_carries_record_then_members() {
        let store = store();
        let org = store.seed_organization("Springvale High", "SPR");
        let team = store.seed_team(&org.id, "Varsity");
        store
            .apply(ActionRequest::AddTeamMember {
                team_id: team.id.clone(),
                person_id: None,
                name: Some("Sam Ortiz".into()),
                email: None,
                role_id: None,
            })
            .await
            .unwrap();

        let snapshot = store.snapshot(&Topic::Team(team.id.clone())).await.unwrap();
        assert!(matches!(&snapshot[0], SyncEvent::TeamSync(t) if t.id == team.id));
        match &snapshot[1] {
            SyncEvent::MembersSync(members) => {
                assert_eq!(members.len(), 1);
                assert_eq!(members[0].person.as_ref().unwrap().name, "Sam Ortiz");
            }
            other => panic!("unexpected sync: {other:?}"),
        }
    }

    #[tokio::test]
    async fn duplicate_membership_is_rejected() {
        let store = store();
        let org = store.seed_organization("Springvale High", "SPR");
        let team = store.seed_team(&org.id, "Varsity");
        let person = store.seed_person("Sam Ortiz");

        let make_request = || ActionRequest::AddTeamMember {
            team_id: team.id.clone(),
            person_id: Some(person.id.clone()),
            name: None,
            email: None,
            role_id: None,
        };
        store.apply(make_request()).await.unwrap();
        assert!(matches!(store.apply(make_request()).await, Err(SyncError::ActionRejected { .. })));
    }

    #[tokio::test]
    async fn fetch_miss_returns_none() {
        let store = store();
        let data = store.fetch(&FetchRequest::Team { id: "missing".into() }).await.unwrap();
        assert!(data.is_none());
    }

    #[tokio::test]
    async fn organization_search_is_scored_and_capped() {
        let store = store();
        store.seed_organization("Springvale High", "SPR");
        store.seed_organization("Springfield High", "SHS");
        store.seed_organization("Harbor Rowing", "HR");

        let data = store
            .fetch(&FetchRequest::OrganizationSearch { query: "spring".into(), limit: Some(1) })
            .await
            .unwrap()
            .unwrap();
        let matches: Vec<crate::similarity::ScoredMatch> =
            serde_json::from_value(data).unwrap();
        assert_eq!(matches.len(), 1);
        assert!(matches[0].score > 0);
    }
}
