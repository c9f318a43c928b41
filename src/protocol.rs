//! Wire protocol message types
//!
//! All frames are JSON. Client-to-server traffic is either fire-and-forget
//! room management or id-correlated request/ack pairs; server-to-client
//! traffic is acks plus two push shapes: incremental `update` deltas and
//! `sync` snapshots sent once per successful room join.

use serde::{Deserialize, Serialize};

use crate::model::{
    Event, Game, GameStatus, Notification, OrgMemberPayload, Organization, OrganizationSummary,
    Role, Sport, Team, TeamMemberPayload, Venue,
};

/// Client-to-server message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a topic room (fire-and-forget)
    JoinRoom { topic: String },
    /// Leave a topic room (fire-and-forget)
    LeaveRoom { topic: String },
    /// Point fetch; ack carries the data or null
    GetData { id: u64, request: FetchRequest },
    /// Mutation; ack carries ok-with-data or an error message
    Action { id: u64, request: ActionRequest },
}

/// Server-to-client message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Acknowledgement for a `get_data` or `action` request
    Ack {
        id: u64,
        #[serde(flatten)]
        payload: AckPayload,
    },
    /// Incremental delta push
    Update { event: UpdateEvent },
    /// Snapshot push, sent once per successful join
    Sync { topic: String, event: SyncEvent },
}

/// Ack outcome branch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AckPayload {
    Ok { data: serde_json::Value },
    Error { message: String },
}

/// Point-fetch request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetchRequest {
    Organization { id: String },
    Team { id: String },
    Venue { id: String },
    Event { id: String },
    Game { id: String },
    Person { id: String },
    Sports,
    Roles,
    #[serde(rename_all = "camelCase")]
    OrganizationSearch {
        query: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
    },
}

/// Mutation request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionRequest {
    #[serde(rename_all = "camelCase")]
    CreateOrganization {
        name: String,
        short_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    UpdateOrganization {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        short_name: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    AddTeam {
        organization_id: String,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sport_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    UpdateTeam {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    DeleteTeam { id: String },
    #[serde(rename_all = "camelCase")]
    AddVenue {
        organization_id: String,
        name: String,
        #[serde(default)]
        address: String,
    },
    #[serde(rename_all = "camelCase")]
    UpdateVenue {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        address: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    DeleteVenue { id: String },
    #[serde(rename_all = "camelCase")]
    AddEvent {
        organization_id: String,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        venue_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        starts_at: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    DeleteEvent { id: String },
    #[serde(rename_all = "camelCase")]
    AddGame {
        organization_id: String,
        home_team_id: String,
        away_team_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        venue_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        starts_at: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    UpdateGame {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<GameStatus>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        home_score: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        away_score: Option<u32>,
    },
    #[serde(rename_all = "camelCase")]
    DeleteGame { id: String },
    #[serde(rename_all = "camelCase")]
    AddTeamMember {
        team_id: String,
        /// Existing person to add; when absent a person is created from `name`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        person_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        email: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    RemoveTeamMember { id: String },
    #[serde(rename_all = "camelCase")]
    AddOrgMember {
        organization_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        person_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        email: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    RemoveOrgMember { id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamDeleted {
    pub id: String,
    pub organization_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueDeleted {
    pub id: String,
    pub organization_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDeleted {
    pub id: String,
    pub organization_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameDeleted {
    pub id: String,
    pub organization_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRemoved {
    pub id: String,
    pub team_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgMemberRemoved {
    pub id: String,
    pub organization_id: String,
}

/// Incremental delta pushed after a successful mutation
///
/// Tags are the entity-action discriminants on the wire; payloads ride under
/// `data`. Delete events carry the parent foreign key so the topic they
/// belong to is derivable from the event alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateEvent {
    TeamAdded(Team),
    TeamUpdated(Team),
    TeamDeleted(TeamDeleted),
    VenueAdded(Venue),
    VenueUpdated(Venue),
    VenueDeleted(VenueDeleted),
    EventAdded(Event),
    EventDeleted(EventDeleted),
    GameAdded(Game),
    GameUpdated(Game),
    GameDeleted(GameDeleted),
    MemberAdded(TeamMemberPayload),
    MemberRemoved(MemberRemoved),
    OrgMemberAdded(OrgMemberPayload),
    OrgMemberRemoved(OrgMemberRemoved),
    OrganizationUpdated(Organization),
    SummaryUpdated(OrganizationSummary),
    NotificationAdded(Notification),
}

/// Snapshot pushed once per successful room join
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncEvent {
    TeamsSync(Vec<Team>),
    VenuesSync(Vec<Venue>),
    EventsSync(Vec<Event>),
    GamesSync(Vec<Game>),
    MembersSync(Vec<TeamMemberPayload>),
    OrgMembersSync(Vec<OrgMemberPayload>),
    SummarySync(OrganizationSummary),
    TeamSync(Team),
    VenueSync(Venue),
    EventSync(Event),
    GameSync(Game),
    NotificationsSync(Vec<Notification>),
    SportsSync(Vec<Sport>),
    RolesSync(Vec<Role>),
}
