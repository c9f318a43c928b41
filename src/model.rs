//! Entity records shared by server and client
//!
//! The sync layer treats records as opaque beyond their `id` and the
//! foreign-key fields used for discovery. All wire fields are camelCase.

use serde::{Deserialize, Serialize};

/// Entity types known to the sync layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Organization,
    Team,
    Venue,
    Event,
    Game,
    Person,
    TeamMembership,
    OrganizationMembership,
    Sport,
    Role,
    Notification,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Team => "team",
            Self::Venue => "venue",
            Self::Event => "event",
            Self::Game => "game",
            Self::Person => "person",
            Self::TeamMembership => "teamMembership",
            Self::OrganizationMembership => "organizationMembership",
            Self::Sport => "sport",
            Self::Role => "role",
            Self::Notification => "notification",
        }
    }
}

/// A typed reference to an entity that may not be in the local cache yet
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }
}

/// A record the merge cache can store: uniquely identified and able to name
/// the entities it references by foreign key.
pub trait Record: Clone + Serialize + serde::de::DeserializeOwned {
    const KIND: EntityKind;

    fn id(&self) -> &str;

    /// Foreign-key references followed by the discovery resolver
    fn references(&self) -> Vec<EntityRef> {
        Vec::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub short_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Record for Organization {
    const KIND: EntityKind = EntityKind::Organization;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sport_id: Option<String>,
}

impl Record for Team {
    const KIND: EntityKind = EntityKind::Team;

    fn id(&self) -> &str {
        &self.id
    }

    fn references(&self) -> Vec<EntityRef> {
        let mut refs = vec![EntityRef::new(EntityKind::Organization, &self.organization_id)];
        if let Some(sport) = &self.sport_id {
            refs.push(EntityRef::new(EntityKind::Sport, sport));
        }
        refs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
}

impl Record for Venue {
    const KIND: EntityKind = EntityKind::Venue;

    fn id(&self) -> &str {
        &self.id
    }

    fn references(&self) -> Vec<EntityRef> {
        vec![EntityRef::new(EntityKind::Organization, &self.organization_id)]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<String>,
}

impl Record for Event {
    const KIND: EntityKind = EntityKind::Event;

    fn id(&self) -> &str {
        &self.id
    }

    fn references(&self) -> Vec<EntityRef> {
        let mut refs = vec![EntityRef::new(EntityKind::Organization, &self.organization_id)];
        if let Some(venue) = &self.venue_id {
            refs.push(EntityRef::new(EntityKind::Venue, venue));
        }
        refs
    }
}

/// Lifecycle status of a scheduled game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    #[default]
    Scheduled,
    InProgress,
    Final,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: String,
    pub organization_id: String,
    pub home_team_id: String,
    pub away_team_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue_id: Option<String>,
    #[serde(default)]
    pub status: GameStatus,
    #[serde(default)]
    pub home_score: u32,
    #[serde(default)]
    pub away_score: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<String>,
}

impl Record for Game {
    const KIND: EntityKind = EntityKind::Game;

    fn id(&self) -> &str {
        &self.id
    }

    fn references(&self) -> Vec<EntityRef> {
        let mut refs = vec![
            EntityRef::new(EntityKind::Organization, &self.organization_id),
            EntityRef::new(EntityKind::Team, &self.home_team_id),
            EntityRef::new(EntityKind::Team, &self.away_team_id),
        ];
        if let Some(event) = &self.event_id {
            refs.push(EntityRef::new(EntityKind::Event, event));
        }
        if let Some(venue) = &self.venue_id {
            refs.push(EntityRef::new(EntityKind::Venue, venue));
        }
        refs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Record for Person {
    const KIND: EntityKind = EntityKind::Person;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMembership {
    pub id: String,
    pub team_id: String,
    pub person_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<String>,
}

impl Record for TeamMembership {
    const KIND: EntityKind = EntityKind::TeamMembership;

    fn id(&self) -> &str {
        &self.id
    }

    fn references(&self) -> Vec<EntityRef> {
        let mut refs = vec![
            EntityRef::new(EntityKind::Team, &self.team_id),
            EntityRef::new(EntityKind::Person, &self.person_id),
        ];
        if let Some(role) = &self.role_id {
            refs.push(EntityRef::new(EntityKind::Role, role));
        }
        refs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationMembership {
    pub id: String,
    pub organization_id: String,
    pub person_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<String>,
}

impl Record for OrganizationMembership {
    const KIND: EntityKind = EntityKind::OrganizationMembership;

    fn id(&self) -> &str {
        &self.id
    }

    fn references(&self) -> Vec<EntityRef> {
        let mut refs = vec![
            EntityRef::new(EntityKind::Organization, &self.organization_id),
            EntityRef::new(EntityKind::Person, &self.person_id),
        ];
        if let Some(role) = &self.role_id {
            refs.push(EntityRef::new(EntityKind::Role, role));
        }
        refs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sport {
    pub id: String,
    pub name: String,
}

impl Record for Sport {
    const KIND: EntityKind = EntityKind::Sport;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: String,
    pub name: String,
}

impl Record for Role {
    const KIND: EntityKind = EntityKind::Role;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub person_id: String,
    pub message: String,
    pub created_at: String,
    #[serde(default)]
    pub read: bool,
}

impl Record for Notification {
    const KIND: EntityKind = EntityKind::Notification;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Headline counts for an organization, pushed on the summary topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationSummary {
    pub organization_id: String,
    pub team_count: usize,
    pub venue_count: usize,
    pub event_count: usize,
    pub game_count: usize,
    pub member_count: usize,
}

/// A membership push enriched with the member's person record
///
/// Raw pushes carry only the membership fields; enriched pushes embed the
/// person so a subscriber can render a display name without a second fetch.
/// The merge cache decomposes the two shapes into separate stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMemberPayload {
    #[serde(flatten)]
    pub membership: TeamMembership,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person: Option<Person>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgMemberPayload {
    #[serde(flatten)]
    pub membership: OrganizationMembership,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person: Option<Person>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_fields_are_camel_case() {
        let team = Team {
            id: "team-1".into(),
            organization_id: "org-1".into(),
            name: "Ravens".into(),
            sport_id: None,
        };
        let json = serde_json::to_string(&team).unwrap();
        assert!(json.contains("\"organizationId\":\"org-1\""));
        assert!(!json.contains("sportId"));
    }

    #[test]
    fn game_references_both_teams() {
        let game = Game {
            id: "game-1".into(),
            organization_id: "org-1".into(),
            home_team_id: "team-1".into(),
            away_team_id: "team-2".into(),
            event_id: None,
            venue_id: Some("venue-1".into()),
            status: GameStatus::Scheduled,
            home_score: 0,
            away_score: 0,
            starts_at: None,
        };
        let refs = game.references();
        assert!(refs.contains(&EntityRef::new(EntityKind::Team, "team-1")));
        assert!(refs.contains(&EntityRef::new(EntityKind::Team, "team-2")));
        assert!(refs.contains(&EntityRef::new(EntityKind::Venue, "venue-1")));
    }

    #[test]
    fn enriched_member_payload_round_trips_flat() {
        let json = r#"{
            "id": "tm-1",
            "teamId": "team-1",
            "personId": "person-1",
            "person": {"id": "person-1", "name": "Sam Ortiz"}
        }"#;
        let payload: TeamMemberPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.membership.team_id, "team-1");
        assert_eq!(payload.person.as_ref().unwrap().name, "Sam Ortiz");

        // Raw shape: same fields, no embedded person
        let raw: TeamMemberPayload =
            serde_json::from_str(r#"{"id":"tm-2","teamId":"team-1","personId":"person-2"}"#)
                .unwrap();
        assert!(raw.person.is_none());
    }
}
