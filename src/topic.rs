//! Topic naming and parsing
//!
//! Topics follow the `<type>:<id>[:<subtopic>]` convention, e.g.
//! `org:org-1:teams` or `game:game-9`. An organization's subtopics are
//! independent rooms: a summary subscriber is never sent team payloads.

use std::fmt;

use crate::error::SyncError;

/// Subtopics under an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrgSubtopic {
    Teams,
    Venues,
    Events,
    Games,
    Members,
    Summary,
}

impl OrgSubtopic {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Teams => "teams",
            Self::Venues => "venues",
            Self::Events => "events",
            Self::Games => "games",
            Self::Members => "members",
            Self::Summary => "summary",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "teams" => Some(Self::Teams),
            "venues" => Some(Self::Venues),
            "events" => Some(Self::Events),
            "games" => Some(Self::Games),
            "members" => Some(Self::Members),
            "summary" => Some(Self::Summary),
            _ => None,
        }
    }
}

/// A named room a connection can join to receive scoped pushes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// One organization subtopic, e.g. `org:org-1:teams`
    Org(String, OrgSubtopic),
    /// A single team and its memberships, e.g. `team:team-7`
    Team(String),
    /// A single venue, e.g. `venue:venue-2`
    Venue(String),
    /// A single event and its games, e.g. `event:event-3`
    Event(String),
    /// A single game, e.g. `game:game-9`
    Game(String),
    /// One person's notifications, e.g. `person:person-4:notifications`
    Notifications(String),
    /// Global sports reference data
    Sports,
    /// Global roles reference data
    Roles,
}

impl Topic {
    /// Parse a wire topic string
    pub fn parse(s: &str) -> Result<Self, SyncError> {
        let invalid = || SyncError::InvalidTopic { topic: s.to_string() };

        let mut parts = s.splitn(3, ':');
        let head = parts.next().ok_or_else(invalid)?;
        match head {
            "sports" => return Ok(Self::Sports),
            "roles" => return Ok(Self::Roles),
            _ => {}
        }

        let id = parts.next().filter(|id| !id.is_empty()).ok_or_else(invalid)?;
        let sub = parts.next();
        match (head, sub) {
            ("org", Some(sub)) => OrgSubtopic::parse(sub)
                .map(|sub| Self::Org(id.to_string(), sub))
                .ok_or_else(invalid),
            ("team", None) => Ok(Self::Team(id.to_string())),
            ("venue", None) => Ok(Self::Venue(id.to_string())),
            ("event", None) => Ok(Self::Event(id.to_string())),
            ("game", None) => Ok(Self::Game(id.to_string())),
            ("person", Some("notifications")) => Ok(Self::Notifications(id.to_string())),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Org(id, sub) => write!(f, "org:{}:{}", id, sub.as_str()),
            Self::Team(id) => write!(f, "team:{}", id),
            Self::Venue(id) => write!(f, "venue:{}", id),
            Self::Event(id) => write!(f, "event:{}", id),
            Self::Game(id) => write!(f, "game:{}", id),
            Self::Notifications(id) => write!(f, "person:{}:notifications", id),
            Self::Sports => write!(f, "sports"),
            Self::Roles => write!(f, "roles"),
        }
    }
}
