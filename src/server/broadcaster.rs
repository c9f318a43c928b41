//! Topic-scoped push fan-out
//!
//! Owns the mapping from mutations to the topics they affect and pushes on
//! exactly two occasions: a full snapshot to a connection the instant it
//! joins a room, and scoped deltas to room members after every successful
//! mutation. The snapshot-on-join closes the race between "subscribe" and
//! "initial fetch": the snapshot reflects current state at join time, and
//! channel ordering guarantees it precedes any later delta for that topic.

use std::sync::Arc;

use crate::error::Result;
use crate::protocol::{ServerMessage, UpdateEvent};
use crate::server::rooms::{ConnId, RoomRegistry};
use crate::server::store::{ActionResult, DataStore};
use crate::topic::{OrgSubtopic, Topic};

pub struct TopicBroadcaster<S> {
    rooms: Arc<RoomRegistry>,
    store: Arc<S>,
}

impl<S: DataStore> TopicBroadcaster<S> {
    pub fn new(rooms: Arc<RoomRegistry>, store: Arc<S>) -> Self {
        Self { rooms, store }
    }

    pub fn rooms(&self) -> &Arc<RoomRegistry> {
        &self.rooms
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Add a connection to a topic room and push the current snapshot to it
    pub async fn join(&self, conn: &ConnId, topic: Topic) -> Result<()> {
        self.rooms.join(conn, &topic);
        let events = match self.store.snapshot(&topic).await {
            Ok(events) => events,
            Err(e) => {
                // A topic naming a missing entity never becomes a membership
                self.rooms.leave(conn, &topic);
                return Err(e);
            }
        };
        tracing::debug!("snapshot {} -> {} ({} events)", topic, conn, events.len());
        for event in events {
            self.rooms.send_to(conn, ServerMessage::Sync { topic: topic.to_string(), event });
        }
        Ok(())
    }

    /// Remove a connection from a topic room; no further pushes for it
    pub fn leave(&self, conn: &ConnId, topic: &Topic) {
        self.rooms.leave(conn, topic);
    }

    /// Fan out the deltas of a successful mutation to their topics
    ///
    /// Derivation is pure over the mutation result: the delta's foreign keys
    /// name its topics, and a refreshed summary rides the summary topic.
    pub fn broadcast_result(&self, result: &ActionResult) {
        if let Some(update) = &result.update {
            for topic in topics_for(update) {
                tracing::debug!("broadcast {:?} -> {}", discriminant_name(update), topic);
                self.rooms.broadcast(&topic, &ServerMessage::Update { event: update.clone() });
            }
        }
        if let Some(summary) = &result.summary {
            let topic = Topic::Org(summary.organization_id.clone(), OrgSubtopic::Summary);
            self.rooms.broadcast(
                &topic,
                &ServerMessage::Update { event: UpdateEvent::SummaryUpdated(summary.clone()) },
            );
        }
    }
}

/// The topics a delta belongs to
pub fn topics_for(update: &UpdateEvent) -> Vec<Topic> {
    use UpdateEvent::*;

    let org_sub = |id: &str, sub| Topic::Org(id.to_string(), sub);
    match update {
        TeamAdded(t) => vec![org_sub(&t.organization_id, OrgSubtopic::Teams)],
        TeamUpdated(t) => vec![
            org_sub(&t.organization_id, OrgSubtopic::Teams),
            Topic::Team(t.id.clone()),
        ],
        TeamDeleted(d) => vec![
            org_sub(&d.organization_id, OrgSubtopic::Teams),
            Topic::Team(d.id.clone()),
        ],
        VenueAdded(v) => vec![org_sub(&v.organization_id, OrgSubtopic::Venues)],
        VenueUpdated(v) => vec![
            org_sub(&v.organization_id, OrgSubtopic::Venues),
            Topic::Venue(v.id.clone()),
        ],
        VenueDeleted(d) => vec![
            org_sub(&d.organization_id, OrgSubtopic::Venues),
            Topic::Venue(d.id.clone()),
        ],
        EventAdded(e) => vec![org_sub(&e.organization_id, OrgSubtopic::Events)],
        EventDeleted(d) => vec![
            org_sub(&d.organization_id, OrgSubtopic::Events),
            Topic::Event(d.id.clone()),
        ],
        GameAdded(g) => {
            let mut topics = vec![org_sub(&g.organization_id, OrgSubtopic::Games)];
            if let Some(event_id) = &g.event_id {
                topics.push(Topic::Event(event_id.clone()));
            }
            topics
        }
        GameUpdated(g) => {
            let mut topics = vec![
                org_sub(&g.organization_id, OrgSubtopic::Games),
                Topic::Game(g.id.clone()),
            ];
            if let Some(event_id) = &g.event_id {
                topics.push(Topic::Event(event_id.clone()));
            }
            topics
        }
        GameDeleted(d) => {
            let mut topics = vec![
                org_sub(&d.organization_id, OrgSubtopic::Games),
                Topic::Game(d.id.clone()),
            ];
            if let Some(event_id) = &d.event_id {
                topics.push(Topic::Event(event_id.clone()));
            }
            topics
        }
        MemberAdded(p) => vec![Topic::Team(p.membership.team_id.clone())],
        MemberRemoved(r) => vec![Topic::Team(r.team_id.clone())],
        OrgMemberAdded(p) => {
            vec![org_sub(&p.membership.organization_id, OrgSubtopic::Members)]
        }
        OrgMemberRemoved(r) => vec![org_sub(&r.organization_id, OrgSubtopic::Members)],
        OrganizationUpdated(o) => vec![org_sub(&o.id, OrgSubtopic::Summary)],
        SummaryUpdated(s) => vec![org_sub(&s.organization_id, OrgSubtopic::Summary)],
        NotificationAdded(n) => vec![Topic::Notifications(n.person_id.clone())],
    }
}

fn discriminant_name(update: &UpdateEvent) -> &'static str {
    use UpdateEvent::*;
    match update {
        TeamAdded(_) => "TEAM_ADDED",
        TeamUpdated(_) => "TEAM_UPDATED",
        TeamDeleted(_) => "TEAM_DELETED",
        VenueAdded(_) => "VENUE_ADDED",
        VenueUpdated(_) => "VENUE_UPDATED",
        VenueDeleted(_) => "VENUE_DELETED",
        EventAdded(_) => "EVENT_ADDED",
        EventDeleted(_) => "EVENT_DELETED",
        GameAdded(_) => "GAME_ADDED",
        GameUpdated(_) => "GAME_UPDATED",
        GameDeleted(_) => "GAME_DELETED",
        MemberAdded(_) => "MEMBER_ADDED",
        MemberRemoved(_) => "MEMBER_REMOVED",
        OrgMemberAdded(_) => "ORG_MEMBER_ADDED",
        OrgMemberRemoved(_) => "ORG_MEMBER_REMOVED",
        OrganizationUpdated(_) => "ORGANIZATION_UPDATED",
        SummaryUpdated(_) => "SUMMARY_UPDATED",
        NotificationAdded(_) => "NOTIFICATION_ADDED",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Game, GameStatus, Team};

    #[test]
    fn team_delta_targets_the_owning_org() {
        let update = UpdateEvent::TeamAdded(Team {
            id: "team-1".into(),
            organization_id: "org-1".into(),
            name: "Varsity".into(),
            sport_id: None,
        });
        assert_eq!(topics_for(&update), vec![Topic::Org("org-1".into(), OrgSubtopic::Teams)]);
    }

    #[test]
    fn event_scoped_game_also_targets_its_event() {
        let update = UpdateEvent::GameUpdated(Game {
            id: "game-9".into(),
            organization_id: "org-1".into(),
            home_team_id: "team-1".into(),
            away_team_id: "team-2".into(),
            event_id: Some("event-3".into()),
            venue_id: None,
            status: GameStatus::InProgress,
            home_score: 2,
            away_score: 1,
            starts_at: None,
        });
        let topics = topics_for(&update);
        assert!(topics.contains(&Topic::Org("org-1".into(), OrgSubtopic::Games)));
        assert!(topics.contains(&Topic::Game("game-9".into())));
        assert!(topics.contains(&Topic::Event("event-3".into())));
    }
}
