//! End-to-end sync tests
//!
//! These run the full stack — session dispatch, topic broadcaster, channel
//! client, subscription manager, merge cache, discovery — over the
//! in-process transport, no TCP involved.

use std::sync::Arc;
use std::time::Duration;

use clubsync::client::{ChannelEvent, Interest, SyncClient};
use clubsync::config::{SimilarityConfig, SyncConfig};
use clubsync::model::GameStatus;
use clubsync::protocol::{ActionRequest, FetchRequest, SyncEvent, UpdateEvent};
use clubsync::server::{LocalConnection, LocalServer, MemoryStore};
use clubsync::topic::{OrgSubtopic, Topic};
use clubsync::SyncError;

// ============================================================================
// FIXTURES
// ============================================================================

fn server() -> (LocalServer<MemoryStore>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new(SimilarityConfig::default()));
    (LocalServer::new(store.clone()), store)
}

fn sync_client(conn: &LocalConnection) -> Arc<SyncClient> {
    sync_client_with(conn, SyncConfig::default())
}

fn sync_client_with(conn: &LocalConnection, config: SyncConfig) -> Arc<SyncClient> {
    let client = SyncClient::new(conn.client().clone(), config);
    client.init();
    client
}

async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    waited.unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

/// Collect pushed events until the channel stays quiet for `quiet`
async fn drain_events(
    rx: &mut tokio::sync::broadcast::Receiver<ChannelEvent>,
    quiet: Duration,
) -> Vec<ChannelEvent> {
    let mut events = Vec::new();
    while let Ok(Ok(event)) = tokio::time::timeout(quiet, rx.recv()).await {
        events.push(event);
    }
    events
}

// ============================================================================
// SNAPSHOT AND DELTA FLOW
// ============================================================================

#[tokio::test]
async fn join_syncs_then_deltas_extend_the_store() {
    let (server, store) = server();
    let org = store.seed_organization("Springvale High", "SPR");
    store.seed_team(&org.id, "Varsity");
    store.seed_team(&org.id, "Junior Varsity");

    let conn = server.connect();
    let client = sync_client(&conn);
    client.subscriptions().subscribe(Interest::OrganizationData(org.id.clone()));
    wait_until("initial team snapshot", || client.cache().teams_of(&org.id).len() == 2).await;

    // a second client mutates; the delta reaches the subscriber
    let other = server.connect();
    let writer = sync_client(&other);
    writer.add_team(&org.id, "Thirds", None).await.unwrap();

    wait_until("team delta", || client.cache().teams_of(&org.id).len() == 3).await;
}

#[tokio::test]
async fn snapshot_always_precedes_deltas_for_the_topic() {
    let (server, store) = server();
    let org = store.seed_organization("Springvale High", "SPR");
    store.seed_team(&org.id, "Varsity");
    store.seed_team(&org.id, "Junior Varsity");

    let conn = server.connect();
    let channel = conn.client().clone();
    let mut events = channel.subscribe_events();

    let topic = Topic::Org(org.id.clone(), OrgSubtopic::Teams);
    clubsync::client::RoomTransport::join_room(channel.as_ref(), &topic);

    let other = server.connect();
    let writer = sync_client(&other);
    writer.add_team(&org.id, "Thirds", None).await.unwrap();

    let seen = drain_events(&mut events, Duration::from_millis(300)).await;
    let sync_pos = seen
        .iter()
        .position(|e| matches!(e, ChannelEvent::Sync { event: SyncEvent::TeamsSync(_), .. }));
    let delta_pos = seen
        .iter()
        .position(|e| matches!(e, ChannelEvent::Update(UpdateEvent::TeamAdded(_))));

    let sync_pos = sync_pos.expect("no snapshot received");
    if let Some(delta_pos) = delta_pos {
        assert!(sync_pos < delta_pos, "delta arrived before snapshot");
    }
}

#[tokio::test]
async fn rejoining_a_topic_does_not_duplicate_records() {
    let (server, store) = server();
    let org = store.seed_organization("Springvale High", "SPR");
    store.seed_team(&org.id, "Varsity");
    store.seed_team(&org.id, "Junior Varsity");

    let conn = server.connect();
    let client = sync_client(&conn);
    let topic = Topic::Org(org.id.clone(), OrgSubtopic::Teams);

    clubsync::client::RoomTransport::join_room(conn.client().as_ref(), &topic);
    wait_until("first snapshot", || client.cache().teams_of(&org.id).len() == 2).await;

    // a second join pushes the same snapshot again; the merge absorbs it
    clubsync::client::RoomTransport::join_room(conn.client().as_ref(), &topic);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.cache().teams_of(&org.id).len(), 2);
}

#[tokio::test]
async fn summary_subscribers_get_counts_not_payloads() {
    let (server, store) = server();
    let org = store.seed_organization("Springvale High", "SPR");

    let conn = server.connect();
    let client = sync_client(&conn);
    client.subscriptions().subscribe(Interest::OrganizationSummary(org.id.clone()));
    wait_until("summary snapshot", || client.cache().summary_of(&org.id).is_some()).await;
    assert_eq!(client.cache().summary_of(&org.id).unwrap().team_count, 0);

    let other = server.connect();
    let writer = sync_client(&other);
    writer.add_team(&org.id, "Varsity", None).await.unwrap();

    wait_until("summary delta", || {
        client.cache().summary_of(&org.id).map(|s| s.team_count) == Some(1)
    })
    .await;
    // only headline counts crossed the wire for this subscriber
    assert!(client.cache().teams_of(&org.id).is_empty());
}

#[tokio::test]
async fn enriched_member_push_fills_person_and_membership() {
    let (server, store) = server();
    let org = store.seed_organization("Springvale High", "SPR");
    let team = store.seed_team(&org.id, "Varsity");

    let conn = server.connect();
    let client = sync_client(&conn);
    client.subscriptions().subscribe(Interest::Team(team.id.clone()));
    wait_until("team snapshot", || client.cache().team(&team.id).is_some()).await;

    let other = server.connect();
    let writer = sync_client(&other);
    writer
        .add_team_member(&team.id, None, Some("Sam Ortiz".into()), None)
        .await
        .unwrap();

    wait_until("member delta", || client.cache().members_of_team(&team.id).len() == 1).await;
    let membership = &client.cache().members_of_team(&team.id)[0];
    let person = client.cache().person(&membership.person_id).expect("person not decomposed");
    assert_eq!(person.name, "Sam Ortiz");
}

// ============================================================================
// FAILURE SEMANTICS
// ============================================================================

#[tokio::test]
async fn rejected_action_acks_error_and_broadcasts_nothing() {
    let (server, store) = server();
    let org = store.seed_organization("Springvale High", "SPR");
    store.seed_team(&org.id, "Varsity");

    let conn = server.connect();
    let client = sync_client(&conn);
    client.subscriptions().subscribe(Interest::OrganizationData(org.id.clone()));
    // the snapshot proves room membership is live
    wait_until("snapshot", || client.cache().teams_of(&org.id).len() == 1).await;

    let other = server.connect();
    let err = other
        .client()
        .action(ActionRequest::AddTeam {
            organization_id: org.id.clone(),
            name: "   ".into(),
            sport_id: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::ActionRejected { .. }));

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(client.cache().teams_of(&org.id).len(), 1);
}

#[tokio::test]
async fn point_fetch_miss_acks_null() {
    let (server, _store) = server();
    let conn = server.connect();
    let data = conn
        .client()
        .get_data(FetchRequest::Team { id: "missing".into() })
        .await
        .unwrap();
    assert!(data.is_none());
}

// ============================================================================
// DISCOVERY
// ============================================================================

#[tokio::test]
async fn merging_a_game_discovers_both_teams_and_their_org() {
    let (server, store) = server();
    let org = store.seed_organization("Springvale High", "SPR");
    let home = store.seed_team(&org.id, "Varsity");
    let away = store.seed_team(&org.id, "Junior Varsity");
    let game = store.seed_game(&org.id, &home.id, &away.id);

    let conn = server.connect();
    let client = sync_client(&conn);
    client.subscriptions().subscribe(Interest::Game(game.id.clone()));

    wait_until("game snapshot", || client.cache().game(&game.id).is_some()).await;
    wait_until("discovered home team", || client.cache().team(&home.id).is_some()).await;
    wait_until("discovered away team", || client.cache().team(&away.id).is_some()).await;
    // the discovered teams chain to their organization
    wait_until("discovered organization", || client.cache().organization(&org.id).is_some()).await;
}

#[tokio::test]
async fn deleted_entity_reappears_when_rereferenced() {
    let (server, store) = server();
    let org = store.seed_organization("Springvale High", "SPR");
    let home = store.seed_team(&org.id, "Varsity");
    let away = store.seed_team(&org.id, "Junior Varsity");

    let conn = server.connect();
    let client = sync_client(&conn);
    client.subscriptions().subscribe(Interest::OrganizationData(org.id.clone()));
    wait_until("teams", || client.cache().teams_of(&org.id).len() == 2).await;

    // delete locally via push, then re-reference through a new game
    let other = server.connect();
    let writer = sync_client(&other);
    writer.delete_team(&home.id).await.unwrap();
    wait_until("delete propagated", || client.cache().team(&home.id).is_none()).await;

    store.seed_team_raw(home.clone());
    writer.add_game(&org.id, &home.id, &away.id, None, None).await.unwrap();
    wait_until("rediscovered team", || client.cache().team(&home.id).is_some()).await;
}

// ============================================================================
// RECONNECT
// ============================================================================

#[tokio::test]
async fn reconnect_replays_each_active_key_exactly_once() {
    let (server, store) = server();
    let org = store.seed_organization("Springvale High", "SPR");
    let a = store.seed_team(&org.id, "Alpha");
    let b = store.seed_team(&org.id, "Beta");
    let c = store.seed_team(&org.id, "Gamma");

    let conn = server.connect();
    let config = SyncConfig {
        teardown_debounce: Duration::from_millis(50),
        ..SyncConfig::default()
    };
    let client = sync_client_with(&conn, config);

    client.subscriptions().subscribe(Interest::Team(a.id.clone()));
    client.subscriptions().subscribe(Interest::Team(b.id.clone()));
    client.subscriptions().subscribe(Interest::Team(c.id.clone()));
    client.subscriptions().unsubscribe(&Interest::Team(c.id.clone()));
    wait_until("teardown of c", || {
        client.subscriptions().state(&Interest::Team(c.id.clone()))
            == clubsync::client::SubscriptionState::Inactive
    })
    .await;

    let mut events = conn.client().subscribe_events();
    conn.disconnect();
    wait_until("disconnect observed", || !client.is_connected()).await;
    conn.reconnect();
    wait_until("reconnect observed", || client.is_connected()).await;

    let seen = drain_events(&mut events, Duration::from_millis(300)).await;
    let team_syncs = |id: &str| {
        seen.iter()
            .filter(|e| matches!(e, ChannelEvent::Sync { event: SyncEvent::TeamSync(t), .. } if t.id == id))
            .count()
    };
    assert_eq!(team_syncs(&a.id), 1, "team a must be replayed exactly once");
    assert_eq!(team_syncs(&b.id), 1, "team b must be replayed exactly once");
    assert_eq!(team_syncs(&c.id), 0, "inactive key must not be replayed");
}

// ============================================================================
// OPTIMISTIC MUTATION
// ============================================================================

#[tokio::test]
async fn rename_applies_locally_then_reconciles() {
    let (server, store) = server();
    let org = store.seed_organization("Springvale High", "SPR");
    let team = store.seed_team(&org.id, "Varsity");

    let conn = server.connect();
    let client = sync_client(&conn);
    client.subscriptions().subscribe(Interest::Team(team.id.clone()));
    wait_until("team snapshot", || client.cache().team(&team.id).is_some()).await;

    let merges = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let seen = merges.clone();
    client.cache().add_listener(move |change| {
        if matches!(
            change,
            clubsync::client::CacheChange::Merged { kind: clubsync::EntityKind::Team, .. }
        ) {
            seen.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    });

    let renamed = client.rename_team(&team.id, "Night Ravens").await.unwrap();
    assert_eq!(renamed.name, "Night Ravens");
    assert_eq!(client.cache().team(&team.id).unwrap().name, "Night Ravens");
    // optimistic patch plus authoritative re-merge both notified
    assert!(merges.load(std::sync::atomic::Ordering::Relaxed) >= 2);
}

#[tokio::test]
async fn failed_rename_surfaces_the_rejection() {
    let (server, _store) = server();
    let conn = server.connect();
    let client = sync_client(&conn);

    let err = client.rename_team("missing", "Whatever").await.unwrap_err();
    assert!(matches!(err, SyncError::ActionRejected { .. }));
}

#[tokio::test]
async fn score_update_is_optimistic() {
    let (server, store) = server();
    let org = store.seed_organization("Springvale High", "SPR");
    let home = store.seed_team(&org.id, "Varsity");
    let away = store.seed_team(&org.id, "Junior Varsity");
    let game = store.seed_game(&org.id, &home.id, &away.id);

    let conn = server.connect();
    let client = sync_client(&conn);
    client.subscriptions().subscribe(Interest::Game(game.id.clone()));
    wait_until("game snapshot", || client.cache().game(&game.id).is_some()).await;

    let updated = client
        .update_game_score(&game.id, 3, 1, Some(GameStatus::InProgress))
        .await
        .unwrap();
    assert_eq!(updated.home_score, 3);
    assert_eq!(client.cache().game(&game.id).unwrap().status, GameStatus::InProgress);
}

// ============================================================================
// DUPLICATE SEARCH
// ============================================================================

fn patient_search_config() -> SyncConfig {
    // a generous race window keeps these deterministic on slow runners
    SyncConfig { search_race_timeout: Duration::from_secs(2), ..SyncConfig::default() }
}

#[tokio::test]
async fn search_prefers_the_authoritative_result_and_merges_it() {
    let (server, store) = server();
    store.seed_organization("Springvale High", "SPR");
    store.seed_organization("Springfield High", "SHS");

    let conn = server.connect();
    let client = sync_client_with(&conn, patient_search_config());

    let outcome = client.search_organizations("spring").await;
    assert!(outcome.authoritative, "in-process server should win the race");
    assert_eq!(outcome.matches.len(), 2);
    assert!(outcome.matches.iter().all(|m| m.score > 0));
    // server-revealed organizations are merged into the local cache
    assert_eq!(client.cache().organizations().len(), 2);
}

#[tokio::test]
async fn short_name_match_ranks_first_end_to_end() {
    let (server, store) = server();
    let springvale = store.seed_organization("Springvale High", "SPR");
    store.seed_organization("Springfield High", "SHS");

    let conn = server.connect();
    let client = sync_client_with(&conn, patient_search_config());

    let outcome = client.search_organizations("SPR").await;
    assert_eq!(outcome.matches[0].organization.id, springvale.id);
}

// ============================================================================
// NOTIFICATIONS AND REFERENCE DATA
// ============================================================================

#[tokio::test]
async fn notifications_sync_for_the_subscribed_person() {
    let (server, store) = server();
    let person = store.seed_person("Sam Ortiz");
    store.seed_notification(&person.id, "Game tonight at 7");

    let conn = server.connect();
    let client = sync_client(&conn);
    client.subscriptions().subscribe(Interest::Notifications(person.id.clone()));

    wait_until("notification snapshot", || {
        client.cache().notifications_of(&person.id).len() == 1
    })
    .await;
    assert_eq!(client.cache().notifications_of(&person.id)[0].message, "Game tonight at 7");
}

#[tokio::test]
async fn global_reference_topics_sync_lists() {
    let store = Arc::new(MemoryStore::with_reference_data(SimilarityConfig::default()));
    let server = LocalServer::new(store.clone());

    let conn = server.connect();
    let client = sync_client(&conn);
    client.subscriptions().subscribe(Interest::Sports);
    client.subscriptions().subscribe(Interest::Roles);

    wait_until("sports sync", || client.cache().sports().len() == 4).await;
    wait_until("roles sync", || client.cache().roles().len() == 4).await;
}
