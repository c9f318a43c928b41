//! Subscription lifecycle management
//!
//! Tracks per-scope interest and decides when room membership actually
//! changes. Each key walks inactive → active → pending-teardown → inactive;
//! the teardown is debounced so UI churn (mount, unmount, remount within the
//! window) costs nothing: a subscribe during pending-teardown cancels the
//! timer and keeps the existing membership, no re-join needed.
//!
//! Membership is connection-scoped on the server, so `replay` re-emits the
//! join for every key that still owns membership after a reconnect. Teardown
//! timers keep running across disconnects.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::client::channel::RoomTransport;
use crate::topic::{OrgSubtopic, Topic};

/// One tracked interest; bundles expand to several rooms joined and left as
/// a set
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Interest {
    /// A team and its memberships
    Team(String),
    /// An organization's member list
    OrganizationMembers(String),
    /// The organization data bundle: teams, venues, events, and games
    OrganizationData(String),
    /// Headline counts only
    OrganizationSummary(String),
    Event(String),
    Venue(String),
    Game(String),
    /// One person's notifications
    Notifications(String),
    Sports,
    Roles,
}

impl Interest {
    /// The rooms this interest maps to
    pub fn topics(&self) -> Vec<Topic> {
        match self {
            Self::Team(id) => vec![Topic::Team(id.clone())],
            Self::OrganizationMembers(id) => {
                vec![Topic::Org(id.clone(), OrgSubtopic::Members)]
            }
            Self::OrganizationData(id) => vec![
                Topic::Org(id.clone(), OrgSubtopic::Teams),
                Topic::Org(id.clone(), OrgSubtopic::Venues),
                Topic::Org(id.clone(), OrgSubtopic::Events),
                Topic::Org(id.clone(), OrgSubtopic::Games),
            ],
            Self::OrganizationSummary(id) => {
                vec![Topic::Org(id.clone(), OrgSubtopic::Summary)]
            }
            Self::Event(id) => vec![Topic::Event(id.clone())],
            Self::Venue(id) => vec![Topic::Venue(id.clone())],
            Self::Game(id) => vec![Topic::Game(id.clone())],
            Self::Notifications(id) => vec![Topic::Notifications(id.clone())],
            Self::Sports => vec![Topic::Sports],
            Self::Roles => vec![Topic::Roles],
        }
    }
}

/// Observable lifecycle state of a subscription key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Inactive,
    Active,
    PendingTeardown,
}

enum SubState {
    Active,
    PendingTeardown { epoch: u64, timer: JoinHandle<()> },
}

#[derive(Clone)]
pub struct SubscriptionManager {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn RoomTransport>,
    debounce: Duration,
    epoch: AtomicU64,
    keys: Mutex<HashMap<Interest, SubState>>,
}

impl SubscriptionManager {
    pub fn new(transport: Arc<dyn RoomTransport>, debounce: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                debounce,
                epoch: AtomicU64::new(0),
                keys: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Declare interest in a key
    ///
    /// Inactive keys join their rooms; a pending teardown is cancelled
    /// without re-joining (membership never lapsed); active keys no-op.
    pub fn subscribe(&self, interest: Interest) {
        use std::collections::hash_map::Entry;

        let mut keys = self.inner.keys.lock();
        match keys.entry(interest) {
            Entry::Vacant(entry) => {
                tracing::debug!("subscribe {:?}: joining", entry.key());
                for topic in entry.key().topics() {
                    self.inner.transport.join_room(&topic);
                }
                entry.insert(SubState::Active);
            }
            Entry::Occupied(mut entry) => {
                // Membership never lapsed; cancelling the timer is enough
                if let SubState::PendingTeardown { timer, .. } = entry.get() {
                    timer.abort();
                    tracing::debug!("subscribe {:?}: teardown cancelled", entry.key());
                    *entry.get_mut() = SubState::Active;
                }
            }
        }
    }

    /// Withdraw interest; the leave is deferred by the debounce window, and
    /// a repeat unsubscribe restarts it
    pub fn unsubscribe(&self, interest: &Interest) {
        let mut keys = self.inner.keys.lock();
        let Some(state) = keys.get_mut(interest) else {
            return;
        };
        if let SubState::PendingTeardown { timer, .. } = state {
            timer.abort();
        }
        *state = self.start_teardown(interest);
    }

    /// Re-emit joins for every key still owning room membership
    pub fn replay(&self) {
        let keys = self.inner.keys.lock();
        for interest in keys.keys() {
            tracing::debug!("replaying join for {:?}", interest);
            for topic in interest.topics() {
                self.inner.transport.join_room(&topic);
            }
        }
    }

    pub fn state(&self, interest: &Interest) -> SubscriptionState {
        match self.inner.keys.lock().get(interest) {
            None => SubscriptionState::Inactive,
            Some(SubState::Active) => SubscriptionState::Active,
            Some(SubState::PendingTeardown { .. }) => SubscriptionState::PendingTeardown,
        }
    }

    /// Abort all timers and drop all interest without emitting leaves
    pub fn cancel_all(&self) {
        let mut keys = self.inner.keys.lock();
        for state in keys.values() {
            if let SubState::PendingTeardown { timer, .. } = state {
                timer.abort();
            }
        }
        keys.clear();
    }

    fn start_teardown(&self, interest: &Interest) -> SubState {
        let epoch = self.inner.epoch.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!("unsubscribe {:?}: teardown in {:?}", interest, self.inner.debounce);
        let inner = self.inner.clone();
        let key = interest.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            finalize_teardown(&inner, &key, epoch);
        });
        SubState::PendingTeardown { epoch, timer }
    }
}

fn finalize_teardown(inner: &Inner, interest: &Interest, epoch: u64) {
    let mut keys = inner.keys.lock();
    // A subscribe or a restarted timer may have superseded this one
    match keys.get(interest) {
        Some(SubState::PendingTeardown { epoch: current, .. }) if *current == epoch => {}
        _ => return,
    }
    keys.remove(interest);
    tracing::debug!("teardown {:?}: leaving", interest);
    for topic in interest.topics() {
        inner.transport.leave_room(&topic);
    }
}
