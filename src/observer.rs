//! Change observers and the per-user notification feed.
//!
//! A client learns about new notifications either from the store's realtime
//! stream or by polling. Both are [`ChangeObserver`]s; the feed does not care
//! which one drives it. Every refresh replaces the in-memory snapshot
//! wholesale, so when a realtime event and a poll race, whichever lands last
//! wins.

use crate::{
    config::settings::FeedConfig,
    errors::Result,
    models::Notification,
    storage::{Storage, StoreEvent},
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// What an observer saw.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedChange {
    /// A notification for this user was just stored
    Inserted(Notification),
    /// Something changed (or may have); reload
    Refresh,
}

/// Source of feed changes for one user.
#[async_trait]
pub trait ChangeObserver: Send {
    /// Waits for the next change. `None` once the source is gone.
    async fn next_change(&mut self) -> Option<FeedChange>;
}

/// Realtime strategy over the store's change stream.
#[derive(Debug)]
pub struct RealtimeObserver {
    user_id: String,
    events: broadcast::Receiver<StoreEvent>,
}

impl RealtimeObserver {
    /// Observer for `user_id` reading `events`.
    #[must_use]
    pub fn new(user_id: impl Into<String>, events: broadcast::Receiver<StoreEvent>) -> Self {
        Self {
            user_id: user_id.into(),
            events,
        }
    }
}

#[async_trait]
impl ChangeObserver for RealtimeObserver {
    async fn next_change(&mut self) -> Option<FeedChange> {
        loop {
            match self.events.recv().await {
                Ok(StoreEvent::NotificationCreated(notification))
                    if notification.user_id == self.user_id =>
                {
                    return Some(FeedChange::Inserted(notification));
                }
                Ok(StoreEvent::NotificationsChanged { user_id }) if user_id == self.user_id => {
                    return Some(FeedChange::Refresh);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Realtime observer lagged by {} events", skipped);
                    return Some(FeedChange::Refresh);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Polling strategy: a refresh every period.
#[derive(Debug)]
pub struct PollingObserver {
    ticker: Interval,
}

impl PollingObserver {
    /// Observer firing every `period`, first after one full period.
    #[must_use]
    pub fn new(period: std::time::Duration) -> Self {
        let period = period.max(std::time::Duration::from_millis(10));
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { ticker }
    }
}

#[async_trait]
impl ChangeObserver for PollingObserver {
    async fn next_change(&mut self) -> Option<FeedChange> {
        self.ticker.tick().await;
        Some(FeedChange::Refresh)
    }
}

/// Realtime when the store publishes changes, polling otherwise.
#[must_use]
pub fn observer_for(
    store: &dyn Storage,
    user_id: &str,
    config: &FeedConfig,
) -> Box<dyn ChangeObserver> {
    match store.changes() {
        Some(events) => {
            debug!("Feed for {} uses realtime changes", user_id);
            Box::new(RealtimeObserver::new(user_id, events))
        }
        None => {
            debug!(
                "Feed for {} polls every {:?}",
                user_id,
                config.poll_interval()
            );
            Box::new(PollingObserver::new(config.poll_interval()))
        }
    }
}

/// In-memory notification list of one user.
pub struct NotificationFeed {
    user_id: String,
    store: Arc<dyn Storage>,
    notifications: Vec<Notification>,
    seen: HashSet<String>,
}

impl std::fmt::Debug for NotificationFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationFeed")
            .field("user_id", &self.user_id)
            .field("notifications", &self.notifications.len())
            .finish_non_exhaustive()
    }
}

impl NotificationFeed {
    /// Loads the current list. Notifications present now are not reported
    /// as new later.
    pub async fn open(store: Arc<dyn Storage>, user_id: impl Into<String>) -> Result<Self> {
        let user_id = user_id.into();
        let notifications = store.notifications_for(&user_id).await?;
        let seen = notifications.iter().map(|n| n.id.clone()).collect();
        Ok(Self {
            user_id,
            store,
            notifications,
            seen,
        })
    }

    /// Owner of this feed.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Snapshot, newest first.
    #[must_use]
    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// Notifications not yet read.
    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.notifications.iter().filter(|n| !n.read).count()
    }

    /// Reloads from the store and returns notifications not seen before.
    pub async fn refresh(&mut self) -> Result<Vec<Notification>> {
        let notifications = self.store.notifications_for(&self.user_id).await?;
        let fresh = notifications
            .iter()
            .filter(|n| !self.seen.contains(&n.id))
            .cloned()
            .collect::<Vec<_>>();
        self.seen.extend(fresh.iter().map(|n| n.id.clone()));
        self.notifications = notifications;
        Ok(fresh)
    }

    /// Applies an observed change; returns notifications not seen before.
    pub async fn apply(&mut self, change: FeedChange) -> Result<Vec<Notification>> {
        match change {
            FeedChange::Inserted(notification) => {
                if !self.seen.insert(notification.id.clone()) {
                    return Ok(Vec::new());
                }
                self.notifications.insert(0, notification.clone());
                Ok(vec![notification])
            }
            FeedChange::Refresh => self.refresh().await,
        }
    }

    /// Marks one notification read. Returns `false` if it is unknown.
    pub async fn mark_read(&mut self, notification_id: &str) -> Result<bool> {
        let found = self.store.mark_notification_read(notification_id).await?;
        if let Some(notification) = self
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id)
        {
            notification.read = true;
        }
        Ok(found)
    }

    /// Deletes every notification of this user.
    pub async fn clear_all(&mut self) -> Result<u64> {
        let removed = self.store.clear_notifications(&self.user_id).await?;
        self.notifications.clear();
        Ok(removed)
    }
}

/// Shows OS-level notifications on the client.
#[async_trait]
pub trait LocalNotifier: Send + Sync {
    /// Whether the user allowed notifications.
    fn permission_granted(&self) -> bool;

    /// Whether the app is on screen; foreground clients see the feed directly.
    fn is_foreground(&self) -> bool;

    /// Displays one notification.
    async fn show(&self, notification: &Notification) -> Result<()>;
}

/// Shows `notification` when permission is granted and the app is in the
/// background. Returns whether it was shown.
pub async fn show_if_backgrounded(notifier: &dyn LocalNotifier, notification: &Notification) -> bool {
    if !notifier.permission_granted() || notifier.is_foreground() {
        return false;
    }
    match notifier.show(notification).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Could not show notification {}: {}", notification.id, e);
            false
        }
    }
}

/// Drives `feed` from `observer` until the observer ends, showing new
/// notifications through `notifier`.
pub async fn run_feed(
    mut feed: NotificationFeed,
    mut observer: Box<dyn ChangeObserver>,
    notifier: Arc<dyn LocalNotifier>,
) {
    info!("Watching notifications for {}", feed.user_id());
    while let Some(change) = observer.next_change().await {
        match feed.apply(change).await {
            Ok(fresh) => {
                for notification in &fresh {
                    show_if_backgrounded(notifier.as_ref(), notification).await;
                }
            }
            Err(e) => warn!("Feed refresh for {} failed: {}", feed.user_id(), e),
        }
    }
    info!("Notification watch for {} ended", feed.user_id());
}
