use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock as StdRwLock};

use tokio::sync::{RwLock, broadcast, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

use circle_core::projection;
use circle_types::events::GatewayEvent;
use circle_types::models::Viewer;

/// Manages live subscriptions and fans events out to them.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Every subscription sees every event and filters for its own viewer.
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// Targeted send channels: session_id -> conn_id -> sender.
    /// One login may hold several gateway connections.
    session_channels: RwLock<HashMap<Uuid, HashMap<Uuid, mpsc::UnboundedSender<GatewayEvent>>>>,

    live_subscriptions: AtomicUsize,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                session_channels: RwLock::new(HashMap::new()),
                live_subscriptions: AtomicUsize::new(0),
            }),
        }
    }

    /// Open a live view for `viewer`. Dropping the returned handle releases it.
    pub fn subscribe(&self, viewer: Viewer) -> Subscription {
        let live = self.inner.live_subscriptions.fetch_add(1, Ordering::AcqRel) + 1;
        debug!("subscription opened for {} ({} live)", viewer.id, live);
        Subscription {
            rx: self.inner.broadcast_tx.subscribe(),
            viewer,
            watched: WatchList::default(),
            inner: self.inner.clone(),
        }
    }

    /// Number of subscriptions whose handles are still alive.
    pub fn live_subscriptions(&self) -> usize {
        self.inner.live_subscriptions.load(Ordering::Acquire)
    }

    /// Publish an event to every subscription that wants it.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Register a targeted channel for a connection identified with `session_id`.
    /// Returns (conn_id, receiver).
    pub async fn register_session_channel(
        &self,
        session_id: Uuid,
    ) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .session_channels
            .write()
            .await
            .entry(session_id)
            .or_default()
            .insert(conn_id, tx);
        (conn_id, rx)
    }

    /// Remove one connection's targeted channel, leaving the session's others.
    pub async fn unregister_session_channel(&self, session_id: Uuid, conn_id: Uuid) {
        let mut channels = self.inner.session_channels.write().await;
        if let Some(conns) = channels.get_mut(&session_id) {
            conns.remove(&conn_id);
            if conns.is_empty() {
                channels.remove(&session_id);
            }
        }
    }

    /// Send a targeted event to every connection of one session.
    pub async fn send_to_session(&self, session_id: Uuid, event: GatewayEvent) {
        let channels = self.inner.session_channels.read().await;
        if let Some(conns) = channels.get(&session_id) {
            for tx in conns.values() {
                let _ = tx.send(event.clone());
            }
        }
    }
}

/// Donation ids whose coordination channel a client currently shows.
/// Shared between a connection's reader (which updates it) and writer.
#[derive(Clone, Default)]
pub struct WatchList(Arc<StdRwLock<HashSet<Uuid>>>);

impl WatchList {
    pub fn replace(&self, ids: impl IntoIterator<Item = Uuid>) {
        let mut set = self.0.write().unwrap_or_else(|e| e.into_inner());
        *set = ids.into_iter().collect();
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.0.read().unwrap_or_else(|e| e.into_inner()).contains(&id)
    }
}

/// An open live view. Receives donation changes that affect its viewer's
/// dashboard and messages for watched donations the viewer takes part in.
pub struct Subscription {
    rx: broadcast::Receiver<GatewayEvent>,
    viewer: Viewer,
    watched: WatchList,
    inner: Arc<DispatcherInner>,
}

impl Subscription {
    pub fn watch_list(&self) -> WatchList {
        self.watched.clone()
    }

    /// Next event for this subscription, or `None` once the dispatcher is gone.
    pub async fn recv(&mut self) -> Option<GatewayEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    if self.wants(&event) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Subscription for {} lagged by {} events", self.viewer.id, n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    fn wants(&self, event: &GatewayEvent) -> bool {
        match event {
            GatewayEvent::DonationUpsert { donation, previous_status } => {
                projection::affects_viewer(donation, *previous_status, &self.viewer)
            }
            GatewayEvent::MessageCreate { message, donor_id, volunteer_id } => {
                let participant =
                    *donor_id == self.viewer.id || *volunteer_id == Some(self.viewer.id);
                participant && self.watched.contains(message.donation_id)
            }
            // Session events are targeted, never broadcast.
            GatewayEvent::Ready { .. } | GatewayEvent::SessionEnded => false,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let live = self.inner.live_subscriptions.fetch_sub(1, Ordering::AcqRel) - 1;
        debug!("subscription closed for {} ({} live)", self.viewer.id, live);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use circle_types::models::{Donation, DonationStatus, DonationType, Message, Role};
    use std::time::Duration;

    fn viewer(role: Role) -> Viewer {
        Viewer { id: Uuid::new_v4(), role }
    }

    fn donation(donor: Uuid) -> Donation {
        Donation {
            id: Uuid::new_v4(),
            donor_id: donor,
            donor_name: "d".into(),
            volunteer_id: None,
            title: "Apples".into(),
            description: String::new(),
            kind: DonationType::Food,
            status: DonationStatus::Available,
            location: "Depot".into(),
            image_url: String::new(),
            created_at: 1,
        }
    }

    async fn next(sub: &mut Subscription) -> Option<GatewayEvent> {
        tokio::time::timeout(Duration::from_millis(50), sub.recv()).await.ok().flatten()
    }

    #[tokio::test]
    async fn dropping_handle_releases_subscription() {
        let dispatcher = Dispatcher::new();
        let a = dispatcher.subscribe(viewer(Role::Donor));
        let b = dispatcher.subscribe(viewer(Role::Volunteer));
        assert_eq!(dispatcher.live_subscriptions(), 2);

        drop(a);
        assert_eq!(dispatcher.live_subscriptions(), 1);
        drop(b);
        assert_eq!(dispatcher.live_subscriptions(), 0);
    }

    #[tokio::test]
    async fn dashboard_events_follow_visibility() {
        let dispatcher = Dispatcher::new();
        let donor = viewer(Role::Donor);
        let stranger = viewer(Role::Donor);
        let volunteer = viewer(Role::Volunteer);

        let mut donor_sub = dispatcher.subscribe(donor);
        let mut stranger_sub = dispatcher.subscribe(stranger);
        let mut vol_sub = dispatcher.subscribe(volunteer);

        let d = donation(donor.id);
        dispatcher.broadcast(GatewayEvent::DonationUpsert { donation: d.clone(), previous_status: None });

        assert!(matches!(next(&mut donor_sub).await, Some(GatewayEvent::DonationUpsert { .. })));
        assert!(matches!(next(&mut vol_sub).await, Some(GatewayEvent::DonationUpsert { .. })));
        assert!(next(&mut stranger_sub).await.is_none());
    }

    #[tokio::test]
    async fn claim_reaches_rival_volunteers_so_they_can_drop_it() {
        let dispatcher = Dispatcher::new();
        let donor = viewer(Role::Donor);
        let claimer = viewer(Role::Volunteer);
        let rival = viewer(Role::Volunteer);
        let mut rival_sub = dispatcher.subscribe(rival);

        let mut d = donation(donor.id);
        d.status = DonationStatus::PickedUp;
        d.volunteer_id = Some(claimer.id);
        dispatcher.broadcast(GatewayEvent::DonationUpsert {
            donation: d.clone(),
            previous_status: Some(DonationStatus::Available),
        });
        assert!(next(&mut rival_sub).await.is_some());

        d.status = DonationStatus::Delivered;
        dispatcher.broadcast(GatewayEvent::DonationUpsert {
            donation: d,
            previous_status: Some(DonationStatus::PickedUp),
        });
        assert!(next(&mut rival_sub).await.is_none());
    }

    #[tokio::test]
    async fn messages_need_watch_and_participation() {
        let dispatcher = Dispatcher::new();
        let donor = viewer(Role::Donor);
        let volunteer = viewer(Role::Volunteer);
        let outsider = viewer(Role::Volunteer);
        let d = donation(donor.id);

        let mut donor_sub = dispatcher.subscribe(donor);
        let mut vol_sub = dispatcher.subscribe(volunteer);
        let mut outsider_sub = dispatcher.subscribe(outsider);
        donor_sub.watch_list().replace([d.id]);
        outsider_sub.watch_list().replace([d.id]);

        dispatcher.broadcast(GatewayEvent::MessageCreate {
            message: Message {
                id: Uuid::new_v4(),
                donation_id: d.id,
                sender_id: volunteer.id,
                text: "hi".into(),
                timestamp: 1,
            },
            donor_id: donor.id,
            volunteer_id: Some(volunteer.id),
        });

        assert!(matches!(next(&mut donor_sub).await, Some(GatewayEvent::MessageCreate { .. })));
        // Participant, but not watching this chat.
        assert!(next(&mut vol_sub).await.is_none());
        // Watching, but not a participant.
        assert!(next(&mut outsider_sub).await.is_none());
    }

    #[tokio::test]
    async fn targeted_events_stay_within_their_session() {
        let dispatcher = Dispatcher::new();
        let ended = Uuid::new_v4();
        let other = Uuid::new_v4();
        let (_, mut first_rx) = dispatcher.register_session_channel(ended).await;
        let (second_conn, mut second_rx) = dispatcher.register_session_channel(ended).await;
        let (_, mut other_rx) = dispatcher.register_session_channel(other).await;

        dispatcher.send_to_session(ended, GatewayEvent::SessionEnded).await;
        assert!(matches!(first_rx.recv().await, Some(GatewayEvent::SessionEnded)));
        assert!(matches!(second_rx.recv().await, Some(GatewayEvent::SessionEnded)));
        assert!(other_rx.try_recv().is_err());

        // Closing one connection leaves the session's other one registered.
        dispatcher.unregister_session_channel(ended, second_conn).await;
        dispatcher.send_to_session(ended, GatewayEvent::SessionEnded).await;
        assert!(matches!(first_rx.recv().await, Some(GatewayEvent::SessionEnded)));
        assert!(second_rx.try_recv().is_err());
    }
}
