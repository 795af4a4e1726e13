use std::{sync::Arc, time::Duration};

use futures::future::join3;
use shared::domain::{Event, ViewerSession};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

pub mod detail;
pub mod error;
pub mod mutation;
pub mod roster;
pub mod search;
pub mod status;
pub mod transport;

pub use detail::EventDetail;
pub use error::{ClientError, MutationKind};
pub use mutation::InFlightLocks;
pub use roster::{LoadState, Roster, RosterEntry};
pub use search::{SearchOverlay, SearchQuery, SearchState, DEFAULT_SEARCH_DEBOUNCE};
pub use status::derive_viewer_status;
pub use transport::{
    Collection, EventService, HttpEventService, HttpServiceOptions, ServiceReply, ServiceRequest,
};

use roster::{build_roster, events_from_body, RosterPatch, RosterStore};

/// State changes broadcast to whatever renders the dashboard.
#[derive(Debug, Clone)]
pub enum DashboardEvent {
    RosterUpdated(Roster),
    LoadFailed { reason: String },
    SessionExpired,
    SearchUpdated(Vec<RosterEntry>),
}

/// Client-side roster synchronizer for one signed-in viewer.
pub struct EventDashboard {
    service: Arc<dyn EventService>,
    session: ViewerSession,
    store: RwLock<RosterStore>,
    locks: InFlightLocks,
    search: SearchOverlay,
    events: broadcast::Sender<DashboardEvent>,
}

impl EventDashboard {
    pub fn new(service: Arc<dyn EventService>, session: ViewerSession) -> Arc<Self> {
        Self::with_search_debounce(service, session, DEFAULT_SEARCH_DEBOUNCE)
    }

    pub fn with_search_debounce(
        service: Arc<dyn EventService>,
        session: ViewerSession,
        debounce: Duration,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        let search = SearchOverlay::new(
            Arc::clone(&service),
            session.clone(),
            debounce,
            events.clone(),
        );
        Arc::new(Self {
            service,
            session,
            store: RwLock::new(RosterStore::default()),
            locks: InFlightLocks::default(),
            search,
            events,
        })
    }

    pub fn session(&self) -> &ViewerSession {
        &self.session
    }

    pub fn search(&self) -> &SearchOverlay {
        &self.search
    }

    pub fn locks(&self) -> &InFlightLocks {
        &self.locks
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<DashboardEvent> {
        self.events.subscribe()
    }

    pub async fn roster(&self) -> Roster {
        self.store.read().await.view()
    }

    pub async fn load_state(&self) -> LoadState {
        self.store.read().await.load_state().clone()
    }

    pub async fn has_pending_patches(&self) -> bool {
        !self.store.read().await.pending_patches().is_empty()
    }

    /// Re-fetches all three collections and atomically replaces the roster.
    ///
    /// Only session expiry is an error. A transport failure installs an empty
    /// roster with [`LoadState::Failed`] and still returns `Ok`.
    pub async fn reconcile(&self) -> Result<Roster, ClientError> {
        let replies = match self.fetch_collections().await {
            Ok(replies) => replies,
            Err(ClientError::Unauthenticated) => {
                warn!(viewer = self.session.email(), "roster: session expired during reconciliation");
                let _ = self.events.send(DashboardEvent::SessionExpired);
                return Err(ClientError::Unauthenticated);
            }
            Err(err) => {
                let reason = err.to_string();
                error!(error = %reason, "roster: reconciliation failed; showing empty roster");
                let discarded = self
                    .store
                    .write()
                    .await
                    .replace(Roster::default(), LoadState::Failed { reason: reason.clone() });
                if discarded > 0 {
                    info!(discarded, "roster: dropped optimistic patches after failed reload");
                }
                let _ = self.events.send(DashboardEvent::LoadFailed { reason });
                return Ok(Roster::default());
            }
        };

        let [organized, invited, accepted] = replies;
        let roster = build_roster(
            collection_events(Collection::Organized, organized),
            collection_events(Collection::Invited, invited),
            collection_events(Collection::Accepted, accepted),
            &self.session,
        );

        let discarded = self
            .store
            .write()
            .await
            .replace(roster.clone(), LoadState::Loaded);
        info!(
            organized = roster.organized.len(),
            invited = roster.invited.len(),
            accepted = roster.accepted.len(),
            discarded_patches = discarded,
            "roster: reconciled"
        );
        let _ = self.events.send(DashboardEvent::RosterUpdated(roster.clone()));
        Ok(roster)
    }

    // Any 401 wins over transport failures.
    pub(crate) async fn fetch_collections(&self) -> Result<[ServiceReply; 3], ClientError> {
        let (organized, invited, accepted) = join3(
            self.service
                .send(ServiceRequest::ListCollection(Collection::Organized)),
            self.service
                .send(ServiceRequest::ListCollection(Collection::Invited)),
            self.service
                .send(ServiceRequest::ListCollection(Collection::Accepted)),
        )
        .await;

        let outcomes = [organized, invited, accepted];
        if outcomes
            .iter()
            .any(|outcome| matches!(outcome, Ok(reply) if reply.is_unauthenticated()))
        {
            return Err(ClientError::Unauthenticated);
        }

        let [organized, invited, accepted] = outcomes;
        Ok([
            organized.map_err(ClientError::network)?,
            invited.map_err(ClientError::network)?,
            accepted.map_err(ClientError::network)?,
        ])
    }

    pub(crate) async fn send(&self, request: ServiceRequest) -> Result<ServiceReply, ClientError> {
        self.service.send(request).await.map_err(ClientError::network)
    }

    pub(crate) async fn apply_patch(&self, patch: RosterPatch) {
        let mutation_id = self.store.write().await.apply_patch(patch);
        debug!(mutation_id = mutation_id.0, "roster: applied optimistic patch");
        let _ = self
            .events
            .send(DashboardEvent::RosterUpdated(self.roster().await));
    }
}

fn collection_events(collection: Collection, reply: ServiceReply) -> Vec<Event> {
    if !reply.is_success() {
        warn!(
            collection = collection.as_str(),
            status = reply.status,
            "roster: collection fetch was not successful; treating as empty"
        );
        return Vec::new();
    }
    events_from_body(reply.body.as_ref(), collection.as_str())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
