use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::NaiveDate;
use shared::domain::{EventId, ViewerSession};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

use crate::{
    roster::{events_from_body, RosterEntry},
    transport::{EventService, ServiceRequest},
    DashboardEvent,
};

pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    pub date: Option<NaiveDate>,
}

impl SearchQuery {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            date: None,
        }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.date.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub query: SearchQuery,
    pub results: Vec<RosterEntry>,
    pub searching: bool,
}

#[derive(Default)]
struct OverlayState {
    view: SearchState,
    // Removed since the last schedule; kept out of late commits too.
    removed: HashSet<EventId>,
}

pub struct SearchOverlay {
    inner: Arc<SearchInner>,
}

struct SearchInner {
    service: Arc<dyn EventService>,
    session: ViewerSession,
    debounce: Duration,
    latest: AtomicU64,
    state: Mutex<OverlayState>,
    events: broadcast::Sender<DashboardEvent>,
}

impl SearchOverlay {
    pub(crate) fn new(
        service: Arc<dyn EventService>,
        session: ViewerSession,
        debounce: Duration,
        events: broadcast::Sender<DashboardEvent>,
    ) -> Self {
        Self {
            inner: Arc::new(SearchInner {
                service,
                session,
                debounce,
                latest: AtomicU64::new(0),
                state: Mutex::new(OverlayState::default()),
                events,
            }),
        }
    }

    /// Supersedes anything scheduled earlier. An empty query clears the
    /// results immediately and sends nothing.
    pub async fn schedule(&self, query: SearchQuery) -> u64 {
        let token = self.inner.latest.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.state.lock().await.removed.clear();

        if query.is_empty() {
            self.inner
                .commit(token, SearchQuery::default(), Vec::new())
                .await;
            return token;
        }

        {
            let mut state = self.inner.state.lock().await;
            state.view.query = query.clone();
            state.view.searching = true;
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            if !inner.is_latest(token) {
                debug!(token, "search: superseded before sending");
                return;
            }
            inner.run(token, query).await;
        });
        token
    }

    pub async fn clear(&self) {
        let token = self.inner.latest.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.state.lock().await.removed.clear();
        self.inner
            .commit(token, SearchQuery::default(), Vec::new())
            .await;
    }

    pub async fn remove(&self, event_id: &EventId) {
        let results = {
            let mut state = self.inner.state.lock().await;
            state.removed.insert(event_id.clone());
            let before = state.view.results.len();
            state.view.results.retain(|entry| entry.id() != event_id);
            if state.view.results.len() == before {
                return;
            }
            state.view.results.clone()
        };
        let _ = self.inner.events.send(DashboardEvent::SearchUpdated(results));
    }

    pub async fn snapshot(&self) -> SearchState {
        self.inner.state.lock().await.view.clone()
    }

    pub async fn results(&self) -> Vec<RosterEntry> {
        self.inner.state.lock().await.view.results.clone()
    }

    pub async fn is_searching(&self) -> bool {
        self.inner.state.lock().await.view.searching
    }

    pub fn latest_token(&self) -> u64 {
        self.inner.latest.load(Ordering::SeqCst)
    }
}

impl SearchInner {
    fn is_latest(&self, token: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == token
    }

    async fn run(&self, token: u64, query: SearchQuery) {
        let outcome = self
            .service
            .send(ServiceRequest::Search {
                query: query.text.trim().to_string(),
                date: query.date,
            })
            .await;

        let results = match outcome {
            Ok(reply) if reply.is_success() => events_from_body(reply.body.as_ref(), "search")
                .into_iter()
                .map(|event| RosterEntry::derived(event, &self.session))
                .collect(),
            Ok(reply) => {
                warn!(token, status = reply.status, "search: request was not successful; clearing results");
                Vec::new()
            }
            Err(err) => {
                warn!(token, error = %format!("{err:#}"), "search: request failed; clearing results");
                Vec::new()
            }
        };

        self.commit(token, query, results).await;
    }

    async fn commit(&self, token: u64, query: SearchQuery, mut results: Vec<RosterEntry>) {
        {
            let mut state = self.state.lock().await;
            // Checked under the state lock so a newer schedule cannot interleave.
            if !self.is_latest(token) {
                debug!(token, "search: discarding stale results");
                return;
            }
            results.retain(|entry| !state.removed.contains(entry.id()));
            state.view.query = query;
            state.view.results = results.clone();
            state.view.searching = false;
        }
        debug!(token, count = results.len(), "search: results committed");
        let _ = self.events.send(DashboardEvent::SearchUpdated(results));
    }
}

#[cfg(test)]
#[path = "tests/search_tests.rs"]
mod tests;
