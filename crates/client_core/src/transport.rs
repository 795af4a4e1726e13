//! Request/response boundary to the remote event service.
//!
//! Everything above this module speaks [`ServiceRequest`] and [`ServiceReply`];
//! only [`HttpEventService`] knows about methods, paths and cookies.

use std::{fmt, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{cookie::Jar, Client, Method};
use serde_json::Value;
use shared::{
    domain::EventId,
    protocol::{CreateEventRequest, InviteRequest, RespondRequest},
};
use tracing::debug;
use url::Url;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Organized,
    Invited,
    Accepted,
}

impl Collection {
    pub const ALL: [Collection; 3] = [
        Collection::Organized,
        Collection::Invited,
        Collection::Accepted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Organized => "organized",
            Collection::Invited => "invited",
            Collection::Accepted => "accepted",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServiceRequest {
    ListCollection(Collection),
    Search {
        query: String,
        date: Option<NaiveDate>,
    },
    CreateEvent(CreateEventRequest),
    Invite(InviteRequest),
    Respond(RespondRequest),
    DeleteEvent(EventId),
    GetEvent(EventId),
    ListAttendees(EventId),
}

impl ServiceRequest {
    pub fn name(&self) -> &'static str {
        match self {
            ServiceRequest::ListCollection(Collection::Organized) => "list_organized",
            ServiceRequest::ListCollection(Collection::Invited) => "list_invited",
            ServiceRequest::ListCollection(Collection::Accepted) => "list_accepted",
            ServiceRequest::Search { .. } => "search",
            ServiceRequest::CreateEvent(_) => "create_event",
            ServiceRequest::Invite(_) => "invite",
            ServiceRequest::Respond(_) => "respond",
            ServiceRequest::DeleteEvent(_) => "delete_event",
            ServiceRequest::GetEvent(_) => "get_event",
            ServiceRequest::ListAttendees(_) => "list_attendees",
        }
    }
}

/// Status and (leniently parsed) JSON body of one service response.
/// A body that is absent or not valid JSON is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceReply {
    pub status: u16,
    pub body: Option<Value>,
}

impl ServiceReply {
    pub fn new(status: u16, body: Option<Value>) -> Self {
        Self { status, body }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(200, Some(body))
    }

    pub fn unauthenticated() -> Self {
        Self::new(401, None)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unauthenticated(&self) -> bool {
        self.status == 401
    }
}

/// Transport seam. `Err` means the request never produced a response
/// (connection, timeout, body read); HTTP failures come back as replies.
#[async_trait]
pub trait EventService: Send + Sync {
    async fn send(&self, request: ServiceRequest) -> Result<ServiceReply>;
}

#[derive(Debug, Clone)]
pub struct HttpServiceOptions {
    pub base_url: String,
    pub request_timeout: Option<Duration>,
    pub session_cookie: Option<String>,
}

impl HttpServiceOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            session_cookie: None,
        }
    }
}

pub struct HttpEventService {
    http: Client,
    base_url: Url,
}

impl HttpEventService {
    pub fn new(options: HttpServiceOptions) -> Result<Self> {
        let base_url = Url::parse(options.base_url.trim())
            .with_context(|| format!("invalid event service url: {}", options.base_url))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!(
                "event service url must be hierarchical: {}",
                options.base_url
            ));
        }

        // Seeded into the jar rather than sent as a header, so Set-Cookie
        // refreshes from the service replace it.
        let jar = Jar::default();
        if let Some(cookies) = options.session_cookie.as_deref() {
            let mut origin = base_url.clone();
            origin.set_path("/");
            for pair in cookies.split(';').map(str::trim).filter(|pair| !pair.is_empty()) {
                jar.add_cookie_str(pair, &origin);
            }
        }

        let mut builder = Client::builder().cookie_provider(Arc::new(jar));
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("failed to build http client")?;

        Ok(Self { http, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("event service url cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl EventService for HttpEventService {
    async fn send(&self, request: ServiceRequest) -> Result<ServiceReply> {
        let builder = match &request {
            ServiceRequest::ListCollection(collection) => self
                .http
                .request(Method::GET, self.endpoint(&["events", collection.as_str()])?),
            ServiceRequest::Search { query, date } => {
                let mut params = Vec::new();
                if !query.trim().is_empty() {
                    params.push(("q", query.clone()));
                }
                if let Some(date) = date {
                    params.push(("date", date.format("%Y-%m-%d").to_string()));
                }
                self.http
                    .request(Method::GET, self.endpoint(&["events", "search"])?)
                    .query(&params)
            }
            ServiceRequest::CreateEvent(body) => self
                .http
                .request(Method::POST, self.endpoint(&["events", ""])?)
                .json(body),
            ServiceRequest::Invite(body) => self
                .http
                .request(Method::POST, self.endpoint(&["events", "invite"])?)
                .json(body),
            ServiceRequest::Respond(body) => self
                .http
                .request(Method::POST, self.endpoint(&["events", "respond"])?)
                .json(body),
            ServiceRequest::DeleteEvent(event_id) => self
                .http
                .request(Method::DELETE, self.endpoint(&["events", &*event_id.key()])?),
            ServiceRequest::GetEvent(event_id) => self
                .http
                .request(Method::GET, self.endpoint(&["events", &*event_id.key()])?),
            ServiceRequest::ListAttendees(event_id) => self.http.request(
                Method::GET,
                self.endpoint(&["events", "attendees", &*event_id.key()])?,
            ),
        };

        let response = builder
            .send()
            .await
            .with_context(|| format!("{} request failed", request.name()))?;
        let status = response.status().as_u16();

        // Session expiry is decided on status alone.
        if status == 401 {
            debug!(request = request.name(), status, "event service reply");
            return Ok(ServiceReply::unauthenticated());
        }

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("failed to read {} response body", request.name()))?;
        let body = if bytes.is_empty() {
            None
        } else {
            serde_json::from_slice::<Value>(&bytes).ok()
        };
        debug!(
            request = request.name(),
            status,
            has_body = body.is_some(),
            "event service reply"
        );

        Ok(ServiceReply { status, body })
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
