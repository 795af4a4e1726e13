use serde::Serialize;
use serde_json::from_value;
use shared::{
    domain::{Event, EventId},
    protocol::{normalize_attendees, AttendeeContact},
};
use tracing::{error, warn};

use crate::{
    roster::events_from_body, transport::ServiceRequest, ClientError, Collection, DashboardEvent,
    EventDashboard,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventDetail {
    pub event: Option<Event>,
    pub attendees: Vec<AttendeeContact>,
}

impl EventDashboard {
    /// Looks an event up in the viewer's three collections, falling back to the
    /// single-event endpoint, and loads its attendee list.
    ///
    /// Session expiry is an error; transport failures yield an empty detail.
    pub async fn event_detail(&self, event_id: &EventId) -> Result<EventDetail, ClientError> {
        match self.load_detail(event_id).await {
            Ok(detail) => Ok(detail),
            Err(ClientError::Unauthenticated) => {
                warn!(event_id = %event_id, "detail: session expired");
                let _ = self.events.send(DashboardEvent::SessionExpired);
                Err(ClientError::Unauthenticated)
            }
            Err(err) => {
                error!(event_id = %event_id, error = %err, "detail: failed to load event");
                Ok(EventDetail::default())
            }
        }
    }

    async fn load_detail(&self, event_id: &EventId) -> Result<EventDetail, ClientError> {
        let replies = self.fetch_collections().await?;

        let mut event = Collection::ALL
            .into_iter()
            .zip(replies)
            .filter(|(_, reply)| reply.is_success())
            .flat_map(|(collection, reply)| events_from_body(reply.body.as_ref(), collection.as_str()))
            .find(|event| &event.id == event_id);

        if event.is_none() {
            let reply = self.send(ServiceRequest::GetEvent(event_id.clone())).await?;
            if reply.is_success() {
                event = reply.body.and_then(|body| from_value::<Event>(body).ok());
            }
        }

        let reply = self
            .send(ServiceRequest::ListAttendees(event_id.clone()))
            .await?;
        let attendees = if reply.is_success() {
            reply
                .body
                .as_ref()
                .map(normalize_attendees)
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(EventDetail { event, attendees })
    }
}

#[cfg(test)]
#[path = "tests/detail_tests.rs"]
mod tests;
