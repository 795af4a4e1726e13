use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{EventDraft, EventId, ResponseStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEventRequest {
    #[serde(flatten)]
    pub draft: EventDraft,
    pub organizer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventResponse {
    pub event_id: EventId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteRequest {
    pub event_id: EventId,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondRequest {
    pub event_id: EventId,
    pub status: ResponseStatus,
}

impl RespondRequest {
    pub fn new(event_id: EventId, decision: Decision) -> Self {
        Self {
            event_id,
            status: decision.status(),
        }
    }
}

/// The viewer's answer to an invitation. Only ever sent as `accepted` or `declined`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    Accept,
    Decline,
}

impl Decision {
    pub fn status(self) -> ResponseStatus {
        match self {
            Decision::Accept => ResponseStatus::Accepted,
            Decision::Decline => ResponseStatus::Declined,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Decision::Accept => "accept",
            Decision::Decline => "decline",
        })
    }
}

impl FromStr for Decision {
    type Err = std::convert::Infallible;

    /// Anything that is not an acceptance canonicalizes to a decline.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let lower = raw.trim().to_ascii_lowercase();
        Ok(if lower == "accept" || lower == "accepted" {
            Decision::Accept
        } else {
            Decision::Decline
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttendeeContact {
    pub email: String,
}

/// Normalizes the attendee-list endpoint payload. Entries may be bare email
/// strings or objects carrying `email` (some backends send `Email`); empty or
/// unrecognized entries are dropped and a non-array body yields nothing.
pub fn normalize_attendees(body: &Value) -> Vec<AttendeeContact> {
    let Some(entries) = body.as_array() else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::String(email) => Some(email.clone()),
            Value::Object(fields) => ["email", "Email"]
                .iter()
                .filter_map(|key| fields.get(*key).and_then(Value::as_str))
                .find(|email| !email.is_empty())
                .map(str::to_string),
            _ => None,
        })
        .filter(|email| !email.is_empty())
        .map(|email| AttendeeContact { email })
        .collect()
}
