use std::{
    borrow::Cow,
    convert::Infallible,
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::MissingField;

/// Event identifier as delivered by the server.
///
/// Endpoints disagree on whether ids are numbers or strings, so equality and
/// hashing go through the string form: `EventId::Number(7) == EventId::from("7")`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventId {
    Number(i64),
    Text(String),
}

impl EventId {
    pub fn key(&self) -> Cow<'_, str> {
        match self {
            EventId::Number(value) => Cow::Owned(value.to_string()),
            EventId::Text(value) => Cow::Borrowed(value.as_str()),
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, EventId::Text(value) if value.trim().is_empty())
    }
}

impl PartialEq for EventId {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for EventId {}

impl Hash for EventId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl From<i64> for EventId {
    fn from(value: i64) -> Self {
        EventId::Number(value)
    }
}

impl From<&str> for EventId {
    fn from(value: &str) -> Self {
        EventId::Text(value.to_string())
    }
}

impl From<String> for EventId {
    fn from(value: String) -> Self {
        EventId::Text(value)
    }
}

impl FromStr for EventId {
    type Err = Infallible;

    /// Command-line ids that look numeric are sent back as numbers.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        Ok(match trimmed.parse::<i64>() {
            Ok(value) => EventId::Number(value),
            Err(_) => EventId::Text(trimmed.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Pending,
    Accepted,
    Declined,
}

impl ResponseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseStatus::Pending => "pending",
            ResponseStatus::Accepted => "accepted",
            ResponseStatus::Declined => "declined",
        }
    }

    fn parse_lenient(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(ResponseStatus::Pending),
            "accepted" => Some(ResponseStatus::Accepted),
            "declined" => Some(ResponseStatus::Declined),
            _ => None,
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A viewer's derived response for one event. `None` means the viewer is not
/// listed as an attendee (organizer, or a collection without attendee detail).
pub type ViewerStatus = Option<ResponseStatus>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawAttendee")]
pub struct Attendee {
    pub email: String,
    pub status: Option<ResponseStatus>,
    /// A status was sent but was null or not one of the known values.
    #[serde(skip_serializing)]
    pub status_unrecognized: bool,
}

impl Attendee {
    pub fn new(email: impl Into<String>, status: ResponseStatus) -> Self {
        Self {
            email: email.into(),
            status: Some(status),
            status_unrecognized: false,
        }
    }

    pub fn without_status(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            status: None,
            status_unrecognized: false,
        }
    }

    /// Pending, or no status sent at all.
    pub fn is_awaiting_response(&self) -> bool {
        match self.status {
            Some(status) => status == ResponseStatus::Pending,
            None => !self.status_unrecognized,
        }
    }
}

#[derive(Deserialize)]
struct RawAttendee {
    #[serde(default, deserialize_with = "null_as_default")]
    email: String,
    #[serde(default, deserialize_with = "present_value")]
    status: Option<Value>,
}

impl From<RawAttendee> for Attendee {
    fn from(raw: RawAttendee) -> Self {
        let status = raw
            .status
            .as_ref()
            .and_then(Value::as_str)
            .and_then(ResponseStatus::parse_lenient);
        Self {
            email: raw.email,
            status,
            status_unrecognized: raw.status.is_some() && status.is_none(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub time: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub location: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub organizer: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attendees: Vec<Attendee>,
    /// Server fields this client does not model, kept so re-serialization is lossless.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Event {
    pub fn new(id: impl Into<EventId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            date: String::new(),
            time: String::new(),
            location: String::new(),
            description: String::new(),
            organizer: String::new(),
            attendees: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn from_draft(id: EventId, draft: &EventDraft, organizer: &str) -> Self {
        Self {
            id,
            title: draft.title.clone(),
            date: draft.date.clone(),
            time: draft.time.clone(),
            location: draft.location.clone(),
            description: draft.description.clone(),
            organizer: organizer.to_string(),
            attendees: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn with_attendee(mut self, email: impl Into<String>, status: ResponseStatus) -> Self {
        self.attendees.push(Attendee::new(email, status));
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    pub title: String,
    pub date: String,
    pub time: String,
    pub location: String,
    pub description: String,
}

impl EventDraft {
    pub fn validate(&self) -> Result<(), MissingField> {
        let fields = [
            ("title", &self.title),
            ("date", &self.date),
            ("time", &self.time),
            ("location", &self.location),
            ("description", &self.description),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(MissingField { field });
            }
        }
        Ok(())
    }
}

/// Identity of the signed-in viewer, passed explicitly to everything that
/// derives per-viewer state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewerSession {
    email: String,
}

impl ViewerSession {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// Only runs when the key is present, so an explicit null comes back as `Some(Null)`.
fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}
