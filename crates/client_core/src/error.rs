use std::fmt;

use shared::{domain::EventId, error::ErrorBody, error::MissingField};
use thiserror::Error;

use crate::transport::ServiceReply;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Create,
    Invite,
    Respond,
    Delete,
}

impl MutationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MutationKind::Create => "create",
            MutationKind::Invite => "invite",
            MutationKind::Respond => "respond",
            MutationKind::Delete => "delete",
        }
    }

    /// Shown when the service rejects the mutation without saying why.
    pub fn fallback_message(self) -> &'static str {
        match self {
            MutationKind::Create => "Failed to create event",
            MutationKind::Invite => "Failed to invite user",
            MutationKind::Respond => "Failed to send response",
            MutationKind::Delete => "Failed to delete event",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("session expired; sign in again")]
    Unauthenticated,
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("{message}")]
    Rejected {
        kind: MutationKind,
        status: u16,
        message: String,
    },
    #[error("a {kind} request for event {event_id} is already in flight")]
    InFlight {
        kind: MutationKind,
        event_id: EventId,
    },
}

impl ClientError {
    pub(crate) fn network(err: anyhow::Error) -> Self {
        ClientError::Network(format!("{err:#}"))
    }

    /// Builds the user-facing failure for a non-success mutation reply,
    /// preferring the server's own message.
    pub(crate) fn rejected(kind: MutationKind, reply: &ServiceReply) -> Self {
        let message = ErrorBody::message_from(reply.body.as_ref())
            .unwrap_or_else(|| kind.fallback_message().to_string());
        ClientError::Rejected {
            kind,
            status: reply.status,
            message,
        }
    }

    pub fn requires_reauth(&self) -> bool {
        matches!(self, ClientError::Unauthenticated)
    }
}

impl From<MissingField> for ClientError {
    fn from(value: MissingField) -> Self {
        ClientError::Validation(value.to_string())
    }
}
