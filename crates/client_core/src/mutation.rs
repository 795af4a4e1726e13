use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
};

use serde_json::from_value;
use shared::{
    domain::{Event, EventDraft, EventId},
    protocol::{CreateEventRequest, CreateEventResponse, Decision, InviteRequest, RespondRequest},
};
use tracing::{info, warn};

use crate::{
    error::{ClientError, MutationKind},
    roster::{RosterEntry, RosterPatch},
    transport::ServiceRequest,
    DashboardEvent, EventDashboard,
};

type LockKey = (MutationKind, EventId);

#[derive(Debug, Default, Clone)]
pub struct InFlightLocks {
    held: Arc<Mutex<HashSet<LockKey>>>,
}

impl InFlightLocks {
    pub fn try_acquire(&self, kind: MutationKind, event_id: &EventId) -> Option<InFlightGuard> {
        let key = (kind, event_id.clone());
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(key.clone()) {
            return None;
        }
        Some(InFlightGuard {
            held: Arc::clone(&self.held),
            key,
        })
    }

    pub fn is_held(&self, kind: MutationKind, event_id: &EventId) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(kind, event_id.clone()))
    }
}

#[derive(Debug)]
pub struct InFlightGuard {
    held: Arc<Mutex<HashSet<LockKey>>>,
    key: LockKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

impl EventDashboard {
    pub async fn create_event(&self, draft: &EventDraft) -> Result<EventId, ClientError> {
        draft.validate()?;

        let request = CreateEventRequest {
            draft: draft.clone(),
            organizer: self.session.email().to_string(),
        };
        let reply = self.send(ServiceRequest::CreateEvent(request)).await?;
        if !reply.is_success() {
            warn!(status = reply.status, "mutation: create rejected");
            return Err(ClientError::rejected(MutationKind::Create, &reply));
        }

        let created = reply
            .body
            .and_then(|body| from_value::<CreateEventResponse>(body).ok())
            .ok_or_else(|| ClientError::Network("create reply did not include an eventId".into()))?;

        let event = Event::from_draft(created.event_id.clone(), draft, self.session.email());
        self.apply_patch(RosterPatch::AppendOrganized(RosterEntry::unannotated(event)))
            .await;
        info!(event_id = %created.event_id, "mutation: event created");
        Ok(created.event_id)
    }

    pub async fn invite(&self, event_id: &EventId, email: &str) -> Result<(), ClientError> {
        if event_id.is_blank() {
            return Err(ClientError::Validation("event id is required".into()));
        }
        let email = email.trim();
        if email.is_empty() {
            return Err(ClientError::Validation("invitee email is required".into()));
        }

        let reply = self
            .send(ServiceRequest::Invite(InviteRequest {
                event_id: event_id.clone(),
                email: email.to_string(),
            }))
            .await?;
        if !reply.is_success() {
            warn!(event_id = %event_id, status = reply.status, "mutation: invite rejected");
            return Err(ClientError::rejected(MutationKind::Invite, &reply));
        }

        info!(event_id = %event_id, invitee = email, "mutation: invite sent");
        self.reconcile_after(MutationKind::Invite).await;
        Ok(())
    }

    pub async fn respond(&self, event_id: &EventId, decision: Decision) -> Result<(), ClientError> {
        if event_id.is_blank() {
            return Err(ClientError::Validation("event id is required".into()));
        }
        let _guard = self
            .locks
            .try_acquire(MutationKind::Respond, event_id)
            .ok_or_else(|| ClientError::InFlight {
                kind: MutationKind::Respond,
                event_id: event_id.clone(),
            })?;

        let reply = self
            .send(ServiceRequest::Respond(RespondRequest::new(
                event_id.clone(),
                decision,
            )))
            .await?;
        if !reply.is_success() {
            warn!(event_id = %event_id, %decision, status = reply.status, "mutation: response rejected");
            return Err(ClientError::rejected(MutationKind::Respond, &reply));
        }

        match decision {
            Decision::Accept => {
                self.apply_patch(RosterPatch::AcceptInvite(event_id.clone()))
                    .await;
            }
            Decision::Decline => {
                self.apply_patch(RosterPatch::RemoveInvite(event_id.clone()))
                    .await;
                self.search.remove(event_id).await;
            }
        }

        info!(event_id = %event_id, %decision, "mutation: response recorded");
        self.reconcile_after(MutationKind::Respond).await;
        Ok(())
    }

    /// Confirmation is the caller's job.
    pub async fn delete_event(&self, event_id: &EventId) -> Result<(), ClientError> {
        if event_id.is_blank() {
            return Err(ClientError::Validation("event id is required".into()));
        }
        let _guard = self
            .locks
            .try_acquire(MutationKind::Delete, event_id)
            .ok_or_else(|| ClientError::InFlight {
                kind: MutationKind::Delete,
                event_id: event_id.clone(),
            })?;

        let reply = self
            .send(ServiceRequest::DeleteEvent(event_id.clone()))
            .await?;
        if reply.is_unauthenticated() {
            warn!(event_id = %event_id, "mutation: session expired during delete");
            let _ = self.events.send(DashboardEvent::SessionExpired);
            return Err(ClientError::Unauthenticated);
        }
        if !reply.is_success() {
            warn!(event_id = %event_id, status = reply.status, "mutation: delete rejected");
            return Err(ClientError::rejected(MutationKind::Delete, &reply));
        }

        self.apply_patch(RosterPatch::RemoveOrganized(event_id.clone()))
            .await;
        info!(event_id = %event_id, "mutation: event deleted");
        self.reconcile_after(MutationKind::Delete).await;
        Ok(())
    }

    async fn reconcile_after(&self, kind: MutationKind) {
        if let Err(err) = self.reconcile().await {
            warn!(mutation = %kind, error = %err, "mutation: follow-up reconciliation failed");
        }
    }
}

#[cfg(test)]
#[path = "tests/mutation_tests.rs"]
mod tests;
