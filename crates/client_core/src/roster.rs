use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;
use shared::domain::{Attendee, Event, EventId, ResponseStatus, ViewerSession, ViewerStatus};
use tracing::warn;

use crate::status::{derive_viewer_status, viewer_attendee};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterEntry {
    #[serde(flatten)]
    pub event: Event,
    #[serde(rename = "responseStatus", skip_serializing_if = "Option::is_none")]
    pub response_status: ViewerStatus,
}

impl RosterEntry {
    pub fn unannotated(event: Event) -> Self {
        Self {
            event,
            response_status: None,
        }
    }

    pub fn derived(event: Event, session: &ViewerSession) -> Self {
        let response_status = derive_viewer_status(&event, session);
        Self {
            event,
            response_status,
        }
    }

    pub fn with_status(event: Event, status: ResponseStatus) -> Self {
        Self {
            event,
            response_status: Some(status),
        }
    }

    pub fn id(&self) -> &EventId {
        &self.event.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Roster {
    pub organized: Vec<RosterEntry>,
    pub invited: Vec<RosterEntry>,
    pub accepted: Vec<RosterEntry>,
}

impl Roster {
    pub fn is_empty(&self) -> bool {
        self.organized.is_empty() && self.invited.is_empty() && self.accepted.is_empty()
    }

    pub fn invited_ids(&self) -> HashSet<EventId> {
        self.invited.iter().map(|entry| entry.id().clone()).collect()
    }

    pub fn accepted_ids(&self) -> HashSet<EventId> {
        self.accepted.iter().map(|entry| entry.id().clone()).collect()
    }

    pub fn find(&self, event_id: &EventId) -> Option<&RosterEntry> {
        self.organized
            .iter()
            .chain(&self.invited)
            .chain(&self.accepted)
            .find(|entry| entry.id() == event_id)
    }
}

pub fn events_from_body(body: Option<&Value>, source: &str) -> Vec<Event> {
    let Some(body) = body else {
        return Vec::new();
    };
    let Some(entries) = body.as_array() else {
        warn!(source, "roster: collection body is not a sequence; treating as empty");
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| match serde_json::from_value::<Event>(entry.clone()) {
            Ok(event) => Some(event),
            Err(err) => {
                warn!(source, error = %err, "roster: skipping malformed event entry");
                None
            }
        })
        .collect()
}

/// Anything the accepted collection lists is dropped from `invited`.
pub fn build_roster(
    organized: Vec<Event>,
    invited: Vec<Event>,
    accepted: Vec<Event>,
    session: &ViewerSession,
) -> Roster {
    let accepted_ids: HashSet<EventId> = accepted.iter().map(|event| event.id.clone()).collect();

    let accepted = accepted
        .into_iter()
        .map(|event| RosterEntry::with_status(event, ResponseStatus::Accepted))
        .collect();

    // A null or unrecognized status hides the invite; an unlisted viewer does not.
    let invited = invited
        .into_iter()
        .filter(|event| {
            !accepted_ids.contains(&event.id)
                && viewer_attendee(event, session).map_or(true, Attendee::is_awaiting_response)
        })
        .map(|event| RosterEntry::derived(event, session))
        .collect();

    let organized = organized.into_iter().map(RosterEntry::unannotated).collect();

    Roster {
        organized,
        invited,
        accepted,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MutationId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum RosterPatch {
    AppendOrganized(RosterEntry),
    RemoveOrganized(EventId),
    AcceptInvite(EventId),
    RemoveInvite(EventId),
}

impl RosterPatch {
    fn apply(&self, roster: &mut Roster) {
        match self {
            RosterPatch::AppendOrganized(entry) => roster.organized.push(entry.clone()),
            RosterPatch::RemoveOrganized(event_id) => {
                roster.organized.retain(|entry| entry.id() != event_id)
            }
            RosterPatch::AcceptInvite(event_id) => {
                let Some(position) = roster
                    .invited
                    .iter()
                    .position(|entry| entry.id() == event_id)
                else {
                    return;
                };
                let moved = roster.invited.remove(position);
                roster.accepted.insert(
                    0,
                    RosterEntry::with_status(moved.event, ResponseStatus::Accepted),
                );
            }
            RosterPatch::RemoveInvite(event_id) => {
                roster.invited.retain(|entry| entry.id() != event_id)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadState {
    #[default]
    NotLoaded,
    Loaded,
    Failed { reason: String },
}

#[derive(Debug, Default)]
pub struct RosterStore {
    base: Roster,
    patches: Vec<(MutationId, RosterPatch)>,
    load_state: LoadState,
    next_mutation: u64,
}

impl RosterStore {
    pub fn view(&self) -> Roster {
        let mut roster = self.base.clone();
        for (_, patch) in &self.patches {
            patch.apply(&mut roster);
        }
        roster
    }

    pub fn apply_patch(&mut self, patch: RosterPatch) -> MutationId {
        self.next_mutation += 1;
        let id = MutationId(self.next_mutation);
        self.patches.push((id, patch));
        id
    }

    /// Returns how many pending patches were dropped.
    pub fn replace(&mut self, roster: Roster, load_state: LoadState) -> usize {
        self.base = roster;
        self.load_state = load_state;
        std::mem::take(&mut self.patches).len()
    }

    pub fn pending_patches(&self) -> Vec<MutationId> {
        self.patches.iter().map(|(id, _)| *id).collect()
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }
}

#[cfg(test)]
#[path = "tests/roster_tests.rs"]
mod tests;
