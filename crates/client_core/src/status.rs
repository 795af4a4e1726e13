use shared::domain::{Attendee, Event, ViewerSession, ViewerStatus};

/// The viewer's response to `event`, read from the first attendee entry whose
/// email matches exactly. `None` when the viewer is not listed.
pub fn derive_viewer_status(event: &Event, session: &ViewerSession) -> ViewerStatus {
    viewer_attendee(event, session).and_then(|attendee| attendee.status)
}

pub(crate) fn viewer_attendee<'a>(event: &'a Event, session: &ViewerSession) -> Option<&'a Attendee> {
    event
        .attendees
        .iter()
        .find(|attendee| attendee.email == session.email())
}
