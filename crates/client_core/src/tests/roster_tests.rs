use super::*;
use serde_json::json;

fn viewer() -> ViewerSession {
    ViewerSession::new("a@x")
}

fn invited_event(id: i64, status: ResponseStatus) -> Event {
    Event::new(id, format!("Invite {id}")).with_attendee("a@x", status)
}

fn roster_with_invites() -> Roster {
    build_roster(
        vec![Event::new(10, "Mine")],
        vec![
            invited_event(1, ResponseStatus::Pending),
            invited_event(2, ResponseStatus::Pending),
        ],
        vec![Event::new(3, "Going")],
        &viewer(),
    )
}

#[test]
fn body_must_be_a_sequence() {
    assert!(events_from_body(None, "organized").is_empty());
    assert!(events_from_body(Some(&json!({"id": 1})), "organized").is_empty());
    assert!(events_from_body(Some(&json!("nope")), "organized").is_empty());
}

#[test]
fn malformed_entries_are_skipped() {
    let events = events_from_body(
        Some(&json!([{"id": 1, "title": "ok"}, {"title": "no id"}, 42, {"id": "x"}])),
        "invited",
    );
    let ids: Vec<String> = events.iter().map(|event| event.id.to_string()).collect();
    assert_eq!(ids, vec!["1", "x"]);
}

#[test]
fn build_roster_forces_accepted_status() {
    let roster = build_roster(
        Vec::new(),
        Vec::new(),
        vec![invited_event(3, ResponseStatus::Pending)],
        &viewer(),
    );
    assert_eq!(
        roster.accepted[0].response_status,
        Some(ResponseStatus::Accepted)
    );
}

#[test]
fn build_roster_drops_invites_already_accepted() {
    let roster = build_roster(
        Vec::new(),
        vec![
            invited_event(1, ResponseStatus::Pending),
            invited_event(3, ResponseStatus::Pending),
        ],
        vec![Event::new("3", "Going")],
        &viewer(),
    );
    let invited: Vec<String> = roster.invited.iter().map(|entry| entry.id().to_string()).collect();
    assert_eq!(invited, vec!["1"]);
}

#[test]
fn accept_patch_moves_invite_to_front_of_accepted() {
    let mut store = RosterStore::default();
    store.replace(roster_with_invites(), LoadState::Loaded);

    store.apply_patch(RosterPatch::AcceptInvite(EventId::from("2")));
    let view = store.view();

    let invited: Vec<String> = view.invited.iter().map(|entry| entry.id().to_string()).collect();
    let accepted: Vec<String> = view.accepted.iter().map(|entry| entry.id().to_string()).collect();
    assert_eq!(invited, vec!["1"]);
    assert_eq!(accepted, vec!["2", "3"]);
    assert_eq!(view.accepted[0].response_status, Some(ResponseStatus::Accepted));
}

#[test]
fn accept_patch_for_unknown_invite_changes_nothing() {
    let mut store = RosterStore::default();
    store.replace(roster_with_invites(), LoadState::Loaded);

    store.apply_patch(RosterPatch::AcceptInvite(EventId::Number(99)));

    assert_eq!(store.view(), roster_with_invites());
}

#[test]
fn remove_patches_filter_their_partition() {
    let mut store = RosterStore::default();
    store.replace(roster_with_invites(), LoadState::Loaded);

    store.apply_patch(RosterPatch::RemoveInvite(EventId::Number(1)));
    store.apply_patch(RosterPatch::RemoveOrganized(EventId::Number(10)));
    let view = store.view();

    assert!(view.organized.is_empty());
    assert_eq!(view.invited.len(), 1);
    assert_eq!(view.accepted.len(), 1);
}

#[test]
fn patches_are_layered_in_order_and_tagged() {
    let mut store = RosterStore::default();
    let first = store.apply_patch(RosterPatch::AppendOrganized(RosterEntry::unannotated(
        Event::new(20, "New"),
    )));
    let second = store.apply_patch(RosterPatch::RemoveOrganized(EventId::Number(20)));

    assert!(first < second);
    assert_eq!(store.pending_patches(), vec![first, second]);
    assert!(store.view().organized.is_empty());
}

#[test]
fn replace_discards_patches_and_keeps_base() {
    let mut store = RosterStore::default();
    store.apply_patch(RosterPatch::AppendOrganized(RosterEntry::unannotated(
        Event::new(20, "New"),
    )));

    let discarded = store.replace(roster_with_invites(), LoadState::Loaded);

    assert_eq!(discarded, 1);
    assert!(store.pending_patches().is_empty());
    assert_eq!(store.view(), roster_with_invites());
    assert_eq!(store.load_state(), &LoadState::Loaded);
}

#[test]
fn entry_serializes_with_response_status_only_when_known() {
    let derived = RosterEntry::derived(invited_event(1, ResponseStatus::Pending), &viewer());
    let value = serde_json::to_value(&derived).expect("encode");
    assert_eq!(value["responseStatus"], "pending");
    assert_eq!(value["id"], 1);

    let organized = RosterEntry::unannotated(Event::new(2, "Mine"));
    let value = serde_json::to_value(&organized).expect("encode");
    assert!(value.get("responseStatus").is_none());
}

#[test]
fn invite_with_null_or_unrecognized_status_is_hidden() {
    let invited = events_from_body(
        Some(&json!([
            {"id": 1, "attendees": [{"email": "a@x", "status": null}]},
            {"id": 2, "attendees": [{"email": "a@x", "status": "maybe"}]},
            {"id": 3, "attendees": [{"email": "a@x"}]},
            {"id": 4, "attendees": [{"email": "b@x", "status": "maybe"}]},
            {"id": 5, "attendees": [{"email": "a@x", "status": "pending"}]}
        ])),
        "invited",
    );

    let roster = build_roster(Vec::new(), invited, Vec::new(), &viewer());

    let ids: Vec<String> = roster.invited.iter().map(|entry| entry.id().to_string()).collect();
    assert_eq!(ids, vec!["3", "4", "5"]);
}
