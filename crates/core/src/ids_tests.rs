// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn new_ids_are_unique() {
    assert_ne!(WorkspaceId::new(), WorkspaceId::new());
}

#[test]
fn roundtrips_through_display_and_from_str() {
    let id = OwnerId::new();
    let parsed: OwnerId = id.to_string().parse().expect("valid uuid text");
    assert_eq!(id, parsed);
}

#[test]
fn distinct_id_types_do_not_mix_by_value() {
    let uuid = Uuid::new_v4();
    let ws = WorkspaceId::from_uuid(uuid);
    let op = OpId::from_uuid(uuid);
    assert_eq!(ws.as_uuid(), op.as_uuid());
    // but the types remain distinct at compile time; this test only asserts
    // the underlying value roundtrips identically through either wrapper.
}

#[test]
fn serializes_as_a_bare_uuid_string() {
    let id = OpId::new();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{}\"", id.as_uuid()));
}
