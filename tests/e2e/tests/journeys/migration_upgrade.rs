//! Journey: a database written before schema versioning hydrates through the
//! full migration chain and lands in the current envelope form.

use serde_json::{json, Value};
use waymark_e2e_tests::harness::TestStoreManager;
use waymark_e2e_tests::mocks::{legacy_goal_payload, legacy_tracker_payload};

#[test]
fn legacy_bare_arrays_upgrade_on_first_launch() {
    let mut stores = TestStoreManager::new_temp();
    stores.seed("tracker_data", &legacy_tracker_payload());
    stores.seed("goal_data", &legacy_goal_payload());
    stores.hydrate_all();

    // trackers: valueFieldId inferred, createdAt backfilled, fields normalized
    let reading = stores.trackers.tracker("reading").unwrap();
    assert_eq!(reading.value_field(), Some("pages"));
    assert!(!reading.created_at.is_empty());
    assert_eq!(reading.fields[0].label, "pages");
    assert_eq!(reading.records.len(), 2);

    let custom = stores.trackers.tracker("custom-1").unwrap();
    assert_eq!(custom.value_field(), Some("glasses"));
    assert_eq!(custom.fields[0].unit, "glasses");

    // goals: createdAt backfilled, string target coerced
    let goal = stores.goals.goal("g1").unwrap();
    assert!(!goal.created_at.is_empty());
    assert_eq!(goal.target, 30.0);

    // the upgraded envelopes landed immediately, not debounced
    let raw = stores.raw("tracker_data").unwrap();
    let envelope: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(envelope["__v"], json!(2));
    assert!(envelope["data"].is_array());

    let raw = stores.raw("goal_data").unwrap();
    let envelope: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(envelope["__v"], json!(1));
}

#[test]
fn migrated_data_is_stable_across_relaunches() {
    let mut stores = TestStoreManager::new_temp();
    stores.seed("tracker_data", &legacy_tracker_payload());
    stores.hydrate_all();

    let first = stores.raw("tracker_data").unwrap();
    stores.relaunch();
    let second = stores.raw("tracker_data").unwrap();

    // migrations are idempotent: a second hydration changes nothing
    assert_eq!(first, second);
}

#[test]
fn corrupt_payload_degrades_without_failing_launch() {
    let mut stores = TestStoreManager::new_temp();
    stores.seed("tracker_data", "{{{ not json");
    stores.seed("goal_data", r#"{"__v": 1, "data": "not an array"}"#);
    stores.hydrate_all();

    assert!(stores.trackers.trackers().is_empty());
    assert!(stores.goals.goals().is_empty());
    assert!(stores.trackers.error().is_none());
    assert!(stores.goals.error().is_none());
}

#[test]
fn undecodable_items_are_dropped_not_fatal() {
    let mut stores = TestStoreManager::new_temp();
    stores.seed(
        "streak_goal_data",
        &json!({"__v": 1, "data": [
            {"id": "s1", "name": "Read", "trackerId": "reading", "targetDays": 7},
            "just a string, not a goal"
        ]})
        .to_string(),
    );
    stores.hydrate_all();

    assert_eq!(stores.streaks.goals().len(), 1);
    assert_eq!(stores.streaks.goals()[0].id, "s1");
}
