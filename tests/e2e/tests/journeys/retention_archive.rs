//! Journey: retention caps the active log and, under the archive strategy,
//! trimmed records land in the per-tracker archive and survive relaunches.

use serde_json::{json, Value};
use waymark_core::{RetentionPatch, RetentionStrategy};
use waymark_e2e_tests::harness::TestStoreManager;
use waymark_e2e_tests::mocks::dated_record;

#[test]
fn prune_strategy_discards_oldest() {
    let mut stores = TestStoreManager::new_temp();
    stores.hydrate_all();
    stores.trackers.update_retention(RetentionPatch {
        per_tracker_limit: Some(3),
        strategy: Some(RetentionStrategy::Prune),
    });

    for d in 1..=5 {
        stores.trackers.add_record(
            "reading",
            dated_record(&format!("r{d}"), &format!("2024-03-0{d}"), "pages", 10.0),
        );
    }

    let records = stores.trackers.records_sorted("reading");
    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["r3", "r4", "r5"]);
    assert_eq!(stores.trackers.tracker("reading").unwrap().value, 30.0);
    assert!(stores.trackers.fetch_archive("reading").is_empty());
}

#[test]
fn archive_strategy_preserves_trimmed_records() {
    let mut stores = TestStoreManager::new_temp();
    stores.hydrate_all();
    stores.trackers.update_retention(RetentionPatch {
        per_tracker_limit: Some(2),
        strategy: Some(RetentionStrategy::Archive),
    });

    for d in 1..=5 {
        stores.trackers.add_record(
            "expense",
            dated_record(&format!("e{d}"), &format!("2024-03-0{d}"), "amount", d as f64),
        );
    }

    assert_eq!(stores.trackers.tracker("expense").unwrap().records.len(), 2);
    let archived = stores.trackers.fetch_archive("expense");
    let ids: Vec<&str> = archived.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["e1", "e2", "e3"]);
    assert_eq!(stores.trackers.archived_count("expense"), 3);

    // archive and counts survive a relaunch
    stores.relaunch();
    assert_eq!(stores.trackers.fetch_archive("expense").len(), 3);
    assert_eq!(stores.trackers.archived_count("expense"), 3);

    // the archive payload is a plain record array under its own key
    let raw = stores.raw("tracker_archive_expense").unwrap();
    let payload: Value = serde_json::from_str(&raw).unwrap();
    assert!(payload.is_array());
    assert_eq!(payload[0]["amount"], json!(1));
}

#[test]
fn retention_config_is_clamped_and_persisted() {
    let mut stores = TestStoreManager::new_temp();
    stores.hydrate_all();
    stores.trackers.update_retention(RetentionPatch {
        per_tracker_limit: Some(999_999),
        strategy: Some(RetentionStrategy::Archive),
    });
    assert_eq!(stores.trackers.retention().per_tracker_limit, 20_000);

    stores.relaunch();
    let config = stores.trackers.retention();
    assert_eq!(config.per_tracker_limit, 20_000);
    assert_eq!(config.strategy, RetentionStrategy::Archive);
}

#[test]
fn shrinking_the_limit_applies_on_next_insert() {
    let mut stores = TestStoreManager::new_temp();
    stores.hydrate_all();

    for d in 1..=4 {
        stores.trackers.add_record(
            "reading",
            dated_record(&format!("r{d}"), &format!("2024-03-0{d}"), "pages", 5.0),
        );
    }
    stores.trackers.update_retention(RetentionPatch {
        per_tracker_limit: Some(2),
        ..Default::default()
    });
    // existing logs are not retro-trimmed
    assert_eq!(stores.trackers.tracker("reading").unwrap().records.len(), 4);

    stores
        .trackers
        .add_record("reading", dated_record("r5", "2024-03-05", "pages", 5.0));
    let ids: Vec<String> = stores
        .trackers
        .records_sorted("reading")
        .iter()
        .map(|r| r.id.clone())
        .collect();
    assert_eq!(ids, vec!["r4", "r5"]);
}
