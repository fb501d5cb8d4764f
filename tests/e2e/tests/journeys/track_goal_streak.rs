//! Journey: log records across trackers, watch goal progress, streaks, and
//! the insights snapshot respond, then survive a relaunch.

use chrono::NaiveDate;
use serde_json::json;
use waymark_core::{insights, Goal, GoalType, Record, StreakGoal};
use waymark_e2e_tests::harness::TestStoreManager;
use waymark_e2e_tests::mocks::dated_record;

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[test]
fn full_tracking_journey() {
    let mut stores = TestStoreManager::new_temp();
    stores.hydrate_all();
    let today = day("2024-01-04");

    // three days of reading, with a gap on the 3rd
    for (id, date, pages) in [
        ("r1", "2024-01-01", 20.0),
        ("r2", "2024-01-02", 30.0),
        ("r3", "2024-01-04", 40.0),
    ] {
        let mut record = dated_record(id, date, "pages", pages);
        record.created_at = format!("{date}T09:00:00.000Z");
        stores.trackers.add_record("reading", record);
    }
    assert_eq!(stores.trackers.tracker("reading").unwrap().value, 90.0);

    // a daily goal sees only today's pages
    stores.goals.add_goal(Goal {
        id: "g-daily".into(),
        goal_type: GoalType::Daily,
        name: "Daily pages".into(),
        tracker_ids: vec!["reading".into()],
        target: 100.0,
        ..Default::default()
    });
    // a running-total goal sees the cached aggregate
    stores.goals.add_goal(Goal {
        id: "g-total".into(),
        goal_type: GoalType::Total,
        name: "Total pages".into(),
        tracker_ids: vec!["reading".into()],
        target: 90.0,
        ..Default::default()
    });

    let progress = stores.goals.with_progress(stores.trackers.trackers(), today);
    let daily = progress.iter().find(|p| p.goal.id == "g-daily").unwrap();
    assert_eq!(daily.progress, 40.0);
    assert_eq!(daily.percent, 40.0);
    let total = progress.iter().find(|p| p.goal.id == "g-total").unwrap();
    assert_eq!(total.progress, 90.0);
    assert_eq!(total.percent, 100.0);

    // streak: 1-2 logged, 3 skipped, 4 logged -> current 1, longest 2
    stores.streaks.add_goal(StreakGoal {
        id: "s1".into(),
        name: "Read daily".into(),
        tracker_id: "reading".into(),
        target_days: 7,
        ..Default::default()
    });
    let stats = stores.streaks.with_stats(stores.trackers.trackers(), today);
    assert_eq!(stats[0].current_streak, 1);
    assert_eq!(stats[0].longest_streak, 2);

    // insights tie it together
    let view = insights::snapshot(stores.trackers.trackers(), &progress, &stats, today);
    let reading_today = view
        .today
        .iter()
        .find(|e| e.tracker_id == "reading")
        .unwrap();
    assert_eq!(reading_today.value, 40.0);
    assert_eq!(view.recent_activity[0].record.id, "r3");
    assert_eq!(view.streak_summary[0].goal.id, "s1");

    // everything survives a relaunch
    stores.relaunch();
    assert_eq!(stores.trackers.tracker("reading").unwrap().value, 90.0);
    assert_eq!(stores.goals.goals().len(), 2);
    assert_eq!(stores.streaks.goals().len(), 1);
}

#[test]
fn goal_delete_undo_round_trip() {
    let mut stores = TestStoreManager::new_temp();
    stores.hydrate_all();

    stores.goals.add_goal(Goal {
        id: "g1".into(),
        name: "Keep me".into(),
        ..Default::default()
    });
    stores.goals.delete_goal("g1");
    assert!(stores.goals.goals().is_empty());
    assert!(stores.goals.undo_delete());
    assert_eq!(stores.goals.goals()[0].id, "g1");

    stores.relaunch();
    assert_eq!(stores.goals.goals().len(), 1);
}

#[test]
fn loose_record_input_is_coerced_and_aggregated() {
    let mut stores = TestStoreManager::new_temp();
    stores.hydrate_all();

    stores.trackers.add_record(
        "expense",
        Record::with_fields([("amount", json!("12.50")), ("category", json!("Food"))]),
    );
    stores
        .trackers
        .add_record("expense", Record::with_fields([("amount", json!(7))]));

    let tracker = stores.trackers.tracker("expense").unwrap();
    assert_eq!(tracker.value, 19.5);
    assert_eq!(tracker.records[0].rest["amount"], json!(12.5));
    assert_eq!(tracker.records[0].rest["category"], json!("Food"));

    stores.relaunch();
    assert_eq!(stores.trackers.tracker("expense").unwrap().value, 19.5);
}
