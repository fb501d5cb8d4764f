//! Journey smoke test: the three repositories share one backend without
//! clobbering each other's keys.

use waymark_e2e_tests::harness::TestStoreManager;
use waymark_e2e_tests::mocks::dated_record;

#[test]
fn stores_share_a_backend_without_interference() {
    let mut stores = TestStoreManager::new_temp();
    stores.hydrate_all();

    stores
        .trackers
        .add_record("reading", dated_record("r1", "2024-01-01", "pages", 10.0));
    stores.goals.add_goal(waymark_core::Goal {
        name: "Read".into(),
        tracker_ids: vec!["reading".into()],
        target: 100.0,
        ..Default::default()
    });
    stores.streaks.add_goal(waymark_core::StreakGoal {
        name: "Read daily".into(),
        tracker_id: "reading".into(),
        target_days: 7,
        ..Default::default()
    });

    stores.relaunch();

    assert_eq!(stores.trackers.tracker("reading").unwrap().records.len(), 1);
    assert_eq!(stores.goals.goals().len(), 1);
    assert_eq!(stores.streaks.goals().len(), 1);
}
