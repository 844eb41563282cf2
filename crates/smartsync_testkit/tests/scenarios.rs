//! Generated sync scenarios against the reference server.

use proptest::prelude::*;
use serde_json::json;
use smartsync_engine::{
    LoopbackClient, MergeMode, RestClient, SyncConfig, SyncDownTarget, SyncError, SyncManager, SyncOptions,
    SyncStatus, SyncUpTarget,
};
use smartsync_store::InMemoryStore;
use smartsync_testkit::prelude::*;
use std::sync::Arc;

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn edit_plans_converge_through_rest(
        count in 1usize..12,
        plan in edit_plan_strategy(0, 16),
    ) {
        let mut harness = SyncHarness::new(count, 5);
        harness.apply_all(&plan);
        let state = harness.sync_up(SyncUpTarget::rest()).unwrap();
        prop_assert_eq!(state.status(), SyncStatus::Done);
        harness.verify_converged();
    }

    #[test]
    fn edit_plans_converge_through_composite(
        count in 1usize..12,
        plan in edit_plan_strategy(0, 16),
        batch_size in 1usize..6,
    ) {
        let mut harness = SyncHarness::new(count, 5);
        harness.apply_all(&plan);
        let state = harness.sync_up(SyncUpTarget::composite(batch_size).unwrap()).unwrap();
        prop_assert_eq!(state.progress(), 100);
        harness.verify_converged();
    }

    #[test]
    fn progress_never_decreases(count in 0usize..40, page_size in 1usize..15) {
        let fixture = SyncFixture::memory(
            scenarios::seeded_server(count),
            SyncConfig::default().with_page_size(page_size),
        );
        let seen = parking_lot::Mutex::new(Vec::new());
        let state = fixture
            .manager
            .sync_down(
                SyncDownTarget::soql(ACCOUNT_SOQL).unwrap(),
                ACCOUNTS_SOUP,
                SyncOptions::for_sync_down(MergeMode::Overwrite),
                |s| seen.lock().push(s.progress()),
            )
            .unwrap();
        let seen = seen.into_inner();
        prop_assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        prop_assert_eq!(seen.iter().filter(|p| **p == 100).count(), 1);
        prop_assert_eq!(state.total_size(), count as i64);
        prop_assert_eq!(fixture.soup_records(ACCOUNTS_SOUP).len(), count);
    }

    #[test]
    fn checkpoint_never_decreases_across_resyncs(
        count in 1usize..20,
        touches in prop::collection::vec(any::<usize>(), 1..6),
    ) {
        let fixture = SyncFixture::memory(
            scenarios::seeded_server(count),
            SyncConfig::default().with_page_size(4),
        );
        let sync_id = scenarios::sync_accounts_down(&fixture);
        let ids = scenarios::account_ids(&fixture.server);
        let mut checkpoint = fixture.manager.get_sync_status(sync_id).unwrap().unwrap().max_time_stamp();

        for touch in touches {
            let id = &ids[touch % ids.len()];
            fixture.server.update_record("Account", id, json!({"Name": format!("Touched {touch}")})).unwrap();
            let state = fixture.manager.resync(sync_id, |_| {}).unwrap();
            prop_assert!(state.max_time_stamp() > checkpoint);
            prop_assert_eq!(state.total_size(), 1);
            checkpoint = state.max_time_stamp();
        }
    }
}

#[test]
fn cancelling_before_the_first_page_leaves_the_store_untouched() {
    let fixture = SyncFixture::memory(scenarios::seeded_server(10), SyncConfig::default());
    let manager = Arc::clone(&fixture.manager);
    let cancelled = parking_lot::Mutex::new(false);
    let result = fixture.manager.sync_down(
        SyncDownTarget::soql(ACCOUNT_SOQL).unwrap(),
        ACCOUNTS_SOUP,
        SyncOptions::for_sync_down(MergeMode::Overwrite),
        |state| {
            let mut done = cancelled.lock();
            if !*done {
                *done = manager.cancel(state.id());
            }
        },
    );
    assert!(matches!(result, Err(SyncError::Cancelled)));
    assert!(fixture.soup_records(ACCOUNTS_SOUP).is_empty());
    assert_eq!(fixture.server.request_count(), 0);
}

#[test]
fn local_only_records_never_reach_the_server() {
    let fixture = scenarios::synced_accounts(2, 10);
    let before = fixture.server.request_count();
    for i in 0..3 {
        let id = fixture.create_locally(ACCOUNTS_SOUP, "Account", json!({"Name": format!("Draft {i}")}));
        fixture.delete_locally(ACCOUNTS_SOUP, &id);
    }
    let state = fixture
        .manager
        .sync_up(
            SyncUpTarget::rest(),
            SyncOptions::for_sync_up(["Name"], MergeMode::Overwrite).unwrap(),
            ACCOUNTS_SOUP,
            |_| {},
        )
        .unwrap();
    assert_eq!(state.total_size(), 3);
    assert_eq!(fixture.server.request_count(), before);
    assert_eq!(fixture.soup_records(ACCOUNTS_SOUP).len(), 2);
}

#[test]
fn sync_over_http_loopback_with_auth() {
    let server = {
        let config = smartsync_server::ServerConfig::default().with_auth(b"scenario-secret".to_vec());
        Arc::new(smartsync_server::SyncServer::new(config))
    };
    for i in 0..5 {
        server.insert_record("Contact", json!({"LastName": format!("Doe {i}")})).unwrap();
    }
    let token = server.create_token("scenario.user").unwrap();
    let client = RestClient::new(
        "https://scenario.example.com/",
        token,
        LoopbackClient::new(ServerLoopback::new(Arc::clone(&server))),
    );
    let store = Arc::new(InMemoryStore::new());
    let manager = SyncManager::new(
        SyncConfig::default().with_page_size(2),
        Arc::clone(&store),
        Arc::new(client),
    )
    .unwrap();

    let state = manager
        .sync_down(
            SyncDownTarget::soql("select Id, LastName, LastModifiedDate from Contact").unwrap(),
            "contacts",
            SyncOptions::for_sync_down(MergeMode::Overwrite),
            |_| {},
        )
        .unwrap();
    assert_eq!(state.total_size(), 5);
    assert_eq!(server.request_count(), 3);
}

#[test]
fn stress_runs_stay_consistent() {
    let config = StressConfig {
        records: 120,
        page_size: 25,
        threads: 6,
        rounds: 8,
    };
    let concurrent = stress_concurrent_sync_downs(&config);
    assert_eq!(concurrent.successful_runs, config.threads);

    let contended = stress_contended_soup(&config);
    assert_eq!(contended.failed_runs, 0);

    let resyncs = stress_repeated_resync(&config);
    assert_eq!(resyncs.successful_runs, config.rounds);
}
