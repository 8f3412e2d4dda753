//! Integration tests for RelationshipCacheManager rebuild scheduling and
//! failure handling.

mod common;

use common::{local, remote, InstrumentedStore};
use std::sync::Arc;
use std::time::Duration;
use tagrel_core::{
    ParentPair, RefreshState, RelationshipCacheManager, RelationshipConfig, ServiceId,
    SiblingPair, TagOptions, TagRelError,
};

async fn started(store: Arc<InstrumentedStore>, options: TagOptions) -> Arc<RelationshipCacheManager> {
    let manager = Arc::new(RelationshipCacheManager::new(store, options));
    manager.refresh_now().await.unwrap();
    manager
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_edits_rebuilds_once() {
    let store = Arc::new(InstrumentedStore::new());
    let manager = started(store.clone(), TagOptions::default()).await;
    assert_eq!(manager.rebuild_count(), 1);

    store
        .inner
        .add_parent(&local(), ParentPair::new("samus aran", "metroid"))
        .unwrap();
    for i in 0..5 {
        if i > 0 {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        manager.notify_parents_changed();
    }
    assert_eq!(manager.state(), RefreshState::Dirty);

    // Last edit was at t=4s; the quiet period has not elapsed at t=11s.
    tokio::time::sleep(Duration::from_secs(7)).await;
    assert_eq!(manager.rebuild_count(), 1);
    assert!(manager.get_parents(&local(), "samus aran").unwrap().is_empty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(manager.rebuild_count(), 2);
    assert_eq!(store.list_calls(), 2);
    assert_eq!(manager.state(), RefreshState::Clean);
    assert_eq!(
        manager.get_parents(&local(), "samus aran").unwrap(),
        vec!["metroid"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_custom_quiet_period() {
    let store = Arc::new(InstrumentedStore::new());
    let manager = Arc::new(
        RelationshipCacheManager::new(store.clone(), TagOptions::default())
            .with_quiet_period(Duration::from_millis(100)),
    );

    manager.notify_siblings_changed();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(manager.rebuild_count(), 1);
    assert!(RelationshipConfig::REBUILD_QUIET_PERIOD > Duration::from_millis(150));
}

#[tokio::test(start_paused = true)]
async fn test_refresh_now_disarms_pending_timer() {
    let store = Arc::new(InstrumentedStore::new());
    let manager = started(store.clone(), TagOptions::default()).await;

    manager.notify_siblings_changed();
    manager.refresh_now().await.unwrap();
    assert_eq!(manager.rebuild_count(), 2);

    tokio::time::sleep(RelationshipConfig::REBUILD_QUIET_PERIOD * 2).await;
    assert_eq!(manager.rebuild_count(), 2);
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_graphs() {
    let store = Arc::new(InstrumentedStore::new());
    store
        .inner
        .add_sibling(&local(), 0, SiblingPair::new("samus", "samus aran"))
        .unwrap();
    store
        .inner
        .add_parent(&local(), ParentPair::new("samus aran", "metroid"))
        .unwrap();
    let manager = started(store.clone(), TagOptions::default()).await;

    let parents_before = manager.get_parents(&local(), "samus aran").unwrap();
    let ideal_before = manager.collapse_tag(&local(), "samus").unwrap();

    store
        .inner
        .add_parent(&local(), ParentPair::new("metroid", "nintendo"))
        .unwrap();
    store.set_failing(true);

    let err = manager.refresh_now().await.unwrap_err();
    assert!(matches!(err, TagRelError::Store { .. }));
    assert!(err.is_retryable());

    assert_eq!(manager.get_parents(&local(), "samus aran").unwrap(), parents_before);
    assert_eq!(manager.collapse_tag(&local(), "samus").unwrap(), ideal_before);
    assert_eq!(manager.state(), RefreshState::Dirty);
    assert_eq!(manager.rebuild_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_scheduled_rebuild_retries() {
    let store = Arc::new(InstrumentedStore::new());
    let manager = started(store.clone(), TagOptions::default()).await;
    store
        .inner
        .add_parent(&local(), ParentPair::new("samus aran", "metroid"))
        .unwrap();

    store.set_failing(true);
    manager.notify_parents_changed();
    tokio::time::sleep(Duration::from_secs(9)).await;
    assert_eq!(store.list_calls(), 2);
    assert_eq!(manager.rebuild_count(), 1);
    assert_eq!(manager.state(), RefreshState::Dirty);

    store.set_failing(false);
    tokio::time::sleep(Duration::from_secs(8)).await;
    assert_eq!(manager.rebuild_count(), 2);
    assert_eq!(
        manager.get_parents(&local(), "samus aran").unwrap(),
        vec!["metroid"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_now_schedules_retry() {
    let store = Arc::new(InstrumentedStore::new());
    let manager = Arc::new(RelationshipCacheManager::new(store.clone(), TagOptions::default()));

    store.set_failing(true);
    assert!(manager.refresh_now().await.is_err());
    assert_eq!(manager.state(), RefreshState::Dirty);

    store.set_failing(false);
    tokio::time::sleep(RelationshipConfig::REBUILD_QUIET_PERIOD + Duration::from_secs(1)).await;
    assert_eq!(store.list_calls(), 2);
    assert_eq!(manager.rebuild_count(), 1);
    assert_eq!(manager.state(), RefreshState::Clean);
    assert_eq!(manager.services().unwrap(), vec![local(), remote()]);
}

#[tokio::test(start_paused = true)]
async fn test_edit_during_scheduled_rebuild_arms_new_timer() {
    let store = Arc::new(InstrumentedStore::new().with_rebuild_delay(Duration::from_secs(2)));
    let manager = started(store.clone(), TagOptions::default()).await;
    assert_eq!(manager.rebuild_count(), 1);

    // The timer fires after the quiet period; the rebuild then spends 2s
    // listing services.
    manager.notify_parents_changed();
    tokio::time::sleep(RelationshipConfig::REBUILD_QUIET_PERIOD + Duration::from_secs(1)).await;
    assert_eq!(manager.state(), RefreshState::Rebuilding);

    store
        .inner
        .add_parent(&local(), ParentPair::new("samus aran", "metroid"))
        .unwrap();
    manager.notify_parents_changed();

    // The running rebuild completes; the new edit keeps the manager dirty.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(manager.rebuild_count(), 2);
    assert_eq!(manager.state(), RefreshState::Dirty);

    tokio::time::sleep(RelationshipConfig::REBUILD_QUIET_PERIOD + Duration::from_secs(3)).await;
    assert_eq!(manager.rebuild_count(), 3);
    assert_eq!(store.list_calls(), 3);
    assert_eq!(manager.state(), RefreshState::Clean);
    assert_eq!(
        manager.get_parents(&local(), "samus aran").unwrap(),
        vec!["metroid"]
    );
}

#[tokio::test]
async fn test_rebuild_publishes_generation() {
    let store = Arc::new(InstrumentedStore::new());
    let manager = started(store, TagOptions::default()).await;
    let mut rules = manager.subscribe();
    assert!(!rules.has_changed().unwrap());

    manager.refresh_now().await.unwrap();
    assert!(rules.has_changed().unwrap());
    assert_eq!(*rules.borrow_and_update(), 2);
}

#[tokio::test]
async fn test_parent_order_through_manager() {
    let store = Arc::new(InstrumentedStore::new());
    for (child, parent) in [
        ("child", "mother"),
        ("child", "father"),
        ("mother", "grandmother"),
    ] {
        store
            .inner
            .add_parent(&local(), ParentPair::new(child, parent))
            .unwrap();
    }
    let manager = started(store, TagOptions::default()).await;

    assert_eq!(
        manager.get_parents(&local(), "child").unwrap(),
        vec!["mother", "father", "grandmother"]
    );
    assert!(!manager
        .get_parents(&local(), "child")
        .unwrap()
        .contains(&"child".to_string()));
}

#[tokio::test]
async fn test_service_precedence_in_combined_view() {
    let store = Arc::new(InstrumentedStore::new());
    store
        .inner
        .add_sibling(&local(), 0, SiblingPair::new("bad", "x"))
        .unwrap();
    store
        .inner
        .add_sibling(&remote(), 0, SiblingPair::new("bad", "y"))
        .unwrap();
    let manager = started(store, TagOptions::default()).await;

    assert_eq!(manager.collapse_tag(&ServiceId::combined(), "bad").unwrap(), "x");
    assert_eq!(manager.collapse_tag(&remote(), "bad").unwrap(), "y");
}

#[tokio::test]
async fn test_siblings_across_all_services() {
    let store = Arc::new(InstrumentedStore::new());
    store
        .inner
        .add_sibling(&remote(), 0, SiblingPair::new("lady", "samus aran"))
        .unwrap();
    store
        .inner
        .add_parent(&local(), ParentPair::new("lady", "metroid"))
        .unwrap();

    let options = TagOptions {
        apply_siblings_across_all_services: true,
        ..TagOptions::default()
    };
    let manager = started(store, options).await;

    assert_eq!(manager.collapse_tag(&local(), "lady").unwrap(), "samus aran");
    assert_eq!(
        manager.get_parents(&local(), "samus aran").unwrap(),
        vec!["metroid"]
    );
}

#[tokio::test]
async fn test_toggling_siblings_across_services_keeps_parents_consistent() {
    let store = Arc::new(InstrumentedStore::new());
    store
        .inner
        .add_sibling(&remote(), 0, SiblingPair::new("lady", "samus aran"))
        .unwrap();
    store
        .inner
        .add_parent(&local(), ParentPair::new("lady", "metroid"))
        .unwrap();
    let manager = started(store, TagOptions::default()).await;

    assert_eq!(manager.collapse_tag(&local(), "lady").unwrap(), "lady");
    assert_eq!(manager.get_parents(&local(), "lady").unwrap(), vec!["metroid"]);

    assert!(manager.set_options(TagOptions {
        apply_siblings_across_all_services: true,
        ..TagOptions::default()
    }));
    assert_eq!(manager.state(), RefreshState::Clean);
    assert_eq!(manager.rebuild_count(), 1);

    let ideal = manager.collapse_tag(&local(), "lady").unwrap();
    assert_eq!(ideal, "samus aran");
    assert_eq!(manager.get_parents(&local(), &ideal).unwrap(), vec!["metroid"]);
    assert!(manager.get_parents(&local(), "lady").unwrap().is_empty());

    manager.set_options(TagOptions::default());
    assert_eq!(manager.collapse_tag(&local(), "lady").unwrap(), "lady");
    assert_eq!(manager.get_parents(&local(), "lady").unwrap(), vec!["metroid"]);
    assert!(manager.get_parents(&local(), "samus aran").unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_service_is_distinct_from_unknown_tag() {
    let store = Arc::new(InstrumentedStore::new());
    let manager = started(store, TagOptions::default()).await;

    assert!(manager.get_parents(&local(), "never seen").unwrap().is_empty());
    let err = manager
        .get_parents(&ServiceId::new("missing"), "samus")
        .unwrap_err();
    assert!(matches!(err, TagRelError::ServiceNotFound { .. }));
    assert_eq!(err.to_rpc_error_code(), -32002);
}
