use bpsync_core::{
    Breakpoint, BreakpointEvent, BreakpointStore, LineCorrection, RemoveOutcome, SyncConfig,
    SyncError, UnknownRemovalPolicy,
};
use bpsync_remote::{to_remote_line, RemoteError};
use pretty_assertions::assert_eq;

use super::{Fixture, URL};

#[tokio::test]
async fn remote_breakpoint_stays_while_client_breakpoint_exists() {
    let fx = Fixture::new();
    fx.sync.set_breakpoint(URL, 3).await.unwrap();
    fx.store.add_breakpoint(URL, 3);

    let outcome = fx.sync.remove_breakpoint(URL, 3).await.unwrap();

    assert_eq!(outcome, RemoveOutcome::StillReferenced);
    assert!(fx.thread.removed_actors().is_empty());
    assert!(fx.sync.actor_record(URL, 3).is_some());
}

#[tokio::test]
async fn disabled_client_breakpoint_does_not_keep_remote_alive() {
    let fx = Fixture::new();
    fx.sync.set_breakpoint(URL, 3).await.unwrap();
    fx.store.insert(Breakpoint::new(URL, 3).disabled());

    let outcome = fx.sync.remove_breakpoint(URL, 3).await.unwrap();

    assert!(matches!(outcome, RemoveOutcome::Removed(_)));
    assert_eq!(fx.thread.removed_actors().len(), 1);
}

#[tokio::test]
async fn shared_actor_is_removed_with_its_last_client_breakpoint() {
    let mut fx = Fixture::new();
    // Line 5 is not executable; the target moves it onto line 6.
    fx.thread.correct_line(URL, to_remote_line(5), to_remote_line(6));
    fx.store.add_breakpoint(URL, 6);
    fx.store.add_breakpoint(URL, 5);

    let six = fx.sync.on_add_breakpoint(Breakpoint::new(URL, 6)).await.unwrap();
    let five = fx.sync.on_add_breakpoint(Breakpoint::new(URL, 5)).await.unwrap();
    assert_eq!(six.correction, None);
    assert_eq!(
        five.correction,
        Some(LineCorrection {
            original: 5,
            corrected: 6
        })
    );
    // Line 6 is taken, so the store keeps the second breakpoint where it was put.
    assert!(fx.store.breakpoint(URL, 5).is_some());
    assert_eq!(fx.sync.actor_records().len(), 1);
    let actor = fx.sync.actor_record(URL, 6).unwrap().actor;
    fx.next_event().await;
    fx.next_event().await;

    let removed_five = fx.store.remove_breakpoint(URL, 5).unwrap();
    let outcome = fx.sync.on_remove_breakpoint(removed_five).await.unwrap();
    assert_eq!(outcome.breakpoint.line, 5);
    assert!(fx.thread.removed_actors().is_empty());
    assert!(fx.sync.actor_record(URL, 5).is_none());
    assert!(fx.sync.actor_record(URL, 6).is_some());
    assert!(matches!(fx.next_event().await, BreakpointEvent::Removed(_)));

    let removed_six = fx.store.remove_breakpoint(URL, 6).unwrap();
    fx.sync.on_remove_breakpoint(removed_six).await.unwrap();
    assert_eq!(fx.thread.removed_actors(), vec![actor]);
    assert!(fx.sync.actor_records().is_empty());
    assert!(fx.thread.live_actors().is_empty());
}

#[tokio::test]
async fn removing_an_untracked_location_is_an_error_by_default() {
    let mut fx = Fixture::new();

    let err = fx.sync.remove_breakpoint(URL, 8).await.unwrap_err();
    assert_eq!(
        err,
        SyncError::UnknownBreakpoint {
            url: URL.to_string(),
            line: 8
        }
    );

    assert!(fx
        .sync
        .on_remove_breakpoint(Breakpoint::new(URL, 8))
        .await
        .is_err());
    fx.assert_no_event();
    assert!(fx.thread.calls().is_empty());
}

#[tokio::test]
async fn removing_an_untracked_location_can_be_ignored() {
    let mut fx = Fixture::with_config(SyncConfig {
        unknown_removal: UnknownRemovalPolicy::Ignore,
        ..SyncConfig::default()
    });

    let outcome = fx.sync.remove_breakpoint(URL, 8).await.unwrap();
    assert_eq!(outcome, RemoveOutcome::NotTracked);

    fx.sync
        .on_remove_breakpoint(Breakpoint::new(URL, 8))
        .await
        .unwrap();
    assert!(matches!(fx.next_event().await, BreakpointEvent::Removed(_)));
    assert!(fx.thread.calls().is_empty());
}

#[tokio::test]
async fn failed_remote_removal_keeps_the_record() {
    let fx = Fixture::new();
    let set = fx.sync.set_breakpoint(URL, 3).await.unwrap();
    let rejection = RemoteError::rejected("wrongState", "thread is running");
    fx.thread.reject_remove(&set.record.actor, rejection.clone());

    let err = fx.sync.remove_breakpoint(URL, 3).await.unwrap_err();

    assert_eq!(err, SyncError::Remote(rejection));
    assert_eq!(fx.sync.actor_record(URL, 3), Some(set.record));
}

#[tokio::test]
async fn disable_then_enable_recreates_the_remote_breakpoint() {
    let fx = Fixture::new();
    let first = fx.sync.enable_breakpoint(URL, 3).await.unwrap();

    let disabled = fx.sync.disable_breakpoint(URL, 3).await.unwrap();
    assert_eq!(disabled, RemoveOutcome::Removed(first.record.clone()));
    assert!(fx.sync.actor_record(URL, 3).is_none());

    let again = fx.sync.enable_breakpoint(URL, 3).await.unwrap();
    assert!(!again.reused());
    assert_eq!(fx.thread.set_requests().len(), 2);
    assert_eq!(fx.thread.removed_actors(), vec![first.record.actor]);
}
