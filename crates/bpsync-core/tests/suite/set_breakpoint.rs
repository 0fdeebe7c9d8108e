use std::time::Duration;

use bpsync_core::{RemoveOutcome, SyncConfig, SyncError};
use bpsync_remote::{to_remote_line, RemoteError};
use pretty_assertions::assert_eq;

use super::{Fixture, URL};

#[tokio::test]
async fn concurrent_sets_for_one_location_share_a_record() {
    let fx = Fixture::new();
    fx.thread.hold_replies();

    let (first, second, ()) = tokio::join!(
        fx.sync.set_breakpoint(URL, 4),
        fx.sync.set_breakpoint(URL, 4),
        async {
            // Both requests miss the registry before either reply arrives.
            fx.thread.wait_for_calls(2).await;
            fx.thread.release_replies();
        }
    );

    let first = first.unwrap();
    let second = second.unwrap();
    assert_eq!(fx.thread.set_requests().len(), 2);
    assert_eq!(first.record.actor, second.record.actor);
    assert_eq!(fx.sync.actor_records().len(), 1);
}

#[tokio::test]
async fn existing_actor_is_reused_without_a_round_trip() {
    let fx = Fixture::new();

    let created = fx.sync.set_breakpoint(URL, 4).await.unwrap();
    let reused = fx.sync.set_breakpoint(URL, 4).await.unwrap();

    assert!(!created.reused());
    assert!(reused.reused());
    assert_eq!(created.record, reused.record);
    assert_eq!(fx.thread.set_requests().len(), 1);
}

#[tokio::test]
async fn requests_use_one_based_remote_lines() {
    let fx = Fixture::new();

    let set = fx.sync.set_breakpoint(URL, 0).await.unwrap();

    let requests = fx.thread.set_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].location.url, URL);
    assert_eq!(requests[0].location.line.get(), 1);
    assert_eq!(set.record.line(), 0);
}

#[tokio::test]
async fn corrected_line_is_tracked_under_both_lines() {
    let fx = Fixture::new();
    fx.thread
        .correct_line(URL, to_remote_line(10), to_remote_line(12));

    let set = fx.sync.set_breakpoint(URL, 10).await.unwrap();
    assert_eq!(set.record.line(), 12);
    assert_eq!(
        set.reply.and_then(|reply| reply.actual_location).map(|l| l.line),
        Some(to_remote_line(12))
    );
    assert!(fx.sync.actor_record(URL, 12).is_some());
    assert!(fx.sync.actor_record(URL, 10).is_some());

    // Removing by the originally requested line reaches the corrected actor.
    let removed = fx.sync.remove_breakpoint(URL, 10).await.unwrap();
    assert_eq!(removed, RemoveOutcome::Removed(set.record.clone()));
    assert_eq!(fx.thread.removed_actors(), vec![set.record.actor]);
    assert!(fx.sync.actor_records().is_empty());
    assert!(fx.thread.live_actors().is_empty());
}

#[tokio::test]
async fn lines_collapsing_onto_one_actor_share_a_record() {
    let fx = Fixture::new();
    fx.thread.correct_line(URL, to_remote_line(5), to_remote_line(6));

    let direct = fx.sync.set_breakpoint(URL, 6).await.unwrap();
    let collapsed = fx.sync.set_breakpoint(URL, 5).await.unwrap();

    assert_eq!(direct.record.actor, collapsed.record.actor);
    assert_eq!(collapsed.record.line(), 6);
    assert_eq!(
        collapsed.record.lines().into_iter().collect::<Vec<_>>(),
        vec![5, 6]
    );
    assert_eq!(fx.sync.actor_records().len(), 1);

    // The alias is known now, so no third round trip.
    assert!(fx.sync.set_breakpoint(URL, 5).await.unwrap().reused());
    assert_eq!(fx.thread.set_requests().len(), 2);
}

#[tokio::test]
async fn operations_fail_without_an_active_thread() {
    let fx = Fixture::disconnected();

    assert_eq!(
        fx.sync.set_breakpoint(URL, 4).await.unwrap_err(),
        SyncError::NoActiveThread
    );
    assert_eq!(
        fx.sync.remove_breakpoint(URL, 4).await.unwrap_err(),
        SyncError::NoActiveThread
    );
    assert!(fx.thread.calls().is_empty());
}

#[tokio::test]
async fn thread_can_be_connected_later() {
    let fx = Fixture::disconnected();
    assert!(fx.sync.set_breakpoint(URL, 4).await.is_err());

    let remote: std::sync::Arc<dyn bpsync_remote::RemoteThread> = fx.thread.clone();
    fx.sync.context().set_thread(Some(remote));
    assert!(fx.sync.set_breakpoint(URL, 4).await.is_ok());
}

#[tokio::test]
async fn rejected_set_records_nothing() {
    let fx = Fixture::new();
    let rejection = RemoteError::rejected("noScript", "no script at that location");
    fx.thread.reject_set(URL, to_remote_line(3), rejection.clone());

    let err = fx.sync.set_breakpoint(URL, 3).await.unwrap_err();

    assert_eq!(err, SyncError::Remote(rejection));
    assert!(fx.sync.actor_records().is_empty());
}

#[tokio::test]
async fn slow_reply_times_out() {
    let fx = Fixture::with_config(SyncConfig {
        reply_timeout_ms: 50,
        ..SyncConfig::default()
    });
    fx.thread.hold_replies();

    let err = fx.sync.set_breakpoint(URL, 3).await.unwrap_err();

    assert_eq!(err, SyncError::Timeout(Duration::from_millis(50)));
    assert!(fx.sync.actor_records().is_empty());
}
