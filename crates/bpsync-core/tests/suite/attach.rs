use bpsync_core::{BreakpointEvent, BreakpointStore};
use bpsync_remote::to_remote_line;
use pretty_assertions::assert_eq;

use super::{Fixture, URL};

#[tokio::test]
async fn store_changes_drive_the_remote_target() {
    let mut fx = Fixture::new();
    assert!(fx.sync.attach());

    fx.store.add_breakpoint(URL, 3);
    let added = fx.next_event().await;
    assert!(matches!(added, BreakpointEvent::Added(_)));
    assert_eq!(fx.thread.live_actors().len(), 1);

    fx.store.disable_breakpoint(URL, 3);
    assert!(matches!(fx.next_event().await, BreakpointEvent::Disabled(_)));
    assert!(fx.thread.live_actors().is_empty());

    fx.store.enable_breakpoint(URL, 3);
    assert!(matches!(fx.next_event().await, BreakpointEvent::Enabled(_)));
    assert_eq!(fx.thread.live_actors().len(), 1);

    fx.store.set_condition(URL, 3, Some("i > 10".to_string()));
    assert!(matches!(fx.next_event().await, BreakpointEvent::Modified(_)));

    fx.store.remove_breakpoint(URL, 3);
    assert!(matches!(fx.next_event().await, BreakpointEvent::Removed(_)));
    assert!(fx.thread.live_actors().is_empty());

    assert!(fx.sync.detach().await);
}

#[tokio::test]
async fn corrections_flow_back_into_the_store() {
    let mut fx = Fixture::new();
    fx.thread
        .correct_line(URL, to_remote_line(10), to_remote_line(12));
    fx.sync.attach();

    fx.store.add_breakpoint(URL, 10);
    let event = fx.next_event().await;

    assert_eq!(event.outcome().breakpoint.line, 12);
    assert_eq!(event.outcome().original_line(), 10);
    assert!(fx.store.breakpoint(URL, 12).is_some());
    assert!(fx.store.breakpoint(URL, 10).is_none());

    fx.sync.detach().await;
}

#[tokio::test]
async fn attach_and_detach_are_idempotent() {
    let fx = Fixture::new();

    assert!(!fx.sync.is_attached());
    assert!(fx.sync.attach());
    assert!(!fx.sync.attach());
    assert!(fx.sync.is_attached());

    assert!(fx.sync.detach().await);
    assert!(!fx.sync.detach().await);
    assert!(!fx.sync.is_attached());
}

#[tokio::test]
async fn detached_synchronizer_ignores_the_store() {
    let mut fx = Fixture::new();
    fx.sync.attach();
    fx.sync.detach().await;

    fx.store.add_breakpoint(URL, 3);
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    assert!(fx.thread.calls().is_empty());
    fx.assert_no_event();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn disable_then_enable_back_to_back_keeps_the_breakpoint() {
    for _ in 0..50 {
        let mut fx = Fixture::new();
        fx.sync.attach();

        fx.store.add_breakpoint(URL, 3);
        assert!(matches!(fx.next_event().await, BreakpointEvent::Added(_)));

        fx.store.disable_breakpoint(URL, 3);
        fx.store.enable_breakpoint(URL, 3);
        assert!(matches!(fx.next_event().await, BreakpointEvent::Disabled(_)));
        assert!(matches!(fx.next_event().await, BreakpointEvent::Enabled(_)));

        assert_eq!(fx.thread.live_actors().len(), 1);
        assert!(fx.sync.actor_record(URL, 3).is_some());
        fx.sync.detach().await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn add_then_remove_back_to_back_leaves_nothing_behind() {
    for _ in 0..50 {
        let mut fx = Fixture::new();
        fx.sync.attach();

        fx.store.add_breakpoint(URL, 3);
        fx.store.remove_breakpoint(URL, 3);
        assert!(matches!(fx.next_event().await, BreakpointEvent::Added(_)));
        assert!(matches!(fx.next_event().await, BreakpointEvent::Removed(_)));

        assert!(fx.thread.live_actors().is_empty());
        assert!(fx.sync.actor_records().is_empty());
        fx.sync.detach().await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn store_events_reach_the_remote_in_order() {
    let mut fx = Fixture::new();
    fx.sync.attach();

    for line in 0..5 {
        fx.store.add_breakpoint(URL, line);
    }
    for line in 0..5 {
        assert_eq!(fx.next_event().await.outcome().breakpoint.line, line);
    }

    let lines: Vec<_> = fx
        .thread
        .set_requests()
        .into_iter()
        .map(|request| request.location.line.get())
        .collect();
    assert_eq!(lines, vec![1, 2, 3, 4, 5]);

    fx.sync.detach().await;
}
