
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::json;

use fanout::{CodeKind, DispatchRequest, Dispatcher, FanoutError, ShellExecutor, Target, WorkSpec};
use test_harness::{quick_spec, targets, Behavior, FakeExecutor};

#[tokio::test]
async fn test_all_targets_succeed() {
    test_harness::init_tracing();
    let executor = Arc::new(FakeExecutor::new());
    let dispatcher = Dispatcher::new(executor);

    let request = DispatchRequest::new(
        targets(&["hostA", "hostB"]),
        quick_spec(Duration::from_secs(5)),
    );
    let outcomes = dispatcher.begin_invoke(request).await;

    assert_eq!(outcomes.len(), 2);
    for outcome in &outcomes {
        assert!(outcome.success);
        assert_eq!(outcome.results(), &[json!("ok")]);
        assert!(outcome.errors.is_none());
    }
}

#[tokio::test]
async fn test_engine_fault_becomes_failed_outcome() {
    let executor = Arc::new(FakeExecutor::new().on("hostA", Behavior::Panic));
    let dispatcher = Dispatcher::new(executor);

    let request = DispatchRequest::new(targets(&["hostA"]), quick_spec(Duration::from_secs(5)));
    let outcomes = dispatcher.begin_invoke(request).await;

    assert_eq!(outcomes.len(), 1);
    let outcome = &outcomes[0];
    assert!(!outcome.success);
    assert!(!outcome.errors().is_empty());
    assert!(outcome.results.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_timeout_does_not_delay_siblings() {
    test_harness::init_tracing();
    let executor = Arc::new(
        FakeExecutor::new()
            .on(
                "hostA",
                Behavior::Hang {
                    duration: Duration::from_secs(10),
                },
            )
            .on(
                "hostB",
                Behavior::Succeed {
                    delay: Duration::from_millis(100),
                    results: vec![json!("fast")],
                },
            ),
    );
    let dispatcher = Dispatcher::new(executor);

    let started = Instant::now();
    let request = DispatchRequest::new(
        targets(&["hostA", "hostB"]),
        quick_spec(Duration::from_secs(1)),
    );
    let outcomes = dispatcher.begin_invoke(request).await;
    let elapsed = started.elapsed();

    assert_eq!(outcomes.len(), 2);
    let slow = outcomes.iter().find(|o| o.target.name() == "hostA").unwrap();
    let fast = outcomes.iter().find(|o| o.target.name() == "hostB").unwrap();

    assert!(!slow.success);
    assert_eq!(slow.errors()[0], "execution timeout after 1 second(s)");
    assert!(fast.success);
    assert_eq!(fast.results(), &[json!("fast")]);

    // The dispatch joins at the 1s deadline, not at the 10s hang.
    assert!(
        elapsed < Duration::from_secs(3),
        "dispatch took {:?}, expected ~1s",
        elapsed
    );
}

#[tokio::test]
async fn test_empty_code_rejected_before_dispatch() {
    let result = WorkSpec::new("", CodeKind::Script);
    assert!(matches!(result, Err(FanoutError::InvalidSpec(_))));
}

#[tokio::test]
async fn test_zero_throttle_rejected() {
    let request = DispatchRequest::new(targets(&["hostA"]), quick_spec(Duration::from_secs(5)))
        .with_throttle(0);
    assert!(matches!(request, Err(FanoutError::InvalidThrottle(0))));
}

#[tokio::test]
async fn test_duplicate_targets_dispatch_independently() {
    let executor = Arc::new(FakeExecutor::new());
    let dispatcher = Dispatcher::new(executor.clone());

    let request = DispatchRequest::new(
        targets(&["hostA", "hostA"]),
        quick_spec(Duration::from_secs(5)),
    );
    let outcomes = dispatcher.begin_invoke(request).await;

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.target.name() == "hostA"));
    // Each occurrence ran with its own freshly allocated context.
    assert_eq!(executor.contexts_created(), 2);
}

#[tokio::test]
async fn test_one_outcome_per_target() {
    let names: Vec<String> = (0..25).map(|i| format!("host{:02}", i)).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();

    let executor = Arc::new(FakeExecutor::new());
    let dispatcher = Dispatcher::new(executor);

    let request = DispatchRequest::new(targets(&name_refs), quick_spec(Duration::from_secs(5)));
    let outcomes = dispatcher.begin_invoke(request).await;

    assert_eq!(outcomes.len(), 25);
    let mut seen: Vec<&str> = outcomes.iter().map(|o| o.target.name()).collect();
    seen.sort_unstable();
    let mut expected = name_refs.clone();
    expected.sort_unstable();
    assert_eq!(seen, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_throttle_bounds_concurrency() {
    let names: Vec<String> = (0..16).map(|i| format!("host{:02}", i)).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();

    let executor = Arc::new(FakeExecutor::new().with_default(Behavior::Succeed {
        delay: Duration::from_millis(50),
        results: vec![json!("ok")],
    }));
    let dispatcher = Dispatcher::new(executor.clone());

    let request = DispatchRequest::new(targets(&name_refs), quick_spec(Duration::from_secs(5)))
        .with_throttle(3)
        .unwrap();
    let outcomes = dispatcher.begin_invoke(request).await;

    assert_eq!(outcomes.len(), 16);
    assert!(
        executor.high_water() <= 3,
        "observed {} concurrent jobs with throttle 3",
        executor.high_water()
    );
}

#[tokio::test]
async fn test_on_each_fires_once_per_outcome() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let hook_seen = seen.clone();

    let executor = Arc::new(FakeExecutor::new());
    let dispatcher = Dispatcher::new(executor);

    let request = DispatchRequest::new(
        targets(&["hostA", "hostB", "hostC"]),
        quick_spec(Duration::from_secs(5)),
    )
    .with_on_each(move |outcome| {
        hook_seen.lock().unwrap().push(outcome.target.name().to_string());
    });
    let outcomes = dispatcher.begin_invoke(request).await;

    assert_eq!(outcomes.len(), 3);
    let mut names = seen.lock().unwrap().clone();
    names.sort_unstable();
    assert_eq!(names, vec!["hostA", "hostB", "hostC"]);
}

#[tokio::test]
async fn test_panicking_on_each_does_not_break_the_dispatch() {
    let calls = Arc::new(AtomicUsize::new(0));
    let hook_calls = calls.clone();

    let executor = Arc::new(FakeExecutor::new());
    let dispatcher = Dispatcher::new(executor);

    let request = DispatchRequest::new(
        targets(&["hostA", "hostB"]),
        quick_spec(Duration::from_secs(5)),
    )
    .with_on_each(move |_| {
        hook_calls.fetch_add(1, Ordering::SeqCst);
        panic!("observer bug");
    });
    let outcomes = dispatcher.begin_invoke(request).await;

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.success));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_zero_targets_yield_empty_result() {
    let executor = Arc::new(FakeExecutor::new());
    let dispatcher = Dispatcher::new(executor);

    let request = DispatchRequest::new(Vec::new(), quick_spec(Duration::from_secs(5)));
    let outcomes = dispatcher.begin_invoke(request).await;
    assert!(outcomes.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_abandoned_engine_call_is_tracked_until_it_finishes() {
    let executor = Arc::new(FakeExecutor::new().on(
        "hostA",
        Behavior::Hang {
            duration: Duration::from_millis(600),
        },
    ));
    let dispatcher = Dispatcher::new(executor.clone());

    let request = DispatchRequest::new(
        targets(&["hostA"]),
        quick_spec(Duration::from_millis(100)),
    );
    let outcomes = dispatcher.begin_invoke(request).await;

    assert_eq!(outcomes.len(), 1);
    assert!(!outcomes[0].success);

    // The engine call is still running, detached, after the timeout was
    // reported.
    let orphans = dispatcher.orphans();
    assert_eq!(orphans.live(), 1);
    assert_eq!(orphans.abandoned(), 1);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(orphans.live(), 0);
    assert_eq!(orphans.abandoned(), 1);
    assert_eq!(executor.runs_finished(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancellation_reaches_a_cooperative_engine() {
    let executor = Arc::new(FakeExecutor::new().on(
        "hostA",
        Behavior::HangUntilCancelled {
            duration: Duration::from_secs(10),
        },
    ));
    let dispatcher = Dispatcher::new(executor.clone());

    let request = DispatchRequest::new(
        targets(&["hostA"]),
        quick_spec(Duration::from_millis(100)),
    );
    let outcomes = dispatcher.begin_invoke(request).await;

    assert_eq!(outcomes.len(), 1);
    assert!(!outcomes[0].success);

    // A cooperative engine winds down promptly once the token fires.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(executor.runs_finished(), 1);
    assert_eq!(dispatcher.orphans().live(), 0);
}

#[tokio::test]
async fn test_dispatch_through_the_shell_engine() {
    let dispatcher = Dispatcher::new(Arc::new(ShellExecutor::new()));

    let spec = WorkSpec::new("echo hello", CodeKind::Script)
        .unwrap()
        .with_timeout(Duration::from_secs(5))
        .unwrap();
    let request = DispatchRequest::new(
        vec![Target::new("localhost"), Target::new("localhost")],
        spec,
    );
    let outcomes = dispatcher.begin_invoke(request).await;

    assert_eq!(outcomes.len(), 2);
    for outcome in &outcomes {
        assert!(outcome.success, "errors: {:?}", outcome.errors);
        assert_eq!(outcome.results(), &[json!("hello")]);
    }
}
