//! Integration tests for THREADSAFE pool rebalancing driven by dispatch.

mod common;

use common::{Harness, test_config, wait_until};
use relaybot::handlers::{Context, Descriptor};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

#[test]
fn test_stalled_handler_sees_cancellation_and_pool_recovers() {
    let mut config = test_config();
    config.dispatch.pool_workers = 1;
    config.dispatch.min_pool_workers = 1;
    config.dispatch.stall_threshold_ms = 50;
    let mut harness = Harness::with_config(config);

    let started = Arc::new(AtomicBool::new(false));
    let cancelled = Arc::new(AtomicBool::new(false));
    let fast = Arc::new(AtomicUsize::new(0));
    {
        let (started, cancelled, fast) = (Arc::clone(&started), Arc::clone(&cancelled), Arc::clone(&fast));
        harness.registry().register(
            "privmsg",
            Descriptor::threadsafe("lookup", move |ctx: &Context, line: &str| {
                if !line.ends_with(":slow") {
                    fast.fetch_add(1, Ordering::SeqCst);
                    return Ok(());
                }
                started.store(true, Ordering::SeqCst);
                while !ctx.is_cancelled() {
                    thread::sleep(Duration::from_millis(5));
                }
                cancelled.store(true, Ordering::SeqCst);
                Ok(())
            }),
        );
    }

    harness.dispatch(":a!b@c PRIVMSG #c :slow");
    wait_until(|| started.load(Ordering::SeqCst));
    thread::sleep(Duration::from_millis(100));

    harness.dispatch(":a!b@c PRIVMSG #c :fast");
    wait_until(|| cancelled.load(Ordering::SeqCst));
    wait_until(|| fast.load(Ordering::SeqCst) == 1);
    assert_eq!(harness.dispatcher.pool().len(), 1);
    wait_until(|| harness.dispatcher.pool().retired_len() == 0);

    harness.finish();
}

#[test]
fn test_backlog_grows_pool_by_one() {
    let mut config = test_config();
    config.dispatch.pool_workers = 1;
    config.dispatch.min_pool_workers = 1;
    config.dispatch.max_pool_workers = 4;
    config.dispatch.backlog_threshold = 2;
    let mut harness = Harness::with_config(config);

    let gate = Arc::new(AtomicBool::new(false));
    let started = Arc::new(AtomicBool::new(false));
    let fast = Arc::new(AtomicUsize::new(0));
    {
        let (gate, started, fast) = (Arc::clone(&gate), Arc::clone(&started), Arc::clone(&fast));
        harness.registry().register(
            "privmsg",
            Descriptor::threadsafe("work", move |_: &Context, line: &str| {
                if line.ends_with(":block") {
                    started.store(true, Ordering::SeqCst);
                    while !gate.load(Ordering::SeqCst) {
                        thread::sleep(Duration::from_millis(2));
                    }
                } else {
                    fast.fetch_add(1, Ordering::SeqCst);
                }
                Ok(())
            }),
        );
    }

    harness.dispatch(":a!b@c PRIVMSG #c :block");
    wait_until(|| started.load(Ordering::SeqCst));
    for n in 0..5 {
        harness.dispatch(&format!(":a!b@c PRIVMSG #c :fast {n}"));
    }

    // The backlog moved off the blocked worker and ran while it is stuck.
    wait_until(|| fast.load(Ordering::SeqCst) == 5);
    assert_eq!(harness.dispatcher.pool().len(), 2);

    gate.store(true, Ordering::SeqCst);
    harness.finish();
}

#[test]
fn test_idle_pool_shrinks_to_minimum() {
    let mut config = test_config();
    config.dispatch.pool_workers = 3;
    config.dispatch.min_pool_workers = 1;
    config.dispatch.idle_retire_ms = 10;
    let mut harness = Harness::with_config(config);
    thread::sleep(Duration::from_millis(30));

    for _ in 0..5 {
        harness.dispatch("PING :tick");
    }
    assert_eq!(harness.dispatcher.pool().len(), 1);
    harness.finish();
}
