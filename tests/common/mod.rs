//! Integration test common infrastructure.
//!
//! Provides recording sinks, a dispatcher harness wired to them, and a fake
//! IRC server for end-to-end sessions.

pub mod server;
pub mod sink;

#[allow(unused_imports)]
pub use server::FakeServer;
#[allow(unused_imports)]
pub use sink::{FailingSink, Harness, RecordingSink, dispatcher_writing_to, test_config};

use std::thread;
use std::time::{Duration, Instant};

/// Poll `cond` until it holds, failing the test after 5 seconds.
#[allow(dead_code)]
pub fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not met within 5s");
        thread::sleep(Duration::from_millis(2));
    }
}
