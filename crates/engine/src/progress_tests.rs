// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use pba_adapters::ApiClient;
use pba_core::{Config, FakeClock};

use super::*;

fn sink(clock: FakeClock) -> ProgressSink<FakeClock> {
    let mut config = Config::default();
    // Nothing listens here; these tests only exercise the throttle gate.
    config.server.url = "http://127.0.0.1:9".to_string();
    config.agent.uuid = "test-uuid".to_string();
    config.agent.name = "test".to_string();
    let client = Arc::new(ApiClient::new(&config).unwrap());
    ProgressSink::new(client, 1, clock)
}

#[test]
fn first_sample_is_allowed() {
    let sink = sink(FakeClock::new());
    assert!(sink.allow());
}

#[test]
fn samples_within_a_second_are_dropped() {
    let clock = FakeClock::new();
    let sink = sink(clock.clone());

    assert!(sink.allow());
    assert!(!sink.allow());
    clock.advance(Duration::from_millis(500));
    assert!(!sink.allow());
}

#[test]
fn a_second_of_wall_time_reopens_the_gate() {
    let clock = FakeClock::new();
    let sink = sink(clock.clone());

    assert!(sink.allow());
    clock.advance(Duration::from_secs(1));
    assert!(sink.allow());
    clock.advance(Duration::from_millis(999));
    assert!(!sink.allow());
    clock.advance(Duration::from_millis(1));
    assert!(sink.allow());
}
