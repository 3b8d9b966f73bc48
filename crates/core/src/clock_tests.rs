// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn fake_clock_advances() {
    let clock = FakeClock::new();
    let before = clock.now();
    clock.advance(Duration::from_secs(90));
    assert_eq!(clock.now() - before, chrono::Duration::seconds(90));
}

#[test]
fn fake_clock_set() {
    let clock = FakeClock::new();
    let target = Utc.timestamp_opt(1_800_000_000, 0).single().unwrap();
    clock.set(target);
    assert_eq!(clock.now(), target);
}

#[test]
fn fake_clock_clones_share_time() {
    let clock = FakeClock::new();
    let other = clock.clone();
    clock.advance(Duration::from_secs(10));
    assert_eq!(clock.now(), other.now());
}

#[test]
fn epoch_ms_tracks_now() {
    let clock = FakeClock::new();
    let before = clock.epoch_ms();
    clock.advance(Duration::from_millis(1500));
    assert_eq!(clock.epoch_ms() - before, 1500);
}
