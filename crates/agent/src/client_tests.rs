// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    first = { 1, 60, 2 },
    second = { 2, 60, 4 },
    fifth = { 5, 60, 32 },
    capped_connect = { 6, 60, 60 },
    capped_auth = { 9, 120, 120 },
    huge_attempt = { 40, 120, 120 },
)]
fn backoff_doubles_and_caps(attempt: u32, cap: u64, expected: u64) {
    assert_eq!(backoff_secs(attempt, cap), expected);
}

#[tokio::test]
async fn interruptible_sleep_returns_early_on_shutdown() {
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });
    let start = std::time::Instant::now();
    interruptible_sleep(Duration::from_secs(30), &shutdown).await;
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn interruptible_sleep_completes_short_waits() {
    let shutdown = CancellationToken::new();
    let start = std::time::Instant::now();
    interruptible_sleep(Duration::from_millis(120), &shutdown).await;
    assert!(start.elapsed() >= Duration::from_millis(100));
}
