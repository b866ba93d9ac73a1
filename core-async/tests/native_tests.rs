//! Integration tests for core-async on native platforms.
//!
//! These tests verify that the async abstraction works correctly with Tokio.

#![cfg(not(target_arch = "wasm32"))]

use core_async::sync::{self, CancellationToken};
use core_async::{task, time};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn test_task_spawn() {
    let (tx, rx) = sync::oneshot::channel();
    task::spawn(async move {
        tx.send(42).ok();
    });
    assert_eq!(rx.await.unwrap(), 42);
}

#[tokio::test(start_paused = true)]
async fn test_sleep() {
    let start = time::Instant::now();
    time::sleep(time::Duration::from_millis(50)).await;
    assert_eq!(start.elapsed(), time::Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_success() {
    let result = time::timeout(time::Duration::from_millis(100), async {
        time::sleep(time::Duration::from_millis(10)).await;
        42
    })
    .await;

    assert_eq!(result, Ok(42));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_failure() {
    let result = time::timeout(time::Duration::from_millis(10), async {
        time::sleep(time::Duration::from_millis(100)).await;
        42
    })
    .await;

    assert_eq!(result, Err(time::TimeoutError));
}

#[tokio::test(start_paused = true)]
async fn test_child_tokens_cancel_pending_timers() {
    let root = CancellationToken::new();
    let fired = Arc::new(AtomicUsize::new(0));

    for delay in [1u64, 2, 3] {
        let token = root.child_token();
        let fired = Arc::clone(&fired);
        task::spawn(async move {
            if time::sleep_or_cancel(&token, time::Duration::from_secs(delay)).await {
                fired.fetch_add(1, Ordering::SeqCst);
            }
        });
    }

    time::sleep(time::Duration::from_millis(1500)).await;
    root.cancel();
    time::sleep(time::Duration::from_secs(5)).await;

    // Only the 1s timer elapsed before the root was cancelled.
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_until_cancelled_passes_output_through() {
    let token = CancellationToken::new();
    assert_eq!(time::until_cancelled(&token, async { "done" }).await, Some("done"));
}

#[tokio::test]
async fn test_notify() {
    let notify = Arc::new(sync::Notify::new());
    let waiter = Arc::clone(&notify);
    let (tx, rx) = sync::oneshot::channel();

    task::spawn(async move {
        waiter.notified().await;
        tx.send(()).ok();
    });

    task::yield_now().await;
    notify.notify_one();
    rx.await.unwrap();
}

#[tokio::test]
async fn test_broadcast_channel() {
    let (tx, mut rx1) = sync::broadcast::channel(10);
    let mut rx2 = tx.subscribe();

    tx.send(7).unwrap();

    assert_eq!(rx1.recv().await.unwrap(), 7);
    assert_eq!(rx2.recv().await.unwrap(), 7);
}

#[tokio::test]
async fn test_broadcast_lag_detection() {
    // tokio rounds the capacity up to a power of two.
    let (tx, mut rx) = sync::broadcast::channel(4);
    for i in 0..6 {
        tx.send(i).unwrap();
    }

    assert!(matches!(
        rx.recv().await,
        Err(sync::broadcast::error::RecvError::Lagged(2))
    ));
    assert_eq!(rx.recv().await.unwrap(), 2);
}

#[tokio::test]
async fn test_watch_channel() {
    let (tx, mut rx) = sync::watch::channel("idle");
    assert_eq!(*rx.borrow_and_update(), "idle");

    tx.send_replace("playing");
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow(), "playing");
}

#[test]
fn test_block_on_ready_future() {
    assert_eq!(core_async::runtime::block_on(async { 3 + 4 }), 7);
}
