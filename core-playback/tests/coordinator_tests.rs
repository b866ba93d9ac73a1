mod common;

use bridge_traits::{MediaEvent, PlayRejection};
use common::{quiet_config, settle, Call, Harness};
use core_playback::{PlaybackError, PlayerConfig, SeekOutcome};
use std::time::Duration;

fn unready() -> Harness {
    let harness = Harness::new(quiet_config());
    harness.element.set_auto_ready(false);
    harness
}

fn seek_and_play_calls(harness: &Harness) -> Vec<Call> {
    harness
        .element
        .calls()
        .into_iter()
        .filter(|call| matches!(call, Call::Seek(_) | Call::Play))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn pending_seek_completes_before_pending_play() {
    let harness = unready();
    harness.player.load_source("https://cdn.example.com/game-7.mp4");

    assert_eq!(
        harness.player.seek_to_time(37.5).await.unwrap(),
        SeekOutcome::Deferred
    );
    harness.player.play().await.unwrap();
    assert!(seek_and_play_calls(&harness).is_empty());

    harness.element.fire(MediaEvent::CanPlay);
    settle().await;

    assert_eq!(
        seek_and_play_calls(&harness),
        vec![Call::Seek(37.5), Call::Play]
    );
    assert!(harness.player.snapshot().is_playing);
}

#[tokio::test(start_paused = true)]
async fn later_pending_seek_overwrites_earlier_one() {
    let harness = unready();
    harness.player.load_source("https://cdn.example.com/game-7.mp4");

    harness.player.seek_to_time(5.0).await.unwrap();
    harness.player.seek_to_time(9.0).await.unwrap();

    harness.element.fire(MediaEvent::LoadedData);
    settle().await;

    assert_eq!(harness.element.seeks(), vec![9.0]);
    assert_eq!(harness.element.count(&Call::Play), 0);
}

#[tokio::test(start_paused = true)]
async fn pending_operations_never_reach_the_next_source() {
    let harness = unready();
    let first = harness.player.load_source("https://cdn.example.com/a.mp4");
    harness.player.seek_to_time(12.0).await.unwrap();
    harness.player.play().await.unwrap();

    let second = harness.player.load_source("https://cdn.example.com/b.mp4");
    assert_ne!(first, second);

    // A late readiness event of the old source is dropped, the new source's
    // readiness has nothing to replay.
    harness.element.fire_for(first, MediaEvent::CanPlay);
    harness.element.fire(MediaEvent::CanPlay);
    settle().await;

    assert!(seek_and_play_calls(&harness).is_empty());
    assert!(harness.player.is_video_ready());
}

#[tokio::test(start_paused = true)]
async fn close_seeks_are_deduplicated() {
    let harness = Harness::new(quiet_config());
    harness.load_ready("https://cdn.example.com/game-7.mp4").await;

    assert_eq!(
        harness.player.seek_to_time(20.0).await.unwrap(),
        SeekOutcome::Applied(20.0)
    );
    assert_eq!(
        harness.player.seek_to_time(20.05).await.unwrap(),
        SeekOutcome::Deduplicated
    );
    assert_eq!(harness.element.seeks(), vec![20.0]);

    // The previous target is remembered however long ago it was applied.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(
        harness.player.seek_to_time(19.95).await.unwrap(),
        SeekOutcome::Deduplicated
    );
    assert_eq!(
        harness.player.seek_to_time(21.0).await.unwrap(),
        SeekOutcome::Applied(21.0)
    );
}

#[tokio::test(start_paused = true)]
async fn dedupe_interval_forgets_old_targets() {
    let harness = Harness::new(PlayerConfig {
        seek_dedupe_interval: Some(Duration::from_millis(500)),
        ..quiet_config()
    });
    harness.load_ready("https://cdn.example.com/game-7.mp4").await;

    harness.player.seek_to_time(20.0).await.unwrap();
    assert_eq!(
        harness.player.seek_to_time(20.05).await.unwrap(),
        SeekOutcome::Deduplicated
    );

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(
        harness.player.seek_to_time(20.05).await.unwrap(),
        SeekOutcome::Applied(20.05)
    );
}

#[tokio::test(start_paused = true)]
async fn rapid_seek_loop_is_broken() {
    let harness = Harness::new(quiet_config());
    harness.load_ready("https://cdn.example.com/game-7.mp4").await;

    for index in 0..5 {
        let target = 10.0 + index as f64;
        assert_eq!(
            harness.player.seek_to_time(target).await.unwrap(),
            SeekOutcome::Applied(target)
        );
    }
    assert_eq!(
        harness.player.seek_to_time(30.0).await.unwrap(),
        SeekOutcome::Throttled
    );
    assert_eq!(harness.element.seeks().len(), 5);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(
        harness.player.seek_to_time(30.0).await.unwrap(),
        SeekOutcome::Applied(30.0)
    );
}

#[tokio::test(start_paused = true)]
async fn seeks_are_clamped_to_the_duration() {
    let harness = Harness::new(quiet_config());
    harness.load_ready("https://cdn.example.com/game-7.mp4").await;

    assert_eq!(
        harness.player.seek_to_time(500.0).await.unwrap(),
        SeekOutcome::Applied(120.0)
    );
    assert!(matches!(
        harness.player.seek_to_time(f64::NAN).await,
        Err(PlaybackError::SeekUnavailable(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn pause_is_idempotent() {
    let harness = Harness::new(quiet_config());
    harness.load_ready("https://cdn.example.com/game-7.mp4").await;
    harness.player.play().await.unwrap();
    assert!(harness.player.snapshot().is_playing);

    harness.player.pause();
    harness.player.pause();

    assert!(!harness.player.snapshot().is_playing);
    assert_eq!(harness.element.count(&Call::Pause), 1);
}

#[tokio::test(start_paused = true)]
async fn pause_before_readiness_drops_pending_play() {
    let harness = unready();
    harness.player.load_source("https://cdn.example.com/game-7.mp4");
    harness.player.play().await.unwrap();
    harness.player.pause();

    harness.element.fire(MediaEvent::CanPlay);
    settle().await;

    assert_eq!(harness.element.count(&Call::Play), 0);
}

#[tokio::test(start_paused = true)]
async fn interrupted_play_is_retried() {
    let harness = Harness::new(quiet_config());
    harness.load_ready("https://cdn.example.com/game-7.mp4").await;
    harness
        .element
        .reject_next_play(PlayRejection::Aborted("interrupted by pause()".into()));

    harness.player.play().await.unwrap();

    assert_eq!(harness.element.count(&Call::Play), 2);
    assert!(harness.player.snapshot().is_playing);
}

#[tokio::test(start_paused = true)]
async fn blocked_play_is_reported() {
    let harness = Harness::new(quiet_config());
    harness.load_ready("https://cdn.example.com/game-7.mp4").await;
    harness
        .element
        .reject_next_play(PlayRejection::NotAllowed("user gesture required".into()));

    let error = harness.player.play().await.unwrap_err();

    assert!(matches!(error, PlaybackError::PlaybackBlocked(_)));
    assert!(error.is_user_facing());
    assert_eq!(harness.element.count(&Call::Play), 1);
}

#[tokio::test]
async fn commands_without_a_source() {
    let harness = Harness::new(quiet_config());

    assert!(matches!(
        harness.player.play().await,
        Err(PlaybackError::NoSource)
    ));
    assert!(matches!(
        harness.player.seek_to_time(3.0).await,
        Err(PlaybackError::SeekUnavailable(_))
    ));
    harness.player.pause();
}
