mod common;

use async_trait::async_trait;
use bridge_traits::error::BridgeError;
use bridge_traits::VideoSourceResolver;
use common::{quiet_config, settle, Call, Harness, MockResolver};
use core_playback::{Marker, PlaybackError, SeekOutcome};
use core_runtime::events::{CoreEvent, PlaybackEvent};
use std::sync::Arc;
use std::time::Duration;

/// Resolves every id after a delay, like a slow backend.
struct SlowResolver;

#[async_trait]
impl VideoSourceResolver for SlowResolver {
    async fn resolve(&self, video_id: &str) -> bridge_traits::error::Result<String> {
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok(format!("https://cdn.example.com/{video_id}.mp4"))
    }
}

fn with_resolver(resolver: Arc<dyn VideoSourceResolver>) -> Harness {
    Harness::build(quiet_config(), None, Some(resolver))
}

#[tokio::test(start_paused = true)]
async fn load_video_resolves_through_the_host() {
    let mut resolver = MockResolver::new();
    resolver
        .expect_resolve()
        .withf(|video_id| video_id.to_string() == "game-7")
        .times(1)
        .returning(|_| Ok("https://cdn.example.com/game-7.mp4?token=secret".to_string()));
    let harness = with_resolver(Arc::new(resolver));

    let source = harness.player.load_video("game-7").await.unwrap();
    settle().await;

    assert_eq!(harness.player.current_source(), Some(source));
    assert_eq!(
        harness.element.sources(),
        vec!["https://cdn.example.com/game-7.mp4?token=secret".to_string()]
    );
    assert!(harness.player.is_video_ready());
}

#[tokio::test]
async fn load_video_needs_a_resolver() {
    let harness = Harness::new(quiet_config());

    let result = harness.player.load_video("game-7").await;

    assert!(matches!(
        result,
        Err(PlaybackError::Runtime(
            core_runtime::Error::CapabilityMissing { .. }
        ))
    ));
    assert!(harness.element.sources().is_empty());
}

#[tokio::test]
async fn resolver_errors_are_reported() {
    let mut resolver = MockResolver::new();
    resolver
        .expect_resolve()
        .returning(|video_id| Err(BridgeError::NotFound(video_id.to_string())));
    let harness = with_resolver(Arc::new(resolver));

    let result = harness.player.load_video("game-9").await;

    assert!(matches!(result, Err(PlaybackError::SourceResolution(_))));
    assert_eq!(harness.player.current_source(), None);
}

#[tokio::test(start_paused = true)]
async fn newer_load_wins_over_a_resolving_one() {
    let harness = with_resolver(Arc::new(SlowResolver));

    let player = harness.player.clone();
    let (resolved, direct) = tokio::join!(harness.player.load_video("game-7"), async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        player.load_source("https://cdn.example.com/game-8.mp4")
    });

    assert!(matches!(resolved, Err(PlaybackError::Superseded)));
    assert_eq!(harness.player.current_source(), Some(direct));
    assert_eq!(
        harness.element.sources(),
        vec!["https://cdn.example.com/game-8.mp4".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn volume_preferences_survive_source_changes() {
    let harness = Harness::new(quiet_config());
    harness.load_ready("https://cdn.example.com/a.mp4").await;

    harness.player.set_volume(0.4).unwrap();
    harness.player.set_muted(true);
    assert!(matches!(
        harness.player.set_volume(1.5),
        Err(PlaybackError::InvalidVolume(_))
    ));
    assert_eq!(harness.element.count(&Call::Volume(1.5)), 0);

    harness.load_ready("https://cdn.example.com/b.mp4").await;

    let state = harness.player.snapshot();
    assert_eq!(state.volume, 0.4);
    assert!(state.is_muted);
    assert!(!state.is_playing);
}

#[tokio::test(start_paused = true)]
async fn load_emits_redacted_source_and_ready_events() {
    let mut harness = Harness::new(quiet_config());
    let source = harness
        .load_ready("https://cdn.example.com/game-7.mp4?token=secret")
        .await;

    let playback: Vec<PlaybackEvent> = harness
        .drain_events()
        .into_iter()
        .filter_map(|event| match event {
            CoreEvent::Playback(playback) => Some(playback),
            _ => None,
        })
        .collect();

    assert_eq!(
        playback,
        vec![
            PlaybackEvent::SourceLoaded {
                source_id: source.to_string(),
                url: "https://cdn.example.com/game-7.mp4?[REDACTED]".to_string(),
            },
            PlaybackEvent::Ready {
                source_id: source.to_string(),
                duration: 120.0,
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn subscribers_see_readiness() {
    let harness = Harness::new(quiet_config());
    let mut state = harness.player.subscribe();
    assert!(!state.borrow_and_update().is_video_ready);

    let source = harness.load_ready("https://cdn.example.com/a.mp4").await;

    assert!(state.has_changed().unwrap());
    let snapshot = state.borrow_and_update().clone();
    assert_eq!(snapshot.source, Some(source));
    assert!(snapshot.is_video_ready);
    assert_eq!(snapshot.duration, 120.0);
}

#[tokio::test(start_paused = true)]
async fn timeline_click_snaps_to_markers() {
    let harness = Harness::new(quiet_config());
    load_with_markers(&harness).await;

    // 0.255 is within the hit tolerance of the marker at 30s (0.25).
    assert_eq!(
        harness.player.timeline_click(0.255).await.unwrap(),
        Some(SeekOutcome::Applied(30.0))
    );
    assert_eq!(
        harness.player.timeline_click(0.75).await.unwrap(),
        Some(SeekOutcome::Applied(90.0))
    );
    assert_eq!(harness.element.seeks(), vec![30.0, 90.0]);
}

#[tokio::test(start_paused = true)]
async fn timeline_hover_reports_markers() {
    let harness = Harness::new(quiet_config());
    assert_eq!(harness.player.timeline_hover(0.5), None);

    load_with_markers(&harness).await;

    let hover = harness.player.timeline_hover(0.25).unwrap();
    assert_eq!(hover.time, 30.0);
    assert_eq!(hover.marker, Some(0));

    let hover = harness.player.timeline_hover(0.75).unwrap();
    assert_eq!(hover.marker, None);
    harness.player.timeline_clear_hover();
}

#[tokio::test(start_paused = true)]
async fn timeline_drag_seeks_on_release() {
    let harness = Harness::new(quiet_config());
    load_with_markers(&harness).await;

    harness.player.timeline_drag_start(0.5);
    assert_eq!(harness.player.timeline_drag_to(0.75), Some(90.0));
    assert!(harness.element.seeks().is_empty());

    assert_eq!(
        harness.player.timeline_drag_end().await.unwrap(),
        Some(SeekOutcome::Applied(90.0))
    );
    // The drag is over; releasing again does nothing.
    assert_eq!(harness.player.timeline_drag_end().await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn seek_to_marker_uses_the_marker_time() {
    let harness = Harness::new(quiet_config());
    harness.load_ready("https://cdn.example.com/a.mp4").await;

    let outcome = harness
        .player
        .seek_to_marker(&Marker::new(64.5, "timeout"))
        .await
        .unwrap();

    assert_eq!(outcome, SeekOutcome::Applied(64.5));
    assert_eq!(harness.player.current_time(), 64.5);
}

async fn load_with_markers(harness: &Harness) {
    harness.player.set_markers(vec![
        Marker::new(30.0, "tip-off"),
        Marker::new(60.0, "halftime").with_color("#f5a623"),
    ]);
    harness.load_ready("https://cdn.example.com/a.mp4").await;
}
