//! # Player Configuration
//!
//! Tuning knobs for recovery, seek verification, loop breaking and clip
//! timing. Every field has a serde default, so hosts can ship partial JSON.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{PlaybackError, Result};

/// Player tuning configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    // ------------------------------------------------------------------
    // Recovery
    // ------------------------------------------------------------------
    /// Recovery attempts allowed per source before giving up.
    ///
    /// Default: 3.
    #[serde(default = "default_max_recovery_attempts")]
    pub max_recovery_attempts: u32,

    /// Delay between reloading the source and restoring position.
    ///
    /// Default: 1 second.
    #[serde(default = "default_recovery_settle_delay")]
    pub recovery_settle_delay: Duration,

    /// How long one recovery attempt may take before it counts as failed.
    ///
    /// Default: 10 seconds.
    #[serde(default = "default_recovery_attempt_timeout")]
    pub recovery_attempt_timeout: Duration,

    /// Whether the stall heartbeat runs.
    ///
    /// Default: true.
    #[serde(default = "default_stall_detection_enabled")]
    pub stall_detection_enabled: bool,

    /// Playing without `timeupdate` progress for this long is a stall.
    ///
    /// Default: 10 seconds.
    #[serde(default = "default_stall_timeout")]
    pub stall_timeout: Duration,

    /// Heartbeat check interval.
    ///
    /// Default: 1 second.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: Duration,

    /// Probe `.webm` siblings of `.mp4`/`.mov` sources on decode errors.
    ///
    /// Default: true.
    #[serde(default = "default_format_fallback_enabled")]
    pub format_fallback_enabled: bool,

    /// Timeout of the `HEAD` probe for a `.webm` sibling.
    ///
    /// Default: 5 seconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: Duration,

    /// Query parameter appended to the URL when reloading after a network
    /// error.
    ///
    /// Default: `"retry"`.
    #[serde(default = "default_cache_bust_param")]
    pub cache_bust_param: String,

    // ------------------------------------------------------------------
    // Seeking
    // ------------------------------------------------------------------
    /// Maximum distance (seconds) between the requested and the read-back
    /// position for a clip seek to count as verified.
    ///
    /// Default: 2.0.
    #[serde(default = "default_seek_tolerance_secs")]
    pub seek_tolerance_secs: f64,

    /// Total seek attempts (first one included) before verification fails.
    ///
    /// Default: 3.
    #[serde(default = "default_seek_verify_attempts")]
    pub seek_verify_attempts: u32,

    /// Base backoff between seek verification attempts; doubles per attempt.
    ///
    /// Default: 200 ms.
    #[serde(default = "default_seek_retry_base_delay")]
    pub seek_retry_base_delay: Duration,

    /// Upper bound on waiting for `seeked` after setting the position.
    ///
    /// Default: 1 second.
    #[serde(default = "default_seek_settle_timeout")]
    pub seek_settle_timeout: Duration,

    /// Seeks closer than this (seconds) to the previous target are no-ops.
    ///
    /// Default: 0.1.
    #[serde(default = "default_seek_dedupe_window_secs")]
    pub seek_dedupe_window_secs: f64,

    /// How long a previous seek target is remembered for de-duplication.
    ///
    /// Default: `None`, the previous target is always compared.
    #[serde(default)]
    pub seek_dedupe_interval: Option<Duration>,

    /// Window of the rapid-seek loop breaker.
    ///
    /// Default: 250 ms.
    #[serde(default = "default_rapid_seek_window")]
    pub rapid_seek_window: Duration,

    /// Native seeks allowed inside `rapid_seek_window`; further ones are
    /// dropped until the window drains.
    ///
    /// Default: 5.
    #[serde(default = "default_rapid_seek_limit")]
    pub rapid_seek_limit: usize,

    // ------------------------------------------------------------------
    // Play / clips
    // ------------------------------------------------------------------
    /// Retries of a `play()` interrupted by a concurrent pause or load.
    ///
    /// Default: 2.
    #[serde(default = "default_play_retry_attempts")]
    pub play_retry_attempts: u32,

    /// Delay before retrying an interrupted `play()`.
    ///
    /// Default: 150 ms.
    #[serde(default = "default_play_retry_delay")]
    pub play_retry_delay: Duration,

    /// How long a clip without a duration plays before the sequence ends.
    ///
    /// Default: 3 seconds.
    #[serde(default = "default_clip_fallback_window")]
    pub clip_fallback_window: Duration,

    /// Pause settle time when a new clip replaces an active one.
    ///
    /// Default: 100 ms.
    #[serde(default = "default_clip_restart_settle")]
    pub clip_restart_settle: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            max_recovery_attempts: default_max_recovery_attempts(),
            recovery_settle_delay: default_recovery_settle_delay(),
            recovery_attempt_timeout: default_recovery_attempt_timeout(),
            stall_detection_enabled: default_stall_detection_enabled(),
            stall_timeout: default_stall_timeout(),
            heartbeat_interval: default_heartbeat_interval(),
            format_fallback_enabled: default_format_fallback_enabled(),
            probe_timeout: default_probe_timeout(),
            cache_bust_param: default_cache_bust_param(),
            seek_tolerance_secs: default_seek_tolerance_secs(),
            seek_verify_attempts: default_seek_verify_attempts(),
            seek_retry_base_delay: default_seek_retry_base_delay(),
            seek_settle_timeout: default_seek_settle_timeout(),
            seek_dedupe_window_secs: default_seek_dedupe_window_secs(),
            seek_dedupe_interval: None,
            rapid_seek_window: default_rapid_seek_window(),
            rapid_seek_limit: default_rapid_seek_limit(),
            play_retry_attempts: default_play_retry_attempts(),
            play_retry_delay: default_play_retry_delay(),
            clip_fallback_window: default_clip_fallback_window(),
            clip_restart_settle: default_clip_restart_settle(),
        }
    }
}

impl PlayerConfig {
    /// Configuration for fast local sources.
    ///
    /// - Shorter settle and stall timeouts
    /// - Tighter seek tolerance
    pub fn responsive() -> Self {
        Self {
            recovery_settle_delay: Duration::from_millis(500),
            stall_timeout: Duration::from_secs(5),
            seek_tolerance_secs: 1.0,
            seek_retry_base_delay: Duration::from_millis(100),
            seek_settle_timeout: Duration::from_millis(500),
            ..Default::default()
        }
    }

    /// Configuration for slow or flaky networks.
    ///
    /// - More recovery attempts with longer settle time
    /// - More patient seek verification
    pub fn resilient() -> Self {
        Self {
            max_recovery_attempts: 5,
            recovery_settle_delay: Duration::from_secs(2),
            recovery_attempt_timeout: Duration::from_secs(20),
            stall_timeout: Duration::from_secs(20),
            seek_verify_attempts: 5,
            seek_retry_base_delay: Duration::from_millis(400),
            seek_settle_timeout: Duration::from_secs(3),
            probe_timeout: Duration::from_secs(10),
            ..Default::default()
        }
    }

    /// Parses a configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| PlaybackError::Config(e.to_string()))?;
        config.validate().map_err(PlaybackError::Config)?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.seek_tolerance_secs.is_finite() || self.seek_tolerance_secs <= 0.0 {
            return Err("seek_tolerance_secs must be a positive number".to_string());
        }

        if self.seek_verify_attempts == 0 {
            return Err("seek_verify_attempts must be > 0".to_string());
        }

        if !self.seek_dedupe_window_secs.is_finite() || self.seek_dedupe_window_secs < 0.0 {
            return Err("seek_dedupe_window_secs must be >= 0".to_string());
        }

        if self.rapid_seek_limit == 0 {
            return Err("rapid_seek_limit must be > 0".to_string());
        }

        if self.stall_detection_enabled && self.heartbeat_interval.is_zero() {
            return Err("heartbeat_interval must be > 0 when stall detection is enabled".to_string());
        }

        if self.stall_timeout < self.heartbeat_interval {
            return Err("stall_timeout cannot be shorter than heartbeat_interval".to_string());
        }

        if self.recovery_attempt_timeout <= self.recovery_settle_delay {
            return Err("recovery_attempt_timeout must exceed recovery_settle_delay".to_string());
        }

        if self.cache_bust_param.is_empty() {
            return Err("cache_bust_param cannot be empty".to_string());
        }

        Ok(())
    }
}

// Default value functions

fn default_max_recovery_attempts() -> u32 {
    3
}

fn default_recovery_settle_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_recovery_attempt_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_stall_detection_enabled() -> bool {
    true
}

fn default_stall_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_heartbeat_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_format_fallback_enabled() -> bool {
    true
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_cache_bust_param() -> String {
    "retry".to_string()
}

fn default_seek_tolerance_secs() -> f64 {
    2.0
}

fn default_seek_verify_attempts() -> u32 {
    3
}

fn default_seek_retry_base_delay() -> Duration {
    Duration::from_millis(200)
}

fn default_seek_settle_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_seek_dedupe_window_secs() -> f64 {
    0.1
}

fn default_rapid_seek_window() -> Duration {
    Duration::from_millis(250)
}

fn default_rapid_seek_limit() -> usize {
    5
}

fn default_play_retry_attempts() -> u32 {
    2
}

fn default_play_retry_delay() -> Duration {
    Duration::from_millis(150)
}

fn default_clip_fallback_window() -> Duration {
    Duration::from_secs(3)
}

fn default_clip_restart_settle() -> Duration {
    Duration::from_millis(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlayerConfig::default();
        assert_eq!(config.max_recovery_attempts, 3);
        assert_eq!(config.seek_tolerance_secs, 2.0);
        assert_eq!(config.seek_verify_attempts, 3);
        assert_eq!(config.rapid_seek_window, Duration::from_millis(250));
        assert_eq!(config.clip_fallback_window, Duration::from_secs(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        let responsive = PlayerConfig::responsive();
        assert!(responsive.seek_tolerance_secs < PlayerConfig::default().seek_tolerance_secs);
        assert!(responsive.validate().is_ok());

        let resilient = PlayerConfig::resilient();
        assert_eq!(resilient.max_recovery_attempts, 5);
        assert!(resilient.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = PlayerConfig::default();
        config.seek_tolerance_secs = 0.0;
        assert!(config.validate().is_err());

        let mut config = PlayerConfig::default();
        config.seek_verify_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = PlayerConfig::default();
        config.rapid_seek_limit = 0;
        assert!(config.validate().is_err());

        let mut config = PlayerConfig::default();
        config.stall_timeout = Duration::from_millis(10);
        assert!(config.validate().is_err());

        let mut config = PlayerConfig::default();
        config.recovery_attempt_timeout = config.recovery_settle_delay;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = PlayerConfig::from_json(
            r#"{ "max_recovery_attempts": 4, "seek_tolerance_secs": 1.5 }"#,
        )
        .unwrap();

        assert_eq!(config.max_recovery_attempts, 4);
        assert_eq!(config.seek_tolerance_secs, 1.5);
        assert_eq!(config.stall_timeout, Duration::from_secs(10));
        assert_eq!(config.cache_bust_param, "retry");
    }

    #[test]
    fn test_json_rejects_invalid_values() {
        let result = PlayerConfig::from_json(r#"{ "seek_verify_attempts": 0 }"#);
        assert!(matches!(result, Err(PlaybackError::Config(_))));

        let result = PlayerConfig::from_json("not json");
        assert!(matches!(result, Err(PlaybackError::Config(_))));
    }
}
