//! Core types shared across all modules: positions, configuration, stats.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Basic math
// ---------------------------------------------------------------------------

/// World-space position plus facing (radians).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub orientation: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32, orientation: f32) -> Self {
        Self {
            x,
            y,
            z,
            orientation,
        }
    }

    pub fn distance(&self, other: &Position) -> f32 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({:.2}, {:.2}, {:.2}) o={:.2}",
            self.x, self.y, self.z, self.orientation
        )
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// When queued mutations reach the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyMode {
    /// Drain the queue right after each frame is enqueued.
    #[default]
    Inline,
    /// Leave draining to the service tick.
    Deferred,
}

/// Accepted range for [`MirrorConfig::tick_rate_hz`].
pub const MIN_TICK_RATE_HZ: f32 = 0.01;
pub const MAX_TICK_RATE_HZ: f32 = 1000.0;
const DEFAULT_TICK_RATE_HZ: f32 = 10.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    pub apply_mode: ApplyMode,
    /// Slack added to a spell's cast time before its active cast is
    /// considered stuck and cleared.
    pub cast_grace_ms: u64,
    /// Stuck-cast timeout for casts announced with a zero cast time
    /// (instant and channelled spells).
    pub instant_cast_timeout_ms: u64,
    /// Service tick rate in Hz (deferred apply + cast expiry).
    pub tick_rate_hz: f32,
    /// Capacity of each channel subscription before notifications are dropped.
    pub notification_buffer: usize,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            apply_mode: ApplyMode::Inline,
            cast_grace_ms: 2_000,
            instant_cast_timeout_ms: 10_000,
            tick_rate_hz: DEFAULT_TICK_RATE_HZ,
            notification_buffer: 1024,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl MirrorConfig {
    /// Layer defaults, an optional TOML file, then `REALM_SYNC_*` env vars.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let cfg: MirrorConfig = builder
            .add_source(config::Environment::with_prefix("REALM_SYNC").try_parsing(true))
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_TICK_RATE_HZ..=MAX_TICK_RATE_HZ).contains(&self.tick_rate_hz) {
            return Err(ConfigError::Invalid(format!(
                "tick_rate_hz must be within {MIN_TICK_RATE_HZ}..={MAX_TICK_RATE_HZ}, got {}",
                self.tick_rate_hz
            )));
        }
        if self.notification_buffer == 0 {
            return Err(ConfigError::Invalid(
                "notification_buffer must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn cast_grace(&self) -> Duration {
        Duration::from_millis(self.cast_grace_ms)
    }

    pub fn instant_cast_timeout(&self) -> Duration {
        Duration::from_millis(self.instant_cast_timeout_ms)
    }

    /// Out-of-range rates are clamped; NaN falls back to the default rate.
    pub fn tick_interval(&self) -> Duration {
        let hz = if self.tick_rate_hz.is_nan() {
            DEFAULT_TICK_RATE_HZ
        } else {
            self.tick_rate_hz.clamp(MIN_TICK_RATE_HZ, MAX_TICK_RATE_HZ)
        };
        Duration::from_secs_f32(1.0 / hz)
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MirrorStats {
    pub frames: u64,
    pub decoded: u64,
    pub decode_errors: u64,
    pub unknown_opcodes: u64,
    pub mutations_applied: u64,
    pub stale_mutations: u64,
    pub incompatible_mutations: u64,
    pub casts_expired: u64,
    pub subscriber_panics: u64,
    pub entities: usize,
}
