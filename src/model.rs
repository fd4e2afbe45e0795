// ABOUTME: Shared domain data model (§3): descriptors, metadata, and observable snapshots
// ABOUTME: These types are produced by the session state machine (F) and consumed by I's observers

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Playback transport state as reported by the active stream descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
    Stopped,
}

/// Negotiated stream format and transport state (component F → I).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub codec: String,
    pub sample_rate_hz: u32,
    pub channels: u8,
    pub bit_depth: u8,
    pub playback_state: PlaybackState,
    pub group_name: String,
}

impl Default for StreamDescriptor {
    fn default() -> Self {
        Self {
            codec: String::new(),
            sample_rate_hz: 0,
            channels: 0,
            bit_depth: 0,
            playback_state: PlaybackState::Idle,
            group_name: String::new(),
        }
    }
}

/// Repeat mode reported in `metadata`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    Off,
    One,
    All,
}

/// Track playback position/duration/speed as of `timestamp_server_us`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackProgress {
    pub position_ms: i64,
    pub duration_ms: i64,
    /// 1000 = 1.0x; 0 means paused (position holds constant).
    pub speed_milli: i64,
}

impl TrackProgress {
    /// Extrapolates the live position at `server_now_us`, clamped to
    /// `[0, duration_ms]` when `duration_ms > 0` (§4.6).
    pub fn extrapolate(&self, timestamp_server_us: i64, server_now_us: i64) -> i64 {
        if self.speed_milli == 0 {
            return self.position_ms;
        }

        let elapsed_ms = (server_now_us - timestamp_server_us) as f64 / 1000.0;
        let extrapolated =
            self.position_ms as f64 + elapsed_ms * (self.speed_milli as f64 / 1000.0);

        if self.duration_ms > 0 {
            extrapolated.clamp(0.0, self.duration_ms as f64).round() as i64
        } else {
            extrapolated.max(0.0).round() as i64
        }
    }
}

/// Track metadata pushed by the server (component F → I).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub year: Option<u32>,
    pub track_number: Option<String>,
    pub artwork_url: Option<String>,
    #[serde(skip)]
    pub artwork_bytes: Option<Arc<[u8]>>,
    pub progress: Option<TrackProgress>,
    #[serde(default)]
    pub repeat_mode: Option<RepeatMode>,
    #[serde(default)]
    pub shuffle_enabled: bool,
    /// Server-domain time at which `progress.position_ms` was sampled.
    pub timestamp_server_us: i64,
}

impl Metadata {
    /// Live position extrapolated from `self.progress` at `server_now_us`,
    /// or `None` if no progress has been reported.
    pub fn extrapolated_position_ms(&self, server_now_us: i64) -> Option<i64> {
        self.progress
            .map(|p| p.extrapolate(self.timestamp_server_us, server_now_us))
    }
}

/// Controller-facing volume/mute/capability state (component F → I).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ControllerState {
    pub volume_0_100: u8,
    pub muted: bool,
    pub supported_commands: Vec<String>,
}

/// Connection lifecycle state of the session state machine (F).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// A discovered or recently-used server endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub address: String,
    pub path: String,
}

impl ServerInfo {
    pub fn url(&self, secure: bool) -> String {
        let scheme = if secure { "wss" } else { "ws" };
        format!("{scheme}://{}{}", self.address, self.path)
    }
}

/// Jitter-buffer and clock-sync telemetry exposed to observers.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BufferStats {
    pub queued_chunks: usize,
    pub buffer_ahead_ms: i64,
    pub late_drops: u64,
    pub clock_offset_us: f64,
    pub clock_drift_ppm: f64,
    pub round_trip_us: i64,
    pub clock_converged: bool,
    pub clock_measurements: u32,
    pub clock_error_us: f64,
}
