// ABOUTME: Runtime configuration for the Sendspin client core
// ABOUTME: Defaults mirror the protocol's interoperability defaults (client_id, playout_offset_ms, ...)

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Exponential reconnection backoff schedule, in seconds, with a hard cap.
pub const RECONNECT_BACKOFF_SECS: [u64; 6] = [1, 2, 4, 8, 16, 30];

/// Tuning knobs for the client runtime.
///
/// All fields have defaults matching the interoperability defaults fixed by
/// the protocol; callers typically only override `client_name` and
/// `playout_offset_ms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Identifier sent in `hello`. Stable across reconnects for a given device.
    pub client_id: String,
    /// Human-readable name sent in `hello`.
    pub client_name: String,
    /// Signed playout delay in milliseconds, applied to both buffer insertion
    /// and release decisions. Negative catches up, positive delays.
    pub playout_offset_ms: i64,
    /// Upper bound on the number of frames the jitter buffer may hold.
    pub max_queued: usize,
    /// Probe cadence while the time filter has not converged.
    pub probe_interval_unconverged_ms: u64,
    /// Probe cadence once the time filter has converged.
    pub probe_interval_converged_ms: u64,
    /// A probe response older than this is discarded.
    pub probe_timeout_ms: u64,
    /// Playout scheduler tick cadence.
    pub tick_ms: u64,
    /// Channel-open timeout.
    pub connect_timeout_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            client_id: "android-player-1".to_string(),
            client_name: "Android Player".to_string(),
            playout_offset_ms: -300,
            max_queued: 2000 / 5, // enough slots for max_buffer_ahead_ms at ~5ms frames
            probe_interval_unconverged_ms: 1000,
            probe_interval_converged_ms: 5000,
            probe_timeout_ms: 3000,
            tick_ms: 5,
            connect_timeout_ms: 10_000,
        }
    }
}

impl RuntimeConfig {
    /// Validates field ranges, returning a descriptive [`Error::Config`] on violation.
    pub fn validate(&self) -> Result<()> {
        if !(-1000..=1000).contains(&self.playout_offset_ms) {
            return Err(Error::Config(format!(
                "playout_offset_ms must be in [-1000, 1000], got {}",
                self.playout_offset_ms
            )));
        }
        if self.max_queued == 0 {
            return Err(Error::Config("max_queued must be >= 1".to_string()));
        }
        if self.tick_ms == 0 {
            return Err(Error::Config("tick_ms must be >= 1".to_string()));
        }
        if self.client_id.is_empty() {
            return Err(Error::Config("client_id must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(RuntimeConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_offset() {
        let mut cfg = RuntimeConfig::default();
        cfg.playout_offset_ms = 5000;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_empty_client_id() {
        let mut cfg = RuntimeConfig::default();
        cfg.client_id.clear();
        assert!(cfg.validate().is_err());
    }
}
