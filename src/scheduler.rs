// ABOUTME: Playout scheduler (component E): releases jitter-buffered frames on a tick
// ABOUTME: Holds output while the time filter has not converged so offset jumps stay inaudible

use std::sync::Arc;

use crate::audio::output::AudioOutput;
use crate::jitter::JitterBuffer;
use crate::model::BufferStats;
use crate::sync::SharedTimeFilter;

/// Nominal tick period (§5): 5ms, tolerant of OS jitter.
pub const TICK_MS: u64 = 5;

/// Drives D → sink on a periodic tick (§4.5).
///
/// Owns neither the clock nor the buffer: both are shared with the network
/// context so the scheduler can be ticked from the audio callback or a
/// plain timer, whichever is finer, without taking the network lock.
pub struct PlayoutScheduler {
    clock: Arc<SharedTimeFilter>,
    playout_offset_ms: i64,
    late_drops_released: u64,
}

/// Result of one [`PlayoutScheduler::tick`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub released: usize,
    pub late_dropped: usize,
    pub held_for_convergence: bool,
}

impl PlayoutScheduler {
    pub fn new(clock: Arc<SharedTimeFilter>, playout_offset_ms: i64) -> Self {
        Self {
            clock,
            playout_offset_ms,
            late_drops_released: 0,
        }
    }

    pub fn set_playout_offset_ms(&mut self, playout_offset_ms: i64) {
        self.playout_offset_ms = playout_offset_ms.clamp(-1000, 1000);
    }

    pub fn playout_offset_ms(&self) -> i64 {
        self.playout_offset_ms
    }

    /// Runs one release pass against `now_local_us`. Does nothing but report
    /// `held_for_convergence` while the clock has not converged (§4.5
    /// pre-convergence gate): the sink is paused and the buffer keeps filling.
    pub fn tick(
        &mut self,
        buffer: &mut JitterBuffer,
        sink: &mut dyn AudioOutput,
        now_local_us: i64,
    ) -> TickOutcome {
        if !self.clock.has_converged() {
            sink.pause();
            return TickOutcome {
                held_for_convergence: true,
                ..Default::default()
            };
        }

        let Some(server_now) = self.clock.client_to_server(now_local_us) else {
            sink.pause();
            return TickOutcome {
                held_for_convergence: true,
                ..Default::default()
            };
        };

        let target = server_now + self.playout_offset_ms * 1000;
        let mut outcome = TickOutcome::default();

        while let Some(frame) = buffer.peek_front() {
            if frame.presentation_ts_server_us > target {
                break;
            }
            let frame = buffer.pop_front().expect("peeked frame must be present");

            if frame.end_ts_server_us() < server_now {
                self.late_drops_released += 1;
                outcome.late_dropped += 1;
                continue;
            }

            if let Err(e) = sink.write(&frame.pcm) {
                log::warn!("audio sink write failed: {e}");
            }
            outcome.released += 1;
        }

        outcome
    }

    /// Total late drops discovered at release time (distinct from the jitter
    /// buffer's own insert-time `late_drops`; both counters feed
    /// [`BufferStats::late_drops`] via the session state machine).
    pub fn late_drops_released(&self) -> u64 {
        self.late_drops_released
    }

    /// Assembles buffer/clock telemetry for the observable store (I).
    pub fn stats(&self, buffer: &JitterBuffer, now_local_us: i64) -> BufferStats {
        let server_now = self.clock.client_to_server(now_local_us).unwrap_or(now_local_us);
        let snapshot = self.clock.snapshot();
        BufferStats {
            queued_chunks: buffer.len(),
            buffer_ahead_ms: buffer.buffer_ahead_ms(server_now),
            late_drops: buffer.late_drops() + self.late_drops_released,
            clock_offset_us: snapshot.offset_us,
            clock_drift_ppm: snapshot.drift * 1_000_000.0,
            round_trip_us: snapshot.round_trip_us,
            clock_converged: self.clock.has_converged(),
            clock_measurements: snapshot.count,
            clock_error_us: self.clock.estimated_error_us(),
        }
    }
}
