// ABOUTME: NTP-style probe scheduling and outstanding-probe bookkeeping
// ABOUTME: Component B: decides when to issue probes and feeds responses into the time filter

use std::collections::VecDeque;
use std::sync::Arc;

use crate::sync::filter::SharedTimeFilter;

/// Drives periodic time-probe exchanges into a [`SharedTimeFilter`].
///
/// Probes are keyed by their `t0` transmit timestamp, which also serves as
/// the opaque sequence number mentioned in §4.2 since probes are issued
/// monotonically increasing in local time.
pub struct ProbeDriver {
    filter: Arc<SharedTimeFilter>,
    outstanding: VecDeque<i64>,
    last_issued_local_us: Option<i64>,
    interval_unconverged_ms: u64,
    interval_converged_ms: u64,
    timeout_ms: u64,
}

impl ProbeDriver {
    pub fn new(
        filter: Arc<SharedTimeFilter>,
        interval_unconverged_ms: u64,
        interval_converged_ms: u64,
        timeout_ms: u64,
    ) -> Self {
        Self {
            filter,
            outstanding: VecDeque::new(),
            last_issued_local_us: None,
            interval_unconverged_ms,
            interval_converged_ms,
            timeout_ms,
        }
    }

    fn interval_ms(&self) -> u64 {
        if self.filter.has_converged() {
            self.interval_converged_ms
        } else {
            self.interval_unconverged_ms
        }
    }

    /// True when enough local time has elapsed since the last issued probe.
    pub fn is_due(&self, now_local_us: i64) -> bool {
        match self.last_issued_local_us {
            None => true,
            Some(last) => (now_local_us - last) >= self.interval_ms() as i64 * 1000,
        }
    }

    /// Records a newly issued probe; returns the `t0` value to embed in the
    /// outbound `time_probe` message.
    pub fn issue(&mut self, now_local_us: i64) -> i64 {
        self.outstanding.push_back(now_local_us);
        self.last_issued_local_us = Some(now_local_us);
        now_local_us
    }

    /// Applies a probe response. Returns `false` (and discards the response)
    /// when `t0` is unknown or the response arrived after `PROBE_TIMEOUT_MS`.
    pub fn on_response(&mut self, t0: i64, s1: i64, s2: i64, now_local_us: i64) -> bool {
        let Some(pos) = self.outstanding.iter().position(|&x| x == t0) else {
            return false;
        };

        let age_ms = (now_local_us - t0) / 1000;
        self.outstanding.remove(pos);

        if age_ms > self.timeout_ms as i64 {
            return false;
        }

        self.filter.on_server_time(t0, now_local_us, s1, s2);
        true
    }

    /// Drops outstanding probes that can no longer receive a timely response,
    /// so the pending set doesn't grow unbounded across reconnects.
    pub fn expire_stale(&mut self, now_local_us: i64) {
        let timeout_us = self.timeout_ms as i64 * 1000;
        self.outstanding
            .retain(|&t0| (now_local_us - t0) <= timeout_us);
    }

    pub fn outstanding_count(&self) -> usize {
        self.outstanding.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::filter::FilterParams;

    fn driver() -> ProbeDriver {
        let filter = Arc::new(SharedTimeFilter::new(FilterParams::default()));
        ProbeDriver::new(filter, 1000, 5000, 3000)
    }

    #[test]
    fn first_probe_is_always_due() {
        let d = driver();
        assert!(d.is_due(0));
    }

    #[test]
    fn respects_unconverged_interval() {
        let mut d = driver();
        let t0 = d.issue(0);
        assert_eq!(t0, 0);
        assert!(!d.is_due(500_000));
        assert!(d.is_due(1_000_000));
    }

    #[test]
    fn response_to_unknown_t0_is_rejected() {
        let mut d = driver();
        d.issue(0);
        assert!(!d.on_response(999, 10, 20, 100));
    }

    #[test]
    fn stale_response_is_discarded() {
        let mut d = driver();
        let t0 = d.issue(0);
        // arrives 3_000_001us later, past PROBE_TIMEOUT_MS=3000
        assert!(!d.on_response(t0, 10, 20, 3_000_001));
        assert_eq!(d.outstanding_count(), 0);
    }

    #[test]
    fn timely_response_updates_filter() {
        let mut d = driver();
        let t0 = d.issue(0);
        assert!(d.on_response(t0, 10_100, 10_150, 200));
        assert!(d.filter.is_ready() == false); // only one measurement so far
        assert_eq!(d.outstanding_count(), 0);
    }

    #[test]
    fn expire_stale_clears_old_outstanding_probes() {
        let mut d = driver();
        d.issue(0);
        d.expire_stale(10_000_000);
        assert_eq!(d.outstanding_count(), 0);
    }
}
