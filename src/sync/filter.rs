// ABOUTME: Two-dimensional Kalman filter over (offset, drift) estimated from NTP-style probes
// ABOUTME: Exposes client<->server timestamp conversion and a converged-ness gate for playout

use std::sync::Mutex;

/// Minimum accepted measurements before [`TimeFilter::has_converged`] can be true.
pub const MIN_CONVERGED: u32 = 12;
/// Estimated-error threshold (microseconds) below which the filter is considered converged.
pub const CONVERGED_ERROR_US: f64 = 5000.0;
/// Measurement count at which adaptive forgetting begins considering covariance inflation.
const ADAPTIVE_FORGET_THRESHOLD: u32 = 100;
/// Residual-to-error ratio above which a post-threshold measurement triggers forgetting.
const FORGET_RESIDUAL_RATIO: f64 = 0.75;

/// Offset/drift estimate with its 2x2 covariance, updated from NTP-style round-trip probes.
///
/// `cov` is stored as `[[p00, p01], [p10, p11]]`; the filter keeps it symmetric
/// by construction so `p01 == p10` always holds after an update.
#[derive(Debug, Clone)]
pub struct TimeFilterState {
    pub offset_us: f64,
    pub drift: f64,
    pub cov: [[f64; 2]; 2],
    pub count: u32,
    pub last_update: i64,
    /// Round trip of the most recent probe that fed this state, microseconds.
    pub round_trip_us: i64,
}

impl Default for TimeFilterState {
    fn default() -> Self {
        Self {
            offset_us: 0.0,
            drift: 0.0,
            cov: [[f64::INFINITY, 0.0], [0.0, 0.0]],
            count: 0,
            last_update: 0,
            round_trip_us: 0,
        }
    }
}

/// Tunable process-noise parameters. Defaults match the values observed to be
/// stable across the probe cadences in §4.2.
#[derive(Debug, Clone, Copy)]
pub struct FilterParams {
    pub process_std_dev: f64,
    pub forget_factor: f64,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            process_std_dev: 0.01,
            forget_factor: 1.001,
        }
    }
}

/// The clock-offset/drift estimator (component A).
///
/// Never suspends and never panics on bad input: negative errors and
/// reversed round trips are clamped to zero by [`TimeFilter::on_server_time`]
/// before they reach [`TimeFilter::update`].
#[derive(Debug)]
pub struct TimeFilter {
    state: TimeFilterState,
    params: FilterParams,
}

impl Default for TimeFilter {
    fn default() -> Self {
        Self::new(FilterParams::default())
    }
}

impl TimeFilter {
    pub fn new(params: FilterParams) -> Self {
        Self {
            state: TimeFilterState::default(),
            params,
        }
    }

    /// Applies one measurement. A no-op when `time_added_local_us` equals the
    /// last applied timestamp (idempotence guard required by the spec).
    pub fn update(&mut self, measurement_us: f64, max_error_us: f64, time_added_local_us: i64) {
        if self.state.count > 0 && time_added_local_us == self.state.last_update {
            return;
        }

        let max_error_us = max_error_us.max(0.0);

        match self.state.count {
            0 => {
                self.state.offset_us = measurement_us;
                self.state.cov[0][0] = max_error_us * max_error_us;
                self.state.cov[0][1] = 0.0;
                self.state.cov[1][0] = 0.0;
                self.state.drift = 0.0;
                self.state.count = 1;
                self.state.last_update = time_added_local_us;
            }
            1 => {
                let dt = (time_added_local_us - self.state.last_update) as f64;
                if dt > 0.0 {
                    self.state.drift = (measurement_us - self.state.offset_us) / dt;
                    let prev_var = self.state.cov[0][0];
                    self.state.cov[1][1] = (prev_var + max_error_us * max_error_us) / dt;
                }
                self.state.offset_us = measurement_us;
                self.state.cov[0][0] = max_error_us * max_error_us;
                self.state.count = 2;
                self.state.last_update = time_added_local_us;
            }
            _ => {
                self.steady_state_update(measurement_us, max_error_us, time_added_local_us);
            }
        }
    }

    fn steady_state_update(&mut self, measurement_us: f64, max_error_us: f64, time_added: i64) {
        let dt = (time_added - self.state.last_update) as f64;
        let p = self.state.cov;

        // Predict: F = [[1, dt], [0, 1]], process noise on offset only.
        let mut p00 = p[0][0] + 2.0 * dt * p[0][1] + dt * dt * p[1][1];
        let mut p01 = p[0][1] + dt * p[1][1];
        let mut p10 = p01;
        let mut p11 = p[1][1];
        p00 += dt * self.params.process_std_dev * self.params.process_std_dev;

        let predicted_offset = self.state.offset_us + self.state.drift * dt;
        let predicted_drift = self.state.drift;

        let residual = measurement_us - predicted_offset;

        if self.state.count >= ADAPTIVE_FORGET_THRESHOLD
            && residual.abs() > FORGET_RESIDUAL_RATIO * max_error_us
        {
            let f2 = self.params.forget_factor * self.params.forget_factor;
            p00 *= f2;
            p01 *= f2;
            p10 *= f2;
            p11 *= f2;
        }

        let r = max_error_us * max_error_us;
        let s = p00 + r;
        let (k0, k1) = if s > 0.0 { (p00 / s, p10 / s) } else { (0.0, 0.0) };

        self.state.offset_us = predicted_offset + k0 * residual;
        self.state.drift = predicted_drift + k1 * residual;

        let new_p00 = (1.0 - k0) * p00;
        let new_p01 = (1.0 - k0) * p01;
        let new_p10 = p10 - k1 * p00;
        let new_p11 = p11 - k1 * p01;

        self.state.cov = [[new_p00, new_p01], [new_p10, new_p11]];
        self.state.last_update = time_added;
        self.state.count = self.state.count.saturating_add(1);
    }

    /// Convenience wrapper computing an NTP-style measurement from four
    /// timestamps and applying it via [`TimeFilter::update`].
    ///
    /// `t0` = local-transmit, `s1` = server-receive, `s2` = server-transmit,
    /// `t3` = local-receive, all in microseconds.
    pub fn on_server_time(&mut self, t0: i64, t3: i64, s1: i64, s2: i64) {
        let rtt = (t3 - t0).max(0);
        let server_proc = (s2 - s1).max(0);
        let one_way = ((rtt - server_proc) / 2).max(0);

        let measurement = (s1 as f64 + server_proc as f64 / 2.0)
            - (t0 as f64 + rtt as f64 / 2.0);
        let max_error = (one_way as f64).max(100.0);

        self.state.round_trip_us = rtt;
        self.update(measurement, max_error, t3);
    }

    /// Converts a local-domain timestamp to the server domain, or `None`
    /// before the filter is ready (callers must handle absence; see `ClockUnready`).
    pub fn client_to_server(&self, t_local: i64) -> Option<i64> {
        if !self.is_ready() {
            return None;
        }
        let dt = (t_local - self.state.last_update) as f64;
        let converted = t_local as f64 + self.state.offset_us + self.state.drift * dt;
        Some(converted.round() as i64)
    }

    /// Converts a server-domain timestamp back to the local domain.
    pub fn server_to_client(&self, t_server: i64) -> Option<i64> {
        if !self.is_ready() {
            return None;
        }
        let denom = 1.0 + self.state.drift;
        if denom == 0.0 {
            return None;
        }
        let numerator = t_server as f64 - self.state.offset_us
            + self.state.drift * self.state.last_update as f64;
        Some((numerator / denom).round() as i64)
    }

    pub fn is_ready(&self) -> bool {
        self.state.count >= 2 && self.state.cov[0][0].is_finite()
    }

    pub fn has_converged(&self) -> bool {
        self.state.count >= MIN_CONVERGED && self.estimated_error_us() < CONVERGED_ERROR_US
    }

    pub fn estimated_error_us(&self) -> f64 {
        self.state.cov[0][0].max(0.0).sqrt()
    }

    pub fn estimated_offset_us(&self) -> f64 {
        self.state.offset_us
    }

    pub fn estimated_drift_ppm(&self) -> f64 {
        self.state.drift * 1_000_000.0
    }

    pub fn measurement_count(&self) -> u32 {
        self.state.count
    }

    pub fn last_update(&self) -> i64 {
        self.state.last_update
    }

    pub fn round_trip_us(&self) -> i64 {
        self.state.round_trip_us
    }

    pub fn snapshot(&self) -> TimeFilterState {
        self.state.clone()
    }
}

/// Thread-safe handle shared between the probe driver (writer) and the
/// playout scheduler (reader). Every operation is a bounded, non-suspending
/// lock/unlock; see §5's "no suspension on mutation" requirement.
#[derive(Debug, Default)]
pub struct SharedTimeFilter {
    inner: Mutex<TimeFilter>,
}

impl SharedTimeFilter {
    pub fn new(params: FilterParams) -> Self {
        Self {
            inner: Mutex::new(TimeFilter::new(params)),
        }
    }

    pub fn update(&self, measurement_us: f64, max_error_us: f64, time_added_local_us: i64) {
        self.inner
            .lock()
            .expect("time filter mutex poisoned")
            .update(measurement_us, max_error_us, time_added_local_us);
    }

    pub fn on_server_time(&self, t0: i64, t3: i64, s1: i64, s2: i64) {
        self.inner
            .lock()
            .expect("time filter mutex poisoned")
            .on_server_time(t0, t3, s1, s2);
    }

    pub fn client_to_server(&self, t_local: i64) -> Option<i64> {
        self.inner
            .lock()
            .expect("time filter mutex poisoned")
            .client_to_server(t_local)
    }

    pub fn server_to_client(&self, t_server: i64) -> Option<i64> {
        self.inner
            .lock()
            .expect("time filter mutex poisoned")
            .server_to_client(t_server)
    }

    pub fn is_ready(&self) -> bool {
        self.inner.lock().expect("time filter mutex poisoned").is_ready()
    }

    pub fn has_converged(&self) -> bool {
        self.inner
            .lock()
            .expect("time filter mutex poisoned")
            .has_converged()
    }

    pub fn snapshot(&self) -> TimeFilterState {
        self.inner.lock().expect("time filter mutex poisoned").snapshot()
    }

    pub fn estimated_offset_us(&self) -> f64 {
        self.inner
            .lock()
            .expect("time filter mutex poisoned")
            .estimated_offset_us()
    }

    pub fn estimated_drift_ppm(&self) -> f64 {
        self.inner
            .lock()
            .expect("time filter mutex poisoned")
            .estimated_drift_ppm()
    }

    pub fn estimated_error_us(&self) -> f64 {
        self.inner
            .lock()
            .expect("time filter mutex poisoned")
            .estimated_error_us()
    }

    pub fn measurement_count(&self) -> u32 {
        self.inner
            .lock()
            .expect("time filter mutex poisoned")
            .measurement_count()
    }

    pub fn round_trip_us(&self) -> i64 {
        self.inner
            .lock()
            .expect("time filter mutex poisoned")
            .round_trip_us()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_measurement_bootstraps_offset() {
        let mut f = TimeFilter::default();
        f.update(10_025.0, 100.0, 200);
        assert_eq!(f.estimated_offset_us(), 10_025.0);
        assert_eq!(f.measurement_count(), 1);
        assert!(!f.is_ready());
    }

    #[test]
    fn second_measurement_computes_drift_and_becomes_ready() {
        let mut f = TimeFilter::default();
        f.update(10_025.0, 100.0, 200);
        f.update(10_125.0, 100.0, 1_000_200);
        assert_eq!(f.measurement_count(), 2);
        assert!(f.is_ready());
        assert!(f.estimated_drift_ppm() > 0.0);
    }

    #[test]
    fn scenario_s1_first_two_probes_bootstrap() {
        // S1: t0=0, t3=200, s1=10100, s2=10150 -> offset ~= 10025us, drift = 0
        let mut f = TimeFilter::default();
        f.on_server_time(0, 200, 10_100, 10_150);
        assert!((f.estimated_offset_us() - 10_025.0).abs() < 1.0);
        assert_eq!(f.estimated_drift_ppm(), 0.0);

        // Second probe: t0=1_000_000, t3=1_000_240, s1=11_100_120, s2=11_100_170
        f.on_server_time(1_000_000, 1_000_240, 11_100_120, 11_100_170);
        // rtt = 240, server_proc = 50, one_way = 95, max_error = max(95,100) = 100
        // measurement = (11_100_120 + 25) - (1_000_000 + 120) = 10_100_025
        assert!((f.estimated_offset_us() - 10_100_025.0).abs() < 1.0);
        assert!(f.estimated_drift_ppm() > 0.0);
    }

    #[test]
    fn identical_repeated_update_is_idempotent() {
        let mut a = TimeFilter::default();
        a.update(10_000.0, 100.0, 500);
        a.update(10_000.0, 100.0, 500);

        let mut b = TimeFilter::default();
        b.update(10_000.0, 100.0, 500);

        assert_eq!(a.estimated_offset_us(), b.estimated_offset_us());
        assert_eq!(a.measurement_count(), b.measurement_count());
    }

    #[test]
    fn scenario_s2_converges_after_twelve_probes() {
        let mut f = TimeFilter::default();
        let true_offset = 10_000.0;
        // Deterministic pseudo-noise instead of an RNG dependency: a small
        // bounded oscillation standing in for "noise ~= +-50us" from the spec.
        let noises = [
            -40.0, 35.0, -20.0, 15.0, -45.0, 30.0, -10.0, 5.0, -25.0, 20.0, -5.0, 10.0,
        ];
        let rtts = [
            120, 180, 220, 150, 290, 100, 260, 175, 205, 135, 300, 160,
        ];

        let mut t0 = 0i64;
        for (i, (&noise, &rtt)) in noises.iter().zip(rtts.iter()).enumerate() {
            let one_way = rtt / 2;
            let s1 = t0 + one_way + (true_offset + noise) as i64;
            let s2 = s1 + 5;
            let t3 = t0 + rtt;
            f.on_server_time(t0, t3, s1, s2);
            if i == 11 {
                assert!(f.has_converged(), "expected convergence by 12th update");
            }
            t0 += 1_000_000;
        }

        assert!((f.estimated_offset_us() - true_offset).abs() <= 1000.0);
    }

    #[test]
    fn client_to_server_round_trip_within_tolerance() {
        let mut f = TimeFilter::default();
        f.on_server_time(0, 200, 10_100, 10_150);
        f.on_server_time(1_000_000, 1_000_240, 11_100_120, 11_100_170);

        let t_local = 2_000_000;
        let t_server = f.client_to_server(t_local).unwrap();
        let back = f.server_to_client(t_server).unwrap();
        assert!((back - t_local).abs() <= 2);
    }

    #[test]
    fn unready_conversions_return_none() {
        let f = TimeFilter::default();
        assert_eq!(f.client_to_server(1000), None);
        assert_eq!(f.server_to_client(1000), None);
    }

    #[test]
    fn on_server_time_clamps_negative_round_trip() {
        let mut f = TimeFilter::default();
        // t3 < t0 would normally make rtt negative; must clamp to 0.
        f.on_server_time(1000, 500, 200, 300);
        assert_eq!(f.measurement_count(), 1);
    }
}
