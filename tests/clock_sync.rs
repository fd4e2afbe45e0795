use std::sync::Arc;

use sendspin::sync::{ProbeDriver, SharedTimeFilter};

#[test]
fn probe_driver_feeds_shared_filter_to_convergence() {
    let filter = Arc::new(SharedTimeFilter::default());
    let mut driver = ProbeDriver::new(filter.clone(), 1000, 5000, 3000);

    let mut now = 0i64;
    for _ in 0..12 {
        assert!(driver.is_due(now));
        let t0 = driver.issue(now);
        let s1 = t0 + 50 + 10_000;
        let s2 = s1 + 5;
        let t3 = now + 100;
        assert!(driver.on_response(t0, s1, s2, t3));
        now += 1_000_000;
    }

    assert!(filter.has_converged());
    assert!((filter.estimated_offset_us() - 10_000.0).abs() < 1000.0);
}

#[test]
fn stale_probe_response_does_not_reach_the_filter() {
    let filter = Arc::new(SharedTimeFilter::default());
    let mut driver = ProbeDriver::new(filter.clone(), 1000, 5000, 3000);

    let t0 = driver.issue(0);
    // Arrives after PROBE_TIMEOUT_MS = 3000ms.
    assert!(!driver.on_response(t0, 10_000, 10_050, 3_000_500));
    assert_eq!(filter.measurement_count(), 0);
}

#[test]
fn client_to_server_conversion_is_unavailable_before_ready() {
    let filter = SharedTimeFilter::default();
    assert_eq!(filter.client_to_server(0), None);
    assert!(!filter.is_ready());
}
