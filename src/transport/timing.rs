//! RTT estimation.
//!
//! Smoothed round-trip time and variance after RFC 6298, with the smoothed
//! estimate updated before the variance.

use std::time::Duration;

use crate::core::constants::{INITIAL_RTO, MAX_RTO, MIN_RTO};

/// Estimator gains.
pub mod constants {
    /// Alpha for SRTT smoothing (0.125 = 1/8).
    pub const SRTT_ALPHA: f64 = 0.125;

    /// Beta for RTTVAR smoothing (0.25 = 1/4).
    pub const RTTVAR_BETA: f64 = 0.25;

    /// K multiplier for RTO calculation.
    pub const RTO_K: f64 = 4.0;
}

/// Per-connection RTT estimator.
///
/// Maintains smoothed RTT (SRTT) and RTT variance (RTTVAR) and derives the
/// retransmission timeout from them.
#[derive(Debug, Clone)]
pub struct RttEstimator {
    /// Smoothed RTT in milliseconds.
    srtt: f64,
    /// RTT variance in milliseconds.
    rttvar: f64,
    /// Current retransmission timeout.
    rto: Duration,
    /// Whether we've received the first RTT sample.
    initialized: bool,
    min_rto: Duration,
    max_rto: Duration,
}

impl Default for RttEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl RttEstimator {
    /// Create an estimator with the default bounds.
    pub fn new() -> Self {
        Self::with_bounds(INITIAL_RTO, MIN_RTO, MAX_RTO)
    }

    /// Create an estimator with a custom initial timeout and clamp range.
    pub fn with_bounds(initial: Duration, min_rto: Duration, max_rto: Duration) -> Self {
        Self {
            srtt: 0.0,
            rttvar: 0.0,
            rto: initial,
            initialized: false,
            min_rto,
            max_rto,
        }
    }

    /// Update the estimate with a new sample.
    ///
    /// - First measurement: SRTT = R, RTTVAR = R / 2
    /// - Subsequent: SRTT = 0.875 * SRTT + 0.125 * R, then
    ///   RTTVAR = 0.75 * RTTVAR + 0.25 * |R - SRTT|
    ///
    /// RTO = SRTT + 4 * RTTVAR, clamped to the configured range.
    pub fn update(&mut self, sample: Duration) {
        let sample_ms = sample.as_secs_f64() * 1000.0;

        if !self.initialized {
            self.srtt = sample_ms;
            self.rttvar = sample_ms / 2.0;
            self.initialized = true;
        } else {
            self.srtt =
                (1.0 - constants::SRTT_ALPHA) * self.srtt + constants::SRTT_ALPHA * sample_ms;
            self.rttvar = (1.0 - constants::RTTVAR_BETA) * self.rttvar
                + constants::RTTVAR_BETA * (sample_ms - self.srtt).abs();
        }

        let rto_ms = self.srtt + constants::RTO_K * self.rttvar;
        let rto = Duration::from_micros((rto_ms * 1000.0).round() as u64);
        self.rto = rto.clamp(self.min_rto, self.max_rto);
    }

    /// Get the current smoothed RTT.
    pub fn srtt(&self) -> Duration {
        Duration::from_secs_f64(self.srtt / 1000.0)
    }

    /// Get the current smoothed RTT in milliseconds.
    pub fn srtt_ms(&self) -> f64 {
        self.srtt
    }

    /// Get the current RTT variance in milliseconds.
    pub fn rttvar_ms(&self) -> f64 {
        self.rttvar
    }

    /// Get the current retransmission timeout.
    pub fn rto(&self) -> Duration {
        self.rto
    }

    /// Check if the estimator has been initialized with at least one sample.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rtt_estimator_initial() {
        let estimator = RttEstimator::new();
        assert!(!estimator.is_initialized());
        assert_eq!(estimator.rto(), INITIAL_RTO);
    }

    #[test]
    fn test_rtt_estimator_first_sample() {
        let mut estimator = RttEstimator::new();
        estimator.update(Duration::from_millis(100));

        assert!(estimator.is_initialized());
        assert!((estimator.srtt_ms() - 100.0).abs() < 0.01);
        assert!((estimator.rttvar_ms() - 50.0).abs() < 0.01);
        assert_eq!(estimator.rto(), Duration::from_millis(300));
    }

    #[test]
    fn test_rtt_estimator_srtt_updated_before_rttvar() {
        let mut estimator = RttEstimator::new();
        estimator.update(Duration::from_millis(100));
        estimator.update(Duration::from_millis(200));

        // SRTT = 87.5 + 25 = 112.5, RTTVAR = 37.5 + 0.25 * |200 - 112.5|
        assert!((estimator.srtt_ms() - 112.5).abs() < 1e-9);
        assert!((estimator.rttvar_ms() - 59.375).abs() < 1e-9);
        assert_eq!(estimator.rto(), Duration::from_millis(350));
    }

    #[test]
    fn test_rtt_estimator_converges() {
        let mut estimator = RttEstimator::new();
        for _ in 0..200 {
            estimator.update(Duration::from_millis(40));
        }
        assert!((estimator.srtt_ms() - 40.0).abs() < 0.01);
        assert!(estimator.rto() < Duration::from_millis(41));
    }

    #[test]
    fn test_rtt_estimator_min_rto() {
        let mut estimator = RttEstimator::new();
        estimator.update(Duration::from_micros(100));
        assert_eq!(estimator.rto(), MIN_RTO);
    }

    #[test]
    fn test_rtt_estimator_max_rto() {
        let mut estimator = RttEstimator::new();
        estimator.update(Duration::from_secs(50));
        assert_eq!(estimator.rto(), MAX_RTO);
    }

    #[test]
    fn test_rtt_estimator_custom_bounds() {
        let mut estimator = RttEstimator::with_bounds(
            Duration::from_millis(200),
            Duration::from_millis(500),
            Duration::from_secs(2),
        );
        assert_eq!(estimator.rto(), Duration::from_millis(200));

        estimator.update(Duration::from_millis(10));
        assert_eq!(estimator.rto(), Duration::from_millis(500));
    }
}
