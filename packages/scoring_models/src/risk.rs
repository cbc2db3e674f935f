//! The canonical piecewise-linear risk function and its supporting
//! tables (§4.1).
//!
//! Both the snapshot service and the route scorer call [`risk`] and
//! [`safety_score`] directly rather than reimplementing the curve —
//! sharing one function here is the contract, not an implementation
//! detail.

use crate::RiskClass;

/// Recency weight table indexed by integer months-ago `k`, decaying from
/// `1.00` at `k=0` to a floor of `0.30` for `k > 12`.
const RECENCY_WEIGHTS: [f64; 13] = [
    1.00, 0.95, 0.90, 0.85, 0.75, 0.70, 0.65, 0.60, 0.55, 0.50, 0.45, 0.40, 0.35,
];
const RECENCY_FLOOR: f64 = 0.30;

/// Looks up the recency multiplier for `months_ago`. Values beyond the
/// table (`> 12`) saturate at [`RECENCY_FLOOR`].
#[must_use]
pub fn recency_weight(months_ago: u32) -> f64 {
    RECENCY_WEIGHTS
        .get(months_ago as usize)
        .copied()
        .unwrap_or(RECENCY_FLOOR)
}

/// The piecewise-linear risk function `R(w) -> [0, 1]` over thresholds
/// `(5, 20, 50, 100, 200)`.
#[must_use]
pub fn risk(w: f64) -> f64 {
    if w <= 0.0 {
        return 0.0;
    }
    let r = if w < 5.0 {
        0.2 * w / 5.0
    } else if w < 20.0 {
        0.2 + 0.2 * (w - 5.0) / 15.0
    } else if w < 50.0 {
        0.4 + 0.2 * (w - 20.0) / 30.0
    } else if w < 100.0 {
        0.6 + 0.2 * (w - 50.0) / 50.0
    } else if w < 200.0 {
        0.8 + 0.15 * (w - 100.0) / 100.0
    } else {
        0.95 + 0.05 * (w - 200.0).min(200.0) / 200.0
    };
    r.min(1.0)
}

/// `safety_score = round((1 - R(w)) * 100, 1)`.
#[must_use]
pub fn safety_score(w: f64) -> f64 {
    round_to(( 1.0 - risk(w)) * 100.0, 1)
}

/// Convenience wrapper over [`RiskClass::from_safety_score`] so call
/// sites that only have `w` don't need to round the safety score
/// themselves first.
#[must_use]
pub fn risk_class(w: f64) -> RiskClass {
    RiskClass::from_safety_score(safety_score(w))
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_weight_is_zero_risk() {
        assert!((risk(0.0) - 0.0).abs() < 1e-9);
        assert!((safety_score(0.0) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn boundary_thresholds() {
        assert!((risk(5.0) - 0.2).abs() < 1e-9);
        assert!((risk(200.0) - 0.95).abs() < 1e-9);
        assert!((risk(400.0) - 1.0).abs() < 1e-9);
        assert!((risk(1000.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn scenario_single_cell_single_event() {
        // §8 scenario 1: w = 3.0 * 1.00 = 3.0
        let w = 3.0;
        assert!((risk(w) - 0.12).abs() < 1e-3);
        assert!((safety_score(w) - 88.0).abs() < 0.1);
    }

    #[test]
    fn scenario_night_filter() {
        // §8 scenario 2: w = 3.0 * 2.5 = 7.5
        let w = 7.5;
        assert!((risk(w) - 0.2333).abs() < 1e-3);
        assert!((safety_score(w) - 76.7).abs() < 0.1);
    }

    #[test]
    fn scenario_recency_decay() {
        // §8 scenario 3: w = 3.0 * recency_weight(12) = 3.0 * 0.35 = 1.05
        let w = 3.0 * recency_weight(12);
        assert!((w - 1.05).abs() < 1e-9);
        assert!((risk(w) - 0.042).abs() < 1e-3);
        assert!((safety_score(w) - 95.8).abs() < 0.1);
    }

    #[test]
    fn scenario_hexagon_route_parity() {
        // §8 scenario 4: w_group = 109.45 -> safety ~ 18.6
        let w = 109.45;
        assert!((safety_score(w) - 18.6).abs() < 0.1);
    }

    #[test]
    fn scenario_averaging_effect() {
        // §8 scenario 5: mean w = (100 + 50 + 42) / 20 = 9.6 -> safety 73.9
        let w = (100.0 + 10.0 * 5.0 + 3.0 * 14.0) / 20.0;
        assert!((w - 9.6).abs() < 1e-9);
        assert!((safety_score(w) - 73.9).abs() < 0.1);
    }

    #[test]
    fn recency_weight_saturates_beyond_table() {
        assert!((recency_weight(0) - 1.00).abs() < 1e-9);
        assert!((recency_weight(12) - 0.35).abs() < 1e-9);
        assert!((recency_weight(13) - RECENCY_FLOOR).abs() < 1e-9);
        assert!((recency_weight(200) - RECENCY_FLOOR).abs() < 1e-9);
    }

    #[test]
    fn risk_is_monotonic_in_w() {
        let samples = [0.0, 1.0, 4.9, 5.0, 19.9, 20.0, 49.9, 50.0, 99.9, 100.0, 199.9, 200.0, 400.0];
        for pair in samples.windows(2) {
            assert!(risk(pair[0]) <= risk(pair[1]) + 1e-12);
        }
    }
}
