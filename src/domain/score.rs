//! Pure score arithmetic: exponential time decay, the anti-collusion
//! weight, and the EMA blend.
//!
//! Everything here is side-effect free and computed in f64. Rounding to two
//! decimals happens once, at the persistence boundary, never between stages.

use crate::domain::transaction::Rating;

/// Score that agents decay towards and start from.
pub const BASELINE: f64 = 50.0;

/// Parameters for the reputation computation.
///
/// The defaults mirror the production constants; only the half-life is
/// expected to be overridden in practice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreParams {
    pub baseline: f64,
    /// Days after which a score's deviation from baseline halves.
    pub half_life_days: f64,
    /// EMA learning rate: influence of a single new rating.
    pub alpha: f64,
    /// Sellers at or below this transaction count are never penalized.
    pub grace_tx_count: u64,
    /// Partner concentration above this ratio starts the penalty.
    pub max_partner_ratio: f64,
    /// A rating is discounted, never fully discarded.
    pub min_weight: f64,
}

impl Default for ScoreParams {
    fn default() -> Self {
        Self {
            baseline: BASELINE,
            half_life_days: 30.0,
            alpha: 0.1,
            grace_tx_count: 10,
            max_partner_ratio: 0.20,
            min_weight: 0.1,
        }
    }
}

/// Multiplicative attenuation of the deviation from baseline after
/// `elapsed_days`. Negative elapsed time (clock skew) is treated as zero.
pub fn decay_factor(elapsed_days: f64, half_life_days: f64) -> f64 {
    let elapsed = elapsed_days.max(0.0);
    (-std::f64::consts::LN_2 / half_life_days * elapsed).exp()
}

/// Decays `prior` towards the baseline.
///
/// At `elapsed_days = 0` the prior is returned untouched, so repeated
/// zero-elapsed updates cannot accumulate float error.
pub fn decayed_score(prior: f64, elapsed_days: f64, params: &ScoreParams) -> f64 {
    if elapsed_days <= 0.0 {
        return prior;
    }
    params.baseline + (prior - params.baseline) * decay_factor(elapsed_days, params.half_life_days)
}

/// Discount applied to a rating based on how concentrated the seller's
/// history is on this one buyer.
///
/// `pair_count` is the number of *prior* transactions between the exact
/// buyer/seller pair; `total_seller_tx` includes the current transaction.
pub fn collusion_weight(pair_count: u64, total_seller_tx: u64, params: &ScoreParams) -> f64 {
    if total_seller_tx == 0 || total_seller_tx <= params.grace_tx_count {
        return 1.0;
    }
    let partner_ratio = pair_count as f64 / total_seller_tx as f64;
    if partner_ratio > params.max_partner_ratio {
        (1.0 - (partner_ratio - params.max_partner_ratio) * 2.0).max(params.min_weight)
    } else {
        1.0
    }
}

/// Folds the decayed prior and the weighted new rating into the next score.
pub fn blend(decayed: f64, rating: Rating, weight: f64, params: &ScoreParams) -> f64 {
    decayed * (1.0 - params.alpha) + rating.normalized() * weight * params.alpha
}

/// Rounds to two decimal places. Used only when persisting.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ScoreParams {
        ScoreParams::default()
    }

    #[test]
    fn test_zero_elapsed_is_identity() {
        for prior in [0.0, 0.1, 37.91, 50.0, 99.99, 100.0] {
            assert_eq!(decayed_score(prior, 0.0, &params()), prior);
        }
    }

    #[test]
    fn test_negative_elapsed_clamped() {
        // Clock skew must not inflate the score.
        assert_eq!(decayed_score(80.0, -5.0, &params()), 80.0);
        assert_eq!(decay_factor(-5.0, 30.0), 1.0);
    }

    #[test]
    fn test_one_half_life_halves_deviation() {
        // Scenario C: prior 90, 30 days at 30-day half-life => 70.
        let decayed = decayed_score(90.0, 30.0, &params());
        assert!((decayed - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_long_elapsed_converges_to_baseline() {
        for prior in [0.0, 100.0, 82.5] {
            let decayed = decayed_score(prior, 365.0 * 50.0, &params());
            assert!((decayed - BASELINE).abs() < 1e-6);
        }
    }

    #[test]
    fn test_grace_period_never_penalizes() {
        // Even 100% partner concentration is forgiven below the threshold.
        for total in 1..=10 {
            assert_eq!(collusion_weight(total, total, &params()), 1.0);
        }
    }

    #[test]
    fn test_weight_below_ratio_threshold() {
        // 4 of 20 = 20%, right at the threshold: no penalty.
        assert_eq!(collusion_weight(4, 20, &params()), 1.0);
        assert_eq!(collusion_weight(0, 50, &params()), 1.0);
    }

    #[test]
    fn test_weight_linear_penalty() {
        // 8 of 20 = 40%: weight = 1 - (0.4 - 0.2) * 2 = 0.6
        let w = collusion_weight(8, 20, &params());
        assert!((w - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_weight_floor() {
        // Scenario B concentration: 15 of 21 => ratio 0.714..., floored at 0.1.
        let w = collusion_weight(15, 21, &params());
        assert_eq!(w, 0.1);
        // Total self-dealing as well.
        assert_eq!(collusion_weight(100, 100, &params()), 0.1);
    }

    #[test]
    fn test_weight_bounds() {
        for pair in [0, 1, 5, 11, 20, 47, 100] {
            for total in [11, 12, 25, 100, 101] {
                let w = collusion_weight(pair.min(total), total, &params());
                assert!((0.1..=1.0).contains(&w), "weight {w} out of bounds");
            }
        }
    }

    #[test]
    fn test_blend_scenario_a() {
        // Fresh seller, rating 5, full weight: 50*0.9 + 100*0.1 = 55.
        let rating = Rating::new(5).unwrap();
        let score = blend(50.0, rating, 1.0, &params());
        assert!((score - 55.0).abs() < 1e-9);
    }

    #[test]
    fn test_blend_scenario_b() {
        // Decayed 70, rating 3, weight 0.1: 70*0.9 + 60*0.1*0.1 = 63.6.
        let rating = Rating::new(3).unwrap();
        let score = blend(70.0, rating, 0.1, &params());
        assert!((score - 63.6).abs() < 1e-9);
    }

    #[test]
    fn test_blend_stays_in_domain() {
        let p = params();
        for decayed in [0.0, 20.0, 50.0, 77.7, 100.0] {
            for stars in 1..=5u8 {
                for weight in [0.1, 0.5, 1.0] {
                    let score = blend(decayed, Rating::new(stars).unwrap(), weight, &p);
                    assert!(
                        (0.0..=100.0).contains(&score),
                        "score {score} escaped [0,100]"
                    );
                }
            }
        }
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(63.599_999_999), 63.6);
        assert_eq!(round2(0.123), 0.12);
        assert_eq!(round2(99.999), 100.0);
        assert_eq!(round2(50.0), 50.0);
    }
}
