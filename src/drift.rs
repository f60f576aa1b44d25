//! Drift manager (spec.md §4.9): chooses between the pattern seed and the
//! phrase seed for each step's stochastic decisions, based on per-step
//! stability and DRIFT.

use crate::metric::stability;

pub const K_ANCHOR: f32 = 0.7;
pub const K_SHIMMER: f32 = 1.3;

fn drift_eff(drift: f32, k: f32) -> f32 {
    (drift * k).clamp(0.0, 1.0)
}

/// Picks the seed that a given step's stochastic decisions should use for
/// a given voice coefficient `k` (`K_ANCHOR` or `K_SHIMMER`).
pub fn seed_for_step(
    step: u16,
    pattern_length: u16,
    drift: f32,
    k: f32,
    pattern_seed: u32,
    phrase_seed: u32,
) -> u32 {
    let sigma = stability(step, pattern_length);
    if sigma > drift_eff(drift, k) {
        pattern_seed
    } else {
        phrase_seed
    }
}
