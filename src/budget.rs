//! Hit-budget computer (spec.md §4.5): maps ENERGY/BALANCE/SHAPE and the
//! post-bias weight vector to integer per-voice hit counts and the shared
//! eligibility mask.

use crate::types::{BarBudget, StepMask, WeightVec, Zone};

fn round_half_away_from_zero(v: f32) -> i32 {
    if v >= 0.0 {
        (v + 0.5) as i32
    } else {
        (v - 0.5) as i32
    }
}

/// Computes the eligibility mask: steps whose weight clears the
/// zone-dependent floor (spec.md §4.5 — higher energy admits finer
/// subdivisions).
pub fn eligibility_mask(weights: &WeightVec, zone: Zone) -> StepMask {
    let floor = zone.eligibility_floor();
    let mut mask = StepMask::EMPTY;
    for (i, &w) in weights.iter().enumerate() {
        if w > floor {
            mask.set(i);
        }
    }
    mask
}

/// Computes anchor/shimmer/aux hit targets and the eligibility mask for a
/// bar. `aux_flavor` drives the auxiliary voice's density (spec.md §4.12,
/// the aux voice this spec's distillation names but defers).
pub fn compute_budget(
    weights: &WeightVec,
    energy: f32,
    balance: f32,
    aux_flavor: f32,
) -> (BarBudget, u32) {
    let zone = Zone::from_energy(energy);
    let (min, max, spacing_min, lo, hi) = zone.table();
    let fraction = if hi > lo { (energy - lo) / (hi - lo) } else { 0.0 };
    let target = min as f32 + (max - min) as f32 * fraction.clamp(0.0, 1.0);
    let anchor_target = round_half_away_from_zero(target);

    let eligibility = eligibility_mask(weights, zone);
    let eligible_count = eligibility.popcount(weights.len()) as i32;
    // Budget-infeasible policy (spec.md §7): reduce target to eligibility
    // popcount rather than fail.
    let anchor_hits = anchor_target.min(eligible_count.max(0));
    if anchor_hits < anchor_target {
        #[cfg(feature = "logging")]
        log::debug!(
            "anchor budget reduced from {anchor_target} to {anchor_hits}: only {eligible_count} steps eligible"
        );
    }
    crate::debug_invariant!(anchor_hits <= eligible_count.max(0));

    let shimmer_hits = if balance <= 0.0 || anchor_hits == 0 {
        0
    } else {
        round_half_away_from_zero(anchor_hits as f32 * 1.5 * balance)
    };

    let aux_hits = if aux_flavor <= 0.0 || anchor_hits == 0 {
        0
    } else {
        round_half_away_from_zero(anchor_target as f32 * 0.5 * aux_flavor)
    };

    (
        BarBudget {
            anchor_hits,
            shimmer_hits,
            aux_hits,
            eligibility,
        },
        spacing_min,
    )
}
