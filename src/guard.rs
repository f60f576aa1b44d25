//! Guard rails (spec.md §4.8): soft bias repair, then hard corrections
//! (beat-1 enforcement, max-gap cap). Applied in order, anchor-only.

use crate::hash::hash_to_float;
use crate::types::{StepMask, WeightVec, Zone};

/// Soft repair: if the anchor mask has fewer hits than `target`, insert the
/// next-highest-weighted eligible steps not already set, honoring `spacing`
/// where possible.
pub fn soft_repair(
    mask: StepMask,
    n: usize,
    target: i32,
    weights: &WeightVec,
    eligibility: StepMask,
    spacing: u32,
) -> StepMask {
    let mut mask = mask;
    let target = target.max(0) as u32;
    while mask.popcount(n) < target {
        let mut best: Option<(usize, f32)> = None;
        for i in 0..n {
            if mask.is_set(i) || !eligibility.is_set(i) {
                continue;
            }
            let far_enough = (0..n)
                .filter(|&s| mask.is_set(s))
                .all(|s| circular_distance(i, s, n) >= spacing as usize);
            if !far_enough {
                continue;
            }
            let w = weights[i];
            if best.map(|(_, bw)| w > bw).unwrap_or(true) {
                best = Some((i, w));
            }
        }
        match best {
            Some((step, _)) => mask.set(step),
            None => break,
        }
    }
    mask
}

fn circular_distance(a: usize, b: usize, n: usize) -> usize {
    let d = a.abs_diff(b);
    d.min(n - d)
}

/// Beat-1 enforcement (spec.md §4.8.2): step 0 must be set when
/// `shape < 0.70`. In `[0.70, 1.00]`, a seed-based roll skips enforcement
/// with probability ramping from 0% to 40% across the wild zone.
pub fn enforce_beat_one(mask: StepMask, shape: f32, seed: u32) -> StepMask {
    let mut mask = mask;
    if shape < 0.70 {
        mask.set(0);
        crate::debug_invariant!(mask.is_set(0));
        return mask;
    }
    let skip_probability = ((shape - 0.70) / 0.30) * 0.40;
    let roll = hash_to_float(seed, 501);
    if roll >= skip_probability {
        mask.set(0);
    }
    mask
}

/// Max-gap cap (spec.md §4.8.3): no run of consecutive empty steps may
/// exceed 4 when `energy >= GROOVE`. Repeatedly inserts the highest-weight
/// eligible step in the middle of the offending gap until satisfied.
pub fn cap_max_gap(mask: StepMask, n: usize, energy: f32, weights: &WeightVec, eligibility: StepMask) -> StepMask {
    if Zone::from_energy(energy) == Zone::Minimal {
        return mask;
    }
    let mut mask = mask;
    // Bounded iteration: each insertion strictly reduces the offending gap,
    // so this always terminates well before `n` passes.
    for _ in 0..n {
        if mask.max_gap(n) <= 4 {
            break;
        }
        let Some((start, length)) = worst_gap(mask, n) else {
            break;
        };
        let mid = (start + length / 2) % n;
        let step = best_eligible_near(mid, start, length, weights, eligibility, n);
        mask.set(step);
    }
    mask
}

fn worst_gap(mask: StepMask, n: usize) -> Option<(usize, usize)> {
    if mask.is_empty_within(n) {
        return Some((0, n));
    }
    let origin = (0..n).find(|&i| mask.is_set(i))?;
    let mut best: Option<(usize, usize)> = None;
    let mut i = 0usize;
    while i < n {
        let step = (origin + i) % n;
        if !mask.is_set(step) {
            let start = step;
            let mut len = 0usize;
            while len < n && !mask.is_set((start + len) % n) {
                len += 1;
            }
            if best.map(|(_, bl)| len > bl).unwrap_or(true) {
                best = Some((start, len));
            }
            i += len;
        } else {
            i += 1;
        }
    }
    best
}

fn best_eligible_near(
    mid: usize,
    start: usize,
    length: usize,
    weights: &WeightVec,
    eligibility: StepMask,
    n: usize,
) -> usize {
    let mut best = mid % n;
    let mut best_w = f32::MIN;
    let mut found = false;
    for k in 0..length {
        let step = (start + k) % n;
        if eligibility.is_set(step) && weights[step] > best_w {
            best_w = weights[step];
            best = step;
            found = true;
        }
    }
    if !found {
        mid % n
    } else {
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_weights(n: u16) -> WeightVec {
        let mut v = WeightVec::new();
        for _ in 0..n {
            let _ = v.push(0.5);
        }
        v
    }

    fn all_eligible(n: usize) -> StepMask {
        let mut m = StepMask::EMPTY;
        for i in 0..n {
            m.set(i);
        }
        m
    }

    #[test]
    fn beat_one_forced_below_070() {
        let mask = enforce_beat_one(StepMask::EMPTY, 0.3, 1);
        assert!(mask.is_set(0));
    }

    #[test]
    fn max_gap_capped_at_groove() {
        let mask = StepMask::EMPTY; // everything empty: worst case
        let w = flat_weights(16);
        let capped = cap_max_gap(mask, 16, 0.5, &w, all_eligible(16));
        assert!(capped.max_gap(16) <= 4);
    }

    #[test]
    fn minimal_zone_skips_gap_cap() {
        let mask = StepMask::EMPTY;
        let w = flat_weights(16);
        let capped = cap_max_gap(mask, 16, 0.1, &w, all_eligible(16));
        assert_eq!(capped, StepMask::EMPTY);
    }

    #[test]
    fn soft_repair_reaches_target() {
        let mut mask = StepMask::EMPTY;
        mask.set(0);
        let w = flat_weights(16);
        let repaired = soft_repair(mask, 16, 4, &w, all_eligible(16), 1);
        assert_eq!(repaired.popcount(16), 4);
    }
}
