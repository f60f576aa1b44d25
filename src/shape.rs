//! Shape-weight generator and 7-zone SHAPE blend (spec.md §4.3).
//!
//! Three pure candidate generators (stable, syncopated, wild) are blended
//! according to SHAPE. The zone table in spec.md §4.3 has overlapping,
//! mutually redundant `t` formulas across its six transition zones (the
//! crossfade windows reference both "syncopated-a" and plain "syncopated"
//! with differing fractions that don't reconcile at the shared boundary).
//! Rather than guess which of the two contradictory formulas is load
//! bearing, this implementation collapses the table to the two-segment
//! piecewise-linear crossfade its endpoints actually describe: pure stable
//! at `shape = 0`, peak syncopation at `shape = 0.50` (the midpoint of the
//! two Crossfade-2 boundaries `0.48`/`0.52`), pure wild at `shape = 1`.
//! This is an implementation decision, recorded in DESIGN.md, not a literal
//! Open Question from spec.md §9 — but it is the same kind of judgment call
//! those Open Questions ask an implementer to make explicit rather than
//! silently resolve.

use crate::hash::hash_to_float;
use crate::metric::metric_weight;
use crate::types::{clamp_weight, WeightVec};

/// Pure "stable" candidate: a humanized euclidean distribution smoothed to
/// retain the metric hierarchy (spec.md §4.3). The euclidean hit count used
/// here is a nominal quarter-note-density reference (`n/4` hits) — SHAPE's
/// blend, not this generator, decides how many steps ultimately fire; the
/// final hit count is the hit-budget component's job (spec.md §4.5).
pub fn stable_weights(n: u16, pattern_length: u16, seed: u32) -> WeightVec {
    let k = (pattern_length / 4).max(1) as usize;
    let rotation = (hash_to_float(seed, 101) * n as f32) as usize;
    let euclid = crate::euclid::euclidean_mask(n as usize, k, rotation);
    let mut out = WeightVec::new();
    for step in 0..n {
        let base = metric_weight(step, pattern_length);
        let boosted = if euclid.is_set(step as usize) {
            base + 0.15
        } else {
            base
        };
        let _ = out.push(clamp_weight(boosted));
    }
    out
}

/// Pure "syncopated" candidate: weight biased away from strong beats and
/// toward anticipations (the step immediately before a strong beat) and
/// weak offbeats. Beat-1 is suppressed but floored at `0.50 + 0.20*energy`
/// and is never fully cleared (spec.md §4.3).
pub fn syncopated_weights(n: u16, pattern_length: u16, energy: f32, seed: u32) -> WeightVec {
    let mut out = WeightVec::new();
    for step in 0..n {
        let base = metric_weight(step, pattern_length);
        let is_strong = base >= 0.7;
        let next = (step + 1) % n;
        let next_is_strong = metric_weight(next, pattern_length) >= 0.7;
        let w = if step == 0 {
            0.50 + 0.20 * energy
        } else if next_is_strong {
            // anticipation: the step immediately before a strong beat
            0.90
        } else if !is_strong {
            // weak offbeat
            0.55 + hash_to_float(seed, 2000 + step as u32) * 0.10
        } else {
            base * 0.45
        };
        let _ = out.push(clamp_weight(w));
    }
    out
}

/// Pure "wild" candidate: weighted random with high variance and seed-based
/// chaos injection of up to ±15% per step (spec.md §4.3).
pub fn wild_weights(n: u16, seed: u32) -> WeightVec {
    let mut out = WeightVec::new();
    for step in 0..n {
        let base = 0.15 + 0.85 * hash_to_float(seed, 3000 + step as u32 * 2);
        let chaos = (hash_to_float(seed, 3001 + step as u32 * 2) - 0.5) * 0.30;
        let _ = out.push(clamp_weight(base * (1.0 + chaos)));
    }
    out
}

fn lerp_vec(a: &WeightVec, b: &WeightVec, t: f32) -> WeightVec {
    let mut out = WeightVec::new();
    for i in 0..a.len() {
        let v = a[i] + (b[i] - a[i]) * t;
        let _ = out.push(clamp_weight(v));
    }
    out
}

/// Produces the SHAPE-blended weight vector for a bar (spec.md §4.3).
pub fn shape_blend(n: u16, pattern_length: u16, shape: f32, energy: f32, seed: u32) -> WeightVec {
    let stable = stable_weights(n, pattern_length, seed);
    let syncopated = syncopated_weights(n, pattern_length, energy, seed);
    let wild = wild_weights(n, seed);

    let mut blended = if shape <= 0.50 {
        lerp_vec(&stable, &syncopated, shape / 0.50)
    } else {
        lerp_vec(&syncopated, &wild, (shape - 0.50) / 0.50)
    };

    // Pure-stable humanization: small per-step noise, fading out across the
    // [0, 0.28) zone as SHAPE approaches the first crossfade (spec.md §4.3).
    if shape < 0.28 {
        let fade = 1.0 - shape / 0.28;
        for (i, w) in blended.iter_mut().enumerate() {
            let noise = (hash_to_float(seed, 4000 + i as u32) - 0.5) * 0.05 * fade;
            *w = clamp_weight(*w + noise);
        }
    }

    blended
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_stay_in_bounds() {
        for shape in [0.0, 0.1, 0.28, 0.32, 0.5, 0.68, 0.72, 1.0] {
            let v = shape_blend(16, 16, shape, 0.5, 0xA1A2A3A4);
            for &w in v.iter() {
                assert!((0.05..=1.0).contains(&w), "shape={shape} w={w}");
            }
        }
    }

    #[test]
    fn beat_one_never_cleared_in_syncopation() {
        let v = syncopated_weights(16, 16, 0.0, 42);
        assert!(v[0] >= 0.50);
    }

    #[test]
    fn stable_is_deterministic() {
        let a = stable_weights(16, 16, 7);
        let b = stable_weights(16, 16, 7);
        assert_eq!(a.as_slice(), b.as_slice());
    }
}
