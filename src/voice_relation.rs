//! Voice-relation: COMPLEMENT (spec.md §4.7). Fills gaps in the anchor mask
//! with the shimmer (or aux) voice. This is the only voice relationship —
//! earlier interlock/shadow modes named in spec.md §9's design notes as
//! legacy are not carried forward.

use heapless::Vec as HVec;

use crate::hash::hash;
use crate::types::{StepMask, WeightVec, MAX_STEPS};

#[derive(Clone, Copy, Debug)]
struct Gap {
    start: usize,
    length: usize,
}

/// Finds the maximal runs of unset bits in `mask` over `0..n`, treating a
/// run that touches both the tail and the head as a single wrapping gap.
fn find_gaps(mask: StepMask, n: usize) -> HVec<Gap, MAX_STEPS> {
    let mut gaps: HVec<Gap, MAX_STEPS> = HVec::new();
    if n == 0 || mask.is_empty_within(n) {
        if n > 0 {
            let _ = gaps.push(Gap { start: 0, length: n });
        }
        return gaps;
    }

    // Find a set bit to use as a scan origin, so a wrapping gap is counted
    // as one contiguous run instead of being split at index 0.
    let Some(origin) = (0..n).find(|&i| mask.is_set(i)) else {
        return gaps;
    };

    let mut i = 0usize;
    while i < n {
        let step = (origin + i) % n;
        if !mask.is_set(step) {
            let start = step;
            let mut len = 0usize;
            while len < n && !mask.is_set((start + len) % n) {
                len += 1;
            }
            let _ = gaps.push(Gap { start, length: len });
            i += len;
        } else {
            i += 1;
        }
    }
    gaps
}

/// Places `target_hits` shimmer/aux hits into the gaps of `anchor_mask`,
/// choosing positions within each gap by DRIFT (spec.md §4.7).
pub fn complement(
    anchor_mask: StepMask,
    n: usize,
    target_hits: i32,
    weights: &WeightVec,
    drift: f32,
    seed: u32,
) -> StepMask {
    if target_hits <= 0 {
        return StepMask::EMPTY;
    }
    let gaps = find_gaps(anchor_mask, n);
    let total_gap_len: usize = gaps.iter().map(|g| g.length).sum();
    if total_gap_len == 0 {
        return StepMask::EMPTY;
    }
    let l = total_gap_len.max(1);
    let t = target_hits as usize;

    let mut placed: HVec<usize, MAX_STEPS> = HVec::new();
    for gap in gaps.iter() {
        let share = libm::roundf(gap.length as f32 * t as f32 / l as f32).max(1.0) as usize;
        for j in 0..share {
            let step = choose_in_gap(*gap, j, share, weights, drift, seed);
            if !placed.contains(&step) {
                let _ = placed.push(step);
            }
        }
    }

    // Reconcile rounding drift against the exact target.
    while placed.len() > t {
        // Drop from the smallest gap first: find the placed step whose gap
        // is shortest.
        if let Some(idx) = smallest_gap_member(&placed, &gaps, n) {
            placed.swap_remove(idx);
        } else {
            break;
        }
    }
    while placed.len() < t {
        if let Some(step) = next_highest_weighted_unplaced(&placed, &gaps, weights) {
            let _ = placed.push(step);
        } else {
            break;
        }
    }

    let mut mask = StepMask::EMPTY;
    for s in placed {
        mask.set(s);
    }
    mask
}

fn choose_in_gap(
    gap: Gap,
    j: usize,
    share: usize,
    weights: &WeightVec,
    drift: f32,
    seed: u32,
) -> usize {
    let step = if drift < 0.30 {
        let offset = ((j + 1) * gap.length) / (share + 1);
        gap.start + offset.min(gap.length.saturating_sub(1))
    } else if drift < 0.70 {
        let mut best = gap.start;
        let mut best_w = f32::MIN;
        for k in 0..gap.length {
            let step = gap.start + k;
            let idx = step % weights.len();
            let w = weights[idx];
            if w > best_w {
                best_w = w;
                best = step;
            }
        }
        best
    } else {
        let offset = (hash(seed, j as u32) as usize) % gap.length;
        gap.start + offset
    };
    step % weights.len()
}

fn smallest_gap_member(placed: &HVec<usize, MAX_STEPS>, gaps: &HVec<Gap, MAX_STEPS>, n: usize) -> Option<usize> {
    let mut best_idx = None;
    let mut best_len = usize::MAX;
    for (idx, &step) in placed.iter().enumerate() {
        if let Some(g) = gaps.iter().find(|g| within_gap(step, g, n)) {
            if g.length < best_len {
                best_len = g.length;
                best_idx = Some(idx);
            }
        }
    }
    best_idx
}

fn within_gap(step: usize, g: &Gap, n: usize) -> bool {
    let mut k = 0;
    while k < g.length {
        if (g.start + k) % n == step {
            return true;
        }
        k += 1;
    }
    false
}

fn next_highest_weighted_unplaced(
    placed: &HVec<usize, MAX_STEPS>,
    gaps: &HVec<Gap, MAX_STEPS>,
    weights: &WeightVec,
) -> Option<usize> {
    let mut best = None;
    let mut best_w = f32::MIN;
    for g in gaps.iter() {
        for k in 0..g.length {
            let step = (g.start + k) % weights.len();
            if placed.contains(&step) {
                continue;
            }
            let w = weights[step];
            if w > best_w {
                best_w = w;
                best = Some(step);
            }
        }
    }
    best
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

    #[test]
    fn empty_target_is_empty() {
        let mut anchor = StepMask::EMPTY;
        anchor.set(0);
        let w = flat_weights(16);
        let mask = complement(anchor, 16, 0, &w, 0.5, 1);
        assert_eq!(mask, StepMask::EMPTY);
    }

    #[test]
    fn full_anchor_means_empty_shimmer() {
        let mut anchor = StepMask::EMPTY;
        for i in 0..16 {
            anchor.set(i);
        }
        let w = flat_weights(16);
        let mask = complement(anchor, 16, 4, &w, 0.5, 1);
        assert_eq!(mask, StepMask::EMPTY);
    }

    #[test]
    fn fills_without_overlapping_anchor() {
        let mut anchor = StepMask::EMPTY;
        anchor.set(0);
        anchor.set(4);
        anchor.set(8);
        anchor.set(12);
        let w = flat_weights(16);
        let mask = complement(anchor, 16, 2, &w, 0.2, 0xA1A2A3A4);
        assert_eq!(mask.popcount(16), 2);
        assert_eq!(mask.0 & anchor.0, 0, "shimmer must not overlap anchor");
    }

    #[test]
    fn hits_exact_target_across_drift_modes() {
        let mut anchor = StepMask::EMPTY;
        anchor.set(0);
        anchor.set(6);
        anchor.set(11);
        let w = flat_weights(16);
        for drift in [0.1, 0.5, 0.9] {
            let mask = complement(anchor, 16, 3, &w, drift, 99);
            assert_eq!(mask.popcount(16), 3, "drift={drift}");
        }
    }

    #[test]
    fn within_gap_matches_wrapped_members() {
        // A gap starting at 11 with length 10 on a 16-step bar wraps
        // through steps 11..=15 and 0..=4. Members on the wrapped side
        // (e.g. step 2, which is only reachable as g.start + k == 13) must
        // still match once reduced mod n.
        let g = Gap { start: 11, length: 10 };
        for step in [11, 12, 15, 0, 2, 4] {
            assert!(within_gap(step, &g, 16), "step {step} should be in the gap");
        }
        assert!(!within_gap(5, &g, 16));
        assert!(!within_gap(10, &g, 16));
    }

    #[test]
    fn smallest_gap_member_finds_wrapped_placed_step() {
        // Two gaps: a short wrapping one (steps 14..=15,0..=1, length 4) and
        // a long non-wrapping one (steps 3..=11, length 9). A placed step
        // from the wrapped portion of the short gap (step 0) must still be
        // recognized as belonging to the smaller gap.
        let gaps: HVec<Gap, MAX_STEPS> = {
            let mut g = HVec::new();
            let _ = g.push(Gap { start: 14, length: 4 });
            let _ = g.push(Gap { start: 3, length: 9 });
            g
        };
        let placed: HVec<usize, MAX_STEPS> = {
            let mut p = HVec::new();
            let _ = p.push(0usize);
            let _ = p.push(7usize);
            p
        };
        let idx = smallest_gap_member(&placed, &gaps, 16);
        assert_eq!(idx, Some(0), "the wrapped step 0 belongs to the 4-long gap, not the 9-long one");
    }

    #[test]
    fn hits_exact_target_with_wrapping_gap() {
        // Anchor leaves steps 11..=15 and 0..=4 unset: a single gap that
        // wraps past the end of the bar (start=11, length=10 on n=16).
        let mut anchor = StepMask::EMPTY;
        anchor.set(5);
        anchor.set(10);
        let w = flat_weights(16);
        for drift in [0.1, 0.5, 0.9] {
            let mask = complement(anchor, 16, 4, &w, drift, 7);
            assert_eq!(mask.popcount(16), 4, "drift={drift}");
            assert_eq!(mask.0 & anchor.0, 0);
        }
    }
}
