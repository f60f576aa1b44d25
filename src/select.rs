//! Gumbel top-K selection with a minimum-spacing constraint (spec.md §4.6).

use heapless::Vec as HVec;

use crate::hash::hash_to_float;
use crate::types::{StepMask, WeightVec, MAX_STEPS};

/// One scored candidate step.
#[derive(Clone, Copy)]
struct Scored {
    step: u16,
    score: f32,
}

fn circular_distance(a: usize, b: usize, n: usize) -> usize {
    let d = a.abs_diff(b);
    d.min(n - d)
}

/// Selects up to `k` steps from `weights`, restricted to `eligibility`,
/// maximizing `log(w[i]) + gumbel(u[i])` subject to a minimum spacing that
/// relaxes by one (down to a floor of 1) whenever it blocks reaching `k`
/// (spec.md §4.6).
pub fn select_top_k(
    weights: &WeightVec,
    eligibility: StepMask,
    k: i32,
    seed: u32,
    salt_base: u32,
    spacing: u32,
) -> StepMask {
    if k <= 0 {
        return StepMask::EMPTY;
    }
    let n = weights.len();
    let k = (k as usize).min(n);

    let mut candidates: HVec<Scored, MAX_STEPS> = HVec::new();
    for (i, &w) in weights.iter().enumerate() {
        if !eligibility.is_set(i) {
            continue;
        }
        let u = hash_to_float(seed, salt_base + i as u32);
        // Gumbel noise: -ln(-ln(u)). Guard against u landing exactly on 0
        // or 1 (hash_to_float's range already excludes 1.0; clamp the
        // degenerate 0 case away from -inf/NaN).
        let u = u.clamp(1e-6, 1.0 - 1e-6);
        let gumbel = -libm::logf(-libm::logf(u));
        let score = libm::logf(w.max(1e-6)) + gumbel;
        let _ = candidates.push(Scored { step: i as u16, score });
    }
    // Descending score, ties broken by ascending step index.
    let mut sorted: HVec<Scored, MAX_STEPS> = candidates.clone();
    sorted_sort(&mut sorted);

    let mut spacing_cur = spacing;
    loop {
        let mut chosen: HVec<usize, MAX_STEPS> = HVec::new();
        for c in sorted.iter() {
            let step = c.step as usize;
            let ok = chosen
                .iter()
                .all(|&s| circular_distance(step, s, n) >= spacing_cur as usize);
            if ok {
                let _ = chosen.push(step);
                if chosen.len() == k {
                    break;
                }
            }
        }
        if chosen.len() == k || spacing_cur <= 1 {
            let mut mask = StepMask::EMPTY;
            for s in chosen {
                mask.set(s);
            }
            return mask;
        }
        #[cfg(feature = "logging")]
        log::trace!("spacing relaxed from {spacing_cur} to reach k={k}");
        spacing_cur -= 1;
    }
}

fn sorted_sort(v: &mut HVec<Scored, MAX_STEPS>) {
    // Small fixed-capacity buffer; insertion sort keeps this allocation-free
    // and is plenty fast at <=64 elements.
    for i in 1..v.len() {
        let mut j = i;
        while j > 0 {
            let higher_priority = v[j].score > v[j - 1].score
                || (v[j].score == v[j - 1].score && v[j].step < v[j - 1].step);
            if higher_priority {
                v.swap(j, j - 1);
                j -= 1;
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_eligible(n: usize) -> StepMask {
        let mut m = StepMask::EMPTY;
        for i in 0..n {
            m.set(i);
        }
        m
    }

    fn flat_weights(n: u16) -> WeightVec {
        let mut v = WeightVec::new();
        for _ in 0..n {
            let _ = v.push(0.5);
        }
        v
    }

    #[test]
    fn selects_exactly_k_when_feasible() {
        let w = flat_weights(16);
        let mask = select_top_k(&w, all_eligible(16), 4, 0xA1A2A3A4, 0, 2);
        assert_eq!(mask.popcount(16), 4);
    }

    #[test]
    fn deterministic_for_same_inputs() {
        let w = flat_weights(16);
        let a = select_top_k(&w, all_eligible(16), 4, 123, 0, 2);
        let b = select_top_k(&w, all_eligible(16), 4, 123, 0, 2);
        assert_eq!(a, b);
    }

    #[test]
    fn relaxes_spacing_to_meet_budget() {
        let w = flat_weights(16);
        // spacing 8 with only 16 steps cannot fit 6 hits without relaxing.
        let mask = select_top_k(&w, all_eligible(16), 6, 7, 0, 8);
        assert_eq!(mask.popcount(16), 6);
    }

    #[test]
    fn respects_eligibility() {
        let w = flat_weights(16);
        let mut elig = StepMask::EMPTY;
        elig.set(0);
        elig.set(4);
        let mask = select_top_k(&w, elig, 4, 1, 0, 1);
        assert_eq!(mask.popcount(16), 2);
        assert!(mask.is_set(0) && mask.is_set(4));
    }
}
