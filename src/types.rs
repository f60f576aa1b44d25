//! Shared value types (spec.md §3). All of these are plain data; the
//! behaviour that builds and consumes them lives in the sibling modules.

use heapless::Vec as HVec;

/// Largest supported pattern length (`PatternLength::Steps64`).
pub const MAX_STEPS: usize = 64;

/// Per-step weight scratch buffer. Every element is kept in `[0.05, 1.0]`
/// (the weight floor, spec.md §4.4) by every producer in this crate.
pub type WeightVec = HVec<f32, MAX_STEPS>;

pub const WEIGHT_FLOOR: f32 = 0.05;
pub const WEIGHT_CEIL: f32 = 1.0;

pub fn clamp_weight(w: f32) -> f32 {
    let clamped = w.clamp(WEIGHT_FLOOR, WEIGHT_CEIL);
    crate::debug_invariant!((WEIGHT_FLOOR..=WEIGHT_CEIL).contains(&clamped));
    clamped
}

/// A bitset over step indices, ≤64 bits (spec.md §3). Bit `i` set means
/// step `i` fires. Internally this is a single `u64` rather than a
/// byte-array packing, because `MAX_STEPS` here is 64, not a fixed 32, and a
/// single machine word is simpler to reason about at that width.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepMask(pub u64);

impl StepMask {
    pub const EMPTY: StepMask = StepMask(0);

    pub fn is_set(&self, step: usize) -> bool {
        (self.0 >> step) & 1 == 1
    }

    pub fn set(&mut self, step: usize) {
        self.0 |= 1u64 << step;
    }

    pub fn clear(&mut self, step: usize) {
        self.0 &= !(1u64 << step);
    }

    pub fn popcount(&self, len: usize) -> u32 {
        (self.0 & mask_of_len(len)).count_ones()
    }

    pub fn is_empty_within(&self, len: usize) -> bool {
        self.0 & mask_of_len(len) == 0
    }

    /// Largest run of consecutive unset bits within `0..len`, treating the
    /// sequence as circular (a gap may wrap from the last step to step 0).
    pub fn max_gap(&self, len: usize) -> usize {
        if len == 0 || self.is_empty_within(len) {
            return len;
        }
        let mut best = 0usize;
        let mut run = 0usize;
        // Walk twice around so a wrapping run is counted contiguously.
        for i in 0..(len * 2) {
            let step = i % len;
            if self.is_set(step) {
                run = 0;
            } else {
                run += 1;
                best = best.max(run);
            }
        }
        best.min(len)
    }
}

pub fn mask_of_len(len: usize) -> u64 {
    if len >= 64 {
        u64::MAX
    } else {
        (1u64 << len) - 1
    }
}

/// The three voices the engine can trigger (spec.md §3/glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Voice {
    Anchor,
    Shimmer,
    Aux,
}

/// Energy-derived density zone (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Minimal,
    Groove,
    Build,
    Peak,
}

impl Zone {
    pub fn from_energy(energy: f32) -> Self {
        if energy < 0.20 {
            Zone::Minimal
        } else if energy < 0.50 {
            Zone::Groove
        } else if energy < 0.75 {
            Zone::Build
        } else {
            Zone::Peak
        }
    }

    /// `(anchor_min, anchor_max, spacing_min, zone_lo, zone_hi)`.
    pub fn table(self) -> (i32, i32, u32, f32, f32) {
        match self {
            Zone::Minimal => (1, 2, 4, 0.00, 0.20),
            Zone::Groove => (3, 4, 2, 0.20, 0.50),
            Zone::Build => (4, 6, 1, 0.50, 0.75),
            Zone::Peak => (6, 10, 1, 0.75, 1.00),
        }
    }

    /// Metric-weight floor below which a step is ineligible for selection;
    /// higher-energy zones admit finer subdivisions (spec.md §4.5).
    pub fn eligibility_floor(self) -> f32 {
        match self {
            Zone::Minimal => 0.65,
            Zone::Groove => 0.35,
            Zone::Build => 0.15,
            Zone::Peak => 0.0,
        }
    }
}

/// Per-bar hit targets and the shared eligibility mask (spec.md §3/§4.5).
#[derive(Debug, Clone, Copy, Default)]
pub struct BarBudget {
    pub anchor_hits: i32,
    pub shimmer_hits: i32,
    pub aux_hits: i32,
    pub eligibility: StepMask,
}

/// Current position within a phrase (spec.md §3/§4.11).
#[derive(Debug, Clone, Copy, Default)]
pub struct PhrasePos {
    pub step_in_phrase: u16,
    pub bar_in_phrase: u16,
    pub progress: f32,
    pub is_downbeat: bool,
    pub is_build_zone: bool,
    pub is_fill_zone: bool,
}

/// The two seeds governing drift (spec.md §3/§4.9). Held for the life of
/// the engine.
#[derive(Debug, Clone, Copy)]
pub struct DriftState {
    pub pattern_seed: u32,
    pub phrase_seed: u32,
}

impl DriftState {
    pub fn new(seed: u32) -> Self {
        Self {
            pattern_seed: seed,
            phrase_seed: seed,
        }
    }

    /// Rotates the phrase seed at a phrase boundary (spec.md §4.9).
    pub fn rotate_phrase_seed(&mut self) {
        self.phrase_seed = crate::hash::hash(self.phrase_seed, 0xF17A5E_u32);
    }

    /// Rotates the pattern seed on an explicit reseed request, applied at
    /// the next bar boundary (spec.md §5).
    pub fn reseed_pattern(&mut self, new_seed: u32) {
        self.pattern_seed = new_seed;
    }
}

/// A single trigger emission (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerEvent {
    pub voice: Voice,
    pub velocity: f32,
    pub sub_tick_offset_samples: i32,
}

/// The current bar's generated state (spec.md §3), overwritten at each bar
/// boundary. `step_velocity`/`step_displacement` are the per-step timing
/// stack inputs computed once at bar-generation time.
#[derive(Debug, Clone)]
pub struct BarResult {
    pub anchor_mask: StepMask,
    pub shimmer_mask: StepMask,
    pub aux_mask: StepMask,
    pub step_weight: [f32; MAX_STEPS],
    /// Per-step micro-displacement in whole steps (-1, 0, +1), computed
    /// once at bar-generation time (spec.md §4.10.3).
    pub step_displacement: [i8; MAX_STEPS],
}

impl Default for BarResult {
    fn default() -> Self {
        Self {
            anchor_mask: StepMask::EMPTY,
            shimmer_mask: StepMask::EMPTY,
            aux_mask: StepMask::EMPTY,
            step_weight: [WEIGHT_FLOOR; MAX_STEPS],
            step_displacement: [0; MAX_STEPS],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn popcount_and_set() {
        let mut m = StepMask::EMPTY;
        m.set(0);
        m.set(4);
        m.set(8);
        assert_eq!(m.popcount(16), 3);
        assert!(m.is_set(4));
        m.clear(4);
        assert!(!m.is_set(4));
    }

    #[test]
    fn max_gap_wraps() {
        let mut m = StepMask::EMPTY;
        m.set(2);
        m.set(6);
        // gap from 7..15 wraps to 0..1 -> run of 9+2 = 11 empty steps.
        let gap = m.max_gap(16);
        assert_eq!(gap, 11);
    }

    #[test]
    fn max_gap_full() {
        let m = StepMask::EMPTY;
        assert_eq!(m.max_gap(16), 16);
    }
}
