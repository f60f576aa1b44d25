//! The control-data wire contract (spec.md §6/§7: every field here is
//! clamp-on-construct, never a source of runtime failure).

use serde::{Deserialize, Serialize};

/// Enumerated pattern lengths. Snaps to the nearest supported value rather
/// than rejecting out-of-range input, the same way `Range`/`Curve` elsewhere
/// in this crate family snap unknown wire values to a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum PatternLength {
    #[default]
    Steps16,
    Steps24,
    Steps32,
    Steps64,
}

impl PatternLength {
    /// Snaps an arbitrary `u16` to the closest enumerated pattern length.
    pub fn new(steps: u16) -> Self {
        const OPTIONS: [(u16, PatternLength); 4] = [
            (16, PatternLength::Steps16),
            (24, PatternLength::Steps24),
            (32, PatternLength::Steps32),
            (64, PatternLength::Steps64),
        ];
        OPTIONS
            .iter()
            .min_by_key(|(n, _)| (*n as i32 - steps as i32).abs())
            .map(|(_, pl)| *pl)
            .unwrap_or(PatternLength::Steps16)
    }

    pub fn steps(self) -> u16 {
        match self {
            PatternLength::Steps16 => 16,
            PatternLength::Steps24 => 24,
            PatternLength::Steps32 => 32,
            PatternLength::Steps64 => 64,
        }
    }

    /// Number of bars per phrase, chosen so total phrase steps land near
    /// 128 (spec.md §4.11). The 24-step case lands on 120, not 128 — an
    /// accepted asymmetry per spec.md §9's Open Questions.
    pub fn phrase_bars(self) -> u16 {
        match self {
            PatternLength::Steps16 => 8,
            PatternLength::Steps24 => 5,
            PatternLength::Steps32 => 4,
            PatternLength::Steps64 => 2,
        }
    }

    /// Whether a bar of this length is generated as two 32-step-or-smaller
    /// halves with independent sub-seeds (spec.md §3).
    pub fn is_split(self) -> bool {
        self.steps() > 32
    }

    pub fn half_steps(self) -> u16 {
        if self.is_split() {
            self.steps() / 2
        } else {
            self.steps()
        }
    }
}

fn clamp01(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

/// Immutable per-bar parameter snapshot (spec.md §3). All floats are
/// clamped to `[0, 1]` at construction so every downstream component can
/// assume normalized ranges without re-checking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Params {
    pub energy: f32,
    pub shape: f32,
    pub axis_x: f32,
    pub axis_y: f32,
    pub drift: f32,
    pub balance: f32,
    pub accent: f32,
    pub build: f32,
    pub swing: f32,
    pub flavor: f32,
    pub pattern_length: PatternLength,
    pub seed: u32,
}

impl Params {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        energy: f32,
        shape: f32,
        axis_x: f32,
        axis_y: f32,
        drift: f32,
        balance: f32,
        accent: f32,
        build: f32,
        swing: f32,
        flavor: f32,
        pattern_length: u16,
        seed: u32,
    ) -> Self {
        Self {
            energy: clamp01(energy),
            shape: clamp01(shape),
            axis_x: clamp01(axis_x),
            axis_y: clamp01(axis_y),
            drift: clamp01(drift),
            balance: clamp01(balance),
            accent: clamp01(accent),
            build: clamp01(build),
            swing: clamp01(swing),
            flavor: clamp01(flavor),
            pattern_length: PatternLength::new(pattern_length),
            seed,
        }
    }
}

impl Default for Params {
    fn default() -> Self {
        Self {
            energy: 0.5,
            shape: 0.0,
            axis_x: 0.5,
            axis_y: 0.5,
            drift: 0.0,
            balance: 0.5,
            accent: 0.5,
            build: 0.0,
            swing: 0.0,
            flavor: 0.0,
            pattern_length: PatternLength::default(),
            seed: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range() {
        let p = Params::new(1.5, -1.0, 2.0, -2.0, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 16, 0);
        assert_eq!(p.energy, 1.0);
        assert_eq!(p.shape, 0.0);
        assert_eq!(p.axis_x, 1.0);
        assert_eq!(p.axis_y, 0.0);
    }

    #[test]
    fn snaps_pattern_length() {
        assert_eq!(PatternLength::new(20).steps(), 16);
        assert_eq!(PatternLength::new(28).steps(), 24);
        assert_eq!(PatternLength::new(100).steps(), 64);
        assert_eq!(PatternLength::new(0).steps(), 16);
    }
}
