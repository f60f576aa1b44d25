//! Phrase tracker (spec.md §4.11): current step-in-phrase, phrase progress,
//! and the fill/build zone classification.

use crate::params::PatternLength;
use crate::types::PhrasePos;

pub const BUILD_ZONE_START: f32 = 0.60;
pub const FILL_ZONE_START: f32 = 0.875;

/// Computes the phrase position for a given `(bar_in_phrase, step_in_bar)`.
pub fn phrase_pos(bar_in_phrase: u16, step_in_bar: u16, pattern_length: PatternLength) -> PhrasePos {
    let steps = pattern_length.steps();
    let bars = pattern_length.phrase_bars();
    let progress = (bar_in_phrase as f32 + step_in_bar as f32 / steps as f32) / bars as f32;
    PhrasePos {
        step_in_phrase: bar_in_phrase * steps + step_in_bar,
        bar_in_phrase,
        progress,
        is_downbeat: step_in_bar == 0,
        is_build_zone: (BUILD_ZONE_START..FILL_ZONE_START).contains(&progress),
        is_fill_zone: progress >= FILL_ZONE_START,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downbeat_flag() {
        let p = phrase_pos(0, 0, PatternLength::Steps16);
        assert!(p.is_downbeat);
        let p = phrase_pos(0, 1, PatternLength::Steps16);
        assert!(!p.is_downbeat);
    }

    #[test]
    fn fill_zone_at_phrase_tail() {
        // 8 bars of 16 steps = 128 steps/phrase; bar 7 step 0 -> progress 7/8 = 0.875
        let p = phrase_pos(7, 0, PatternLength::Steps16);
        assert!(p.is_fill_zone);
        assert!(!p.is_build_zone);
    }

    #[test]
    fn build_zone_before_fill() {
        // bar 5 of 8 -> progress 5/8 = 0.625, inside [0.6, 0.875)
        let p = phrase_pos(5, 0, PatternLength::Steps16);
        assert!(p.is_build_zone);
        assert!(!p.is_fill_zone);
    }

    #[test]
    fn progress_monotonic_within_phrase() {
        let mut last = -1.0f32;
        for bar in 0..PatternLength::Steps16.phrase_bars() {
            for step in 0..PatternLength::Steps16.steps() {
                let p = phrase_pos(bar, step, PatternLength::Steps16);
                assert!(p.progress >= last);
                last = p.progress;
            }
        }
    }
}
