//! Top-level engine (spec.md §5/§6): ties phrase tracking, drift/seed
//! selection, shape+axis weight generation, hit budgeting, selection,
//! voice-relation, guard rails and the timing stack into the two
//! synchronous entry points the real-time caller drives.

use heapless::Vec as HVec;

use crate::axis;
use crate::budget;
use crate::drift;
use crate::guard;
use crate::params::Params;
use crate::phrase;
use crate::select;
use crate::shape;
use crate::timing;
use crate::types::{BarResult, StepMask, Voice, WeightVec, Zone};
use crate::voice_relation;

/// Read-only snapshot for diagnostics/visualization (spec.md §6).
#[derive(Debug, Clone, Copy)]
pub struct EngineState {
    pub bar_in_phrase: u16,
    pub step_in_bar: u16,
    pub phrase_progress: f32,
    pub just_entered_phrase: bool,
    pub pattern_seed: u32,
    pub phrase_seed: u32,
}

/// Owns every piece of mutable state the engine needs: the two drift seeds,
/// the current bar's generated masks/weights, and phrase/step position.
/// Everything here is a plain member sized for `MAX_STEPS`; there is no heap
/// allocation anywhere in this module (spec.md §5).
pub struct Engine {
    live_params: Params,
    bar_params: Params,
    drift: crate::types::DriftState,
    bar: BarResult,
    step_in_bar: u16,
    bar_in_phrase: u16,
    steps_per_bar: u16,
    last_now_samples: Option<u64>,
    step_period_samples: u32,
    just_entered_phrase: bool,
    pending_reseed: Option<u32>,
}

impl Engine {
    pub fn new(sample_rate_hz: u32, params: Params) -> Self {
        let mut engine = Self {
            live_params: params,
            bar_params: params,
            drift: crate::types::DriftState::new(params.seed),
            bar: BarResult::default(),
            step_in_bar: 0,
            bar_in_phrase: 0,
            steps_per_bar: params.pattern_length.steps(),
            last_now_samples: None,
            // A reasonable guess before the first `advance_step` delta is
            // observed; a quarter-note at 120bpm/16th-steps at this rate.
            step_period_samples: sample_rate_hz / 8,
            just_entered_phrase: false,
            pending_reseed: None,
        };
        engine.generate_bar();
        engine
    }

    /// Stages a new parameter snapshot. Mask-affecting fields only take
    /// effect for the reader at the next bar boundary (`generate_bar`
    /// reads `live_params` into `bar_params`); per-step fields (swing,
    /// flavor, accent, build) are read live every step (spec.md §5).
    pub fn update_params(&mut self, params: Params) {
        self.live_params = params;
    }

    /// Schedules a `pattern_seed` rotation at the next bar boundary
    /// (spec.md §6/§7: never mid-bar).
    pub fn reseed(&mut self, seed: u32) {
        self.pending_reseed = Some(seed);
    }

    /// Sets position to step 0 of bar 0 of the phrase; preserves seeds
    /// (spec.md §6).
    pub fn reset(&mut self) {
        self.step_in_bar = 0;
        self.bar_in_phrase = 0;
        self.last_now_samples = None;
        self.just_entered_phrase = false;
        self.generate_bar();
    }

    pub fn snapshot_state(&self) -> EngineState {
        let pos = phrase::phrase_pos(self.bar_in_phrase, self.step_in_bar, self.bar_params.pattern_length);
        EngineState {
            bar_in_phrase: self.bar_in_phrase,
            step_in_bar: self.step_in_bar,
            phrase_progress: pos.progress,
            just_entered_phrase: self.just_entered_phrase,
            pattern_seed: self.drift.pattern_seed,
            phrase_seed: self.drift.phrase_seed,
        }
    }

    #[cfg(test)]
    pub(crate) fn bar(&self) -> &BarResult {
        &self.bar
    }

    /// Consumes one step tick: regenerates the bar on crossing step 0,
    /// rotates the phrase seed on crossing bar 0 of a new phrase, then runs
    /// the timing stack for every voice due this step (spec.md §6).
    pub fn advance_step(&mut self, now_samples: u64) -> HVec<crate::types::TriggerEvent, 3> {
        let mut events = HVec::new();

        if let Some(last) = self.last_now_samples {
            let delta = now_samples.saturating_sub(last);
            if delta > 0 {
                self.step_period_samples = delta as u32;
            }
        }
        self.last_now_samples = Some(now_samples);

        self.just_entered_phrase = false;
        if self.step_in_bar == 0 {
            self.generate_bar();
            self.steps_per_bar = self.bar_params.pattern_length.steps();
            let phrase_bars = self.bar_params.pattern_length.phrase_bars();
            self.bar_in_phrase = (self.bar_in_phrase + 1) % phrase_bars;
            if self.bar_in_phrase == 0 {
                self.drift.rotate_phrase_seed();
                self.just_entered_phrase = true;
            }
        }

        let step = self.step_in_bar;
        let pos = phrase::phrase_pos(self.bar_in_phrase, step, self.bar_params.pattern_length);
        let local_progress =
            timing::build_local_progress(pos.progress, phrase::BUILD_ZONE_START, phrase::FILL_ZONE_START);

        let dir = self.bar.step_displacement[step as usize];
        let disp_samples = dir as i32 * self.step_period_samples as i32;
        let zone = Zone::from_energy(self.live_params.energy);

        for (voice, mask) in [
            (Voice::Anchor, self.bar.anchor_mask),
            (Voice::Shimmer, self.bar.shimmer_mask),
            (Voice::Aux, self.bar.aux_mask),
        ] {
            if !mask.is_set(step as usize) {
                continue;
            }
            let accent_pos =
                timing::voice_accent_eligible(voice) && timing::is_accent_position(step, self.steps_per_bar);
            let vel = timing::velocity(
                pos.is_build_zone,
                pos.is_fill_zone,
                local_progress,
                self.live_params.build,
                accent_pos,
                self.live_params.accent,
            );
            let swing_off = timing::swing_offset_samples(
                step,
                self.step_period_samples,
                self.live_params.swing,
                zone,
                self.live_params.flavor,
                self.drift.pattern_seed,
            );
            let jitter_off =
                timing::micro_jitter_samples(step, zone, self.live_params.flavor, self.drift.pattern_seed);
            let _ = events.push(crate::types::TriggerEvent {
                voice,
                velocity: vel,
                sub_tick_offset_samples: swing_off + jitter_off + disp_samples,
            });
        }

        self.step_in_bar = (self.step_in_bar + 1) % self.steps_per_bar.max(1);
        events
    }

    /// Regenerates `self.bar` from `live_params`, applying any pending
    /// reseed first (spec.md §3: split generation for `pattern_length > 32`).
    fn generate_bar(&mut self) {
        self.bar_params = self.live_params;
        if let Some(seed) = self.pending_reseed.take() {
            self.drift.reseed_pattern(seed);
        }

        let pl = self.bar_params.pattern_length;
        let mut bar = BarResult::default();
        if pl.is_split() {
            let half = pl.half_steps();
            self.fill_segment(&mut bar, 0, half, self.drift.pattern_seed, self.drift.phrase_seed);
            self.fill_segment(
                &mut bar,
                half,
                half,
                self.drift.pattern_seed ^ 0xDEAD_BEEF,
                self.drift.phrase_seed ^ 0xDEAD_BEEF,
            );
        } else {
            self.fill_segment(&mut bar, 0, pl.steps(), self.drift.pattern_seed, self.drift.phrase_seed);
        }
        self.bar = bar;
        self.steps_per_bar = pl.steps();
    }

    /// Runs the full per-bar pipeline (spec.md §4.3–§4.9) for one segment
    /// (a whole bar, or one half of a split 64-step bar) and writes its
    /// results into `bar` at `offset`.
    ///
    /// Drift (spec.md §4.9) is applied at the weight-generation level: each
    /// step's final weight is drawn from either a `pattern_seed`-derived or
    /// `phrase_seed`-derived candidate vector depending on whether that
    /// step's stability exceeds the anchor drift threshold. The subsequent
    /// Gumbel draw in top-K selection then runs against `pattern_seed`
    /// consistently — the per-step lock/unlock decision has already been
    /// folded into the weight the draw sees.
    fn fill_segment(&mut self, bar: &mut BarResult, offset: u16, steps: u16, pattern_seed: u32, phrase_seed: u32) {
        let p = self.bar_params;
        let weights_pattern = shape::shape_blend(steps, steps, p.shape, p.energy, pattern_seed);
        let weights_phrase = shape::shape_blend(steps, steps, p.shape, p.energy, phrase_seed);

        let mut weights: WeightVec = WeightVec::new();
        for s in 0..steps {
            let locked =
                drift::seed_for_step(s, steps, p.drift, drift::K_ANCHOR, pattern_seed, phrase_seed) == pattern_seed;
            let w = if locked {
                weights_pattern[s as usize]
            } else {
                weights_phrase[s as usize]
            };
            let _ = weights.push(w);
        }

        axis::apply_axis_x(&mut weights, steps, p.axis_x);
        axis::apply_axis_y(&mut weights, steps, p.axis_y);
        axis::apply_broken_mode(&mut weights, p.shape, p.axis_x, pattern_seed);

        let (budget_result, spacing) = budget::compute_budget(&weights, p.energy, p.balance, p.flavor);

        let mut anchor = select::select_top_k(
            &weights,
            budget_result.eligibility,
            budget_result.anchor_hits,
            pattern_seed,
            5000,
            spacing,
        );
        anchor = guard::soft_repair(
            anchor,
            steps as usize,
            budget_result.anchor_hits,
            &weights,
            budget_result.eligibility,
            spacing,
        );
        anchor = guard::enforce_beat_one(anchor, p.shape, pattern_seed);
        anchor = guard::cap_max_gap(anchor, steps as usize, p.energy, &weights, budget_result.eligibility);

        let shimmer = voice_relation::complement(
            anchor,
            steps as usize,
            budget_result.shimmer_hits,
            &weights,
            p.drift,
            pattern_seed ^ 0x5EED_0001,
        );

        let combined = StepMask(anchor.0 | shimmer.0);
        let aux = voice_relation::complement(
            combined,
            steps as usize,
            budget_result.aux_hits,
            &weights,
            p.drift,
            pattern_seed ^ 0x5EED_0002,
        );

        for s in 0..steps {
            let idx = (offset + s) as usize;
            bar.step_weight[idx] = weights[s as usize];
            if anchor.is_set(s as usize) {
                bar.anchor_mask.set(idx);
            }
            if shimmer.is_set(s as usize) {
                bar.shimmer_mask.set(idx);
            }
            if aux.is_set(s as usize) {
                bar.aux_mask.set(idx);
            }
            let dir = timing::micro_displacement(s, p.shape, pattern_seed);
            let collides = timing::displacement_collides(anchor.0, steps, s, dir);
            bar.step_displacement[idx] = if collides { 0 } else { dir };
        }
    }
}
