//! Per-step timing stack (spec.md §4.10): swing, micro-jitter, micro-
//! displacement, and velocity shaping. Applied at dispatch time, independent
//! of mask generation, except for micro-displacement's collision check
//! against the bar's own masks.

use crate::hash::hash_to_float;
use crate::types::{Voice, Zone};

/// Swing fraction range: 0.50 (straight) to 0.66 (triplet-leaning).
pub const SWING_MIN: f32 = 0.50;
pub const SWING_MAX: f32 = 0.66;

/// Per-zone cap, in milliseconds, on both the swing noise term and
/// independent micro-jitter (spec.md §4.10.1/4.10.2).
fn jitter_cap_ms(zone: Zone) -> f32 {
    match zone {
        Zone::Minimal => 0.0,
        Zone::Groove => 3.0,
        Zone::Build => 6.0,
        Zone::Peak => 12.0,
    }
}

fn bounded_noise_ms(zone: Zone, flavor: f32, seed: u32, salt: u32) -> f32 {
    let cap = jitter_cap_ms(zone) * flavor;
    (hash_to_float(seed, salt) * 2.0 - 1.0) * cap
}

/// Swing offset in samples for a given step: only odd-indexed steps are
/// skewed, by `(swing_fraction - 0.5)` of the step period, plus a bounded
/// noise term (spec.md §4.10.1).
pub fn swing_offset_samples(
    step: u16,
    step_period_samples: u32,
    swing: f32,
    zone: Zone,
    flavor: f32,
    seed: u32,
) -> i32 {
    if step.is_multiple_of(2) {
        return 0;
    }
    let swing_fraction = SWING_MIN + swing.clamp(0.0, 1.0) * (SWING_MAX - SWING_MIN);
    let skew_samples = (swing_fraction - 0.5) * step_period_samples as f32;
    let noise_ms = bounded_noise_ms(zone, flavor, seed, 601 + step as u32);
    let noise_samples = noise_ms * step_period_samples as f32 / 1000.0;
    libm::roundf(skew_samples + noise_samples) as i32
}

/// Independent micro-jitter offset in samples, `±jitter_ms·flavor`
/// (spec.md §4.10.2).
pub fn micro_jitter_samples(step: u16, zone: Zone, flavor: f32, seed: u32) -> i32 {
    let ms = bounded_noise_ms(zone, flavor, seed, 701 + step as u32);
    (ms * 0.001 * 48_000.0) as i32
}

/// Micro-displacement direction for a step, in whole steps (spec.md
/// §4.10.3). Only active for `shape` in `[0.30, 0.70)`; the caller must
/// confirm the displaced target step doesn't collide with another set step
/// or step 0 before applying it (see [`displacement_collides`]).
pub fn micro_displacement(step: u16, shape: f32, seed: u32) -> i8 {
    if !(0.30..0.70).contains(&shape) {
        return 0;
    }
    let intensity = ((shape - 0.30) / 0.40) * 0.25;
    let roll = hash_to_float(seed, 801 + step as u32);
    if roll >= intensity {
        return 0;
    }
    let dir = hash_to_float(seed, 1801 + step as u32);
    if dir < 0.33 {
        -1
    } else if dir > 0.66 {
        1
    } else {
        0
    }
}

pub fn displacement_collides(mask: u64, n: u16, step: u16, dir: i8) -> bool {
    if dir == 0 {
        return false;
    }
    let target = ((step as i32 + dir as i32).rem_euclid(n as i32)) as usize;
    target == 0 || (mask >> target) & 1 == 1
}

/// BUILD-phase density/velocity coefficients (spec.md §4.10.4, Open
/// Question resolved toward the higher-coefficient variant).
const BUILD_DENSITY_COEF: f32 = 0.35;
const BUILD_VELOCITY_COEF: f32 = 0.15;
const FILL_DENSITY_COEF: f32 = 0.50;
const FILL_VELOCITY_COEF: f32 = 0.20;

/// `density_multiplier` is computed for completeness with spec.md §4.10.4
/// but has no consumer in this crate: the fill-burst trigger mechanism it
/// would feed is explicitly out of scope (spec.md §1).
pub fn density_multiplier(build: f32, is_build_zone: bool, is_fill_zone: bool, local_progress: f32) -> f32 {
    if is_fill_zone {
        1.0 + FILL_DENSITY_COEF * build
    } else if is_build_zone {
        1.0 + BUILD_DENSITY_COEF * build * local_progress
    } else {
        1.0
    }
}

const BASE_VELOCITY: f32 = 0.7;
const VELOCITY_MIN: f32 = 0.20;
const VELOCITY_MAX: f32 = 1.00;

/// Per-step velocity (spec.md §4.10.4): base 0.7, boosted through build/fill
/// phases, then an accent multiplicative bump at accent positions, clamped
/// to `[0.20, 1.00]`.
pub fn velocity(
    is_build_zone: bool,
    is_fill_zone: bool,
    local_progress: f32,
    build: f32,
    is_accent_position: bool,
    accent: f32,
) -> f32 {
    let mut v = BASE_VELOCITY;
    if is_fill_zone {
        v += FILL_VELOCITY_COEF * build;
    } else if is_build_zone {
        v += BUILD_VELOCITY_COEF * build * local_progress;
    }
    if is_accent_position {
        v *= 1.0 + 0.5 * accent;
    }
    v.clamp(VELOCITY_MIN, VELOCITY_MAX)
}

/// A step is an accent position if it's the downbeat or the backbeat
/// (half the pattern length).
pub fn is_accent_position(step: u16, pattern_length: u16) -> bool {
    step == 0 || step == pattern_length / 2
}

/// Fraction of the way through the build zone, `[0, 1]`, used by
/// [`velocity`] and [`density_multiplier`].
pub fn build_local_progress(progress: f32, build_zone_start: f32, fill_zone_start: f32) -> f32 {
    ((progress - build_zone_start) / (fill_zone_start - build_zone_start)).clamp(0.0, 1.0)
}

pub fn voice_accent_eligible(voice: Voice) -> bool {
    matches!(voice, Voice::Anchor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swing_only_perturbs_odd_steps() {
        for step in [0u16, 2, 4, 6] {
            assert_eq!(swing_offset_samples(step, 1000, 0.5, Zone::Build, 0.5, 7), 0);
        }
        let offset = swing_offset_samples(1, 1000, 1.0, Zone::Minimal, 0.0, 7);
        assert!(offset > 0);
    }

    #[test]
    fn minimal_zone_has_no_jitter() {
        for step in 0..16 {
            assert_eq!(micro_jitter_samples(step, Zone::Minimal, 1.0, 42), 0);
        }
    }

    #[test]
    fn displacement_inactive_outside_shape_band() {
        assert_eq!(micro_displacement(3, 0.1, 5), 0);
        assert_eq!(micro_displacement(3, 0.9, 5), 0);
    }

    #[test]
    fn displacement_collides_with_step_zero() {
        assert!(displacement_collides(0b1, 16, 15, 1));
    }

    #[test]
    fn velocity_stays_in_bounds() {
        for build in [0.0, 0.5, 1.0] {
            for accent in [0.0, 0.5, 1.0] {
                let v = velocity(true, false, 1.0, build, true, accent);
                assert!((VELOCITY_MIN..=VELOCITY_MAX).contains(&v));
                let v = velocity(false, true, 1.0, build, false, accent);
                assert!((VELOCITY_MIN..=VELOCITY_MAX).contains(&v));
            }
        }
    }

    #[test]
    fn build_velocity_nondecreasing_with_progress() {
        let mut last = 0.0;
        for p in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let v = velocity(true, false, p, 1.0, false, 0.0);
            assert!(v >= last);
            last = v;
        }
    }

    #[test]
    fn accent_position_detection() {
        assert!(is_accent_position(0, 16));
        assert!(is_accent_position(8, 16));
        assert!(!is_accent_position(4, 16));
    }
}
