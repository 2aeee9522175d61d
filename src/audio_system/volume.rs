//! Volume conversion between linear gain and backend attenuation
//!
//! Backends take volume as a millibel attenuation level: 0 is unity gain,
//! negative values attenuate, `MILLIBEL_MIN` is silence.

/// Attenuation level in millibels (hundredths of a decibel)
pub type Millibel = i16;

/// Quietest level a backend accepts; treated as silence
pub const MILLIBEL_MIN: Millibel = i16::MIN;

pub const MILLIBEL_MAX: Millibel = i16::MAX;

/// Convert a linear gain to millibels: `round(2000 * log10(linear))`.
///
/// Zero, negative and NaN gains clamp to `MILLIBEL_MIN`; `1.0` maps to 0.
pub fn to_attenuation_units(linear: f32) -> Millibel {
    let gain = linear.max(f32::MIN_POSITIVE);
    let level = (2000.0 * gain.log10()).round();
    level.clamp(MILLIBEL_MIN as f32, MILLIBEL_MAX as f32) as Millibel
}

/// Convert millibels back to a linear gain. `MILLIBEL_MIN` maps to 0.
pub fn from_attenuation_units(level: Millibel) -> f32 {
    if level == MILLIBEL_MIN {
        return 0.0;
    }
    10f32.powf(level as f32 / 2000.0)
}

/// Process-wide effects volume, kept within 0.0-1.0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectVolume {
    level: f32,
}

impl EffectVolume {
    pub fn new(level: f32) -> Self {
        Self {
            level: clamp_unit(level),
        }
    }

    /// Get the linear volume level
    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn set_level(&mut self, level: f32) {
        self.level = clamp_unit(level);
    }

    /// Level as understood by the backend volume interface
    pub fn attenuation(&self) -> Millibel {
        to_attenuation_units(self.level)
    }

    pub fn is_muted(&self) -> bool {
        self.level == 0.0
    }
}

impl Default for EffectVolume {
    fn default() -> Self {
        Self { level: 1.0 }
    }
}

fn clamp_unit(level: f32) -> f32 {
    if level.is_nan() {
        0.0
    } else {
        level.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unity_gain_is_zero() {
        assert_eq!(to_attenuation_units(1.0), 0);
    }

    #[test]
    fn test_silence_clamps_to_min() {
        assert_eq!(to_attenuation_units(0.0), MILLIBEL_MIN);
        assert_eq!(to_attenuation_units(-1.0), MILLIBEL_MIN);
        assert_eq!(to_attenuation_units(f32::NAN), MILLIBEL_MIN);
    }

    #[test]
    fn test_known_levels() {
        // Half amplitude is about -6 dB
        assert_eq!(to_attenuation_units(0.5), -602);
        assert_eq!(to_attenuation_units(0.1), -2000);
        assert_eq!(to_attenuation_units(0.01), -4000);
    }

    #[test]
    fn test_monotonic_over_unit_range() {
        let mut previous = to_attenuation_units(0.0);
        for step in 1..=1000 {
            let level = to_attenuation_units(step as f32 / 1000.0);
            assert!(
                level >= previous,
                "attenuation decreased at step {}: {} < {}",
                step,
                level,
                previous
            );
            previous = level;
        }
        assert_eq!(previous, 0);
    }

    #[test]
    fn test_inverse_conversion() {
        assert_eq!(from_attenuation_units(MILLIBEL_MIN), 0.0);
        assert!((from_attenuation_units(0) - 1.0).abs() < f32::EPSILON);
        assert!((from_attenuation_units(-2000) - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_effect_volume_clamping() {
        let volume = EffectVolume::new(1.5);
        assert_eq!(volume.level(), 1.0);

        let volume = EffectVolume::new(-0.5);
        assert_eq!(volume.level(), 0.0);
        assert!(volume.is_muted());
        assert_eq!(volume.attenuation(), MILLIBEL_MIN);
    }

    #[test]
    fn test_effect_volume_set_level() {
        let mut volume = EffectVolume::default();
        assert_eq!(volume.level(), 1.0);
        assert_eq!(volume.attenuation(), 0);

        volume.set_level(0.5);
        assert_eq!(volume.level(), 0.5);

        volume.set_level(f32::NAN);
        assert_eq!(volume.level(), 0.0);
    }
}
