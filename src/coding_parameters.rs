//! Coding parameters of a JPEG-LS scan and the preset coding parameters (LSE type 1).

use crate::constants::DEFAULT_RESET_THRESHOLD;
use crate::{ColorTransformation, InterleaveMode};
use std::cmp::{max, min};

/// Parameters carried by the SOS segment (and the HP color transform and DRI segments).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CodingParameters {
    pub near_lossless: i32,
    pub restart_interval: u32,
    pub interleave_mode: InterleaveMode,
    pub transformation: ColorTransformation,
}

/// JPEG-LS preset coding parameters.
///
/// A zero field means "use the default for this field", so the all-zero value
/// requests the defaults of ISO/IEC 14495-1, C.2.4.1.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JpeglsPcParameters {
    pub maximum_sample_value: i32,
    pub threshold1: i32,
    pub threshold2: i32,
    pub threshold3: i32,
    pub reset_value: i32,
}

impl JpeglsPcParameters {
    pub fn is_all_default(&self) -> bool {
        *self == Self::default()
    }
}

// Clamping function as defined by ISO/IEC 14495-1, Figure C.3
const fn clamp(i: i32, j: i32, maximum_sample_value: i32) -> i32 {
    if i > maximum_sample_value || i < j {
        j
    } else {
        i
    }
}

pub fn compute_maximum_sample_value(bits_per_sample: i32) -> i32 {
    (1 << bits_per_sample) - 1
}

pub fn compute_maximum_near_lossless(maximum_sample_value: i32) -> i32 {
    debug_assert!(maximum_sample_value >= 1);
    min(255, maximum_sample_value / 2)
}

// Default coding threshold values as defined by ISO/IEC 14495-1, C.2.4.1.1.1
pub fn compute_default(maximum_sample_value: i32, near_lossless: i32) -> JpeglsPcParameters {
    debug_assert!(maximum_sample_value <= u16::MAX as i32);
    debug_assert!(
        near_lossless >= 0 && near_lossless <= compute_maximum_near_lossless(maximum_sample_value)
    );

    // Default threshold values for JPEG-LS statistical modeling as defined in ISO/IEC 14495-1,
    // table C.3 for the case MAXVAL = 255 and NEAR = 0.
    const DEFAULT_THRESHOLD1: i32 = 3; // BASIC_T1
    const DEFAULT_THRESHOLD2: i32 = 7; // BASIC_T2
    const DEFAULT_THRESHOLD3: i32 = 21; // BASIC_T3

    if maximum_sample_value >= 128 {
        let factor = (min(maximum_sample_value, 4095) + 128) / 256;
        let threshold1 = clamp(
            factor * (DEFAULT_THRESHOLD1 - 2) + 2 + 3 * near_lossless,
            near_lossless + 1,
            maximum_sample_value,
        );
        let threshold2 = clamp(
            factor * (DEFAULT_THRESHOLD2 - 3) + 3 + 5 * near_lossless,
            threshold1,
            maximum_sample_value,
        );

        JpeglsPcParameters {
            maximum_sample_value,
            threshold1,
            threshold2,
            threshold3: clamp(
                factor * (DEFAULT_THRESHOLD3 - 4) + 4 + 7 * near_lossless,
                threshold2,
                maximum_sample_value,
            ),
            reset_value: DEFAULT_RESET_THRESHOLD,
        }
    } else {
        let factor = 256 / (maximum_sample_value + 1);
        let threshold1 = clamp(
            max(2, DEFAULT_THRESHOLD1 / factor + 3 * near_lossless),
            near_lossless + 1,
            maximum_sample_value,
        );
        let threshold2 = clamp(
            max(3, DEFAULT_THRESHOLD2 / factor + 5 * near_lossless),
            threshold1,
            maximum_sample_value,
        );

        JpeglsPcParameters {
            maximum_sample_value,
            threshold1,
            threshold2,
            threshold3: clamp(
                max(4, DEFAULT_THRESHOLD3 / factor + 7 * near_lossless),
                threshold2,
                maximum_sample_value,
            ),
            reset_value: DEFAULT_RESET_THRESHOLD,
        }
    }
}

/// True when `preset_coding_parameters` is the all-zero sentinel or equal to `defaults`.
pub fn is_default(
    preset_coding_parameters: &JpeglsPcParameters,
    defaults: &JpeglsPcParameters,
) -> bool {
    preset_coding_parameters.is_all_default() || preset_coding_parameters == defaults
}

/// Checks the preset coding parameters against ISO/IEC 14495-1, C.2.4.1.1, Table C.1 and
/// returns them with every zero field replaced by its default.
pub fn validate(
    pc_parameters: &JpeglsPcParameters,
    maximum_component_value: i32,
    near_lossless: i32,
) -> Option<JpeglsPcParameters> {
    debug_assert!(maximum_component_value >= 3 && maximum_component_value <= u16::MAX as i32);

    if pc_parameters.maximum_sample_value != 0
        && (pc_parameters.maximum_sample_value < 1
            || pc_parameters.maximum_sample_value > maximum_component_value)
    {
        return None;
    }

    let maximum_sample_value = if pc_parameters.maximum_sample_value != 0 {
        pc_parameters.maximum_sample_value
    } else {
        maximum_component_value
    };

    if near_lossless > compute_maximum_near_lossless(maximum_sample_value) {
        return None;
    }

    if pc_parameters.threshold1 != 0
        && (pc_parameters.threshold1 < near_lossless + 1
            || pc_parameters.threshold1 > maximum_sample_value)
    {
        return None;
    }

    let defaults = compute_default(maximum_sample_value, near_lossless);

    let threshold1 = if pc_parameters.threshold1 != 0 {
        pc_parameters.threshold1
    } else {
        defaults.threshold1
    };

    if pc_parameters.threshold2 != 0
        && (pc_parameters.threshold2 < threshold1
            || pc_parameters.threshold2 > maximum_sample_value)
    {
        return None;
    }

    let threshold2 = if pc_parameters.threshold2 != 0 {
        pc_parameters.threshold2
    } else {
        defaults.threshold2
    };

    if pc_parameters.threshold3 != 0
        && (pc_parameters.threshold3 < threshold2
            || pc_parameters.threshold3 > maximum_sample_value)
    {
        return None;
    }

    if pc_parameters.reset_value != 0
        && (pc_parameters.reset_value < 3
            || pc_parameters.reset_value > max(255, maximum_sample_value))
    {
        return None;
    }

    Some(JpeglsPcParameters {
        maximum_sample_value,
        threshold1,
        threshold2,
        threshold3: if pc_parameters.threshold3 != 0 {
            pc_parameters.threshold3
        } else {
            defaults.threshold3
        },
        reset_value: if pc_parameters.reset_value != 0 {
            pc_parameters.reset_value
        } else {
            defaults.reset_value
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pc(maximum_sample_value: i32, t1: i32, t2: i32, t3: i32, reset: i32) -> JpeglsPcParameters {
        JpeglsPcParameters {
            maximum_sample_value,
            threshold1: t1,
            threshold2: t2,
            threshold3: t3,
            reset_value: reset,
        }
    }

    #[test]
    fn test_default_8_bit() {
        assert_eq!(compute_default(255, 0), pc(255, 3, 7, 21, 64));
    }

    #[test]
    fn test_default_12_bit() {
        assert_eq!(compute_default(4095, 0), pc(4095, 18, 67, 276, 64));
    }

    #[test]
    fn test_default_16_bit() {
        assert_eq!(compute_default(65535, 0), pc(65535, 18, 67, 276, 64));
    }

    #[test]
    fn test_default_near_lossless_8_bit() {
        assert_eq!(compute_default(255, 3), pc(255, 12, 22, 42, 64));
    }

    #[test]
    fn test_default_low_bit_depth() {
        // MAXVAL 15: factor 16, thresholds fall back to their minimum values.
        assert_eq!(compute_default(15, 0), pc(15, 2, 3, 4, 64));
    }

    #[test]
    fn test_default_is_pure() {
        assert_eq!(compute_default(255, 0), compute_default(255, 0));
    }

    #[test]
    fn test_maximum_near_lossless() {
        assert_eq!(compute_maximum_near_lossless(255), 127);
        assert_eq!(compute_maximum_near_lossless(65535), 255);
        assert_eq!(compute_maximum_near_lossless(3), 1);
    }

    #[test]
    fn test_is_default() {
        let defaults = compute_default(255, 0);
        assert!(is_default(&JpeglsPcParameters::default(), &defaults));
        assert!(is_default(&defaults, &defaults));
        assert!(!is_default(&pc(255, 4, 7, 21, 64), &defaults));
    }

    #[test]
    fn test_validate_fills_defaults() {
        let validated = validate(&pc(0, 0, 10, 0, 0), 255, 0);
        assert_eq!(validated, Some(pc(255, 3, 10, 21, 64)));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        assert_eq!(validate(&pc(256, 0, 0, 0, 0), 255, 0), None);
        assert_eq!(validate(&pc(0, 8, 7, 0, 0), 255, 0), None);
        assert_eq!(validate(&pc(0, 0, 0, 300, 0), 255, 0), None);
        assert_eq!(validate(&pc(0, 0, 0, 0, 2), 255, 0), None);
        assert_eq!(validate(&pc(0, 2, 0, 0, 0), 255, 2), None);
    }

    #[test]
    fn test_validate_rejects_near_lossless_above_maximum() {
        assert_eq!(validate(&JpeglsPcParameters::default(), 255, 128), None);
        assert!(validate(&JpeglsPcParameters::default(), 255, 127).is_some());
    }
}
