//! HP reversible color transforms, applied before encoding and after decoding a
//! three component scan. Arithmetic wraps at `1 << bits_per_sample`, so only 8 and
//! 16 bit samples are accepted.

use crate::ColorTransformation;

pub fn forward(
    transformation: ColorTransformation,
    bits_per_sample: i32,
    rgb: [i32; 3],
) -> [i32; 3] {
    let range = 1 << bits_per_sample;
    let mask = range - 1;
    let [red, green, blue] = rgb;

    match transformation {
        ColorTransformation::None => rgb,
        ColorTransformation::Hp1 => [
            (red - green + range / 2) & mask,
            green,
            (blue - green + range / 2) & mask,
        ],
        ColorTransformation::Hp2 => [
            (red - green + range / 2) & mask,
            green,
            (blue - ((red + green) >> 1) - range / 2) & mask,
        ],
        ColorTransformation::Hp3 => {
            let v2 = (blue - green + range / 2) & mask;
            let v3 = (red - green + range / 2) & mask;
            [(green + ((v2 + v3) >> 2) - range / 4) & mask, v2, v3]
        }
    }
}

pub fn inverse(transformation: ColorTransformation, bits_per_sample: i32, v: [i32; 3]) -> [i32; 3] {
    let range = 1 << bits_per_sample;
    let mask = range - 1;
    let [v1, v2, v3] = v;

    match transformation {
        ColorTransformation::None => v,
        ColorTransformation::Hp1 => [
            (v1 + v2 - range / 2) & mask,
            v2,
            (v3 + v2 - range / 2) & mask,
        ],
        ColorTransformation::Hp2 => {
            let red = (v1 + v2 - range / 2) & mask;
            [red, v2, (v3 + ((red + v2) >> 1) - range / 2) & mask]
        }
        ColorTransformation::Hp3 => {
            let green = (v1 - ((v3 + v2) >> 2) + range / 4) & mask;
            [
                (v3 + green - range / 2) & mask,
                green,
                (v2 + green - range / 2) & mask,
            ]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRANSFORMS: [ColorTransformation; 3] = [
        ColorTransformation::Hp1,
        ColorTransformation::Hp2,
        ColorTransformation::Hp3,
    ];

    #[test]
    fn test_hp1_values() {
        assert_eq!(
            forward(ColorTransformation::Hp1, 8, [10, 20, 30]),
            [118, 20, 138]
        );
    }

    #[test]
    fn test_inverse_restores_8_bit_samples() {
        for transformation in TRANSFORMS {
            for rgb in [
                [0, 0, 0],
                [255, 255, 255],
                [255, 0, 128],
                [1, 254, 77],
                [13, 200, 31],
            ] {
                let transformed = forward(transformation, 8, rgb);
                assert!(transformed.iter().all(|v| (0..256).contains(v)));
                assert_eq!(
                    inverse(transformation, 8, transformed),
                    rgb,
                    "{transformation:?}"
                );
            }
        }
    }

    #[test]
    fn test_inverse_restores_16_bit_samples() {
        for transformation in TRANSFORMS {
            for rgb in [[0, 65535, 0], [65535, 1, 40000], [1234, 5678, 9012]] {
                assert_eq!(
                    inverse(transformation, 16, forward(transformation, 16, rgb)),
                    rgb
                );
            }
        }
    }
}
