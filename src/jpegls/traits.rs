//! Derived coding values and the arithmetic shared by the scan encoder and decoder.

use crate::JpeglsPcParameters;
use std::cmp::{max, min};

/// Values derived from the preset coding parameters and the near lossless tolerance
/// (ISO/IEC 14495-1, A.2.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodingTraits {
    pub maximum_sample_value: i32,
    pub near_lossless: i32,
    pub range: i32,
    pub quantized_bits_per_sample: i32,
    pub limit: i32,
    pub reset_threshold: i32,
    pub threshold1: i32,
    pub threshold2: i32,
    pub threshold3: i32,
}

impl CodingTraits {
    /// `pc` must be validated, with every default filled in.
    pub fn new(pc: &JpeglsPcParameters, near_lossless: i32) -> Self {
        let maximum_sample_value = pc.maximum_sample_value;
        let range = (maximum_sample_value + 2 * near_lossless) / (2 * near_lossless + 1) + 1;
        let bits_per_sample = max(2, log2_ceil(maximum_sample_value + 1));

        Self {
            maximum_sample_value,
            near_lossless,
            range,
            quantized_bits_per_sample: log2_ceil(range),
            limit: 2 * (bits_per_sample + max(8, bits_per_sample)),
            reset_threshold: pc.reset_value,
            threshold1: pc.threshold1,
            threshold2: pc.threshold2,
            threshold3: pc.threshold3,
        }
    }

    pub fn is_near(&self, lhs: i32, rhs: i32) -> bool {
        (lhs - rhs).abs() <= self.near_lossless
    }

    pub fn correct_prediction(&self, predicted: i32) -> i32 {
        predicted.clamp(0, self.maximum_sample_value)
    }

    /// Quantizes the prediction error (A.4.4) and reduces it modulo RANGE (A.4.5).
    pub fn compute_error_value(&self, error_value: i32) -> i32 {
        self.modulo_range(self.quantize(error_value))
    }

    pub fn compute_reconstructed_sample(&self, predicted_value: i32, error_value: i32) -> i32 {
        self.fix_reconstructed_value(predicted_value + error_value * (2 * self.near_lossless + 1))
    }

    /// Context number Q from the three local gradients (A.3.3 and A.3.4).
    pub fn compute_context_id(&self, d1: i32, d2: i32, d3: i32) -> i32 {
        (self.quantize_gradient(d1) * 9 + self.quantize_gradient(d2)) * 9
            + self.quantize_gradient(d3)
    }

    fn quantize_gradient(&self, di: i32) -> i32 {
        if di <= -self.threshold3 {
            -4
        } else if di <= -self.threshold2 {
            -3
        } else if di <= -self.threshold1 {
            -2
        } else if di < -self.near_lossless {
            -1
        } else if di <= self.near_lossless {
            0
        } else if di < self.threshold1 {
            1
        } else if di < self.threshold2 {
            2
        } else if di < self.threshold3 {
            3
        } else {
            4
        }
    }

    fn quantize(&self, error_value: i32) -> i32 {
        if error_value > 0 {
            (error_value + self.near_lossless) / (2 * self.near_lossless + 1)
        } else {
            -(self.near_lossless - error_value) / (2 * self.near_lossless + 1)
        }
    }

    fn modulo_range(&self, mut error_value: i32) -> i32 {
        if error_value < 0 {
            error_value += self.range;
        }
        if error_value >= (self.range + 1) / 2 {
            error_value -= self.range;
        }
        error_value
    }

    fn fix_reconstructed_value(&self, mut value: i32) -> i32 {
        let wrap = self.range * (2 * self.near_lossless + 1);
        if value < -self.near_lossless {
            value += wrap;
        } else if value > self.maximum_sample_value + self.near_lossless {
            value -= wrap;
        }
        self.correct_prediction(value)
    }
}

/// Median edge detector (A.4.1).
pub fn get_predicted_value(ra: i32, rb: i32, rc: i32) -> i32 {
    if rc >= max(ra, rb) {
        min(ra, rb)
    } else if rc <= min(ra, rb) {
        max(ra, rb)
    } else {
        ra + rb - rc
    }
}

/// +1 for zero and positive values, -1 otherwise.
pub fn sign(value: i32) -> i32 {
    if value >= 0 { 1 } else { -1 }
}

pub fn apply_sign(value: i32, sign: i32) -> i32 {
    if sign < 0 { -value } else { value }
}

/// Error value mapping of A.5.2, without the k == 0 correction.
pub fn map_error_value(error_value: i32) -> i32 {
    if error_value >= 0 {
        2 * error_value
    } else {
        -2 * error_value - 1
    }
}

pub fn unmap_error_value(mapped_error_value: i32) -> i32 {
    if mapped_error_value & 1 == 0 {
        mapped_error_value >> 1
    } else {
        -(mapped_error_value >> 1) - 1
    }
}

/// Smallest `n` with `1 << n >= value`.
fn log2_ceil(value: i32) -> i32 {
    let mut n = 0;
    while (1i64 << n) < value as i64 {
        n += 1;
    }
    n
}

/// Reads sample `index` from a buffer with one (8 bits or less) or two (little endian) bytes
/// per sample.
pub fn get_sample(buffer: &[u8], index: usize, bytes_per_sample: usize) -> i32 {
    if bytes_per_sample == 1 {
        buffer[index] as i32
    } else {
        u16::from_le_bytes([buffer[2 * index], buffer[2 * index + 1]]) as i32
    }
}

pub fn set_sample(buffer: &mut [u8], index: usize, bytes_per_sample: usize, value: i32) {
    if bytes_per_sample == 1 {
        buffer[index] = value as u8;
    } else {
        buffer[2 * index..2 * index + 2].copy_from_slice(&(value as u16).to_le_bytes());
    }
}
