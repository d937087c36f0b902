use crate::error::JpeglsError;

const MAX_C: i32 = 127;
const MIN_C: i32 = -128;
const MAX_K_VALUE: i32 = 16;
const STATISTICS_LIMIT: i32 = 65536 * 256;

/// Context statistics A, B, C and N for one of the 365 regular mode contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegularModeContext {
    a: i32,
    b: i32,
    c: i32,
    n: i32,
}

impl RegularModeContext {
    pub fn new(range: i32) -> Self {
        Self {
            a: initialization_value_for_a(range),
            b: 0,
            c: 0,
            n: 1,
        }
    }

    pub fn c(&self) -> i32 {
        self.c
    }

    /// True when the mapped error must be inverted (A.5.2, k == 0 and NEAR == 0).
    pub fn requires_error_correction(&self, k: i32, near_lossless: i32) -> bool {
        k == 0 && near_lossless == 0 && 2 * self.b + self.n - 1 < 0
    }

    // Code segments A.12 and A.13
    pub fn update_variables_and_bias(
        &mut self,
        error_value: i32,
        near_lossless: i32,
        reset_threshold: i32,
    ) -> Result<(), JpeglsError> {
        self.a += error_value.abs();
        self.b += error_value * (2 * near_lossless + 1);

        if self.a >= STATISTICS_LIMIT || self.b.abs() >= STATISTICS_LIMIT {
            return Err(JpeglsError::InvalidEncodedData);
        }

        if self.n == reset_threshold {
            self.a >>= 1;
            self.b >>= 1;
            self.n >>= 1;
        }

        self.n += 1;

        if self.b + self.n <= 0 {
            self.b += self.n;
            if self.b <= -self.n {
                self.b = -self.n + 1;
            }
            if self.c > MIN_C {
                self.c -= 1;
            }
        } else if self.b > 0 {
            self.b -= self.n;
            if self.b > 0 {
                self.b = 0;
            }
            if self.c < MAX_C {
                self.c += 1;
            }
        }
        Ok(())
    }

    pub fn compute_golomb_coding_parameter(&self) -> Result<i32, JpeglsError> {
        let mut k = 0;
        while (self.n << k) < self.a && k < MAX_K_VALUE {
            k += 1;
        }

        if k == MAX_K_VALUE {
            return Err(JpeglsError::InvalidEncodedData);
        }
        Ok(k)
    }
}

pub(crate) fn initialization_value_for_a(range: i32) -> i32 {
    std::cmp::max(2, (range + 32) / 64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let context = RegularModeContext::new(256);
        assert_eq!(context.c(), 0);
        assert_eq!(context.compute_golomb_coding_parameter(), Ok(2));
        assert_eq!(
            RegularModeContext::new(65536).compute_golomb_coding_parameter(),
            Ok(10)
        );
    }

    #[test]
    fn test_bias_moves_towards_error() {
        let mut context = RegularModeContext::new(256);
        for _ in 0..4 {
            context.update_variables_and_bias(5, 0, 64).unwrap();
        }
        assert!(context.c() > 0);

        let mut context = RegularModeContext::new(256);
        for _ in 0..4 {
            context.update_variables_and_bias(-5, 0, 64).unwrap();
        }
        assert!(context.c() < 0);
    }

    #[test]
    fn test_bias_is_bounded() {
        let mut context = RegularModeContext::new(256);
        for _ in 0..1000 {
            context.update_variables_and_bias(100, 0, 64).unwrap();
        }
        assert_eq!(context.c(), MAX_C);
    }

    #[test]
    fn test_error_correction_only_for_k_zero() {
        let mut context = RegularModeContext::new(256);
        for _ in 0..3 {
            context.update_variables_and_bias(-1, 0, 64).unwrap();
        }
        assert!(!context.requires_error_correction(1, 0));
        assert!(!context.requires_error_correction(0, 2));
    }

    #[test]
    fn test_overflow_is_invalid_data() {
        let mut context = RegularModeContext::new(256);
        assert_eq!(
            context.update_variables_and_bias(STATISTICS_LIMIT, 0, 64),
            Err(JpeglsError::InvalidEncodedData)
        );
    }
}
