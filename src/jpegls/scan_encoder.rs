use super::color_transform;
use super::line_buffer::{LineLayout, allocate_line, initialize_edges};
use super::regular_mode_context::RegularModeContext;
use super::run_mode_context::RunModeContext;
use super::traits::{
    CodingTraits, apply_sign, get_predicted_value, get_sample, map_error_value, sign,
};
use crate::constants::{CONTEXT_COUNT, J, MAXIMUM_COMPONENT_COUNT_IN_SCAN};
use crate::error::JpeglsError;
use crate::jpeg_marker_code::JPEG_MARKER_START_BYTE;
use crate::{CodingParameters, ColorTransformation, FrameInfo};

/// Encodes the samples of a single scan into entropy coded bytes.
pub struct ScanEncoder<'a> {
    frame_info: FrameInfo,
    coding_parameters: CodingParameters,
    traits: CodingTraits,
    regular_mode_contexts: Vec<RegularModeContext>,
    run_mode_contexts: [RunModeContext; 2],
    run_index: usize,
    destination: &'a mut [u8],
    position: usize,
    bit_buffer: u32,
    free_bit_count: i32,
    is_ff_written: bool,
}

impl<'a> ScanEncoder<'a> {
    pub fn new(
        frame_info: FrameInfo,
        traits: CodingTraits,
        coding_parameters: CodingParameters,
        destination: &'a mut [u8],
    ) -> Self {
        Self {
            frame_info,
            coding_parameters,
            traits,
            regular_mode_contexts: vec![RegularModeContext::new(traits.range); CONTEXT_COUNT],
            run_mode_contexts: [
                RunModeContext::new(0, traits.range),
                RunModeContext::new(1, traits.range),
            ],
            run_index: 0,
            destination,
            position: 0,
            bit_buffer: 0,
            free_bit_count: 32,
            is_ff_written: false,
        }
    }

    /// Encodes `source` (pixel interleaved samples) and returns the number of bytes written.
    pub fn encode_scan(&mut self, source: &[u8]) -> Result<usize, JpeglsError> {
        let width = self.frame_info.width as usize;
        let component_count = self.frame_info.component_count as usize;
        let bytes_per_sample = if self.frame_info.bits_per_sample <= 8 {
            1
        } else {
            2
        };
        let transformation = self.coding_parameters.transformation;
        let interleave_mode = self.coding_parameters.interleave_mode;

        let layout = LineLayout::new(width, component_count, interleave_mode);
        let mut previous = allocate_line(layout.buffer_size())?;
        let mut current = allocate_line(layout.buffer_size())?;
        let mut run_indices = [0usize; MAXIMUM_COMPONENT_COUNT_IN_SCAN];
        let mut pixel = [0i32; MAXIMUM_COMPONENT_COUNT_IN_SCAN];

        for line in 0..self.frame_info.height as usize {
            for x in 0..width {
                let first_sample = (line * width + x) * component_count;
                for (component, value) in pixel.iter_mut().take(component_count).enumerate() {
                    *value = get_sample(source, first_sample + component, bytes_per_sample);
                }
                if transformation != ColorTransformation::None {
                    let transformed = color_transform::forward(
                        transformation,
                        self.frame_info.bits_per_sample,
                        [pixel[0], pixel[1], pixel[2]],
                    );
                    pixel[..3].copy_from_slice(&transformed);
                }
                for (component, value) in pixel.iter().take(component_count).enumerate() {
                    current[layout.index(x, component)] = *value;
                }
            }

            let (region_count, pixel_size) = layout.regions();
            let region_size = layout.region_size();
            for region in 0..region_count {
                let range = region * region_size..(region + 1) * region_size;
                let previous = &mut previous[range.clone()];
                let current = &mut current[range];
                initialize_edges(previous, current, width, pixel_size);

                self.run_index = run_indices[region];
                self.encode_line(previous, current, pixel_size)?;
                run_indices[region] = self.run_index;
            }

            std::mem::swap(&mut previous, &mut current);
        }

        self.end_scan()?;
        Ok(self.position)
    }

    fn encode_line(
        &mut self,
        previous: &[i32],
        current: &mut [i32],
        pixel_size: usize,
    ) -> Result<(), JpeglsError> {
        let width = self.frame_info.width as usize;
        let mut context_ids = [0i32; MAXIMUM_COMPONENT_COUNT_IN_SCAN];
        let mut index = 0;

        while index < width {
            let base = index * pixel_size;
            for (component, qs) in context_ids.iter_mut().take(pixel_size).enumerate() {
                let ra = current[base + component];
                let rc = previous[base + component];
                let rb = previous[base + pixel_size + component];
                let rd = previous[base + 2 * pixel_size + component];
                *qs = self.traits.compute_context_id(rd - rb, rb - rc, rc - ra);
            }

            if context_ids[..pixel_size].iter().all(|&qs| qs == 0) {
                index += self.encode_run_mode(previous, current, index, pixel_size)?;
                continue;
            }

            for (component, &qs) in context_ids.iter().take(pixel_size).enumerate() {
                let ra = current[base + component];
                let rc = previous[base + component];
                let rb = previous[base + pixel_size + component];
                let offset = base + pixel_size + component;
                let predicted = get_predicted_value(ra, rb, rc);
                current[offset] = self.encode_regular(qs, current[offset], predicted)?;
            }
            index += 1;
        }
        Ok(())
    }

    fn encode_regular(&mut self, qs: i32, x: i32, predicted: i32) -> Result<i32, JpeglsError> {
        let traits = self.traits;
        let sign = sign(qs);
        let context_index = qs.unsigned_abs() as usize;
        let context = self.regular_mode_contexts[context_index];
        let k = context.compute_golomb_coding_parameter()?;
        let predicted_value = traits.correct_prediction(predicted + apply_sign(context.c(), sign));
        let error_value = traits.compute_error_value(apply_sign(x - predicted_value, sign));

        let mapped_error_value = if context.requires_error_correction(k, traits.near_lossless) {
            map_error_value(!error_value)
        } else {
            map_error_value(error_value)
        };
        self.encode_mapped_value(k, mapped_error_value, traits.limit)?;
        self.regular_mode_contexts[context_index]
            .update_variables_and_bias(error_value, traits.near_lossless, traits.reset_threshold)?;

        Ok(traits.compute_reconstructed_sample(predicted_value, apply_sign(error_value, sign)))
    }

    /// Codes a run starting at pixel `start_index`, including its interruption sample.
    /// Returns the number of pixels coded.
    fn encode_run_mode(
        &mut self,
        previous: &[i32],
        current: &mut [i32],
        start_index: usize,
        pixel_size: usize,
    ) -> Result<usize, JpeglsError> {
        let traits = self.traits;
        let width = self.frame_info.width as usize;
        let remaining = width - start_index;
        let start = start_index * pixel_size;
        let mut ra = [0i32; MAXIMUM_COMPONENT_COUNT_IN_SCAN];
        ra[..pixel_size].copy_from_slice(&current[start..start + pixel_size]);

        let mut run_length = 0;
        while run_length < remaining {
            let offset = (start_index + run_length + 1) * pixel_size;
            let pixel = &mut current[offset..offset + pixel_size];
            if !pixel.iter().zip(&ra).all(|(&x, &a)| traits.is_near(x, a)) {
                break;
            }
            pixel.copy_from_slice(&ra[..pixel_size]);
            run_length += 1;
        }

        self.encode_run_pixels(run_length, run_length == remaining)?;
        if run_length == remaining {
            return Ok(run_length);
        }

        let offset = (start_index + run_length + 1) * pixel_size;
        if pixel_size == 1 {
            current[offset] =
                self.encode_run_interruption_pixel(current[offset], ra[0], previous[offset])?;
        } else {
            for component in 0..pixel_size {
                let rb = previous[offset + component];
                let sign = sign(rb - ra[component]);
                let sample = current[offset + component];
                let error_value = traits.compute_error_value(sign * (sample - rb));
                self.encode_run_interruption_error(0, error_value)?;
                current[offset + component] =
                    traits.compute_reconstructed_sample(rb, error_value * sign);
            }
        }

        self.decrement_run_index();
        Ok(run_length + 1)
    }

    fn encode_run_pixels(
        &mut self,
        mut run_length: usize,
        end_of_line: bool,
    ) -> Result<(), JpeglsError> {
        while run_length >= 1 << J[self.run_index] {
            self.append_to_bit_stream(1, 1)?;
            run_length -= 1 << J[self.run_index];
            self.increment_run_index();
        }

        if end_of_line {
            if run_length != 0 {
                self.append_to_bit_stream(1, 1)?;
            }
            Ok(())
        } else {
            // A leading zero followed by the remaining length.
            self.append_to_bit_stream(run_length as u32, J[self.run_index] + 1)
        }
    }

    fn encode_run_interruption_pixel(
        &mut self,
        x: i32,
        ra: i32,
        rb: i32,
    ) -> Result<i32, JpeglsError> {
        let traits = self.traits;
        if traits.is_near(ra, rb) {
            let error_value = traits.compute_error_value(x - ra);
            self.encode_run_interruption_error(1, error_value)?;
            return Ok(traits.compute_reconstructed_sample(ra, error_value));
        }

        let sign = sign(rb - ra);
        let error_value = traits.compute_error_value((x - rb) * sign);
        self.encode_run_interruption_error(0, error_value)?;
        Ok(traits.compute_reconstructed_sample(rb, error_value * sign))
    }

    fn encode_run_interruption_error(
        &mut self,
        context_index: usize,
        error_value: i32,
    ) -> Result<(), JpeglsError> {
        let context = self.run_mode_contexts[context_index];
        let k = context.compute_golomb_coding_parameter()?;
        let map = context.compute_map(error_value, k);
        let e_mapped_error_value =
            2 * error_value.abs() - context.run_interruption_type() - map as i32;

        let limit = self.traits.limit - J[self.run_index] - 1;
        self.encode_mapped_value(k, e_mapped_error_value, limit)?;
        self.run_mode_contexts[context_index].update_variables(
            error_value,
            e_mapped_error_value,
            self.traits.reset_threshold,
        );
        Ok(())
    }

    /// Limited length Golomb code (A.5.3).
    fn encode_mapped_value(
        &mut self,
        k: i32,
        mapped_error: i32,
        limit: i32,
    ) -> Result<(), JpeglsError> {
        let qbpp = self.traits.quantized_bits_per_sample;
        let mut high_bits = mapped_error >> k;

        if high_bits < limit - qbpp - 1 {
            if high_bits + 1 > 31 {
                self.append_to_bit_stream(0, high_bits / 2)?;
                high_bits -= high_bits / 2;
            }
            self.append_to_bit_stream(1, high_bits + 1)?;
            return self.append_to_bit_stream((mapped_error & ((1 << k) - 1)) as u32, k);
        }

        if limit - qbpp > 31 {
            self.append_to_bit_stream(0, 31)?;
            self.append_to_bit_stream(1, limit - qbpp - 31)?;
        } else {
            self.append_to_bit_stream(1, limit - qbpp)?;
        }
        self.append_to_bit_stream(((mapped_error - 1) & ((1 << qbpp) - 1)) as u32, qbpp)
    }

    fn increment_run_index(&mut self) {
        self.run_index = (self.run_index + 1).min(J.len() - 1);
    }

    fn decrement_run_index(&mut self) {
        self.run_index = self.run_index.saturating_sub(1);
    }

    fn append_to_bit_stream(&mut self, bits: u32, bit_count: i32) -> Result<(), JpeglsError> {
        if bit_count == 0 {
            return Ok(());
        }

        self.free_bit_count -= bit_count;
        if self.free_bit_count >= 0 {
            self.bit_buffer |= bits << self.free_bit_count;
            return Ok(());
        }

        // Fill the buffer with the high bits, flush, then store the rest.
        self.bit_buffer |= bits >> -self.free_bit_count;
        self.flush()?;

        // A second flush is needed when stuffed bits kept the first one from draining the buffer.
        if self.free_bit_count < 0 {
            self.bit_buffer |= bits >> -self.free_bit_count;
            self.flush()?;
        }

        self.bit_buffer |= bits << self.free_bit_count;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), JpeglsError> {
        for _ in 0..4 {
            if self.free_bit_count >= 32 {
                self.free_bit_count = 32;
                break;
            }

            let value = if self.is_ff_written {
                // After 0xFF only 7 bits are written; the most significant bit stays 0.
                let value = (self.bit_buffer >> 25) as u8;
                self.bit_buffer <<= 7;
                self.free_bit_count += 7;
                value
            } else {
                let value = (self.bit_buffer >> 24) as u8;
                self.bit_buffer <<= 8;
                self.free_bit_count += 8;
                value
            };

            self.write_byte(value)?;
            self.is_ff_written = value == JPEG_MARKER_START_BYTE;
        }

        // Four unstuffed bytes can push the count past the buffer width.
        self.free_bit_count = self.free_bit_count.min(32);
        Ok(())
    }

    fn write_byte(&mut self, value: u8) -> Result<(), JpeglsError> {
        let slot = self
            .destination
            .get_mut(self.position)
            .ok_or(JpeglsError::DestinationBufferTooSmall)?;
        *slot = value;
        self.position += 1;
        Ok(())
    }

    fn end_scan(&mut self) -> Result<(), JpeglsError> {
        self.flush()?;

        // After 0xFF the flush writes a stuffed zero bit on its own.
        let padding = if self.is_ff_written {
            (self.free_bit_count - 1) % 8
        } else {
            self.free_bit_count % 8
        };
        self.append_to_bit_stream(0, padding)?;
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InterleaveMode;
    use crate::coding_parameters::compute_default;

    fn encode(
        frame_info: FrameInfo,
        source: &[u8],
        destination: &mut [u8],
    ) -> Result<usize, JpeglsError> {
        let maximum_sample_value = (1 << frame_info.bits_per_sample) - 1;
        let traits = CodingTraits::new(&compute_default(maximum_sample_value, 0), 0);
        let coding_parameters = CodingParameters {
            interleave_mode: if frame_info.component_count == 1 {
                InterleaveMode::None
            } else {
                InterleaveMode::Sample
            },
            ..Default::default()
        };
        ScanEncoder::new(frame_info, traits, coding_parameters, destination).encode_scan(source)
    }

    fn frame(width: u32, height: u32, component_count: i32) -> FrameInfo {
        FrameInfo {
            width,
            height,
            bits_per_sample: 8,
            component_count,
        }
    }

    #[test]
    fn test_flat_image_is_a_few_bytes() {
        let source = vec![0u8; 64 * 64];
        let mut destination = vec![0u8; 1024];
        let size = encode(frame(64, 64, 1), &source, &mut destination).unwrap();
        assert!(size > 0 && size < 64, "{size}");
    }

    #[test]
    fn test_output_never_contains_markers() {
        let source: Vec<u8> = (0..128 * 32).map(|i| ((i * 7919) % 256) as u8).collect();
        let mut destination = vec![0u8; source.len() * 2];
        let size = encode(frame(128, 32, 1), &source, &mut destination).unwrap();
        let encoded = &destination[..size];
        assert_ne!(encoded[size - 1], 0xFF);
        for pair in encoded.windows(2) {
            assert!(!(pair[0] == 0xFF && pair[1] >= 0x80));
        }
    }

    #[test]
    fn test_destination_too_small() {
        let source: Vec<u8> = (0..64 * 64).map(|i| ((i * 31) % 256) as u8).collect();
        let mut destination = vec![0u8; 16];
        assert_eq!(
            encode(frame(64, 64, 1), &source, &mut destination),
            Err(JpeglsError::DestinationBufferTooSmall)
        );
    }

    #[test]
    fn test_flush_of_four_full_bytes_keeps_count_in_range() {
        let frame_info = frame(1, 1, 1);
        let traits = CodingTraits::new(&compute_default(255, 0), 0);
        let coding_parameters = CodingParameters::default();
        let mut destination = [0u8; 16];
        let mut encoder = ScanEncoder::new(frame_info, traits, coding_parameters, &mut destination);

        encoder.append_to_bit_stream(0x0123_4567, 31).unwrap();
        assert_eq!(encoder.free_bit_count, 1);
        encoder.flush().unwrap();
        assert_eq!(encoder.free_bit_count, 32);
        assert_eq!(encoder.position, 4);

        encoder.append_to_bit_stream(1, 1).unwrap();
        encoder.end_scan().unwrap();
        let size = encoder.position;
        assert_eq!(&destination[..size], &[0x02, 0x46, 0x8A, 0xCE, 0x80]);
    }

    #[test]
    fn test_sample_interleaved_flat_image() {
        let source = vec![200u8; 16 * 16 * 3];
        let mut destination = vec![0u8; 1024];
        let size = encode(frame(16, 16, 3), &source, &mut destination).unwrap();
        assert!(size > 0 && size < 64, "{size}");
    }
}
