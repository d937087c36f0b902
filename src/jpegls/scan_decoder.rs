use super::color_transform;
use super::line_buffer::{LineLayout, allocate_line, initialize_edges};
use super::regular_mode_context::RegularModeContext;
use super::run_mode_context::RunModeContext;
use super::traits::{
    CodingTraits, apply_sign, get_predicted_value, set_sample, sign, unmap_error_value,
};
use crate::constants::{CONTEXT_COUNT, J, MAXIMUM_COMPONENT_COUNT_IN_SCAN};
use crate::error::JpeglsError;
use crate::jpeg_marker_code::JPEG_MARKER_START_BYTE;
use crate::{CodingParameters, ColorTransformation, FrameInfo};
use log::trace;

const CACHE_BIT_COUNT: i32 = u64::BITS as i32;
const MAX_READABLE_CACHE_BITS: i32 = CACHE_BIT_COUNT - 8;

/// Decodes the entropy coded bytes of a single scan back into samples.
pub struct ScanDecoder<'a> {
    frame_info: FrameInfo,
    coding_parameters: CodingParameters,
    traits: CodingTraits,
    regular_mode_contexts: Vec<RegularModeContext>,
    run_mode_contexts: [RunModeContext; 2],
    run_index: usize,
    source: &'a [u8],
    position: usize,
    read_cache: u64,
    valid_bits: i32,
}

impl<'a> ScanDecoder<'a> {
    pub fn new(
        frame_info: FrameInfo,
        traits: CodingTraits,
        coding_parameters: CodingParameters,
        source: &'a [u8],
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
            source,
            position: 0,
            read_cache: 0,
            valid_bits: 0,
        }
    }

    /// Decodes into `destination` (pixel interleaved samples), returning the bytes consumed.
    pub fn decode_scan(&mut self, destination: &mut [u8]) -> Result<usize, JpeglsError> {
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
            let (region_count, pixel_size) = layout.regions();
            let region_size = layout.region_size();
            for region in 0..region_count {
                let range = region * region_size..(region + 1) * region_size;
                let previous = &mut previous[range.clone()];
                let current = &mut current[range];
                initialize_edges(previous, current, width, pixel_size);

                self.run_index = run_indices[region];
                self.decode_line(previous, current, pixel_size)?;
                run_indices[region] = self.run_index;
            }

            for x in 0..width {
                for (component, value) in pixel.iter_mut().take(component_count).enumerate() {
                    *value = current[layout.index(x, component)];
                }
                if transformation != ColorTransformation::None {
                    let restored = color_transform::inverse(
                        transformation,
                        self.frame_info.bits_per_sample,
                        [pixel[0], pixel[1], pixel[2]],
                    );
                    pixel[..3].copy_from_slice(&restored);
                }
                let first_sample = (line * width + x) * component_count;
                for (component, value) in pixel.iter().take(component_count).enumerate() {
                    let index = first_sample + component;
                    set_sample(destination, index, bytes_per_sample, *value);
                }
            }

            std::mem::swap(&mut previous, &mut current);
        }

        self.end_scan()?;
        trace!("scan decoded from {} bytes", self.position);
        Ok(self.position)
    }

    fn decode_line(
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
                index += self.decode_run_mode(previous, current, index, pixel_size)?;
                continue;
            }

            for (component, &qs) in context_ids.iter().take(pixel_size).enumerate() {
                let ra = current[base + component];
                let rc = previous[base + component];
                let rb = previous[base + pixel_size + component];
                let predicted = get_predicted_value(ra, rb, rc);
                current[base + pixel_size + component] = self.decode_regular(qs, predicted)?;
            }
            index += 1;
        }
        Ok(())
    }

    fn decode_regular(&mut self, qs: i32, predicted: i32) -> Result<i32, JpeglsError> {
        let traits = self.traits;
        let sign = sign(qs);
        let context_index = qs.unsigned_abs() as usize;
        let context = self.regular_mode_contexts[context_index];
        let k = context.compute_golomb_coding_parameter()?;
        let predicted_value = traits.correct_prediction(predicted + apply_sign(context.c(), sign));

        let mut error_value = unmap_error_value(self.decode_value(k, traits.limit)?);
        if error_value.abs() > 65535 {
            return Err(JpeglsError::InvalidEncodedData);
        }
        if context.requires_error_correction(k, traits.near_lossless) {
            error_value = !error_value;
        }

        self.regular_mode_contexts[context_index]
            .update_variables_and_bias(error_value, traits.near_lossless, traits.reset_threshold)?;
        Ok(traits.compute_reconstructed_sample(predicted_value, apply_sign(error_value, sign)))
    }

    fn decode_run_mode(
        &mut self,
        previous: &[i32],
        current: &mut [i32],
        start_index: usize,
        pixel_size: usize,
    ) -> Result<usize, JpeglsError> {
        let traits = self.traits;
        let width = self.frame_info.width as usize;
        let start = start_index * pixel_size;
        let mut ra = [0i32; MAXIMUM_COMPONENT_COUNT_IN_SCAN];
        ra[..pixel_size].copy_from_slice(&current[start..start + pixel_size]);

        let run_length = self.decode_run_pixels(width - start_index)?;
        for i in 0..run_length {
            let offset = (start_index + i + 1) * pixel_size;
            current[offset..offset + pixel_size].copy_from_slice(&ra[..pixel_size]);
        }

        let end_index = start_index + run_length;
        if end_index == width {
            return Ok(run_length);
        }

        let offset = (end_index + 1) * pixel_size;
        if pixel_size == 1 {
            current[offset] = self.decode_run_interruption_pixel(ra[0], previous[offset])?;
        } else {
            for component in 0..pixel_size {
                let rb = previous[offset + component];
                let sign = sign(rb - ra[component]);
                let error_value = self.decode_run_interruption_error(0)?;
                current[offset + component] =
                    traits.compute_reconstructed_sample(rb, error_value * sign);
            }
        }

        self.decrement_run_index();
        Ok(run_length + 1)
    }

    fn decode_run_pixels(&mut self, pixel_count: usize) -> Result<usize, JpeglsError> {
        let mut index = 0;
        while self.read_bit()? {
            let run = 1usize << J[self.run_index];
            let count = run.min(pixel_count - index);
            index += count;

            if count == run {
                self.increment_run_index();
            }

            if index == pixel_count {
                break;
            }
        }

        if index != pixel_count {
            // Incomplete run.
            index += self.read_value(J[self.run_index])? as usize;
        }

        if index > pixel_count {
            return Err(JpeglsError::InvalidEncodedData);
        }
        Ok(index)
    }

    fn decode_run_interruption_pixel(&mut self, ra: i32, rb: i32) -> Result<i32, JpeglsError> {
        let traits = self.traits;
        if traits.is_near(ra, rb) {
            let error_value = self.decode_run_interruption_error(1)?;
            return Ok(traits.compute_reconstructed_sample(ra, error_value));
        }

        let error_value = self.decode_run_interruption_error(0)?;
        Ok(traits.compute_reconstructed_sample(rb, error_value * sign(rb - ra)))
    }

    fn decode_run_interruption_error(&mut self, context_index: usize) -> Result<i32, JpeglsError> {
        let context = self.run_mode_contexts[context_index];
        let k = context.compute_golomb_coding_parameter()?;
        let limit = self.traits.limit - J[self.run_index] - 1;
        let e_mapped_error_value = self.decode_value(k, limit)?;
        let error_value =
            context.compute_error_value(e_mapped_error_value + context.run_interruption_type(), k);

        self.run_mode_contexts[context_index].update_variables(
            error_value,
            e_mapped_error_value,
            self.traits.reset_threshold,
        );
        Ok(error_value)
    }

    /// Reads a limited length Golomb code (A.5.3).
    fn decode_value(&mut self, k: i32, limit: i32) -> Result<i32, JpeglsError> {
        let qbpp = self.traits.quantized_bits_per_sample;
        let high_bits = self.read_high_bits(limit - qbpp - 1)?;

        if high_bits >= limit - (qbpp + 1) {
            return Ok(self.read_value(qbpp)? + 1);
        }

        if k == 0 {
            return Ok(high_bits);
        }
        Ok((high_bits << k) + self.read_value(k)?)
    }

    fn increment_run_index(&mut self) {
        self.run_index = (self.run_index + 1).min(J.len() - 1);
    }

    fn decrement_run_index(&mut self) {
        self.run_index = self.run_index.saturating_sub(1);
    }

    /// Counts zero bits up to and including the next set bit.
    fn read_high_bits(&mut self, maximum: i32) -> Result<i32, JpeglsError> {
        let mut count = 0;
        while !self.read_bit()? {
            count += 1;
            if count > maximum {
                return Err(JpeglsError::InvalidEncodedData);
            }
        }
        Ok(count)
    }

    fn read_bit(&mut self) -> Result<bool, JpeglsError> {
        if self.valid_bits <= 0 {
            self.fill_read_cache()?;
        }

        let set = self.read_cache & (1 << (CACHE_BIT_COUNT - 1)) != 0;
        self.skip(1);
        Ok(set)
    }

    fn read_value(&mut self, length: i32) -> Result<i32, JpeglsError> {
        if length == 0 {
            return Ok(0);
        }

        if self.valid_bits < length {
            self.fill_read_cache()?;
            if self.valid_bits < length {
                return Err(JpeglsError::InvalidEncodedData);
            }
        }

        let result = (self.read_cache >> (CACHE_BIT_COUNT - length)) as i32;
        self.skip(length);
        Ok(result)
    }

    fn skip(&mut self, length: i32) {
        self.valid_bits -= length;
        self.read_cache <<= length;
    }

    fn fill_read_cache(&mut self) -> Result<(), JpeglsError> {
        while self.valid_bits < MAX_READABLE_CACHE_BITS {
            let Some(&value) = self.source.get(self.position) else {
                return self.check_cache_not_empty();
            };

            if value == JPEG_MARKER_START_BYTE {
                // 0xFF followed by a byte with the high bit set is a marker, not scan data.
                let next = self.source.get(self.position + 1);
                if next.is_none_or(|&next| next & 0x80 != 0) {
                    return self.check_cache_not_empty();
                }
            }

            self.read_cache |= (value as u64) << (MAX_READABLE_CACHE_BITS - self.valid_bits);
            self.valid_bits += 8;
            if value == JPEG_MARKER_START_BYTE {
                // The next byte starts with a stuffed zero bit.
                self.valid_bits -= 1;
            }
            self.position += 1;
        }
        Ok(())
    }

    fn check_cache_not_empty(&self) -> Result<(), JpeglsError> {
        if self.valid_bits <= 0 {
            return Err(JpeglsError::InvalidEncodedData);
        }
        Ok(())
    }

    /// Only the zero padding of the last byte may remain after the final sample.
    fn end_scan(&mut self) -> Result<(), JpeglsError> {
        if self.position < self.source.len() {
            self.fill_read_cache()?;
        }

        if self.position < self.source.len() || self.valid_bits >= 8 || self.read_cache != 0 {
            return Err(JpeglsError::TooMuchEncodedData);
        }
        Ok(())
    }
}
