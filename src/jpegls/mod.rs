//! JPEG-LS scan coding (ISO/IEC 14495-1 / ITU-T T.87, annex A).
//!
//! [`JpeglsScanCodec`] is the [`ScanCodec`] used by default: gradient context
//! modeling with bias correction, run mode and limited length Golomb coding.
//! All components of a frame are carried in one scan. Components share the
//! regular mode contexts; with line interleaving each component keeps its own
//! run index.
//!
//! [`JpeglsEncoder`] and [`JpeglsDecoder`] combine the scan codec with the
//! stream framing.

mod color_transform;
pub mod decoder;
pub mod encoder;
mod line_buffer;
mod regular_mode_context;
mod run_mode_context;
mod scan_decoder;
mod scan_encoder;
pub mod traits;
pub mod validate_spiff_header;

pub use decoder::JpeglsDecoder;
pub use encoder::JpeglsEncoder;

use crate::coding_parameters::{compute_maximum_sample_value, validate};
use crate::constants::MAXIMUM_COMPONENT_COUNT_IN_SCAN;
use crate::error::JpeglsError;
use crate::scan_codec::ScanCodec;
use crate::{CodingParameters, ColorTransformation, FrameInfo, JpeglsPcParameters};
use log::debug;
use scan_decoder::ScanDecoder;
use scan_encoder::ScanEncoder;
use traits::CodingTraits;

#[derive(Debug, Default, Clone, Copy)]
pub struct JpeglsScanCodec;

impl JpeglsScanCodec {
    fn coding_traits(
        frame_info: &FrameInfo,
        preset: &JpeglsPcParameters,
        coding_parameters: &CodingParameters,
    ) -> Result<CodingTraits, JpeglsError> {
        if frame_info.component_count as usize > MAXIMUM_COMPONENT_COUNT_IN_SCAN {
            return Err(JpeglsError::ParameterValueNotSupported);
        }
        if coding_parameters.transformation != ColorTransformation::None
            && frame_info.component_count != 3
        {
            return Err(JpeglsError::ColorTransformNotSupported);
        }

        let near_lossless = coding_parameters.near_lossless;
        let maximum_component_value = compute_maximum_sample_value(frame_info.bits_per_sample);
        let pc = validate(preset, maximum_component_value, near_lossless)
            .ok_or(JpeglsError::InvalidParameterJpeglsPresetParameters)?;
        Ok(CodingTraits::new(&pc, near_lossless))
    }
}

impl ScanCodec for JpeglsScanCodec {
    fn encode_scan(
        &mut self,
        frame_info: &FrameInfo,
        preset: &JpeglsPcParameters,
        coding_parameters: &CodingParameters,
        source: &[u8],
        destination: &mut [u8],
    ) -> Result<usize, JpeglsError> {
        let traits = Self::coding_traits(frame_info, preset, coding_parameters)?;
        if source.len() < frame_info.pixel_data_size() {
            return Err(JpeglsError::SourceBufferTooSmall);
        }

        debug!(
            "encoding scan: {}x{}x{}, near {}, range {}, limit {}",
            frame_info.width,
            frame_info.height,
            frame_info.component_count,
            traits.near_lossless,
            traits.range,
            traits.limit
        );
        ScanEncoder::new(*frame_info, traits, *coding_parameters, destination).encode_scan(source)
    }

    fn decode_scan(
        &mut self,
        frame_info: &FrameInfo,
        preset: &JpeglsPcParameters,
        coding_parameters: &CodingParameters,
        source: &[u8],
        destination: &mut [u8],
    ) -> Result<usize, JpeglsError> {
        let traits = Self::coding_traits(frame_info, preset, coding_parameters)?;
        if destination.len() < frame_info.pixel_data_size() {
            return Err(JpeglsError::DestinationBufferTooSmall);
        }

        debug!(
            "decoding scan: {} bytes, near {}, range {}",
            source.len(),
            traits.near_lossless,
            traits.range
        );
        ScanDecoder::new(*frame_info, traits, *coding_parameters, source).decode_scan(destination)
    }
}
