use super::JpeglsScanCodec;
use super::traits::get_sample;
use crate::coding_parameters::{compute_default, compute_maximum_sample_value, is_default, validate};
use crate::constants::{MAXIMUM_BITS_PER_SAMPLE_WITH_IMPLICIT_PRESET, SPIFF_HEADER_SIZE_IN_BYTES};
use crate::error::JpeglsError;
use crate::jpeg_stream_writer::JpegStreamWriter;
use crate::scan_codec::ScanCodec;
use crate::segment_validator::{
    WriterEvent, WriterState, check_color_transformation, check_frame_info_argument,
    check_spiff_entry, effective_interleave_mode, is_interleave_mode_valid, is_near_lossless_valid,
    next_writer_state,
};
use crate::{
    CodingParameters, ColorTransformation, FrameInfo, InterleaveMode, JpeglsPcParameters,
    SpiffColorSpace, SpiffCompressionType, SpiffHeader, SpiffProfileId, SpiffResolutionUnits,
};
use log::debug;

/// Bytes reserved for the segments around the scan by
/// [`JpeglsEncoder::estimated_destination_size`].
const HEADER_SIZE_ESTIMATE: usize = 1024;

/// Writes a JPEG-LS stream into a caller supplied buffer.
///
/// Configure the frame with the setters, optionally write a SPIFF header and
/// directory entries, then call [`JpeglsEncoder::encode`] once.
pub struct JpeglsEncoder<'a> {
    writer: JpegStreamWriter<'a>,
    state: WriterState,
    frame_info: Option<FrameInfo>,
    near_lossless: i32,
    interleave_mode: InterleaveMode,
    color_transformation: ColorTransformation,
    preset_coding_parameters: JpeglsPcParameters,
}

impl<'a> JpeglsEncoder<'a> {
    pub fn new(destination: &'a mut [u8]) -> Self {
        Self {
            writer: JpegStreamWriter::new(destination),
            state: WriterState::Initial,
            frame_info: None,
            near_lossless: 0,
            interleave_mode: InterleaveMode::None,
            color_transformation: ColorTransformation::None,
            preset_coding_parameters: JpeglsPcParameters::default(),
        }
    }

    pub fn set_frame_info(&mut self, frame_info: FrameInfo) -> Result<(), JpeglsError> {
        self.configure()?;
        self.frame_info = Some(frame_info);
        Ok(())
    }

    pub fn set_near_lossless(&mut self, near_lossless: i32) -> Result<(), JpeglsError> {
        self.configure()?;
        self.near_lossless = near_lossless;
        Ok(())
    }

    pub fn set_interleave_mode(
        &mut self,
        interleave_mode: InterleaveMode,
    ) -> Result<(), JpeglsError> {
        self.configure()?;
        self.interleave_mode = interleave_mode;
        Ok(())
    }

    pub fn set_color_transformation(
        &mut self,
        color_transformation: ColorTransformation,
    ) -> Result<(), JpeglsError> {
        self.configure()?;
        self.color_transformation = color_transformation;
        Ok(())
    }

    /// Zero fields keep their default value.
    pub fn set_preset_coding_parameters(
        &mut self,
        pc_parameters: JpeglsPcParameters,
    ) -> Result<(), JpeglsError> {
        self.configure()?;
        self.preset_coding_parameters = pc_parameters;
        Ok(())
    }

    pub fn bytes_written(&self) -> usize {
        self.writer.bytes_written()
    }

    /// A destination size that is large enough for any image with the configured frame info.
    pub fn estimated_destination_size(&self) -> Result<usize, JpeglsError> {
        let frame_info = self.frame_info.ok_or(JpeglsError::InvalidOperation)?;
        check_frame_info_argument(&frame_info)?;
        Ok(frame_info.pixel_data_size() + HEADER_SIZE_ESTIMATE + SPIFF_HEADER_SIZE_IN_BYTES)
    }

    /// Writes SOI followed by the SPIFF header.
    pub fn write_spiff_header(&mut self, spiff_header: &SpiffHeader) -> Result<(), JpeglsError> {
        let next_state = next_writer_state(self.state, WriterEvent::SpiffHeader)?;
        if spiff_header.height == 0 {
            return Err(JpeglsError::InvalidArgumentHeight);
        }
        if spiff_header.width == 0 {
            return Err(JpeglsError::InvalidArgumentWidth);
        }
        if self.writer.capacity() - self.writer.bytes_written() < 2 + SPIFF_HEADER_SIZE_IN_BYTES {
            return Err(JpeglsError::DestinationBufferTooSmall);
        }

        self.writer.write_start_of_image()?;
        self.writer.write_spiff_header_segment(spiff_header)?;
        self.state = next_state;
        Ok(())
    }

    /// Writes a SPIFF header built from the configured frame info.
    pub fn write_standard_spiff_header(
        &mut self,
        color_space: SpiffColorSpace,
        resolution_units: SpiffResolutionUnits,
        vertical_resolution: u32,
        horizontal_resolution: u32,
    ) -> Result<(), JpeglsError> {
        let frame_info = self.frame_info.ok_or(JpeglsError::InvalidOperation)?;
        let spiff_header = SpiffHeader {
            profile_id: SpiffProfileId::None,
            component_count: frame_info.component_count,
            height: frame_info.height,
            width: frame_info.width,
            color_space,
            bits_per_sample: frame_info.bits_per_sample,
            compression_type: SpiffCompressionType::JpegLs,
            resolution_units,
            vertical_resolution,
            horizontal_resolution,
            ..Default::default()
        };
        self.write_spiff_header(&spiff_header)
    }

    /// Writes a SPIFF directory entry. Only valid after [`Self::write_spiff_header`].
    pub fn write_spiff_entry(
        &mut self,
        entry_tag: u32,
        entry_data: &[u8],
    ) -> Result<(), JpeglsError> {
        check_spiff_entry(entry_tag, entry_data.len())?;
        let next_state = next_writer_state(self.state, WriterEvent::SpiffEntry)?;

        self.writer
            .write_spiff_directory_entry(entry_tag, entry_data)?;
        self.state = next_state;
        Ok(())
    }

    /// Encodes `source` with the JPEG-LS scan codec and returns the total number of bytes written.
    pub fn encode(&mut self, source: &[u8]) -> Result<usize, JpeglsError> {
        self.encode_with(&mut JpeglsScanCodec, source)
    }

    /// Encodes `source` with `codec` and returns the total number of bytes written.
    ///
    /// Every argument is validated before the first byte is written; a failed
    /// validation leaves the encoder unchanged.
    pub fn encode_with<C: ScanCodec + ?Sized>(
        &mut self,
        codec: &mut C,
        source: &[u8],
    ) -> Result<usize, JpeglsError> {
        let next_state = next_writer_state(self.state, WriterEvent::Encode)?;
        let frame_info = self.frame_info.ok_or(JpeglsError::InvalidOperation)?;
        check_frame_info_argument(&frame_info)?;

        let interleave_mode =
            effective_interleave_mode(self.interleave_mode, frame_info.component_count);
        if !is_interleave_mode_valid(interleave_mode, frame_info.component_count) {
            return Err(JpeglsError::InvalidArgumentInterleaveMode);
        }

        let maximum_component_value = compute_maximum_sample_value(frame_info.bits_per_sample);
        if !is_near_lossless_valid(self.near_lossless, maximum_component_value) {
            return Err(JpeglsError::InvalidArgumentNearLossless);
        }
        let pc = validate(
            &self.preset_coding_parameters,
            maximum_component_value,
            self.near_lossless,
        )
        .ok_or(JpeglsError::InvalidArgumentJpeglsPcParameters)?;

        check_color_transformation(self.color_transformation, &frame_info)?;
        if self.color_transformation != ColorTransformation::None
            && pc.maximum_sample_value != maximum_component_value
        {
            return Err(JpeglsError::InvalidArgumentColorTransformation);
        }

        self.check_source(&frame_info, pc.maximum_sample_value, source)?;

        // From here on the stream is written; a failure leaves it incomplete.
        let spiff_header_written = self.state == WriterState::SpiffHeaderWritten;
        self.state = next_state;

        if spiff_header_written {
            self.writer.write_spiff_end_of_directory_entry()?;
        } else {
            self.writer.write_start_of_image()?;
        }
        self.writer.write_start_of_frame_segment(&frame_info)?;

        if self.color_transformation != ColorTransformation::None {
            self.writer
                .write_color_transform_segment(self.color_transformation)?;
        }

        let defaults = compute_default(maximum_component_value, self.near_lossless);
        if !is_default(&self.preset_coding_parameters, &defaults) {
            self.writer.write_jpegls_preset_parameters_segment(&pc)?;
        } else if frame_info.bits_per_sample > MAXIMUM_BITS_PER_SAMPLE_WITH_IMPLICIT_PRESET {
            self.writer
                .write_jpegls_preset_parameters_segment(&defaults)?;
        }

        self.writer.write_start_of_scan_segment(
            frame_info.component_count,
            self.near_lossless,
            interleave_mode,
        )?;

        let coding_parameters = CodingParameters {
            near_lossless: self.near_lossless,
            restart_interval: 0,
            interleave_mode,
            transformation: self.color_transformation,
        };
        let scan_size = codec.encode_scan(
            &frame_info,
            &pc,
            &coding_parameters,
            source,
            self.writer.remaining_slice(),
        )?;
        self.writer.advance(scan_size);
        self.writer.write_end_of_image()?;

        debug!(
            "encoded {}x{}x{} image into {} bytes (scan {} bytes)",
            frame_info.width,
            frame_info.height,
            frame_info.component_count,
            self.writer.bytes_written(),
            scan_size
        );
        Ok(self.writer.bytes_written())
    }

    fn configure(&mut self) -> Result<(), JpeglsError> {
        self.state = next_writer_state(self.state, WriterEvent::Configure)?;
        Ok(())
    }

    fn check_source(
        &self,
        frame_info: &FrameInfo,
        maximum_sample_value: i32,
        source: &[u8],
    ) -> Result<(), JpeglsError> {
        if source.is_empty() {
            return Err(JpeglsError::InvalidArgumentSource);
        }
        let size = frame_info.pixel_data_size();
        if source.len() < size {
            return Err(JpeglsError::SourceBufferTooSmall);
        }

        let (bytes_per_sample, container_maximum) = if frame_info.bits_per_sample <= 8 {
            (1, u8::MAX as i32)
        } else {
            (2, u16::MAX as i32)
        };
        if maximum_sample_value < container_maximum {
            let sample_count = size / bytes_per_sample;
            let mut samples =
                (0..sample_count).map(|index| get_sample(source, index, bytes_per_sample));
            if samples.any(|sample| sample > maximum_sample_value) {
                return Err(JpeglsError::InvalidArgumentSource);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_info() -> FrameInfo {
        FrameInfo {
            width: 4,
            height: 2,
            bits_per_sample: 8,
            component_count: 1,
        }
    }

    #[test]
    fn test_encode_layout_without_spiff_header() {
        let mut destination = vec![0u8; 256];
        let mut encoder = JpeglsEncoder::new(&mut destination);
        encoder.set_frame_info(frame_info()).unwrap();
        let size = encoder.encode(&[0u8; 8]).unwrap();

        assert_eq!(&destination[..2], &[0xFF, 0xD8]);
        assert_eq!(&destination[2..4], &[0xFF, 0xF7]);
        assert_eq!(&destination[size - 2..size], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_encode_without_frame_info() {
        let mut destination = vec![0u8; 256];
        let mut encoder = JpeglsEncoder::new(&mut destination);
        assert_eq!(
            encoder.encode(&[0u8; 8]),
            Err(JpeglsError::InvalidOperation)
        );
    }

    #[test]
    fn test_width_is_checked_first() {
        let mut destination = vec![0u8; 256];
        let mut encoder = JpeglsEncoder::new(&mut destination);
        encoder
            .set_frame_info(FrameInfo {
                width: 0,
                height: 0,
                bits_per_sample: 1,
                component_count: 0,
            })
            .unwrap();
        assert_eq!(
            encoder.encode(&[0u8; 8]),
            Err(JpeglsError::InvalidArgumentWidth)
        );
        assert_eq!(encoder.bytes_written(), 0);
    }

    #[test]
    fn test_near_lossless_out_of_range() {
        let mut destination = vec![0u8; 256];
        let mut encoder = JpeglsEncoder::new(&mut destination);
        encoder.set_frame_info(frame_info()).unwrap();
        encoder.set_near_lossless(128).unwrap();
        assert_eq!(
            encoder.encode(&[0u8; 8]),
            Err(JpeglsError::InvalidArgumentNearLossless)
        );
    }

    #[test]
    fn test_interleave_mode_none_with_three_components() {
        let mut destination = vec![0u8; 256];
        let mut encoder = JpeglsEncoder::new(&mut destination);
        encoder
            .set_frame_info(FrameInfo {
                component_count: 3,
                ..frame_info()
            })
            .unwrap();
        assert_eq!(
            encoder.encode(&[0u8; 24]),
            Err(JpeglsError::InvalidArgumentInterleaveMode)
        );
    }

    #[test]
    fn test_source_checks() {
        let mut destination = vec![0u8; 256];
        let mut encoder = JpeglsEncoder::new(&mut destination);
        encoder.set_frame_info(frame_info()).unwrap();
        assert_eq!(encoder.encode(&[]), Err(JpeglsError::InvalidArgumentSource));
        assert_eq!(
            encoder.encode(&[0u8; 7]),
            Err(JpeglsError::SourceBufferTooSmall)
        );

        encoder
            .set_frame_info(FrameInfo {
                bits_per_sample: 6,
                ..frame_info()
            })
            .unwrap();
        assert_eq!(
            encoder.encode(&[64u8; 8]),
            Err(JpeglsError::InvalidArgumentSource)
        );
    }

    #[test]
    fn test_color_transformation_checks() {
        let mut destination = vec![0u8; 256];
        let mut encoder = JpeglsEncoder::new(&mut destination);
        encoder.set_frame_info(frame_info()).unwrap();
        encoder
            .set_color_transformation(ColorTransformation::Hp1)
            .unwrap();
        assert_eq!(
            encoder.encode(&[0u8; 8]),
            Err(JpeglsError::InvalidArgumentColorTransformation)
        );

        encoder
            .set_frame_info(FrameInfo {
                bits_per_sample: 12,
                component_count: 3,
                ..frame_info()
            })
            .unwrap();
        encoder.set_interleave_mode(InterleaveMode::Sample).unwrap();
        assert_eq!(
            encoder.encode(&[0u8; 48]),
            Err(JpeglsError::BitDepthForTransformNotSupported)
        );
    }

    #[test]
    fn test_setters_fail_after_encode() {
        let mut destination = vec![0u8; 256];
        let mut encoder = JpeglsEncoder::new(&mut destination);
        encoder.set_frame_info(frame_info()).unwrap();
        encoder.encode(&[0u8; 8]).unwrap();

        assert_eq!(
            encoder.set_near_lossless(1),
            Err(JpeglsError::InvalidOperation)
        );
        assert_eq!(
            encoder.set_frame_info(frame_info()),
            Err(JpeglsError::InvalidOperation)
        );
        assert_eq!(
            encoder.encode(&[0u8; 8]),
            Err(JpeglsError::InvalidOperation)
        );
    }

    #[test]
    fn test_spiff_entry_requires_spiff_header() {
        let mut destination = vec![0u8; 256];
        let mut encoder = JpeglsEncoder::new(&mut destination);
        assert_eq!(
            encoder.write_spiff_entry(9, b"1.0"),
            Err(JpeglsError::InvalidOperation)
        );
        assert_eq!(
            encoder.write_spiff_entry(1, b""),
            Err(JpeglsError::InvalidArgument)
        );
        assert_eq!(encoder.bytes_written(), 0);
    }

    #[test]
    fn test_spiff_header_written_once() {
        let mut destination = vec![0u8; 256];
        let mut encoder = JpeglsEncoder::new(&mut destination);
        encoder.set_frame_info(frame_info()).unwrap();
        encoder
            .write_standard_spiff_header(
                SpiffColorSpace::Grayscale,
                SpiffResolutionUnits::AspectRatio,
                1,
                1,
            )
            .unwrap();
        assert_eq!(encoder.bytes_written(), 2 + SPIFF_HEADER_SIZE_IN_BYTES);
        assert_eq!(
            encoder.write_standard_spiff_header(
                SpiffColorSpace::Grayscale,
                SpiffResolutionUnits::AspectRatio,
                1,
                1,
            ),
            Err(JpeglsError::InvalidOperation)
        );
    }

    #[test]
    fn test_implicit_preset_written_for_16_bit() {
        let mut destination = vec![0u8; 256];
        let mut encoder = JpeglsEncoder::new(&mut destination);
        encoder
            .set_frame_info(FrameInfo {
                bits_per_sample: 16,
                ..frame_info()
            })
            .unwrap();
        encoder.encode(&[0u8; 16]).unwrap();

        // SOI, SOF-55 (2 + 2 + 9 bytes), then LSE.
        assert_eq!(&destination[15..17], &[0xFF, 0xF8]);
    }

    #[test]
    fn test_estimated_destination_size() {
        let mut destination = vec![0u8; 16];
        let mut encoder = JpeglsEncoder::new(&mut destination);
        assert_eq!(
            encoder.estimated_destination_size(),
            Err(JpeglsError::InvalidOperation)
        );
        encoder.set_frame_info(frame_info()).unwrap();
        assert!(
            encoder.estimated_destination_size().unwrap() >= 8 + 2 + SPIFF_HEADER_SIZE_IN_BYTES
        );
    }
}
