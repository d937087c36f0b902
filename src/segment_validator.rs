//! Rules shared by the stream reader and the stream writer.
//!
//! Everything in this module is a pure function over plain values, so the
//! ordering rules and range checks can be tested without any buffers.

use crate::coding_parameters::compute_maximum_near_lossless;
use crate::constants::*;
use crate::error::JpeglsError;
use crate::{ColorTransformation, FrameInfo, InterleaveMode};

/// Position of the stream reader in the marker grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Created,
    HeaderSection,
    SpiffHeaderSection,
    ImageSection,
    FrameSection,
    ScanSection,
    /// The scan has been decoded and the EOI marker consumed.
    EndOfImage,
}

/// A classified marker segment, as seen by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderEvent {
    StartOfImage,
    SpiffHeader,
    SpiffDirectoryEntry,
    SpiffEndOfDirectory,
    StartOfFrame,
    PresetParameters,
    ColorTransformation,
    RestartInterval,
    ApplicationData,
    Comment,
    StartOfScan,
    EndOfImage,
}

/// Computes the reader state after `event`, or the error that `event` raises in `state`.
pub fn next_reader_state(
    state: ReaderState,
    event: ReaderEvent,
) -> Result<ReaderState, JpeglsError> {
    use ReaderEvent as E;
    use ReaderState as S;

    match (state, event) {
        (S::Created, E::StartOfImage) => Ok(S::HeaderSection),
        (S::Created, _) => Err(JpeglsError::StartOfImageMarkerNotFound),
        (S::EndOfImage, _) => Err(JpeglsError::InvalidOperation),
        (_, E::StartOfImage) => Err(JpeglsError::DuplicateStartOfImageMarker),

        (S::ScanSection, E::EndOfImage) => Ok(S::EndOfImage),
        (_, E::EndOfImage) => Err(JpeglsError::UnexpectedEndOfImageMarker),

        (S::HeaderSection, E::SpiffHeader) => Ok(S::SpiffHeaderSection),

        (S::SpiffHeaderSection, E::SpiffDirectoryEntry) => Ok(S::SpiffHeaderSection),
        (S::SpiffHeaderSection, E::SpiffEndOfDirectory) => Ok(S::ImageSection),
        (S::SpiffHeaderSection, E::StartOfFrame) => Ok(S::FrameSection),
        (S::SpiffHeaderSection, _) => Err(JpeglsError::MissingEndOfSpiffDirectory),

        (S::FrameSection | S::ScanSection, E::StartOfFrame) => {
            Err(JpeglsError::DuplicateStartOfFrameMarker)
        }
        (_, E::StartOfFrame) => Ok(S::FrameSection),

        (S::FrameSection, E::StartOfScan) => Ok(S::ScanSection),
        (S::HeaderSection | S::ImageSection, E::StartOfScan) => {
            Err(JpeglsError::StartOfFrameMarkerNotFound)
        }

        (S::ScanSection, _) => Err(JpeglsError::EndOfImageMarkerNotFound),

        // SPIFF events outside the SPIFF section are plain application data.
        (state, _) => Ok(state),
    }
}

/// Position of the stream writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Initial,
    SpiffHeaderWritten,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterEvent {
    /// Changing a frame, interleave, near lossless or preset setting.
    Configure,
    SpiffHeader,
    SpiffEntry,
    Encode,
}

pub fn next_writer_state(
    state: WriterState,
    event: WriterEvent,
) -> Result<WriterState, JpeglsError> {
    use WriterEvent as E;
    use WriterState as S;

    match (state, event) {
        (S::Completed, _) => Err(JpeglsError::InvalidOperation),
        (state, E::Configure) => Ok(state),
        (S::Initial, E::SpiffHeader) => Ok(S::SpiffHeaderWritten),
        (S::SpiffHeaderWritten, E::SpiffEntry) => Ok(S::SpiffHeaderWritten),
        (_, E::Encode) => Ok(S::Completed),
        _ => Err(JpeglsError::InvalidOperation),
    }
}

/// Validates a segment length field against the bytes left in the source.
///
/// Returns the payload size (`length - 2`).
pub fn check_segment_length(length: u16, remaining: usize) -> Result<usize, JpeglsError> {
    let length = length as usize;
    if length < SEGMENT_LENGTH_SIZE {
        return Err(JpeglsError::InvalidMarkerSegmentSize);
    }

    let payload_size = length - SEGMENT_LENGTH_SIZE;
    if remaining < payload_size {
        return Err(JpeglsError::SourceBufferTooSmall);
    }
    Ok(payload_size)
}

/// SOF-55 payload: P, Y, X, Nf and three bytes per component.
pub fn check_frame_segment_size(
    payload_size: usize,
    component_count: usize,
) -> Result<(), JpeglsError> {
    if payload_size != 6 + 3 * component_count {
        return Err(JpeglsError::InvalidMarkerSegmentSize);
    }
    Ok(())
}

/// SOS payload: Ns, two bytes per component, NEAR, ILV and Al/Ah.
pub fn check_scan_segment_size(
    payload_size: usize,
    component_count: usize,
) -> Result<(), JpeglsError> {
    if payload_size != 4 + 2 * component_count {
        return Err(JpeglsError::InvalidMarkerSegmentSize);
    }
    Ok(())
}

/// Range checks for the values of a parsed SOF-55 segment.
pub fn check_frame_parameters(frame_info: &FrameInfo) -> Result<(), JpeglsError> {
    if !(MINIMUM_BITS_PER_SAMPLE..=MAXIMUM_BITS_PER_SAMPLE).contains(&frame_info.bits_per_sample) {
        return Err(JpeglsError::InvalidParameterBitsPerSample);
    }
    // The 16 bit fields of the frame header cannot exceed the maximums.
    if frame_info.height < MINIMUM_HEIGHT {
        return Err(JpeglsError::InvalidParameterHeight);
    }
    if frame_info.width < MINIMUM_WIDTH {
        return Err(JpeglsError::InvalidParameterWidth);
    }
    if frame_info.component_count < MINIMUM_COMPONENT_COUNT {
        return Err(JpeglsError::InvalidParameterComponentCount);
    }
    Ok(())
}

/// Range checks for caller supplied frame info, done before anything is written.
pub fn check_frame_info_argument(frame_info: &FrameInfo) -> Result<(), JpeglsError> {
    if !(MINIMUM_WIDTH..=MAXIMUM_WIDTH).contains(&frame_info.width) {
        return Err(JpeglsError::InvalidArgumentWidth);
    }
    if !(MINIMUM_HEIGHT..=MAXIMUM_HEIGHT).contains(&frame_info.height) {
        return Err(JpeglsError::InvalidArgumentHeight);
    }
    if !(MINIMUM_BITS_PER_SAMPLE..=MAXIMUM_BITS_PER_SAMPLE).contains(&frame_info.bits_per_sample) {
        return Err(JpeglsError::InvalidArgumentBitsPerSample);
    }
    if !(MINIMUM_COMPONENT_COUNT..=MAXIMUM_COMPONENT_COUNT).contains(&frame_info.component_count) {
        return Err(JpeglsError::InvalidArgumentComponentCount);
    }
    Ok(())
}

/// A single scan carries all components: none requires one component, line
/// and sample interleave at most four.
pub fn is_interleave_mode_valid(interleave_mode: InterleaveMode, component_count: i32) -> bool {
    match interleave_mode {
        InterleaveMode::None => component_count == 1,
        InterleaveMode::Line | InterleaveMode::Sample => {
            (1..=MAXIMUM_COMPONENT_COUNT_IN_SCAN as i32).contains(&component_count)
        }
    }
}

/// The interleave mode the writer emits: a single component scan is always non-interleaved.
pub fn effective_interleave_mode(
    interleave_mode: InterleaveMode,
    component_count: i32,
) -> InterleaveMode {
    if component_count == 1 {
        InterleaveMode::None
    } else {
        interleave_mode
    }
}

/// Parses the ILV byte of a SOS segment.
pub fn interleave_mode_from_scan(
    value: u8,
    component_count: i32,
) -> Result<InterleaveMode, JpeglsError> {
    let interleave_mode =
        InterleaveMode::try_from(value).map_err(|_| JpeglsError::InvalidParameterInterleaveMode)?;
    if !is_interleave_mode_valid(interleave_mode, component_count) {
        return Err(JpeglsError::InvalidParameterInterleaveMode);
    }
    Ok(interleave_mode)
}

pub fn is_near_lossless_valid(near_lossless: i32, maximum_sample_value: i32) -> bool {
    (0..=MAXIMUM_NEAR_LOSSLESS).contains(&near_lossless)
        && near_lossless <= compute_maximum_near_lossless(maximum_sample_value)
}

/// HP color transformations need exactly three components of 8 or 16 bits.
pub fn check_color_transformation(
    transformation: ColorTransformation,
    frame_info: &FrameInfo,
) -> Result<(), JpeglsError> {
    if transformation == ColorTransformation::None {
        return Ok(());
    }
    if frame_info.component_count != 3 {
        return Err(JpeglsError::InvalidArgumentColorTransformation);
    }
    if frame_info.bits_per_sample != 8 && frame_info.bits_per_sample != 16 {
        return Err(JpeglsError::BitDepthForTransformNotSupported);
    }
    Ok(())
}

/// Parses the transformation id of an APP8 "mrfx" segment.
pub fn color_transformation_from_code(value: u8) -> Result<ColorTransformation, JpeglsError> {
    match ColorTransformation::try_from(value) {
        Ok(transformation) => Ok(transformation),
        // HP4 and HP5 exist but are not implemented.
        Err(_) if value == 4 || value == 5 => Err(JpeglsError::ColorTransformNotSupported),
        Err(_) => Err(JpeglsError::InvalidEncodedData),
    }
}

/// Checks the parameter type and size of an LSE segment. Only type 1 is supported.
pub fn check_preset_parameters_type(
    parameter_type: u8,
    payload_size: usize,
) -> Result<(), JpeglsError> {
    match parameter_type {
        1 if payload_size == PRESET_CODING_PARAMETERS_PAYLOAD_SIZE => Ok(()),
        1 => Err(JpeglsError::InvalidMarkerSegmentSize),
        // Mapping tables.
        2..=4 => Err(JpeglsError::ParameterValueNotSupported),
        // JPEG-LS part 2 (ISO/IEC 14495-2) extensions.
        5..=0x0D => Err(JpeglsError::JpeglsPresetExtendedParameterTypeNotSupported),
        _ => Err(JpeglsError::InvalidJpeglsPresetParameterType),
    }
}

/// Argument checks for a SPIFF directory entry, in the order they are reported.
pub fn check_spiff_entry(tag: u32, data_size: usize) -> Result<(), JpeglsError> {
    if data_size > SPIFF_ENTRY_MAX_DATA_SIZE {
        return Err(JpeglsError::InvalidArgumentSpiffEntrySize);
    }
    if tag == SPIFF_END_OF_DIRECTORY_ENTRY_TYPE {
        return Err(JpeglsError::InvalidArgument);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_happy_path() {
        let events = [
            ReaderEvent::StartOfImage,
            ReaderEvent::SpiffHeader,
            ReaderEvent::SpiffDirectoryEntry,
            ReaderEvent::SpiffEndOfDirectory,
            ReaderEvent::Comment,
            ReaderEvent::StartOfFrame,
            ReaderEvent::PresetParameters,
            ReaderEvent::StartOfScan,
            ReaderEvent::EndOfImage,
        ];

        let mut state = ReaderState::Created;
        for event in events {
            state = next_reader_state(state, event).unwrap();
        }
        assert_eq!(state, ReaderState::EndOfImage);
    }

    #[test]
    fn test_reader_requires_start_of_image() {
        assert_eq!(
            next_reader_state(ReaderState::Created, ReaderEvent::StartOfFrame),
            Err(JpeglsError::StartOfImageMarkerNotFound)
        );
    }

    #[test]
    fn test_reader_duplicate_start_of_image() {
        for state in [
            ReaderState::HeaderSection,
            ReaderState::FrameSection,
            ReaderState::ScanSection,
        ] {
            assert_eq!(
                next_reader_state(state, ReaderEvent::StartOfImage),
                Err(JpeglsError::DuplicateStartOfImageMarker)
            );
        }
    }

    #[test]
    fn test_reader_duplicate_start_of_frame() {
        assert_eq!(
            next_reader_state(ReaderState::FrameSection, ReaderEvent::StartOfFrame),
            Err(JpeglsError::DuplicateStartOfFrameMarker)
        );
    }

    #[test]
    fn test_reader_scan_before_frame() {
        assert_eq!(
            next_reader_state(ReaderState::HeaderSection, ReaderEvent::StartOfScan),
            Err(JpeglsError::StartOfFrameMarkerNotFound)
        );
    }

    #[test]
    fn test_reader_premature_end_of_image() {
        for state in [
            ReaderState::HeaderSection,
            ReaderState::ImageSection,
            ReaderState::FrameSection,
        ] {
            assert_eq!(
                next_reader_state(state, ReaderEvent::EndOfImage),
                Err(JpeglsError::UnexpectedEndOfImageMarker)
            );
        }
    }

    #[test]
    fn test_reader_spiff_directory_must_end() {
        assert_eq!(
            next_reader_state(ReaderState::SpiffHeaderSection, ReaderEvent::Comment),
            Err(JpeglsError::MissingEndOfSpiffDirectory)
        );
        assert_eq!(
            next_reader_state(ReaderState::SpiffHeaderSection, ReaderEvent::StartOfFrame),
            Ok(ReaderState::FrameSection)
        );
    }

    #[test]
    fn test_reader_scan_must_end_with_end_of_image() {
        assert_eq!(
            next_reader_state(ReaderState::ScanSection, ReaderEvent::Comment),
            Err(JpeglsError::EndOfImageMarkerNotFound)
        );
    }

    #[test]
    fn test_writer_transitions() {
        let state = next_writer_state(WriterState::Initial, WriterEvent::SpiffHeader).unwrap();
        assert_eq!(state, WriterState::SpiffHeaderWritten);
        assert_eq!(next_writer_state(state, WriterEvent::SpiffEntry), Ok(state));
        assert_eq!(
            next_writer_state(state, WriterEvent::SpiffHeader),
            Err(JpeglsError::InvalidOperation)
        );
        assert_eq!(
            next_writer_state(WriterState::Initial, WriterEvent::SpiffEntry),
            Err(JpeglsError::InvalidOperation)
        );

        let completed = next_writer_state(state, WriterEvent::Encode).unwrap();
        for event in [
            WriterEvent::Configure,
            WriterEvent::SpiffHeader,
            WriterEvent::SpiffEntry,
            WriterEvent::Encode,
        ] {
            assert_eq!(
                next_writer_state(completed, event),
                Err(JpeglsError::InvalidOperation)
            );
        }
    }

    #[test]
    fn test_segment_length() {
        assert_eq!(
            check_segment_length(1, 100),
            Err(JpeglsError::InvalidMarkerSegmentSize)
        );
        assert_eq!(
            check_segment_length(10, 7),
            Err(JpeglsError::SourceBufferTooSmall)
        );
        assert_eq!(check_segment_length(10, 8), Ok(8));
        assert_eq!(check_segment_length(2, 0), Ok(0));
    }

    #[test]
    fn test_frame_and_scan_sizes() {
        assert!(check_frame_segment_size(9, 1).is_ok());
        assert_eq!(
            check_frame_segment_size(10, 1),
            Err(JpeglsError::InvalidMarkerSegmentSize)
        );
        assert!(check_scan_segment_size(10, 3).is_ok());
        assert_eq!(
            check_scan_segment_size(9, 3),
            Err(JpeglsError::InvalidMarkerSegmentSize)
        );
    }

    #[test]
    fn test_frame_parameters() {
        let valid = FrameInfo {
            width: 1,
            height: 1,
            bits_per_sample: 8,
            component_count: 1,
        };
        assert!(check_frame_parameters(&valid).is_ok());
        assert_eq!(
            check_frame_parameters(&FrameInfo { width: 0, ..valid }),
            Err(JpeglsError::InvalidParameterWidth)
        );
        assert_eq!(
            check_frame_parameters(&FrameInfo { height: 0, ..valid }),
            Err(JpeglsError::InvalidParameterHeight)
        );
        assert_eq!(
            check_frame_parameters(&FrameInfo {
                bits_per_sample: 17,
                ..valid
            }),
            Err(JpeglsError::InvalidParameterBitsPerSample)
        );
        assert_eq!(
            check_frame_parameters(&FrameInfo {
                component_count: 0,
                ..valid
            }),
            Err(JpeglsError::InvalidParameterComponentCount)
        );
    }

    #[test]
    fn test_frame_info_argument() {
        let valid = FrameInfo {
            width: 65535,
            height: 65535,
            bits_per_sample: 16,
            component_count: 255,
        };
        assert!(check_frame_info_argument(&valid).is_ok());
        assert_eq!(
            check_frame_info_argument(&FrameInfo {
                width: 0,
                height: 0,
                ..valid
            }),
            Err(JpeglsError::InvalidArgumentWidth)
        );
        assert_eq!(
            check_frame_info_argument(&FrameInfo {
                height: 65536,
                ..valid
            }),
            Err(JpeglsError::InvalidArgumentHeight)
        );
        assert_eq!(
            check_frame_info_argument(&FrameInfo {
                bits_per_sample: 1,
                ..valid
            }),
            Err(JpeglsError::InvalidArgumentBitsPerSample)
        );
        assert_eq!(
            check_frame_info_argument(&FrameInfo {
                component_count: 256,
                ..valid
            }),
            Err(JpeglsError::InvalidArgumentComponentCount)
        );
    }

    #[test]
    fn test_interleave_mode_rules() {
        assert!(is_interleave_mode_valid(InterleaveMode::None, 1));
        assert!(!is_interleave_mode_valid(InterleaveMode::None, 3));
        assert!(is_interleave_mode_valid(InterleaveMode::Sample, 4));
        assert!(!is_interleave_mode_valid(InterleaveMode::Line, 5));
        assert_eq!(
            effective_interleave_mode(InterleaveMode::Sample, 1),
            InterleaveMode::None
        );
        assert_eq!(
            interleave_mode_from_scan(3, 3),
            Err(JpeglsError::InvalidParameterInterleaveMode)
        );
        assert_eq!(
            interleave_mode_from_scan(0, 3),
            Err(JpeglsError::InvalidParameterInterleaveMode)
        );
        assert_eq!(interleave_mode_from_scan(1, 3), Ok(InterleaveMode::Line));
    }

    #[test]
    fn test_near_lossless_range() {
        assert!(is_near_lossless_valid(0, 255));
        assert!(is_near_lossless_valid(127, 255));
        assert!(!is_near_lossless_valid(128, 255));
        assert!(!is_near_lossless_valid(256, 65535));
        assert!(!is_near_lossless_valid(-1, 255));
    }

    #[test]
    fn test_color_transformation_rules() {
        let rgb8 = FrameInfo {
            width: 1,
            height: 1,
            bits_per_sample: 8,
            component_count: 3,
        };
        let rgb12 = FrameInfo {
            bits_per_sample: 12,
            ..rgb8
        };
        let gray8 = FrameInfo {
            component_count: 1,
            ..rgb8
        };
        assert!(check_color_transformation(ColorTransformation::Hp1, &rgb8).is_ok());
        assert_eq!(
            check_color_transformation(ColorTransformation::Hp2, &rgb12),
            Err(JpeglsError::BitDepthForTransformNotSupported)
        );
        assert_eq!(
            check_color_transformation(ColorTransformation::Hp3, &gray8),
            Err(JpeglsError::InvalidArgumentColorTransformation)
        );
        assert!(check_color_transformation(ColorTransformation::None, &gray8).is_ok());
    }

    #[test]
    fn test_color_transformation_codes() {
        assert_eq!(
            color_transformation_from_code(3),
            Ok(ColorTransformation::Hp3)
        );
        assert_eq!(
            color_transformation_from_code(4),
            Err(JpeglsError::ColorTransformNotSupported)
        );
        assert_eq!(
            color_transformation_from_code(5),
            Err(JpeglsError::ColorTransformNotSupported)
        );
        assert_eq!(
            color_transformation_from_code(6),
            Err(JpeglsError::InvalidEncodedData)
        );
    }

    #[test]
    fn test_preset_parameters_type() {
        assert!(check_preset_parameters_type(1, 11).is_ok());
        assert_eq!(
            check_preset_parameters_type(1, 10),
            Err(JpeglsError::InvalidMarkerSegmentSize)
        );
        assert_eq!(
            check_preset_parameters_type(2, 10),
            Err(JpeglsError::ParameterValueNotSupported)
        );
        assert_eq!(
            check_preset_parameters_type(0x0D, 10),
            Err(JpeglsError::JpeglsPresetExtendedParameterTypeNotSupported)
        );
        assert_eq!(
            check_preset_parameters_type(0x0E, 10),
            Err(JpeglsError::InvalidJpeglsPresetParameterType)
        );
        assert_eq!(
            check_preset_parameters_type(0, 10),
            Err(JpeglsError::InvalidJpeglsPresetParameterType)
        );
    }

    #[test]
    fn test_spiff_entry_checks_size_before_tag() {
        assert_eq!(
            check_spiff_entry(1, 65529),
            Err(JpeglsError::InvalidArgumentSpiffEntrySize)
        );
        assert_eq!(check_spiff_entry(1, 0), Err(JpeglsError::InvalidArgument));
        assert!(check_spiff_entry(6, 65528).is_ok());
    }
}
