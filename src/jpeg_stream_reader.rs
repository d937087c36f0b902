//! JPEG-LS codestream reader.
//!
//! `JpegStreamReader` walks the marker segments of a JPEG-LS stream in a
//! single forward pass. The ordering rules live in
//! [`crate::segment_validator::next_reader_state`]; this module classifies
//! segments, parses their payloads and validates the values they carry.

use crate::coding_parameters::{self, compute_maximum_sample_value};
use crate::constants::*;
use crate::error::JpeglsError;
use crate::jpeg_marker_code::{JPEG_MARKER_START_BYTE, JpegMarkerCode};
use crate::scan_codec::ScanCodec;
use crate::segment_validator::{self as validator, ReaderEvent, ReaderState};
use crate::{
    ApplicationData, CodingParameters, ColorTransformation, FrameInfo, JpeglsPcParameters,
    SpiffEntry, SpiffHeader,
};
use log::{debug, trace, warn};

/// Controls which optional segments the reader keeps for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReaderOptions {
    /// Do not collect COM segments.
    pub skip_comments: bool,
    /// Do not collect APPn segments. SPIFF and HP color transformation segments are always
    /// parsed.
    pub skip_application_data: bool,
}

pub struct JpegStreamReader<'a> {
    source: &'a [u8],
    position: usize,
    options: ReaderOptions,
    state: ReaderState,
    start_of_scan_pending: bool,
    frame_info: FrameInfo,
    component_ids: Vec<u8>,
    parameters: CodingParameters,
    preset_coding_parameters: JpeglsPcParameters,
    spiff_header: Option<SpiffHeader>,
    spiff_entries: Vec<SpiffEntry<'a>>,
    comments: Vec<&'a [u8]>,
    application_data: Vec<ApplicationData<'a>>,
}

impl<'a> JpegStreamReader<'a> {
    pub fn new(source: &'a [u8], options: ReaderOptions) -> Self {
        Self {
            source,
            position: 0,
            options,
            state: ReaderState::Created,
            start_of_scan_pending: false,
            frame_info: FrameInfo::default(),
            component_ids: Vec::new(),
            parameters: CodingParameters::default(),
            preset_coding_parameters: JpeglsPcParameters::default(),
            spiff_header: None,
            spiff_entries: Vec::new(),
            comments: Vec::new(),
            application_data: Vec::new(),
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn frame_info(&self) -> FrameInfo {
        self.frame_info
    }

    pub fn parameters(&self) -> CodingParameters {
        self.parameters
    }

    /// The preset coding parameters as read from the LSE segment; all zero when the stream has
    /// none.
    pub fn preset_coding_parameters(&self) -> JpeglsPcParameters {
        self.preset_coding_parameters
    }

    pub fn spiff_header(&self) -> Option<SpiffHeader> {
        self.spiff_header
    }

    pub fn spiff_entries(&self) -> &[SpiffEntry<'a>] {
        &self.spiff_entries
    }

    pub fn comments(&self) -> &[&'a [u8]] {
        &self.comments
    }

    pub fn application_data(&self) -> &[ApplicationData<'a>] {
        &self.application_data
    }

    /// Reads the SOI marker and, when the first segment is a SPIFF header, that header.
    pub fn read_spiff_header(&mut self) -> Result<Option<SpiffHeader>, JpeglsError> {
        if self.state != ReaderState::Created {
            return Err(JpeglsError::InvalidOperation);
        }
        self.read_start_of_image()?;

        if self.peek_marker_code() == Some(JpegMarkerCode::ApplicationData8.into()) {
            let code = self.read_marker_code()?;
            self.read_marker_segment(code)?;
        }
        Ok(self.spiff_header)
    }

    /// Reads every segment up to and including the SOS marker code.
    ///
    /// Returns whether the stream carries a SPIFF header, which is stored in `spiff_header`.
    pub fn read_header(
        &mut self,
        spiff_header: &mut Option<SpiffHeader>,
    ) -> Result<bool, JpeglsError> {
        if self.state == ReaderState::Created {
            self.read_start_of_image()?;
        }
        if self.start_of_scan_pending
            || !matches!(
                self.state,
                ReaderState::HeaderSection
                    | ReaderState::SpiffHeaderSection
                    | ReaderState::ImageSection
                    | ReaderState::FrameSection
            )
        {
            return Err(JpeglsError::InvalidOperation);
        }

        loop {
            let code = self.read_marker_code()?;
            if code == u8::from(JpegMarkerCode::StartOfScan) {
                // Validates the ordering, the segment itself is parsed by read_start_of_scan.
                validator::next_reader_state(self.state, ReaderEvent::StartOfScan)?;
                self.start_of_scan_pending = true;
                break;
            }
            self.read_marker_segment(code)?;
        }

        *spiff_header = self.spiff_header;
        Ok(self.spiff_header.is_some())
    }

    /// Parses and validates the SOS segment.
    pub fn read_start_of_scan(&mut self) -> Result<(), JpeglsError> {
        if !self.start_of_scan_pending {
            return Err(JpeglsError::InvalidOperation);
        }

        let payload = self.read_segment_payload()?;
        self.read_start_of_scan_segment(payload)?;

        self.state = validator::next_reader_state(self.state, ReaderEvent::StartOfScan)?;
        self.start_of_scan_pending = false;
        Ok(())
    }

    /// Decodes the scan with `codec` into `destination` and consumes the EOI marker.
    pub fn read<C: ScanCodec + ?Sized>(
        &mut self,
        codec: &mut C,
        destination: &mut [u8],
    ) -> Result<(), JpeglsError> {
        if self.state != ReaderState::ScanSection {
            return Err(JpeglsError::InvalidOperation);
        }
        if self.parameters.restart_interval != 0 {
            return Err(JpeglsError::ParameterValueNotSupported);
        }

        let required_size = self.frame_info.pixel_data_size();
        if destination.len() < required_size {
            return Err(JpeglsError::DestinationBufferTooSmall);
        }

        let scan_end = self.find_end_of_scan();
        if scan_end == self.position {
            return match self.peek_marker_code() {
                Some(code) if code == u8::from(JpegMarkerCode::EndOfImage) => {
                    Err(JpeglsError::UnexpectedEndOfImageMarker)
                }
                Some(_) => Err(JpeglsError::InvalidEncodedData),
                None => Err(JpeglsError::SourceBufferTooSmall),
            };
        }

        let scan_data = &self.source[self.position..scan_end];
        debug!("decoding scan of {} bytes", scan_data.len());
        let consumed = codec.decode_scan(
            &self.frame_info,
            &self.preset_coding_parameters,
            &self.parameters,
            scan_data,
            &mut destination[..required_size],
        )?;
        if consumed < scan_data.len() {
            return Err(JpeglsError::TooMuchEncodedData);
        }
        self.position = scan_end;

        if self.position >= self.source.len() {
            return Err(JpeglsError::EndOfImageMarkerNotFound);
        }
        let code = self.read_marker_code()?;
        let event = if code == u8::from(JpegMarkerCode::EndOfImage) {
            ReaderEvent::EndOfImage
        } else {
            self.classify_without_payload(code)?
        };
        self.state = validator::next_reader_state(self.state, event)?;

        if self.position != self.source.len() {
            trace!(
                "{} bytes after the end of image marker",
                self.source.len() - self.position
            );
        }
        Ok(())
    }

    fn read_start_of_image(&mut self) -> Result<(), JpeglsError> {
        if self.source.len() < 2 {
            return Err(JpeglsError::SourceBufferTooSmall);
        }
        if self.source[0] != JPEG_MARKER_START_BYTE
            || self.source[1] != u8::from(JpegMarkerCode::StartOfImage)
        {
            return Err(JpeglsError::StartOfImageMarkerNotFound);
        }
        self.position = 2;
        self.state = validator::next_reader_state(self.state, ReaderEvent::StartOfImage)?;
        Ok(())
    }

    fn read_u8(&mut self) -> Result<u8, JpeglsError> {
        let value = *self
            .source
            .get(self.position)
            .ok_or(JpeglsError::SourceBufferTooSmall)?;
        self.position += 1;
        Ok(value)
    }

    fn read_u16(&mut self) -> Result<u16, JpeglsError> {
        let high = self.read_u8()? as u16;
        let low = self.read_u8()? as u16;
        Ok((high << 8) | low)
    }

    /// Reads `0xFF`, any fill bytes (ISO/IEC 10918-1, B.1.1.2) and the marker code.
    fn read_marker_code(&mut self) -> Result<u8, JpeglsError> {
        if self.read_u8()? != JPEG_MARKER_START_BYTE {
            return Err(JpeglsError::JpegMarkerStartByteNotFound);
        }
        loop {
            let code = self.read_u8()?;
            if code != JPEG_MARKER_START_BYTE {
                return Ok(code);
            }
        }
    }

    fn peek_marker_code(&self) -> Option<u8> {
        let rest = self.source.get(self.position..)?;
        if rest.first() != Some(&JPEG_MARKER_START_BYTE) {
            return None;
        }
        rest.iter()
            .skip(1)
            .copied()
            .find(|&byte| byte != JPEG_MARKER_START_BYTE)
    }

    fn read_segment_payload(&mut self) -> Result<&'a [u8], JpeglsError> {
        let length = self.read_u16()?;
        let payload_size =
            validator::check_segment_length(length, self.source.len() - self.position)?;

        let source: &'a [u8] = self.source;
        let payload = &source[self.position..self.position + payload_size];
        self.position += payload_size;
        Ok(payload)
    }

    // Markers without a payload, or with a payload the reader never parses in this state.
    fn classify_without_payload(&self, code: u8) -> Result<ReaderEvent, JpeglsError> {
        Ok(match JpegMarkerCode::from_code(code)? {
            JpegMarkerCode::StartOfImage => ReaderEvent::StartOfImage,
            JpegMarkerCode::EndOfImage => ReaderEvent::EndOfImage,
            JpegMarkerCode::StartOfScan => ReaderEvent::StartOfScan,
            JpegMarkerCode::StartOfFrameJpegls => ReaderEvent::StartOfFrame,
            JpegMarkerCode::JpeglsPresetParameters => ReaderEvent::PresetParameters,
            JpegMarkerCode::DefineRestartInterval => ReaderEvent::RestartInterval,
            JpegMarkerCode::Comment => ReaderEvent::Comment,
            _ => ReaderEvent::ApplicationData,
        })
    }

    fn read_marker_segment(&mut self, code: u8) -> Result<(), JpeglsError> {
        let marker = JpegMarkerCode::from_code(code)?;
        trace!("marker {marker:?} at offset {}", self.position - 2);

        match marker {
            JpegMarkerCode::StartOfImage
            | JpegMarkerCode::EndOfImage
            | JpegMarkerCode::StartOfScan => {
                let event = self.classify_without_payload(code)?;
                self.state = validator::next_reader_state(self.state, event)?;
                Ok(())
            }
            JpegMarkerCode::ApplicationData8 => {
                let payload = self.read_segment_payload()?;
                self.read_application_data8_segment(payload)
            }
            _ => {
                let event = self.classify_without_payload(code)?;
                let next_state = validator::next_reader_state(self.state, event)?;
                let payload = self.read_segment_payload()?;

                match marker {
                    JpegMarkerCode::StartOfFrameJpegls => {
                        self.read_start_of_frame_segment(payload)?
                    }
                    JpegMarkerCode::JpeglsPresetParameters => {
                        self.read_preset_parameters_segment(payload)?
                    }
                    JpegMarkerCode::DefineRestartInterval => {
                        self.read_define_restart_interval_segment(payload)?
                    }
                    JpegMarkerCode::Comment => {
                        if !self.options.skip_comments {
                            self.comments.push(payload);
                        }
                    }
                    _ => self.store_application_data(marker, payload),
                }
                self.state = next_state;
                Ok(())
            }
        }
    }

    fn store_application_data(&mut self, marker: JpegMarkerCode, payload: &'a [u8]) {
        debug_assert!(marker.is_application_data());
        if !self.options.skip_application_data {
            self.application_data.push(ApplicationData {
                id: u8::from(marker) - u8::from(JpegMarkerCode::ApplicationData0),
                data: payload,
            });
        }
    }

    // APP8 carries the SPIFF header, the SPIFF directory or the HP color transformation.
    fn read_application_data8_segment(&mut self, payload: &'a [u8]) -> Result<(), JpeglsError> {
        if self.state == ReaderState::SpiffHeaderSection {
            return self.read_spiff_directory_entry(payload);
        }

        if self.state == ReaderState::HeaderSection && payload.starts_with(&SPIFF_MAGIC_ID) {
            if let Some(header) = self.parse_spiff_header(payload)? {
                self.state = validator::next_reader_state(self.state, ReaderEvent::SpiffHeader)?;
                self.spiff_header = Some(header);
                return Ok(());
            }
        } else if payload.starts_with(&COLOR_TRANSFORMATION_MAGIC_ID) {
            self.state =
                validator::next_reader_state(self.state, ReaderEvent::ColorTransformation)?;
            return self.read_color_transform_segment(payload);
        }

        self.state = validator::next_reader_state(self.state, ReaderEvent::ApplicationData)?;
        self.store_application_data(JpegMarkerCode::ApplicationData8, payload);
        Ok(())
    }

    fn parse_spiff_header(&self, payload: &[u8]) -> Result<Option<SpiffHeader>, JpeglsError> {
        if payload.len() < SPIFF_HEADER_PAYLOAD_SIZE {
            return Err(JpeglsError::InvalidMarkerSegmentSize);
        }

        let major_version = payload[6];
        if major_version > SPIFF_MAJOR_REVISION_NUMBER {
            warn!("SPIFF version {major_version} is not supported, kept as application data");
            return Ok(None);
        }

        let u32_at = |offset: usize| {
            u32::from_be_bytes([
                payload[offset],
                payload[offset + 1],
                payload[offset + 2],
                payload[offset + 3],
            ])
        };

        let header = SpiffHeader {
            major_version,
            minor_version: payload[7],
            profile_id: spiff_field(payload[8])?,
            component_count: payload[9] as i32,
            height: u32_at(10),
            width: u32_at(14),
            color_space: spiff_field(payload[18])?,
            bits_per_sample: payload[19] as i32,
            compression_type: spiff_field(payload[20])?,
            resolution_units: spiff_field(payload[21])?,
            vertical_resolution: u32_at(22),
            horizontal_resolution: u32_at(26),
        };
        debug!("SPIFF header: {header:?}");
        Ok(Some(header))
    }

    fn read_spiff_directory_entry(&mut self, payload: &'a [u8]) -> Result<(), JpeglsError> {
        if payload.len() < 4 {
            return Err(JpeglsError::InvalidMarkerSegmentSize);
        }

        let tag = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
        if tag == SPIFF_END_OF_DIRECTORY_ENTRY_TYPE {
            // The SOI that follows the entry is covered by its length and consumed as padding.
            self.state =
                validator::next_reader_state(self.state, ReaderEvent::SpiffEndOfDirectory)?;
            return Ok(());
        }

        self.state = validator::next_reader_state(self.state, ReaderEvent::SpiffDirectoryEntry)?;
        self.spiff_entries.push(SpiffEntry {
            tag,
            data: &payload[4..],
        });
        Ok(())
    }

    fn read_color_transform_segment(&mut self, payload: &[u8]) -> Result<(), JpeglsError> {
        if payload.len() != COLOR_TRANSFORMATION_MAGIC_ID.len() + 1 {
            return Err(JpeglsError::InvalidMarkerSegmentSize);
        }
        self.parameters.transformation = validator::color_transformation_from_code(payload[4])?;
        Ok(())
    }

    fn read_start_of_frame_segment(&mut self, payload: &[u8]) -> Result<(), JpeglsError> {
        if payload.len() < 6 {
            return Err(JpeglsError::InvalidMarkerSegmentSize);
        }
        let component_count = payload[5] as usize;
        validator::check_frame_segment_size(payload.len(), component_count)?;

        let frame_info = FrameInfo {
            bits_per_sample: payload[0] as i32,
            height: u16::from_be_bytes([payload[1], payload[2]]) as u32,
            width: u16::from_be_bytes([payload[3], payload[4]]) as u32,
            component_count: component_count as i32,
        };
        validator::check_frame_parameters(&frame_info)?;

        let mut component_ids = Vec::with_capacity(component_count);
        for component in payload[6..].chunks_exact(3) {
            let component_id = component[0];
            if component_ids.contains(&component_id) {
                return Err(JpeglsError::DuplicateComponentIdInSofSegment);
            }
            if component[1] != DEFAULT_SAMPLING_FACTOR {
                return Err(JpeglsError::ParameterValueNotSupported);
            }
            component_ids.push(component_id);
        }

        debug!("frame: {frame_info:?}");
        self.frame_info = frame_info;
        self.component_ids = component_ids;
        Ok(())
    }

    fn read_preset_parameters_segment(&mut self, payload: &[u8]) -> Result<(), JpeglsError> {
        let Some(&parameter_type) = payload.first() else {
            return Err(JpeglsError::InvalidMarkerSegmentSize);
        };
        validator::check_preset_parameters_type(parameter_type, payload.len())?;

        let u16_at =
            |offset: usize| u16::from_be_bytes([payload[offset], payload[offset + 1]]) as i32;
        self.preset_coding_parameters = JpeglsPcParameters {
            maximum_sample_value: u16_at(1),
            threshold1: u16_at(3),
            threshold2: u16_at(5),
            threshold3: u16_at(7),
            reset_value: u16_at(9),
        };
        debug!("preset parameters: {:?}", self.preset_coding_parameters);
        Ok(())
    }

    fn read_define_restart_interval_segment(&mut self, payload: &[u8]) -> Result<(), JpeglsError> {
        // ISO/IEC 10918-1, B.2.4.4 allows 2, 3 or 4 bytes for Ri.
        if !(2..=4).contains(&payload.len()) {
            return Err(JpeglsError::InvalidMarkerSegmentSize);
        }
        self.parameters.restart_interval = payload
            .iter()
            .fold(0u32, |value, &byte| (value << 8) | byte as u32);
        Ok(())
    }

    fn read_start_of_scan_segment(&mut self, payload: &[u8]) -> Result<(), JpeglsError> {
        let Some(&component_count_in_scan) = payload.first() else {
            return Err(JpeglsError::InvalidMarkerSegmentSize);
        };
        let component_count_in_scan = component_count_in_scan as usize;
        validator::check_scan_segment_size(payload.len(), component_count_in_scan)?;

        if component_count_in_scan != self.frame_info.component_count as usize {
            return Err(JpeglsError::InvalidParameterComponentCount);
        }

        for component in payload[1..1 + 2 * component_count_in_scan].chunks_exact(2) {
            if !self.component_ids.contains(&component[0]) {
                return Err(JpeglsError::UnknownComponentId);
            }
            if component[1] != 0 {
                // Mapping tables are not supported.
                return Err(JpeglsError::ParameterValueNotSupported);
            }
        }

        let trailer = &payload[1 + 2 * component_count_in_scan..];
        let near_lossless = trailer[0] as i32;
        let maximum_sample_value = match self.preset_coding_parameters.maximum_sample_value {
            0 => compute_maximum_sample_value(self.frame_info.bits_per_sample),
            value => value,
        };
        if !validator::is_near_lossless_valid(near_lossless, maximum_sample_value) {
            return Err(JpeglsError::InvalidParameterNearLossless);
        }

        let interleave_mode =
            validator::interleave_mode_from_scan(trailer[1], component_count_in_scan as i32)?;
        if trailer[2] != 0 {
            // Point transform.
            return Err(JpeglsError::ParameterValueNotSupported);
        }

        coding_parameters::validate(
            &self.preset_coding_parameters,
            compute_maximum_sample_value(self.frame_info.bits_per_sample),
            near_lossless,
        )
        .ok_or(JpeglsError::InvalidParameterJpeglsPresetParameters)?;

        if self.parameters.transformation != ColorTransformation::None {
            if self.frame_info.component_count != 3 {
                return Err(JpeglsError::ColorTransformNotSupported);
            }
            if self.frame_info.bits_per_sample != 8 && self.frame_info.bits_per_sample != 16 {
                return Err(JpeglsError::BitDepthForTransformNotSupported);
            }
        }

        self.parameters.near_lossless = near_lossless;
        self.parameters.interleave_mode = interleave_mode;
        debug!("scan: {:?}", self.parameters);
        Ok(())
    }

    // The scan ends at the first marker: 0xFF followed by a byte with the high bit set.
    fn find_end_of_scan(&self) -> usize {
        self.source[self.position..]
            .windows(2)
            .position(|pair| pair[0] == JPEG_MARKER_START_BYTE && pair[1] >= 0x80)
            .map_or(self.source.len(), |offset| self.position + offset)
    }
}

fn spiff_field<T: TryFrom<u8>>(value: u8) -> Result<T, JpeglsError> {
    T::try_from(value).map_err(|_| JpeglsError::InvalidSpiffHeader)
}
