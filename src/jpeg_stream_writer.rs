//! JPEG-LS codestream writer.
//!
//! `JpegStreamWriter` emits the markers and segments of a JPEG-LS stream
//! (SOI, SPIFF header and directory, SOF-55, LSE, APP8 "mrfx", SOS, EOI).
//! Every segment is checked against the remaining capacity before its first
//! byte is written, so a failing write leaves the destination untouched.

use crate::constants::*;
use crate::error::JpeglsError;
use crate::jpeg_marker_code::{JPEG_MARKER_START_BYTE, JpegMarkerCode};
use crate::{ColorTransformation, FrameInfo, InterleaveMode, JpeglsPcParameters, SpiffHeader};
use log::trace;

pub struct JpegStreamWriter<'a> {
    destination: &'a mut [u8],
    position: usize,
}

impl<'a> JpegStreamWriter<'a> {
    pub fn new(destination: &'a mut [u8]) -> Self {
        Self {
            destination,
            position: 0,
        }
    }

    pub fn bytes_written(&self) -> usize {
        self.position
    }

    pub fn capacity(&self) -> usize {
        self.destination.len()
    }

    pub fn write_start_of_image(&mut self) -> Result<(), JpeglsError> {
        self.ensure_capacity(2)?;
        self.write_marker(JpegMarkerCode::StartOfImage);
        Ok(())
    }

    pub fn write_end_of_image(&mut self) -> Result<(), JpeglsError> {
        self.ensure_capacity(2)?;
        self.write_marker(JpegMarkerCode::EndOfImage);
        Ok(())
    }

    /// Writes the SPIFF header as an APP8 segment.
    pub fn write_spiff_header_segment(&mut self, header: &SpiffHeader) -> Result<(), JpeglsError> {
        self.write_segment_header(JpegMarkerCode::ApplicationData8, SPIFF_HEADER_PAYLOAD_SIZE)?;

        self.write_bytes(&SPIFF_MAGIC_ID);
        self.write_u8(header.major_version);
        self.write_u8(header.minor_version);
        self.write_u8(header.profile_id.into());
        self.write_u8(header.component_count as u8);
        self.write_u32(header.height);
        self.write_u32(header.width);
        self.write_u8(header.color_space.into());
        self.write_u8(header.bits_per_sample as u8);
        self.write_u8(header.compression_type.into());
        self.write_u8(header.resolution_units.into());
        self.write_u32(header.vertical_resolution);
        self.write_u32(header.horizontal_resolution);

        trace!("wrote SPIFF header {}x{}", header.width, header.height);
        Ok(())
    }

    pub fn write_spiff_directory_entry(
        &mut self,
        entry_tag: u32,
        entry_data: &[u8],
    ) -> Result<(), JpeglsError> {
        debug_assert!(entry_data.len() <= SPIFF_ENTRY_MAX_DATA_SIZE);

        self.write_segment_header(JpegMarkerCode::ApplicationData8, 4 + entry_data.len())?;
        self.write_u32(entry_tag);
        self.write_bytes(entry_data);

        trace!(
            "wrote SPIFF directory entry, tag {entry_tag}, {} bytes",
            entry_data.len()
        );
        Ok(())
    }

    /// Writes the SPIFF end of directory entry.
    ///
    /// ISO/IEC 10918-3, F.2.2.3: the entry is followed by an SOI marker, which
    /// the EOD segment length covers so readers see it as padding.
    pub fn write_spiff_end_of_directory_entry(&mut self) -> Result<(), JpeglsError> {
        self.write_segment_header(JpegMarkerCode::ApplicationData8, 4 + 2)?;
        self.write_u32(SPIFF_END_OF_DIRECTORY_ENTRY_TYPE);
        self.write_marker(JpegMarkerCode::StartOfImage);
        Ok(())
    }

    /// Writes the SOF-55 segment. Component ids are 1..=component_count.
    pub fn write_start_of_frame_segment(
        &mut self,
        frame_info: &FrameInfo,
    ) -> Result<(), JpeglsError> {
        debug_assert!(frame_info.width <= MAXIMUM_WIDTH && frame_info.height <= MAXIMUM_HEIGHT);

        let component_count = frame_info.component_count as usize;
        self.write_segment_header(JpegMarkerCode::StartOfFrameJpegls, 6 + 3 * component_count)?;

        self.write_u8(frame_info.bits_per_sample as u8);
        self.write_u16(frame_info.height as u16);
        self.write_u16(frame_info.width as u16);
        self.write_u8(component_count as u8);

        for component_id in 1..=component_count {
            self.write_u8(component_id as u8);
            self.write_u8(DEFAULT_SAMPLING_FACTOR);
            self.write_u8(0); // Tq: no quantization table in JPEG-LS
        }
        Ok(())
    }

    /// Writes the HP color transformation (APP8 "mrfx") segment.
    pub fn write_color_transform_segment(
        &mut self,
        transformation: ColorTransformation,
    ) -> Result<(), JpeglsError> {
        self.write_segment_header(
            JpegMarkerCode::ApplicationData8,
            COLOR_TRANSFORMATION_MAGIC_ID.len() + 1,
        )?;
        self.write_bytes(&COLOR_TRANSFORMATION_MAGIC_ID);
        self.write_u8(transformation.into());
        Ok(())
    }

    pub fn write_jpegls_preset_parameters_segment(
        &mut self,
        pc: &JpeglsPcParameters,
    ) -> Result<(), JpeglsError> {
        self.write_segment_header(
            JpegMarkerCode::JpeglsPresetParameters,
            PRESET_CODING_PARAMETERS_PAYLOAD_SIZE,
        )?;
        self.write_u8(1); // Type 1: Preset coding parameters

        self.write_u16(pc.maximum_sample_value as u16);
        self.write_u16(pc.threshold1 as u16);
        self.write_u16(pc.threshold2 as u16);
        self.write_u16(pc.threshold3 as u16);
        self.write_u16(pc.reset_value as u16);

        trace!("wrote preset coding parameters {pc:?}");
        Ok(())
    }

    pub fn write_start_of_scan_segment(
        &mut self,
        component_count: i32,
        near_lossless: i32,
        interleave_mode: InterleaveMode,
    ) -> Result<(), JpeglsError> {
        let component_count = component_count as usize;
        self.write_segment_header(JpegMarkerCode::StartOfScan, 4 + 2 * component_count)?;

        self.write_u8(component_count as u8);
        for component_id in 1..=component_count {
            self.write_u8(component_id as u8);
            self.write_u8(0); // Mapping table selector
        }

        self.write_u8(near_lossless as u8);
        self.write_u8(interleave_mode.into());
        self.write_u8(0); // Ah, Al point transform (0)
        Ok(())
    }

    /// The unused part of the destination, handed to the scan codec.
    pub fn remaining_slice(&mut self) -> &mut [u8] {
        &mut self.destination[self.position..]
    }

    pub fn advance(&mut self, count: usize) {
        debug_assert!(self.position + count <= self.destination.len());
        self.position += count;
    }

    fn ensure_capacity(&self, count: usize) -> Result<(), JpeglsError> {
        if self.destination.len() - self.position < count {
            return Err(JpeglsError::DestinationBufferTooSmall);
        }
        Ok(())
    }

    // Checks room for the whole segment, then writes marker and length.
    fn write_segment_header(
        &mut self,
        marker: JpegMarkerCode,
        payload_size: usize,
    ) -> Result<(), JpeglsError> {
        debug_assert!(payload_size <= SEGMENT_MAX_DATA_SIZE);

        self.ensure_capacity(2 + SEGMENT_LENGTH_SIZE + payload_size)?;
        self.write_marker(marker);
        self.write_u16((payload_size + SEGMENT_LENGTH_SIZE) as u16);
        Ok(())
    }

    fn write_marker(&mut self, marker: JpegMarkerCode) {
        self.write_u8(JPEG_MARKER_START_BYTE);
        self.write_u8(marker.into());
    }

    fn write_u8(&mut self, value: u8) {
        self.destination[self.position] = value;
        self.position += 1;
    }

    fn write_u16(&mut self, value: u16) {
        self.write_bytes(&value.to_be_bytes());
    }

    fn write_u32(&mut self, value: u32) {
        self.write_bytes(&value.to_be_bytes());
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        let end = self.position + bytes.len();
        self.destination[self.position..end].copy_from_slice(bytes);
        self.position = end;
    }
}
