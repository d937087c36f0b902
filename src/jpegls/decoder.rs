use super::JpeglsScanCodec;
use super::validate_spiff_header::validate_spiff_header;
use crate::error::JpeglsError;
use crate::jpeg_stream_reader::{JpegStreamReader, ReaderOptions};
use crate::scan_codec::ScanCodec;
use crate::segment_validator::ReaderState;
use crate::{
    ApplicationData, ColorTransformation, FrameInfo, InterleaveMode, JpeglsPcParameters,
    SpiffEntry, SpiffHeader,
};

/// Reads a JPEG-LS stream from a caller supplied buffer.
///
/// Call [`JpeglsDecoder::read_header`] first; the frame and scan parameters are
/// available afterwards, and [`JpeglsDecoder::decode`] produces the samples.
pub struct JpeglsDecoder<'a> {
    reader: JpegStreamReader<'a>,
    spiff_header: Option<SpiffHeader>,
    header_read: bool,
}

impl<'a> JpeglsDecoder<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self::with_options(source, ReaderOptions::default())
    }

    pub fn with_options(source: &'a [u8], options: ReaderOptions) -> Self {
        Self {
            reader: JpegStreamReader::new(source, options),
            spiff_header: None,
            header_read: false,
        }
    }

    /// Reads the SOI marker and the SPIFF header that may follow it.
    pub fn read_spiff_header(&mut self) -> Result<Option<SpiffHeader>, JpeglsError> {
        self.spiff_header = self.reader.read_spiff_header()?;
        Ok(self.spiff_header)
    }

    /// Reads every segment up to and including the SOS segment.
    pub fn read_header(&mut self) -> Result<(), JpeglsError> {
        if self.header_read {
            return Err(JpeglsError::InvalidOperation);
        }
        self.reader.read_header(&mut self.spiff_header)?;
        self.reader.read_start_of_scan()?;
        self.header_read = true;
        Ok(())
    }

    pub fn frame_info(&self) -> Result<FrameInfo, JpeglsError> {
        self.check_header_read()?;
        Ok(self.reader.frame_info())
    }

    pub fn near_lossless(&self) -> Result<i32, JpeglsError> {
        self.check_header_read()?;
        Ok(self.reader.parameters().near_lossless)
    }

    pub fn interleave_mode(&self) -> Result<InterleaveMode, JpeglsError> {
        self.check_header_read()?;
        Ok(self.reader.parameters().interleave_mode)
    }

    pub fn color_transformation(&self) -> Result<ColorTransformation, JpeglsError> {
        self.check_header_read()?;
        Ok(self.reader.parameters().transformation)
    }

    /// The preset coding parameters of the LSE segment, all zero when the stream uses the
    /// defaults.
    pub fn preset_coding_parameters(&self) -> Result<JpeglsPcParameters, JpeglsError> {
        self.check_header_read()?;
        Ok(self.reader.preset_coding_parameters())
    }

    pub fn spiff_header(&self) -> Option<SpiffHeader> {
        self.spiff_header
    }

    pub fn spiff_entries(&self) -> &[SpiffEntry<'a>] {
        self.reader.spiff_entries()
    }

    pub fn comments(&self) -> &[&'a [u8]] {
        self.reader.comments()
    }

    pub fn application_data(&self) -> &[ApplicationData<'a>] {
        self.reader.application_data()
    }

    /// Size in bytes of the buffer [`Self::decode`] needs.
    pub fn required_size(&self) -> Result<usize, JpeglsError> {
        Ok(self.frame_info()?.pixel_data_size())
    }

    /// Checks the SPIFF header, if any, against the frame. The reader itself
    /// accepts a header that disagrees with the frame.
    pub fn validate_spiff_header(&self) -> Result<(), JpeglsError> {
        let frame_info = self.frame_info()?;
        match &self.spiff_header {
            Some(spiff_header) => validate_spiff_header(spiff_header, &frame_info),
            None => Ok(()),
        }
    }

    /// Decodes the scan with the JPEG-LS scan codec.
    pub fn decode(&mut self, destination: &mut [u8]) -> Result<(), JpeglsError> {
        self.decode_with(&mut JpeglsScanCodec, destination)
    }

    pub fn decode_with<C: ScanCodec + ?Sized>(
        &mut self,
        codec: &mut C,
        destination: &mut [u8],
    ) -> Result<(), JpeglsError> {
        self.check_header_read()?;
        if self.reader.state() != ReaderState::ScanSection {
            return Err(JpeglsError::InvalidOperation);
        }
        self.reader.read(codec, destination)
    }

    fn check_header_read(&self) -> Result<(), JpeglsError> {
        if self.header_read {
            Ok(())
        } else {
            Err(JpeglsError::InvalidOperation)
        }
    }
}
