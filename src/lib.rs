//! JPEG-LS codec (ISO/IEC 14495-1 / ITU-T T.87).
//!
//! The crate is split in two layers:
//!
//! - The container framing layer: [`jpeg_stream_reader::JpegStreamReader`] and
//!   [`jpeg_stream_writer::JpegStreamWriter`] parse and emit the marker segments
//!   (SOI, SPIFF header and directory, SOF-55, LSE, HP color transform, SOS, EOI)
//!   and validate ordering, sizes and value ranges.
//! - The scan codec: anything implementing [`scan_codec::ScanCodec`]. The crate
//!   ships [`jpegls::JpeglsScanCodec`], the predictive coder of ISO/IEC 14495-1.
//!
//! [`JpeglsEncoder`] and [`JpeglsDecoder`] tie both layers together.
//!
//! ```no_run
//! use jpegls_rs::{FrameInfo, JpeglsDecoder, JpeglsEncoder};
//!
//! let frame_info = FrameInfo { width: 256, height: 256, bits_per_sample: 8, component_count: 1 };
//! let pixels = vec![0u8; 256 * 256];
//!
//! let mut encoded = vec![0u8; 256 * 256 * 2];
//! let mut encoder = JpeglsEncoder::new(&mut encoded);
//! encoder.set_frame_info(frame_info)?;
//! let size = encoder.encode(&pixels)?;
//!
//! let mut decoder = JpeglsDecoder::new(&encoded[..size]);
//! decoder.read_header()?;
//! let mut decoded = vec![0u8; decoder.required_size()?];
//! decoder.decode(&mut decoded)?;
//! # Ok::<(), jpegls_rs::JpeglsError>(())
//! ```

pub mod coding_parameters;
pub mod constants;
pub mod error;
#[cfg(feature = "ffi")]
pub mod ffi;
pub mod jpeg_marker_code;
pub mod jpeg_stream_reader;
pub mod jpeg_stream_writer;
pub mod jpegls;
pub mod scan_codec;
pub mod segment_validator;

pub use coding_parameters::{CodingParameters, JpeglsPcParameters};
pub use error::{ErrorCategory, JpeglsError};
pub use jpeg_stream_reader::ReaderOptions;
pub use jpegls::{JpeglsDecoder, JpeglsEncoder, JpeglsScanCodec};
pub use scan_codec::ScanCodec;

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Interleave mode for multi-component scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum InterleaveMode {
    /// No interleaving: the scan carries a single component.
    #[default]
    None = 0,
    /// Interleaved by line.
    Line = 1,
    /// Interleaved by sample.
    Sample = 2,
}

/// HP color transformation, carried in an APP8 "mrfx" segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum ColorTransformation {
    /// No color transformation.
    #[default]
    None = 0,
    /// HP1 color transformation.
    Hp1 = 1,
    /// HP2 color transformation.
    Hp2 = 2,
    /// HP3 color transformation.
    Hp3 = 3,
}

/// SPIFF profile identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SpiffProfileId {
    /// No profile.
    #[default]
    None = 0,
    /// Continuous tone base profile.
    ContinuousToneBase = 1,
    /// Continuous tone progressive profile.
    ContinuousToneProgressive = 2,
    /// Bi-level facsimile profile.
    BiLevelFacsimile = 3,
    /// Continuous tone facsimile profile.
    ContinuousToneFacsimile = 4,
}

/// SPIFF color space identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SpiffColorSpace {
    /// Bi-level black.
    BiLevelBlack = 0,
    /// YCbCr (ITU-R BT.709) video.
    YCbCrItuBt709Video = 1,
    /// No color space (none).
    #[default]
    None = 2,
    /// YCbCr (ITU-R BT.601-1) RGB.
    YCbCrItuBt6011Rgb = 3,
    /// YCbCr (ITU-R BT.601-1) video.
    YCbCrItuBt6011Video = 4,
    /// Grayscale.
    Grayscale = 8,
    /// PhotoYCC.
    PhotoYcc = 9,
    /// RGB.
    Rgb = 10,
    /// CMY.
    Cmy = 11,
    /// CMYK.
    Cmyk = 12,
    /// YCCK.
    Ycck = 13,
    /// CIE Lab.
    CieLab = 14,
    /// Bi-level white.
    BiLevelWhite = 15,
}

/// SPIFF compression type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SpiffCompressionType {
    /// Uncompressed.
    Uncompressed = 0,
    /// Modified Huffman.
    ModifiedHuffman = 1,
    /// Modified Read.
    ModifiedRead = 2,
    /// Modified Modified Read.
    ModifiedModifiedRead = 3,
    /// JBIG.
    Jbig = 4,
    /// JPEG.
    Jpeg = 5,
    /// JPEG-LS.
    #[default]
    JpegLs = 6,
}

/// SPIFF resolution units identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SpiffResolutionUnits {
    /// Aspect ratio.
    #[default]
    AspectRatio = 0,
    /// Dots per inch (DPI).
    DotsPerInch = 1,
    /// Dots per centimeter.
    DotsPerCentimeter = 2,
}

/// Well known SPIFF directory entry tags (ISO/IEC 10918-3, F.2.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum SpiffEntryTag {
    TransferCharacteristics = 2,
    ComponentRegistration = 3,
    ImageOrientation = 4,
    Thumbnail = 5,
    ImageTitle = 6,
    ImageDescription = 7,
    TimeStamp = 8,
    VersionIdentifier = 9,
    CreatorIdentification = 10,
    ProtectionIndicator = 11,
    CopyrightInformation = 12,
    ContactInformation = 13,
    TileIndex = 14,
    ScanIndex = 15,
    SetReference = 16,
}

/// Geometry and sample precision of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    pub bits_per_sample: i32,
    pub component_count: i32,
}

impl FrameInfo {
    /// Size in bytes of a buffer holding every sample of the frame.
    ///
    /// Samples of 8 bits or less take one byte, wider samples two bytes (little endian).
    pub fn pixel_data_size(&self) -> usize {
        let bytes_per_sample = if self.bits_per_sample <= 8 { 1 } else { 2 };
        self.width as usize
            * self.height as usize
            * self.component_count.max(0) as usize
            * bytes_per_sample
    }
}

/// Still Picture Interchange File Format (SPIFF) header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiffHeader {
    pub major_version: u8,
    pub minor_version: u8,
    pub profile_id: SpiffProfileId,
    pub component_count: i32,
    pub height: u32,
    pub width: u32,
    pub color_space: SpiffColorSpace,
    pub bits_per_sample: i32,
    pub compression_type: SpiffCompressionType,
    pub resolution_units: SpiffResolutionUnits,
    pub vertical_resolution: u32,
    pub horizontal_resolution: u32,
}

impl Default for SpiffHeader {
    fn default() -> Self {
        Self {
            major_version: constants::SPIFF_MAJOR_REVISION_NUMBER,
            minor_version: constants::SPIFF_MINOR_REVISION_NUMBER,
            profile_id: SpiffProfileId::None,
            component_count: 0,
            height: 0,
            width: 0,
            color_space: SpiffColorSpace::None,
            bits_per_sample: 0,
            compression_type: SpiffCompressionType::JpegLs,
            resolution_units: SpiffResolutionUnits::AspectRatio,
            vertical_resolution: 1,
            horizontal_resolution: 1,
        }
    }
}

/// A SPIFF directory entry. The data borrows from the source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiffEntry<'a> {
    pub tag: u32,
    pub data: &'a [u8],
}

/// An application data (APPn) segment that is not a SPIFF header or color transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplicationData<'a> {
    /// The n of APPn, 0..=15.
    pub id: u8,
    pub data: &'a [u8],
}
