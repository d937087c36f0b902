use crate::error::JpeglsError;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Marker codes recognized by the JPEG-LS stream reader and writer.
///
/// Codes not listed here are either another JPEG coding process (see
/// [`is_unsupported_start_of_frame`]) or unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum JpegMarkerCode {
    /// SOI: Marks the start of an image.
    StartOfImage = 0xD8,

    /// EOI: Marks the end of an image.
    EndOfImage = 0xD9,

    /// SOS: Marks the start of scan.
    StartOfScan = 0xDA,

    /// DRI: Defines the restart interval used in succeeding scans.
    DefineRestartInterval = 0xDD,

    /// APP0: Application data 0: used for JFIF header.
    ApplicationData0 = 0xE0,
    /// APP1: Application data 1: used for EXIF or XMP header.
    ApplicationData1 = 0xE1,
    /// APP2: Application data 2: used for ICC profile.
    ApplicationData2 = 0xE2,
    /// APP3: Application data 3: used for meta info
    ApplicationData3 = 0xE3,
    /// APP4: Application data 4.
    ApplicationData4 = 0xE4,
    /// APP5: Application data 5.
    ApplicationData5 = 0xE5,
    /// APP6: Application data 6.
    ApplicationData6 = 0xE6,
    /// APP7: Application data 7: used for HP color-space info.
    ApplicationData7 = 0xE7,
    /// APP8: Application data 8: used for HP color-transformation info or SPIFF header.
    ApplicationData8 = 0xE8,
    /// APP9: Application data 9.
    ApplicationData9 = 0xE9,
    /// APP10: Application data 10.
    ApplicationData10 = 0xEA,
    /// APP11: Application data 11.
    ApplicationData11 = 0xEB,
    /// APP12: Application data 12: used for Picture info.
    ApplicationData12 = 0xEC,
    /// APP13: Application data 13: used by PhotoShop IRB
    ApplicationData13 = 0xED,
    /// APP14: Application data 14: used by Adobe
    ApplicationData14 = 0xEE,
    /// APP15: Application data 15.
    ApplicationData15 = 0xEF,

    /// COM: Comment block.
    Comment = 0xFE,

    // The following markers are defined in ISO/IEC 14495-1 | ITU T.87. (JPEG-LS standard)
    /// SOF_55: Marks the start of a JPEG-LS encoded frame.
    StartOfFrameJpegls = 0xF7,

    /// LSE: Marks the start of a JPEG-LS preset parameters segment.
    JpeglsPresetParameters = 0xF8,
}

impl JpegMarkerCode {
    /// Maps a marker code byte to a known marker.
    ///
    /// Start of frame markers of the other JPEG coding processes map to
    /// [`JpeglsError::EncodingNotSupported`], everything else to
    /// [`JpeglsError::UnknownJpegMarkerFound`].
    pub fn from_code(code: u8) -> Result<Self, JpeglsError> {
        Self::try_from(code).map_err(|_| {
            if is_unsupported_start_of_frame(code) {
                JpeglsError::EncodingNotSupported
            } else {
                JpeglsError::UnknownJpegMarkerFound
            }
        })
    }

    pub fn is_application_data(self) -> bool {
        (0xE0..=0xEF).contains(&u8::from(self))
    }
}

/// SOF0..SOF15 of ISO/IEC 10918-1, excluding DHT (C4), JPG (C8) and DAC (CC).
pub fn is_unsupported_start_of_frame(code: u8) -> bool {
    (0xC0..=0xCF).contains(&code) && code != 0xC4 && code != 0xC8 && code != 0xCC
}

pub const JPEG_MARKER_START_BYTE: u8 = 0xFF;
