// Default RESET value as defined in ISO/IEC 14495-1, table C.2
pub const DEFAULT_RESET_THRESHOLD: i32 = 64;

pub const MINIMUM_WIDTH: u32 = 1;
pub const MAXIMUM_WIDTH: u32 = u16::MAX as u32;
pub const MINIMUM_HEIGHT: u32 = 1;
pub const MAXIMUM_HEIGHT: u32 = u16::MAX as u32;
pub const MINIMUM_COMPONENT_COUNT: i32 = 1;
pub const MAXIMUM_COMPONENT_COUNT: i32 = 255;
pub const MAXIMUM_COMPONENT_COUNT_IN_SCAN: usize = 4;
pub const MINIMUM_BITS_PER_SAMPLE: i32 = 2;
pub const MAXIMUM_BITS_PER_SAMPLE: i32 = 16;
pub const MAXIMUM_NEAR_LOSSLESS: i32 = 255;

// Preset coding parameters are always written for images with more than 12 bits per sample.
pub const MAXIMUM_BITS_PER_SAMPLE_WITH_IMPLICIT_PRESET: i32 = 12;

// ISO/IEC 14495-1, section 4.8.1 defines the SPIFF version numbers to be used for the SPIFF
// header in combination with JPEG-LS.
pub const SPIFF_MAJOR_REVISION_NUMBER: u8 = 2;
pub const SPIFF_MINOR_REVISION_NUMBER: u8 = 0;

pub const SPIFF_END_OF_DIRECTORY_ENTRY_TYPE: u32 = 1;

pub const SPIFF_MAGIC_ID: [u8; 6] = *b"SPIFF\0";

// The size of a SPIFF header when serialized to a JPEG byte stream.
pub const SPIFF_HEADER_SIZE_IN_BYTES: usize = 34;

// The size of the SPIFF header payload: magic, version, fields.
pub const SPIFF_HEADER_PAYLOAD_SIZE: usize = 30;

// The maximum size of the data bytes that fit in a spiff entry.
pub const SPIFF_ENTRY_MAX_DATA_SIZE: usize = 65528;

// The size in bytes of the segment length field.
pub const SEGMENT_LENGTH_SIZE: usize = 2;

// The maximum size of the data bytes that fit in a segment.
pub const SEGMENT_MAX_DATA_SIZE: usize = u16::MAX as usize - SEGMENT_LENGTH_SIZE;

// HP color transformation segment: "mrfx" + transformation id.
pub const COLOR_TRANSFORMATION_MAGIC_ID: [u8; 4] = *b"mrfx";

// The JPEG-LS preset parameters segment of type 1 carries five u16 values after the type byte.
pub const PRESET_CODING_PARAMETERS_PAYLOAD_SIZE: usize = 11;

// Every component in a JPEG-LS frame has a 1x1 sampling factor.
pub const DEFAULT_SAMPLING_FACTOR: u8 = 0x11;

pub const CONTEXT_COUNT: usize = 365;

// ISO/IEC 14495-1, code segment A.14: run length order J.
pub const J: [i32; 32] = [
    0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 9, 10, 11, 12, 13,
    14, 15,
];
