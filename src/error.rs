//! Error codes shared by the stream reader, the stream writer and the binding surface.
//!
//! The discriminants are stable: they are the values returned across the C ABI.

use thiserror::Error;

/// Broad classification of a [`JpeglsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Caller supplied configuration is out of contract. Detected before any output is produced.
    Argument,
    /// A value read from the bitstream is out of range.
    StreamParameter,
    /// The marker structure of the bitstream is malformed.
    Structural,
    /// A source or destination buffer has the wrong size.
    Capacity,
    /// The API was used out of order.
    Operational,
    /// An allocation failed.
    Resource,
    Unexpected,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum JpeglsError {
    #[error("Invalid argument")]
    InvalidArgument = 1,
    #[error("Parameter value not supported")]
    ParameterValueNotSupported = 2,
    #[error("Destination buffer too small")]
    DestinationBufferTooSmall = 3,
    #[error("Source buffer too small")]
    SourceBufferTooSmall = 4,
    #[error("Invalid encoded data")]
    InvalidEncodedData = 5,
    #[error("Too much encoded data")]
    TooMuchEncodedData = 6,
    #[error("Invalid operation")]
    InvalidOperation = 7,
    #[error("Bit depth for color transform not supported")]
    BitDepthForTransformNotSupported = 8,
    #[error("Color transform not supported")]
    ColorTransformNotSupported = 9,
    #[error("Encoding not supported")]
    EncodingNotSupported = 10,
    #[error("Unknown JPEG marker found")]
    UnknownJpegMarkerFound = 11,
    #[error("JPEG marker start byte not found")]
    JpegMarkerStartByteNotFound = 12,
    #[error("Not enough memory")]
    NotEnoughMemory = 13,
    #[error("Unexpected failure")]
    UnexpectedFailure = 14,
    #[error("Start of image marker not found")]
    StartOfImageMarkerNotFound = 15,
    #[error("Start of frame marker not found")]
    StartOfFrameMarkerNotFound = 16,
    #[error("Invalid marker segment size")]
    InvalidMarkerSegmentSize = 17,
    #[error("Duplicate start of image marker")]
    DuplicateStartOfImageMarker = 18,
    #[error("Duplicate start of frame marker")]
    DuplicateStartOfFrameMarker = 19,
    #[error("Duplicate component ID in SOF segment")]
    DuplicateComponentIdInSofSegment = 20,
    #[error("Unexpected end of image marker")]
    UnexpectedEndOfImageMarker = 21,
    #[error("Invalid JPEG-LS preset parameter type")]
    InvalidJpeglsPresetParameterType = 22,
    #[error("JPEG-LS preset extended parameter type not supported")]
    JpeglsPresetExtendedParameterTypeNotSupported = 23,
    #[error("Missing end of SPIFF directory")]
    MissingEndOfSpiffDirectory = 24,
    #[error("End of image marker not found")]
    EndOfImageMarkerNotFound = 28,
    #[error("Unknown component ID")]
    UnknownComponentId = 31,
    #[error("Invalid SPIFF header")]
    InvalidSpiffHeader = 32,

    #[error("Invalid argument width")]
    InvalidArgumentWidth = 100,
    #[error("Invalid argument height")]
    InvalidArgumentHeight = 101,
    #[error("Invalid argument component count")]
    InvalidArgumentComponentCount = 102,
    #[error("Invalid argument bits per sample")]
    InvalidArgumentBitsPerSample = 103,
    #[error("Invalid argument interleave mode")]
    InvalidArgumentInterleaveMode = 104,
    #[error("Invalid argument destination")]
    InvalidArgumentDestination = 105,
    #[error("Invalid argument source")]
    InvalidArgumentSource = 106,
    /// Not produced by this crate; reserved so code 107 keeps its meaning for C callers.
    #[error("Invalid argument thumbnail")]
    InvalidArgumentThumbnail = 107,
    #[error("Invalid argument SPIFF entry size")]
    InvalidArgumentSpiffEntrySize = 108,
    #[error("Invalid argument near lossless")]
    InvalidArgumentNearLossless = 109,
    #[error("Invalid argument JPEG-LS preset coding parameters")]
    InvalidArgumentJpeglsPcParameters = 110,
    #[error("Invalid argument color transformation")]
    InvalidArgumentColorTransformation = 111,

    #[error("Invalid parameter width")]
    InvalidParameterWidth = 200,
    #[error("Invalid parameter height")]
    InvalidParameterHeight = 201,
    #[error("Invalid parameter component count")]
    InvalidParameterComponentCount = 202,
    #[error("Invalid parameter bits per sample")]
    InvalidParameterBitsPerSample = 203,
    #[error("Invalid parameter interleave mode")]
    InvalidParameterInterleaveMode = 204,
    #[error("Invalid parameter near lossless")]
    InvalidParameterNearLossless = 205,
    #[error("Invalid parameter JPEG-LS preset parameters")]
    InvalidParameterJpeglsPresetParameters = 206,
}

impl JpeglsError {
    /// The stable integer code of this error. `0` is reserved for success.
    pub const fn code(self) -> i32 {
        self as i32
    }

    pub const fn category(self) -> ErrorCategory {
        use JpeglsError::*;
        match self {
            InvalidArgument
            | InvalidArgumentWidth
            | InvalidArgumentHeight
            | InvalidArgumentComponentCount
            | InvalidArgumentBitsPerSample
            | InvalidArgumentInterleaveMode
            | InvalidArgumentDestination
            | InvalidArgumentSource
            | InvalidArgumentThumbnail
            | InvalidArgumentSpiffEntrySize
            | InvalidArgumentNearLossless
            | InvalidArgumentJpeglsPcParameters
            | InvalidArgumentColorTransformation
            | BitDepthForTransformNotSupported => ErrorCategory::Argument,

            InvalidParameterWidth
            | InvalidParameterHeight
            | InvalidParameterComponentCount
            | InvalidParameterBitsPerSample
            | InvalidParameterInterleaveMode
            | InvalidParameterNearLossless
            | InvalidParameterJpeglsPresetParameters
            | ParameterValueNotSupported
            | ColorTransformNotSupported
            | InvalidEncodedData
            | InvalidSpiffHeader => ErrorCategory::StreamParameter,

            EncodingNotSupported
            | UnknownJpegMarkerFound
            | JpegMarkerStartByteNotFound
            | StartOfImageMarkerNotFound
            | StartOfFrameMarkerNotFound
            | InvalidMarkerSegmentSize
            | DuplicateStartOfImageMarker
            | DuplicateStartOfFrameMarker
            | DuplicateComponentIdInSofSegment
            | UnexpectedEndOfImageMarker
            | EndOfImageMarkerNotFound
            | InvalidJpeglsPresetParameterType
            | JpeglsPresetExtendedParameterTypeNotSupported
            | MissingEndOfSpiffDirectory
            | UnknownComponentId => ErrorCategory::Structural,

            DestinationBufferTooSmall | SourceBufferTooSmall | TooMuchEncodedData => {
                ErrorCategory::Capacity
            }
            InvalidOperation => ErrorCategory::Operational,
            NotEnoughMemory => ErrorCategory::Resource,
            UnexpectedFailure => ErrorCategory::Unexpected,
        }
    }
}

impl From<std::collections::TryReserveError> for JpeglsError {
    fn from(_: std::collections::TryReserveError) -> Self {
        JpeglsError::NotEnoughMemory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(JpeglsError::InvalidArgument.code(), 1);
        assert_eq!(
            JpeglsError::JpeglsPresetExtendedParameterTypeNotSupported.code(),
            23
        );
        assert_eq!(JpeglsError::InvalidArgumentThumbnail.code(), 107);
        assert_eq!(JpeglsError::InvalidArgumentSpiffEntrySize.code(), 108);
        assert_eq!(JpeglsError::InvalidParameterWidth.code(), 200);
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            JpeglsError::InvalidArgumentWidth.category(),
            ErrorCategory::Argument
        );
        assert_eq!(
            JpeglsError::InvalidArgumentThumbnail.category(),
            ErrorCategory::Argument
        );
        assert_eq!(
            JpeglsError::InvalidParameterWidth.category(),
            ErrorCategory::StreamParameter
        );
        assert_eq!(
            JpeglsError::DuplicateStartOfFrameMarker.category(),
            ErrorCategory::Structural
        );
        assert_eq!(
            JpeglsError::SourceBufferTooSmall.category(),
            ErrorCategory::Capacity
        );
        assert_eq!(
            JpeglsError::InvalidOperation.category(),
            ErrorCategory::Operational
        );
        assert_eq!(
            JpeglsError::NotEnoughMemory.category(),
            ErrorCategory::Resource
        );
    }

    #[test]
    fn test_display_message() {
        assert_eq!(
            JpeglsError::StartOfImageMarkerNotFound.to_string(),
            "Start of image marker not found"
        );
    }
}
