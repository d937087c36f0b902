use crate::error::JpeglsError;
use crate::{CodingParameters, FrameInfo, JpeglsPcParameters};

/// The entropy coder invoked by the encoder and decoder once the framing is established.
///
/// Sample buffers hold one byte per sample for 8 bits or less and two bytes
/// (little endian) otherwise. Components are always interleaved per pixel
/// (`RGBRGB...`), whatever the interleave mode of the scan.
///
/// `preset` may be the all-zero sentinel; implementations derive the defaults themselves.
pub trait ScanCodec {
    /// Encodes `source` into `destination`, returning the number of bytes written.
    ///
    /// The encoded bytes must not contain a marker (`0xFF` followed by a byte >= `0x80`)
    /// and must not end with `0xFF`.
    fn encode_scan(
        &mut self,
        frame_info: &FrameInfo,
        preset: &JpeglsPcParameters,
        coding_parameters: &CodingParameters,
        source: &[u8],
        destination: &mut [u8],
    ) -> Result<usize, JpeglsError>;

    /// Decodes the entropy coded bytes of `source` into `destination`, returning
    /// the number of bytes consumed.
    fn decode_scan(
        &mut self,
        frame_info: &FrameInfo,
        preset: &JpeglsPcParameters,
        coding_parameters: &CodingParameters,
        source: &[u8],
        destination: &mut [u8],
    ) -> Result<usize, JpeglsError>;
}
