use crate::error::JpeglsError;
use crate::{FrameInfo, SpiffColorSpace, SpiffCompressionType, SpiffHeader, SpiffProfileId};

fn is_valid_color_space(color_space: SpiffColorSpace, component_count: i32) -> bool {
    match color_space {
        SpiffColorSpace::None => true,
        // Bi-level images cannot be coded with JPEG-LS.
        SpiffColorSpace::BiLevelBlack | SpiffColorSpace::BiLevelWhite => false,
        SpiffColorSpace::Grayscale => component_count == 1,
        SpiffColorSpace::YCbCrItuBt709Video
        | SpiffColorSpace::YCbCrItuBt6011Rgb
        | SpiffColorSpace::YCbCrItuBt6011Video
        | SpiffColorSpace::Rgb
        | SpiffColorSpace::Cmy
        | SpiffColorSpace::PhotoYcc
        | SpiffColorSpace::CieLab => component_count == 3,
        SpiffColorSpace::Cmyk | SpiffColorSpace::Ycck => component_count == 4,
    }
}

/// Checks that a SPIFF header describes a JPEG-LS image matching `frame_info`.
pub fn validate_spiff_header(
    spiff_header: &SpiffHeader,
    frame_info: &FrameInfo,
) -> Result<(), JpeglsError> {
    let valid = spiff_header.compression_type == SpiffCompressionType::JpegLs
        && spiff_header.profile_id == SpiffProfileId::None
        && spiff_header.horizontal_resolution != 0
        && spiff_header.vertical_resolution != 0
        && spiff_header.component_count == frame_info.component_count
        && is_valid_color_space(spiff_header.color_space, spiff_header.component_count)
        && spiff_header.bits_per_sample == frame_info.bits_per_sample
        && spiff_header.height == frame_info.height
        && spiff_header.width == frame_info.width;

    if valid {
        Ok(())
    } else {
        Err(JpeglsError::InvalidSpiffHeader)
    }
}
