// Encode/decode round trips through the public encoder and decoder.

use jpegls_rs::coding_parameters::{compute_default, compute_maximum_sample_value};
use jpegls_rs::{
    ColorTransformation, FrameInfo, InterleaveMode, JpeglsDecoder, JpeglsEncoder, JpeglsError,
    JpeglsPcParameters, SpiffColorSpace, SpiffEntryTag, SpiffResolutionUnits,
};

fn frame(width: u32, height: u32, bits_per_sample: i32, component_count: i32) -> FrameInfo {
    FrameInfo {
        width,
        height,
        bits_per_sample,
        component_count,
    }
}

/// Deterministic samples with smooth areas, edges and noise.
fn test_image(frame_info: &FrameInfo) -> Vec<u8> {
    let maximum = compute_maximum_sample_value(frame_info.bits_per_sample) as u32;
    let mut seed = 0x2545_f491u32;
    let mut samples = Vec::with_capacity(frame_info.pixel_data_size());

    for y in 0..frame_info.height {
        for x in 0..frame_info.width {
            for c in 0..frame_info.component_count as u32 {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                let value = match (y / 4 + c) % 3 {
                    0 => (x * 7 + y * 3 + c * 40) % (maximum + 1),
                    1 => {
                        if x % 8 < 4 {
                            maximum / 3
                        } else {
                            maximum
                        }
                    }
                    _ => (seed >> 16) % (maximum + 1),
                };
                if frame_info.bits_per_sample <= 8 {
                    samples.push(value as u8);
                } else {
                    samples.extend_from_slice(&(value as u16).to_le_bytes());
                }
            }
        }
    }
    samples
}

fn encode(
    frame_info: FrameInfo,
    configure: impl FnOnce(&mut JpeglsEncoder<'_>),
    source: &[u8],
) -> Vec<u8> {
    let mut destination = vec![0u8; frame_info.pixel_data_size() * 2 + 1024];
    let mut encoder = JpeglsEncoder::new(&mut destination);
    encoder.set_frame_info(frame_info).unwrap();
    configure(&mut encoder);
    let size = encoder.encode(source).unwrap();
    destination.truncate(size);
    destination
}

fn decode(encoded: &[u8]) -> (FrameInfo, Vec<u8>) {
    let mut decoder = JpeglsDecoder::new(encoded);
    decoder.read_header().unwrap();
    let frame_info = decoder.frame_info().unwrap();
    let mut destination = vec![0u8; decoder.required_size().unwrap()];
    decoder.decode(&mut destination).unwrap();
    (frame_info, destination)
}

fn assert_lossless(frame_info: FrameInfo, configure: impl FnOnce(&mut JpeglsEncoder<'_>)) {
    let source = test_image(&frame_info);
    let encoded = encode(frame_info, configure, &source);
    let (decoded_frame_info, decoded) = decode(&encoded);
    assert_eq!(decoded_frame_info, frame_info);
    assert_eq!(decoded, source);
}

#[test]
fn test_gray_8_bit() {
    assert_lossless(frame(33, 17, 8, 1), |_| {});
}

#[test]
fn test_gray_odd_bit_depths() {
    for bits_per_sample in [2, 5, 10, 12] {
        assert_lossless(frame(19, 11, bits_per_sample, 1), |_| {});
    }
}

#[test]
fn test_gray_16_bit() {
    let frame_info = frame(24, 9, 16, 1);
    let source = test_image(&frame_info);
    let encoded = encode(frame_info, |_| {}, &source);

    let mut decoder = JpeglsDecoder::new(&encoded);
    decoder.read_header().unwrap();
    // Above 12 bits the default preset coding parameters are written explicitly.
    assert_eq!(
        decoder.preset_coding_parameters().unwrap(),
        compute_default(65535, 0)
    );

    let mut decoded = vec![0u8; decoder.required_size().unwrap()];
    decoder.decode(&mut decoded).unwrap();
    assert_eq!(decoded, source);
}

#[test]
fn test_single_pixel() {
    assert_lossless(frame(1, 1, 8, 1), |_| {});
}

#[test]
fn test_rgb_line_interleaved() {
    assert_lossless(frame(20, 13, 8, 3), |encoder| {
        encoder.set_interleave_mode(InterleaveMode::Line).unwrap();
    });
}

#[test]
fn test_rgb_sample_interleaved() {
    assert_lossless(frame(20, 13, 8, 3), |encoder| {
        encoder.set_interleave_mode(InterleaveMode::Sample).unwrap();
    });
}

#[test]
fn test_four_components_sample_interleaved() {
    assert_lossless(frame(9, 7, 8, 4), |encoder| {
        encoder.set_interleave_mode(InterleaveMode::Sample).unwrap();
    });
}

#[test]
fn test_color_transformations() {
    for transformation in [
        ColorTransformation::Hp1,
        ColorTransformation::Hp2,
        ColorTransformation::Hp3,
    ] {
        for interleave_mode in [InterleaveMode::Line, InterleaveMode::Sample] {
            let frame_info = frame(16, 8, 8, 3);
            let source = test_image(&frame_info);
            let encoded = encode(
                frame_info,
                |encoder| {
                    encoder.set_interleave_mode(interleave_mode).unwrap();
                    encoder.set_color_transformation(transformation).unwrap();
                },
                &source,
            );

            let mut decoder = JpeglsDecoder::new(&encoded);
            decoder.read_header().unwrap();
            assert_eq!(decoder.color_transformation(), Ok(transformation));
            let mut decoded = vec![0u8; source.len()];
            decoder.decode(&mut decoded).unwrap();
            assert_eq!(decoded, source, "{transformation:?} {interleave_mode:?}");
        }
    }
}

#[test]
fn test_near_lossless_within_tolerance() {
    for near_lossless in [1, 3, 7] {
        let frame_info = frame(31, 15, 8, 1);
        let source = test_image(&frame_info);
        let encoded = encode(
            frame_info,
            |encoder| encoder.set_near_lossless(near_lossless).unwrap(),
            &source,
        );

        let mut decoder = JpeglsDecoder::new(&encoded);
        decoder.read_header().unwrap();
        assert_eq!(decoder.near_lossless(), Ok(near_lossless));
        let mut decoded = vec![0u8; source.len()];
        decoder.decode(&mut decoded).unwrap();

        for (index, (&expected, &actual)) in source.iter().zip(&decoded).enumerate() {
            let difference = (expected as i32 - actual as i32).abs();
            assert!(
                difference <= near_lossless,
                "sample {index}: {expected} vs {actual}, near {near_lossless}"
            );
        }
    }
}

#[test]
fn test_near_lossless_rgb_12_bit() {
    let frame_info = frame(14, 10, 12, 3);
    let source = test_image(&frame_info);
    let encoded = encode(
        frame_info,
        |encoder| {
            encoder.set_interleave_mode(InterleaveMode::Sample).unwrap();
            encoder.set_near_lossless(4).unwrap();
        },
        &source,
    );
    let (_, decoded) = decode(&encoded);

    for (expected, actual) in source.chunks_exact(2).zip(decoded.chunks_exact(2)) {
        let expected = u16::from_le_bytes([expected[0], expected[1]]) as i32;
        let actual = u16::from_le_bytes([actual[0], actual[1]]) as i32;
        assert!((expected - actual).abs() <= 4);
    }
}

#[test]
fn test_custom_preset_coding_parameters() {
    let frame_info = frame(16, 16, 8, 1);
    let preset = JpeglsPcParameters {
        maximum_sample_value: 255,
        threshold1: 2,
        threshold2: 5,
        threshold3: 10,
        reset_value: 32,
    };
    let source = test_image(&frame_info);
    let encoded = encode(
        frame_info,
        |encoder| encoder.set_preset_coding_parameters(preset).unwrap(),
        &source,
    );

    let mut decoder = JpeglsDecoder::new(&encoded);
    decoder.read_header().unwrap();
    assert_eq!(decoder.preset_coding_parameters(), Ok(preset));
    let mut decoded = vec![0u8; source.len()];
    decoder.decode(&mut decoded).unwrap();
    assert_eq!(decoded, source);
}

#[test]
fn test_custom_maximum_sample_value() {
    let frame_info = frame(12, 12, 8, 1);
    let source: Vec<u8> = (0..144).map(|i| (i % 100) as u8).collect();
    let encoded = encode(
        frame_info,
        |encoder| {
            encoder
                .set_preset_coding_parameters(JpeglsPcParameters {
                    maximum_sample_value: 99,
                    ..Default::default()
                })
                .unwrap()
        },
        &source,
    );
    let (_, decoded) = decode(&encoded);
    assert_eq!(decoded, source);
}

#[test]
fn test_spiff_header_and_entries() {
    let frame_info = frame(10, 6, 8, 3);
    let source = test_image(&frame_info);
    let encoded = encode(
        frame_info,
        |encoder| {
            encoder.set_interleave_mode(InterleaveMode::Sample).unwrap();
            encoder
                .write_standard_spiff_header(
                    SpiffColorSpace::Rgb,
                    SpiffResolutionUnits::DotsPerInch,
                    300,
                    150,
                )
                .unwrap();
            encoder
                .write_spiff_entry(SpiffEntryTag::ImageTitle.into(), b"round trip")
                .unwrap();
            encoder
                .write_spiff_entry(SpiffEntryTag::ImageDescription.into(), &[])
                .unwrap();
        },
        &source,
    );

    let mut decoder = JpeglsDecoder::new(&encoded);
    let spiff_header = decoder.read_spiff_header().unwrap().unwrap();
    assert_eq!(spiff_header.color_space, SpiffColorSpace::Rgb);
    assert_eq!(
        spiff_header.resolution_units,
        SpiffResolutionUnits::DotsPerInch
    );
    assert_eq!(
        (spiff_header.vertical_resolution, spiff_header.horizontal_resolution),
        (300, 150)
    );
    assert_eq!((spiff_header.width, spiff_header.height), (10, 6));

    decoder.read_header().unwrap();
    assert_eq!(decoder.validate_spiff_header(), Ok(()));
    let entries = decoder.spiff_entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].tag, 6);
    assert_eq!(entries[0].data, b"round trip");
    assert_eq!(entries[1].tag, 7);
    assert!(entries[1].data.is_empty());

    let mut decoded = vec![0u8; source.len()];
    decoder.decode(&mut decoded).unwrap();
    assert_eq!(decoded, source);
}

#[test]
fn test_spiff_header_that_disagrees_with_frame() {
    let frame_info = frame(8, 8, 8, 1);
    let source = test_image(&frame_info);
    let encoded = encode(
        frame_info,
        |encoder| {
            encoder
                .write_spiff_header(&jpegls_rs::SpiffHeader {
                    component_count: 1,
                    height: 8,
                    width: 9,
                    color_space: SpiffColorSpace::Grayscale,
                    bits_per_sample: 8,
                    ..Default::default()
                })
                .unwrap();
        },
        &source,
    );

    let mut decoder = JpeglsDecoder::new(&encoded);
    decoder.read_header().unwrap();
    assert_eq!(
        decoder.validate_spiff_header(),
        Err(JpeglsError::InvalidSpiffHeader)
    );

    let mut decoded = vec![0u8; source.len()];
    decoder.decode(&mut decoded).unwrap();
    assert_eq!(decoded, source);
}

#[test]
fn test_flat_image_compresses() {
    let frame_info = frame(256, 64, 8, 1);
    let source = vec![77u8; frame_info.pixel_data_size()];
    let encoded = encode(frame_info, |_| {}, &source);
    assert!(encoded.len() < 200, "{} bytes", encoded.len());

    let (_, decoded) = decode(&encoded);
    assert_eq!(decoded, source);
}

#[test]
fn test_many_small_random_rows() {
    let frame_info = frame(5, 1, 8, 1);
    let mut seed = 0x1234_5678u32;

    for _ in 0..2000 {
        let source: Vec<u8> = (0..5)
            .map(|_| {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                (seed >> 16) as u8
            })
            .collect();
        let encoded = encode(frame_info, |_| {}, &source);
        let (_, decoded) = decode(&encoded);
        assert_eq!(decoded, source);
    }
}
