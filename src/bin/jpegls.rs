//! jpegls CLI - JPEG-LS encoder, decoder and stream inspector.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use jpegls_rs::{
    ColorTransformation, FrameInfo, InterleaveMode, JpeglsDecoder, JpeglsEncoder, SpiffColorSpace,
    SpiffResolutionUnits,
};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

/// JPEG-LS (ISO/IEC 14495-1) codec
#[derive(Parser)]
#[command(name = "jpegls")]
#[command(version)]
#[command(about = "Encode, decode and inspect JPEG-LS images", long_about = None)]
#[command(after_help = "EXAMPLES:
    jpegls encode -i pixels.raw -o image.jls -w 512 -H 512
    jpegls encode -i rgb.raw -o image.jls -w 640 -H 480 -n 3 --interleave sample --transform hp1
    jpegls decode -i image.jls -o image.pgm -f pnm
    jpegls info -i image.jls")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode raw samples to a JPEG-LS stream
    ///
    /// Samples are pixel interleaved; samples wider than 8 bits take two
    /// bytes, little endian.
    #[command(visible_alias = "e")]
    Encode {
        /// Raw sample file
        #[arg(short, long)]
        input: PathBuf,

        /// Encoded output file
        #[arg(short, long)]
        output: PathBuf,

        /// Image width in pixels
        #[arg(short, long)]
        width: u32,

        /// Image height in pixels
        #[arg(short = 'H', long)]
        height: u32,

        /// Bits per sample (2-16)
        #[arg(short, long, default_value = "8")]
        bits: i32,

        /// Number of components (1-255)
        #[arg(short = 'n', long, default_value = "1")]
        components: i32,

        /// Near-lossless tolerance (0 = lossless)
        #[arg(long, default_value = "0")]
        near: i32,

        /// Interleave mode for multi-component images
        #[arg(long, default_value = "none", value_enum)]
        interleave: Interleave,

        /// HP color transformation (3 components only)
        #[arg(long, default_value = "none", value_enum)]
        transform: Transform,

        /// Write a SPIFF header in front of the frame
        #[arg(long)]
        spiff: bool,
    },

    /// Decode a JPEG-LS stream to raw samples or PNM
    #[command(visible_alias = "d")]
    Decode {
        /// JPEG-LS input file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "raw", value_enum)]
        format: OutputFormat,
    },

    /// Print the header segments of a JPEG-LS stream
    #[command(visible_alias = "i")]
    Info {
        /// JPEG-LS input file
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Interleave {
    None,
    Line,
    Sample,
}

impl From<Interleave> for InterleaveMode {
    fn from(value: Interleave) -> Self {
        match value {
            Interleave::None => InterleaveMode::None,
            Interleave::Line => InterleaveMode::Line,
            Interleave::Sample => InterleaveMode::Sample,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Transform {
    None,
    Hp1,
    Hp2,
    Hp3,
}

impl From<Transform> for ColorTransformation {
    fn from(value: Transform) -> Self {
        match value {
            Transform::None => ColorTransformation::None,
            Transform::Hp1 => ColorTransformation::Hp1,
            Transform::Hp2 => ColorTransformation::Hp2,
            Transform::Hp3 => ColorTransformation::Hp3,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Raw samples, as accepted by `encode`
    Raw,
    /// PGM (1 component) or PPM (3 components)
    Pnm,
}

struct EncodeOptions {
    frame_info: FrameInfo,
    near_lossless: i32,
    interleave_mode: InterleaveMode,
    color_transformation: ColorTransformation,
    spiff: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    match cli.command {
        Commands::Encode {
            input,
            output,
            width,
            height,
            bits,
            components,
            near,
            interleave,
            transform,
            spiff,
        } => {
            let options = EncodeOptions {
                frame_info: FrameInfo {
                    width,
                    height,
                    bits_per_sample: bits,
                    component_count: components,
                },
                near_lossless: near,
                interleave_mode: interleave.into(),
                color_transformation: transform.into(),
                spiff,
            };
            encode_file(&input, &output, &options)
        }
        Commands::Decode {
            input,
            output,
            format,
        } => decode_file(&input, &output, format),
        Commands::Info { input } => show_info(&input),
    }
}

fn encode_file(input: &Path, output: &Path, options: &EncodeOptions) -> Result<()> {
    let pixels = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    debug!("read {} bytes from {}", pixels.len(), input.display());

    let mut no_destination = [0u8; 0];
    let mut sizing = JpeglsEncoder::new(&mut no_destination);
    sizing.set_frame_info(options.frame_info)?;
    let mut destination = vec![0u8; sizing.estimated_destination_size()?];

    let mut encoder = JpeglsEncoder::new(&mut destination);
    encoder.set_frame_info(options.frame_info)?;
    encoder.set_near_lossless(options.near_lossless)?;
    encoder.set_interleave_mode(options.interleave_mode)?;
    encoder.set_color_transformation(options.color_transformation)?;
    if options.spiff {
        let color_space = match options.frame_info.component_count {
            1 => SpiffColorSpace::Grayscale,
            3 => SpiffColorSpace::Rgb,
            4 => SpiffColorSpace::Cmyk,
            _ => SpiffColorSpace::None,
        };
        encoder.write_standard_spiff_header(color_space, SpiffResolutionUnits::AspectRatio, 1, 1)?;
    }
    let size = encoder
        .encode(&pixels)
        .with_context(|| format!("encoding {}", input.display()))?;
    destination.truncate(size);

    fs::write(output, &destination).with_context(|| format!("writing {}", output.display()))?;
    info!(
        "encoded {}x{} image into {} bytes",
        options.frame_info.width, options.frame_info.height, size
    );
    println!(
        "Encoded {} ({} bytes) to {}",
        input.display(),
        size,
        output.display()
    );
    Ok(())
}

fn decode_file(input: &Path, output: &Path, format: OutputFormat) -> Result<()> {
    let data = fs::read(input).with_context(|| format!("reading {}", input.display()))?;

    let mut decoder = JpeglsDecoder::new(&data);
    decoder.read_header()?;
    let frame_info = decoder.frame_info()?;
    let mut pixels = vec![0u8; decoder.required_size()?];
    decoder
        .decode(&mut pixels)
        .with_context(|| format!("decoding {}", input.display()))?;

    match format {
        OutputFormat::Raw => fs::write(output, &pixels)?,
        OutputFormat::Pnm => write_pnm(output, &pixels, &frame_info)?,
    }

    println!(
        "Decoded {}x{} image ({} components, {} bits) to {}",
        frame_info.width,
        frame_info.height,
        frame_info.component_count,
        frame_info.bits_per_sample,
        output.display()
    );
    Ok(())
}

fn write_pnm(output: &Path, pixels: &[u8], frame_info: &FrameInfo) -> Result<()> {
    let magic = match frame_info.component_count {
        1 => "P5",
        3 => "P6",
        count => bail!("PNM output needs 1 or 3 components, the image has {count}"),
    };
    let maximum_value = (1u32 << frame_info.bits_per_sample) - 1;

    let mut data = format!(
        "{}\n{} {}\n{}\n",
        magic, frame_info.width, frame_info.height, maximum_value
    )
    .into_bytes();
    if frame_info.bits_per_sample <= 8 {
        data.extend_from_slice(pixels);
    } else {
        // PNM stores wide samples big endian.
        let swapped = pixels.chunks_exact(2).flat_map(|pair| [pair[1], pair[0]]);
        data.extend(swapped);
    }
    fs::write(output, data)?;
    Ok(())
}

fn show_info(input: &Path) -> Result<()> {
    let data = fs::read(input).with_context(|| format!("reading {}", input.display()))?;

    let mut decoder = JpeglsDecoder::new(&data);
    decoder.read_header()?;
    let frame_info = decoder.frame_info()?;

    println!("File: {}", input.display());
    println!("Size: {} bytes", data.len());
    println!();
    println!("Width:           {}", frame_info.width);
    println!("Height:          {}", frame_info.height);
    println!("Bits per sample: {}", frame_info.bits_per_sample);
    println!("Components:      {}", frame_info.component_count);
    println!("Near lossless:   {}", decoder.near_lossless()?);
    println!("Interleave mode: {:?}", decoder.interleave_mode()?);
    println!("Color transform: {:?}", decoder.color_transformation()?);

    let preset = decoder.preset_coding_parameters()?;
    if !preset.is_all_default() {
        println!(
            "Preset:          MAXVAL {} T1 {} T2 {} T3 {} RESET {}",
            preset.maximum_sample_value,
            preset.threshold1,
            preset.threshold2,
            preset.threshold3,
            preset.reset_value
        );
    }

    if let Some(spiff_header) = decoder.spiff_header() {
        println!();
        println!("SPIFF header:");
        println!("  Color space:   {:?}", spiff_header.color_space);
        println!("  Compression:   {:?}", spiff_header.compression_type);
        println!(
            "  Resolution:    {} x {} ({:?})",
            spiff_header.horizontal_resolution,
            spiff_header.vertical_resolution,
            spiff_header.resolution_units
        );
        if let Err(error) = decoder.validate_spiff_header() {
            println!("  Warning:       header does not match the frame ({error})");
        }
        for entry in decoder.spiff_entries() {
            println!("  Entry {}: {} bytes", entry.tag, entry.data.len());
        }
    }

    for comment in decoder.comments() {
        println!("Comment: {}", String::from_utf8_lossy(comment));
    }
    for application_data in decoder.application_data() {
        println!(
            "APP{}: {} bytes",
            application_data.id,
            application_data.data.len()
        );
    }
    Ok(())
}
