//! C Foreign Function Interface for jpegls-rs.
//!
//! Decoders and encoders are exposed as opaque handles. Every fallible
//! function returns `0` on success or the [`JpeglsError`] code; a panic inside
//! the library is reported as [`JpeglsError::UnexpectedFailure`].

use crate::error::JpeglsError;
use crate::segment_validator::{WriterEvent, WriterState, check_spiff_entry, next_writer_state};
use crate::{
    FrameInfo, InterleaveMode, JpeglsDecoder, JpeglsEncoder, SpiffColorSpace, SpiffCompressionType,
    SpiffHeader, SpiffProfileId, SpiffResolutionUnits,
};
use std::os::raw::{c_int, c_uchar};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

/// Opaque decoder handle.
#[repr(C)]
pub struct JpeglsDecoderHandle {
    _private: [u8; 0],
}

/// Opaque encoder handle.
#[repr(C)]
pub struct JpeglsEncoderHandle {
    _private: [u8; 0],
}

/// Frame information.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct JpeglsFrameInfo {
    pub width: u32,
    pub height: u32,
    pub bits_per_sample: i32,
    pub component_count: i32,
}

/// SPIFF header; the enumerated fields carry their wire values.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct JpeglsSpiffHeader {
    pub profile_id: i32,
    pub component_count: i32,
    pub height: u32,
    pub width: u32,
    pub color_space: i32,
    pub bits_per_sample: i32,
    pub compression_type: i32,
    pub resolution_units: i32,
    pub vertical_resolution: u32,
    pub horizontal_resolution: u32,
}

impl From<FrameInfo> for JpeglsFrameInfo {
    fn from(frame_info: FrameInfo) -> Self {
        Self {
            width: frame_info.width,
            height: frame_info.height,
            bits_per_sample: frame_info.bits_per_sample,
            component_count: frame_info.component_count,
        }
    }
}

impl From<JpeglsFrameInfo> for FrameInfo {
    fn from(frame_info: JpeglsFrameInfo) -> Self {
        Self {
            width: frame_info.width,
            height: frame_info.height,
            bits_per_sample: frame_info.bits_per_sample,
            component_count: frame_info.component_count,
        }
    }
}

impl From<SpiffHeader> for JpeglsSpiffHeader {
    fn from(header: SpiffHeader) -> Self {
        Self {
            profile_id: u8::from(header.profile_id) as i32,
            component_count: header.component_count,
            height: header.height,
            width: header.width,
            color_space: u8::from(header.color_space) as i32,
            bits_per_sample: header.bits_per_sample,
            compression_type: u8::from(header.compression_type) as i32,
            resolution_units: u8::from(header.resolution_units) as i32,
            vertical_resolution: header.vertical_resolution,
            horizontal_resolution: header.horizontal_resolution,
        }
    }
}

impl TryFrom<JpeglsSpiffHeader> for SpiffHeader {
    type Error = JpeglsError;

    fn try_from(header: JpeglsSpiffHeader) -> Result<Self, JpeglsError> {
        fn wire<T: TryFrom<u8>>(value: i32) -> Result<T, JpeglsError> {
            u8::try_from(value)
                .ok()
                .and_then(|value| T::try_from(value).ok())
                .ok_or(JpeglsError::InvalidArgument)
        }

        Ok(Self {
            profile_id: wire::<SpiffProfileId>(header.profile_id)?,
            component_count: header.component_count,
            height: header.height,
            width: header.width,
            color_space: wire::<SpiffColorSpace>(header.color_space)?,
            bits_per_sample: header.bits_per_sample,
            compression_type: wire::<SpiffCompressionType>(header.compression_type)?,
            resolution_units: wire::<SpiffResolutionUnits>(header.resolution_units)?,
            vertical_resolution: header.vertical_resolution,
            horizontal_resolution: header.horizontal_resolution,
            ..Default::default()
        })
    }
}

fn result_code(result: Result<(), JpeglsError>) -> c_int {
    match result {
        Ok(()) => 0,
        Err(error) => error.code(),
    }
}

fn guarded<F: FnOnce() -> Result<(), JpeglsError>>(f: F) -> c_int {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result_code(result),
        Err(_) => JpeglsError::UnexpectedFailure.code(),
    }
}

/// Decoder state. The decoder owns a copy of the source, so every call
/// parses it again from the start.
struct DecoderState {
    source: Vec<u8>,
    frame_info: Option<FrameInfo>,
}

impl DecoderState {
    fn frame_info(&self) -> Result<FrameInfo, JpeglsError> {
        self.frame_info.ok_or(JpeglsError::InvalidOperation)
    }
}

unsafe fn decoder_state<'a>(
    decoder: *mut JpeglsDecoderHandle,
) -> Result<&'a mut DecoderState, JpeglsError> {
    unsafe { (decoder as *mut DecoderState).as_mut() }.ok_or(JpeglsError::InvalidArgument)
}

/// Creates a decoder without a source.
#[unsafe(no_mangle)]
pub extern "C" fn jpegls_decoder_create() -> *mut JpeglsDecoderHandle {
    let state = Box::new(DecoderState {
        source: Vec::new(),
        frame_info: None,
    });
    Box::into_raw(state) as *mut JpeglsDecoderHandle
}

/// Frees a decoder handle.
///
/// # Safety
/// `decoder` must be null or a handle from `jpegls_decoder_create` that was not freed yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jpegls_decoder_destroy(decoder: *mut JpeglsDecoderHandle) {
    if !decoder.is_null() {
        let _ = unsafe { Box::from_raw(decoder as *mut DecoderState) };
    }
}

/// Copies the encoded stream into the decoder.
///
/// # Safety
/// `decoder` must be a valid handle. `data` must point to `len` readable bytes.
#[unsafe(no_mangle)]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub unsafe extern "C" fn jpegls_decoder_set_source_buffer(
    decoder: *mut JpeglsDecoderHandle,
    data: *const c_uchar,
    len: usize,
) -> c_int {
    guarded(|| {
        let state = unsafe { decoder_state(decoder) }?;
        if data.is_null() || len == 0 {
            return Err(JpeglsError::InvalidArgumentSource);
        }

        let source = unsafe { std::slice::from_raw_parts(data, len) };
        state.source = source.to_vec();
        state.frame_info = None;
        Ok(())
    })
}

/// Reads the SPIFF header, if present. `header_found` is set to 1 when the
/// stream has one and `header` is filled in, 0 otherwise.
///
/// # Safety
/// `decoder` must be valid. `header` and `header_found` must be writable.
#[unsafe(no_mangle)]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub unsafe extern "C" fn jpegls_decoder_read_spiff_header(
    decoder: *mut JpeglsDecoderHandle,
    header: *mut JpeglsSpiffHeader,
    header_found: *mut c_int,
) -> c_int {
    guarded(|| {
        let state = unsafe { decoder_state(decoder) }?;
        if header.is_null() || header_found.is_null() {
            return Err(JpeglsError::InvalidArgument);
        }

        let spiff_header = JpeglsDecoder::new(&state.source).read_spiff_header()?;
        unsafe {
            *header_found = spiff_header.is_some() as c_int;
            if let Some(spiff_header) = spiff_header {
                *header = spiff_header.into();
            }
        }
        Ok(())
    })
}

/// Reads the header segments up to the scan.
///
/// # Safety
/// `decoder` must be a valid handle.
#[unsafe(no_mangle)]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub unsafe extern "C" fn jpegls_decoder_read_header(decoder: *mut JpeglsDecoderHandle) -> c_int {
    guarded(|| {
        let state = unsafe { decoder_state(decoder) }?;
        let mut jpegls_decoder = JpeglsDecoder::new(&state.source);
        jpegls_decoder.read_header()?;
        state.frame_info = Some(jpegls_decoder.frame_info()?);
        Ok(())
    })
}

/// Fills `info` with the frame of the stream. Requires `jpegls_decoder_read_header`.
///
/// # Safety
/// `decoder` must be valid. `info` must point to a writable `JpeglsFrameInfo`.
#[unsafe(no_mangle)]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub unsafe extern "C" fn jpegls_decoder_get_frame_info(
    decoder: *mut JpeglsDecoderHandle,
    info: *mut JpeglsFrameInfo,
) -> c_int {
    guarded(|| {
        let state = unsafe { decoder_state(decoder) }?;
        if info.is_null() {
            return Err(JpeglsError::InvalidArgument);
        }
        let frame_info = state.frame_info()?;
        unsafe { *info = frame_info.into() };
        Ok(())
    })
}

/// Stores the size in bytes `jpegls_decoder_decode_to_buffer` needs in `size`.
///
/// # Safety
/// `decoder` must be valid. `size` must be writable.
#[unsafe(no_mangle)]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub unsafe extern "C" fn jpegls_decoder_get_destination_size(
    decoder: *mut JpeglsDecoderHandle,
    size: *mut usize,
) -> c_int {
    guarded(|| {
        let state = unsafe { decoder_state(decoder) }?;
        if size.is_null() {
            return Err(JpeglsError::InvalidArgument);
        }
        let required_size = state.frame_info()?.pixel_data_size();
        unsafe { *size = required_size };
        Ok(())
    })
}

/// Decodes the samples into `destination`. Requires `jpegls_decoder_read_header`.
///
/// # Safety
/// `decoder` must be valid. `destination` must point to `len` writable bytes.
#[unsafe(no_mangle)]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub unsafe extern "C" fn jpegls_decoder_decode_to_buffer(
    decoder: *mut JpeglsDecoderHandle,
    destination: *mut c_uchar,
    len: usize,
) -> c_int {
    guarded(|| {
        let state = unsafe { decoder_state(decoder) }?;
        state.frame_info()?;
        if destination.is_null() {
            return Err(JpeglsError::InvalidArgumentDestination);
        }

        let destination = unsafe { std::slice::from_raw_parts_mut(destination, len) };
        let mut jpegls_decoder = JpeglsDecoder::new(&state.source);
        jpegls_decoder.read_header()?;
        jpegls_decoder.decode(destination)
    })
}

/// Encoder state. Settings and SPIFF segments are recorded and written into
/// the destination again on every call, so errors surface where they occur.
struct EncoderState {
    destination: *mut u8,
    destination_len: usize,
    state: WriterState,
    frame_info: Option<FrameInfo>,
    near_lossless: i32,
    interleave_mode: InterleaveMode,
    spiff_header: Option<SpiffHeader>,
    spiff_entries: Vec<(u32, Vec<u8>)>,
    bytes_written: usize,
}

impl EncoderState {
    fn configure(&mut self) -> Result<(), JpeglsError> {
        self.state = next_writer_state(self.state, WriterEvent::Configure)?;
        Ok(())
    }

    /// Writes the recorded SPIFF segments through `encoder`.
    fn prepare(&self, encoder: &mut JpeglsEncoder<'_>) -> Result<(), JpeglsError> {
        if let Some(frame_info) = self.frame_info {
            encoder.set_frame_info(frame_info)?;
        }
        encoder.set_near_lossless(self.near_lossless)?;
        encoder.set_interleave_mode(self.interleave_mode)?;
        if let Some(spiff_header) = &self.spiff_header {
            encoder.write_spiff_header(spiff_header)?;
            for (tag, data) in &self.spiff_entries {
                encoder.write_spiff_entry(*tag, data)?;
            }
        }
        Ok(())
    }

    fn replay(&self) -> Result<usize, JpeglsError> {
        let (pointer, len) = (self.destination, self.destination_len);
        if pointer.is_null() {
            return Err(JpeglsError::InvalidOperation);
        }
        // SAFETY: the caller keeps the buffer passed to set_destination_buffer alive.
        let destination = unsafe { std::slice::from_raw_parts_mut(pointer, len) };
        let mut encoder = JpeglsEncoder::new(destination);
        self.prepare(&mut encoder)?;
        Ok(encoder.bytes_written())
    }
}

unsafe fn encoder_state<'a>(
    encoder: *mut JpeglsEncoderHandle,
) -> Result<&'a mut EncoderState, JpeglsError> {
    unsafe { (encoder as *mut EncoderState).as_mut() }.ok_or(JpeglsError::InvalidArgument)
}

/// Creates an encoder without a destination.
#[unsafe(no_mangle)]
pub extern "C" fn jpegls_encoder_create() -> *mut JpeglsEncoderHandle {
    let state = Box::new(EncoderState {
        destination: ptr::null_mut(),
        destination_len: 0,
        state: WriterState::Initial,
        frame_info: None,
        near_lossless: 0,
        interleave_mode: InterleaveMode::None,
        spiff_header: None,
        spiff_entries: Vec::new(),
        bytes_written: 0,
    });
    Box::into_raw(state) as *mut JpeglsEncoderHandle
}

/// Frees an encoder handle.
///
/// # Safety
/// `encoder` must be null or a handle from `jpegls_encoder_create` that was not freed yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jpegls_encoder_destroy(encoder: *mut JpeglsEncoderHandle) {
    if !encoder.is_null() {
        let _ = unsafe { Box::from_raw(encoder as *mut EncoderState) };
    }
}

/// Sets the buffer the stream is written to. It must stay valid until the
/// encoder is destroyed.
///
/// # Safety
/// `encoder` must be valid. `destination` must point to `len` writable bytes.
#[unsafe(no_mangle)]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub unsafe extern "C" fn jpegls_encoder_set_destination_buffer(
    encoder: *mut JpeglsEncoderHandle,
    destination: *mut c_uchar,
    len: usize,
) -> c_int {
    guarded(|| {
        let state = unsafe { encoder_state(encoder) }?;
        if destination.is_null() || len == 0 {
            return Err(JpeglsError::InvalidArgumentDestination);
        }
        if state.state != WriterState::Initial {
            return Err(JpeglsError::InvalidOperation);
        }
        state.destination = destination;
        state.destination_len = len;
        Ok(())
    })
}

/// # Safety
/// `encoder` must be valid. `info` must point to a readable `JpeglsFrameInfo`.
#[unsafe(no_mangle)]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub unsafe extern "C" fn jpegls_encoder_set_frame_info(
    encoder: *mut JpeglsEncoderHandle,
    info: *const JpeglsFrameInfo,
) -> c_int {
    guarded(|| {
        let state = unsafe { encoder_state(encoder) }?;
        let info = unsafe { info.as_ref() }.ok_or(JpeglsError::InvalidArgument)?;
        state.configure()?;
        state.frame_info = Some((*info).into());
        Ok(())
    })
}

/// # Safety
/// `encoder` must be a valid handle.
#[unsafe(no_mangle)]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub unsafe extern "C" fn jpegls_encoder_set_near_lossless(
    encoder: *mut JpeglsEncoderHandle,
    near_lossless: i32,
) -> c_int {
    guarded(|| {
        let state = unsafe { encoder_state(encoder) }?;
        state.configure()?;
        state.near_lossless = near_lossless;
        Ok(())
    })
}

/// `interleave_mode` is 0 (none), 1 (line) or 2 (sample).
///
/// # Safety
/// `encoder` must be a valid handle.
#[unsafe(no_mangle)]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub unsafe extern "C" fn jpegls_encoder_set_interleave_mode(
    encoder: *mut JpeglsEncoderHandle,
    interleave_mode: i32,
) -> c_int {
    guarded(|| {
        let state = unsafe { encoder_state(encoder) }?;
        let interleave_mode = u8::try_from(interleave_mode)
            .ok()
            .and_then(|value| InterleaveMode::try_from(value).ok())
            .ok_or(JpeglsError::InvalidArgumentInterleaveMode)?;
        state.configure()?;
        state.interleave_mode = interleave_mode;
        Ok(())
    })
}

/// Writes SOI and the SPIFF header to the destination.
///
/// # Safety
/// `encoder` must be valid. `header` must point to a readable `JpeglsSpiffHeader`.
#[unsafe(no_mangle)]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub unsafe extern "C" fn jpegls_encoder_write_spiff_header(
    encoder: *mut JpeglsEncoderHandle,
    header: *const JpeglsSpiffHeader,
) -> c_int {
    guarded(|| {
        let state = unsafe { encoder_state(encoder) }?;
        let header = unsafe { header.as_ref() }.ok_or(JpeglsError::InvalidArgument)?;
        let spiff_header = SpiffHeader::try_from(*header)?;
        let next_state = next_writer_state(state.state, WriterEvent::SpiffHeader)?;

        state.spiff_header = Some(spiff_header);
        match state.replay() {
            Ok(bytes_written) => {
                state.bytes_written = bytes_written;
                state.state = next_state;
                Ok(())
            }
            Err(error) => {
                state.spiff_header = None;
                Err(error)
            }
        }
    })
}

/// Writes a SPIFF directory entry. Requires `jpegls_encoder_write_spiff_header`.
///
/// # Safety
/// `encoder` must be valid. `data` must point to `len` readable bytes (or be null when `len` is 0).
#[unsafe(no_mangle)]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub unsafe extern "C" fn jpegls_encoder_write_spiff_entry(
    encoder: *mut JpeglsEncoderHandle,
    tag: u32,
    data: *const c_uchar,
    len: usize,
) -> c_int {
    guarded(|| {
        let state = unsafe { encoder_state(encoder) }?;
        let data = match (data.is_null(), len) {
            (_, 0) => &[][..],
            (true, _) => return Err(JpeglsError::InvalidArgument),
            (false, _) => unsafe { std::slice::from_raw_parts(data, len) },
        };
        check_spiff_entry(tag, data.len())?;
        let next_state = next_writer_state(state.state, WriterEvent::SpiffEntry)?;

        state.spiff_entries.push((tag, data.to_vec()));
        match state.replay() {
            Ok(bytes_written) => {
                state.bytes_written = bytes_written;
                state.state = next_state;
                Ok(())
            }
            Err(error) => {
                state.spiff_entries.pop();
                Err(error)
            }
        }
    })
}

/// Encodes `len` bytes of pixel-interleaved samples.
///
/// # Safety
/// `encoder` must be valid. `source` must point to `len` readable bytes.
#[unsafe(no_mangle)]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub unsafe extern "C" fn jpegls_encoder_encode_from_buffer(
    encoder: *mut JpeglsEncoderHandle,
    source: *const c_uchar,
    len: usize,
) -> c_int {
    guarded(|| {
        let state = unsafe { encoder_state(encoder) }?;
        if source.is_null() || len == 0 {
            return Err(JpeglsError::InvalidArgumentSource);
        }
        let next_state = next_writer_state(state.state, WriterEvent::Encode)?;

        let source = unsafe { std::slice::from_raw_parts(source, len) };
        let (pointer, destination_len) = (state.destination, state.destination_len);
        if pointer.is_null() {
            return Err(JpeglsError::InvalidOperation);
        }
        // SAFETY: the caller keeps the destination alive; it does not alias `state`.
        let destination = unsafe { std::slice::from_raw_parts_mut(pointer, destination_len) };
        let mut jpegls_encoder = JpeglsEncoder::new(destination);
        state.prepare(&mut jpegls_encoder)?;
        let bytes_written = jpegls_encoder.encode(source)?;

        state.bytes_written = bytes_written;
        state.state = next_state;
        Ok(())
    })
}

/// Stores the number of bytes written to the destination so far in `bytes_written`.
///
/// # Safety
/// `encoder` must be valid. `bytes_written` must be writable.
#[unsafe(no_mangle)]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub unsafe extern "C" fn jpegls_encoder_get_bytes_written(
    encoder: *mut JpeglsEncoderHandle,
    bytes_written: *mut usize,
) -> c_int {
    guarded(|| {
        let state = unsafe { encoder_state(encoder) }?;
        if bytes_written.is_null() {
            return Err(JpeglsError::InvalidArgument);
        }
        unsafe { *bytes_written = state.bytes_written };
        Ok(())
    })
}
