//! Interleaved PCM sample conversion.

use byteorder::{ByteOrder, LittleEndian};

/// Bytes per sample for 16-bit PCM.
pub const BYTES_PER_SAMPLE_I16: usize = 2;

/// Copy little-endian i16 PCM bytes into an f32 buffer, scaling to
/// [-1.0, 1.0]. Copies `min(src.len() / 2, dst.len())` samples and returns
/// that count. Does not allocate, so it is safe in realtime callbacks.
pub fn copy_i16le_to_f32(src: &[u8], dst: &mut [f32]) -> usize {
    let n = (src.len() / BYTES_PER_SAMPLE_I16).min(dst.len());
    for i in 0..n {
        let s = LittleEndian::read_i16(&src[i * BYTES_PER_SAMPLE_I16..]);
        dst[i] = f32::from(s) / 32768.0;
    }
    n
}

/// Convert little-endian i16 PCM bytes to f32 samples in [-1.0, 1.0].
///
/// A trailing odd byte (not a whole sample) is ignored.
pub fn i16le_to_f32(bytes: &[u8]) -> Vec<f32> {
    let mut out = vec![0.0; bytes.len() / BYTES_PER_SAMPLE_I16];
    copy_i16le_to_f32(bytes, &mut out);
    out
}

/// Convert f32 samples to little-endian i16 PCM bytes, clamping to range.
pub fn f32_to_i16le(samples: &[f32]) -> Vec<u8> {
    let mut out = vec![0u8; samples.len() * BYTES_PER_SAMPLE_I16];
    for (i, &s) in samples.iter().enumerate() {
        let clamped = (s * 32768.0).clamp(-32768.0, 32767.0) as i16;
        LittleEndian::write_i16(&mut out[i * BYTES_PER_SAMPLE_I16..], clamped);
    }
    out
}
