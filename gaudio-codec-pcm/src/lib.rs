// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// The following lints are allowed in all gaudio crates. Please see clippy.toml for their
// justification.
#![allow(clippy::comparison_chain)]
#![allow(clippy::excessive_precision)]
#![allow(clippy::identity_op)]
#![allow(clippy::manual_range_contains)]

//! The PCM codec family: the simplest possible codec, decoding directly interleaved,
//! uncompressed sample data with no per-frame header. One [`PcmCodec`] instance per source
//! encoding; all widths are exposed to the engine bit-exactly except 8-bit sources, which widen
//! into [`SampleFormat::S16`] since the engine has no narrower native lane.
//!
//! A [`PcmCodec`] assumes a single, fully interleaved cursor shared by every channel (the
//! conventional WAV/AIFF layout) and is meant to be driven through
//! [`gaudio_core::layout::FlatLayout`], which never touches channel offsets itself. It does not
//! implement [`Codec::moves_own_offsets`] support for the interleave/planar layouts.

use gaudio_core::errors::{decode_error, GaError};
use gaudio_core::{
    Codec, CodecKind, CodecRegistry, Result, SampleBuf, SampleFormat, StreamState,
    CODEC_ID_PCM_F32LE, CODEC_ID_PCM_S16LE, CODEC_ID_PCM_S24LE, CODEC_ID_PCM_S32LE,
    CODEC_ID_PCM_S8, CODEC_ID_PCM_U8,
};

/// Registers a factory for every [`PcmEncoding`] under its well-known [`gaudio_core::CodecId`],
/// so format probes (e.g. `gaudio-format-wav`) can resolve a codec through a [`CodecRegistry`]
/// without depending on this crate directly.
pub fn register_default_codecs(registry: &mut CodecRegistry) {
    registry.register(CODEC_ID_PCM_S8, || Box::new(PcmCodec::new(PcmEncoding::SignedLe8)));
    registry.register(CODEC_ID_PCM_U8, || Box::new(PcmCodec::new(PcmEncoding::UnsignedLe8)));
    registry.register(CODEC_ID_PCM_S16LE, || Box::new(PcmCodec::new(PcmEncoding::SignedLe16)));
    registry.register(CODEC_ID_PCM_S24LE, || Box::new(PcmCodec::new(PcmEncoding::SignedLe24)));
    registry.register(CODEC_ID_PCM_S32LE, || Box::new(PcmCodec::new(PcmEncoding::SignedLe32)));
    registry.register(CODEC_ID_PCM_F32LE, || Box::new(PcmCodec::new(PcmEncoding::FloatLe32)));
}

/// The on-disk sample encoding a [`PcmCodec`] reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcmEncoding {
    /// Signed 8-bit PCM. Unusual in practice (most 8-bit PCM is unsigned) but included for
    /// completeness.
    SignedLe8,
    /// Unsigned 8-bit PCM, the conventional 8-bit WAV encoding (silence = 0x80).
    UnsignedLe8,
    /// Signed, little-endian 16-bit PCM.
    SignedLe16,
    /// Signed, little-endian 24-bit PCM, packed as 3 bytes per sample.
    SignedLe24,
    /// Signed, little-endian 32-bit PCM.
    SignedLe32,
    /// IEEE 32-bit float, little-endian, ±1.0 nominal.
    FloatLe32,
}

impl PcmEncoding {
    /// Bytes occupied by one sample of this encoding in the source.
    fn bytes_per_sample(self) -> usize {
        match self {
            PcmEncoding::SignedLe8 | PcmEncoding::UnsignedLe8 => 1,
            PcmEncoding::SignedLe16 => 2,
            PcmEncoding::SignedLe24 => 3,
            PcmEncoding::SignedLe32 | PcmEncoding::FloatLe32 => 4,
        }
    }

    /// The [`SampleFormat`] this encoding should be exposed as, preserving bit depth except for
    /// the 8-bit cases, which have no native lane and widen into `S16`.
    fn output_format(self) -> SampleFormat {
        match self {
            PcmEncoding::SignedLe8 | PcmEncoding::UnsignedLe8 | PcmEncoding::SignedLe16 => SampleFormat::S16,
            PcmEncoding::SignedLe24 => SampleFormat::S24,
            PcmEncoding::SignedLe32 => SampleFormat::S32,
            PcmEncoding::FloatLe32 => SampleFormat::Flt,
        }
    }

    /// Reads one sample from `bytes` (exactly `bytes_per_sample()` long) and scales it to the
    /// engine's nominal ±32767 range.
    fn read_scaled(self, bytes: &[u8]) -> f64 {
        match self {
            PcmEncoding::SignedLe8 => (bytes[0] as i8) as f64 * 257.0,
            PcmEncoding::UnsignedLe8 => (bytes[0] as i32 - 128) as f64 * 257.0,
            PcmEncoding::SignedLe16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            PcmEncoding::SignedLe24 => {
                let v = (bytes[0] as u32) | ((bytes[1] as u32) << 8) | ((bytes[2] as u32) << 16);
                gaudio_core::sample::sign_extend_s24(v) as f64
            }
            PcmEncoding::SignedLe32 => i32::from_le_bytes(bytes.try_into().unwrap()) as f64,
            PcmEncoding::FloatLe32 => f32::from_le_bytes(bytes.try_into().unwrap()) as f64 * 32767.0,
        }
    }
}

/// A codec for directly interleaved, uncompressed PCM/float sample data.
#[derive(Debug, Clone, Copy)]
pub struct PcmCodec {
    encoding: PcmEncoding,
}

impl PcmCodec {
    pub fn new(encoding: PcmEncoding) -> Self {
        PcmCodec { encoding }
    }
}

impl Codec for PcmCodec {
    fn kind(&self) -> CodecKind {
        CodecKind::Buf
    }

    fn sample_format(&self, _stream: &StreamState) -> SampleFormat {
        self.encoding.output_format()
    }

    fn decode_buf(&mut self, stream: &mut StreamState, dst: &mut SampleBuf) -> Result<()> {
        let channels = stream.channels.len();
        let bytes_per_sample = self.encoding.bytes_per_sample();
        let bytes_per_frame = bytes_per_sample * channels;
        if channels == 0 || bytes_per_frame == 0 {
            dst.set_filled(0);
            return Ok(());
        }

        let remaining = stream.num_samples.saturating_sub(stream.current_sample) as usize;
        let want_frames = dst.capacity().min(remaining);
        if want_frames == 0 {
            dst.set_filled(0);
            return Ok(());
        }

        let offset = stream.channels[0].offset;
        let mut raw = vec![0u8; want_frames * bytes_per_frame];
        let n = stream.source.read(&mut raw, offset).map_err(GaError::from)?;
        let got_frames = n / bytes_per_frame;
        if got_frames == 0 {
            dst.set_filled(0);
            return decode_error("pcm: short read, no complete frame available");
        }

        for frame in 0..got_frames {
            let frame_off = frame * bytes_per_frame;
            for ch in 0..channels {
                let sample_off = frame_off + ch * bytes_per_sample;
                let value = self.encoding.read_scaled(&raw[sample_off..sample_off + bytes_per_sample]);
                dst.set_sample_scaled(frame, ch, value);
            }
        }
        dst.set_filled(got_frames);

        let consumed = (got_frames * bytes_per_frame) as u64;
        for ch in stream.channels.iter_mut() {
            ch.offset += consumed;
        }

        Ok(())
    }

    fn reset(&mut self) {
        // Stateless: nothing but the encoding tag, which never changes after construction.
    }

    fn seekable(&self) -> bool {
        true
    }

    fn seek(&mut self, stream: &mut StreamState, sample: u64) -> Result<()> {
        let channels = stream.channels.len();
        let bytes_per_frame = (self.encoding.bytes_per_sample() * channels) as u64;
        let base = stream.channels.first().map(|c| c.start_offset).unwrap_or(0);
        let target = base + sample * bytes_per_frame;
        for ch in stream.channels.iter_mut() {
            ch.offset = target;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gaudio_core::io::MemorySource;

    fn interleaved_s16(frames: &[[i16; 2]]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(frames.len() * 4);
        for frame in frames {
            bytes.extend_from_slice(&frame[0].to_le_bytes());
            bytes.extend_from_slice(&frame[1].to_le_bytes());
        }
        bytes
    }

    #[test]
    fn decodes_interleaved_signed_16() {
        let data = interleaved_s16(&[[100, -100], [200, -200], [300, -300]]);
        let mut state = StreamState::new(Box::new(MemorySource::new(data)), 2);
        state.num_samples = 3;

        let mut codec = PcmCodec::new(PcmEncoding::SignedLe16);
        let mut dst = SampleBuf::new(codec.sample_format(&state), 2, 8);
        codec.decode_buf(&mut state, &mut dst).unwrap();

        assert_eq!(dst.filled(), 3);
        assert_eq!(dst.sample_scaled(0, 0), 100.0);
        assert_eq!(dst.sample_scaled(0, 1), -100.0);
        assert_eq!(dst.sample_scaled(2, 0), 300.0);
        assert_eq!(state.channels[0].offset, 12);
        assert_eq!(state.channels[1].offset, 12);
    }

    #[test]
    fn unsigned_8bit_widens_around_midpoint() {
        let data = vec![0x80, 0xff, 0x00];
        let mut state = StreamState::new(Box::new(MemorySource::new(data)), 1);
        state.num_samples = 3;

        let mut codec = PcmCodec::new(PcmEncoding::UnsignedLe8);
        let mut dst = SampleBuf::new(codec.sample_format(&state), 1, 8);
        codec.decode_buf(&mut state, &mut dst).unwrap();

        assert_eq!(dst.filled(), 3);
        assert_eq!(dst.sample_scaled(0, 0), 0.0);
        assert_eq!(dst.sample_scaled(1, 0), 127.0 * 257.0);
        assert_eq!(dst.sample_scaled(2, 0), -128.0 * 257.0);
    }

    #[test]
    fn decode_stops_at_num_samples_even_with_more_room() {
        let data = interleaved_s16(&[[1, 1], [2, 2], [3, 3], [4, 4]]);
        let mut state = StreamState::new(Box::new(MemorySource::new(data)), 2);
        state.num_samples = 2;

        let mut codec = PcmCodec::new(PcmEncoding::SignedLe16);
        let mut dst = SampleBuf::new(codec.sample_format(&state), 2, 16);
        codec.decode_buf(&mut state, &mut dst).unwrap();

        assert_eq!(dst.filled(), 2);
    }

    #[test]
    fn seek_repositions_all_channel_cursors() {
        let data = interleaved_s16(&[[1, 1], [2, 2], [3, 3], [4, 4]]);
        let mut state = StreamState::new(Box::new(MemorySource::new(data)), 2);
        state.num_samples = 4;

        let mut codec = PcmCodec::new(PcmEncoding::SignedLe16);
        codec.seek(&mut state, 2).unwrap();

        assert_eq!(state.channels[0].offset, 8);
        assert_eq!(state.channels[1].offset, 8);
    }

    #[test]
    fn default_codecs_register_under_reserved_ids() {
        let mut registry = CodecRegistry::new();
        register_default_codecs(&mut registry);
        assert!(registry.is_registered(CODEC_ID_PCM_S16LE));
        assert!(registry.is_registered(CODEC_ID_PCM_F32LE));
        assert!(!registry.is_registered(gaudio_core::CodecId(0xffff_ffff)));
    }
}
