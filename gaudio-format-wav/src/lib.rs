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

//! A single, minimal [`FormatProbe`] implementation: canonical PCM WAV (`RIFF`/`WAVE`, a `fmt `
//! chunk followed eventually by a `data` chunk). Every other real-world WAV extension
//! (`WAVEFORMATEXTENSIBLE` sub-formats beyond aliasing the tag, `fact`, `cue`, compressed codecs)
//! is out of scope — this crate exists so the public API and `gaudio-play` have one real,
//! end-to-end-openable format, not to parse every container in existence.

use gaudio_core::channel::ChannelLayoutMask;
use gaudio_core::errors::{decode_error, unsupported_error, GaError};
use gaudio_core::layout::{FlatLayout, Layout};
use gaudio_core::{CodecId, CodecRegistry, FormatProbe, Result, StreamInit, StreamSource, StreamState};
use gaudio_core::{CODEC_ID_PCM_F32LE, CODEC_ID_PCM_S16LE, CODEC_ID_PCM_S24LE, CODEC_ID_PCM_S32LE, CODEC_ID_PCM_U8};

const RIFF_MARKER: [u8; 4] = *b"RIFF";
const WAVE_FORM: [u8; 4] = *b"WAVE";
const FMT_CHUNK: [u8; 4] = *b"fmt ";
const DATA_CHUNK: [u8; 4] = *b"data";

const WAVE_FORMAT_PCM: u16 = 1;
const WAVE_FORMAT_IEEE_FLOAT: u16 = 3;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xfffe;

struct FmtChunk {
    format_tag: u16,
    channels: u16,
    sample_rate: u32,
    byte_rate: u32,
    block_align: u16,
    bits_per_sample: u16,
}

fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes(bytes.try_into().unwrap())
}

fn read_u16_le(bytes: &[u8]) -> u16 {
    u16::from_le_bytes(bytes.try_into().unwrap())
}

/// A mask with the low `n` bits set, the conventional default channel layout when a `fmt ` chunk
/// carries no explicit mask (plain `WAVEFORMAT`/`WAVEFORMATEX`, not `WAVEFORMATEXTENSIBLE`).
fn default_channel_mask(channels: u16) -> ChannelLayoutMask {
    match channels {
        1 => ChannelLayoutMask::mono(),
        2 => ChannelLayoutMask::stereo(),
        _ => ChannelLayoutMask::from_bits_truncate((1u32 << channels.min(18)) - 1),
    }
}

fn encoding_codec_id(format_tag: u16, bits_per_sample: u16) -> Result<CodecId> {
    match (format_tag, bits_per_sample) {
        (WAVE_FORMAT_PCM, 8) => Ok(CODEC_ID_PCM_U8),
        (WAVE_FORMAT_PCM, 16) => Ok(CODEC_ID_PCM_S16LE),
        (WAVE_FORMAT_PCM, 24) => Ok(CODEC_ID_PCM_S24LE),
        (WAVE_FORMAT_PCM, 32) => Ok(CODEC_ID_PCM_S32LE),
        (WAVE_FORMAT_IEEE_FLOAT, 32) => Ok(CODEC_ID_PCM_F32LE),
        _ => unsupported_error("wav: unsupported format tag/bit depth combination"),
    }
}

/// A minimal canonical PCM WAV format probe.
pub struct WavProbe;

impl WavProbe {
    pub fn new() -> Self {
        WavProbe
    }

    fn read_header(&self, source: &mut dyn StreamSource) -> Result<()> {
        let mut header = [0u8; 12];
        let n = source.read(&mut header, 0).map_err(GaError::from)?;
        if n < 12 || header[0..4] != RIFF_MARKER {
            return unsupported_error("wav: missing RIFF stream marker");
        }
        if header[8..12] != WAVE_FORM {
            return unsupported_error("wav: RIFF form is not WAVE");
        }
        Ok(())
    }

    fn read_fmt_chunk(&self, source: &mut dyn StreamSource, offset: u64, size: u32) -> Result<FmtChunk> {
        if size < 16 {
            return decode_error("wav: fmt chunk shorter than WAVEFORMAT");
        }
        let mut buf = vec![0u8; size as usize];
        let n = source.read(&mut buf, offset).map_err(GaError::from)?;
        if (n as u32) < size {
            return decode_error("wav: truncated fmt chunk");
        }

        let mut format_tag = read_u16_le(&buf[0..2]);
        let channels = read_u16_le(&buf[2..4]);
        let sample_rate = read_u32_le(&buf[4..8]);
        let byte_rate = read_u32_le(&buf[8..12]);
        let block_align = read_u16_le(&buf[12..14]);
        let bits_per_sample = read_u16_le(&buf[14..16]);

        if format_tag == WAVE_FORMAT_EXTENSIBLE {
            if (size as usize) < 40 {
                return decode_error("wav: WAVEFORMATEXTENSIBLE chunk too short");
            }
            // The real sub-format GUID lives at bytes 24..40; this probe only reads its first two
            // bytes, which alias the ordinary format tag for the PCM/float sub-formats it supports.
            format_tag = read_u16_le(&buf[24..26]);
        }

        if channels == 0 {
            return decode_error("wav: zero channels");
        }

        Ok(FmtChunk { format_tag, channels, sample_rate, byte_rate, block_align, bits_per_sample })
    }

    fn walk_chunks(&self, source: &mut dyn StreamSource) -> Result<(FmtChunk, u64, u64)> {
        let size = source.size();
        let mut offset = 12u64;
        let mut fmt: Option<FmtChunk> = None;

        while offset + 8 <= size {
            let mut header = [0u8; 8];
            let n = source.read(&mut header, offset).map_err(GaError::from)?;
            if n < 8 {
                break;
            }
            let id = [header[0], header[1], header[2], header[3]];
            let chunk_size = read_u32_le(&header[4..8]);
            let body_offset = offset + 8;

            if id == FMT_CHUNK {
                fmt = Some(self.read_fmt_chunk(source, body_offset, chunk_size)?);
            }
            else if id == DATA_CHUNK {
                let fmt = match fmt {
                    Some(fmt) => fmt,
                    None => return decode_error("wav: data chunk before fmt chunk"),
                };
                let data_size = (chunk_size as u64).min(size.saturating_sub(body_offset));
                return Ok((fmt, body_offset, data_size));
            }

            // Chunks are padded to an even byte boundary.
            offset = body_offset + chunk_size as u64 + (chunk_size & 1) as u64;
        }

        decode_error("wav: missing data chunk")
    }
}

impl Default for WavProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatProbe for WavProbe {
    fn name(&self) -> &'static str {
        "wav"
    }

    fn probe(&self, mut source: Box<dyn StreamSource>, registry: &CodecRegistry, subsong_index: u32) -> Result<StreamInit> {
        if subsong_index != 0 {
            return unsupported_error("wav: container has no secondary subsongs");
        }

        self.read_header(&mut *source)?;
        let (fmt, data_offset, data_size) = self.walk_chunks(&mut *source)?;

        let codec_id = encoding_codec_id(fmt.format_tag, fmt.bits_per_sample)?;
        let codec = registry.make(codec_id)?;

        let block_align = fmt.block_align.max(1) as u64;
        let num_samples = data_size / block_align;

        let mut state = StreamState::new(source, fmt.channels);
        state.sample_rate = fmt.sample_rate;
        state.channel_mask = default_channel_mask(fmt.channels);
        state.num_samples = num_samples;
        for ch in state.channels.iter_mut() {
            ch.offset = data_offset;
            ch.start_offset = data_offset;
        }

        Ok(StreamInit {
            state,
            codec,
            layout: Layout::Flat(FlatLayout),
            output_channels: fmt.channels,
            codec_name: "pcm",
            layout_name: "flat",
            meta_name: "wav",
            stream_name: String::new(),
            format_id: u32::from_be_bytes(WAVE_FORM),
            bitrate: fmt.byte_rate.saturating_mul(8),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gaudio_core::io::MemorySource;

    fn make_wav(channels: u16, sample_rate: u32, bits_per_sample: u16, samples: &[i16]) -> Vec<u8> {
        let block_align = channels * (bits_per_sample / 8);
        let byte_rate = sample_rate * block_align as u32;
        let data: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();

        let mut buf = Vec::new();
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&(36 + data.len() as u32).to_le_bytes());
        buf.extend_from_slice(b"WAVE");

        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&WAVE_FORMAT_PCM.to_le_bytes());
        buf.extend_from_slice(&channels.to_le_bytes());
        buf.extend_from_slice(&sample_rate.to_le_bytes());
        buf.extend_from_slice(&byte_rate.to_le_bytes());
        buf.extend_from_slice(&block_align.to_le_bytes());
        buf.extend_from_slice(&bits_per_sample.to_le_bytes());

        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
        buf.extend_from_slice(&data);
        buf
    }

    fn registry_with_pcm() -> CodecRegistry {
        let mut registry = CodecRegistry::new();
        gaudio_core::codec::init_codec_libraries();
        registry.register(CODEC_ID_PCM_S16LE, || {
            Box::new(gaudio_codec_pcm_stub())
        });
        registry
    }

    // Avoids a `gaudio-codec-pcm` dev-dependency: any stub codec proves the probe resolves
    // through the registry rather than constructing a codec itself.
    fn gaudio_codec_pcm_stub() -> StubCodec {
        StubCodec
    }

    struct StubCodec;
    impl gaudio_core::Codec for StubCodec {
        fn kind(&self) -> gaudio_core::CodecKind {
            gaudio_core::CodecKind::Buf
        }
        fn sample_format(&self, _stream: &StreamState) -> gaudio_core::SampleFormat {
            gaudio_core::SampleFormat::S16
        }
        fn reset(&mut self) {}
    }

    #[test]
    fn recognises_canonical_pcm_wav() {
        let data = make_wav(2, 44100, 16, &[1, -1, 2, -2, 3, -3]);
        let source = Box::new(MemorySource::new(data));
        let registry = registry_with_pcm();

        let init = WavProbe::new().probe(source, &registry, 0).unwrap();
        assert_eq!(init.output_channels, 2);
        assert_eq!(init.state.sample_rate, 44100);
        assert_eq!(init.state.num_samples, 3);
        assert_eq!(init.meta_name, "wav");
    }

    #[test]
    fn rejects_non_riff_source() {
        let source = Box::new(MemorySource::new(vec![0u8; 16]));
        let registry = registry_with_pcm();
        let err = WavProbe::new().probe(source, &registry, 0).unwrap_err();
        assert!(matches!(err, GaError::Unsupported(_)));
    }

    #[test]
    fn rejects_subsong_other_than_zero() {
        let data = make_wav(1, 8000, 16, &[0]);
        let source = Box::new(MemorySource::new(data));
        let registry = registry_with_pcm();
        let err = WavProbe::new().probe(source, &registry, 1).unwrap_err();
        assert!(matches!(err, GaError::Unsupported(_)));
    }
}
