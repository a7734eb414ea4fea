// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Sony PSX/PS2 VAG-style ADPCM: a 5-entry fixed-coefficient predictor, the other member of the
//! loop-history-preserving family alongside [`crate::dsp::DspAdpcmCodec`]. Some real titles ship
//! blocks whose loop-related flag bits are meaningless/inconsistent; [`PsxAdpcmCodec::bad_flags`]
//! models that quirk by ignoring the flag byte entirely rather than trusting it.

use gaudio_core::channel::ChannelDescriptor;
use gaudio_core::errors::{decode_error, GaError};
use gaudio_core::{Codec, CodecFamily, CodecKind, Result, SampleBuf, SampleFormat, StreamState};

use crate::common::Nibble;

const SAMPLES_PER_BLOCK: usize = 28;
const BLOCK_BYTES: u64 = 16;

/// Coefficients scaled by 64 (`coef / 64.0` is the real predictor weight), matching the standard
/// 5-entry PSX ADPCM table.
const COEFS: [(i32, i32); 5] = [(0, 0), (60, 0), (115, -52), (98, -55), (122, -60)];

fn clamp_i16(v: i64) -> i32 {
    v.clamp(i16::MIN as i64, i16::MAX as i64) as i32
}

/// PSX/PS2 VAG-style ADPCM decoder.
pub struct PsxAdpcmCodec {
    bad_flags: bool,
}

impl PsxAdpcmCodec {
    /// A standard PSX ADPCM decoder whose per-block flag byte (loop-start/loop-end markers) is
    /// trusted.
    pub fn new() -> Self {
        PsxAdpcmCodec { bad_flags: false }
    }

    /// A decoder for the `PsxBadFlags` family variant, whose flag byte is known-unreliable and is
    /// ignored rather than acted on.
    pub fn bad_flags() -> Self {
        PsxAdpcmCodec { bad_flags: true }
    }

    fn decode_channel_block(
        &self,
        ch: &mut ChannelDescriptor,
        source: &mut dyn gaudio_core::StreamSource,
        dst: &mut SampleBuf,
        dst_ch: usize,
        limit: usize,
    ) -> Result<usize> {
        let mut block = [0u8; BLOCK_BYTES as usize];
        let n = source.read(&mut block, ch.offset).map_err(GaError::from)?;
        if n == 0 {
            return Ok(0);
        }

        let predictor_idx = ((block[0] >> 4) as usize).min(4);
        let shift = (block[0] & 0x0f).min(12);
        let flags = block[1];
        if !self.bad_flags && flags == 0x07 {
            // A real "end + no loop" marker would zero the remainder; container-level loop
            // points aren't wired into this codec, so just note it happened.
            log::trace!("psx-adpcm: block flagged end-of-stream");
        }

        let (coef1, coef2) = COEFS[predictor_idx];
        let mut hist1 = ch.hist_i32[0];
        let mut hist2 = ch.hist_i32[1];

        let available_nibbles = (n.saturating_sub(2)) * 2;
        let want = limit.min(SAMPLES_PER_BLOCK).min(available_nibbles);

        for i in 0..want {
            let byte = block[2 + i / 2];
            let half = if i % 2 == 0 { Nibble::Lower } else { Nibble::Upper };
            let raw = (half.signed(byte) << 12) >> shift;
            let predicted = (coef1 as i64 * hist1 as i64 + coef2 as i64 * hist2 as i64) >> 6;
            let sample = clamp_i16(raw as i64 + predicted);
            hist2 = hist1;
            hist1 = sample;
            dst.set_sample_scaled(i, dst_ch, sample as f64);
        }

        ch.hist_i32[0] = hist1;
        ch.hist_i32[1] = hist2;
        ch.offset += BLOCK_BYTES;

        Ok(want)
    }
}

impl Default for PsxAdpcmCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for PsxAdpcmCodec {
    fn kind(&self) -> CodecKind {
        CodecKind::Frame
    }

    fn sample_format(&self, _stream: &StreamState) -> SampleFormat {
        SampleFormat::S16
    }

    fn family(&self) -> CodecFamily {
        if self.bad_flags {
            CodecFamily::PsxBadFlags
        } else {
            CodecFamily::Psx
        }
    }

    fn frame_samples(&self) -> Option<u32> {
        Some(SAMPLES_PER_BLOCK as u32)
    }

    fn decode_frame(&mut self, stream: &mut StreamState, dst: &mut SampleBuf) -> Result<()> {
        let room = dst.capacity().min(SAMPLES_PER_BLOCK);
        let channels = stream.channels.len();
        if channels == 0 {
            dst.set_filled(0);
            return decode_error("psx-adpcm: stream has no channels");
        }

        let mut produced = usize::MAX;
        let source = &mut *stream.source;
        for ch_idx in 0..channels {
            let got =
                self.decode_channel_block(&mut stream.channels[ch_idx], source, dst, ch_idx, room)?;
            produced = produced.min(got);
        }

        dst.set_filled(if produced == usize::MAX { 0 } else { produced });
        Ok(())
    }

    fn reset(&mut self) {
        // Predictor history lives on the channel descriptors; nothing codec-private to clear.
    }
}
