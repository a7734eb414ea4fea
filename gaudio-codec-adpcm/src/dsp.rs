// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Nintendo GameCube/Wii DSP-ADPCM: a fixed-coefficient predictor codec, one of the loop-
//! history-preserving family since its running predictor state (`hist_i32[0]`/`hist_i32[1]`) is
//! not recoverable from the byte cursor alone — a loop restart must restore the exact predictor
//! history, not just reposition the read offset.

use gaudio_core::channel::ChannelDescriptor;
use gaudio_core::errors::{decode_error, GaError};
use gaudio_core::{Codec, CodecFamily, CodecKind, Result, SampleBuf, SampleFormat, StreamState};

use crate::common::Nibble;

/// Samples produced by one 8-byte block: a 1-byte header plus 7 bytes of 4-bit nibbles.
const SAMPLES_PER_BLOCK: usize = 14;
const BLOCK_BYTES: u64 = 8;

/// Per-channel predictor coefficient table: 8 `(coef1, coef2)` pairs selected by the high
/// nibble of each block's header byte.
pub type DspCoefTable = [(i32, i32); 8];

/// A conservative, illustrative coefficient table (not derived from any specific title) — real
/// DSP-ADPCM streams carry their own table in the container.
pub const DEFAULT_COEFS: DspCoefTable = [
    (2048, 0),
    (3072, -1024),
    (3584, -1536),
    (3840, -1792),
    (3968, -1920),
    (4032, -1984),
    (4064, -2016),
    (4080, -2032),
];

fn clamp_i16(v: i64) -> i32 {
    v.clamp(i16::MIN as i64, i16::MAX as i64) as i32
}

/// Nintendo DSP-ADPCM decoder. One instance decodes every channel of a stream, each channel
/// using its own block cursor, predictor history, and coefficient table (tables commonly differ
/// per channel in real containers).
pub struct DspAdpcmCodec {
    coefs: Vec<DspCoefTable>,
}

impl DspAdpcmCodec {
    /// Builds a decoder with one coefficient table per channel.
    pub fn new(coefs: Vec<DspCoefTable>) -> Self {
        DspAdpcmCodec { coefs }
    }

    fn coefs_for(&self, ch: usize) -> &DspCoefTable {
        self.coefs.get(ch).unwrap_or(&DEFAULT_COEFS)
    }

    /// Decodes one block of `ch`'s data into `dst`'s `dst_ch` column, starting at `dst_frame`.
    /// Returns the number of samples decoded (`<= SAMPLES_PER_BLOCK`, fewer only when `limit`
    /// is smaller).
    fn decode_channel_block(
        &self,
        ch: &mut ChannelDescriptor,
        source: &mut dyn gaudio_core::StreamSource,
        coefs: &DspCoefTable,
        dst: &mut SampleBuf,
        dst_ch: usize,
        dst_frame: usize,
        limit: usize,
    ) -> Result<usize> {
        let mut block = [0u8; BLOCK_BYTES as usize];
        let n = source.read(&mut block, ch.offset).map_err(GaError::from)?;
        if n == 0 {
            return Ok(0);
        }
        // A short final block decodes whatever nibbles are actually present, via
        // `available_nibbles` below.

        let header = block[0];
        let predictor_idx = ((header >> 4) as usize).min(7);
        let scale_shift = header & 0x0f;
        let (coef1, coef2) = coefs[predictor_idx];

        let mut hist1 = ch.hist_i32[0];
        let mut hist2 = ch.hist_i32[1];

        let available_nibbles = (n.saturating_sub(1)) * 2;
        let want = limit.min(SAMPLES_PER_BLOCK).min(available_nibbles);

        for i in 0..want {
            let byte = block[1 + i / 2];
            let half = if i % 2 == 0 { Nibble::Upper } else { Nibble::Lower };
            let delta = half.signed(byte) << scale_shift;
            let predicted = (coef1 as i64 * hist1 as i64 + coef2 as i64 * hist2 as i64) >> 11;
            let sample = clamp_i16(predicted + delta as i64);
            hist2 = hist1;
            hist1 = sample;
            dst.set_sample_scaled(dst_frame + i, dst_ch, sample as f64);
        }

        ch.hist_i32[0] = hist1;
        ch.hist_i32[1] = hist2;
        ch.offset += BLOCK_BYTES;

        Ok(want)
    }
}

impl Codec for DspAdpcmCodec {
    fn kind(&self) -> CodecKind {
        CodecKind::Frame
    }

    fn sample_format(&self, _stream: &StreamState) -> SampleFormat {
        SampleFormat::S16
    }

    fn family(&self) -> CodecFamily {
        CodecFamily::Dsp
    }

    fn frame_samples(&self) -> Option<u32> {
        Some(SAMPLES_PER_BLOCK as u32)
    }

    fn decode_frame(&mut self, stream: &mut StreamState, dst: &mut SampleBuf) -> Result<()> {
        let room = dst.capacity().min(SAMPLES_PER_BLOCK);
        let channels = stream.channels.len();
        if channels == 0 {
            dst.set_filled(0);
            return decode_error("dsp-adpcm: stream has no channels");
        }

        let mut produced = usize::MAX;
        let source = &mut *stream.source;
        for ch_idx in 0..channels {
            let coefs = *self.coefs_for(ch_idx);
            let got = self.decode_channel_block(
                &mut stream.channels[ch_idx],
                source,
                &coefs,
                dst,
                ch_idx,
                0,
                room,
            )?;
            produced = produced.min(got);
        }

        dst.set_filled(if produced == usize::MAX { 0 } else { produced });
        Ok(())
    }

    fn reset(&mut self) {
        // No codec-private state; predictor history lives on the channel descriptors, which the
        // engine rewinds/clears on `StreamState::reset_decode_position`.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gaudio_core::io::MemorySource;
    use gaudio_core::stream::StreamState;

    /// Builds one 8-byte DSP-ADPCM block: header selects predictor table 0 (coef=(2048,0), i.e.
    /// `sample = hist1 + (nibble << scale)`), scale 0, and deterministic small nibbles so the
    /// expected output is hand-computable.
    fn make_block(nibbles: [i8; 14]) -> [u8; 8] {
        let mut block = [0u8; 8];
        block[0] = 0x00; // predictor 0, scale 0
        for (i, &n) in nibbles.iter().enumerate() {
            let nibble = (n as u8) & 0x0f;
            if i % 2 == 0 {
                block[1 + i / 2] |= nibble << 4;
            }
            else {
                block[1 + i / 2] |= nibble;
            }
        }
        block
    }

    #[test]
    fn decodes_one_block_accumulating_predictor() {
        let nibbles = [1i8, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1];
        let data = make_block(nibbles).to_vec();
        let mut state = StreamState::new(Box::new(MemorySource::new(data)), 1);

        let codec = DspAdpcmCodec::new(vec![DEFAULT_COEFS]);
        let mut dst = SampleBuf::new(SampleFormat::S16, 1, 14);
        let mut codec = codec;
        codec.decode_frame(&mut state, &mut dst).unwrap();

        assert_eq!(dst.filled(), 14);
        // Coef table 0 is (2048, 0), scale 0: predicted = hist1, sample = hist1 + nibble.
        // Starting hist1=0, each +1 nibble accumulates: 1, 2, 3, ...
        assert_eq!(dst.sample_scaled(0, 0), 1.0);
        assert_eq!(dst.sample_scaled(13, 0), 14.0);
        assert_eq!(state.channels[0].offset, 8);
        assert_eq!(state.channels[0].hist_i32[0], 14);
    }

    #[test]
    fn history_persists_across_blocks() {
        let mut data = make_block([2i8; 14]).to_vec();
        data.extend_from_slice(&make_block([0i8; 14]));
        let mut state = StreamState::new(Box::new(MemorySource::new(data)), 1);

        let mut codec = DspAdpcmCodec::new(vec![DEFAULT_COEFS]);
        let mut dst = SampleBuf::new(SampleFormat::S16, 1, 14);
        codec.decode_frame(&mut state, &mut dst).unwrap();
        let end_of_first_block = dst.sample_scaled(13, 0);

        let mut dst2 = SampleBuf::new(SampleFormat::S16, 1, 14);
        codec.decode_frame(&mut state, &mut dst2).unwrap();
        // Second block's nibbles are all zero, so the predictor just repeats hist1 forever:
        // the first sample of block two equals the last sample of block one.
        assert_eq!(dst2.sample_scaled(0, 0), end_of_first_block);
    }

    /// End-to-end loop-boundary test (Testable Property #3): one block before the loop, one
    /// block that is the whole loop body, decoded through the real flat-layout/loop-engine path
    /// rather than calling the codec directly. The second loop iteration must continue the
    /// predictor from where the first iteration's decode of the loop body left off, not replay
    /// the history that was current when `loop_start` was first reached.
    #[test]
    fn loop_restart_continues_predictor_history_not_loop_start_snapshot() {
        use gaudio_core::decode_state::DecodeState;
        use gaudio_core::layout::FlatLayout;

        let mut data = make_block([1i8; 14]).to_vec(); // samples 0..14, before the loop
        data.extend_from_slice(&make_block([2i8; 14])); // samples 14..28, the whole loop body
        let mut state = StreamState::new(Box::new(MemorySource::new(data)), 1);
        state.num_samples = 28;
        state.loop_flag = true;
        state.loop_flag_original = true;
        state.loop_start_sample = 14;
        state.loop_end_sample = 28;
        state.loop_target = Some(2); // stop after the second pass through the loop body

        let mut codec = DspAdpcmCodec::new(vec![DEFAULT_COEFS]);
        let mut decode = DecodeState::new(SampleBuf::new(SampleFormat::S16, 1, 14));
        let mut layout = FlatLayout;

        // Block 0 (pre-loop): hist1 ends at 14 (0 + 1*14).
        let mut dst0 = SampleBuf::new(SampleFormat::S16, 1, 14);
        layout.render(&mut state, &mut codec, &mut decode, &mut dst0).unwrap();
        assert_eq!(state.current_sample, 14);
        assert!(state.hit_loop);

        // Block 1, iteration 1 (the loop body): starts from hist1=14, nibble 2 each step, so
        // hist1 ends at 14 + 2*14 = 42.
        let mut dst1 = SampleBuf::new(SampleFormat::S16, 1, 14);
        layout.render(&mut state, &mut codec, &mut decode, &mut dst1).unwrap();
        assert_eq!(dst1.sample_scaled(0, 0), 16.0); // 14 + 2
        assert_eq!(state.current_sample, 14); // loop_end crossing restored current_sample
        assert_eq!(state.loop_count, 1);

        // Block 1, iteration 2: must continue from hist1=42 (what iteration 1 actually produced),
        // not replay iteration 1's sample-0 value using the stale loop_start snapshot.
        let mut dst2 = SampleBuf::new(SampleFormat::S16, 1, 14);
        layout.render(&mut state, &mut codec, &mut decode, &mut dst2).unwrap();
        assert_eq!(dst2.sample_scaled(0, 0), 44.0); // 42 + 2, continuing the predictor
        assert_ne!(dst2.sample_scaled(0, 0), dst1.sample_scaled(0, 0));
    }
}
