// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The interleave layout: a strided container where each channel's block of bytes runs before
//! the next channel's block begins.

use crate::codec::{Codec, CodecKind};
use crate::decode_state::{clamp_to_loop_boundary, do_loop, DecodeState};
use crate::errors::Result;
use crate::sbuf::SampleBuf;
use crate::stream::StreamState;

/// The byte/sample size of one interleave tier (first, regular, or last block).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSize {
    pub bytes: u64,
    pub samples: u64,
}

#[derive(Debug, Clone)]
pub struct InterleaveLayout {
    regular_block: BlockSize,
    first_block: BlockSize,
    last_block: BlockSize,
}

impl InterleaveLayout {
    pub fn new(regular_block: BlockSize, first_block: Option<BlockSize>, last_block: Option<BlockSize>) -> Self {
        InterleaveLayout {
            regular_block,
            first_block: first_block.unwrap_or(regular_block),
            last_block: last_block.unwrap_or(regular_block),
        }
    }

    fn is_last_region(&self, state: &StreamState) -> bool {
        state.num_samples.saturating_sub(state.current_sample) <= self.last_block.samples
    }

    fn current_tier(&self, state: &StreamState) -> BlockSize {
        if state.current_sample == 0 {
            self.first_block
        } else if self.is_last_region(state) {
            self.last_block
        } else {
            self.regular_block
        }
    }

    pub fn render(
        &mut self,
        state: &mut StreamState,
        codec: &mut dyn Codec,
        decode: &mut DecodeState,
        dst: &mut SampleBuf,
    ) -> Result<usize> {
        let mut produced = 0;

        while dst.filled() < dst.capacity() {
            let room = dst.capacity() - dst.filled();
            let tier = self.current_tier(state);

            let want = clamp_to_loop_boundary(
                state,
                room.min(tier.samples as usize).min(decode.sbuf.capacity()),
            );
            if want == 0 {
                break;
            }

            let decoded = match codec.kind() {
                CodecKind::Frame => codec.decode_frame(state, &mut decode.sbuf),
                CodecKind::Buf => codec.decode_buf(state, &mut decode.sbuf),
            };

            if let Err(err) = decoded {
                log::warn!("interleave layout: decode failed, silencing remainder: {}", err);
                decode.sbuf.silence_rest();
            }

            if decode.sbuf.filled() == 0 {
                break;
            }

            let n = SampleBuf::get_copy_max(dst, &decode.sbuf).min(room);
            if n == 0 {
                break;
            }
            SampleBuf::copy_segments(dst, &mut decode.sbuf, n);
            produced += n;
            state.current_sample += n as u64;

            // When a whole tier block has been consumed, each channel's cursor must skip over
            // the other channels' blocks to reach its own next block. A codec that moves its own
            // offsets has already advanced one channel's worth itself, so the engine's skip is
            // reduced by one channel to avoid double-advancing.
            if n as u64 == tier.samples {
                let channels = state.channels.len() as u64;
                let skip_channels =
                    if codec.moves_own_offsets() { channels.saturating_sub(2) } else { channels.saturating_sub(1) };
                let skip_bytes = skip_channels * tier.bytes;
                for ch in state.channels.iter_mut() {
                    ch.offset += skip_bytes;
                }
            }

            do_loop(state, Some(codec))?;
        }

        Ok(produced)
    }
}
