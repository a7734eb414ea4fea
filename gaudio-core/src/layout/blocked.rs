// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The blocked layout: each block starts with a family-specific header that a `block_update`
//! routine parses to position the next decode. ~45 real block families exist in the domain this
//! engine targets; this module implements a representative handful plus a generic fallback.

use std::collections::HashMap;

use crate::codec::{Codec, CodecKind};
use crate::decode_state::{clamp_to_loop_boundary, do_loop, DecodeState};
use crate::errors::{decode_error, Result};
use crate::sbuf::SampleBuf;
use crate::stream::StreamState;

/// Identifies a blocked-family header parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockFamilyId(pub u32);

/// Sentinel `next_block_offset` value meaning "no further blocks" / corrupted offset table.
pub const BLOCK_OFFSET_INVALID: u64 = 0xFFFF_FFFF;

/// What a `block_update` call produces: the new block's geometry and, if the family stores
/// per-channel byte offsets in its header, the updated channel cursors.
#[derive(Debug, Clone)]
pub struct BlockInfo {
    pub block_size: u64,
    /// `None` means "infer from the codec's frame size".
    pub block_samples: Option<u64>,
    pub next_block_offset: u64,
    pub channel_offsets: Option<Vec<u64>>,
}

/// A family-specific block header parser.
pub trait BlockFamily: Send {
    fn block_update(&mut self, offset: u64, state: &mut StreamState) -> Result<BlockInfo>;
}

/// Fixed-size blocks with no header beyond channel interleave bookkeeping; every block is the
/// same size and carries a fixed sample count.
pub struct FixedSizeFamily {
    pub block_size: u64,
    pub block_samples: u64,
}

impl BlockFamily for FixedSizeFamily {
    fn block_update(&mut self, offset: u64, _state: &mut StreamState) -> Result<BlockInfo> {
        Ok(BlockInfo {
            block_size: self.block_size,
            block_samples: Some(self.block_samples),
            next_block_offset: offset + self.block_size,
            channel_offsets: None,
        })
    }
}

/// A header that stores an explicit per-channel byte offset table, read as little-endian u32s
/// immediately following a fixed-size block-size field.
pub struct OffsetTableFamily {
    pub header_size: u64,
}

impl BlockFamily for OffsetTableFamily {
    fn block_update(&mut self, offset: u64, state: &mut StreamState) -> Result<BlockInfo> {
        let channels = state.channels.len();
        let mut header = vec![0u8; 8 + channels * 4];
        let n = state.source.read(&mut header, offset).map_err(crate::errors::GaError::from)?;
        if n < header.len() {
            return decode_error("blocked/offset-table: truncated block header");
        }

        let block_size = u32::from_le_bytes(header[0..4].try_into().unwrap()) as u64;
        let block_samples = u32::from_le_bytes(header[4..8].try_into().unwrap()) as u64;

        let mut channel_offsets = Vec::with_capacity(channels);
        for ch in 0..channels {
            let off = 8 + ch * 4;
            let rel = u32::from_le_bytes(header[off..off + 4].try_into().unwrap()) as u64;
            channel_offsets.push(offset + self.header_size + rel);
        }

        Ok(BlockInfo {
            block_size,
            block_samples: Some(block_samples),
            next_block_offset: offset + block_size,
            channel_offsets: Some(channel_offsets),
        })
    }
}

/// A header whose sample count is implicit from the codec's frame size (samples-per-frame-zero
/// handling does not apply here: the codec always reports a fixed frame size for this family).
pub struct ImplicitSamplesFamily {
    pub header_size: u64,
}

impl BlockFamily for ImplicitSamplesFamily {
    fn block_update(&mut self, offset: u64, state: &mut StreamState) -> Result<BlockInfo> {
        let mut header = [0u8; 4];
        let n = state.source.read(&mut header, offset).map_err(crate::errors::GaError::from)?;
        if n < header.len() {
            return decode_error("blocked/implicit-samples: truncated block header");
        }
        let block_size = u32::from_le_bytes(header) as u64;
        Ok(BlockInfo {
            block_size,
            block_samples: None,
            next_block_offset: offset + self.header_size + block_size,
            channel_offsets: None,
        })
    }
}

/// A sentinel-terminated chain: each header ends with an explicit "next offset" field, rather
/// than being computed from the block size. A value of [`BLOCK_OFFSET_INVALID`] terminates the
/// chain.
pub struct SentinelChainFamily {
    pub block_samples: u64,
}

impl BlockFamily for SentinelChainFamily {
    fn block_update(&mut self, offset: u64, state: &mut StreamState) -> Result<BlockInfo> {
        let mut header = [0u8; 8];
        let n = state.source.read(&mut header, offset).map_err(crate::errors::GaError::from)?;
        if n < header.len() {
            return decode_error("blocked/sentinel-chain: truncated block header");
        }
        let block_size = u32::from_le_bytes(header[0..4].try_into().unwrap()) as u64;
        let next_offset = u32::from_le_bytes(header[4..8].try_into().unwrap()) as u64;
        Ok(BlockInfo {
            block_size,
            block_samples: Some(self.block_samples),
            next_block_offset: next_offset,
            channel_offsets: None,
        })
    }
}

/// A generic fallback family used when the specific header shape is not one of the above.
pub struct GenericFamily;

impl BlockFamily for GenericFamily {
    fn block_update(&mut self, offset: u64, _state: &mut StreamState) -> Result<BlockInfo> {
        decode_error("blocked/generic: no parser registered for this family")
    }
}

/// A registry of block-family parsers keyed by [`BlockFamilyId`].
#[derive(Default)]
pub struct BlockFamilyRegistry {
    families: HashMap<BlockFamilyId, Box<dyn BlockFamily>>,
}

impl BlockFamilyRegistry {
    pub fn new() -> Self {
        BlockFamilyRegistry { families: HashMap::new() }
    }

    pub fn register(&mut self, id: BlockFamilyId, family: Box<dyn BlockFamily>) {
        self.families.insert(id, family);
    }
}

pub struct BlockedLayout {
    family_id: BlockFamilyId,
    family: Box<dyn BlockFamily>,
    first_block_offset: u64,
    current_block_offset: u64,
    current_block_size: u64,
    current_block_samples: u64,
    next_block_offset: u64,
    samples_into_block: u64,
    loop_block_offset: u64,
    loop_samples_into_block: u64,
    soft_fault: bool,
}

impl BlockedLayout {
    pub fn new(family_id: BlockFamilyId, family: Box<dyn BlockFamily>, first_block_offset: u64) -> Self {
        BlockedLayout {
            family_id,
            family,
            first_block_offset,
            current_block_offset: first_block_offset,
            current_block_size: 0,
            current_block_samples: 0,
            next_block_offset: first_block_offset,
            samples_into_block: 0,
            loop_block_offset: first_block_offset,
            loop_samples_into_block: 0,
            soft_fault: false,
        }
    }

    pub fn family_id(&self) -> BlockFamilyId {
        self.family_id
    }

    pub fn soft_fault(&self) -> bool {
        self.soft_fault
    }

    fn update_block(&mut self, state: &mut StreamState, codec: &dyn Codec) -> Result<bool> {
        let info = match self.family.block_update(self.next_block_offset, state) {
            Ok(info) => info,
            Err(err) => {
                log::warn!("blocked layout: header parse failed: {}", err);
                self.soft_fault = true;
                return Ok(false);
            }
        };

        if info.next_block_offset == BLOCK_OFFSET_INVALID || (info.block_size as i64) < 0 {
            log::warn!("blocked layout: corrupt block offset/size, silencing remainder");
            self.soft_fault = true;
            return Ok(false);
        }

        self.current_block_offset = self.next_block_offset;
        self.current_block_size = info.block_size;
        self.current_block_samples = info.block_samples.unwrap_or_else(|| {
            codec.frame_samples().map(|f| f as u64).unwrap_or(0)
        });
        self.next_block_offset = info.next_block_offset;
        self.samples_into_block = 0;

        if let Some(offsets) = info.channel_offsets {
            for (ch, off) in state.channels.iter_mut().zip(offsets) {
                ch.offset = off;
                ch.start_offset = off;
            }
        }

        Ok(true)
    }

    pub fn render(
        &mut self,
        state: &mut StreamState,
        codec: &mut dyn Codec,
        decode: &mut DecodeState,
        dst: &mut SampleBuf,
    ) -> Result<usize> {
        let mut produced = 0;

        while dst.filled() < dst.capacity() && !self.soft_fault {
            let room = dst.capacity() - dst.filled();

            if self.samples_into_block >= self.current_block_samples {
                if !self.update_block(state, &*codec)? {
                    break;
                }
                if self.current_block_samples == 0 {
                    // Variable/implicit sample count: let the codec fill as much as it can.
                    self.current_block_samples = u64::MAX;
                }
            }

            let block_room = self.current_block_samples.saturating_sub(self.samples_into_block) as usize;
            let want = clamp_to_loop_boundary(state, room.min(block_room).min(decode.sbuf.capacity()));
            if want == 0 {
                break;
            }

            let decoded = match codec.kind() {
                CodecKind::Frame => codec.decode_frame(state, &mut decode.sbuf),
                CodecKind::Buf => codec.decode_buf(state, &mut decode.sbuf),
            };

            if let Err(err) = decoded {
                log::warn!("blocked layout: decode failed, silencing remainder: {}", err);
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
            self.samples_into_block += n as u64;

            let was_hit_loop = state.hit_loop;
            let looped = do_loop(state, Some(codec))?;
            if !was_hit_loop && state.hit_loop {
                // The loop-start snapshot just happened inside `do_loop`; mirror it here so a
                // later loop-end restores block position, not just channel descriptors.
                self.snapshot_loop_position();
            }
            if looped {
                self.current_block_offset = self.loop_block_offset;
                self.next_block_offset = self.loop_block_offset;
                self.samples_into_block = self.loop_samples_into_block;
                self.current_block_samples = 0;
            }
        }

        Ok(produced)
    }

    /// Called by the loop engine's loop-start snapshot step so a later loop-end restores block
    /// position as well as channel descriptors.
    pub fn snapshot_loop_position(&mut self) {
        self.loop_block_offset = self.current_block_offset;
        self.loop_samples_into_block = self.samples_into_block;
    }

    /// Rewinds block position back to the very first block, paired with
    /// [`crate::stream::StreamState::reset_decode_position`] on a full stream reset — distinct
    /// from [`Self::snapshot_loop_position`], which captures the *current* position as the loop
    /// target rather than rewinding to the start.
    pub fn reset_to_start(&mut self) {
        self.current_block_offset = self.first_block_offset;
        self.current_block_size = 0;
        self.current_block_samples = 0;
        self.next_block_offset = self.first_block_offset;
        self.samples_into_block = 0;
        self.loop_block_offset = self.first_block_offset;
        self.loop_samples_into_block = 0;
        self.soft_fault = false;
    }
}
