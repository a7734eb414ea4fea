// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Channel layout masks and per-channel decode cursors.

use bitflags::bitflags;

bitflags! {
    /// Speaker positions, matching the Microsoft WAVEFORMATEXTENSIBLE bit positions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ChannelLayoutMask: u32 {
        const FRONT_LEFT            = 1 << 0;
        const FRONT_RIGHT           = 1 << 1;
        const FRONT_CENTER          = 1 << 2;
        const LOW_FREQUENCY         = 1 << 3;
        const BACK_LEFT             = 1 << 4;
        const BACK_RIGHT            = 1 << 5;
        const FRONT_LEFT_OF_CENTER  = 1 << 6;
        const FRONT_RIGHT_OF_CENTER = 1 << 7;
        const BACK_CENTER           = 1 << 8;
        const SIDE_LEFT             = 1 << 9;
        const SIDE_RIGHT            = 1 << 10;
        const TOP_CENTER            = 1 << 11;
        const TOP_FRONT_LEFT        = 1 << 12;
        const TOP_FRONT_CENTER      = 1 << 13;
        const TOP_FRONT_RIGHT       = 1 << 14;
        const TOP_BACK_LEFT         = 1 << 15;
        const TOP_BACK_CENTER       = 1 << 16;
        const TOP_BACK_RIGHT        = 1 << 17;
    }
}

impl ChannelLayoutMask {
    /// A conventional stereo layout (front-left, front-right).
    pub fn stereo() -> Self {
        ChannelLayoutMask::FRONT_LEFT | ChannelLayoutMask::FRONT_RIGHT
    }

    /// A conventional mono layout (front-center).
    pub fn mono() -> Self {
        ChannelLayoutMask::FRONT_CENTER
    }
}

/// Per-channel cursor into the container, plus any running ADPCM history a codec needs carried
/// across decode calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelDescriptor {
    /// Current byte offset into the source for this channel.
    pub offset: u64,
    /// Byte offset where this channel's data began (used to rewind on reset).
    pub start_offset: u64,
    /// Up to two 16-bit ADPCM history samples (e.g. DSP/PSX predictor history).
    pub hist_i16: [i16; 2],
    /// Up to two 32-bit ADPCM history samples (e.g. IMA step-index state).
    pub hist_i32: [i32; 2],
}

impl ChannelDescriptor {
    /// Creates a descriptor positioned at `start_offset` with no history.
    pub fn new(start_offset: u64) -> Self {
        ChannelDescriptor { offset: start_offset, start_offset, hist_i16: [0; 2], hist_i32: [0; 2] }
    }

    /// Rewinds this channel's cursor to its start offset and clears history, as on `reset()`.
    pub fn rewind(&mut self) {
        self.offset = self.start_offset;
        self.hist_i16 = [0; 2];
        self.hist_i32 = [0; 2];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_positions_match_waveformatextensible() {
        assert_eq!(ChannelLayoutMask::FRONT_LEFT.bits(), 1);
        assert_eq!(ChannelLayoutMask::FRONT_RIGHT.bits(), 2);
        assert_eq!(ChannelLayoutMask::SIDE_RIGHT.bits(), 1 << 10);
    }

    #[test]
    fn rewind_clears_history() {
        let mut ch = ChannelDescriptor::new(44);
        ch.offset = 200;
        ch.hist_i16 = [1, 2];
        ch.hist_i32 = [3, 4];
        ch.rewind();
        assert_eq!(ch.offset, 44);
        assert_eq!(ch.hist_i16, [0, 0]);
        assert_eq!(ch.hist_i32, [0, 0]);
    }
}
