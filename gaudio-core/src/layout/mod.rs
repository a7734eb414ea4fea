// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The layout engine: flat / interleaved / blocked / segmented / layered walkers that feed codec
//! calls and move channel offsets. `Layout` is a closed enum over the five kinds rather than a
//! trait object, since the set of layout kinds is fixed and small (see DESIGN.md).

pub mod blocked;
pub mod flat;
pub mod interleave;
pub mod layered;
pub mod segmented;

pub use blocked::{BlockFamily, BlockFamilyId, BlockFamilyRegistry, BlockedLayout};
pub use flat::FlatLayout;
pub use interleave::{BlockSize, InterleaveLayout};
pub use layered::LayeredLayout;
pub use segmented::SegmentedLayout;

/// The opaque layout state owned exclusively by a stream.
pub enum Layout {
    Flat(FlatLayout),
    Interleave(InterleaveLayout),
    Blocked(BlockedLayout),
    Segmented(SegmentedLayout),
    Layered(LayeredLayout),
}

impl Layout {
    /// Maximum practical nesting depth for segmented/layered composition.
    pub const MAX_DEPTH: u32 = 8;

    /// The number of output channels this layout produces, where that is decided by composition
    /// rather than by the codec (segmented/layered); `None` for the leaf layouts, whose channel
    /// count is the owning stream's own channel count.
    pub fn composed_channels(&self) -> Option<u16> {
        match self {
            Layout::Segmented(l) => Some(l.output_channels()),
            Layout::Layered(l) => Some(l.output_channels()),
            _ => None,
        }
    }
}
