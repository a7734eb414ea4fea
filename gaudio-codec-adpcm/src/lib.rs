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

//! ADPCM sample codecs: the loop-history-preserving family (Nintendo DSP, Sony PSX/VAG) plus
//! standard IMA ADPCM, the reference implementor of the `moves_own_offsets` codec flag.

mod common;
pub mod dsp;
pub mod ima;
pub mod psx;

pub use dsp::{DspAdpcmCodec, DEFAULT_COEFS};
pub use ima::{ImaAdpcmCodec, ImaChannelTag};
pub use psx::PsxAdpcmCodec;

use gaudio_core::{
    CodecRegistry, CODEC_ID_DSP_ADPCM, CODEC_ID_IMA_ADPCM, CODEC_ID_PSX_ADPCM,
    CODEC_ID_PSX_ADPCM_BAD_FLAGS,
};

/// Registers every codec this crate provides under its well-known id. Plug-ins that need
/// non-default construction (e.g. a DSP coefficient table read from the container, or a chosen
/// `frames_per_block`) should register their own factory instead of relying on this default set.
pub fn register_default_codecs(registry: &mut CodecRegistry) {
    registry.register(CODEC_ID_DSP_ADPCM, || Box::new(DspAdpcmCodec::new(vec![DEFAULT_COEFS])));
    registry.register(CODEC_ID_PSX_ADPCM, || Box::new(PsxAdpcmCodec::new()));
    registry.register(CODEC_ID_PSX_ADPCM_BAD_FLAGS, || Box::new(PsxAdpcmCodec::bad_flags()));
    registry.register(CODEC_ID_IMA_ADPCM, || {
        Box::new(ImaAdpcmCodec::new(ImaChannelTag::Mono, 505))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_codecs_register_under_reserved_ids() {
        let mut registry = CodecRegistry::new();
        register_default_codecs(&mut registry);
        assert!(registry.is_registered(CODEC_ID_DSP_ADPCM));
        assert!(registry.is_registered(CODEC_ID_PSX_ADPCM));
        assert!(registry.is_registered(CODEC_ID_PSX_ADPCM_BAD_FLAGS));
        assert!(registry.is_registered(CODEC_ID_IMA_ADPCM));
    }
}
