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

//! # gaudio
//!
//! A streaming decode engine for game-audio formats: open a stream, query its properties, and
//! pull decoded PCM/float samples until end-of-stream, with loop-aware rendering (pad, trim,
//! fade, loop-count) built into the pipeline rather than bolted on by the caller.
//!
//! This crate is a thin facade over [`gaudio_core`]: it re-exports the core engine and wires a
//! default [`gaudio_core::CodecRegistry`] and format-probe list from whichever codec/format
//! crates are enabled by feature flag.
//!
//! ## Codecs
//!
//! | Codec family | Feature flag | Default |
//! |---|---|---|
//! | PCM (8/16/24/32-bit, float) | `pcm` | Yes |
//! | ADPCM (DSP, PSX, IMA) | `adpcm` | No |
//!
//! ## Formats
//!
//! | Format | Feature flag | Default |
//! |---|---|---|
//! | Canonical PCM WAV | `wav` | Yes |
//!
//! ## Usage
//!
//! 1. Get a [`default::get_codecs`] registry and a [`default::get_probes`] list, or assemble
//!    your own with [`default::register_enabled_codecs`]/[`default::register_enabled_formats`].
//! 2. Obtain a [`gaudio_core::StreamSource`] (e.g. [`gaudio_core::io::FileSource`]).
//! 3. Call [`gaudio_core::probe::open`] with the source, probe list, and registry to get a
//!    [`gaudio_core::Stream`].
//! 4. Call [`gaudio_core::Stream::render`] repeatedly to pull decoded samples until it returns
//!    `0` with [`gaudio_core::Stream::is_done`] set.
//!
//! A runnable example of this sequence can be found in `gaudio-play`.

pub use gaudio_core as core;

pub mod default {
    //! Convenience functions and registries to get a consumer up and running without manually
    //! wiring every enabled codec/format crate. Entirely optional; using the engine directly
    //! through [`gaudio_core`] incurs no overhead from this module unless it is actually used.

    use once_cell::sync::Lazy;

    use gaudio_core::{CodecRegistry, FormatProbe};

    static CODEC_REGISTRY: Lazy<CodecRegistry> = Lazy::new(|| {
        let mut registry = CodecRegistry::new();
        register_enabled_codecs(&mut registry);
        registry
    });

    #[cfg(feature = "wav")]
    static WAV_PROBE: Lazy<gaudio_format_wav::WavProbe> = Lazy::new(gaudio_format_wav::WavProbe::new);

    /// Gets the default [`CodecRegistry`], pre-populated with every codec enabled by this
    /// crate's feature flags. Lazily built on first call.
    pub fn get_codecs() -> &'static CodecRegistry {
        &CODEC_REGISTRY
    }

    /// Gets the list of format probes enabled by this crate's feature flags, in the order
    /// [`gaudio_core::probe::open`] should try them.
    pub fn get_probes() -> Vec<&'static dyn FormatProbe> {
        let mut probes: Vec<&'static dyn FormatProbe> = Vec::new();
        register_enabled_formats(&mut probes);
        probes
    }

    /// Registers every codec enabled by feature flag onto `registry`. Use this to populate a
    /// custom registry instead of the shared default one.
    pub fn register_enabled_codecs(registry: &mut CodecRegistry) {
        #[cfg(feature = "pcm")]
        gaudio_codec_pcm::register_default_codecs(registry);

        #[cfg(feature = "adpcm")]
        gaudio_codec_adpcm::register_default_codecs(registry);
    }

    /// Appends every format probe enabled by feature flag onto `probes`. Use this to populate a
    /// custom probe chain instead of [`get_probes`].
    pub fn register_enabled_formats(probes: &mut Vec<&'static dyn FormatProbe>) {
        #[cfg(feature = "wav")]
        probes.push(&*WAV_PROBE as &dyn FormatProbe);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_pcm_codecs_registered() {
        let registry = default::get_codecs();
        assert!(registry.is_registered(gaudio_core::CODEC_ID_PCM_S16LE));
    }

    #[test]
    fn default_probes_include_wav() {
        let probes = default::get_probes();
        assert!(probes.iter().any(|p| p.name() == "wav"));
    }
}
