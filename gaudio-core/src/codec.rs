// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The codec plug-in contract and the registry that dispatches a [`CodecId`] to a factory.

use std::collections::HashMap;

use once_cell::sync::OnceCell;

use crate::errors::{unsupported_error, Result};
use crate::sample::SampleFormat;
use crate::sbuf::SampleBuf;
use crate::stream::StreamState;

static CODEC_LIBRARIES_INIT: OnceCell<()> = OnceCell::new();

/// One-shot, idempotent, process-wide initialisation hook for optional third-party codec
/// libraries (§5). Safe to call from multiple threads and multiple times; only the first call
/// does any work. `gaudio_core` itself needs no such initialisation today — this exists so
/// codec crates with a genuine global setup step (a DLL-backed decoder, a lookup table built
/// once) have a single, well-known place to hook into, reached from [`crate::probe::open`].
pub fn init_codec_libraries() {
    CODEC_LIBRARIES_INIT.get_or_init(|| {
        log::debug!("codec registry: one-shot library initialisation complete");
    });
}

/// A codec tag. Plug-ins register themselves under one or more ids; `0` is reserved/invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodecId(pub u32);

impl CodecId {
    pub const NULL: CodecId = CodecId(0);
}

/// Well-known codec tags, analogous to the teacher's `CODEC_TYPE_*` constants
/// (`symphonia-core::codecs`): a shared namespace so a format probe can name a codec it wants
/// resolved without depending on the crate that implements it.
pub const CODEC_ID_PCM_S8: CodecId = CodecId(0x0000_0001);
pub const CODEC_ID_PCM_U8: CodecId = CodecId(0x0000_0002);
pub const CODEC_ID_PCM_S16LE: CodecId = CodecId(0x0000_0003);
pub const CODEC_ID_PCM_S24LE: CodecId = CodecId(0x0000_0004);
pub const CODEC_ID_PCM_S32LE: CodecId = CodecId(0x0000_0005);
pub const CODEC_ID_PCM_F32LE: CodecId = CodecId(0x0000_0006);

pub const CODEC_ID_DSP_ADPCM: CodecId = CodecId(0x0001_0001);
pub const CODEC_ID_PSX_ADPCM: CodecId = CodecId(0x0001_0002);
pub const CODEC_ID_PSX_ADPCM_BAD_FLAGS: CodecId = CodecId(0x0001_0003);
pub const CODEC_ID_IMA_ADPCM: CodecId = CodecId(0x0001_0004);

/// The small, closed allow-list of codec families whose loop-history must be snapshotted
/// explicitly by the loop engine (§4.3), because for these families channel history is not
/// fully implied by the byte cursor alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecFamily {
    /// Nintendo GameCube/Wii DSP-ADPCM.
    Dsp,
    /// Sony PSX/PS2 VAG-style ADPCM.
    Psx,
    /// PSX-family variant with known-bad flag bytes that otherwise break loop restarts.
    PsxBadFlags,
    /// Any codec outside the history-preserving allow-list.
    Other,
}

impl CodecFamily {
    /// Whether this family needs its ADPCM history explicitly snapshotted/restored across a
    /// loop event, per §4.3's allow-list.
    pub fn preserves_loop_history(self) -> bool {
        matches!(self, CodecFamily::Dsp | CodecFamily::Psx | CodecFamily::PsxBadFlags)
    }
}

/// Distinguishes the two shapes a codec's decode entry point may take (§4.2: "at most one of
/// decode_frame/decode_buf is provided").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
    /// Sample-by-sample codec: decodes one frame's samples per call into the caller's decode
    /// state sbuf, using and updating per-channel state.
    Frame,
    /// Block/packet codec with an internal buffer: decodes a whole packet into a
    /// caller-supplied sbuf in one shot.
    Buf,
}

/// The per-codec plug-in contract. A codec implements exactly one of [`Codec::decode_frame`]
/// (when [`Codec::kind`] is [`CodecKind::Frame`]) or [`Codec::decode_buf`] (when `Buf`); calling
/// the wrong one is a logic error in the engine, not something a codec needs to guard against.
pub trait Codec: Send {
    /// Which decode entry point this codec implements.
    fn kind(&self) -> CodecKind;

    /// The intrinsic sample format this codec produces, optionally depending on stream state
    /// (some codecs emit FLT for high-precision sources and S16 otherwise).
    fn sample_format(&self, stream: &StreamState) -> SampleFormat;

    /// The codec family, used by the loop engine's history-preserving allow-list.
    fn family(&self) -> CodecFamily {
        CodecFamily::Other
    }

    /// Fixed number of samples per frame, or `None` if variable ("ask the codec", §9).
    fn frame_samples(&self) -> Option<u32> {
        Some(1)
    }

    /// Whether this codec moves its own channel offsets during decode, rather than relying on
    /// the interleave layout to advance them (§4.4, §9 open question 2). Default: layout moves
    /// offsets.
    fn moves_own_offsets(&self) -> bool {
        false
    }

    /// Decodes exactly one frame's worth of samples into `stream`'s decode-state sbuf. Only
    /// called when `kind()` is [`CodecKind::Frame`].
    fn decode_frame(&mut self, _stream: &mut StreamState, _dst: &mut SampleBuf) -> Result<()> {
        unsupported_error("codec: decode_frame not implemented")
    }

    /// Decodes one packet directly into `dst`. Only called when `kind()` is [`CodecKind::Buf`].
    fn decode_buf(&mut self, _stream: &mut StreamState, _dst: &mut SampleBuf) -> Result<()> {
        unsupported_error("codec: decode_buf not implemented")
    }

    /// Resets any codec-private state (not the channel descriptors, which the engine owns).
    fn reset(&mut self);

    /// Whether this codec accepts an arbitrary sample seek via [`Codec::seek`]. If `false`, the
    /// engine degrades to reset + decode-and-discard.
    fn seekable(&self) -> bool {
        false
    }

    /// Seeks the codec's internal state to `sample`. Only called if `seekable()` is `true`.
    fn seek(&mut self, _stream: &mut StreamState, _sample: u64) -> Result<()> {
        unsupported_error("codec: seek not implemented")
    }
}

type Factory = fn() -> Box<dyn Codec>;

/// A registry mapping [`CodecId`] to a codec factory, keyed by tag (§2.2, §4.2). Grounded on the
/// teacher's `CodecRegistry`, collapsed from three dispatch tiers to one since nothing here
/// calls for preferred/standard/fallback precedence — only first-match-by-id lookup.
#[derive(Default)]
pub struct CodecRegistry {
    factories: HashMap<CodecId, Factory>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        CodecRegistry { factories: HashMap::new() }
    }

    /// Registers a factory for `id`. Re-registering an id overwrites the previous factory.
    pub fn register(&mut self, id: CodecId, factory: Factory) {
        self.factories.insert(id, factory);
    }

    /// Instantiates the codec registered for `id`, or fails with `UnsupportedCodec`.
    pub fn make(&self, id: CodecId) -> Result<Box<dyn Codec>> {
        match self.factories.get(&id) {
            Some(factory) => Ok(factory()),
            None => {
                log::debug!("codec registry: no factory for {:?}", id);
                unsupported_error("codec: unknown codec tag")
            }
        }
    }

    pub fn is_registered(&self, id: CodecId) -> bool {
        self.factories.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserve_history_allow_list() {
        assert!(CodecFamily::Dsp.preserves_loop_history());
        assert!(CodecFamily::Psx.preserves_loop_history());
        assert!(CodecFamily::PsxBadFlags.preserves_loop_history());
        assert!(!CodecFamily::Other.preserves_loop_history());
    }

    #[test]
    fn registry_unknown_id_is_unsupported() {
        let reg = CodecRegistry::new();
        let err = reg.make(CodecId(0xdead)).unwrap_err();
        assert!(matches!(err, crate::errors::GaError::Unsupported(_)));
    }
}
