// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod channel;
pub mod codec;
pub mod decode_state;
pub mod errors;
pub mod io;
pub mod layout;
pub mod mixer;
pub mod probe;
pub mod render;
pub mod sample;
pub mod sbuf;
pub mod seek;
pub mod stream;
pub mod units;

pub use codec::{
    init_codec_libraries, Codec, CodecFamily, CodecId, CodecKind, CodecRegistry,
    CODEC_ID_DSP_ADPCM, CODEC_ID_IMA_ADPCM, CODEC_ID_PCM_F32LE, CODEC_ID_PCM_S16LE,
    CODEC_ID_PCM_S24LE, CODEC_ID_PCM_S32LE, CODEC_ID_PCM_S8, CODEC_ID_PCM_U8,
    CODEC_ID_PSX_ADPCM, CODEC_ID_PSX_ADPCM_BAD_FLAGS,
};
pub use errors::{ErrorCode, GaError, Result};
pub use io::{FileSource, MemorySource, StreamSource};
pub use mixer::{FadeShape, MixOp, MixTarget, Mixer};
pub use probe::{open, FormatProbe};
pub use sample::SampleFormat;
pub use sbuf::SampleBuf;
pub use stream::{PlayConfig, PlayState, Stream, StreamInfo, StreamInit, StreamState};
pub use units::TimeSpan;
