// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The central `Stream` entity (§3) and the public API surface (§4.8).

use smallvec::SmallVec;

use crate::channel::{ChannelDescriptor, ChannelLayoutMask};
use crate::codec::Codec;
use crate::decode_state::DecodeState;
use crate::errors::Result;
use crate::io::StreamSource;
use crate::layout::Layout;
use crate::mixer::Mixer;
use crate::sample::SampleFormat;
use crate::sbuf::SampleBuf;
use crate::units::TimeSpan;

/// The number of decode attempts in a row that may produce zero samples before the stream is
/// considered deadlocked and marked done (§7).
pub const MAX_CONSECUTIVE_EMPTY_DECODES: u32 = 1000;

/// The mutable decode-side state of a stream: codec tag inputs, channel cursors, and loop
/// bookkeeping (§3). Does not own the codec/layout/mixer themselves (those live on [`Stream`])
/// so that layouts can borrow `StreamState` and a codec independently without aliasing `Stream`.
pub struct StreamState {
    pub source: Box<dyn StreamSource>,
    pub sample_rate: u32,
    pub channel_mask: ChannelLayoutMask,
    pub num_samples: u64,

    pub channels: SmallVec<[ChannelDescriptor; 8]>,
    pub loop_channels: SmallVec<[ChannelDescriptor; 8]>,

    pub loop_flag: bool,
    /// The loop flag as originally probed, restored verbatim on `reset()` even if a loop-target
    /// run cleared the live `loop_flag` (§9 open question 3).
    pub loop_flag_original: bool,
    pub hit_loop: bool,
    pub loop_start_sample: u64,
    pub loop_end_sample: u64,
    pub loop_count: u64,
    /// A specific iteration count after which the natural file end plays instead of looping
    /// forever (the "loop target").
    pub loop_target: Option<u64>,

    pub current_sample: u64,
    pub samples_into_block: u64,
    pub loop_samples_into_block: u64,
}

impl StreamState {
    pub fn new(source: Box<dyn StreamSource>, channels: u16) -> Self {
        let descriptors: SmallVec<[ChannelDescriptor; 8]> =
            (0..channels).map(|_| ChannelDescriptor::default()).collect();
        StreamState {
            source,
            sample_rate: 0,
            channel_mask: ChannelLayoutMask::empty(),
            num_samples: 0,
            loop_channels: descriptors.clone(),
            channels: descriptors,
            loop_flag: false,
            loop_flag_original: false,
            hit_loop: false,
            loop_start_sample: 0,
            loop_end_sample: 0,
            loop_count: 0,
            loop_target: None,
            current_sample: 0,
            samples_into_block: 0,
            loop_samples_into_block: 0,
        }
    }

    /// Rewinds all per-channel cursors and clears loop progress, restoring `loop_flag` from
    /// `loop_flag_original` (§9 open question 3).
    pub fn reset_decode_position(&mut self) {
        for ch in self.channels.iter_mut() {
            ch.rewind();
        }
        self.loop_channels = self.channels.clone();
        self.loop_flag = self.loop_flag_original;
        self.hit_loop = false;
        self.loop_count = 0;
        self.current_sample = 0;
        self.samples_into_block = 0;
        self.loop_samples_into_block = 0;
    }
}

/// User-settable playback contract (§3), merged with stream intrinsics into a [`PlayState`].
/// Builder-style `with_*` methods match the teacher's `AudioCodecParameters` shape.
#[derive(Debug, Clone)]
pub struct PlayConfig {
    pub play_forever: bool,
    pub ignore_loop: bool,
    pub force_loop: bool,
    pub really_force_loop: bool,
    pub ignore_fade: bool,
    /// May be fractional: e.g. `1.5` loops through half of the loop body before the outro/fade.
    pub loop_count: f64,
    pub fade_time: f64,
    pub fade_delay: f64,
    pub pad_begin: Option<TimeSpan>,
    pub trim_begin: Option<TimeSpan>,
    pub pad_end: Option<TimeSpan>,
    pub target_body_time: Option<f64>,
    /// If `false`, `configure` may be overridden by any intrinsic config the format probe stored
    /// on the stream; if `true`, the caller's config always wins.
    pub disable_config_override: bool,
}

impl Default for PlayConfig {
    fn default() -> Self {
        PlayConfig {
            play_forever: false,
            ignore_loop: false,
            force_loop: false,
            really_force_loop: false,
            ignore_fade: false,
            loop_count: 2.0,
            fade_time: 10.0,
            fade_delay: 0.0,
            pad_begin: None,
            trim_begin: None,
            pad_end: None,
            target_body_time: None,
            disable_config_override: false,
        }
    }
}

impl PlayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_play_forever(&mut self, v: bool) -> &mut Self {
        self.play_forever = v;
        self
    }

    pub fn with_ignore_loop(&mut self, v: bool) -> &mut Self {
        self.ignore_loop = v;
        self
    }

    pub fn with_force_loop(&mut self, v: bool) -> &mut Self {
        self.force_loop = v;
        self
    }

    pub fn with_ignore_fade(&mut self, v: bool) -> &mut Self {
        self.ignore_fade = v;
        self
    }

    pub fn with_loop_count(&mut self, v: f64) -> &mut Self {
        self.loop_count = v;
        self
    }

    pub fn with_fade_time(&mut self, seconds: f64) -> &mut Self {
        self.fade_time = seconds;
        self
    }

    pub fn with_pad_begin(&mut self, span: TimeSpan) -> &mut Self {
        self.pad_begin = Some(span);
        self
    }

    pub fn with_trim_begin(&mut self, span: TimeSpan) -> &mut Self {
        self.trim_begin = Some(span);
        self
    }

    pub fn with_pad_end(&mut self, span: TimeSpan) -> &mut Self {
        self.pad_end = Some(span);
        self
    }
}

/// Derived once from a resolved [`PlayConfig`] plus stream intrinsics (§3).
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayState {
    pub pad_begin_duration: u64,
    pub trim_begin_duration: u64,
    pub body_duration: u64,
    pub fade_duration: u64,
    pub pad_end_duration: u64,
    pub play_duration: u64,
    pub play_position: u64,
    pub pad_begin_left: u64,
    pub trim_begin_left: u64,
    pub fade_left: u64,
    pub play_forever: bool,
}

impl PlayState {
    /// Resolves `config` against the stream's intrinsic loop/length fields (§3, §4.6).
    ///
    /// Open-question resolution (DESIGN.md): `trim_begin_duration` is subtracted from the body
    /// rather than added to `play_duration` — trimmed samples are decoded-and-discarded before
    /// the body starts and never reach the caller, so counting them in the externally observable
    /// duration would contradict §4.6 step 2's "no mixing, discard" behaviour. `fade_duration` is
    /// treated as the tail of `body_duration` (the fade window sits inside the last
    /// `fade_duration` samples of the body), matching §4.6's `fade_start = body start +
    /// body_duration − fade_duration`.
    pub fn resolve(
        config: &PlayConfig,
        loop_flag: bool,
        loop_start_sample: u64,
        loop_end_sample: u64,
        num_samples: u64,
        sample_rate: u32,
    ) -> PlayState {
        let pad_begin_duration = config.pad_begin.map(|t| t.to_samples(sample_rate)).unwrap_or(0);
        let trim_begin_duration = config.trim_begin.map(|t| t.to_samples(sample_rate)).unwrap_or(0);
        let mut pad_end_duration = config.pad_end.map(|t| t.to_samples(sample_rate)).unwrap_or(0);
        let mut fade_duration =
            if config.ignore_fade { 0 } else { TimeSpan::Seconds(config.fade_time).to_samples(sample_rate) };

        let looped = loop_flag && !config.ignore_loop;
        let raw_body = if looped {
            let loop_body = loop_end_sample.saturating_sub(loop_start_sample);
            let looped_samples = (config.loop_count * loop_body as f64).round().max(0.0) as u64;
            loop_start_sample + looped_samples + num_samples.saturating_sub(loop_end_sample)
        }
        else {
            num_samples
        };

        let body_duration = raw_body.saturating_sub(trim_begin_duration);

        if config.play_forever {
            fade_duration = 0;
            pad_end_duration = 0;
        }
        fade_duration = fade_duration.min(body_duration);

        let play_duration = pad_begin_duration + body_duration + fade_duration + pad_end_duration;

        PlayState {
            pad_begin_duration,
            trim_begin_duration,
            body_duration,
            fade_duration,
            pad_end_duration,
            play_duration,
            play_position: 0,
            pad_begin_left: pad_begin_duration,
            trim_begin_left: trim_begin_duration,
            fade_left: fade_duration,
            play_forever: config.play_forever,
        }
    }

    /// Sample offset (relative to `play_position`'s origin) where the fade window begins.
    pub fn fade_start(&self) -> u64 {
        self.pad_begin_duration + self.body_duration - self.fade_duration
    }

    /// Sample offset where the pad-end region begins (== end of the fade window).
    pub fn pad_end_start(&self) -> u64 {
        self.pad_begin_duration + self.body_duration
    }
}

/// The concrete return type of `get_format()` (§4.8), bundling the raw tuple the spec describes
/// into named fields.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub codec_name: &'static str,
    pub layout_name: &'static str,
    pub meta_name: &'static str,
    pub stream_name: String,
    pub format_id: u32,
    pub bitrate: u32,
    pub channels: u16,
    pub sample_rate: u32,
    pub loop_start: u64,
    pub loop_end: u64,
    pub total_samples: u64,
    pub play_samples: u64,
}

/// What a [`crate::probe::FormatProbe`] hands back after successfully recognising a container:
/// everything needed to build a playable [`Stream`]. Out of scope per spec.md §1 is the parsing
/// that produces this — only the shape of its output is part of the core engine's contract.
pub struct StreamInit {
    pub state: StreamState,
    pub codec: Box<dyn Codec>,
    pub layout: Layout,
    pub output_channels: u16,
    pub codec_name: &'static str,
    pub layout_name: &'static str,
    pub meta_name: &'static str,
    pub stream_name: String,
    pub format_id: u32,
    pub bitrate: u32,
}

/// The central entity (§3). Created by a format probe, mutated only by the decode/seek/reset
/// operations it exposes, destroyed once with cascaded release of codec, layout, and mixer —
/// automatic, via ordinary field drop order, since nothing here uses raw pointers.
pub struct Stream {
    pub(crate) state: StreamState,
    /// `None` for composite (segmented/layered) streams, which decode entirely through their
    /// child streams rather than a codec of their own.
    pub(crate) codec: Option<Box<dyn Codec>>,
    pub(crate) decode: Option<DecodeState>,
    pub(crate) layout: Layout,
    pub(crate) mixer: Mixer,
    pub(crate) play_config: Option<PlayConfig>,
    pub(crate) play_state: Option<PlayState>,
    codec_name: &'static str,
    layout_name: &'static str,
    meta_name: &'static str,
    stream_name: String,
    format_id: u32,
    bitrate: u32,
    done: bool,
    consecutive_empty: u32,
}

impl Stream {
    /// Builds a leaf stream (flat/interleave/blocked layout) with its own codec.
    pub fn new_leaf(
        state: StreamState,
        codec: Box<dyn Codec>,
        decode: DecodeState,
        layout: Layout,
        output_channels: u16,
        codec_name: &'static str,
        layout_name: &'static str,
    ) -> Self {
        Stream {
            state,
            codec: Some(codec),
            decode: Some(decode),
            layout,
            mixer: Mixer::new(output_channels),
            play_config: None,
            play_state: None,
            codec_name,
            layout_name,
            meta_name: "none",
            stream_name: String::new(),
            format_id: 0,
            bitrate: 0,
            done: false,
            consecutive_empty: 0,
        }
    }

    /// Builds a composite stream (segmented/layered layout) with no codec of its own.
    pub fn new_composite(state: StreamState, layout: Layout, output_channels: u16, layout_name: &'static str) -> Self {
        Stream {
            state,
            codec: None,
            decode: None,
            layout,
            mixer: Mixer::new(output_channels),
            play_config: None,
            play_state: None,
            codec_name: "composite",
            layout_name,
            meta_name: "none",
            stream_name: String::new(),
            format_id: 0,
            bitrate: 0,
            done: false,
            consecutive_empty: 0,
        }
    }

    pub fn from_init(init: StreamInit) -> Self {
        Stream {
            state: init.state,
            codec: Some(init.codec),
            decode: Some(DecodeState::new(SampleBuf::new(SampleFormat::S16, init.output_channels, 4096))),
            layout: init.layout,
            mixer: Mixer::new(init.output_channels),
            play_config: None,
            play_state: None,
            codec_name: init.codec_name,
            layout_name: init.layout_name,
            meta_name: init.meta_name,
            stream_name: init.stream_name,
            format_id: init.format_id,
            bitrate: init.bitrate,
            done: false,
            consecutive_empty: 0,
        }
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut StreamState {
        &mut self.state
    }

    pub fn is_configured(&self) -> bool {
        self.play_config.is_some()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Marks the stream exhausted, used by [`crate::render`] once `play_position` reaches
    /// `play_duration` (non-`play_forever` streams only).
    pub(crate) fn mark_done(&mut self) {
        self.done = true;
    }

    pub fn output_channels(&self) -> u16 {
        self.mixer.output_channels()
    }

    /// Mutable access to the mix op chain (§4.5), e.g. `stream.mixer_mut().push(MixOp::Volume {
    /// .. })`. Ops must be pushed before the mixer activates — the first `render`/`fill`/
    /// `decode_and_discard` call on this stream, which calls [`Mixer::ensure_capacity`] — after
    /// which `Mixer::push` panics. `output_channels()` reflects any Upmix/Downmix/Killmix already
    /// pushed.
    pub fn mixer_mut(&mut self) -> &mut Mixer {
        &mut self.mixer
    }

    /// Merges the user's play-config, recomputes [`PlayState`], and sets up the mixer op chain
    /// (§4.8). Called explicitly, or implicitly by `render` on first use.
    pub fn configure(&mut self, config: PlayConfig) -> Result<()> {
        let state = PlayState::resolve(
            &config,
            self.state.loop_flag,
            self.state.loop_start_sample,
            self.state.loop_end_sample,
            self.state.num_samples,
            self.state.sample_rate,
        );
        self.play_config = Some(config);
        self.play_state = Some(state);
        Ok(())
    }

    /// Decodes straight through the layout engine (no pad/trim/fade) — the "simple mode" path,
    /// and the primitive segmented/layered children recurse through.
    pub fn decode_layout(&mut self, dst: &mut SampleBuf) -> Result<usize> {
        let Stream { layout, codec, decode, state, .. } = self;
        let produced = match layout {
            Layout::Flat(l) => {
                let codec = codec.as_deref_mut().ok_or_else(|| {
                    crate::errors::GaError::Misuse("flat layout requires a codec")
                })?;
                let decode = decode.as_mut().ok_or_else(|| {
                    crate::errors::GaError::Misuse("flat layout requires decode state")
                })?;
                l.render(state, codec, decode, dst)?
            }
            Layout::Interleave(l) => {
                let codec = codec.as_deref_mut().ok_or_else(|| {
                    crate::errors::GaError::Misuse("interleave layout requires a codec")
                })?;
                let decode = decode.as_mut().ok_or_else(|| {
                    crate::errors::GaError::Misuse("interleave layout requires decode state")
                })?;
                l.render(state, codec, decode, dst)?
            }
            Layout::Blocked(l) => {
                let codec = codec.as_deref_mut().ok_or_else(|| {
                    crate::errors::GaError::Misuse("blocked layout requires a codec")
                })?;
                let decode = decode.as_mut().ok_or_else(|| {
                    crate::errors::GaError::Misuse("blocked layout requires decode state")
                })?;
                l.render(state, codec, decode, dst)?
            }
            Layout::Segmented(l) => l.render(state, dst)?,
            Layout::Layered(l) => l.render(state, dst)?,
        };

        if produced == 0 {
            self.consecutive_empty += 1;
            if self.consecutive_empty > MAX_CONSECUTIVE_EMPTY_DECODES {
                log::warn!("stream: {} consecutive empty decodes, marking done", self.consecutive_empty);
                self.done = true;
            }
        }
        else {
            self.consecutive_empty = 0;
        }

        Ok(produced)
    }

    /// Decodes and discards exactly `n` samples, in caller-buffer-sized chunks, used by the seek
    /// engine and by segmented loop-target rewinding.
    pub fn decode_and_discard(&mut self, mut n: u64) -> Result<()> {
        const CHUNK: usize = 4096;
        let format = self.decode.as_ref().map(|d| d.sbuf.format()).unwrap_or(SampleFormat::S16);
        let channels = self.mixer.output_channels();
        while n > 0 {
            let mut scratch = SampleBuf::new(format, channels, CHUNK.min(n as usize).max(1));
            let got = self.decode_layout(&mut scratch)?;
            if got == 0 {
                break;
            }
            n = n.saturating_sub(got as u64);
        }
        Ok(())
    }

    /// Renders up to `dst.capacity() − dst.filled()` samples (§4.8's `render`). Dispatches to
    /// "simple mode" (no resolved play-config) or the configured render pipeline (§4.6).
    pub fn render(&mut self, dst: &mut SampleBuf) -> Result<usize> {
        if self.play_config.is_none() {
            self.configure(PlayConfig::default())?;
        }

        let want = dst.capacity() - dst.filled();
        self.mixer.ensure_capacity(want.max(1));

        if self.done {
            return Ok(0);
        }

        crate::render::render_configured(self, dst)
    }

    /// Renders exactly `n` samples into `buf` as raw native-format bytes, internally buffering
    /// any partial frame across calls (§4.8's `fill`). Returns the number of samples actually
    /// written; fewer than `n` signals end-of-stream, and further calls return `0`.
    pub fn fill(&mut self, buf: &mut [u8], n: usize) -> Result<usize> {
        if self.done {
            return Ok(0);
        }
        let format = self.decode.as_ref().map(|d| d.sbuf.format()).unwrap_or(SampleFormat::S16);
        let channels = self.mixer.output_channels();
        let mut scratch = SampleBuf::new(format, channels, n);
        let got = self.render(&mut scratch)?;
        let bytes = scratch.filled_bytes();
        let copy_len = bytes.len().min(buf.len());
        buf[..copy_len].copy_from_slice(&bytes[..copy_len]);
        Ok(got)
    }

    pub fn seek(&mut self, sample: u64) -> Result<()> {
        crate::seek::seek(self, sample)
    }

    /// Resets the stream to its initial decode position, preserving the configured play-config
    /// (but resetting `play_state`'s runtime counters).
    pub fn reset(&mut self) -> Result<()> {
        self.state.reset_decode_position();
        if let Some(codec) = self.codec.as_mut() {
            codec.reset();
        }
        if let Some(decode) = self.decode.as_mut() {
            decode.sbuf.set_filled(0);
            decode.discard = 0;
            decode.samples_left = 0;
            decode.samples_into_block = 0;
        }
        match &mut self.layout {
            Layout::Blocked(l) => l.reset_to_start(),
            Layout::Segmented(l) => l.reset_children()?,
            Layout::Layered(l) => l.reset_children()?,
            _ => {}
        }
        if let Some(config) = self.play_config.clone() {
            self.configure(config)?;
        }
        self.done = false;
        self.consecutive_empty = 0;
        Ok(())
    }

    pub fn get_play_position(&self) -> u64 {
        self.play_state.map(|p| p.play_position).unwrap_or(self.state.current_sample)
    }

    pub fn get_format(&self) -> StreamInfo {
        let play_samples = self.play_state.map(|p| p.play_duration).unwrap_or(self.state.num_samples);
        StreamInfo {
            codec_name: self.codec_name,
            layout_name: self.layout_name,
            meta_name: self.meta_name,
            stream_name: self.stream_name.clone(),
            format_id: self.format_id,
            bitrate: self.bitrate,
            channels: self.mixer.output_channels(),
            sample_rate: self.state.sample_rate,
            loop_start: self.state.loop_start_sample,
            loop_end: self.state.loop_end_sample,
            total_samples: self.state.num_samples,
            play_samples,
        }
    }

    pub fn close(self) {
        drop(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Codec, CodecFamily, CodecKind};
    use crate::io::MemorySource;
    use crate::layout::{FlatLayout, Layout};
    use crate::mixer::{MixOp, MixTarget};

    struct ConstCodec {
        value: f64,
    }

    impl Codec for ConstCodec {
        fn kind(&self) -> CodecKind {
            CodecKind::Frame
        }
        fn sample_format(&self, _stream: &StreamState) -> SampleFormat {
            SampleFormat::S16
        }
        fn family(&self) -> CodecFamily {
            CodecFamily::Other
        }
        fn frame_samples(&self) -> Option<u32> {
            None
        }
        fn decode_frame(&mut self, stream: &mut StreamState, dst: &mut SampleBuf) -> Result<()> {
            let remaining = stream.num_samples.saturating_sub(stream.current_sample);
            let n = (dst.capacity() as u64).min(remaining) as usize;
            for i in 0..n {
                for ch in 0..dst.channels() {
                    dst.set_sample_scaled(i, ch as usize, self.value);
                }
            }
            dst.set_filled(n);
            Ok(())
        }
        fn reset(&mut self) {}
    }

    fn make_stream(value: f64) -> Stream {
        let mut state = StreamState::new(Box::new(MemorySource::new(vec![0; 16])), 1);
        state.num_samples = 8;
        let decode = DecodeState::new(SampleBuf::new(SampleFormat::S16, 1, 64));
        Stream::new_leaf(state, Box::new(ConstCodec { value }), decode, Layout::Flat(FlatLayout), 1, "const", "flat")
    }

    #[test]
    fn mixer_mut_pushes_an_op_that_render_actually_applies() {
        let mut stream = make_stream(1000.0);
        assert!(stream.mixer_mut().push(MixOp::Volume { dst: MixTarget::All, vol: 0.5 }));

        let mut dst = SampleBuf::new(SampleFormat::S16, 1, 8);
        let produced = stream.render(&mut dst).unwrap();

        assert_eq!(produced, 8);
        assert_eq!(dst.sample_scaled(0, 0), 500.0);
    }

    #[test]
    fn output_channels_reflects_upmix_pushed_through_mixer_mut() {
        let mut stream = make_stream(1.0);
        assert_eq!(stream.output_channels(), 1);
        assert!(stream.mixer_mut().push(MixOp::Upmix { dst: 1 }));
        assert_eq!(stream.output_channels(), 2);
    }
}

