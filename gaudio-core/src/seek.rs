// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The seek engine (§4.7): clamps the target, classifies it into pad-begin / body / pad-end
//! regions, and reuses the current decode position when that is cheaper than a reset.

use crate::errors::Result;
use crate::layout::Layout;
use crate::stream::{PlayConfig, Stream};

/// Rewinds the loop snapshot captured at `loop_start_sample` back into the live decode state,
/// the same restore `do_loop` performs on a natural loop-end crossing.
fn restore_loop_snapshot(stream: &mut Stream) {
    let state = stream.state_mut();
    state.channels = state.loop_channels.clone();
    state.current_sample = state.loop_start_sample;
    state.samples_into_block = state.loop_samples_into_block;
}

/// General-purpose fallback: always correct, never especially fast. Resets (if we'd otherwise
/// have to decode backwards) then decodes-and-discards forward to `target`.
fn seek_decode_position(stream: &mut Stream, target: u64) -> Result<()> {
    let current = stream.state().current_sample;
    if target < current {
        stream.reset()?;
        stream.decode_and_discard(target)?;
    }
    else {
        stream.decode_and_discard(target - current)?;
    }
    Ok(())
}

/// Seeks the body region of a looped stream, per §4.7's loop sub-decision.
fn seek_looped_body(stream: &mut Stream, seek_decode: u64) -> Result<()> {
    let loop_start = stream.state().loop_start_sample;
    let loop_end = stream.state().loop_end_sample;
    let loop_body = loop_end.saturating_sub(loop_start).max(1);

    if seek_decode < loop_start {
        seek_decode_position(stream, seek_decode)?;
        return Ok(());
    }

    if !stream.state().hit_loop {
        // Force the loop-start snapshot to exist before we can rewind into it.
        let current = stream.state().current_sample;
        if loop_start > current {
            stream.decode_and_discard(loop_start - current)?;
        }
        else if loop_start < current {
            stream.reset()?;
            stream.decode_and_discard(loop_start)?;
        }
    }

    let loop_seek = (seek_decode - loop_start) % loop_body;
    let mut loop_count_target = (seek_decode - loop_start) / loop_body;

    if let Some(target_iterations) = stream.state().loop_target {
        if loop_count_target >= target_iterations {
            // Force one more natural loop-end crossing so the engine's own exit-to-outro path
            // runs, instead of us trying to reproduce its exact post-exit channel state here.
            loop_count_target = target_iterations.saturating_sub(1);
            restore_loop_snapshot(stream);
            stream.decode_and_discard(loop_body)?;
            return Ok(());
        }
    }

    let current_in_loop = stream.state().current_sample.saturating_sub(loop_start);
    if loop_seek < current_in_loop {
        restore_loop_snapshot(stream);
        stream.decode_and_discard(loop_seek)?;
    }
    else {
        stream.decode_and_discard(loop_seek - current_in_loop)?;
    }

    stream.state_mut().loop_count = loop_count_target;
    Ok(())
}

/// Tries the layout's own fast seek, where one exists (segmented composition rewinds to the
/// owning child instead of decode-and-discarding from the top). Returns `true` if handled.
fn try_fast_layout_seek(stream: &mut Stream, seek_decode: u64) -> Result<bool> {
    let handled = match &mut stream.layout {
        Layout::Segmented(l) => {
            l.seek_to_sample(seek_decode)?;
            true
        }
        _ => false,
    };
    if handled {
        stream.state_mut().current_sample = seek_decode;
    }
    Ok(handled)
}

/// Seeks `stream` to `sample` (§4.7). Auto-configures with defaults first, matching `render`'s
/// implicit-configure convenience (§4.8).
pub fn seek(stream: &mut Stream, sample: u64) -> Result<()> {
    if stream.play_config.is_none() {
        stream.configure(PlayConfig::default())?;
    }

    let ps = stream.play_state.expect("configure() guarantees play_state is Some");
    let target = if ps.play_forever { sample } else { sample.min(ps.play_duration) };

    // Pad-begin region: reset, no decode, just arm the remaining pad counter.
    if target < ps.pad_begin_duration {
        stream.reset()?;
        let ps = stream.play_state.as_mut().unwrap();
        ps.pad_begin_left = ps.pad_begin_duration - target;
        ps.trim_begin_left = 0;
        ps.play_position = target;
        return Ok(());
    }

    let pad_end_start = ps.pad_end_start();

    // Pad-end-or-beyond: no decode needed; a non-looped stream is parked past its last sample.
    if !ps.play_forever && target >= pad_end_start {
        let ps2 = stream.play_state.as_mut().unwrap();
        ps2.pad_begin_left = 0;
        ps2.trim_begin_left = 0;
        ps2.play_position = target;
        if !stream.state().loop_flag {
            let num_samples = stream.state().num_samples;
            stream.state_mut().current_sample = num_samples + 1;
        }
        return Ok(());
    }

    // Body (or play-forever): map the caller-visible target back to the underlying decode
    // position, accounting for the discarded trim-begin prefix.
    let seek_decode = (target + ps.trim_begin_duration).saturating_sub(ps.pad_begin_duration);

    if !try_fast_layout_seek(stream, seek_decode)? {
        if stream.state().loop_flag {
            seek_looped_body(stream, seek_decode)?;
        }
        else {
            let num_samples = stream.state().num_samples;
            if seek_decode <= num_samples {
                seek_decode_position(stream, seek_decode)?;
            }
            else {
                stream.state_mut().current_sample = num_samples + 1;
            }
        }
    }

    let ps = stream.play_state.as_mut().unwrap();
    ps.pad_begin_left = 0;
    ps.trim_begin_left = 0;
    ps.play_position = target;
    if target > ps.fade_start() {
        ps.fade_left = ps.pad_end_start().saturating_sub(target);
    }
    else {
        ps.fade_left = ps.fade_duration;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelDescriptor;
    use crate::codec::{Codec, CodecFamily, CodecKind};
    use crate::decode_state::DecodeState;
    use crate::io::MemorySource;
    use crate::layout::FlatLayout;
    use crate::sample::SampleFormat;
    use crate::sbuf::SampleBuf;
    use crate::stream::StreamState;
    use crate::units::TimeSpan;

    struct RampCodec;
    impl Codec for RampCodec {
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
                    dst.set_sample_scaled(i, ch as usize, (stream.current_sample + i as u64) as f64);
                }
            }
            dst.set_filled(n);
            Ok(())
        }
        fn reset(&mut self) {}
    }

    fn make_stream(num_samples: u64) -> Stream {
        let mut state = StreamState::new(Box::new(MemorySource::new(vec![0; 16])), 1);
        state.num_samples = num_samples;
        state.sample_rate = 1000;
        state.channels = smallvec::smallvec![ChannelDescriptor::new(0)];
        state.loop_channels = state.channels.clone();
        let decode = DecodeState::new(SampleBuf::new(SampleFormat::S16, 1, 64));
        Stream::new_leaf(state, Box::new(RampCodec), decode, Layout::Flat(FlatLayout), 1, "ramp", "flat")
    }

    #[test]
    fn seek_into_pad_begin_arms_remaining_counter() {
        let mut stream = make_stream(20);
        let mut config = PlayConfig::default();
        config.with_pad_begin(TimeSpan::Samples(10)).with_ignore_fade(true);
        stream.configure(config).unwrap();

        seek(&mut stream, 4).unwrap();

        let ps = stream.play_state.unwrap();
        assert_eq!(ps.pad_begin_left, 6);
        assert_eq!(ps.play_position, 4);
    }

    #[test]
    fn seek_into_body_decodes_forward_to_target() {
        let mut stream = make_stream(20);
        let mut config = PlayConfig::default();
        config.with_ignore_fade(true);
        stream.configure(config).unwrap();

        seek(&mut stream, 5).unwrap();

        assert_eq!(stream.state().current_sample, 5);
        assert_eq!(stream.get_play_position(), 5);
    }

    #[test]
    fn seek_backward_resets_then_decodes() {
        let mut stream = make_stream(20);
        let mut config = PlayConfig::default();
        config.with_ignore_fade(true);
        stream.configure(config).unwrap();

        seek(&mut stream, 15).unwrap();
        seek(&mut stream, 3).unwrap();

        assert_eq!(stream.state().current_sample, 3);
    }
}
