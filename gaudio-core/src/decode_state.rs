// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-stream decode bookkeeping and the loop detection/save/restore engine (`do_loop`).

use crate::codec::Codec;
use crate::errors::Result;
use crate::sbuf::SampleBuf;
use crate::stream::StreamState;

/// Holds the codec-owned sample buffer, a discard counter, and the samples-left/
/// samples-into-block bookkeeping pair layouts need.
pub struct DecodeState {
    pub sbuf: SampleBuf,
    /// Samples the codec has produced but must be dropped (encoder delay, seek leftover).
    pub discard: usize,
    pub samples_left: u64,
    pub samples_into_block: u64,
}

impl DecodeState {
    pub fn new(sbuf: SampleBuf) -> Self {
        DecodeState { sbuf, discard: 0, samples_left: 0, samples_into_block: 0 }
    }
}

/// Clamps a requested sample count to the current loop boundary (block and frame-boundary
/// clamping are left to the individual layouts and codecs, which own that bookkeeping; this
/// handles the loop-boundary clamp common to all of them).
pub fn clamp_to_loop_boundary(state: &StreamState, want: usize) -> usize {
    let mut n = want as u64;
    if state.loop_flag {
        if !state.hit_loop && state.current_sample < state.loop_start_sample {
            n = n.min(state.loop_start_sample - state.current_sample);
        } else if state.hit_loop && state.current_sample < state.loop_end_sample {
            n = n.min(state.loop_end_sample - state.current_sample);
        }
    }
    n as usize
}

/// Runs loop detection for the current decode step and, on a loop-end crossing, restores
/// snapshot state. Returns `Ok(true)` if a loop restart occurred this call.
///
/// Called by every layout variant at the point where `current_sample` has just been advanced to
/// reflect the samples produced by the most recent decode call. `codec` is `None` for composite
/// layouts (segmented/layered), which own no single codec of their own — looping is still owned
/// by the parent stream, but there is nothing to ask `seekable()`/`seek()` of.
pub fn do_loop(state: &mut StreamState, codec: Option<&mut dyn Codec>) -> Result<bool> {
    if !state.loop_flag {
        return Ok(false);
    }

    if state.current_sample == state.loop_end_sample {
        state.loop_count += 1;

        if let Some(target) = state.loop_target {
            if state.loop_count >= target {
                // Loop-target reached: stop looping and let the stream continue past the end
                // naturally. `hit_loop` is intentionally left set.
                state.loop_flag = false;
                return Ok(false);
            }
        }

        let preserves_history = codec.as_deref().map(|c| c.family().preserves_loop_history()).unwrap_or(false);

        if let Some(codec) = codec {
            if codec.seekable() {
                codec.seek(state, state.loop_start_sample)?;
            }
        }

        if preserves_history {
            // For the history-preserving families the predictor state just produced by this
            // decode call is the state the second iteration must continue from, not the stale
            // history captured when loop_start was first hit — overwrite the snapshot's history
            // fields (but not its byte offsets) with the current ones before restoring.
            for (loop_ch, cur_ch) in state.loop_channels.iter_mut().zip(state.channels.iter()) {
                loop_ch.hist_i16 = cur_ch.hist_i16;
                loop_ch.hist_i32 = cur_ch.hist_i32;
            }
        }

        // Restore byte offsets (and, for the history-preserving codec families, ADPCM history,
        // which rides along inside ChannelDescriptor) from the loop snapshot.
        state.channels = state.loop_channels.clone();
        state.current_sample = state.loop_start_sample;
        state.samples_into_block = state.loop_samples_into_block;

        return Ok(true);
    }

    if state.current_sample == state.loop_start_sample && !state.hit_loop {
        state.loop_channels = state.channels.clone();
        state.loop_samples_into_block = state.samples_into_block;
        state.hit_loop = true;
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelDescriptor;
    use crate::codec::{Codec, CodecFamily, CodecKind};
    use crate::io::MemorySource;
    use crate::sample::SampleFormat;

    struct NullCodec;
    impl Codec for NullCodec {
        fn kind(&self) -> CodecKind {
            CodecKind::Frame
        }
        fn sample_format(&self, _stream: &StreamState) -> SampleFormat {
            SampleFormat::S16
        }
        fn family(&self) -> CodecFamily {
            CodecFamily::Dsp
        }
        fn reset(&mut self) {}
    }

    fn make_state(loop_start: u64, loop_end: u64) -> StreamState {
        let mut state = StreamState::new(Box::new(MemorySource::new(vec![0; 1024])), 1);
        state.channels = smallvec::smallvec![ChannelDescriptor::new(0)];
        state.loop_channels = state.channels.clone();
        state.loop_flag = true;
        state.loop_flag_original = true;
        state.loop_start_sample = loop_start;
        state.loop_end_sample = loop_end;
        state
    }

    #[test]
    fn hit_loop_transitions_once() {
        let mut state = make_state(10, 20);
        let mut codec = NullCodec;
        state.current_sample = 10;
        assert!(!do_loop(&mut state, Some(&mut codec)).unwrap());
        assert!(state.hit_loop);
        // A second visit to loop_start (e.g. after a later full loop back to start) must not
        // re-snapshot.
        state.current_sample = 10;
        state.channels[0].offset = 999;
        assert!(!do_loop(&mut state, Some(&mut codec)).unwrap());
        assert_ne!(state.loop_channels[0].offset, 999);
    }

    #[test]
    fn loop_end_restores_snapshot_and_increments_count() {
        let mut state = make_state(10, 20);
        let mut codec = NullCodec;
        state.current_sample = 10;
        do_loop(&mut state, Some(&mut codec)).unwrap();

        state.current_sample = 20;
        state.channels[0].offset = 12345;
        let looped = do_loop(&mut state, Some(&mut codec)).unwrap();

        assert!(looped);
        assert_eq!(state.loop_count, 1);
        assert_eq!(state.current_sample, 10);
        assert_ne!(state.channels[0].offset, 12345);
    }

    #[test]
    fn loop_end_preserves_current_history_for_preserving_families() {
        // NullCodec reports CodecFamily::Dsp, which is on the history-preserving allow-list.
        let mut state = make_state(10, 20);
        let mut codec = NullCodec;
        state.current_sample = 10;
        do_loop(&mut state, Some(&mut codec)).unwrap();
        assert_eq!(state.loop_channels[0].hist_i16, [0, 0]);

        // Simulate the codec's predictor history having advanced since loop_start was snapshotted.
        state.current_sample = 20;
        state.channels[0].hist_i16 = [111, -222];
        state.channels[0].hist_i32 = [333, -444];
        do_loop(&mut state, Some(&mut codec)).unwrap();

        // The restored history must be the just-decoded one, not the stale loop_start snapshot.
        assert_eq!(state.channels[0].hist_i16, [111, -222]);
        assert_eq!(state.channels[0].hist_i32, [333, -444]);
    }

    #[test]
    fn loop_target_reached_stops_looping() {
        let mut state = make_state(10, 20);
        state.loop_target = Some(1);
        let mut codec = NullCodec;
        state.current_sample = 10;
        do_loop(&mut state, Some(&mut codec)).unwrap();

        state.current_sample = 20;
        let looped = do_loop(&mut state, Some(&mut codec)).unwrap();
        assert!(!looped);
        assert!(!state.loop_flag);
        assert!(state.hit_loop);
    }
}
