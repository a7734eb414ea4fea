// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The segmented layout: child streams played sequentially, concatenated end-to-end. Looping, if
//! any, is owned by the parent and is applied by rewinding the child index.

use crate::decode_state::do_loop;
use crate::errors::{parse_error, Result};
use crate::sample::SampleFormat;
use crate::sbuf::SampleBuf;
use crate::stream::{Stream, StreamState};

pub struct SegmentedLayout {
    children: Vec<Stream>,
    current_segment: usize,
    /// Cumulative sample offset, in the composed stream, at which each segment begins.
    segment_starts: Vec<u64>,
    output_channels: u16,
    format: SampleFormat,
}

impl SegmentedLayout {
    /// Builds a segmented layout from leaf-first-constructed children; cycles are forbidden
    /// structurally by only ever building children before their parent.
    ///
    /// Invariants enforced here: all children share the output channel count; any child with its
    /// own loop flag set is rejected, since looping in a segmented composition belongs to the
    /// parent only.
    pub fn new(children: Vec<Stream>, format: SampleFormat) -> Result<Self> {
        if children.is_empty() {
            return parse_error("segmented layout requires at least one child segment");
        }
        let output_channels = children[0].output_channels();
        for child in &children {
            if child.output_channels() != output_channels {
                return parse_error("segmented layout: all segments must share channel count");
            }
            if child.state().loop_flag_original {
                return parse_error("segmented layout: child segments must not carry their own loop");
            }
        }

        let mut segment_starts = Vec::with_capacity(children.len());
        let mut acc = 0u64;
        for child in &children {
            segment_starts.push(acc);
            acc += child.state().num_samples;
        }

        Ok(SegmentedLayout { children, current_segment: 0, segment_starts, output_channels, format })
    }

    pub fn output_channels(&self) -> u16 {
        self.output_channels
    }

    pub fn total_samples(&self) -> u64 {
        self.segment_starts.last().copied().unwrap_or(0)
            + self.children.last().map(|c| c.state().num_samples).unwrap_or(0)
    }

    pub fn reset_children(&mut self) -> Result<()> {
        for child in self.children.iter_mut() {
            child.reset()?;
        }
        self.current_segment = 0;
        Ok(())
    }

    fn segment_for_sample(&self, sample: u64) -> usize {
        match self.segment_starts.binary_search(&sample) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1).min(self.children.len() - 1),
        }
    }

    /// Rewinds to the segment containing `sample`, resetting it and every segment after it, then
    /// decodes-and-discards the remainder up to `sample` within the target segment.
    pub fn seek_to_sample(&mut self, sample: u64) -> Result<()> {
        let idx = self.segment_for_sample(sample);
        for child in self.children[idx..].iter_mut() {
            child.reset()?;
        }
        self.current_segment = idx;
        let skip = sample.saturating_sub(self.segment_starts[idx]);
        if skip > 0 {
            self.children[idx].decode_and_discard(skip)?;
        }
        Ok(())
    }

    pub fn render(&mut self, state: &mut StreamState, dst: &mut SampleBuf) -> Result<usize> {
        let mut produced = 0;

        while dst.filled() < dst.capacity() && self.current_segment < self.children.len() {
            let room = dst.capacity() - dst.filled();
            let before = dst.filled();

            self.children[self.current_segment].decode_layout(dst)?;

            let got = dst.filled() - before;
            produced += got;
            state.current_sample += got as u64;

            if do_loop(state, None)? {
                self.seek_to_sample(state.loop_start_sample)?;
                continue;
            }

            if got < room {
                self.current_segment += 1;
                if self.current_segment >= self.children.len() {
                    break;
                }
            }
        }

        Ok(produced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelDescriptor;
    use crate::codec::{Codec, CodecFamily, CodecKind};
    use crate::decode_state::DecodeState;
    use crate::io::MemorySource;
    use crate::layout::{FlatLayout, Layout};

    /// Produces a deterministic ramp: sample value == absolute sample index, truncated to i16.
    struct RampCodec {
        produced_total: u64,
    }

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
            let remaining = stream.num_samples.saturating_sub(stream.current_sample + self.produced_total);
            let n = (dst.capacity() as u64).min(remaining.max(0)) as usize;
            for i in 0..n {
                for ch in 0..dst.channels() {
                    dst.set_sample_scaled(i, ch as usize, (stream.current_sample + i as u64) as f64);
                }
            }
            dst.set_filled(n);
            Ok(())
        }
        fn reset(&mut self) {
            self.produced_total = 0;
        }
    }

    fn make_segment(num_samples: u64) -> Stream {
        let mut state = StreamState::new(Box::new(MemorySource::new(vec![0; 16])), 1);
        state.num_samples = num_samples;
        state.channels = smallvec::smallvec![ChannelDescriptor::new(0)];
        state.loop_channels = state.channels.clone();
        let decode = DecodeState::new(SampleBuf::new(SampleFormat::S16, 1, 64));
        Stream::new_leaf(
            state,
            Box::new(RampCodec { produced_total: 0 }),
            decode,
            Layout::Flat(FlatLayout),
            1,
            "ramp",
            "flat",
        )
    }

    #[test]
    fn total_samples_is_sum_of_children() {
        let segments = vec![make_segment(10), make_segment(20)];
        let layout = SegmentedLayout::new(segments, SampleFormat::S16).unwrap();
        assert_eq!(layout.total_samples(), 30);
    }

    #[test]
    fn render_concatenates_segments_in_order() {
        let segments = vec![make_segment(10), make_segment(20)];
        let mut layout = SegmentedLayout::new(segments, SampleFormat::S16).unwrap();
        let mut state = StreamState::new(Box::new(MemorySource::new(vec![0; 16])), 1);
        let mut dst = SampleBuf::new(SampleFormat::S16, 1, 25);
        let produced = layout.render(&mut state, &mut dst).unwrap();
        assert_eq!(produced, 25);
    }

    #[test]
    fn rejects_children_with_their_own_loop() {
        let mut looping = make_segment(10);
        looping.state_mut().loop_flag_original = true;
        let err = SegmentedLayout::new(vec![looping], SampleFormat::S16).unwrap_err();
        assert!(matches!(err, crate::errors::GaError::Parse(_)));
    }
}
