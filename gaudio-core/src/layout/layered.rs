// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The layered layout: child streams decoded in lock-step, each contributing a disjoint slice of
//! output channels to the same frame, e.g. a stereo "music" layer plus a mono "voice" layer
//! composed into 3 channels.

use crate::errors::{parse_error, Result};
use crate::sample::SampleFormat;
use crate::sbuf::SampleBuf;
use crate::stream::{Stream, StreamState};

pub struct LayeredLayout {
    children: Vec<Stream>,
    /// Destination channel offset at which each child's channels land.
    channel_offsets: Vec<u16>,
    output_channels: u16,
    format: SampleFormat,
}

impl LayeredLayout {
    /// Builds a layered layout. Children are decoded for the same span of samples concurrently;
    /// none may have a loop of its own since the parent is the sole authority on looping, same as
    /// segmented composition.
    pub fn new(children: Vec<Stream>, format: SampleFormat) -> Result<Self> {
        if children.is_empty() {
            return parse_error("layered layout requires at least one child layer");
        }

        let mut channel_offsets = Vec::with_capacity(children.len());
        let mut acc = 0u16;
        for child in &children {
            if child.state().loop_flag_original {
                return parse_error("layered layout: child layers must not carry their own loop");
            }
            channel_offsets.push(acc);
            acc += child.output_channels();
        }

        Ok(LayeredLayout { children, channel_offsets, output_channels: acc, format })
    }

    pub fn output_channels(&self) -> u16 {
        self.output_channels
    }

    pub fn reset_children(&mut self) -> Result<()> {
        for child in self.children.iter_mut() {
            child.reset()?;
        }
        Ok(())
    }

    pub fn render(&mut self, state: &mut StreamState, dst: &mut SampleBuf) -> Result<usize> {
        let room = dst.capacity() - dst.filled();
        if room == 0 {
            return Ok(0);
        }

        // Every layer always contributes `room` frames: a layer that decodes fewer (end of its
        // own content) has its tail silenced rather than holding the other, still-live layers'
        // already-decoded samples back or discarding them (spec.md §4.4).
        let mut any_progress = false;
        for (child, &ch_start) in self.children.iter_mut().zip(self.channel_offsets.iter()) {
            let mut layer_buf = SampleBuf::new(self.format, child.output_channels(), room);
            child.decode_layout(&mut layer_buf)?;
            if layer_buf.filled() > 0 {
                any_progress = true;
            }
            if layer_buf.filled() < room {
                layer_buf.silence_rest();
            }
            SampleBuf::copy_layers(dst, &layer_buf, ch_start as usize, room);
        }

        // All layers exhausted at once (nothing decoded anywhere) is the only real end-of-stream
        // signal; otherwise the padded frames above are legitimate output.
        let produced = if any_progress { room } else { 0 };
        dst.set_filled(dst.filled() + produced);

        // Loop and current_sample fields of the parent are updated from layer 0, per spec.md
        // §4.4, rather than from the (now always-full) `produced` count.
        if let Some(primary) = self.children.first() {
            let primary_state = primary.state();
            state.current_sample = primary_state.current_sample;
            state.loop_count = primary_state.loop_count;
            state.hit_loop = primary_state.hit_loop;
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

    fn make_layer(channels: u16, value: f64, num_samples: u64) -> Stream {
        let mut state = StreamState::new(Box::new(MemorySource::new(vec![0; 16])), channels);
        state.num_samples = num_samples;
        state.channels = (0..channels).map(|i| ChannelDescriptor::new(i as u64)).collect();
        state.loop_channels = state.channels.clone();
        let decode = DecodeState::new(SampleBuf::new(SampleFormat::S16, channels, 64));
        Stream::new_leaf(state, Box::new(ConstCodec { value }), decode, Layout::Flat(FlatLayout), channels, "const", "flat")
    }

    #[test]
    fn output_channels_is_sum_of_layers() {
        let layers = vec![make_layer(2, 1.0, 10), make_layer(1, 2.0, 10)];
        let layout = LayeredLayout::new(layers, SampleFormat::S16).unwrap();
        assert_eq!(layout.output_channels(), 3);
    }

    #[test]
    fn render_places_layers_at_disjoint_channels() {
        let layers = vec![make_layer(2, 111.0, 10), make_layer(1, 222.0, 10)];
        let mut layout = LayeredLayout::new(layers, SampleFormat::S16).unwrap();
        let mut state = StreamState::new(Box::new(MemorySource::new(vec![0; 16])), 3);
        let mut dst = SampleBuf::new(SampleFormat::S16, 3, 5);

        let produced = layout.render(&mut state, &mut dst).unwrap();

        assert_eq!(produced, 5);
        assert_eq!(dst.sample_scaled(0, 0), 111.0);
        assert_eq!(dst.sample_scaled(0, 1), 111.0);
        assert_eq!(dst.sample_scaled(0, 2), 222.0);
    }

    #[test]
    fn render_pads_short_layer_without_losing_the_longer_one() {
        let layers = vec![make_layer(1, 1.0, 3), make_layer(1, 2.0, 10)];
        let mut layout = LayeredLayout::new(layers, SampleFormat::S16).unwrap();
        let mut state = StreamState::new(Box::new(MemorySource::new(vec![0; 16])), 2);
        let mut dst = SampleBuf::new(SampleFormat::S16, 2, 10);

        let produced = layout.render(&mut state, &mut dst).unwrap();

        // Every layer contributes the full requested span; the short layer's tail is silence,
        // but the longer layer's samples past index 3 are not discarded.
        assert_eq!(produced, 10);
        assert_eq!(dst.sample_scaled(2, 0), 1.0);
        assert_eq!(dst.sample_scaled(3, 0), 0.0);
        assert_eq!(dst.sample_scaled(9, 0), 0.0);
        assert_eq!(dst.sample_scaled(3, 1), 2.0);
        assert_eq!(dst.sample_scaled(9, 1), 2.0);

        // current_sample/loop bookkeeping mirrors layer 0 (the first child), not a clamped
        // overall count.
        assert_eq!(state.current_sample, 3);
    }

    #[test]
    fn render_reports_done_once_every_layer_is_exhausted() {
        let layers = vec![make_layer(1, 1.0, 3), make_layer(1, 2.0, 3)];
        let mut layout = LayeredLayout::new(layers, SampleFormat::S16).unwrap();
        let mut state = StreamState::new(Box::new(MemorySource::new(vec![0; 16])), 2);

        let mut dst1 = SampleBuf::new(SampleFormat::S16, 2, 3);
        assert_eq!(layout.render(&mut state, &mut dst1).unwrap(), 3);

        let mut dst2 = SampleBuf::new(SampleFormat::S16, 2, 3);
        assert_eq!(layout.render(&mut state, &mut dst2).unwrap(), 0);
    }
}
