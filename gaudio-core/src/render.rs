// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The configured render pipeline (§4.6): pad-begin, trim-begin, decode+mix, fade-out, pad-end.

use crate::errors::Result;
use crate::sample::SampleFormat;
use crate::sbuf::SampleBuf;
use crate::stream::Stream;

/// Writes `n` frames of silence starting at `dst`'s current fill point and advances `filled`.
fn write_silence(dst: &mut SampleBuf, n: usize) {
    let start = dst.filled();
    for i in 0..n {
        for ch in 0..dst.channels() {
            dst.set_sample_scaled(start + i, ch as usize, 0.0);
        }
    }
    dst.set_filled(start + n);
}

fn decode_format(stream: &Stream) -> SampleFormat {
    stream.decode.as_ref().map(|d| d.sbuf.format()).unwrap_or(SampleFormat::S16)
}

/// Decodes `want` samples through the layout engine, mixes them, applies any overlapping
/// fade-out window, and appends the result to `dst`. Returns the number of samples produced,
/// which is `< want` only at end of stream.
fn decode_mix_chunk(stream: &mut Stream, dst: &mut SampleBuf, want: usize, fade: Option<(u64, u64)>) -> Result<usize> {
    if want == 0 {
        return Ok(0);
    }

    let format = decode_format(stream);
    let channels = stream.mixer.output_channels();
    let mut scratch = SampleBuf::new(format, channels, want);

    let produced = stream.decode_layout(&mut scratch)?;
    if produced == 0 {
        return Ok(0);
    }

    stream.mixer.process(&mut scratch, produced);

    if let Some((fade_pos, fade_duration)) = fade {
        scratch.fadeout(0, produced, fade_pos, fade_duration);
    }

    SampleBuf::copy_segments(dst, &mut scratch, produced);
    Ok(produced)
}

/// Runs the full pad/trim/body/fade/pad-end pipeline for one `render()` call, filling `dst` up
/// to its remaining capacity or until the stream is exhausted.
pub fn render_configured(stream: &mut Stream, dst: &mut SampleBuf) -> Result<usize> {
    let mut produced_total = 0;

    loop {
        if dst.filled() >= dst.capacity() {
            break;
        }
        let room = dst.capacity() - dst.filled();

        let ps = stream.play_state.ok_or_else(|| {
            crate::errors::GaError::Misuse("render_configured called before configure()")
        })?;

        // Step 1: pad-begin.
        if ps.pad_begin_left > 0 {
            let n = room.min(ps.pad_begin_left as usize);
            write_silence(dst, n);
            let ps = stream.play_state.as_mut().unwrap();
            ps.pad_begin_left -= n as u64;
            ps.play_position += n as u64;
            produced_total += n;
            continue;
        }

        // Step 2: trim-begin — decoded and discarded in one shot, contributing nothing to
        // `dst` or `play_position` (§4.6 step 2).
        if ps.trim_begin_left > 0 {
            stream.decode_and_discard(ps.trim_begin_left)?;
            stream.play_state.as_mut().unwrap().trim_begin_left = 0;
            continue;
        }

        let fade_start = ps.fade_start();
        let pad_end_start = ps.pad_end_start();

        // Step 3/4: body and fade-out, decoded together since they share the same underlying
        // stream position — the fade window is simply the tail of the body (§4.6 step 4).
        if ps.play_position < pad_end_start {
            let body_left = (pad_end_start - ps.play_position) as usize;
            let want = room.min(body_left);

            let fade = if ps.fade_duration > 0 && ps.play_position + want as u64 > fade_start {
                let fade_pos = ps.play_position.saturating_sub(fade_start);
                Some((fade_pos, ps.fade_duration))
            }
            else {
                None
            };

            let produced = decode_mix_chunk(stream, dst, want, fade)?;
            if produced == 0 {
                // Source ended earlier than the computed body duration (e.g. a probe's
                // num_samples was optimistic). Treat this the same as reaching the end.
                stream.mark_done();
                break;
            }

            let ps = stream.play_state.as_mut().unwrap();
            ps.play_position += produced as u64;
            if ps.play_position > fade_start {
                ps.fade_left = ps.pad_end_start().saturating_sub(ps.play_position);
            }
            produced_total += produced;
            continue;
        }

        // Step 5: pad-end.
        if !ps.play_forever && ps.play_position < ps.play_duration {
            let pad_end_left = (ps.play_duration - ps.play_position) as usize;
            let n = room.min(pad_end_left);
            write_silence(dst, n);
            stream.play_state.as_mut().unwrap().play_position += n as u64;
            produced_total += n;
            continue;
        }

        // Beyond the computed play_duration: a `play_forever` stream keeps decoding raw,
        // unfaded audio from the (possibly still-looping) underlying source indefinitely;
        // everything else is finished.
        if ps.play_forever {
            let produced = decode_mix_chunk(stream, dst, room, None)?;
            if produced == 0 {
                stream.mark_done();
                break;
            }
            stream.play_state.as_mut().unwrap().play_position += produced as u64;
            produced_total += produced;
            continue;
        }

        stream.mark_done();
        break;
    }

    Ok(produced_total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelDescriptor;
    use crate::codec::{Codec, CodecFamily, CodecKind};
    use crate::decode_state::DecodeState;
    use crate::io::MemorySource;
    use crate::layout::{FlatLayout, Layout};
    use crate::stream::{PlayConfig, StreamState};
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
                    dst.set_sample_scaled(i, ch as usize, 1000.0);
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
    fn pad_begin_is_silence_then_body_follows() {
        let mut stream = make_stream(10);
        let mut config = PlayConfig::default();
        config.with_pad_begin(TimeSpan::Samples(3)).with_ignore_fade(true);
        stream.configure(config).unwrap();

        let mut dst = SampleBuf::new(SampleFormat::S16, 1, 13);
        let produced = render_configured(&mut stream, &mut dst).unwrap();

        assert_eq!(produced, 13);
        assert_eq!(dst.sample_scaled(0, 0), 0.0);
        assert_eq!(dst.sample_scaled(2, 0), 0.0);
        assert_eq!(dst.sample_scaled(3, 0), 1000.0);
    }

    #[test]
    fn trim_begin_consumes_without_output() {
        let mut stream = make_stream(10);
        let mut config = PlayConfig::default();
        config.with_trim_begin(TimeSpan::Samples(4)).with_ignore_fade(true);
        stream.configure(config).unwrap();

        let mut dst = SampleBuf::new(SampleFormat::S16, 1, 6);
        let produced = render_configured(&mut stream, &mut dst).unwrap();

        assert_eq!(produced, 6);
    }

    #[test]
    fn reports_done_after_play_duration() {
        let mut stream = make_stream(4);
        let mut config = PlayConfig::default();
        config.with_ignore_fade(true);
        stream.configure(config).unwrap();

        let mut dst = SampleBuf::new(SampleFormat::S16, 1, 4);
        render_configured(&mut stream, &mut dst).unwrap();
        assert!(stream.is_done());

        let mut dst2 = SampleBuf::new(SampleFormat::S16, 1, 4);
        let produced = stream.render(&mut dst2).unwrap();
        assert_eq!(produced, 0);
    }
}
