// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The mixer: a fixed-capacity op chain over a float work buffer, including time-varying fades.

use smallvec::SmallVec;
use std::f64::consts::PI;

use crate::sbuf::SampleBuf;

/// Hard cap on the number of ops in a stream's mix chain (§9).
pub const MAX_MIX_OPS: usize = 512;

/// `dst = all` is represented by this variant rather than a sentinel negative index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixTarget {
    One(u16),
    All,
}

/// One of the seven fade shape curves (§4.5). `{`/`}` alias to `Exponential`, `(`/`)` alias to
/// `RaisedSine`, at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeShape {
    /// T: triangular/linear.
    Triangular,
    /// E: exponential, typically used for fade-out.
    Exponential,
    /// L: logarithmic.
    Logarithmic,
    /// H: raised sine (half-cosine).
    RaisedSine,
    /// Q: quarter sine.
    QuarterSine,
    /// p: parabola.
    Parabola,
    /// P: inverted parabola.
    InvertedParabola,
}

impl FadeShape {
    /// Parses a shape character, applying the `{`/`}` → E and `(`/`)` → H aliases.
    pub fn parse(c: char) -> Option<FadeShape> {
        match c {
            'T' => Some(FadeShape::Triangular),
            'E' | '{' | '}' => Some(FadeShape::Exponential),
            'L' => Some(FadeShape::Logarithmic),
            'H' | '(' | ')' => Some(FadeShape::RaisedSine),
            'Q' => Some(FadeShape::QuarterSine),
            'p' => Some(FadeShape::Parabola),
            'P' => Some(FadeShape::InvertedParabola),
            _ => None,
        }
    }

    /// Maps a normalised index `i ∈ [0,1]` to a gain in `[0,1]`.
    pub fn gain(self, i: f64) -> f64 {
        if !(0.0001..0.9999).contains(&i) {
            return i;
        }
        match self {
            FadeShape::Triangular => i,
            FadeShape::Exponential => (-5.75646273248511 * (1.0 - i)).exp(),
            FadeShape::Logarithmic => 1.0 - (-5.75646273248511 * i).exp(),
            FadeShape::RaisedSine => (1.0 - (i * PI).cos()) / 2.0,
            FadeShape::QuarterSine => (i * PI / 2.0).sin(),
            FadeShape::Parabola => 1.0 - (1.0 - i).sqrt(),
            FadeShape::InvertedParabola => 1.0 - (1.0 - i) * (1.0 - i),
        }
    }
}

/// One operation in the mixer's op chain (§3, §4.5).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MixOp {
    Swap { dst: u16, src: u16 },
    Add { dst: u16, src: u16, vol: f32 },
    Volume { dst: MixTarget, vol: f32 },
    Limit { dst: MixTarget, vol: f32 },
    Upmix { dst: u16 },
    Downmix { dst: u16 },
    Killmix { dst: u16 },
    Fade {
        dst: MixTarget,
        vol_start: f32,
        vol_end: f32,
        shape: FadeShape,
        time_pre: u64,
        time_start: u64,
        time_end: u64,
        time_post: u64,
    },
}

impl MixOp {
    fn is_fade(&self) -> bool {
        matches!(self, MixOp::Fade { .. })
    }

    /// Whether this fade op overlaps the sample range `[pos, pos + count)`.
    fn fade_overlaps(&self, pos: u64, count: u64) -> bool {
        match *self {
            MixOp::Fade { time_pre, time_post, .. } => pos < time_post && pos + count > time_pre,
            _ => false,
        }
    }
}

/// Float mixbuf plus an ordered op chain (§3, §4.5).
pub struct Mixer {
    input_channels: u16,
    output_channels: u16,
    mixing_channels: u16,
    active: bool,
    ops: SmallVec<[MixOp; 16]>,
    has_fade: bool,
    has_non_fade: bool,
    work_buf: Vec<f64>,
    max_samples: usize,
    pos: u64,
    forced_format: Option<crate::sample::SampleFormat>,
}

impl Mixer {
    pub fn new(input_channels: u16) -> Self {
        Mixer {
            input_channels,
            output_channels: input_channels,
            mixing_channels: input_channels,
            active: false,
            ops: SmallVec::new(),
            has_fade: false,
            has_non_fade: false,
            work_buf: Vec::new(),
            max_samples: 0,
            pos: 0,
            forced_format: None,
        }
    }

    pub fn output_channels(&self) -> u16 {
        self.output_channels
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_forced_format(&mut self, format: Option<crate::sample::SampleFormat>) {
        self.forced_format = format;
    }

    /// Appends an op to the chain while the mixer is inactive. Ops that are nonsensical (dst ==
    /// src on a swap, a no-op unity volume, an out-of-bounds channel index given the channel
    /// count simulated so far) are silently ignored, per §4.5. Returns `true` if the op was
    /// accepted.
    pub fn push(&mut self, op: MixOp) -> bool {
        assert!(!self.active, "cannot push a mix op after the chain has been activated");
        if self.ops.len() >= MAX_MIX_OPS {
            return false;
        }

        let current_channels = self.output_channels;

        let valid = match op {
            MixOp::Swap { dst, src } => dst != src && dst < current_channels && src < current_channels,
            MixOp::Add { dst, src, .. } => dst != src && dst < current_channels && src < current_channels,
            MixOp::Volume { dst, vol } => vol != 1.0 && Self::target_in_bounds(dst, current_channels),
            MixOp::Limit { dst, .. } => Self::target_in_bounds(dst, current_channels),
            MixOp::Upmix { dst } => dst <= current_channels,
            MixOp::Downmix { dst } => dst < current_channels && current_channels > 1,
            MixOp::Killmix { dst } => dst < current_channels,
            MixOp::Fade { dst, time_pre, time_start, time_end, time_post, .. } => {
                Self::target_in_bounds(dst, current_channels)
                    && time_pre <= time_start
                    && time_start <= time_end
                    && time_end <= time_post
            }
        };

        if !valid {
            return false;
        }

        match op {
            MixOp::Upmix { .. } => self.output_channels += 1,
            MixOp::Downmix { dst } => self.output_channels = dst,
            MixOp::Killmix { dst } => self.output_channels = dst,
            _ => {}
        }

        if op.is_fade() {
            self.has_fade = true;
        } else {
            self.has_non_fade = true;
        }

        self.mixing_channels = self.mixing_channels.max(self.output_channels);
        self.ops.push(op);
        true
    }

    fn target_in_bounds(target: MixTarget, channels: u16) -> bool {
        match target {
            MixTarget::All => true,
            MixTarget::One(ch) => ch < channels,
        }
    }

    /// Freezes the op chain and allocates the float work buffer. Idempotent.
    pub fn setup(&mut self, max_samples: usize) {
        if self.active {
            return;
        }
        self.active = true;
        self.max_samples = max_samples;
        self.mixing_channels = self.mixing_channels.max(self.input_channels).max(self.output_channels);
        self.work_buf = vec![0.0; max_samples * self.mixing_channels as usize];
    }

    /// Activates the mixer (if not already) and grows the work buffer if `samples` exceeds the
    /// capacity it was last sized for. Callers render buffers of varying size across calls; the
    /// teacher's one-shot `setup` assumes a known max up front, which a streaming caller rarely
    /// has, so this is the streaming-friendly entry point `Stream::render` actually uses.
    pub fn ensure_capacity(&mut self, samples: usize) {
        if !self.active {
            self.setup(samples);
            return;
        }
        if samples > self.max_samples {
            self.max_samples = samples;
            self.work_buf = vec![0.0; self.max_samples * self.mixing_channels as usize];
        }
    }

    /// Processes `count` frames of `buf` (which holds `input_channels` channels) in place,
    /// growing/shrinking effective channel count as ops dictate, and reports the final channel
    /// count written. `buf` must have been produced with at least `self.output_channels`
    /// capacity per frame if the chain contains an Upmix.
    pub fn process(&mut self, buf: &mut SampleBuf, count: usize) -> u16 {
        if !self.active {
            return self.input_channels;
        }

        if self.has_fade && !self.has_non_fade {
            let overlaps = self.ops.iter().any(|op| op.fade_overlaps(self.pos, count as u64));
            if !overlaps {
                self.pos += count as u64;
                return self.output_channels;
            }
        }

        let mixing = self.mixing_channels as usize;
        self.work_buf[..count * mixing].fill(0.0);
        for frame in 0..count {
            for ch in 0..self.input_channels as usize {
                self.work_buf[frame * mixing + ch] = buf.sample_scaled(frame, ch);
            }
        }

        let mut current_channels = self.input_channels as usize;

        for op in self.ops.clone().iter() {
            self.apply_op(op, count, mixing, &mut current_channels);
        }

        for frame in 0..count {
            for ch in 0..current_channels {
                buf.set_sample_scaled(frame, ch, self.work_buf[frame * mixing + ch]);
            }
        }

        self.pos += count as u64;
        current_channels as u16
    }

    fn apply_op(&mut self, op: &MixOp, count: usize, mixing: usize, current_channels: &mut usize) {
        match *op {
            MixOp::Swap { dst, src } => {
                let (dst, src) = (dst as usize, src as usize);
                for frame in 0..count {
                    self.work_buf.swap(frame * mixing + dst, frame * mixing + src);
                }
            }
            MixOp::Add { dst, src, vol } => {
                let (dst, src) = (dst as usize, src as usize);
                for frame in 0..count {
                    let add = self.work_buf[frame * mixing + src] * vol as f64;
                    self.work_buf[frame * mixing + dst] += add;
                }
            }
            MixOp::Volume { dst, vol } => {
                self.for_each_target(dst, *current_channels, count, mixing, |s| s * vol as f64)
            }
            MixOp::Limit { dst, vol } => {
                let limit = vol as f64;
                self.for_each_target(dst, *current_channels, count, mixing, move |s| {
                    s.clamp(-limit, limit)
                })
            }
            MixOp::Upmix { dst } => {
                let dst = dst as usize;
                for frame in (0..count).rev() {
                    for ch in (dst..*current_channels).rev() {
                        self.work_buf[frame * mixing + ch + 1] = self.work_buf[frame * mixing + ch];
                    }
                    self.work_buf[frame * mixing + dst] = 0.0;
                }
                *current_channels += 1;
            }
            MixOp::Downmix { dst } => {
                let dst = dst as usize;
                for frame in 0..count {
                    for ch in dst..*current_channels - 1 {
                        self.work_buf[frame * mixing + ch] = self.work_buf[frame * mixing + ch + 1];
                    }
                }
                *current_channels -= 1;
            }
            MixOp::Killmix { dst } => {
                *current_channels = dst as usize;
            }
            MixOp::Fade { dst, vol_start, vol_end, shape, time_pre, time_start, time_end, time_post } => {
                for frame in 0..count {
                    let cur = self.pos + frame as u64;
                    let gain = if cur < time_pre || cur >= time_post {
                        continue;
                    } else if cur < time_start {
                        vol_start as f64
                    } else if cur >= time_end {
                        vol_end as f64
                    } else {
                        let fading_in = vol_start < vol_end;
                        let span = (time_end - time_start).max(1) as f64;
                        let i = if fading_in {
                            (cur - time_start) as f64 / span
                        } else {
                            (time_end - cur) as f64 / span
                        };
                        let g = shape.gain(i);
                        if fading_in {
                            vol_start as f64 + (vol_end as f64 - vol_start as f64) * g
                        } else {
                            vol_end as f64 + (vol_start as f64 - vol_end as f64) * g
                        }
                    };
                    self.scale_target_frame(dst, frame, mixing, gain);
                }
            }
        }
    }

    fn for_each_target(
        &mut self,
        dst: MixTarget,
        current_channels: usize,
        count: usize,
        mixing: usize,
        f: impl Fn(f64) -> f64,
    ) {
        match dst {
            MixTarget::All => {
                for frame in 0..count {
                    for ch in 0..current_channels {
                        let v = self.work_buf[frame * mixing + ch];
                        self.work_buf[frame * mixing + ch] = f(v);
                    }
                }
            }
            MixTarget::One(ch) => {
                let ch = ch as usize;
                for frame in 0..count {
                    let v = self.work_buf[frame * mixing + ch];
                    self.work_buf[frame * mixing + ch] = f(v);
                }
            }
        }
    }

    fn scale_target_frame(&mut self, dst: MixTarget, frame: usize, mixing: usize, gain: f64) {
        match dst {
            MixTarget::All => {
                for ch in 0..self.mixing_channels as usize {
                    self.work_buf[frame * mixing + ch] *= gain;
                }
            }
            MixTarget::One(ch) => {
                self.work_buf[frame * mixing + ch as usize] *= gain;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_rejects_self_swap() {
        let mut m = Mixer::new(2);
        assert!(!m.push(MixOp::Swap { dst: 0, src: 0 }));
    }

    #[test]
    fn push_rejects_unity_volume() {
        let mut m = Mixer::new(2);
        assert!(!m.push(MixOp::Volume { dst: MixTarget::All, vol: 1.0 }));
    }

    #[test]
    fn upmix_then_volume_grows_channels() {
        let mut m = Mixer::new(1);
        assert!(m.push(MixOp::Upmix { dst: 0 }));
        assert!(m.push(MixOp::Volume { dst: MixTarget::One(0), vol: 0.5 }));
        assert_eq!(m.output_channels(), 2);
    }

    #[test]
    fn fade_gain_shortcuts_at_extremes() {
        assert_eq!(FadeShape::Exponential.gain(0.0), 0.0);
        assert_eq!(FadeShape::Exponential.gain(1.0), 1.0);
    }

    #[test]
    fn fade_shape_alias_parsing() {
        assert_eq!(FadeShape::parse('{'), Some(FadeShape::Exponential));
        assert_eq!(FadeShape::parse('('), Some(FadeShape::RaisedSine));
    }

    #[test]
    fn op_chain_hard_cap() {
        let mut m = Mixer::new(8);
        let mut accepted = 0;
        for _ in 0..(MAX_MIX_OPS + 10) {
            if m.push(MixOp::Volume { dst: MixTarget::One(0), vol: 0.9 }) {
                accepted += 1;
            }
        }
        assert!(accepted <= MAX_MIX_OPS);
    }
}
