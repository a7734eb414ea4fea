// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The flat layout: repeatedly decodes with the full remaining samples as a single block.

use crate::codec::{Codec, CodecKind};
use crate::decode_state::{clamp_to_loop_boundary, do_loop, DecodeState};
use crate::errors::Result;
use crate::sbuf::SampleBuf;
use crate::stream::StreamState;

#[derive(Debug, Default, Clone, Copy)]
pub struct FlatLayout;

impl FlatLayout {
    pub fn render(
        &mut self,
        state: &mut StreamState,
        codec: &mut dyn Codec,
        decode: &mut DecodeState,
        dst: &mut SampleBuf,
    ) -> Result<usize> {
        let mut produced = 0;

        while dst.filled() < dst.capacity() {
            let room = dst.capacity() - dst.filled();

            if decode.sbuf.filled() == 0 {
                let want = clamp_to_loop_boundary(state, room.min(decode.sbuf.capacity()));
                if want == 0 {
                    break;
                }

                let decoded = match codec.kind() {
                    CodecKind::Frame => codec.decode_frame(state, &mut decode.sbuf),
                    CodecKind::Buf => codec.decode_buf(state, &mut decode.sbuf),
                };

                if let Err(err) = decoded {
                    log::warn!("flat layout: decode failed, silencing remainder: {}", err);
                    decode.sbuf.silence_rest();
                }

                if decode.sbuf.filled() == 0 {
                    break;
                }
            }

            let n = SampleBuf::get_copy_max(dst, &decode.sbuf).min(room);
            if n == 0 {
                break;
            }
            SampleBuf::copy_segments(dst, &mut decode.sbuf, n);
            produced += n;
            state.current_sample += n as u64;

            do_loop(state, Some(codec))?;
        }

        Ok(produced)
    }
}
