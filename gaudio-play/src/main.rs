// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use clap::{App, Arg};
use log::{error, info};

use gaudio::core::io::{FileSource, MemorySource};
use gaudio::core::{MixOp, MixTarget, PlayConfig, SampleFormat, Stream, StreamSource};

fn main() {
    pretty_env_logger::init();

    let matches = App::new("gaudio-play")
        .version("0.1.0")
        .about("Decode a game-audio stream with gaudio")
        .arg(
            Arg::with_name("probe-only")
                .long("probe-only")
                .help("Only print stream information, do not decode")
                .conflicts_with_all(&["decode-only"]),
        )
        .arg(
            Arg::with_name("decode-only")
                .long("decode-only")
                .help("Decode the full stream but discard the samples")
                .conflicts_with_all(&["probe-only"]),
        )
        .arg(Arg::with_name("seek").long("seek").value_name("SAMPLE").help("Seek to the given sample position before decoding"))
        .arg(Arg::with_name("play-forever").long("play-forever").help("Ignore the natural end of stream; loop and fade never kick in"))
        .arg(Arg::with_name("ignore-loop").long("ignore-loop").help("Do not honor the stream's loop points"))
        .arg(Arg::with_name("loop-count").long("loop-count").value_name("N").help("Number of times to repeat the loop body (may be fractional)"))
        .arg(Arg::with_name("fade-time").long("fade-time").value_name("SECONDS").help("Fade-out duration in seconds"))
        .arg(Arg::with_name("pad-begin").long("pad-begin").value_name("SECONDS").help("Silence to prepend, in seconds"))
        .arg(Arg::with_name("trim-begin").long("trim-begin").value_name("SECONDS").help("Audio to discard from the start, in seconds"))
        .arg(Arg::with_name("pad-end").long("pad-end").value_name("SECONDS").help("Silence to append, in seconds"))
        .arg(Arg::with_name("volume").long("volume").value_name("SCALE").help("Scale every output channel by this factor, e.g. 0.5 for half volume"))
        .arg(Arg::with_name("wav").long("wav").help("Wrap the raw PCM output in a minimal WAV header"))
        .arg(Arg::with_name("output").long("output").short("o").value_name("PATH").help("Write decoded samples here instead of stdout"))
        .arg(Arg::with_name("verbose").short("v").multiple(true).help("Sets the level of verbosity"))
        .arg(Arg::with_name("INPUT").help("The input file path, or - to read from standard input").required(true).index(1))
        .get_matches();

    let path_str = matches.value_of("INPUT").unwrap();

    let source: Box<dyn StreamSource> = if path_str == "-" {
        let mut buf = Vec::new();
        if let Err(err) = io::stdin().read_to_end(&mut buf) {
            error!("failed to read standard input: {}", err);
            std::process::exit(1);
        }
        Box::new(MemorySource::new(buf))
    }
    else {
        match FileSource::open(Path::new(path_str)) {
            Ok(source) => Box::new(source),
            Err(err) => {
                error!("failed to open {}: {}", path_str, err);
                std::process::exit(1);
            }
        }
    };

    let registry = gaudio::default::get_codecs();
    let probes = gaudio::default::get_probes();

    let mut stream = match gaudio::core::probe::open(source, &probes, registry, 0) {
        Ok(stream) => stream,
        Err(err) => {
            error!("file not supported. reason? {}", err);
            std::process::exit(1);
        }
    };

    pretty_print_format(path_str, &stream);

    if matches.is_present("probe-only") {
        return;
    }

    if let Some(sample) = matches.value_of("seek").and_then(|v| v.parse::<u64>().ok()) {
        if let Err(err) = stream.seek(sample) {
            error!("seek failed: {}", err);
            std::process::exit(1);
        }
    }

    let mut config = PlayConfig::new();
    config.with_play_forever(matches.is_present("play-forever"));
    config.with_ignore_loop(matches.is_present("ignore-loop"));
    if let Some(n) = matches.value_of("loop-count").and_then(|v| v.parse::<f64>().ok()) {
        config.with_loop_count(n);
    }
    if let Some(s) = matches.value_of("fade-time").and_then(|v| v.parse::<f64>().ok()) {
        config.with_fade_time(s);
    }
    if let Some(s) = matches.value_of("pad-begin").and_then(|v| v.parse::<f64>().ok()) {
        config.with_pad_begin(gaudio::core::TimeSpan::Seconds(s));
    }
    if let Some(s) = matches.value_of("trim-begin").and_then(|v| v.parse::<f64>().ok()) {
        config.with_trim_begin(gaudio::core::TimeSpan::Seconds(s));
    }
    if let Some(s) = matches.value_of("pad-end").and_then(|v| v.parse::<f64>().ok()) {
        config.with_pad_end(gaudio::core::TimeSpan::Seconds(s));
    }
    if let Err(err) = stream.configure(config) {
        error!("configure failed: {}", err);
        std::process::exit(1);
    }

    if let Some(vol) = matches.value_of("volume").and_then(|v| v.parse::<f32>().ok()) {
        // Must be pushed before the mixer activates, i.e. before the first render/fill call below.
        stream.mixer_mut().push(MixOp::Volume { dst: MixTarget::All, vol });
    }

    if matches.is_present("decode-only") {
        match decode_and_count(&mut stream) {
            Ok(n) => info!("decoded {} samples", n),
            Err(err) => error!("decode error: {}", err),
        }
        return;
    }

    let channels = stream.output_channels();
    let want_wav = matches.is_present("wav");
    let out_path = matches.value_of("output");

    let result = match out_path {
        Some(path) => match File::create(path) {
            Ok(file) => render_to(&mut stream, file, channels, want_wav),
            Err(err) => {
                error!("failed to create {}: {}", path, err);
                std::process::exit(1);
            }
        },
        None => render_to(&mut stream, io::stdout(), channels, want_wav),
    };

    if let Err(err) = result {
        error!("{}", err);
        std::process::exit(1);
    }
}

/// Decodes and discards the entire (configured) stream, returning the sample count produced.
/// Used by `--decode-only` to exercise the decode path without writing anything.
fn decode_and_count(stream: &mut Stream) -> gaudio::core::Result<u64> {
    let mut total = 0u64;
    let mut scratch = gaudio::core::SampleBuf::new(SampleFormat::S16, stream.output_channels(), 4096);
    loop {
        scratch.set_filled(0);
        let got = stream.render(&mut scratch)?;
        if got == 0 {
            break;
        }
        total += got as u64;
    }
    Ok(total)
}

/// Renders the configured stream to `out` as interleaved signed 16-bit PCM, optionally preceded
/// by a minimal WAV header (size fields left as placeholders since `out` may be a non-seekable
/// stream such as stdout).
fn render_to<W: Write>(stream: &mut Stream, mut out: W, channels: u16, wav_header: bool) -> gaudio::core::Result<()> {
    let sample_rate = stream.state().sample_rate;
    if wav_header {
        write_wav_header(&mut out, channels, sample_rate).map_err(gaudio::core::GaError::from)?;
    }

    let mut scratch = gaudio::core::SampleBuf::new(SampleFormat::S16, channels, 4096);
    loop {
        scratch.set_filled(0);
        let got = stream.render(&mut scratch)?;
        if got == 0 {
            break;
        }
        out.write_all(scratch.filled_bytes()).map_err(gaudio::core::GaError::from)?;
    }
    out.flush().map_err(gaudio::core::GaError::from)?;
    Ok(())
}

/// Writes a canonical 44-byte `RIFF`/`WAVE` header for 16-bit PCM with the size fields set to
/// `0xffff_ffff` (the conventional placeholder for a streamed, unknown-length WAV).
fn write_wav_header<W: Write>(out: &mut W, channels: u16, sample_rate: u32) -> io::Result<()> {
    let block_align = channels * 2;
    let byte_rate = sample_rate * block_align as u32;

    out.write_all(b"RIFF")?;
    out.write_all(&0xffff_ffffu32.to_le_bytes())?;
    out.write_all(b"WAVE")?;
    out.write_all(b"fmt ")?;
    out.write_all(&16u32.to_le_bytes())?;
    out.write_all(&1u16.to_le_bytes())?;
    out.write_all(&channels.to_le_bytes())?;
    out.write_all(&sample_rate.to_le_bytes())?;
    out.write_all(&byte_rate.to_le_bytes())?;
    out.write_all(&block_align.to_le_bytes())?;
    out.write_all(&16u16.to_le_bytes())?;
    out.write_all(b"data")?;
    out.write_all(&0xffff_ffffu32.to_le_bytes())?;
    Ok(())
}

fn pretty_print_format(path: &str, stream: &Stream) {
    let info = stream.get_format();
    println!("+ {}", path);
    println!("|");
    println!("| Codec:           {} ({})", info.codec_name, info.layout_name);
    println!("| Container:       {}", info.meta_name);
    println!("| Sample Rate:     {}", info.sample_rate);
    println!("| Channels:        {}", info.channels);
    println!("| Total Samples:   {}", info.total_samples);
    println!("| Playback Samples:{}", info.play_samples);
    if info.loop_end > info.loop_start {
        println!("| Loop:            [{}, {})", info.loop_start, info.loop_end);
    }
    println!("-");
}
