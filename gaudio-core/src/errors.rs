// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::error::Error as StdError;
use std::fmt;
use std::result;

/// `SeekErrorKind` is a list of generic reasons why a seek may fail.
#[derive(Debug)]
pub enum SeekErrorKind {
    /// The stream is not seekable at all.
    Unseekable,
    /// The stream can only be seeked forward.
    ForwardOnly,
    /// The timestamp or sample position to seek to is out of range.
    OutOfRange,
    /// The layout child index is invalid.
    InvalidChild,
}

impl SeekErrorKind {
    fn as_str(&self) -> &'static str {
        match *self {
            SeekErrorKind::Unseekable => "stream is not seekable",
            SeekErrorKind::ForwardOnly => "stream can only be seeked forward",
            SeekErrorKind::OutOfRange => "requested seek position is out-of-range for stream",
            SeekErrorKind::InvalidChild => "invalid layout child index",
        }
    }
}

/// `GaError` is an enumeration of all possible errors reported by gaudio.
#[derive(Debug)]
pub enum GaError {
    /// An IO error occurred while reading or seeking the source.
    IoError(std::io::Error),
    /// The source contained malformed data and could not be parsed or decoded.
    Parse(&'static str),
    /// A codec plug-in could not be initialized with the given parameters.
    CodecInit(&'static str),
    /// A mid-stream decode error. Recoverable: callers never see this directly, it is converted
    /// to silence by the render pipeline (see [`crate::render`]).
    Decode(&'static str),
    /// The stream could not be seeked.
    SeekError(SeekErrorKind),
    /// An unsupported container or codec feature was encountered.
    Unsupported(&'static str),
    /// The public API was called out of order (e.g. `render` before `configure`).
    Misuse(&'static str),
}

impl fmt::Display for GaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            GaError::IoError(ref err) => write!(f, "io error: {}", err),
            GaError::Parse(msg) => write!(f, "malformed stream: {}", msg),
            GaError::CodecInit(msg) => write!(f, "codec initialization failed: {}", msg),
            GaError::Decode(msg) => write!(f, "decode error: {}", msg),
            GaError::SeekError(ref kind) => write!(f, "seek error: {}", kind.as_str()),
            GaError::Unsupported(feature) => write!(f, "unsupported feature: {}", feature),
            GaError::Misuse(msg) => write!(f, "api misuse: {}", msg),
        }
    }
}

impl StdError for GaError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self {
            GaError::IoError(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for GaError {
    fn from(err: std::io::Error) -> GaError {
        GaError::IoError(err)
    }
}

pub type Result<T> = result::Result<T, GaError>;

/// Convenience function to create a parse error.
pub fn parse_error<T>(desc: &'static str) -> Result<T> {
    Err(GaError::Parse(desc))
}

/// Convenience function to create a codec-initialization error.
pub fn codec_init_error<T>(desc: &'static str) -> Result<T> {
    Err(GaError::CodecInit(desc))
}

/// Convenience function to create a decode error.
pub fn decode_error<T>(desc: &'static str) -> Result<T> {
    Err(GaError::Decode(desc))
}

/// Convenience function to create a seek error.
pub fn seek_error<T>(kind: SeekErrorKind) -> Result<T> {
    Err(GaError::SeekError(kind))
}

/// Convenience function to create an unsupported-feature error.
pub fn unsupported_error<T>(feature: &'static str) -> Result<T> {
    Err(GaError::Unsupported(feature))
}

/// Convenience function to create an api-misuse error.
pub fn misuse_error<T>(desc: &'static str) -> Result<T> {
    Err(GaError::Misuse(desc))
}

/// Small integer error code surface for callers that want a stable, language-agnostic signal
/// rather than a `GaError`. Mirrors the codes enumerated in the external interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    Ok = 0,
    Generic = 1,
    BadConfig = 2,
    UnsupportedCodec = 3,
    UnsupportedFormat = 4,
    BadData = 5,
    IoError = 6,
}

impl From<&GaError> for ErrorCode {
    fn from(err: &GaError) -> Self {
        match err {
            GaError::IoError(_) => ErrorCode::IoError,
            GaError::Parse(_) | GaError::Decode(_) => ErrorCode::BadData,
            GaError::CodecInit(_) => ErrorCode::UnsupportedCodec,
            GaError::SeekError(_) => ErrorCode::Generic,
            GaError::Unsupported(_) => ErrorCode::UnsupportedFormat,
            GaError::Misuse(_) => ErrorCode::BadConfig,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_maps_io_error() {
        let err = GaError::IoError(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(ErrorCode::from(&err), ErrorCode::IoError);
    }

    #[test]
    fn error_code_maps_unsupported() {
        let err = GaError::Unsupported("xma");
        assert_eq!(ErrorCode::from(&err), ErrorCode::UnsupportedFormat);
    }

    #[test]
    fn display_includes_message() {
        let err = GaError::Decode("bad block header");
        assert!(err.to_string().contains("bad block header"));
    }
}
