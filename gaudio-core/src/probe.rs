// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The format-probe contract: the seam at which container parsing (out of scope for this crate,
//! see spec §1) hands off to the streaming decode engine.

use crate::codec::{init_codec_libraries, CodecRegistry};
use crate::errors::{unsupported_error, Result};
use crate::io::StreamSource;
use crate::stream::{Stream, StreamInit};

/// A container parser plug-in. Given a source and a codec registry to resolve codec tags
/// against, a probe either recognises the container and returns a fully initialised
/// [`StreamInit`], or declines so the next probe in line can try.
pub trait FormatProbe: Send + Sync {
    /// Human-readable name, surfaced via [`crate::stream::StreamInfo::meta_name`].
    fn name(&self) -> &'static str;

    /// Attempts to recognise and parse `source` as this probe's container format, resolving the
    /// codec tag it finds against `registry` and selecting subsong `subsong_index` (`0` for
    /// containers with only one playable stream). Returns `Unsupported` if the source is not
    /// this probe's format; any other error is a genuine parse failure for a container this
    /// probe does claim to own.
    fn probe(
        &self,
        source: Box<dyn StreamSource>,
        registry: &CodecRegistry,
        subsong_index: u32,
    ) -> Result<StreamInit>;
}

/// Tries each probe in `probes`, in order, returning the first successful match. A probe that
/// returns `Unsupported` is treated as "not my format" and the next is tried with a fresh clone
/// of `source`; any other error aborts the search immediately, matching the "parse-time errors
/// propagate and leave no handle" policy (spec.md §7).
pub fn open(
    source: Box<dyn StreamSource>,
    probes: &[&dyn FormatProbe],
    registry: &CodecRegistry,
    subsong_index: u32,
) -> Result<Stream> {
    init_codec_libraries();

    if probes.is_empty() {
        return unsupported_error("no format probes configured");
    }

    let mut current = source;
    for (i, probe) in probes.iter().enumerate() {
        let is_last = i + 1 == probes.len();
        // Every probe but the last gets a clone, so a decline leaves `current` intact for the
        // next one; the last probe gets the original handle rather than one more needless clone.
        let attempt: Box<dyn StreamSource> = if is_last { current } else { current.try_clone()? };

        match probe.probe(attempt, registry, subsong_index) {
            Ok(init) => return Ok(Stream::from_init(init)),
            Err(crate::errors::GaError::Unsupported(_)) if is_last => {
                return unsupported_error("no format probe recognised this source");
            }
            Err(crate::errors::GaError::Unsupported(_)) => continue,
            Err(err) => return Err(err),
        }
    }

    unreachable!("loop always returns on its last iteration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemorySource;

    struct AlwaysDeclines;
    impl FormatProbe for AlwaysDeclines {
        fn name(&self) -> &'static str {
            "always-declines"
        }
        fn probe(&self, _source: Box<dyn StreamSource>, _registry: &CodecRegistry, _subsong_index: u32) -> Result<StreamInit> {
            unsupported_error("never matches")
        }
    }

    #[test]
    fn open_with_no_matching_probe_is_unsupported() {
        let probes: [&dyn FormatProbe; 1] = [&AlwaysDeclines];
        let registry = CodecRegistry::new();
        let source = Box::new(MemorySource::new(vec![0; 16]));
        let err = open(source, &probes, &registry, 0).unwrap_err();
        assert!(matches!(err, crate::errors::GaError::Unsupported(_)));
    }

    #[test]
    fn open_with_no_probes_is_unsupported() {
        let registry = CodecRegistry::new();
        let source = Box::new(MemorySource::new(vec![0; 16]));
        let err = open(source, &[], &registry, 0).unwrap_err();
        assert!(matches!(err, crate::errors::GaError::Unsupported(_)));
    }
}
