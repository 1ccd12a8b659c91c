// SPDX-License-Identifier: GPL-3.0-or-later

//! # archi-loader
//!
//! The memory-mapped input file loader (component K): maps an input file
//! into memory, validates its header, and decodes its body into the
//! module-level [`archi_core::params::ParameterList`] and
//! [`archi_instr::instruction::InstructionList`] the host binary feeds to
//! the [`archi_context::Registry`] and [`archi_instr::Interpreter`].
//!
//! The original input file is a relocatable binary image: a header
//! followed by pointer-patched `archi_parameter_list_t`/instruction
//! structures, remapped in place at load time. Reproducing that raw
//! layout is out of scope here (§1's declared non-goal on binary
//! compatibility); this loader instead accepts a small textual surface
//! format carrying the same two top-level fields. See [`mod@surface`]
//! and the workspace `DESIGN.md` for the recorded Open Question
//! resolution.

pub mod header;
pub mod surface;

use std::path::Path;

use memmap2::Mmap;
use thiserror::Error;
use tracing::{debug, warn};

use archi_core::params::ParameterList;
use archi_core::status::Status;
use archi_instr::instruction::InstructionList;

/// Errors raised while loading an input file.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The file could not be opened.
    #[error("failed to open input file: {0}")]
    Open(#[source] std::io::Error),
    /// The file could not be memory-mapped.
    #[error("failed to map input file: {0}")]
    Map(#[source] std::io::Error),
    /// The file is shorter than the magic header.
    #[error("input file is shorter than the header")]
    Truncated,
    /// The file does not begin with the expected magic bytes.
    #[error("input file has an unrecognized magic")]
    BadMagic,
    /// The body is not a well-formed surface document.
    #[error("failed to parse input file body: {0}")]
    Malformed(#[source] serde_json::Error),
    /// A literal value in the surface document used an unsupported JSON shape.
    #[error("unsupported literal value: {0}")]
    UnsupportedValue(serde_json::Value),
}

impl From<LoaderError> for Status {
    fn from(err: LoaderError) -> Status {
        match err {
            LoaderError::Open(_) | LoaderError::Map(_) => Status::RESOURCE,
            LoaderError::Truncated | LoaderError::BadMagic | LoaderError::Malformed(_) | LoaderError::UnsupportedValue(_) => {
                Status::VALUE
            }
        }
    }
}

/// A memory-mapped input file, decoded into its module parameters and
/// its root instruction list.
///
/// The mapping itself is kept alive for the lifetime of this value even
/// though the decoded `params`/`instructions` no longer borrow from it
/// (see [`mod@surface`]'s literal-value convention) — mirroring the
/// original, whose decoded structures point directly into the mapped
/// image for as long as the process runs it.
pub struct InputFile {
    _mmap: Mmap,
    params: ParameterList,
    instructions: InstructionList,
}

impl InputFile {
    /// Open, map, and decode `path`.
    ///
    /// # Errors
    /// See [`LoaderError`]'s variants.
    pub fn open(path: impl AsRef<Path>) -> Result<InputFile, LoaderError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(LoaderError::Open)?;
        // SAFETY: the file is not expected to be concurrently truncated by
        // another process while this loader holds it open; the same
        // caveat the original accepts for its own mmap-based loading.
        let mmap = unsafe { Mmap::map(&file) }.map_err(LoaderError::Map)?;

        let body = header::split_header(&mmap)?;
        let surface: surface::FileSurface = serde_json::from_slice(body).map_err(LoaderError::Malformed)?;

        let params = surface::params_from_entries(&surface.params)?;
        let instructions = surface::instructions_from_entries(surface.instructions)?;

        debug!(
            path = %path.display(),
            params = params.len(),
            instructions = instructions.len(),
            "loaded input file"
        );
        if params.is_empty() && instructions.is_empty() {
            warn!(path = %path.display(), "input file carries neither params nor instructions");
        }

        Ok(InputFile { _mmap: mmap, params, instructions })
    }

    /// The file's module-level parameters.
    #[must_use]
    pub fn params(&self) -> &ParameterList {
        &self.params
    }

    /// The file's root instruction list.
    #[must_use]
    pub fn instructions(&self) -> &InstructionList {
        &self.instructions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct ScratchFile(std::path::PathBuf);

    impl ScratchFile {
        fn write(body: &[u8], with_magic: bool) -> ScratchFile {
            static COUNTER: AtomicU64 = AtomicU64::new(0);
            let id = COUNTER.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!("archi-loader-test-{}-{id}.input", std::process::id()));
            let mut file = std::fs::File::create(&path).unwrap();
            if with_magic {
                file.write_all(header::MAGIC).unwrap();
            }
            file.write_all(body).unwrap();
            ScratchFile(path)
        }

        fn path(&self) -> &std::path::Path {
            &self.0
        }
    }

    impl Drop for ScratchFile {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    #[test]
    fn opens_a_minimal_well_formed_file() {
        let file = ScratchFile::write(br#"{"params":[],"instructions":[]}"#, true);
        let input = InputFile::open(file.path()).unwrap();
        assert!(input.params().is_empty());
        assert!(input.instructions().is_empty());
    }

    #[test]
    fn opens_a_file_with_params_and_instructions() {
        let file = ScratchFile::write(
            br#"{"params":[{"name":"greeting","value":"hi"}],"instructions":[{"op":"noop"}]}"#,
            true,
        );
        let input = InputFile::open(file.path()).unwrap();
        assert_eq!(
            archi_context::scalar::pointer_as_str(input.params().get("greeting").unwrap()),
            Some("hi")
        );
        assert_eq!(input.instructions().len(), 1);
    }

    #[test]
    fn rejects_a_file_missing_the_magic() {
        let file = ScratchFile::write(b"not-archipelago-at-all", false);
        assert!(matches!(InputFile::open(file.path()), Err(LoaderError::BadMagic)));
    }

    #[test]
    fn rejects_a_malformed_body() {
        let file = ScratchFile::write(b"{not json", true);
        assert!(matches!(InputFile::open(file.path()), Err(LoaderError::Malformed(_))));
    }

    #[test]
    fn missing_file_is_an_open_error() {
        assert!(matches!(InputFile::open("/nonexistent/path/to/archi.input"), Err(LoaderError::Open(_))));
    }
}
