// SPDX-License-Identifier: GPL-3.0-or-later

//! Input-file header validation, per §6/§4.11.
//!
//! The original header is a mapping anchor (`addr`/`end` self-reference,
//! used to validate that the file remapped at its original virtual
//! address) followed by the `"[archi]"` magic and two internal pointers.
//! This crate's surface format is textual (see [`crate::surface`]), which
//! carries no internal pointers to remap — there is nothing for an
//! `addr`/`end` check to validate, so the header shrinks to the magic
//! alone. See the workspace `DESIGN.md` for the recorded Open Question
//! resolution.

use crate::LoaderError;

/// The magic byte sequence every input file must begin with.
pub const MAGIC: &[u8; 8] = b"[archi]\0";

/// Strip and validate the magic prefix, returning the remaining bytes
/// (the surface JSON body).
///
/// # Errors
/// [`LoaderError::Truncated`] if `bytes` is shorter than [`MAGIC`];
/// [`LoaderError::BadMagic`] if the prefix doesn't match.
pub fn split_header(bytes: &[u8]) -> Result<&[u8], LoaderError> {
    if bytes.len() < MAGIC.len() {
        return Err(LoaderError::Truncated);
    }
    if &bytes[..MAGIC.len()] != MAGIC {
        return Err(LoaderError::BadMagic);
    }
    Ok(&bytes[MAGIC.len()..])
}
