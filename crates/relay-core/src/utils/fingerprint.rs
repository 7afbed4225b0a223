//! Content fingerprints for request bodies.
//!
//! The relay treats two byte-identical request bodies as the same request with the same
//! response, so the fingerprint is a digest of the raw bytes with no JSON normalization.
//! Reordering object keys or changing whitespace produces a different fingerprint.

use sha3::{Digest, Sha3_256};
use std::io::{self, Read};

/// Length of a rendered fingerprint (32-byte digest as lowercase hex).
pub const FINGERPRINT_HEX_LEN: usize = 64;

const READ_CHUNK: usize = 8 * 1024;

/// Computes the fingerprint of an in-memory request body.
#[must_use]
pub fn fingerprint(body: &[u8]) -> String {
    hex::encode(Sha3_256::digest(body))
}

/// Computes the fingerprint of a body read from `reader`.
///
/// Produces the same value as [`fingerprint`] over the concatenated bytes.
///
/// # Errors
///
/// Returns the underlying I/O error if reading the body fails.
pub fn fingerprint_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha3_256::new();
    let mut buf = [0u8; READ_CHUNK];

    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }

    Ok(hex::encode(hasher.finalize()))
}
