//! Utility functions shared across the relay.
//!
//! ## Request Fingerprinting (`fingerprint`)
//! - SHA3-256 over the raw request body, hex encoded
//! - Used as the coalescing cache key for every route

pub mod fingerprint;

pub use fingerprint::{fingerprint, fingerprint_reader, FINGERPRINT_HEX_LEN};
