// crates/zkapp-crypto/src/lib.rs

//! Minimal crypto substrate for the zkApp transaction core.
//!
//! - [`Field`]: an opaque 32-byte stand-in for a native field element.
//! - [`hash_with_prefix`]: domain-separated hashing of field vectors, keyed by
//!   a protocol [`Prefix`].
//! - [`Blake3Transcript`]: absorb/challenge transcript used by the mock
//!   proving backend to MAC statements.
//!
//! ⚠️ **Security note:** the hash here is BLAKE3 over a versioned domain
//! separator. It models the protocol hash as a random oracle and is **not**
//! wire-compatible with any on-chain hash.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]

/// Field element newtype.
pub mod field;
/// Prefixed hashing and protocol prefixes.
pub mod hash;
/// Transcript trait and Blake3 implementation.
pub mod transcript;

pub use crate::field::Field;
pub use crate::hash::{empty_hash_with_prefix, hash_with_prefix, Prefix};
pub use crate::transcript::{Blake3Transcript, Transcript};
