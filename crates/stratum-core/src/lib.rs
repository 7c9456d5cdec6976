//! # Stratum Core
//!
//! Core value types for the Stratum image transfer engine.
//!
//! This crate provides the foundational pieces shared by the registry and
//! resolver crates:
//!
//! - [`Digest`] - content identity value (`algorithm:hex`), computed with
//!   SHA-256 from in-memory bytes or streamed from a file
//! - [`signing`] - ephemeral Ed25519 keys and JWS-style manifest signatures
//!
//! ## Example
//!
//! ```rust
//! use stratum_core::Digest;
//!
//! let digest = Digest::sha256(b"layer content");
//! assert_eq!(digest.algorithm(), "sha256");
//!
//! // Canonical string form round-trips.
//! let parsed: Digest = digest.to_string().parse().unwrap();
//! assert_eq!(parsed, digest);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod digest;
pub mod signing;

pub use digest::{Digest, DigestParseError, Sha256Stream};
pub use signing::{EphemeralKey, ManifestSignature, SigningError};
