//! # Stratum Resolver
//!
//! Generic two-tier fallback fetch for per-(name, tag) configuration
//! resources. The specific resource at `{base}/{name}/{tag}/{file}` is tried
//! first; when it is absent the default at `{base}/default.{file}` is
//! fetched instead; when both are absent the resolution fails and no file is
//! written.
//!
//! This crate is independent of the registry transfer engine.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use stratum_resolver::TaggedResourceResolver;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), stratum_resolver::ResolveError> {
//!     let resolver = TaggedResourceResolver::new("https://settings.example.com")?;
//!     resolver
//!         .resolve_settings("ubuntu", "22.04", Path::new("/etc/stratum"))
//!         .await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod resolver;

pub use error::ResolveError;
pub use resolver::{ResourceRequest, TaggedResourceResolver};
