//! Libyear dependency-staleness metrics for Go modules
//!
//! Given a `go.mod` manifest, this crate resolves the latest release of every
//! declared dependency and derives three staleness metrics per dependency:
//!
//! - **libyear**: elapsed time (in fixed 365-day years) between the installed
//!   release and the latest release,
//! - **releases diff**: number of releases between installed and latest,
//! - **versions diff**: the highest-order semantic-version component delta.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Source    │────▶│   Resolve   │────▶│   Output    │
//! │ (manifest)  │     │ (pipeline)  │     │ (render)    │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                            │
//!                            ▼
//!                     ┌─────────────┐     ┌─────────────┐
//!                     │  Registry   │◀───▶│    Cache    │
//!                     │ (backends)  │     │ (publish t) │
//!                     └─────────────┘     └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`manifest`]: go.mod parsing into dependency records
//! - [`module`]: the dependency record and version helpers
//! - [`registry`]: version-information backends (GOPROXY, go list, deps.dev, git)
//! - [`cache`]: content-addressed publish-time cache with file persistence
//! - [`resolve`]: the resolution pipeline and metric calculators
//! - [`source`]: manifest acquisition (file, stdin, URL, package)
//! - [`output`]: table, CSV and JSON renderers
//! - [`config`]: explicit run configuration

pub mod cache;
pub mod config;
pub mod manifest;
pub mod module;
pub mod output;
pub mod registry;
pub mod resolve;
pub mod source;
