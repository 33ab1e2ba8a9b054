//! # freight-core
//!
//! Compose bundling engine: reads a Docker Compose manifest, resolves each
//! service's image (building from a local context or pulling a remote
//! reference), saves the resolved images as tar archives, and packages
//! everything with a regenerated compose file, loader scripts, and a
//! README into one gzip-compressed tar archive for offline deployment.
//!
//! The container engine sits behind the [`engine::ContainerEngine`] trait;
//! the CLI wires in the Docker-socket implementation, tests inject a fake.

pub mod archive;
pub mod bundle;
pub mod compose;
pub mod engine;
pub mod error;

pub use bundle::{sanitize_filename, Bundler};
pub use compose::{ComposeFile, ComposeParser};
pub use engine::{BuildRequest, ContainerEngine, DockerEngine};
pub use error::{FreightError, Result};
