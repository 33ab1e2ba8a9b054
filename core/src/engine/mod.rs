//! Container engine abstraction.
//!
//! The bundler only ever needs five engine capabilities; they live behind
//! a trait so tests inject a fake engine and the CLI injects the
//! Docker-socket implementation.

mod docker;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

pub use docker::DockerEngine;

use crate::error::Result;

/// Parameters for building one image from a local context.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Build context directory (already resolved against the manifest dir)
    pub context_dir: PathBuf,
    /// Dockerfile name within the context
    pub dockerfile: String,
    /// Tag to apply to the built image
    pub tag: String,
    /// Build arguments
    pub build_args: BTreeMap<String, String>,
}

/// The engine operations the bundling pipeline consumes.
///
/// All calls are made strictly sequentially, one at a time, in program
/// order.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Build an image from a local context, streaming build output.
    async fn build_image(&self, request: &BuildRequest) -> Result<()>;

    /// Pull an image from its registry.
    async fn pull_image(&self, reference: &str) -> Result<()>;

    /// Check whether an image is present locally.
    async fn image_exists(&self, reference: &str) -> Result<bool>;

    /// Export an image as a tar archive to `dest`.
    async fn save_image(&self, reference: &str, dest: &Path) -> Result<()>;

    /// Remove an image.
    async fn remove_image(&self, reference: &str) -> Result<()>;
}
