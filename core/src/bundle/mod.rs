//! Bundle orchestration pipeline.
//!
//! One `Bundler` run: parse and validate the manifest, resolve every
//! service to a concrete image reference (build or pull), export each
//! unique image, assemble the staging directory, emit the gzip tar
//! archive, then best-effort remove the images this run created.

mod scripts;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tempfile::TempDir;
use tracing::{info, warn};

use crate::archive::create_tar_gz;
use crate::compose::{BundleMeta, ComposeParser, Service};
use crate::engine::{BuildRequest, ContainerEngine};
use crate::error::{FreightError, Result};

/// Replace filesystem-hostile characters in an image reference.
///
/// Idempotent: sanitizing a sanitized name is a no-op.
pub fn sanitize_filename(reference: &str) -> String {
    reference
        .chars()
        .map(|c| match c {
            '/' | ':' | '\\' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c => c,
        })
        .collect()
}

/// Images touched during one run, drained by the cleanup phase.
#[derive(Debug, Default)]
struct RunState {
    /// References pulled because they were absent locally
    pulled: BTreeSet<String>,
    /// Synthetic references built and tagged by this run
    built: BTreeSet<String>,
}

/// Drives the bundling pipeline against an injected engine.
pub struct Bundler<E> {
    engine: E,
    state: RunState,
}

impl<E: ContainerEngine> Bundler<E> {
    /// Create a bundler over the given engine.
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            state: RunState::default(),
        }
    }

    /// Run the whole pipeline and write the bundle archive to `output_path`.
    ///
    /// Any error before the archive is written is fatal and leaves no
    /// partial bundle behind; the staging directory is released on every
    /// exit path. Cleanup failures after delivery are logged as warnings.
    pub async fn bundle(&mut self, compose_path: &Path, output_path: &Path) -> Result<()> {
        let mut compose = ComposeParser::parse_file(compose_path)?;
        let meta = ComposeParser::validate_bundle(&compose)?.clone();

        let base_dir = match compose_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };

        // Canonical reference -> tar filename; keying on the reference
        // deduplicates services that resolve to the same image
        let mut images: BTreeMap<String, String> = BTreeMap::new();
        for (name, service) in compose.services.iter_mut() {
            if let Some(reference) = self
                .resolve_service(name, service, base_dir, &meta)
                .await?
            {
                images
                    .entry(reference.clone())
                    .or_insert_with(|| format!("{}.tar", sanitize_filename(&reference)));
            }
        }

        // Staging directory, removed on drop whatever happens below
        let staging =
            TempDir::new().map_err(|e| FreightError::io(std::env::temp_dir(), e))?;

        let images_dir = staging.path().join("images");
        std::fs::create_dir_all(&images_dir).map_err(|e| FreightError::io(&images_dir, e))?;

        for (reference, tar_name) in &images {
            info!("Saving image {reference}...");
            self.engine
                .save_image(reference, &images_dir.join(tar_name))
                .await?;
        }

        let manifest = ComposeParser::serialize(&compose)?;
        let manifest_path = staging.path().join("docker-compose.yml");
        std::fs::write(&manifest_path, manifest)
            .map_err(|e| FreightError::io(&manifest_path, e))?;

        scripts::write_loader_scripts(staging.path())?;
        scripts::write_readme(staging.path())?;

        create_tar_gz(staging.path(), output_path)?;

        // Bundle delivered; nothing past this point may fail the run
        self.cleanup().await;

        Ok(())
    }

    /// Resolve one service to a concrete image reference.
    ///
    /// Build wins when both `build` and `image` are present; the build
    /// spec is replaced in place by the synthetic reference. Services with
    /// neither field yield `None` and are omitted from export.
    async fn resolve_service(
        &mut self,
        name: &str,
        service: &mut Service,
        base_dir: &Path,
        meta: &BundleMeta,
    ) -> Result<Option<String>> {
        if let Some(build) = service.build.clone() {
            let reference = format!("bundles/{}/{}:{}", meta.name, name, meta.version);
            let context_dir = build.context_dir(base_dir);
            info!("Building image {reference} from {}...", context_dir.display());

            let request = BuildRequest {
                context_dir,
                dockerfile: build.dockerfile().to_string(),
                tag: reference.clone(),
                build_args: build.args(),
            };
            self.engine.build_image(&request).await?;

            self.state.built.insert(reference.clone());
            service.build = None;
            service.image = Some(reference.clone());
            return Ok(Some(reference));
        }

        if let Some(reference) = service.image.clone() {
            if self.engine.image_exists(&reference).await? {
                info!("Image {reference} already exists locally");
            } else {
                info!("Pulling image {reference}...");
                self.engine.pull_image(&reference).await?;
                self.state.pulled.insert(reference.clone());
            }
            return Ok(Some(reference));
        }

        Ok(None)
    }

    /// Remove every image this run pulled or built, best-effort.
    async fn cleanup(&mut self) {
        let pulled = std::mem::take(&mut self.state.pulled);
        let built = std::mem::take(&mut self.state.built);

        for reference in pulled.iter().chain(built.iter()) {
            info!("Removing image {reference}...");
            if let Err(e) = self.engine.remove_image(reference).await {
                warn!("Failed to remove image {reference}: {e}");
            }
        }
    }
}
