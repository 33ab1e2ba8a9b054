//! Docker engine client backed by bollard.
//!
//! Talks to the local engine control socket. Build and pull stream
//! progress frames; an error frame in either stream aborts the operation
//! with the engine-reported message.

use std::collections::HashMap;
use std::path::Path;

use bollard::errors::Error as BollardError;
use bollard::image::{BuildImageOptions, CreateImageOptions, RemoveImageOptions};
use bollard::Docker;
use futures::StreamExt;
use hyper::Body;
use tokio_stream::wrappers::ReceiverStream;

use async_trait::async_trait;
use tracing::debug;

use super::{BuildRequest, ContainerEngine};
use crate::archive::tar_directory_stream;
use crate::error::{FreightError, Result};

/// Engine client for a local Docker-compatible control socket.
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect using the client library's environment defaults.
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| FreightError::Engine(format!("failed to create Docker client: {e}")))?;
        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn build_image(&self, request: &BuildRequest) -> Result<()> {
        let options = BuildImageOptions {
            dockerfile: request.dockerfile.clone(),
            t: request.tag.clone(),
            rm: true,
            buildargs: request
                .build_args
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<HashMap<String, String>>(),
            ..Default::default()
        };

        // Producer task tars the context while the build call consumes it
        let (producer, rx) = tar_directory_stream(request.context_dir.clone());
        let body = Body::wrap_stream(ReceiverStream::new(rx));

        let mut stream = self.docker.build_image(options, None, Some(body));
        while let Some(frame) = stream.next().await {
            let info = frame.map_err(|e| FreightError::Build {
                image: request.tag.clone(),
                reason: e.to_string(),
            })?;
            if let Some(error) = info.error {
                return Err(FreightError::Build {
                    image: request.tag.clone(),
                    reason: error,
                });
            }
            if let Some(line) = info.stream {
                // Engine build log goes straight to stdout
                print!("{line}");
            }
        }

        match producer.await {
            Ok(result) => result?,
            Err(e) => {
                return Err(FreightError::Engine(format!(
                    "build context producer panicked: {e}"
                )))
            }
        }

        Ok(())
    }

    async fn pull_image(&self, reference: &str) -> Result<()> {
        let options = CreateImageOptions {
            from_image: reference.to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(frame) = stream.next().await {
            let info = frame.map_err(|e| FreightError::Pull {
                image: reference.to_string(),
                reason: e.to_string(),
            })?;
            if let Some(error) = info.error {
                return Err(FreightError::Pull {
                    image: reference.to_string(),
                    reason: error,
                });
            }
            if let Some(status) = info.status {
                debug!("pull {reference}: {status}");
            }
        }

        Ok(())
    }

    async fn image_exists(&self, reference: &str) -> Result<bool> {
        match self.docker.inspect_image(reference).await {
            Ok(_) => Ok(true),
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(FreightError::Engine(format!(
                "failed to inspect image {reference}: {e}"
            ))),
        }
    }

    async fn save_image(&self, reference: &str, dest: &Path) -> Result<()> {
        use tokio::io::AsyncWriteExt;

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| FreightError::Save {
                image: reference.to_string(),
                reason: format!("failed to create {}: {e}", dest.display()),
            })?;

        let mut stream = self.docker.export_image(reference);
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FreightError::Save {
                image: reference.to_string(),
                reason: e.to_string(),
            })?;
            file.write_all(&chunk)
                .await
                .map_err(|e| FreightError::Save {
                    image: reference.to_string(),
                    reason: e.to_string(),
                })?;
        }

        file.flush().await.map_err(|e| FreightError::Save {
            image: reference.to_string(),
            reason: e.to_string(),
        })?;

        Ok(())
    }

    async fn remove_image(&self, reference: &str) -> Result<()> {
        let options = RemoveImageOptions {
            force: false,
            noprune: false,
        };

        self.docker
            .remove_image(reference, Some(options), None)
            .await
            .map_err(|e| FreightError::Remove {
                image: reference.to_string(),
                reason: e.to_string(),
            })?;

        Ok(())
    }
}
