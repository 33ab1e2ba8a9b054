//! Static loader scripts and deployment README for the bundle.
//!
//! Both script variants stop on the first failed `docker load`; a bundle
//! that half-loads and still reports success is not deployable.

use std::path::Path;

use crate::error::{FreightError, Result};

const LOAD_SCRIPT_SH: &str = r#"#!/bin/bash
set -e

echo "Loading Docker images..."

# Load all images from the images directory
for image in images/*.tar; do
    if [ -f "$image" ]; then
        echo "Loading $image..."
        docker load -i "$image"
    fi
done

echo "All images loaded successfully!"
echo "You can now run: docker-compose up -d"
"#;

const LOAD_SCRIPT_BAT: &str = r#"@echo off
echo Loading Docker images...

for %%f in (images\*.tar) do (
    echo Loading %%f...
    docker load -i "%%f"
    if errorlevel 1 exit /b 1
)

echo All images loaded successfully!
echo You can now run: docker-compose up -d
"#;

const README: &str = r#"# Docker Compose Bundle

This bundle contains a Docker Compose stack with all required images for offline deployment.

## Contents

- docker-compose.yml - The Docker Compose configuration
- images/ - Directory containing all Docker images as tar files
- load-images.sh - Script to load all images (Linux/Mac)
- load-images.bat - Script to load all images (Windows)

## Usage

1. Extract this bundle to your desired location
2. Load the Docker images:
   - On Linux/Mac: ./load-images.sh
   - On Windows: load-images.bat
3. Start the stack: docker-compose up -d

## Requirements

- Docker Engine installed
- Docker Compose installed

Note: No internet connection is required after extracting this bundle.
"#;

/// Write `load-images.sh` and `load-images.bat` into the staging directory.
pub fn write_loader_scripts(dir: &Path) -> Result<()> {
    let sh_path = dir.join("load-images.sh");
    std::fs::write(&sh_path, LOAD_SCRIPT_SH).map_err(|e| FreightError::io(&sh_path, e))?;
    make_executable(&sh_path)?;

    let bat_path = dir.join("load-images.bat");
    std::fs::write(&bat_path, LOAD_SCRIPT_BAT).map_err(|e| FreightError::io(&bat_path, e))?;
    make_executable(&bat_path)?;

    Ok(())
}

/// Write the deployment README into the staging directory.
pub fn write_readme(dir: &Path) -> Result<()> {
    let path = dir.join("README.md");
    std::fs::write(&path, README).map_err(|e| FreightError::io(&path, e))
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .map_err(|e| FreightError::io(path, e))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
