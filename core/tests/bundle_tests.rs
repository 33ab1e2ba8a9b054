//! End-to-end bundling tests against a fake container engine.
//!
//! The fake records every engine call and can be told to fail specific
//! operations, pinning the pipeline's ordering, deduplication, and
//! cleanup contracts without a live engine.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use tempfile::TempDir;

use freight_core::compose::{BuildSpec, ComposeParser};
use freight_core::engine::{BuildRequest, ContainerEngine};
use freight_core::error::{FreightError, Result};
use freight_core::Bundler;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Build(String),
    Pull(String),
    Save(String),
    Remove(String),
}

#[derive(Default)]
struct FakeEngine {
    calls: Mutex<Vec<Call>>,
    /// Images the fake daemon considers present; pulls add to it
    local_images: Mutex<BTreeSet<String>>,
    fail_pulls: BTreeSet<String>,
    fail_builds: bool,
    fail_removes: bool,
}

impl FakeEngine {
    fn with_local_image(self, reference: &str) -> Self {
        self.local_images
            .lock()
            .unwrap()
            .insert(reference.to_string());
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ContainerEngine for &FakeEngine {
    async fn build_image(&self, request: &BuildRequest) -> Result<()> {
        self.record(Call::Build(request.tag.clone()));
        if self.fail_builds {
            return Err(FreightError::Build {
                image: request.tag.clone(),
                reason: "executor failed: exit status 1".to_string(),
            });
        }
        self.local_images
            .lock()
            .unwrap()
            .insert(request.tag.clone());
        Ok(())
    }

    async fn pull_image(&self, reference: &str) -> Result<()> {
        self.record(Call::Pull(reference.to_string()));
        if self.fail_pulls.contains(reference) {
            return Err(FreightError::Pull {
                image: reference.to_string(),
                reason: "manifest unknown".to_string(),
            });
        }
        self.local_images
            .lock()
            .unwrap()
            .insert(reference.to_string());
        Ok(())
    }

    async fn image_exists(&self, reference: &str) -> Result<bool> {
        Ok(self.local_images.lock().unwrap().contains(reference))
    }

    async fn save_image(&self, reference: &str, dest: &Path) -> Result<()> {
        self.record(Call::Save(reference.to_string()));
        std::fs::write(dest, b"fake image tar").map_err(|e| FreightError::Save {
            image: reference.to_string(),
            reason: e.to_string(),
        })
    }

    async fn remove_image(&self, reference: &str) -> Result<()> {
        self.record(Call::Remove(reference.to_string()));
        if self.fail_removes {
            return Err(FreightError::Remove {
                image: reference.to_string(),
                reason: "image is in use".to_string(),
            });
        }
        Ok(())
    }
}

const MANIFEST: &str = r#"
version: "3.8"
x-bundle:
  name: demo
  version: 1.0.0
services:
  web:
    build: ./web
    ports:
      - "8080:80"
  cache:
    image: redis:7-alpine
"#;

/// Write a manifest (and a build context for `./web`) into a temp dir.
fn stage_manifest(content: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("docker-compose.yml");
    std::fs::write(&path, content).unwrap();
    std::fs::create_dir_all(dir.path().join("web")).unwrap();
    std::fs::write(dir.path().join("web").join("Dockerfile"), "FROM scratch\n").unwrap();
    (dir, path)
}

fn archive_entry_names(archive_path: &Path) -> Vec<String> {
    let file = std::fs::File::open(archive_path).unwrap();
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    archive
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
        .collect()
}

fn archive_entry_string(archive_path: &Path, name: &str) -> String {
    use std::io::Read;

    let file = std::fs::File::open(archive_path).unwrap();
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        if entry.path().unwrap() == Path::new(name) {
            let mut content = String::new();
            entry.read_to_string(&mut content).unwrap();
            return content;
        }
    }
    panic!("entry {name} not found in {}", archive_path.display());
}

#[tokio::test]
async fn bundle_resolves_build_and_pull() {
    let (dir, manifest) = stage_manifest(MANIFEST);
    let output = dir.path().join("bundle.tar.gz");

    let engine = FakeEngine::default();
    let mut bundler = Bundler::new(&engine);
    bundler.bundle(&manifest, &output).await.unwrap();

    let calls = engine.calls();
    assert!(calls.contains(&Call::Build("bundles/demo/web:1.0.0".to_string())));
    assert!(calls.contains(&Call::Pull("redis:7-alpine".to_string())));
    assert!(calls.contains(&Call::Save("bundles/demo/web:1.0.0".to_string())));
    assert!(calls.contains(&Call::Save("redis:7-alpine".to_string())));
}

#[tokio::test]
async fn bundle_archive_layout() {
    let (dir, manifest) = stage_manifest(MANIFEST);
    let output = dir.path().join("bundle.tar.gz");

    let engine = FakeEngine::default();
    Bundler::new(&engine).bundle(&manifest, &output).await.unwrap();

    let names = archive_entry_names(&output);
    for expected in [
        "docker-compose.yml",
        "load-images.sh",
        "load-images.bat",
        "README.md",
        "images/bundles-demo-web-1.0.0.tar",
        "images/redis-7-alpine.tar",
    ] {
        assert!(names.contains(&expected.to_string()), "missing {expected}: {names:?}");
    }

    // Exactly one tar per resolved image, forward slashes everywhere
    assert_eq!(names.iter().filter(|n| n.ends_with(".tar")).count(), 2);
    assert!(!names.iter().any(|n| n.contains('\\')));
}

#[tokio::test]
async fn bundle_rewrites_manifest() {
    let (dir, manifest) = stage_manifest(MANIFEST);
    let output = dir.path().join("bundle.tar.gz");

    let engine = FakeEngine::default();
    Bundler::new(&engine).bundle(&manifest, &output).await.unwrap();

    let rewritten = archive_entry_string(&output, "docker-compose.yml");
    let compose = ComposeParser::parse(&rewritten).unwrap();

    let web = &compose.services["web"];
    assert_eq!(web.image.as_deref(), Some("bundles/demo/web:1.0.0"));
    assert!(web.build.is_none());
    // Untouched fields survive the rewrite
    assert_eq!(web.ports.as_deref(), Some(&["8080:80".to_string()][..]));

    let cache = &compose.services["cache"];
    assert_eq!(cache.image.as_deref(), Some("redis:7-alpine"));
}

#[tokio::test]
async fn build_takes_precedence_over_image() {
    let manifest = r#"
x-bundle: {name: demo, version: 1.0.0}
services:
  web:
    image: stale/web:latest
    build: ./web
"#;
    let (dir, manifest) = stage_manifest(manifest);
    let output = dir.path().join("bundle.tar.gz");

    let engine = FakeEngine::default();
    Bundler::new(&engine).bundle(&manifest, &output).await.unwrap();

    let calls = engine.calls();
    assert!(calls.contains(&Call::Build("bundles/demo/web:1.0.0".to_string())));
    assert!(!calls.iter().any(|c| matches!(c, Call::Pull(_))));

    let rewritten = archive_entry_string(&output, "docker-compose.yml");
    let compose = ComposeParser::parse(&rewritten).unwrap();
    assert_eq!(
        compose.services["web"].image.as_deref(),
        Some("bundles/demo/web:1.0.0")
    );
}

#[tokio::test]
async fn services_resolving_to_same_image_export_once() {
    let manifest = r#"
x-bundle: {name: demo, version: 1.0.0}
services:
  cache-a:
    image: redis:7-alpine
  cache-b:
    image: redis:7-alpine
"#;
    let (dir, manifest) = stage_manifest(manifest);
    let output = dir.path().join("bundle.tar.gz");

    let engine = FakeEngine::default();
    Bundler::new(&engine).bundle(&manifest, &output).await.unwrap();

    let calls = engine.calls();
    // First service pulls; the second sees the image locally
    assert_eq!(
        calls.iter().filter(|c| matches!(c, Call::Pull(_))).count(),
        1
    );
    assert_eq!(
        calls.iter().filter(|c| matches!(c, Call::Save(_))).count(),
        1
    );

    let names = archive_entry_names(&output);
    assert_eq!(names.iter().filter(|n| n.ends_with(".tar")).count(), 1);
}

#[tokio::test]
async fn manifest_without_images_still_bundles() {
    let manifest = r#"
x-bundle: {name: demo, version: 1.0.0}
services:
  init:
    environment:
      - SEED=1
"#;
    let (dir, manifest) = stage_manifest(manifest);
    let output = dir.path().join("bundle.tar.gz");

    let engine = FakeEngine::default();
    Bundler::new(&engine).bundle(&manifest, &output).await.unwrap();

    assert!(engine.calls().is_empty());

    let names = archive_entry_names(&output);
    assert!(names.iter().any(|n| n == "images" || n == "images/"));
    assert!(!names.iter().any(|n| n.ends_with(".tar")));
    assert!(names.contains(&"docker-compose.yml".to_string()));
}

#[tokio::test]
async fn locally_present_image_is_not_pulled_or_cleaned() {
    let (dir, manifest) = stage_manifest(MANIFEST);
    let output = dir.path().join("bundle.tar.gz");

    let engine = FakeEngine::default().with_local_image("redis:7-alpine");
    Bundler::new(&engine).bundle(&manifest, &output).await.unwrap();

    let calls = engine.calls();
    assert!(!calls.iter().any(|c| matches!(c, Call::Pull(_))));
    // Still exported, but not removed afterwards
    assert!(calls.contains(&Call::Save("redis:7-alpine".to_string())));
    assert!(!calls.contains(&Call::Remove("redis:7-alpine".to_string())));
}

#[tokio::test]
async fn cleanup_removes_built_and_pulled_images() {
    let (dir, manifest) = stage_manifest(MANIFEST);
    let output = dir.path().join("bundle.tar.gz");

    let engine = FakeEngine::default();
    Bundler::new(&engine).bundle(&manifest, &output).await.unwrap();

    let removed: BTreeSet<String> = engine
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Remove(r) => Some(r),
            _ => None,
        })
        .collect();
    assert_eq!(
        removed,
        BTreeSet::from([
            "bundles/demo/web:1.0.0".to_string(),
            "redis:7-alpine".to_string(),
        ])
    );
}

#[tokio::test]
async fn cleanup_runs_after_archive_is_written() {
    let (dir, manifest) = stage_manifest(MANIFEST);
    let output = dir.path().join("bundle.tar.gz");

    let engine = FakeEngine::default();
    Bundler::new(&engine).bundle(&manifest, &output).await.unwrap();

    let calls = engine.calls();
    let last_save = calls
        .iter()
        .rposition(|c| matches!(c, Call::Save(_)))
        .unwrap();
    let first_remove = calls
        .iter()
        .position(|c| matches!(c, Call::Remove(_)))
        .unwrap();
    assert!(first_remove > last_save);
}

#[tokio::test]
async fn cleanup_failure_does_not_fail_bundle() {
    let (dir, manifest) = stage_manifest(MANIFEST);
    let output = dir.path().join("bundle.tar.gz");

    let engine = FakeEngine {
        fail_removes: true,
        ..Default::default()
    };
    Bundler::new(&engine).bundle(&manifest, &output).await.unwrap();

    assert!(output.exists());
    assert!(!archive_entry_names(&output).is_empty());
}

#[tokio::test]
async fn pull_error_aborts_without_output() {
    let (dir, manifest) = stage_manifest(MANIFEST);
    let output = dir.path().join("bundle.tar.gz");

    let engine = FakeEngine {
        fail_pulls: BTreeSet::from(["redis:7-alpine".to_string()]),
        ..Default::default()
    };
    let err = Bundler::new(&engine)
        .bundle(&manifest, &output)
        .await
        .unwrap_err();

    assert!(matches!(err, FreightError::Pull { .. }));
    assert!(!output.exists());
}

#[tokio::test]
async fn build_error_aborts_without_output() {
    let (dir, manifest) = stage_manifest(MANIFEST);
    let output = dir.path().join("bundle.tar.gz");

    let engine = FakeEngine {
        fail_builds: true,
        ..Default::default()
    };
    let err = Bundler::new(&engine)
        .bundle(&manifest, &output)
        .await
        .unwrap_err();

    assert!(matches!(err, FreightError::Build { .. }));
    assert!(!output.exists());
    assert!(!engine.calls().iter().any(|c| matches!(c, Call::Save(_))));
}

#[tokio::test]
async fn invalid_metadata_fails_before_any_engine_call() {
    for manifest in [
        "services: {web: {image: 'redis:7-alpine'}}",
        "x-bundle: {name: demo}\nservices: {web: {image: 'redis:7-alpine'}}",
        "x-bundle: {name: demo, version: '1.2'}\nservices: {web: {image: 'redis:7-alpine'}}",
    ] {
        let (dir, manifest) = stage_manifest(manifest);
        let output = dir.path().join("bundle.tar.gz");

        let engine = FakeEngine::default();
        let err = Bundler::new(&engine)
            .bundle(&manifest, &output)
            .await
            .unwrap_err();

        assert!(matches!(err, FreightError::Validation(_)));
        assert!(engine.calls().is_empty());
        assert!(!output.exists());
    }
}

#[tokio::test]
async fn build_context_resolves_relative_to_manifest_dir() {
    let (dir, manifest) = stage_manifest(MANIFEST);
    let output = dir.path().join("bundle.tar.gz");

    // Parse to confirm the fixture uses the bare-context build form
    let compose = ComposeParser::parse_file(&manifest).unwrap();
    match &compose.services["web"].build {
        Some(BuildSpec::Context(ctx)) => {
            let resolved = compose.services["web"]
                .build
                .as_ref()
                .unwrap()
                .context_dir(dir.path());
            assert!(resolved.ends_with("web"), "resolved {resolved:?} from {ctx}");
        }
        other => panic!("expected bare context, got {other:?}"),
    }

    let engine = FakeEngine::default();
    Bundler::new(&engine).bundle(&manifest, &output).await.unwrap();
}
