//! Docker Compose manifest types.
//!
//! Models the subset of the compose format the bundler rewrites (service
//! image/build fields and bundle metadata) and carries everything else
//! through untouched: top-level sections as opaque YAML values, unknown
//! service fields via `#[serde(flatten)]`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Root structure of a docker-compose.yml file.
///
/// Services use a `BTreeMap` so iteration is sorted by service name,
/// keeping resolution order and bundle contents reproducible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeFile {
    /// Compose file format version (e.g., "3.8")
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// Services to be bundled
    #[serde(default)]
    pub services: BTreeMap<String, Service>,

    /// Named networks, passed through unmodified
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub networks: BTreeMap<String, serde_yaml::Value>,

    /// Named volumes, passed through unmodified
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub volumes: BTreeMap<String, serde_yaml::Value>,

    /// Configs, passed through unmodified
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub configs: BTreeMap<String, serde_yaml::Value>,

    /// Secrets, passed through unmodified
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub secrets: BTreeMap<String, serde_yaml::Value>,

    /// Bundle metadata under the `x-bundle` extension key
    #[serde(rename = "x-bundle", skip_serializing_if = "Option::is_none")]
    pub x_bundle: Option<BundleMeta>,
}

/// Bundle metadata carried in the manifest's `x-bundle` extension block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleMeta {
    /// Bundle name, used in synthetic image references
    #[serde(default)]
    pub name: String,

    /// Bundle version, must be valid semver
    #[serde(default)]
    pub version: String,
}

/// A service in a docker-compose file.
///
/// Only `image` and `build` are interpreted; the remaining modeled fields
/// exist so list-or-map shapes round-trip precisely, and anything else
/// lands in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Service {
    /// Container image reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Build specification (context string or detailed form)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSpec>,

    /// Environment variables, as a list or a map
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<ListOrMap>,

    /// Volume mounts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Vec<String>>,

    /// Port mappings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<String>>,

    /// Networks to connect to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub networks: Option<Vec<String>>,

    /// Service dependencies, as a list or a condition map
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<ListOrMap>,

    /// Override the default command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<StringOrList>,

    /// Override the default entrypoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<StringOrList>,

    /// Restart policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart: Option<String>,

    /// Any fields the bundler does not model, preserved round-trip
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Build specification: a bare context path or the detailed mapping form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BuildSpec {
    /// `build: ./dir`
    Context(String),
    /// `build: {context, dockerfile, args}`
    Detailed(BuildDetail),
}

/// Detailed build configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildDetail {
    /// Build context directory, relative to the manifest unless absolute
    #[serde(default)]
    pub context: String,

    /// Dockerfile name within the context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,

    /// Build arguments
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, String>,
}

impl BuildSpec {
    /// Resolve the build context directory against the manifest's directory.
    pub fn context_dir(&self, base_dir: &Path) -> PathBuf {
        let context = match self {
            BuildSpec::Context(path) => path.as_str(),
            BuildSpec::Detailed(detail) => detail.context.as_str(),
        };
        let context = Path::new(context);
        if context.is_absolute() {
            context.to_path_buf()
        } else {
            base_dir.join(context)
        }
    }

    /// Dockerfile name, defaulting to `Dockerfile`.
    pub fn dockerfile(&self) -> &str {
        match self {
            BuildSpec::Context(_) => "Dockerfile",
            BuildSpec::Detailed(detail) => {
                detail.dockerfile.as_deref().unwrap_or("Dockerfile")
            }
        }
    }

    /// Build arguments, empty for the bare-context form.
    pub fn args(&self) -> BTreeMap<String, String> {
        match self {
            BuildSpec::Context(_) => BTreeMap::new(),
            BuildSpec::Detailed(detail) => detail.args.clone(),
        }
    }
}

/// A field that may appear as a string list or a string-keyed map.
///
/// Map values stay opaque (`serde_yaml::Value`): environment values may be
/// numbers or nulls, and `depends_on` map entries carry condition objects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ListOrMap {
    /// `- KEY=value` form
    List(Vec<String>),
    /// `KEY: value` form
    Map(BTreeMap<String, serde_yaml::Value>),
}

/// A field that may appear as a single string or a string list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum StringOrList {
    /// `command: sh -c "..."`
    String(String),
    /// `command: ["sh", "-c", "..."]`
    List(Vec<String>),
}
