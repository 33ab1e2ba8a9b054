//! Compose manifest model: types, parsing, and bundle-metadata validation.

mod parser;
mod types;
mod version;

pub use parser::ComposeParser;
pub use types::{
    BuildDetail, BuildSpec, BundleMeta, ComposeFile, ListOrMap, Service, StringOrList,
};
pub use version::is_valid_semver;
