//! Semantic-version validation for bundle metadata.

use std::sync::OnceLock;

use regex::Regex;

/// `MAJOR.MINOR.PATCH[-pre][+build]`, optional leading `v`.
const SEMVER_PATTERN: &str =
    r"^v?(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:-[\w.-]+)?(?:\+[\w.-]+)?$";

fn semver_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(SEMVER_PATTERN).expect("semver pattern is valid"))
}

/// Check whether a version string matches the semantic-version grammar.
pub fn is_valid_semver(version: &str) -> bool {
    semver_regex().is_match(version)
}
