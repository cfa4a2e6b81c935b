//! Knobs controlling how strictly the rewriter and the expander treat
//! lookups that find nothing.
//!
//! The defaults reproduce the lenient behaviour (log and carry on); every
//! knob is also exposed as a CLI flag.

use crate::error::Error;
use crate::value::read_yaml;

use serde::Deserialize;
use std::path::Path;

/// What to do when a variant, dependency kind or language lookup misses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupPolicy {
    /// Log a warning and degrade silently.
    #[default]
    Ignore,
    /// Fail the entry.
    Error,
}

/// What to do when two writes land on the same path while rebuilding a
/// nested document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Last write wins; the collision is still reported.
    #[default]
    Overwrite,
    Error,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct RewriteOptions {
    pub collisions: CollisionPolicy,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct ExpandOptions {
    pub variants: LookupPolicy,
    pub dependencies: LookupPolicy,
    pub language: LookupPolicy,
}

/// Options file passed with `--config`; both sections are optional.
///
/// rewrite: { collisions: error }
/// expand:  { variants: error, dependencies: ignore, language: ignore }
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub rewrite: RewriteOptions,
    pub expand: ExpandOptions,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let node = read_yaml(path)?;
        serde_yaml::from_value(node).map_err(|source| Error::ConfigLoad {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn options_read_from_yaml() {
        let opts: ExpandOptions = serde_yaml::from_str("variants: error").unwrap();
        assert_eq!(opts.variants, LookupPolicy::Error);
        assert_eq!(opts.dependencies, LookupPolicy::Ignore);
        assert_eq!(opts.language, LookupPolicy::Ignore);
    }

    #[test]
    fn settings_sections_are_optional() {
        let s: Settings = serde_yaml::from_str("rewrite: { collisions: error }").unwrap();
        assert_eq!(s.rewrite.collisions, CollisionPolicy::Error);
        assert_eq!(s.expand.variants, LookupPolicy::Ignore);
    }
}
