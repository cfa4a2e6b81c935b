//! Compiler descriptor: language tag -> command, variant -> flags.
//!
//! YAML shape (the `compiler:` wrapper is optional):
//! compiler:
//!   commands: { cc: mpicc, cxx: mpicxx, f90: mpif90 }
//!   variants:
//!     openmp: { args: -fopenmp }   # or simply: openmp: -fopenmp

use crate::error::Error;

use serde::Deserialize;
use serde::de::Deserializer;
use serde_yaml::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompilerDescriptor {
    #[serde(default)]
    pub commands: BTreeMap<String, String>,

    #[serde(default, deserialize_with = "deserialize_variants")]
    pub variants: BTreeMap<String, String>,
}

/// Variant entries as they appear in the descriptor.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum VariantSpec {
    Flags(String),
    Args { args: String },
}

impl CompilerDescriptor {
    pub fn from_value(node: &Value) -> Result<Self, Error> {
        let inner = node.get("compiler").unwrap_or(node);
        serde_yaml::from_value(inner.clone()).map_err(Error::InvalidCompiler)
    }

    pub fn supports(&self, language: &str) -> bool {
        self.commands.contains_key(language)
    }

    pub fn command(&self, language: &str) -> Option<&str> {
        self.commands.get(language).map(String::as_str)
    }
}

fn deserialize_variants<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, VariantSpec>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(name, spec)| match spec {
            VariantSpec::Flags(flags) | VariantSpec::Args { args: flags } => (name, flags),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn both_variant_shapes_load() {
        let node: Value = serde_yaml::from_str(
            r#"
compiler:
  commands: { cc: gcc, f90: gfortran }
  variants:
    openmp: { args: -fopenmp }
    debug: -g
"#,
        )
        .unwrap();
        let c = CompilerDescriptor::from_value(&node).unwrap();
        assert!(c.supports("f90"));
        assert!(!c.supports("cxx"));
        assert_eq!(c.command("cc"), Some("gcc"));
        assert_eq!(c.variants["openmp"], "-fopenmp");
        assert_eq!(c.variants["debug"], "-g");
    }

    #[test]
    fn wrapper_is_optional() {
        let node: Value = serde_yaml::from_str("commands: { cxx: clang++ }").unwrap();
        let c = CompilerDescriptor::from_value(&node).unwrap();
        assert_eq!(c.command("cxx"), Some("clang++"));
        assert!(c.variants.is_empty());
    }
}
