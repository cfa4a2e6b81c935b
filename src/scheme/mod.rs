//! Schema rewriter: rule table compilation, flatten/unflatten and the two
//! rewrite passes.
//!
//! This module never touches job expansion. It owns:
//! - CompiledRuleSet (patterns + destination templates)
//! - the flattened document view
//! - convert(), which migrates one document

pub mod compile;
pub mod flat;
pub mod rewrite;

pub use compile::CompiledRuleSet;
pub use rewrite::{Kind, RewriteReport, convert};

use crate::error::Error;
use crate::value::read_yaml;
use std::path::Path;

/// Rule table used when no `--scheme` is given.
pub const DEFAULT_SCHEME: &str = include_str!("../../schemes/default.yml");

/// Load and compile a rule table from a YAML or JSON file.
pub fn load_rules(path: &Path) -> Result<CompiledRuleSet, Error> {
    CompiledRuleSet::compile(&read_yaml(path)?)
}

/// Compile the bundled rule table.
pub fn default_rules() -> Result<CompiledRuleSet, Error> {
    let table = serde_yaml::from_str(DEFAULT_SCHEME).map_err(|source| Error::ConfigLoad {
        path: "<bundled scheme>".into(),
        source,
    })?;
    CompiledRuleSet::compile(&table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RewriteOptions;
    use pretty_assertions::assert_eq;
    use serde_yaml::Value;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn bundled_scheme_compiles() {
        let rules = default_rules().unwrap();
        assert!(!rules.modifiers.is_empty());
        assert!(!rules.terminal.is_empty());
    }

    #[test]
    fn bundled_scheme_migrates_compiler() {
        let old = yaml(
            r#"
cc: { program: mpicc, wrapper: true }
f90: { program: mpif90 }
variants:
  openmp: { args: -fopenmp }
package_manager:
  spack: openmpi@4
"#,
        );
        let (out, report) = convert(
            &old,
            Kind::Compiler,
            &default_rules().unwrap(),
            &RewriteOptions::default(),
        )
        .unwrap();
        assert_eq!(
            out,
            yaml(
                r#"
compiler:
  commands: { cc: mpicc, f90: mpif90 }
  variants: { openmp: { args: -fopenmp } }
  package_manager: { spack: openmpi@4 }
"#
            )
        );
        assert!(report.misses.is_empty());
        assert_eq!(report.dropped, vec!["compiler.cc.wrapper"]);
    }

    #[test]
    fn bundled_scheme_migrates_test_entries() {
        let old = yaml(
            r#"
hello:
  build:
    files: [hello.c]
    variants: [openmp]
    sources: { binary: hello }
    depends_on: { spack: [zlib] }
  run:
    program: ./hello
    iterate:
      n_proc: { values: [1, 2] }
    depends_on: { spack: cmake, test: [setup] }
"#,
        );
        let (out, report) = convert(
            &old,
            Kind::Te,
            &default_rules().unwrap(),
            &RewriteOptions::default(),
        )
        .unwrap();
        assert_eq!(
            out,
            yaml(
                r#"
te:
  hello:
    files: [hello.c]
    variants: [openmp]
    binary: hello
    depends_on: { spack: [zlib, cmake], test: [setup] }
    run:
      program: ./hello
      iterate: { n_proc: [1, 2] }
"#
            )
        );
        assert!(report.misses.is_empty());
    }
}
