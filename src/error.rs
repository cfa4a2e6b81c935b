//! Typed error kinds shared by the rewriter and the job expander.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot read {}: {}", path.display(), source)]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse {}: {}", path.display(), source)]
    ConfigLoad {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("invalid rule table: {0}")]
    Configuration(String),

    #[error("type mismatch at {at}: expected {expected}, found {found}")]
    TypeMismatch {
        at: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid test entry '{name}': {source}")]
    InvalidEntry {
        name: String,
        source: serde_yaml::Error,
    },

    #[error("invalid compiler descriptor: {0}")]
    InvalidCompiler(serde_yaml::Error),

    #[error("unknown variant '{0}'")]
    UnknownVariant(String),

    #[error("unknown dependency kind '{0}'")]
    UnknownDependencyKind(String),

    #[error("none of the detected languages {detected:?} is supported by the compiler")]
    UnsupportedLanguage { detected: Vec<String> },

    #[error("path collision at '{0}'")]
    PathCollision(String),
}

impl Error {
    pub fn type_mismatch(
        at: impl Into<String>,
        expected: &'static str,
        found: &serde_yaml::Value,
    ) -> Self {
        Error::TypeMismatch {
            at: at.into(),
            expected,
            found: crate::value::kind_of(found),
        }
    }
}
