//! Source language detection from file extensions.

use crate::config::LookupPolicy;
use crate::error::Error;
use crate::jobs::compiler::CompilerDescriptor;

use std::collections::BTreeSet;
use std::path::Path;
use tracing::warn;

/// Language tags, most preferred first.
pub const PRIORITY: [&str; 8] = ["f08", "f03", "f95", "f90", "f77", "fc", "cxx", "cc"];

pub const DEFAULT_LANGUAGE: &str = "cc";

/// Tag for a single file, if its extension is recognised.
pub fn classify(file: &str) -> Option<&'static str> {
    let ext = Path::new(file).extension()?.to_str()?;
    let tag = match ext {
        "f08" | "F08" => "f08",
        "f03" | "F03" => "f03",
        "f95" | "F95" => "f95",
        "f90" | "F90" => "f90",
        "f77" | "F77" => "f77",
        "f" | "F" | "for" | "FOR" | "ftn" => "fc",
        "cpp" | "cxx" | "cc" | "C" | "c++" | "hpp" | "hxx" => "cxx",
        "c" | "h" => "cc",
        _ => return None,
    };
    Some(tag)
}

/// Pick the build language for `files`: the highest-priority detected tag
/// the compiler can build, `cc` when nothing qualifies.
pub fn detect(
    files: &[String],
    compiler: &CompilerDescriptor,
    policy: LookupPolicy,
) -> Result<&'static str, Error> {
    let detected: BTreeSet<&'static str> = files.iter().filter_map(|f| classify(f)).collect();

    let chosen = PRIORITY
        .iter()
        .copied()
        .find(|tag| detected.contains(tag) && compiler.supports(tag));

    match chosen {
        Some(tag) => {
            if let Some(best) = PRIORITY.iter().find(|t| detected.contains(*t)) {
                if *best != tag {
                    warn!(preferred = best, using = tag, "compiler lacks preferred language");
                }
            }
            Ok(tag)
        }
        None if detected.is_empty() => Ok(DEFAULT_LANGUAGE),
        None => {
            let detected: Vec<String> = PRIORITY
                .iter()
                .filter(|t| detected.contains(*t))
                .map(|t| t.to_string())
                .collect();
            match policy {
                LookupPolicy::Error => Err(Error::UnsupportedLanguage { detected }),
                LookupPolicy::Ignore => {
                    warn!(?detected, "no detected language is supported, using cc");
                    Ok(DEFAULT_LANGUAGE)
                }
            }
        }
    }
}
