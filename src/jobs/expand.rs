//! Test entry -> job descriptors.
//!
//! An entry yields at most one build job (when it lists source files) and
//! one run job per combination of its `run.iterate` axes.

use crate::config::{ExpandOptions, LookupPolicy};
use crate::error::Error;
use crate::jobs::compiler::CompilerDescriptor;
use crate::jobs::deps::{self, Dependency};
use crate::jobs::{lang, pm, variant};
use crate::value::string_list;

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Raw test entry as it appears in a suite file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestEntry {
    #[serde(default, deserialize_with = "one_or_many")]
    pub files: Vec<String>,

    #[serde(default, deserialize_with = "one_or_many")]
    pub variants: Vec<String>,

    #[serde(default)]
    pub cflags: Option<String>,

    #[serde(default)]
    pub ldflags: Option<String>,

    /// Output binary; defaults to the entry name.
    #[serde(default)]
    pub binary: Option<String>,

    /// The entry's own environment; same shape `identify` accepts.
    #[serde(default)]
    pub package_manager: Option<Value>,

    #[serde(default)]
    pub depends_on: Option<Value>,

    #[serde(default)]
    pub run: Option<RunSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunSpec {
    #[serde(default)]
    pub program: Option<String>,

    #[serde(default)]
    pub args: Option<String>,

    /// Axis name -> values, in declaration order.
    #[serde(default, deserialize_with = "deserialize_axes")]
    pub iterate: Vec<(String, Vec<String>)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Build,
    Run,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobDescriptor {
    pub id: String,
    pub kind: JobKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub command: String,
    pub depends_on: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub axes: BTreeMap<String, String>,
}

impl TestEntry {
    pub fn from_node(name: &str, node: &Value) -> Result<Self, Error> {
        if !node.is_mapping() {
            return Err(Error::type_mismatch(name, "mapping", node));
        }
        serde_yaml::from_value(node.clone()).map_err(|source| Error::InvalidEntry {
            name: name.to_string(),
            source,
        })
    }
}

/// Expand one entry of namespace `namespace`.
pub fn expand_entry(
    namespace: &str,
    name: &str,
    entry: &TestEntry,
    compiler: &CompilerDescriptor,
    options: &ExpandOptions,
) -> Result<Vec<JobDescriptor>, Error> {
    let id = deps::qualify(namespace, name);
    let null = Value::Null;
    let dependencies = deps::resolve(
        namespace,
        entry.depends_on.as_ref().unwrap_or(&null),
        options.dependencies,
    )?;

    let mut directives = match &entry.package_manager {
        None | Some(Value::Null) => Vec::new(),
        Some(node) => pm::identify(node)?,
    };
    directives.extend(dependencies.iter().filter_map(Dependency::directive).cloned());
    let preamble: Vec<String> = directives
        .iter()
        .map(|d| d.emit(true, true))
        .filter(|s| !s.is_empty())
        .collect();

    let test_deps: Vec<String> = dependencies
        .iter()
        .filter_map(Dependency::test_id)
        .map(str::to_string)
        .collect();

    let mut jobs = Vec::new();

    let build_id = if entry.files.is_empty() {
        None
    } else {
        let language = lang::detect(&entry.files, compiler, options.language)?;
        let program = match compiler.command(language) {
            Some(p) => p.to_string(),
            None => match options.language {
                LookupPolicy::Error => {
                    return Err(Error::UnsupportedLanguage {
                        detected: vec![language.to_string()],
                    });
                }
                LookupPolicy::Ignore => {
                    warn!(entry = %id, language, "compiler has no command for language");
                    language.to_string()
                }
            },
        };
        let variant_flags = variant::compose(&entry.variants, &compiler.variants, options.variants)?;
        let binary = entry.binary.as_deref().unwrap_or(name);

        let line = join_words([
            program.as_str(),
            entry.cflags.as_deref().unwrap_or(""),
            variant_flags.as_str(),
            entry.files.join(" ").as_str(),
            format!("-o {}", binary).as_str(),
            entry.ldflags.as_deref().unwrap_or(""),
        ]);

        let build_id = if entry.run.is_some() {
            format!("{}.build", id)
        } else {
            id.clone()
        };
        jobs.push(JobDescriptor {
            id: build_id.clone(),
            kind: JobKind::Build,
            language: Some(language.to_string()),
            command: with_preamble(&preamble, line),
            depends_on: test_deps.clone(),
            axes: BTreeMap::new(),
        });
        Some(build_id)
    };

    if let Some(run) = &entry.run {
        let program = match &run.program {
            Some(p) => p.clone(),
            None => format!("./{}", entry.binary.as_deref().unwrap_or(name)),
        };
        let mut depends_on = test_deps.clone();
        if let Some(b) = &build_id {
            depends_on.insert(0, b.clone());
        }

        let combos = cartesian(&run.iterate);
        if combos.is_empty() {
            warn!(entry = %id, "an iterate axis has no values, no run job generated");
        }
        for combo in combos {
            let suffix: String = combo.iter().map(|(k, v)| format!("_{}{}", k, v)).collect();
            let env = combo
                .iter()
                .map(|(k, v)| format!("{}={}", k.to_uppercase(), v))
                .collect::<Vec<_>>()
                .join(" ");
            let line = join_words([
                env.as_str(),
                program.as_str(),
                run.args.as_deref().unwrap_or(""),
            ]);
            jobs.push(JobDescriptor {
                id: format!("{}{}", id, suffix),
                kind: JobKind::Run,
                language: None,
                command: with_preamble(&preamble, line),
                depends_on: depends_on.clone(),
                axes: combo.into_iter().collect(),
            });
        }
    }

    if jobs.is_empty() && entry.run.is_none() {
        warn!(entry = %id, "entry has neither files nor run section");
    }
    debug!(entry = %id, jobs = jobs.len(), "expanded");
    Ok(jobs)
}

/// Expand every entry of a suite document, in declaration order.
///
/// Keys starting with `.` hold YAML anchors and are not entries.
pub fn expand_suite(
    namespace: &str,
    suite: &Value,
    compiler: &CompilerDescriptor,
    options: &ExpandOptions,
) -> Result<Vec<JobDescriptor>, Error> {
    let Value::Mapping(map) = suite else {
        return Err(Error::type_mismatch(namespace, "mapping", suite));
    };
    let mut out = Vec::new();
    for (k, node) in map {
        let name = k
            .as_str()
            .ok_or_else(|| Error::type_mismatch(namespace, "string entry names", k))?;
        if name.starts_with('.') {
            continue;
        }
        let entry = TestEntry::from_node(name, node)?;
        out.extend(expand_entry(namespace, name, &entry, compiler, options)?);
    }
    Ok(out)
}

/// Every combination of axis values; axis order is kept within a combination.
fn cartesian(axes: &[(String, Vec<String>)]) -> Vec<Vec<(String, String)>> {
    axes.iter().fold(vec![Vec::new()], |acc, (axis, values)| {
        acc.iter()
            .flat_map(|prefix| {
                values.iter().map(move |v| {
                    let mut combo = prefix.clone();
                    combo.push((axis.clone(), v.clone()));
                    combo
                })
            })
            .collect()
    })
}

fn join_words<'a>(words: impl IntoIterator<Item = &'a str>) -> String {
    words
        .into_iter()
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn with_preamble(preamble: &[String], line: String) -> String {
    if preamble.is_empty() {
        line
    } else {
        format!("{}\n{}", preamble.join("\n"), line)
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let node = Value::deserialize(deserializer)?;
    string_list("list", &node).map_err(serde::de::Error::custom)
}

fn deserialize_axes<'de, D>(deserializer: D) -> Result<Vec<(String, Vec<String>)>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;

    let node = Value::deserialize(deserializer)?;
    let map = match node {
        Value::Null => return Ok(Vec::new()),
        Value::Mapping(map) => map,
        _ => return Err(D::Error::custom("iterate must be a mapping")),
    };

    let mut axes = Vec::new();
    for (k, v) in &map {
        let axis = k
            .as_str()
            .ok_or_else(|| D::Error::custom("iterate axis names must be strings"))?;
        // `{ values: [...] }` and a bare list are both accepted.
        let values = v.get("values").unwrap_or(v);
        let values = string_list(axis, values).map_err(D::Error::custom)?;
        axes.push((axis.to_string(), values));
    }
    Ok(axes)
}
