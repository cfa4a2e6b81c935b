//! The two rewrite passes: modifiers (structural, lenient) then terminal
//! rules (final placement, strict).

use crate::config::{CollisionPolicy, RewriteOptions};
use crate::error::Error;
use crate::scheme::compile::{CompiledRuleSet, RuleSet};
use crate::scheme::flat::{Collision, FlatView, flatten, set_with};

use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

/// Top-level shape of the document being converted; also the path prefix
/// the modifier pass sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Kind {
    Compiler,
    Runtime,
    Environment,
    Te,
}

impl Kind {
    pub fn prefix(self) -> &'static str {
        match self {
            Kind::Compiler => "compiler",
            Kind::Runtime => "runtime",
            Kind::Environment => "environment",
            Kind::Te => "te",
        }
    }
}

/// Whether keys that match no rule are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strictness {
    Lenient,
    Strict,
}

/// Non-fatal findings of a conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteReport {
    /// Terminal-pass keys no rule matched (passed through unchanged).
    pub misses: Vec<String>,
    /// Keys removed by a null rule, in either pass.
    pub dropped: Vec<String>,
    pub collisions: Vec<Collision>,
}

/// One pending assignment produced by a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Write {
    pub path: String,
    pub value: Value,
    pub append: bool,
}

/// Apply `rules` to every entry of `flat`. First matching rule wins.
pub fn rewrite_pass(
    flat: FlatView,
    rules: &RuleSet,
    strictness: Strictness,
    report: &mut RewriteReport,
) -> Vec<Write> {
    let mut out = Vec::with_capacity(flat.len());
    for (key, value) in flat {
        // Render destinations up front so nothing borrows `key` below.
        let matched = rules.find(&key).map(|(rule, caps)| {
            let dests: Vec<(String, bool)> = rule
                .destinations
                .iter()
                .map(|d| (d.render(&caps), d.append))
                .collect();
            (rule.source.as_str(), dests)
        });

        match matched {
            None => {
                if strictness == Strictness::Strict {
                    warn!(key = %key, "no rule matches key, keeping it as is");
                    report.misses.push(key.clone());
                }
                out.push(Write {
                    path: key,
                    value,
                    append: false,
                });
            }
            Some((source, dests)) if dests.is_empty() => {
                debug!(key = %key, rule = source, "dropped");
                report.dropped.push(key);
            }
            Some((_, dests)) => {
                for (path, append) in dests {
                    out.push(Write {
                        path,
                        value: value.clone(),
                        append,
                    });
                }
            }
        }
    }
    out
}

/// Rebuild a document from pass output, recording collisions.
pub fn materialize(
    writes: Vec<Write>,
    policy: CollisionPolicy,
    report: &mut RewriteReport,
) -> Result<Value, Error> {
    let mut root = Value::Mapping(Mapping::new());
    for w in writes {
        if let Some(c) = set_with(&mut root, &w.path, w.value, w.append) {
            if policy == CollisionPolicy::Error {
                return Err(Error::PathCollision(c.path));
            }
            warn!(collision = %c, "write collision, last value wins");
            report.collisions.push(c);
        }
    }
    Ok(root)
}

/// Flatten under the kind's prefix unless the document already carries it
/// as its only top-level key.
fn flatten_under_kind(doc: &Value, kind: Kind) -> FlatView {
    match doc {
        Value::Mapping(map) if map.len() == 1 && map.contains_key(kind.prefix()) => {
            flatten(doc, "")
        }
        _ => flatten(doc, kind.prefix()),
    }
}

/// Convert one document of the given kind.
///
/// The modifier pass runs over the document flattened under the kind's
/// prefix; its output is rebuilt, re-flattened without a prefix and handed
/// to the terminal pass.
pub fn convert(
    doc: &Value,
    kind: Kind,
    rules: &CompiledRuleSet,
    options: &RewriteOptions,
) -> Result<(Value, RewriteReport), Error> {
    let mut report = RewriteReport::default();

    let flat = flatten_under_kind(doc, kind);
    let writes = rewrite_pass(flat, &rules.modifiers, Strictness::Lenient, &mut report);
    let staged = materialize(writes, options.collisions, &mut report)?;

    let flat = flatten(&staged, "");
    let writes = rewrite_pass(flat, &rules.terminal, Strictness::Strict, &mut report);
    let out = materialize(writes, options.collisions, &mut report)?;

    if !report.misses.is_empty() {
        warn!(
            count = report.misses.len(),
            "keys were not covered by the rule table"
        );
    }
    Ok((out, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::flat::CollisionKind;
    use pretty_assertions::assert_eq;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    fn rules(s: &str) -> CompiledRuleSet {
        CompiledRuleSet::compile(&yaml(s)).unwrap()
    }

    fn run(table: &str, kind: Kind, doc: &str) -> (Value, RewriteReport) {
        convert(&yaml(doc), kind, &rules(table), &RewriteOptions::default()).unwrap()
    }

    #[test]
    fn end_to_end_compiler_path() {
        let (out, report) = run(
            r#"{"__tokens": {"CC": "gcc|clang"}, "compiler.<CC>.path": "compiler.path"}"#,
            Kind::Compiler,
            "gcc: { path: /usr/bin/gcc }",
        );
        assert_eq!(out, yaml("compiler: { path: /usr/bin/gcc }"));
        assert_eq!(report, RewriteReport::default());
    }

    #[test]
    fn wrapped_document_is_not_prefixed_twice() {
        let (out, report) = run(
            r#"{"__tokens": {"CC": "gcc|clang"}, "compiler.<CC>.path": "compiler.path"}"#,
            Kind::Compiler,
            r#"{"compiler": {"gcc": {"path": "/usr/bin/gcc"}}}"#,
        );
        assert_eq!(out, yaml(r#"{"compiler": {"path": "/usr/bin/gcc"}}"#));
        assert_eq!(report, RewriteReport::default());
    }

    #[test]
    fn other_wrapper_keys_are_still_prefixed() {
        let (out, report) = run(
            r#""runtime.compiler": "runtime.cc""#,
            Kind::Runtime,
            "compiler: gcc",
        );
        assert_eq!(out, yaml("runtime: { cc: gcc }"));
        assert!(report.misses.is_empty());
    }

    #[test]
    fn first_matching_rule_wins() {
        let (out, _) = run(
            r#"
__tokens: { ANY: ".+" }
"te.t1.files": "te.t1.sources"
"te.<ANY>": "te.other.<ANY>"
"#,
            Kind::Te,
            "t1: { files: [a.c] }",
        );
        assert_eq!(out, yaml("te: { t1: { sources: [a.c] } }"));
    }

    #[test]
    fn fan_out_copies_value() {
        let (out, _) = run(
            r#""runtime.program": ["runtime.program", "runtime.launcher.cmd", "runtime.backup"]"#,
            Kind::Runtime,
            "program: mpirun",
        );
        assert_eq!(
            out,
            yaml("runtime: { program: mpirun, launcher: { cmd: mpirun }, backup: mpirun }")
        );
    }

    #[test]
    fn null_rule_drops_key() {
        let (out, report) = run(
            r#"
"environment.legacy": null
"environment.path": "environment.PATH"
"#,
            Kind::Environment,
            "legacy: 1\npath: /bin",
        );
        assert_eq!(out, yaml("environment: { PATH: /bin }"));
        assert_eq!(report.dropped, vec!["environment.legacy"]);
    }

    #[test]
    fn terminal_misses_are_reported_and_kept() {
        let (out, report) = run(
            r#""compiler.cc": "compiler.commands.cc""#,
            Kind::Compiler,
            "cc: gcc\nfc: gfortran",
        );
        assert_eq!(out, yaml("compiler: { commands: { cc: gcc }, fc: gfortran }"));
        assert_eq!(report.misses, vec!["compiler.fc"]);
    }

    #[test]
    fn modifiers_restructure_before_terminal_rules() {
        let table = r#"
__tokens: { LANG: "cc|cxx|f90", NAME: "[^.]+" }
__modifiers:
  "compiler.<LANG>.program": "compiler.commands.<LANG>"
"compiler.commands.<LANG>": "compiler.commands.<LANG>"
"#;
        let (out, report) = run(
            table,
            Kind::Compiler,
            "cc: { program: gcc }\nf90: { program: gfortran }",
        );
        assert_eq!(
            out,
            yaml("compiler: { commands: { cc: gcc, f90: gfortran } }")
        );
        // Modifier pass is lenient: nothing reported for pass-through there.
        assert!(report.misses.is_empty());
    }

    #[test]
    fn unknown_capture_stays_literal() {
        let (out, _) = run(
            r#"
__tokens: { N: "[a-z]+" }
"te.<N>.tag": "te.<N>.<LABEL>"
"#,
            Kind::Te,
            "t: { tag: x }",
        );
        assert_eq!(out, yaml(r#"te: { t: { "<LABEL>": x } }"#));
    }

    #[test]
    fn append_destinations_merge() {
        let (out, report) = run(
            r#"
__tokens: { N: "[^.]+", PHASE: "build|run" }
"te.<N>.<PHASE>.depends_on.spack": "+te.<N>.depends_on.spack"
"#,
            Kind::Te,
            "t: { build: { depends_on: { spack: [a, b] } }, run: { depends_on: { spack: c } } }",
        );
        assert_eq!(out, yaml("te: { t: { depends_on: { spack: [a, b, c] } } }"));
        assert!(report.collisions.is_empty());
    }

    #[test]
    fn colliding_destinations_are_reported() {
        let table = r#"
__tokens: { N: "a|b" }
"x.<N>": "x.merged"
"#;
        let (out, report) = convert(
            &yaml("a: 1\nb: 2"),
            Kind::Compiler,
            &rules(&table.replace("x.", "compiler.")),
            &RewriteOptions::default(),
        )
        .unwrap();
        assert_eq!(out, yaml("compiler: { merged: 2 }"));
        assert_eq!(report.collisions.len(), 1);
        assert_eq!(report.collisions[0].kind, CollisionKind::Overwritten);

        let strict = RewriteOptions {
            collisions: CollisionPolicy::Error,
        };
        let err = convert(
            &yaml("a: 1\nb: 2"),
            Kind::Compiler,
            &rules(&table.replace("x.", "compiler.")),
            &strict,
        )
        .unwrap_err();
        assert!(matches!(err, Error::PathCollision(p) if p == "compiler.merged"));
    }

    #[test]
    fn same_rules_same_output() {
        let table = r#"
__tokens: { N: "[^.]+" }
"te.<N>.files": ["te.<N>.files", "te.<N>.copy"]
"#;
        let doc = yaml("t1: { files: a.c }\nt2: { files: b.c, cflags: -O2 }");
        let first = convert(&doc, Kind::Te, &rules(table), &RewriteOptions::default()).unwrap();
        let second = convert(&doc, Kind::Te, &rules(table), &RewriteOptions::default()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.1.misses, vec!["te.t2.cflags"]);
    }
}
