//! Rule table compilation: `<TOKEN>` placeholders -> anchored regexes,
//! destination strings -> parsed templates.
//!
//! Table shape (YAML or JSON):
//! {
//!   "__tokens":    { "CC": "gcc|clang" },          // placeholder -> regex fragment
//!   "__modifiers": { "<pattern>": <destinations> },  // structural pre-pass
//!   "<pattern>":   <destinations>                    // terminal rules
//! }
//!
//! where <destinations> is null (drop), a string, or a list of strings
//! (fan-out). Any other `__`-prefixed key is table metadata.

use crate::error::Error;
use crate::value::kind_of;

use regex::{Captures, Regex};
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

const TOKENS_KEY: &str = "__tokens";
const MODIFIERS_KEY: &str = "__modifiers";
const PLACEHOLDER_RE: &str = r"<([A-Za-z_][A-Za-z0-9_]*)>";

/// Both rule passes, compiled once and read-only afterwards.
#[derive(Debug, Clone)]
pub struct CompiledRuleSet {
    pub modifiers: RuleSet,
    pub terminal: RuleSet,
}

/// Rules of one pass, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

#[derive(Debug, Clone)]
pub struct Rule {
    /// Pattern as written in the table.
    pub source: String,
    pub pattern: Regex,
    /// Empty means "drop the key".
    pub destinations: Vec<Template>,
}

/// A destination path with its placeholder references resolved up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    /// `+`-prefixed destinations append into a sequence.
    pub append: bool,
    parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Capture(String),
}

impl Template {
    fn parse(text: &str, placeholder: &Regex) -> Self {
        let (append, text) = match text.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, text),
        };

        let mut parts = Vec::new();
        let mut last = 0;
        for m in placeholder.find_iter(text) {
            if m.start() > last {
                parts.push(Part::Literal(text[last..m.start()].to_string()));
            }
            parts.push(Part::Capture(placeholder_name(m.as_str()).to_string()));
            last = m.end();
        }
        if last < text.len() {
            parts.push(Part::Literal(text[last..].to_string()));
        }
        Template { append, parts }
    }

    /// Substitute captured text; unknown captures stay as `<NAME>`.
    pub fn render(&self, caps: &Captures<'_>) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(s) => out.push_str(s),
                Part::Capture(name) => match caps.name(name) {
                    Some(m) => out.push_str(m.as_str()),
                    None => {
                        out.push('<');
                        out.push_str(name);
                        out.push('>');
                    }
                },
            }
        }
        out
    }
}

impl RuleSet {
    /// First rule (in table order) whose pattern matches `key`.
    pub fn find<'k>(&self, key: &'k str) -> Option<(&Rule, Captures<'k>)> {
        self.rules
            .iter()
            .find_map(|rule| rule.pattern.captures(key).map(|caps| (rule, caps)))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl CompiledRuleSet {
    /// Compile a parsed rule table. Fails on the first malformed entry; no
    /// partially compiled set is ever returned.
    pub fn compile(table: &Value) -> Result<Self, Error> {
        let Value::Mapping(table) = table else {
            return Err(Error::type_mismatch("rule table", "mapping", table));
        };
        let placeholder = Regex::new(PLACEHOLDER_RE)
            .map_err(|e| Error::Configuration(format!("placeholder syntax: {}", e)))?;

        let raw_tokens = match table.get(TOKENS_KEY) {
            None | Some(Value::Null) => BTreeMap::new(),
            Some(Value::Mapping(m)) => string_table(TOKENS_KEY, m)?,
            Some(other) => return Err(Error::type_mismatch(TOKENS_KEY, "mapping", other)),
        };
        let tokens = resolve_tokens(&raw_tokens, &placeholder)?;

        let modifiers = match table.get(MODIFIERS_KEY) {
            None | Some(Value::Null) => RuleSet::default(),
            Some(Value::Mapping(m)) => compile_rules(m, &tokens, &placeholder)?,
            Some(other) => return Err(Error::type_mismatch(MODIFIERS_KEY, "mapping", other)),
        };
        let terminal = compile_rules(table, &tokens, &placeholder)?;

        debug!(
            tokens = tokens.len(),
            modifiers = modifiers.len(),
            terminal = terminal.len(),
            "compiled rule table"
        );
        Ok(CompiledRuleSet {
            modifiers,
            terminal,
        })
    }
}

fn placeholder_name(s: &str) -> &str {
    &s[1..s.len() - 1]
}

fn string_table(at: &str, m: &Mapping) -> Result<BTreeMap<String, String>, Error> {
    let mut out = BTreeMap::new();
    for (k, v) in m {
        let key = k
            .as_str()
            .ok_or_else(|| Error::type_mismatch(at, "string keys", k))?;
        let val = v
            .as_str()
            .ok_or_else(|| Error::type_mismatch(format!("{}.{}", at, key), "string", v))?;
        out.insert(key.to_string(), val.to_string());
    }
    Ok(out)
}

/// Expand token-to-token references and check every fragment is a valid
/// regex on its own.
fn resolve_tokens(
    raw: &BTreeMap<String, String>,
    placeholder: &Regex,
) -> Result<BTreeMap<String, String>, Error> {
    fn expand(
        name: &str,
        raw: &BTreeMap<String, String>,
        placeholder: &Regex,
        done: &mut BTreeMap<String, String>,
        stack: &mut Vec<String>,
    ) -> Result<String, Error> {
        if let Some(fragment) = done.get(name) {
            return Ok(fragment.clone());
        }
        if stack.iter().any(|s| s == name) {
            stack.push(name.to_string());
            return Err(Error::Configuration(format!(
                "token cycle: {}",
                stack.join(" -> ")
            )));
        }
        stack.push(name.to_string());

        let fragment = &raw[name];
        let mut out = String::new();
        let mut last = 0;
        for m in placeholder.find_iter(fragment) {
            let inner = placeholder_name(m.as_str());
            // Only names from the table are references; anything else is
            // regex text. `(?P<X>` and `(?<X>` name a group, never a token.
            let head = &fragment[..m.start()];
            let names_group = head.ends_with("?P") || head.ends_with('?');
            if raw.contains_key(inner) && !names_group {
                out.push_str(&fragment[last..m.start()]);
                let sub = expand(inner, raw, placeholder, done, stack)?;
                out.push_str("(?:");
                out.push_str(&sub);
                out.push(')');
                last = m.end();
            }
        }
        out.push_str(&fragment[last..]);

        stack.pop();
        Regex::new(&out).map_err(|e| {
            Error::Configuration(format!("token <{}> is not a valid regex: {}", name, e))
        })?;
        done.insert(name.to_string(), out.clone());
        Ok(out)
    }

    let mut done = BTreeMap::new();
    for name in raw.keys() {
        let mut stack = Vec::new();
        expand(name, raw, placeholder, &mut done, &mut stack)?;
    }
    Ok(done)
}

fn compile_rules(
    table: &Mapping,
    tokens: &BTreeMap<String, String>,
    placeholder: &Regex,
) -> Result<RuleSet, Error> {
    let mut rules = Vec::new();
    for (k, v) in table {
        let source = k
            .as_str()
            .ok_or_else(|| Error::type_mismatch("rule pattern", "string", k))?;
        if source.starts_with("__") {
            if source != TOKENS_KEY && source != MODIFIERS_KEY {
                debug!(key = source, "skipping rule table metadata");
            }
            continue;
        }

        let pattern = compile_pattern(source, tokens, placeholder)?;
        let destinations = match v {
            Value::Null => Vec::new(),
            Value::String(s) => vec![Template::parse(s, placeholder)],
            Value::Sequence(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(Template::parse(s, placeholder)),
                    other => Err(Error::Configuration(format!(
                        "rule '{}' has a {} destination",
                        source,
                        kind_of(other)
                    ))),
                })
                .collect::<Result<_, _>>()?,
            other => {
                return Err(Error::Configuration(format!(
                    "rule '{}' must map to null, a string or a list, found {}",
                    source,
                    kind_of(other)
                )));
            }
        };

        rules.push(Rule {
            source: source.to_string(),
            pattern,
            destinations,
        });
    }
    Ok(RuleSet { rules })
}

/// Turn `compiler.<CC>.path` into `^compiler\.(?P<CC>gcc|clang)\.path$`.
fn compile_pattern(
    source: &str,
    tokens: &BTreeMap<String, String>,
    placeholder: &Regex,
) -> Result<Regex, Error> {
    let mut out = String::from("^");
    let mut named = BTreeSet::new();
    let mut last = 0;
    for m in placeholder.find_iter(source) {
        let name = placeholder_name(m.as_str());
        let fragment = tokens.get(name).ok_or_else(|| {
            Error::Configuration(format!(
                "rule '{}' references undefined token <{}>",
                source, name
            ))
        })?;
        out.push_str(&regex::escape(&source[last..m.start()]));
        // A group name may appear only once per regex.
        if named.insert(name) {
            out.push_str(&format!("(?P<{}>{})", name, fragment));
        } else {
            out.push_str(&format!("(?:{})", fragment));
        }
        last = m.end();
    }
    out.push_str(&regex::escape(&source[last..]));
    out.push('$');

    Regex::new(&out).map_err(|e| {
        Error::Configuration(format!("rule '{}' is not a valid pattern: {}", source, e))
    })
}
