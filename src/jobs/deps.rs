//! `depends_on` resolution: sibling tests get qualified names, package
//! managers become directives.

use crate::config::LookupPolicy;
use crate::error::Error;
use crate::jobs::pm::{self, Directive};
use crate::value::{scalar_text, string_list};

use serde::Serialize;
use serde_yaml::{Mapping, Value};
use tracing::warn;

const TEST_KEY: &str = "test";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Dependency {
    /// Qualified id of another test entry.
    Test(String),
    Package(Directive),
}

impl Dependency {
    pub fn test_id(&self) -> Option<&str> {
        match self {
            Dependency::Test(id) => Some(id),
            Dependency::Package(_) => None,
        }
    }

    pub fn directive(&self) -> Option<&Directive> {
        match self {
            Dependency::Package(d) => Some(d),
            Dependency::Test(_) => None,
        }
    }
}

/// Prefix `name` with `namespace` unless it already holds a `/`.
pub fn qualify(namespace: &str, name: &str) -> String {
    if name.contains('/') {
        name.to_string()
    } else {
        format!("{}/{}", namespace, name)
    }
}

/// Resolve a `depends_on` node into one ordered dependency list.
pub fn resolve(
    namespace: &str,
    depends_on: &Value,
    policy: LookupPolicy,
) -> Result<Vec<Dependency>, Error> {
    let map = match depends_on {
        Value::Null => return Ok(Vec::new()),
        Value::Mapping(map) => map,
        other => return Err(Error::type_mismatch("depends_on", "mapping", other)),
    };

    let mut out = Vec::new();
    for (k, v) in map {
        let kind = scalar_text(k).unwrap_or_default();
        if kind == TEST_KEY {
            for name in string_list("depends_on.test", v)? {
                out.push(Dependency::Test(qualify(namespace, &name)));
            }
        } else if pm::is_manager(&kind) {
            let mut single = Mapping::new();
            single.insert(k.clone(), v.clone());
            for d in pm::identify(&Value::Mapping(single))? {
                out.push(Dependency::Package(d));
            }
        } else {
            match policy {
                LookupPolicy::Error => return Err(Error::UnknownDependencyKind(kind)),
                LookupPolicy::Ignore => {
                    warn!(kind = %kind, namespace, "ignoring unknown dependency kind")
                }
            }
        }
    }
    Ok(out)
}
