//! Package-manager directives (`spack`, `module`) and their command text.

use crate::error::Error;
use crate::value::string_list;

use serde::Serialize;
use serde_yaml::Value;

/// Package managers recognised in `package_manager` and `depends_on` nodes,
/// in the order their directives are emitted.
pub const MANAGERS: [&str; 2] = ["spack", "module"];

pub fn is_manager(kind: &str) -> bool {
    MANAGERS.contains(&kind)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "manager", content = "spec", rename_all = "lowercase")]
pub enum Directive {
    Spack(String),
    Module(String),
}

impl Directive {
    pub fn spec(&self) -> &str {
        match self {
            Directive::Spack(spec) | Directive::Module(spec) => spec,
        }
    }

    /// Shell text loading and/or installing the package, one command per
    /// line. Modules have no install step.
    pub fn emit(&self, load: bool, install: bool) -> String {
        let mut lines = Vec::new();
        match self {
            Directive::Spack(spec) => {
                if install {
                    lines.push(format!("spack install {}", spec));
                }
                if load {
                    lines.push(format!("spack load {}", spec));
                }
            }
            Directive::Module(spec) => {
                if load {
                    lines.push(format!("module load {}", spec));
                }
            }
        }
        lines.join("\n")
    }
}

/// Build directives from a node holding `spack` and/or `module` keys.
///
/// Each key takes one spec or a list of specs. Spack directives come first,
/// then modules, each group in declaration order. Other keys are ignored.
pub fn identify(node: &Value) -> Result<Vec<Directive>, Error> {
    let Value::Mapping(map) = node else {
        return Err(Error::type_mismatch("package_manager", "mapping", node));
    };

    let mut out = Vec::new();
    for manager in MANAGERS {
        let Some(specs) = map.get(manager) else {
            continue;
        };
        for spec in string_list(manager, specs)? {
            out.push(match manager {
                "spack" => Directive::Spack(spec),
                _ => Directive::Module(spec),
            });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn single_spack_spec() {
        let got = identify(&yaml(r#"{ spack: "foo@1.2" }"#)).unwrap();
        assert_eq!(got, vec![Directive::Spack("foo@1.2".into())]);
        assert_eq!(
            got[0].emit(true, true),
            "spack install foo@1.2\nspack load foo@1.2"
        );
        assert_eq!(got[0].emit(true, false), "spack load foo@1.2");
    }

    #[test]
    fn module_list_never_installs() {
        let got = identify(&yaml("module: [m1, m2]")).unwrap();
        assert_eq!(
            got,
            vec![Directive::Module("m1".into()), Directive::Module("m2".into())]
        );
        for d in &got {
            assert!(!d.emit(true, true).contains("install"));
            assert_eq!(d.emit(false, true), "");
        }
        assert_eq!(got[1].emit(true, true), "module load m2");
    }

    #[test]
    fn spack_before_module() {
        let got = identify(&yaml("module: mpi\nspack: [a, b]\nconda: x")).unwrap();
        let specs: Vec<&str> = got.iter().map(Directive::spec).collect();
        assert_eq!(specs, vec!["a", "b", "mpi"]);
    }

    #[test]
    fn non_mapping_is_rejected() {
        let err = identify(&yaml("[spack]")).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }
}
