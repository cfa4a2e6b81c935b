use crate::config::LookupPolicy;
use crate::error::Error;

use std::collections::BTreeMap;
use tracing::warn;

/// Space-join the flags of the requested variants, in request order.
pub fn compose(
    requested: &[String],
    flags: &BTreeMap<String, String>,
    policy: LookupPolicy,
) -> Result<String, Error> {
    let mut parts = Vec::new();
    for name in requested {
        match flags.get(name) {
            Some(f) if !f.is_empty() => parts.push(f.as_str()),
            Some(_) => {}
            None => match policy {
                LookupPolicy::Error => return Err(Error::UnknownVariant(name.clone())),
                LookupPolicy::Ignore => warn!(variant = %name, "unknown variant skipped"),
            },
        }
    }
    Ok(parts.join(" "))
}
