//! Name conversions for template variables, secret keys and object names.

use crate::kube::error::{KubeError, Result};

/// Longest object name the orchestrator accepts for most kinds.
pub const MAX_NAME_LENGTH: usize = 63;

/// Length kept from an over-long name before the hash suffix.
const TRUNCATED_NAME_LENGTH: usize = 54;

/// Template variable component for a role name: `nats-server` → `nats_server`.
pub fn make_var_name(name: &str) -> String {
    name.replace('-', "_")
}

/// Secret data key for a variable: `NATS_PASSWORD` → `nats-password`.
pub fn make_secret_key(name: &str) -> String {
    name.to_lowercase().replace('_', "-")
}

/// Eight hex characters identifying `input`.
pub fn short_hash(input: &str) -> String {
    let hash = blake3::hash(input.as_bytes());
    hash.to_hex().as_str()[..8].to_string()
}

/// Keep a name within [`MAX_NAME_LENGTH`]. Longer names are truncated and
/// suffixed with a hash of the full name so distinct inputs stay distinct.
pub fn sanitize_name(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(KubeError::EmptyName);
    }
    if name.len() <= MAX_NAME_LENGTH {
        return Ok(name.to_string());
    }
    let mut cut = TRUNCATED_NAME_LENGTH;
    while !name.is_char_boundary(cut) {
        cut -= 1;
    }
    Ok(format!("{}-{}", &name[..cut], short_hash(name)))
}

/// `.Values.sizing.<role>.<key>` for a role's variable name.
pub fn sizing_value(role_var: &str, key: &str) -> String {
    format!(".Values.sizing.{role_var}.{key}")
}

/// The chart path of a role's replica count.
pub fn count_value(role_var: &str) -> String {
    sizing_value(role_var, "count")
}
