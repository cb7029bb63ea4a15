//! Port ranges and port names.
//!
//! The orchestrator limits port names to 15 characters of letters, digits
//! and dashes, with at least one letter or digit. A range of ports is
//! expanded into one entry per port named `<prefix>-<index>`.

use crate::kube::error::{KubeError, Result};
use crate::kube::names::{make_var_name, short_hash, sizing_value};
use crate::model::{ExposedPort, InstanceGroup};

pub const MAX_PORT_NAME_LENGTH: usize = 15;

/// A single named port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub name: String,
    pub port: u16,
}

/// Parse `N` or `N-M` with `0 < N <= M <= 65535`.
pub fn parse_port_range(value: &str, port_name: &str, field: &str) -> Result<(u16, u16)> {
    let invalid = |reason: &str| KubeError::InvalidPortRange {
        port: port_name.to_string(),
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let parse = |part: &str| -> Result<u32> {
        part.trim()
            .parse::<u32>()
            .map_err(|_| invalid(&format!("{:?} is not a port number", part.trim())))
    };

    let (min, max) = match value.split_once('-') {
        Some((low, high)) => (parse(low)?, parse(high)?),
        None => {
            let port = parse(value)?;
            (port, port)
        }
    };

    if min == 0 {
        return Err(invalid("ports must be greater than 0"));
    }
    if max > u32::from(u16::MAX) {
        return Err(invalid("ports must be at most 65535"));
    }
    if min > max {
        return Err(invalid("the first port is larger than the last"));
    }
    Ok((min as u16, max as u16))
}

/// Strip everything but letters, digits and dashes, collapse dash runs and
/// trim dashes at either end.
pub fn sanitize_port_name(name: &str) -> Result<String> {
    let mut sanitized = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            sanitized.push(c);
        } else if c == '-' && !sanitized.is_empty() && !sanitized.ends_with('-') {
            sanitized.push('-');
        }
    }
    let sanitized = sanitized.trim_end_matches('-').to_string();

    if sanitized.is_empty() {
        return Err(KubeError::InvalidPortName {
            name: name.to_string(),
            reason: "it must contain at least one letter or digit".to_string(),
        });
    }
    Ok(sanitized)
}

/// Fit `name` into `width` characters, replacing the tail with a hash of
/// the full name when it is too long.
fn fit_name(name: &str, width: usize) -> String {
    if name.len() <= width {
        return name.to_string();
    }
    let hash = short_hash(name);
    let head_len = width.saturating_sub(hash.len() + 1).min(4);
    let head = name[..head_len].trim_end_matches('-');
    if head.is_empty() {
        hash[..width.min(hash.len())].to_string()
    } else {
        format!("{head}-{hash}")
    }
}

/// The prefix for a range of `count` ports so that `<prefix>-<count-1>`
/// fits the name limit.
pub fn range_prefix(name: &str, count: u32) -> Result<String> {
    let base = sanitize_port_name(name)?;
    let suffix_len = format!("-{}", count.saturating_sub(1)).len();
    Ok(fit_name(&base, MAX_PORT_NAME_LENGTH - suffix_len))
}

/// Expand an inclusive range into named ports.
pub fn get_port_info(name: &str, min: u16, max: u16) -> Result<Vec<PortInfo>> {
    if min == max {
        let base = sanitize_port_name(name)?;
        return Ok(vec![PortInfo {
            name: fit_name(&base, MAX_PORT_NAME_LENGTH),
            port: min,
        }]);
    }

    let count = u32::from(max - min) + 1;
    let prefix = range_prefix(name, count)?;
    Ok((min..=max)
        .enumerate()
        .map(|(index, port)| PortInfo {
            name: format!("{prefix}-{index}"),
            port,
        })
        .collect())
}

/// An exposed port after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDefinition {
    pub name: String,
    pub protocol: String,
    pub internal: (u16, u16),
    pub external: (u16, u16),
    pub public: bool,
    pub count_is_configurable: bool,
}

impl PortDefinition {
    pub fn from_exposed(port: &ExposedPort) -> Result<Self> {
        let internal_text = port.internal.to_string();
        let internal = parse_port_range(&internal_text, &port.name, "internal")?;
        let external = match &port.external {
            Some(spec) => {
                let external_text = spec.to_string();
                let external = parse_port_range(&external_text, &port.name, "external")?;
                if external.1 - external.0 != internal.1 - internal.0 {
                    return Err(KubeError::PortRangeMismatch {
                        port: port.name.clone(),
                        internal: internal_text,
                        external: external_text,
                    });
                }
                external
            }
            None => internal,
        };

        Ok(Self {
            name: port.name.clone(),
            protocol: port.protocol.to_uppercase(),
            internal,
            external,
            public: port.public,
            count_is_configurable: port.count_is_configurable,
        })
    }

    /// Number of ports in the range.
    pub fn count(&self) -> u32 {
        u32::from(self.internal.1 - self.internal.0) + 1
    }

    /// The chart path holding the configured port count.
    pub fn count_value(&self, role_var: &str) -> String {
        sizing_value(role_var, &format!("ports.{}.count", make_var_name(&self.name)))
    }

    /// Named container-side ports.
    pub fn container_ports(&self) -> Result<Vec<PortInfo>> {
        get_port_info(&self.name, self.internal.0, self.internal.1)
    }

    /// Named service-side ports: the container port names paired with the
    /// external port numbers.
    pub fn service_ports(&self) -> Result<Vec<PortInfo>> {
        Ok(self
            .container_ports()?
            .into_iter()
            .zip(self.external.0..=self.external.1)
            .map(|(info, port)| PortInfo { name: info.name, port })
            .collect())
    }
}

/// Validated port definitions of a role, in declaration order.
pub fn port_definitions(role: &InstanceGroup) -> Result<Vec<PortDefinition>> {
    role.run
        .exposed_ports
        .iter()
        .map(PortDefinition::from_exposed)
        .collect()
}
