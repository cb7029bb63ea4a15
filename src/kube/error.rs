//! Builder diagnostics.

use thiserror::Error;

use crate::helm::DocumentError;

/// A role manifest shape the builders cannot express. Every variant names
/// the offending instance group or field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KubeError {
    #[error("Instance group {role}: node affinity in the role manifest is not supported; use the chart value sizing.{var_name}.affinity.nodeAffinity")]
    NodeAffinityUnsupported { role: String, var_name: String },

    #[error("Instance group {role}: pod affinity is not supported")]
    PodAffinityUnsupported { role: String },

    #[error("Instance group {role}: unknown flight stage {stage}")]
    UnknownFlightStage { role: String, stage: String },

    #[error("Port {port}: invalid {field} range {value:?}: {reason}")]
    InvalidPortRange {
        port: String,
        field: String,
        value: String,
        reason: String,
    },

    #[error("Port {port}: external range {external} does not match internal range {internal}")]
    PortRangeMismatch {
        port: String,
        internal: String,
        external: String,
    },

    #[error("Invalid port name {name:?}: {reason}")]
    InvalidPortName { name: String, reason: String },

    #[error("Instance group {role}: {probe} probe has unsupported URL scheme {scheme:?}")]
    UnsupportedProbeScheme {
        role: String,
        probe: String,
        scheme: String,
    },

    #[error("Instance group {role}: {probe} probe has invalid URL {url:?}: {reason}")]
    InvalidProbeUrl {
        role: String,
        probe: String,
        url: String,
        reason: String,
    },

    #[error("Variable {variable}: no instance group named {target}")]
    UnknownSizingRole { variable: String, target: String },

    #[error("Instance group {role}: colocated container {container} is not defined")]
    UnknownColocatedContainer { role: String, container: String },

    #[error("Manifest opinions cannot be serialized: {reason}")]
    InvalidOpinions { reason: String },

    #[error("Cannot sanitize an empty name")]
    EmptyName,

    #[error(transparent)]
    Document(#[from] DocumentError),
}

pub type Result<T> = std::result::Result<T, KubeError>;
