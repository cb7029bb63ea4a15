use thiserror::Error;

use crate::helm::DocumentError;
use crate::kube::KubeError;

#[derive(Error, Debug)]
pub enum ChartsmithError {
    #[error(transparent)]
    Kube(#[from] KubeError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Manifest decoding failed: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Refusing to overwrite {0}; pass --force to replace it")]
    OutputExists(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file {path}: {reason}")]
    ParsingFailed { path: String, reason: String },

    #[error("Unknown auth type: {0}")]
    InvalidAuthType(String),

    #[error("Defaults file {path} is not a mapping of variable names to values")]
    InvalidDefaults { path: String },
}

pub type Result<T> = std::result::Result<T, ChartsmithError>;
