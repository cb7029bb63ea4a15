//! Configuration variables.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigurationVariable {
    pub name: String,
    #[serde(default)]
    pub options: VariableOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariableOptions {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub default: Option<serde_yaml::Value>,
    #[serde(default)]
    pub secret: bool,
    #[serde(default)]
    pub immutable: bool,
    #[serde(default)]
    pub required: bool,
    /// Internal variables are computed by the platform and never exposed
    /// as chart values.
    #[serde(default)]
    pub internal: bool,
    #[serde(default, rename = "type")]
    pub var_type: VariableType,
    #[serde(default)]
    pub generator: Option<Generator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    #[default]
    User,
    Environment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generator {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub generator_type: GeneratorType,
    #[serde(default)]
    pub value_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorType {
    Password,
    #[serde(alias = "SSH")]
    Ssh,
    #[serde(alias = "CertificateAuthority")]
    Certificate,
}

impl ConfigurationVariable {
    pub fn is_secret(&self) -> bool {
        self.options.secret
    }

    pub fn is_generated(&self) -> bool {
        self.options.generator.is_some()
    }

    pub fn generator_type(&self) -> Option<GeneratorType> {
        self.options.generator.as_ref().map(|g| g.generator_type)
    }

    /// The default value rendered as text. Strings are used as-is; numbers
    /// and booleans use their YAML spelling; structured values become JSON.
    pub fn default_string(&self) -> Option<String> {
        use serde_yaml::Value;

        match self.options.default.as_ref()? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            other => serde_json::to_string(other).ok(),
        }
    }
}
