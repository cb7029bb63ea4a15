//! Export settings shared by every builder.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Authorization mode of the target cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    #[default]
    Rbac,
    None,
}

impl AuthType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "rbac" => Some(Self::Rbac),
            "none" | "" => Some(Self::None),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rbac => "rbac",
            Self::None => "none",
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Literal registry login used for plain-mode pull secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
}

/// Options controlling what the builders emit.
#[derive(Debug, Clone)]
pub struct ExportSettings {
    /// Emit chart templates (`true`) or concrete resources (`false`).
    pub create_chart: bool,

    /// Variable values used in plain mode, by variable name.
    pub defaults: BTreeMap<String, String>,

    pub registry: String,
    pub organization: String,
    pub repository: String,

    pub auth_type: AuthType,

    pub use_memory_limits: bool,
    pub use_cpu_limits: bool,

    /// Secrets are created by an external generator; the chart only
    /// provides updates.
    pub use_secrets_generator: bool,

    /// Opaque manifest opinions, folded into image tags.
    pub opinions: serde_yaml::Value,

    pub tag_extra: String,
    pub version: String,

    /// Namespace for plain-mode cluster-scoped references.
    pub namespace: String,

    /// External IPs for plain-mode public services.
    pub external_ips: Vec<String>,

    pub registry_credentials: Option<RegistryCredentials>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            create_chart: false,
            defaults: BTreeMap::new(),
            registry: "docker.io".to_string(),
            organization: "library".to_string(),
            repository: "chartsmith".to_string(),
            auth_type: AuthType::Rbac,
            use_memory_limits: true,
            use_cpu_limits: true,
            use_secrets_generator: false,
            opinions: serde_yaml::Value::Null,
            tag_extra: String::new(),
            version: crate::VERSION.to_string(),
            namespace: "default".to_string(),
            external_ips: Vec::new(),
            registry_credentials: None,
        }
    }
}

impl ExportSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings for chart output.
    pub fn chart() -> Self {
        Self::default().with_chart(true)
    }

    pub fn with_chart(mut self, create_chart: bool) -> Self {
        self.create_chart = create_chart;
        self
    }

    pub fn with_default(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }

    pub fn with_image_location(
        mut self,
        registry: impl Into<String>,
        organization: impl Into<String>,
        repository: impl Into<String>,
    ) -> Self {
        self.registry = registry.into();
        self.organization = organization.into();
        self.repository = repository.into();
        self
    }

    pub fn with_auth_type(mut self, auth_type: AuthType) -> Self {
        self.auth_type = auth_type;
        self
    }

    pub fn with_limits(mut self, memory: bool, cpu: bool) -> Self {
        self.use_memory_limits = memory;
        self.use_cpu_limits = cpu;
        self
    }

    pub fn with_secrets_generator(mut self, enabled: bool) -> Self {
        self.use_secrets_generator = enabled;
        self
    }

    pub fn with_opinions(mut self, opinions: serde_yaml::Value) -> Self {
        self.opinions = opinions;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>, tag_extra: impl Into<String>) -> Self {
        self.version = version.into();
        self.tag_extra = tag_extra.into();
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_external_ips(mut self, ips: Vec<String>) -> Self {
        self.external_ips = ips;
        self
    }

    pub fn with_registry_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.registry_credentials = Some(RegistryCredentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Whether RBAC objects are emitted at all. Charts always carry them
    /// behind a `kube.auth` guard.
    pub fn emits_rbac(&self) -> bool {
        self.create_chart || self.auth_type == AuthType::Rbac
    }
}
