use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::kube::{AuthType, ExportSettings};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartsmithConfig {
    pub export: ExportConfig,
    pub output: OutputConfig,
}

/// Defaults for the export settings. Command-line flags override these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub registry: String,
    pub organization: String,
    pub repository: String,
    pub auth_type: AuthType,
    pub use_memory_limits: bool,
    pub use_cpu_limits: bool,
    pub use_secrets_generator: bool,
    pub tag_extra: String,
    /// Version folded into image tags; the crate version when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Namespace used by plain manifests for cluster-scoped references
    pub namespace: String,
    pub external_ips: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_password: Option<String>,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub overwrite: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        let settings = ExportSettings::default();
        Self {
            registry: settings.registry,
            organization: settings.organization,
            repository: settings.repository,
            auth_type: settings.auth_type,
            use_memory_limits: settings.use_memory_limits,
            use_cpu_limits: settings.use_cpu_limits,
            use_secrets_generator: settings.use_secrets_generator,
            tag_extra: settings.tag_extra,
            version: None,
            namespace: settings.namespace,
            external_ips: settings.external_ips,
            registry_username: None,
            registry_password: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("output"),
            overwrite: false,
        }
    }
}

impl ExportConfig {
    /// Export settings seeded from this section. Chart mode, variable
    /// defaults and opinions come from the command and the manifest.
    pub fn to_export_settings(&self) -> ExportSettings {
        let mut settings = ExportSettings::default()
            .with_image_location(&self.registry, &self.organization, &self.repository)
            .with_auth_type(self.auth_type)
            .with_limits(self.use_memory_limits, self.use_cpu_limits)
            .with_secrets_generator(self.use_secrets_generator)
            .with_namespace(&self.namespace)
            .with_external_ips(self.external_ips.clone());

        let version = self.version.clone().unwrap_or_else(|| settings.version.clone());
        settings = settings.with_version(version, &self.tag_extra);

        if let Some(username) = &self.registry_username {
            let password = self.registry_password.clone().unwrap_or_default();
            settings = settings.with_registry_credentials(username, password);
        }
        settings
    }
}
