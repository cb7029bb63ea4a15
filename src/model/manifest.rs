//! The role manifest as a whole.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::{AuthConfig, ConfigurationVariable, InstanceGroup};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleManifest {
    #[serde(default)]
    pub instance_groups: Vec<InstanceGroup>,
    #[serde(default)]
    pub variables: Vec<ConfigurationVariable>,
    #[serde(default)]
    pub configuration: ManifestConfiguration,
    /// Opaque settings that feed into image tags.
    #[serde(default)]
    pub opinions: serde_yaml::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestConfiguration {
    #[serde(default)]
    pub auth: AuthConfig,
}

impl RoleManifest {
    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Read and decode a manifest file.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let manifest = Self::from_yaml_str(&content)?;
        log::debug!(
            "Loaded role manifest {} ({} instance groups, {} variables)",
            path.display(),
            manifest.instance_groups.len(),
            manifest.variables.len()
        );
        Ok(manifest)
    }

    pub fn lookup_role(&self, name: &str) -> Option<&InstanceGroup> {
        self.instance_groups.iter().find(|g| g.name == name)
    }

    /// Find a group by its upper-cased variable form, e.g. `NATS_SERVER`.
    pub fn lookup_role_by_env_name(&self, env_name: &str) -> Option<&InstanceGroup> {
        self.instance_groups
            .iter()
            .find(|g| g.var_name().to_uppercase() == env_name)
    }

    pub fn variable(&self, name: &str) -> Option<&ConfigurationVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Variables referenced by a group, sorted by name. Names with no
    /// declaration are skipped.
    pub fn variables_for_role(&self, role: &InstanceGroup) -> Vec<&ConfigurationVariable> {
        role.variable_names()
            .iter()
            .filter_map(|name| {
                let var = self.variable(name);
                if var.is_none() {
                    log::warn!("Instance group {} references undeclared variable {}", role.name, name);
                }
                var
            })
            .collect()
    }

    /// All variables sorted by name.
    pub fn sorted_variables(&self) -> Vec<&ConfigurationVariable> {
        let mut vars: Vec<_> = self.variables.iter().collect();
        vars.sort_by(|a, b| a.name.cmp(&b.name));
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
instance_groups:
  - name: api-server
    jobs:
      - name: api
        variables: [API_PORT, MISSING]
  - name: worker
variables:
  - name: API_PORT
    options: {default: 8080}
configuration:
  auth:
    accounts:
      default:
        roles: [reader]
"#;

    #[test]
    fn test_lookup() {
        let manifest = RoleManifest::from_yaml_str(MANIFEST).unwrap();
        assert!(manifest.lookup_role("worker").is_some());
        assert_eq!(
            manifest.lookup_role_by_env_name("API_SERVER").map(|g| g.name.as_str()),
            Some("api-server")
        );
        assert!(manifest.configuration.auth.accounts.contains_key("default"));
    }

    #[test]
    fn test_variables_for_role_skips_undeclared() {
        let manifest = RoleManifest::from_yaml_str(MANIFEST).unwrap();
        let role = manifest.lookup_role("api-server").unwrap();
        let names: Vec<_> = manifest
            .variables_for_role(role)
            .iter()
            .map(|v| v.name.as_str())
            .collect();
        assert_eq!(names, vec!["API_PORT"]);
    }
}
