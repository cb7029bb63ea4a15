//! Authorization section of the role manifest.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Namespaced roles by name.
    #[serde(default)]
    pub roles: BTreeMap<String, Vec<AuthRule>>,
    /// Cluster-wide roles by name.
    #[serde(default)]
    pub cluster_roles: BTreeMap<String, Vec<AuthRule>>,
    /// Pod security policy specs by name, passed through unchanged.
    #[serde(default)]
    pub pod_security_policies: BTreeMap<String, serde_yaml::Value>,
    /// Service accounts and what they are granted.
    #[serde(default)]
    pub accounts: BTreeMap<String, AuthAccount>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRule {
    #[serde(default)]
    pub api_groups: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub verbs: Vec<String>,
    #[serde(default)]
    pub resource_names: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthAccount {
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub cluster_roles: Vec<String>,
    #[serde(default)]
    pub pod_security_policy: Option<String>,
}
