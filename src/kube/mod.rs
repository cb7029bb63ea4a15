//! Builders lowering a role manifest into orchestrator documents.
//!
//! Each builder takes the manifest entity it describes plus the
//! [`ExportSettings`] and returns a [`Node`](crate::helm::Node) tree. With
//! `create_chart` set the trees carry template expressions, guards and
//! value references; without it they are concrete resources.

pub mod controller;
pub mod error;
pub mod job;
pub mod metadata;
pub mod names;
pub mod pod;
pub mod ports;
pub mod probes;
pub mod rbac;
pub mod registry;
pub mod secrets;
pub mod service;
pub mod settings;
pub mod statefulset;
pub mod values;

use std::path::PathBuf;

pub use controller::{RoleResources, WorkloadKind};
pub use error::{KubeError, Result};
pub use settings::{AuthType, ExportSettings, RegistryCredentials};

use crate::helm::{Node, render_documents};
use crate::model::{InstanceGroup, RoleManifest, RoleType};

/// Tag marking a long-running group that needs stable identities.
pub const CLUSTERED_TAG: &str = "clustered";

/// One output file: documents written to `<directory>/<name>.yaml`.
#[derive(Debug, Clone)]
pub struct Resource {
    pub directory: String,
    pub name: String,
    pub documents: Vec<Node>,
}

impl Resource {
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(&self.directory).join(format!("{}.yaml", self.name))
    }

    pub fn render(&self) -> String {
        render_documents(&self.documents)
    }
}

/// The workload kind used for `role`, or `None` for groups that only run
/// as colocated containers.
pub fn workload_kind(role: &InstanceGroup) -> Option<WorkloadKind> {
    match role.role_type {
        RoleType::ColocatedContainer => None,
        RoleType::BoshTask => Some(WorkloadKind::Job),
        RoleType::Bosh if role.claim_volumes().next().is_some() || role.has_tag(CLUSTERED_TAG) => {
            Some(WorkloadKind::StatefulSet)
        }
        RoleType::Bosh => Some(WorkloadKind::Deployment),
    }
}

/// Build the controller and services for one instance group.
pub fn build_role(
    role: &InstanceGroup,
    manifest: &RoleManifest,
    settings: &ExportSettings,
) -> Result<Option<RoleResources>> {
    let resources = match workload_kind(role) {
        None => {
            log::debug!("Skipping colocated container group {}", role.name);
            return Ok(None);
        }
        Some(WorkloadKind::Job) => job::job(role, manifest, settings)?,
        Some(WorkloadKind::StatefulSet) => statefulset::stateful_set(role, manifest, settings)?,
        Some(WorkloadKind::Deployment) => controller::deployment(role, manifest, settings)?,
    };
    Ok(Some(resources))
}

/// Every resource file for the manifest: one per instance group, the
/// secret, the registry credentials and the authorization objects.
pub fn build_resources(manifest: &RoleManifest, settings: &ExportSettings) -> Result<Vec<Resource>> {
    let mut resources = Vec::new();

    for role in &manifest.instance_groups {
        if let Some(built) = build_role(role, manifest, settings)? {
            resources.push(Resource {
                directory: built.kind.directory().to_string(),
                name: role.name.clone(),
                documents: built.documents(),
            });
        }
    }

    resources.push(Resource {
        directory: "secrets".to_string(),
        name: "secret".to_string(),
        documents: vec![secrets::secret(&manifest.sorted_variables(), settings)],
    });
    resources.push(Resource {
        directory: "secrets".to_string(),
        name: registry::REGISTRY_CREDENTIALS_NAME.to_string(),
        documents: vec![registry::registry_credentials(settings)],
    });

    for doc in rbac::auth_documents(&manifest.configuration.auth, settings) {
        resources.push(Resource {
            directory: "auth".to_string(),
            name: doc.name,
            documents: doc.documents,
        });
    }

    log::debug!("Built {} resource files", resources.len());
    Ok(resources)
}
