//! Run-to-completion roles, emitted as Jobs.

use crate::helm::{Mapping, Node};
use crate::kube::controller::{RoleResources, WorkloadKind, controller_object};
use crate::kube::error::{KubeError, Result};
use crate::kube::pod::pod_template;
use crate::kube::settings::ExportSettings;
use crate::model::{FlightStage, InstanceGroup, RoleManifest};

/// Restart policy for a task by flight stage. Manual tasks are never
/// restarted.
pub fn restart_policy(role: &InstanceGroup) -> Result<&'static str> {
    match &role.run.flight_stage {
        FlightStage::Manual => Ok("Never"),
        FlightStage::Flight | FlightStage::PreFlight | FlightStage::PostFlight => Ok("OnFailure"),
        FlightStage::Other(stage) => Err(KubeError::UnknownFlightStage {
            role: role.name.clone(),
            stage: stage.clone(),
        }),
    }
}

/// Jobs are immutable once created, so chart jobs carry the release
/// revision in their name.
fn job_name(role: &InstanceGroup, settings: &ExportSettings) -> String {
    if settings.create_chart {
        format!("{}-{{{{ .Release.Revision }}}}", role.name)
    } else {
        role.name.clone()
    }
}

pub fn job(role: &InstanceGroup, manifest: &RoleManifest, settings: &ExportSettings) -> Result<RoleResources> {
    let restart = restart_policy(role)?;
    let name = job_name(role, settings);
    let mut object = controller_object(role, settings, "batch/v1", "Job", &name, false);

    let mut template = pod_template(role, manifest, settings)?;
    template.set_path(&["spec", "restartPolicy"], Node::from(restart))?;
    object.add("spec", Mapping::new().with("template", template));

    log::debug!("Built Job {} ({})", role.name, role.run.flight_stage);

    Ok(RoleResources {
        kind: WorkloadKind::Job,
        controller: Node::mapping(object),
        services: Vec::new(),
    })
}
