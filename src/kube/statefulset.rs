//! StatefulSets for roles that keep state or need stable identities.

use crate::helm::{Mapping, Node};
use crate::kube::controller::{RoleResources, WorkloadKind, controller_object, gate, replicas};
use crate::kube::error::Result;
use crate::kube::metadata::role_selector;
use crate::kube::names::{make_var_name, sizing_value};
use crate::kube::pod::pod_template;
use crate::kube::service::{ServiceKind, service};
use crate::kube::settings::ExportSettings;
use crate::model::{InstanceGroup, RoleManifest, RoleVolume, VolumeType};

/// A StatefulSet with its private, public and headless services.
pub fn stateful_set(role: &InstanceGroup, manifest: &RoleManifest, settings: &ExportSettings) -> Result<RoleResources> {
    let mut object = controller_object(role, settings, "apps/v1", "StatefulSet", &role.name, true);

    let mut spec = Mapping::new();
    spec.add("podManagementPolicy", "Parallel");
    spec.add("replicas", replicas(role, settings));
    spec.add("serviceName", ServiceKind::Headless.service_name(&role.name));
    spec.add("selector", role_selector(&role.name));
    spec.add("template", pod_template(role, manifest, settings)?);

    let claims: Vec<Node> = role
        .claim_volumes()
        .map(|volume| volume_claim_template(role, volume, settings))
        .collect();
    if !claims.is_empty() {
        spec.add("volumeClaimTemplates", Node::list(claims));
    }
    object.add("spec", spec);

    log::debug!("Built StatefulSet {}", role.name);

    let mut services = Vec::new();
    for kind in [ServiceKind::Private, ServiceKind::Public, ServiceKind::Headless] {
        if let Some(svc) = service(role, settings, kind)? {
            services.push(gate(svc, role, settings));
        }
    }

    Ok(RoleResources {
        kind: WorkloadKind::StatefulSet,
        controller: gate(Node::mapping(object), role, settings),
        services,
    })
}

fn volume_claim_template(role: &InstanceGroup, volume: &RoleVolume, settings: &ExportSettings) -> Node {
    let (access_mode, class_key) = match volume.volume_type {
        VolumeType::Shared => ("ReadWriteMany", "shared"),
        _ => ("ReadWriteOnce", "persistent"),
    };

    let storage = if settings.create_chart {
        let path = sizing_value(&role.var_name(), &format!("disk_sizes.{}", make_var_name(&volume.tag)));
        Node::scalar(format!("{{{{ {path} }}}}Gi"))
    } else {
        Node::from(format!("{}Gi", volume.size))
    };

    let mut spec = Mapping::new();
    spec.add("accessModes", Node::list(vec![Node::from(access_mode)]));
    spec.add(
        "resources",
        Mapping::new().with("requests", Mapping::new().with("storage", storage)),
    );
    match (&volume.storage_class, settings.create_chart) {
        (Some(class), _) => {
            spec.add("storageClassName", class.as_str());
        }
        (None, true) => {
            spec.add(
                "storageClassName",
                Node::scalar(format!("{{{{ .Values.kube.storage_class.{class_key} | quote }}}}")),
            );
        }
        (None, false) => {}
    }

    Node::mapping(
        Mapping::new()
            .with("metadata", Mapping::new().with("name", volume.tag.as_str()))
            .with("spec", spec),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helm::to_yaml_string;

    const MANIFEST: &str = r#"
instance_groups:
  - name: mysql
    tags: [clustered]
    run:
      scaling: {min: 0, max: 3}
      exposed_ports:
        - {name: mysql, internal: 3306}
      volumes:
        - {type: persistent, tag: mysql-data, path: /var/lib/mysql, size: 20}
        - {type: shared, tag: backups, path: /backups, size: 5, storage_class: nfs}
"#;

    fn build(settings: &ExportSettings) -> RoleResources {
        let manifest = RoleManifest::from_yaml_str(MANIFEST).unwrap();
        stateful_set(&manifest.instance_groups[0], &manifest, settings).unwrap()
    }

    #[test]
    fn test_plain_stateful_set() {
        let resources = build(&ExportSettings::default());
        assert_eq!(resources.kind, WorkloadKind::StatefulSet);
        let yaml = to_yaml_string(&resources.controller);
        let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        let spec = &parsed["spec"];
        assert_eq!(spec["podManagementPolicy"].as_str(), Some("Parallel"));
        assert_eq!(spec["serviceName"].as_str(), Some("mysql-set"));
        assert_eq!(spec["replicas"].as_u64(), Some(0));

        let claims = spec["volumeClaimTemplates"].as_sequence().unwrap();
        assert_eq!(claims.len(), 2);
        assert_eq!(claims[0]["metadata"]["name"].as_str(), Some("mysql-data"));
        assert_eq!(claims[0]["spec"]["accessModes"][0].as_str(), Some("ReadWriteOnce"));
        assert_eq!(claims[0]["spec"]["resources"]["requests"]["storage"].as_str(), Some("20Gi"));
        assert!(claims[0]["spec"].get("storageClassName").is_none());
        assert_eq!(claims[1]["spec"]["accessModes"][0].as_str(), Some("ReadWriteMany"));
        assert_eq!(claims[1]["spec"]["storageClassName"].as_str(), Some("nfs"));
    }

    #[test]
    fn test_three_services() {
        let resources = build(&ExportSettings::default());
        let names: Vec<_> = resources
            .services
            .iter()
            .filter_map(|s| s.get(&["metadata", "name"]).and_then(Node::as_scalar))
            .collect();
        // The port is not public, so there is no public service.
        assert_eq!(names, vec!["mysql", "mysql-set"]);
    }

    #[test]
    fn test_chart_stateful_set_scales_to_zero() {
        let resources = build(&ExportSettings::chart());
        let yaml = to_yaml_string(&resources.controller);
        assert!(yaml.starts_with("---\n{{- if gt (int .Values.sizing.mysql.count) 0 }}\n"));
        assert!(yaml.ends_with("{{- end }}\n"));
        assert!(yaml.contains("storage: {{ .Values.sizing.mysql.disk_sizes.mysql_data }}Gi"));
        assert!(!yaml.contains("_minReplicas"));
        assert!(yaml.contains("_maxReplicas"));

        for svc in &resources.services {
            assert_eq!(svc.block(), Some("if gt (int .Values.sizing.mysql.count) 0"));
        }
    }
}
