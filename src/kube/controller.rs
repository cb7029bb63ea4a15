//! Workload controllers: replica counts, replica guards and affinity.
//!
//! In chart mode the replica count comes from `sizing.<role>.count`, which
//! the chart user can set to anything. Guard entries at the top of each
//! controller document turn bad counts into `fail` calls at render time.
//! A guard is a mapping entry whose value is a `fail` expression wrapped in
//! an `if` block, so it renders to nothing unless the condition holds.

use crate::helm::{Mapping, Node};
use crate::kube::error::{KubeError, Result};
use crate::kube::metadata::{object_metadata, role_selector};
use crate::kube::names::{count_value, sizing_value};
use crate::kube::pod::pod_template;
use crate::kube::service::{ServiceKind, service};
use crate::kube::settings::ExportSettings;
use crate::model::{InstanceGroup, RoleManifest, VolumeType};

/// Sizing keys that moved from `sizing` to `config`. Keys with a dot are
/// checked in two steps because `and` does not short-circuit.
const MOVED_SIZING_KEYS: [&str; 5] = ["HA", "cpu.limits", "cpu.requests", "memory.limits", "memory.requests"];

/// The kind of workload built for a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
    Job,
}

impl WorkloadKind {
    /// Output directory for documents of this kind.
    pub fn directory(&self) -> &'static str {
        match self {
            Self::Deployment => "deployments",
            Self::StatefulSet => "statefulsets",
            Self::Job => "jobs",
        }
    }
}

/// A role's controller and the services exposing it.
#[derive(Debug, Clone)]
pub struct RoleResources {
    pub kind: WorkloadKind,
    pub controller: Node,
    pub services: Vec<Node>,
}

impl RoleResources {
    /// Controller first, then services.
    pub fn documents(&self) -> Vec<Node> {
        std::iter::once(self.controller.clone())
            .chain(self.services.iter().cloned())
            .collect()
    }
}

/// `replicas` of a controller.
pub fn replicas(role: &InstanceGroup, settings: &ExportSettings) -> Node {
    let scaling = role.run.scaling;
    if !settings.create_chart {
        return Node::from(scaling.min);
    }

    let count = count_value(&role.var_name());
    if scaling.ha() == scaling.min {
        return Node::scalar(format!("{{{{ {count} }}}}"));
    }
    Node::scalar(format!(
        "{{{{ if and .Values.config.HA (eq (int {count}) {min}) -}}}} {ha} {{{{- else -}}}} {{{{ {count} }}}} {{{{- end }}}}",
        min = scaling.min,
        ha = scaling.ha(),
    ))
}

fn guard(condition: String, message: &str) -> Node {
    Node::scalar(format!(r#"{{{{ fail "{message}" }}}}"#)).with_block(condition)
}

/// Guard entries rejecting replica counts outside the role's bounds.
pub fn replica_guards(role: &InstanceGroup) -> Vec<(String, Node)> {
    let scaling = role.run.scaling;
    let role_var = role.var_name();
    let count = count_value(&role_var);
    let mut guards = Vec::new();

    if scaling.min > 0 {
        guards.push((
            "_minReplicas".to_string(),
            guard(
                format!("if lt (int {count}) {}", scaling.min),
                &format!("{role_var} must have at least {} instances", scaling.min),
            ),
        ));
    }

    if scaling.ha() != scaling.min {
        guards.push((
            "_minHAReplicas".to_string(),
            guard(
                format!(
                    "if and .Values.config.HA (and (ne (int {count}) {}) (lt (int {count}) {}))",
                    scaling.min,
                    scaling.ha()
                ),
                &format!("{role_var} must have at least {} instances for HA", scaling.ha()),
            ),
        ));
    }

    guards.push((
        "_maxReplicas".to_string(),
        guard(
            format!("if gt (int {count}) {}", scaling.max),
            &format!("{role_var} cannot have more than {} instances", scaling.max),
        ),
    ));

    if scaling.must_be_odd {
        guards.push((
            "_oddReplicas".to_string(),
            guard(
                format!("if eq (mod (int {count}) 2) 0"),
                &format!("{role_var} must have an odd instance count"),
            ),
        ));
    }

    guards
}

/// Guard entries rejecting values still set at their old `sizing` paths.
pub fn moved_variable_guards() -> Vec<(String, Node)> {
    MOVED_SIZING_KEYS
        .iter()
        .map(|key| {
            let mut node = Node::scalar(format!(
                r#"{{{{ fail "Bad use of moved variable sizing.{key}. The new name to use is config.{key}" }}}}"#
            ));
            if let Some((parent, _)) = key.split_once('.') {
                node = node.with_block(format!("if .Values.sizing.{parent}"));
            }
            node = node.with_block(format!("if .Values.sizing.{key}"));
            (format!("_moved_sizing_{}", key.replace('.', "_")), node)
        })
        .collect()
}

/// Guard rejecting roles with host volumes on clusters without host paths.
pub fn hostpath_guard(role: &InstanceGroup) -> Option<(String, Node)> {
    role.volumes_of(VolumeType::Host).next()?;
    Some((
        "_hostpathAvailable".to_string(),
        guard(
            "if not .Values.kube.hostpath_available".to_string(),
            &format!(
                "{} requires host path volumes; set kube.hostpath_available if the cluster supports them",
                role.var_name()
            ),
        ),
    ))
}

/// Start a controller document. Chart documents open with their guards.
pub fn controller_object(
    role: &InstanceGroup,
    settings: &ExportSettings,
    api_version: &str,
    kind: &str,
    name: &str,
    with_replica_guards: bool,
) -> Mapping {
    let mut object = Mapping::new();
    if settings.create_chart {
        let mut guards = Vec::new();
        if with_replica_guards {
            guards.extend(replica_guards(role));
        }
        guards.extend(moved_variable_guards());
        guards.extend(hostpath_guard(role));
        for (key, node) in guards {
            object.add(key, node);
        }
    }
    object.add("apiVersion", api_version);
    object.add("kind", kind);
    object.add("metadata", object_metadata(name, Some(&role.name), settings));
    object
}

/// The block wrapping a chart role's documents when it can be scaled to
/// zero.
pub fn scale_to_zero_block(role: &InstanceGroup, settings: &ExportSettings) -> Option<String> {
    if settings.create_chart && role.run.scaling.min == 0 {
        Some(format!("if gt (int {}) 0", count_value(&role.var_name())))
    } else {
        None
    }
}

/// Wrap `node` in the role's scale-to-zero block, if any.
pub fn gate(mut node: Node, role: &InstanceGroup, settings: &ExportSettings) -> Node {
    if let Some(block) = scale_to_zero_block(role, settings) {
        node.wrap_block(block);
    }
    node
}

/// The pod `affinity`. Anti-affinity passes through; node affinity only
/// comes from chart values.
pub fn affinity(role: &InstanceGroup, settings: &ExportSettings) -> Result<Option<Node>> {
    let declared = role.run.affinity.as_ref();
    let role_var = role.var_name();

    if declared.is_some_and(|a| a.node_affinity.is_some()) {
        return Err(KubeError::NodeAffinityUnsupported {
            role: role.name.clone(),
            var_name: role_var,
        });
    }
    if declared.is_some_and(|a| a.pod_affinity.is_some()) {
        return Err(KubeError::PodAffinityUnsupported {
            role: role.name.clone(),
        });
    }

    let mut affinity = Mapping::new();
    if let Some(anti) = declared.and_then(|a| a.pod_anti_affinity.as_ref()) {
        affinity.add("podAntiAffinity", Node::from_yaml(anti));
    }
    if settings.create_chart {
        let path = sizing_value(&role_var, "affinity.nodeAffinity");
        affinity.add(
            "nodeAffinity",
            Node::scalar(format!("{{{{ toJson {path} }}}}")).with_block(format!("if {path}")),
        );
    }

    Ok(if affinity.is_empty() {
        None
    } else {
        Some(Node::mapping(affinity))
    })
}

/// A Deployment for a stateless role, with its private and public
/// services.
pub fn deployment(role: &InstanceGroup, manifest: &RoleManifest, settings: &ExportSettings) -> Result<RoleResources> {
    let mut object = controller_object(role, settings, "apps/v1", "Deployment", &role.name, true);

    let spec = Mapping::new()
        .with("replicas", replicas(role, settings))
        .with("selector", role_selector(&role.name))
        .with("template", pod_template(role, manifest, settings)?);
    object.add("spec", spec);

    log::debug!("Built Deployment {}", role.name);

    let mut services = Vec::new();
    for kind in [ServiceKind::Private, ServiceKind::Public] {
        if let Some(svc) = service(role, settings, kind)? {
            services.push(gate(svc, role, settings));
        }
    }

    Ok(RoleResources {
        kind: WorkloadKind::Deployment,
        controller: gate(Node::mapping(object), role, settings),
        services,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helm::to_yaml_string;
    use crate::model::Scaling;

    fn role(name: &str, scaling: Scaling) -> InstanceGroup {
        let mut role = InstanceGroup {
            name: name.to_string(),
            ..Default::default()
        };
        role.run.scaling = scaling;
        role
    }

    fn some_group() -> InstanceGroup {
        role(
            "some-group",
            Scaling {
                min: 1,
                max: 1,
                ha: 0,
                must_be_odd: false,
            },
        )
    }

    fn guard_text(guards: &[(String, Node)], key: &str) -> String {
        let node = &guards.iter().find(|(k, _)| k == key).unwrap().1;
        let doc = Mapping::new().with(key, node.clone());
        to_yaml_string(&Node::mapping(doc))
    }

    #[test]
    fn test_replica_floor_and_ceiling_guards() {
        let guards = replica_guards(&some_group());
        let names: Vec<_> = guards.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["_minReplicas", "_maxReplicas"]);

        assert_eq!(
            guard_text(&guards, "_minReplicas"),
            "\
---
{{- if lt (int .Values.sizing.some_group.count) 1 }}
_minReplicas: {{ fail \"some_group must have at least 1 instances\" }}
{{- end }}
"
        );
        assert_eq!(
            guard_text(&guards, "_maxReplicas"),
            "\
---
{{- if gt (int .Values.sizing.some_group.count) 1 }}
_maxReplicas: {{ fail \"some_group cannot have more than 1 instances\" }}
{{- end }}
"
        );
    }

    #[test]
    fn test_ha_and_odd_guards() {
        let role = role(
            "etcd",
            Scaling {
                min: 1,
                max: 5,
                ha: 3,
                must_be_odd: true,
            },
        );
        let guards = replica_guards(&role);
        let names: Vec<_> = guards.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["_minReplicas", "_minHAReplicas", "_maxReplicas", "_oddReplicas"]);
        assert!(guard_text(&guards, "_minHAReplicas").contains(
            "{{- if and .Values.config.HA (and (ne (int .Values.sizing.etcd.count) 1) (lt (int .Values.sizing.etcd.count) 3)) }}\n\
             _minHAReplicas: {{ fail \"etcd must have at least 3 instances for HA\" }}\n"
        ));
        assert!(guard_text(&guards, "_oddReplicas").contains(
            "{{- if eq (mod (int .Values.sizing.etcd.count) 2) 0 }}\n_oddReplicas: {{ fail \"etcd must have an odd instance count\" }}\n"
        ));
    }

    #[test]
    fn test_zero_minimum_has_no_floor_guard() {
        let role = role(
            "optional",
            Scaling {
                min: 0,
                max: 2,
                ha: 0,
                must_be_odd: false,
            },
        );
        let names: Vec<_> = replica_guards(&role).into_iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["_maxReplicas"]);
        assert_eq!(
            scale_to_zero_block(&role, &ExportSettings::chart()).as_deref(),
            Some("if gt (int .Values.sizing.optional.count) 0")
        );
        assert_eq!(scale_to_zero_block(&role, &ExportSettings::default()), None);
    }

    #[test]
    fn test_moved_variable_guards() {
        let guards = moved_variable_guards();
        assert_eq!(
            guard_text(&guards, "_moved_sizing_HA"),
            "\
---
{{- if .Values.sizing.HA }}
_moved_sizing_HA: {{ fail \"Bad use of moved variable sizing.HA. The new name to use is config.HA\" }}
{{- end }}
"
        );
        assert_eq!(
            guard_text(&guards, "_moved_sizing_memory_requests"),
            "\
---
{{- if .Values.sizing.memory }}
{{- if .Values.sizing.memory.requests }}
_moved_sizing_memory_requests: {{ fail \"Bad use of moved variable sizing.memory.requests. The new name to use is config.memory.requests\" }}
{{- end }}
{{- end }}
"
        );
    }

    #[test]
    fn test_replicas() {
        let group = some_group();
        assert_eq!(replicas(&group, &ExportSettings::default()).as_scalar(), Some("1"));
        assert_eq!(
            replicas(&group, &ExportSettings::chart()).as_scalar(),
            Some("{{ .Values.sizing.some_group.count }}")
        );

        let ha = role(
            "api",
            Scaling {
                min: 1,
                max: 3,
                ha: 2,
                must_be_odd: false,
            },
        );
        assert_eq!(
            replicas(&ha, &ExportSettings::chart()).as_scalar(),
            Some(
                "{{ if and .Values.config.HA (eq (int .Values.sizing.api.count) 1) -}} 2 {{- else -}} {{ .Values.sizing.api.count }} {{- end }}"
            )
        );
    }

    #[test]
    fn test_affinity() {
        let mut group = some_group();
        assert!(affinity(&group, &ExportSettings::default()).unwrap().is_none());

        let chart = affinity(&group, &ExportSettings::chart()).unwrap().unwrap();
        assert_eq!(
            to_yaml_string(&chart),
            "\
---
{{- if .Values.sizing.some_group.affinity.nodeAffinity }}
nodeAffinity: {{ toJson .Values.sizing.some_group.affinity.nodeAffinity }}
{{- end }}
"
        );

        let anti: serde_yaml::Value = serde_yaml::from_str("{preferredDuringSchedulingIgnoredDuringExecution: []}").unwrap();
        group.run.affinity = Some(crate::model::Affinity {
            pod_anti_affinity: Some(anti),
            ..Default::default()
        });
        let plain = affinity(&group, &ExportSettings::default()).unwrap().unwrap();
        assert!(plain.get(&["podAntiAffinity"]).is_some());

        group.run.affinity.as_mut().unwrap().node_affinity = Some(serde_yaml::from_str("{a: b}").unwrap());
        assert!(matches!(
            affinity(&group, &ExportSettings::default()),
            Err(KubeError::NodeAffinityUnsupported { .. })
        ));

        group.run.affinity.as_mut().unwrap().node_affinity = None;
        group.run.affinity.as_mut().unwrap().pod_affinity = Some(serde_yaml::from_str("{a: b}").unwrap());
        assert_eq!(
            affinity(&group, &ExportSettings::default()),
            Err(KubeError::PodAffinityUnsupported {
                role: "some-group".to_string()
            })
        );
    }

    #[test]
    fn test_chart_deployment_opens_with_guards() {
        let manifest = RoleManifest::default();
        let resources = deployment(&some_group(), &manifest, &ExportSettings::chart()).unwrap();
        let yaml = to_yaml_string(&resources.controller);
        let guard_pos = yaml.find("_minReplicas").unwrap();
        let api_pos = yaml.find("apiVersion: apps/v1").unwrap();
        assert!(guard_pos < api_pos);
        assert!(yaml.contains("_moved_sizing_cpu_limits"));
        assert!(!yaml.contains("_hostpathAvailable"));
        assert!(resources.services.is_empty());
    }

    #[test]
    fn test_plain_deployment() {
        let manifest = RoleManifest::default();
        let resources = deployment(&some_group(), &manifest, &ExportSettings::default()).unwrap();
        assert_eq!(resources.kind, WorkloadKind::Deployment);
        let yaml = to_yaml_string(&resources.controller);
        assert!(yaml.starts_with("---\napiVersion: apps/v1\nkind: Deployment\n"));
        assert!(!yaml.contains("fail"));

        let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed["spec"]["replicas"].as_u64(), Some(1));
        assert_eq!(
            parsed["spec"]["selector"]["matchLabels"]["app.kubernetes.io/component"].as_str(),
            Some("some-group")
        );
    }

    #[test]
    fn test_hostpath_guard() {
        let mut group = some_group();
        assert!(hostpath_guard(&group).is_none());
        group.run.volumes.push(crate::model::RoleVolume {
            volume_type: VolumeType::Host,
            tag: "docker".to_string(),
            path: "/var/run/docker".to_string(),
            size: 0,
            storage_class: None,
        });
        let (key, node) = hostpath_guard(&group).unwrap();
        assert_eq!(key, "_hostpathAvailable");
        assert_eq!(node.block(), Some("if not .Values.kube.hostpath_available"));
    }
}
