//! Pod templates and their containers.
//!
//! A pod runs the instance group's own container plus one container per
//! colocated group it lists. Everything a container needs (image, ports,
//! environment, mounts, resources, capabilities, probes) is derived from
//! the role manifest and the export settings.

use std::collections::BTreeSet;

use crate::helm::{Mapping, Node};
use crate::kube::controller::affinity;
use crate::kube::error::{KubeError, Result};
use crate::kube::metadata::labels;
use crate::kube::names::{count_value, make_secret_key, sizing_value};
use crate::kube::ports::{port_definitions, range_prefix};
use crate::kube::probes::{ProbeKind, container_probe};
use crate::kube::registry::REGISTRY_CREDENTIALS_NAME;
use crate::kube::secrets::env_secret_name;
use crate::kube::settings::{AuthType, ExportSettings};
use crate::model::{ConfigurationVariable, InstanceGroup, RoleManifest, RoleVolume, VolumeType};

/// Script run by every container before it is stopped.
pub const PRE_STOP_SCRIPT: &str = "/opt/chartsmith/pre-stop.sh";

pub const TERMINATION_GRACE_PERIOD: u32 = 600;

/// Length of the image tag.
const IMAGE_TAG_LENGTH: usize = 40;

/// Environment variables of this shape carry another group's replica count.
const SIZING_PREFIX: &str = "KUBE_SIZING_";
const SIZING_SUFFIX: &str = "_COUNT";

/// `metadata` and `spec` of a pod for `role`.
pub fn pod_template(role: &InstanceGroup, manifest: &RoleManifest, settings: &ExportSettings) -> Result<Mapping> {
    let mut meta = Mapping::new();
    meta.add("name", role.name.as_str());
    meta.add("labels", labels(Some(&role.name), settings));
    if settings.create_chart {
        // Roll the pods whenever the secrets change.
        meta.add(
            "annotations",
            Mapping::new().with(
                "checksum/config",
                Node::scalar(r#"{{ include (print $.Template.BasePath "/secrets/secret.yaml") . | sha256sum }}"#),
            ),
        );
    }

    Ok(Mapping::new()
        .with("metadata", meta)
        .with("spec", pod_spec(role, manifest, settings)?))
}

/// The pod spec. Controllers override `restartPolicy` where needed.
pub fn pod_spec(role: &InstanceGroup, manifest: &RoleManifest, settings: &ExportSettings) -> Result<Mapping> {
    let colocated = colocated_roles(role, manifest)?;

    let mut containers = vec![container(role, manifest, settings)?];
    for other in &colocated {
        containers.push(container(other, manifest, settings)?);
    }

    let mut spec = Mapping::new();
    spec.add("containers", Node::list(containers));
    spec.add(
        "imagePullSecrets",
        Node::list(vec![Node::mapping(Mapping::new().with("name", REGISTRY_CREDENTIALS_NAME))]),
    );
    spec.add("dnsPolicy", "ClusterFirst");
    spec.add("restartPolicy", "Always");
    spec.add("terminationGracePeriodSeconds", TERMINATION_GRACE_PERIOD);

    let volumes = pod_volumes(std::iter::once(role).chain(colocated.iter().copied()));
    if !volumes.is_empty() {
        spec.add("volumes", Node::list(volumes));
    }

    if let Some(affinity) = affinity(role, settings)? {
        spec.add("affinity", affinity);
    }

    if let Some(account) = service_account(role, settings) {
        spec.add("serviceAccountName", account);
    }

    Ok(spec)
}

fn colocated_roles<'a>(role: &InstanceGroup, manifest: &'a RoleManifest) -> Result<Vec<&'a InstanceGroup>> {
    role.colocated_containers
        .iter()
        .map(|name| {
            manifest
                .lookup_role(name)
                .ok_or_else(|| KubeError::UnknownColocatedContainer {
                    role: role.name.clone(),
                    container: name.clone(),
                })
        })
        .collect()
}

fn service_account(role: &InstanceGroup, settings: &ExportSettings) -> Option<Node> {
    let account = role.run.service_account.as_deref().filter(|a| *a != "default")?;
    if settings.create_chart {
        Some(Node::scalar(format!(
            r#"{{{{ if eq .Values.kube.auth "rbac" }}}}{account}{{{{ else }}}}default{{{{ end }}}}"#
        )))
    } else if settings.auth_type == AuthType::Rbac {
        Some(Node::from(account))
    } else {
        None
    }
}

/// One container running `role`'s image.
pub fn container(role: &InstanceGroup, manifest: &RoleManifest, settings: &ExportSettings) -> Result<Node> {
    let mut container = Mapping::new();
    container.add("name", role.name.as_str());
    container.add("image", Node::scalar(image_reference(role, settings)?));

    let ports = container_ports(role, settings)?;
    if !ports.is_empty() {
        container.add("ports", Node::list(ports));
    }

    container.add("env", Node::list(container_env(role, manifest, settings)?));

    let mounts = volume_mounts(role);
    if !mounts.is_empty() {
        container.add("volumeMounts", Node::list(mounts));
    }

    let resources = resources(role, settings);
    if !resources.is_empty() {
        container.add("resources", resources);
    }

    let security = security_context(role, settings);
    if !security.is_empty() {
        container.add("securityContext", security);
    }

    for kind in [ProbeKind::Liveness, ProbeKind::Readiness] {
        if let Some(probe) = container_probe(role, kind)? {
            container.add(kind.field(), probe);
        }
    }

    container.add(
        "lifecycle",
        Mapping::new().with(
            "preStop",
            Mapping::new().with(
                "exec",
                Mapping::new().with("command", Node::list(vec![Node::from(PRE_STOP_SCRIPT)])),
            ),
        ),
    );

    Ok(Node::mapping(container))
}

/// `<registry>/<org>/<repository>-<role>:<tag>`. Charts take registry and
/// organization from values.
pub fn image_reference(role: &InstanceGroup, settings: &ExportSettings) -> Result<String> {
    let (registry, organization) = if settings.create_chart {
        (
            "{{ .Values.kube.registry.hostname }}".to_string(),
            "{{ .Values.kube.organization }}".to_string(),
        )
    } else {
        (settings.registry.clone(), settings.organization.clone())
    };
    Ok(format!(
        "{}/{}/{}-{}:{}",
        registry,
        organization,
        settings.repository,
        role.name,
        image_tag(role, settings)?
    ))
}

/// Content hash over everything that goes into the role's image.
pub fn image_tag(role: &InstanceGroup, settings: &ExportSettings) -> Result<String> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(role.name.as_bytes());
    for job in &role.jobs {
        hasher.update(b"\0");
        hasher.update(job.name.as_bytes());
        hasher.update(b"\0");
        hasher.update(job.release.as_bytes());
        hasher.update(b"\0");
        hasher.update(job.fingerprint.as_deref().unwrap_or("").as_bytes());
    }
    let opinions = serde_yaml::to_string(&settings.opinions).map_err(|e| KubeError::InvalidOpinions {
        reason: e.to_string(),
    })?;
    hasher.update(b"\0");
    hasher.update(opinions.as_bytes());
    hasher.update(b"\0");
    hasher.update(settings.tag_extra.as_bytes());
    hasher.update(b"\0");
    hasher.update(settings.version.as_bytes());

    let hex = hasher.finalize().to_hex();
    Ok(hex.as_str()[..IMAGE_TAG_LENGTH].to_string())
}

fn container_ports(role: &InstanceGroup, settings: &ExportSettings) -> Result<Vec<Node>> {
    let role_var = role.var_name();
    let mut ports = Vec::new();

    for definition in port_definitions(role)? {
        if settings.create_chart && definition.count_is_configurable {
            let prefix = range_prefix(&definition.name, definition.count())?;
            let port = Mapping::new()
                .with("containerPort", Node::scalar(format!("{{{{ add {} $i }}}}", definition.internal.0)))
                .with("name", Node::scalar(format!("{prefix}-{{{{ $i }}}}")))
                .with("protocol", definition.protocol.as_str());
            ports.push(Node::mapping(port).with_block(format!(
                "range $i := until (int {})",
                definition.count_value(&role_var)
            )));
            continue;
        }

        for info in definition.container_ports()? {
            ports.push(Node::mapping(
                Mapping::new()
                    .with("containerPort", info.port)
                    .with("name", info.name)
                    .with("protocol", definition.protocol.as_str()),
            ));
        }
    }

    Ok(ports)
}

/// Environment entries sorted by name, followed by `KUBERNETES_NAMESPACE`.
fn container_env(role: &InstanceGroup, manifest: &RoleManifest, settings: &ExportSettings) -> Result<Vec<Node>> {
    let mut entries = Vec::new();

    for var in manifest.variables_for_role(role) {
        if var.options.internal {
            continue;
        }
        if let Some(entry) = env_entry(role, var, manifest, settings)? {
            entries.push((var.name.clone(), entry));
        }
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut env: Vec<Node> = entries.into_iter().map(|(_, entry)| entry).collect();
    env.push(Node::mapping(
        Mapping::new().with("name", "KUBERNETES_NAMESPACE").with(
            "valueFrom",
            Mapping::new().with("fieldRef", Mapping::new().with("fieldPath", "metadata.namespace")),
        ),
    ));
    Ok(env)
}

fn env_entry(
    role: &InstanceGroup,
    var: &ConfigurationVariable,
    manifest: &RoleManifest,
    settings: &ExportSettings,
) -> Result<Option<Node>> {
    let name = var.name.as_str();

    if let Some(target) = sizing_target(name) {
        let target_role = manifest
            .lookup_role_by_env_name(target)
            .ok_or_else(|| KubeError::UnknownSizingRole {
                variable: name.to_string(),
                target: target.to_string(),
            })?;
        let value = if settings.create_chart {
            Node::scalar(format!("{{{{ {} | quote }}}}", count_value(&target_role.var_name())))
        } else {
            Node::string(target_role.run.scaling.min.to_string())
        };
        return Ok(Some(env_value(name, value)));
    }

    if var.is_secret() {
        let secret_ref = Mapping::new()
            .with("key", make_secret_key(name))
            .with("name", Node::string(env_secret_name(var, settings)));
        return Ok(Some(Node::mapping(
            Mapping::new()
                .with("name", name)
                .with("valueFrom", Mapping::new().with("secretKeyRef", secret_ref)),
        )));
    }

    if settings.create_chart {
        let value = if var.options.required || var.options.default.is_none() {
            format!(r#"{{{{ required "{name} configuration missing" .Values.env.{name} | quote }}}}"#)
        } else {
            format!("{{{{ .Values.env.{name} | quote }}}}")
        };
        return Ok(Some(env_value(name, Node::scalar(value))));
    }

    let value = settings
        .defaults
        .get(name)
        .cloned()
        .or_else(|| var.default_string());
    match value {
        Some(value) => Ok(Some(env_value(name, Node::literal(value)))),
        None => {
            log::warn!("Instance group {}: no value for {}, leaving it unset", role.name, name);
            Ok(None)
        }
    }
}

fn env_value(name: &str, value: Node) -> Node {
    Node::mapping(Mapping::new().with("name", name).with("value", value))
}

/// `KUBE_SIZING_NATS_SERVER_COUNT` → `NATS_SERVER`.
fn sizing_target(name: &str) -> Option<&str> {
    name.strip_prefix(SIZING_PREFIX)?
        .strip_suffix(SIZING_SUFFIX)
        .filter(|target| !target.is_empty())
}

const MOUNT_ORDER: [VolumeType; 4] = [
    VolumeType::Persistent,
    VolumeType::Shared,
    VolumeType::Host,
    VolumeType::Emptydir,
];

fn volume_mounts(role: &InstanceGroup) -> Vec<Node> {
    MOUNT_ORDER
        .iter()
        .flat_map(|volume_type| role.volumes_of(*volume_type))
        .map(|volume| {
            Node::mapping(
                Mapping::new()
                    .with("mountPath", volume.path.as_str())
                    .with("name", volume.tag.as_str())
                    .with("readOnly", false),
            )
        })
        .collect()
}

/// Pod-level volumes for host and empty-dir mounts. Claims are provided by
/// the controller.
fn pod_volumes<'a>(roles: impl Iterator<Item = &'a InstanceGroup>) -> Vec<Node> {
    let mut seen = BTreeSet::new();
    let mut volumes = Vec::new();
    for role in roles {
        for volume in role.run.volumes.iter().filter(|v| !v.volume_type.is_claim()) {
            if seen.insert(volume.tag.clone()) {
                volumes.push(pod_volume(volume));
            }
        }
    }
    volumes
}

fn pod_volume(volume: &RoleVolume) -> Node {
    let mut mapping = Mapping::new();
    mapping.add("name", volume.tag.as_str());
    match volume.volume_type {
        VolumeType::Host => {
            mapping.add(
                "hostPath",
                Mapping::new()
                    .with("path", volume.path.as_str())
                    .with("type", "Directory"),
            );
        }
        _ => {
            mapping.add("emptyDir", Mapping::new());
        }
    }
    Node::mapping(mapping)
}

fn resources(role: &InstanceGroup, settings: &ExportSettings) -> Mapping {
    if settings.create_chart {
        return chart_resources(role, settings);
    }

    let mut requests = Mapping::new();
    let mut limits = Mapping::new();
    if settings.use_memory_limits {
        if let Some(memory) = role.run.memory {
            if let Some(request) = memory.request {
                requests.add("memory", format!("{request}Mi"));
            }
            if let Some(limit) = memory.limit {
                limits.add("memory", format!("{limit}Mi"));
            }
        }
    }
    if settings.use_cpu_limits {
        if let Some(cpu) = role.run.cpu {
            if let Some(request) = cpu.request {
                requests.add("cpu", format!("{}m", millicores(request)));
            }
            if let Some(limit) = cpu.limit {
                limits.add("cpu", format!("{}m", millicores(limit)));
            }
        }
    }

    let mut resources = Mapping::new();
    if !requests.is_empty() {
        resources.add("requests", requests);
    }
    if !limits.is_empty() {
        resources.add("limits", limits);
    }
    resources
}

/// Resources read from `sizing.<role>`, each gated on the matching
/// `config` toggle and on the value being set.
fn chart_resources(role: &InstanceGroup, settings: &ExportSettings) -> Mapping {
    let role_var = role.var_name();
    let mut kinds = Vec::new();
    if settings.use_memory_limits {
        kinds.push(("memory", "Mi"));
    }
    if settings.use_cpu_limits {
        kinds.push(("cpu", "m"));
    }

    let mut resources = Mapping::new();
    if kinds.is_empty() {
        return resources;
    }
    for level in ["requests", "limits"] {
        let mut entries = Mapping::new();
        for (kind, unit) in &kinds {
            let path = sizing_value(&role_var, &format!("{kind}.{level}"));
            entries.add(
                *kind,
                Node::scalar(format!("{{{{ int {path} }}}}{unit}"))
                    .with_block(format!("if and .Values.config.{kind}.{level} {path}")),
            );
        }
        resources.add(level, entries);
    }
    resources
}

pub(crate) fn millicores(cores: f64) -> u64 {
    (cores * 1000.0).round().max(0.0) as u64
}

/// Container capabilities. `ALL` runs the container privileged instead. In
/// charts `sizing.<role>.capabilities` may add more, including `ALL`.
fn security_context(role: &InstanceGroup, settings: &ExportSettings) -> Mapping {
    let capabilities: Vec<String> = role.run.capabilities.iter().map(|c| c.to_uppercase()).collect();

    if capabilities.iter().any(|c| c == "ALL") {
        return Mapping::new().with("privileged", true);
    }

    let mut add: Vec<Node> = capabilities.into_iter().map(Node::from).collect();
    if !settings.create_chart {
        if add.is_empty() {
            return Mapping::new();
        }
        return Mapping::new().with("capabilities", Mapping::new().with("add", Node::list(add)));
    }

    let path = sizing_value(&role.var_name(), "capabilities");
    let wants_all = format!(r#"has "ALL" (splitList "," (join "," (default (list) {path}) | upper))"#);
    add.push(Node::scalar("{{ . | upper }}").with_block(format!("range {path}")));
    Mapping::new()
        .with("privileged", Node::from(true).with_block(format!("if {wants_all}")))
        .with(
            "capabilities",
            Node::mapping(Mapping::new().with("add", Node::list(add))).with_block(format!("if not ({wants_all})")),
        )
}
