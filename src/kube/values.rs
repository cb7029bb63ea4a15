//! The chart's default values document.
//!
//! Every `.Values` path the templates read without a `required` guard has
//! a default here.

use crate::helm::{Mapping, Node};
use crate::kube::error::Result;
use crate::kube::names::make_var_name;
use crate::kube::pod::millicores;
use crate::kube::ports::port_definitions;
use crate::kube::settings::ExportSettings;
use crate::model::{ConfigurationVariable, GeneratorType, InstanceGroup, RoleManifest, RoleType};

fn default_value(var: &ConfigurationVariable) -> Node {
    match var.default_string() {
        Some(value) => Node::literal(value),
        None => Node::null(),
    }
}

fn is_sizing_variable(name: &str) -> bool {
    name.starts_with("KUBE_SIZING_")
}

/// Build `values.yaml`.
pub fn values(manifest: &RoleManifest, settings: &ExportSettings) -> Result<Node> {
    let mut values = Mapping::new();

    values.add(
        "bosh",
        Mapping::new().with("instance_groups", Node::list(Vec::new())),
    );
    values.add("config", config_values(settings));
    values.add("env", env_values(manifest));
    values.add("kube", kube_values(manifest, settings));
    values.add("secrets", secret_values(manifest));
    values.add(
        "services",
        Mapping::new().with(
            "loadbalanced",
            Node::from(false).with_comment("Expose public services through load balancers."),
        ),
    );
    values.add("sizing", sizing_values(manifest)?);
    values.sort();

    Ok(Node::mapping(values))
}

fn config_values(settings: &ExportSettings) -> Mapping {
    let toggles = |enabled: bool| Mapping::new().with("limits", enabled).with("requests", enabled);
    Mapping::new()
        .with(
            "HA",
            Node::from(false).with_comment("Raise replica counts at their minimum to the HA minimum."),
        )
        .with(
            "cpu",
            Node::mapping(toggles(settings.use_cpu_limits)).with_comment("Apply CPU requests and limits from sizing."),
        )
        .with(
            "memory",
            Node::mapping(toggles(settings.use_memory_limits))
                .with_comment("Apply memory requests and limits from sizing."),
        )
}

fn env_values(manifest: &RoleManifest) -> Mapping {
    let mut env = Mapping::new();
    for var in manifest.sorted_variables() {
        if var.is_secret() || var.options.internal || is_sizing_variable(&var.name) {
            continue;
        }
        env.add(var.name.as_str(), default_value(var).with_comment(var.options.description.trim_end()));
    }
    env
}

fn secret_values(manifest: &RoleManifest) -> Mapping {
    let mut secrets = Mapping::new();
    for var in manifest.sorted_variables() {
        if !var.is_secret() || var.options.internal {
            continue;
        }
        let mut comment = var.options.description.trim_end().to_string();
        if var.generator_type() == Some(GeneratorType::Password) {
            if !comment.is_empty() {
                comment.push('\n');
            }
            comment.push_str("This value uses a generated default.");
        }
        secrets.add(var.name.as_str(), default_value(var).with_comment(comment));
    }
    secrets
}

fn kube_values(manifest: &RoleManifest, settings: &ExportSettings) -> Mapping {
    let (username, password) = match &settings.registry_credentials {
        Some(creds) => (creds.username.as_str(), creds.password.as_str()),
        None => ("", ""),
    };

    let mut psp = Mapping::new();
    for name in manifest.configuration.auth.pod_security_policies.keys() {
        psp.add(make_var_name(name), Node::null());
    }

    let mut kube = Mapping::new();
    kube.add(
        "auth",
        Node::from(settings.auth_type.as_str()).with_comment("Authorization mode: rbac or none."),
    );
    kube.add(
        "external_ips",
        Node::list(settings.external_ips.iter().map(Node::literal).collect()),
    );
    kube.add(
        "hostpath_available",
        Node::from(false).with_comment("Whether the cluster allows host path volumes."),
    );
    kube.add("organization", Node::literal(&settings.organization));
    kube.add(
        "psp",
        Node::mapping(psp).with_comment("Names of existing pod security policies to use instead of creating them."),
    );
    kube.add(
        "registry",
        Mapping::new()
            .with("hostname", Node::literal(&settings.registry))
            .with("password", Node::literal(password))
            .with("username", Node::literal(username)),
    );
    kube.add(
        "storage_class",
        Mapping::new().with("persistent", "persistent").with("shared", "shared"),
    );
    kube
}

fn sizing_values(manifest: &RoleManifest) -> Result<Mapping> {
    let mut sizing = Mapping::new();
    for role in &manifest.instance_groups {
        let mut entry = role_sizing(role)?;
        entry.sort();
        let mut node = Node::mapping(entry);
        if !role.description.is_empty() {
            node.set_comment(role.description.trim_end());
        }
        sizing.add(role.var_name(), node);
    }
    sizing.sort();
    Ok(sizing)
}

fn role_sizing(role: &InstanceGroup) -> Result<Mapping> {
    let scaling = role.run.scaling;
    let mut entry = Mapping::new();

    entry.add(
        "affinity",
        Node::mapping(Mapping::new()).with_comment("Node affinity rules for the pods, passed through as-is."),
    );
    entry.add(
        "capabilities",
        Node::list(Vec::new()).with_comment("Additional Linux capabilities for the containers."),
    );

    if role.role_type == RoleType::Bosh {
        let mut comment = format!(
            "The {} instance group must have between {} and {} instances.",
            role.name, scaling.min, scaling.max
        );
        if scaling.ha() != scaling.min {
            comment.push_str(&format!("\nIn HA mode it needs at least {} instances.", scaling.ha()));
        }
        if scaling.must_be_odd {
            comment.push_str("\nThe count must be odd.");
        }
        entry.add("count", Node::from(scaling.min).with_comment(comment));
    }

    let memory = role.run.memory.unwrap_or_default();
    let optional = |value: Option<u64>| value.map(Node::from).unwrap_or_else(Node::null);
    entry.add(
        "memory",
        Node::mapping(
            Mapping::new()
                .with("limits", optional(memory.limit))
                .with("requests", optional(memory.request)),
        )
        .with_comment("Memory in MiB."),
    );

    let cpu = role.run.cpu.unwrap_or_default();
    entry.add(
        "cpu",
        Node::mapping(
            Mapping::new()
                .with("limits", optional(cpu.limit.map(millicores)))
                .with("requests", optional(cpu.request.map(millicores))),
        )
        .with_comment("CPU in millicores."),
    );

    let mut disks = Mapping::new();
    for volume in role.claim_volumes() {
        disks.add(make_var_name(&volume.tag), volume.size);
    }
    if !disks.is_empty() {
        entry.add("disk_sizes", Node::mapping(disks).with_comment("Volume sizes in GiB."));
    }

    let mut ports = Mapping::new();
    for definition in port_definitions(role)?.into_iter().filter(|d| d.count_is_configurable) {
        ports.add(
            make_var_name(&definition.name),
            Mapping::new().with("count", definition.count()),
        );
    }
    if !ports.is_empty() {
        entry.add("ports", ports);
    }

    Ok(entry)
}
