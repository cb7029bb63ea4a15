//! Service accounts, roles, bindings and pod security policies.
//!
//! Cluster-scoped objects are prefixed with the namespace so several
//! installations can share a cluster: `<namespace>-cluster-role-<name>`,
//! `<namespace>-<account>-<role>-cluster-binding` and
//! `<namespace>-psp-<name>`. A pod security policy is used through a
//! ClusterRole of the same naming scheme granting `use` on it.

use crate::helm::{Mapping, Node};
use crate::kube::metadata::{new_object, object_metadata};
use crate::kube::names::make_var_name;
use crate::kube::settings::ExportSettings;
use crate::model::{AuthConfig, AuthRule};

const RBAC_API: &str = "rbac.authorization.k8s.io/v1";
const RBAC_GROUP: &str = "rbac.authorization.k8s.io";
const RBAC_BLOCK: &str = r#"if eq .Values.kube.auth "rbac""#;

/// A named output file with its documents.
#[derive(Debug, Clone)]
pub struct AuthDocument {
    pub name: String,
    pub documents: Vec<Node>,
}

fn namespace(settings: &ExportSettings) -> String {
    if settings.create_chart {
        "{{ .Release.Namespace }}".to_string()
    } else {
        settings.namespace.clone()
    }
}

pub fn cluster_role_name(name: &str, settings: &ExportSettings) -> String {
    format!("{}-cluster-role-{}", namespace(settings), name)
}

pub fn psp_name(name: &str, settings: &ExportSettings) -> String {
    format!("{}-psp-{}", namespace(settings), name)
}

/// The chart value naming an existing policy to use instead of `name`.
pub fn psp_value(name: &str) -> String {
    format!(".Values.kube.psp.{}", make_var_name(name))
}

/// Chart objects are only rendered on RBAC clusters.
fn rbac_gate(node: Node, settings: &ExportSettings) -> Node {
    if settings.create_chart {
        node.with_block(RBAC_BLOCK)
    } else {
        node
    }
}

fn rules(rules: &[AuthRule]) -> Node {
    let strings = |values: &[String]| Node::list(values.iter().map(Node::from).collect());
    Node::list(
        rules
            .iter()
            .map(|rule| {
                let mut mapping = Mapping::new();
                mapping.add("apiGroups", strings(&rule.api_groups));
                mapping.add("resources", strings(&rule.resources));
                mapping.add("verbs", strings(&rule.verbs));
                if !rule.resource_names.is_empty() {
                    mapping.add("resourceNames", strings(&rule.resource_names));
                }
                Node::mapping(mapping)
            })
            .collect(),
    )
}

pub fn service_account(name: &str, settings: &ExportSettings) -> Node {
    let object = new_object("v1", "ServiceAccount", object_metadata(name, None, settings));
    rbac_gate(Node::mapping(object), settings)
}

pub fn role(name: &str, role_rules: &[AuthRule], settings: &ExportSettings) -> Node {
    let mut object = new_object(RBAC_API, "Role", object_metadata(name, None, settings));
    object.add("rules", rules(role_rules));
    rbac_gate(Node::mapping(object), settings)
}

pub fn cluster_role(name: &str, role_rules: &[AuthRule], settings: &ExportSettings) -> Node {
    let mut object = new_object(
        RBAC_API,
        "ClusterRole",
        object_metadata(&cluster_role_name(name, settings), None, settings),
    );
    object.add("rules", rules(role_rules));
    rbac_gate(Node::mapping(object), settings)
}

fn subjects(account: &str, settings: &ExportSettings) -> Node {
    Node::list(vec![Node::mapping(
        Mapping::new()
            .with("kind", "ServiceAccount")
            .with("name", account)
            .with("namespace", namespace(settings)),
    )])
}

fn role_ref(kind: &str, name: String) -> Mapping {
    Mapping::new()
        .with("apiGroup", RBAC_GROUP)
        .with("kind", kind)
        .with("name", name)
}

pub fn role_binding(account: &str, role_name: &str, settings: &ExportSettings) -> Node {
    let name = format!("{account}-{role_name}-binding");
    let mut object = new_object(RBAC_API, "RoleBinding", object_metadata(&name, None, settings));
    object.add("subjects", subjects(account, settings));
    object.add("roleRef", role_ref("Role", role_name.to_string()));
    rbac_gate(Node::mapping(object), settings)
}

pub fn cluster_role_binding(account: &str, cluster_role: &str, settings: &ExportSettings) -> Node {
    let name = format!("{}-{account}-{cluster_role}-cluster-binding", namespace(settings));
    let mut object = new_object(RBAC_API, "ClusterRoleBinding", object_metadata(&name, None, settings));
    object.add("subjects", subjects(account, settings));
    object.add("roleRef", role_ref("ClusterRole", cluster_role_name(cluster_role, settings)));
    rbac_gate(Node::mapping(object), settings)
}

/// The policy object. Charts skip it when [`psp_value`] names a policy that
/// already exists.
pub fn pod_security_policy(name: &str, spec: &serde_yaml::Value, settings: &ExportSettings) -> Node {
    let mut object = new_object(
        "policy/v1beta1",
        "PodSecurityPolicy",
        object_metadata(&psp_name(name, settings), None, settings),
    );
    object.add("spec", Node::from_yaml(spec));
    let node = rbac_gate(Node::mapping(object), settings);
    if settings.create_chart {
        node.with_block(format!("if not {}", psp_value(name)))
    } else {
        node
    }
}

/// The ClusterRole granting `use` of a pod security policy.
pub fn psp_cluster_role(name: &str, settings: &ExportSettings) -> Node {
    let policy = if settings.create_chart {
        Node::scalar(format!(
            r#"{{{{ default (printf "%s-psp-{name}" .Release.Namespace) {} }}}}"#,
            psp_value(name)
        ))
    } else {
        Node::from(psp_name(name, settings))
    };
    let rule = Mapping::new()
        .with("apiGroups", Node::list(vec![Node::from("policy")]))
        .with("resources", Node::list(vec![Node::from("podsecuritypolicies")]))
        .with("verbs", Node::list(vec![Node::from("use")]))
        .with("resourceNames", Node::list(vec![policy]));

    let mut object = new_object(
        RBAC_API,
        "ClusterRole",
        object_metadata(&cluster_role_name(name, settings), None, settings),
    );
    object.add("rules", Node::list(vec![Node::mapping(rule)]));
    rbac_gate(Node::mapping(object), settings)
}

/// Every authorization object of the manifest, grouped by output file.
/// Returns nothing when the target cluster does not use RBAC.
pub fn auth_documents(auth: &AuthConfig, settings: &ExportSettings) -> Vec<AuthDocument> {
    if !settings.emits_rbac() {
        log::info!("Skipping authorization objects for auth type {}", settings.auth_type);
        return Vec::new();
    }

    let mut out = Vec::new();

    for (name, role_rules) in &auth.roles {
        out.push(AuthDocument {
            name: format!("role-{name}"),
            documents: vec![role(name, role_rules, settings)],
        });
    }

    for (name, role_rules) in &auth.cluster_roles {
        out.push(AuthDocument {
            name: format!("cluster-role-{name}"),
            documents: vec![cluster_role(name, role_rules, settings)],
        });
    }

    for (name, spec) in &auth.pod_security_policies {
        out.push(AuthDocument {
            name: format!("psp-{name}"),
            documents: vec![pod_security_policy(name, spec, settings), psp_cluster_role(name, settings)],
        });
    }

    for (account, grants) in &auth.accounts {
        let mut documents = Vec::new();
        if account != "default" {
            documents.push(service_account(account, settings));
        }
        for role_name in &grants.roles {
            documents.push(role_binding(account, role_name, settings));
        }
        for cluster_role in &grants.cluster_roles {
            documents.push(cluster_role_binding(account, cluster_role, settings));
        }
        if let Some(psp) = &grants.pod_security_policy {
            documents.push(cluster_role_binding(account, psp, settings));
        }
        if !documents.is_empty() {
            out.push(AuthDocument {
                name: format!("account-{account}"),
                documents,
            });
        }
    }

    out
}
