//! Services exposing a role's ports.

use crate::helm::{Mapping, Node};
use crate::kube::error::Result;
use crate::kube::metadata::{ROLE_LABEL, new_object, object_metadata};
use crate::kube::ports::{PortDefinition, port_definitions, range_prefix};
use crate::kube::settings::ExportSettings;
use crate::model::InstanceGroup;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    /// Cluster-internal access to every exposed port.
    Private,
    /// Public ports only, reachable from outside the cluster.
    Public,
    /// Per-pod DNS for stateful sets.
    Headless,
}

impl ServiceKind {
    pub fn service_name(&self, role_name: &str) -> String {
        match self {
            Self::Private => role_name.to_string(),
            Self::Public => format!("{role_name}-public"),
            Self::Headless => format!("{role_name}-set"),
        }
    }
}

/// A service of `kind` for `role`, or `None` if it would have no ports.
pub fn service(role: &InstanceGroup, settings: &ExportSettings, kind: ServiceKind) -> Result<Option<Node>> {
    let ports = service_ports(role, settings, kind)?;
    if ports.is_empty() {
        return Ok(None);
    }

    let mut spec = Mapping::new();
    match kind {
        ServiceKind::Private => {
            spec.add("type", "ClusterIP");
        }
        ServiceKind::Headless => {
            spec.add("type", "ClusterIP");
            spec.add("clusterIP", "None");
        }
        ServiceKind::Public if settings.create_chart => {
            spec.add(
                "type",
                Node::scalar("{{ if .Values.services.loadbalanced }}LoadBalancer{{ else }}ClusterIP{{ end }}"),
            );
            spec.add(
                "externalIPs",
                Node::scalar("{{ .Values.kube.external_ips | toJson }}")
                    .with_block("if not .Values.services.loadbalanced"),
            );
        }
        ServiceKind::Public => {
            spec.add("type", "ClusterIP");
            if !settings.external_ips.is_empty() {
                spec.add(
                    "externalIPs",
                    Node::list(settings.external_ips.iter().map(Node::literal).collect()),
                );
            }
        }
    }
    spec.add("ports", Node::list(ports));
    spec.add("selector", Mapping::new().with(ROLE_LABEL, role.name.as_str()));

    let name = kind.service_name(&role.name);
    log::debug!("Built {:?} service {}", kind, name);

    let mut object = new_object("v1", "Service", object_metadata(&name, Some(&role.name), settings));
    object.add("spec", spec);
    Ok(Some(Node::mapping(object)))
}

fn service_ports(role: &InstanceGroup, settings: &ExportSettings, kind: ServiceKind) -> Result<Vec<Node>> {
    let role_var = role.var_name();
    let mut ports = Vec::new();

    let definitions = port_definitions(role)?
        .into_iter()
        .filter(|d| kind != ServiceKind::Public || d.public);

    for definition in definitions {
        // Headless services address the pods directly.
        let first = match kind {
            ServiceKind::Headless => definition.internal.0,
            _ => definition.external.0,
        };

        if settings.create_chart && definition.count_is_configurable {
            let prefix = range_prefix(&definition.name, definition.count())?;
            let name = Node::scalar(format!("{prefix}-{{{{ $i }}}}"));
            let port = service_port(
                name.clone(),
                Node::scalar(format!("{{{{ add {first} $i }}}}")),
                &definition,
                target_port(kind, name),
            );
            ports.push(port.with_block(format!("range $i := until (int {})", definition.count_value(&role_var))));
            continue;
        }

        let infos = match kind {
            ServiceKind::Headless => definition.container_ports()?,
            _ => definition.service_ports()?,
        };
        for info in infos {
            let name = Node::from(info.name);
            ports.push(service_port(
                name.clone(),
                Node::from(info.port),
                &definition,
                target_port(kind, name),
            ));
        }
    }

    Ok(ports)
}

/// Headless services must use `targetPort: 0`; the others target the
/// container port by name.
fn target_port(kind: ServiceKind, name: Node) -> Node {
    match kind {
        ServiceKind::Headless => Node::from(0u16),
        _ => name,
    }
}

fn service_port(name: Node, port: Node, definition: &PortDefinition, target_port: Node) -> Node {
    Node::mapping(
        Mapping::new()
            .with("name", name)
            .with("port", port)
            .with("protocol", definition.protocol.as_str())
            .with("targetPort", target_port),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helm::to_yaml_string;
    use crate::model::{ExposedPort, PortSpec};

    fn port(name: &str, internal: &str, external: Option<&str>, public: bool) -> ExposedPort {
        ExposedPort {
            name: name.to_string(),
            protocol: "TCP".to_string(),
            internal: PortSpec::from(internal),
            external: external.map(PortSpec::from),
            public,
            count_is_configurable: false,
        }
    }

    fn web_role() -> InstanceGroup {
        let mut role = InstanceGroup {
            name: "web".to_string(),
            ..Default::default()
        };
        role.run.exposed_ports = vec![
            port("http", "8080", Some("80"), true),
            port("https", "8443", Some("443"), false),
        ];
        role
    }

    #[test]
    fn test_private_service() {
        let svc = service(&web_role(), &ExportSettings::default(), ServiceKind::Private)
            .unwrap()
            .unwrap();
        assert_eq!(
            to_yaml_string(&svc),
            "\
---
apiVersion: v1
kind: Service
metadata:
  name: web
  labels:
    app.kubernetes.io/component: web
spec:
  type: ClusterIP
  ports:
    - name: http
      port: 80
      protocol: TCP
      targetPort: http
    - name: https
      port: 443
      protocol: TCP
      targetPort: https
  selector:
    app.kubernetes.io/component: web
"
        );
    }

    #[test]
    fn test_headless_service() {
        let mut role = web_role();
        role.run.exposed_ports = vec![port("http", "80", None, false), port("https", "443", None, false)];
        let svc = service(&role, &ExportSettings::default(), ServiceKind::Headless)
            .unwrap()
            .unwrap();
        assert_eq!(svc.get(&["metadata", "name"]).and_then(Node::as_scalar), Some("web-set"));
        assert_eq!(svc.get(&["spec", "clusterIP"]).and_then(Node::as_scalar), Some("None"));
        let ports = svc.get(&["spec", "ports"]).and_then(Node::as_list).unwrap();
        let numbers: Vec<_> = ports.iter().filter_map(|p| p.get(&["port"]).and_then(Node::as_scalar)).collect();
        assert_eq!(numbers, vec!["80", "443"]);
        assert!(ports.iter().all(|p| p.get(&["targetPort"]).and_then(Node::as_scalar) == Some("0")));
    }

    #[test]
    fn test_headless_uses_internal_ports() {
        let svc = service(&web_role(), &ExportSettings::default(), ServiceKind::Headless)
            .unwrap()
            .unwrap();
        let ports = svc.get(&["spec", "ports"]).and_then(Node::as_list).unwrap();
        assert_eq!(ports[0].get(&["port"]).and_then(Node::as_scalar), Some("8080"));
    }

    #[test]
    fn test_public_service() {
        let settings = ExportSettings::default().with_external_ips(vec!["192.0.2.10".to_string()]);
        let svc = service(&web_role(), &settings, ServiceKind::Public).unwrap().unwrap();
        assert_eq!(svc.get(&["metadata", "name"]).and_then(Node::as_scalar), Some("web-public"));
        let ports = svc.get(&["spec", "ports"]).and_then(Node::as_list).unwrap();
        assert_eq!(ports.len(), 1);
        let ips = svc.get(&["spec", "externalIPs"]).and_then(Node::as_list).unwrap();
        assert_eq!(ips[0].as_scalar(), Some("\"192.0.2.10\""));

        let chart = service(&web_role(), &ExportSettings::chart(), ServiceKind::Public)
            .unwrap()
            .unwrap();
        let yaml = to_yaml_string(&chart);
        assert!(yaml.contains("  type: {{ if .Values.services.loadbalanced }}LoadBalancer{{ else }}ClusterIP{{ end }}\n"));
        assert!(yaml.contains(
            "  {{- if not .Values.services.loadbalanced }}\n  externalIPs: {{ .Values.kube.external_ips | toJson }}\n  {{- end }}\n"
        ));
    }

    #[test]
    fn test_no_ports_no_service() {
        let mut role = web_role();
        role.run.exposed_ports.retain(|p| !p.public);
        assert!(service(&role, &ExportSettings::default(), ServiceKind::Public).unwrap().is_none());
        role.run.exposed_ports.clear();
        assert!(service(&role, &ExportSettings::default(), ServiceKind::Private).unwrap().is_none());
    }

    #[test]
    fn test_chart_counted_service_ports() {
        let mut role = web_role();
        role.run.exposed_ports = vec![ExposedPort {
            count_is_configurable: true,
            ..port("tcp-route", "20000-20004", Some("30000-30004"), true)
        }];
        let svc = service(&role, &ExportSettings::chart(), ServiceKind::Private)
            .unwrap()
            .unwrap();
        let yaml = to_yaml_string(&svc);
        assert!(yaml.contains(
            "\
    {{- range $i := until (int .Values.sizing.web.ports.tcp_route.count) }}
    - name: tcp-route-{{ $i }}
      port: {{ add 30000 $i }}
      protocol: TCP
      targetPort: tcp-route-{{ $i }}
    {{- end }}
"
        ));
    }
}
