//! Object headers and standard labels.
//!
//! Every object carries the role-name label [`ROLE_LABEL`]; selectors match
//! on it alone. Charts add the `app.kubernetes.io/*` release labels and
//! `helm.sh/chart`.

use crate::helm::{Mapping, Node};
use crate::kube::settings::ExportSettings;

/// Label holding the instance group name.
pub const ROLE_LABEL: &str = "app.kubernetes.io/component";

/// Labels for an object, optionally tied to a role.
pub fn labels(role_name: Option<&str>, settings: &ExportSettings) -> Mapping {
    let mut labels = Mapping::new();
    if let Some(role) = role_name {
        labels.add(ROLE_LABEL, role);
    }
    if settings.create_chart {
        labels.add("app.kubernetes.io/instance", Node::scalar("{{ .Release.Name | quote }}"));
        labels.add("app.kubernetes.io/managed-by", Node::scalar("{{ .Release.Service | quote }}"));
        labels.add(
            "app.kubernetes.io/name",
            Node::scalar("{{ default .Chart.Name .Values.nameOverride | trunc 63 | quote }}"),
        );
        labels.add(
            "app.kubernetes.io/version",
            Node::scalar("{{ default .Chart.Version .Chart.AppVersion | quote }}"),
        );
        labels.add(
            "helm.sh/chart",
            Node::scalar(r#"{{ printf "%s-%s" .Chart.Name (.Chart.Version | replace "+" "_") | quote }}"#),
        );
    }
    labels
}

/// `metadata:` with name and labels.
pub fn object_metadata(name: &str, role_name: Option<&str>, settings: &ExportSettings) -> Mapping {
    let mut meta = Mapping::new();
    meta.add("name", name);
    let labels = labels(role_name, settings);
    if !labels.is_empty() {
        meta.add("labels", labels);
    }
    meta
}

/// A fresh object: `apiVersion`, `kind`, `metadata`.
pub fn new_object(api_version: &str, kind: &str, metadata: Mapping) -> Mapping {
    Mapping::new()
        .with("apiVersion", api_version)
        .with("kind", kind)
        .with("metadata", metadata)
}

/// `matchLabels` selecting the pods of a role.
pub fn role_selector(role_name: &str) -> Mapping {
    Mapping::new().with("matchLabels", Mapping::new().with(ROLE_LABEL, role_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helm::to_yaml_string;

    #[test]
    fn test_plain_labels() {
        let meta = object_metadata("api", Some("api"), &ExportSettings::default());
        let yaml = to_yaml_string(&Node::mapping(meta));
        assert_eq!(yaml, "---\nname: api\nlabels:\n  app.kubernetes.io/component: api\n");
    }

    #[test]
    fn test_chart_labels() {
        let labels = labels(Some("api"), &ExportSettings::chart());
        let names: Vec<_> = labels.names().collect();
        assert_eq!(
            names,
            vec![
                ROLE_LABEL,
                "app.kubernetes.io/instance",
                "app.kubernetes.io/managed-by",
                "app.kubernetes.io/name",
                "app.kubernetes.io/version",
                "helm.sh/chart",
            ]
        );
    }

    #[test]
    fn test_unlabelled_object() {
        let meta = object_metadata("secret", None, &ExportSettings::default());
        assert!(meta.get(&["labels"]).is_none());
    }
}
