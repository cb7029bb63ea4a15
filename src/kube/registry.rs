//! Image pull credentials.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::helm::{Mapping, Node};
use crate::kube::metadata::{new_object, object_metadata};
use crate::kube::settings::ExportSettings;

/// Name of the pull secret every pod references.
pub const REGISTRY_CREDENTIALS_NAME: &str = "registry-credentials";

/// The docker config expression for charts. Go's `%q` produces the JSON
/// string quoting.
const CHART_DOCKERCFG: &str = concat!(
    r#"{{ printf "{%q:{\"username\":%q,\"password\":%q,\"auth\":%q}}" "#,
    ".Values.kube.registry.hostname .Values.kube.registry.username .Values.kube.registry.password ",
    r#"(printf "%s:%s" .Values.kube.registry.username .Values.kube.registry.password | b64enc) | b64enc }}"#,
);

/// Base64 of `{host: {username, password, auth}}`.
pub fn dockercfg(host: &str, username: &str, password: &str) -> String {
    let auth = STANDARD.encode(format!("{username}:{password}"));
    let config = serde_json::json!({
        host: {
            "username": username,
            "password": password,
            "auth": auth,
        }
    });
    STANDARD.encode(config.to_string())
}

/// The `kubernetes.io/dockercfg` Secret. Charts only emit it when a
/// registry user is configured.
pub fn registry_credentials(settings: &ExportSettings) -> Node {
    let value = if settings.create_chart {
        Node::scalar(CHART_DOCKERCFG)
    } else {
        match &settings.registry_credentials {
            Some(creds) => Node::from(dockercfg(&settings.registry, &creds.username, &creds.password)),
            None => Node::from(""),
        }
    };

    let mut object = new_object(
        "v1",
        "Secret",
        object_metadata(REGISTRY_CREDENTIALS_NAME, None, settings),
    );
    object.add("type", "kubernetes.io/dockercfg");
    object.add("data", Mapping::new().with(".dockercfg", value));

    let node = Node::mapping(object);
    if settings.create_chart {
        node.with_block(r#"if ne .Values.kube.registry.username """#)
    } else {
        node
    }
}
