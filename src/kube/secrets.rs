//! The Secret holding secret configuration variables.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::helm::{Mapping, Node};
use crate::kube::metadata::{new_object, object_metadata};
use crate::kube::names::make_secret_key;
use crate::kube::settings::ExportSettings;
use crate::model::{ConfigurationVariable, GeneratorType};

/// Name of the Secret holding every secret value. With an external secrets
/// generator, this is the Secret the generator maintains.
pub const SECRET_NAME: &str = "secret";

const IMMUTABLE_NOTE: &str = "This value is immutable and must not be changed once set.";
const GENERATED_NOTE: &str = "This value uses a generated default.";

/// Name of the Secret this build writes.
pub fn secret_name(settings: &ExportSettings) -> String {
    match (settings.use_secrets_generator, settings.create_chart) {
        (false, _) => SECRET_NAME.to_string(),
        (true, false) => format!("{SECRET_NAME}-update"),
        (true, true) => format!("{SECRET_NAME}-update-{{{{ .Release.Revision }}}}"),
    }
}

/// The Secret an environment variable reads `var` from. Generated values
/// live in the generator's Secret.
pub fn env_secret_name(var: &ConfigurationVariable, settings: &ExportSettings) -> String {
    if settings.use_secrets_generator && var.is_generated() {
        SECRET_NAME.to_string()
    } else {
        secret_name(settings)
    }
}

/// A Secret for `variables`. Non-secret and internal variables are skipped.
pub fn secret(variables: &[&ConfigurationVariable], settings: &ExportSettings) -> Node {
    let mut data = Mapping::new();

    for var in variables.iter().filter(|v| v.is_secret() && !v.options.internal) {
        let Some(value) = secret_value(var, settings) else {
            log::debug!("Secret {} is maintained by the secrets generator", var.name);
            continue;
        };
        data.add(make_secret_key(&var.name), value.with_comment(secret_comment(var, settings)));
    }

    let name = secret_name(settings);
    log::debug!("Built Secret {} ({} keys)", name, data.len());
    let mut object = new_object("v1", "Secret", object_metadata(&name, None, settings));
    object.add("type", "Opaque");
    object.add("data", data);
    Node::mapping(object)
}

fn secret_value(var: &ConfigurationVariable, settings: &ExportSettings) -> Option<Node> {
    let name = &var.name;

    if !settings.create_chart {
        let value = settings
            .defaults
            .get(name)
            .cloned()
            .or_else(|| var.default_string())
            .unwrap_or_default();
        return Some(Node::from(STANDARD.encode(value)));
    }

    if var.is_generated() {
        if settings.use_secrets_generator {
            return None;
        }
        if var.generator_type() == Some(GeneratorType::Password) {
            return Some(Node::scalar("{{ randAlphaNum 32 | b64enc | quote }}"));
        }
    }

    let value = if var.options.required || var.options.default.is_none() {
        format!(r#"{{{{ required "{name} configuration missing" .Values.secrets.{name} | b64enc | quote }}}}"#)
    } else {
        format!("{{{{ .Values.secrets.{name} | b64enc | quote }}}}")
    };
    Some(Node::scalar(value))
}

fn secret_comment(var: &ConfigurationVariable, settings: &ExportSettings) -> String {
    let mut lines = Vec::new();
    if !var.options.description.is_empty() {
        lines.push(var.options.description.trim_end().to_string());
    }
    if var.options.immutable {
        lines.push(IMMUTABLE_NOTE.to_string());
    }
    if settings.create_chart && var.generator_type() == Some(GeneratorType::Password) {
        lines.push(GENERATED_NOTE.to_string());
    }
    lines.join("\n")
}
