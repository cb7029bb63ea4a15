use colored::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::BuildArgs;
use crate::config::{self, ChartsmithConfig};
use crate::error::{ChartsmithError, ConfigError, Result};
use crate::helm::to_yaml_string;
use crate::kube::{self, AuthType, ExportSettings};
use crate::model::RoleManifest;

/// A rendered file, relative to the output directory.
#[derive(Debug, Clone)]
pub struct OutputFile {
    pub path: PathBuf,
    pub content: String,
}

/// What a build wrote, or would have written on a dry run.
#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub output_dir: PathBuf,
    pub files: Vec<OutputFile>,
    pub dry_run: bool,
}

pub fn handle_build(args: &BuildArgs, chart: bool, config_path: Option<&Path>) -> Result<BuildSummary> {
    let config = match config_path {
        Some(path) => config::load_config_file(path)?,
        None => config::load_config(args.manifest.parent()),
    };

    let manifest = RoleManifest::load(&args.manifest)?;
    let settings = export_settings(args, chart, &config, &manifest)?;
    let files = render_files(&manifest, &settings)?;

    let output_dir = args
        .output
        .clone()
        .unwrap_or_else(|| config.output.directory.clone());
    let summary = BuildSummary {
        output_dir,
        files,
        dry_run: args.dry_run,
    };

    if args.dry_run {
        for file in &summary.files {
            println!("# Source: {}", file.path.display());
            print!("{}", file.content);
        }
        return Ok(summary);
    }

    write_files(&summary, args.force || config.output.overwrite)?;
    print_summary(&summary, chart);
    Ok(summary)
}

/// Settings from the config file, overridden by flags, plus the manifest's
/// opinions and the defaults file.
pub fn export_settings(
    args: &BuildArgs,
    chart: bool,
    config: &ChartsmithConfig,
    manifest: &RoleManifest,
) -> Result<ExportSettings> {
    let mut settings = config
        .export
        .to_export_settings()
        .with_chart(chart)
        .with_opinions(manifest.opinions.clone());

    if let Some(registry) = &args.registry {
        settings.registry = registry.clone();
    }
    if let Some(organization) = &args.organization {
        settings.organization = organization.clone();
    }
    if let Some(repository) = &args.repository {
        settings.repository = repository.clone();
    }
    if let Some(auth_type) = &args.auth_type {
        let auth_type = AuthType::parse(auth_type)
            .ok_or_else(|| ConfigError::InvalidAuthType(auth_type.clone()))?;
        settings = settings.with_auth_type(auth_type);
    }
    if args.use_secrets_generator {
        settings.use_secrets_generator = true;
    }
    if args.no_memory_limits {
        settings.use_memory_limits = false;
    }
    if args.no_cpu_limits {
        settings.use_cpu_limits = false;
    }
    if let Some(tag_extra) = &args.tag_extra {
        settings.tag_extra = tag_extra.clone();
    }
    if let Some(namespace) = &args.namespace {
        settings = settings.with_namespace(namespace);
    }

    if let Some(path) = &args.defaults {
        for (name, value) in load_defaults(path)? {
            settings = settings.with_default(name, value);
        }
    }

    log::debug!(
        "Export settings: chart={} auth={} registry={}/{}",
        settings.create_chart,
        settings.auth_type,
        settings.registry,
        settings.organization
    );
    Ok(settings)
}

/// Read a YAML map of variable values. Scalars keep their YAML spelling.
pub fn load_defaults(path: &Path) -> Result<BTreeMap<String, String>> {
    use serde_yaml::Value;

    let content = fs::read_to_string(path)?;
    let invalid = || ConfigError::InvalidDefaults {
        path: path.display().to_string(),
    };

    let mapping = match serde_yaml::from_str::<Value>(&content)? {
        Value::Mapping(mapping) => mapping,
        Value::Null => return Ok(BTreeMap::new()),
        _ => return Err(invalid().into()),
    };

    let mut defaults = BTreeMap::new();
    for (key, value) in mapping {
        let Value::String(name) = key else {
            return Err(invalid().into());
        };
        let value = match value {
            Value::Null => String::new(),
            Value::String(s) => s,
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            _ => return Err(invalid().into()),
        };
        defaults.insert(name, value);
    }
    log::debug!("Loaded {} variable defaults from {}", defaults.len(), path.display());
    Ok(defaults)
}

/// Render every output file. Chart builds place resources under
/// `templates/` and add `values.yaml`.
pub fn render_files(manifest: &RoleManifest, settings: &ExportSettings) -> Result<Vec<OutputFile>> {
    let resources = kube::build_resources(manifest, settings)?;
    let prefix = if settings.create_chart {
        PathBuf::from("templates")
    } else {
        PathBuf::new()
    };

    let mut files: Vec<OutputFile> = resources
        .iter()
        .map(|resource| OutputFile {
            path: prefix.join(resource.relative_path()),
            content: resource.render(),
        })
        .collect();

    if settings.create_chart {
        let values = kube::values::values(manifest, settings)?;
        files.push(OutputFile {
            path: PathBuf::from("values.yaml"),
            content: to_yaml_string(&values),
        });
    }
    Ok(files)
}

fn write_files(summary: &BuildSummary, overwrite: bool) -> Result<()> {
    if !overwrite {
        if let Some(existing) = summary
            .files
            .iter()
            .map(|f| summary.output_dir.join(&f.path))
            .find(|p| p.exists())
        {
            return Err(ChartsmithError::OutputExists(existing.display().to_string()));
        }
    }

    for file in &summary.files {
        let path = summary.output_dir.join(&file.path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &file.content)?;
        log::info!("Wrote {}", path.display());
    }
    Ok(())
}

fn print_summary(summary: &BuildSummary, chart: bool) {
    let what = if chart { "Helm chart" } else { "Kubernetes manifests" };
    println!(
        "{} {} ({} files) in {}",
        "✅".green(),
        what.bold(),
        summary.files.len(),
        summary.output_dir.display().to_string().cyan()
    );
    for file in &summary.files {
        println!("   {}", file.path.display().to_string().dimmed());
    }
}
