use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chartsmith")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Transpile role manifests into Kubernetes resources and Helm charts")]
#[command(long_about = "Reads a role manifest describing instance groups, configuration variables and authorization rules, and writes either plain Kubernetes manifests or a Helm chart whose templates guard replica counts, sizing and secrets.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build orchestrator resources from a role manifest
    Build {
        #[command(subcommand)]
        target: BuildTarget,
    },
}

#[derive(Subcommand)]
pub enum BuildTarget {
    /// Write plain Kubernetes manifests
    Kube(BuildArgs),

    /// Write a Helm chart: templates plus values.yaml
    Helm(BuildArgs),
}

impl BuildTarget {
    pub fn is_chart(&self) -> bool {
        matches!(self, BuildTarget::Helm(_))
    }

    pub fn args(&self) -> &BuildArgs {
        match self {
            BuildTarget::Kube(args) | BuildTarget::Helm(args) => args,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Path to the role manifest
    #[arg(value_name = "MANIFEST")]
    pub manifest: PathBuf,

    /// Output directory for generated files
    #[arg(short, long, value_name = "OUTPUT_DIR")]
    pub output: Option<PathBuf>,

    /// YAML map of variable values used by plain manifests
    #[arg(short, long, value_name = "FILE")]
    pub defaults: Option<PathBuf>,

    /// Docker registry hosting the role images
    #[arg(long, env = "CHARTSMITH_REGISTRY")]
    pub registry: Option<String>,

    /// Registry organization of the role images
    #[arg(long, env = "CHARTSMITH_ORGANIZATION")]
    pub organization: Option<String>,

    /// Image name prefix of the role images
    #[arg(long)]
    pub repository: Option<String>,

    /// Authorization mode of the target cluster (rbac or none)
    #[arg(long, value_name = "TYPE")]
    pub auth_type: Option<String>,

    /// Leave secrets to an external generator and only emit updates
    #[arg(long)]
    pub use_secrets_generator: bool,

    /// Do not emit memory requests and limits
    #[arg(long)]
    pub no_memory_limits: bool,

    /// Do not emit CPU requests and limits
    #[arg(long)]
    pub no_cpu_limits: bool,

    /// Extra text folded into image tags
    #[arg(long)]
    pub tag_extra: Option<String>,

    /// Namespace used for cluster-scoped references in plain manifests
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Overwrite existing files
    #[arg(long)]
    pub force: bool,

    /// Print the documents instead of writing files
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// Initialize logging based on verbosity level
    pub fn init_logging(&self) {
        if self.quiet {
            return;
        }

        let level = match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };

        env_logger::Builder::from_default_env()
            .filter_level(level)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_build_helm() {
        let cli = Cli::try_parse_from([
            "chartsmith",
            "-vv",
            "build",
            "helm",
            "role-manifest.yml",
            "--output",
            "out",
            "--auth-type",
            "none",
            "--no-cpu-limits",
            "--force",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Commands::Build { target } = cli.command;
        assert!(target.is_chart());
        let args = target.args();
        assert_eq!(args.manifest, PathBuf::from("role-manifest.yml"));
        assert_eq!(args.output, Some(PathBuf::from("out")));
        assert_eq!(args.auth_type.as_deref(), Some("none"));
        assert!(args.no_cpu_limits);
        assert!(!args.no_memory_limits);
        assert!(args.force);
    }

    #[test]
    fn test_manifest_is_required() {
        assert!(Cli::try_parse_from(["chartsmith", "build", "kube"]).is_err());
    }
}
