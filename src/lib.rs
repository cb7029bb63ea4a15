//! # chartsmith
//!
//! Transpiles a role manifest into Kubernetes resources, either as plain
//! manifests ready for `kubectl apply` or as Helm chart templates with a
//! matching `values.yaml`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use chartsmith::kube::{ExportSettings, build_resources};
//! use chartsmith::model::RoleManifest;
//! use std::path::Path;
//!
//! # fn main() -> chartsmith::Result<()> {
//! let manifest = RoleManifest::load(Path::new("role-manifest.yml"))?;
//! for resource in build_resources(&manifest, &ExportSettings::chart())? {
//!     println!("{}", resource.relative_path().display());
//!     print!("{}", resource.render());
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod helm;
pub mod kube;
pub mod model;

pub use error::{ChartsmithError, Result};
pub use handlers::handle_build;

/// The current version of the CLI tool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
