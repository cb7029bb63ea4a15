//! Role manifest contract.
//!
//! These types describe the input consumed by the builders: instance groups
//! with their run-time requirements, configuration variables, and the
//! authorization section. They are decoded from YAML with serde; semantic
//! validation is left to the builders, which report the problems they
//! cannot express.

pub mod auth;
pub mod manifest;
pub mod role;
pub mod variables;

pub use auth::{AuthAccount, AuthConfig, AuthRule};
pub use manifest::{ManifestConfiguration, RoleManifest};
pub use role::{
    Affinity, CpuRequirements, ExposedPort, FlightStage, HealthCheck, InstanceGroup, JobReference,
    MemoryRequirements, PortSpec, Probe, RoleRun, RoleType, RoleVolume, Scaling, VolumeType,
};
pub use variables::{ConfigurationVariable, Generator, GeneratorType, VariableOptions, VariableType};
