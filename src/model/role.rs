//! Instance groups and their run-time requirements.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// How an instance group is deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoleType {
    /// Long-running supervised service.
    #[default]
    Bosh,
    /// Run-to-completion task.
    BoshTask,
    /// Extra container attached to other groups' pods.
    ColocatedContainer,
}

/// A named template for a set of interchangeable replicas.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceGroup {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "type")]
    pub role_type: RoleType,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub colocated_containers: Vec<String>,
    #[serde(default)]
    pub jobs: Vec<JobReference>,
    #[serde(default)]
    pub run: RoleRun,
}

impl InstanceGroup {
    /// The group name as a template variable component.
    pub fn var_name(&self) -> String {
        crate::kube::names::make_var_name(&self.name)
    }

    /// Whether the group runs under supervision and gets fallback probes.
    pub fn is_managed(&self) -> bool {
        self.role_type == RoleType::Bosh
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Sorted union of the variables referenced by the group's jobs.
    pub fn variable_names(&self) -> Vec<String> {
        self.jobs
            .iter()
            .flat_map(|job| job.variables.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Volumes backed by persistent volume claims.
    pub fn claim_volumes(&self) -> impl Iterator<Item = &RoleVolume> {
        self.run.volumes.iter().filter(|v| v.volume_type.is_claim())
    }

    pub fn volumes_of(&self, volume_type: VolumeType) -> impl Iterator<Item = &RoleVolume> {
        self.run
            .volumes
            .iter()
            .filter(move |v| v.volume_type == volume_type)
    }
}

/// A job (release package) run by an instance group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobReference {
    pub name: String,
    #[serde(default)]
    pub release: String,
    /// Content fingerprint of the packaged job, folded into image tags.
    #[serde(default)]
    pub fingerprint: Option<String>,
    /// Configuration variables the job's templates reference.
    #[serde(default)]
    pub variables: Vec<String>,
}

/// Run-time requirements of an instance group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleRun {
    #[serde(default)]
    pub scaling: Scaling,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub memory: Option<MemoryRequirements>,
    #[serde(default)]
    pub cpu: Option<CpuRequirements>,
    #[serde(default)]
    pub affinity: Option<Affinity>,
    #[serde(default)]
    pub exposed_ports: Vec<ExposedPort>,
    #[serde(default)]
    pub volumes: Vec<RoleVolume>,
    #[serde(default)]
    pub healthcheck: Option<HealthCheck>,
    #[serde(default)]
    pub flight_stage: FlightStage,
    /// Service account the pods run as.
    #[serde(default)]
    pub service_account: Option<String>,
}

/// Replica bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scaling {
    #[serde(default = "default_min")]
    pub min: u32,
    #[serde(default = "default_max")]
    pub max: u32,
    /// Replica floor in HA mode; `0` means "same as `min`".
    #[serde(default)]
    pub ha: u32,
    #[serde(default)]
    pub must_be_odd: bool,
}

fn default_min() -> u32 {
    1
}

fn default_max() -> u32 {
    1
}

impl Default for Scaling {
    fn default() -> Self {
        Self {
            min: 1,
            max: 1,
            ha: 0,
            must_be_odd: false,
        }
    }
}

impl Scaling {
    /// The effective HA replica floor.
    pub fn ha(&self) -> u32 {
        if self.ha == 0 { self.min } else { self.ha }
    }
}

/// Memory in MiB.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MemoryRequirements {
    pub request: Option<u64>,
    pub limit: Option<u64>,
}

/// CPU in cores.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CpuRequirements {
    pub request: Option<f64>,
    pub limit: Option<f64>,
}

/// Scheduling constraints, passed to the orchestrator as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Affinity {
    #[serde(default)]
    pub pod_anti_affinity: Option<serde_yaml::Value>,
    #[serde(default)]
    pub node_affinity: Option<serde_yaml::Value>,
    #[serde(default)]
    pub pod_affinity: Option<serde_yaml::Value>,
}

/// A port number or an inclusive `N-M` range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortSpec {
    Number(u32),
    Text(String),
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<u32> for PortSpec {
    fn from(n: u32) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for PortSpec {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// A port (or range of ports) the group listens on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposedPort {
    pub name: String,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    pub internal: PortSpec,
    #[serde(default)]
    pub external: Option<PortSpec>,
    #[serde(default)]
    pub public: bool,
    /// The number of ports in the range is a chart value.
    #[serde(default)]
    pub count_is_configurable: bool,
}

fn default_protocol() -> String {
    "TCP".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeType {
    Persistent,
    Shared,
    Host,
    #[serde(alias = "empty-dir")]
    Emptydir,
}

impl VolumeType {
    /// Whether the volume is provisioned through a claim.
    pub fn is_claim(&self) -> bool {
        matches!(self, Self::Persistent | Self::Shared)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleVolume {
    #[serde(rename = "type")]
    pub volume_type: VolumeType,
    pub tag: String,
    pub path: String,
    /// Size in GiB for claims.
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub storage_class: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthCheck {
    #[serde(default)]
    pub liveness: Option<Probe>,
    #[serde(default)]
    pub readiness: Option<Probe>,
}

/// Health probe descriptor. Timing fields of `0` are left to the
/// orchestrator's defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Probe {
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub initial_delay: u32,
    #[serde(default)]
    pub timeout: u32,
    #[serde(default)]
    pub period: u32,
    #[serde(default)]
    pub success_threshold: u32,
    #[serde(default)]
    pub failure_threshold: u32,
}

/// Lifecycle classification of a group.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FlightStage {
    #[default]
    Flight,
    PreFlight,
    PostFlight,
    Manual,
    /// Anything else; rejected by the builders that care.
    Other(String),
}

impl FlightStage {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Flight => "flight",
            Self::PreFlight => "pre-flight",
            Self::PostFlight => "post-flight",
            Self::Manual => "manual",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for FlightStage {
    fn from(s: String) -> Self {
        match s.as_str() {
            "flight" => Self::Flight,
            "pre-flight" => Self::PreFlight,
            "post-flight" => Self::PostFlight,
            "manual" => Self::Manual,
            _ => Self::Other(s),
        }
    }
}

impl From<FlightStage> for String {
    fn from(stage: FlightStage) -> Self {
        stage.as_str().to_string()
    }
}

impl fmt::Display for FlightStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
