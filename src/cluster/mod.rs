//! Staging cluster lifecycle on AWS with kops.

mod lifecycle;
mod manifests;
mod poll;

pub use lifecycle::ClusterController;
pub use manifests::{BOOTSTRAP_MANIFESTS, Manifest};
pub use poll::{PollOutcome, wait_until_ready};

use serde::Deserialize;
use std::time::Duration;

/// Instance type for masters and nodes
pub const INSTANCE_TYPE: &str = "t3.micro";
/// Number of masters
pub const MASTER_COUNT: u32 = 1;
/// Number of worker nodes
pub const NODE_COUNT: u32 = 2;

/// Names and placement of the staging cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterDescriptor {
    name: String,
    hosted_zone: String,
    /// AWS region
    pub region: String,
    /// Availability zones the cluster runs in
    pub zones: Vec<String>,
}

impl ClusterDescriptor {
    /// Describe a cluster from the creation answers
    pub fn new(
        name: impl Into<String>,
        hosted_zone: impl Into<String>,
        region: impl Into<String>,
        zones: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            hosted_zone: hosted_zone.into(),
            region: region.into(),
            zones,
        }
    }

    /// Short name as typed by the user
    pub fn short_name(&self) -> &str {
        &self.name
    }

    /// Fully qualified cluster name, `{name}.{hostedZone}`
    pub fn cluster_name(&self) -> String {
        format!("{}.{}", self.name, self.hosted_zone)
    }

    /// kops state-store bucket, `{name}-state-store`
    pub fn state_store_name(&self) -> String {
        format!("{}-state-store", self.name)
    }
}

/// Readiness poll tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSettings {
    /// Delay between validation attempts
    pub poll_interval: Duration,
    /// Give up waiting after this long
    pub ready_timeout: Duration,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15),
            ready_timeout: Duration::from_secs(1800),
        }
    }
}

impl ClusterSettings {
    /// Parse seconds from an environment variable, clamped to `[min, max]`
    fn parse_secs_env(var_name: &str, default: u64, min: u64, max: u64) -> u64 {
        Self::parse_secs(std::env::var(var_name).ok().as_deref(), default, min, max)
    }

    /// `raw` as whole seconds clamped to `[min, max]`; absent or unparsable gives `default`
    fn parse_secs(raw: Option<&str>, default: u64, min: u64, max: u64) -> u64 {
        raw.and_then(|s| s.trim().parse::<u64>().ok())
            .map(|v| v.clamp(min, max))
            .unwrap_or(default)
    }

    /// Settings from `STAGELY_POLL_INTERVAL_SECS` and `STAGELY_READY_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        Self {
            poll_interval: Duration::from_secs(Self::parse_secs_env(
                "STAGELY_POLL_INTERVAL_SECS",
                15,
                1,
                300,
            )),
            ready_timeout: Duration::from_secs(Self::parse_secs_env(
                "STAGELY_READY_TIMEOUT_SECS",
                1800,
                60,
                7200,
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeZonesResponse {
    #[serde(default)]
    availability_zones: Vec<AvailabilityZone>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AvailabilityZone {
    zone_name: String,
    state: String,
}

/// Names of the `available` zones in an `ec2 describe-availability-zones` response
pub fn parse_available_zones(json: &str) -> serde_json::Result<Vec<String>> {
    let response: DescribeZonesResponse = serde_json::from_str(json)?;
    Ok(response
        .availability_zones
        .into_iter()
        .filter(|zone| zone.state == "available")
        .map(|zone| zone.zone_name)
        .collect())
}
