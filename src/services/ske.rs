//! Kubernetes Engine (SKE) API: clusters and provider options

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

use crate::core::errors::CliError;
use crate::services::{ApiClient, Method, PollState, Waiter};

const DEFAULT_AVAILABILITY_ZONE: &str = "eu01-3";
const DEFAULT_CRI: &str = "containerd";
const DEFAULT_MACHINE_TYPE: &str = "b1.2";
const DEFAULT_IMAGE_NAME: &str = "flatcar";
const DEFAULT_MAX_SURGE: i64 = 1;
const DEFAULT_MAXIMUM: i64 = 2;
const DEFAULT_MINIMUM: i64 = 1;
const DEFAULT_NODEPOOL_NAME: &str = "pool-default";
const DEFAULT_VOLUME_TYPE: &str = "storage_premium_perf2";
const DEFAULT_VOLUME_SIZE: i64 = 50;
const SUPPORTED_STATE: &str = "supported";

pub const STATE_HEALTHY: &str = "STATE_HEALTHY";
pub const STATE_HIBERNATED: &str = "STATE_HIBERNATED";
pub const STATE_UNHEALTHY: &str = "STATE_UNHEALTHY";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Kubernetes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cri {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub machine_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<Image>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nodepool {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub availability_zones: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cri: Option<Cri>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine: Option<Machine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_surge: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<Volume>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Acl {
    pub allowed_cidrs: Vec<String>,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extensions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acl: Option<Acl>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregated: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of the create-or-update call, also what `generate-payload` prints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Extensions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hibernation: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubernetes: Option<Kubernetes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodepools: Vec<Nodepool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ClusterStatus>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    #[serde(default)]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Extensions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hibernation: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubernetes: Option<Kubernetes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodepools: Vec<Nodepool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ClusterStatus>,
}

impl Cluster {
    pub fn aggregated_state(&self) -> &str {
        self.status
            .as_ref()
            .and_then(|s| s.aggregated.as_deref())
            .unwrap_or("")
    }

    /// The cluster's current state as a payload for `update`
    pub fn to_payload(&self) -> ClusterPayload {
        ClusterPayload {
            extensions: self.extensions.clone(),
            hibernation: self.hibernation.clone(),
            kubernetes: self.kubernetes.clone(),
            maintenance: self.maintenance.clone(),
            nodepools: self.nodepools.clone(),
            status: self.status.clone(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterList {
    #[serde(default)]
    pub items: Vec<Cluster>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct KubernetesVersion {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ImageVersion {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub cri: Vec<Cri>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MachineImage {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub versions: Vec<ImageVersion>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderOptions {
    #[serde(default)]
    pub kubernetes_versions: Vec<KubernetesVersion>,
    #[serde(default)]
    pub machine_images: Vec<MachineImage>,
}

fn clusters_path(project_id: &str) -> String {
    format!("/v1/projects/{}/clusters", project_id)
}

fn cluster_path(project_id: &str, name: &str) -> String {
    format!("/v1/projects/{}/clusters/{}", project_id, name)
}

pub fn list_clusters(client: &ApiClient, project_id: &str) -> Result<ClusterList, CliError> {
    client.get("list SKE clusters", &clusters_path(project_id), &[])
}

pub fn get_cluster(client: &ApiClient, project_id: &str, name: &str) -> Result<Cluster, CliError> {
    client.get("get SKE cluster", &cluster_path(project_id, name), &[])
}

pub fn create_or_update_cluster(
    client: &ApiClient,
    project_id: &str,
    name: &str,
    payload: &ClusterPayload,
) -> Result<Cluster, CliError> {
    client.send(
        "create or update SKE cluster",
        Method::Put,
        &cluster_path(project_id, name),
        payload,
    )
}

pub fn delete_cluster(client: &ApiClient, project_id: &str, name: &str) -> Result<(), CliError> {
    client.send_no_content::<()>(
        "delete SKE cluster",
        Method::Delete,
        &cluster_path(project_id, name),
        None,
    )
}

pub fn provider_options(client: &ApiClient) -> Result<ProviderOptions, CliError> {
    client.get("get SKE provider options", "/v1/provider-options", &[])
}

pub fn cluster_exists(client: &ApiClient, project_id: &str, name: &str) -> Result<bool, CliError> {
    Ok(list_clusters(client, project_id)?
        .items
        .iter()
        .any(|c| c.name == name))
}

/// Compare dotted numeric versions; missing components count as zero
fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |v: &str| -> Vec<u64> {
        v.trim_start_matches('v')
            .split(&['.', '-', '+'][..])
            .map_while(|part| part.parse::<u64>().ok())
            .collect()
    };
    let (a, b) = (parse(a), parse(b));
    for i in 0..a.len().max(b.len()) {
        let ord = a.get(i).unwrap_or(&0).cmp(b.get(i).unwrap_or(&0));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn latest<'a>(versions: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    versions.fold(None, |best, v| match best {
        Some(b) if compare_versions(v, b) != Ordering::Greater => Some(b),
        _ => Some(v),
    })
}

/// Default create payload derived from the provider options
pub fn default_payload(options: &ProviderOptions) -> Result<ClusterPayload, CliError> {
    let k8s_version = latest(
        options
            .kubernetes_versions
            .iter()
            .filter(|v| v.state == SUPPORTED_STATE)
            .map(|v| v.version.as_str()),
    )
    .ok_or_else(|| CliError::decode("get SKE provider options", "no supported Kubernetes version found"))?;

    let image_version = latest(
        options
            .machine_images
            .iter()
            .filter(|img| img.name == DEFAULT_IMAGE_NAME)
            .flat_map(|img| img.versions.iter())
            .filter(|v| v.state == SUPPORTED_STATE)
            .filter(|v| v.cri.iter().any(|c| c.name.as_deref() == Some(DEFAULT_CRI)))
            .map(|v| v.version.as_str()),
    )
    .ok_or_else(|| CliError::decode("get SKE provider options", "no supported images found"))?;

    let nodepool = Nodepool {
        name: Some(DEFAULT_NODEPOOL_NAME.to_string()),
        availability_zones: vec![DEFAULT_AVAILABILITY_ZONE.to_string()],
        cri: Some(Cri {
            name: Some(DEFAULT_CRI.to_string()),
        }),
        machine: Some(Machine {
            machine_type: Some(DEFAULT_MACHINE_TYPE.to_string()),
            image: Some(Image {
                name: Some(DEFAULT_IMAGE_NAME.to_string()),
                version: Some(image_version.to_string()),
            }),
        }),
        max_surge: Some(DEFAULT_MAX_SURGE),
        maximum: Some(DEFAULT_MAXIMUM),
        minimum: Some(DEFAULT_MINIMUM),
        volume: Some(Volume {
            volume_type: Some(DEFAULT_VOLUME_TYPE.to_string()),
            size: Some(DEFAULT_VOLUME_SIZE),
        }),
        extra: Map::new(),
    };

    Ok(ClusterPayload {
        extensions: Some(Extensions {
            acl: Some(Acl {
                allowed_cidrs: Vec::new(),
                enabled: false,
            }),
            extra: Map::new(),
        }),
        kubernetes: Some(Kubernetes {
            version: Some(k8s_version.to_string()),
            extra: Map::new(),
        }),
        nodepools: vec![nodepool],
        ..Default::default()
    })
}

/// Wait until the cluster is healthy (or hibernated)
pub fn wait_until_healthy(
    waiter: &Waiter,
    client: &ApiClient,
    project_id: &str,
    name: &str,
) -> Result<Cluster, CliError> {
    waiter.wait("wait for SKE cluster", || {
        let cluster = get_cluster(client, project_id, name)?;
        Ok(match cluster.aggregated_state() {
            STATE_HEALTHY | STATE_HIBERNATED => PollState::Done(cluster),
            STATE_UNHEALTHY => PollState::Failed(format!("cluster {} is unhealthy", name)),
            _ => PollState::Pending,
        })
    })
}

pub fn wait_until_deleted(
    waiter: &Waiter,
    client: &ApiClient,
    project_id: &str,
    name: &str,
) -> Result<(), CliError> {
    waiter.wait("wait for SKE cluster deletion", || {
        let found: Option<Cluster> =
            client.get_optional("get SKE cluster", &cluster_path(project_id, name))?;
        Ok(match found {
            None => PollState::Done(()),
            Some(_) => PollState::Pending,
        })
    })
}
