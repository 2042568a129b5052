//! Object storage API: buckets

use serde::{Deserialize, Serialize};

use crate::core::errors::CliError;
use crate::services::{ApiClient, Method, PollState, Waiter};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub url_path_style: String,
    #[serde(default)]
    pub url_virtual_hosted_style: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketResponse {
    pub bucket: Bucket,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketList {
    #[serde(default)]
    pub buckets: Vec<Bucket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

fn project_path(project_id: &str, region: &str) -> String {
    format!("/v2/project/{}/regions/{}", project_id, region)
}

fn bucket_path(project_id: &str, region: &str, name: &str) -> String {
    format!("{}/bucket/{}", project_path(project_id, region), name)
}

/// Whether object storage is enabled for the project
pub fn project_enabled(client: &ApiClient, project_id: &str, region: &str) -> Result<bool, CliError> {
    let found: Option<serde_json::Value> =
        client.get_optional("get object storage status", &project_path(project_id, region))?;
    Ok(found.is_some())
}

pub fn enable_project(client: &ApiClient, project_id: &str, region: &str) -> Result<(), CliError> {
    client.send_no_content::<()>(
        "enable object storage",
        Method::Post,
        &project_path(project_id, region),
        None,
    )
}

pub fn create_bucket(
    client: &ApiClient,
    project_id: &str,
    region: &str,
    name: &str,
) -> Result<(), CliError> {
    client.send_no_content::<()>(
        "create object storage bucket",
        Method::Post,
        &bucket_path(project_id, region, name),
        None,
    )
}

pub fn list_buckets(client: &ApiClient, project_id: &str, region: &str) -> Result<BucketList, CliError> {
    client.get(
        "list object storage buckets",
        &format!("{}/buckets", project_path(project_id, region)),
        &[],
    )
}

pub fn get_bucket(
    client: &ApiClient,
    project_id: &str,
    region: &str,
    name: &str,
) -> Result<BucketResponse, CliError> {
    client.get(
        "get object storage bucket",
        &bucket_path(project_id, region, name),
        &[],
    )
}

pub fn delete_bucket(
    client: &ApiClient,
    project_id: &str,
    region: &str,
    name: &str,
) -> Result<(), CliError> {
    client.send_no_content::<()>(
        "delete object storage bucket",
        Method::Delete,
        &bucket_path(project_id, region, name),
        None,
    )
}

/// Wait until the bucket exists (`present`) or is gone
pub fn wait_for_bucket(
    waiter: &Waiter,
    client: &ApiClient,
    project_id: &str,
    region: &str,
    name: &str,
    present: bool,
) -> Result<(), CliError> {
    waiter.wait("wait for object storage bucket", || {
        let found: Option<BucketResponse> =
            client.get_optional("get object storage bucket", &bucket_path(project_id, region, name))?;
        Ok(if found.is_some() == present {
            PollState::Done(())
        } else {
            PollState::Pending
        })
    })
}
