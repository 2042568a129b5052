//! Resource manager API: projects

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::errors::CliError;
use crate::services::ApiClient;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub container_id: String,
    #[serde(default, rename = "type")]
    pub parent_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub container_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lifecycle_state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Parent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<Parent>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectList {
    #[serde(default)]
    pub items: Vec<Project>,
}

/// Server-side filters for the project listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectFilter {
    pub parent_id: Option<String>,
    pub project_ids: Vec<String>,
    pub member: Option<String>,
    pub creation_time_after: Option<DateTime<Utc>>,
}

impl ProjectFilter {
    fn query(&self, offset: i64, limit: i64) -> Vec<(&'static str, String)> {
        let mut q = vec![("offset", offset.to_string()), ("limit", limit.to_string())];
        if let Some(parent) = &self.parent_id {
            q.push(("containerParentId", parent.clone()));
        }
        for id in &self.project_ids {
            q.push(("containerIds", id.clone()));
        }
        if let Some(member) = &self.member {
            q.push(("member", member.clone()));
        }
        if let Some(after) = &self.creation_time_after {
            q.push((
                "creation-time-start",
                after.to_rfc3339_opts(SecondsFormat::Secs, true),
            ));
        }
        q
    }
}

pub fn list_projects(
    client: &ApiClient,
    filter: &ProjectFilter,
    offset: i64,
    page_size: i64,
) -> Result<ProjectList, CliError> {
    client.get("list projects", "/v2/projects", &filter.query(offset, page_size))
}

pub fn get_project(
    client: &ApiClient,
    project_id: &str,
    include_parents: bool,
) -> Result<Project, CliError> {
    let query: Vec<(&str, String)> = if include_parents {
        vec![("includeParents", "true".to_string())]
    } else {
        Vec::new()
    };
    client.get("get project", &format!("/v2/projects/{}", project_id), &query)
}
