//! DNS API: zones and record sets

use serde::{Deserialize, Serialize};

use crate::core::errors::CliError;
use crate::services::{ApiClient, Method, PollState, Waiter};

pub const STATE_CREATE_SUCCEEDED: &str = "CREATE_SUCCEEDED";
pub const STATE_UPDATE_SUCCEEDED: &str = "UPDATE_SUCCEEDED";
pub const STATE_DELETE_SUCCEEDED: &str = "DELETE_SUCCEEDED";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dns_name: String,
    #[serde(default)]
    pub state: String,
    #[serde(default, rename = "type")]
    pub zone_type: String,
    #[serde(rename = "defaultTTL", skip_serializing_if = "Option::is_none")]
    pub default_ttl: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_name_server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primaries: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSet {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub ttl: i64,
    #[serde(default, rename = "type")]
    pub record_type: String,
    #[serde(default)]
    pub records: Vec<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneResponse {
    pub zone: Zone,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZonesResponse {
    #[serde(default)]
    pub zones: Vec<Zone>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSetResponse {
    pub rrset: RecordSet,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSetsResponse {
    #[serde(default)]
    pub rr_sets: Vec<RecordSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateZonePayload {
    pub name: String,
    pub dns_name: String,
    #[serde(rename = "defaultTTL", skip_serializing_if = "Option::is_none")]
    pub default_ttl: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primaries: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acl: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub zone_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_cache: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_reverse_zone: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialUpdateZonePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "defaultTTL", skip_serializing_if = "Option::is_none")]
    pub default_ttl: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primaries: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_cache: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordPayload {
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecordSetPayload {
    pub name: String,
    pub records: Vec<RecordPayload>,
    #[serde(rename = "type")]
    pub record_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialUpdateRecordSetPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<RecordPayload>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Filters shared by the zone and record-set list endpoints
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListFilter {
    pub name_like: Option<String>,
    pub active: Option<bool>,
    pub state_eq: Option<String>,
    pub state_neq: Option<String>,
    pub order_by_name: Option<String>,
    pub page_size: i64,
}

impl ListFilter {
    fn query(&self, page: i64) -> Vec<(&'static str, String)> {
        let mut q = vec![("page", page.to_string()), ("pageSize", self.page_size.to_string())];
        if let Some(name) = &self.name_like {
            q.push(("name[like]", name.clone()));
        }
        if let Some(active) = self.active {
            q.push(("active[eq]", active.to_string()));
        }
        if let Some(state) = &self.state_eq {
            q.push(("state[eq]", state.clone()));
        }
        if let Some(state) = &self.state_neq {
            q.push(("state[neq]", state.clone()));
        }
        if let Some(order) = &self.order_by_name {
            q.push(("order[name]", order.clone()));
        }
        q
    }
}

fn zones_path(project_id: &str) -> String {
    format!("/v1/projects/{}/zones", project_id)
}

fn zone_path(project_id: &str, zone_id: &str) -> String {
    format!("/v1/projects/{}/zones/{}", project_id, zone_id)
}

fn record_sets_path(project_id: &str, zone_id: &str) -> String {
    format!("/v1/projects/{}/zones/{}/rrsets", project_id, zone_id)
}

fn record_set_path(project_id: &str, zone_id: &str, record_set_id: &str) -> String {
    format!("/v1/projects/{}/zones/{}/rrsets/{}", project_id, zone_id, record_set_id)
}

pub fn create_zone(
    client: &ApiClient,
    project_id: &str,
    payload: &CreateZonePayload,
) -> Result<ZoneResponse, CliError> {
    client.send("create DNS zone", Method::Post, &zones_path(project_id), payload)
}

pub fn get_zone(client: &ApiClient, project_id: &str, zone_id: &str) -> Result<ZoneResponse, CliError> {
    client.get("get DNS zone", &zone_path(project_id, zone_id), &[])
}

pub fn list_zones(
    client: &ApiClient,
    project_id: &str,
    filter: &ListFilter,
    page: i64,
) -> Result<ZonesResponse, CliError> {
    client.get("list DNS zones", &zones_path(project_id), &filter.query(page))
}

pub fn update_zone(
    client: &ApiClient,
    project_id: &str,
    zone_id: &str,
    payload: &PartialUpdateZonePayload,
) -> Result<(), CliError> {
    client.send_no_content(
        "update DNS zone",
        Method::Patch,
        &zone_path(project_id, zone_id),
        Some(payload),
    )
}

pub fn delete_zone(client: &ApiClient, project_id: &str, zone_id: &str) -> Result<(), CliError> {
    client.send_no_content::<()>("delete DNS zone", Method::Delete, &zone_path(project_id, zone_id), None)
}

pub fn create_record_set(
    client: &ApiClient,
    project_id: &str,
    zone_id: &str,
    payload: &CreateRecordSetPayload,
) -> Result<RecordSetResponse, CliError> {
    client.send(
        "create DNS record set",
        Method::Post,
        &record_sets_path(project_id, zone_id),
        payload,
    )
}

pub fn get_record_set(
    client: &ApiClient,
    project_id: &str,
    zone_id: &str,
    record_set_id: &str,
) -> Result<RecordSetResponse, CliError> {
    client.get(
        "get DNS record set",
        &record_set_path(project_id, zone_id, record_set_id),
        &[],
    )
}

pub fn list_record_sets(
    client: &ApiClient,
    project_id: &str,
    zone_id: &str,
    filter: &ListFilter,
    page: i64,
) -> Result<RecordSetsResponse, CliError> {
    client.get(
        "list DNS record sets",
        &record_sets_path(project_id, zone_id),
        &filter.query(page),
    )
}

pub fn update_record_set(
    client: &ApiClient,
    project_id: &str,
    zone_id: &str,
    record_set_id: &str,
    payload: &PartialUpdateRecordSetPayload,
) -> Result<(), CliError> {
    client.send_no_content(
        "update DNS record set",
        Method::Patch,
        &record_set_path(project_id, zone_id, record_set_id),
        Some(payload),
    )
}

pub fn delete_record_set(
    client: &ApiClient,
    project_id: &str,
    zone_id: &str,
    record_set_id: &str,
) -> Result<(), CliError> {
    client.send_no_content::<()>(
        "delete DNS record set",
        Method::Delete,
        &record_set_path(project_id, zone_id, record_set_id),
        None,
    )
}

/// Zone name for prompts, falling back to the id when the lookup fails
pub fn zone_label(client: &ApiClient, project_id: &str, zone_id: &str) -> String {
    match get_zone(client, project_id, zone_id) {
        Ok(resp) if !resp.zone.name.is_empty() => resp.zone.name,
        Ok(_) => zone_id.to_string(),
        Err(e) => {
            tracing::debug!(error = %e, "get zone name");
            zone_id.to_string()
        }
    }
}

pub fn record_set_label(
    client: &ApiClient,
    project_id: &str,
    zone_id: &str,
    record_set_id: &str,
) -> String {
    match get_record_set(client, project_id, zone_id, record_set_id) {
        Ok(resp) if !resp.rrset.name.is_empty() => resp.rrset.name,
        Ok(_) => record_set_id.to_string(),
        Err(e) => {
            tracing::debug!(error = %e, "get record set name");
            record_set_id.to_string()
        }
    }
}

/// Map a resource state to a poll outcome for the expected success state
fn poll_state<T>(state: &str, success: &str, error: Option<&str>, value: T) -> PollState<T> {
    if state == success {
        PollState::Done(value)
    } else if state.ends_with("_FAILED") {
        PollState::Failed(format!(
            "resource ended in state {}{}",
            state,
            error.map(|e| format!(": {}", e)).unwrap_or_default()
        ))
    } else {
        PollState::Pending
    }
}

/// Wait until the zone reaches `success` (one of the `STATE_*` constants)
pub fn wait_for_zone(
    waiter: &Waiter,
    client: &ApiClient,
    project_id: &str,
    zone_id: &str,
    success: &str,
) -> Result<(), CliError> {
    waiter.wait("wait for DNS zone", || {
        let found: Option<ZoneResponse> =
            client.get_optional("get DNS zone", &zone_path(project_id, zone_id))?;
        Ok(match found {
            None if success == STATE_DELETE_SUCCEEDED => PollState::Done(()),
            None => PollState::Failed("zone not found".to_string()),
            Some(resp) => poll_state(&resp.zone.state, success, resp.zone.error.as_deref(), ()),
        })
    })
}

pub fn wait_for_record_set(
    waiter: &Waiter,
    client: &ApiClient,
    project_id: &str,
    zone_id: &str,
    record_set_id: &str,
    success: &str,
) -> Result<(), CliError> {
    waiter.wait("wait for DNS record set", || {
        let found: Option<RecordSetResponse> = client.get_optional(
            "get DNS record set",
            &record_set_path(project_id, zone_id, record_set_id),
        )?;
        Ok(match found {
            None if success == STATE_DELETE_SUCCEEDED => PollState::Done(()),
            None => PollState::Failed("record set not found".to_string()),
            Some(resp) => poll_state(&resp.rrset.state, success, resp.rrset.error.as_deref(), ()),
        })
    })
}
