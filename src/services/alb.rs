//! Application load balancer API

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::errors::CliError;
use crate::services::{ApiClient, Method, PollState, Waiter};

pub const STATUS_READY: &str = "STATUS_READY";
pub const STATUS_ERROR: &str = "STATUS_ERROR";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listener {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetPool {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_port: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessControl {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_source_ranges: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_control: Option<AccessControl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_network_only: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Load balancer as returned by the API and as read from a configuration file
///
/// Fields the CLI does not interpret are kept in `extra` so a configuration
/// file round-trips unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<LoadBalancerError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub listeners: Vec<Listener>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_pools: Vec<TargetPool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<Network>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<LoadBalancerOptions>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerList {
    #[serde(default)]
    pub load_balancers: Vec<LoadBalancer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_id: Option<String>,
}

fn load_balancers_path(project_id: &str, region: &str) -> String {
    format!("/v2/projects/{}/regions/{}/load-balancers", project_id, region)
}

fn load_balancer_path(project_id: &str, region: &str, name: &str) -> String {
    format!("{}/{}", load_balancers_path(project_id, region), name)
}

pub fn create_load_balancer(
    client: &ApiClient,
    project_id: &str,
    region: &str,
    payload: &LoadBalancer,
) -> Result<LoadBalancer, CliError> {
    client.send(
        "create application loadbalancer",
        Method::Post,
        &load_balancers_path(project_id, region),
        payload,
    )
}

pub fn list_load_balancers(
    client: &ApiClient,
    project_id: &str,
    region: &str,
    page_id: Option<&str>,
) -> Result<LoadBalancerList, CliError> {
    let query: Vec<(&str, String)> = page_id
        .map(|id| vec![("pageId", id.to_string())])
        .unwrap_or_default();
    client.get(
        "list application loadbalancers",
        &load_balancers_path(project_id, region),
        &query,
    )
}

pub fn get_load_balancer(
    client: &ApiClient,
    project_id: &str,
    region: &str,
    name: &str,
) -> Result<LoadBalancer, CliError> {
    client.get(
        "get application loadbalancer",
        &load_balancer_path(project_id, region, name),
        &[],
    )
}

pub fn update_load_balancer(
    client: &ApiClient,
    project_id: &str,
    region: &str,
    name: &str,
    payload: &LoadBalancer,
) -> Result<LoadBalancer, CliError> {
    client.send(
        "update application loadbalancer",
        Method::Put,
        &load_balancer_path(project_id, region, name),
        payload,
    )
}

pub fn delete_load_balancer(
    client: &ApiClient,
    project_id: &str,
    region: &str,
    name: &str,
) -> Result<(), CliError> {
    client.send_no_content::<()>(
        "delete application loadbalancer",
        Method::Delete,
        &load_balancer_path(project_id, region, name),
        None,
    )
}

/// Wait until the load balancer reports `STATUS_READY`
pub fn wait_until_ready(
    waiter: &Waiter,
    client: &ApiClient,
    project_id: &str,
    region: &str,
    name: &str,
) -> Result<LoadBalancer, CliError> {
    waiter.wait("wait for application loadbalancer", || {
        let lb = get_load_balancer(client, project_id, region, name)?;
        Ok(match lb.status.as_deref() {
            Some(STATUS_READY) => PollState::Done(lb),
            Some(STATUS_ERROR) => {
                let reasons: Vec<String> = lb
                    .errors
                    .iter()
                    .filter_map(|e| e.description.clone())
                    .collect();
                PollState::Failed(format!("loadbalancer in error state: {}", reasons.join("; ")))
            }
            _ => PollState::Pending,
        })
    })
}

/// Wait until the load balancer is gone
pub fn wait_until_deleted(
    waiter: &Waiter,
    client: &ApiClient,
    project_id: &str,
    region: &str,
    name: &str,
) -> Result<(), CliError> {
    waiter.wait("wait for application loadbalancer deletion", || {
        let found: Option<LoadBalancer> = client.get_optional(
            "get application loadbalancer",
            &load_balancer_path(project_id, region, name),
        )?;
        Ok(match found {
            None => PollState::Done(()),
            Some(_) => PollState::Pending,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::test_support::RecordingTransport;
    use crate::core::cancel::CancelToken;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_unknown_fields_round_trip() {
        let raw = json!({
            "name": "my-lb",
            "planId": "p10",
            "listeners": [{"name": "http", "port": 80, "protocol": "PROTOCOL_HTTP", "http": {"hosts": []}}],
            "ruleset": {"custom": true}
        });
        let lb: LoadBalancer = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(lb.name.as_deref(), Some("my-lb"));
        assert_eq!(lb.extra.get("ruleset"), Some(&json!({"custom": true})));
        assert_eq!(serde_json::to_value(&lb).unwrap(), raw);
    }

    #[test]
    fn test_wait_until_ready() {
        let transport = RecordingTransport::new();
        transport.respond(200, json!({"name": "lb", "status": "STATUS_PENDING"}));
        transport.respond(200, json!({"name": "lb", "status": "STATUS_READY"}));
        let client = ApiClient::new(&transport, "https://alb", "t");
        let waiter = Waiter::new(CancelToken::new(), Duration::ZERO, Duration::from_secs(5));
        let lb = wait_until_ready(&waiter, &client, "p", "eu01", "lb").unwrap();
        assert_eq!(lb.status.as_deref(), Some(STATUS_READY));
        assert_eq!(
            transport.requests()[0].url,
            "https://alb/v2/projects/p/regions/eu01/load-balancers/lb"
        );
    }

    #[test]
    fn test_wait_until_ready_reports_errors() {
        let transport = RecordingTransport::new();
        transport.respond(
            200,
            json!({"name": "lb", "status": "STATUS_ERROR", "errors": [{"description": "quota exceeded"}]}),
        );
        let client = ApiClient::new(&transport, "https://alb", "t");
        let waiter = Waiter::new(CancelToken::new(), Duration::ZERO, Duration::from_secs(5));
        let err = wait_until_ready(&waiter, &client, "p", "eu01", "lb").unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }
}
