//! IaaS API: security groups and their rules

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::errors::CliError;
use crate::services::{ApiClient, Method};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroup {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stateful: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<SecurityGroupRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IcmpParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub icmp_type: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Protocol {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroupRule {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub direction: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ethertype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icmp_parameters: Option<IcmpParameters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_range: Option<PortRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_security_group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_group_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroupList {
    #[serde(default)]
    pub items: Vec<SecurityGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroupRuleList {
    #[serde(default)]
    pub items: Vec<SecurityGroupRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreateSecurityGroupPayload {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stateful: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateSecurityGroupPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

/// Protocol of a new rule: either an IANA number or a name
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CreateProtocol {
    Number(i64),
    Name(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSecurityGroupRulePayload {
    pub direction: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ethertype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icmp_parameters: Option<IcmpParameters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_range: Option<PortRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<CreateProtocol>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_security_group_id: Option<String>,
}

fn groups_path(project_id: &str, region: &str) -> String {
    format!("/v2/projects/{}/regions/{}/security-groups", project_id, region)
}

fn group_path(project_id: &str, region: &str, group_id: &str) -> String {
    format!("{}/{}", groups_path(project_id, region), group_id)
}

fn rules_path(project_id: &str, region: &str, group_id: &str) -> String {
    format!("{}/rules", group_path(project_id, region, group_id))
}

pub fn create_security_group(
    client: &ApiClient,
    project_id: &str,
    region: &str,
    payload: &CreateSecurityGroupPayload,
) -> Result<SecurityGroup, CliError> {
    client.send(
        "create security group",
        Method::Post,
        &groups_path(project_id, region),
        payload,
    )
}

pub fn list_security_groups(
    client: &ApiClient,
    project_id: &str,
    region: &str,
    label_selector: Option<&str>,
) -> Result<SecurityGroupList, CliError> {
    let query: Vec<(&str, String)> = label_selector
        .map(|s| vec![("label_selector", s.to_string())])
        .unwrap_or_default();
    client.get("list security groups", &groups_path(project_id, region), &query)
}

pub fn get_security_group(
    client: &ApiClient,
    project_id: &str,
    region: &str,
    group_id: &str,
) -> Result<SecurityGroup, CliError> {
    client.get(
        "get security group",
        &group_path(project_id, region, group_id),
        &[],
    )
}

pub fn update_security_group(
    client: &ApiClient,
    project_id: &str,
    region: &str,
    group_id: &str,
    payload: &UpdateSecurityGroupPayload,
) -> Result<SecurityGroup, CliError> {
    client.send(
        "update security group",
        Method::Patch,
        &group_path(project_id, region, group_id),
        payload,
    )
}

pub fn delete_security_group(
    client: &ApiClient,
    project_id: &str,
    region: &str,
    group_id: &str,
) -> Result<(), CliError> {
    client.send_no_content::<()>(
        "delete security group",
        Method::Delete,
        &group_path(project_id, region, group_id),
        None,
    )
}

pub fn create_security_group_rule(
    client: &ApiClient,
    project_id: &str,
    region: &str,
    group_id: &str,
    payload: &CreateSecurityGroupRulePayload,
) -> Result<SecurityGroupRule, CliError> {
    client.send(
        "create security group rule",
        Method::Post,
        &rules_path(project_id, region, group_id),
        payload,
    )
}

pub fn list_security_group_rules(
    client: &ApiClient,
    project_id: &str,
    region: &str,
    group_id: &str,
) -> Result<SecurityGroupRuleList, CliError> {
    client.get(
        "list security group rules",
        &rules_path(project_id, region, group_id),
        &[],
    )
}

pub fn get_security_group_rule(
    client: &ApiClient,
    project_id: &str,
    region: &str,
    group_id: &str,
    rule_id: &str,
) -> Result<SecurityGroupRule, CliError> {
    client.get(
        "get security group rule",
        &format!("{}/{}", rules_path(project_id, region, group_id), rule_id),
        &[],
    )
}

pub fn delete_security_group_rule(
    client: &ApiClient,
    project_id: &str,
    region: &str,
    group_id: &str,
    rule_id: &str,
) -> Result<(), CliError> {
    client.send_no_content::<()>(
        "delete security group rule",
        Method::Delete,
        &format!("{}/{}", rules_path(project_id, region, group_id), rule_id),
        None,
    )
}

/// Security group name for prompts, falling back to the id
pub fn security_group_label(
    client: &ApiClient,
    project_id: &str,
    region: &str,
    group_id: &str,
) -> String {
    match get_security_group(client, project_id, region, group_id) {
        Ok(group) if !group.name.is_empty() => group.name,
        Ok(_) => group_id.to_string(),
        Err(e) => {
            tracing::debug!(error = %e, "get security group name");
            group_id.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_protocol_serializes_as_number_or_name() {
        let by_number = CreateSecurityGroupRulePayload {
            direction: "ingress".into(),
            protocol: Some(CreateProtocol::Number(6)),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&by_number).unwrap(),
            json!({"direction": "ingress", "protocol": 6})
        );

        let by_name = CreateSecurityGroupRulePayload {
            direction: "egress".into(),
            protocol: Some(CreateProtocol::Name("icmp".into())),
            icmp_parameters: Some(IcmpParameters {
                code: Some(0),
                icmp_type: Some(8),
            }),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&by_name).unwrap(),
            json!({"direction": "egress", "protocol": "icmp", "icmpParameters": {"code": 0, "type": 8}})
        );
    }

    #[test]
    fn test_rule_decodes_nested_fields() {
        let rule: SecurityGroupRule = serde_json::from_value(json!({
            "id": "r1",
            "direction": "ingress",
            "ethertype": "IPv4",
            "portRange": {"min": 22, "max": 22},
            "protocol": {"name": "tcp", "number": 6}
        }))
        .unwrap();
        assert_eq!(rule.port_range.unwrap().min, Some(22));
        assert_eq!(rule.protocol.unwrap().name.as_deref(), Some("tcp"));
    }
}
