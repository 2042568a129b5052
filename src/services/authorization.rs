//! Authorization API: role bindings on a resource

use serde::{Deserialize, Serialize};

use crate::core::errors::CliError;
use crate::services::{ApiClient, Method};

pub const PROJECT_RESOURCE_TYPE: &str = "project";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembersResponse {
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMembersPayload {
    pub members: Vec<Member>,
    pub resource_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveMembersPayload {
    pub members: Vec<Member>,
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_remove: Option<bool>,
}

pub fn list_members(
    client: &ApiClient,
    resource_type: &str,
    resource_id: &str,
    subject: Option<&str>,
) -> Result<MembersResponse, CliError> {
    let mut query = vec![("resourceType", resource_type.to_string())];
    if let Some(subject) = subject {
        query.push(("subject", subject.to_string()));
    }
    client.get("list members", &format!("/v2/{}/members", resource_id), &query)
}

pub fn add_members(
    client: &ApiClient,
    resource_id: &str,
    payload: &AddMembersPayload,
) -> Result<MembersResponse, CliError> {
    client.send(
        "add member",
        Method::Patch,
        &format!("/v2/{}/members", resource_id),
        payload,
    )
}

pub fn remove_members(
    client: &ApiClient,
    resource_id: &str,
    payload: &RemoveMembersPayload,
) -> Result<MembersResponse, CliError> {
    client.send(
        "remove member",
        Method::Post,
        &format!("/v2/{}/members/remove", resource_id),
        payload,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::test_support::RecordingTransport;
    use serde_json::json;

    #[test]
    fn test_remove_members_path_and_body() {
        let transport = RecordingTransport::new();
        transport.respond(200, json!({"members": []}));
        let client = ApiClient::new(&transport, "https://authorization", "t");
        remove_members(
            &client,
            "p1",
            &RemoveMembersPayload {
                members: vec![Member {
                    subject: "a@b.c".into(),
                    role: "editor".into(),
                }],
                resource_type: PROJECT_RESOURCE_TYPE.into(),
                force_remove: Some(true),
            },
        )
        .unwrap();
        let sent = &transport.requests()[0];
        assert_eq!(sent.url, "https://authorization/v2/p1/members/remove");
        assert_eq!(
            sent.json_body(),
            Some(json!({
                "members": [{"subject": "a@b.c", "role": "editor"}],
                "resourceType": "project",
                "forceRemove": true
            }))
        );
    }
}
