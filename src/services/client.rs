//! HTTP plumbing shared by every service client

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::core::cancel::CancelToken;
use crate::core::errors::CliError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Connect,
    Trace,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Connect => "CONNECT",
            Method::Trace => "TRACE",
        };
        f.write_str(s)
    }
}

impl Serialize for Method {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl std::str::FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "PATCH" => Method::Patch,
            "DELETE" => Method::Delete,
            "OPTIONS" => Method::Options,
            "CONNECT" => Method::Connect,
            "TRACE" => Method::Trace,
            other => return Err(format!("unsupported HTTP method {:?}", other)),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Body decoded as JSON, for inspection in logs and tests
    pub fn json_body(&self) -> Option<serde_json::Value> {
        self.body.as_deref().and_then(|b| serde_json::from_str(b).ok())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one request and returns whatever the server answered
///
/// Error statuses are returned as responses; only transport failures are
/// errors here.
pub trait HttpTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, CliError>;
}

pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(&format!("stackit-cli/{}", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl HttpTransport for UreqTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, CliError> {
        tracing::debug!(method = %request.method, url = %request.url, "sending request");

        let mut req = self.agent.request(&request.method.to_string(), &request.url);
        for (k, v) in &request.query {
            req = req.query(k, v);
        }
        for (k, v) in &request.headers {
            req = req.set(k, v);
        }

        let result = match &request.body {
            Some(body) => req.send_string(body),
            None => req.call(),
        };

        let response = match result {
            Ok(resp) => resp,
            Err(ureq::Error::Status(_, resp)) => resp,
            Err(ureq::Error::Transport(t)) => {
                return Err(CliError::Http {
                    operation: format!("{} {}", request.method, request.url),
                    message: t.to_string(),
                })
            }
        };

        let status = response.status();
        let status_text = response.status_text().to_string();
        let headers = response
            .headers_names()
            .into_iter()
            .filter_map(|name| response.header(&name).map(|v| (name.clone(), v.to_string())))
            .collect();
        let body = response
            .into_string()
            .map_err(|e| CliError::io("read response body", e))?;

        tracing::debug!(status, "received response");
        Ok(ApiResponse {
            status,
            status_text,
            headers,
            body,
        })
    }
}

/// Authenticated JSON client for one service base URL
pub struct ApiClient<'a> {
    transport: &'a dyn HttpTransport,
    base_url: String,
    token: String,
    cancel: CancelToken,
}

impl<'a> ApiClient<'a> {
    pub fn new(transport: &'a dyn HttpTransport, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            cancel: CancelToken::new(),
        }
    }

    /// Refuse to send, and drop answers, once `cancel` fired
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> ApiRequest {
        let mut req = ApiRequest::new(method, format!("{}{}", self.base_url, path));
        req.headers
            .push(("Authorization".to_string(), format!("Bearer {}", self.token)));
        req.headers
            .push(("Accept".to_string(), "application/json".to_string()));
        req
    }

    fn dispatch(&self, req: &ApiRequest) -> Result<ApiResponse, CliError> {
        self.cancel.check()?;
        let resp = self.transport.send(req)?;
        self.cancel.check()?;
        Ok(resp)
    }

    fn execute(&self, operation: &str, req: ApiRequest) -> Result<ApiResponse, CliError> {
        let resp = self.dispatch(&req)?;
        if resp.is_success() {
            Ok(resp)
        } else {
            Err(remote_error(operation, &resp))
        }
    }

    /// GET and decode a JSON body
    pub fn get<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, CliError> {
        let mut req = self.request(Method::Get, path);
        req.query = query
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        let resp = self.execute(operation, req)?;
        decode(operation, &resp)
    }

    /// GET that maps 404 to `None`, used by waiters watching a deletion
    pub fn get_optional<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
    ) -> Result<Option<T>, CliError> {
        let req = self.request(Method::Get, path);
        let resp = self.dispatch(&req)?;
        match resp.status {
            404 => Ok(None),
            _ if resp.is_success() => decode(operation, &resp).map(Some),
            _ => Err(remote_error(operation, &resp)),
        }
    }

    /// Send a JSON body and decode the JSON answer
    pub fn send<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        operation: &str,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, CliError> {
        let resp = self.send_raw(operation, method, path, Some(body))?;
        decode(operation, &resp)
    }

    /// Send a request whose answer carries no body we care about
    pub fn send_no_content<B: Serialize + ?Sized>(
        &self,
        operation: &str,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<(), CliError> {
        self.send_raw(operation, method, path, body).map(|_| ())
    }

    fn send_raw<B: Serialize + ?Sized>(
        &self,
        operation: &str,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<ApiResponse, CliError> {
        let mut req = self.request(method, path);
        if let Some(body) = body {
            let encoded =
                serde_json::to_string(body).map_err(|e| CliError::decode(operation, e))?;
            req.headers
                .push(("Content-Type".to_string(), "application/json".to_string()));
            req.body = Some(encoded);
        }
        self.execute(operation, req)
    }
}

fn decode<T: DeserializeOwned>(operation: &str, resp: &ApiResponse) -> Result<T, CliError> {
    let body = if resp.body.trim().is_empty() { "null" } else { &resp.body };
    serde_json::from_str(body).map_err(|e| CliError::decode(operation, e))
}

/// Build a `Remote` error, preferring the `message` field of a JSON body
pub fn remote_error(operation: &str, resp: &ApiResponse) -> CliError {
    let message = serde_json::from_str::<serde_json::Value>(&resp.body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            let body = resp.body.trim();
            if body.is_empty() {
                resp.status_text.clone()
            } else {
                body.chars().take(300).collect()
            }
        });
    CliError::Remote {
        operation: operation.to_string(),
        status: Some(resp.status),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::test_support::RecordingTransport;
    use serde_json::json;

    #[test]
    fn test_method_round_trip() {
        assert_eq!("patch".parse::<Method>().unwrap(), Method::Patch);
        assert_eq!(Method::Delete.to_string(), "DELETE");
        assert!("FETCH".parse::<Method>().is_err());
    }

    #[test]
    fn test_client_sets_auth_and_url() {
        let transport = RecordingTransport::new();
        transport.respond(200, json!({"ok": true}));
        let client = ApiClient::new(&transport, "https://dns.example/", "tok");

        let value: serde_json::Value = client.get("read", "/v1/x", &[("page", "2".into())]).unwrap();
        assert_eq!(value["ok"], json!(true));

        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url, "https://dns.example/v1/x");
        assert_eq!(sent[0].header("authorization"), Some("Bearer tok"));
        assert_eq!(sent[0].query, vec![("page".to_string(), "2".to_string())]);
    }

    #[test]
    fn test_error_status_becomes_remote_error() {
        let transport = RecordingTransport::new();
        transport.respond(403, json!({"message": "forbidden for you"}));
        let client = ApiClient::new(&transport, "https://x", "tok");

        let err = client
            .get::<serde_json::Value>("list zones", "/zones", &[])
            .unwrap_err();
        match err {
            CliError::Remote {
                status, message, ..
            } => {
                assert_eq!(status, Some(403));
                assert_eq!(message, "forbidden for you");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_get_optional_maps_404() {
        let transport = RecordingTransport::new();
        transport.respond(404, json!({"message": "gone"}));
        let client = ApiClient::new(&transport, "https://x", "tok");
        let found: Option<serde_json::Value> = client.get_optional("read", "/thing").unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_cancelled_client_sends_nothing() {
        let transport = RecordingTransport::new();
        let cancel = CancelToken::new();
        cancel.cancel();
        let client = ApiClient::new(&transport, "https://x", "tok").with_cancel(cancel);

        let err = client
            .send_no_content::<()>("delete", Method::Delete, "/thing", None)
            .unwrap_err();
        assert!(matches!(err, CliError::Cancelled));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_send_encodes_json_body() {
        let transport = RecordingTransport::new();
        transport.respond(202, json!({}));
        let client = ApiClient::new(&transport, "https://x", "tok");
        client
            .send_no_content("update", Method::Patch, "/thing", Some(&json!({"name": "a"})))
            .unwrap();
        let sent = &transport.requests()[0];
        assert_eq!(sent.method, Method::Patch);
        assert_eq!(sent.json_body(), Some(json!({"name": "a"})));
        assert_eq!(sent.header("content-type"), Some("application/json"));
    }
}
