//! `stackit curl` command - authenticated raw HTTP requests

use miette::Result;
use serde::Serialize;
use std::path::Path;
use url::Url;

use crate::cli::context::CmdContext;
use crate::cli::examples::{self, Example};
use crate::cli::flags;
use crate::cli::globalflags::GlobalFlagModel;
use crate::cli::input::InputModel;
use crate::cli::printer::Printer;
use crate::core::errors::CliError;
use crate::services::{ApiRequest, ApiResponse, Method};

const METHODS: &[&str] = &[
    "GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "CONNECT", "OPTIONS", "TRACE",
];

#[derive(clap::Args, Debug)]
#[command(long_about = "Executes an HTTP request to an endpoint, using the authentication provided by the CLI.")]
#[command(after_help = examples::build(&[
    Example::new(
        "Get all the DNS zones for project with ID xxx via GET request to https://dns.api.stackit.cloud/v1/projects/xxx/zones",
        ["$ stackit curl https://dns.api.stackit.cloud/v1/projects/xxx/zones"],
    ),
    Example::new(
        "Get all the DNS zones for project with ID xxx, write the complete response (headers and body) to file \"./output.txt\"",
        ["$ stackit curl https://dns.api.stackit.cloud/v1/projects/xxx/zones --include --output ./output.txt"],
    ),
    Example::new(
        "Create a new DNS zone for project with ID xxx with payload from file \"./payload.json\"",
        ["$ stackit curl https://dns.api.stackit.cloud/v1/projects/xxx/zones -X POST --data @./payload.json"],
    ),
    Example::new(
        "Get all the DNS zones for project with ID xxx with header \"Authorization: Bearer yyy\", fail if the server returns an error",
        ["$ stackit curl https://dns.api.stackit.cloud/v1/projects/xxx/zones -H \"Authorization: Bearer yyy\" --fail"],
    ),
]))]
pub struct CurlArgs {
    /// URL of the endpoint
    #[arg(value_name = "URL")]
    pub url: String,

    /// HTTP method, defaults to GET
    #[arg(short = 'X', long = "request", default_value = "GET", value_parser = flags::enum_parser(METHODS, true))]
    pub request_method: String,

    /// Custom headers to include in the request, can be specified multiple times.
    /// If the "Authorization" header is set, it overrides the authentication provided by the CLI
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Content to include in the request body. Can be a string or a file path prefixed with "@"
    #[arg(long, value_parser = flags::read_from_file)]
    pub data: Option<String>,

    /// If set, response headers are added to the output
    #[arg(long)]
    pub include: bool,

    /// If set, exits with error 22 if response code is 4XX or 5XX
    #[arg(long)]
    pub fail: bool,

    /// Writes output to provided file instead of printing to console
    #[arg(long)]
    pub output: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurlInput {
    #[serde(flatten)]
    pub global: GlobalFlagModel,
    pub url: String,
    pub request_method: Method,
    pub headers: Vec<(String, String)>,
    pub data: Option<String>,
    pub include_response_headers: bool,
    pub fail_on_http_error: bool,
    pub output_file: Option<String>,
}

impl InputModel for CurlInput {}

/// Validate the URL against the allowed domain and split the headers
pub fn parse_input(
    args: &CurlArgs,
    global: &GlobalFlagModel,
    allowed_domain: &str,
) -> Result<CurlInput, CliError> {
    validate_url_domain(&args.url, allowed_domain).map_err(|details| CliError::arg("URL", details))?;

    let headers = args
        .headers
        .iter()
        .map(|h| parse_header(h))
        .collect::<Result<Vec<_>, _>>()?;

    let request_method = args
        .request_method
        .parse::<Method>()
        .map_err(|e| CliError::flag("request", e))?;

    Ok(CurlInput {
        global: global.clone(),
        url: args.url.clone(),
        request_method,
        headers,
        data: args.data.clone(),
        include_response_headers: args.include,
        fail_on_http_error: args.fail,
        output_file: args.output.clone(),
    })
}

/// The URL host must end with the allowed domain; an empty domain allows any host
pub fn validate_url_domain(raw: &str, allowed_domain: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| format!("parse url: {}", e))?;
    let host = url.host_str().filter(|h| !h.is_empty()).ok_or("bad url")?;
    if !host.ends_with(allowed_domain) {
        return Err(format!(
            "only urls belonging to domain {} are allowed",
            allowed_domain
        ));
    }
    Ok(())
}

/// `Name: value`
fn parse_header(raw: &str) -> Result<(String, String), CliError> {
    raw.split_once(": ")
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| CliError::flag("header", format!("badly formatted header {:?}", raw)))
}

/// Bearer token first, user headers replace anything with the same name
pub fn build_request(model: &CurlInput, bearer_token: &str) -> ApiRequest {
    let mut req = ApiRequest::new(model.request_method, model.url.clone());
    req.headers
        .push(("Authorization".to_string(), format!("Bearer {}", bearer_token)));
    for (name, value) in &model.headers {
        req.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        req.headers.push((name.clone(), value.clone()));
    }
    req.body = model.data.clone();
    req
}

/// Response text as printed or written: optional header dump, then the body,
/// re-indented when it is JSON
pub fn render_response(model: &CurlInput, resp: &ApiResponse) -> Result<String, CliError> {
    let lowered = resp.body.to_lowercase();
    if lowered.contains("jwt is expired") {
        return Err(CliError::SessionExpired);
    }
    if lowered.contains("jwt is missing") {
        return Err(CliError::Auth);
    }

    let mut output = String::new();
    if model.include_response_headers {
        output.push_str(&format!("HTTP/1.1 {} {}\r\n", resp.status, resp.status_text));
        for (name, value) in &resp.headers {
            output.push_str(&format!("{}: {}\r\n", name, value));
        }
        output.push_str("\r\n");
    }

    let body = serde_json::from_str::<serde_json::Value>(&resp.body)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| resp.body.clone());
    output.push_str(&body);
    Ok(output)
}

fn write_output(p: &Printer, model: &CurlInput, output: &str) -> Result<(), CliError> {
    match &model.output_file {
        None => {
            p.outputln(output);
            Ok(())
        }
        Some(path) => write_private(Path::new(path), output)
            .map_err(|e| CliError::io("write output to file", e)),
    }
}

#[cfg(unix)]
fn write_private(path: &Path, content: &str) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(content.as_bytes())
}

#[cfg(not(unix))]
fn write_private(path: &Path, content: &str) -> std::io::Result<()> {
    std::fs::write(path, content)
}

pub fn run(args: CurlArgs, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_input(&args, &ctx.global, &ctx.config.allowed_url_domain())?.finish(p);

    let token = ctx.access_token()?;
    let req = build_request(&model, &token);
    ctx.cancel.check()?;
    let resp = ctx.transport.send(&req)?;
    ctx.cancel.check()?;

    let output = render_response(&model, &resp)?;
    write_output(p, &model, &output)?;

    if model.fail_on_http_error && resp.status >= 400 {
        return Err(CliError::HttpFailure {
            status: resp.status,
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::test_support::{test_context, RecordingTransport};
    use crate::core::errors::EXIT_HTTP_FAILURE;
    use clap::Parser;
    use serde_json::json;
    use tempfile::TempDir;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: CurlArgs,
    }

    fn parse(args: &[&str]) -> std::result::Result<CurlArgs, clap::Error> {
        Harness::try_parse_from(std::iter::once("curl").chain(args.iter().copied())).map(|h| h.args)
    }

    const ZONES_URL: &str = "https://dns.api.stackit.cloud/v1/projects/xxx/zones";

    #[test]
    fn test_method_defaults_to_get_and_is_uppercased() {
        let args = parse(&[ZONES_URL]).unwrap();
        assert_eq!(args.request_method, "GET");

        let args = parse(&[ZONES_URL, "-X", "post"]).unwrap();
        let model = parse_input(&args, &GlobalFlagModel::default(), "stackit.cloud").unwrap();
        assert_eq!(model.request_method, Method::Post);
    }

    #[test]
    fn test_unknown_method_rejected() {
        let err = parse(&[ZONES_URL, "-X", "FETCH"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_url_outside_allowed_domain() {
        let args = parse(&["https://example.com/api"]).unwrap();
        let err = parse_input(&args, &GlobalFlagModel::default(), "stackit.cloud").unwrap_err();
        assert!(matches!(err, CliError::ArgValidation { .. }));
        assert!(err.to_string().contains("only urls belonging to domain stackit.cloud"));

        assert!(parse_input(&args, &GlobalFlagModel::default(), "").is_ok());
    }

    #[test]
    fn test_url_without_host() {
        assert!(validate_url_domain("not a url", "stackit.cloud").is_err());
    }

    #[test]
    fn test_bad_header() {
        let args = parse(&[ZONES_URL, "-H", "Content-Type=application/json"]).unwrap();
        let err = parse_input(&args, &GlobalFlagModel::default(), "stackit.cloud").unwrap_err();
        assert!(err.to_string().contains("badly formatted header"));
    }

    #[test]
    fn test_user_authorization_overrides_token() {
        let args = parse(&[
            ZONES_URL,
            "-H",
            "Authorization: Bearer yyy",
            "-H",
            "Content-Type: application/json",
        ])
        .unwrap();
        let model = parse_input(&args, &GlobalFlagModel::default(), "stackit.cloud").unwrap();
        let req = build_request(&model, "cli-token");

        assert_eq!(req.header("authorization"), Some("Bearer yyy"));
        assert_eq!(req.header("Content-Type"), Some("application/json"));
        assert_eq!(
            req.headers
                .iter()
                .filter(|(k, _)| k.eq_ignore_ascii_case("authorization"))
                .count(),
            1
        );
    }

    #[test]
    fn test_data_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("payload.json");
        std::fs::write(&path, r#"{"name":"zone"}"#).unwrap();
        let data = format!("@{}", path.to_str().unwrap());

        let args = parse(&[ZONES_URL, "-X", "POST", "--data", data.as_str()]).unwrap();
        assert_eq!(args.data.as_deref(), Some(r#"{"name":"zone"}"#));
    }

    #[test]
    fn test_run_pretty_prints_json() {
        let transport = RecordingTransport::new();
        transport.respond(200, json!({"zones": []}));
        let (ctx, handles) = test_context(transport, "");

        run(parse(&[ZONES_URL]).unwrap(), &ctx).unwrap();

        let sent = handles.transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, Method::Get);
        assert_eq!(sent[0].header("Authorization"), Some("Bearer test-token"));
        assert_eq!(handles.out.contents(), "{\n  \"zones\": []\n}\n");
    }

    #[test]
    fn test_include_headers_written_to_file() {
        let transport = RecordingTransport::new();
        transport.respond_text(200, "plain");
        let (ctx, handles) = test_context(transport, "");
        let tmp = TempDir::new().unwrap();
        let out_path = tmp.path().join("output.txt");

        run(
            parse(&[ZONES_URL, "--include", "--output", out_path.to_str().unwrap()]).unwrap(),
            &ctx,
        )
        .unwrap();

        let written = std::fs::read_to_string(&out_path).unwrap();
        assert!(written.starts_with("HTTP/1.1 200"));
        assert!(written.contains("Content-Type: application/json\r\n"));
        assert!(written.ends_with("\r\n\r\nplain"));
        assert!(handles.out.contents().is_empty());
    }

    #[test]
    fn test_fail_exits_with_22() {
        let transport = RecordingTransport::new();
        transport.respond(403, json!({"message": "forbidden"}));
        let (ctx, handles) = test_context(transport, "");

        let err = run(parse(&[ZONES_URL, "--fail"]).unwrap(), &ctx).unwrap_err();
        let cli_err = err.downcast_ref::<CliError>().unwrap();
        assert_eq!(cli_err.exit_code(), EXIT_HTTP_FAILURE);
        assert!(handles.out.contents().contains("forbidden"));
    }

    #[test]
    fn test_error_status_without_fail_succeeds() {
        let transport = RecordingTransport::new();
        transport.respond(404, json!({"message": "not found"}));
        let (ctx, _) = test_context(transport, "");
        assert!(run(parse(&[ZONES_URL]).unwrap(), &ctx).is_ok());
    }

    #[test]
    fn test_expired_jwt_is_session_expired() {
        let transport = RecordingTransport::new();
        transport.respond(401, json!({"message": "Jwt is expired"}));
        let (ctx, _) = test_context(transport, "");

        let err = run(parse(&[ZONES_URL]).unwrap(), &ctx).unwrap_err();
        assert!(matches!(err.downcast_ref::<CliError>(), Some(CliError::SessionExpired)));
    }

    #[test]
    fn test_missing_jwt_is_auth_error() {
        let transport = RecordingTransport::new();
        transport.respond(401, json!({"message": "jwt is missing"}));
        let (ctx, _) = test_context(transport, "");

        let err = run(parse(&[ZONES_URL]).unwrap(), &ctx).unwrap_err();
        assert!(matches!(err.downcast_ref::<CliError>(), Some(CliError::Auth)));
    }
}
