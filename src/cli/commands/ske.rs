//! `stackit ske` command - Kubernetes Engine clusters

use clap::Subcommand;
use miette::Result;
use serde::Serialize;

use crate::cli::context::CmdContext;
use crate::cli::examples::{self, Example};
use crate::cli::flags;
use crate::cli::globalflags::GlobalFlagModel;
use crate::cli::input::{self, InputModel};
use crate::cli::output::{output_result, to_json};
use crate::cli::printer::Printer;
use crate::cli::table::Table;
use crate::core::errors::CliError;
use crate::services::ske::{self, Cluster, ClusterPayload};
use crate::services::Service;

#[derive(Subcommand, Debug)]
pub enum SkeCommands {
    /// Provides functionality for SKE cluster
    #[command(subcommand)]
    Cluster(ClusterCommands),
}

#[derive(Subcommand, Debug)]
pub enum ClusterCommands {
    /// Creates an SKE cluster
    #[command(
        long_about = "Creates a STACKIT Kubernetes Engine (SKE) cluster.\n\
            The payload can be provided as a JSON string or a file path prefixed with \"@\".\n\
            See `stackit ske cluster generate-payload` for a starting point.",
        after_help = create_examples()
    )]
    Create(WriteArgs),

    /// Lists all SKE clusters
    #[command(after_help = examples::build(&[
        Example::new("List all SKE clusters", ["$ stackit ske cluster list"]),
        Example::new("List up to 10 SKE clusters", ["$ stackit ske cluster list --limit 10"]),
    ]))]
    List(ListArgs),

    /// Shows details of a SKE cluster
    #[command(after_help = examples::build(&[Example::new(
        "Get details of an SKE cluster with name \"my-cluster\"",
        ["$ stackit ske cluster describe my-cluster"],
    )]))]
    Describe(NameArg),

    /// Updates an SKE cluster
    #[command(after_help = examples::build(&[Example::new(
        "Generate a payload with the current values of a cluster, and adapt it with custom values for the different configuration options",
        [
            "$ stackit ske cluster generate-payload --cluster-name my-cluster > ./payload.json",
            "<Modify payload in file>",
            "$ stackit ske cluster update my-cluster --payload @./payload.json",
        ],
    )]))]
    Update(WriteArgs),

    /// Deletes a SKE cluster
    #[command(after_help = examples::build(&[Example::new(
        "Delete an SKE cluster with name \"my-cluster\"",
        ["$ stackit ske cluster delete my-cluster"],
    )]))]
    Delete(NameArg),

    /// Generates a payload to create/update SKE clusters
    #[command(after_help = examples::build(&[
        Example::new(
            "Generate a payload with default values, and adapt it with custom values for the different configuration options",
            [
                "$ stackit ske cluster generate-payload --file-path ./payload.json",
                "<Modify payload in file, if needed>",
                "$ stackit ske cluster create my-cluster --payload @./payload.json",
            ],
        ),
        Example::new(
            "Generate a payload with values of a cluster, and preview it in the terminal",
            ["$ stackit ske cluster generate-payload --cluster-name my-cluster"],
        ),
    ]))]
    GeneratePayload(GeneratePayloadArgs),
}

fn create_examples() -> String {
    examples::build(&[
        Example::new(
            "Create an SKE cluster using default configuration",
            ["$ stackit ske cluster create my-cluster"],
        ),
        Example::new(
            "Create an SKE cluster using an API payload sourced from the file \"./payload.json\"",
            ["$ stackit ske cluster create my-cluster --payload @./payload.json"],
        ),
    ])
}

#[derive(clap::Args, Debug)]
pub struct NameArg {
    /// Name of the cluster
    #[arg(value_name = "CLUSTER_NAME")]
    pub cluster_name: String,
}

#[derive(clap::Args, Debug)]
pub struct WriteArgs {
    /// Name of the cluster
    #[arg(value_name = "CLUSTER_NAME")]
    pub cluster_name: String,

    /// Request payload (JSON). Can be a string or a file path, if prefixed with "@". Example: @./payload.json
    #[arg(long, value_parser = flags::read_from_file)]
    pub payload: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Maximum number of entries to list
    #[arg(long, allow_negative_numbers = true)]
    pub limit: Option<i64>,
}

#[derive(clap::Args, Debug)]
pub struct GeneratePayloadArgs {
    /// If set, generates the payload with the current state of the given cluster. If unset, generates the payload with default values
    #[arg(short = 'n', long)]
    pub cluster_name: Option<String>,

    /// If set, writes the payload to the given file. If unset, writes the payload to the standard output
    #[arg(short = 'f', long)]
    pub file_path: Option<String>,
}

pub fn run(cmd: SkeCommands, ctx: &CmdContext) -> Result<()> {
    match cmd {
        SkeCommands::Cluster(cmd) => match cmd {
            ClusterCommands::Create(args) => run_create(args, ctx),
            ClusterCommands::List(args) => run_list(args, ctx),
            ClusterCommands::Describe(args) => run_describe(args, ctx),
            ClusterCommands::Update(args) => run_update(args, ctx),
            ClusterCommands::Delete(args) => run_delete(args, ctx),
            ClusterCommands::GeneratePayload(args) => run_generate_payload(args, ctx),
        },
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteInput {
    #[serde(flatten)]
    pub global: GlobalFlagModel,
    pub project_id: String,
    pub cluster_name: String,
    pub payload: Option<ClusterPayload>,
}

impl InputModel for WriteInput {}

pub fn parse_write_input(args: &WriteArgs, global: &GlobalFlagModel) -> Result<WriteInput, CliError> {
    let project_id = input::project_id(global)?;
    let payload = args
        .payload
        .as_deref()
        .map(|raw| input::json_payload::<ClusterPayload>("payload", raw))
        .transpose()?;
    Ok(WriteInput {
        global: global.clone(),
        project_id,
        cluster_name: args.cluster_name.clone(),
        payload,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListInput {
    #[serde(flatten)]
    pub global: GlobalFlagModel,
    pub project_id: String,
    pub limit: Option<i64>,
}

impl InputModel for ListInput {}

pub fn parse_list_input(args: &ListArgs, global: &GlobalFlagModel) -> Result<ListInput, CliError> {
    Ok(ListInput {
        global: global.clone(),
        project_id: input::project_id(global)?,
        limit: input::positive_limit("limit", args.limit)?,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInput {
    #[serde(flatten)]
    pub global: GlobalFlagModel,
    pub project_id: String,
    pub cluster_name: String,
}

impl InputModel for ClusterInput {}

pub fn parse_cluster_input(args: &NameArg, global: &GlobalFlagModel) -> Result<ClusterInput, CliError> {
    Ok(ClusterInput {
        global: global.clone(),
        project_id: input::project_id(global)?,
        cluster_name: args.cluster_name.clone(),
    })
}

fn run_create(args: WriteArgs, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_write_input(&args, &ctx.global)?.finish(p);
    let client = ctx.api_client(Service::Ske)?;
    let project_label = ctx.project_label(&model.project_id);

    ctx.confirm(&format!(
        "Are you sure you want to create a cluster for project {:?}?",
        project_label
    ))?;

    if ske::cluster_exists(&client, &model.project_id, &model.cluster_name)? {
        return Err(CliError::Conflict(format!(
            "cluster with name {} already exists",
            model.cluster_name
        ))
        .into());
    }

    let payload = match model.payload {
        Some(payload) => payload,
        None => ske::default_payload(&ske::provider_options(&client)?)?,
    };
    let created = ske::create_or_update_cluster(&client, &model.project_id, &model.cluster_name, &payload)?;

    if !ctx.global.is_async {
        let _spinner = p.spinner("Creating cluster");
        ske::wait_until_healthy(&ctx.waiter(), &client, &model.project_id, &created.name)?;
    }

    output_result(p, ctx.global.output_format, &created, |p| {
        p.outputln(&format!(
            "{} cluster for project {:?}. Cluster name: {}",
            ctx.operation_state("Created", "Triggered creation of"),
            project_label,
            created.name
        ));
        Ok(())
    })
}

fn run_update(args: WriteArgs, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_write_input(&args, &ctx.global)?.finish(p);
    let payload = model
        .payload
        .clone()
        .ok_or_else(|| CliError::flag("payload", "a payload is required to update a cluster"))?;
    let client = ctx.api_client(Service::Ske)?;

    ctx.confirm(&format!(
        "Are you sure you want to update cluster {:?}?",
        model.cluster_name
    ))?;

    if !ske::cluster_exists(&client, &model.project_id, &model.cluster_name)? {
        return Err(CliError::Conflict(format!(
            "cluster with name {} does not exist",
            model.cluster_name
        ))
        .into());
    }

    let updated = ske::create_or_update_cluster(&client, &model.project_id, &model.cluster_name, &payload)?;
    if !ctx.global.is_async {
        let _spinner = p.spinner("Updating cluster");
        ske::wait_until_healthy(&ctx.waiter(), &client, &model.project_id, &updated.name)?;
    }

    output_result(p, ctx.global.output_format, &updated, |p| {
        p.info(&format!(
            "{} cluster {:?}",
            ctx.operation_state("Updated", "Triggered update of"),
            model.cluster_name
        ));
        Ok(())
    })
}

fn run_list(args: ListArgs, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_list_input(&args, &ctx.global)?.finish(p);
    let client = ctx.api_client(Service::Ske)?;

    let mut clusters = ske::list_clusters(&client, &model.project_id)?.items;
    if clusters.is_empty() {
        p.info(&format!(
            "No clusters found for project {:?}",
            ctx.project_label(&model.project_id)
        ));
        return Ok(());
    }
    if let Some(limit) = model.limit {
        clusters.truncate(limit as usize);
    }
    output_clusters(p, &ctx.global, &clusters)
}

fn monitoring_enabled(cluster: &Cluster) -> bool {
    cluster
        .extensions
        .as_ref()
        .and_then(|e| e.extra.get("argus").or_else(|| e.extra.get("observability")))
        .and_then(|m| m.get("enabled"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

fn kubernetes_version(cluster: &Cluster) -> String {
    cluster
        .kubernetes
        .as_ref()
        .and_then(|k| k.version.clone())
        .unwrap_or_default()
}

pub fn output_clusters(p: &Printer, global: &GlobalFlagModel, clusters: &[Cluster]) -> Result<()> {
    output_result(p, global.output_format, clusters, |p| {
        let mut table = Table::new();
        table.set_header(["NAME", "STATE", "VERSION", "POOLS", "MONITORING"]);
        for c in clusters {
            table.add_row([
                c.name.clone(),
                c.aggregated_state().to_string(),
                kubernetes_version(c),
                c.nodepools.len().to_string(),
                if monitoring_enabled(c) { "Enabled" } else { "Disabled" }.to_string(),
            ]);
        }
        table.display(p);
        Ok(())
    })
}

fn run_describe(args: NameArg, ctx: &CmdContext) -> Result<()> {
    let model = parse_cluster_input(&args, &ctx.global)?.finish(&ctx.printer);
    let client = ctx.api_client(Service::Ske)?;
    let cluster = ske::get_cluster(&client, &model.project_id, &model.cluster_name)?;

    output_result(&ctx.printer, ctx.global.output_format, &cluster, |p| {
        let acl = cluster
            .extensions
            .as_ref()
            .and_then(|e| e.acl.as_ref())
            .filter(|acl| acl.enabled)
            .map(|acl| acl.allowed_cidrs.join(", "))
            .unwrap_or_default();
        let mut table = Table::new();
        table.add_row(["NAME".to_string(), cluster.name.clone()]);
        table.add_separator();
        table.add_row(["STATE".to_string(), cluster.aggregated_state().to_string()]);
        table.add_separator();
        table.add_row(["VERSION".to_string(), kubernetes_version(&cluster)]);
        table.add_separator();
        table.add_row(["POOLS".to_string(), cluster.nodepools.len().to_string()]);
        table.add_separator();
        table.add_row(["ACL".to_string(), acl]);
        table.display(p);
        Ok(())
    })
}

fn run_delete(args: NameArg, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_cluster_input(&args, &ctx.global)?.finish(p);
    let client = ctx.api_client(Service::Ske)?;

    ctx.confirm(&format!(
        "Are you sure you want to delete cluster {:?}? (This cannot be undone)",
        model.cluster_name
    ))?;
    ske::delete_cluster(&client, &model.project_id, &model.cluster_name)?;

    if !ctx.global.is_async {
        let _spinner = p.spinner("Deleting cluster");
        ske::wait_until_deleted(&ctx.waiter(), &client, &model.project_id, &model.cluster_name)?;
    }
    p.info(&format!(
        "{} cluster {:?}",
        ctx.operation_state("Deleted", "Triggered deletion of"),
        model.cluster_name
    ));
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePayloadInput {
    #[serde(flatten)]
    pub global: GlobalFlagModel,
    pub cluster_name: Option<String>,
    pub file_path: Option<String>,
}

impl InputModel for GeneratePayloadInput {}

/// A project id is only needed when reading an existing cluster
pub fn parse_generate_payload_input(
    args: &GeneratePayloadArgs,
    global: &GlobalFlagModel,
) -> Result<GeneratePayloadInput, CliError> {
    if args.cluster_name.is_some() {
        input::project_id(global)?;
    }
    Ok(GeneratePayloadInput {
        global: global.clone(),
        cluster_name: args.cluster_name.clone(),
        file_path: args.file_path.clone(),
    })
}

fn run_generate_payload(args: GeneratePayloadArgs, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_generate_payload_input(&args, &ctx.global)?.finish(p);
    let client = ctx.api_client(Service::Ske)?;

    let payload = match &model.cluster_name {
        Some(name) => {
            let project_id = input::project_id(&model.global)?;
            ske::get_cluster(&client, &project_id, name)?.to_payload()
        }
        None => ske::default_payload(&ske::provider_options(&client)?)?,
    };
    write_payload(p, model.file_path.as_deref(), &payload)
}

fn write_payload(p: &Printer, file_path: Option<&str>, payload: &ClusterPayload) -> Result<()> {
    let rendered = to_json(payload)?;
    match file_path {
        Some(path) => {
            std::fs::write(path, &rendered)
                .map_err(|e| CliError::io(format!("write payload to the file {:?}", path), e))?;
            p.debug(&format!("payload written to {}", path));
        }
        None => p.output(&rendered),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::test_support::{debug_context, test_context, RecordingTransport, TEST_PROJECT_ID};
    use crate::services::Method;
    use clap::Parser;
    use serde_json::json;
    use tempfile::tempdir;

    #[derive(Parser, Debug)]
    struct Harness {
        #[command(subcommand)]
        cmd: SkeCommands,
    }

    fn parse(args: &[&str]) -> ClusterCommands {
        let argv = ["ske", "cluster"].into_iter().chain(args.iter().copied());
        match Harness::try_parse_from(argv).unwrap().cmd {
            SkeCommands::Cluster(cmd) => cmd,
        }
    }

    fn global() -> GlobalFlagModel {
        GlobalFlagModel {
            project_id: Some(TEST_PROJECT_ID.into()),
            ..Default::default()
        }
    }

    fn provider_options() -> serde_json::Value {
        json!({
            "kubernetesVersions": [
                {"version": "1.29.4", "state": "supported"},
                {"version": "1.30.1", "state": "supported"},
                {"version": "1.31.0", "state": "preview"},
            ],
            "machineImages": [{
                "name": "flatcar",
                "versions": [
                    {"version": "3815.2.1", "state": "supported", "cri": [{"name": "containerd"}]},
                ],
            }],
        })
    }

    #[test]
    fn test_payload_read_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("payload.json");
        std::fs::write(&path, r#"{"foo":1}"#).unwrap();
        let flag = format!("@{}", path.display());

        let ClusterCommands::Update(args) = parse(&["update", "my-cluster", "--payload", flag.as_str()]) else {
            panic!("expected update");
        };
        assert_eq!(args.payload.as_deref(), Some(r#"{"foo":1}"#));

        let model = parse_write_input(&args, &global()).unwrap();
        let payload = model.payload.unwrap();
        assert_eq!(payload.extra.get("foo"), Some(&json!(1)));
    }

    #[test]
    fn test_payload_from_missing_file_rejected() {
        let argv = ["ske", "cluster", "update", "c", "--payload", "@/does/not/exist.json"];
        let err = Harness::try_parse_from(argv).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_invalid_payload_is_flag_error() {
        let ClusterCommands::Update(args) = parse(&["update", "c", "--payload", "{not json"]) else {
            panic!("expected update");
        };
        let err = parse_write_input(&args, &global()).unwrap_err();
        assert!(matches!(err, CliError::FlagValidation { .. }));
        assert!(err.to_string().contains("encode payload"));
    }

    #[test]
    fn test_create_without_payload_uses_defaults() {
        let transport = RecordingTransport::new();
        transport.respond(200, json!({"items": []}));
        transport.respond(200, provider_options());
        transport.respond(200, json!({"name": "my-cluster", "status": {"aggregated": "STATE_CREATING"}}));
        let (mut ctx, handles) = test_context(transport, "");
        ctx.global.assume_yes = true;
        ctx.global.is_async = true;

        let ClusterCommands::Create(args) = parse(&["create", "my-cluster"]) else {
            panic!("expected create");
        };
        run_create(args, &ctx).unwrap();

        let sent = handles.transport.requests();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[2].method, Method::Put);
        let body = sent[2].json_body().unwrap();
        assert_eq!(body["kubernetes"]["version"], "1.30.1");
        assert_eq!(body["nodepools"][0]["machine"]["image"]["version"], "3815.2.1");
        assert!(handles
            .out
            .contents()
            .contains("Triggered creation of cluster for project"));
    }

    #[test]
    fn test_create_existing_cluster_is_conflict() {
        let transport = RecordingTransport::new();
        transport.respond(200, json!({"items": [{"name": "my-cluster"}]}));
        let (mut ctx, handles) = test_context(transport, "");
        ctx.global.assume_yes = true;

        let ClusterCommands::Create(args) = parse(&["create", "my-cluster"]) else {
            panic!("expected create");
        };
        let err = run_create(args, &ctx).unwrap_err();
        assert!(matches!(err.downcast_ref::<CliError>(), Some(CliError::Conflict(_))));
        assert_eq!(handles.transport.requests().len(), 1);
    }

    #[test]
    fn test_generate_payload_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.json");
        let transport = RecordingTransport::new();
        transport.respond(200, provider_options());
        let (ctx, handles) = test_context(transport, "");

        let ClusterCommands::GeneratePayload(args) =
            parse(&["generate-payload", "-f", path.to_str().unwrap()])
        else {
            panic!("expected generate-payload");
        };
        run_generate_payload(args, &ctx).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("{\n  \""));
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value["extensions"]["acl"]["enabled"], false);
        assert_eq!(value["nodepools"][0]["availabilityZones"][0], "eu01-3");
        assert!(handles.out.contents().is_empty());
    }

    #[test]
    fn test_generate_payload_from_cluster_needs_project() {
        let ClusterCommands::GeneratePayload(args) = parse(&["generate-payload", "-n", "my-cluster"]) else {
            panic!("expected generate-payload");
        };
        assert!(matches!(
            parse_generate_payload_input(&args, &GlobalFlagModel::default()),
            Err(CliError::ProjectIdMissing)
        ));
        assert!(parse_generate_payload_input(&args, &global()).is_ok());
    }

    #[test]
    fn test_cluster_table() {
        let (ctx, handles) = test_context(RecordingTransport::new(), "");
        let clusters: Vec<Cluster> = serde_json::from_value(json!([{
            "name": "my-cluster",
            "kubernetes": {"version": "1.30.1"},
            "nodepools": [{"name": "a"}, {"name": "b"}],
            "extensions": {"argus": {"enabled": true}},
            "status": {"aggregated": "STATE_HEALTHY"},
        }]))
        .unwrap();
        output_clusters(&ctx.printer, &ctx.global, &clusters).unwrap();
        let out = handles.out.contents();
        assert!(out.contains("STATE_HEALTHY"));
        assert!(out.contains("Enabled"));
    }

    #[test]
    fn test_list_dumps_input_at_debug() {
        let transport = RecordingTransport::new();
        transport.respond(200, json!({"items": [{"name": "a"}, {"name": "b"}]}));
        let (ctx, handles) = debug_context(transport, "");
        let ClusterCommands::List(args) = parse(&["list", "--limit", "1"]) else {
            panic!("expected list");
        };

        run_list(args, &ctx).unwrap();

        let err = handles.err.contents();
        assert!(err.contains("parsed input values"));
        assert!(err.contains(r#""limit":1"#));
        assert!(handles.out.contents().contains(" a "));
        assert!(!handles.out.contents().contains(" b "));
    }

    #[test]
    fn test_list_rejects_zero_limit() {
        let ClusterCommands::List(args) = parse(&["list", "--limit", "0"]) else {
            panic!("expected list");
        };
        assert!(matches!(
            parse_list_input(&args, &global()),
            Err(CliError::FlagValidation { .. })
        ));
    }
}
