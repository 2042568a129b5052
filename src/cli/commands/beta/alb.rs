//! `stackit beta alb` - application loadbalancers

use clap::Subcommand;
use miette::Result;
use serde::Serialize;

use crate::cli::context::CmdContext;
use crate::cli::examples::{self, Example};
use crate::cli::globalflags::GlobalFlagModel;
use crate::cli::input::{self, InputModel};
use crate::cli::output::output_result;
use crate::cli::printer::Printer;
use crate::cli::table::Table;
use crate::core::errors::CliError;
use crate::services::alb::{self, LoadBalancer};
use crate::services::Service;

#[derive(Subcommand, Debug)]
pub enum AlbCommands {
    /// Creates an application loadbalancer
    #[command(after_help = examples::build(&[Example::new(
        "Create an application loadbalancer from a configuration file",
        ["$ stackit beta alb create --configuration my-loadbalancer.json"],
    )]))]
    Create(ConfigurationArgs),

    /// Lists application loadbalancers
    #[command(after_help = examples::build(&[
        Example::new("List all load balancers", ["$ stackit beta alb list"]),
        Example::new("List the first 10 application loadbalancers", ["$ stackit beta alb list --limit=10"]),
    ]))]
    List(ListArgs),

    /// Describes an application loadbalancer
    #[command(after_help = examples::build(&[Example::new(
        "Get details about an application loadbalancer with name \"my-load-balancer\"",
        ["$ stackit beta alb describe my-load-balancer"],
    )]))]
    Describe(NameArg),

    /// Updates an application loadbalancer
    #[command(after_help = examples::build(&[Example::new(
        "Update an application loadbalancer from a configuration file",
        ["$ stackit beta alb update --configuration my-loadbalancer.json"],
    )]))]
    Update(ConfigurationArgs),

    /// Deletes an application loadbalancer
    #[command(after_help = examples::build(&[Example::new(
        "Delete an application loadbalancer with name \"my-load-balancer\"",
        ["$ stackit beta alb delete my-load-balancer"],
    )]))]
    Delete(NameArg),
}

#[derive(clap::Args, Debug)]
pub struct ConfigurationArgs {
    /// Filename of the input configuration file (.json, .yaml or .yml)
    #[arg(short = 'c', long, required = true)]
    pub configuration: String,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Maximum number of entries to list
    #[arg(long, allow_negative_numbers = true)]
    pub limit: Option<i64>,
}

#[derive(clap::Args, Debug)]
pub struct NameArg {
    /// Name of the loadbalancer
    #[arg(value_name = "LOADBALANCER_NAME")]
    pub name: String,
}

pub fn run(cmd: AlbCommands, ctx: &CmdContext) -> Result<()> {
    match cmd {
        AlbCommands::Create(args) => run_create(args, ctx),
        AlbCommands::List(args) => run_list(args, ctx),
        AlbCommands::Describe(args) => run_describe(args, ctx),
        AlbCommands::Update(args) => run_update(args, ctx),
        AlbCommands::Delete(args) => run_delete(args, ctx),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationInput {
    #[serde(flatten)]
    pub global: GlobalFlagModel,
    pub project_id: String,
    pub region: String,
    pub configuration: String,
}

impl InputModel for ConfigurationInput {}

pub fn parse_configuration_input(
    args: &ConfigurationArgs,
    global: &GlobalFlagModel,
) -> Result<ConfigurationInput, CliError> {
    Ok(ConfigurationInput {
        global: global.clone(),
        project_id: input::project_id(global)?,
        region: global.region_or_default().to_string(),
        configuration: args.configuration.clone(),
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListInput {
    #[serde(flatten)]
    pub global: GlobalFlagModel,
    pub project_id: String,
    pub region: String,
    pub limit: Option<i64>,
}

impl InputModel for ListInput {}

pub fn parse_list_input(args: &ListArgs, global: &GlobalFlagModel) -> Result<ListInput, CliError> {
    Ok(ListInput {
        global: global.clone(),
        project_id: input::project_id(global)?,
        region: global.region_or_default().to_string(),
        limit: input::positive_limit("limit", args.limit)?,
    })
}

/// Describe and delete address one loadbalancer by name
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NameInput {
    #[serde(flatten)]
    pub global: GlobalFlagModel,
    pub project_id: String,
    pub region: String,
    pub name: String,
}

impl InputModel for NameInput {}

pub fn parse_name_input(args: &NameArg, global: &GlobalFlagModel) -> Result<NameInput, CliError> {
    Ok(NameInput {
        global: global.clone(),
        project_id: input::project_id(global)?,
        region: global.region_or_default().to_string(),
        name: args.name.clone(),
    })
}

/// Load the payload and make sure it names its loadbalancer
pub fn read_payload(model: &ConfigurationInput) -> Result<(LoadBalancer, String), CliError> {
    let payload: LoadBalancer = input::config_file("configuration", &model.configuration)?;
    let name = payload
        .name
        .clone()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| CliError::flag("configuration", "no name found in configuration"))?;
    Ok((payload, name))
}

fn output_written(
    p: &Printer,
    global: &GlobalFlagModel,
    state: &str,
    project_label: &str,
    lb: &LoadBalancer,
) -> Result<()> {
    output_result(p, global.output_format, lb, |p| {
        p.outputln(&format!(
            "{} application loadbalancer for {:?}. Name: {}",
            state,
            project_label,
            lb.name.as_deref().unwrap_or_default()
        ));
        Ok(())
    })
}

fn run_create(args: ConfigurationArgs, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_configuration_input(&args, &ctx.global)?.finish(p);
    let (payload, name) = read_payload(&model)?;
    let client = ctx.api_client(Service::Alb)?;
    let project_label = ctx.project_label(&model.project_id);

    ctx.confirm(&format!(
        "Are you sure you want to create an application loadbalancer for project {:?}?",
        project_label
    ))?;
    let mut created = alb::create_load_balancer(&client, &model.project_id, &model.region, &payload)?;

    if !ctx.global.is_async {
        let _spinner = p.spinner("Creating loadbalancer");
        let lb_name = created.name.clone().unwrap_or(name);
        created = alb::wait_until_ready(&ctx.waiter(), &client, &model.project_id, &model.region, &lb_name)?;
    }
    output_written(
        p,
        &ctx.global,
        ctx.operation_state("Created", "Triggered creation of"),
        &project_label,
        &created,
    )
}

fn run_update(args: ConfigurationArgs, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_configuration_input(&args, &ctx.global)?.finish(p);
    let (mut payload, name) = read_payload(&model)?;
    let client = ctx.api_client(Service::Alb)?;
    let project_label = ctx.project_label(&model.project_id);

    ctx.confirm(&format!(
        "Are you sure you want to update an application loadbalancer for project {:?}?",
        project_label
    ))?;

    // the API rejects updates that do not carry the current version
    let current = alb::get_load_balancer(&client, &model.project_id, &model.region, &name)?;
    payload.version = current.version;

    let mut updated = alb::update_load_balancer(&client, &model.project_id, &model.region, &name, &payload)?;
    if !ctx.global.is_async {
        let _spinner = p.spinner("updating loadbalancer");
        updated = alb::wait_until_ready(&ctx.waiter(), &client, &model.project_id, &model.region, &name)?;
    }
    output_written(
        p,
        &ctx.global,
        ctx.operation_state("Updated", "Triggered update of"),
        &project_label,
        &updated,
    )
}

fn run_list(args: ListArgs, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_list_input(&args, &ctx.global)?.finish(p);
    let (project_id, region, limit) = (&model.project_id, model.region.as_str(), model.limit);
    let client = ctx.api_client(Service::Alb)?;

    let mut load_balancers = Vec::new();
    let mut page_id: Option<String> = None;
    loop {
        let page = alb::list_load_balancers(&client, project_id, region, page_id.as_deref())?;
        load_balancers.extend(page.load_balancers);
        if limit.is_some_and(|l| load_balancers.len() as i64 >= l) {
            break;
        }
        match page.next_page_id.filter(|id| !id.is_empty()) {
            Some(next) => page_id = Some(next),
            None => break,
        }
    }
    if let Some(limit) = limit {
        load_balancers.truncate(limit as usize);
    }

    if load_balancers.is_empty() {
        p.info(&format!(
            "No load balancers found for project {:?}",
            ctx.project_label(project_id)
        ));
        return Ok(());
    }
    output_load_balancers(p, &ctx.global, &load_balancers)
}

pub fn output_load_balancers(p: &Printer, global: &GlobalFlagModel, items: &[LoadBalancer]) -> Result<()> {
    output_result(p, global.output_format, items, |p| {
        let mut table = Table::new();
        table.set_header(["NAME", "EXTERNAL ADDRESS", "LISTENERS", "TARGET POOLS", "STATUS"]);
        for lb in items {
            table.add_row([
                lb.name.clone().unwrap_or_default(),
                lb.external_address.clone().unwrap_or_else(|| "-".to_string()),
                lb.listeners.len().to_string(),
                lb.target_pools.len().to_string(),
                lb.status.clone().unwrap_or_default(),
            ]);
        }
        table.display(p);
        Ok(())
    })
}

fn run_describe(args: NameArg, ctx: &CmdContext) -> Result<()> {
    let model = parse_name_input(&args, &ctx.global)?.finish(&ctx.printer);
    let client = ctx.api_client(Service::Alb)?;
    let lb = alb::get_load_balancer(&client, &model.project_id, &model.region, &model.name)?;
    output_result(&ctx.printer, ctx.global.output_format, &lb, |p| {
        for table in describe_tables(&lb) {
            table.display(p);
        }
        Ok(())
    })
}

/// Overview table, then listeners and target pools when present
pub fn describe_tables(lb: &LoadBalancer) -> Vec<Table> {
    let options = lb.options.as_ref();
    let acl = options
        .and_then(|o| o.access_control.as_ref())
        .map(|a| a.allowed_source_ranges.join(", "))
        .unwrap_or_default();
    let private_only = options.and_then(|o| o.private_network_only).unwrap_or(false);
    let network_id = lb
        .networks
        .first()
        .and_then(|n| n.network_id.clone())
        .unwrap_or_else(|| "-".to_string());
    let errors: Vec<&str> = lb.errors.iter().filter_map(|e| e.description.as_deref()).collect();

    let mut overview = Table::new();
    overview.set_title("Load Balancer");
    overview.add_row(["NAME".to_string(), lb.name.clone().unwrap_or_default()]);
    overview.add_separator();
    overview.add_row(["STATE".to_string(), lb.status.clone().unwrap_or_default()]);
    overview.add_separator();
    if !errors.is_empty() {
        overview.add_row(["ERROR DESCRIPTIONS".to_string(), errors.join("\n")]);
        overview.add_separator();
    }
    overview.add_row(["PRIVATE ACCESS ONLY".to_string(), private_only.to_string()]);
    overview.add_separator();
    overview.add_row([
        "ATTACHED PUBLIC IP".to_string(),
        lb.external_address.clone().unwrap_or_else(|| "-".to_string()),
    ]);
    overview.add_separator();
    overview.add_row(["ATTACHED NETWORK ID".to_string(), network_id]);
    overview.add_separator();
    overview.add_row(["ACL".to_string(), acl]);

    let mut tables = vec![overview];
    if !lb.listeners.is_empty() {
        let mut listeners = Table::new();
        listeners.set_title("Listeners");
        listeners.set_header(["NAME", "PORT", "PROTOCOL"]);
        for l in &lb.listeners {
            listeners.add_row([
                l.name.clone().unwrap_or_default(),
                l.port.map(|n| n.to_string()).unwrap_or_default(),
                l.protocol.clone().unwrap_or_default(),
            ]);
        }
        tables.push(listeners);
    }
    if !lb.target_pools.is_empty() {
        let mut pools = Table::new();
        pools.set_title("Target Pools");
        pools.set_header(["NAME", "PORT", "TARGETS"]);
        for pool in &lb.target_pools {
            pools.add_row([
                pool.name.clone().unwrap_or_default(),
                pool.target_port.map(|n| n.to_string()).unwrap_or_default(),
                pool.targets.len().to_string(),
            ]);
        }
        tables.push(pools);
    }
    tables
}

fn run_delete(args: NameArg, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_name_input(&args, &ctx.global)?.finish(p);
    let client = ctx.api_client(Service::Alb)?;

    ctx.confirm(&format!(
        "Are you sure you want to delete the application loadbalancer {:?}?",
        model.name
    ))?;
    alb::delete_load_balancer(&client, &model.project_id, &model.region, &model.name)?;

    if !ctx.global.is_async {
        let _spinner = p.spinner("Deleting loadbalancer");
        alb::wait_until_deleted(&ctx.waiter(), &client, &model.project_id, &model.region, &model.name)?;
    }
    p.info(&format!(
        "{} application loadbalancer {:?}",
        ctx.operation_state("Deleted", "Triggered deletion of"),
        model.name
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::test_support::{debug_context, test_context, RecordingTransport};
    use crate::services::Method;
    use serde_json::json;
    use std::io::Write;

    fn config_file(ext: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(ext).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_delete_declined_sends_nothing() {
        let (ctx, handles) = test_context(RecordingTransport::new(), "no\n");
        let err = run_delete(NameArg { name: "my-lb".into() }, &ctx).unwrap_err();

        let cli_err = err.downcast_ref::<CliError>().unwrap();
        assert!(matches!(cli_err, CliError::PromptDeclined));
        assert_eq!(cli_err.exit_code(), 0);
        assert!(cli_err.to_string().contains("no action taken"));
        assert!(handles.transport.requests().is_empty());
    }

    #[test]
    fn test_delete_after_interrupt_sends_nothing() {
        let (ctx, handles) = test_context(RecordingTransport::new(), "y\n");
        ctx.cancel.cancel();
        let err = run_delete(NameArg { name: "my-lb".into() }, &ctx).unwrap_err();

        let cli_err = err.downcast_ref::<CliError>().unwrap();
        assert!(matches!(cli_err, CliError::Cancelled));
        assert_eq!(cli_err.exit_code(), 130);
        assert!(handles.transport.requests().is_empty());
    }

    #[test]
    fn test_describe_dumps_input_at_debug() {
        let transport = RecordingTransport::new();
        transport.respond(200, json!({"name": "my-lb", "status": "STATUS_READY"}));
        let (ctx, handles) = debug_context(transport, "");

        run_describe(NameArg { name: "my-lb".into() }, &ctx).unwrap();

        let err = handles.err.contents();
        assert!(err.contains("parsed input values"));
        assert!(err.contains(r#""name":"my-lb""#));
        assert!(err.contains(r#""region":"eu01""#));
    }

    #[test]
    fn test_delete_confirmed_waits_for_removal() {
        let transport = RecordingTransport::new();
        transport.respond_text(204, "");
        transport.respond(404, json!({"message": "not found"}));
        let (ctx, handles) = test_context(transport, "y\n");

        run_delete(NameArg { name: "my-lb".into() }, &ctx).unwrap();

        let sent = handles.transport.requests();
        assert_eq!(sent[0].method, Method::Delete);
        assert!(sent[0].url.ends_with("/regions/eu01/load-balancers/my-lb"));
        assert!(handles.err.contents().contains("Deleted application loadbalancer \"my-lb\""));
    }

    #[test]
    fn test_update_sends_current_version() {
        let file = config_file(".yaml", "name: my-lb\nplanId: p10\nlisteners:\n  - name: http\n    port: 80\n");
        let transport = RecordingTransport::new();
        transport.respond(200, json!({"name": "my-lb", "version": "7"}));
        transport.respond(200, json!({"name": "my-lb", "version": "8", "status": "STATUS_PENDING"}));
        let (mut ctx, handles) = test_context(transport, "");
        ctx.global.assume_yes = true;
        ctx.global.is_async = true;

        run_update(
            ConfigurationArgs {
                configuration: file.path().display().to_string(),
            },
            &ctx,
        )
        .unwrap();

        let sent = handles.transport.requests();
        assert_eq!(sent[0].method, Method::Get);
        assert_eq!(sent[1].method, Method::Put);
        let body = sent[1].json_body().unwrap();
        assert_eq!(body["version"], "7");
        assert_eq!(body["planId"], "p10");
        assert_eq!(body["listeners"][0]["port"], 80);
        assert!(handles.out.contents().contains("Triggered update of application loadbalancer"));
    }

    #[test]
    fn test_configuration_without_name_rejected() {
        let file = config_file(".json", r#"{"planId": "p10"}"#);
        let model = parse_configuration_input(
            &ConfigurationArgs {
                configuration: file.path().display().to_string(),
            },
            &test_context(RecordingTransport::new(), "").0.global,
        )
        .unwrap();
        assert!(matches!(read_payload(&model), Err(CliError::FlagValidation { .. })));
    }

    #[test]
    fn test_unknown_configuration_extension() {
        let file = config_file(".toml", "name = 'x'");
        let model = parse_configuration_input(
            &ConfigurationArgs {
                configuration: file.path().display().to_string(),
            },
            &test_context(RecordingTransport::new(), "").0.global,
        )
        .unwrap();
        assert!(matches!(read_payload(&model), Err(CliError::FlagValidation { .. })));
    }

    #[test]
    fn test_describe_tables() {
        let lb: LoadBalancer = serde_json::from_value(json!({
            "name": "my-lb",
            "status": "STATUS_READY",
            "networks": [{"networkId": "net-1", "role": "ROLE_LISTENERS_AND_TARGETS"}],
            "listeners": [{"name": "http", "port": 80, "protocol": "PROTOCOL_HTTP"}],
            "targetPools": [{"name": "pool", "targetPort": 8080, "targets": [{"ip": "10.0.0.1"}, {"ip": "10.0.0.2"}]}],
            "options": {"accessControl": {"allowedSourceRanges": ["10.0.0.0/8"]}},
        }))
        .unwrap();
        let tables = describe_tables(&lb);
        assert_eq!(tables.len(), 3);
        let overview = tables[0].render();
        assert!(overview.contains("Load Balancer"));
        assert!(overview.contains("net-1"));
        assert!(overview.contains("10.0.0.0/8"));
        assert!(tables[2].render().contains("8080"));
    }

    #[test]
    fn test_list_follows_pages_until_limit() {
        let transport = RecordingTransport::new();
        transport.respond(200, json!({"loadBalancers": [{"name": "a"}], "nextPageId": "2"}));
        transport.respond(200, json!({"loadBalancers": [{"name": "b"}, {"name": "c"}], "nextPageId": "3"}));
        let (ctx, handles) = test_context(transport, "");

        run_list(ListArgs { limit: Some(2) }, &ctx).unwrap();

        let sent = handles.transport.requests();
        assert_eq!(sent.len(), 2);
        assert!(sent[1].query.contains(&("pageId".to_string(), "2".to_string())));
        let out = handles.out.contents();
        assert!(out.contains(" b "));
        assert!(!out.contains(" c "));
    }
}
