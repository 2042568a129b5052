//! `stackit dns zone` - create, list, describe, update and delete zones

use clap::Subcommand;
use miette::Result;
use serde::Serialize;

use super::{fetch_pages, ListFilterArgs, ListFilterInput};
use crate::cli::context::CmdContext;
use crate::cli::examples::{self, Example};
use crate::cli::flags;
use crate::cli::globalflags::GlobalFlagModel;
use crate::cli::input::{self, InputModel};
use crate::cli::output::output_result;
use crate::cli::printer::Printer;
use crate::cli::table::Table;
use crate::core::errors::CliError;
use crate::services::dns::{
    self, CreateZonePayload, ListFilter, PartialUpdateZonePayload, Zone, ZoneResponse,
};
use crate::services::Service;

const DEFAULT_TTL: i64 = 1000;

#[derive(Subcommand, Debug)]
pub enum ZoneCommands {
    /// Creates a DNS zone
    #[command(after_help = create_examples())]
    Create(CreateArgs),

    /// Lists DNS zones
    #[command(after_help = list_examples())]
    List(ListArgs),

    /// Shows details of a DNS zone
    #[command(after_help = examples::build(&[Example::new(
        "Get details of a DNS zone with ID \"xxx\"",
        ["$ stackit dns zone describe xxx"],
    )]))]
    Describe(ZoneIdArg),

    /// Updates a DNS zone
    #[command(after_help = examples::build(&[Example::new(
        "Update the contact email of the DNS zone with ID \"xxx\"",
        ["$ stackit dns zone update xxx --contact-email someone@domain.com"],
    )]))]
    Update(UpdateArgs),

    /// Deletes a DNS zone
    #[command(after_help = examples::build(&[Example::new(
        "Delete a DNS zone with ID \"xxx\"",
        ["$ stackit dns zone delete xxx"],
    )]))]
    Delete(ZoneIdArg),
}

fn create_examples() -> String {
    examples::build(&[
        Example::new(
            "Create a DNS zone with name \"my-zone\" and DNS name \"www.my-zone.com\"",
            ["$ stackit dns zone create --name my-zone --dns-name www.my-zone.com"],
        ),
        Example::new(
            "Create a DNS zone with name \"my-zone\", DNS name \"www.my-zone.com\" and default time to live of 1000ms",
            ["$ stackit dns zone create --name my-zone --dns-name www.my-zone.com --default-ttl 1000"],
        ),
    ])
}

fn list_examples() -> String {
    examples::build(&[
        Example::new("List DNS zones", ["$ stackit dns zone list"]),
        Example::new(
            "List DNS zones in JSON format",
            ["$ stackit dns zone list --output-format json"],
        ),
        Example::new(
            "List up to 10 DNS zones",
            ["$ stackit dns zone list --limit 10"],
        ),
    ])
}

#[derive(clap::Args, Debug)]
pub struct ZoneIdArg {
    /// Zone ID
    #[arg(value_name = "ZONE_ID", value_parser = flags::uuid)]
    pub zone_id: String,
}

#[derive(clap::Args, Debug)]
pub struct CreateArgs {
    /// User given name of the zone
    #[arg(long, required = true)]
    pub name: String,

    /// Fully qualified domain name of the DNS zone
    #[arg(long, required = true)]
    pub dns_name: String,

    /// Default time to live
    #[arg(long, default_value_t = DEFAULT_TTL)]
    pub default_ttl: i64,

    /// Primary name server for secondary zone
    #[arg(long = "primary", value_delimiter = ',')]
    pub primaries: Vec<String>,

    /// Access control list
    #[arg(long)]
    pub acl: Option<String>,

    /// Zone type
    #[arg(long = "type")]
    pub zone_type: Option<String>,

    /// Retry time
    #[arg(long)]
    pub retry_time: Option<i64>,

    /// Refresh time
    #[arg(long)]
    pub refresh_time: Option<i64>,

    /// Negative cache
    #[arg(long)]
    pub negative_cache: Option<i64>,

    /// Is reverse zone
    #[arg(long)]
    pub is_reverse_zone: bool,

    /// Expire time
    #[arg(long)]
    pub expire_time: Option<i64>,

    /// Description of the zone
    #[arg(long)]
    pub description: Option<String>,

    /// Contact email for the zone
    #[arg(long)]
    pub contact_email: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub filter: ListFilterArgs,

    /// Includes successfully deleted zones (if unset, these are filtered out)
    #[arg(long, visible_alias = "deleted")]
    pub include_deleted: bool,
}

#[derive(clap::Args, Debug)]
pub struct UpdateArgs {
    /// Zone ID
    #[arg(value_name = "ZONE_ID", value_parser = flags::uuid)]
    pub zone_id: String,

    /// User given name of the zone
    #[arg(long)]
    pub name: Option<String>,

    /// Default time to live
    #[arg(long)]
    pub default_ttl: Option<i64>,

    /// Primary name server for secondary zone
    #[arg(long = "primary", value_delimiter = ',')]
    pub primaries: Option<Vec<String>>,

    /// Access control list
    #[arg(long)]
    pub acl: Option<String>,

    /// Retry time
    #[arg(long)]
    pub retry_time: Option<i64>,

    /// Refresh time
    #[arg(long)]
    pub refresh_time: Option<i64>,

    /// Negative cache
    #[arg(long)]
    pub negative_cache: Option<i64>,

    /// Expire time
    #[arg(long)]
    pub expire_time: Option<i64>,

    /// Description of the zone
    #[arg(long)]
    pub description: Option<String>,

    /// Contact email for the zone
    #[arg(long)]
    pub contact_email: Option<String>,
}

pub fn run(cmd: ZoneCommands, ctx: &CmdContext) -> Result<()> {
    match cmd {
        ZoneCommands::Create(args) => run_create(args, ctx),
        ZoneCommands::List(args) => run_list(args, ctx),
        ZoneCommands::Describe(args) => run_describe(args, ctx),
        ZoneCommands::Update(args) => run_update(args, ctx),
        ZoneCommands::Delete(args) => run_delete(args, ctx),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInput {
    #[serde(flatten)]
    pub global: GlobalFlagModel,
    pub project_id: String,
    pub payload: CreateZonePayload,
}

impl InputModel for CreateInput {}

pub fn parse_create_input(args: &CreateArgs, global: &GlobalFlagModel) -> Result<CreateInput, CliError> {
    let project_id = input::project_id(global)?;
    Ok(CreateInput {
        global: global.clone(),
        project_id,
        payload: CreateZonePayload {
            name: args.name.clone(),
            dns_name: args.dns_name.clone(),
            default_ttl: Some(args.default_ttl),
            primaries: (!args.primaries.is_empty()).then(|| args.primaries.clone()),
            acl: args.acl.clone(),
            zone_type: args.zone_type.clone(),
            retry_time: args.retry_time,
            refresh_time: args.refresh_time,
            negative_cache: args.negative_cache,
            is_reverse_zone: args.is_reverse_zone.then_some(true),
            expire_time: args.expire_time,
            description: args.description.clone(),
            contact_email: args.contact_email.clone(),
        },
    })
}

fn run_create(args: CreateArgs, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_create_input(&args, &ctx.global)?.finish(p);
    let client = ctx.api_client(Service::Dns)?;
    let project_label = ctx.project_label(&model.project_id);

    ctx.confirm(&format!(
        "Are you sure you want to create a zone for project {:?}?",
        project_label
    ))?;

    let resp = dns::create_zone(&client, &model.project_id, &model.payload)?;
    if !ctx.global.is_async {
        let _spinner = p.spinner("Creating zone");
        dns::wait_for_zone(
            &ctx.waiter(),
            &client,
            &model.project_id,
            &resp.zone.id,
            dns::STATE_CREATE_SUCCEEDED,
        )?;
    }

    let state = ctx.operation_state("Created", "Triggered creation of");
    output_result(p, ctx.global.output_format, &resp, |p| {
        p.outputln(&format!(
            "{} zone for project {:?}. Zone ID: {}",
            state, project_label, resp.zone.id
        ));
        Ok(())
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListInput {
    #[serde(flatten)]
    pub global: GlobalFlagModel,
    pub project_id: String,
    #[serde(flatten)]
    pub filter: ListFilterInput,
    pub include_deleted: bool,
}

impl InputModel for ListInput {}

pub fn parse_list_input(args: &ListArgs, global: &GlobalFlagModel) -> Result<ListInput, CliError> {
    Ok(ListInput {
        global: global.clone(),
        project_id: input::project_id(global)?,
        filter: args.filter.parse()?,
        include_deleted: args.include_deleted,
    })
}

pub fn build_list_filter(model: &ListInput) -> ListFilter {
    ListFilter {
        name_like: model.filter.name_like.clone(),
        active: model.filter.active_filter(),
        state_eq: None,
        state_neq: (!model.include_deleted).then(|| dns::STATE_DELETE_SUCCEEDED.to_string()),
        order_by_name: model.filter.order_by_name.as_ref().map(|o| o.to_uppercase()),
        page_size: model.filter.effective_page_size(),
    }
}

fn run_list(args: ListArgs, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_list_input(&args, &ctx.global)?.finish(p);
    let client = ctx.api_client(Service::Dns)?;
    let filter = build_list_filter(&model);

    let zones = fetch_pages(&model.filter, |page, _| {
        dns::list_zones(&client, &model.project_id, &filter, page).map(|resp| resp.zones)
    })?;

    if zones.is_empty() {
        p.info(&format!(
            "No zones found for project {:?} matching the criteria",
            ctx.project_label(&model.project_id)
        ));
        return Ok(());
    }
    output_zones(p, &ctx.global, &zones)
}

pub fn output_zones(p: &Printer, global: &GlobalFlagModel, zones: &[Zone]) -> Result<()> {
    output_result(p, global.output_format, zones, |p| {
        let mut table = Table::new();
        table.set_header(["ID", "NAME", "STATE", "TYPE", "DNS NAME", "RECORD COUNT"]);
        for zone in zones {
            table.add_row([
                zone.id.clone(),
                zone.name.clone(),
                zone.state.clone(),
                zone.zone_type.clone(),
                zone.dns_name.clone(),
                zone.record_count.map(|c| c.to_string()).unwrap_or_default(),
            ]);
        }
        table.display(p);
        Ok(())
    })
}

/// Describe and delete address one zone by id
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneInput {
    #[serde(flatten)]
    pub global: GlobalFlagModel,
    pub project_id: String,
    pub zone_id: String,
}

impl InputModel for ZoneInput {}

pub fn parse_zone_input(args: &ZoneIdArg, global: &GlobalFlagModel) -> Result<ZoneInput, CliError> {
    Ok(ZoneInput {
        global: global.clone(),
        project_id: input::project_id(global)?,
        zone_id: args.zone_id.clone(),
    })
}

fn run_describe(args: ZoneIdArg, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_zone_input(&args, &ctx.global)?.finish(p);
    let client = ctx.api_client(Service::Dns)?;
    let resp = dns::get_zone(&client, &model.project_id, &model.zone_id)?;
    output_zone_details(p, &ctx.global, &resp)
}

pub fn output_zone_details(p: &Printer, global: &GlobalFlagModel, resp: &ZoneResponse) -> Result<()> {
    output_result(p, global.output_format, resp, |p| {
        let zone = &resp.zone;
        let opt = |v: Option<i64>| v.map(|n| n.to_string()).unwrap_or_default();
        let mut table = Table::new();
        for (name, value) in [
            ("ID", zone.id.clone()),
            ("NAME", zone.name.clone()),
            ("STATE", zone.state.clone()),
            ("TYPE", zone.zone_type.clone()),
            ("DNS NAME", zone.dns_name.clone()),
            ("PRIMARY NAME SERVER", zone.primary_name_server.clone().unwrap_or_default()),
            ("RECORD COUNT", opt(zone.record_count)),
            ("CONTACT EMAIL", zone.contact_email.clone().unwrap_or_default()),
            ("DEFAULT TTL", opt(zone.default_ttl)),
            ("SERIAL NUMBER", opt(zone.serial_number)),
        ] {
            table.add_row([name.to_string(), value]);
            table.add_separator();
        }
        table.display(p);
        Ok(())
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInput {
    #[serde(flatten)]
    pub global: GlobalFlagModel,
    pub project_id: String,
    pub zone_id: String,
    pub payload: PartialUpdateZonePayload,
}

impl InputModel for UpdateInput {}

pub fn parse_update_input(args: &UpdateArgs, global: &GlobalFlagModel) -> Result<UpdateInput, CliError> {
    let project_id = input::project_id(global)?;
    let payload = PartialUpdateZonePayload {
        name: args.name.clone(),
        default_ttl: args.default_ttl,
        primaries: args.primaries.clone(),
        acl: args.acl.clone(),
        retry_time: args.retry_time,
        refresh_time: args.refresh_time,
        negative_cache: args.negative_cache,
        expire_time: args.expire_time,
        description: args.description.clone(),
        contact_email: args.contact_email.clone(),
    };
    input::ensure_any_set(&[payload != PartialUpdateZonePayload::default()])?;
    Ok(UpdateInput {
        global: global.clone(),
        project_id,
        zone_id: args.zone_id.clone(),
        payload,
    })
}

fn run_update(args: UpdateArgs, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_update_input(&args, &ctx.global)?.finish(p);
    let client = ctx.api_client(Service::Dns)?;
    let zone_label = dns::zone_label(&client, &model.project_id, &model.zone_id);

    ctx.confirm(&format!("Are you sure you want to update zone {}?", zone_label))?;
    dns::update_zone(&client, &model.project_id, &model.zone_id, &model.payload)?;

    if !ctx.global.is_async {
        let _spinner = p.spinner("Updating zone");
        dns::wait_for_zone(
            &ctx.waiter(),
            &client,
            &model.project_id,
            &model.zone_id,
            dns::STATE_UPDATE_SUCCEEDED,
        )?;
    }
    p.info(&format!(
        "{} zone {}",
        ctx.operation_state("Updated", "Triggered update of"),
        zone_label
    ));
    Ok(())
}

fn run_delete(args: ZoneIdArg, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_zone_input(&args, &ctx.global)?.finish(p);
    let client = ctx.api_client(Service::Dns)?;
    let zone_label = dns::zone_label(&client, &model.project_id, &model.zone_id);

    ctx.confirm(&format!(
        "Are you sure you want to delete zone {}? (This cannot be undone)",
        zone_label
    ))?;
    dns::delete_zone(&client, &model.project_id, &model.zone_id)?;

    if !ctx.global.is_async {
        let _spinner = p.spinner("Deleting zone");
        dns::wait_for_zone(
            &ctx.waiter(),
            &client,
            &model.project_id,
            &model.zone_id,
            dns::STATE_DELETE_SUCCEEDED,
        )?;
    }
    p.info(&format!(
        "{} zone {}",
        ctx.operation_state("Deleted", "Triggered deletion of"),
        zone_label
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::OutputFormat;
    use crate::cli::test_support::{debug_context, test_context, RecordingTransport, TEST_PROJECT_ID};
    use crate::services::Method;
    use serde_json::json;

    const ZONE_ID: &str = "bbbbbbbb-bbbb-bbbb-bbbb-bbbbbbbbbbbb";

    fn global() -> GlobalFlagModel {
        GlobalFlagModel {
            project_id: Some(TEST_PROJECT_ID.into()),
            ..Default::default()
        }
    }

    fn create_args() -> CreateArgs {
        CreateArgs {
            name: "my-zone".into(),
            dns_name: "www.my-zone.com".into(),
            default_ttl: DEFAULT_TTL,
            primaries: Vec::new(),
            acl: None,
            zone_type: None,
            retry_time: None,
            refresh_time: None,
            negative_cache: None,
            is_reverse_zone: false,
            expire_time: None,
            description: None,
            contact_email: None,
        }
    }

    fn update_args() -> UpdateArgs {
        UpdateArgs {
            zone_id: ZONE_ID.into(),
            name: None,
            default_ttl: None,
            primaries: None,
            acl: None,
            retry_time: None,
            refresh_time: None,
            negative_cache: None,
            expire_time: None,
            description: None,
            contact_email: None,
        }
    }

    #[test]
    fn test_create_payload_defaults() {
        let model = parse_create_input(&create_args(), &global()).unwrap();
        assert_eq!(
            serde_json::to_value(&model.payload).unwrap(),
            json!({"name": "my-zone", "dnsName": "www.my-zone.com", "defaultTTL": 1000})
        );
    }

    #[test]
    fn test_create_requires_project() {
        assert!(matches!(
            parse_create_input(&create_args(), &GlobalFlagModel::default()),
            Err(CliError::ProjectIdMissing)
        ));
    }

    #[test]
    fn test_update_without_fields_is_empty_update() {
        assert!(matches!(
            parse_update_input(&update_args(), &global()),
            Err(CliError::EmptyUpdate)
        ));
    }

    #[test]
    fn test_update_only_sends_given_fields() {
        let mut args = update_args();
        args.contact_email = Some("someone@domain.com".into());
        let model = parse_update_input(&args, &global()).unwrap();
        assert_eq!(
            serde_json::to_value(&model.payload).unwrap(),
            json!({"contactEmail": "someone@domain.com"})
        );
    }

    #[test]
    fn test_list_filter_excludes_deleted_by_default() {
        let args = ListArgs {
            filter: ListFilterArgs {
                active: false,
                inactive: false,
                name_like: None,
                order_by_name: Some("desc".into()),
                limit: Some(10),
                page_size: 100,
            },
            include_deleted: false,
        };
        let filter = build_list_filter(&parse_list_input(&args, &global()).unwrap());
        assert_eq!(filter.state_neq.as_deref(), Some(dns::STATE_DELETE_SUCCEEDED));
        assert_eq!(filter.order_by_name.as_deref(), Some("DESC"));
        assert_eq!(filter.page_size, 10);
    }

    #[test]
    fn test_create_async_skips_wait() {
        let transport = RecordingTransport::new();
        transport.respond(202, json!({"zone": {"id": ZONE_ID, "state": "CREATING"}}));
        let (mut ctx, handles) = test_context(transport, "");
        ctx.global.assume_yes = true;
        ctx.global.is_async = true;

        run_create(create_args(), &ctx).unwrap();

        let sent = handles.transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, Method::Post);
        assert!(handles
            .out
            .contents()
            .contains(&format!("Triggered creation of zone for project {:?}. Zone ID: {}", TEST_PROJECT_ID, ZONE_ID)));
    }

    #[test]
    fn test_create_waits_until_succeeded() {
        let transport = RecordingTransport::new();
        transport.respond(202, json!({"zone": {"id": ZONE_ID, "state": "CREATING"}}));
        transport.respond(200, json!({"zone": {"id": ZONE_ID, "state": "CREATING"}}));
        transport.respond(200, json!({"zone": {"id": ZONE_ID, "state": "CREATE_SUCCEEDED"}}));
        let (mut ctx, handles) = test_context(transport, "");
        ctx.global.assume_yes = true;
        ctx.global.output_format = OutputFormat::Json;

        run_create(create_args(), &ctx).unwrap();

        assert_eq!(handles.transport.requests().len(), 3);
        let out: serde_json::Value = serde_json::from_str(&handles.out.contents()).unwrap();
        assert_eq!(out["zone"]["id"], ZONE_ID);
    }

    #[test]
    fn test_delete_declined_sends_only_lookup() {
        let transport = RecordingTransport::new();
        transport.respond(200, json!({"zone": {"id": ZONE_ID, "name": "my-zone"}}));
        let (ctx, handles) = test_context(transport, "no\n");

        let err = run_delete(
            ZoneIdArg {
                zone_id: ZONE_ID.into(),
            },
            &ctx,
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::PromptDeclined)
        ));
        let sent = handles.transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, Method::Get);
    }

    #[test]
    fn test_zone_list_table() {
        let (ctx, handles) = test_context(RecordingTransport::new(), "");
        let zones = vec![Zone {
            id: ZONE_ID.into(),
            name: "my-zone".into(),
            state: "CREATE_SUCCEEDED".into(),
            zone_type: "primary".into(),
            dns_name: "my-zone.com".into(),
            record_count: Some(4),
            ..Default::default()
        }];
        output_zones(&ctx.printer, &ctx.global, &zones).unwrap();
        let text = handles.out.contents();
        assert!(text.contains("RECORD COUNT"));
        assert!(text.contains("my-zone.com"));
    }

    #[test]
    fn test_delete_dumps_input_at_debug() {
        let transport = RecordingTransport::new();
        transport.respond(200, json!({"zone": {"id": ZONE_ID, "name": "example"}}));
        let (ctx, handles) = debug_context(transport, "n\n");

        let err = run_delete(ZoneIdArg { zone_id: ZONE_ID.into() }, &ctx).unwrap_err();

        assert!(matches!(err.downcast_ref::<CliError>(), Some(CliError::PromptDeclined)));
        let stderr = handles.err.contents();
        assert!(stderr.contains("parsed input values"));
        assert!(stderr.contains(&format!(r#""zoneId":"{}""#, ZONE_ID)));
    }
}
