//! `stackit dns record-set` - manage the record sets of a zone

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
    self, CreateRecordSetPayload, ListFilter, PartialUpdateRecordSetPayload, RecordPayload,
    RecordSet, RecordSetResponse,
};
use crate::services::Service;

const RECORD_TYPES: &[&str] = &[
    "A", "AAAA", "SOA", "CNAME", "NS", "MX", "TXT", "SRV", "PTR", "ALIAS", "DNAME", "CAA",
];
const TXT_TYPE: &str = "TXT";
/// Longest character-string a single TXT chunk may hold
const TXT_CHUNK_LEN: usize = 255;

#[derive(Subcommand, Debug)]
pub enum RecordSetCommands {
    /// Creates a DNS record set
    #[command(after_help = create_examples())]
    Create(CreateArgs),

    /// Lists DNS record sets
    #[command(after_help = list_examples())]
    List(ListArgs),

    /// Shows details of a DNS record set
    #[command(after_help = examples::build(&[Example::new(
        "Get details of DNS record set with ID \"xxx\" in zone with ID \"yyy\"",
        ["$ stackit dns record-set describe xxx --zone-id yyy"],
    )]))]
    Describe(RecordSetIdArgs),

    /// Updates a DNS record set
    #[command(after_help = examples::build(&[Example::new(
        "Update the records of DNS record set with ID \"xxx\" in zone with ID \"yyy\"",
        ["$ stackit dns record-set update xxx --zone-id yyy --record 1.2.3.4"],
    )]))]
    Update(UpdateArgs),

    /// Deletes a DNS record set
    #[command(after_help = examples::build(&[Example::new(
        "Delete DNS record set with ID \"xxx\" in zone with ID \"yyy\"",
        ["$ stackit dns record-set delete xxx --zone-id yyy"],
    )]))]
    Delete(RecordSetIdArgs),
}

fn create_examples() -> String {
    examples::build(&[
        Example::new(
            "Create a DNS record set with name \"my-rr\" with records \"1.2.3.4\" and \"5.6.7.8\" in zone with ID \"xxx\"",
            ["$ stackit dns record-set create --zone-id xxx --name my-rr --record 1.2.3.4 --record 5.6.7.8"],
        ),
        Example::new(
            "Create a DNS record set with name \"my-rr\" and type \"AAAA\" in zone with ID \"xxx\"",
            ["$ stackit dns record-set create --zone-id xxx --name my-rr --record 2001:db8::1 --type AAAA"],
        ),
    ])
}

fn list_examples() -> String {
    examples::build(&[
        Example::new(
            "List DNS record sets of zone with ID \"xxx\"",
            ["$ stackit dns record-set list --zone-id xxx"],
        ),
        Example::new(
            "List DNS record sets of zone with ID \"xxx\" whose name contains \"www\"",
            ["$ stackit dns record-set list --zone-id xxx --name-like www"],
        ),
        Example::new(
            "List deleted DNS record sets of zone with ID \"xxx\"",
            ["$ stackit dns record-set list --zone-id xxx --deleted"],
        ),
    ])
}

#[derive(clap::Args, Debug)]
pub struct CreateArgs {
    /// Zone ID
    #[arg(long, required = true, value_parser = flags::uuid)]
    pub zone_id: String,

    /// Name of the record, should be compliant with RFC1035, Section 2.3.4
    #[arg(long, required = true)]
    pub name: String,

    /// Records belonging to the record set, repeat the flag for multiple records
    #[arg(long = "record", required = true)]
    pub records: Vec<String>,

    /// Record set type
    #[arg(long = "type", default_value = "A", value_parser = flags::enum_parser(RECORD_TYPES, false))]
    pub record_type: String,

    /// Time to live, if not provided defaults to the zone's default TTL
    #[arg(long)]
    pub ttl: Option<i64>,

    /// User comment
    #[arg(long)]
    pub comment: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Zone ID
    #[arg(long, required = true, value_parser = flags::uuid)]
    pub zone_id: String,

    #[command(flatten)]
    pub filter: ListFilterArgs,

    /// Filter for deleted record sets
    #[arg(long, conflicts_with = "inactive")]
    pub deleted: bool,
}

#[derive(clap::Args, Debug)]
pub struct RecordSetIdArgs {
    /// Record set ID
    #[arg(value_name = "RECORD_SET_ID", value_parser = flags::uuid)]
    pub record_set_id: String,

    /// Zone ID
    #[arg(long, required = true, value_parser = flags::uuid)]
    pub zone_id: String,
}

#[derive(clap::Args, Debug)]
pub struct UpdateArgs {
    /// Record set ID
    #[arg(value_name = "RECORD_SET_ID", value_parser = flags::uuid)]
    pub record_set_id: String,

    /// Zone ID
    #[arg(long, required = true, value_parser = flags::uuid)]
    pub zone_id: String,

    /// User comment
    #[arg(long)]
    pub comment: Option<String>,

    /// Name of the record, should be compliant with RFC1035, Section 2.3.4
    #[arg(long)]
    pub name: Option<String>,

    /// Records belonging to the record set
    #[arg(long = "record")]
    pub records: Option<Vec<String>>,

    /// Time to live
    #[arg(long)]
    pub ttl: Option<i64>,
}

pub fn run(cmd: RecordSetCommands, ctx: &CmdContext) -> Result<()> {
    match cmd {
        RecordSetCommands::Create(args) => run_create(args, ctx),
        RecordSetCommands::List(args) => run_list(args, ctx),
        RecordSetCommands::Describe(args) => run_describe(args, ctx),
        RecordSetCommands::Update(args) => run_update(args, ctx),
        RecordSetCommands::Delete(args) => run_delete(args, ctx),
    }
}

/// TXT content over 255 characters becomes quoted 255-character strings
/// separated by spaces; other types pass through untouched
pub fn format_record(record_type: &str, content: &str) -> String {
    if record_type != TXT_TYPE || content.chars().count() <= TXT_CHUNK_LEN {
        return content.to_string();
    }
    let chars: Vec<char> = content.chars().collect();
    chars
        .chunks(TXT_CHUNK_LEN)
        .map(|chunk| format!("{:?}", chunk.iter().collect::<String>()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn record_payloads(record_type: &str, records: &[String]) -> Vec<RecordPayload> {
    records
        .iter()
        .map(|content| RecordPayload {
            content: format_record(record_type, content),
        })
        .collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInput {
    #[serde(flatten)]
    pub global: GlobalFlagModel,
    pub project_id: String,
    pub zone_id: String,
    pub payload: CreateRecordSetPayload,
}

impl InputModel for CreateInput {}

pub fn parse_create_input(args: &CreateArgs, global: &GlobalFlagModel) -> Result<CreateInput, CliError> {
    let project_id = input::project_id(global)?;
    if args.records.is_empty() {
        return Err(CliError::flag("record", "at least one record is required"));
    }
    Ok(CreateInput {
        global: global.clone(),
        project_id,
        zone_id: args.zone_id.clone(),
        payload: build_create_payload(args),
    })
}

pub fn build_create_payload(args: &CreateArgs) -> CreateRecordSetPayload {
    CreateRecordSetPayload {
        name: args.name.clone(),
        records: record_payloads(&args.record_type, &args.records),
        record_type: args.record_type.clone(),
        ttl: args.ttl,
        comment: args.comment.clone(),
    }
}

fn run_create(args: CreateArgs, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_create_input(&args, &ctx.global)?.finish(p);
    let client = ctx.api_client(Service::Dns)?;
    let zone_label = dns::zone_label(&client, &model.project_id, &model.zone_id);

    ctx.confirm(&format!(
        "Are you sure you want to create a record set for zone {}?",
        zone_label
    ))?;

    let resp = dns::create_record_set(&client, &model.project_id, &model.zone_id, &model.payload)?;
    if !ctx.global.is_async {
        let _spinner = p.spinner("Creating record set");
        dns::wait_for_record_set(
            &ctx.waiter(),
            &client,
            &model.project_id,
            &model.zone_id,
            &resp.rrset.id,
            dns::STATE_CREATE_SUCCEEDED,
        )?;
    }

    let state = ctx.operation_state("Created", "Triggered creation of");
    output_result(p, ctx.global.output_format, &resp, |p| {
        p.outputln(&format!(
            "{} record set for zone {}. Record set ID: {}",
            state, zone_label, resp.rrset.id
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
    pub zone_id: String,
    #[serde(flatten)]
    pub filter: ListFilterInput,
    pub deleted: bool,
}

impl InputModel for ListInput {}

pub fn parse_list_input(args: &ListArgs, global: &GlobalFlagModel) -> Result<ListInput, CliError> {
    Ok(ListInput {
        global: global.clone(),
        project_id: input::project_id(global)?,
        zone_id: args.zone_id.clone(),
        filter: args.filter.parse()?,
        deleted: args.deleted,
    })
}

/// Deleted record sets are hidden unless asked for or implied by `--inactive`
pub fn build_list_filter(model: &ListInput) -> ListFilter {
    let (state_eq, state_neq) = if model.deleted {
        (Some(dns::STATE_DELETE_SUCCEEDED.to_string()), None)
    } else if !model.filter.inactive {
        (None, Some(dns::STATE_DELETE_SUCCEEDED.to_string()))
    } else {
        (None, None)
    };
    ListFilter {
        name_like: model.filter.name_like.clone(),
        active: model.filter.active_filter(),
        state_eq,
        state_neq,
        order_by_name: model.filter.order_by_name.as_ref().map(|o| o.to_uppercase()),
        page_size: model.filter.effective_page_size(),
    }
}

fn run_list(args: ListArgs, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_list_input(&args, &ctx.global)?.finish(p);
    let client = ctx.api_client(Service::Dns)?;
    let filter = build_list_filter(&model);

    let record_sets = fetch_pages(&model.filter, |page, _| {
        dns::list_record_sets(&client, &model.project_id, &model.zone_id, &filter, page)
            .map(|resp| resp.rr_sets)
    })?;

    if record_sets.is_empty() {
        let zone_label = dns::zone_label(&client, &model.project_id, &model.zone_id);
        p.info(&format!(
            "No record sets found for zone {} matching the criteria",
            zone_label
        ));
        return Ok(());
    }
    output_record_sets(p, &ctx.global, &record_sets)
}

fn record_data(record_set: &RecordSet) -> String {
    record_set
        .records
        .iter()
        .map(|r| r.content.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn output_record_sets(p: &Printer, global: &GlobalFlagModel, record_sets: &[RecordSet]) -> Result<()> {
    output_result(p, global.output_format, record_sets, |p| {
        let mut table = Table::new();
        table.set_header(["ID", "NAME", "STATUS", "TTL", "TYPE", "RECORD DATA"]);
        for rs in record_sets {
            table.add_row([
                rs.id.clone(),
                rs.name.clone(),
                rs.state.clone(),
                rs.ttl.to_string(),
                rs.record_type.clone(),
                record_data(rs),
            ]);
        }
        table.display(p);
        Ok(())
    })
}

/// Describe and delete address one record set of one zone
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSetInput {
    #[serde(flatten)]
    pub global: GlobalFlagModel,
    pub project_id: String,
    pub zone_id: String,
    pub record_set_id: String,
}

impl InputModel for RecordSetInput {}

pub fn parse_record_set_input(
    args: &RecordSetIdArgs,
    global: &GlobalFlagModel,
) -> Result<RecordSetInput, CliError> {
    Ok(RecordSetInput {
        global: global.clone(),
        project_id: input::project_id(global)?,
        zone_id: args.zone_id.clone(),
        record_set_id: args.record_set_id.clone(),
    })
}

fn run_describe(args: RecordSetIdArgs, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_record_set_input(&args, &ctx.global)?.finish(p);
    let client = ctx.api_client(Service::Dns)?;
    let resp = dns::get_record_set(&client, &model.project_id, &model.zone_id, &model.record_set_id)?;
    output_record_set_details(p, &ctx.global, &resp)
}

pub fn output_record_set_details(p: &Printer, global: &GlobalFlagModel, resp: &RecordSetResponse) -> Result<()> {
    output_result(p, global.output_format, resp, |p| {
        let rs = &resp.rrset;
        let mut table = Table::new();
        for (name, value) in [
            ("ID", rs.id.clone()),
            ("NAME", rs.name.clone()),
            ("STATE", rs.state.clone()),
            ("TTL", rs.ttl.to_string()),
            ("TYPE", rs.record_type.clone()),
            ("RECORDS DATA", record_data(rs)),
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
    pub record_set_id: String,
    pub comment: Option<String>,
    pub name: Option<String>,
    pub records: Option<Vec<String>>,
    pub ttl: Option<i64>,
}

impl InputModel for UpdateInput {}

pub fn parse_update_input(args: &UpdateArgs, global: &GlobalFlagModel) -> Result<UpdateInput, CliError> {
    let project_id = input::project_id(global)?;
    input::ensure_any_set(&[
        args.comment.is_some(),
        args.name.is_some(),
        args.records.is_some(),
        args.ttl.is_some(),
    ])?;
    Ok(UpdateInput {
        global: global.clone(),
        project_id,
        zone_id: args.zone_id.clone(),
        record_set_id: args.record_set_id.clone(),
        comment: args.comment.clone(),
        name: args.name.clone(),
        records: args.records.clone(),
        ttl: args.ttl,
    })
}

/// `record_type` is the type of the existing record set
pub fn build_update_payload(model: &UpdateInput, record_type: &str) -> PartialUpdateRecordSetPayload {
    PartialUpdateRecordSetPayload {
        name: model.name.clone(),
        records: model
            .records
            .as_ref()
            .map(|records| record_payloads(record_type, records)),
        ttl: model.ttl,
        comment: model.comment.clone(),
    }
}

fn run_update(args: UpdateArgs, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_update_input(&args, &ctx.global)?.finish(p);
    let client = ctx.api_client(Service::Dns)?;
    let zone_label = dns::zone_label(&client, &model.project_id, &model.zone_id);
    let current = dns::get_record_set(&client, &model.project_id, &model.zone_id, &model.record_set_id)?;
    let record_set_label = if current.rrset.name.is_empty() {
        model.record_set_id.clone()
    } else {
        current.rrset.name.clone()
    };

    ctx.confirm(&format!(
        "Are you sure you want to update record set {} of zone {}?",
        record_set_label, zone_label
    ))?;

    let payload = build_update_payload(&model, &current.rrset.record_type);
    dns::update_record_set(
        &client,
        &model.project_id,
        &model.zone_id,
        &model.record_set_id,
        &payload,
    )?;

    if !ctx.global.is_async {
        let _spinner = p.spinner("Updating record set");
        dns::wait_for_record_set(
            &ctx.waiter(),
            &client,
            &model.project_id,
            &model.zone_id,
            &model.record_set_id,
            dns::STATE_UPDATE_SUCCEEDED,
        )?;
    }
    p.info(&format!(
        "{} record set {} of zone {}",
        ctx.operation_state("Updated", "Triggered update of"),
        record_set_label,
        zone_label
    ));
    Ok(())
}

fn run_delete(args: RecordSetIdArgs, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_record_set_input(&args, &ctx.global)?.finish(p);
    let client = ctx.api_client(Service::Dns)?;
    let zone_label = dns::zone_label(&client, &model.project_id, &model.zone_id);
    let record_set_label =
        dns::record_set_label(&client, &model.project_id, &model.zone_id, &model.record_set_id);

    ctx.confirm(&format!(
        "Are you sure you want to delete record set {} of zone {}? (This cannot be undone)",
        record_set_label, zone_label
    ))?;
    dns::delete_record_set(&client, &model.project_id, &model.zone_id, &model.record_set_id)?;

    if !ctx.global.is_async {
        let _spinner = p.spinner("Deleting record set");
        dns::wait_for_record_set(
            &ctx.waiter(),
            &client,
            &model.project_id,
            &model.zone_id,
            &model.record_set_id,
            dns::STATE_DELETE_SUCCEEDED,
        )?;
    }
    p.info(&format!(
        "{} record set {} of zone {}",
        ctx.operation_state("Deleted", "Triggered deletion of"),
        record_set_label,
        zone_label
    ));
    Ok(())
}
