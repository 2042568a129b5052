//! `stackit object-storage` command - buckets

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
use crate::services::object_storage::{self, Bucket};
use crate::services::Service;

#[derive(Subcommand, Debug)]
pub enum ObjectStorageCommands {
    /// Provides functionality for Object Storage buckets
    #[command(subcommand)]
    Bucket(BucketCommands),
}

#[derive(Subcommand, Debug)]
pub enum BucketCommands {
    /// Creates an Object Storage bucket
    #[command(after_help = examples::build(&[Example::new(
        "Create an Object Storage bucket with name \"my-bucket\"",
        ["$ stackit object-storage bucket create my-bucket"],
    )]))]
    Create(BucketNameArg),

    /// Lists all Object Storage buckets
    #[command(after_help = examples::build(&[
        Example::new("List all Object Storage buckets", ["$ stackit object-storage bucket list"]),
        Example::new(
            "List up to 10 Object Storage buckets",
            ["$ stackit object-storage bucket list --limit 10"],
        ),
    ]))]
    List(ListArgs),

    /// Shows details of an Object Storage bucket
    #[command(after_help = examples::build(&[Example::new(
        "Get details of an Object Storage bucket with name \"my-bucket\"",
        ["$ stackit object-storage bucket describe my-bucket"],
    )]))]
    Describe(BucketNameArg),

    /// Deletes an Object Storage bucket
    #[command(after_help = examples::build(&[Example::new(
        "Delete an Object Storage bucket with name \"my-bucket\"",
        ["$ stackit object-storage bucket delete my-bucket"],
    )]))]
    Delete(BucketNameArg),
}

#[derive(clap::Args, Debug)]
pub struct BucketNameArg {
    /// Name of the bucket
    #[arg(value_name = "BUCKET_NAME")]
    pub bucket_name: String,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Maximum number of entries to list
    #[arg(long, allow_negative_numbers = true)]
    pub limit: Option<i64>,
}

pub fn run(cmd: ObjectStorageCommands, ctx: &CmdContext) -> Result<()> {
    let ObjectStorageCommands::Bucket(cmd) = cmd;
    match cmd {
        BucketCommands::Create(args) => run_create(args, ctx),
        BucketCommands::List(args) => run_list(args, ctx),
        BucketCommands::Describe(args) => run_describe(args, ctx),
        BucketCommands::Delete(args) => run_delete(args, ctx),
    }
}

/// Create, describe and delete address one bucket by name
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketInput {
    #[serde(flatten)]
    pub global: GlobalFlagModel,
    pub project_id: String,
    pub region: String,
    pub bucket_name: String,
}

impl InputModel for BucketInput {}

pub fn parse_bucket_input(args: &BucketNameArg, global: &GlobalFlagModel) -> Result<BucketInput, CliError> {
    Ok(BucketInput {
        global: global.clone(),
        project_id: input::project_id(global)?,
        region: global.region_or_default().to_string(),
        bucket_name: args.bucket_name.clone(),
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

fn run_create(args: BucketNameArg, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_bucket_input(&args, &ctx.global)?.finish(p);
    let (project_id, region, bucket) = (&model.project_id, &model.region, &model.bucket_name);
    let client = ctx.api_client(Service::ObjectStorage)?;

    ctx.confirm(&format!(
        "Are you sure you want to create bucket {:?}? (This cannot be undone)",
        bucket
    ))?;

    // buckets can only be created once the project is enabled for the service
    if !object_storage::project_enabled(&client, project_id, region)? {
        p.debug("object storage is not enabled for this project, enabling it");
        object_storage::enable_project(&client, project_id, region)?;
    }
    object_storage::create_bucket(&client, project_id, region, bucket)?;

    if !ctx.global.is_async {
        let _spinner = p.spinner("Creating bucket");
        object_storage::wait_for_bucket(&ctx.waiter(), &client, project_id, region, bucket, true)?;
    }
    p.outputln(&format!(
        "{} bucket {:?}",
        ctx.operation_state("Created", "Triggered creation of"),
        bucket
    ));
    Ok(())
}

fn run_list(args: ListArgs, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_list_input(&args, &ctx.global)?.finish(p);
    let client = ctx.api_client(Service::ObjectStorage)?;

    let mut buckets = object_storage::list_buckets(&client, &model.project_id, &model.region)?.buckets;
    if buckets.is_empty() {
        p.info(&format!(
            "No buckets found for project {:?}",
            ctx.project_label(&model.project_id)
        ));
        return Ok(());
    }
    if let Some(limit) = model.limit {
        buckets.truncate(limit as usize);
    }
    output_buckets(p, &ctx.global, &buckets)
}

pub fn output_buckets(p: &Printer, global: &GlobalFlagModel, buckets: &[Bucket]) -> Result<()> {
    output_result(p, global.output_format, buckets, |p| {
        let mut table = Table::new();
        table.set_header(["NAME", "REGION", "URL (PATH STYLE)", "URL (VIRTUAL HOSTED STYLE)"]);
        for b in buckets {
            table.add_row([
                b.name.clone(),
                b.region.clone(),
                b.url_path_style.clone(),
                b.url_virtual_hosted_style.clone(),
            ]);
        }
        table.display(p);
        Ok(())
    })
}

fn run_describe(args: BucketNameArg, ctx: &CmdContext) -> Result<()> {
    let model = parse_bucket_input(&args, &ctx.global)?.finish(&ctx.printer);
    let client = ctx.api_client(Service::ObjectStorage)?;
    let resp = object_storage::get_bucket(&client, &model.project_id, &model.region, &model.bucket_name)?;

    output_result(&ctx.printer, ctx.global.output_format, &resp, |p| {
        let b = &resp.bucket;
        let mut table = Table::new();
        table.add_row(["Name".to_string(), b.name.clone()]);
        table.add_separator();
        table.add_row(["Region".to_string(), b.region.clone()]);
        table.add_separator();
        table.add_row(["URL (Path Style)".to_string(), b.url_path_style.clone()]);
        table.add_separator();
        table.add_row(["URL (Virtual Hosted Style)".to_string(), b.url_virtual_hosted_style.clone()]);
        table.display(p);
        Ok(())
    })
}

fn run_delete(args: BucketNameArg, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_bucket_input(&args, &ctx.global)?.finish(p);
    let (project_id, region, bucket) = (&model.project_id, &model.region, &model.bucket_name);
    let client = ctx.api_client(Service::ObjectStorage)?;

    ctx.confirm(&format!(
        "Are you sure you want to delete bucket {:?}? (This cannot be undone)",
        bucket
    ))?;
    object_storage::delete_bucket(&client, project_id, region, bucket)?;

    if !ctx.global.is_async {
        let _spinner = p.spinner("Deleting bucket");
        object_storage::wait_for_bucket(&ctx.waiter(), &client, project_id, region, bucket, false)?;
    }
    p.info(&format!(
        "{} bucket {:?}",
        ctx.operation_state("Deleted", "Triggered deletion of"),
        bucket
    ));
    Ok(())
}
