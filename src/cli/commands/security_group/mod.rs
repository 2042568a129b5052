//! `stackit security-group` command - security groups and their rules

mod rule;

use clap::Subcommand;
use miette::Result;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::cli::context::CmdContext;
use crate::cli::examples::{self, Example};
use crate::cli::flags;
use crate::cli::globalflags::GlobalFlagModel;
use crate::cli::input::{self, InputModel};
use crate::cli::output::output_result;
use crate::cli::printer::Printer;
use crate::cli::table::Table;
use crate::core::errors::CliError;
use crate::services::iaas::{self, CreateSecurityGroupPayload, SecurityGroup, UpdateSecurityGroupPayload};
use crate::services::Service;

pub use rule::RuleCommands;

const NAME_MAX_LEN: usize = 63;
const DESCRIPTION_MAX_LEN: usize = 127;

#[derive(Subcommand, Debug)]
pub enum SecurityGroupCommands {
    /// Creates security groups
    #[command(after_help = create_examples())]
    Create(CreateArgs),

    /// Lists security groups
    #[command(after_help = examples::build(&[
        Example::new("List all groups", ["$ stackit security-group list"]),
        Example::new(
            "List groups with labels",
            ["$ stackit security-group list --label-selector label1=value1,label2=value2"],
        ),
    ]))]
    List(ListArgs),

    /// Describes security groups
    #[command(after_help = examples::build(&[Example::new(
        "Describe group \"xxx\"",
        ["$ stackit security-group describe xxx"],
    )]))]
    Describe(GroupIdArg),

    /// Updates a security group
    #[command(after_help = examples::build(&[
        Example::new(
            "Update the name of group \"xxx\"",
            ["$ stackit security-group update xxx --name my-new-name"],
        ),
        Example::new(
            "Update the labels of group \"xxx\"",
            ["$ stackit security-group update xxx --labels label1=value1,label2=value2"],
        ),
    ]))]
    Update(UpdateArgs),

    /// Deletes a security group by its internal ID
    #[command(after_help = examples::build(&[Example::new(
        "Delete a named group with ID \"xxx\"",
        ["$ stackit security-group delete xxx"],
    )]))]
    Delete(GroupIdArg),

    /// Provides functionality for security group rules
    #[command(subcommand)]
    Rule(RuleCommands),
}

fn create_examples() -> String {
    examples::build(&[
        Example::new(
            "Create a named group",
            ["$ stackit security-group create --name my-new-group"],
        ),
        Example::new(
            "Create a named group with labels",
            ["$ stackit security-group create --name my-new-group --labels label1=value1,label2=value2"],
        ),
    ])
}

#[derive(clap::Args, Debug)]
pub struct GroupIdArg {
    /// Security group ID
    #[arg(value_name = "GROUP_ID", value_parser = flags::uuid)]
    pub group_id: String,
}

#[derive(clap::Args, Debug)]
pub struct CreateArgs {
    /// The name of the security group
    #[arg(long, required = true)]
    pub name: String,

    /// An optional description of the security group
    #[arg(long)]
    pub description: Option<String>,

    /// Labels are key-value string pairs which can be attached to a security group
    #[arg(long, value_delimiter = ',')]
    pub labels: Vec<String>,

    /// Create a stateful or a stateless security group
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = flags::enum_bool)]
    pub stateful: Option<bool>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Filter by label
    #[arg(long)]
    pub label_selector: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct UpdateArgs {
    /// Security group ID
    #[arg(value_name = "GROUP_ID", value_parser = flags::uuid)]
    pub group_id: String,

    /// The name of the security group
    #[arg(long)]
    pub name: Option<String>,

    /// An optional description of the security group
    #[arg(long)]
    pub description: Option<String>,

    /// Labels are key-value string pairs which can be attached to a security group
    #[arg(long, value_delimiter = ',')]
    pub labels: Option<Vec<String>>,
}

pub fn run(cmd: SecurityGroupCommands, ctx: &CmdContext) -> Result<()> {
    match cmd {
        SecurityGroupCommands::Create(args) => run_create(args, ctx),
        SecurityGroupCommands::List(args) => run_list(args, ctx),
        SecurityGroupCommands::Describe(args) => run_describe(args, ctx),
        SecurityGroupCommands::Update(args) => run_update(args, ctx),
        SecurityGroupCommands::Delete(args) => run_delete(args, ctx),
        SecurityGroupCommands::Rule(cmd) => rule::run(cmd, ctx),
    }
}

fn check_name_and_description(name: Option<&str>, description: Option<&str>) -> Result<(), CliError> {
    if let Some(name) = name {
        input::max_len("name", name, NAME_MAX_LEN)?;
    }
    if let Some(description) = description {
        input::max_len("description", description, DESCRIPTION_MAX_LEN)?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInput {
    #[serde(flatten)]
    pub global: GlobalFlagModel,
    pub project_id: String,
    pub region: String,
    pub payload: CreateSecurityGroupPayload,
}

impl InputModel for CreateInput {}

pub fn parse_create_input(args: &CreateArgs, global: &GlobalFlagModel) -> Result<CreateInput, CliError> {
    let project_id = input::project_id(global)?;
    check_name_and_description(Some(&args.name), args.description.as_deref())?;
    Ok(CreateInput {
        global: global.clone(),
        project_id,
        region: global.region_or_default().to_string(),
        payload: CreateSecurityGroupPayload {
            name: args.name.clone(),
            description: args.description.clone(),
            labels: input::labels("labels", &args.labels)?,
            stateful: args.stateful,
        },
    })
}

fn run_create(args: CreateArgs, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_create_input(&args, &ctx.global)?.finish(p);
    let client = ctx.api_client(Service::Iaas)?;

    ctx.confirm(&format!(
        "Are you sure you want to create the security group {:?}?",
        model.payload.name
    ))?;
    let group = iaas::create_security_group(&client, &model.project_id, &model.region, &model.payload)?;

    output_result(p, ctx.global.output_format, &group, |p| {
        p.outputln(&format!(
            "{} security group {:?} with id {}",
            ctx.operation_state("Created", "Triggered creation of"),
            group.name,
            group.id
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
    pub region: String,
    pub label_selector: Option<String>,
}

impl InputModel for ListInput {}

pub fn parse_list_input(args: &ListArgs, global: &GlobalFlagModel) -> Result<ListInput, CliError> {
    Ok(ListInput {
        global: global.clone(),
        project_id: input::project_id(global)?,
        region: global.region_or_default().to_string(),
        label_selector: args.label_selector.clone(),
    })
}

fn run_list(args: ListArgs, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_list_input(&args, &ctx.global)?.finish(p);
    let client = ctx.api_client(Service::Iaas)?;
    let groups = iaas::list_security_groups(
        &client,
        &model.project_id,
        &model.region,
        model.label_selector.as_deref(),
    )?
    .items;

    if groups.is_empty() {
        p.info(&format!(
            "No security groups found for project {:?}",
            ctx.project_label(&model.project_id)
        ));
        return Ok(());
    }
    output_groups(p, &ctx.global, &groups)
}

fn label_summary(labels: &BTreeMap<String, serde_json::Value>) -> String {
    labels
        .iter()
        .map(|(k, v)| match v {
            serde_json::Value::String(s) => format!("{}={}", k, s),
            other => format!("{}={}", k, other),
        })
        .collect::<Vec<_>>()
        .join(",")
}

pub fn output_groups(p: &Printer, global: &GlobalFlagModel, groups: &[SecurityGroup]) -> Result<()> {
    output_result(p, global.output_format, groups, |p| {
        let mut table = Table::new();
        table.set_header(["ID", "NAME", "STATEFUL", "DESCRIPTION", "LABELS"]);
        for group in groups {
            table.add_row([
                group.id.clone(),
                group.name.clone(),
                group.stateful.map(|s| s.to_string()).unwrap_or_default(),
                group.description.clone().unwrap_or_default(),
                label_summary(&group.labels),
            ]);
        }
        table.display(p);
        Ok(())
    })
}

/// Describe and delete address one group by id
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInput {
    #[serde(flatten)]
    pub global: GlobalFlagModel,
    pub project_id: String,
    pub region: String,
    pub group_id: String,
}

impl InputModel for GroupInput {}

pub fn parse_group_input(args: &GroupIdArg, global: &GlobalFlagModel) -> Result<GroupInput, CliError> {
    Ok(GroupInput {
        global: global.clone(),
        project_id: input::project_id(global)?,
        region: global.region_or_default().to_string(),
        group_id: args.group_id.clone(),
    })
}

fn run_describe(args: GroupIdArg, ctx: &CmdContext) -> Result<()> {
    let model = parse_group_input(&args, &ctx.global)?.finish(&ctx.printer);
    let client = ctx.api_client(Service::Iaas)?;
    let group = iaas::get_security_group(&client, &model.project_id, &model.region, &model.group_id)?;

    output_result(&ctx.printer, ctx.global.output_format, &group, |p| {
        let mut table = Table::new();
        table.add_row(["ID".to_string(), group.id.clone()]);
        table.add_separator();
        table.add_row(["NAME".to_string(), group.name.clone()]);
        table.add_separator();
        if let Some(description) = &group.description {
            table.add_row(["DESCRIPTION".to_string(), description.clone()]);
            table.add_separator();
        }
        if let Some(stateful) = group.stateful {
            table.add_row(["STATEFUL".to_string(), stateful.to_string()]);
            table.add_separator();
        }
        if !group.labels.is_empty() {
            table.add_row(["LABELS".to_string(), label_summary(&group.labels)]);
            table.add_separator();
        }
        if let Some(created) = &group.created_at {
            table.add_row(["CREATED AT".to_string(), created.clone()]);
            table.add_separator();
        }
        if let Some(updated) = &group.updated_at {
            table.add_row(["UPDATED AT".to_string(), updated.clone()]);
            table.add_separator();
        }
        if !group.rules.is_empty() {
            let ids: Vec<&str> = group.rules.iter().map(|r| r.id.as_str()).collect();
            table.add_row(["RULES".to_string(), ids.join("\n")]);
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
    pub region: String,
    pub group_id: String,
    pub payload: UpdateSecurityGroupPayload,
}

impl InputModel for UpdateInput {}

pub fn parse_update_input(args: &UpdateArgs, global: &GlobalFlagModel) -> Result<UpdateInput, CliError> {
    let project_id = input::project_id(global)?;
    input::ensure_any_set(&[
        args.name.is_some(),
        args.description.is_some(),
        args.labels.is_some(),
    ])?;
    check_name_and_description(args.name.as_deref(), args.description.as_deref())?;
    let labels = args
        .labels
        .as_ref()
        .map(|raw| input::labels("labels", raw))
        .transpose()?;
    Ok(UpdateInput {
        global: global.clone(),
        project_id,
        region: global.region_or_default().to_string(),
        group_id: args.group_id.clone(),
        payload: UpdateSecurityGroupPayload {
            name: args.name.clone(),
            description: args.description.clone(),
            labels,
        },
    })
}

fn run_update(args: UpdateArgs, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_update_input(&args, &ctx.global)?.finish(p);
    let client = ctx.api_client(Service::Iaas)?;
    let label = iaas::security_group_label(&client, &model.project_id, &model.region, &model.group_id);

    ctx.confirm(&format!(
        "Are you sure you want to update the security group {:?}?",
        label
    ))?;
    iaas::update_security_group(
        &client,
        &model.project_id,
        &model.region,
        &model.group_id,
        &model.payload,
    )?;
    p.info(&format!("Updated security group {:?}", label));
    Ok(())
}

fn run_delete(args: GroupIdArg, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_group_input(&args, &ctx.global)?.finish(p);
    let client = ctx.api_client(Service::Iaas)?;
    let label = iaas::security_group_label(&client, &model.project_id, &model.region, &model.group_id);
    let project_label = ctx.project_label(&model.project_id);

    ctx.confirm(&format!(
        "Are you sure you want to delete the security group {:?} for {:?}?",
        label, project_label
    ))?;
    iaas::delete_security_group(&client, &model.project_id, &model.region, &model.group_id)?;
    p.info(&format!("Deleted security group {:?} for {:?}", label, project_label));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::test_support::{debug_context, test_context, RecordingTransport, TEST_PROJECT_ID};
    use crate::services::Method;
    use clap::Parser;
    use serde_json::json;

    const GROUP_ID: &str = "dddddddd-dddd-dddd-dddd-dddddddddddd";

    #[derive(Parser, Debug)]
    struct Harness {
        #[command(subcommand)]
        cmd: SecurityGroupCommands,
    }

    fn parse(args: &[&str]) -> SecurityGroupCommands {
        Harness::try_parse_from(std::iter::once("security-group").chain(args.iter().copied()))
            .unwrap()
            .cmd
    }

    fn global() -> GlobalFlagModel {
        GlobalFlagModel {
            project_id: Some(TEST_PROJECT_ID.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_with_labels_and_stateful() {
        let SecurityGroupCommands::Create(args) = parse(&[
            "create", "--name", "web", "--labels", "env=prod,team=net", "--stateful",
        ]) else {
            panic!("expected create");
        };
        let model = parse_create_input(&args, &global()).unwrap();
        assert_eq!(model.region, "eu01");
        assert_eq!(
            serde_json::to_value(&model.payload).unwrap(),
            json!({"name": "web", "labels": {"env": "prod", "team": "net"}, "stateful": true})
        );
    }

    #[test]
    fn test_create_rejects_long_name() {
        let long = "n".repeat(NAME_MAX_LEN + 1);
        let SecurityGroupCommands::Create(args) = parse(&["create", "--name", long.as_str()]) else {
            panic!("expected create");
        };
        assert!(matches!(
            parse_create_input(&args, &global()),
            Err(CliError::ArgValidation { .. })
        ));
    }

    #[test]
    fn test_create_rejects_bad_label() {
        let SecurityGroupCommands::Create(args) = parse(&["create", "--name", "web", "--labels", "novalue"]) else {
            panic!("expected create");
        };
        assert!(matches!(
            parse_create_input(&args, &global()),
            Err(CliError::ArgValidation { .. })
        ));
    }

    #[test]
    fn test_update_requires_a_field() {
        let SecurityGroupCommands::Update(args) = parse(&["update", GROUP_ID]) else {
            panic!("expected update");
        };
        assert!(matches!(parse_update_input(&args, &global()), Err(CliError::EmptyUpdate)));
    }

    #[test]
    fn test_update_sends_patch() {
        let transport = RecordingTransport::new();
        transport.respond(200, json!({"id": GROUP_ID, "name": "web"}));
        transport.respond(200, json!({"id": GROUP_ID, "name": "web2"}));
        let (mut ctx, handles) = test_context(transport, "");
        ctx.global.assume_yes = true;

        let SecurityGroupCommands::Update(args) = parse(&["update", GROUP_ID, "--name", "web2"]) else {
            panic!("expected update");
        };
        run_update(args, &ctx).unwrap();

        let sent = handles.transport.requests();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].method, Method::Patch);
        assert!(sent[1].url.ends_with(&format!("/regions/eu01/security-groups/{}", GROUP_ID)));
        assert_eq!(sent[1].json_body().unwrap(), json!({"name": "web2"}));
        assert!(handles.err.contents().contains("Updated security group \"web\""));
    }

    #[test]
    fn test_list_table() {
        let (ctx, handles) = test_context(RecordingTransport::new(), "");
        let mut labels = BTreeMap::new();
        labels.insert("env".to_string(), json!("prod"));
        let groups = vec![SecurityGroup {
            id: GROUP_ID.into(),
            name: "web".into(),
            stateful: Some(true),
            labels,
            ..Default::default()
        }];
        output_groups(&ctx.printer, &ctx.global, &groups).unwrap();
        let out = handles.out.contents();
        assert!(out.contains("STATEFUL"));
        assert!(out.contains("env=prod"));
    }

    #[test]
    fn test_list_dumps_input_at_debug() {
        let transport = RecordingTransport::new();
        transport.respond(200, json!({"items": []}));
        let (ctx, handles) = debug_context(transport, "");
        let SecurityGroupCommands::List(args) = parse(&["list", "--label-selector", "env=prod"]) else {
            panic!("expected list");
        };

        run_list(args, &ctx).unwrap();

        let err = handles.err.contents();
        assert!(err.contains("parsed input values"));
        assert!(err.contains(r#""labelSelector":"env=prod""#));
        assert!(err.contains("No security groups found"));
        let sent = handles.transport.requests();
        assert!(sent[0].url.ends_with("/security-groups"));
    }
}
