//! `stackit project` command - projects and their members

use chrono::{DateTime, Utc};
use clap::Subcommand;
use miette::Result;
use serde::Serialize;

use crate::cli::context::CmdContext;
use crate::cli::examples::{self, Example};
use crate::cli::flags::{self, UuidList};
use crate::cli::globalflags::GlobalFlagModel;
use crate::cli::input::{self, InputModel};
use crate::cli::output::output_result;
use crate::cli::printer::Printer;
use crate::cli::table::Table;
use crate::core::errors::CliError;
use crate::services::authorization::{self, AddMembersPayload, Member, RemoveMembersPayload, PROJECT_RESOURCE_TYPE};
use crate::services::resource_manager::{self, Project, ProjectFilter};
use crate::services::{ApiClient, Service};

#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Lists STACKIT projects
    #[command(after_help = list_examples())]
    List(ListArgs),

    /// Shows details of a STACKIT project
    #[command(after_help = describe_examples())]
    Describe(DescribeArgs),

    /// Manages project members
    #[command(subcommand)]
    Member(MemberCommands),
}

#[derive(Subcommand, Debug)]
pub enum MemberCommands {
    /// Adds a member to a project
    #[command(
        long_about = "Adds a member to a project.\n\
            A member is a combination of a subject (user, service account or client) and a role.\n\
            The subject is usually email address for users or name in case of clients.",
        after_help = member_add_examples()
    )]
    Add(MemberAddArgs),

    /// Lists members of a project
    #[command(after_help = member_list_examples())]
    List(MemberListArgs),

    /// Removes a member from a project
    #[command(after_help = member_remove_examples())]
    Remove(MemberRemoveArgs),
}

fn list_examples() -> String {
    examples::build(&[
        Example::new(
            "List all STACKIT projects that the authenticated user or service account is a member of",
            ["$ stackit project list"],
        ),
        Example::new(
            "List all STACKIT projects that are children of a specific parent",
            ["$ stackit project list --parent-id xxx"],
        ),
        Example::new(
            "List all STACKIT projects that match the given project IDs, located under the same parent resource",
            ["$ stackit project list --project-id-like xxx,yyy,zzz"],
        ),
        Example::new(
            "List all STACKIT projects that a certain user is a member of",
            ["$ stackit project list --member example@email.com"],
        ),
    ])
}

fn describe_examples() -> String {
    examples::build(&[
        Example::new(
            "Get the details of the configured STACKIT project",
            ["$ stackit project describe"],
        ),
        Example::new(
            "Get the details of a STACKIT project by explicitly providing the project ID",
            ["$ stackit project describe xxx"],
        ),
        Example::new(
            "Get the details of a STACKIT project, including details of the parent resources",
            ["$ stackit project describe xxx --include-parents"],
        ),
    ])
}

fn member_add_examples() -> String {
    examples::build(&[Example::new(
        "Add a member to a project with the \"reader\" role",
        ["$ stackit project member add someone@domain.com --project-id xxx --role reader"],
    )])
}

fn member_list_examples() -> String {
    examples::build(&[
        Example::new(
            "List all members of a project",
            ["$ stackit project member list --project-id xxx"],
        ),
        Example::new(
            "List all members of a project, sorted by role",
            ["$ stackit project member list --project-id xxx --sort-by role"],
        ),
        Example::new(
            "List up to 10 members of a project",
            ["$ stackit project member list --project-id xxx --limit 10"],
        ),
    ])
}

fn member_remove_examples() -> String {
    examples::build(&[
        Example::new(
            "Remove a member (user \"someone@domain.com\" with an \"editor\" role) from a project",
            ["$ stackit project member remove someone@domain.com --project-id xxx --role editor"],
        ),
        Example::new(
            "Remove a member, even if it is the last owner",
            ["$ stackit project member remove someone@domain.com --project-id xxx --role owner --force"],
        ),
    ])
}

const DEFAULT_PAGE_SIZE: i64 = 50;
const SORT_BY: &[&str] = &["subject", "role"];

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Filter by parent identifier
    #[arg(long)]
    pub parent_id: Option<String>,

    /// Filter by project identifier. Multiple project IDs can be provided, but they need to belong to the same parent resource
    #[arg(long, value_parser = flags::uuid_list)]
    pub project_id_like: Option<UuidList>,

    /// Filter by member. The list of projects of the member will be shown
    #[arg(long)]
    pub member: Option<String>,

    /// Filter by creation timestamp, in a date-time with the RFC3339 layout format, e.g. 2023-01-01T00:00:00Z
    #[arg(long, value_parser = flags::date_time)]
    pub creation_time_after: Option<DateTime<Utc>>,

    /// Maximum number of entries to list
    #[arg(long, allow_negative_numbers = true)]
    pub limit: Option<i64>,

    /// Number of items fetched in each API call. Does not affect the number of items in the command output
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, allow_negative_numbers = true)]
    pub page_size: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListInput {
    #[serde(flatten)]
    pub global: GlobalFlagModel,
    pub parent_id: Option<String>,
    pub project_id_like: Vec<String>,
    pub member: Option<String>,
    pub creation_time_after: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub page_size: i64,
}

impl InputModel for ListInput {}

/// `authenticated_email` stands in for `--member` when no filter is given
pub fn parse_list_input(
    args: &ListArgs,
    global: &GlobalFlagModel,
    authenticated_email: Option<String>,
) -> Result<ListInput, CliError> {
    let limit = input::positive_limit("limit", args.limit)?;
    let page_size = input::page_size("page-size", args.page_size)?;
    let project_id_like = args.project_id_like.clone().unwrap_or_default().0;

    let mut member = args.member.clone();
    if args.parent_id.is_none() && project_id_like.is_empty() && member.is_none() {
        member = authenticated_email;
    }
    if args.parent_id.is_none() && project_id_like.is_empty() && member.is_none() {
        return Err(CliError::flag(
            "member",
            "at least one of --parent-id, --project-id-like or --member must be provided",
        ));
    }

    Ok(ListInput {
        global: global.clone(),
        parent_id: args.parent_id.clone(),
        project_id_like,
        member,
        creation_time_after: args.creation_time_after,
        limit,
        page_size,
    })
}

/// Page through the listing until `limit` is reached or a short page arrives
pub fn fetch_projects(client: &ApiClient, model: &ListInput) -> Result<Vec<Project>, CliError> {
    let filter = ProjectFilter {
        parent_id: model.parent_id.clone(),
        project_ids: model.project_id_like.clone(),
        member: model.member.clone(),
        creation_time_after: model.creation_time_after,
    };
    let mut projects = Vec::new();
    let mut offset = 0;
    loop {
        let page = resource_manager::list_projects(client, &filter, offset, model.page_size)?;
        let received = page.items.len() as i64;
        projects.extend(page.items);
        if received < model.page_size {
            break;
        }
        if model.limit.is_some_and(|l| projects.len() as i64 >= l) {
            break;
        }
        offset += received;
    }
    if let Some(limit) = model.limit {
        projects.truncate(limit as usize);
    }
    Ok(projects)
}

fn run_list(args: ListArgs, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let email = ctx
        .credentials
        .load()
        .ok()
        .flatten()
        .and_then(|c| c.service_account_email);
    let model = parse_list_input(&args, &ctx.global, email)?.finish(p);

    let client = ctx.api_client(Service::ResourceManager)?;
    let projects = {
        let _spinner = p.spinner("Listing projects");
        fetch_projects(&client, &model)?
    };

    if projects.is_empty() {
        p.info("No projects found matching the criteria");
        return Ok(());
    }
    output_projects(p, &ctx.global, &projects)
}

pub fn output_projects(p: &Printer, global: &GlobalFlagModel, projects: &[Project]) -> Result<()> {
    output_result(p, global.output_format, projects, |p| {
        let mut table = Table::new();
        table.set_header(["ID", "NAME", "STATE", "PARENT ID"]);
        for project in projects {
            let parent = project
                .parent
                .as_ref()
                .map(|parent| parent.id.clone())
                .unwrap_or_default();
            table.add_row([
                project.project_id.clone(),
                project.name.clone(),
                project.lifecycle_state.clone(),
                parent,
            ]);
        }
        table.display(p);
        Ok(())
    })
}

#[derive(clap::Args, Debug)]
pub struct DescribeArgs {
    /// Project ID; defaults to the configured project
    #[arg(value_name = "PROJECT_ID")]
    pub project: Option<String>,

    /// When true, the details of the parent resources will be included in the output
    #[arg(long)]
    pub include_parents: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeInput {
    #[serde(flatten)]
    pub global: GlobalFlagModel,
    pub project_id: String,
    pub include_parents: bool,
}

impl InputModel for DescribeInput {}

pub fn parse_describe_input(args: &DescribeArgs, global: &GlobalFlagModel) -> Result<DescribeInput, CliError> {
    let project_id = match &args.project {
        Some(id) => flags::uuid(id).map_err(|e| CliError::arg(id, e.to_string()))?,
        None => input::project_id(global)?,
    };
    Ok(DescribeInput {
        global: global.clone(),
        project_id,
        include_parents: args.include_parents,
    })
}

fn run_describe(args: DescribeArgs, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_describe_input(&args, &ctx.global)?.finish(p);
    let client = ctx.api_client(Service::ResourceManager)?;
    let project = resource_manager::get_project(&client, &model.project_id, model.include_parents)?;

    output_result(p, ctx.global.output_format, &project, |p| {
        let parent = project
            .parent
            .as_ref()
            .map(|parent| parent.id.clone())
            .unwrap_or_default();
        let mut table = Table::new();
        for (name, value) in [
            ("ID", project.project_id.clone()),
            ("NAME", project.name.clone()),
            ("CREATION", project.creation_time.clone().unwrap_or_default()),
            ("STATE", project.lifecycle_state.clone()),
            ("PARENT ID", parent),
        ] {
            table.add_row([name.to_string(), value]);
            table.add_separator();
        }
        if model.include_parents {
            let chain: Vec<String> = project.parents.iter().map(|p| p.id.clone()).collect();
            table.add_row(["PARENTS".to_string(), chain.join(", ")]);
        }
        table.display(p);
        Ok(())
    })
}

#[derive(clap::Args, Debug)]
pub struct MemberAddArgs {
    /// Subject: user email, service account email or client name
    pub subject: String,

    /// The role to add to the subject
    #[arg(long, short = 'r', required = true)]
    pub role: String,
}

#[derive(clap::Args, Debug)]
pub struct MemberListArgs {
    /// Filter by subject (the identifier of a user, service account or client)
    #[arg(long)]
    pub subject: Option<String>,

    /// Maximum number of entries to list
    #[arg(long, allow_negative_numbers = true)]
    pub limit: Option<i64>,

    /// Sort entries by a specific field
    #[arg(long, default_value = "subject", value_parser = flags::enum_parser(SORT_BY, false))]
    pub sort_by: String,
}

#[derive(clap::Args, Debug)]
pub struct MemberRemoveArgs {
    /// Subject whose role is removed
    pub subject: String,

    /// The role to be removed from the subject
    #[arg(long, short = 'r', required = true)]
    pub role: String,

    /// When true, removes other roles of the subject that would block removal of the requested role
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberInput {
    #[serde(flatten)]
    pub global: GlobalFlagModel,
    pub project_id: String,
    pub subject: String,
    pub role: String,
    pub force: bool,
}

impl InputModel for MemberInput {}

fn parse_member_input(
    global: &GlobalFlagModel,
    subject: &str,
    role: &str,
    force: bool,
) -> Result<MemberInput, CliError> {
    let project_id = input::project_id(global)?;
    if role.trim().is_empty() {
        return Err(CliError::flag("role", "must not be empty"));
    }
    Ok(MemberInput {
        global: global.clone(),
        project_id,
        subject: subject.to_string(),
        role: role.to_string(),
        force,
    })
}

pub fn build_add_payload(model: &MemberInput) -> AddMembersPayload {
    AddMembersPayload {
        members: vec![Member {
            subject: model.subject.clone(),
            role: model.role.clone(),
        }],
        resource_type: PROJECT_RESOURCE_TYPE.to_string(),
    }
}

pub fn build_remove_payload(model: &MemberInput) -> RemoveMembersPayload {
    RemoveMembersPayload {
        members: vec![Member {
            subject: model.subject.clone(),
            role: model.role.clone(),
        }],
        resource_type: PROJECT_RESOURCE_TYPE.to_string(),
        force_remove: model.force.then_some(true),
    }
}

fn run_member_add(args: MemberAddArgs, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_member_input(&ctx.global, &args.subject, &args.role, false)?.finish(p);
    let client = ctx.api_client(Service::Authorization)?;
    let label = ctx.project_label(&model.project_id);

    ctx.confirm(&format!(
        "Are you sure you want to add the role {:?} to {} on project {:?}?",
        model.role, model.subject, label
    ))?;
    authorization::add_members(&client, &model.project_id, &build_add_payload(&model))?;

    p.info(&format!(
        "Added the role {:?} to {} on project {:?}",
        model.role, model.subject, label
    ));
    Ok(())
}

fn run_member_remove(args: MemberRemoveArgs, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_member_input(&ctx.global, &args.subject, &args.role, args.force)?.finish(p);
    let client = ctx.api_client(Service::Authorization)?;
    let label = ctx.project_label(&model.project_id);

    let mut prompt = format!(
        "Are you sure you want to remove the role {:?} from {} on project {:?}?",
        model.role, model.subject, label
    );
    if model.force {
        prompt.push_str(
            " This will also remove other roles of the subject that would stop the removal of the requested role",
        );
    }
    ctx.confirm(&prompt)?;
    authorization::remove_members(&client, &model.project_id, &build_remove_payload(&model))?;

    p.info(&format!(
        "Removed the role {:?} from {} on project {:?}",
        model.role, model.subject, label
    ));
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberListInput {
    #[serde(flatten)]
    pub global: GlobalFlagModel,
    pub project_id: String,
    pub subject: Option<String>,
    pub limit: Option<i64>,
    pub sort_by: String,
}

impl InputModel for MemberListInput {}

pub fn parse_member_list_input(args: &MemberListArgs, global: &GlobalFlagModel) -> Result<MemberListInput, CliError> {
    Ok(MemberListInput {
        global: global.clone(),
        project_id: input::project_id(global)?,
        subject: args.subject.clone(),
        limit: input::positive_limit("limit", args.limit)?,
        sort_by: args.sort_by.clone(),
    })
}

/// Sort by the chosen field (ties broken by the other), then apply the limit
pub fn sort_members(mut members: Vec<Member>, sort_by: &str, limit: Option<i64>) -> Vec<Member> {
    if sort_by == "role" {
        members.sort_by(|a, b| a.role.cmp(&b.role).then_with(|| a.subject.cmp(&b.subject)));
    } else {
        members.sort_by(|a, b| a.subject.cmp(&b.subject).then_with(|| a.role.cmp(&b.role)));
    }
    if let Some(limit) = limit {
        members.truncate(limit as usize);
    }
    members
}

/// Groups are separated by a rule and the sort column is merged
pub fn members_table(members: &[Member], sort_by: &str) -> Table {
    let key = |m: &Member| {
        if sort_by == "role" {
            m.role.clone()
        } else {
            m.subject.clone()
        }
    };
    let mut table = Table::new();
    table.set_header(["SUBJECT", "ROLE"]);
    for (i, member) in members.iter().enumerate() {
        if i > 0 && key(&members[i - 1]) != key(member) {
            table.add_separator();
        }
        table.add_row([member.subject.clone(), member.role.clone()]);
    }
    let merged: &[usize] = if sort_by == "role" { &[2] } else { &[1] };
    table.enable_auto_merge_on_columns(merged);
    table
}

fn run_member_list(args: MemberListArgs, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_member_list_input(&args, &ctx.global)?.finish(p);
    let client = ctx.api_client(Service::Authorization)?;

    let resp = authorization::list_members(
        &client,
        PROJECT_RESOURCE_TYPE,
        &model.project_id,
        model.subject.as_deref(),
    )?;
    if resp.members.is_empty() {
        p.info(&format!(
            "No members found for project {:?}",
            ctx.project_label(&model.project_id)
        ));
        return Ok(());
    }

    let members = sort_members(resp.members, &model.sort_by, model.limit);
    output_result(p, ctx.global.output_format, &members, |p| {
        members_table(&members, &model.sort_by).display(p);
        Ok(())
    })
}

pub fn run(cmd: ProjectCommands, ctx: &CmdContext) -> Result<()> {
    match cmd {
        ProjectCommands::List(args) => run_list(args, ctx),
        ProjectCommands::Describe(args) => run_describe(args, ctx),
        ProjectCommands::Member(MemberCommands::Add(args)) => run_member_add(args, ctx),
        ProjectCommands::Member(MemberCommands::List(args)) => run_member_list(args, ctx),
        ProjectCommands::Member(MemberCommands::Remove(args)) => run_member_remove(args, ctx),
    }
}
