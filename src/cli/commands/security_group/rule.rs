//! `stackit security-group rule` - rules of a security group

use clap::Subcommand;
use ipnet::IpNet;
use miette::Result;
use serde::Serialize;

use crate::cli::context::CmdContext;
use crate::cli::examples::{self, Example};
use crate::cli::flags;
use crate::cli::globalflags::GlobalFlagModel;
use crate::cli::input::{self, InputModel};
use crate::cli::output::output_result;
use crate::cli::printer::Printer;
use crate::cli::table::Table;
use crate::core::errors::CliError;
use crate::services::iaas::{
    self, CreateProtocol, CreateSecurityGroupRulePayload, IcmpParameters, PortRange,
    SecurityGroupRule,
};
use crate::services::Service;

const DIRECTIONS: &[&str] = &["ingress", "egress"];
const ETHER_TYPES: &[&str] = &["IPv4", "IPv6"];
const ICMP_NAMES: &[&str] = &["icmp", "ipv6-icmp"];
const ICMP_NUMBERS: &[i64] = &[1, 58];

#[derive(Subcommand, Debug)]
pub enum RuleCommands {
    /// Creates a security group rule
    #[command(after_help = create_examples())]
    Create(CreateArgs),

    /// Lists all security group rules in a security group of a project
    #[command(after_help = examples::build(&[
        Example::new(
            "List all rules in security group with ID \"xxx\"",
            ["$ stackit security-group rule list --security-group-id xxx"],
        ),
        Example::new(
            "List up to 10 rules in security group with ID \"xxx\"",
            ["$ stackit security-group rule list --security-group-id xxx --limit 10"],
        ),
    ]))]
    List(ListArgs),

    /// Shows details of a security group rule
    #[command(after_help = examples::build(&[Example::new(
        "Show details of a security group rule with ID \"xxx\" in security group with ID \"yyy\"",
        ["$ stackit security-group rule describe xxx --security-group-id yyy"],
    )]))]
    Describe(RuleIdArgs),

    /// Deletes a security group rule
    #[command(after_help = examples::build(&[Example::new(
        "Delete security group rule with ID \"xxx\" in security group with ID \"yyy\"",
        ["$ stackit security-group rule delete xxx --security-group-id yyy"],
    )]))]
    Delete(RuleIdArgs),
}

fn create_examples() -> String {
    examples::build(&[
        Example::new(
            "Create a security group rule for security group with ID \"xxx\" with direction \"ingress\"",
            ["$ stackit security-group rule create --security-group-id xxx --direction ingress"],
        ),
        Example::new(
            "Create a security group rule for security group with ID \"xxx\" with direction \"egress\", protocol \"icmp\" and icmp parameters",
            ["$ stackit security-group rule create --security-group-id xxx --direction egress --protocol-name icmp --icmp-parameter-code 0 --icmp-parameter-type 8"],
        ),
        Example::new(
            "Create a security group rule for security group with ID \"xxx\" with direction \"ingress\", protocol \"tcp\" and port range values",
            ["$ stackit security-group rule create --security-group-id xxx --direction ingress --protocol-name tcp --port-range-max 24 --port-range-min 22"],
        ),
    ])
}

#[derive(clap::Args, Debug)]
pub struct CreateArgs {
    /// The security group ID
    #[arg(long, required = true, value_parser = flags::uuid)]
    pub security_group_id: String,

    /// The direction of the traffic which the rule should match
    #[arg(long, required = true, value_parser = flags::enum_parser(DIRECTIONS, false))]
    pub direction: String,

    /// The rule description
    #[arg(long)]
    pub description: Option<String>,

    /// The ethertype which the rule should match
    #[arg(long, value_parser = flags::enum_parser(ETHER_TYPES, false))]
    pub ether_type: Option<String>,

    /// ICMP code. Can be set if the protocol is ICMP
    #[arg(long)]
    pub icmp_parameter_code: Option<i64>,

    /// ICMP type. Can be set if the protocol is ICMP
    #[arg(long)]
    pub icmp_parameter_type: Option<i64>,

    /// The remote IP range which the rule should match
    #[arg(long, value_parser = flags::cidr)]
    pub ip_range: Option<IpNet>,

    /// The maximum port number. Should be greater or equal to the minimum
    #[arg(long)]
    pub port_range_max: Option<i64>,

    /// The minimum port number. Should be less or equal to the maximum
    #[arg(long)]
    pub port_range_min: Option<i64>,

    /// The remote security group which the rule should match
    #[arg(long, value_parser = flags::uuid)]
    pub remote_security_group_id: Option<String>,

    /// The protocol number which the rule should match
    #[arg(long)]
    pub protocol_number: Option<i64>,

    /// The protocol name which the rule should match. Takes precedence over --protocol-number
    #[arg(long)]
    pub protocol_name: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// The security group ID
    #[arg(long, required = true, value_parser = flags::uuid)]
    pub security_group_id: String,

    /// Maximum number of entries to list
    #[arg(long, allow_negative_numbers = true)]
    pub limit: Option<i64>,
}

#[derive(clap::Args, Debug)]
pub struct RuleIdArgs {
    /// Security group rule ID
    #[arg(value_name = "SECURITY_GROUP_RULE_ID", value_parser = flags::uuid)]
    pub rule_id: String,

    /// The security group ID
    #[arg(long, required = true, value_parser = flags::uuid)]
    pub security_group_id: String,
}

pub fn run(cmd: RuleCommands, ctx: &CmdContext) -> Result<()> {
    match cmd {
        RuleCommands::Create(args) => run_create(args, ctx),
        RuleCommands::List(args) => run_list(args, ctx),
        RuleCommands::Describe(args) => run_describe(args, ctx),
        RuleCommands::Delete(args) => run_delete(args, ctx),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInput {
    #[serde(flatten)]
    pub global: GlobalFlagModel,
    pub project_id: String,
    pub region: String,
    pub security_group_id: String,
    pub payload: CreateSecurityGroupRulePayload,
}

impl InputModel for CreateInput {}

fn is_icmp(args: &CreateArgs) -> bool {
    let by_name = args
        .protocol_name
        .as_deref()
        .is_some_and(|name| ICMP_NAMES.iter().any(|n| n.eq_ignore_ascii_case(name)));
    let by_number = args
        .protocol_number
        .is_some_and(|number| ICMP_NUMBERS.contains(&number));
    by_name || by_number
}

/// Cross-field rules the API would otherwise reject after the prompt
fn check_rule_fields(args: &CreateArgs) -> Result<(), CliError> {
    let icmp = is_icmp(args);
    let has_icmp_params = args.icmp_parameter_code.is_some() || args.icmp_parameter_type.is_some();
    let has_port_range = args.port_range_min.is_some() || args.port_range_max.is_some();

    if has_icmp_params && !icmp {
        return Err(CliError::Conflict(
            "ICMP parameters can only be set if the protocol is ICMP".to_string(),
        ));
    }
    if has_port_range && icmp {
        return Err(CliError::Conflict(
            "a port range cannot be set if the protocol is ICMP".to_string(),
        ));
    }
    if let (Some(min), Some(max)) = (args.port_range_min, args.port_range_max) {
        if min > max {
            return Err(CliError::Conflict(format!(
                "port-range-min must not exceed port-range-max ({} > {})",
                min, max
            )));
        }
    }
    Ok(())
}

pub fn parse_create_input(args: &CreateArgs, global: &GlobalFlagModel) -> Result<CreateInput, CliError> {
    let project_id = input::project_id(global)?;
    check_rule_fields(args)?;
    Ok(CreateInput {
        global: global.clone(),
        project_id,
        region: global.region_or_default().to_string(),
        security_group_id: args.security_group_id.clone(),
        payload: build_create_payload(args),
    })
}

pub fn build_create_payload(args: &CreateArgs) -> CreateSecurityGroupRulePayload {
    let icmp_parameters = (args.icmp_parameter_code.is_some() || args.icmp_parameter_type.is_some())
        .then(|| IcmpParameters {
            code: args.icmp_parameter_code,
            icmp_type: args.icmp_parameter_type,
        });
    let port_range = (args.port_range_min.is_some() || args.port_range_max.is_some()).then(|| PortRange {
        min: args.port_range_min,
        max: args.port_range_max,
    });
    let protocol = match (&args.protocol_name, args.protocol_number) {
        (Some(name), _) => Some(CreateProtocol::Name(name.clone())),
        (None, Some(number)) => Some(CreateProtocol::Number(number)),
        (None, None) => None,
    };
    CreateSecurityGroupRulePayload {
        direction: args.direction.clone(),
        description: args.description.clone(),
        ethertype: args.ether_type.clone(),
        icmp_parameters,
        ip_range: args.ip_range.map(|net| net.to_string()),
        port_range,
        protocol,
        remote_security_group_id: args.remote_security_group_id.clone(),
    }
}

fn run_create(args: CreateArgs, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_create_input(&args, &ctx.global)?.finish(p);
    let client = ctx.api_client(Service::Iaas)?;
    let project_label = ctx.project_label(&model.project_id);
    let group_label =
        iaas::security_group_label(&client, &model.project_id, &model.region, &model.security_group_id);

    ctx.confirm(&format!(
        "Are you sure you want to create a security group rule for security group {:?} for project {:?}?",
        group_label, project_label
    ))?;
    let rule = iaas::create_security_group_rule(
        &client,
        &model.project_id,
        &model.region,
        &model.security_group_id,
        &model.payload,
    )?;

    output_result(p, ctx.global.output_format, &rule, |p| {
        p.outputln(&format!(
            "{} security group rule for security group {:?} in project {:?}.\nSecurity group rule ID: {}",
            ctx.operation_state("Created", "Triggered creation of"),
            group_label,
            project_label,
            rule.id
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
    pub security_group_id: String,
    pub limit: Option<i64>,
}

impl InputModel for ListInput {}

pub fn parse_list_input(args: &ListArgs, global: &GlobalFlagModel) -> Result<ListInput, CliError> {
    Ok(ListInput {
        global: global.clone(),
        project_id: input::project_id(global)?,
        region: global.region_or_default().to_string(),
        security_group_id: args.security_group_id.clone(),
        limit: input::positive_limit("limit", args.limit)?,
    })
}

fn run_list(args: ListArgs, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_list_input(&args, &ctx.global)?.finish(p);
    let client = ctx.api_client(Service::Iaas)?;

    let mut rules =
        iaas::list_security_group_rules(&client, &model.project_id, &model.region, &model.security_group_id)?
            .items;
    if rules.is_empty() {
        let group_label =
            iaas::security_group_label(&client, &model.project_id, &model.region, &model.security_group_id);
        p.info(&format!(
            "No rules found in security group {:?} for project {:?}",
            group_label,
            ctx.project_label(&model.project_id)
        ));
        return Ok(());
    }
    if let Some(limit) = model.limit {
        rules.truncate(limit as usize);
    }
    output_rules(p, &ctx.global, &rules)
}

fn protocol_name(rule: &SecurityGroupRule) -> String {
    rule.protocol
        .as_ref()
        .and_then(|p| p.name.clone())
        .unwrap_or_default()
}

pub fn output_rules(p: &Printer, global: &GlobalFlagModel, rules: &[SecurityGroupRule]) -> Result<()> {
    output_result(p, global.output_format, rules, |p| {
        let mut table = Table::new();
        table.set_header(["ID", "ETHER TYPE", "DIRECTION", "PROTOCOL", "REMOTE SECURITY GROUP ID"]);
        for rule in rules {
            table.add_row([
                rule.id.clone(),
                rule.ethertype.clone().unwrap_or_default(),
                rule.direction.clone(),
                protocol_name(rule),
                rule.remote_security_group_id.clone().unwrap_or_default(),
            ]);
            table.add_separator();
        }
        table.display(p);
        Ok(())
    })
}

/// Describe and delete address one rule of one group
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleInput {
    #[serde(flatten)]
    pub global: GlobalFlagModel,
    pub project_id: String,
    pub region: String,
    pub security_group_id: String,
    pub security_group_rule_id: String,
}

impl InputModel for RuleInput {}

pub fn parse_rule_input(args: &RuleIdArgs, global: &GlobalFlagModel) -> Result<RuleInput, CliError> {
    Ok(RuleInput {
        global: global.clone(),
        project_id: input::project_id(global)?,
        region: global.region_or_default().to_string(),
        security_group_id: args.security_group_id.clone(),
        security_group_rule_id: args.rule_id.clone(),
    })
}

fn run_describe(args: RuleIdArgs, ctx: &CmdContext) -> Result<()> {
    let model = parse_rule_input(&args, &ctx.global)?.finish(&ctx.printer);
    let client = ctx.api_client(Service::Iaas)?;
    let rule = iaas::get_security_group_rule(
        &client,
        &model.project_id,
        &model.region,
        &model.security_group_id,
        &model.security_group_rule_id,
    )?;
    output_rule_details(&ctx.printer, &ctx.global, &rule)
}

pub fn output_rule_details(p: &Printer, global: &GlobalFlagModel, rule: &SecurityGroupRule) -> Result<()> {
    output_result(p, global.output_format, rule, |p| {
        let mut rows: Vec<(&str, String)> = vec![("ID", rule.id.clone())];
        if let Some(protocol) = &rule.protocol {
            if let Some(name) = &protocol.name {
                rows.push(("PROTOCOL NAME", name.clone()));
            }
            if let Some(number) = protocol.number {
                rows.push(("PROTOCOL NUMBER", number.to_string()));
            }
        }
        rows.push(("DIRECTION", rule.direction.clone()));
        if let Some(range) = &rule.port_range {
            if let Some(min) = range.min {
                rows.push(("START PORT", min.to_string()));
            }
            if let Some(max) = range.max {
                rows.push(("END PORT", max.to_string()));
            }
        }
        if let Some(ethertype) = &rule.ethertype {
            rows.push(("ETHER TYPE", ethertype.clone()));
        }
        if let Some(ip_range) = &rule.ip_range {
            rows.push(("IP RANGE", ip_range.clone()));
        }
        if let Some(remote) = &rule.remote_security_group_id {
            rows.push(("REMOTE SECURITY GROUP", remote.clone()));
        }

        let mut table = Table::new();
        for (name, value) in rows {
            table.add_row([name.to_string(), value]);
            table.add_separator();
        }
        table.display(p);
        Ok(())
    })
}

fn run_delete(args: RuleIdArgs, ctx: &CmdContext) -> Result<()> {
    let p = &ctx.printer;
    let model = parse_rule_input(&args, &ctx.global)?.finish(p);
    let client = ctx.api_client(Service::Iaas)?;
    let group_label =
        iaas::security_group_label(&client, &model.project_id, &model.region, &model.security_group_id);

    ctx.confirm(&format!(
        "Are you sure you want to delete security group rule {:?} from security group {:?}?",
        model.security_group_rule_id, group_label
    ))?;
    iaas::delete_security_group_rule(
        &client,
        &model.project_id,
        &model.region,
        &model.security_group_id,
        &model.security_group_rule_id,
    )?;
    p.info(&format!(
        "Deleted security group rule {:?} from security group {:?}",
        model.security_group_rule_id, group_label
    ));
    Ok(())
}
