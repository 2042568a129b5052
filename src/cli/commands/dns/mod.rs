//! `stackit dns` command - DNS zones and record sets

mod record_set;
mod zone;

use clap::Subcommand;
use miette::Result;
use serde::Serialize;

use crate::cli::context::CmdContext;
use crate::cli::flags;
use crate::cli::input;
use crate::core::errors::CliError;

pub use record_set::RecordSetCommands;
pub use zone::ZoneCommands;

#[derive(Subcommand, Debug)]
pub enum DnsCommands {
    /// Provides functionality for DNS zones
    #[command(subcommand)]
    Zone(ZoneCommands),

    /// Provides functionality for DNS record sets
    #[command(subcommand)]
    RecordSet(RecordSetCommands),
}

pub fn run(cmd: DnsCommands, ctx: &CmdContext) -> Result<()> {
    match cmd {
        DnsCommands::Zone(cmd) => zone::run(cmd, ctx),
        DnsCommands::RecordSet(cmd) => record_set::run(cmd, ctx),
    }
}

const ORDER_BY_NAME: &[&str] = &["asc", "desc"];
const DEFAULT_PAGE_SIZE: i64 = 100;

/// Filters shared by `zone list` and `record-set list`
#[derive(clap::Args, Debug, Clone)]
pub struct ListFilterArgs {
    /// Filter for active resources
    #[arg(long, conflicts_with = "inactive")]
    pub active: bool,

    /// Filter for inactive resources
    #[arg(long)]
    pub inactive: bool,

    /// Filter by name
    #[arg(long)]
    pub name_like: Option<String>,

    /// Order by name, one of "asc", "desc"
    #[arg(long, value_parser = flags::enum_parser(ORDER_BY_NAME, true))]
    pub order_by_name: Option<String>,

    /// Maximum number of entries to list
    #[arg(long, allow_negative_numbers = true)]
    pub limit: Option<i64>,

    /// Number of items fetched in each API call. Does not affect the number of items in the command output
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, allow_negative_numbers = true)]
    pub page_size: i64,
}

/// Validated list filters
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilterInput {
    pub active: bool,
    pub inactive: bool,
    pub name_like: Option<String>,
    pub order_by_name: Option<String>,
    pub limit: Option<i64>,
    pub page_size: i64,
}

impl ListFilterArgs {
    pub fn parse(&self) -> Result<ListFilterInput, CliError> {
        Ok(ListFilterInput {
            active: self.active,
            inactive: self.inactive,
            name_like: self.name_like.clone(),
            order_by_name: self.order_by_name.clone(),
            limit: input::positive_limit("limit", self.limit)?,
            page_size: input::page_size("page-size", self.page_size)?,
        })
    }
}

impl ListFilterInput {
    fn active_filter(&self) -> Option<bool> {
        if self.active {
            Some(true)
        } else if self.inactive {
            Some(false)
        } else {
            None
        }
    }

    /// Page size actually requested: never more than the limit
    fn effective_page_size(&self) -> i64 {
        match self.limit {
            Some(limit) if limit < self.page_size => limit,
            _ => self.page_size,
        }
    }
}

/// Fetch 1-based pages until an empty or short page, or until `limit` is reached
pub(crate) fn fetch_pages<T>(
    filter: &ListFilterInput,
    mut fetch: impl FnMut(i64, i64) -> Result<Vec<T>, CliError>,
) -> Result<Vec<T>, CliError> {
    let page_size = filter.effective_page_size();
    let mut items = Vec::new();
    let mut page = 1;
    loop {
        let batch = fetch(page, page_size)?;
        if batch.is_empty() {
            break;
        }
        let short = (batch.len() as i64) < page_size;
        items.extend(batch);
        if let Some(limit) = filter.limit {
            if items.len() as i64 >= limit {
                items.truncate(limit as usize);
                break;
            }
        }
        if short {
            break;
        }
        page += 1;
    }
    Ok(items)
}
