//! `stackit beta` command - services still in beta

mod alb;

use clap::Subcommand;
use miette::Result;

use crate::cli::context::CmdContext;

pub use alb::AlbCommands;

#[derive(Subcommand, Debug)]
pub enum BetaCommands {
    /// Manages application loadbalancers
    #[command(subcommand)]
    Alb(AlbCommands),
}

pub fn run(cmd: BetaCommands, ctx: &CmdContext) -> Result<()> {
    ctx.printer
        .warn("This command is in beta and may change in the future without notice.");
    match cmd {
        BetaCommands::Alb(cmd) => alb::run(cmd, ctx),
    }
}
