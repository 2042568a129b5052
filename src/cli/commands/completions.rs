//! `stackit completions` - shell completion scripts
//!
//! ```bash
//! # Bash - add to ~/.bashrc
//! source <(stackit completions bash)
//!
//! # Fish
//! stackit completions fish > ~/.config/fish/completions/stackit.fish
//! ```

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use miette::Result;
use std::io::Write;

use crate::cli::context::CmdContext;
use crate::cli::examples::{self, Example};
use crate::cli::Cli;

#[derive(clap::Args, Debug)]
#[command(after_help = examples::build(&[
    Example::new("Load completions into the current bash session", ["$ source <(stackit completions bash)"]),
    Example::new(
        "Install completions for zsh",
        ["$ stackit completions zsh > \"${fpath[1]}/_stackit\""],
    ),
]))]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Completion script for the whole command tree
pub fn script(shell: Shell) -> Vec<u8> {
    let mut cmd = Cli::command();
    let mut buf = Vec::new();
    generate(shell, &mut cmd, "stackit", &mut buf);
    buf
}

pub fn run(args: CompletionsArgs, ctx: &CmdContext) -> Result<()> {
    ctx.printer.debug(&format!("generating {} completions", args.shell));
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&script(args.shell))
        .and_then(|_| stdout.flush())
        .map_err(|e| crate::core::errors::CliError::io("write completion script", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bash_script_names_binary() {
        let script = String::from_utf8(script(Shell::Bash)).unwrap();
        assert!(script.contains("stackit"));
        assert!(script.contains("security-group"));
    }

    #[test]
    fn test_fish_script_lists_subcommands() {
        let script = String::from_utf8(script(Shell::Fish)).unwrap();
        assert!(script.contains("object-storage"));
    }
}
