//! Usage examples shown at the end of a leaf command's help

/// One example: a description and the commands that illustrate it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    description: String,
    commands: Vec<String>,
}

impl Example {
    pub fn new<I, S>(description: &str, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            description: description.to_string(),
            commands: commands.into_iter().map(Into::into).collect(),
        }
    }
}

/// Render examples as an `Examples:` block for clap's `after_help`
pub fn build(examples: &[Example]) -> String {
    let mut out = String::from("Examples:");
    for ex in examples {
        out.push_str("\n  ");
        out.push_str(&ex.description);
        for cmd in &ex.commands {
            out.push_str("\n  ");
            out.push_str(cmd);
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_examples() {
        let text = build(&[
            Example::new(
                "List all zones",
                ["$ stackit dns zone list"],
            ),
            Example::new(
                "Create then inspect",
                ["$ stackit dns zone create --name a --dns-name a.com", "$ stackit dns zone list"],
            ),
        ]);
        assert_eq!(
            text,
            "Examples:\n  List all zones\n  $ stackit dns zone list\n\n  Create then inspect\n  \
             $ stackit dns zone create --name a --dns-name a.com\n  $ stackit dns zone list"
        );
    }
}
