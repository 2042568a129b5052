//! Printer: the single sink for command output and diagnostics
//!
//! Output goes to stdout, everything else (info, warnings, errors, debug
//! messages, prompts and the spinner) goes to stderr.

use console::{style, Term};
use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::cell::RefCell;
use std::io::{BufRead, IsTerminal, Write};
use std::time::Duration;

use crate::cli::args::Verbosity;
use crate::core::errors::CliError;

/// Field names whose values never appear in debug dumps
const SENSITIVE_FIELDS: &[&str] = &[
    "password",
    "token",
    "secret",
    "private_key",
    "privatekey",
    "credentials",
    "authorization",
];

const MAX_PROMPT_ATTEMPTS: usize = 3;

pub struct Printer {
    verbosity: Verbosity,
    out: RefCell<Box<dyn Write>>,
    err: RefCell<Box<dyn Write>>,
    input: RefCell<Box<dyn BufRead>>,
    spinner: RefCell<Option<ProgressBar>>,
    draw_spinner: bool,
    /// Prompts go through dialoguer when both stdin and stderr are terminals
    interactive: bool,
}

impl Printer {
    /// Printer bound to the process standard streams
    pub fn stdio(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            out: RefCell::new(Box::new(std::io::stdout())),
            err: RefCell::new(Box::new(std::io::stderr())),
            input: RefCell::new(Box::new(std::io::BufReader::new(std::io::stdin()))),
            spinner: RefCell::new(None),
            draw_spinner: Term::stderr().is_term(),
            interactive: Term::stderr().is_term() && std::io::stdin().is_terminal(),
        }
    }

    /// Printer over arbitrary streams; the spinner is never drawn
    pub fn with_io(
        verbosity: Verbosity,
        out: Box<dyn Write>,
        err: Box<dyn Write>,
        input: Box<dyn BufRead>,
    ) -> Self {
        Self {
            verbosity,
            out: RefCell::new(out),
            err: RefCell::new(err),
            input: RefCell::new(input),
            spinner: RefCell::new(None),
            draw_spinner: false,
            interactive: false,
        }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub fn is_debug(&self) -> bool {
        self.verbosity == Verbosity::Debug
    }

    /// Write a line to stdout
    pub fn outputln(&self, msg: &str) {
        let mut out = self.out.borrow_mut();
        let _ = writeln!(out, "{}", msg);
        let _ = out.flush();
    }

    /// Write raw text to stdout, without appending a newline
    pub fn output(&self, msg: &str) {
        let mut out = self.out.borrow_mut();
        let _ = write!(out, "{}", msg);
        let _ = out.flush();
    }

    /// Informational message, always shown
    pub fn info(&self, msg: &str) {
        self.write_err(msg);
    }

    /// Warning, shown unless verbosity is `error`
    pub fn warn(&self, msg: &str) {
        if self.verbosity >= Verbosity::Warning {
            self.write_err(&format!("{} {}", style("Warning:").yellow().bold(), msg));
        }
    }

    /// Error message, always shown
    pub fn error(&self, msg: &str) {
        self.write_err(&format!("{} {}", style("Error:").red().bold(), msg));
    }

    /// Debug message, only shown at `debug` verbosity
    pub fn debug(&self, msg: &str) {
        if self.is_debug() {
            self.write_err(&format!("{} {}", style("[DEBUG]").dim(), msg));
        }
    }

    /// Dump a parsed input model at debug verbosity, hiding sensitive fields
    pub fn debug_input_model<T: Serialize>(&self, model: &T) {
        if !self.is_debug() {
            return;
        }
        match serde_json::to_value(model) {
            Ok(mut value) => {
                redact(&mut value);
                self.debug(&format!("parsed input values: {}", value));
            }
            Err(e) => self.debug(&format!("convert model to string for debugging: {}", e)),
        }
    }

    fn write_err(&self, msg: &str) {
        let write = || {
            let mut err = self.err.borrow_mut();
            let _ = writeln!(err, "{}", msg);
            let _ = err.flush();
        };
        // keep the spinner line from interleaving with the message
        match self.spinner.borrow().as_ref() {
            Some(bar) => bar.suspend(write),
            None => write(),
        }
    }

    /// Ask for confirmation on stderr and read the answer from stdin
    ///
    /// `y`/`yes` confirms; `n`/`no`/empty declines with `PromptDeclined`.
    /// Anything else asks again, up to three attempts.
    pub fn prompt_for_confirmation(&self, prompt: &str) -> Result<(), CliError> {
        if self.interactive {
            let confirmed = Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt(prompt)
                .default(false)
                .interact_on(&Term::stderr())
                .map_err(|dialoguer::Error::IO(e)| match e.kind() {
                    std::io::ErrorKind::Interrupted => CliError::Cancelled,
                    _ => CliError::io("read user input", e),
                })?;
            return if confirmed {
                Ok(())
            } else {
                Err(CliError::PromptDeclined)
            };
        }
        for _ in 0..MAX_PROMPT_ATTEMPTS {
            {
                let mut err = self.err.borrow_mut();
                let _ = write!(err, "{} [y/N] ", prompt);
                let _ = err.flush();
            }

            let mut answer = String::new();
            let read = self
                .input
                .borrow_mut()
                .read_line(&mut answer)
                .map_err(|e| CliError::io("read user input", e))?;
            if read == 0 {
                return Err(CliError::io(
                    "read user input",
                    std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "no input received"),
                ));
            }

            match answer.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => return Ok(()),
                "" | "n" | "no" => return Err(CliError::PromptDeclined),
                _ => continue,
            }
        }
        Err(CliError::io(
            "read user input",
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "max number of wrong inputs reached",
            ),
        ))
    }

    /// Start the spinner; it stops when the returned guard is dropped
    pub fn spinner(&self, msg: &str) -> SpinnerGuard<'_> {
        debug_assert!(
            self.spinner.borrow().is_none(),
            "a spinner is already running"
        );
        let bar = if self.draw_spinner {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner()
                .tick_strings(&["|", "/", "-", "\\", ""])
                .template("{msg} {spinner}")
            {
                bar.set_style(style);
            }
            bar.set_message(msg.to_string());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        } else {
            ProgressBar::hidden()
        };
        *self.spinner.borrow_mut() = Some(bar);
        SpinnerGuard { printer: self }
    }

    pub fn spinner_active(&self) -> bool {
        self.spinner.borrow().is_some()
    }

    fn stop_spinner(&self) {
        if let Some(bar) = self.spinner.borrow_mut().take() {
            bar.finish_and_clear();
        }
    }
}

/// Keeps the spinner alive for its scope
pub struct SpinnerGuard<'a> {
    printer: &'a Printer,
}

impl Drop for SpinnerGuard<'_> {
    fn drop(&mut self) {
        self.printer.stop_spinner();
    }
}

fn redact(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                let lower = key.to_ascii_lowercase();
                if SENSITIVE_FIELDS.iter().any(|s| lower.contains(s)) && !v.is_null() {
                    *v = serde_json::Value::String("[REDACTED]".to_string());
                } else {
                    redact(v);
                }
            }
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(redact),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::test_support::CaptureBuffer;
    use std::io::Cursor;

    fn printer(verbosity: Verbosity, input: &str) -> (Printer, CaptureBuffer, CaptureBuffer) {
        let out = CaptureBuffer::default();
        let err = CaptureBuffer::default();
        let p = Printer::with_io(
            verbosity,
            Box::new(out.clone()),
            Box::new(err.clone()),
            Box::new(Cursor::new(input.to_string())),
        );
        (p, out, err)
    }

    #[test]
    fn test_output_goes_to_stdout() {
        let (p, out, err) = printer(Verbosity::Info, "");
        p.outputln("hello");
        assert_eq!(out.contents(), "hello\n");
        assert!(err.contents().is_empty());
    }

    #[test]
    fn test_debug_suppressed_below_debug() {
        let (p, _, err) = printer(Verbosity::Info, "");
        p.debug("hidden");
        assert!(err.contents().is_empty());

        let (p, _, err) = printer(Verbosity::Debug, "");
        p.debug("shown");
        assert!(err.contents().contains("shown"));
    }

    #[test]
    fn test_warn_levels() {
        for (verbosity, shown) in [
            (Verbosity::Error, false),
            (Verbosity::Warning, true),
            (Verbosity::Info, true),
            (Verbosity::Debug, true),
        ] {
            let (p, _, err) = printer(verbosity, "");
            p.warn("careful");
            assert_eq!(err.contents().contains("careful"), shown, "{:?}", verbosity);
        }
    }

    #[test]
    fn test_info_and_error_always_shown() {
        let (p, _, err) = printer(Verbosity::Error, "");
        p.info("note");
        p.error("broken");
        let text = err.contents();
        assert!(text.contains("note"));
        assert!(text.contains("broken"));
    }

    #[test]
    fn test_prompt_yes() {
        let (p, _, err) = printer(Verbosity::Info, "Yes\n");
        assert!(p.prompt_for_confirmation("Are you sure?").is_ok());
        assert!(err.contents().contains("Are you sure? [y/N]"));
    }

    #[test]
    fn test_prompt_no_and_empty_decline() {
        for answer in ["n\n", "no\n", "\n", "  NO  \n"] {
            let (p, _, _) = printer(Verbosity::Info, answer);
            assert!(matches!(
                p.prompt_for_confirmation("Sure?"),
                Err(CliError::PromptDeclined)
            ));
        }
    }

    #[test]
    fn test_prompt_retries_then_fails() {
        let (p, _, _) = printer(Verbosity::Info, "maybe\nperhaps\ny\n");
        assert!(p.prompt_for_confirmation("Sure?").is_ok());

        let (p, _, _) = printer(Verbosity::Info, "a\nb\nc\ny\n");
        let err = p.prompt_for_confirmation("Sure?").unwrap_err();
        assert!(matches!(err, CliError::Io { .. }));
    }

    #[test]
    fn test_prompt_eof_is_error() {
        let (p, _, _) = printer(Verbosity::Info, "");
        assert!(matches!(
            p.prompt_for_confirmation("Sure?"),
            Err(CliError::Io { .. })
        ));
    }

    #[test]
    fn test_debug_input_model_redacts() {
        #[derive(Serialize)]
        struct Model {
            name: String,
            service_account_token: Option<String>,
        }
        let (p, _, err) = printer(Verbosity::Debug, "");
        p.debug_input_model(&Model {
            name: "zone".into(),
            service_account_token: Some("s3cr3t".into()),
        });
        let text = err.contents();
        assert!(text.contains("parsed input values"));
        assert!(text.contains("zone"));
        assert!(!text.contains("s3cr3t"));
        assert!(text.contains("[REDACTED]"));
    }

    #[test]
    fn test_spinner_guard_stops_on_drop() {
        let (p, _, err) = printer(Verbosity::Info, "");
        {
            let _spinner = p.spinner("Working");
            assert!(p.spinner_active());
            p.warn("while spinning");
        }
        assert!(!p.spinner_active());
        assert!(err.contents().contains("while spinning"));
    }
}
