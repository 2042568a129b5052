//! Interrupt-driven cancellation
//!
//! An interrupt always cancels the running command. Inside a wait loop the
//! loop observes the flag and unwinds with `Cancelled`; anywhere else the
//! process exits right away with the cancelled exit code, so a blocking
//! prompt or request cannot swallow it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::errors::{CliError, EXIT_CANCELLED};

/// Shared flag flipped by the Ctrl-C handler
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    cooperative: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a token that is cancelled on SIGINT
    pub fn install() -> Self {
        let token = Self::new();
        let handle = token.clone();
        let installed = ctrlc::set_handler(move || {
            if !handle.interrupt() {
                eprintln!("\n{}", CliError::Cancelled);
                std::process::exit(EXIT_CANCELLED);
            }
        });
        if let Err(err) = installed {
            tracing::warn!("could not install interrupt handler: {}", err);
        }
        token
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Record an interrupt
    ///
    /// Returns true when a cooperative loop is running and will unwind on
    /// its own; false means the caller has to terminate the process.
    pub fn interrupt(&self) -> bool {
        self.cancel();
        self.cooperative.load(Ordering::SeqCst)
    }

    /// Mark a section that polls `check` regularly
    pub fn cooperate(&self) -> CooperateGuard<'_> {
        self.cooperative.store(true, Ordering::SeqCst);
        CooperateGuard { token: self }
    }

    /// Fail with `Cancelled` once an interrupt was received
    pub fn check(&self) -> Result<(), CliError> {
        if self.is_cancelled() {
            Err(CliError::Cancelled)
        } else {
            Ok(())
        }
    }
}

pub struct CooperateGuard<'a> {
    token: &'a CancelToken,
}

impl Drop for CooperateGuard<'_> {
    fn drop(&mut self) {
        self.token.cooperative.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(token.check().is_ok());
        other.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(CliError::Cancelled)));
    }

    #[test]
    fn test_interrupt_outside_wait_loop_terminates() {
        let token = CancelToken::new();
        assert!(!token.interrupt());
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_interrupt_inside_wait_loop_unwinds() {
        let token = CancelToken::new();
        let handle = token.clone();
        {
            let _guard = token.cooperate();
            assert!(handle.interrupt());
        }
        assert!(!handle.interrupt());
    }
}
