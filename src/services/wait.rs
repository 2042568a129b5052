//! Polling helper for long-running remote operations

use std::time::{Duration, Instant};

use crate::core::cancel::CancelToken;
use crate::core::errors::CliError;

/// Outcome of a single poll
#[derive(Debug)]
pub enum PollState<T> {
    Pending,
    Done(T),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct Waiter {
    pub interval: Duration,
    pub timeout: Duration,
    cancel: CancelToken,
}

impl Waiter {
    pub fn new(cancel: CancelToken, interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            cancel,
        }
    }

    /// Call `poll` until it reports a terminal state
    ///
    /// Interrupts are honoured between polls and while sleeping.
    pub fn wait<T>(
        &self,
        operation: &str,
        mut poll: impl FnMut() -> Result<PollState<T>, CliError>,
    ) -> Result<T, CliError> {
        let _cooperating = self.cancel.cooperate();
        let started = Instant::now();
        let mut attempt = 0u32;
        loop {
            self.cancel.check()?;
            attempt += 1;
            tracing::trace!(operation, attempt, "polling");
            match poll()? {
                PollState::Done(value) => return Ok(value),
                PollState::Failed(reason) => {
                    return Err(CliError::Remote {
                        operation: operation.to_string(),
                        status: None,
                        message: reason,
                    })
                }
                PollState::Pending => {}
            }
            if started.elapsed() >= self.timeout {
                return Err(CliError::Remote {
                    operation: operation.to_string(),
                    status: None,
                    message: format!("timed out after {}s", self.timeout.as_secs()),
                });
            }
            self.sleep()?;
        }
    }

    fn sleep(&self) -> Result<(), CliError> {
        let step = Duration::from_millis(100);
        let deadline = Instant::now() + self.interval;
        while Instant::now() < deadline {
            self.cancel.check()?;
            std::thread::sleep(step.min(deadline.saturating_duration_since(Instant::now())));
        }
        self.cancel.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn waiter(cancel: CancelToken) -> Waiter {
        Waiter::new(cancel, Duration::ZERO, Duration::from_secs(5))
    }

    #[test]
    fn test_wait_until_done() {
        let mut calls = 0;
        let result = waiter(CancelToken::new())
            .wait("create", || {
                calls += 1;
                Ok(if calls < 3 {
                    PollState::Pending
                } else {
                    PollState::Done(calls)
                })
            })
            .unwrap();
        assert_eq!(result, 3);
    }

    #[test]
    fn test_failed_state_is_error() {
        let err = waiter(CancelToken::new())
            .wait::<()>("create zone", || Ok(PollState::Failed("CREATE_FAILED".into())))
            .unwrap_err();
        assert!(matches!(err, CliError::Remote { status: None, .. }));
        assert_eq!(err.to_string(), "create zone: CREATE_FAILED");
    }

    #[test]
    fn test_timeout() {
        let w = Waiter::new(CancelToken::new(), Duration::ZERO, Duration::ZERO);
        let err = w
            .wait::<()>("delete cluster", || Ok(PollState::Pending))
            .unwrap_err();
        assert!(matches!(err, CliError::Remote { status: None, .. }));
        assert_eq!(err.to_string(), "delete cluster: timed out after 0s");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_cancel_stops_waiting() {
        let token = CancelToken::new();
        let w = waiter(token.clone());
        let err = w
            .wait::<()>("create", || {
                token.cancel();
                Ok(PollState::Pending)
            })
            .unwrap_err();
        assert!(matches!(err, CliError::Cancelled));
    }

    #[test]
    fn test_interrupt_during_wait_unwinds_loop() {
        let token = CancelToken::new();
        let w = waiter(token.clone());
        let mut handled_by_loop = false;
        let err = w
            .wait::<()>("create", || {
                handled_by_loop = token.interrupt();
                Ok(PollState::Pending)
            })
            .unwrap_err();
        assert!(handled_by_loop);
        assert!(matches!(err, CliError::Cancelled));
        // outside the loop the handler has to exit on its own
        assert!(!token.interrupt());
    }
}
