//! Cancellation and deadline propagation for workspace operations.
//!
//! An [`OpContext`] travels with every orchestrator call and is handed to
//! factories and hooks unchanged, so they observe the caller's cancellation
//! and deadline. Derived contexts are canceled with their parent but can be
//! canceled on their own without affecting it.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    #[error("context canceled")]
    Canceled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Debug, Clone)]
pub struct OpContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for OpContext {
    fn default() -> Self {
        Self::background()
    }
}

impl OpContext {
    /// A context that is never canceled and has no deadline.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Derive a context that can be canceled independently of `self`.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a context whose deadline is the earlier of `self`'s and `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Why the context is done, or `None` while it is still live.
    pub fn err(&self) -> Option<CancelReason> {
        if self.token.is_cancelled() {
            return Some(CancelReason::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolves once the context is canceled or its deadline passes.
    pub async fn done(&self) -> CancelReason {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => CancelReason::Canceled,
                _ = tokio::time::sleep_until(deadline) => CancelReason::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                CancelReason::Canceled
            }
        }
    }

    /// Drive `fut` to completion unless the context finishes first.
    ///
    /// On cancellation `fut` is dropped; work it spawned elsewhere is not
    /// stopped by this call.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, CancelReason>
    where
        F: Future,
    {
        if let Some(reason) = self.err() {
            return Err(reason);
        }
        tokio::select! {
            biased;
            reason = self.done() => Err(reason),
            output = fut => Ok(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_background_never_done() {
        let ctx = OpContext::background();
        assert!(!ctx.is_done());
        assert_eq!(ctx.run(async { 7 }).await, Ok(7));
    }

    #[tokio::test]
    async fn test_cancel_propagates_to_children_only() {
        let parent = OpContext::background();
        let child = parent.child();

        child.cancel();
        assert_eq!(child.err(), Some(CancelReason::Canceled));
        assert!(!parent.is_done());

        let child = parent.child();
        parent.cancel();
        assert_eq!(child.err(), Some(CancelReason::Canceled));
    }

    #[tokio::test]
    async fn test_deadline_exceeded() {
        let ctx = OpContext::background().with_timeout(Duration::from_millis(20));
        let result = ctx
            .run(tokio::time::sleep(Duration::from_secs(5)))
            .await;
        assert_eq!(result, Err(CancelReason::DeadlineExceeded));
        assert_eq!(ctx.err(), Some(CancelReason::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_deadline_keeps_earliest() {
        let short = OpContext::background().with_timeout(Duration::from_millis(10));
        let longer = short.with_timeout(Duration::from_secs(60));
        assert_eq!(short.deadline(), longer.deadline());
    }

    #[tokio::test]
    async fn test_run_on_done_context_skips_future() {
        let ctx = OpContext::background();
        ctx.cancel();
        let mut ran = false;
        let result = ctx.run(async { ran = true }).await;
        assert_eq!(result, Err(CancelReason::Canceled));
        assert!(!ran);
    }
}
