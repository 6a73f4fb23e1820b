//! Start/finish helpers for traceable operations.
//!
//! Spans come from [`Owi::span`](crate::Owi::span); these helpers close them
//! with the operation's outcome.

use std::fmt::Display;
use std::future::Future;
use tracing::{Instrument, Span};

/// Attach the outcome of an operation to its span.
pub fn finish<T, E: Display>(span: &Span, result: &Result<T, E>) {
    let _enter = span.enter();
    match result {
        Ok(_) => tracing::debug!("operation finished"),
        Err(err) => {
            span.record("error", tracing::field::display(err));
            tracing::warn!(error = %err, "operation failed");
        }
    }
}

/// Run `fut` inside `span` and finish the span with its result.
pub async fn traced<F, T, E>(span: Span, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    let result = fut.instrument(span.clone()).await;
    finish(&span, &result);
    result
}
