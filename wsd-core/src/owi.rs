use std::fmt;
use tracing::Span;

/// Target of every span opened by [`Owi::span`]. Subscribers can enable it
/// independently of the event level so tag filtering keeps working.
pub const SPAN_TARGET: &str = "wsd::workspace";

/// Owner/Workspace/Instance identity used to correlate logs and spans.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Owi {
    pub owner_id: String,
    pub workspace_id: String,
    pub instance_id: String,
}

impl Owi {
    pub fn new(
        owner_id: impl Into<String>,
        workspace_id: impl Into<String>,
        instance_id: impl Into<String>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            workspace_id: workspace_id.into(),
            instance_id: instance_id.into(),
        }
    }

    /// Identity when only the instance is known yet.
    pub fn instance(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            ..Default::default()
        }
    }

    /// Open a span for `operation` tagged with this identity.
    ///
    /// The span declares an empty `error` field which
    /// [`finish`](crate::trace::finish) fills in when the operation fails.
    /// `owner` and `workspace` can be re-recorded once they become known.
    pub fn span(&self, operation: &'static str) -> Span {
        tracing::info_span!(
            target: SPAN_TARGET,
            "workspace_op",
            op = operation,
            owner = %self.owner_id,
            workspace = %self.workspace_id,
            instance = %self.instance_id,
            error = tracing::field::Empty,
        )
    }

    /// Record this identity's owner/workspace onto an already open span.
    pub fn apply(&self, span: &Span) {
        span.record("owner", tracing::field::display(&self.owner_id));
        span.record("workspace", tracing::field::display(&self.workspace_id));
    }
}

impl fmt::Display for Owi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "owner={} workspace={} instance={}",
            self.owner_id, self.workspace_id, self.instance_id
        )
    }
}
