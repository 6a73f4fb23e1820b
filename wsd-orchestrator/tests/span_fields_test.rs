//! Every provider operation runs in a `workspace_op` span that carries the
//! workspace identity and, on failure, the terminal error.

use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::Subscriber;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use wsd_core::{OpContext, WorkspaceState};
use wsd_orchestrator::{
    hook_fn, ErrorKind, FnFactory, HookRegistry, WorkspaceFactory, WorkspaceProvider,
};
use wsd_session::{SessionStore, Workspace};

type Fields = Arc<Mutex<Vec<String>>>;

/// Captures `name=value` for every field set on workspace spans.
struct SpanFieldRecorder(Fields);

struct Collect<'a>(&'a mut Vec<String>);

impl Visit for Collect<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0.push(format!("{}={:?}", field.name(), value));
    }
}

impl<S> Layer<S> for SpanFieldRecorder
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        if attrs.metadata().name() == "workspace_op" {
            attrs.record(&mut Collect(&mut self.0.lock().unwrap()));
        }
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let is_workspace_op = ctx
            .span(id)
            .is_some_and(|span| span.name() == "workspace_op");
        if is_workspace_op {
            values.record(&mut Collect(&mut self.0.lock().unwrap()));
        }
    }
}

fn provider(hooks: HookRegistry) -> (TempDir, WorkspaceProvider) {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(dir.path().join("sessions"));
    (dir, WorkspaceProvider::new(hooks, store))
}

fn factory() -> impl WorkspaceFactory {
    FnFactory::new(|_ctx: &OpContext, location: &Path| {
        Ok(Workspace::new("", "alice", "ws-1", location))
    })
}

#[tokio::test]
async fn test_failed_create_span_records_identity_and_error() {
    let fields: Fields = Arc::default();
    let _guard =
        tracing::subscriber::set_default(tracing_subscriber::registry().with(SpanFieldRecorder(
            Arc::clone(&fields),
        )));

    let hooks = HookRegistry::builder()
        .hook(
            WorkspaceState::Initializing,
            hook_fn("boom", |_, _| anyhow::bail!("kaboom")),
        )
        .build();
    let (_dir, provider) = provider(hooks);

    let err = provider
        .create(&OpContext::background(), "inst-1", "/tmp/ws1", &factory())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HookFailed);

    let fields = fields.lock().unwrap().clone();
    for expected in [
        "op=\"create\"",
        "instance=inst-1",
        // Known only once the factory has run
        "owner=alice",
        "workspace=ws-1",
    ] {
        assert!(fields.iter().any(|f| f == expected), "{expected} missing from {fields:?}");
    }
    let error = fields
        .iter()
        .find(|f| f.starts_with("error="))
        .unwrap_or_else(|| panic!("no error recorded in {fields:?}"));
    assert!(
        error.starts_with("error=Hook #0 'boom' failed for inst-1 entering initializing"),
        "{error}"
    );
    assert!(error.ends_with("kaboom"), "{error}");
}

#[tokio::test]
async fn test_successful_ops_record_no_error() {
    let fields: Fields = Arc::default();
    let _guard =
        tracing::subscriber::set_default(tracing_subscriber::registry().with(SpanFieldRecorder(
            Arc::clone(&fields),
        )));

    let (_dir, provider) = provider(HookRegistry::default());
    let ctx = OpContext::background();
    provider
        .create(&ctx, "inst-1", "/tmp/ws1", &factory())
        .await
        .unwrap();
    provider
        .transition(&ctx, "inst-1", WorkspaceState::Ready)
        .await
        .unwrap();

    let fields = fields.lock().unwrap().clone();
    assert!(fields.iter().any(|f| f == "op=\"transition\""), "{fields:?}");
    assert!(
        fields.iter().filter(|f| *f == "owner=alice").count() >= 2,
        "{fields:?}"
    );
    assert!(!fields.iter().any(|f| f.starts_with("error=")), "{fields:?}");
}
