//! Tracing subscriber setup for wsd binaries.
//!
//! Library crates only emit `tracing` events; the binary calls
//! [`init_subscriber`] once at startup. Configuration comes from the
//! environment:
//!
//! - `LOG_LEVEL`: default filter when `RUST_LOG` is unset
//! - `LOG_OUTPUT`: `console` (stderr), `file`, `both` or `off`
//! - `LOG_FORMAT`: `human` or `json`
//! - `LOG_FILE_PATH`: log file, rolled daily
//! - `LOG_TAGS`: `key:value,...` keeps only events inside spans whose
//!   fields match, e.g. `LOG_TAGS=instance:inst-1`

use std::{
    collections::HashMap,
    env,
    io::{self, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{field::Visit, span, subscriber::Interest, Metadata, Subscriber};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{
    fmt::MakeWriter,
    layer::{Context, Layer},
    filter::Directive,
    prelude::*,
    registry,
    registry::{LookupSpan, Registry},
    EnvFilter,
};
use wsd_core::owi::SPAN_TARGET;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log directive '{directive}': {reason}")]
    InvalidDirective { directive: String, reason: String },
    #[error("Failed to initialize tracing: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

// --- Custom "Tee" Writer ---
struct Tee<A, B> {
    a: A,
    b: B,
}

impl<A, B> Write for Tee<A, B>
where
    A: Write,
    B: Write,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let res_a = self.a.write(buf);
        let res_b = self.b.write(buf);
        res_a.or(res_b)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.a.flush()?;
        self.b.flush()
    }
}

#[derive(Clone)]
struct MakeTee<A, B> {
    make_a: A,
    make_b: B,
}

impl<'a, A, B, W1, W2> MakeWriter<'a> for MakeTee<A, B>
where
    A: MakeWriter<'a, Writer = W1>,
    B: MakeWriter<'a, Writer = W2>,
    W1: Write + 'a,
    W2: Write + 'a,
{
    type Writer = Tee<W1, W2>;
    fn make_writer(&'a self) -> Self::Writer {
        Tee {
            a: self.make_a.make_writer(),
            b: self.make_b.make_writer(),
        }
    }
}

// --- Tag-Based Filtering Logic ---
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// Parse `key:value,key:value`. Malformed entries are dropped.
pub fn parse_tags(raw: &str) -> Vec<Tag> {
    raw.split(',')
        .filter_map(|s| {
            let mut parts = s.splitn(2, ':');
            let key = parts.next()?.trim().to_string();
            let value = parts.next()?.trim().to_string();
            if key.is_empty() {
                return None;
            }
            Some(Tag { key, value })
        })
        .collect()
}

#[derive(Default)]
struct SpanFields(HashMap<String, String>);

struct TagFilterLayer {
    filters: Vec<Tag>,
}

impl<S> Layer<S> for TagFilterLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn register_callsite(&self, _meta: &'static Metadata<'static>) -> Interest {
        // Matching depends on the active span, so it cannot be cached per callsite.
        if self.filters.is_empty() {
            Interest::always()
        } else {
            Interest::sometimes()
        }
    }

    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut fields = SpanFields::default();
        attrs.record(&mut FieldVisitor(&mut fields.0));
        span.extensions_mut().insert(fields);
    }

    fn on_record(&self, id: &span::Id, values: &span::Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        if let Some(fields) = extensions.get_mut::<SpanFields>() {
            values.record(&mut FieldVisitor(&mut fields.0));
        }
    }

    fn enabled(&self, meta: &Metadata<'_>, ctx: Context<'_, S>) -> bool {
        // Spans must always exist, otherwise nothing could ever match.
        if self.filters.is_empty() || meta.is_span() {
            return true;
        }

        let scope = match ctx.current_span().id().and_then(|id| ctx.span_scope(id)) {
            Some(scope) => scope,
            None => return false, // If tags are specified, events outside a span are filtered.
        };

        let mut all_fields = HashMap::new();
        for span_ref in scope {
            if let Some(fields) = span_ref.extensions().get::<SpanFields>() {
                for (k, v) in &fields.0 {
                    all_fields.entry(k.clone()).or_insert_with(|| v.clone());
                }
            }
        }

        self.filters.iter().all(|filter| {
            all_fields
                .get(&filter.key)
                .is_some_and(|value| filter.value == "*" || value.contains(&filter.value))
        })
    }
}

struct FieldVisitor<'a>(&'a mut HashMap<String, String>);

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0
            .insert(field.name().to_string(), format!("{value:?}"));
    }
}

// --- Settings ---
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Console,
    File,
    Both,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Human,
    Json,
}

#[derive(Debug, Clone)]
pub struct LogSettings {
    pub level: String,
    pub output: LogOutput,
    pub format: LogFormat,
    pub tags: Vec<Tag>,
    pub file_path: PathBuf,
}

impl LogSettings {
    pub fn from_env(default_level: &str) -> Self {
        Self::from_lookup(default_level, |key| env::var(key).ok())
    }

    pub fn from_lookup<F>(default_level: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let output = match lookup("LOG_OUTPUT").as_deref() {
            Some("file") => LogOutput::File,
            Some("both") => LogOutput::Both,
            Some("off") | Some("none") => LogOutput::Off,
            _ => LogOutput::Console,
        };
        let format = match lookup("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Human,
        };

        Self {
            level: lookup("LOG_LEVEL").unwrap_or_else(|| default_level.to_string()),
            output,
            format,
            tags: lookup("LOG_TAGS")
                .map(|raw| parse_tags(&raw))
                .unwrap_or_default(),
            file_path: lookup("LOG_FILE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| env::temp_dir().join("wsd.log")),
        }
    }
}

fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    with_fixed_directives(filter)
}

fn with_fixed_directives(mut filter: EnvFilter) -> Result<EnvFilter, LoggingError> {
    // Workspace spans stay enabled whatever the level: they carry the fields
    // LOG_TAGS matches on, and their target emits no events of its own.
    let workspace_spans = format!("{SPAN_TARGET}=info");
    for directive in ["tokio=warn", workspace_spans.as_str()] {
        let parsed = directive
            .parse::<Directive>()
            .map_err(|e| LoggingError::InvalidDirective {
                directive: directive.to_string(),
                reason: e.to_string(),
            })?;
        filter = filter.add_directive(parsed);
    }
    Ok(filter)
}

fn fmt_layer<W>(writer: W, format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer().with_writer(writer);
    match format {
        LogFormat::Json => layer.with_ansi(false).json().boxed(),
        LogFormat::Human => layer.pretty().boxed(),
    }
}

fn file_writer(path: &Path) -> (NonBlocking, WorkerGuard) {
    let log_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(env::temp_dir);
    let log_filename = path.file_name().unwrap_or("wsd.log".as_ref());
    let file_appender = tracing_appender::rolling::daily(log_dir, log_filename);
    tracing_appender::non_blocking(file_appender)
}

/// Initializes the global tracing subscriber based on environment variables.
///
/// The returned guard flushes the file writer when dropped; keep it alive
/// for the lifetime of the process.
pub fn init_subscriber(default_level: &str) -> Result<Option<WorkerGuard>, LoggingError> {
    init_with(LogSettings::from_env(default_level))
}

pub fn init_with(settings: LogSettings) -> Result<Option<WorkerGuard>, LoggingError> {
    let env_filter = build_filter(&settings.level)?;
    let mut guard: Option<WorkerGuard> = None;

    let output_layer = match settings.output {
        LogOutput::Console => Some(fmt_layer(std::io::stderr, settings.format)),
        LogOutput::File => {
            let (writer, file_guard) = file_writer(&settings.file_path);
            guard = Some(file_guard);
            Some(fmt_layer(writer, settings.format))
        }
        LogOutput::Both => {
            let (writer, file_guard) = file_writer(&settings.file_path);
            guard = Some(file_guard);
            let tee_writer = MakeTee {
                make_a: std::io::stderr,
                make_b: writer,
            };
            Some(fmt_layer(tee_writer, settings.format))
        }
        LogOutput::Off => None,
    };

    registry()
        .with(output_layer)
        .with(TagFilterLayer {
            filters: settings.tags,
        })
        .with(env_filter)
        .try_init()?;

    Ok(guard)
}

/// Install a debug-level subscriber writing through the test harness.
/// Safe to call from every test; only the first call takes effect.
pub fn init_for_testing() {
    let _ = registry()
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .with(EnvFilter::new("debug"))
        .try_init();
}
