//! Configuration for the [`Tracing`](super::Tracing) middleware.
//!
//! Every field may be left unset. [`resolve`] fills the gaps from
//! [`Config::defaults`], which is also the only place the process-wide
//! OpenTelemetry globals are read.

use std::fmt;
use std::sync::Arc;

use opentelemetry::global::{self, ObjectSafeTracerProvider};
use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry::trace::SpanKind;
use opentelemetry::{Context, KeyValue};

use super::span_name::SpanName;
use crate::request::Request;

/// Default key under which the span context is stored in request locals.
pub const DEFAULT_LOCAL_KEY: &str = "tsu-otel";

/// Default instrumentation scope name for the tracer.
pub const DEFAULT_TRACER_NAME: &str = "tsu-otel";

/// Decides per request whether to skip tracing. `true` means skip.
pub type SkipFn = Arc<dyn Fn(&Request) -> bool + Send + Sync>;

/// A tracer provider usable behind a pointer.
///
/// Any `opentelemetry` tracer provider qualifies, e.g. an `Arc` of the SDK
/// provider or of [`global::tracer_provider()`].
pub type SharedTracerProvider = Arc<dyn ObjectSafeTracerProvider + Send + Sync>;

/// Where trace context is injected into and extracted from carriers.
#[derive(Clone, Default)]
pub enum Propagator {
    /// Whatever propagator is installed globally at the time of use.
    #[default]
    Global,
    Custom(Arc<dyn TextMapPropagator + Send + Sync>),
}

impl Propagator {
    /// Writes `cx` into `injector`, e.g. the headers of an outbound call.
    pub fn inject_context(&self, cx: &Context, injector: &mut dyn Injector) {
        match self {
            Self::Global => global::get_text_map_propagator(|p| p.inject_context(cx, injector)),
            Self::Custom(p) => p.inject_context(cx, injector),
        }
    }

    /// Reads a remote context out of `extractor`.
    pub fn extract(&self, extractor: &dyn Extractor) -> Context {
        match self {
            Self::Global => global::get_text_map_propagator(|p| p.extract(extractor)),
            Self::Custom(p) => p.extract(extractor),
        }
    }
}

impl fmt::Debug for Propagator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("Global"),
            Self::Custom(p) => f.debug_tuple("Custom").field(p).finish(),
        }
    }
}

/// One span-start option. Options are applied to the span builder in order:
/// a later `Kind` wins, `Attributes` accumulate.
#[derive(Clone, Debug, PartialEq)]
pub enum SpanOption {
    Kind(SpanKind),
    Attributes(Vec<KeyValue>),
    /// Start a new trace instead of continuing the current context.
    NewRoot,
    /// Record and export the span regardless of the sampler's decision.
    Record,
}

impl SpanOption {
    /// Shorthand for a single attribute.
    pub fn attribute(kv: KeyValue) -> Self {
        Self::Attributes(vec![kv])
    }
}

/// Tracing middleware configuration. See [`resolve`] for defaulting rules.
#[derive(Clone, Default)]
pub struct Config {
    /// Skip tracing for requests where this returns `true`.
    pub next: Option<SkipFn>,
    /// Request-locals key for the span-bearing [`Context`].
    pub local_key: String,
    /// Instrumentation scope name of the tracer.
    pub tracer_name: String,
    /// Reported as `http.server_name`. Falls back to the `Host` header,
    /// reported as `http.host`.
    pub server_name: Option<String>,
    pub span_name: Option<SpanName>,
    pub tracer_provider: Option<SharedTracerProvider>,
    pub propagator: Option<Propagator>,
    /// Appended after the built-in request attributes.
    pub start_options: Vec<SpanOption>,
}

impl Config {
    /// An empty configuration, every field unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// The fully populated default configuration.
    ///
    /// Reads the global tracer provider; call it after installing yours.
    pub fn defaults() -> Self {
        Self {
            next: None,
            local_key: DEFAULT_LOCAL_KEY.to_owned(),
            tracer_name: DEFAULT_TRACER_NAME.to_owned(),
            server_name: None,
            span_name: Some(SpanName::Route),
            tracer_provider: Some(Arc::new(global::tracer_provider())),
            propagator: Some(Propagator::Global),
            start_options: default_start_options(),
        }
    }

    pub fn skip(mut self, predicate: impl Fn(&Request) -> bool + Send + Sync + 'static) -> Self {
        self.next = Some(Arc::new(predicate));
        self
    }

    pub fn local_key(mut self, key: impl Into<String>) -> Self {
        self.local_key = key.into();
        self
    }

    pub fn tracer_name(mut self, name: impl Into<String>) -> Self {
        self.tracer_name = name.into();
        self
    }

    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    pub fn span_name(mut self, name: SpanName) -> Self {
        self.span_name = Some(name);
        self
    }

    pub fn tracer_provider(mut self, provider: SharedTracerProvider) -> Self {
        self.tracer_provider = Some(provider);
        self
    }

    pub fn propagator(mut self, propagator: Propagator) -> Self {
        self.propagator = Some(propagator);
        self
    }

    pub fn start_option(mut self, option: SpanOption) -> Self {
        self.start_options.push(option);
        self
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("next", &self.next.as_ref().map(|_| "Fn(&Request) -> bool"))
            .field("local_key", &self.local_key)
            .field("tracer_name", &self.tracer_name)
            .field("server_name", &self.server_name)
            .field("span_name", &self.span_name)
            .field("tracer_provider", &self.tracer_provider.as_ref().map(|_| ".."))
            .field("propagator", &self.propagator)
            .field("start_options", &self.start_options)
            .finish()
    }
}

/// `[Kind(Server), NewRoot, Record]`.
pub fn default_start_options() -> Vec<SpanOption> {
    vec![SpanOption::Kind(SpanKind::Server), SpanOption::NewRoot, SpanOption::Record]
}

/// Produces a fully populated configuration from zero or one user value.
///
/// Unset fields (empty strings, `None`, an empty option list) take their
/// defaults; set fields are kept as they are. The input is never modified,
/// and resolving a resolved configuration returns it unchanged.
pub fn resolve(config: Option<&Config>) -> Config {
    let Some(config) = config else {
        return Config::defaults();
    };

    let mut cfg = config.clone();

    if cfg.local_key.is_empty() {
        cfg.local_key = DEFAULT_LOCAL_KEY.to_owned();
    }
    if cfg.tracer_name.is_empty() {
        cfg.tracer_name = DEFAULT_TRACER_NAME.to_owned();
    }
    if cfg.span_name.is_none() {
        cfg.span_name = Some(SpanName::Route);
    }
    if cfg.tracer_provider.is_none() {
        cfg.tracer_provider = Some(Arc::new(global::tracer_provider()));
    }
    if cfg.propagator.is_none() {
        cfg.propagator = Some(Propagator::Global);
    }
    if cfg.start_options.is_empty() {
        cfg.start_options = default_start_options();
    }

    cfg
}
