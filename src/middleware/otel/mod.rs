//! OpenTelemetry server spans.
//!
//! [`Tracing`] opens one span per request, named after the matched route,
//! annotated with HTTP semantic-convention attributes, and closed when the
//! response is ready:
//!
//! ```rust
//! use tsu_otel::Router;
//! use tsu_otel::middleware::otel::{Config, SpanName, Tracing};
//!
//! let app = Router::new()
//!     .with(Tracing::new(None))
//!     .with(Tracing::new(Some(
//!         Config::new()
//!             .skip(|req| req.path() == "/healthz")
//!             .span_name(SpanName::Template("{method} {route}".into())),
//!     )));
//! ```
//!
//! Downstream handlers find the span's [`Context`] in request locals under
//! the configured key (default [`DEFAULT_LOCAL_KEY`]) and as the current
//! context while they run, so child spans nest under it.

mod attributes;
pub mod config;
mod span_name;

use std::sync::Arc;

use opentelemetry::global::BoxedTracer;
use opentelemetry::trace::{
    FutureExt as _, SamplingDecision, SamplingResult, SpanBuilder, TraceContextExt as _,
    TraceState, Tracer as _,
};
use opentelemetry::{Context, InstrumentationScope, KeyValue};
use tracing::{trace, warn};

pub use attributes::*;
pub use config::{Config, Propagator, SharedTracerProvider, SkipFn, SpanOption, DEFAULT_LOCAL_KEY};
pub use span_name::{render, SpanName, TemplateError};

use crate::error::Error;
use crate::handler::BoxFuture;
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// Tracing middleware. Cheap to clone; every clone shares one tracer.
#[derive(Clone)]
pub struct Tracing {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    span_name: SpanName,
    propagator: Propagator,
    tracer: BoxedTracer,
}

impl Tracing {
    /// Resolves `config` (see [`config::resolve`]) and builds the tracer.
    pub fn new(config: Option<Config>) -> Self {
        let config = config::resolve(config.as_ref());

        let scope = InstrumentationScope::builder(config.tracer_name.clone())
            .with_version(env!("CARGO_PKG_VERSION"))
            .build();
        let provider = config.tracer_provider.clone()
            .unwrap_or_else(|| Arc::new(opentelemetry::global::tracer_provider()));
        let tracer = BoxedTracer::new(provider.boxed_tracer(scope));

        let span_name = config.span_name.clone().unwrap_or(SpanName::Route);
        let propagator = config.propagator.clone().unwrap_or_default();

        Self { inner: Arc::new(Inner { config, span_name, propagator, tracer }) }
    }

    /// The resolved configuration.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// The propagator to use when forwarding this request's context, e.g.
    /// into the headers of an outbound call.
    pub fn propagator(&self) -> &Propagator {
        &self.inner.propagator
    }
}

impl Middleware for Tracing {
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move { inner.trace(req, next).await })
    }
}

impl Inner {
    async fn trace(&self, mut req: Request, next: Next) -> Response {
        if self.config.next.as_ref().is_some_and(|skip| skip(&req)) {
            trace!(path = req.path(), "tracing skipped");
            return next.run(req).await;
        }

        let options = attributes::request_options(&req, self.config.server_name.as_deref())
            .into_iter()
            .chain(self.config.start_options.iter().cloned());

        let name = match self.span_name.for_request(&req) {
            Ok(name) => name,
            Err(e) => {
                warn!(path = req.path(), "span name template failed: {e}");
                return Response::from_error(Error::from(e));
            }
        };

        let (builder, parent) = build_span(name, options);
        let cx = parent.with_span(self.tracer.build_with_context(builder, &parent));
        let _guard = EndOnDrop(cx.clone());

        req.set_local(self.config.local_key.clone(), cx.clone());
        let res = next.run(req).with_context(cx.clone()).await;

        let span = cx.span();
        if let Some(e) = res.error() {
            span.set_attribute(KeyValue::new(TSU_ERROR, e.to_string()));
        }
        let status = res.status_code();
        span.set_attributes(attributes::response_attributes(status, res.content_length()));
        span.set_status(attributes::span_status(status.as_u16()));

        res
    }
}

/// Applies `options` in order. Returns the builder and the parent context
/// the span should start under.
fn build_span(name: String, options: impl IntoIterator<Item = SpanOption>) -> (SpanBuilder, Context) {
    let mut builder = SpanBuilder::from_name(name);
    let mut new_root = false;

    for option in options {
        match option {
            SpanOption::Kind(kind) => builder.span_kind = Some(kind),
            SpanOption::Attributes(kvs) => builder.attributes.get_or_insert_with(Vec::new).extend(kvs),
            SpanOption::NewRoot => new_root = true,
            SpanOption::Record => {
                builder.sampling_result = Some(SamplingResult {
                    decision: SamplingDecision::RecordAndSample,
                    attributes: Vec::new(),
                    trace_state: TraceState::default(),
                });
            }
        }
    }

    let parent = if new_root { Context::new() } else { Context::current() };
    (builder, parent)
}

/// Ends the span in `0` when dropped: after the response, on panic, or when
/// the request future is cancelled.
struct EndOnDrop(Context);

impl Drop for EndOnDrop {
    fn drop(&mut self) {
        self.0.span().end();
    }
}

#[cfg(test)]
mod tests {
    use opentelemetry::trace::SpanKind;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn options_apply_in_order() {
        let (builder, parent) = build_span("op".into(), [
            SpanOption::Kind(SpanKind::Server),
            SpanOption::attribute(KeyValue::new("a", 1_i64)),
            SpanOption::Kind(SpanKind::Internal),
            SpanOption::attribute(KeyValue::new("a", 2_i64)),
            SpanOption::NewRoot,
        ]);

        assert_eq!(builder.name, "op");
        assert_eq!(builder.span_kind, Some(SpanKind::Internal));
        assert_eq!(builder.attributes, Some(vec![KeyValue::new("a", 1_i64), KeyValue::new("a", 2_i64)]));
        assert!(builder.sampling_result.is_none());
        assert!(!parent.has_active_span());
    }

    #[test]
    fn record_forces_sampling() {
        let (builder, _) = build_span("op".into(), [SpanOption::Record]);
        let decision = builder.sampling_result.map(|r| r.decision);
        assert_eq!(decision, Some(SamplingDecision::RecordAndSample));
    }
}
