//! Traced CRUD-style JSON endpoints.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/users/42
//!   curl -i http://localhost:3000/users/0
//!   curl -i -X POST http://localhost:3000/users -d '{"name":"alice"}'
//!   curl -i -X DELETE http://localhost:3000/users/42
//!   curl -i http://localhost:3000/healthz
//!
//! Stop with Ctrl-C; the finished spans are logged on the way out.

use http::{Method, StatusCode};
use opentelemetry::global;
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};
use tracing::info;
use tsu_otel::middleware::otel::{Config, SpanName, Tracing};
use tsu_otel::middleware::timer::Timer;
use tsu_otel::{Error, Request, Response, Router, Server};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let exporter = InMemorySpanExporter::default();
    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .build();
    global::set_tracer_provider(provider.clone());

    let tracing = Tracing::new(Some(
        Config::new()
            .skip(|req| req.path() == "/healthz")
            .span_name(SpanName::Template("{method} {route}".into())),
    ));

    let app = Router::new()
        .with(Timer::new())
        .with(tracing)
        .on(Method::GET, "/users/{id}", get_user)
        .on(Method::POST, "/users", create_user)
        .on(Method::DELETE, "/users/{id}", delete_user)
        .on(Method::GET, "/healthz", |_: Request| async { "ok" });

    Server::bind("0.0.0.0:3000").serve(app).await?;

    for span in exporter.get_finished_spans().unwrap_or_default() {
        info!(
            name = %span.name,
            status = ?span.status,
            attributes = span.attributes.len(),
            "exported span"
        );
    }
    if let Err(e) = provider.shutdown() {
        tracing::warn!("tracer provider shutdown: {e}");
    }
    Ok(())
}

async fn get_user(req: Request) -> Result<Response, Error> {
    match req.param("id") {
        Some("0") => Err(Error::new(StatusCode::NOT_FOUND, "no such user")),
        Some(id) => Ok(Response::json(format!(r#"{{"id":"{id}","name":"alice"}}"#))),
        None => Err(Error::internal("route without id")),
    }
}

async fn create_user(req: Request) -> Result<Response, Error> {
    if req.body().is_empty() {
        return Err(Error::new(StatusCode::BAD_REQUEST, "empty body"));
    }
    Ok(Response::builder()
        .status(StatusCode::CREATED)
        .json(r#"{"id":"43"}"#))
}

async fn delete_user(_req: Request) -> Response {
    Response::status(StatusCode::NO_CONTENT)
}
