//! Server-Timing header tests.

use std::time::Duration;

use http::{Method, StatusCode};
use tsu_otel::middleware::otel::{Config, Tracing};
use tsu_otel::middleware::timer::{Timer, SERVER_TIMING};
use tsu_otel::{Error, Request, Response, Router};

mod common;

/// Splits `app;dur=12.4ms` into `(12.4, "ms")`.
fn parse_timing(header: &str) -> (f64, String) {
    let dur = header.strip_prefix("app;dur=").unwrap_or_else(|| panic!("unexpected header {header:?}"));
    let split = dur.find(|c: char| c.is_ascii_alphabetic() || c == 'µ').unwrap();
    let (value, unit) = dur.split_at(split);
    (value.parse().unwrap(), unit.to_owned())
}

fn as_millis(value: f64, unit: &str) -> f64 {
    match unit {
        "ns" => value / 1_000_000.0,
        "µs" => value / 1_000.0,
        "ms" => value,
        "s" => value * 1_000.0,
        other => panic!("unexpected unit {other:?}"),
    }
}

async fn slow(_: Request) -> &'static str {
    tokio::time::sleep(Duration::from_millis(25)).await;
    "done"
}

#[tokio::test]
async fn reports_elapsed_time() {
    let app = Router::new().with(Timer::new()).on(Method::GET, "/slow", slow);

    let res = app.handle(common::get("/slow")).await;

    let header = res.header(SERVER_TIMING).unwrap();
    let (value, unit) = parse_timing(header);
    let millis = as_millis(value, &unit);
    assert!((25.0..1_000.0).contains(&millis), "{header}");
    assert_eq!(res.body(), b"done");
}

#[tokio::test]
async fn error_passes_through_with_the_header() {
    async fn fail(_: Request) -> Result<Response, Error> {
        Err(Error::new(StatusCode::BAD_GATEWAY, "upstream down"))
    }

    let app = Router::new().with(Timer::new()).on(Method::GET, "/", fail);

    let res = app.handle(common::get("/")).await;

    assert_eq!(res.status_code(), StatusCode::BAD_GATEWAY);
    assert_eq!(res.error().map(ToString::to_string).as_deref(), Some("upstream down"));
    assert!(res.header(SERVER_TIMING).is_some_and(|h| h.starts_with("app;dur=")));
}

#[tokio::test]
async fn existing_timing_entries_are_kept() {
    async fn with_db_timing(_: Request) -> Response {
        Response::builder().header("server-timing", "db;dur=3").text("ok")
    }

    let app = Router::new().with(Timer::new()).on(Method::GET, "/", with_db_timing);

    let res = app.handle(common::get("/")).await;

    let entries: Vec<_> = res.headers().iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case(SERVER_TIMING))
        .map(|(_, v)| v.clone())
        .collect();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0], "db;dur=3");
    assert!(entries[1].starts_with("app;dur="));
}

#[tokio::test]
async fn timing_and_tracing_compose() {
    let (provider, exporter) = common::in_memory_provider();
    let app = Router::new()
        .with(Timer::new())
        .with(Tracing::new(Some(Config::new().tracer_provider(provider))))
        .on(Method::GET, "/slow", slow);

    let res = app.handle(common::get("/slow")).await;

    assert!(res.header(SERVER_TIMING).is_some());
    assert_eq!(common::finished(&exporter).len(), 1);
}
