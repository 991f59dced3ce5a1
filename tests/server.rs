//! End-to-end tests over a real socket.

use std::sync::Arc;
use std::time::Duration;

use http::{Method, StatusCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tsu_otel::middleware::otel::{Config, Tracing, NET_PEER_IP};
use tsu_otel::middleware::timer::Timer;
use tsu_otel::{Error, Request, Response, Router, Server};

mod common;

async fn get_user(req: Request) -> Result<Response, Error> {
    match req.param("id") {
        Some("0") => Err(Error::new(StatusCode::NOT_FOUND, "no such user")),
        Some(id) => Ok(Response::json(format!(r#"{{"id":"{id}"}}"#))),
        None => Err(Error::internal("route without id")),
    }
}

/// Connects to `addr`, retrying while the server starts.
async fn connect(addr: &str) -> TcpStream {
    for _ in 0..50 {
        match TcpStream::connect(addr).await {
            Ok(stream) => return stream,
            Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
        }
    }
    panic!("server at {addr} did not come up");
}

/// Sends one HTTP/1.1 request and returns the raw response text.
async fn roundtrip(addr: &str, path: &str) -> String {
    let mut stream = connect(addr).await;

    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut buf = String::new();
    stream.read_to_string(&mut buf).await.unwrap();
    buf
}

#[tokio::test]
async fn serves_traced_and_timed_requests() {
    let addr = "127.0.0.1:28391";
    let (provider, exporter) = common::in_memory_provider();
    // The server drops the router on return; an in-memory exporter clears its
    // spans when the last provider handle goes.
    let _provider = Arc::clone(&provider);
    let app = Router::new()
        .with(Timer::new())
        .with(Tracing::new(Some(Config::new().tracer_provider(provider))))
        .on(Method::GET, "/users/{id}", get_user);

    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(
        Server::bind(addr).serve_with_shutdown(app, async { let _ = stopped.await; }),
    );

    let ok = roundtrip(addr, "/users/42").await;
    assert!(ok.starts_with("HTTP/1.1 200 OK"), "{ok}");
    assert!(ok.to_ascii_lowercase().contains("server-timing: app;dur="), "{ok}");
    assert!(ok.ends_with(r#"{"id":"42"}"#), "{ok}");

    let missing = roundtrip(addr, "/users/0").await;
    assert!(missing.starts_with("HTTP/1.1 404 Not Found"), "{missing}");
    assert!(missing.ends_with("no such user"), "{missing}");

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();

    let spans = common::finished(&exporter);
    assert_eq!(spans.len(), 2);
    assert!(spans.iter().all(|s| common::attr(s, NET_PEER_IP).is_some()));
}

#[tokio::test]
async fn shutdown_closes_idle_keep_alive_connections() {
    let addr = "127.0.0.1:28392";
    let app = Router::new().on(Method::GET, "/ping", |_: Request| async { "pong" });

    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(
        Server::bind(addr).serve_with_shutdown(app, async { let _ = stopped.await; }),
    );

    let mut stream = connect(addr).await;

    let request = format!("GET /ping HTTP/1.1\r\nHost: {addr}\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut buf = Vec::new();
    while !buf.ends_with(b"pong") {
        let mut chunk = [0_u8; 512];
        let n = stream.read(&mut chunk).await.unwrap();
        assert_ne!(n, 0, "connection closed before the response");
        buf.extend_from_slice(&chunk[..n]);
    }

    stop.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), server).await;
    assert!(result.is_ok(), "serve did not return with an idle connection open");
    result.unwrap().unwrap().unwrap();

    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn invalid_bind_address_is_an_error() {
    let err = Server::bind("not an address").serve(Router::new()).await.unwrap_err();
    assert!(matches!(err, Error::Addr(_)));
}
