//! # tsu-otel
//!
//! Request tracing for services built on tsu, the minimal HTTP framework for
//! Rust services behind a reverse proxy.
//!
//! Two middleware, independent of each other:
//!
//! - [`middleware::otel::Tracing`]: one OpenTelemetry server span per
//!   request, named after the matched route, carrying HTTP semantic
//!   attributes, with its status derived from the response
//! - [`middleware::timer::Timer`]: a `Server-Timing: app;dur=…` header with
//!   the time spent in the handler
//!
//! The framework around them stays small: radix-tree routing via
//! [`matchit`], HTTP/1.1 and HTTP/2 via hyper, graceful shutdown on SIGTERM.
//! TLS, rate limiting and body-size limits are the proxy's job.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::{Method, StatusCode};
//! use tsu_otel::middleware::otel::Tracing;
//! use tsu_otel::middleware::timer::Timer;
//! use tsu_otel::{Error, Request, Response, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     // install your tracer provider globally before this line
//!     let app = Router::new()
//!         .with(Timer::new())
//!         .with(Tracing::new(None))
//!         .on(Method::GET, "/users/{id}", get_user);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await
//! }
//!
//! async fn get_user(req: Request) -> Result<Response, Error> {
//!     match req.param("id") {
//!         Some("0") => Err(Error::new(StatusCode::NOT_FOUND, "no such user")),
//!         Some(id) => Ok(Response::json(format!(r#"{{"id":"{id}"}}"#))),
//!         None => Err(Error::internal("route without id")),
//!     }
//! }
//! ```

mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod middleware;

pub use error::Error;
pub use handler::Handler;
pub use request::{Request, RequestBuilder};
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
