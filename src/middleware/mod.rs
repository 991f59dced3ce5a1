//! Middleware layer.
//!
//! Middleware wraps the rest of the request chain: it sees the request on
//! the way in, decides whether and how to call [`Next`], and sees the
//! response on the way out. The router resolves the route first, so every
//! middleware already knows which route pattern (if any) the request hit.
//!
//! Built-in middleware:
//! - [`otel`]: one OpenTelemetry server span per request
//! - [`timer`]: `Server-Timing` header with the handler's wall-clock time
//!
//! Any `Fn(Request, Next) -> impl Future<Output = Response>` is middleware
//! too:
//!
//! ```rust
//! use tsu_otel::{Request, Response, Router};
//! use tsu_otel::middleware::Next;
//!
//! async fn powered_by(req: Request, next: Next) -> Response {
//!     let mut res = next.run(req).await;
//!     res.append_header("x-powered-by", "tsu");
//!     res
//! }
//!
//! let app = Router::new().with(powered_by);
//! ```

pub mod otel;
pub mod timer;

use std::future::Future;
use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler};
use crate::request::Request;
use crate::response::Response;

/// A request interceptor.
pub trait Middleware: Send + Sync + 'static {
    fn call(&self, req: Request, next: Next) -> BoxFuture;
}

impl<F, Fut> Middleware for F
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        Box::pin((self)(req, next))
    }
}

pub(crate) type BoxedMiddleware = Arc<dyn Middleware>;

/// The remainder of the chain after the current middleware.
///
/// Consumed by [`run`](Next::run), so each link calls the rest of the chain
/// at most once.
pub struct Next {
    stack: Arc<[BoxedMiddleware]>,
    index: usize,
    endpoint: BoxedHandler,
}

impl Next {
    pub(crate) fn new(stack: Arc<[BoxedMiddleware]>, endpoint: BoxedHandler) -> Self {
        Self { stack, index: 0, endpoint }
    }

    /// Runs the next middleware, or the endpoint once the stack is exhausted.
    pub async fn run(self, req: Request) -> Response {
        match self.stack.get(self.index).map(Arc::clone) {
            Some(head) => {
                let rest = Next { index: self.index + 1, ..self };
                head.call(req, rest).await
            }
            None => self.endpoint.call(req).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::handler::Handler;

    #[tokio::test]
    async fn middleware_runs_outermost_first() {
        let seen = Arc::new(Mutex::new(Vec::new()));

        let tag = |name: &'static str, seen: Arc<Mutex<Vec<String>>>| {
            move |req: Request, next: Next| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.lock().unwrap().push(format!("{name}:in"));
                    let res = next.run(req).await;
                    seen.lock().unwrap().push(format!("{name}:out"));
                    res
                }
            }
        };

        let stack: Arc<[BoxedMiddleware]> = Arc::from(vec![
            Arc::new(tag("a", Arc::clone(&seen))) as BoxedMiddleware,
            Arc::new(tag("b", Arc::clone(&seen))) as BoxedMiddleware,
        ]);
        let endpoint = (|_req: Request| async { "done" }).into_boxed_handler();

        let req = Request::builder().build().unwrap();
        let res = Next::new(stack, endpoint).run(req).await;

        assert_eq!(res.body(), b"done");
        assert_eq!(*seen.lock().unwrap(), ["a:in", "b:in", "b:out", "a:out"]);
    }
}
