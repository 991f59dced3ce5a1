//! Radix-tree request router.
//!
//! One tree per HTTP method, O(path-length) lookup. The router also owns the
//! global middleware stack: it resolves the route first, records the matched
//! pattern on the request, then runs the stack down to the handler.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;

use crate::handler::{self, BoxedHandler, Handler};
use crate::middleware::{BoxedMiddleware, Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// A registered route: the pattern as written, plus its handler.
struct Route {
    pattern: Arc<str>,
    handler: BoxedHandler,
}

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Every builder method returns `self` so registrations chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<Route>>,
    middleware: Vec<BoxedMiddleware>,
    stack: Arc<[BoxedMiddleware]>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new(), middleware: Vec::new(), stack: Arc::from(Vec::new()) }
    }

    /// Register a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax, `req.param("name")` retrieves them:
    ///
    /// ```rust
    /// # use tsu_otel::{Request, Response, Router};
    /// # use http::Method;
    /// # async fn get_user(_: Request) -> Response { Response::text("") }
    /// # async fn create_user(_: Request) -> Response { Response::text("") }
    /// Router::new()
    ///     .on(Method::GET,  "/users/{id}", get_user)
    ///     .on(Method::POST, "/users",      create_user);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or conflicts with one already
    /// registered for `method`. Routes are wired at startup, so this is a
    /// programming error.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        let route = Route { pattern: Arc::from(path), handler: handler.into_boxed_handler() };
        self.routes
            .entry(method)
            .or_default()
            .insert(path, route)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    /// Appends a global middleware. The first one added is the outermost: it
    /// sees the request first and the response last.
    pub fn with(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self.stack = Arc::from(self.middleware.clone());
        self
    }

    /// Routes one request through the middleware stack and its handler.
    ///
    /// Unmatched requests still pass through the stack, with no route set,
    /// and end in a `404 Not Found`.
    pub async fn handle(&self, mut req: Request) -> Response {
        let endpoint = match self.lookup(&req.method, req.uri.path()) {
            Some((pattern, handler, params)) => {
                req.route = Some(pattern.to_string());
                req.params = params;
                handler
            }
            None => handler::not_found(),
        };

        Next::new(Arc::clone(&self.stack), endpoint).run(req).await
    }

    fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(Arc<str>, BoxedHandler, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((Arc::clone(&matched.value.pattern), Arc::clone(&matched.value.handler), params))
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}
