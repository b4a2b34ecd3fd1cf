//! Main router implementation.

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;

use futures::FutureExt;
use tracing::{debug, error, warn};

use crate::dispatch::{default_error_response, recover, run_chain};
use crate::error::{HttpError, Result, RouterError};
use crate::handler::{handler, BoxedHandler, Context, ErrorHandler, Flow, Handler};
use crate::middleware::{MiddlewareRegistry, Prefix};
use crate::options::ServerOptions;
use crate::path::PathPattern;
use crate::request::{Method, Params, Request};
use crate::response::Response;
use crate::security::secure_headers;
use crate::static_files::StaticFiles;

/// A single route definition.
#[derive(Clone)]
pub struct Route {
    /// HTTP method.
    pub method: Method,
    /// Path pattern.
    pub pattern: PathPattern,
    /// Handler chain, run in order.
    pub handlers: Vec<BoxedHandler>,
}

/// Routes in registration order.
#[derive(Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a route.
    ///
    /// A route with the same method and pattern string as an existing one
    /// replaces its handler chain and keeps the existing position, so
    /// ranking ties still resolve by first registration.
    pub fn register(&mut self, route: Route) {
        let existing = self.routes.iter_mut().find(|r| {
            r.method == route.method && r.pattern.pattern() == route.pattern.pattern()
        });

        match existing {
            Some(slot) => {
                debug!(method = %route.method, pattern = route.pattern.pattern(), "route replaced");
                *slot = route;
            }
            None => self.routes.push(route),
        }
    }

    /// Finds the best route for a request.
    ///
    /// Every route of `method` is matched against `path`; the highest score
    /// wins and the first registered route wins a tie.
    pub fn lookup(&self, method: Method, path: &str) -> Option<(&Route, Params)> {
        let mut best: Option<(&Route, Params, i32)> = None;

        for route in self.routes.iter().filter(|r| r.method == method) {
            let Some(found) = route.pattern.match_path(path) else {
                continue;
            };
            if best.as_ref().is_none_or(|(_, _, score)| found.score > *score) {
                best = Some((route, found.params, found.score));
            }
        }

        best.map(|(route, params, _)| (route, params))
    }

    /// Returns the routes in registration order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Returns the number of routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// The main router for handling HTTP requests.
///
/// Built once during setup and then shared read-only between requests.
#[derive(Clone, Default)]
pub struct Router {
    /// Registered routes.
    routes: RouteTable,
    /// Global middleware.
    middleware: MiddlewareRegistry,
    /// Request handling options.
    options: ServerOptions,
}

impl Router {
    /// Creates a new empty router with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new empty router with the given options.
    pub fn with_options(options: ServerOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Returns the options.
    pub fn server_options(&self) -> &ServerOptions {
        &self.options
    }

    /// Returns the route table.
    pub fn route_table(&self) -> &RouteTable {
        &self.routes
    }

    /// Adds a GET route.
    #[must_use]
    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.route(Method::Get, path, [self::handler(handler)])
    }

    /// Adds a POST route.
    #[must_use]
    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.route(Method::Post, path, [self::handler(handler)])
    }

    /// Adds a PUT route.
    #[must_use]
    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.route(Method::Put, path, [self::handler(handler)])
    }

    /// Adds a PATCH route.
    #[must_use]
    pub fn patch(self, path: &str, handler: impl Handler) -> Self {
        self.route(Method::Patch, path, [self::handler(handler)])
    }

    /// Adds a DELETE route.
    #[must_use]
    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.route(Method::Delete, path, [self::handler(handler)])
    }

    /// Adds an OPTIONS route.
    #[must_use]
    pub fn options(self, path: &str, handler: impl Handler) -> Self {
        self.route(Method::Options, path, [self::handler(handler)])
    }

    /// Adds a HEAD route.
    #[must_use]
    pub fn head(self, path: &str, handler: impl Handler) -> Self {
        self.route(Method::Head, path, [self::handler(handler)])
    }

    /// Adds a route with a chain of handlers.
    ///
    /// Registering the same method and pattern again replaces the chain.
    ///
    /// # Panics
    ///
    /// Panics if the pattern is empty or the chain has no handlers; use
    /// [`Router::try_route`] to get the error instead.
    #[must_use]
    pub fn route(
        self,
        method: Method,
        path: &str,
        handlers: impl IntoIterator<Item = BoxedHandler>,
    ) -> Self {
        self.try_route(method, path, handlers)
            .unwrap_or_else(|err| panic!("{err}"))
    }

    /// Adds a route with a chain of handlers, rejecting invalid input.
    pub fn try_route(
        mut self,
        method: Method,
        path: &str,
        handlers: impl IntoIterator<Item = BoxedHandler>,
    ) -> Result<Self> {
        if path.is_empty() {
            return Err(RouterError::InvalidPattern(
                "path must be a non-empty string".to_string(),
            ));
        }

        let handlers: Vec<BoxedHandler> = handlers.into_iter().collect();
        if handlers.is_empty() {
            return Err(RouterError::EmptyChain {
                method: method.to_string(),
                pattern: path.to_string(),
            });
        }

        self.routes.register(Route {
            method,
            pattern: PathPattern::new(path),
            handlers,
        });
        Ok(self)
    }

    /// Adds middleware for every path.
    #[must_use]
    pub fn middleware(self, mw: impl Handler) -> Self {
        self.middleware_at("*", mw)
    }

    /// Adds middleware for paths starting with `prefix` (`*` for all).
    #[must_use]
    pub fn middleware_at(mut self, prefix: &str, mw: impl Handler) -> Self {
        self.middleware.push(Prefix::parse(prefix), mw);
        self
    }

    /// Adds error-handling middleware. Only the first one registered runs.
    #[must_use]
    pub fn error_middleware(mut self, mw: impl ErrorHandler) -> Self {
        self.middleware.push_error(mw);
        self
    }

    /// Serves files from `dir` under the URL prefix `mount`.
    ///
    /// Registers `GET` and `HEAD` routes for `mount/*`; a missing file
    /// answers 404.
    #[must_use]
    pub fn serve_static(self, mount: &str, dir: impl Into<PathBuf>) -> Self {
        let mount = mount.trim_end_matches('/');
        let pattern = format!("{mount}/*");
        let files = handler(StaticFiles::new(mount, dir));
        let missing = handler(|cx: Context| async move {
            let err = HttpError::NotFound {
                method: cx.req.method.to_string(),
                path: cx.req.path.clone(),
            };
            cx.fail(err)
        });

        self.route(Method::Get, &pattern, [files.clone(), missing.clone()])
            .route(Method::Head, &pattern, [files, missing])
    }

    /// Handles an incoming request.
    ///
    /// The returned response is unsent if no handler wrote one.
    pub async fn handle(&self, request: Request) -> Response {
        let id = request.id.clone();

        match AssertUnwindSafe(self.dispatch(request)).catch_unwind().await {
            Ok(response) => response,
            Err(_) => {
                error!(request_id = %id, "handler panicked");
                let err = HttpError::Internal("handler panicked".to_string());
                let response = secure_headers(Response::ok(), &self.options, &id);
                default_error_response(response, &err, self.options.environment)
            }
        }
    }

    async fn dispatch(&self, mut request: Request) -> Response {
        let response = secure_headers(Response::ok(), &self.options, &request.id);

        if let Err(err) = request.prepare() {
            return self.recover(err, Context::new(request, response)).await;
        }

        let Some((route, params)) = self.routes.lookup(request.method, &request.path) else {
            let err = HttpError::NotFound {
                method: request.method.to_string(),
                path: request.path.clone(),
            };
            return self.recover(err, Context::new(request, response)).await;
        };
        request.params = params;

        let stack = self.middleware.matching(&request.path);
        debug!(
            request_id = %request.id,
            method = %request.method,
            path = %request.path,
            pattern = route.pattern.pattern(),
            middleware_count = stack.len(),
            "dispatching request"
        );

        let cx = match run_chain(stack, Context::new(request, response)).await {
            Flow::Next(cx) => cx,
            Flow::Done(cx) => return cx.res,
            Flow::Fail(cx, err) => return self.recover(err, cx).await,
        };

        match run_chain(&route.handlers, cx).await {
            Flow::Next(cx) | Flow::Done(cx) => {
                if !cx.res.is_sent() {
                    warn!(
                        request_id = %cx.req.id,
                        "handler chain finished without writing a response"
                    );
                }
                cx.res
            }
            Flow::Fail(cx, err) => self.recover(err, cx).await,
        }
    }

    async fn recover(&self, err: HttpError, cx: Context) -> Response {
        recover(
            self.middleware.error_handler(),
            self.options.environment,
            err,
            cx,
        )
        .await
    }
}
