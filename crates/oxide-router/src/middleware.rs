//! Middleware registry and built-in middleware.

use std::sync::Arc;

use tracing::info;

use crate::handler::{
    BoxFuture, BoxedErrorHandler, BoxedHandler, Context, ErrorHandler, Flow, Handler,
};

/// Which request paths a middleware applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prefix {
    /// Every request (`*`).
    Any,
    /// Requests whose path starts with this string.
    Path(String),
}

impl Prefix {
    /// Parses a prefix; `*` means every path.
    pub fn parse(prefix: &str) -> Self {
        if prefix == "*" {
            Self::Any
        } else {
            Self::Path(prefix.to_string())
        }
    }

    /// Checks whether a request path falls under this prefix.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Path(prefix) => path.starts_with(prefix.as_str()),
        }
    }
}

/// What a registered middleware does.
#[derive(Clone)]
pub enum MiddlewareKind {
    /// Runs before the route handlers.
    Normal(BoxedHandler),
    /// Handles failures raised during dispatch.
    Error(BoxedErrorHandler),
}

/// A registered middleware.
#[derive(Clone)]
pub struct MiddlewareEntry {
    /// Paths this entry applies to.
    pub prefix: Prefix,
    /// The middleware itself.
    pub kind: MiddlewareKind,
}

/// Ordered, append-only list of middleware.
#[derive(Clone, Default)]
pub struct MiddlewareRegistry {
    entries: Vec<MiddlewareEntry>,
}

impl MiddlewareRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a normal middleware.
    pub fn push(&mut self, prefix: Prefix, handler: impl Handler) {
        self.entries.push(MiddlewareEntry {
            prefix,
            kind: MiddlewareKind::Normal(Arc::new(handler)),
        });
    }

    /// Appends an error-handling middleware. It applies to every path.
    pub fn push_error(&mut self, handler: impl ErrorHandler) {
        self.entries.push(MiddlewareEntry {
            prefix: Prefix::Any,
            kind: MiddlewareKind::Error(Arc::new(handler)),
        });
    }

    /// Normal middleware applying to `path`, in registration order.
    pub fn matching(&self, path: &str) -> Vec<&BoxedHandler> {
        self.entries
            .iter()
            .filter_map(|entry| match &entry.kind {
                MiddlewareKind::Normal(handler) if entry.prefix.matches(path) => Some(handler),
                _ => None,
            })
            .collect()
    }

    /// The first registered error handler, if any.
    pub fn error_handler(&self) -> Option<&BoxedErrorHandler> {
        self.entries.iter().find_map(|entry| match &entry.kind {
            MiddlewareKind::Error(handler) => Some(handler),
            MiddlewareKind::Normal(_) => None,
        })
    }

    /// Returns all entries.
    pub fn entries(&self) -> &[MiddlewareEntry] {
        &self.entries
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Middleware that logs requests.
pub struct RequestLogger;

impl Handler for RequestLogger {
    fn call(&self, cx: Context) -> BoxFuture<'static, Flow> {
        Box::pin(async move {
            info!(
                request_id = %cx.req.id,
                method = %cx.req.method,
                path = %cx.req.path,
                "-->"
            );
            cx.next()
        })
    }
}
