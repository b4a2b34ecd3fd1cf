//! # oxide-router
//!
//! Request routing, middleware and error handling for small HTTP services.
//!
//! This crate provides:
//! - Path pattern matching with `:param`, `:param?` and `*` segments
//! - Ranked route lookup per HTTP method
//! - Prefix-scoped middleware and a single error handler
//! - A response that can be written exactly once
//!
//! The crate does no I/O on sockets; `oxide-server` drives it over hyper.
//!
//! ## Quick Start
//!
//! ```ignore
//! use oxide_router::{Context, Flow, Request, Router};
//!
//! async fn greet(cx: Context) -> Flow {
//!     let name = cx.param("name").unwrap_or("stranger").to_string();
//!     cx.send(format!("hello {name}"))
//! }
//!
//! let router = Router::new().get("/greet/:name", greet);
//!
//! let response = router.handle(Request::get("/greet/Sora")).await;
//! assert_eq!(response.body_string().as_deref(), Some("hello Sora"));
//! ```
//!
//! ## Path Patterns
//!
//! ```ignore
//! router
//!     .get("/posts/:post_id/comments/:comment_id?", handler)
//!     .get("/assets/*", assets);
//! ```
//!
//! Literal segments outrank parameters, which outrank the wildcard; the
//! most specific matching route wins and ties go to the route registered
//! first. The wildcard's remainder is bound to the `wildcard` parameter.
//!
//! ## Middleware
//!
//! ```ignore
//! use oxide_router::{HttpError, RequestLogger};
//!
//! let router = Router::new()
//!     .middleware(RequestLogger)
//!     .middleware_at("/admin", |cx: Context| async move {
//!         match cx.req.get_header("authorization") {
//!             Some(_) => cx.next(),
//!             None => cx.fail(HttpError::new(401, "Unauthorized")),
//!         }
//!     })
//!     .error_middleware(|err: HttpError, mut cx: Context| async move {
//!         let _ = cx.res.status(err.status()).send(err.to_string());
//!         cx.done()
//!     });
//! ```
//!
//! Middleware runs after a route was found and before its handlers. A
//! failure anywhere skips the remaining steps and goes to the first error
//! middleware, or to a default `{"error": ...}` JSON body.

mod dispatch;
mod error;
mod handler;
mod middleware;
mod options;
mod path;
mod request;
mod response;
mod router;
mod security;
mod static_files;

pub use dispatch::public_message;
pub use error::{BoxError, HttpError, Result, RouterError};
pub use handler::{
    handler, BoxFuture, BoxedErrorHandler, BoxedHandler, Context, ErrorHandler, Flow, Handler,
};
pub use middleware::{MiddlewareEntry, MiddlewareKind, MiddlewareRegistry, Prefix, RequestLogger};
pub use options::{Environment, ServerOptions, DEFAULT_MAX_BODY_SIZE, DEFAULT_TIMEOUT};
pub use path::{PathMatch, PathPattern, PathSegment, WILDCARD};
pub use request::{Body, Method, Params, Request};
pub use response::{Payload, Response};
pub use router::{Route, RouteTable, Router};
pub use security::secure_headers;
pub use static_files::StaticFiles;
