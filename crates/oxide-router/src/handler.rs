//! Handlers, the per-request context, and chain control.
//!
//! A handler receives the [`Context`] by value and hands it back inside a
//! [`Flow`], which tells the dispatcher how to continue:
//!
//! - [`Flow::Next`] runs the next middleware or handler,
//! - [`Flow::Done`] ends the chain (normally after a terminal write),
//! - [`Flow::Fail`] stops the chain and enters the error pipeline.
//!
//! ```ignore
//! async fn greet(cx: Context) -> Flow {
//!     let name = cx.param("name").unwrap_or("stranger").to_string();
//!     cx.send(format!("hello {name}"))
//! }
//! ```

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::HttpError;
use crate::request::Request;
use crate::response::{Payload, Response};

/// A boxed future for async handler operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The request and response of one dispatch cycle.
#[derive(Debug)]
pub struct Context {
    /// The incoming request.
    pub req: Request,
    /// The response being built.
    pub res: Response,
}

impl Context {
    /// Creates a context from a request and a response.
    pub fn new(req: Request, res: Response) -> Self {
        Self { req, res }
    }

    /// Gets a route parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.req.params.get(key)
    }

    /// Continues with the next step of the chain.
    pub fn next(self) -> Flow {
        Flow::Next(self)
    }

    /// Ends the chain.
    pub fn done(self) -> Flow {
        Flow::Done(self)
    }

    /// Stops the chain with a failure.
    pub fn fail(self, err: impl Into<HttpError>) -> Flow {
        Flow::Fail(self, err.into())
    }

    /// Sends a payload and ends the chain.
    pub fn send(mut self, payload: impl Into<Payload>) -> Flow {
        let result = self.res.send(payload);
        self.finish(result)
    }

    /// Sends `data` as JSON and ends the chain.
    pub fn json<T: serde::Serialize>(mut self, data: &T) -> Flow {
        let result = self.res.json(data);
        self.finish(result)
    }

    /// Sends a 302 redirect and ends the chain.
    pub fn redirect(mut self, url: impl Into<String>) -> Flow {
        let result = self.res.redirect(url);
        self.finish(result)
    }

    /// Sends a file and ends the chain.
    pub async fn send_file(mut self, path: impl AsRef<Path>) -> Flow {
        let result = self.res.send_file(path).await;
        self.finish(result)
    }

    fn finish(self, result: Result<(), HttpError>) -> Flow {
        match result {
            Ok(()) => Flow::Done(self),
            Err(err) => Flow::Fail(self, err),
        }
    }
}

/// Outcome of one chain step.
#[derive(Debug)]
pub enum Flow {
    /// Continue with the next middleware or handler.
    Next(Context),
    /// Stop the chain; the request is finished.
    Done(Context),
    /// Stop the chain and hand the error to the error pipeline.
    Fail(Context, HttpError),
}

/// A middleware or route handler.
///
/// Implemented for every `Fn(Context) -> impl Future<Output = Flow>`.
pub trait Handler: Send + Sync + 'static {
    /// Runs one step of the chain.
    fn call(&self, cx: Context) -> BoxFuture<'static, Flow>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Flow> + Send + 'static,
{
    fn call(&self, cx: Context) -> BoxFuture<'static, Flow> {
        Box::pin(self(cx))
    }
}

/// An error-handling middleware.
///
/// Implemented for every `Fn(HttpError, Context) -> impl Future<Output = Flow>`.
pub trait ErrorHandler: Send + Sync + 'static {
    /// Handles a failure raised during dispatch.
    fn call(&self, err: HttpError, cx: Context) -> BoxFuture<'static, Flow>;
}

impl<F, Fut> ErrorHandler for F
where
    F: Fn(HttpError, Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Flow> + Send + 'static,
{
    fn call(&self, err: HttpError, cx: Context) -> BoxFuture<'static, Flow> {
        Box::pin(self(err, cx))
    }
}

/// A shared, type-erased handler.
pub type BoxedHandler = Arc<dyn Handler>;

/// A shared, type-erased error handler.
pub type BoxedErrorHandler = Arc<dyn ErrorHandler>;

/// Erases a handler so several can be registered as one chain.
pub fn handler(h: impl Handler) -> BoxedHandler {
    Arc::new(h)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> Context {
        Context::new(Request::get("/"), Response::ok())
    }

    #[test]
    fn test_send_ends_chain() {
        match context().send("hi") {
            Flow::Done(cx) => assert_eq!(cx.res.body_string(), Some("hi".to_string())),
            other => panic!("expected Done, got {other:?}"),
        }
    }

    #[test]
    fn test_second_send_fails() {
        let mut cx = context();
        cx.res.send("first").unwrap();
        match cx.send("second") {
            Flow::Fail(cx, err) => {
                assert!(matches!(err, HttpError::AlreadySent));
                assert_eq!(cx.res.body_string(), Some("first".to_string()));
            }
            other => panic!("expected Fail, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_closure_is_handler() {
        let h = handler(|cx: Context| async move { cx.next() });
        assert!(matches!(h.call(context()).await, Flow::Next(_)));
    }

    #[tokio::test]
    async fn test_closure_is_error_handler() {
        let h: BoxedErrorHandler =
            Arc::new(|err: HttpError, mut cx: Context| async move {
                let status = err.status();
                let _ = cx.res.status(status).send("handled");
                cx.done()
            });
        match h.call(HttpError::new(409, "conflict"), context()).await {
            Flow::Done(cx) => assert_eq!(cx.res.status, 409),
            other => panic!("expected Done, got {other:?}"),
        }
    }
}
