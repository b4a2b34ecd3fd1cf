//! Chain execution and the error pipeline.

use serde_json::json;
use tracing::{debug, error, warn};

use crate::error::HttpError;
use crate::handler::{BoxedErrorHandler, BoxedHandler, Context, Flow};
use crate::options::Environment;
use crate::response::Response;

const INTERNAL_SERVER_ERROR: &str = "Internal Server Error";

/// Runs handlers in order until one of them stops the chain.
///
/// Returns [`Flow::Next`] when every handler asked to continue.
pub async fn run_chain<'a, I>(handlers: I, mut cx: Context) -> Flow
where
    I: IntoIterator<Item = &'a BoxedHandler>,
{
    for handler in handlers {
        match handler.call(cx).await {
            Flow::Next(next) => cx = next,
            stop => return stop,
        }
    }
    Flow::Next(cx)
}

/// Turns a dispatch failure into the final response.
///
/// A response that was already written is returned untouched. Otherwise the
/// error handler gets the failure, and without one the default JSON error
/// body is written.
pub async fn recover(
    error_handler: Option<&BoxedErrorHandler>,
    environment: Environment,
    err: HttpError,
    cx: Context,
) -> Response {
    log_failure(&err, &cx.req.id);

    if cx.res.is_sent() {
        debug!(request_id = %cx.req.id, "response already sent, dropping error");
        return cx.res;
    }

    let Some(error_handler) = error_handler else {
        return default_error_response(cx.res, &err, environment);
    };

    let status = err.status();
    let message = public_message(&err, environment);

    match error_handler.call(err, cx).await {
        Flow::Done(cx) => cx.res,
        Flow::Next(cx) if cx.res.is_sent() => cx.res,
        Flow::Next(cx) => write_error(cx.res, status, &message),
        Flow::Fail(cx, nested) => {
            error!(
                request_id = %cx.req.id,
                error = %nested.diagnostic(),
                "error handler failed"
            );
            if cx.res.is_sent() {
                return cx.res;
            }
            let mut res = cx.res;
            res.status(500);
            if let Err(err) = res.send(INTERNAL_SERVER_ERROR) {
                error!(error = %err, "failed to write fallback response");
            }
            res
        }
    }
}

/// Writes the default `{"error": message}` body for `err`.
pub fn default_error_response(
    res: Response,
    err: &HttpError,
    environment: Environment,
) -> Response {
    write_error(res, err.status(), &public_message(err, environment))
}

/// The message a client is allowed to see.
///
/// Development exposes the full diagnostic. Production hides server errors
/// behind a generic message.
pub fn public_message(err: &HttpError, environment: Environment) -> String {
    if !environment.is_production() {
        return err.diagnostic();
    }
    if err.status() >= 500 {
        INTERNAL_SERVER_ERROR.to_string()
    } else {
        err.to_string()
    }
}

fn write_error(mut res: Response, status: u16, message: &str) -> Response {
    res.status(status);
    if let Err(err) = res.json(&json!({ "error": message })) {
        error!(error = %err, "failed to write error response");
    }
    res
}

fn log_failure(err: &HttpError, request_id: &str) {
    let status = err.status();
    if status >= 500 {
        error!(request_id, status, error = %err.diagnostic(), "request failed");
    } else {
        warn!(request_id, status, error = %err, "request rejected");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::handler::handler;
    use crate::request::Request;

    fn context() -> Context {
        Context::new(Request::get("/"), Response::ok())
    }

    fn error_body(res: &Response) -> String {
        let body: serde_json::Value = serde_json::from_slice(&res.body).unwrap();
        body["error"].as_str().unwrap_or_default().to_string()
    }

    #[tokio::test]
    async fn test_run_chain_stops_at_first_terminal_step() {
        let chain = vec![
            handler(|cx: Context| async move { cx.next() }),
            handler(|cx: Context| async move { cx.send("stop") }),
            handler(|cx: Context| async move { cx.send("unreachable") }),
        ];

        match run_chain(&chain, context()).await {
            Flow::Done(cx) => assert_eq!(cx.res.body_string(), Some("stop".to_string())),
            other => panic!("expected Done, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_chain_empty_continues() {
        let chain: Vec<BoxedHandler> = Vec::new();
        assert!(matches!(run_chain(&chain, context()).await, Flow::Next(_)));
    }

    #[test]
    fn test_public_message() {
        let server = HttpError::msg("secret detail");
        let client = HttpError::new(403, "Forbidden");

        assert_eq!(public_message(&server, Environment::Development), "secret detail");
        assert_eq!(public_message(&server, Environment::Production), "Internal Server Error");
        assert_eq!(public_message(&client, Environment::Production), "Forbidden");
    }

    #[tokio::test]
    async fn test_recover_without_error_handler() {
        let err = HttpError::new(409, "conflict");
        let res = recover(None, Environment::Development, err, context()).await;
        assert_eq!(res.status, 409);
        assert!(res.is_sent());
        assert_eq!(error_body(&res), "conflict");
    }

    #[tokio::test]
    async fn test_recover_keeps_sent_response() {
        let mut cx = context();
        cx.res.send("already").unwrap();
        let res = recover(None, Environment::Development, HttpError::msg("late"), cx).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body_string(), Some("already".to_string()));
    }

    #[tokio::test]
    async fn test_declining_error_handler_gets_default_body() {
        let declining: BoxedErrorHandler =
            Arc::new(|_err: HttpError, cx: Context| async move { cx.next() });
        let res = recover(
            Some(&declining),
            Environment::Production,
            HttpError::msg("hidden"),
            context(),
        )
        .await;
        assert_eq!(res.status, 500);
        assert_eq!(error_body(&res), "Internal Server Error");
    }

    #[tokio::test]
    async fn test_failing_error_handler_writes_plain_500() {
        let failing: BoxedErrorHandler =
            Arc::new(|err: HttpError, cx: Context| async move { cx.fail(err) });
        let res = recover(
            Some(&failing),
            Environment::Development,
            HttpError::new(400, "bad"),
            context(),
        )
        .await;
        assert_eq!(res.status, 500);
        assert_eq!(res.body_string(), Some("Internal Server Error".to_string()));
        assert_eq!(res.get_header("content-type"), Some("text/plain; charset=utf-8"));
    }
}
