//! Connection handling: hyper requests in, router responses out.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONNECTION, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request as HyperRequest, Response as HyperResponse, StatusCode};
use hyper_util::rt::{TokioIo, TokioTimer};
use thiserror::Error;
use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{debug, error, info, warn};

use oxide_router::{Method, Request, Response, Router};

use crate::body::{declared_too_large, read_limited, BodyRead};

/// Pause after a failed `accept`, so a persistent error such as EMFILE
/// does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Errors raised by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol or body failure reported by hyper.
    #[error("HTTP error: {0}")]
    Hyper(#[from] hyper::Error),

    /// The request was not answered in time.
    #[error("request not answered within {0:?}")]
    Timeout(Duration),

    /// Dispatch finished without writing a response.
    #[error("no response was written")]
    NoResponse,
}

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// A bound HTTP/1.1 server.
pub struct Server {
    listener: TcpListener,
    router: Arc<Router>,
}

impl Server {
    /// Binds a listener for `router`.
    pub async fn bind(addr: impl ToSocketAddrs, router: Router) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            router: Arc::new(router),
        })
    }

    /// Returns the bound address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until the task is dropped.
    pub async fn run(self) -> Result<()> {
        info!(addr = %self.local_addr()?, "listening");

        loop {
            let (stream, peer) = accept_with_backoff(|| self.listener.accept()).await;

            let io = TokioIo::new(stream);
            let router = self.router.clone();
            let timeout = router.server_options().timeout;

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let router = router.clone();
                    handle_request(req, router)
                });

                let connection = http1::Builder::new()
                    .timer(TokioTimer::new())
                    .header_read_timeout(timeout)
                    .serve_connection(io, service);

                if let Err(err) = connection.await {
                    debug!(%peer, error = %err, "connection closed");
                }
            });
        }
    }
}

/// Retries `accept` until it succeeds, pausing after every failure.
async fn accept_with_backoff<F, Fut, T>(mut accept: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    loop {
        match accept().await {
            Ok(accepted) => return accepted,
            Err(err) => {
                warn!(error = %err, "failed to accept connection");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

/// Binds `addr` and serves `router` on it.
pub async fn serve(addr: impl ToSocketAddrs, router: Router) -> Result<()> {
    Server::bind(addr, router).await?.run().await
}

/// Answers one request, or fails so hyper drops the connection.
async fn handle_request(
    req: HyperRequest<Incoming>,
    router: Arc<Router>,
) -> Result<HyperResponse<Full<Bytes>>> {
    let timeout = router.server_options().timeout;

    match tokio::time::timeout(timeout, respond(req, &router)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(?timeout, "request timed out");
            Err(ServerError::Timeout(timeout))
        }
    }
}

async fn respond(
    req: HyperRequest<Incoming>,
    router: &Router,
) -> Result<HyperResponse<Full<Bytes>>> {
    let Some(method) = Method::parse(req.method().as_str()) else {
        debug!(method = %req.method(), "unsupported method");
        return Ok(plain(StatusCode::NOT_IMPLEMENTED, "Not Implemented"));
    };

    let target = req
        .uri()
        .path_and_query()
        .map_or_else(|| req.uri().path(), |pq| pq.as_str())
        .to_string();
    let mut request = Request::new(method, target);

    for (key, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            request.set_header(key.as_str(), value);
        }
    }

    let limit = router.server_options().max_body_size;
    let mut overflowed = false;

    if method.has_body() {
        let read = if declared_too_large(req.headers(), limit) {
            BodyRead::Overflowed
        } else {
            read_limited(req.into_body(), limit).await?
        };

        match read {
            BodyRead::Complete(bytes) => request.set_raw_body(bytes),
            BodyRead::Overflowed => {
                overflowed = true;
                request.mark_overflowed(limit);
            }
        }
    }

    let response = router.handle(request).await;
    if !response.is_sent() {
        warn!("request finished without a response, closing connection");
        return Err(ServerError::NoResponse);
    }

    Ok(into_hyper(response, overflowed))
}

fn into_hyper(response: Response, close: bool) -> HyperResponse<Full<Bytes>> {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = HyperResponse::builder().status(status);

    for (key, value) in &response.headers {
        builder = builder.header(key.as_str(), value.as_str());
    }
    if close {
        builder = builder.header(CONNECTION, "close");
    }

    builder
        .body(Full::new(Bytes::from(response.body)))
        .unwrap_or_else(|err| {
            error!(error = %err, "invalid response, sending 500");
            plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        })
}

fn plain(status: StatusCode, message: &'static str) -> HyperResponse<Full<Bytes>> {
    let mut response = HyperResponse::new(Full::new(Bytes::from_static(message.as_bytes())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    use super::*;

    #[tokio::test]
    async fn test_accept_failures_back_off() {
        let attempts = AtomicUsize::new(0);
        let started = Instant::now();

        let accepted = accept_with_backoff(|| {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(io::Error::other("too many open files"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(accepted, 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= ACCEPT_BACKOFF * 2);
    }
}
