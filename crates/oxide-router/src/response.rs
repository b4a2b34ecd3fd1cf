//! HTTP response type.
//!
//! A response is written exactly once. Methods that produce the status line
//! and body ([`Response::send`], [`Response::json`], [`Response::redirect`],
//! [`Response::send_file`], [`Response::end`]) mark it as sent; any later
//! terminal write fails with [`HttpError::AlreadySent`] and leaves the first
//! one intact.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;

use crate::error::HttpError;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const APPLICATION_JSON: &str = "application/json";

/// A value accepted by [`Response::send`].
///
/// Structured values are sent as JSON, everything else as plain text.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Plain text.
    Text(String),
    /// A JSON document.
    Json(Value),
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Value> for Payload {
    fn from(v: Value) -> Self {
        match v {
            Value::String(s) => Self::Text(s),
            other => Self::Json(other),
        }
    }
}

macro_rules! text_payload {
    ($($t:ty),*) => {
        $(impl From<$t> for Payload {
            fn from(v: $t) -> Self {
                Self::Text(v.to_string())
            }
        })*
    };
}

text_payload!(bool, i32, i64, u16, u32, u64, usize, f64);

/// An HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Vec<u8>,
    sent: bool,
}

impl Response {
    /// Creates a new, unsent response with the given status.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
            sent: false,
        }
    }

    /// Creates an unsent 200 OK response.
    pub fn ok() -> Self {
        Self::new(200)
    }

    /// Sets a header, builder style.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Sets a header in place.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Gets a header value, ignoring case.
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Sets the status code for the upcoming terminal write.
    pub fn status(&mut self, status: u16) -> &mut Self {
        self.status = status;
        self
    }

    /// Whether the terminal write already happened.
    pub const fn is_sent(&self) -> bool {
        self.sent
    }

    /// Sends a payload: JSON for structured values, plain text otherwise.
    pub fn send(&mut self, payload: impl Into<Payload>) -> Result<(), HttpError> {
        match payload.into() {
            Payload::Text(text) => self.send_bytes(TEXT_PLAIN, text.into_bytes()),
            Payload::Json(value) => self.json(&value),
        }
    }

    /// Serializes `data` and sends it as `application/json`.
    pub fn json<T: serde::Serialize>(&mut self, data: &T) -> Result<(), HttpError> {
        self.ensure_unsent()?;
        let body = serde_json::to_vec(data).map_err(HttpError::Serialization)?;
        self.send_bytes(APPLICATION_JSON, body)
    }

    /// Sends raw bytes with the given content type.
    pub fn send_bytes(
        &mut self,
        content_type: &str,
        body: impl Into<Vec<u8>>,
    ) -> Result<(), HttpError> {
        self.ensure_unsent()?;
        self.set_header("Content-Type", content_type);
        self.body = body.into();
        self.sent = true;
        Ok(())
    }

    /// Sends a 302 redirect.
    pub fn redirect(&mut self, url: impl Into<String>) -> Result<(), HttpError> {
        self.redirect_with(302, url)
    }

    /// Sends a redirect with an explicit status.
    pub fn redirect_with(&mut self, status: u16, url: impl Into<String>) -> Result<(), HttpError> {
        self.ensure_unsent()?;
        self.status = status;
        self.set_header("Location", url);
        self.body.clear();
        self.sent = true;
        Ok(())
    }

    /// Reads a file and sends it with a content type guessed from its extension.
    pub async fn send_file(&mut self, path: impl AsRef<Path>) -> Result<(), HttpError> {
        self.ensure_unsent()?;
        let path = path.as_ref();
        let contents = tokio::fs::read(path).await?;
        let content_type = mime_guess::from_path(path).first_or_octet_stream();
        self.send_bytes(content_type.as_ref(), contents)
    }

    /// Finishes the response with whatever body it already holds.
    pub fn end(&mut self) -> Result<(), HttpError> {
        self.ensure_unsent()?;
        self.sent = true;
        Ok(())
    }

    /// Returns the body as a string.
    pub fn body_string(&self) -> Option<String> {
        String::from_utf8(self.body.clone()).ok()
    }

    fn ensure_unsent(&self) -> Result<(), HttpError> {
        if self.sent {
            Err(HttpError::AlreadySent)
        } else {
            Ok(())
        }
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::ok()
    }
}
