//! HTTP request type.

use std::collections::HashMap;

use percent_encoding::percent_decode_str;
use serde_json::Value;
use uuid::Uuid;

use crate::error::HttpError;

/// HTTP request methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET method
    Get,
    /// POST method
    Post,
    /// PUT method
    Put,
    /// PATCH method
    Patch,
    /// DELETE method
    Delete,
    /// HEAD method
    Head,
    /// OPTIONS method
    Options,
}

impl Method {
    /// Parses a method from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            "HEAD" => Some(Self::Head),
            "OPTIONS" => Some(Self::Options),
            _ => None,
        }
    }

    /// Returns the method as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }

    /// Whether requests with this method have their body read and parsed.
    pub const fn has_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Route parameters bound by the pattern matcher.
///
/// A name bound by an optional segment that had no counterpart in the path
/// is present but has no value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    params: HashMap<String, Option<String>>,
}

impl Params {
    /// Creates new empty params.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a parameter to a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), Some(value.into()));
    }

    /// Binds a parameter without a value.
    pub fn insert_absent(&mut self, key: impl Into<String>) {
        self.params.insert(key.into(), None);
    }

    /// Gets a parameter value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Option::as_deref)
    }

    /// Whether the pattern bound this name, with or without a value.
    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    /// Gets a parameter value or returns a 400 error.
    pub fn require(&self, key: &str) -> Result<&str, HttpError> {
        self.get(key)
            .ok_or_else(|| HttpError::new(400, format!("Missing path parameter: {key}")))
    }

    /// Parses a parameter as a specific type.
    pub fn parse<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    /// Returns the number of bound names.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether nothing was bound.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Returns an iterator over the parameters.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_deref()))
    }
}

/// A parsed request body.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    /// No body was read.
    #[default]
    Empty,
    /// Raw text.
    Text(String),
    /// A JSON document.
    Json(Value),
}

impl Body {
    /// Returns the body text, if it was not parsed as JSON.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the JSON document, if there is one.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Deserializes the body into a typed value.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, HttpError> {
        match self {
            Self::Json(value) => T::deserialize(value).map_err(HttpError::InvalidJson),
            Self::Text(text) => serde_json::from_str(text).map_err(HttpError::InvalidJson),
            Self::Empty => serde_json::from_str("").map_err(HttpError::InvalidJson),
        }
    }
}

/// The body bytes as delivered by the connection layer, before parsing.
#[derive(Debug, Clone, Default)]
enum RawBody {
    #[default]
    Unread,
    Bytes(Vec<u8>),
    Overflowed(usize),
}

/// An HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    /// Unique request identifier.
    pub id: String,
    /// HTTP method.
    pub method: Method,
    /// Request path, without the query string.
    pub path: String,
    /// Parameters bound by the matched route.
    pub params: Params,
    /// Query string parameters.
    pub query: HashMap<String, String>,
    /// Cookies sent with the request.
    pub cookies: HashMap<String, String>,
    /// Request headers, keyed by lowercase name.
    pub headers: HashMap<String, String>,
    /// Parsed request body.
    pub body: Body,
    raw: RawBody,
}

impl Request {
    /// Creates a new request for a target such as `/search?q=rust`.
    pub fn new(method: Method, target: impl AsRef<str>) -> Self {
        let target = target.as_ref();
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Self::parse_query_string(query)),
            None => (target, HashMap::new()),
        };

        Self {
            id: generate_id(),
            method,
            path: if path.is_empty() { "/" } else { path }.to_string(),
            params: Params::new(),
            query,
            cookies: HashMap::new(),
            headers: HashMap::new(),
            body: Body::Empty,
            raw: RawBody::Unread,
        }
    }

    /// Creates a GET request.
    pub fn get(target: impl AsRef<str>) -> Self {
        Self::new(Method::Get, target)
    }

    /// Creates a POST request.
    pub fn post(target: impl AsRef<str>) -> Self {
        Self::new(Method::Post, target)
    }

    /// Creates a PUT request.
    pub fn put(target: impl AsRef<str>) -> Self {
        Self::new(Method::Put, target)
    }

    /// Creates a DELETE request.
    pub fn delete(target: impl AsRef<str>) -> Self {
        Self::new(Method::Delete, target)
    }

    /// Sets a header.
    #[must_use]
    pub fn header(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.set_header(key, value);
        self
    }

    /// Sets a header in place.
    pub fn set_header(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.headers
            .insert(key.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Sets the raw body, parsed during dispatch.
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.set_raw_body(body);
        self
    }

    /// Sets the raw body in place.
    pub fn set_raw_body(&mut self, body: impl Into<Vec<u8>>) {
        self.raw = RawBody::Bytes(body.into());
    }

    /// Records that the body exceeded `limit` bytes and was not read.
    pub fn mark_overflowed(&mut self, limit: usize) {
        self.raw = RawBody::Overflowed(limit);
    }

    /// Sets a query parameter.
    #[must_use]
    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Gets a header value.
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Gets a query parameter.
    pub fn get_query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// Gets a cookie value.
    pub fn get_cookie(&self, key: &str) -> Option<&str> {
        self.cookies.get(key).map(String::as_str)
    }

    /// Gets a route parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key)
    }

    /// Parses query parameters from a query string. The last value wins
    /// when a key repeats.
    pub fn parse_query_string(query: &str) -> HashMap<String, String> {
        url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect()
    }

    /// Parses a `Cookie` header into name/value pairs.
    pub fn parse_cookies(header: &str) -> HashMap<String, String> {
        header
            .split(';')
            .filter_map(|pair| {
                let pair = pair.trim();
                if pair.is_empty() {
                    return None;
                }
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                let value = percent_decode_str(value).decode_utf8_lossy().into_owned();
                Some((key.to_string(), value))
            })
            .collect()
    }

    /// Fills the cookie map and parses the body.
    ///
    /// Only POST, PUT and PATCH bodies are parsed. A body declared as JSON
    /// must parse, anything else is kept as text.
    pub(crate) fn prepare(&mut self) -> Result<(), HttpError> {
        if let Some(cookies) = self.get_header("cookie").map(Self::parse_cookies) {
            self.cookies = cookies;
        }

        if !self.method.has_body() {
            return Ok(());
        }

        let bytes = match std::mem::take(&mut self.raw) {
            RawBody::Overflowed(limit) => return Err(HttpError::PayloadTooLarge { limit }),
            RawBody::Bytes(bytes) => bytes,
            RawBody::Unread => Vec::new(),
        };

        let is_json = self
            .get_header("content-type")
            .is_some_and(|ct| ct.contains("application/json"));

        self.body = if is_json {
            Body::Json(serde_json::from_slice(&bytes).map_err(HttpError::InvalidJson)?)
        } else {
            Body::Text(String::from_utf8_lossy(&bytes).into_owned())
        };

        Ok(())
    }
}

/// Generates a 32-character hex request identifier.
fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parsing() {
        assert_eq!(Method::parse("GET"), Some(Method::Get));
        assert_eq!(Method::parse("post"), Some(Method::Post));
        assert_eq!(Method::parse("INVALID"), None);
        assert!(Method::Patch.has_body());
        assert!(!Method::Get.has_body());
    }

    #[test]
    fn test_params() {
        let mut params = Params::new();
        params.insert("id", "123");
        params.insert_absent("tab");

        assert_eq!(params.get("id"), Some("123"));
        assert_eq!(params.parse::<i64>("id"), Some(123));
        assert_eq!(params.get("tab"), None);
        assert!(params.contains("tab"));
        assert!(!params.contains("missing"));
        assert_eq!(params.require("tab").unwrap_err().status(), 400);
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_request_builder() {
        let req = Request::get("/users?page=1")
            .header("Content-Type", "application/json")
            .query_param("sort", "name");

        assert_eq!(req.method, Method::Get);
        assert_eq!(req.path, "/users");
        assert_eq!(req.get_header("content-type"), Some("application/json"));
        assert_eq!(req.get_query("page"), Some("1"));
        assert_eq!(req.get_query("sort"), Some("name"));
        assert_eq!(req.id.len(), 32);
        assert!(req.id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(Request::get("/").id, Request::get("/").id);
    }

    #[test]
    fn test_query_string_parsing() {
        let query = Request::parse_query_string("name=John+Doe&age=30&city=New%20York");
        assert_eq!(query.get("name"), Some(&"John Doe".to_string()));
        assert_eq!(query.get("age"), Some(&"30".to_string()));
        assert_eq!(query.get("city"), Some(&"New York".to_string()));
    }

    #[test]
    fn test_query_last_value_wins() {
        let query = Request::parse_query_string("a=1&a=2&a=3");
        assert_eq!(query.get("a"), Some(&"3".to_string()));
    }

    #[test]
    fn test_cookie_parsing() {
        let cookies = Request::parse_cookies("session=abc; theme=dark%20mode;; flag");
        assert_eq!(cookies.get("session"), Some(&"abc".to_string()));
        assert_eq!(cookies.get("theme"), Some(&"dark mode".to_string()));
        assert_eq!(cookies.get("flag"), Some(&String::new()));
        assert_eq!(cookies.len(), 3);
    }

    #[test]
    fn test_prepare_json_body() {
        let mut req = Request::post("/items")
            .header("Content-Type", "application/json; charset=utf-8")
            .header("Cookie", "sid=42")
            .body(r#"{"name":"widget"}"#);
        req.prepare().unwrap();
        assert_eq!(req.get_cookie("sid"), Some("42"));
        assert_eq!(
            req.body.as_json().and_then(|v| v["name"].as_str()),
            Some("widget")
        );
    }

    #[test]
    fn test_prepare_invalid_json() {
        let mut req = Request::post("/items")
            .header("Content-Type", "application/json")
            .body("{not json");
        let err = req.prepare().unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn test_prepare_empty_json_body_is_invalid() {
        let mut req = Request::put("/items").header("Content-Type", "application/json");
        assert_eq!(req.prepare().unwrap_err().status(), 400);
    }

    #[test]
    fn test_prepare_text_body() {
        let mut req = Request::post("/notes").body("plain words");
        req.prepare().unwrap();
        assert_eq!(req.body.as_text(), Some("plain words"));
    }

    #[test]
    fn test_prepare_overflow() {
        let mut req = Request::post("/upload");
        req.mark_overflowed(16);
        let err = req.prepare().unwrap_err();
        assert_eq!(err.status(), 413);
    }

    #[test]
    fn test_get_body_is_ignored() {
        let mut req = Request::get("/").body("ignored");
        req.prepare().unwrap();
        assert_eq!(req.body, Body::Empty);
    }

    #[test]
    fn test_body_deserialize() {
        #[derive(serde::Deserialize)]
        struct Item {
            name: String,
        }

        let body = Body::Json(serde_json::json!({"name": "bolt"}));
        let item: Item = body.deserialize().unwrap();
        assert_eq!(item.name, "bolt");
        assert!(Body::Empty.deserialize::<Item>().is_err());
    }
}
