//! Static file serving.
//!
//! [`StaticFiles`] is a handler: registered through
//! [`Router::serve_static`](crate::Router::serve_static) it serves the file
//! bound by the route wildcard; registered as middleware it strips its mount
//! prefix from the request path instead. When no file is found the chain
//! continues.

use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;
use tracing::debug;

use crate::handler::{BoxFuture, Context, Flow, Handler};
use crate::path::WILDCARD;
use crate::request::Method;

const CACHE_CONTROL: &str = "public, max-age=3600";

/// Serves files below a root directory.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    mount: String,
    root: PathBuf,
}

impl StaticFiles {
    /// Creates a handler serving `root` under the URL prefix `mount`.
    pub fn new(mount: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            mount: mount.into(),
            root: root.into(),
        }
    }

    /// Returns the URL prefix.
    pub fn mount(&self) -> &str {
        &self.mount
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a decoded relative path below the root, rejecting traversal.
    fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let mut resolved = self.root.clone();
        for component in Path::new(relative.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        Some(resolved)
    }

    /// The requested file relative to the mount. The wildcard binding is
    /// already decoded; a raw request path is decoded here.
    fn relative_path<'a>(&self, cx: &'a Context) -> Option<Cow<'a, str>> {
        if let Some(rest) = cx.req.params.get(WILDCARD) {
            return Some(Cow::Borrowed(rest));
        }
        let raw = cx
            .req
            .path
            .strip_prefix(self.mount.as_str())
            .unwrap_or(&cx.req.path);
        percent_decode_str(raw).decode_utf8().ok()
    }
}

impl Handler for StaticFiles {
    fn call(&self, cx: Context) -> BoxFuture<'static, Flow> {
        let target = match cx.req.method {
            Method::Get | Method::Head => self
                .relative_path(&cx)
                .and_then(|relative| self.resolve(&relative)),
            _ => None,
        };

        Box::pin(async move {
            let Some(mut path) = target else {
                return cx.next();
            };

            if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_dir()) {
                path.push("index.html");
            }

            let contents = match tokio::fs::read(&path).await {
                Ok(contents) => contents,
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "static file not served");
                    return cx.next();
                }
            };

            let content_type = mime_guess::from_path(&path).first_or_octet_stream();
            let mut cx = cx;
            cx.res.set_header("Cache-Control", CACHE_CONTROL);
            let result = cx.res.send_bytes(content_type.as_ref(), contents);
            match result {
                Ok(()) => cx.done(),
                Err(err) => cx.fail(err),
            }
        })
    }
}
