//! # oxide-server
//!
//! Serves an [`oxide_router::Router`] over HTTP/1.1 with hyper.
//!
//! Each request gets the router's body limit and timeout. A body over the
//! limit is answered with 413 and the connection is closed afterwards; a
//! request that ends without any response, or runs past the timeout, drops
//! the connection.
//!
//! ```ignore
//! use oxide_router::{Context, Router};
//! use oxide_server::Server;
//!
//! let router = Router::new().get("/", |cx: Context| async move { cx.send("ok") });
//! let server = Server::bind("127.0.0.1:3000", router).await?;
//! server.run().await?;
//! ```

mod body;
mod server;

pub use body::{declared_too_large, read_limited, BodyRead};
pub use server::{serve, Result, Server, ServerError};
