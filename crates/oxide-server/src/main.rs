//! oxide-server CLI
//!
//! Runs a small demo application on top of the router.

use std::path::PathBuf;

use clap::Parser;
use serde_json::json;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_router::{
    Context, Environment, Flow, HttpError, RequestLogger, Router, ServerOptions,
    DEFAULT_MAX_BODY_SIZE,
};
use oxide_server::Server;

/// Minimal HTTP server with routing and middleware.
#[derive(Parser)]
#[command(name = "oxide-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "OXIDE_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on.
    #[arg(short, long, env = "OXIDE_PORT", default_value_t = 3000)]
    port: u16,

    /// Largest accepted request body, in bytes.
    #[arg(long, env = "OXIDE_MAX_BODY_SIZE", default_value_t = DEFAULT_MAX_BODY_SIZE)]
    max_body_size: usize,

    /// Connection timeout, in seconds.
    #[arg(long, env = "OXIDE_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Add permissive CORS headers.
    #[arg(long, env = "OXIDE_CORS")]
    cors: bool,

    /// Deployment environment (`production` hides server error details).
    #[arg(long, env = "OXIDE_ENV", default_value = "development")]
    env: Environment,

    /// Directory served under `/static`.
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn options(&self) -> ServerOptions {
        ServerOptions::new()
            .max_body_size(self.max_body_size)
            .timeout(std::time::Duration::from_secs(self.timeout))
            .cors(self.cors)
            .environment(self.env)
    }
}

async fn health(cx: Context) -> Flow {
    cx.json(&json!({ "status": "ok" }))
}

async fn greet(cx: Context) -> Flow {
    let name = cx.param("name").unwrap_or("stranger").to_string();
    cx.send(format!("hello {name}"))
}

async fn echo(cx: Context) -> Flow {
    match cx.req.body.as_json().cloned() {
        Some(value) => cx.json(&value),
        None => cx.fail(HttpError::new(415, "expected a JSON body")),
    }
}

fn build_router(cli: &Cli) -> Router {
    let router = Router::with_options(cli.options())
        .middleware(RequestLogger)
        .get("/health", health)
        .get("/greet/:name", greet)
        .post("/echo", echo);

    match &cli.static_dir {
        Some(dir) => router.serve_static("/static", dir),
        None => router,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let router = build_router(&cli);
    let server = Server::bind((cli.host.as_str(), cli.port), router).await?;
    info!(
        environment = ?cli.env,
        addr = %server.local_addr()?,
        "starting server"
    );

    server.run().await?;
    Ok(())
}
