//! Commit Viewer - paginated, cached commit history of GitHub projects
//!
//! # Usage
//! ```bash
//! commit-viewer                                   # Start server and shell
//! commit-viewer https://github.com/apache/spark   # Open a project at startup
//! commit-viewer --no-shell --port 9000            # REST server only
//! ```
//!
//! The REST server and the interactive shell share one registry, so a project
//! cloned in the shell is what `/api/v1/commits` serves.

mod error;
mod history;
mod models;
mod remote;
mod repl;
mod routes;

use std::sync::Arc;

use axum::Router;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use history::{ReconcilePolicy, Registry};
use remote::github::DEFAULT_API_BASE;
use remote::{GitHubSource, DEFAULT_PAGE_SIZE};
use repl::ShellExit;

/// Commit Viewer - Browse the commit history of GitHub projects
#[derive(Parser)]
#[command(name = "commit-viewer")]
#[command(about = "Paginated, cached commit history of GitHub projects", long_about = None)]
struct Cli {
    /// Project to open at startup (owner/repo or GitHub URL)
    #[arg(value_name = "REFERENCE")]
    reference: Option<String>,

    /// Address to bind the server to
    #[arg(long, default_value = "127.0.0.1", env = "COMMIT_VIEWER_HOST")]
    host: String,

    /// Port to run the server on
    #[arg(short, long, default_value = "8080", env = "COMMIT_VIEWER_PORT")]
    port: u16,

    /// GitHub API base URL (GitHub Enterprise: https://host/api/v3)
    #[arg(long, default_value = DEFAULT_API_BASE, env = "COMMIT_VIEWER_API_BASE")]
    api_base: String,

    /// Commits per remote page (1-100)
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, value_parser = parse_page_size, env = "COMMIT_VIEWER_PAGE_SIZE")]
    page_size: usize,

    /// Newest remote pages searched for the cached head before a cache is
    /// considered stale
    #[arg(long, default_value_t = 1, env = "COMMIT_VIEWER_RECONCILE_PAGES")]
    reconcile_pages: usize,

    /// Do not read commands from stdin
    #[arg(long)]
    no_shell: bool,
}

fn parse_page_size(value: &str) -> Result<usize, String> {
    let size: usize = value
        .parse()
        .map_err(|_| format!("`{}` is not a number", value))?;
    if (1..=100).contains(&size) {
        Ok(size)
    } else {
        Err(format!("page size must be between 1 and 100, got {}", size))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing (quieter for production)
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let source = GitHubSource::new(&cli.api_base, cli.page_size)?;
    let registry = Arc::new(Registry::new(
        Arc::new(source),
        ReconcilePolicy::from_pages(cli.reconcile_pages),
    ));

    if let Some(reference) = cli.reference.as_deref() {
        if registry.open_project(reference).await {
            println!("  Project started with URL: {}", reference);
        } else {
            eprintln!("✗ Failed starting project with URL: {}", reference);
        }
    }

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(routes::create_router(registry.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("✗ Failed to bind to {}: {}", addr, e);
            eprintln!("  Try a different port with --port <PORT>");
            std::process::exit(1);
        }
    };

    let url = format!("http://{}", addr);
    println!();
    println!("  ┌─────────────────────────────────────────────┐");
    println!("  │                Commit Viewer                │");
    println!("  └─────────────────────────────────────────────┘");
    println!();
    println!("  Server:     {}", url);
    println!("  GitHub API: {}", cli.api_base);
    println!("  Page size:  {}", cli.page_size);
    println!();
    println!("  Endpoints:");
    println!("    GET  /commits?url=<repo>&page=<n>&size=<m>");
    println!("    GET  /api/v1/commits?page=<n>&size=<m>");
    println!("    GET  /api/v1/branches   POST /api/v1/checkout");
    println!("    GET  /api/v1/project    POST /api/v1/project");
    println!();
    println!("  Press Ctrl+C to stop");
    println!();

    let (shell_tx, shell_rx) = tokio::sync::oneshot::channel::<()>();
    if !cli.no_shell {
        let registry = registry.clone();
        tokio::spawn(async move {
            match repl::run(registry).await {
                Ok(ShellExit::Requested) => {
                    let _ = shell_tx.send(());
                }
                Ok(ShellExit::Eof) => tracing::debug!("stdin closed, shell stopped"),
                Err(e) => tracing::warn!("Shell stopped: {}", e),
            }
        });
    } else {
        drop(shell_tx);
    }

    // Only an explicit `exit` stops the server; a closed stdin does not
    let shell_exit = async move {
        if shell_rx.await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    let shutdown = async {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::error!("Failed to listen for Ctrl+C: {}", e);
                    std::future::pending::<()>().await;
                }
            }
            _ = shell_exit => {}
        }
        println!("\n  Shutting down...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    // A pending stdin read would otherwise keep the runtime alive
    std::process::exit(0);
}
