//! Demo application for the vestibule engine.
//!
//! Wires a small site: themed fallbacks, an ajax/plain route pair on the same
//! path, a placeholder route, an authorized dashboard with a fan-out barrier,
//! a JSON API route, and an upload endpoint.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use hyper::StatusCode;

use vestibule::config::{load_config, EngineConfig};
use vestibule::dispatch::{handler, JoinBarrier};
use vestibule::engine::Engine;
use vestibule::error::EngineError;
use vestibule::http::HttpServer;
use vestibule::lifecycle::{signals, Shutdown};
use vestibule::net::Listener;
use vestibule::observability::init_logging;

#[derive(Parser, Debug)]
#[command(name = "vestibule", about = "HTTP routing and dispatch engine")]
struct Args {
    /// Path to a TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };

    init_logging(&config);
    tracing::info!(
        bind_address = %config.listener.bind_address,
        debug = config.debug,
        "vestibule starting"
    );

    let listener_config = config.listener.clone();
    let engine = build_engine(config)?;

    let shutdown = Arc::new(Shutdown::new());
    signals::spawn_interrupt_handler(Arc::clone(&shutdown));

    let listener = Listener::bind(&listener_config).await?;
    HttpServer::new(engine)
        .run(listener, shutdown.subscribe())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn build_engine(config: EngineConfig) -> Result<Arc<Engine>, EngineError> {
    Engine::builder(config)
        .authorize(|ctx| {
            let logged = ctx.query.contains_key("token");
            async move { logged }
        })
        .on_error(|error, name, uri| {
            tracing::error!(error, name, uri, "Controller fault");
        })
        .controller("home", |r| {
            r.route("/").to(handler(|x| async move {
                x.respond_content("<h1>Welcome</h1>", "text/html");
                Ok(())
            }));
            // Same path, ajax-only; sorts ahead of the plain route.
            r.route("/").flags(&["ajax"]).to(handler(|x| async move {
                x.respond_json(&serde_json::json!({ "view": "home" }));
                Ok(())
            }));
            r.route("/user/{id}").to(handler(|x| async move {
                let id = x.param(0).to_string();
                x.respond_content(format!("<p>User {id}</p>"), "text/html");
                Ok(())
            }));
            r.route("/dashboard")
                .flags(&["logged"])
                .to(handler(|x| async move {
                    let barrier = JoinBarrier::new();
                    let stats = barrier.enlist_in("stats");
                    let feed = barrier.enlist();
                    tokio::spawn(async move {
                        stats.complete();
                    });
                    tokio::spawn(async move {
                        feed.complete();
                    });
                    barrier.group("stats").await;
                    barrier.join().await;
                    x.respond_content("<h1>Dashboard</h1>", "text/html");
                    Ok(())
                }));
        })
        .controller("api", |r| {
            r.route("/api/notes")
                .flags(&["post", "json"])
                .to(handler(|x| async move {
                    let count = x
                        .json()
                        .and_then(|v| v.as_array().map(Vec::len))
                        .unwrap_or(0);
                    x.respond_json(&serde_json::json!({ "stored": count }));
                    Ok(())
                }));
            r.route("/upload")
                .flags(&["post", "upload"])
                .max_body(1024 * 1024)
                .to(handler(|x| async move {
                    let names: Vec<&str> =
                        x.files().iter().map(|f| f.file_name.as_str()).collect();
                    x.respond_json(&serde_json::json!({ "received": names }));
                    Ok(())
                }));
        })
        .controller("fallbacks", |r| {
            r.route("#404").to(handler(|x| async move {
                x.respond_status(StatusCode::NOT_FOUND, "<h1>Lost?</h1>", "text/html");
                Ok(())
            }));
            r.route("#403").to(handler(|x| async move {
                x.respond_status(StatusCode::FORBIDDEN, "<h1>Members only</h1>", "text/html");
                Ok(())
            }));
            r.route("#500").to(handler(|x| async move {
                x.respond_status(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "<h1>Something broke</h1>",
                    "text/html",
                );
                Ok(())
            }));
        })
        .build()
}
