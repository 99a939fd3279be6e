//! turbonet demo
//!
//! Starts a hello-world server on the in-process transport, then talks to it
//! with an HTTP client and a WebSocket client and prints what comes back.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;
use turbonet::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "turbonet-demo", version, about = "turbonet hello-world over the memory transport")]
struct Cli {
    /// Server configuration file (TOML, YAML or JSON)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(long, short = 'p')]
    port: Option<u16>,

    /// Log level or filter directive
    #[arg(long, default_value = "info", env = "TURBONET_DEMO_LOG")]
    log_level: String,
}

fn dispatcher() -> NetResult<Dispatcher> {
    let mut dispatcher = Dispatcher::new();
    dispatcher
        .on_http("GET", "/hello-world", |ctx, _| {
            ctx.send_status(200, "hello world");
        })?
        .on_http("GET", "/hello/{name}", |ctx, params| {
            let name = params.get("name").unwrap_or("stranger");
            ctx.send_status(200, format!("hello {}", name));
        })?
        .on_ws("POST", "hello-world", |ctx, envelope, _| {
            if let Err(e) = ctx.send(&json!({ "id": envelope.id, "text": "hello world" })) {
                tracing::warn!(error = %e, "reply failed");
            }
        })?;
    dispatcher.on_api(|call| info!(kind = ?call.kind, method = call.method, target = call.target, "api call"));
    Ok(dispatcher)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(port) = cli.port {
        config.port = port;
    }
    config.logging.level = cli.log_level.clone();
    let _logging = config.logging.init().context("initialising logging")?;

    let transport = Arc::new(MemoryTransport::new());
    let base = config.endpoint();
    let endpoint = Endpoint::parse(&base)?;

    let server = Server::new(transport.clone(), config, dispatcher()?).start();
    while !transport.is_bound(&endpoint) {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // HTTP
    let reply = HttpClient::fetch(transport.clone(), &base, HttpRequest::get("/hello-world")).await?;
    println!("GET /hello-world -> {} {}", reply.status, reply.body_text().unwrap_or_default());
    let reply = HttpClient::fetch(transport.clone(), &base, HttpRequest::get("/hello/rustacean")).await?;
    println!("GET /hello/rustacean -> {} {}", reply.status, reply.body_text().unwrap_or_default());
    let reply = HttpClient::fetch(transport.clone(), &base, HttpRequest::get("/missing")).await?;
    println!("GET /missing -> {} {}", reply.status, reply.body_text().unwrap_or_default());

    // WebSocket
    let (tx, mut rx) = mpsc::unbounded_channel();
    let client = WsClient::builder(transport.clone())
        .on("hello-world", move |_, envelope, _| {
            let _ = tx.send(envelope.to_value());
        })?
        .build();
    let ws_url = format!("ws://{}:{}/", endpoint.host(), endpoint.port());
    client.connect(&ws_url).await?;
    client
        .send(&json!({ "id": "hello-world", "method": "POST" }))
        .await?;
    let message = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .context("waiting for the websocket reply")?
        .context("websocket handler dropped")?;
    println!("WS POST hello-world -> {}", message);
    client.disconnect().await?;

    server.stop().await?;
    Ok(())
}
