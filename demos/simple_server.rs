//! Simple SSE push server
//!
//! Run with: cargo run --example simple_server -- [OPTIONS] [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example simple_server                        # binds to 127.0.0.1:8080
//!   cargo run --example simple_server -- 0.0.0.0:9000        # binds to 0.0.0.0:9000
//!   cargo run --example simple_server -- --idle-timeout 300  # drop streams idle for 5 min
//!
//! ## Open a stream
//!
//!   curl -N -i http://localhost:8080/stream
//!
//! The `x-connection-id` response header names the stream.
//!
//! ## Push to it
//!
//!   curl http://localhost:8080/left?id=1
//!   curl http://localhost:8080/right?id=1
//!   curl -X POST http://localhost:8080/send?id=1

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use sse_push::{ServerConfig, SseServer};

#[derive(Debug, Parser)]
#[command(name = "simple_server", about = "Server-Sent Events push server")]
struct Args {
    /// Address to bind to ("localhost" is accepted)
    #[arg(default_value = "127.0.0.1:8080", value_parser = parse_bind_addr)]
    bind_addr: SocketAddr,

    /// Maximum concurrent streams (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    max_connections: usize,

    /// Seconds a trigger waits for a busy stream (0 = wait forever)
    #[arg(long, default_value_t = 5)]
    publish_timeout: u64,

    /// Seconds a single event write may take
    #[arg(long, default_value_t = 10)]
    write_timeout: u64,

    /// Close streams that receive nothing for this many seconds
    #[arg(long)]
    idle_timeout: Option<u64>,
}

/// Parse a bind address, defaulting the port to 8080
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 8080;

    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sse_push=debug".parse()?)
                .add_directive("simple_server=debug".parse()?),
        )
        .init();

    let publish_timeout =
        (args.publish_timeout > 0).then(|| Duration::from_secs(args.publish_timeout));
    let mut config = ServerConfig::with_addr(args.bind_addr)
        .max_connections(args.max_connections)
        .publish_timeout(publish_timeout)
        .write_timeout(Duration::from_secs(args.write_timeout));
    if let Some(idle) = args.idle_timeout {
        config = config.idle_timeout(Duration::from_secs(idle));
    }

    println!("Starting SSE server on {}", config.bind_addr);
    println!();
    println!("Open a stream:  curl -N -i http://{}{}", config.bind_addr, config.stream_path);
    for trigger in &config.triggers {
        println!(
            "Trigger:        curl 'http://{}{}?id=<x-connection-id>'   -> {:?}",
            config.bind_addr, trigger.path, trigger.message
        );
    }
    println!();

    let server = SseServer::new(config)?;
    tracing::info!(addr = %server.bind_addr(), "Server configured");

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await?;

    let stats = server.stats();
    println!(
        "Stats: connections={} delivered={} dropped={} write_failures={} timeouts={}",
        stats.connections_opened,
        stats.messages_delivered,
        stats.messages_dropped,
        stats.write_failures,
        stats.publish_timeouts,
    );

    Ok(())
}
