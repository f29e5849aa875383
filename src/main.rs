//! docunote - command-line client for the DocuNote MCP backend
//!
//! Usage:
//!   docunote status
//!   docunote health
//!   docunote tools
//!   docunote upload <file.pdf>
//!   docunote ask <document-uri> <question...>
//!   docunote extract <document-uri>
//!   docunote precedents <jurisdiction> <clause...>
//!   docunote watch

use anyhow::{Context, Result};
use serde::Serialize;
use std::env;
use std::sync::Arc;
use tracing::info;

use docunote::config::ClientConfig;
use docunote::mcp::{HealthMonitor, McpEvent, McpService, Outcome};
use docunote::paths;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("docunote=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    if matches!(args[1].as_str(), "help" | "--help" | "-h") {
        print_usage();
        return Ok(());
    }

    paths::log_paths();
    let config = ClientConfig::load().context("failed to load config")?;
    info!(server_url = %config.server_url, "using DocuNote backend");
    let service = Arc::new(McpService::new(config));

    let result = match args[1].as_str() {
        "status" => cmd_status(&service).await,
        "health" => cmd_health(&service).await,
        "tools" => print_outcome(Outcome::new(service.list_tools().await)),
        "upload" => cmd_upload(&service, &args[2..]).await,
        "ask" => cmd_ask(&service, &args[2..]).await,
        "extract" => cmd_extract(&service, &args[2..]).await,
        "precedents" => cmd_precedents(&service, &args[2..]).await,
        "watch" => cmd_watch(&service).await,
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            std::process::exit(1);
        }
    };

    service.disconnect().await;
    if !result? {
        std::process::exit(2);
    }
    Ok(())
}

fn print_usage() {
    eprintln!(
        r#"docunote - Talk to the DocuNote document analysis backend

Usage:
  docunote status                            Connect and print connection status
  docunote health                            Run one health probe
  docunote tools                             List the tools the server exposes
  docunote upload <file.pdf>                 Upload a PDF, print its storage URI
  docunote ask <document-uri> <question...>  Ask a question about a document
  docunote extract <document-uri>            OCR a document
  docunote precedents <jurisdiction> <clause...>
                                             Find precedents for a clause
  docunote watch                             Probe health until Ctrl-C

Environment:
  DOCUNOTE_MCP_SERVER_URL         Backend endpoint
  DOCUNOTE_TIMEOUT_MS             Request and connect timeout
  DOCUNOTE_HEALTH_INTERVAL_SECS   Health probe interval
  DOCUNOTE_CONFIG                 Override config path
  RUST_LOG                        Log filter

Paths:
  Config: {config}

Examples:
  docunote upload ~/contracts/msa.pdf
  docunote ask gs://docunote/msa.pdf "What is the termination clause?"
  docunote precedents US "Liability is capped at fees paid."
"#,
        config = paths::config_path().display(),
    );
}

/// Print an outcome record; returns `success`.
fn print_outcome<T: Serialize>(outcome: Outcome<T>) -> Result<bool> {
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(outcome.success)
}

fn usage_error(message: &str) -> ! {
    eprintln!("Usage: {}", message);
    std::process::exit(1);
}

async fn cmd_status(service: &McpService) -> Result<bool> {
    let connected = service.connect().await;
    println!("{}", service.status());
    if let Some(session) = service.connection().session() {
        println!(
            "session {} since {}",
            session.id(),
            session.created_at().format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(connected)
}

async fn cmd_health(service: &McpService) -> Result<bool> {
    let report = service.probe_health().await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(report.healthy)
}

async fn cmd_upload(service: &McpService, args: &[String]) -> Result<bool> {
    let [path] = args else {
        usage_error("docunote upload <file.pdf>");
    };
    print_outcome(Outcome::uri(service.upload_path(path).await))
}

async fn cmd_ask(service: &McpService, args: &[String]) -> Result<bool> {
    let Some((document, question)) = args.split_first().filter(|(_, q)| !q.is_empty()) else {
        usage_error("docunote ask <document-uri> <question...>");
    };
    let question = question.join(" ");
    print_outcome(Outcome::answer(service.ask_question(&question, document).await))
}

async fn cmd_extract(service: &McpService, args: &[String]) -> Result<bool> {
    let [document] = args else {
        usage_error("docunote extract <document-uri>");
    };
    print_outcome(Outcome::new(service.extract_text(document).await))
}

async fn cmd_precedents(service: &McpService, args: &[String]) -> Result<bool> {
    let Some((jurisdiction, clause)) = args.split_first().filter(|(_, c)| !c.is_empty()) else {
        usage_error("docunote precedents <jurisdiction> <clause...>");
    };
    let clause = clause.join(" ");
    print_outcome(Outcome::new(service.find_precedents(&clause, jurisdiction).await))
}

async fn cmd_watch(service: &Arc<McpService>) -> Result<bool> {
    let interval = service.config().health_interval;
    let mut events = service.subscribe();
    let mut monitor = HealthMonitor::spawn(service.clone(), interval);
    info!(interval_secs = interval.as_secs(), "watching backend health, Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Some(McpEvent::Health { healthy, tool_count, .. }) => {
                    println!(
                        "{} {} tools={} status={}",
                        chrono::Utc::now().format("%H:%M:%S"),
                        if healthy { "healthy" } else { "unhealthy" },
                        tool_count,
                        service.status(),
                    );
                }
                Some(event) if event.is_error() => {
                    eprintln!("{}: {:?}", event.kind(), event);
                }
                Some(_) => {}
                None => break,
            },
        }
    }

    monitor.stop().await;
    Ok(true)
}
