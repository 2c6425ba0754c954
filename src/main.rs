mod accounts;
mod assign;
mod config;
mod demo;
mod error;
mod import;
mod ipc;
mod locator;
mod model;
mod repo;
mod store;

use std::io::{self, BufRead, Write};

use anyhow::Context;
use serde_json::json;
use tracing::{error, info};

fn setup_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("examseatd=info"));
    // stdout carries the protocol.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();
}

fn startup() -> anyhow::Result<ipc::AppState> {
    let config = config::Config::from_env().context("load configuration")?;
    let workspace = config.workspace.clone();
    let seed_demo = config.seed_demo;

    let mut state = ipc::AppState::in_memory(config);
    if let Some(path) = workspace {
        state.open_workspace(&path)?;
    }
    if seed_demo {
        demo::seed(&state.repo, &state.accounts).context("seed demo data")?;
    }
    Ok(state)
}

fn main() -> anyhow::Result<()> {
    setup_tracing();

    let mut state = match startup() {
        Ok(s) => s,
        Err(e) => {
            error!("{e:#}");
            return Err(e);
        }
    };
    info!(
        version = env!("CARGO_PKG_VERSION"),
        storage = state.storage_kind(),
        "examseatd ready"
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to reply to.
                let resp = json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    info!("stdin closed, shutting down");
    Ok(())
}
