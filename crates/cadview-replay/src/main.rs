// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Replay a recorded inbound message log against a headless viewer and print
//! the outbound frames, one JSON object per line.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use cadview_app_core::config::ConfigService;
use cadview_app_core::prefs::{BridgePrefs, BRIDGE_PREFS_KEY};
use cadview_codec::MockViewer;
use cadview_config_fs::FsConfigStore;
use cadview_sync::{
    placement_for, run_json_event_loop, OutboundMessage, SyncEngine, SyncState, ViewerContext,
};
use clap::Parser;
use serde_json::{Map, Value};
use tokio::sync::mpsc::unbounded_channel;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "cadview-replay", version, about)]
struct Args {
    /// Inbound log: one JSON frame per line (`-` for stdin).
    log: PathBuf,
    /// Initial remote model as a JSON object.
    #[arg(long)]
    initial: Option<PathBuf>,
    /// Container id for inline placements.
    #[arg(long, default_value = "replay")]
    container: String,
    /// Config directory; defaults to the platform config dir.
    #[arg(long)]
    config_dir: Option<PathBuf>,
    /// Write the effective preferences back to the config store.
    #[arg(long)]
    save_prefs: bool,
}

#[derive(Debug)]
struct Replay {
    handled: usize,
    state: SyncState,
    outbound: Vec<OutboundMessage>,
}

fn read_source(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

/// Non-empty lines that are not `#` comments.
fn frames(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_owned)
        .collect()
}

fn initial_model(text: Option<&str>) -> Result<Map<String, Value>> {
    let Some(text) = text else {
        return Ok(Map::new());
    };
    match serde_json::from_str(text).context("parsing initial model")? {
        Value::Object(map) => Ok(map),
        other => bail!("initial model must be a JSON object, got {other}"),
    }
}

async fn replay(
    initial: Map<String, Value>,
    container: &str,
    frames: Vec<String>,
    prefs: &BridgePrefs,
) -> Result<Replay> {
    let ctx = ViewerContext::headless();
    let placement = placement_for(&initial, container);
    let (out_tx, mut out_rx) = unbounded_channel::<OutboundMessage>();
    let engine = SyncEngine::spawn(
        &ctx,
        placement,
        initial,
        out_tx,
        prefs,
        MockViewer::with_display,
    )?;

    let (in_tx, in_rx) = unbounded_channel::<String>();
    for frame in frames {
        in_tx.send(frame)?;
    }
    drop(in_tx);
    let handled = run_json_event_loop(engine.clone(), in_rx).await;
    let state = engine.borrow().state();
    ctx.dispose_all();
    drop(engine);

    let mut outbound = Vec::new();
    while let Some(message) = out_rx.recv().await {
        outbound.push(message);
    }
    Ok(Replay {
        handled,
        state,
        outbound,
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(io::stderr).init();
    let args = Args::parse();

    // Config (best-effort)
    let config = match &args.config_dir {
        Some(dir) => FsConfigStore::at(dir),
        None => FsConfigStore::new(),
    }
    .map(ConfigService::new);
    let prefs = match &config {
        Ok(config) => BridgePrefs::load_or_default(config),
        Err(err) => {
            warn!(error = %err, "config store unavailable; using default prefs");
            BridgePrefs::default()
        }
    };
    if args.save_prefs {
        if let Ok(config) = &config {
            config.save(BRIDGE_PREFS_KEY, &prefs)?;
        }
    }

    let initial = match &args.initial {
        Some(path) => initial_model(Some(&read_source(path)?))?,
        None => initial_model(None)?,
    };
    let frames = frames(&read_source(&args.log)?);
    info!(frames = frames.len(), "replaying");

    let replay = replay(initial, &args.container, frames, &prefs).await?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for message in &replay.outbound {
        writeln!(out, "{}", message.to_json()?)?;
    }
    info!(
        handled = replay.handled,
        state = ?replay.state,
        outbound = replay.outbound.len(),
        "replay finished"
    );
    Ok(())
}
