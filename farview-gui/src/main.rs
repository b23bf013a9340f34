//! farview — entry point.
//!
//! ```text
//! farview                    Connect with defaults
//! farview --config <path>    Use custom config TOML
//! farview --host <addr>      Override the host address
//! farview --gen-config       Dump default config and exit
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use farview_gui::config::GuiConfig;
use farview_gui::window::{HeadlessPrompt, StreamWindow, WindowEvent};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "farview", about = "farview remote display streaming client")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "farview.toml")]
    config: PathBuf,

    /// Host address (overrides config). Example: 192.168.1.50:9295
    #[arg(long)]
    host: Option<String>,

    /// Forward rendered frames to the dispatch server (overrides config).
    #[arg(long)]
    forward_frames: bool,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&GuiConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = GuiConfig::load(&cli.config);
    if let Some(host) = cli.host {
        config.session.host_address = host;
    }
    if cli.forward_frames {
        config.bridge.forward_frames = true;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("farview v{}", env!("CARGO_PKG_VERSION"));

    // ── 1. Bring the window up ──────────────────────────────────

    let mut window = StreamWindow::new(
        config,
        Box::new(HeadlessPrompt),
        Box::new(HeadlessPrompt),
    );
    window.init().await?;

    // ── 2. Bridge Ctrl-C to a close request ─────────────────────

    let (event_tx, event_rx) = mpsc::channel::<WindowEvent>(64);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = event_tx.send(WindowEvent::CloseRequested).await;
        }
    });

    // ── 3. Frame-rate reporting ─────────────────────────────────

    if let Some(surface) = window.surface() {
        tokio::spawn(async move {
            let mut last = surface.generation();
            loop {
                tokio::time::sleep(Duration::from_secs(5)).await;
                let now = surface.generation();
                info!(fps = (now - last) as f64 / 5.0, frames = now, "stream stats");
                last = now;
            }
        });
    } else {
        warn!("no video stream; window shows a placeholder");
    }

    // ── 4. Run until closed ─────────────────────────────────────

    window.run(event_rx).await?;

    Ok(())
}
