//! Client configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the streaming client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuiConfig {
    /// Session settings.
    pub session: SessionConfig,
    /// Display settings.
    pub display: DisplayConfig,
    /// Input forwarding settings.
    pub input: InputConfig,
    /// Frame/event bridge settings.
    pub bridge: BridgeConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Host control address (IP:port for the TCP handshake).
    pub host_address: String,
    /// Client name announced in the handshake.
    pub client_name: String,
    /// Connection timeout in milliseconds.
    pub timeout_ms: u64,
    /// What to do with the remote console on disconnect.
    pub disconnect_action: DisconnectAction,
}

/// Remote-sleep policy applied when the window closes while connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectAction {
    /// Prompt the user every time.
    Ask,
    /// Always put the remote console to sleep.
    AlwaysSleep,
    /// Just disconnect.
    Nothing,
}

/// Display settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Initial window width (overridden by the negotiated video profile).
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// Start in fullscreen mode.
    pub fullscreen: bool,
}

/// Input forwarding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Forward mouse events to the session.
    pub capture_mouse: bool,
    /// Forward keyboard events to the session.
    pub capture_keyboard: bool,
}

/// Frame/event bridge.
///
/// Passed into the frame uploader at construction time; the uploader
/// never reaches into ambient state for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Forward every rendered frame to the dispatch address.
    pub forward_frames: bool,
    /// Address of the external frame consumer.
    pub dispatch_addr: String,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: String,
    /// Optional log file.
    pub file: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for GuiConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            display: DisplayConfig::default(),
            input: InputConfig::default(),
            bridge: BridgeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host_address: "127.0.0.1:9295".into(),
            client_name: "farview".into(),
            timeout_ms: 5000,
            disconnect_action: DisconnectAction::Ask,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fullscreen: false,
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            capture_mouse: true,
            capture_keyboard: true,
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            forward_frames: false,
            dispatch_addr: "127.0.0.1:5555".into(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: String::new(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl GuiConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write default config to a file.
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let cfg = Self::default();
        let text = toml::to_string_pretty(&cfg)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, text)
    }
}

// ── Tests ────────────────────────────────────────────────────────
