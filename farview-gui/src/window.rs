//! Stream window — lifecycle orchestration.
//!
//! Owns the session, the render surface + uploader, and the event
//! bridge listener, and sequences their creation and teardown across
//! the session's receive task, the render task, and the listener's
//! worker task.
//!
//! Teardown order matters: the listener goes first, then the
//! uploader/surface, then the session — the uploader's render context
//! and the session's decoder are referenced transitively and must not
//! dangle.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use farview_core::bridge::{EVENT_BRIDGE_PORT, EventBridgeListener};
use farview_core::error::FarviewError;

use crate::config::{DisconnectAction, GuiConfig};
use crate::input::{InputAction, translate_event};
use crate::session::{DecoderSource, SessionEvent, SessionInput, StreamSession, VideoTransform};
use crate::surface::{RenderContext, RenderSurface, SoftwareContext};
use crate::uploader::FrameUploader;

// ── Window events & collaborators ────────────────────────────────

/// Events routed into the window by the embedding shell.
#[derive(Debug, Clone)]
pub enum WindowEvent {
    /// Close requested (close button, Ctrl-C, quit menu).
    CloseRequested,
    /// Window resized.
    Resized(u32, u32),
    /// Window moved (top-left client coordinates).
    Moved(i32, i32),
    /// Focus gained or lost.
    FocusChanged(bool),
    /// Fullscreen toggle request.
    ToggleFullscreen,
    /// Mouse moved (client-relative coordinates).
    MouseMove(i32, i32),
    /// Mouse button pressed or released.
    MouseButton(MouseBtn, bool),
    /// Mouse wheel delta.
    MouseWheel(i16),
    /// Key down/up: virtual-key code, scan code, pressed.
    Key(u16, u16, bool),
}

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseBtn {
    Left,
    Right,
    Middle,
}

/// Outcome of the disconnect prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectDecision {
    /// Put the remote console to sleep, then disconnect.
    Sleep,
    /// Just disconnect.
    Proceed,
    /// Keep the session running.
    Cancel,
}

/// Dialog seam for the three-way disconnect question.
pub trait DisconnectPrompt: Send {
    fn ask(&self) -> DisconnectDecision;
}

/// Dialog seam for login-PIN entry; `None` cancels.
pub trait PinPrompt: Send {
    fn request_pin(&self, incorrect: bool) -> Option<String>;
}

/// Non-interactive prompts: disconnect proceeds, PIN entry cancels.
pub struct HeadlessPrompt;

impl DisconnectPrompt for HeadlessPrompt {
    fn ask(&self) -> DisconnectDecision {
        DisconnectDecision::Proceed
    }
}

impl PinPrompt for HeadlessPrompt {
    fn request_pin(&self, _incorrect: bool) -> Option<String> {
        None
    }
}

// ── State machine ────────────────────────────────────────────────

/// Window lifecycle states. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Uninitialized,
    Initializing,
    Active,
    ShuttingDown,
    Closed,
}

#[derive(Debug, Clone, Copy)]
struct Geometry {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    focused: bool,
}

// ── StreamWindow ─────────────────────────────────────────────────

/// The stream window orchestrator.
pub struct StreamWindow {
    state: WindowState,
    config: GuiConfig,
    event_port: u16,

    session: Option<StreamSession>,
    session_input: Option<SessionInput>,
    session_events: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    surface: Option<Arc<RenderSurface>>,
    render_stop: Option<watch::Sender<bool>>,
    render_task: Option<JoinHandle<()>>,
    listener: Option<EventBridgeListener>,

    disconnect_prompt: Box<dyn DisconnectPrompt>,
    pin_prompt: Box<dyn PinPrompt>,

    geometry: Geometry,
    remote_size: (u32, u32),
    keyboard_grabbed: bool,
    fullscreen: bool,
}

impl StreamWindow {
    pub fn new(
        config: GuiConfig,
        disconnect_prompt: Box<dyn DisconnectPrompt>,
        pin_prompt: Box<dyn PinPrompt>,
    ) -> Self {
        let geometry = Geometry {
            x: 0,
            y: 0,
            width: config.display.width,
            height: config.display.height,
            focused: true,
        };
        let fullscreen = config.display.fullscreen;
        Self {
            state: WindowState::Uninitialized,
            config,
            event_port: EVENT_BRIDGE_PORT,
            session: None,
            session_input: None,
            session_events: None,
            surface: None,
            render_stop: None,
            render_task: None,
            listener: None,
            disconnect_prompt,
            pin_prompt,
            geometry,
            remote_size: (0, 0),
            keyboard_grabbed: false,
            fullscreen,
        }
    }

    /// Override the event-bridge port (tests bind an ephemeral one).
    pub fn set_event_port(&mut self, port: u16) {
        self.event_port = port;
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    /// The render surface, once video is up.
    pub fn surface(&self) -> Option<Arc<RenderSurface>> {
        self.surface.clone()
    }

    /// Whether the event bridge listener is active.
    pub fn bridge_active(&self) -> bool {
        self.listener.as_ref().is_some_and(|l| l.is_running())
    }

    /// The bound event-bridge port, when the listener is up.
    pub fn bridge_port(&self) -> Option<u16> {
        self.listener.as_ref().map(|l| l.local_addr().port())
    }

    /// Current fullscreen state (the shell applies it to the OS window).
    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    // ── Initializing ─────────────────────────────────────────────

    /// Bring the window up: session, render pipeline, event bridge.
    ///
    /// On failure the window transitions straight to `Closed`; the
    /// error is user-visible.
    pub async fn init(&mut self) -> Result<(), FarviewError> {
        self.state = WindowState::Initializing;

        let mut session = match StreamSession::connect(&self.config.session).await {
            Ok(s) => s,
            Err(e) => {
                error!("failed to initialize stream session: {e}");
                self.state = WindowState::Closed;
                return Err(e);
            }
        };

        // Size the window from the negotiated video profile.
        let (rw, rh) = session.video_profile();
        if rw > 0 && rh > 0 {
            self.remote_size = (rw, rh);
            self.geometry.width = rw;
            self.geometry.height = rh;
        }

        self.session_input = Some(session.input_handle());
        self.session_events = session.take_events();

        if let Some(decoder) = session.video_decoder() {
            let surface = Arc::new(RenderSurface::new());
            let context: Arc<dyn RenderContext> = Arc::new(SoftwareContext);
            let mut uploader = FrameUploader::new(
                Box::new(DecoderSource(Arc::clone(&decoder))),
                Arc::clone(&surface),
                context,
                &self.config.bridge,
            )
            .await;

            let (stop_tx, mut stop_rx) = watch::channel(false);
            self.render_task = Some(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = stop_rx.changed() => break,
                        _ = decoder.frames_available() => {
                            if let Err(e) = uploader.on_frames_available().await {
                                warn!("frame upload failed: {e}");
                            }
                        }
                    }
                }
                debug!("render task exited");
            }));
            self.render_stop = Some(stop_tx);
            self.surface = Some(surface);
        } else {
            info!("session has no video stream; showing placeholder surface");
        }

        self.grab_keyboard();
        session.start();

        let bind_addr = SocketAddr::from(([0, 0, 0, 0], self.event_port));
        match EventBridgeListener::bind_addr(session.input_handle(), bind_addr).await {
            Ok(listener) => self.listener = Some(listener),
            // The stream works without the bridge; do not abort.
            Err(e) => warn!("event bridge unavailable on {bind_addr}: {e}"),
        }

        self.session = Some(session);
        self.state = WindowState::Active;
        self.update_video_transform();
        Ok(())
    }

    // ── Active ───────────────────────────────────────────────────

    /// Drive the window until it closes.
    ///
    /// `events` is the stream of window events from the embedding
    /// shell; session lifecycle events are consumed concurrently.
    pub async fn run(
        &mut self,
        mut events: mpsc::Receiver<WindowEvent>,
    ) -> Result<(), FarviewError> {
        let mut session_events = match self.session_events.take() {
            Some(rx) => rx,
            None => return Err(FarviewError::Other("window not initialized".into())),
        };

        while self.state == WindowState::Active {
            tokio::select! {
                ev = events.recv() => match ev {
                    Some(ev) => self.handle_event(ev).await,
                    // Shell went away; nobody is left to answer a
                    // prompt, so tear down directly.
                    None => self.shutdown().await,
                },
                ev = session_events.recv() => match ev {
                    Some(ev) => self.handle_session_event(ev).await,
                    None => {
                        self.shutdown().await;
                    }
                },
            }
        }

        Ok(())
    }

    /// Route one window event.
    pub async fn handle_event(&mut self, event: WindowEvent) {
        if self.state != WindowState::Active {
            return;
        }

        match &event {
            WindowEvent::CloseRequested => {
                self.request_close().await;
                return;
            }
            WindowEvent::Resized(w, h) => {
                self.geometry.width = *w;
                self.geometry.height = *h;
                self.update_video_transform();
                return;
            }
            WindowEvent::Moved(x, y) => {
                self.geometry.x = *x;
                self.geometry.y = *y;
                self.update_video_transform();
                return;
            }
            WindowEvent::FocusChanged(focused) => {
                self.geometry.focused = *focused;
                self.update_video_transform();
                return;
            }
            WindowEvent::ToggleFullscreen => {
                self.fullscreen = !self.fullscreen;
                self.update_video_transform();
                return;
            }
            WindowEvent::MouseMove(..) | WindowEvent::MouseWheel(_) => {
                if !self.config.input.capture_mouse {
                    return;
                }
            }
            WindowEvent::MouseButton(..) => {
                // Note: mouse input does not touch the event bridge;
                // synthetic and local input coexist.
                if !self.config.input.capture_mouse {
                    return;
                }
            }
            WindowEvent::Key(..) => {
                if !self.config.input.capture_keyboard || !self.keyboard_grabbed {
                    return;
                }
            }
        }

        let (rw, rh) = self.remote_size;
        let Some(action) = translate_event(
            &event,
            self.geometry.width,
            self.geometry.height,
            rw.max(1),
            rh.max(1),
        ) else {
            return;
        };

        if let Some(input) = &self.session_input {
            let result = match action {
                InputAction::Mouse(e) => input.send_mouse(e),
                InputAction::Key(e) => input.send_key(e),
            };
            if let Err(e) = result {
                warn!("failed to forward input: {e}");
            }
        }
    }

    /// Route one session lifecycle event.
    pub async fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Quit { reason, message } => {
                if reason.is_error() {
                    if message.is_empty() {
                        error!("session has quit: {reason}");
                    } else {
                        error!("session has quit: {reason}: {message}");
                    }
                } else {
                    info!("session stopped");
                }
                // The session is already gone; no disconnect prompt.
                self.state = WindowState::ShuttingDown;
                self.shutdown().await;
            }
            SessionEvent::PinRequested { incorrect } => {
                self.release_keyboard();
                let pin = self.pin_prompt.request_pin(incorrect);
                self.grab_keyboard();
                match (pin, self.session.as_ref()) {
                    (Some(pin), Some(session)) => session.set_login_pin(pin),
                    (None, Some(session)) => session.stop(),
                    _ => {}
                }
            }
        }
    }

    fn update_video_transform(&self) {
        let Some(session) = &self.session else {
            return;
        };
        if let Some(hw) = session.hw_decoder() {
            hw.set_transform(VideoTransform {
                x: self.geometry.x,
                y: self.geometry.y,
                width: self.geometry.width,
                height: self.geometry.height,
                focused: self.geometry.focused,
            });
        }
    }

    fn grab_keyboard(&mut self) {
        self.keyboard_grabbed = true;
    }

    fn release_keyboard(&mut self) {
        self.keyboard_grabbed = false;
    }

    // ── ShuttingDown ─────────────────────────────────────────────

    /// Begin closing; honours the disconnect policy.
    ///
    /// Returns `false` when the user cancelled and the window stays
    /// active.
    pub async fn request_close(&mut self) -> bool {
        if self.state != WindowState::Active {
            return self.state == WindowState::Closed;
        }
        self.state = WindowState::ShuttingDown;

        if let Some(session) = &self.session {
            if session.is_connected() {
                let decision = match self.config.session.disconnect_action {
                    DisconnectAction::Ask => self.disconnect_prompt.ask(),
                    DisconnectAction::AlwaysSleep => DisconnectDecision::Sleep,
                    DisconnectAction::Nothing => DisconnectDecision::Proceed,
                };
                match decision {
                    DisconnectDecision::Cancel => {
                        self.state = WindowState::Active;
                        return false;
                    }
                    DisconnectDecision::Sleep => session.request_standby(),
                    DisconnectDecision::Proceed => {}
                }
            }
        }

        self.shutdown().await;
        true
    }

    /// Tear everything down in dependency order.
    async fn shutdown(&mut self) {
        self.state = WindowState::ShuttingDown;

        // 1. Ask the session to stop streaming.
        if let Some(session) = &self.session {
            session.stop();
        }

        // 2. Event bridge listener.
        if let Some(listener) = self.listener.take() {
            listener.shutdown().await;
        }

        // 3. Uploader and surface.
        if let Some(stop) = self.render_stop.take() {
            let _ = stop.send(true);
        }
        if let Some(task) = self.render_task.take() {
            let _ = task.await;
        }
        self.surface = None;

        // 4. Session last.
        self.session_input = None;
        if let Some(session) = self.session.take() {
            session.shutdown().await;
        }

        self.state = WindowState::Closed;
        info!("stream window closed");
    }
}

impl Drop for StreamWindow {
    fn drop(&mut self) {
        // Same order as shutdown(), without awaiting: signal the
        // listener first, then the render task, then the session.
        if let Some(listener) = self.listener.take() {
            listener.terminate();
        }
        if let Some(stop) = self.render_stop.take() {
            let _ = stop.send(true);
        }
        self.surface = None;
        self.session_input = None;
        self.session = None;
    }
}

// ── Tests ────────────────────────────────────────────────────────
