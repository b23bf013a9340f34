//! Stream session — the control connection to the remote host.
//!
//! One TCP connection carries tagged messages in both directions:
//! input events from the client, decoded video frames and lifecycle
//! notices from the host.
//!
//! ## Wire format
//!
//! Every message is `tag (1) + len: u32 LE (4) + payload (len)`.
//!
//! ```text
//! Client ──[HELLO: Hello]────────────────────► Host
//! Host   ──[ACCEPT: Accept]──────────────────► Client
//! Client ──[MOUSE/KEY/CONTROLLER: bincode]───► Host   (repeated)
//! Host   ──[VIDEO: VideoPacket]──────────────► Client (repeated)
//! Host   ──[QUIT: QuitNotice]────────────────► Client
//! Host   ──[PIN_REQUEST: PinRequest]─────────► Client
//! Client ──[PIN: utf-8 digits]───────────────► Host
//! Client ──[STANDBY]─────────────────────────► Host
//! Client ──[STOP]────────────────────────────► Host
//! ```
//!
//! Concurrency: a reader task owns the read half and feeds the decoder
//! queue and the event channel; a writer task owns the write half and
//! drains the input command channel. [`SessionInput`] is a cloneable
//! handle that marshals injection calls onto the writer task, so it is
//! safe to call from any task.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use farview_core::error::FarviewError;
use farview_core::protocol::{ControllerState, KeyEvent, MouseEvent};
use farview_core::video::{FrameSource, PixelFormat, Plane, VideoFrame};
use farview_core::InputSink;

use crate::config::SessionConfig;

/// Message tags on the session stream.
pub mod tags {
    pub const HELLO: u8 = 0;
    pub const ACCEPT: u8 = 1;
    pub const MOUSE: u8 = 2;
    pub const KEY: u8 = 3;
    pub const CONTROLLER: u8 = 4;
    pub const VIDEO: u8 = 5;
    pub const QUIT: u8 = 6;
    pub const PIN_REQUEST: u8 = 7;
    pub const PIN: u8 = 8;
    pub const STANDBY: u8 = 9;
    pub const STOP: u8 = 10;
}

/// Session protocol version announced in the hello.
pub const PROTOCOL_VERSION: u32 = 1;

/// Upper bound on one tagged message (a 4K raw video packet fits).
const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Decoded frames buffered before the oldest is dropped.
const MAX_QUEUED_FRAMES: usize = 3;

// ── Handshake payloads ───────────────────────────────────────────

/// Client hello.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hello {
    pub client_name: String,
    pub protocol_version: u32,
}

/// Host accept: the negotiated video profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Accept {
    pub width: u32,
    pub height: u32,
    pub has_video: bool,
}

/// Host quit notice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuitNotice {
    pub reason: u8,
    pub message: String,
}

/// Host PIN request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinRequest {
    pub incorrect: bool,
}

/// One decoded frame on the wire: per-plane data with strides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoPacket {
    pub width: u32,
    pub height: u32,
    pub format: u8,
    pub planes: Vec<WirePlane>,
}

/// One plane of a [`VideoPacket`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WirePlane {
    pub stride: u32,
    pub data: Vec<u8>,
}

/// Encode a frame as a video packet payload (host side, test harnesses).
pub fn encode_video_packet(frame: &VideoFrame) -> Result<Vec<u8>, FarviewError> {
    let format = match frame.format {
        PixelFormat::Bgra8 => 0,
        PixelFormat::Rgba8 => 1,
        PixelFormat::Rgb8 => 2,
        PixelFormat::Yuv420 => 3,
    };
    let pkt = VideoPacket {
        width: frame.width,
        height: frame.height,
        format,
        planes: frame
            .planes
            .iter()
            .map(|p| WirePlane {
                stride: p.stride as u32,
                data: p.data.clone(),
            })
            .collect(),
    };
    Ok(bincode::serialize(&pkt)?)
}

fn decode_video_packet(payload: &[u8]) -> Result<VideoFrame, FarviewError> {
    let pkt: VideoPacket = bincode::deserialize(payload)?;
    let format = match pkt.format {
        0 => PixelFormat::Bgra8,
        1 => PixelFormat::Rgba8,
        2 => PixelFormat::Rgb8,
        3 => PixelFormat::Yuv420,
        _ => return Err(FarviewError::Protocol("unknown pixel format")),
    };
    let frame = VideoFrame {
        width: pkt.width,
        height: pkt.height,
        format,
        planes: pkt
            .planes
            .into_iter()
            .map(|p| Plane {
                data: p.data,
                stride: p.stride as usize,
            })
            .collect(),
    };
    frame.validate()?;
    Ok(frame)
}

// ── Wire primitives ──────────────────────────────────────────────

/// Read one tagged message.
pub async fn read_message<R: AsyncRead + Unpin>(r: &mut R) -> Result<(u8, Vec<u8>), FarviewError> {
    let mut header = [0u8; 5];
    r.read_exact(&mut header).await?;
    let tag = header[0];
    let len = u32::from_le_bytes(header[1..5].try_into().unwrap()) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(FarviewError::FrameTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload).await?;
    Ok((tag, payload))
}

/// Write one tagged message.
pub async fn write_message<W: AsyncWrite + Unpin>(
    w: &mut W,
    tag: u8,
    payload: &[u8],
) -> Result<(), FarviewError> {
    let mut header = [0u8; 5];
    header[0] = tag;
    header[1..5].copy_from_slice(&(payload.len() as u32).to_le_bytes());
    w.write_all(&header).await?;
    w.write_all(payload).await?;
    Ok(())
}

async fn write_payload<W: AsyncWrite + Unpin, T: Serialize>(
    w: &mut W,
    tag: u8,
    value: &T,
) -> Result<(), FarviewError> {
    write_message(w, tag, &bincode::serialize(value)?).await
}

// ── Lifecycle events ─────────────────────────────────────────────

/// Why the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitReason {
    /// Clean stop, requested by either side.
    Stopped,
    /// The host ended the session.
    RemoteDisconnected,
    /// The transport dropped unexpectedly.
    ConnectionLost,
    /// The host reported an error.
    Error,
}

impl QuitReason {
    pub fn from_wire(value: u8) -> Self {
        match value {
            0 => QuitReason::Stopped,
            1 => QuitReason::RemoteDisconnected,
            2 => QuitReason::ConnectionLost,
            _ => QuitReason::Error,
        }
    }

    /// Whether this reason should be surfaced as an error to the user.
    pub fn is_error(&self) -> bool {
        !matches!(self, QuitReason::Stopped)
    }
}

impl std::fmt::Display for QuitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuitReason::Stopped => write!(f, "stopped"),
            QuitReason::RemoteDisconnected => write!(f, "remote disconnected"),
            QuitReason::ConnectionLost => write!(f, "connection lost"),
            QuitReason::Error => write!(f, "session error"),
        }
    }
}

/// Lifecycle signals emitted by the session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The session has quit; the window should close.
    Quit { reason: QuitReason, message: String },
    /// The host wants a login PIN.
    PinRequested { incorrect: bool },
}

// ── Video decoder handle ─────────────────────────────────────────

/// The decoder seam: decoded frames queued by the session's receive
/// task, pulled by the uploader.
pub struct VideoDecoder {
    queue: Mutex<VecDeque<VideoFrame>>,
    notify: Notify,
}

impl VideoDecoder {
    fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    fn push(&self, frame: VideoFrame) {
        {
            let mut queue = self.queue.lock().unwrap();
            if queue.len() >= MAX_QUEUED_FRAMES {
                // Real-time display: stale frames are worthless.
                queue.pop_front();
            }
            queue.push_back(frame);
        }
        self.notify.notify_one();
    }

    /// Take one pending frame, if any.
    pub fn pull(&self) -> Option<VideoFrame> {
        self.queue.lock().unwrap().pop_front()
    }

    /// Wait until at least one frame is pending.
    pub async fn frames_available(&self) {
        loop {
            if !self.queue.lock().unwrap().is_empty() {
                return;
            }
            self.notify.notified().await;
        }
    }
}

/// [`FrameSource`] adapter over a shared decoder handle.
pub struct DecoderSource(pub Arc<VideoDecoder>);

impl FrameSource for DecoderSource {
    fn pull_frame(&mut self) -> Option<VideoFrame> {
        self.0.pull()
    }
}

// ── Hardware decoder collaborator ────────────────────────────────

/// Window geometry forwarded to a hardware decoder overlay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoTransform {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub focused: bool,
}

/// Optional hardware-decoder collaborator; the window pushes geometry
/// updates into it so the overlay tracks the window.
#[derive(Debug, Default)]
pub struct HwDecoderHandle {
    transform: Mutex<VideoTransform>,
}

impl HwDecoderHandle {
    pub fn set_transform(&self, transform: VideoTransform) {
        *self.transform.lock().unwrap() = transform;
    }

    pub fn transform(&self) -> VideoTransform {
        *self.transform.lock().unwrap()
    }
}

// ── Input handle ─────────────────────────────────────────────────

enum InputCommand {
    Mouse(MouseEvent),
    Key(KeyEvent),
    Controller(ControllerState),
    Pin(String),
    Standby,
    Stop,
}

/// Cloneable injection handle; sends are marshaled onto the session's
/// writer task, so this is safe to use from any task.
#[derive(Clone)]
pub struct SessionInput {
    tx: mpsc::UnboundedSender<InputCommand>,
}

impl SessionInput {
    pub fn send_mouse(&self, event: MouseEvent) -> Result<(), FarviewError> {
        self.send(InputCommand::Mouse(event))
    }

    pub fn send_key(&self, event: KeyEvent) -> Result<(), FarviewError> {
        self.send(InputCommand::Key(event))
    }

    pub fn send_controller(&self, state: ControllerState) -> Result<(), FarviewError> {
        self.send(InputCommand::Controller(state))
    }

    fn send(&self, cmd: InputCommand) -> Result<(), FarviewError> {
        self.tx.send(cmd).map_err(|_| FarviewError::ChannelClosed)
    }
}

impl InputSink for SessionInput {
    fn inject_controller(&self, state: ControllerState) -> Result<(), FarviewError> {
        self.send_controller(state)
    }
}

// ── StreamSession ────────────────────────────────────────────────

/// Owns the remote session: control connection, decoder handle,
/// lifecycle events, and the input-injection entry point.
pub struct StreamSession {
    input: SessionInput,
    input_rx: Option<mpsc::UnboundedReceiver<InputCommand>>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    decoder: Option<Arc<VideoDecoder>>,
    hw_decoder: Option<Arc<HwDecoderHandle>>,
    profile: Accept,
    connected: Arc<AtomicBool>,
    stop_tx: watch::Sender<bool>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
    pending_io: Option<(OwnedReadHalf, OwnedWriteHalf)>,
}

impl StreamSession {
    /// Connect to the host and perform the handshake.
    pub async fn connect(config: &SessionConfig) -> Result<Self, FarviewError> {
        let addr: SocketAddr = config.host_address.parse()?;
        let deadline = Duration::from_millis(config.timeout_ms);

        info!("connecting to host at {addr}");
        let stream = timeout(deadline, TcpStream::connect(addr))
            .await
            .map_err(|_| FarviewError::Timeout(deadline))??;
        stream.set_nodelay(true)?;
        let (mut read_half, mut write_half) = stream.into_split();

        let hello = Hello {
            client_name: config.client_name.clone(),
            protocol_version: PROTOCOL_VERSION,
        };
        write_payload(&mut write_half, tags::HELLO, &hello).await?;

        let (tag, payload) = timeout(deadline, read_message(&mut read_half))
            .await
            .map_err(|_| FarviewError::Timeout(deadline))??;
        if tag != tags::ACCEPT {
            return Err(FarviewError::Handshake("expected accept"));
        }
        let profile: Accept = bincode::deserialize(&payload)?;
        info!(
            width = profile.width,
            height = profile.height,
            video = profile.has_video,
            "session accepted"
        );

        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (stop_tx, _) = watch::channel(false);
        let decoder = profile.has_video.then(|| Arc::new(VideoDecoder::new()));

        Ok(Self {
            input: SessionInput { tx: input_tx },
            input_rx: Some(input_rx),
            events_tx,
            events_rx: Some(events_rx),
            decoder,
            hw_decoder: None,
            profile,
            connected: Arc::new(AtomicBool::new(true)),
            stop_tx,
            reader: None,
            writer: None,
            pending_io: Some((read_half, write_half)),
        })
    }

    /// Spawn the reader and writer tasks.
    pub fn start(&mut self) {
        let Some((read_half, write_half)) = self.pending_io.take() else {
            return;
        };
        let Some(input_rx) = self.input_rx.take() else {
            return;
        };

        self.writer = Some(tokio::spawn(writer_loop(
            write_half,
            input_rx,
            Arc::clone(&self.connected),
            self.stop_tx.clone(),
        )));
        self.reader = Some(tokio::spawn(reader_loop(
            read_half,
            self.decoder.clone(),
            self.events_tx.clone(),
            Arc::clone(&self.connected),
            self.stop_tx.subscribe(),
        )));
    }

    /// The decoder handle, present when the host streams video.
    pub fn video_decoder(&self) -> Option<Arc<VideoDecoder>> {
        self.decoder.clone()
    }

    /// Optional hardware decoder collaborator.
    pub fn hw_decoder(&self) -> Option<&Arc<HwDecoderHandle>> {
        self.hw_decoder.as_ref()
    }

    /// Attach a hardware decoder collaborator.
    pub fn set_hw_decoder(&mut self, handle: Arc<HwDecoderHandle>) {
        self.hw_decoder = Some(handle);
    }

    /// Negotiated video profile from the handshake.
    pub fn video_profile(&self) -> (u32, u32) {
        (self.profile.width, self.profile.height)
    }

    /// Cloneable input-injection handle.
    pub fn input_handle(&self) -> SessionInput {
        self.input.clone()
    }

    /// Take the lifecycle-event receiver (once).
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        self.events_rx.take()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Ask the remote console to go to sleep before disconnecting.
    pub fn request_standby(&self) {
        if let Err(e) = self.input.send(InputCommand::Standby) {
            warn!("standby request failed: {e}");
        }
    }

    /// Answer a PIN request.
    pub fn set_login_pin(&self, pin: String) {
        if let Err(e) = self.input.send(InputCommand::Pin(pin)) {
            warn!("pin submission failed: {e}");
        }
    }

    /// Request a clean session stop.
    pub fn stop(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            let _ = self.input.send(InputCommand::Stop);
        }
        let _ = self.stop_tx.send(true);
    }

    /// Stop and wait for the session tasks to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        for handle in [self.writer.take(), self.reader.take()].into_iter().flatten() {
            if timeout(Duration::from_secs(1), handle).await.is_err() {
                warn!("session task did not exit within 1s");
            }
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.stop_tx.send(true);
    }
}

// ── Task loops ───────────────────────────────────────────────────

async fn writer_loop(
    mut w: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<InputCommand>,
    connected: Arc<AtomicBool>,
    stop_tx: watch::Sender<bool>,
) {
    while let Some(cmd) = rx.recv().await {
        let result = match cmd {
            InputCommand::Mouse(e) => write_payload(&mut w, tags::MOUSE, &e).await,
            InputCommand::Key(e) => write_payload(&mut w, tags::KEY, &e).await,
            InputCommand::Controller(s) => write_message(&mut w, tags::CONTROLLER, &s.encode()).await,
            InputCommand::Pin(pin) => write_message(&mut w, tags::PIN, pin.as_bytes()).await,
            InputCommand::Standby => write_message(&mut w, tags::STANDBY, &[]).await,
            InputCommand::Stop => {
                let _ = write_message(&mut w, tags::STOP, &[]).await;
                break;
            }
        };
        if let Err(e) = result {
            warn!("session write failed: {e}");
            break;
        }
    }
    connected.store(false, Ordering::SeqCst);
    let _ = stop_tx.send(true);
    let _ = w.shutdown().await;
    debug!("session writer exited");
}

async fn reader_loop(
    mut r: OwnedReadHalf,
    decoder: Option<Arc<VideoDecoder>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    connected: Arc<AtomicBool>,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        let msg = tokio::select! {
            _ = stop_rx.changed() => break,
            m = read_message(&mut r) => m,
        };

        match msg {
            Ok((tags::VIDEO, payload)) => {
                if let Some(decoder) = &decoder {
                    match decode_video_packet(&payload) {
                        Ok(frame) => decoder.push(frame),
                        Err(e) => warn!("bad video packet: {e}"),
                    }
                }
            }
            Ok((tags::QUIT, payload)) => {
                let notice: QuitNotice = match bincode::deserialize(&payload) {
                    Ok(n) => n,
                    Err(_) => QuitNotice {
                        reason: 255,
                        message: "malformed quit notice".into(),
                    },
                };
                connected.store(false, Ordering::SeqCst);
                let _ = events.send(SessionEvent::Quit {
                    reason: QuitReason::from_wire(notice.reason),
                    message: notice.message,
                });
                break;
            }
            Ok((tags::PIN_REQUEST, payload)) => {
                let incorrect = bincode::deserialize::<PinRequest>(&payload)
                    .map(|r| r.incorrect)
                    .unwrap_or(false);
                let _ = events.send(SessionEvent::PinRequested { incorrect });
            }
            Ok((tag, _)) => warn!("unexpected session message tag {tag}"),
            Err(e) => {
                // Only surface transport loss if nobody asked to stop.
                if connected.swap(false, Ordering::SeqCst) {
                    warn!("session connection lost: {e}");
                    let _ = events.send(SessionEvent::Quit {
                        reason: QuitReason::ConnectionLost,
                        message: e.to_string(),
                    });
                }
                break;
            }
        }
    }
    debug!("session reader exited");
}

// ── Tests ────────────────────────────────────────────────────────
