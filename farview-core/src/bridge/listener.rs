//! Inbound synthetic-event listener.
//!
//! A dedicated worker task binds a UDP endpoint on a fixed local port,
//! receives one datagram per event, decodes the fixed-size
//! [`ControllerState`] record, and forwards it into the session through
//! an [`InputSink`].
//!
//! The receive is timeout-bounded rather than blocking, so a
//! [`terminate`](EventBridgeListener::terminate) is observed within one
//! poll interval. `terminate` is idempotent — calling it twice is a
//! no-op, not a double release.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::FarviewError;
use crate::protocol::ControllerState;

/// Fixed local port the event bridge binds.
pub const EVENT_BRIDGE_PORT: u16 = 5556;

/// Upper bound on one receive wait; also bounds shutdown latency.
pub const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(100);

// ── InputSink ────────────────────────────────────────────────────

/// Injection entry point the listener forwards decoded events into.
///
/// Implementations must be callable from the listener's worker task;
/// the session satisfies this by marshaling through a channel onto its
/// own writer task.
pub trait InputSink: Send + Sync + 'static {
    fn inject_controller(&self, state: ControllerState) -> Result<(), FarviewError>;
}

// ── EventBridgeListener ──────────────────────────────────────────

/// Background worker bridging external synthetic events into the
/// session.
pub struct EventBridgeListener {
    running: Arc<AtomicBool>,
    local_addr: SocketAddr,
    handle: Option<JoinHandle<()>>,
}

impl EventBridgeListener {
    /// Bind the fixed event-bridge port and start the worker task.
    pub async fn bind<S: InputSink>(sink: S) -> Result<Self, FarviewError> {
        Self::bind_addr(sink, SocketAddr::from(([0, 0, 0, 0], EVENT_BRIDGE_PORT))).await
    }

    /// Bind an explicit address (tests use an ephemeral port).
    pub async fn bind_addr<S: InputSink>(
        sink: S,
        addr: SocketAddr,
    ) -> Result<Self, FarviewError> {
        let socket = UdpSocket::bind(addr).await?;
        let local_addr = socket.local_addr()?;
        info!("event bridge listening on {local_addr}");

        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = tokio::spawn(async move {
            run_loop(socket, sink, flag).await;
        });

        Ok(Self {
            running,
            local_addr,
            handle: Some(handle),
        })
    }

    /// The bound local address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether the worker loop is still active.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Signal the worker to stop.
    ///
    /// Idempotent: the first call clears the flag, later calls are
    /// no-ops. The loop observes the flag within one poll interval.
    pub fn terminate(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            debug!("event bridge terminate requested");
        }
    }

    /// Terminate and wait for the worker to exit.
    pub async fn shutdown(mut self) {
        self.terminate();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for EventBridgeListener {
    fn drop(&mut self) {
        // Backstop for paths that never called shutdown(); the worker
        // exits within one poll interval and releases the socket.
        self.terminate();
    }
}

// ── Worker loop ──────────────────────────────────────────────────

async fn run_loop<S: InputSink>(socket: UdpSocket, sink: S, running: Arc<AtomicBool>) {
    let mut buf = [0u8; 64];

    while running.load(Ordering::SeqCst) {
        let received = match timeout(EVENT_POLL_INTERVAL, socket.recv_from(&mut buf)).await {
            // Poll tick: nothing arrived, re-check the stop flag.
            Err(_) => continue,
            Ok(Err(e)) => {
                warn!("event bridge receive failed: {e}; bridge disabled");
                break;
            }
            Ok(Ok((len, _peer))) => len,
        };

        match ControllerState::decode(&buf[..received]) {
            Ok(state) => {
                if let Err(e) = sink.inject_controller(state) {
                    warn!("input injection failed: {e}; bridge disabled");
                    break;
                }
            }
            Err(e) => debug!("dropping malformed event datagram: {e}"),
        }
    }

    running.store(false, Ordering::SeqCst);
    debug!("event bridge loop exited");
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    struct ChannelSink(mpsc::UnboundedSender<ControllerState>);

    impl InputSink for ChannelSink {
        fn inject_controller(&self, state: ControllerState) -> Result<(), FarviewError> {
            self.0.send(state).map_err(|_| FarviewError::ChannelClosed)
        }
    }

    async fn ephemeral_listener() -> (EventBridgeListener, mpsc::UnboundedReceiver<ControllerState>)
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = EventBridgeListener::bind_addr(
            ChannelSink(tx),
            SocketAddr::from(([127, 0, 0, 1], 0)),
        )
        .await
        .unwrap();
        (listener, rx)
    }

    #[tokio::test]
    async fn event_reaches_sink() {
        let (listener, mut rx) = ephemeral_listener().await;

        let state = ControllerState {
            buttons: 0x8001,
            l2: 3,
            r2: 4,
            left_x: -100,
            left_y: 100,
            right_x: 0,
            right_y: 0,
        };

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender
            .send_to(&state.encode(), listener.local_addr())
            .await
            .unwrap();

        let received = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for injection")
            .expect("sink channel closed");
        assert_eq!(received, state);

        listener.shutdown().await;
    }

    #[tokio::test]
    async fn malformed_datagram_is_skipped() {
        let (listener, mut rx) = ephemeral_listener().await;

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        // Wrong size, then a valid record.
        sender.send_to(&[1, 2, 3], listener.local_addr()).await.unwrap();
        let state = ControllerState::default();
        sender
            .send_to(&state.encode(), listener.local_addr())
            .await
            .unwrap();

        let received = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out")
            .expect("closed");
        assert_eq!(received, state);

        listener.shutdown().await;
    }

    #[tokio::test]
    async fn terminate_stops_within_bounded_intervals() {
        let (listener, _rx) = ephemeral_listener().await;
        assert!(listener.is_running());

        listener.terminate();
        // The loop must observe the flag within a few poll intervals.
        let deadline = EVENT_POLL_INTERVAL * 5;
        timeout(deadline, listener.shutdown())
            .await
            .expect("listener did not stop within the poll bound");
    }

    #[tokio::test]
    async fn terminate_is_idempotent() {
        let (listener, _rx) = ephemeral_listener().await;

        listener.terminate();
        listener.terminate();
        assert!(!listener.is_running());

        listener.shutdown().await;
    }
}
