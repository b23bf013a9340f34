//! Integration tests — full window lifecycle against a fake host on
//! localhost: frame forwarding end-to-end, synthetic event injection,
//! and teardown ordering.

use std::net::SocketAddr;
use std::time::Duration;

use futures::StreamExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::codec::FramedRead;

use farview_core::protocol::buttons;
use farview_core::{ControllerState, FrameCodec, PixelFormat, VideoFrame};
use farview_gui::config::GuiConfig;
use farview_gui::session::{
    Accept, Hello, encode_video_packet, read_message, tags, write_message,
};
use farview_gui::window::{
    DisconnectDecision, DisconnectPrompt, HeadlessPrompt, PinPrompt, StreamWindow, WindowState,
};

// ── Fake host ────────────────────────────────────────────────────

/// Accept one session and complete the handshake.
async fn accept_session(
    listener: &TcpListener,
    width: u32,
    height: u32,
    has_video: bool,
) -> (OwnedReadHalf, OwnedWriteHalf) {
    let (stream, _) = listener.accept().await.unwrap();
    let (mut read_half, mut write_half) = stream.into_split();

    let (tag, payload) = read_message(&mut read_half).await.unwrap();
    assert_eq!(tag, tags::HELLO);
    let hello: Hello = bincode::deserialize(&payload).unwrap();
    assert_eq!(hello.client_name, "farview");

    let accept = Accept {
        width,
        height,
        has_video,
    };
    write_message(
        &mut write_half,
        tags::ACCEPT,
        &bincode::serialize(&accept).unwrap(),
    )
    .await
    .unwrap();

    (read_half, write_half)
}

fn bgra_frame(width: u32, height: u32, fill: u8) -> VideoFrame {
    VideoFrame::packed(
        PixelFormat::Bgra8,
        width,
        height,
        vec![fill; width as usize * 4 * height as usize],
        width as usize * 4,
    )
}

async fn send_frame(write_half: &mut OwnedWriteHalf, frame: &VideoFrame) {
    let payload = encode_video_packet(frame).unwrap();
    write_message(write_half, tags::VIDEO, &payload)
        .await
        .unwrap();
}

fn test_config(host_addr: SocketAddr) -> GuiConfig {
    let mut config = GuiConfig::default();
    config.session.host_address = host_addr.to_string();
    config.session.timeout_ms = 2000;
    config
}

struct FixedPrompt(DisconnectDecision);

impl DisconnectPrompt for FixedPrompt {
    fn ask(&self) -> DisconnectDecision {
        self.0
    }
}

impl PinPrompt for FixedPrompt {
    fn request_pin(&self, _incorrect: bool) -> Option<String> {
        Some("1234".into())
    }
}

// ── End-to-end: frame forwarding ─────────────────────────────────

#[tokio::test]
async fn pipeline_forwards_frames_with_exact_headers() {
    // External frame consumer.
    let dispatch = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dispatch_addr = dispatch.local_addr().unwrap();

    let consumer = tokio::spawn(async move {
        let (stream, _) = dispatch.accept().await.unwrap();
        let mut framed = FramedRead::new(stream, FrameCodec);
        let mut headers = Vec::new();
        for _ in 0..3 {
            let msg = timeout(Duration::from_secs(5), framed.next())
                .await
                .expect("timeout")
                .expect("stream ended early")
                .expect("decode failed");
            headers.push((msg.height, msg.width, msg.channels));
        }
        headers
    });

    // Fake streaming host.
    let host = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let host_addr = host.local_addr().unwrap();
    let host_task = tokio::spawn(async move {
        let (_read_half, mut write_half) = accept_session(&host, 640, 480, true).await;
        send_frame(&mut write_half, &bgra_frame(640, 480, 1)).await;
        send_frame(&mut write_half, &bgra_frame(640, 480, 2)).await;
        send_frame(&mut write_half, &bgra_frame(320, 240, 3)).await;
        // Keep the connection open until the test finishes.
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    let mut config = test_config(host_addr);
    config.bridge.forward_frames = true;
    config.bridge.dispatch_addr = dispatch_addr.to_string();

    let mut window = StreamWindow::new(
        config,
        Box::new(HeadlessPrompt),
        Box::new(HeadlessPrompt),
    );
    window.set_event_port(0); // ephemeral; this test exercises the outbound side
    window.init().await.unwrap();
    assert_eq!(window.state(), WindowState::Active);

    let headers = timeout(Duration::from_secs(5), consumer)
        .await
        .expect("consumer timed out")
        .unwrap();
    assert_eq!(headers, vec![(480, 640, 3), (480, 640, 3), (240, 320, 3)]);

    // The same frames were published locally.
    let surface = window.surface().expect("surface exists");
    assert!(surface.generation() >= 1);
    let frame = surface.frame().expect("frame published");
    assert_eq!(frame.data().len() % 3, 0);

    window.request_close().await;
    assert_eq!(window.state(), WindowState::Closed);
    host_task.abort();
}

// ── End-to-end: synthetic event injection ────────────────────────

#[tokio::test]
async fn pipeline_injects_bridge_events_into_session() {
    let host = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let host_addr = host.local_addr().unwrap();

    // The host records controller messages it receives.
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let host_task = tokio::spawn(async move {
        let (mut read_half, _write_half) = accept_session(&host, 0, 0, false).await;
        loop {
            let Ok((tag, payload)) = read_message(&mut read_half).await else {
                break;
            };
            if tag == tags::CONTROLLER {
                let _ = seen_tx.send(ControllerState::decode(&payload).unwrap());
            }
            if tag == tags::STOP {
                break;
            }
        }
    });

    let mut window = StreamWindow::new(
        test_config(host_addr),
        Box::new(HeadlessPrompt),
        Box::new(HeadlessPrompt),
    );
    window.set_event_port(0);
    window.init().await.unwrap();
    assert_eq!(window.state(), WindowState::Active);
    assert!(window.bridge_active());
    assert!(window.surface().is_none(), "no video means placeholder");

    // The bridge port was bound ephemerally; discover it through the
    // listener and produce one datagram.
    let state = ControllerState {
        buttons: buttons::TRIANGLE,
        l2: 9,
        r2: 0,
        left_x: 5,
        left_y: -5,
        right_x: 0,
        right_y: 0,
    };
    let producer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let bridge_port = window.bridge_port().expect("bridge bound");
    producer
        .send_to(
            &state.encode(),
            SocketAddr::from(([127, 0, 0, 1], bridge_port)),
        )
        .await
        .unwrap();

    let injected = timeout(Duration::from_secs(5), seen_rx.recv())
        .await
        .expect("host never saw the controller event")
        .expect("host channel closed");
    assert_eq!(injected, state);

    window.request_close().await;
    assert_eq!(window.state(), WindowState::Closed);
    let _ = timeout(Duration::from_secs(2), host_task).await;
}

// ── Lifecycle ────────────────────────────────────────────────────

#[tokio::test]
async fn cancel_keeps_the_window_active() {
    let host = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let host_addr = host.local_addr().unwrap();
    let host_task = tokio::spawn(async move {
        let halves = accept_session(&host, 640, 480, true).await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(halves);
    });

    let mut window = StreamWindow::new(
        test_config(host_addr),
        Box::new(FixedPrompt(DisconnectDecision::Cancel)),
        Box::new(HeadlessPrompt),
    );
    window.set_event_port(0);
    window.init().await.unwrap();

    // Cancel aborts the transition; the window stays active.
    assert!(!window.request_close().await);
    assert_eq!(window.state(), WindowState::Active);
    assert!(window.bridge_active());

    // Closing again with the same prompt still cancels; drop instead.
    drop(window);
    host_task.abort();
}

#[tokio::test]
async fn construct_then_destroy_releases_in_order() {
    let host = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let host_addr = host.local_addr().unwrap();

    // The host observes the STOP that session teardown sends.
    let (stopped_tx, mut stopped_rx) = mpsc::unbounded_channel();
    let host_task = tokio::spawn(async move {
        let (mut read_half, mut write_half) = accept_session(&host, 640, 480, true).await;
        send_frame(&mut write_half, &bgra_frame(640, 480, 7)).await;
        loop {
            let Ok((tag, _)) = read_message(&mut read_half).await else {
                let _ = stopped_tx.send(());
                break;
            };
            if tag == tags::STOP {
                let _ = stopped_tx.send(());
                break;
            }
        }
    });

    let mut window = StreamWindow::new(
        test_config(host_addr),
        Box::new(HeadlessPrompt),
        Box::new(HeadlessPrompt),
    );
    window.set_event_port(0);
    window.init().await.unwrap();
    assert!(window.bridge_active());

    // Immediate close with an active uploader and listener.
    assert!(window.request_close().await);
    assert_eq!(window.state(), WindowState::Closed);
    assert!(!window.bridge_active());
    assert!(window.surface().is_none());

    timeout(Duration::from_secs(2), stopped_rx.recv())
        .await
        .expect("host never saw the session stop")
        .expect("host channel closed");
    let _ = timeout(Duration::from_secs(2), host_task).await;
}

#[tokio::test]
async fn host_quit_closes_the_window() {
    use farview_gui::session::QuitNotice;

    let host = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let host_addr = host.local_addr().unwrap();
    let host_task = tokio::spawn(async move {
        let (_read_half, mut write_half) = accept_session(&host, 0, 0, false).await;
        let notice = QuitNotice {
            reason: 0, // clean stop
            message: String::new(),
        };
        write_message(
            &mut write_half,
            tags::QUIT,
            &bincode::serialize(&notice).unwrap(),
        )
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let mut window = StreamWindow::new(
        test_config(host_addr),
        Box::new(HeadlessPrompt),
        Box::new(HeadlessPrompt),
    );
    window.set_event_port(0);
    window.init().await.unwrap();

    // Drive the window; the quit notice must close it without any
    // window event arriving.
    let (_event_tx, event_rx) = mpsc::channel(4);
    timeout(Duration::from_secs(5), window.run(event_rx))
        .await
        .expect("window did not close on session quit")
        .unwrap();
    assert_eq!(window.state(), WindowState::Closed);
    host_task.abort();
}
