//! End-to-end bridge tests
//!
//! These tests start a real bridge on a TCP port, drive it with a Thrift
//! client, and check what reaches the publisher.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use bytes::Bytes;
use flume_bridge::thrift::{encode_append, write_frame};
use flume_bridge::{
    publisher_fn, Bridge, BridgeConfig, BridgeError, BridgeState, Event, Protocol, PublishError,
    Publisher, QueueChannel, RpcClient, Status,
};
use parking_lot::Mutex;
use std::net::TcpListener;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

// ============================================================================
// Recording Publisher - captures every publish call
// ============================================================================

#[derive(Clone, Default)]
struct RecordingPublisher {
    calls: Arc<Mutex<Vec<Bytes>>>,
}

impl RecordingPublisher {
    fn calls(&self) -> Vec<Bytes> {
        self.calls.lock().clone()
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&self, payload: Bytes) -> Result<(), PublishError> {
        self.calls.lock().push(payload);
        Ok(())
    }
}

// ============================================================================
// Test Helpers
// ============================================================================

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn port_is_free(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_ok()
}

async fn running_bridge(publisher: impl Publisher + 'static, port: u16) -> Bridge {
    let mut bridge = Bridge::new(publisher);
    bridge.configure("127.0.0.1", u32::from(port)).unwrap();
    bridge.initialize().unwrap();
    bridge.start().await.unwrap();
    bridge
}

fn event(body: &str) -> Event {
    Event::new(Bytes::copy_from_slice(body.as_bytes()))
}

// ============================================================================
// Delivery
// ============================================================================

#[tokio::test]
async fn test_single_event_published_unchanged() {
    let publisher = RecordingPublisher::default();
    let port = free_port();
    let mut bridge = running_bridge(publisher.clone(), port).await;

    let payload: Vec<u8> = (0u8..=255).collect();
    let mut client = RpcClient::connect(("127.0.0.1", port), Protocol::Compact)
        .await
        .unwrap();
    let status = client
        .append(&Event::new(Bytes::from(payload.clone())).with_header("host", "a"))
        .await
        .unwrap();

    assert_eq!(status, Status::Ok);
    assert_eq!(publisher.calls(), vec![Bytes::from(payload)]);

    bridge.stop().await;
}

#[tokio::test]
async fn test_sequential_events_keep_order() {
    let publisher = RecordingPublisher::default();
    let port = free_port();
    let mut bridge = running_bridge(publisher.clone(), port).await;

    let mut client = RpcClient::connect(("127.0.0.1", port), Protocol::Compact)
        .await
        .unwrap();
    for i in 0..50 {
        let status = client.append(&event(&format!("event-{i}"))).await.unwrap();
        assert_eq!(status, Status::Ok);
    }

    let expected: Vec<Bytes> = (0..50)
        .map(|i| Bytes::from(format!("event-{i}")))
        .collect();
    assert_eq!(publisher.calls(), expected);

    bridge.stop().await;
}

#[tokio::test]
async fn test_batch_keeps_order() {
    let publisher = RecordingPublisher::default();
    let port = free_port();
    let mut bridge = running_bridge(publisher.clone(), port).await;

    let events: Vec<Event> = ["first", "second", "third"].into_iter().map(event).collect();
    let mut client = RpcClient::connect(("127.0.0.1", port), Protocol::Compact)
        .await
        .unwrap();
    assert_eq!(client.append_batch(&events).await.unwrap(), Status::Ok);

    assert_eq!(
        publisher.calls(),
        vec![
            Bytes::from_static(b"first"),
            Bytes::from_static(b"second"),
            Bytes::from_static(b"third"),
        ]
    );
    let metrics = bridge.metrics().unwrap();
    assert_eq!(metrics.append_batch_accepted.get(), 1);
    assert_eq!(metrics.events_accepted.get(), 3);

    bridge.stop().await;
}

#[tokio::test]
async fn test_empty_body_forwarded() {
    let publisher = RecordingPublisher::default();
    let port = free_port();
    let mut bridge = running_bridge(publisher.clone(), port).await;

    let mut client = RpcClient::connect(("127.0.0.1", port), Protocol::Compact)
        .await
        .unwrap();
    assert_eq!(client.append(&Event::default()).await.unwrap(), Status::Ok);

    assert_eq!(publisher.calls(), vec![Bytes::new()]);

    bridge.stop().await;
}

#[tokio::test]
async fn test_binary_protocol() {
    let queue = Arc::new(QueueChannel::new());
    let port = free_port();

    let mut bridge = Bridge::with_config(queue.clone(), {
        let mut config = BridgeConfig::new("127.0.0.1", port);
        config.protocol = Protocol::Binary;
        config
    });
    bridge.initialize().unwrap();
    bridge.start().await.unwrap();

    let mut client = RpcClient::connect(("127.0.0.1", port), Protocol::Binary)
        .await
        .unwrap();
    assert_eq!(client.append(&event("binary")).await.unwrap(), Status::Ok);
    assert_eq!(queue.receive(), Some(Bytes::from_static(b"binary")));

    bridge.stop().await;
}

#[tokio::test]
async fn test_concurrent_clients_all_delivered() {
    let queue = Arc::new(QueueChannel::new());
    let port = free_port();
    let mut bridge = running_bridge(queue.clone(), port).await;

    let mut tasks = Vec::new();
    for c in 0..4 {
        tasks.push(tokio::spawn(async move {
            let mut client = RpcClient::connect(("127.0.0.1", port), Protocol::Compact)
                .await
                .unwrap();
            for i in 0..10 {
                let status = client.append(&event(&format!("{c}-{i}"))).await.unwrap();
                assert_eq!(status, Status::Ok);
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let received = queue.clear();
    assert_eq!(received.len(), 40);
    // Per-connection order holds even when connections interleave
    for c in 0..4 {
        let prefix = format!("{c}-");
        let from_client: Vec<Bytes> = received
            .iter()
            .filter(|b| b.starts_with(prefix.as_bytes()))
            .cloned()
            .collect();
        let expected: Vec<Bytes> = (0..10).map(|i| Bytes::from(format!("{c}-{i}"))).collect();
        assert_eq!(from_client, expected);
    }

    bridge.stop().await;
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_publisher_failure_reported_as_failed() {
    let queue = Arc::new(QueueChannel::bounded(1));
    let port = free_port();
    let mut bridge = running_bridge(queue.clone(), port).await;

    let mut client = RpcClient::connect(("127.0.0.1", port), Protocol::Compact)
        .await
        .unwrap();
    assert_eq!(client.append(&event("fits")).await.unwrap(), Status::Ok);
    assert_eq!(client.append(&event("overflow")).await.unwrap(), Status::Failed);

    // The connection survives a refused event
    queue.clear();
    assert_eq!(client.append(&event("again")).await.unwrap(), Status::Ok);
    assert_eq!(bridge.metrics().unwrap().channel_write_fail.get(), 1);

    bridge.stop().await;
}

#[tokio::test]
async fn test_bind_conflict_leaves_bridge_initialized() {
    let holder = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = holder.local_addr().unwrap().port();

    let mut bridge = Bridge::new(RecordingPublisher::default());
    bridge.configure("127.0.0.1", u32::from(port)).unwrap();
    bridge.initialize().unwrap();

    let err = bridge.start().await.unwrap_err();
    assert!(matches!(err, BridgeError::Bind { .. }));
    assert_eq!(bridge.state(), BridgeState::Initialized);

    // Cleanup stays safe after a failed start
    bridge.stop().await;

    // Retry on another port
    drop(holder);
    let port = free_port();
    bridge.configure("127.0.0.1", u32::from(port)).unwrap();
    bridge.initialize().unwrap();
    bridge.start().await.unwrap();
    assert_eq!(bridge.local_addr().unwrap().port(), port);
    bridge.stop().await;
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_stop_without_start_is_idempotent() {
    let mut bridge = Bridge::new(RecordingPublisher::default());

    bridge.stop().await;
    bridge.stop().await;
    assert_eq!(bridge.state(), BridgeState::Uninitialized);

    bridge.initialize().unwrap();
    bridge.stop().await;
    bridge.stop().await;
    assert_eq!(bridge.state(), BridgeState::Initialized);
}

#[tokio::test]
async fn test_stop_twice_after_running() {
    let port = free_port();
    let mut bridge = running_bridge(RecordingPublisher::default(), port).await;

    bridge.stop().await;
    bridge.stop().await;
    assert_eq!(bridge.state(), BridgeState::Stopped);
}

#[tokio::test]
async fn test_start_without_initialize_does_not_bind() {
    let port = free_port();
    let mut bridge = Bridge::new(RecordingPublisher::default());
    bridge.configure("127.0.0.1", u32::from(port)).unwrap();

    let err = bridge.start().await.unwrap_err();

    assert!(matches!(err, BridgeError::IllegalState { .. }));
    assert!(port_is_free(port));
    assert!(bridge.local_addr().is_none());
}

#[tokio::test]
async fn test_port_released_for_fresh_bridge() {
    let port = free_port();
    let mut first = running_bridge(RecordingPublisher::default(), port).await;
    assert!(!port_is_free(port));

    first.stop().await;

    let publisher = RecordingPublisher::default();
    let mut second = running_bridge(publisher.clone(), port).await;
    let mut client = RpcClient::connect(("127.0.0.1", port), Protocol::Compact)
        .await
        .unwrap();
    assert_eq!(client.append(&event("second")).await.unwrap(), Status::Ok);
    assert_eq!(publisher.calls(), vec![Bytes::from_static(b"second")]);

    second.stop().await;
}

#[tokio::test]
async fn test_restart_after_stop() {
    let port = free_port();
    let publisher = RecordingPublisher::default();
    let mut bridge = running_bridge(publisher.clone(), port).await;
    bridge.stop().await;

    bridge.initialize().unwrap();
    bridge.start().await.unwrap();
    assert_eq!(bridge.state(), BridgeState::Running);

    let mut client = RpcClient::connect(("127.0.0.1", port), Protocol::Compact)
        .await
        .unwrap();
    assert_eq!(client.append(&event("restarted")).await.unwrap(), Status::Ok);
    assert_eq!(publisher.calls(), vec![Bytes::from_static(b"restarted")]);

    bridge.stop().await;
}

#[tokio::test]
async fn test_configure_while_running_rejected() {
    let port = free_port();
    let mut bridge = running_bridge(RecordingPublisher::default(), port).await;

    let err = bridge.configure("127.0.0.1", 9999).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::IllegalState {
            state: BridgeState::Running,
            ..
        }
    ));
    assert!(matches!(
        bridge.initialize(),
        Err(BridgeError::IllegalState { .. })
    ));
    assert_eq!(bridge.config().port, port);
    assert_eq!(bridge.state(), BridgeState::Running);
    assert!(!port_is_free(port));

    bridge.stop().await;
}

#[tokio::test]
async fn test_bridges_coexist() {
    let a = RecordingPublisher::default();
    let b = RecordingPublisher::default();
    let (port_a, port_b) = (free_port(), free_port());
    let mut bridge_a = running_bridge(a.clone(), port_a).await;
    let mut bridge_b = running_bridge(b.clone(), port_b).await;

    let mut client = RpcClient::connect(("127.0.0.1", port_a), Protocol::Compact)
        .await
        .unwrap();
    client.append(&event("to-a")).await.unwrap();

    assert_eq!(a.calls(), vec![Bytes::from_static(b"to-a")]);
    assert!(b.calls().is_empty());
    assert_eq!(bridge_a.metrics().unwrap().events_accepted.get(), 1);
    assert_eq!(bridge_b.metrics().unwrap().events_accepted.get(), 0);

    bridge_a.stop().await;
    bridge_b.stop().await;
}

// ============================================================================
// Misbehaving clients
// ============================================================================

#[tokio::test]
async fn test_stop_returns_while_client_ignores_replies() {
    let published = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&published);
    let port = free_port();
    let mut bridge = running_bridge(
        publisher_fn(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }),
        port,
    )
    .await;

    // Pipeline calls without ever reading a reply until both socket buffers fill
    let mut chunk = Vec::new();
    for seq in 0..1000 {
        let call = encode_append(Protocol::Compact, seq, &event("flood")).unwrap();
        write_frame(&mut chunk, &call).await.unwrap();
    }
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let writer = tokio::spawn(async move {
        while stream.write_all(&chunk).await.is_ok() {}
    });

    while published.load(Ordering::Relaxed) == 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(300)).await;

    tokio::time::timeout(Duration::from_secs(3), bridge.stop())
        .await
        .expect("stop must not wait on a client that stopped reading");

    assert_eq!(bridge.state(), BridgeState::Stopped);
    assert!(port_is_free(port));
    assert_eq!(bridge.metrics().unwrap().connections_open.get(), 0);
    writer.abort();
}

async fn send_raw_frame(port: u16, frame: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    write_frame(&mut stream, frame).await.unwrap();

    let mut reply = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut reply))
        .await
        .expect("server must close the connection");
    // A reset counts as closed as well
    if read.is_err() {
        reply.clear();
    }
    reply
}

#[tokio::test]
async fn test_negative_length_in_frame_closes_connection() {
    let publisher = RecordingPublisher::default();
    let port = free_port();
    let mut bridge = Bridge::with_config(publisher.clone(), {
        let mut config = BridgeConfig::new("127.0.0.1", port);
        config.protocol = Protocol::Binary;
        config
    });
    bridge.initialize().unwrap();
    bridge.start().await.unwrap();

    // strict binary call header, then a method name length of -1
    let reply = send_raw_frame(port, &[0x80, 0x01, 0x00, 0x01, 0xff, 0xff, 0xff, 0xff]).await;

    assert!(reply.is_empty());
    let metrics = bridge.metrics().unwrap();
    assert_eq!(metrics.malformed_frames.get(), 1);
    assert_eq!(metrics.connections_open.get(), 0);

    // The listener keeps serving other clients
    let mut client = RpcClient::connect(("127.0.0.1", port), Protocol::Binary)
        .await
        .unwrap();
    assert_eq!(client.append(&event("after")).await.unwrap(), Status::Ok);
    assert_eq!(publisher.calls(), vec![Bytes::from_static(b"after")]);

    bridge.stop().await;
}

#[tokio::test]
async fn test_oversized_declared_body_closes_connection() {
    let publisher = RecordingPublisher::default();
    let port = free_port();
    let mut bridge = running_bridge(publisher.clone(), port).await;

    // compact append whose event body claims 4 GiB inside a 20 byte frame
    let mut frame = vec![0x82, 0x21, 0x01, 0x06];
    frame.extend_from_slice(b"append");
    frame.extend_from_slice(&[0x1c, 0x28, 0xff, 0xff, 0xff, 0xff, 0x0f]);
    let reply = send_raw_frame(port, &frame).await;

    assert!(reply.is_empty());
    assert!(publisher.calls().is_empty());
    let metrics = bridge.metrics().unwrap();
    assert_eq!(metrics.malformed_frames.get(), 1);
    assert_eq!(metrics.connections_open.get(), 0);

    bridge.stop().await;
}

#[tokio::test]
async fn test_length_prefix_over_limit_closes_connection() {
    let port = free_port();
    let mut bridge = running_bridge(RecordingPublisher::default(), port).await;

    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    stream.write_all(&u32::MAX.to_be_bytes()).await.unwrap();
    let mut reply = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut reply))
        .await
        .expect("server must close the connection");

    assert!(read.map_or(true, |n| n == 0));
    let metrics = bridge.metrics().unwrap();
    assert_eq!(metrics.malformed_frames.get(), 1);
    assert_eq!(metrics.connections_open.get(), 0);

    bridge.stop().await;
}

// ============================================================================
// Acceptance
// ============================================================================

#[tokio::test]
async fn test_testing_payload_on_default_port() {
    if !port_is_free(4141) {
        eprintln!("skipping: 127.0.0.1:4141 is in use");
        return;
    }

    let queue = Arc::new(QueueChannel::new());
    let mut bridge = Bridge::new(queue.clone());
    bridge.configure("127.0.0.1", 4141).unwrap();
    bridge.initialize().unwrap();
    bridge.start().await.unwrap();

    let mut client = RpcClient::connect("127.0.0.1:4141", Protocol::Compact)
        .await
        .unwrap();
    let status = client
        .append(&Event::new(Bytes::from_static(b"testing")))
        .await
        .unwrap();

    assert_eq!(status, Status::Ok);
    assert_eq!(queue.clear(), vec![Bytes::from_static(b"testing")]);
    assert!(queue.is_empty());

    bridge.stop().await;
}
