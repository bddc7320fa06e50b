//! Channel lifecycle against a local WebSocket server.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use portal_api::websocket::{ChannelEvent, ChannelHandle};
use portal_api::{Message, MessageKind, ReconnectConfig};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use url::Url;

fn fast_reconnect() -> ReconnectConfig {
    ReconnectConfig {
        interval: Duration::from_millis(20),
        max_delay: Duration::from_millis(100),
        max_attempts: 3,
    }
}

async fn next_event(events: &mut tokio::sync::mpsc::Receiver<ChannelEvent>) -> ChannelEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("channel event timed out")
        .expect("channel task exited")
}

#[tokio::test]
async fn delivers_frames_and_writes_requests() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = Url::parse(&format!("ws://{}/", listener.local_addr().unwrap())).unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(tungstenite::Message::text("garbage")).await.unwrap();
        ws.send(tungstenite::Message::text(
            r#"{"type":"event","target":"system","status":"ws_ready"}"#,
        ))
        .await
        .unwrap();

        let frame = ws.next().await.unwrap().unwrap();
        let text = frame.into_text().unwrap();
        ws.close(None).await.unwrap();
        text.as_str().to_owned()
    });

    let cancel = CancellationToken::new();
    let (handle, mut events) = ChannelHandle::spawn(url, fast_reconnect(), cancel.clone());

    assert_eq!(next_event(&mut events).await, ChannelEvent::Opened);
    match next_event(&mut events).await {
        ChannelEvent::Frame(msg) => assert!(msg.is_ready()),
        other => panic!("expected ready frame, got {other:?}"),
    }

    assert!(handle.send(Message::request("wifi", "ap_config")));
    let written: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
    assert_eq!(written["type"], "request");
    assert_eq!(written["action"], "ap_config");

    match next_event(&mut events).await {
        ChannelEvent::Closed { attempt, retry_in } => {
            assert_eq!(attempt, 1);
            assert_eq!(retry_in, Duration::from_millis(20));
        }
        other => panic!("expected close, got {other:?}"),
    }

    handle.shutdown();
}

#[tokio::test]
async fn gives_up_after_three_failed_attempts() {
    // Bind then drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = Url::parse(&format!("ws://{}/", listener.local_addr().unwrap())).unwrap();
    drop(listener);

    let (_handle, mut events) =
        ChannelHandle::spawn(url, fast_reconnect(), CancellationToken::new());

    let mut delays = Vec::new();
    loop {
        match next_event(&mut events).await {
            ChannelEvent::Closed { retry_in, .. } => delays.push(retry_in),
            ChannelEvent::GaveUp { attempts } => {
                assert_eq!(attempts, 3);
                break;
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    assert_eq!(
        delays,
        vec![
            Duration::from_millis(20),
            Duration::from_millis(40),
            Duration::from_millis(60),
        ]
    );
    assert!(events.recv().await.is_none());
}

#[tokio::test]
async fn reconnect_resets_after_successful_open() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = Url::parse(&format!("ws://{}/", listener.local_addr().unwrap())).unwrap();

    tokio::spawn(async move {
        for _ in 0..2 {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(tungstenite::Message::text(
                r#"{"type":"response","target":"device","status":"load_partial","data":{"hostname":"strip"}}"#,
            ))
            .await
            .unwrap();
            ws.close(None).await.unwrap();
            // Drain until the client acknowledges the close.
            while let Some(Ok(_)) = ws.next().await {}
        }
    });

    let cancel = CancellationToken::new();
    let (_handle, mut events) = ChannelHandle::spawn(url, fast_reconnect(), cancel.clone());

    for _ in 0..2 {
        assert_eq!(next_event(&mut events).await, ChannelEvent::Opened);
        match next_event(&mut events).await {
            ChannelEvent::Frame(msg) => assert_eq!(msg.kind, MessageKind::Response),
            other => panic!("expected response frame, got {other:?}"),
        }
        match next_event(&mut events).await {
            ChannelEvent::Closed { attempt, .. } => assert_eq!(attempt, 1),
            other => panic!("expected close, got {other:?}"),
        }
    }

    cancel.cancel();
}
