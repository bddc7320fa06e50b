//! Portal WebSocket channel with bounded auto-reconnect.
//!
//! A background task owns the socket. Decoded frames and lifecycle changes
//! are delivered in order on an [`mpsc`] receiver; outbound requests are
//! queued on the handle. After a close the task waits according to
//! [`ReconnectPolicy`] and tries again, giving up once the budget is spent.
//!
//! # Example
//!
//! ```rust,ignore
//! use portal_api::websocket::{ChannelEvent, ChannelHandle};
//! use portal_api::{Message, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let url = portal_api::endpoint::endpoint_for_origin("http://192.168.4.1")?;
//! let (handle, mut events) = ChannelHandle::spawn(url, ReconnectConfig::default(), CancellationToken::new());
//!
//! while let Some(event) = events.recv().await {
//!     if let ChannelEvent::Frame(msg) = event {
//!         if msg.is_ready() {
//!             handle.send(Message::request("wifi", "ap_config"));
//!         }
//!     }
//! }
//! ```

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::codec;
use crate::error::Error;
use crate::message::Message;
use crate::reconnect::{ReconnectConfig, ReconnectPolicy};

// ── Channel capacity ─────────────────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 256;

// ── ChannelEvent ─────────────────────────────────────────────────────

/// Lifecycle and data notifications from the channel task.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The socket is open and outbound frames are being written.
    Opened,

    /// A decoded inbound frame.
    Frame(Message),

    /// The socket closed or failed to open. Another attempt follows after
    /// `retry_in`.
    Closed { attempt: u32, retry_in: Duration },

    /// The reconnect budget is spent. The task has exited.
    GaveUp { attempts: u32 },
}

// ── ChannelHandle ────────────────────────────────────────────────────

/// Handle to a running portal channel.
///
/// Dropping the handle closes the outbound queue, which the task treats
/// as a shutdown request.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    outbound: mpsc::UnboundedSender<Message>,
    cancel: CancellationToken,
}

impl ChannelHandle {
    /// Spawn the channel task. The first connection attempt starts
    /// immediately in the background.
    pub fn spawn(
        url: Url,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Receiver<ChannelEvent>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let events = spawn_with_queue(url, reconnect, outbound_rx, cancel.clone());
        (
            Self {
                outbound: outbound_tx,
                cancel,
            },
            events,
        )
    }

    /// Queue a frame for the current connection.
    ///
    /// Returns `false` if the task has exited. Frames queued while the
    /// socket is down are discarded when the next connection opens.
    pub fn send(&self, message: Message) -> bool {
        self.outbound.send(message).is_ok()
    }

    /// Signal the background task to close the socket and exit.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Spawn the channel task around an existing outbound queue.
///
/// Used when the producer side of the queue is handed out before the
/// channel exists.
pub fn spawn_with_queue(
    url: Url,
    reconnect: ReconnectConfig,
    outbound: mpsc::UnboundedReceiver<Message>,
    cancel: CancellationToken,
) -> mpsc::Receiver<ChannelEvent> {
    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    tokio::spawn(async move {
        channel_loop(url, event_tx, outbound, reconnect, cancel).await;
    });
    event_rx
}

// ── Background reconnection loop ─────────────────────────────────────

/// Why a single connection ended.
enum Ended {
    /// Socket dropped or never opened; consult the reconnect policy.
    Dropped,
    /// Shutdown was requested.
    Shutdown,
}

/// Main loop: connect → pump frames → on close, back off → reconnect.
async fn channel_loop(
    url: Url,
    event_tx: mpsc::Sender<ChannelEvent>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut policy = ReconnectPolicy::new(reconnect);

    loop {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Ok(Ended::Shutdown),
            result = connect_and_pump(&url, &event_tx, &mut outbound, &mut policy, &cancel) => result,
        };
        let ended = match result {
            Ok(ended) => ended,
            Err(e) => {
                tracing::warn!(error = %e, attempts = policy.attempts(), "portal channel error");
                Ended::Dropped
            }
        };

        if matches!(ended, Ended::Shutdown) {
            break;
        }

        let Some(delay) = policy.on_close() else {
            tracing::error!(
                attempts = policy.attempts(),
                "portal channel reconnect limit reached, giving up"
            );
            let _ = event_tx
                .send(ChannelEvent::GaveUp {
                    attempts: policy.attempts(),
                })
                .await;
            break;
        };

        tracing::info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt = policy.attempts(),
            "waiting before reconnect"
        );
        let closed = ChannelEvent::Closed {
            attempt: policy.attempts(),
            retry_in: delay,
        };
        if event_tx.send(closed).await.is_err() {
            break;
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    tracing::debug!("portal channel loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish one connection and shuttle frames until it drops.
async fn connect_and_pump(
    url: &Url,
    event_tx: &mpsc::Sender<ChannelEvent>,
    outbound: &mut mpsc::UnboundedReceiver<Message>,
    policy: &mut ReconnectPolicy,
    cancel: &CancellationToken,
) -> Result<Ended, Error> {
    tracing::info!(url = %url, "connecting to portal");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    policy.on_open();
    let stale = discard_queued(outbound);
    if stale > 0 {
        tracing::debug!(dropped = stale, "discarded frames queued while closed");
    }
    tracing::info!("portal channel open");

    if event_tx.send(ChannelEvent::Opened).await.is_err() {
        return Ok(Ended::Shutdown);
    }

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(tungstenite::Message::Close(None)).await;
                return Ok(Ended::Shutdown);
            }
            queued = outbound.recv() => {
                let Some(message) = queued else {
                    tracing::debug!("outbound queue closed");
                    let _ = write.send(tungstenite::Message::Close(None)).await;
                    return Ok(Ended::Shutdown);
                };
                let text = codec::encode(&message)?;
                tracing::trace!(frame = %text, "portal send");
                write
                    .send(tungstenite::Message::text(text))
                    .await
                    .map_err(|e| Error::WebSocketSend(e.to_string()))?;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        let Some(message) = parse_frame(text.as_str()) else {
                            continue;
                        };
                        if event_tx.send(ChannelEvent::Frame(message)).await.is_err() {
                            return Ok(Ended::Shutdown);
                        }
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite queues the pong reply itself
                        tracing::trace!("portal ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(code = %cf.code, reason = %cf.reason, "portal close frame received");
                        } else {
                            tracing::info!("portal close frame received (no payload)");
                        }
                        return Ok(Ended::Dropped);
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("portal stream ended");
                        return Ok(Ended::Dropped);
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

fn discard_queued(outbound: &mut mpsc::UnboundedReceiver<Message>) -> usize {
    let mut dropped = 0;
    while outbound.try_recv().is_ok() {
        dropped += 1;
    }
    dropped
}

// ── Frame filtering ──────────────────────────────────────────────────

/// Decode an inbound frame, dropping anything a client should not act on.
fn parse_frame(text: &str) -> Option<Message> {
    let message = match codec::decode(text) {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!(error = %e, "dropping malformed portal frame");
            return None;
        }
    };

    if message.kind == crate::message::MessageKind::Request {
        tracing::debug!(module = ?message.target, action = ?message.action, "dropping inbound request frame");
        return None;
    }

    Some(message)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_frame_keeps_responses_and_events() {
        let msg = parse_frame(r#"{"type":"response","target":"device","status":"load_partial","data":{"hostname":"strip"}}"#);
        assert_eq!(msg.and_then(|m| m.status), Some("load_partial".to_owned()));
        assert!(parse_frame(r#"{"type":"event","target":"system","status":"ws_ready"}"#).is_some());
    }

    #[test]
    fn parse_frame_drops_requests_and_malformed_input() {
        assert!(parse_frame(r#"{"type":"request","target":"wifi","action":"ap_scan_start"}"#).is_none());
        assert!(parse_frame(r#"{"type":"telemetry"}"#).is_none());
        assert!(parse_frame("{").is_none());
    }

    #[test]
    fn discard_queued_empties_the_queue() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(Message::request("wifi", "ap_status")).unwrap();
        tx.send(Message::request("wifi", "ap_config")).unwrap();
        assert_eq!(discard_queued(&mut rx), 2);
        assert!(rx.try_recv().is_err());
    }
}
