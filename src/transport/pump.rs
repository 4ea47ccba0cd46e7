//! Read and write pumps.
//!
//! Each admitted socket is split into two halves driven by two independent
//! tasks:
//!
//! - **Read pump**: decodes inbound text frames and routes them through the
//!   hub, in arrival order. Also records pong acknowledgements.
//! - **Write pump**: drains the outbox onto the socket and runs keepalive.
//!   A ping that is not answered within the pong deadline kills the
//!   connection.
//!
//! Whichever pump stops first unregisters the connection, which cancels the
//! other. Only the registry removal that actually wins releases resources.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep, timeout};
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::hub::Hub;
use crate::protocol::Event;

use super::Connection;

// ============================================================================
// Constants
// ============================================================================

/// Placeholder deadline while no ping is outstanding.
const IDLE_DEADLINE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

// ============================================================================
// Spawning
// ============================================================================

/// Splits `socket` and starts both pumps on the hub's task tracker.
pub(crate) fn spawn<S>(
    hub: &Arc<Hub>,
    connection: Arc<Connection>,
    outbox: mpsc::Receiver<Event>,
    socket: S,
) where
    S: Stream<Item = std::result::Result<Message, axum::Error>>
        + Sink<Message, Error = axum::Error>
        + Send
        + 'static,
{
    let (sink, stream) = socket.split();
    let (pong_tx, pong_rx) = watch::channel(0u64);

    hub.tasks().spawn(read_pump(
        Arc::clone(hub),
        Arc::clone(&connection),
        stream,
        pong_tx,
    ));
    hub.tasks()
        .spawn(write_pump(Arc::clone(hub), connection, outbox, sink, pong_rx));
}

// ============================================================================
// Read Pump
// ============================================================================

/// Reads frames until the socket fails, the peer closes, or the connection
/// is torn down.
async fn read_pump<R>(
    hub: Arc<Hub>,
    connection: Arc<Connection>,
    mut stream: R,
    pong_tx: watch::Sender<u64>,
) where
    R: Stream<Item = std::result::Result<Message, axum::Error>> + Unpin,
{
    let id = connection.id();
    let max_frame_size = hub.config().max_frame_size;

    debug!(connection_id = %id, "Read pump started");

    let failure = loop {
        let frame = tokio::select! {
            biased;
            _ = connection.closed() => break None,
            frame = stream.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                let text = text.as_str();
                if text.len() > max_frame_size {
                    break Some(Error::malformed_frame(format!(
                        "frame of {} bytes exceeds limit of {max_frame_size}",
                        text.len()
                    )));
                }
                if let Err(e) = handle_text(&hub, &connection, text) {
                    break Some(e);
                }
            }

            Some(Ok(Message::Binary(_))) => {
                break Some(Error::malformed_frame("binary frames are not supported"));
            }

            Some(Ok(Message::Pong(data))) => {
                if let Some(seq) = decode_seq(&data) {
                    pong_tx.send_replace(seq);
                }
            }

            // Answered by the WebSocket layer
            Some(Ok(Message::Ping(_))) => {}

            Some(Ok(Message::Close(_))) | None => {
                debug!(connection_id = %id, "Peer closed connection");
                break None;
            }

            Some(Err(e)) => break Some(Error::from(e)),
        }
    };

    if let Some(e) = failure {
        log_failure(&connection, "read", &e);
    }

    hub.unregister(id);
    debug!(connection_id = %id, "Read pump terminated");
}

/// Decodes one text frame and routes it.
///
/// Routing failures are reported back to the sender as an `error` event and
/// keep the connection open. Only terminal errors are returned.
fn handle_text(hub: &Hub, connection: &Arc<Connection>, text: &str) -> Result<()> {
    let event = match Event::decode(text) {
        Ok(event) => event,
        Err(e) if e.is_terminal() => return Err(e),
        Err(e) => {
            let tag = match &e {
                Error::UnsupportedEvent { tag } => Some(tag.as_str()),
                _ => None,
            };
            warn!(connection_id = %connection.id(), tag = ?tag, error = %e, "Undeliverable event from client");
            report(hub, connection, tag, &e);
            return Ok(());
        }
    };

    trace!(connection_id = %connection.id(), tag = event.tag(), "Routing event");

    if let Err(e) = hub.route(&event, connection) {
        warn!(connection_id = %connection.id(), tag = event.tag(), error = %e, "Event rejected");
        report(hub, connection, Some(event.tag()), &e);
    }

    Ok(())
}

/// Sends an `error` event back to the originating connection.
fn report(hub: &Hub, connection: &Connection, tag: Option<&str>, err: &Error) {
    if let Err(e) = hub.deliver(connection, Event::error(tag, err.to_string())) {
        debug!(connection_id = %connection.id(), error = %e, "Failed to report error to client");
    }
}

// ============================================================================
// Write Pump
// ============================================================================

/// Drains the outbox and keeps the connection alive until the outbox
/// closes, a write fails, a pong is missed, or the connection is torn down.
async fn write_pump<W>(
    hub: Arc<Hub>,
    connection: Arc<Connection>,
    mut outbox: mpsc::Receiver<Event>,
    mut sink: W,
    mut pong_rx: watch::Receiver<u64>,
) where
    W: Sink<Message, Error = axum::Error> + Unpin,
{
    let id = connection.id();
    let config = hub.config().clone();

    let mut keepalive = interval_at(
        Instant::now() + config.keepalive_interval,
        config.keepalive_interval,
    );
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let pong_deadline = sleep(IDLE_DEADLINE);
    tokio::pin!(pong_deadline);

    let mut ping_seq: u64 = 0;
    let mut awaiting_pong: Option<u64> = None;

    debug!(connection_id = %id, "Write pump started");

    let failure = loop {
        tokio::select! {
            biased;

            _ = connection.closed() => break None,

            _ = &mut pong_deadline, if awaiting_pong.is_some() => {
                break Some(Error::transport(format!(
                    "no pong within {}ms",
                    config.pong_deadline.as_millis()
                )));
            }

            acked = pong_rx.changed() => {
                if acked.is_err() {
                    // Read pump is gone and will unregister
                    break None;
                }
                let seq = *pong_rx.borrow_and_update();
                if awaiting_pong.is_some_and(|expected| seq >= expected) {
                    trace!(connection_id = %id, seq, "Pong received");
                    awaiting_pong = None;
                }
            }

            event = outbox.recv() => {
                let Some(event) = event else {
                    break None;
                };
                let text = match event.encode() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(connection_id = %id, tag = event.tag(), error = %e, "Dropping unencodable event");
                        continue;
                    }
                };
                if let Err(e) = write_frame(&mut sink, Message::Text(text.into()), config.write_timeout).await {
                    break Some(e);
                }
                trace!(connection_id = %id, tag = event.tag(), "Event written");
            }

            _ = keepalive.tick() => {
                if awaiting_pong.is_some() {
                    continue;
                }
                ping_seq += 1;
                if let Err(e) = write_frame(&mut sink, Message::Ping(encode_seq(ping_seq)), config.write_timeout).await {
                    break Some(e);
                }
                awaiting_pong = Some(ping_seq);
                pong_deadline.as_mut().reset(Instant::now() + config.pong_deadline);
                trace!(connection_id = %id, seq = ping_seq, "Ping sent");
            }
        }
    };

    if let Some(e) = &failure {
        log_failure(&connection, "write", e);
    }

    // Drain whatever was still queued
    outbox.close();
    let mut dropped = 0usize;
    while outbox.try_recv().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        debug!(connection_id = %id, dropped, "Discarded undelivered events");
    }

    if failure.is_none() {
        let _ = write_frame(&mut sink, Message::Close(None), config.write_timeout).await;
    }

    hub.unregister(id);
    debug!(connection_id = %id, "Write pump terminated");
}

/// Writes one frame with a deadline.
async fn write_frame<W>(sink: &mut W, frame: Message, limit: Duration) -> Result<()>
where
    W: Sink<Message, Error = axum::Error> + Unpin,
{
    match timeout(limit, sink.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(Error::from(e)),
        Err(_) => Err(Error::transport(format!(
            "write timed out after {}ms",
            limit.as_millis()
        ))),
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Logs a terminal per-connection failure.
fn log_failure(connection: &Connection, pump: &'static str, err: &Error) {
    if connection.is_closed() {
        // Torn down by the other side first; the failure is a consequence
        debug!(connection_id = %connection.id(), pump, error = %err, "Pump stopped after close");
    } else if err.is_transport() {
        error!(connection_id = %connection.id(), pump, error = %err, "Connection failed");
    } else {
        warn!(connection_id = %connection.id(), pump, error = %err, "Dropping misbehaving connection");
    }
}

/// Ping payload carrying a sequence number.
fn encode_seq(seq: u64) -> Bytes {
    Bytes::copy_from_slice(&seq.to_be_bytes())
}

/// Sequence number from a pong payload, if it is one of ours.
fn decode_seq(data: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = data.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

// ============================================================================
// Tests
// ============================================================================
