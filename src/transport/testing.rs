//! In-memory socket for exercising pumps without a network.

// ============================================================================
// Imports
// ============================================================================

use std::io::{Error as IoError, ErrorKind};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::extract::ws::Message;
use futures_util::{Sink, Stream};
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::protocol::Event;

type Frame = std::result::Result<Message, axum::Error>;

// ============================================================================
// MemorySocket
// ============================================================================

/// Hub side of an in-memory WebSocket.
pub(crate) struct MemorySocket {
    inbound: mpsc::UnboundedReceiver<Frame>,
    outbound: mpsc::UnboundedSender<Message>,
}

/// Client side of an in-memory WebSocket.
pub(crate) struct Peer {
    tx: mpsc::UnboundedSender<Frame>,
    rx: mpsc::UnboundedReceiver<Message>,
}

impl MemorySocket {
    /// Creates a connected socket/peer pair.
    pub(crate) fn pair() -> (Self, Peer) {
        let (client_tx, inbound) = mpsc::unbounded_channel();
        let (outbound, client_rx) = mpsc::unbounded_channel();
        (
            Self { inbound, outbound },
            Peer {
                tx: client_tx,
                rx: client_rx,
            },
        )
    }
}

impl Stream for MemorySocket {
    type Item = Frame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inbound.poll_recv(cx)
    }
}

impl Sink<Message> for MemorySocket {
    type Error = axum::Error;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: Message) -> Result<(), Self::Error> {
        self.outbound
            .send(item)
            .map_err(|_| axum::Error::new(IoError::new(ErrorKind::BrokenPipe, "peer gone")))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }
}

// ============================================================================
// Peer
// ============================================================================

impl Peer {
    /// Sends a raw text frame.
    pub(crate) fn send_text(&self, text: impl Into<String>) {
        let _ = self.tx.send(Ok(Message::Text(text.into().into())));
    }

    /// Sends an encoded event.
    pub(crate) fn send_event(&self, event: &Event) {
        self.send_text(event.encode().expect("encodable event"));
    }

    /// Sends a raw frame.
    pub(crate) fn send_frame(&self, frame: Message) {
        let _ = self.tx.send(Ok(frame));
    }

    /// Injects a transport error.
    pub(crate) fn fail(&self) {
        let _ = self.tx.send(Err(axum::Error::new(IoError::new(
            ErrorKind::ConnectionReset,
            "reset by peer",
        ))));
    }

    /// Waits for the next frame written by the hub.
    pub(crate) async fn next_frame(&mut self) -> Option<Message> {
        timeout(Duration::from_secs(2), self.rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Waits for the next event written by the hub, skipping control frames.
    pub(crate) async fn next_event(&mut self) -> Option<Event> {
        loop {
            match self.next_frame().await? {
                Message::Text(text) => return Event::decode(text.as_str()).ok(),
                Message::Close(_) => return None,
                _ => continue,
            }
        }
    }

    /// Returns a frame already written by the hub, without waiting.
    pub(crate) fn try_frame(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }
}
