//! Broker-side connection handles
//!
//! A session owns the WebSocket; the broker only ever sees a
//! [`ConnectionHandle`]: the send half of an unbounded frame queue drained
//! by the session's writer task. Enqueueing never blocks, so the broker can
//! fan out while holding its mutex, and a slow peer cannot stall other
//! broker operations. A handle whose queue is gone reads as closed; sending
//! on it fails, which the broker treats the same as a disconnected peer.

use tokio::sync::mpsc;

use crate::domain::frames::ServerFrame;

/// WebSocket normal-closure code, used on forced disconnects
pub const CLOSE_NORMAL: u16 = 1000;

/// Items travelling from the broker/session to the writer task
#[derive(Debug)]
pub enum Outgoing {
    /// A frame to encode and send as a text message
    Frame(ServerFrame),
    /// Close the connection with the given code and stop writing
    Close(u16),
}

/// The send half failed because the peer (or its writer task) is gone
#[derive(Debug, PartialEq, Eq)]
pub struct ConnectionClosed;

/// Cloneable handle to one connection's outgoing queue
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    tx: mpsc::UnboundedSender<Outgoing>,
}

impl ConnectionHandle {
    /// Create a handle and the receiver its writer task drains
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outgoing>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Whether the writer task is still draining the queue
    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Enqueue a frame for delivery
    pub fn send(&self, frame: ServerFrame) -> Result<(), ConnectionClosed> {
        self.tx
            .send(Outgoing::Frame(frame))
            .map_err(|_| ConnectionClosed)
    }

    /// Ask the writer task to close the connection
    pub fn close(&self, code: u16) {
        let _ = self.tx.send(Outgoing::Close(code));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_reaches_receiver() {
        let (conn, mut rx) = ConnectionHandle::channel();
        assert!(conn.is_connected());

        conn.send(ServerFrame::pong(None)).unwrap();
        match rx.try_recv().unwrap() {
            Outgoing::Frame(ServerFrame::Pong { .. }) => {}
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn test_close_enqueues_control() {
        let (conn, mut rx) = ConnectionHandle::channel();
        conn.close(CLOSE_NORMAL);
        match rx.try_recv().unwrap() {
            Outgoing::Close(code) => assert_eq!(code, CLOSE_NORMAL),
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn test_dropped_receiver_reads_as_closed() {
        let (conn, rx) = ConnectionHandle::channel();
        drop(rx);
        assert!(!conn.is_connected());
        assert_eq!(conn.send(ServerFrame::pong(None)), Err(ConnectionClosed));
    }
}
