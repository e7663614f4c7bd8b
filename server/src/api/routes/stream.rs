//! WebSocket stream endpoint
//!
//! One session per connection. The session reads text frames, dispatches
//! them to the broker, and answers through the same outgoing queue the
//! broker fans out on, so acks, replays, and events reach the peer in a
//! single well-ordered stream. A writer task owns the socket's sink and
//! drains the queue; the broker never touches the socket directly.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::broker::{Broker, ConnectionClosed, ConnectionHandle, Outgoing};
use crate::domain::frames::{CODE_BAD_REQUEST, ClientFrame, ServerFrame};

/// Reported in error frames raised by broker-side failures. The error kind
/// travels in `error.code`; this literal is the `error.message`.
const OPERATION_FAILED: &str = "Operation failed";

/// Shared state for the stream endpoint
#[derive(Clone)]
pub struct StreamApiState {
    pub broker: Arc<Broker>,
}

/// Build the stream route
pub fn routes(broker: Arc<Broker>) -> Router<()> {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(StreamApiState { broker })
}

async fn ws_handler(
    State(state): State<StreamApiState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_session(socket, state.broker))
}

/// Run one session from accept to close
async fn handle_session(socket: WebSocket, broker: Arc<Broker>) {
    let (sink, stream) = socket.split();
    let (conn, rx) = ConnectionHandle::channel();
    let writer = tokio::spawn(write_outgoing(sink, rx));

    let session = Session::new(broker);
    session.run(stream, &conn).await;

    // The read loop ends with disconnect_client, which releases the broker's
    // clones of the handle; dropping ours lets the writer task finish.
    drop(conn);
    let _ = writer.await;
}

/// Drain the outgoing queue into the socket sink.
///
/// Stops on the first transport error or on an explicit close request;
/// either way the queue closes and pending handles start failing, which
/// the broker reads as a dead subscriber.
async fn write_outgoing(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: UnboundedReceiver<Outgoing>,
) {
    while let Some(out) = rx.recv().await {
        match out {
            Outgoing::Frame(frame) => {
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to encode outgoing frame");
                        continue;
                    }
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            Outgoing::Close(code) => {
                let _ = sink
                    .send(Message::Close(Some(CloseFrame {
                        code,
                        reason: Utf8Bytes::from_static(""),
                    })))
                    .await;
                break;
            }
        }
    }
    rx.close();
}

/// Per-connection dispatch state
struct Session {
    broker: Arc<Broker>,
    /// Client id bound by the first valid subscribe frame; frozen afterwards
    client_id: Option<String>,
}

impl Session {
    fn new(broker: Arc<Broker>) -> Self {
        Self {
            broker,
            client_id: None,
        }
    }

    /// Read loop: frames are processed strictly in arrival order
    async fn run(mut self, mut stream: SplitStream<WebSocket>, conn: &ConnectionHandle) {
        while let Some(msg) = stream.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(_) => break,
            };

            let result = match msg {
                Message::Text(text) => self.dispatch(conn, text.as_str()),
                Message::Binary(_) => conn.send(ServerFrame::error(
                    None,
                    CODE_BAD_REQUEST,
                    "Expected a UTF-8 JSON text frame",
                )),
                Message::Close(_) => break,
                Message::Ping(_) | Message::Pong(_) => Ok(()),
            };

            // Our own queue is gone; nothing more can be delivered.
            if result.is_err() {
                break;
            }
        }

        if let Some(client_id) = self.client_id.take() {
            self.broker.disconnect_client(&client_id);
            tracing::debug!(client_id = %client_id, "session closed");
        }
    }

    /// Decode and execute one frame, answering on the session's queue
    fn dispatch(&mut self, conn: &ConnectionHandle, text: &str) -> Result<(), ConnectionClosed> {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                return conn.send(ServerFrame::error(None, CODE_BAD_REQUEST, e.to_string()));
            }
        };

        // Recover the correlation id even when the frame fails validation
        let request_id = value
            .get("request_id")
            .and_then(Value::as_str)
            .map(str::to_string);

        let frame: ClientFrame = match serde_json::from_value(value) {
            Ok(frame) => frame,
            Err(e) => {
                return conn.send(ServerFrame::error(
                    request_id,
                    CODE_BAD_REQUEST,
                    e.to_string(),
                ));
            }
        };

        match frame {
            ClientFrame::Subscribe {
                topic,
                client_id,
                last_n,
                request_id,
            } => {
                if !self.bind_client(&client_id) {
                    return conn.send(ServerFrame::error(
                        request_id,
                        CODE_BAD_REQUEST,
                        "client_id does not match the id bound to this session",
                    ));
                }
                match self
                    .broker
                    .subscribe(&topic, &client_id, conn.clone(), last_n)
                {
                    Ok(()) => conn.send(ServerFrame::ack(request_id, Some(topic))),
                    Err(e) => conn.send(ServerFrame::error(request_id, e.code(), OPERATION_FAILED)),
                }
            }
            ClientFrame::Unsubscribe {
                topic,
                client_id,
                request_id,
            } => {
                if !self.matches_binding(&client_id) {
                    return conn.send(ServerFrame::error(
                        request_id,
                        CODE_BAD_REQUEST,
                        "client_id does not match the id bound to this session",
                    ));
                }
                match self.broker.unsubscribe(&topic, &client_id) {
                    Ok(()) => conn.send(ServerFrame::ack(request_id, Some(topic))),
                    Err(e) => conn.send(ServerFrame::error(request_id, e.code(), OPERATION_FAILED)),
                }
            }
            ClientFrame::Publish {
                topic,
                message,
                request_id,
            } => match self.broker.publish(&topic, message) {
                Ok(()) => conn.send(ServerFrame::ack(request_id, Some(topic))),
                Err(e) => conn.send(ServerFrame::error(request_id, e.code(), OPERATION_FAILED)),
            },
            ClientFrame::Ping { request_id } => conn.send(ServerFrame::pong(request_id)),
        }
    }

    /// Bind the session to a client id on first use; later frames must
    /// carry the same id.
    fn bind_client(&mut self, client_id: &str) -> bool {
        match &self.client_id {
            Some(bound) => bound == client_id,
            None => {
                self.client_id = Some(client_id.to_string());
                tracing::debug!(client_id, "client bound to session");
                true
            }
        }
    }

    /// Check a frame's client id against the binding without creating one
    fn matches_binding(&self, client_id: &str) -> bool {
        match &self.client_id {
            Some(bound) => bound == client_id,
            None => true,
        }
    }
}
