//! Wire model for the stream channel
//!
//! All frames are JSON objects discriminated by `type`. Client frames are
//! decode-only; server frames are encode-only and stamp their `ts`
//! (RFC 3339 UTC) at construction, which is the moment of send.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Error code for malformed or unsupported frames
pub const CODE_BAD_REQUEST: &str = "BAD_REQUEST";

/// A published message. The broker treats it as an opaque value: neither
/// `id` uniqueness nor payload shape is enforced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub id: Uuid,
    pub payload: Map<String, Value>,
}

/// Error body carried by `error` frames
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

/// Client → server frames
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Subscribe {
        topic: String,
        client_id: String,
        #[serde(default)]
        last_n: usize,
        request_id: Option<String>,
    },
    Unsubscribe {
        topic: String,
        client_id: String,
        request_id: Option<String>,
    },
    Publish {
        topic: String,
        message: MessagePayload,
        request_id: Option<String>,
    },
    Ping {
        request_id: Option<String>,
    },
}

/// Server → client frames
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Ack {
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        topic: Option<String>,
        status: String,
        ts: DateTime<Utc>,
    },
    Event {
        topic: String,
        message: MessagePayload,
        ts: DateTime<Utc>,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        error: ErrorPayload,
        ts: DateTime<Utc>,
    },
    Pong {
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        ts: DateTime<Utc>,
    },
    Info {
        #[serde(skip_serializing_if = "Option::is_none")]
        topic: Option<String>,
        msg: String,
        ts: DateTime<Utc>,
    },
}

impl ServerFrame {
    pub fn ack(request_id: Option<String>, topic: Option<String>) -> Self {
        Self::Ack {
            request_id,
            topic,
            status: "ok".to_string(),
            ts: Utc::now(),
        }
    }

    pub fn event(topic: String, message: MessagePayload) -> Self {
        Self::Event {
            topic,
            message,
            ts: Utc::now(),
        }
    }

    pub fn error(
        request_id: Option<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Error {
            request_id,
            error: ErrorPayload {
                code: code.into(),
                message: message.into(),
            },
            ts: Utc::now(),
        }
    }

    pub fn pong(request_id: Option<String>) -> Self {
        Self::Pong {
            request_id,
            ts: Utc::now(),
        }
    }

    pub fn info(topic: Option<String>, msg: impl Into<String>) -> Self {
        Self::Info {
            topic,
            msg: msg.into(),
            ts: Utc::now(),
        }
    }
}
