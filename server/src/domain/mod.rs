//! Domain types shared by the broker core and the API surfaces

pub mod frames;

pub use frames::{ClientFrame, ErrorPayload, MessagePayload, ServerFrame};
