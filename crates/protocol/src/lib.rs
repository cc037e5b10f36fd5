//! Wire types for the Blynx control plane.
//!
//! Every browser window talks to the control process over a newline-delimited
//! JSON stream. This crate holds the shapes that travel on that stream:
//!
//! - [`ClientEnvelope`] / [`ControlRequest`] - window to control process
//! - [`ServerMessage`] / [`ControlResponse`] - control process to window
//! - [`BroadcastEvent`] - pushed to every connected window
//! - Data records ([`Profile`], [`TabPayload`], [`Bookmark`], ...)
//!
//! Types here are pure data. Behavior lives in `blynx-core`.

pub mod event;
pub mod message;
pub mod types;

pub use event::*;
pub use message::*;
pub use types::*;
