//! Live progress broadcasting
//!
//! Decouples job execution from observers: jobs publish immutable
//! [`ProgressEvent`] snapshots, the hub fans them out to however many
//! subscribers are currently connected.

mod event;
mod hub;

pub use event::{format_eta, ProgressEvent, ProgressStatus};
pub use hub::{HubMessage, ProgressHub, Subscription};
