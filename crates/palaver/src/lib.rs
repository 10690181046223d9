#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

//! Typed client binding for an OpenAI-style chat completion API
//!
//! Builds conversation requests, classifies complete responses into typed
//! results or typed errors, and bridges streamed server-sent events into a
//! cancellable, ordered event sequence consumable through a callback pair or
//! a pull-based stream

mod classify;
mod client;
pub mod error;
mod stream;
pub mod types;

pub use client::ChatClient;
pub use error::{ChatError, Result};
pub use stream::{ChatStream, StreamHandle};
pub use types::*;
