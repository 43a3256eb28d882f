//! Relay for the tutoring chat UI's `ask-bot` endpoint
//!
//! Validates a list of chat turns, forwards it to a hosted chat-completion
//! provider with fixed sampling parameters, and returns `{reply}` or `{error}`.
//! The same relay core backs a long-running HTTP server and a
//! serverless-function event adapter.

pub mod ai;
pub mod app;
pub mod error;
pub mod function;
pub mod models;
pub mod relay;
pub mod server;

pub use error::{Error, Result};
