//! Lorz is a terminal chat client for conversing with remote LLM APIs under
//! selectable personalities.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns conversation state and persistence, session lifecycle,
//!   request construction, streaming orchestration, and error
//!   classification.
//! - [`api`] defines the provider wire payloads and the adapters that
//!   normalize each provider's responses into stream chunks.
//! - [`cli`] parses arguments and runs the line-oriented interactive loop.
//! - [`utils`] holds URL and transcript-logging helpers.
//!
//! The runtime entrypoint lives in the binary crate (`src/main.rs`), which
//! routes through [`cli::run`] into [`core::chat::ChatController`].

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;
