pub mod chat;
pub mod chat_stream;
pub mod config;
pub mod error;
pub mod history;
pub mod message;
pub mod personality;
pub mod request;
pub mod session;
