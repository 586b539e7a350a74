pub mod app;
pub mod attachment;
pub mod chat_stream;
pub mod code_blocks;
pub mod compose;
pub mod config;
pub mod gemini;
pub mod keyring;
pub mod message;
pub mod persona;
pub mod session;
pub mod snippets;
pub mod storage;
pub mod transport;
