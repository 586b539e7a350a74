//! vibecode is a terminal coding assistant for the Gemini API.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the chat state: personas, attachments, message
//!   composition, persona-bound sessions, reply streaming and the snippet
//!   library. [`core::app::ChatApp`] ties them together.
//! - [`commands`] implements slash-command parsing and execution used by the
//!   interactive chat.
//! - [`api`] defines the Gemini wire payloads and model listing.
//! - [`auth`] resolves and stores the API key.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod auth;
pub mod cli;
pub mod commands;
pub mod core;
pub mod utils;
