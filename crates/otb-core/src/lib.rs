//! Core domain + application logic for the OpenRouter Telegram bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and the
//! completion endpoint live behind ports (traits) implemented in adapter
//! crates; persistence goes through the `store::RecordStore` port.

pub mod auth;
pub mod chat;
pub mod completion;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod history;
pub mod language;
pub mod logging;
pub mod menu;
pub mod messaging;
pub mod service;
pub mod session;
pub mod settings;
pub mod store;
pub mod utils;

pub use errors::{Error, Result};
