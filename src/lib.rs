//! Telegram bot that relays `/text` and `/image` prompts to Gemini, optionally
//! through an authenticated HTTP proxy.

pub mod chatbot;
pub mod config;
pub mod logging;
pub mod transport;
