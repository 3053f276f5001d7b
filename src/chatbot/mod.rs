//! Chatbot module - relays Telegram commands to Gemini.

pub mod command;
pub mod gemini;
pub mod message;
pub mod relay;
pub mod telegram;


pub use command::{Command, IMAGE_COMMAND, TEXT_COMMAND};
pub use gemini::{AiClient, AiError, GeminiClient, GeminiConfig};
pub use message::{InboundMessage, PhotoSize};
pub use relay::{Outcome, Relay, RelayConfig};
pub use telegram::{ChatApi, ChatError, FileInfo, TelegramClient};
