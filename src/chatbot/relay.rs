//! Per-update handler: routes `/text` and `/image` commands to the AI client
//! and sends the answer back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::chatbot::command::Command;
use crate::chatbot::gemini::{AiClient, AiError};
use crate::chatbot::message::InboundMessage;
use crate::chatbot::telegram::{ChatApi, ChatError};

/// Reply to `/image` without a photo.
pub const NO_DOCUMENTS_NOTICE: &str = "no documents sent";
/// Reply to a bare `/text`.
pub const EMPTY_PROMPT_NOTICE: &str = "send me a prompt after the command, e.g. /text what is 2+2";
/// Reply when the model answered with nothing to show.
pub const EMPTY_ANSWER_NOTICE: &str = "the model returned an empty answer";
/// Reply on failure, only with `notify_failures`.
pub const FAILURE_NOTICE: &str = "sorry, something went wrong while answering, please try again later";

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Directory downloaded photos are stored in.
    pub static_path: PathBuf,
    /// Send [`FAILURE_NOTICE`] instead of staying silent when handling fails.
    pub notify_failures: bool,
}

/// How handling one update ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Replied,
    Ignored,
    Failed,
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("get_file: {0}")]
    GetFile(#[source] ChatError),
    #[error("file extension: remote path '{0}' has none")]
    MissingExtension(String),
    #[error("download_file: {0}")]
    Download(#[source] ChatError),
    #[error(transparent)]
    Ai(#[from] AiError),
    #[error("send_message: {0}")]
    Send(#[source] ChatError),
}

pub struct Relay {
    ai: Arc<dyn AiClient>,
    chat: Arc<dyn ChatApi>,
    config: RelayConfig,
}

impl Relay {
    pub fn new(ai: Arc<dyn AiClient>, chat: Arc<dyn ChatApi>, config: RelayConfig) -> Self {
        Self { ai, chat, config }
    }

    /// Handle one inbound message. Never fails: errors are logged here.
    pub async fn handle(&self, msg: &InboundMessage) -> Outcome {
        let (op, result) = match Command::parse(msg) {
            Command::Ignored => {
                debug!(chat_id = msg.chat_id, "no command, ignoring");
                return Outcome::Ignored;
            }
            Command::Text(prompt) => ("text_handler", self.text_prompt(msg.chat_id, prompt).await),
            Command::Image(prompt) => ("image_handler", self.image_prompt(msg, prompt).await),
        };

        match result {
            Ok(()) => Outcome::Replied,
            Err(e) => {
                error!(op, chat_id = msg.chat_id, error = %e, "failed to handle update");
                if self.config.notify_failures && !matches!(e, RelayError::Send(_)) {
                    if let Err(e) = self.chat.send_message(msg.chat_id, FAILURE_NOTICE).await {
                        error!(op, chat_id = msg.chat_id, error = %e, "failed to send failure notice");
                    }
                }
                Outcome::Failed
            }
        }
    }

    async fn text_prompt(&self, chat_id: i64, prompt: &str) -> Result<(), RelayError> {
        if prompt.trim().is_empty() {
            return self.reply(chat_id, EMPTY_PROMPT_NOTICE).await;
        }

        info!(chat_id, "💬 /text");
        let answer = self.ai.handle_text_prompt(prompt).await?;
        self.answer(chat_id, &answer).await
    }

    async fn image_prompt(&self, msg: &InboundMessage, prompt: &str) -> Result<(), RelayError> {
        let Some(photo) = msg.largest_photo() else {
            info!(chat_id = msg.chat_id, "/image without a photo");
            return self.reply(msg.chat_id, NO_DOCUMENTS_NOTICE).await;
        };

        info!(
            chat_id = msg.chat_id,
            file_unique_id = %photo.file_unique_id,
            width = photo.width,
            height = photo.height,
            file_size = photo.file_size,
            "🖼️ /image"
        );
        let file = self
            .chat
            .get_file(&photo.file_id)
            .await
            .map_err(RelayError::GetFile)?;

        let ext = remote_extension(&file.path)
            .ok_or_else(|| RelayError::MissingExtension(file.path.clone()))?;
        let path = self
            .config
            .static_path
            .join(format!("{}.{}", photo.file_unique_id, ext));

        self.chat
            .download_file(&file, &path)
            .await
            .map_err(RelayError::Download)?;

        let answer = self.ai.handle_text_and_image_prompt(&path, prompt).await?;
        self.answer(msg.chat_id, &answer).await
    }

    async fn answer(&self, chat_id: i64, answer: &str) -> Result<(), RelayError> {
        // Telegram rejects empty messages.
        if answer.trim().is_empty() {
            return self.reply(chat_id, EMPTY_ANSWER_NOTICE).await;
        }
        self.reply(chat_id, answer).await
    }

    async fn reply(&self, chat_id: i64, text: &str) -> Result<(), RelayError> {
        self.chat
            .send_message(chat_id, text)
            .await
            .map_err(RelayError::Send)
    }
}

/// Extension of a remote file path such as `photos/file_3.jpg`.
fn remote_extension(path: &str) -> Option<&str> {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
}
