//! Telegram client using teloxide.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::FileId;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Server-side file metadata returned by `getFile`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Path relative to the bot's file endpoint, e.g. `photos/file_3.jpg`.
    pub path: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("telegram request failed: {0}")]
    Request(#[from] teloxide::RequestError),
    #[error("download failed: {0}")]
    Download(#[from] teloxide::DownloadError),
    #[error("failed to write '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The part of the Bot API the relay needs.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn get_file(&self, file_id: &str) -> Result<FileInfo, ChatError>;

    /// Download `file` to `dest`, creating or truncating it.
    async fn download_file(&self, file: &FileInfo, dest: &Path) -> Result<(), ChatError>;

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), ChatError>;
}

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatApi for TelegramClient {
    async fn get_file(&self, file_id: &str) -> Result<FileInfo, ChatError> {
        let file = self.bot.get_file(FileId(file_id.to_string())).await?;
        Ok(FileInfo { path: file.path })
    }

    async fn download_file(&self, file: &FileInfo, dest: &Path) -> Result<(), ChatError> {
        let io_err = |source| ChatError::Io {
            path: dest.to_path_buf(),
            source,
        };

        let mut out = tokio::fs::File::create(dest).await.map_err(io_err)?;
        self.bot.download_file(&file.path, &mut out).await?;
        out.flush().await.map_err(io_err)?;

        info!("📥 Downloaded {} to {}", file.path, dest.display());
        Ok(())
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), ChatError> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .map(|_| ())
            .map_err(|e| {
                warn!("Failed to send: {e}");
                e.into()
            })
    }
}
