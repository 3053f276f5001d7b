//! Inbound Telegram messages, reduced to what the relay looks at.

use teloxide::types::Message;

/// One size variant of an attached photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoSize {
    pub file_id: String,
    /// Stable across bots; used to name the stored file.
    pub file_unique_id: String,
    pub width: u32,
    pub height: u32,
    pub file_size: u32,
}

impl PhotoSize {
    fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub photos: Vec<PhotoSize>,
}

impl InboundMessage {
    pub fn text(chat_id: i64, text: &str) -> Self {
        Self {
            chat_id,
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    pub fn captioned(chat_id: i64, caption: &str, photos: Vec<PhotoSize>) -> Self {
        Self {
            chat_id,
            caption: Some(caption.to_string()),
            photos,
            ..Default::default()
        }
    }

    /// Largest attached size by pixel area; the first one wins a tie.
    pub fn largest_photo(&self) -> Option<&PhotoSize> {
        self.photos
            .iter()
            .reduce(|best, p| if p.area() > best.area() { p } else { best })
    }
}

impl From<&Message> for InboundMessage {
    fn from(msg: &Message) -> Self {
        let photos = msg
            .photo()
            .unwrap_or_default()
            .iter()
            .map(|p| PhotoSize {
                file_id: p.file.id.0.clone(),
                file_unique_id: p.file.unique_id.0.clone(),
                width: p.width,
                height: p.height,
                file_size: p.file.size,
            })
            .collect();

        Self {
            chat_id: msg.chat.id.0,
            text: msg.text().map(str::to_string),
            caption: msg.caption().map(str::to_string),
            photos,
        }
    }
}
