//! Prefix commands understood by the bot.

use crate::chatbot::message::InboundMessage;

/// Plain text prompt: `/text <prompt>`.
pub const TEXT_COMMAND: &str = "/text";
/// Photo with caption: `/image <prompt>`.
pub const IMAGE_COMMAND: &str = "/image";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Text(&'a str),
    Image(&'a str),
    Ignored,
}

impl<'a> Command<'a> {
    /// Pick the handler for a message.
    ///
    /// Text is checked before the caption. A text message starting with
    /// `/image` maps to `Image` as well; it can never carry a photo, so the
    /// relay answers it with the missing-photo notice.
    pub fn parse(msg: &'a InboundMessage) -> Self {
        if let Some(text) = msg.text.as_deref().filter(|t| !t.is_empty()) {
            if let Some(prompt) = strip_command(text, TEXT_COMMAND) {
                return Command::Text(prompt);
            }
            if let Some(prompt) = strip_command(text, IMAGE_COMMAND) {
                return Command::Image(prompt);
            }
        }
        if let Some(caption) = msg.caption.as_deref() {
            if let Some(prompt) = strip_command(caption, IMAGE_COMMAND) {
                return Command::Image(prompt);
            }
        }
        Command::Ignored
    }
}

/// Remove `command` from the start of `input`, then a `@botname` mention glued
/// to it, then one separator character.
///
/// Returns `None` if `input` doesn't start with `command`.
pub fn strip_command<'a>(input: &'a str, command: &str) -> Option<&'a str> {
    let rest = input.strip_prefix(command)?;
    let rest = match rest.strip_prefix('@') {
        Some(mention) => mention
            .find(char::is_whitespace)
            .map_or("", |end| &mention[end..]),
        None => rest,
    };

    let mut chars = rest.chars();
    match chars.next() {
        Some(c) if c.is_whitespace() => Some(chars.as_str()),
        _ => Some(rest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chatbot::message::PhotoSize;

    #[test]
    fn test_strip_single_separator() {
        assert_eq!(strip_command("/text what is 2+2", TEXT_COMMAND), Some("what is 2+2"));
    }

    #[test]
    fn test_strip_keeps_extra_whitespace() {
        assert_eq!(strip_command("/text  two", TEXT_COMMAND), Some(" two"));
        assert_eq!(strip_command("/text\nline", TEXT_COMMAND), Some("line"));
    }

    #[test]
    fn test_strip_bare_command() {
        assert_eq!(strip_command("/text", TEXT_COMMAND), Some(""));
    }

    #[test]
    fn test_strip_mention() {
        assert_eq!(strip_command("/text@gemini_bot hello", TEXT_COMMAND), Some("hello"));
        assert_eq!(strip_command("/image@gemini_bot", IMAGE_COMMAND), Some(""));
    }

    #[test]
    fn test_strip_non_matching() {
        assert_eq!(strip_command("hello /text", TEXT_COMMAND), None);
        assert_eq!(strip_command("/tex", TEXT_COMMAND), None);
    }

    #[test]
    fn test_strip_multibyte_separator() {
        // U+3000 ideographic space
        assert_eq!(strip_command("/text\u{3000}привет", TEXT_COMMAND), Some("привет"));
    }

    #[test]
    fn test_parse_text_command() {
        let msg = InboundMessage::text(7, "/text what is 2+2");
        assert_eq!(Command::parse(&msg), Command::Text("what is 2+2"));
    }

    #[test]
    fn test_parse_caption_command() {
        let photo = PhotoSize {
            file_id: "f".into(),
            file_unique_id: "u".into(),
            width: 1,
            height: 1,
            file_size: 1,
        };
        let msg = InboundMessage::captioned(7, "/image describe this", vec![photo]);
        assert_eq!(Command::parse(&msg), Command::Image("describe this"));
    }

    #[test]
    fn test_parse_image_command_in_text() {
        let msg = InboundMessage::text(7, "/image describe this");
        assert_eq!(Command::parse(&msg), Command::Image("describe this"));
    }

    #[test]
    fn test_parse_text_command_in_caption_is_ignored() {
        let msg = InboundMessage::captioned(7, "/text hi", vec![]);
        assert_eq!(Command::parse(&msg), Command::Ignored);
    }

    #[test]
    fn test_parse_ignored() {
        assert_eq!(Command::parse(&InboundMessage::text(7, "hello")), Command::Ignored);
        assert_eq!(Command::parse(&InboundMessage::default()), Command::Ignored);
        assert_eq!(Command::parse(&InboundMessage::captioned(7, "", vec![])), Command::Ignored);
    }
}
