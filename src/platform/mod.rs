pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;

/// A text message received from the chat platform
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Platform user ID of the sender (checked against the allow-list)
    pub user_id: u64,
    /// Chat the message arrived in; replies go here
    pub chat_id: i64,
    /// Display name of the user
    pub user_name: String,
    /// The message text
    pub text: String,
}

/// Markup used to render an outgoing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatMode {
    #[default]
    MarkdownV2,
    Markdown,
    Html,
    Plain,
}

impl FormatMode {
    /// Look up a mode by its Bot API name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "markdownv2" => Some(FormatMode::MarkdownV2),
            "markdown" => Some(FormatMode::Markdown),
            "html" => Some(FormatMode::Html),
            "plain" => Some(FormatMode::Plain),
            _ => None,
        }
    }
}

/// Outbound side of the chat platform.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str, mode: FormatMode) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_mode_names() {
        assert_eq!(FormatMode::from_name("MarkdownV2"), Some(FormatMode::MarkdownV2));
        assert_eq!(FormatMode::from_name("markdown"), Some(FormatMode::Markdown));
        assert_eq!(FormatMode::from_name("HTML"), Some(FormatMode::Html));
        assert_eq!(FormatMode::from_name("plain"), Some(FormatMode::Plain));
        assert_eq!(FormatMode::from_name("rich"), None);
    }
}
