use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{Me, ParseMode};
use tracing::{debug, info};

use crate::bot::{self, parse_command, AppState, Command};
use crate::platform::{FormatMode, IncomingMessage, MessageSender};

/// Sends messages through the Telegram Bot API
pub struct TelegramSender {
    bot: Bot,
}

impl TelegramSender {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[allow(deprecated)]
fn parse_mode(mode: FormatMode) -> Option<ParseMode> {
    match mode {
        FormatMode::MarkdownV2 => Some(ParseMode::MarkdownV2),
        FormatMode::Markdown => Some(ParseMode::Markdown),
        FormatMode::Html => Some(ParseMode::Html),
        FormatMode::Plain => None,
    }
}

#[async_trait]
impl MessageSender for TelegramSender {
    async fn send_message(&self, chat_id: i64, text: &str, mode: FormatMode) -> Result<()> {
        let mut request = self.bot.send_message(ChatId(chat_id), text);
        if let Some(parse_mode) = parse_mode(mode) {
            request = request.parse_mode(parse_mode);
        }
        request
            .await
            .with_context(|| format!("Failed to send message to chat {}", chat_id))?;
        Ok(())
    }
}

/// Run the Telegram long-polling dispatcher
pub async fn run(state: Arc<AppState>, bot: Bot) -> Result<()> {
    info!("Starting Telegram platform...");

    let handler = Update::filter_message()
        .branch(
            dptree::filter_map(|msg: Message, me: Me| {
                parse_command(msg.text()?, me.username())
            })
            .endpoint(handle_command),
        )
        .branch(
            dptree::filter(|msg: Message| msg.text().is_some_and(|t| !t.starts_with('/')))
                .endpoint(handle_text),
        );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|upd| async move {
            debug!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn incoming(msg: &Message) -> Option<IncomingMessage> {
    let user = msg.from.as_ref()?;
    Some(IncomingMessage {
        user_id: user.id.0,
        chat_id: msg.chat.id.0,
        user_name: user.first_name.clone(),
        text: msg.text().unwrap_or_default().to_string(),
    })
}

async fn handle_command(msg: Message, cmd: Command, state: Arc<AppState>) -> ResponseResult<()> {
    if let Some(incoming) = incoming(&msg) {
        bot::handle_command(&state, &incoming, cmd).await;
    }
    Ok(())
}

async fn handle_text(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    if let Some(incoming) = incoming(&msg) {
        bot::handle_text(&state, &incoming).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_mode_sets_no_parse_mode() {
        assert_eq!(parse_mode(FormatMode::Plain), None);
    }

    #[test]
    fn test_markdown_v2_is_default() {
        assert_eq!(
            parse_mode(FormatMode::default()),
            Some(ParseMode::MarkdownV2)
        );
        assert_eq!(parse_mode(FormatMode::Html), Some(ParseMode::Html));
    }
}
