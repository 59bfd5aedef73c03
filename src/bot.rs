use std::sync::Arc;

use teloxide::utils::command::BotCommands;
use teloxide::utils::markdown;
use tracing::{info, warn};

use crate::broadcast::Broadcaster;
use crate::config::Config;
use crate::irrigation::{self, StatusSource};
use crate::platform::{FormatMode, IncomingMessage, MessageSender};

pub const UNAUTHORIZED_REPLY: &str =
    "🚫 You are not authorized to use this bot. Please contact the administrator.";
pub const FETCHING_REPLY: &str = "Fetching latest status...";
pub const FALLBACK_REPLY: &str =
    "I'm not sure how to respond to that. Try a command like /irrigation_status or /start.";
pub const GENERAL_ALERT: &str = "🔔 *System Maintenance Notice:* We'll be updating services tonight\\. Expect brief downtime\\.";
pub const ALERT_CONFIRMATION: &str = "General alert broadcasted to all authorized users.";
pub const STATUS_BROADCAST_CONFIRMATION: &str =
    "Irrigation status broadcasted to all authorized users.";

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "snake_case", description = "Irrigation bot commands:")]
pub enum Command {
    #[command(description = "greet and show your user ID")]
    Start,
    #[command(description = "show the live irrigation status")]
    IrrigationStatus,
    #[command(description = "send the maintenance notice to every authorized user")]
    SendGeneralAlert,
    #[command(description = "send the status summary to every authorized user")]
    BroadcastIrrigationStatus,
}

/// Parse a command ignoring the case of its name and of the `@bot` suffix.
pub fn parse_command(text: &str, bot_name: &str) -> Option<Command> {
    let split = text.find(char::is_whitespace).unwrap_or(text.len());
    let (name, args) = text.split_at(split);
    let normalized = format!("{}{}", name.to_lowercase(), args);
    Command::parse(&normalized, &bot_name.to_lowercase()).ok()
}

/// Shared application state, read-only after startup
pub struct AppState {
    config: Arc<Config>,
    sender: Arc<dyn MessageSender>,
    broadcaster: Arc<Broadcaster>,
    irrigation: Arc<dyn StatusSource>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        sender: Arc<dyn MessageSender>,
        broadcaster: Arc<Broadcaster>,
        irrigation: Arc<dyn StatusSource>,
    ) -> Self {
        Self {
            config,
            sender,
            broadcaster,
            irrigation,
        }
    }

    /// Reply into the originating chat; failures are only logged.
    async fn reply(&self, incoming: &IncomingMessage, text: &str, mode: FormatMode) {
        if let Err(e) = self.sender.send_message(incoming.chat_id, text, mode).await {
            warn!("Failed to reply to chat {}: {:#}", incoming.chat_id, e);
        }
    }

    /// Returns false (after sending the denial) for senders outside the allow-list.
    async fn authorize(&self, incoming: &IncomingMessage) -> bool {
        if self.config.is_authorized(incoming.user_id) {
            return true;
        }
        warn!(
            "Unauthorized message from {} ({})",
            incoming.user_name, incoming.user_id
        );
        self.reply(incoming, UNAUTHORIZED_REPLY, FormatMode::Plain)
            .await;
        false
    }

    async fn send_irrigation_status(&self, incoming: &IncomingMessage) {
        let report = irrigation::fetch_report(self.irrigation.as_ref()).await;
        self.reply(incoming, &report.render(), FormatMode::MarkdownV2)
            .await;
    }
}

fn greeting(incoming: &IncomingMessage) -> String {
    format!(
        "👋 Hello {}\\! Your User ID is {}\\. Welcome to the bot\\!",
        markdown::escape(&incoming.user_name),
        markdown::code_inline(&incoming.user_id.to_string())
    )
}

pub async fn handle_command(state: &AppState, incoming: &IncomingMessage, command: Command) {
    info!(
        "Received {:?} from user {} ({})",
        command, incoming.user_name, incoming.user_id
    );

    if !state.authorize(incoming).await {
        return;
    }

    match command {
        Command::Start => {
            state
                .reply(incoming, &greeting(incoming), FormatMode::MarkdownV2)
                .await;
        }
        Command::IrrigationStatus => {
            state.send_irrigation_status(incoming).await;
        }
        Command::SendGeneralAlert => {
            state
                .broadcaster
                .broadcast(GENERAL_ALERT, FormatMode::MarkdownV2)
                .await;
            state
                .reply(incoming, ALERT_CONFIRMATION, FormatMode::Plain)
                .await;
        }
        Command::BroadcastIrrigationStatus => {
            state
                .broadcaster
                .broadcast(&irrigation::broadcast_summary(), FormatMode::MarkdownV2)
                .await;
            state
                .reply(incoming, STATUS_BROADCAST_CONFIRMATION, FormatMode::Plain)
                .await;
        }
    }
}

pub async fn handle_text(state: &AppState, incoming: &IncomingMessage) {
    if !state.authorize(incoming).await {
        return;
    }

    info!(
        "Message from {} ({}): {}",
        incoming.user_name, incoming.user_id, incoming.text
    );

    let text = incoming.text.to_lowercase();
    if text.contains("hello") {
        let reply = format!("Hello there, {}!", incoming.user_name);
        state.reply(incoming, &reply, FormatMode::Plain).await;
    } else if text.contains("status") {
        state
            .reply(incoming, FETCHING_REPLY, FormatMode::Plain)
            .await;
        state.send_irrigation_status(incoming).await;
    } else {
        state
            .reply(incoming, FALLBACK_REPLY, FormatMode::Plain)
            .await;
    }
}
