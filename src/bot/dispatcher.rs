//! Routes one inbound message to a reply.

use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::bot::command::Command;
use crate::bot::database::{CheckRecord, Store, StoreError};
use crate::bot::notifier::{Notifier, TextFormat};
use crate::bot::rate_limit::RateLimiter;
use crate::bot::status::StatusClient;
use crate::bot::update::Update;

pub const RATE_LIMITED_TEXT: &str = "⏳ Slow down a bit, try again in a few seconds.";
pub const NO_HISTORY_TEXT: &str = "No history yet.";
pub const BROADCAST_USAGE_TEXT: &str = "Usage: /broadcast Your message here";
pub const BROADCAST_PREFIX: &str = "📢 Broadcast from owner:\n\n";
pub const FALLBACK_TEXT: &str =
    "❗ I didn't understand that. Send a phone number in international format like `+1234567890`.";

#[derive(Debug)]
pub enum DispatchError {
    Store(StoreError),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "store error: {}", e),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
        }
    }
}

impl From<StoreError> for DispatchError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

/// What happened to an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    /// No message or no chat to answer.
    Ignored,
    RateLimited,
    /// Privileged command from someone other than the owner.
    Denied(Command),
    Routed(Command),
}

pub struct Dispatcher {
    owner_username: String,
    limiter: RateLimiter,
    status: StatusClient,
    notifier: Arc<dyn Notifier>,
}

impl Dispatcher {
    pub fn new(
        owner_username: impl Into<String>,
        limiter: RateLimiter,
        status: StatusClient,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let owner_username: String = owner_username.into();
        Self {
            owner_username: owner_username.trim_start_matches('@').to_string(),
            limiter,
            status,
            notifier,
        }
    }

    #[cfg(test)]
    pub(crate) fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Case-insensitive handle comparison, ignoring a leading `@` on either side.
    pub fn is_owner(&self, username: &str) -> bool {
        let username = username.trim_start_matches('@');
        !username.is_empty() && username.eq_ignore_ascii_case(&self.owner_username)
    }

    /// Handle one update using a store handle scoped to this request.
    pub async fn handle(&self, store: &Store, update: Update) -> Result<Handled, DispatchError> {
        let Some(msg) = update.into_message() else {
            return Ok(Handled::Ignored);
        };
        let Some(chat_id) = msg.chat_id() else {
            return Ok(Handled::Ignored);
        };

        store.record_user(chat_id, msg.username())?;

        let rate_key = msg.sender_id().unwrap_or(chat_id);
        if !self.limiter.allow(rate_key) {
            self.reply(chat_id, RATE_LIMITED_TEXT).await;
            return Ok(Handled::RateLimited);
        }

        let text = msg.text();
        let preview: String = text.chars().take(100).collect();
        let command = Command::parse(text);
        info!(
            "Message from {} ({}): \"{}\" → {}",
            msg.username(),
            chat_id,
            preview,
            command.name()
        );

        if command.is_privileged() && !self.is_owner(msg.username()) {
            info!("Denied /{} for {} ({})", command.name(), msg.username(), chat_id);
            let denial = match command {
                Command::History { .. } => "❌ Only the owner can use /history.",
                _ => "❌ Only the owner can broadcast.",
            };
            self.reply(chat_id, denial).await;
            return Ok(Handled::Denied(command));
        }

        match &command {
            Command::Owner => {
                self.reply(chat_id, &format!("Owner: @{}", self.owner_username)).await;
            }
            Command::Stats => self.stats(store, chat_id).await?,
            Command::History { limit } => self.history(store, chat_id, *limit).await?,
            Command::Broadcast { message } => self.broadcast(store, chat_id, message.as_deref()).await?,
            Command::Start => {
                self.reply_markdown(chat_id, &welcome_text(&self.owner_username)).await;
            }
            Command::Help => {
                self.reply_markdown(chat_id, HELP_TEXT).await;
            }
            Command::PhoneCheck { number } => self.phone_check(store, chat_id, number).await?,
            Command::Unknown => {
                self.reply_markdown(chat_id, FALLBACK_TEXT).await;
            }
        }

        Ok(Handled::Routed(command))
    }

    async fn stats(&self, store: &Store, chat_id: i64) -> Result<(), DispatchError> {
        let users = store.count_users()?;
        let checks = store.count_checks()?;
        self.reply(chat_id, &format!("📊 Users: {users}\n📋 Checks: {checks}")).await;
        Ok(())
    }

    async fn history(&self, store: &Store, chat_id: i64, limit: u32) -> Result<(), DispatchError> {
        let checks = store.recent_checks(limit)?;
        self.reply(chat_id, &format_history(&checks)).await;
        Ok(())
    }

    async fn broadcast(&self, store: &Store, chat_id: i64, message: Option<&str>) -> Result<(), DispatchError> {
        let Some(message) = message else {
            self.reply(chat_id, BROADCAST_USAGE_TEXT).await;
            return Ok(());
        };

        let recipients = store.chat_ids()?;
        let text = format!("{BROADCAST_PREFIX}{message}");
        let mut delivered = 0usize;
        for recipient in &recipients {
            if self
                .notifier
                .send_message(*recipient, &text, TextFormat::Plain)
                .await
                .is_sent()
            {
                delivered += 1;
            }
        }

        info!("📢 Broadcast delivered to {}/{} chats", delivered, recipients.len());
        self.reply(chat_id, &format!("Broadcast sent to {delivered} users.")).await;
        Ok(())
    }

    async fn phone_check(&self, store: &Store, chat_id: i64, number: &str) -> Result<(), DispatchError> {
        self.reply_markdown(chat_id, &format!("🔎 Checking *{number}*, please wait..."))
            .await;

        let result = self.status.check_status(number).await;
        store.record_check(chat_id, number, &result.status, &result.details)?;

        let reply = format!(
            "📋 Result for *{}*:\n*Status:* `{}`\n*Details:* {}",
            number,
            result.status.replace('`', "'"),
            escape_markdown(&result.details)
        );
        self.reply_markdown(chat_id, &reply).await;
        Ok(())
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        self.send(chat_id, text, TextFormat::Plain).await;
    }

    async fn reply_markdown(&self, chat_id: i64, text: &str) {
        self.send(chat_id, text, TextFormat::Markdown).await;
    }

    async fn send(&self, chat_id: i64, text: &str, format: TextFormat) {
        if !self.notifier.send_message(chat_id, text, format).await.is_sent() {
            warn!("Reply to chat {} was not delivered", chat_id);
        }
    }
}

pub const HELP_TEXT: &str = "Commands:\n/start - Start bot\n/help - This help\n\
    Send a number like `+1234567890` to check it\n\
    Owner commands: /stats /history /broadcast";

pub fn welcome_text(owner: &str) -> String {
    format!(
        "🔥 *Evil Ban Checker*\n\nSend a phone number in international format \
         (example: `+2348100000000`) and I'll check its WhatsApp ban status.\n\nOwner: @{owner}"
    )
}

/// Backslash-escapes the legacy Markdown entity characters outside an entity.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// One line per check, newest first, timestamps in UTC.
pub fn format_history(checks: &[CheckRecord]) -> String {
    if checks.is_empty() {
        return NO_HISTORY_TEXT.to_string();
    }

    let mut out = String::from("Recent checks:\n");
    for check in checks {
        let ts = chrono::DateTime::from_timestamp(check.timestamp, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| check.timestamp.to_string());
        out.push_str(&format!("{} → {} ({})\n", check.number, check.status, ts));
    }
    out
}
