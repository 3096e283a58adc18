//! Outbound messages. Delivery is best-effort: callers get a `SendOutcome`
//! and are free to ignore it.

use async_trait::async_trait;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::warn;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Target of the events this module emits when a send fails.
pub const SEND_LOG_TARGET: &str = module_path!();

/// How the platform should render the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Plain,
    Markdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    Failed(String),
}

impl SendOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, SendOutcome::Sent)
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str, format: TextFormat) -> SendOutcome;
}

/// Sends through the Telegram Bot API.
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(token: &str, api_url: Option<reqwest::Url>) -> Result<Self, reqwest::Error> {
        let client = teloxide::net::default_reqwest_settings()
            .timeout(SEND_TIMEOUT)
            .build()?;
        let mut bot = Bot::with_client(token, client);
        if let Some(url) = api_url {
            bot = bot.set_api_url(url);
        }
        Ok(Self { bot })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_message(&self, chat_id: i64, text: &str, format: TextFormat) -> SendOutcome {
        let mut request = self.bot.send_message(ChatId(chat_id), text);

        if format == TextFormat::Markdown {
            #[allow(deprecated)]
            let mode = ParseMode::Markdown;
            request = request.parse_mode(mode);
        }

        match request.await {
            Ok(_) => SendOutcome::Sent,
            Err(e) => {
                warn!("Failed to send to chat {}: {e}", chat_id);
                SendOutcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_is_sent() {
        assert!(SendOutcome::Sent.is_sent());
        assert!(!SendOutcome::Failed("nope".into()).is_sent());
    }

    #[tokio::test]
    async fn test_unreachable_api_reports_failure() {
        let url = reqwest::Url::parse("http://127.0.0.1:9").unwrap();
        let notifier = TelegramNotifier::new("123456789:ABCdef", Some(url)).unwrap();

        let outcome = notifier.send_message(1, "hello", TextFormat::Plain).await;
        assert!(matches!(outcome, SendOutcome::Failed(_)));
    }
}
