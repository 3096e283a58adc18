//! Classify inbound text into a bot command.

use crate::bot::database::MAX_HISTORY;

/// Rows shown by `/history` without an argument.
pub const DEFAULT_HISTORY: u32 = 10;

const MIN_NUMBER_DIGITS: usize = 8;
const MAX_NUMBER_DIGITS: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Owner,
    Stats,
    History { limit: u32 },
    Broadcast { message: Option<String> },
    Start,
    Help,
    PhoneCheck { number: String },
    Unknown,
}

impl Command {
    /// Commands are matched case-insensitively; the first rule that fits wins.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let lower = text.to_lowercase();

        if lower.starts_with("/owner") {
            Command::Owner
        } else if lower.starts_with("/stats") {
            Command::Stats
        } else if lower.starts_with("/history") {
            Command::History {
                limit: parse_history_limit(argument(text)),
            }
        } else if lower.starts_with("/broadcast") {
            Command::Broadcast {
                message: argument(text).map(str::to_string),
            }
        } else if lower == "/start" {
            Command::Start
        } else if lower == "/help" || lower == "/commands" {
            Command::Help
        } else if is_valid_number(text) {
            Command::PhoneCheck {
                number: text.to_string(),
            }
        } else {
            Command::Unknown
        }
    }

    /// Whether only the owner may run this command.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Command::History { .. } | Command::Broadcast { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Owner => "owner",
            Command::Stats => "stats",
            Command::History { .. } => "history",
            Command::Broadcast { .. } => "broadcast",
            Command::Start => "start",
            Command::Help => "help",
            Command::PhoneCheck { .. } => "phone_check",
            Command::Unknown => "unknown",
        }
    }
}

/// Everything after the first run of whitespace, if non-empty.
fn argument(text: &str) -> Option<&str> {
    let (_, rest) = text.split_once(char::is_whitespace)?;
    let rest = rest.trim();
    (!rest.is_empty()).then_some(rest)
}

fn parse_history_limit(arg: Option<&str>) -> u32 {
    let Some(arg) = arg else {
        return DEFAULT_HISTORY;
    };
    if !arg.chars().all(|c| c.is_ascii_digit()) {
        return DEFAULT_HISTORY;
    }
    match arg.parse::<u64>() {
        Ok(0) => DEFAULT_HISTORY,
        Ok(n) => n.min(MAX_HISTORY as u64) as u32,
        // All digits but too large for u64
        Err(_) => MAX_HISTORY,
    }
}

/// `+` followed by 8 to 15 ASCII digits, after trimming whitespace.
pub fn is_valid_number(text: &str) -> bool {
    let Some(digits) = text.trim().strip_prefix('+') else {
        return false;
    };
    (MIN_NUMBER_DIGITS..=MAX_NUMBER_DIGITS).contains(&digits.len())
        && digits.chars().all(|c| c.is_ascii_digit())
}
