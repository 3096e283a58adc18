//! Bot core - turns webhook updates into replies.

pub mod command;
pub mod database;
pub mod dispatcher;
pub mod notifier;
pub mod rate_limit;
pub mod status;
pub mod update;

pub use command::{is_valid_number, Command};
pub use database::{CheckRecord, Database, Store, StoreError};
pub use dispatcher::{DispatchError, Dispatcher, Handled};
pub use notifier::{Notifier, SendOutcome, TelegramNotifier, TextFormat};
pub use rate_limit::RateLimiter;
pub use status::{CheckResult, StatusClient};
pub use update::Update;
