pub mod accounts;
pub mod config;
pub mod daemon;
pub mod error;
pub mod interfaces;
pub mod memory;
pub mod providers;
pub mod reminders;
pub mod services;

pub use crate::accounts::{AccountService, Role};
pub use crate::config::Config;
pub use crate::error::{Result, ValetBotError};
pub use crate::memory::{MemoryDocument, MemoryStore, Reminder};
pub use crate::services::query::{ActionTag, CommandReply, QueryService};
