//! The interactive chat application.
//!
//! This module provides the read-eval-print chat loop's building blocks:
//!
//! - Streaming replies rendered fragment by fragment with 24-bit colors
//! - Keyword commands (`exit`, `clear`, `reset`, `history`, `help`, `stats`)
//! - A JSON settings file for colors and timing statistics
//!
//! # Architecture
//!
//! - [`conversation`]: the role-tagged message log
//! - [`commands`]: the static keyword table and dispatcher
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: the chat session that ties them to a [`crate::ChatModel`]

pub mod commands;
pub mod config;
pub mod conversation;
pub mod session;

pub use commands::{CommandRegistry, CommandSpec, Dispatch, Handler, chat_commands};
pub use config::{
    ChatArgs, ChatConfig, Palette, Rgb, RoleColors, Settings, SettingsFile, load_env_file,
    persist_show_stats,
};
pub use conversation::{Conversation, DEFAULT_GREETING, DEFAULT_PERSONA};
pub use session::{ChatSession, FAREWELL, INTERRUPT_HINT, Interrupt, RETRY_HINT};
