//! The advisor chat.
//!
//! This module ties the transcript, the streaming client and the renderer together:
//!
//! - [`config`]: CLI argument parsing, YAML configuration and defaults
//! - [`controller`]: the exchange state machine behind the in-flight gate
//! - [`commands`]: slash command parsing

pub mod commands;
pub mod config;
pub mod controller;

pub use crate::render::{PlainTextRenderer, Renderer, THINKING_LABEL};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{
    AdvisorArgs, AdvisorConfig, DEFAULT_FALLBACK_MESSAGE, DEFAULT_GREETING,
    DEFAULT_SYSTEM_INSTRUCTION,
};
pub use controller::{ChatController, ControllerConfig, IgnoreReason, SessionStats, SubmitOutcome};
