//! Voxpilot: page-aware voice command engine for the browser.
//!
//! The extension reports page captures and spoken instructions over a local
//! WebSocket bridge; this crate sanitizes captures into snapshots, sends them
//! with the instruction to the language-understanding service, and executes
//! the decided command back through the extension.

pub mod cli;
pub mod command;
pub mod commands;
pub mod config;
pub mod control;
pub mod error;
pub mod executor;
pub mod interpret;
pub mod page;
pub mod relay;
pub mod session;

pub use command::{Command, Target};
pub use error::{Result, VoxpilotError};
