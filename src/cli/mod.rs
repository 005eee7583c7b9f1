// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! CLI module for replaying recorded mocap sessions.
//!
//! This module contains the command-line interface logic, including argument
//! parsing and the `play` command implementation.

// Modules
/// CLI arguments.
pub mod args;

/// Logging helpers.
pub mod logging;

/// Playback logic.
pub mod play;
