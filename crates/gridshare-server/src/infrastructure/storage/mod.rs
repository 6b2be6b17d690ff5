//! Storage infrastructure: settings file persistence.
//!
//! The `settings` sub-module handles:
//!
//! - Reading the TOML settings file from the platform-appropriate directory.
//! - Recovering key by key when the file is partly malformed.
//! - Writing the settings back, creating the directory on first save.
//! - Providing first-run defaults when the file does not exist yet.

pub mod settings;
