//! Hotkeys: key or mouse triggers bound to ordered lists of actions.
//!
//! - [`action`] – the actions themselves and their `[;]type(args)` text.
//! - [`engine`] – bindings, exact matching, and press→release correlation.

pub mod action;
pub mod engine;
