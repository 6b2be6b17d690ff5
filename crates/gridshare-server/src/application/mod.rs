//! Application layer use cases for the gridshare server.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure rules in `gridshare_core`) and the infrastructure (OS hooks, service
//! control, files).
//!
//! Use cases in this layer:
//!
//! - **Orchestrate** domain objects to fulfil a goal (e.g., "hand input to the
//!   laptop when the cursor leaves the right edge").
//! - **Depend on abstractions** (the `PlatformScreen` and `RoutingLayer`
//!   traits) rather than concrete implementations.
//! - **Contain no OS calls, no network I/O, no file system access**.
//!
//! # Sub-modules
//!
//! - **`route_input`** – The `SwitchEngine`: turns server input, client
//!   connections and clipboard offers into switches and forwarded input.
//!   It runs on every keystroke and mouse movement.
//!
//! - **`event_loop`** – The queue and run loop that feed the engine one event
//!   at a time and fire its timers.
//!
//! - **`manage_screens`** – The registry of connected client screens.

pub mod event_loop;
pub mod manage_screens;
pub mod route_input;
