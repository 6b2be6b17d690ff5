//! # gridshare-core
//!
//! Shared library for gridshare containing the screen-grid domain model, the
//! switching state machine, the hotkey/action engine, the clipboard relay
//! policy and the server configuration text format.
//!
//! It has zero dependencies on OS APIs, async runtimes, or network sockets.
//!
//! # Architecture overview (for beginners)
//!
//! gridshare is a software KVM switch: one "server" machine shares its
//! keyboard and mouse with "client" machines arranged in a grid of screens.
//! Moving the cursor off the edge of the active screen hands live input over
//! to the neighbouring machine in that direction.
//!
//! This crate is the pure foundation.  It defines:
//!
//! - **`domain`** – The grid of screens (`Topology`), the state machine that
//!   decides when control moves between screens (`SwitchController`) and the
//!   policy deciding whose clipboard wins (`ClipboardRelay`).
//!
//! - **`input`** – Platform-neutral key names, modifier masks and the
//!   `KeySequence` type hotkeys are bound to.
//!
//! - **`hotkey`** – `Action`s (switch, lock, synthetic key and mouse input),
//!   their canonical text form, and the `HotkeyEngine` that maps physical
//!   key presses to actions.
//!
//! - **`config`** – `ServerConfig`, the complete server configuration, and the
//!   line-oriented text format it is written to and read back from.

pub mod config;
pub mod domain;
pub mod hotkey;
pub mod input;

// Re-export the most-used types at the crate root so callers can write
// `gridshare_core::Topology` instead of `gridshare_core::domain::topology::Topology`.
pub use config::{parse_config, ConfigError, Options, Protocol, ServerConfig};
pub use domain::clipboard::{
    ClipboardHandoff, ClipboardId, ClipboardRejected, ClipboardRelay, ClipboardState,
    DEFAULT_CLIPBOARD_SHARING_SIZE,
};
pub use domain::geometry::{Corner, CornerSet, Direction, Rect};
pub use domain::screen::{ModifierMap, Screen, ScreenFixes};
pub use domain::switching::{
    SwitchController, SwitchDecision, SwitchPhase, SwitchPolicy, SwitchRequest, SwitchState,
};
pub use domain::topology::{AutoPlacement, PlacementError, Topology, TopologyError};
pub use hotkey::action::{Action, ActionKind, ActionParseError, LockMode};
pub use hotkey::engine::{Hotkey, HotkeyEngine, HotkeyMatch};
pub use input::{Key, KeyCombo, KeySequence, Modifier, ModifierMask, MouseButton, NamedKey};
