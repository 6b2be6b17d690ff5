//! The complete server configuration and its text format.
//!
//! A [`ServerConfig`] bundles the screen grid, the global [`Options`] and the
//! hotkey bindings.  It is written to the line-oriented text format consumed
//! by the server core (see [`writer`]) and read back by [`parser`].
//!
//! Two configs compare equal iff every tracked field is equal; there is no
//! hidden state.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::clipboard::{round_sharing_size, ClipboardRelay, DEFAULT_CLIPBOARD_SHARING_SIZE};
use crate::domain::geometry::CornerSet;
use crate::domain::switching::SwitchPolicy;
use crate::domain::topology::Topology;
use crate::hotkey::engine::Hotkey;

pub mod parser;
pub mod writer;

pub use parser::{parse_config, ConfigError};

/// Default heartbeat interval in milliseconds.
pub const DEFAULT_HEARTBEAT_MS: u32 = 5000;
/// Default switch delay in milliseconds.
pub const DEFAULT_SWITCH_DELAY_MS: u32 = 250;
/// Default double-tap window in milliseconds.
pub const DEFAULT_SWITCH_DOUBLE_TAP_MS: u32 = 250;

/// Wire protocol dialect spoken to clients.
///
/// The set is closed: anything else is rejected when config or settings are
/// loaded, so the writer never sees an invalid value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Synergy,
    Barrier,
}

impl Protocol {
    pub fn name(self) -> &'static str {
        match self {
            Protocol::Synergy => "synergy",
            Protocol::Barrier => "barrier",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "synergy" => Some(Protocol::Synergy),
            "barrier" => Some(Protocol::Barrier),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Global server options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub has_heartbeat: bool,
    /// Heartbeat interval in milliseconds.
    pub heartbeat: u32,
    pub protocol: Protocol,
    /// Forward mouse motion as deltas instead of absolute positions.
    pub relative_mouse_moves: bool,
    pub win32_keep_foreground: bool,
    pub has_switch_delay: bool,
    /// Milliseconds the cursor must rest on an edge before switching.
    pub switch_delay: u32,
    pub has_switch_double_tap: bool,
    /// Milliseconds within which a second corner entry switches.
    pub switch_double_tap: u32,
    pub switch_corners: CornerSet,
    pub switch_corner_size: u32,
    pub disable_lock_to_screen: bool,
    pub clipboard_sharing: bool,
    /// Clipboard size limit in bytes.
    pub clipboard_sharing_size: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            has_heartbeat: false,
            heartbeat: DEFAULT_HEARTBEAT_MS,
            protocol: Protocol::Synergy,
            relative_mouse_moves: false,
            win32_keep_foreground: false,
            has_switch_delay: false,
            switch_delay: DEFAULT_SWITCH_DELAY_MS,
            has_switch_double_tap: false,
            switch_double_tap: DEFAULT_SWITCH_DOUBLE_TAP_MS,
            switch_corners: CornerSet::default(),
            switch_corner_size: 0,
            disable_lock_to_screen: false,
            clipboard_sharing: true,
            clipboard_sharing_size: DEFAULT_CLIPBOARD_SHARING_SIZE,
        }
    }
}

impl Options {
    /// Sets the clipboard limit and returns the effective value.
    ///
    /// A nonzero size is rounded up to a whole MiB and turns sharing on; zero
    /// turns sharing off.
    pub fn set_clipboard_sharing_size(&mut self, bytes: u64) -> u64 {
        self.clipboard_sharing_size = round_sharing_size(bytes);
        self.clipboard_sharing = self.clipboard_sharing_size > 0;
        self.clipboard_sharing_size
    }

    /// Switching policy for these options, without per-screen corners.
    pub fn switch_policy(&self) -> SwitchPolicy {
        let ms = |enabled: bool, value: u32| enabled.then(|| Duration::from_millis(u64::from(value)));
        SwitchPolicy {
            switch_delay: ms(self.has_switch_delay, self.switch_delay),
            double_tap: ms(self.has_switch_double_tap, self.switch_double_tap),
            corners: self.switch_corners,
            corner_size: self.switch_corner_size,
            disable_lock_to_screen: self.disable_lock_to_screen,
        }
    }

    /// A fresh clipboard relay configured from these options.
    pub fn clipboard_relay(&self) -> ClipboardRelay {
        ClipboardRelay::new(self.clipboard_sharing, self.clipboard_sharing_size)
    }
}

/// The complete server configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerConfig {
    pub topology: Topology,
    pub options: Options,
    /// Bindings in the order they are written.
    pub hotkeys: Vec<Hotkey>,
}

impl ServerConfig {
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            ..Self::default()
        }
    }

    /// Switching policy while the screen at `index` is active: the global
    /// corners plus that screen's own corners, with the larger zone size.
    pub fn switch_policy_for(&self, index: usize) -> SwitchPolicy {
        let mut policy = self.options.switch_policy();
        if let Some(screen) = self.topology.screen_at(index) {
            for corner in screen.switch_corners.iter() {
                policy.corners.set(corner, true);
            }
            policy.corner_size = policy.corner_size.max(screen.switch_corner_size);
        }
        policy
    }
}
