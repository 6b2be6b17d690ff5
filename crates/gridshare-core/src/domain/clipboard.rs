//! Clipboard ownership and propagation policy.
//!
//! The relay never touches clipboard bytes.  It decides whether an offered
//! clipboard may replace the current one and which screens must be told to
//! pull it.  Each clipboard id keeps its own owner and sequence number.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const MIB: u64 = 1024 * 1024;

/// Sharing cap applied when nothing else is configured.
pub const DEFAULT_CLIPBOARD_SHARING_SIZE: u64 = 3 * MIB;

/// Which clipboard an offer refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipboardId {
    /// The explicit copy/paste clipboard.
    Clipboard,
    /// The X11-style primary selection.
    Selection,
}

impl ClipboardId {
    pub const ALL: [ClipboardId; 2] = [ClipboardId::Clipboard, ClipboardId::Selection];

    fn slot(self) -> usize {
        match self {
            ClipboardId::Clipboard => 0,
            ClipboardId::Selection => 1,
        }
    }
}

/// Why an offered clipboard was not accepted.  None of these are fatal.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardRejected {
    #[error("clipboard sharing is disabled")]
    SharingDisabled,

    /// Oversized clipboards are dropped whole; truncation would corrupt
    /// structured formats.
    #[error("clipboard of {size} bytes exceeds the {cap}-byte sharing limit")]
    Oversized { size: u64, cap: u64 },

    /// A non-owner offered a sequence number that is not newer than the one
    /// already accepted.
    #[error("stale clipboard sequence {sequence} (current {current})")]
    Stale { sequence: u32, current: u32 },
}

/// Ownership of one clipboard id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClipboardState {
    /// Screen whose clipboard is authoritative, if any screen has offered one.
    pub owner: Option<usize>,
    /// Sequence number of the accepted offer.
    pub sequence: u32,
}

/// Tells `target` to pull clipboard `id` from `owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipboardHandoff {
    pub id: ClipboardId,
    pub owner: usize,
    pub target: usize,
    pub sequence: u32,
}

/// The effective clipboard size cap for a configured `bytes`.
///
/// A nonzero size is rounded up to the next whole MiB, so `1` becomes 1 MiB
/// and `MIB + 1` becomes 2 MiB.  Zero stays zero and means sharing is
/// disabled.  Sizes within a MiB of `u64::MAX` saturate to `u64::MAX`.
pub fn round_sharing_size(bytes: u64) -> u64 {
    bytes.div_ceil(MIB).saturating_mul(MIB)
}

/// Clipboard policy state, owned by the engine's run loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardRelay {
    states: [ClipboardState; 2],
    size_cap: u64,
    sharing_enabled: bool,
}

impl Default for ClipboardRelay {
    fn default() -> Self {
        Self {
            states: [ClipboardState::default(); 2],
            size_cap: DEFAULT_CLIPBOARD_SHARING_SIZE,
            sharing_enabled: true,
        }
    }
}

impl ClipboardRelay {
    /// Creates a relay with sharing enabled or not and the given cap, rounded
    /// the same way as [`ClipboardRelay::set_sharing_size`].
    pub fn new(sharing_enabled: bool, size_cap: u64) -> Self {
        let mut relay = Self::default();
        relay.set_sharing_size(size_cap);
        relay.sharing_enabled = sharing_enabled && size_cap > 0;
        relay
    }

    pub fn state(&self, id: ClipboardId) -> ClipboardState {
        self.states[id.slot()]
    }

    pub fn size_cap(&self) -> u64 {
        self.size_cap
    }

    pub fn sharing_enabled(&self) -> bool {
        self.sharing_enabled
    }

    /// Sets the sharing cap and returns the effective value.
    ///
    /// A nonzero size is rounded up to a whole MiB and enables sharing; zero
    /// disables sharing and leaves the cap at zero.
    pub fn set_sharing_size(&mut self, bytes: u64) -> u64 {
        self.size_cap = round_sharing_size(bytes);
        self.sharing_enabled = self.size_cap > 0;
        self.size_cap
    }

    pub fn set_sharing_enabled(&mut self, enabled: bool) {
        self.sharing_enabled = enabled;
    }

    /// Offers screen `screen`'s clipboard `id`.
    ///
    /// On acceptance the screen becomes the owner and the returned list holds
    /// every peer (other than the offering screen) that must pull the new
    /// content.
    ///
    /// # Errors
    ///
    /// See [`ClipboardRejected`].  The state is unchanged on rejection.
    pub fn offer(
        &mut self,
        screen: usize,
        id: ClipboardId,
        sequence: u32,
        size: u64,
        peers: &[usize],
    ) -> Result<Vec<usize>, ClipboardRejected> {
        if !self.sharing_enabled {
            return Err(ClipboardRejected::SharingDisabled);
        }
        if size > self.size_cap {
            return Err(ClipboardRejected::Oversized {
                size,
                cap: self.size_cap,
            });
        }
        let state = &mut self.states[id.slot()];
        if let Some(owner) = state.owner {
            if owner != screen && sequence <= state.sequence {
                return Err(ClipboardRejected::Stale {
                    sequence,
                    current: state.sequence,
                });
            }
        }
        state.owner = Some(screen);
        state.sequence = sequence;
        debug!(screen, ?id, sequence, size, "clipboard offer accepted");
        Ok(peers.iter().copied().filter(|&p| p != screen).collect())
    }

    /// Handoffs needed when control moves to `to`: one per clipboard id owned
    /// by another screen.
    pub fn on_switch(&self, to: usize) -> Vec<ClipboardHandoff> {
        if !self.sharing_enabled {
            return Vec::new();
        }
        ClipboardId::ALL
            .into_iter()
            .filter_map(|id| {
                let state = self.states[id.slot()];
                let owner = state.owner.filter(|&o| o != to)?;
                Some(ClipboardHandoff {
                    id,
                    owner,
                    target: to,
                    sequence: state.sequence,
                })
            })
            .collect()
    }

    /// Drops ownership held by a screen that has gone away.
    pub fn forget_screen(&mut self, screen: usize) {
        for state in &mut self.states {
            if state.owner == Some(screen) {
                state.owner = None;
            }
        }
    }
}
