//! The capability contract every OS back end implements.
//!
//! A back end captures the server's physical keyboard and mouse, injects
//! synthetic input, parks and warps the cursor, and exposes the local
//! clipboards.  The engine drives it through the flat [`PlatformScreen`]
//! trait, injected as `Arc<dyn PlatformScreen>`.
//!
//! # Event flow
//!
//! Back ends never touch switching state.  Everything they observe (key
//! presses, cursor motion, clipboard grabs, display changes) is posted as a
//! [`PlatformEvent`] into the engine queue, and the run loop handles it in
//! order with network events and timer expirations.
//!
//! # Testability
//!
//! [`mock::RecordingPlatform`] records every call so unit tests can assert on
//! what the engine asked the OS to do.  [`headless::HeadlessScreen`] keeps a
//! purely in-memory cursor, button state and clipboard, for running the
//! server without a display.

use gridshare_core::{ClipboardId, Key, ModifierMask, Rect};
use thiserror::Error;

pub mod button_state;
pub mod headless;
pub mod mock;

/// Token returned by [`PlatformScreen::register_hot_key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HotKeyHandle(pub u32);

/// How [`PlatformScreen::fake_key`] synthesises a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Down,
    Up,
    /// Press immediately followed by release.
    Stroke,
}

/// Error type for platform operations.  None of these stop the engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The back end cannot do this at all (e.g. no hotkey support).
    #[error("capability not supported by this platform: {0}")]
    Unsupported(&'static str),

    /// The OS refused the request, typically for lack of permission.
    #[error("platform denied {capability}: {reason}")]
    Denied {
        capability: &'static str,
        reason: String,
    },

    /// Another application already owns the key combination.
    #[error("hot key {0} is already registered")]
    HotKeyTaken(String),

    #[error("unknown hot key handle {0}")]
    UnknownHotKey(u32),
}

/// Something the back end observed on the server's own devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    /// A physical key went down.
    KeyDown { key: Key },
    /// A physical key came up.
    KeyUp { key: Key },
    /// The physical cursor is now at `(x, y)` in server screen coordinates.
    MouseMove { x: i32, y: i32 },
    /// Mouse button (numbered from 1) pressed.
    MouseDown(u8),
    /// Mouse button (numbered from 1) released.
    MouseUp(u8),
    MouseWheel { x_delta: i32, y_delta: i32 },
    /// A local application took ownership of a clipboard.
    ClipboardGrabbed(ClipboardId),
    /// The server's screen geometry changed.
    ShapeChanged(Rect),
    /// The local screensaver started or stopped.
    ScreensaverChanged(bool),
}

/// Capabilities required from an OS back end.
///
/// Methods are synchronous and must not block for long: they are called from
/// the engine's run loop.
pub trait PlatformScreen: Send + Sync {
    /// Geometry of the server screen.
    fn shape(&self) -> Rect;

    /// Current position of the physical cursor.
    fn cursor_pos(&self) -> (i32, i32);

    /// Moves the physical cursor without generating an input event.
    fn warp_cursor(&self, x: i32, y: i32);

    fn fake_mouse_move(&self, x: i32, y: i32);

    fn fake_mouse_relative_move(&self, dx: i32, dy: i32);

    fn fake_mouse_button(&self, button: u8, down: bool);

    fn fake_mouse_wheel(&self, x_delta: i32, y_delta: i32);

    /// Synthesises `key` with `modifiers` held.
    fn fake_key(&self, key: Key, modifiers: ModifierMask, action: KeyAction);

    /// Contents of a local clipboard, or `None` if it is empty or unreadable.
    fn clipboard(&self, id: ClipboardId) -> Option<Vec<u8>>;

    /// Replaces a local clipboard.  Returns `false` if the OS refused.
    fn set_clipboard(&self, id: ClipboardId, data: &[u8]) -> bool;

    /// Reserves a global key combination so it is reported to the engine and
    /// not delivered to local applications.
    fn register_hot_key(&self, key: Key, modifiers: ModifierMask)
        -> Result<HotKeyHandle, PlatformError>;

    fn unregister_hot_key(&self, handle: HotKeyHandle) -> Result<(), PlatformError>;

    /// Starts capturing.  Called once when the engine starts.
    fn enable(&self) -> Result<(), PlatformError>;

    fn disable(&self);

    /// The server screen regains input control.
    fn enter(&self);

    /// Input control moves to a client: hide the cursor and capture
    /// everything.
    fn leave(&self);

    /// Returns `false` to veto leaving the server screen (e.g. while a
    /// fullscreen application holds exclusive focus).
    fn can_leave(&self) -> bool;

    fn screensaver(&self, activate: bool);
}
