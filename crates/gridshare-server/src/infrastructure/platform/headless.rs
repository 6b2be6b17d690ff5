//! A platform back end with no display.
//!
//! The headless screen keeps its cursor, mouse buttons, clipboards and hot
//! key table in memory.  It lets the server run (and be exercised end to end)
//! on machines without a desktop session: injected input is logged at
//! `trace` level and otherwise only updates the in-memory state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use gridshare_core::{ClipboardId, Key, ModifierMask, Rect};
use tracing::{debug, trace};

use super::button_state::MouseButtons;
use super::{HotKeyHandle, KeyAction, PlatformError, PlatformScreen};

#[derive(Debug, Default)]
struct Desk {
    cursor: (i32, i32),
    clipboards: HashMap<ClipboardId, Vec<u8>>,
    hot_keys: HashMap<u32, (Key, ModifierMask)>,
    next_handle: u32,
}

/// In-memory [`PlatformScreen`].
#[derive(Debug)]
pub struct HeadlessScreen {
    shape: Rect,
    desk: Mutex<Desk>,
    buttons: MouseButtons,
    enabled: AtomicBool,
    active: AtomicBool,
    screensaver: AtomicBool,
}

impl HeadlessScreen {
    pub fn new(shape: Rect) -> Self {
        Self {
            shape,
            desk: Mutex::new(Desk {
                cursor: shape.center(),
                next_handle: 1,
                ..Desk::default()
            }),
            buttons: MouseButtons::new(),
            enabled: AtomicBool::new(false),
            active: AtomicBool::new(true),
            screensaver: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Desk> {
        self.desk.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn buttons(&self) -> &MouseButtons {
        &self.buttons
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// `true` while the server screen owns input.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn is_screensaver_active(&self) -> bool {
        self.screensaver.load(Ordering::Acquire)
    }

    /// Number of hot keys currently registered.
    pub fn hot_key_count(&self) -> usize {
        self.lock().hot_keys.len()
    }
}

impl PlatformScreen for HeadlessScreen {
    fn shape(&self) -> Rect {
        self.shape
    }

    fn cursor_pos(&self) -> (i32, i32) {
        self.lock().cursor
    }

    fn warp_cursor(&self, x: i32, y: i32) {
        self.lock().cursor = self.shape.clamp(x, y);
    }

    fn fake_mouse_move(&self, x: i32, y: i32) {
        let dragging = self.buttons.on_motion();
        trace!(x, y, dragging, "fake mouse move");
        self.lock().cursor = self.shape.clamp(x, y);
    }

    fn fake_mouse_relative_move(&self, dx: i32, dy: i32) {
        let dragging = self.buttons.on_motion();
        trace!(dx, dy, dragging, "fake relative mouse move");
        let mut desk = self.lock();
        let (x, y) = desk.cursor;
        desk.cursor = self.shape.clamp(x.saturating_add(dx), y.saturating_add(dy));
    }

    fn fake_mouse_button(&self, button: u8, down: bool) {
        trace!(button, down, "fake mouse button");
        if down {
            self.buttons.press(button);
        } else {
            self.buttons.release(button);
        }
    }

    fn fake_mouse_wheel(&self, x_delta: i32, y_delta: i32) {
        trace!(x_delta, y_delta, "fake mouse wheel");
    }

    fn fake_key(&self, key: Key, modifiers: ModifierMask, action: KeyAction) {
        trace!(%key, modifiers = modifiers.0, ?action, "fake key");
    }

    fn clipboard(&self, id: ClipboardId) -> Option<Vec<u8>> {
        self.lock().clipboards.get(&id).cloned()
    }

    fn set_clipboard(&self, id: ClipboardId, data: &[u8]) -> bool {
        self.lock().clipboards.insert(id, data.to_vec());
        true
    }

    fn register_hot_key(
        &self,
        key: Key,
        modifiers: ModifierMask,
    ) -> Result<HotKeyHandle, PlatformError> {
        let mut desk = self.lock();
        if desk.hot_keys.values().any(|taken| *taken == (key, modifiers)) {
            return Err(PlatformError::HotKeyTaken(key.to_string()));
        }
        let handle = desk.next_handle;
        desk.next_handle += 1;
        desk.hot_keys.insert(handle, (key, modifiers));
        debug!(%key, handle, "hot key registered");
        Ok(HotKeyHandle(handle))
    }

    fn unregister_hot_key(&self, handle: HotKeyHandle) -> Result<(), PlatformError> {
        self.lock()
            .hot_keys
            .remove(&handle.0)
            .map(|_| ())
            .ok_or(PlatformError::UnknownHotKey(handle.0))
    }

    fn enable(&self) -> Result<(), PlatformError> {
        self.enabled.store(true, Ordering::Release);
        Ok(())
    }

    fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
        self.buttons.reset();
    }

    fn enter(&self) {
        self.active.store(true, Ordering::Release);
    }

    fn leave(&self) {
        self.active.store(false, Ordering::Release);
    }

    fn can_leave(&self) -> bool {
        true
    }

    fn screensaver(&self, activate: bool) {
        self.screensaver.store(activate, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::platform::button_state::ButtonState;
    use gridshare_core::Modifier;

    fn screen() -> HeadlessScreen {
        HeadlessScreen::new(Rect::new(0, 0, 1024, 768))
    }

    #[test]
    fn test_cursor_starts_centred_and_warps_are_clamped() {
        // Arrange
        let screen = screen();
        assert_eq!(screen.cursor_pos(), (512, 384));

        // Act
        screen.warp_cursor(5000, -20);

        // Assert
        assert_eq!(screen.cursor_pos(), (1023, 0));
    }

    #[test]
    fn test_relative_moves_accumulate() {
        let screen = screen();
        screen.warp_cursor(100, 100);

        screen.fake_mouse_relative_move(10, -5);
        screen.fake_mouse_relative_move(1, 1);

        assert_eq!(screen.cursor_pos(), (111, 96));
    }

    #[test]
    fn test_move_with_button_held_is_a_drag() {
        let screen = screen();
        screen.fake_mouse_button(1, true);

        screen.fake_mouse_move(10, 10);

        assert_eq!(screen.buttons().state(1), ButtonState::Dragged);
        screen.fake_mouse_button(1, false);
        assert!(!screen.buttons().any());
    }

    #[test]
    fn test_duplicate_hot_key_is_refused_until_unregistered() {
        // Arrange
        let screen = screen();
        let mask = ModifierMask::NONE.with(Modifier::Alt);
        let handle = screen.register_hot_key(Key::Function(4), mask).unwrap();

        // Act / Assert
        assert!(matches!(
            screen.register_hot_key(Key::Function(4), mask),
            Err(PlatformError::HotKeyTaken(_))
        ));
        screen.unregister_hot_key(handle).unwrap();
        assert_eq!(screen.hot_key_count(), 0);
        assert!(screen.register_hot_key(Key::Function(4), mask).is_ok());
    }

    #[test]
    fn test_unregistering_unknown_handle_fails() {
        let screen = screen();
        assert_eq!(
            screen.unregister_hot_key(HotKeyHandle(99)),
            Err(PlatformError::UnknownHotKey(99))
        );
    }

    #[test]
    fn test_enter_leave_and_disable_update_state() {
        let screen = screen();
        screen.enable().unwrap();
        screen.leave();
        assert!(screen.is_enabled());
        assert!(!screen.is_active());

        screen.enter();
        screen.disable();

        assert!(screen.is_active());
        assert!(!screen.is_enabled());
    }
}
