//! Recording platform for unit and integration tests.
//!
//! Every call the engine makes is appended to a log that tests inspect with
//! [`RecordingPlatform::calls`].  Shape, the leave veto, hot key refusals and
//! clipboard contents are configurable.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use gridshare_core::{ClipboardId, Key, ModifierMask, Rect};

use super::{HotKeyHandle, KeyAction, PlatformError, PlatformScreen};

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    WarpCursor(i32, i32),
    FakeMouseMove(i32, i32),
    FakeMouseRelativeMove(i32, i32),
    FakeMouseButton { button: u8, down: bool },
    FakeMouseWheel(i32, i32),
    FakeKey {
        key: Key,
        modifiers: ModifierMask,
        action: KeyAction,
    },
    SetClipboard(ClipboardId, Vec<u8>),
    RegisterHotKey(Key, ModifierMask),
    UnregisterHotKey(HotKeyHandle),
    Enable,
    Disable,
    Enter,
    Leave,
    Screensaver(bool),
}

#[derive(Debug)]
struct State {
    shape: Rect,
    cursor: (i32, i32),
    can_leave: bool,
    refused_hot_keys: HashSet<(Key, ModifierMask)>,
    clipboards: HashMap<ClipboardId, Vec<u8>>,
    next_handle: u32,
    calls: Vec<PlatformCall>,
}

/// A [`PlatformScreen`] that records calls instead of touching the OS.
#[derive(Debug)]
pub struct RecordingPlatform {
    state: Mutex<State>,
}

impl RecordingPlatform {
    /// Creates a platform with the given server screen shape.
    pub fn new(shape: Rect) -> Self {
        Self {
            state: Mutex::new(State {
                shape,
                cursor: shape.center(),
                can_leave: true,
                refused_hot_keys: HashSet::new(),
                clipboards: HashMap::new(),
                next_handle: 1,
                calls: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: PlatformCall) {
        self.lock().calls.push(call);
    }

    /// Snapshot of every call so far.
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Makes [`PlatformScreen::can_leave`] answer `allowed`.
    pub fn set_can_leave(&self, allowed: bool) {
        self.lock().can_leave = allowed;
    }

    /// Makes registration of this combination fail.
    pub fn refuse_hot_key(&self, key: Key, modifiers: ModifierMask) {
        self.lock().refused_hot_keys.insert((key, modifiers));
    }

    /// Puts data on a local clipboard as if an application had copied it.
    pub fn put_clipboard(&self, id: ClipboardId, data: impl Into<Vec<u8>>) {
        self.lock().clipboards.insert(id, data.into());
    }
}

impl PlatformScreen for RecordingPlatform {
    fn shape(&self) -> Rect {
        self.lock().shape
    }

    fn cursor_pos(&self) -> (i32, i32) {
        self.lock().cursor
    }

    fn warp_cursor(&self, x: i32, y: i32) {
        let mut state = self.lock();
        state.cursor = (x, y);
        state.calls.push(PlatformCall::WarpCursor(x, y));
    }

    fn fake_mouse_move(&self, x: i32, y: i32) {
        let mut state = self.lock();
        state.cursor = (x, y);
        state.calls.push(PlatformCall::FakeMouseMove(x, y));
    }

    fn fake_mouse_relative_move(&self, dx: i32, dy: i32) {
        self.record(PlatformCall::FakeMouseRelativeMove(dx, dy));
    }

    fn fake_mouse_button(&self, button: u8, down: bool) {
        self.record(PlatformCall::FakeMouseButton { button, down });
    }

    fn fake_mouse_wheel(&self, x_delta: i32, y_delta: i32) {
        self.record(PlatformCall::FakeMouseWheel(x_delta, y_delta));
    }

    fn fake_key(&self, key: Key, modifiers: ModifierMask, action: KeyAction) {
        self.record(PlatformCall::FakeKey {
            key,
            modifiers,
            action,
        });
    }

    fn clipboard(&self, id: ClipboardId) -> Option<Vec<u8>> {
        self.lock().clipboards.get(&id).cloned()
    }

    fn set_clipboard(&self, id: ClipboardId, data: &[u8]) -> bool {
        let mut state = self.lock();
        state.clipboards.insert(id, data.to_vec());
        state.calls.push(PlatformCall::SetClipboard(id, data.to_vec()));
        true
    }

    fn register_hot_key(
        &self,
        key: Key,
        modifiers: ModifierMask,
    ) -> Result<HotKeyHandle, PlatformError> {
        let mut state = self.lock();
        state.calls.push(PlatformCall::RegisterHotKey(key, modifiers));
        if state.refused_hot_keys.contains(&(key, modifiers)) {
            return Err(PlatformError::HotKeyTaken(key.to_string()));
        }
        let handle = HotKeyHandle(state.next_handle);
        state.next_handle += 1;
        Ok(handle)
    }

    fn unregister_hot_key(&self, handle: HotKeyHandle) -> Result<(), PlatformError> {
        self.record(PlatformCall::UnregisterHotKey(handle));
        Ok(())
    }

    fn enable(&self) -> Result<(), PlatformError> {
        self.record(PlatformCall::Enable);
        Ok(())
    }

    fn disable(&self) {
        self.record(PlatformCall::Disable);
    }

    fn enter(&self) {
        self.record(PlatformCall::Enter);
    }

    fn leave(&self) {
        self.record(PlatformCall::Leave);
    }

    fn can_leave(&self) -> bool {
        self.lock().can_leave
    }

    fn screensaver(&self, activate: bool) {
        self.record(PlatformCall::Screensaver(activate));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridshare_core::Modifier;

    #[test]
    fn test_recording_platform_logs_calls_in_order() {
        // Arrange
        let platform = RecordingPlatform::new(Rect::new(0, 0, 800, 600));

        // Act
        platform.leave();
        platform.warp_cursor(400, 300);
        platform.enter();

        // Assert
        assert_eq!(
            platform.calls(),
            vec![
                PlatformCall::Leave,
                PlatformCall::WarpCursor(400, 300),
                PlatformCall::Enter
            ]
        );
        assert_eq!(platform.cursor_pos(), (400, 300));
    }

    #[test]
    fn test_refused_hot_key_fails_registration() {
        let platform = RecordingPlatform::new(Rect::new(0, 0, 800, 600));
        let ctrl = ModifierMask::NONE.with(Modifier::Control);
        platform.refuse_hot_key(Key::Char('q'), ctrl);

        assert!(platform.register_hot_key(Key::Char('q'), ctrl).is_err());
        assert_eq!(
            platform.register_hot_key(Key::Char('w'), ctrl),
            Ok(HotKeyHandle(1))
        );
    }

    #[test]
    fn test_clipboard_round_trips_through_platform() {
        let platform = RecordingPlatform::new(Rect::new(0, 0, 800, 600));

        assert!(platform.set_clipboard(ClipboardId::Clipboard, b"hello"));

        assert_eq!(
            platform.clipboard(ClipboardId::Clipboard),
            Some(b"hello".to_vec())
        );
        assert_eq!(platform.clipboard(ClipboardId::Selection), None);
    }
}
