//! Hotkey bindings and press/release matching.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use super::action::{Action, ActionParseError};
use crate::input::{Key, KeySequence, MouseButton};

/// A trigger bound to an ordered list of actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hotkey {
    pub trigger: KeySequence,
    pub actions: Vec<Action>,
}

impl Hotkey {
    pub fn new(trigger: KeySequence, actions: Vec<Action>) -> Self {
        Self { trigger, actions }
    }

    /// Trigger text as written on the left of a hotkey line:
    /// `keystroke(<seq>)` or `mousebutton(<n>)`.
    pub fn trigger_text(&self) -> String {
        match self.trigger {
            KeySequence::Mouse(button) => format!("mousebutton({button})"),
            seq => format!("keystroke({seq})"),
        }
    }
}

/// `keystroke(Control+F1) = switchToScreen(laptop), ;lockCursorToScreen(off)`
impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = ", self.trigger_text())?;
        for (i, action) in self.actions.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{action}")?;
        }
        Ok(())
    }
}

/// Splits on commas that are not inside parentheses.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

impl FromStr for Hotkey {
    type Err = ActionParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let (trigger, actions) = text
            .split_once('=')
            .ok_or_else(|| ActionParseError::Malformed(text.to_string()))?;
        let trigger = trigger.trim();
        let args = trigger
            .strip_suffix(')')
            .and_then(|t| t.split_once('('))
            .ok_or_else(|| ActionParseError::Malformed(trigger.to_string()))?;
        let trigger = match args {
            ("keystroke", seq) => KeySequence::parse_key(seq)
                .ok_or_else(|| ActionParseError::InvalidKeySequence(seq.to_string()))?,
            ("mousebutton", button) => KeySequence::parse_mouse(button)
                .ok_or_else(|| ActionParseError::InvalidMouseButton(button.to_string()))?,
            (other, _) => return Err(ActionParseError::UnknownType(other.to_string())),
        };
        let actions = split_top_level(actions)
            .into_iter()
            .filter(|a| !a.trim().is_empty())
            .map(str::parse)
            .collect::<Result<Vec<Action>, _>>()?;
        Ok(Hotkey { trigger, actions })
    }
}

/// What a press or release matched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HotkeyMatch {
    /// `true` if the event belongs to a bound trigger and should be consumed
    /// rather than forwarded.
    pub bound: bool,
    /// Actions to run now, in binding order.
    pub actions: Vec<Action>,
}

/// Identity used to pair a release with its press.  Modifiers are left out:
/// releasing the modifiers before the key still ends the same press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PressId {
    Key(Key),
    Mouse(MouseButton),
}

impl From<KeySequence> for PressId {
    fn from(seq: KeySequence) -> Self {
        match seq {
            KeySequence::Key { key, .. } => PressId::Key(key),
            KeySequence::Mouse(button) => PressId::Mouse(button),
        }
    }
}

/// Bindings of triggers to actions, with press→release correlation.
///
/// Matching is exact on `(key, modifier mask)` or on the mouse button.
/// Binding the same trigger twice replaces the first binding; keeping
/// triggers unique is the caller's job.
#[derive(Debug, Default)]
pub struct HotkeyEngine {
    bindings: HashMap<KeySequence, Vec<Action>>,
    pressed: HashMap<PressId, KeySequence>,
}

impl HotkeyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an engine from a list of hotkeys; later duplicates win.
    pub fn from_hotkeys<'a>(hotkeys: impl IntoIterator<Item = &'a Hotkey>) -> Self {
        let mut engine = Self::new();
        for hotkey in hotkeys {
            engine.bind(hotkey.clone());
        }
        engine
    }

    /// Inserts or replaces the binding for `hotkey.trigger`.  Returns the
    /// replaced action list.
    pub fn bind(&mut self, hotkey: Hotkey) -> Option<Vec<Action>> {
        self.bindings.insert(hotkey.trigger, hotkey.actions)
    }

    /// Removes the binding for `trigger`.
    pub fn unbind(&mut self, trigger: &KeySequence) -> Option<Vec<Action>> {
        self.bindings.remove(trigger)
    }

    /// Returns `true` if `trigger` has a binding.
    pub fn is_bound(&self, trigger: &KeySequence) -> bool {
        self.bindings.contains_key(trigger)
    }

    /// All bound triggers, in no particular order.
    pub fn triggers(&self) -> impl Iterator<Item = &KeySequence> {
        self.bindings.keys()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Handles a press of `seq`.  Returns the bound press actions.
    pub fn press(&mut self, seq: KeySequence) -> HotkeyMatch {
        let Some(actions) = self.bindings.get(&seq) else {
            return HotkeyMatch::default();
        };
        self.pressed.insert(PressId::from(seq), seq);
        debug!(trigger = %seq, "hotkey pressed");
        HotkeyMatch {
            bound: true,
            actions: actions
                .iter()
                .filter(|a| !a.active_on_release())
                .cloned()
                .collect(),
        }
    }

    /// Handles a release of `seq`.
    ///
    /// Release actions fire only if this release ends a press this engine
    /// matched; a release with no prior press emits nothing.
    pub fn release(&mut self, seq: KeySequence) -> HotkeyMatch {
        let Some(trigger) = self.pressed.remove(&PressId::from(seq)) else {
            return HotkeyMatch::default();
        };
        debug!(trigger = %trigger, "hotkey released");
        let actions = self
            .bindings
            .get(&trigger)
            .map(|actions| {
                actions
                    .iter()
                    .filter(|a| a.active_on_release())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        HotkeyMatch {
            bound: true,
            actions,
        }
    }

    /// Matches one physical event and returns the actions to run.
    pub fn match_event(&mut self, seq: KeySequence, pressed: bool) -> Vec<Action> {
        if pressed {
            self.press(seq).actions
        } else {
            self.release(seq).actions
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geometry::Direction;
    use crate::hotkey::action::{ActionKind, LockMode};
    use crate::input::{KeyCombo, Modifier, ModifierMask, NamedKey};

    fn ctrl_alt_mask() -> ModifierMask {
        ModifierMask::NONE.with(Modifier::Control).with(Modifier::Alt)
    }

    fn ctrl_alt(key: Key) -> KeySequence {
        KeySequence::key(key, ctrl_alt_mask())
    }

    fn mouse(number: u8) -> KeySequence {
        KeySequence::Mouse(MouseButton::new(number).unwrap())
    }

    fn switch_left() -> Action {
        Action::new(ActionKind::SwitchInDirection(Direction::Left))
    }

    fn unlock_on_release() -> Action {
        Action::new(ActionKind::LockCursorToScreen(LockMode::Off)).on_release()
    }

    #[test]
    fn test_unbound_press_is_not_consumed() {
        let mut engine = HotkeyEngine::new();
        let result = engine.press(ctrl_alt(Key::Char('q')));
        assert_eq!(result, HotkeyMatch::default());
    }

    #[test]
    fn test_match_is_exact_on_modifiers() {
        // Arrange
        let mut engine = HotkeyEngine::new();
        engine.bind(Hotkey::new(ctrl_alt(Key::Named(NamedKey::Left)), vec![switch_left()]));

        // Act: same key, only Control held
        let partial = engine.press(KeySequence::key(
            Key::Named(NamedKey::Left),
            ModifierMask::NONE.with(Modifier::Control),
        ));

        // Assert
        assert!(!partial.bound);
        assert!(partial.actions.is_empty());
    }

    #[test]
    fn test_press_and_release_split_actions() {
        let mut engine = HotkeyEngine::new();
        let trigger = ctrl_alt(Key::Char('l'));
        engine.bind(Hotkey::new(trigger, vec![switch_left(), unlock_on_release()]));

        let pressed = engine.press(trigger);
        let released = engine.release(trigger);

        assert_eq!(pressed.actions, vec![switch_left()]);
        assert_eq!(released.actions, vec![unlock_on_release()]);
        assert!(released.bound);
    }

    #[test]
    fn test_release_without_press_emits_nothing() {
        let mut engine = HotkeyEngine::new();
        let trigger = ctrl_alt(Key::Char('l'));
        engine.bind(Hotkey::new(trigger, vec![unlock_on_release()]));

        let released = engine.release(trigger);

        assert_eq!(released, HotkeyMatch::default());
    }

    #[test]
    fn test_release_correlates_when_modifiers_released_first() {
        let mut engine = HotkeyEngine::new();
        let trigger = ctrl_alt(Key::Char('l'));
        engine.bind(Hotkey::new(trigger, vec![unlock_on_release()]));
        engine.press(trigger);

        let released = engine.release(KeySequence::key(Key::Char('l'), ModifierMask::NONE));

        assert_eq!(released.actions, vec![unlock_on_release()]);
    }

    #[test]
    fn test_release_fires_once_per_press() {
        let mut engine = HotkeyEngine::new();
        let trigger = mouse(4);
        engine.bind(Hotkey::new(trigger, vec![unlock_on_release()]));
        engine.press(trigger);

        assert_eq!(engine.release(trigger).actions.len(), 1);
        assert!(engine.release(trigger).actions.is_empty());
    }

    #[test]
    fn test_bind_same_trigger_is_last_write_wins() {
        let mut engine = HotkeyEngine::new();
        let trigger = ctrl_alt(Key::Function(1));
        engine.bind(Hotkey::new(trigger, vec![switch_left()]));

        let replaced = engine.bind(Hotkey::new(trigger, vec![unlock_on_release()]));

        assert_eq!(replaced, Some(vec![switch_left()]));
        assert_eq!(engine.len(), 1);
        assert!(engine.press(trigger).actions.is_empty());
    }

    #[test]
    fn test_unbind_removes_binding() {
        let mut engine = HotkeyEngine::new();
        let trigger = ctrl_alt(Key::Function(1));
        engine.bind(Hotkey::new(trigger, vec![switch_left()]));

        engine.unbind(&trigger);

        assert!(!engine.is_bound(&trigger));
        assert!(engine.match_event(trigger, true).is_empty());
    }

    #[test]
    fn test_hotkey_line_round_trip() {
        // Arrange
        let hotkey = Hotkey::new(
            ctrl_alt(Key::Char('l')),
            vec![
                Action::new(ActionKind::Keystroke(KeyCombo::new(
                    Key::Char(','),
                    ctrl_alt_mask(),
                )))
                .on_screens(["a"]),
                unlock_on_release(),
            ],
        );

        // Act
        let text = hotkey.to_string();
        let parsed: Hotkey = text.parse().unwrap();

        // Assert
        assert_eq!(
            text,
            "keystroke(Control+Alt+l) = keystroke(Control+Alt+comma,a), ;lockCursorToScreen(off)"
        );
        assert_eq!(parsed, hotkey);
    }

    #[test]
    fn test_mouse_trigger_text() {
        let hotkey = Hotkey::new(mouse(5), vec![switch_left()]);
        assert_eq!(hotkey.to_string(), "mousebutton(5) = switchInDirection(left)");
        assert_eq!(hotkey.to_string().parse::<Hotkey>().unwrap(), hotkey);
    }
}
