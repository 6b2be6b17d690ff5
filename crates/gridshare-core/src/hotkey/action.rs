//! Actions a hotkey can trigger, and their canonical text form.
//!
//! ```text
//! [;]type(args)
//!
//! keystroke(Control+a,*)             synthetic key on every screen
//! ;keyUp(Shift+F3,laptop:desk)       on release, only on two screens
//! switchToScreen(laptop)
//! switchInDirection(left)
//! lockCursorToScreen(toggle)
//! restartServer(restart)
//! mousebutton(2,*)
//! ```
//!
//! A leading `;` marks an action that fires when the hotkey is released
//! rather than when it is pressed.  Only input actions carry a screen scope,
//! so every [`Action`] writes out to text that parses back to itself.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::domain::geometry::Direction;
use crate::input::{KeyCombo, MouseButton};

/// How `lockCursorToScreen` changes the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Toggle,
    On,
    Off,
}

impl LockMode {
    pub fn name(self) -> &'static str {
        match self {
            LockMode::Toggle => "toggle",
            LockMode::On => "on",
            LockMode::Off => "off",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "toggle" => Some(LockMode::Toggle),
            "on" => Some(LockMode::On),
            "off" => Some(LockMode::Off),
            _ => None,
        }
    }

    /// The lock value after applying this mode to `locked`.
    pub fn apply(self, locked: bool) -> bool {
        match self {
            LockMode::Toggle => !locked,
            LockMode::On => true,
            LockMode::Off => false,
        }
    }
}

/// The effect of an [`Action`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionKind {
    KeyDown(KeyCombo),
    KeyUp(KeyCombo),
    /// Key press immediately followed by its release.
    Keystroke(KeyCombo),
    SwitchToScreen(String),
    SwitchInDirection(Direction),
    LockCursorToScreen(LockMode),
    RestartAllConnections,
    MouseDown(MouseButton),
    MouseUp(MouseButton),
    /// Button press immediately followed by its release.
    MouseButton(MouseButton),
}

impl ActionKind {
    /// Type name in action text.
    pub fn type_name(&self) -> &'static str {
        match self {
            ActionKind::KeyDown(_) => "keyDown",
            ActionKind::KeyUp(_) => "keyUp",
            ActionKind::Keystroke(_) => "keystroke",
            ActionKind::SwitchToScreen(_) => "switchToScreen",
            ActionKind::SwitchInDirection(_) => "switchInDirection",
            ActionKind::LockCursorToScreen(_) => "lockCursorToScreen",
            ActionKind::RestartAllConnections => "restartServer",
            ActionKind::MouseDown(_) => "mouseDown",
            ActionKind::MouseUp(_) => "mouseUp",
            ActionKind::MouseButton(_) => "mousebutton",
        }
    }

    /// Returns `true` for actions that synthesise input and so carry a
    /// screen scope.
    pub fn is_input(&self) -> bool {
        match self {
            ActionKind::KeyDown(_)
            | ActionKind::KeyUp(_)
            | ActionKind::Keystroke(_)
            | ActionKind::MouseDown(_)
            | ActionKind::MouseUp(_)
            | ActionKind::MouseButton(_) => true,
            ActionKind::SwitchToScreen(_)
            | ActionKind::SwitchInDirection(_)
            | ActionKind::LockCursorToScreen(_)
            | ActionKind::RestartAllConnections => false,
        }
    }
}

/// One synthesizable effect bound to a hotkey.
///
/// Fields are read through accessors: a screen scope can only be attached
/// to an input action.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Action {
    kind: ActionKind,
    /// Screens an input action is delivered to; empty means all screens.
    screens: Vec<String>,
    /// Fire on the hotkey's release instead of its press.
    active_on_release: bool,
}

impl Action {
    /// An action on all screens that fires on press.
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            screens: Vec::new(),
            active_on_release: false,
        }
    }

    /// Restricts an input action to the named screens.  Non-input actions
    /// keep an empty scope.
    pub fn on_screens<I, S>(mut self, screens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.kind.is_input() {
            self.screens = screens.into_iter().map(Into::into).collect();
        }
        self
    }

    /// Makes the action fire on release.
    pub fn on_release(mut self) -> Self {
        self.active_on_release = true;
        self
    }

    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    /// Screens the action is limited to; empty means all screens.
    pub fn screens(&self) -> &[String] {
        &self.screens
    }

    pub fn active_on_release(&self) -> bool {
        self.active_on_release
    }

    /// Returns `true` if this action applies to the screen called `name`.
    pub fn targets(&self, name: &str) -> bool {
        self.screens.is_empty() || self.screens.iter().any(|s| s == name)
    }

    fn write_scope(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.screens.is_empty() {
            f.write_str(",*")
        } else {
            write!(f, ",{}", self.screens.join(":"))
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.active_on_release {
            f.write_str(";")?;
        }
        write!(f, "{}(", self.kind.type_name())?;
        match &self.kind {
            ActionKind::KeyDown(combo)
            | ActionKind::KeyUp(combo)
            | ActionKind::Keystroke(combo) => {
                write!(f, "{combo}")?;
                self.write_scope(f)?;
            }
            ActionKind::MouseDown(button)
            | ActionKind::MouseUp(button)
            | ActionKind::MouseButton(button) => {
                write!(f, "{button}")?;
                self.write_scope(f)?;
            }
            ActionKind::SwitchToScreen(name) => f.write_str(name)?,
            ActionKind::SwitchInDirection(direction) => f.write_str(direction.name())?,
            ActionKind::LockCursorToScreen(mode) => f.write_str(mode.name())?,
            ActionKind::RestartAllConnections => f.write_str("restart")?,
        }
        f.write_str(")")
    }
}

/// Errors produced when parsing action text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionParseError {
    #[error("expected type(args), got {0:?}")]
    Malformed(String),

    #[error("unknown action type {0:?}")]
    UnknownType(String),

    #[error("invalid key sequence {0:?}")]
    InvalidKeySequence(String),

    #[error("invalid mouse button {0:?}")]
    InvalidMouseButton(String),

    #[error("invalid direction {0:?}")]
    InvalidDirection(String),

    #[error("invalid lock mode {0:?}")]
    InvalidLockMode(String),

    #[error("{0} requires an argument")]
    MissingArgument(&'static str),
}

/// Splits `seq,scope` into the sequence text and the screen list.
fn split_scope(args: &str) -> (&str, Vec<String>) {
    match args.split_once(',') {
        None => (args, Vec::new()),
        Some((seq, scope)) => {
            let scope = scope.trim();
            let screens = if scope == "*" || scope.is_empty() {
                Vec::new()
            } else {
                scope.split(':').map(|s| s.trim().to_string()).collect()
            };
            (seq, screens)
        }
    }
}

impl FromStr for Action {
    type Err = ActionParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        let (active_on_release, body) = match text.strip_prefix(';') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, text),
        };
        let (type_name, args) = body
            .strip_suffix(')')
            .and_then(|b| b.split_once('('))
            .ok_or_else(|| ActionParseError::Malformed(text.to_string()))?;
        let type_name = type_name.trim();
        let args = args.trim();

        let key = |args: &str| {
            KeyCombo::parse(args)
                .ok_or_else(|| ActionParseError::InvalidKeySequence(args.to_string()))
        };
        let button = |args: &str| {
            MouseButton::parse(args)
                .ok_or_else(|| ActionParseError::InvalidMouseButton(args.to_string()))
        };

        let mut screens = Vec::new();
        let kind = match type_name {
            "keyDown" | "keyUp" | "keystroke" => {
                let (combo, scope) = split_scope(args);
                let combo = key(combo.trim())?;
                screens = scope;
                match type_name {
                    "keyDown" => ActionKind::KeyDown(combo),
                    "keyUp" => ActionKind::KeyUp(combo),
                    _ => ActionKind::Keystroke(combo),
                }
            }
            "mouseDown" | "mouseUp" | "mousebutton" => {
                let (b, scope) = split_scope(args);
                let b = button(b.trim())?;
                screens = scope;
                match type_name {
                    "mouseDown" => ActionKind::MouseDown(b),
                    "mouseUp" => ActionKind::MouseUp(b),
                    _ => ActionKind::MouseButton(b),
                }
            }
            "switchToScreen" => {
                if args.is_empty() {
                    return Err(ActionParseError::MissingArgument("switchToScreen"));
                }
                ActionKind::SwitchToScreen(args.to_string())
            }
            "switchInDirection" => ActionKind::SwitchInDirection(
                Direction::from_name(args)
                    .ok_or_else(|| ActionParseError::InvalidDirection(args.to_string()))?,
            ),
            "lockCursorToScreen" => ActionKind::LockCursorToScreen(
                LockMode::from_name(args)
                    .ok_or_else(|| ActionParseError::InvalidLockMode(args.to_string()))?,
            ),
            "restartServer" => ActionKind::RestartAllConnections,
            other => return Err(ActionParseError::UnknownType(other.to_string())),
        };

        Ok(Action {
            kind,
            screens,
            active_on_release,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Key, Modifier, ModifierMask, NamedKey};
    use proptest::prelude::*;

    fn ctrl(key: Key) -> KeyCombo {
        KeyCombo::new(key, ModifierMask::NONE.with(Modifier::Control))
    }

    fn button(number: u8) -> MouseButton {
        MouseButton::new(number).unwrap()
    }

    // ── Text form ─────────────────────────────────────────────────────────────

    #[test]
    fn test_key_action_without_scope_writes_star() {
        let action = Action::new(ActionKind::Keystroke(ctrl(Key::Named(NamedKey::Left))));
        assert_eq!(action.to_string(), "keystroke(Control+Left,*)");
    }

    #[test]
    fn test_scoped_release_action_text() {
        let action = Action::new(ActionKind::KeyDown(ctrl(Key::Char('x'))))
            .on_screens(["a", "b"])
            .on_release();
        assert_eq!(action.to_string(), ";keyDown(Control+x,a:b)");
    }

    #[test]
    fn test_fixed_argument_texts() {
        assert_eq!(
            Action::new(ActionKind::SwitchInDirection(Direction::Left)).to_string(),
            "switchInDirection(left)"
        );
        assert_eq!(
            Action::new(ActionKind::LockCursorToScreen(LockMode::Off)).to_string(),
            "lockCursorToScreen(off)"
        );
        assert_eq!(
            Action::new(ActionKind::RestartAllConnections).to_string(),
            "restartServer(restart)"
        );
        assert_eq!(
            Action::new(ActionKind::MouseButton(button(2))).to_string(),
            "mousebutton(2,*)"
        );
    }

    #[test]
    fn test_digit_key_stays_a_key() {
        // Arrange
        let two = KeyCombo::new(Key::Char('2'), ModifierMask::NONE);
        let action = Action::new(ActionKind::KeyDown(two));

        // Act
        let parsed: Action = action.to_string().parse().unwrap();

        // Assert
        assert_eq!(parsed.kind(), &ActionKind::KeyDown(two));
    }

    #[test]
    fn test_scope_is_not_attached_to_switch_actions() {
        // Arrange / Act
        let action =
            Action::new(ActionKind::SwitchToScreen("laptop".into())).on_screens(["desk"]);

        // Assert
        assert!(action.screens().is_empty());
        assert_eq!(action.to_string(), "switchToScreen(laptop)");
        assert_eq!(action.to_string().parse::<Action>(), Ok(action));
    }

    // ── Parsing ───────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_without_scope_means_all_screens() {
        let action: Action = "keystroke(Shift+b)".parse().unwrap();
        assert!(action.screens().is_empty());
        assert!(action.targets("anything"));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "teleport(home)".parse::<Action>(),
            Err(ActionParseError::UnknownType("teleport".into()))
        );
        assert_eq!(
            "switchInDirection(sideways)".parse::<Action>(),
            Err(ActionParseError::InvalidDirection("sideways".into()))
        );
        assert_eq!(
            "lockCursorToScreen(maybe)".parse::<Action>(),
            Err(ActionParseError::InvalidLockMode("maybe".into()))
        );
        assert!(matches!(
            "keystroke".parse::<Action>(),
            Err(ActionParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_mouse_buttons_outside_one_to_five_are_rejected() {
        for text in ["mousebutton(0,*)", "mouseDown(6)", "mouseUp(9,*)"] {
            assert!(
                matches!(text.parse::<Action>(), Err(ActionParseError::InvalidMouseButton(_))),
                "{text}"
            );
        }
    }

    #[test]
    fn test_lock_toggle_twice_is_identity() {
        for start in [false, true] {
            let once = LockMode::Toggle.apply(start);
            assert_eq!(LockMode::Toggle.apply(once), start);
        }
    }

    // ── Round trip ────────────────────────────────────────────────────────────

    fn key_strategy() -> impl Strategy<Value = Key> {
        prop_oneof![
            prop::sample::select(vec![
                'a', 'z', 'A', 'F', '0', '2', '9', ' ', '+', ',', ':', ';', '=', '(', ')', '*', '#',
                '-', '.', '/', 'é',
            ])
            .prop_map(Key::Char),
            (1u8..=35).prop_map(Key::Function),
            prop::sample::select(NamedKey::ALL.to_vec()).prop_map(Key::Named),
        ]
    }

    fn combo_strategy() -> impl Strategy<Value = KeyCombo> {
        (key_strategy(), 0u8..64).prop_map(|(key, bits)| KeyCombo::new(key, ModifierMask(bits)))
    }

    fn button_strategy() -> impl Strategy<Value = MouseButton> {
        (MouseButton::MIN..=MouseButton::MAX).prop_map(button)
    }

    fn kind_strategy() -> impl Strategy<Value = ActionKind> {
        prop_oneof![
            combo_strategy().prop_map(ActionKind::KeyDown),
            combo_strategy().prop_map(ActionKind::KeyUp),
            combo_strategy().prop_map(ActionKind::Keystroke),
            "[a-z][a-z0-9.-]{0,8}".prop_map(ActionKind::SwitchToScreen),
            prop::sample::select(vec![
                Direction::Left,
                Direction::Right,
                Direction::Up,
                Direction::Down,
            ])
            .prop_map(ActionKind::SwitchInDirection),
            prop::sample::select(vec![LockMode::Toggle, LockMode::On, LockMode::Off])
                .prop_map(ActionKind::LockCursorToScreen),
            Just(ActionKind::RestartAllConnections),
            button_strategy().prop_map(ActionKind::MouseDown),
            button_strategy().prop_map(ActionKind::MouseUp),
            button_strategy().prop_map(ActionKind::MouseButton),
        ]
    }

    proptest! {
        #[test]
        fn prop_every_action_survives_text_round_trip(
            kind in kind_strategy(),
            screens in prop::collection::vec("[a-z][a-z0-9.-]{0,8}", 0..3),
            on_release in any::<bool>(),
        ) {
            let mut action = Action::new(kind).on_screens(screens);
            if on_release {
                action = action.on_release();
            }

            let text = action.to_string();
            let parsed: Action = text.parse().unwrap();

            prop_assert_eq!(parsed, action, "round trip of {}", text);
        }
    }
}
