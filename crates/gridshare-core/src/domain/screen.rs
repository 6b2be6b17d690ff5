//! A single cell of the screen grid.
//!
//! A [`Screen`] with an empty name is a *null* screen: an unoccupied cell.
//! The grid always holds exactly `columns * rows` screens, occupied or not,
//! so a screen's identity is its position in the grid rather than anything
//! stored on the value itself.

use serde::{Deserialize, Serialize};

use super::geometry::CornerSet;
use crate::input::Modifier;

/// Per-screen modifier remapping: pressing `from` on the server produces
/// `map(from)` on this screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModifierMap([Modifier; 6]);

impl Default for ModifierMap {
    fn default() -> Self {
        ModifierMap(Modifier::ALL)
    }
}

impl ModifierMap {
    fn slot(modifier: Modifier) -> usize {
        match modifier {
            Modifier::Shift => 0,
            Modifier::Control => 1,
            Modifier::Alt => 2,
            Modifier::AltGr => 3,
            Modifier::Meta => 4,
            Modifier::Super => 5,
        }
    }

    /// Returns the modifier `from` is remapped to.
    pub fn map(&self, from: Modifier) -> Modifier {
        self.0[Self::slot(from)]
    }

    /// Remaps `from` to `to`.
    pub fn set(&mut self, from: Modifier, to: Modifier) {
        self.0[Self::slot(from)] = to;
    }

    /// Iterates the `(from, to)` pairs that differ from the identity mapping.
    pub fn remapped(&self) -> impl Iterator<Item = (Modifier, Modifier)> + '_ {
        Modifier::ALL
            .into_iter()
            .map(|from| (from, self.map(from)))
            .filter(|(from, to)| from != to)
    }
}

/// Boolean per-machine workarounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScreenFixes {
    /// Caps Lock sends only a press on toggle on, only a release on toggle off.
    pub half_duplex_caps_lock: bool,
    pub half_duplex_num_lock: bool,
    pub half_duplex_scroll_lock: bool,
    /// The X server's XTest extension ignores Xinerama screen offsets.
    pub xtest_is_xinerama_unaware: bool,
    /// Keep keyboard focus on the client window while the cursor is away.
    pub preserve_focus: bool,
}

/// One cell of the screen grid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Screen {
    /// Machine name used for adjacency lookup and the network handshake.
    /// Empty for an unoccupied cell.
    pub name: String,
    /// Alternative names this machine may announce itself under, in the
    /// order they were added and without duplicates.
    pub aliases: Vec<String>,
    /// `true` for the machine whose keyboard and mouse are shared.
    pub is_server: bool,
    pub fixes: ScreenFixes,
    pub modifier_map: ModifierMap,
    /// Switch corners enabled on this screen in addition to the global ones.
    pub switch_corners: CornerSet,
    pub switch_corner_size: u32,
}

impl Screen {
    /// Creates an occupied screen with default fix-ups.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Creates an unoccupied cell.
    pub fn null() -> Self {
        Self::default()
    }

    /// Returns `true` if this cell is unoccupied.
    pub fn is_null(&self) -> bool {
        self.name.is_empty()
    }

    /// Returns `true` if `name` is this screen's name or one of its aliases.
    pub fn answers_to(&self, name: &str) -> bool {
        !self.is_null() && (self.name == name || self.aliases.iter().any(|a| a == name))
    }

    /// Adds an alias; returns `false` if it was already present or equals the
    /// screen's own name.
    pub fn add_alias(&mut self, alias: impl Into<String>) -> bool {
        let alias = alias.into();
        if alias.is_empty() || alias == self.name || self.aliases.contains(&alias) {
            return false;
        }
        self.aliases.push(alias);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_screen_is_null() {
        let screen = Screen::null();
        assert!(screen.is_null());
        assert!(!screen.answers_to(""));
    }

    #[test]
    fn test_answers_to_name_and_aliases() {
        // Arrange
        let mut screen = Screen::new("laptop");
        screen.add_alias("laptop.local");

        // Act / Assert
        assert!(screen.answers_to("laptop"));
        assert!(screen.answers_to("laptop.local"));
        assert!(!screen.answers_to("desktop"));
    }

    #[test]
    fn test_add_alias_rejects_duplicates_and_own_name() {
        let mut screen = Screen::new("laptop");
        assert!(screen.add_alias("lt"));
        assert!(!screen.add_alias("lt"));
        assert!(!screen.add_alias("laptop"));
        assert_eq!(screen.aliases, vec!["lt".to_string()]);
    }

    #[test]
    fn test_modifier_map_defaults_to_identity() {
        let map = ModifierMap::default();
        assert_eq!(map.remapped().count(), 0);
        assert_eq!(map.map(Modifier::Super), Modifier::Super);
    }

    #[test]
    fn test_modifier_map_reports_only_remapped_pairs() {
        let mut map = ModifierMap::default();
        map.set(Modifier::Control, Modifier::Super);

        let pairs: Vec<_> = map.remapped().collect();

        assert_eq!(pairs, vec![(Modifier::Control, Modifier::Super)]);
    }
}
