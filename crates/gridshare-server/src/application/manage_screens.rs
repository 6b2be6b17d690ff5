//! ScreenRegistry: which client screens are connected right now.
//!
//! The topology says where screens *could* be; the registry says which of
//! them currently have a live connection and what their geometry is.  A
//! switch is only ever committed to the server screen or to a connected
//! client.
//!
//! # Auto-add (for beginners)
//!
//! A client may connect under a name the configuration does not know.  By
//! default such a client is refused.  With auto-add enabled the registry asks
//! the topology to place it next to the server, walking outward in the
//! configured direction, and admits it at the chosen cell:
//!
//! ```text
//!  before:  .  .  .  .  .        after auto_add(Right):  .  .  .  .  .
//!           .  .  S  .  .                                .  .  S  N  .
//!           .  .  .  .  .                                .  .  .  .  .
//! ```

use std::collections::BTreeMap;

use gridshare_core::{AutoPlacement, Direction, PlacementError, Rect, Topology};
use thiserror::Error;
use tracing::info;

/// Error type for admitting a client screen.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdmitError {
    #[error("screen {0:?} is not in the layout")]
    Unknown(String),

    #[error("screen {0:?} is already connected")]
    AlreadyConnected(String),

    #[error("screen {0:?} is the server's own name")]
    ServerName(String),

    #[error("could not place screen {name:?}: {source}")]
    Placement {
        name: String,
        #[source]
        source: PlacementError,
    },
}

/// A client screen with a live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedScreen {
    /// Canonical name from the topology (aliases are resolved).
    pub name: String,
    pub index: usize,
    pub shape: Rect,
}

/// In-memory registry of connected client screens, keyed by grid index.
///
/// A `BTreeMap` keeps iteration in grid order, so peer lists handed to the
/// routing layer are deterministic.
#[derive(Debug, Default)]
pub struct ScreenRegistry {
    connected: BTreeMap<usize, ConnectedScreen>,
    auto_add: Option<Direction>,
}

impl ScreenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that places unknown screens next to the server, walking
    /// outward in `direction`.
    pub fn with_auto_add(direction: Direction) -> Self {
        Self {
            auto_add: Some(direction),
            ..Self::default()
        }
    }

    pub fn auto_add(&self) -> Option<Direction> {
        self.auto_add
    }

    pub fn set_auto_add(&mut self, direction: Option<Direction>) {
        self.auto_add = direction;
    }

    /// Admits a connecting client and returns its grid index.
    ///
    /// # Errors
    ///
    /// See [`AdmitError`].  The registry is unchanged on error; the topology
    /// is only changed by a successful auto-add.
    pub fn admit(
        &mut self,
        topology: &mut Topology,
        server_name: &str,
        name: &str,
        shape: Rect,
    ) -> Result<usize, AdmitError> {
        let index = match topology.find_by_name(name) {
            Some(index) => index,
            None => {
                let direction = self
                    .auto_add
                    .ok_or_else(|| AdmitError::Unknown(name.to_string()))?;
                let placement = topology
                    .auto_place(name, direction, server_name)
                    .map_err(|source| AdmitError::Placement {
                        name: name.to_string(),
                        source,
                    })?;
                if !matches!(placement, AutoPlacement::AlreadyPresent(_)) {
                    info!(name, index = placement.index(), "auto-added screen");
                }
                placement.index()
            }
        };

        let Some(screen) = topology.screen_at(index) else {
            return Err(AdmitError::Unknown(name.to_string()));
        };
        if screen.is_server {
            return Err(AdmitError::ServerName(name.to_string()));
        }
        if self.connected.contains_key(&index) {
            return Err(AdmitError::AlreadyConnected(screen.name.clone()));
        }

        info!(name = %screen.name, index, width = shape.width, height = shape.height, "screen connected");
        self.connected.insert(
            index,
            ConnectedScreen {
                name: screen.name.clone(),
                index,
                shape,
            },
        );
        Ok(index)
    }

    /// Removes the screen at `index`.
    pub fn remove(&mut self, index: usize) -> Option<ConnectedScreen> {
        let removed = self.connected.remove(&index);
        if let Some(screen) = &removed {
            info!(name = %screen.name, index, "screen disconnected");
        }
        removed
    }

    pub fn get(&self, index: usize) -> Option<&ConnectedScreen> {
        self.connected.get(&index)
    }

    pub fn is_connected(&self, index: usize) -> bool {
        self.connected.contains_key(&index)
    }

    /// Updates the geometry of a connected screen.
    pub fn set_shape(&mut self, index: usize, shape: Rect) -> bool {
        match self.connected.get_mut(&index) {
            Some(screen) => {
                screen.shape = shape;
                true
            }
            None => false,
        }
    }

    /// Connected screens in grid order.
    pub fn iter(&self) -> impl Iterator<Item = &ConnectedScreen> {
        self.connected.values()
    }

    pub fn len(&self) -> usize {
        self.connected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connected.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridshare_core::Screen;

    const SHAPE: Rect = Rect::new(0, 0, 1280, 800);

    fn layout() -> Topology {
        let mut topology = Topology::default();
        topology
            .set_screen(7, Screen { is_server: true, ..Screen::new("server") })
            .unwrap();
        let mut laptop = Screen::new("laptop");
        laptop.add_alias("laptop.lan");
        topology.set_screen(8, laptop).unwrap();
        topology
    }

    #[test]
    fn test_admit_known_screen_by_alias_uses_canonical_name() {
        // Arrange
        let mut topology = layout();
        let mut registry = ScreenRegistry::new();

        // Act
        let index = registry
            .admit(&mut topology, "server", "laptop.lan", SHAPE)
            .unwrap();

        // Assert
        assert_eq!(index, 8);
        assert_eq!(registry.get(8).map(|s| s.name.as_str()), Some("laptop"));
    }

    #[test]
    fn test_unknown_screen_is_refused_without_auto_add() {
        let mut topology = layout();
        let mut registry = ScreenRegistry::new();

        let result = registry.admit(&mut topology, "server", "stranger", SHAPE);

        assert_eq!(result, Err(AdmitError::Unknown("stranger".into())));
        assert_eq!(topology.num_screens(), 2);
    }

    #[test]
    fn test_unknown_screen_is_placed_with_auto_add() {
        // Arrange
        let mut topology = layout();
        let mut registry = ScreenRegistry::with_auto_add(Direction::Right);

        // Act
        let index = registry
            .admit(&mut topology, "server", "stranger", SHAPE)
            .unwrap();

        // Assert: 8 is taken, so the walk continues to 9
        assert_eq!(index, 9);
        assert_eq!(topology.find_by_name("stranger"), Some(9));
        assert!(registry.is_connected(9));
    }

    #[test]
    fn test_second_connection_under_same_name_is_refused() {
        let mut topology = layout();
        let mut registry = ScreenRegistry::new();
        registry.admit(&mut topology, "server", "laptop", SHAPE).unwrap();

        let result = registry.admit(&mut topology, "server", "laptop", SHAPE);

        assert_eq!(result, Err(AdmitError::AlreadyConnected("laptop".into())));
    }

    #[test]
    fn test_client_cannot_claim_server_name() {
        let mut topology = layout();
        let mut registry = ScreenRegistry::new();

        let result = registry.admit(&mut topology, "server", "server", SHAPE);

        assert_eq!(result, Err(AdmitError::ServerName("server".into())));
    }

    #[test]
    fn test_remove_and_iterate_in_grid_order() {
        let mut topology = layout();
        topology.set_screen(6, Screen::new("left")).unwrap();
        let mut registry = ScreenRegistry::new();
        registry.admit(&mut topology, "server", "laptop", SHAPE).unwrap();
        registry.admit(&mut topology, "server", "left", SHAPE).unwrap();

        let order: Vec<usize> = registry.iter().map(|s| s.index).collect();
        assert_eq!(order, vec![6, 8]);

        assert!(registry.remove(6).is_some());
        assert!(registry.remove(6).is_none());
        assert_eq!(registry.len(), 1);
    }
}
