//! The screen grid domain entity.
//!
//! A [`Topology`] is a fixed `columns × rows` grid of [`Screen`] cells stored
//! row-major: `screens[i]` is the cell at column `i % columns`, row
//! `i / columns`.  Adjacency between cells is always computed from the index,
//! never stored, so the grid cannot hold a stale or one-sided link.

use thiserror::Error;
use tracing::debug;

use super::geometry::Direction;
use super::screen::Screen;

/// Grid width used when nothing else is configured.
pub const DEFAULT_COLUMNS: usize = 5;
/// Grid height used when nothing else is configured.
pub const DEFAULT_ROWS: usize = 3;
/// Largest number of cells a grid may have.
pub const MAX_CELLS: usize = 4096;

/// Errors that can occur when editing the grid.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    /// A grid must have at least one cell.
    #[error("grid dimensions must be non-zero (got {columns}x{rows})")]
    EmptyGrid { columns: usize, rows: usize },

    /// The grid would have more than [`MAX_CELLS`] cells.
    #[error("grid of {columns}x{rows} exceeds {MAX_CELLS} cells")]
    TooLarge { columns: usize, rows: usize },

    /// Every cell is occupied.
    #[error("grid is full")]
    Full,

    /// The index does not address a cell of the grid.
    #[error("cell index {index} is outside the {len}-cell grid")]
    OutOfRange { index: usize, len: usize },

    /// The cell at this index is unoccupied.
    #[error("cell {0} is empty")]
    NullScreen(usize),

    /// Another screen already answers to this name.
    #[error("a screen named {0:?} already exists")]
    DuplicateName(String),
}

/// Reasons an automatic placement did not place the screen.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlacementError {
    /// No server cell exists and the default server cell is occupied.
    #[error("no server screen in the grid and the default server cell is occupied")]
    NoServer,

    /// Every cell is occupied; the grid was not changed.
    #[error("grid is full")]
    GridFull,
}

/// How [`Topology::auto_place`] settles the server cell.
enum ServerFix {
    None,
    Mark,
    Recover,
}

/// Where [`Topology::auto_place`] put a screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoPlacement {
    /// The name was already in the grid; nothing changed.
    AlreadyPresent(usize),
    /// Placed on the first free cell walking away from the server.
    Adjacent(usize),
    /// No cell in the requested direction was free; placed on the first free
    /// cell of the grid.
    FirstEmpty(usize),
}

impl AutoPlacement {
    /// Cell index the screen now occupies.
    pub fn index(self) -> usize {
        match self {
            AutoPlacement::AlreadyPresent(i)
            | AutoPlacement::Adjacent(i)
            | AutoPlacement::FirstEmpty(i) => i,
        }
    }
}

/// The rectangular grid of screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    columns: usize,
    rows: usize,
    screens: Vec<Screen>,
}

impl Default for Topology {
    fn default() -> Self {
        Self {
            columns: DEFAULT_COLUMNS,
            rows: DEFAULT_ROWS,
            screens: vec![Screen::null(); DEFAULT_COLUMNS * DEFAULT_ROWS],
        }
    }
}

impl Topology {
    /// Creates an empty grid.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::EmptyGrid`] if either dimension is zero and
    /// [`TopologyError::TooLarge`] if the grid would exceed [`MAX_CELLS`].
    pub fn new(columns: usize, rows: usize) -> Result<Self, TopologyError> {
        if columns == 0 || rows == 0 {
            return Err(TopologyError::EmptyGrid { columns, rows });
        }
        let cells = columns
            .checked_mul(rows)
            .filter(|&cells| cells <= MAX_CELLS)
            .ok_or(TopologyError::TooLarge { columns, rows })?;
        Ok(Self {
            columns,
            rows,
            screens: vec![Screen::null(); cells],
        })
    }

    /// Creates a grid from row-major cells.
    ///
    /// Cells past `columns * rows` are dropped and missing cells are filled
    /// with null screens.
    ///
    /// # Errors
    ///
    /// Fails like [`Topology::new`].
    pub fn from_cells(
        columns: usize,
        rows: usize,
        cells: impl IntoIterator<Item = Screen>,
    ) -> Result<Self, TopologyError> {
        let mut topology = Self::new(columns, rows)?;
        for (slot, screen) in topology.screens.iter_mut().zip(cells) {
            *slot = screen;
        }
        Ok(topology)
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Total number of cells, occupied or not.
    pub fn len(&self) -> usize {
        self.screens.len()
    }

    /// Always `false`: a grid has at least one cell.
    pub fn is_empty(&self) -> bool {
        self.screens.is_empty()
    }

    /// All cells in row-major order.
    pub fn screens(&self) -> &[Screen] {
        &self.screens
    }

    /// Returns the cell at `index`.
    pub fn screen_at(&self, index: usize) -> Option<&Screen> {
        self.screens.get(index)
    }

    /// Returns the cell at `index` for in-place edits of its fix-ups.
    pub fn screen_at_mut(&mut self, index: usize) -> Option<&mut Screen> {
        self.screens.get_mut(index)
    }

    /// Returns the `(column, row)` of `index`.
    pub fn cell_of(&self, index: usize) -> (usize, usize) {
        (index % self.columns, index / self.columns)
    }

    /// Returns the index of `(column, row)`, if inside the grid.
    pub fn index_of(&self, column: usize, row: usize) -> Option<usize> {
        (column < self.columns && row < self.rows).then(|| row * self.columns + column)
    }

    /// The cell the server is recovered into when no server exists.
    pub fn center_index(&self) -> usize {
        (self.rows / 2) * self.columns + self.columns / 2
    }

    /// Number of occupied cells.
    pub fn num_screens(&self) -> usize {
        self.screens.iter().filter(|s| !s.is_null()).count()
    }

    /// Returns `true` iff no cell is unoccupied.
    pub fn is_full(&self) -> bool {
        self.screens.iter().all(|s| !s.is_null())
    }

    /// Returns the index of the occupied screen answering to `name` (by name
    /// or alias).
    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        if name.is_empty() {
            return None;
        }
        self.screens.iter().position(|s| s.answers_to(name))
    }

    /// Index of the server screen, if one is marked.
    pub fn server_index(&self) -> Option<usize> {
        self.screens
            .iter()
            .position(|s| !s.is_null() && s.is_server)
    }

    /// Places `screen` in the first unoccupied cell and returns its index.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::Full`] if every cell is occupied, or
    /// [`TopologyError::DuplicateName`] if the name is already in use.
    pub fn add_screen(&mut self, screen: Screen) -> Result<usize, TopologyError> {
        if self.find_by_name(&screen.name).is_some() {
            return Err(TopologyError::DuplicateName(screen.name));
        }
        let index = self
            .screens
            .iter()
            .position(Screen::is_null)
            .ok_or(TopologyError::Full)?;
        self.screens[index] = screen;
        Ok(index)
    }

    /// Replaces the cell at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::OutOfRange`] for an index outside the grid.
    pub fn set_screen(&mut self, index: usize, screen: Screen) -> Result<(), TopologyError> {
        let len = self.screens.len();
        let slot = self
            .screens
            .get_mut(index)
            .ok_or(TopologyError::OutOfRange { index, len })?;
        *slot = screen;
        Ok(())
    }

    /// Empties the cell at `index` and returns what it held.
    pub fn remove_screen(&mut self, index: usize) -> Option<Screen> {
        let slot = self.screens.get_mut(index)?;
        if slot.is_null() {
            return None;
        }
        Some(std::mem::take(slot))
    }

    /// Marks the screen at `index` as the server, clearing any previous flag.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::OutOfRange`] or [`TopologyError::NullScreen`];
    /// the previous server keeps its flag in that case.
    pub fn mark_server(&mut self, index: usize) -> Result<(), TopologyError> {
        let len = self.screens.len();
        match self.screens.get(index) {
            None => return Err(TopologyError::OutOfRange { index, len }),
            Some(s) if s.is_null() => return Err(TopologyError::NullScreen(index)),
            Some(_) => {}
        }
        for (i, screen) in self.screens.iter_mut().enumerate() {
            screen.is_server = i == index;
        }
        Ok(())
    }

    /// Returns the index of the cell `(dx, dy)` steps from `index`.
    ///
    /// There is no wraparound: stepping right from the last column or left
    /// from the first column, or outside `[0, len)`, yields `None`.
    pub fn adjacent_index(&self, index: usize, dx: i32, dy: i32) -> Option<usize> {
        let column = index % self.columns;
        if dx > 0 && column == self.columns - 1 {
            return None;
        }
        if dx < 0 && column == 0 {
            return None;
        }
        let target = index as i64 + i64::from(dx) + i64::from(dy) * self.columns as i64;
        if target < 0 || target >= self.screens.len() as i64 {
            return None;
        }
        Some(target as usize)
    }

    /// Returns the occupied neighbour of `index` in `direction`.
    pub fn neighbor(&self, index: usize, direction: Direction) -> Option<usize> {
        let (dx, dy) = direction.delta();
        self.adjacent_index(index, dx, dy)
            .filter(|&i| !self.screens[i].is_null())
    }

    /// Puts the server named `name` into the centre cell if that cell is
    /// free.  Returns the index on success.
    pub fn fix_no_server(&mut self, name: &str) -> Option<usize> {
        let index = self.center_index();
        if !self.screens[index].is_null() {
            return None;
        }
        for screen in &mut self.screens {
            screen.is_server = false;
        }
        self.screens[index] = Screen {
            is_server: true,
            ..Screen::new(name)
        };
        Some(index)
    }

    /// Places a newly announced client.
    ///
    /// Walks outward from the server cell in `direction` and takes the first
    /// free cell, falling back to the first free cell anywhere.  When the
    /// grid has no server, the screen answering to `server_name` is marked as
    /// server, or the server is recovered into the centre cell.
    ///
    /// # Errors
    ///
    /// [`PlacementError::NoServer`] if the server cannot be recovered,
    /// [`PlacementError::GridFull`] if no cell is free.  The grid is not
    /// modified on error.
    pub fn auto_place(
        &mut self,
        name: &str,
        direction: Direction,
        server_name: &str,
    ) -> Result<AutoPlacement, PlacementError> {
        if let Some(index) = self.find_by_name(name) {
            return Ok(AutoPlacement::AlreadyPresent(index));
        }

        // Settle where the server is and where the screen goes before
        // touching the grid.
        let (server, fix) = match self.server_index() {
            Some(index) => (index, ServerFix::None),
            None => match self.find_by_name(server_name) {
                Some(index) => (index, ServerFix::Mark),
                None if self.screens[self.center_index()].is_null() => {
                    (self.center_index(), ServerFix::Recover)
                }
                None => return Err(PlacementError::NoServer),
            },
        };
        let placement = self
            .free_cell_for(server, direction)
            .ok_or(PlacementError::GridFull)?;

        match fix {
            ServerFix::None => {}
            ServerFix::Mark => self
                .mark_server(server)
                .map_err(|_| PlacementError::NoServer)?,
            ServerFix::Recover => {
                self.fix_no_server(server_name)
                    .ok_or(PlacementError::NoServer)?;
            }
        }

        let index = placement.index();
        self.screens[index] = Screen::new(name);
        debug!(name, index, ?placement, "placed new screen");
        Ok(placement)
    }

    /// First free cell walking from `server` in `direction`, else the first
    /// free cell anywhere.  The `server` cell itself never qualifies.
    fn free_cell_for(&self, server: usize, direction: Direction) -> Option<AutoPlacement> {
        let (dx, dy) = direction.delta();
        let mut cursor = server;
        while let Some(next) = self.adjacent_index(cursor, dx, dy) {
            if self.screens[next].is_null() {
                return Some(AutoPlacement::Adjacent(next));
            }
            cursor = next;
        }
        (0..self.screens.len())
            .find(|&i| i != server && self.screens[i].is_null())
            .map(AutoPlacement::FirstEmpty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn grid_with_server() -> Topology {
        let mut topology = Topology::default();
        let server = topology.center_index();
        topology
            .set_screen(server, Screen { is_server: true, ..Screen::new("server") })
            .unwrap();
        topology
    }

    // ── construction ─────────────────────────────────────────────────────────

    #[test]
    fn test_new_rejects_zero_dimensions() {
        assert_eq!(
            Topology::new(0, 3),
            Err(TopologyError::EmptyGrid { columns: 0, rows: 3 })
        );
    }

    #[test]
    fn test_new_rejects_grids_past_the_cell_limit() {
        assert_eq!(
            Topology::new(usize::MAX, 2),
            Err(TopologyError::TooLarge { columns: usize::MAX, rows: 2 })
        );
        assert_eq!(
            Topology::new(MAX_CELLS, 2),
            Err(TopologyError::TooLarge { columns: MAX_CELLS, rows: 2 })
        );
        assert_eq!(Topology::new(MAX_CELLS, 1).map(|t| t.len()), Ok(MAX_CELLS));
    }

    #[test]
    fn test_default_grid_is_five_by_three_and_empty() {
        let topology = Topology::default();
        assert_eq!((topology.columns(), topology.rows()), (5, 3));
        assert_eq!(topology.len(), 15);
        assert_eq!(topology.num_screens(), 0);
        assert_eq!(topology.center_index(), 7);
    }

    // ── add / find / remove ──────────────────────────────────────────────────

    #[test]
    fn test_add_screen_fills_first_null_cell() {
        let mut topology = Topology::new(2, 1).unwrap();
        assert_eq!(topology.add_screen(Screen::new("a")), Ok(0));
        assert_eq!(topology.add_screen(Screen::new("b")), Ok(1));
        assert!(topology.is_full());
        assert_eq!(topology.add_screen(Screen::new("c")), Err(TopologyError::Full));
    }

    #[test]
    fn test_add_screen_rejects_duplicate_name() {
        let mut topology = Topology::new(2, 1).unwrap();
        topology.add_screen(Screen::new("a")).unwrap();
        assert_eq!(
            topology.add_screen(Screen::new("a")),
            Err(TopologyError::DuplicateName("a".to_string()))
        );
    }

    #[test]
    fn test_find_by_name_matches_aliases() {
        let mut topology = Topology::default();
        let mut screen = Screen::new("desk");
        screen.add_alias("desk.lan");
        let index = topology.add_screen(screen).unwrap();

        assert_eq!(topology.find_by_name("desk.lan"), Some(index));
        assert_eq!(topology.find_by_name(""), None);
    }

    #[test]
    fn test_remove_screen_leaves_null_cell() {
        let mut topology = Topology::default();
        let index = topology.add_screen(Screen::new("a")).unwrap();

        let removed = topology.remove_screen(index);

        assert_eq!(removed.map(|s| s.name), Some("a".to_string()));
        assert!(topology.screen_at(index).unwrap().is_null());
        assert_eq!(topology.remove_screen(index), None);
    }

    // ── server flag ──────────────────────────────────────────────────────────

    #[test]
    fn test_mark_server_clears_previous_server() {
        let mut topology = Topology::default();
        let a = topology.add_screen(Screen::new("a")).unwrap();
        let b = topology.add_screen(Screen::new("b")).unwrap();

        topology.mark_server(a).unwrap();
        topology.mark_server(b).unwrap();

        assert_eq!(topology.server_index(), Some(b));
        assert!(!topology.screen_at(a).unwrap().is_server);
    }

    #[test]
    fn test_mark_server_on_null_cell_keeps_existing_server() {
        let mut topology = grid_with_server();
        assert_eq!(topology.mark_server(0), Err(TopologyError::NullScreen(0)));
        assert_eq!(topology.server_index(), Some(7));
    }

    // ── adjacency ────────────────────────────────────────────────────────────

    #[test]
    fn test_adjacent_index_has_no_wraparound() {
        let topology = Topology::default();
        assert_eq!(topology.adjacent_index(4, 1, 0), None);
        assert_eq!(topology.adjacent_index(5, -1, 0), None);
        assert_eq!(topology.adjacent_index(2, 0, -1), None);
        assert_eq!(topology.adjacent_index(12, 0, 1), None);
        assert_eq!(topology.adjacent_index(7, 1, 0), Some(8));
        assert_eq!(topology.adjacent_index(7, 0, 1), Some(12));
    }

    #[test]
    fn test_neighbor_skips_null_cells() {
        let mut topology = grid_with_server();
        assert_eq!(topology.neighbor(7, Direction::Right), None);
        topology.set_screen(8, Screen::new("right")).unwrap();
        assert_eq!(topology.neighbor(7, Direction::Right), Some(8));
    }

    proptest! {
        #[test]
        fn prop_adjacent_index_matches_grid_rule(
            columns in 1usize..12,
            rows in 1usize..12,
            seed in 0usize..144,
            dx in -1i32..=1,
            dy in -1i32..=1,
        ) {
            let topology = Topology::new(columns, rows).unwrap();
            let index = seed % (columns * rows);
            let column = index % columns;
            let row = index / columns;

            let crosses_edge = (dx > 0 && column == columns - 1)
                || (dx < 0 && column == 0)
                || (dy < 0 && row == 0)
                || (dy > 0 && row == rows - 1);

            let result = topology.adjacent_index(index, dx, dy);
            if crosses_edge {
                prop_assert_eq!(result, None);
            } else {
                let expected = index as i64 + dx as i64 + dy as i64 * columns as i64;
                prop_assert_eq!(result, Some(expected as usize));
            }
        }
    }

    // ── auto placement ───────────────────────────────────────────────────────

    #[test]
    fn test_auto_place_right_of_server() {
        // Arrange: 5x3 grid, only the server cell occupied
        let mut topology = grid_with_server();

        // Act
        let placed = topology.auto_place("b", Direction::Right, "server");

        // Assert
        assert_eq!(placed, Ok(AutoPlacement::Adjacent(8)));
        assert_eq!(topology.find_by_name("b"), Some(8));
    }

    #[test]
    fn test_auto_place_walks_outward_when_adjacent_cell_taken() {
        let mut topology = grid_with_server();
        topology.set_screen(8, Screen::new("taken")).unwrap();

        let placed = topology.auto_place("b", Direction::Right, "server");

        assert_eq!(placed, Ok(AutoPlacement::Adjacent(9)));
    }

    #[test]
    fn test_auto_place_falls_back_to_first_empty_cell() {
        let mut topology = grid_with_server();
        topology.set_screen(8, Screen::new("c")).unwrap();
        topology.set_screen(9, Screen::new("d")).unwrap();

        let placed = topology.auto_place("b", Direction::Right, "server");

        assert_eq!(placed, Ok(AutoPlacement::FirstEmpty(0)));
    }

    #[test]
    fn test_auto_place_existing_name_is_reported_not_duplicated() {
        let mut topology = grid_with_server();
        topology.set_screen(3, Screen::new("b")).unwrap();

        let placed = topology.auto_place("b", Direction::Left, "server");

        assert_eq!(placed, Ok(AutoPlacement::AlreadyPresent(3)));
        assert_eq!(topology.num_screens(), 2);
    }

    #[test]
    fn test_auto_place_recovers_missing_server_into_center() {
        let mut topology = Topology::default();

        let placed = topology.auto_place("b", Direction::Left, "server");

        assert_eq!(topology.server_index(), Some(7));
        assert_eq!(placed, Ok(AutoPlacement::Adjacent(6)));
    }

    #[test]
    fn test_auto_place_marks_named_server_when_flag_missing() {
        let mut topology = Topology::default();
        topology.set_screen(0, Screen::new("server")).unwrap();

        let placed = topology.auto_place("b", Direction::Right, "server");

        assert_eq!(topology.server_index(), Some(0));
        assert_eq!(placed, Ok(AutoPlacement::Adjacent(1)));
    }

    #[test]
    fn test_auto_place_without_server_and_occupied_center_fails() {
        let mut topology = Topology::default();
        topology.set_screen(7, Screen::new("squatter")).unwrap();
        let before = topology.clone();

        let placed = topology.auto_place("b", Direction::Right, "server");

        assert_eq!(placed, Err(PlacementError::NoServer));
        assert_eq!(topology, before);
    }

    #[test]
    fn test_auto_place_full_grid_fails_without_mutation() {
        let mut topology = Topology::new(2, 1).unwrap();
        topology
            .set_screen(0, Screen { is_server: true, ..Screen::new("server") })
            .unwrap();
        topology.set_screen(1, Screen::new("a")).unwrap();
        let before = topology.clone();

        let placed = topology.auto_place("b", Direction::Right, "server");

        assert_eq!(placed, Err(PlacementError::GridFull));
        assert_eq!(topology, before);
    }

    proptest! {
        #[test]
        fn prop_auto_place_adds_one_screen_or_changes_nothing(
            occupied in proptest::collection::vec(any::<bool>(), 9),
            server_cell in proptest::option::of(0usize..9),
            direction in 0usize..4,
        ) {
            let mut topology = Topology::new(3, 3).unwrap();
            for (i, _) in occupied.iter().enumerate().filter(|(_, taken)| **taken) {
                topology.set_screen(i, Screen::new(format!("s{i}"))).unwrap();
            }
            if let Some(i) = server_cell {
                topology.set_screen(i, Screen::new("server")).unwrap();
            }
            let before = topology.clone();
            let direction = [Direction::Left, Direction::Right, Direction::Up, Direction::Down][direction];

            match topology.auto_place("new", direction, "server") {
                Ok(placement) => {
                    prop_assert_eq!(topology.num_screens(), before.num_screens() + 1);
                    prop_assert_eq!(topology.find_by_name("new"), Some(placement.index()));
                    prop_assert!(topology.server_index().is_some());
                }
                Err(_) => prop_assert_eq!(topology, before),
            }
        }
    }

    #[test]
    fn test_auto_place_full_grid_leaves_unflagged_server_unmarked() {
        // Arrange: the server is present by name but carries no flag
        let mut topology = Topology::new(2, 1).unwrap();
        topology.set_screen(0, Screen::new("srv")).unwrap();
        topology.set_screen(1, Screen::new("other")).unwrap();
        let before = topology.clone();

        // Act
        let placed = topology.auto_place("new", Direction::Right, "srv");

        // Assert
        assert_eq!(placed, Err(PlacementError::GridFull));
        assert_eq!(topology.server_index(), None);
        assert_eq!(topology, before);
    }

    #[test]
    fn test_auto_place_recovery_never_claims_the_center_for_the_client() {
        // Arrange: 3x1, no server, only the centre cell free
        let mut topology = Topology::new(3, 1).unwrap();
        topology.set_screen(0, Screen::new("a")).unwrap();
        topology.set_screen(2, Screen::new("c")).unwrap();
        let before = topology.clone();

        // Act
        let placed = topology.auto_place("new", Direction::Right, "server");

        // Assert: the centre would hold the recovered server, leaving no room
        assert_eq!(placed, Err(PlacementError::GridFull));
        assert_eq!(topology, before);
    }
}
