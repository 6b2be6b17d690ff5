//! Screen geometry: rectangles, grid directions and screen corners.
//!
//! Coordinates are in the local space of one screen: `(x, y)` is the top-left
//! corner of the rectangle and positive `y` points down, matching every
//! platform's native cursor coordinates.

use serde::{Deserialize, Serialize};

/// A rectangular screen shape in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    /// X coordinate of the top-left corner.
    pub x: i32,
    /// Y coordinate of the top-left corner.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect {
    /// Creates a rectangle anchored at `(x, y)`.
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Returns the rightmost X coordinate (exclusive).
    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    /// Returns the bottommost Y coordinate (exclusive).
    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    /// Returns the centre pixel.
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width as i32 / 2, self.y + self.height as i32 / 2)
    }

    /// Returns `true` if `(x, y)` lies inside the rectangle.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Clamps `(x, y)` onto the rectangle.
    pub fn clamp(&self, x: i32, y: i32) -> (i32, i32) {
        let max_x = (self.right() - 1).max(self.x);
        let max_y = (self.bottom() - 1).max(self.y);
        (x.clamp(self.x, max_x), y.clamp(self.y, max_y))
    }

    /// Returns the edge the point is pressed against, if any.
    ///
    /// A point on (or beyond) the outermost pixel column or row counts as
    /// being at that edge.  Horizontal edges win over vertical ones when the
    /// point sits exactly on a corner pixel.
    pub fn edge_at(&self, x: i32, y: i32) -> Option<Direction> {
        if x <= self.x {
            Some(Direction::Left)
        } else if x >= self.right() - 1 {
            Some(Direction::Right)
        } else if y <= self.y {
            Some(Direction::Up)
        } else if y >= self.bottom() - 1 {
            Some(Direction::Down)
        } else {
            None
        }
    }

    /// Returns the corner whose zone contains the point.
    ///
    /// The zone of each corner is a `size`×`size` square; a size of 0 shrinks
    /// it to the single corner pixel.
    pub fn corner_at(&self, x: i32, y: i32, size: u32) -> Option<Corner> {
        let size = size.max(1) as i32;
        let left = x < self.x + size;
        let right = x >= self.right() - size;
        let top = y < self.y + size;
        let bottom = y >= self.bottom() - size;
        match (left, right, top, bottom) {
            (true, _, true, _) => Some(Corner::TopLeft),
            (_, true, true, _) => Some(Corner::TopRight),
            (true, _, _, true) => Some(Corner::BottomLeft),
            (_, true, _, true) => Some(Corner::BottomRight),
            _ => None,
        }
    }

    /// Maps a point leaving `from` through its `direction` edge onto the
    /// opposite edge of `self`.
    ///
    /// The perpendicular coordinate is scaled proportionally so that leaving
    /// the middle of one edge enters the middle of the other.  The entry point
    /// is one pixel inside the edge so the cursor does not immediately sit on
    /// the boundary leading back.
    pub fn entry_from(&self, from: &Rect, direction: Direction, x: i32, y: i32) -> (i32, i32) {
        let inset = |lo: i32, len: u32| -> i32 {
            if len > 2 {
                lo + 1
            } else {
                lo
            }
        };
        let far = |lo: i32, len: u32| -> i32 {
            let last = lo + len as i32 - 1;
            if len > 2 {
                last - 1
            } else {
                last.max(lo)
            }
        };
        match direction {
            Direction::Left | Direction::Right => {
                let t = f64::from(y - from.y) / f64::from(from.height.max(1));
                let mapped = self.y + (t * f64::from(self.height)) as i32;
                let entry_x = if direction == Direction::Right {
                    inset(self.x, self.width)
                } else {
                    far(self.x, self.width)
                };
                self.clamp(entry_x, mapped)
            }
            Direction::Up | Direction::Down => {
                let t = f64::from(x - from.x) / f64::from(from.width.max(1));
                let mapped = self.x + (t * f64::from(self.width)) as i32;
                let entry_y = if direction == Direction::Down {
                    inset(self.y, self.height)
                } else {
                    far(self.y, self.height)
                };
                self.clamp(mapped, entry_y)
            }
        }
    }
}

/// One of the four grid directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    /// All directions in the order links are written: right, left, up, down.
    pub const LINK_ORDER: [Direction; 4] = [
        Direction::Right,
        Direction::Left,
        Direction::Up,
        Direction::Down,
    ];

    /// Column/row delta of one step in this direction.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
        }
    }

    /// The direction pointing the other way.
    pub fn opposite(self) -> Self {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    /// Canonical lowercase name used in config text and action arguments.
    pub fn name(self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }

    /// Parses a canonical direction name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "left" => Some(Direction::Left),
            "right" => Some(Direction::Right),
            "up" => Some(Direction::Up),
            "down" => Some(Direction::Down),
            _ => None,
        }
    }
}

/// One of the four screen corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    /// All corners in their persisted array order.
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    /// Position of this corner in persisted `switchCorner` arrays.
    pub fn index(self) -> usize {
        match self {
            Corner::TopLeft => 0,
            Corner::TopRight => 1,
            Corner::BottomLeft => 2,
            Corner::BottomRight => 3,
        }
    }

    /// Name used in `switchCorners = none +<corner>` lines.
    pub fn name(self) -> &'static str {
        match self {
            Corner::TopLeft => "top-left",
            Corner::TopRight => "top-right",
            Corner::BottomLeft => "bottom-left",
            Corner::BottomRight => "bottom-right",
        }
    }

    /// Parses a corner name.
    pub fn from_name(name: &str) -> Option<Self> {
        Corner::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Directions a switch from this corner tries, in preference order.
    pub fn switch_directions(self) -> [Direction; 2] {
        match self {
            Corner::TopLeft => [Direction::Left, Direction::Up],
            Corner::TopRight => [Direction::Right, Direction::Up],
            Corner::BottomLeft => [Direction::Left, Direction::Down],
            Corner::BottomRight => [Direction::Right, Direction::Down],
        }
    }
}

/// The set of enabled switch corners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CornerSet(pub [bool; 4]);

impl CornerSet {
    /// Returns `true` if `corner` is enabled.
    pub fn contains(&self, corner: Corner) -> bool {
        self.0[corner.index()]
    }

    /// Enables or disables `corner`.
    pub fn set(&mut self, corner: Corner, enabled: bool) {
        self.0[corner.index()] = enabled;
    }

    /// Returns `true` if no corner is enabled.
    pub fn is_empty(&self) -> bool {
        !self.0.iter().any(|&c| c)
    }

    /// Iterates the enabled corners in array order.
    pub fn iter(&self) -> impl Iterator<Item = Corner> + '_ {
        Corner::ALL.into_iter().filter(|c| self.contains(*c))
    }

    /// Renders the `none +top-left +bottom-right` value form.
    pub fn to_option_value(&self) -> String {
        let mut text = String::from("none");
        for corner in self.iter() {
            text.push_str(" +");
            text.push_str(corner.name());
        }
        text
    }

    /// Parses the `none +<corner> ...` value form.
    ///
    /// Returns `None` if any term is not a known corner.
    pub fn from_option_value(value: &str) -> Option<Self> {
        let mut set = CornerSet::default();
        for term in value.split_whitespace() {
            match term {
                "none" => set = CornerSet::default(),
                "all" => set = CornerSet([true; 4]),
                _ => {
                    let (enable, name) = match term.split_at(1) {
                        ("+", rest) => (true, rest),
                        ("-", rest) => (false, rest),
                        _ => return None,
                    };
                    set.set(Corner::from_name(name)?, enable);
                }
            }
        }
        Some(set)
    }
}
