//! Domain entities for gridshare.
//!
//! This module contains pure business logic with no infrastructure
//! dependencies: it compiles and tests on any platform without a display,
//! a network, or a runtime.
//!
//! The pieces build on each other from the bottom up:
//!
//! - [`geometry`] – rectangles, directions and corners in screen pixels.
//! - [`screen`] – one grid cell and its per-machine fix-ups.
//! - [`topology`] – the grid of cells and the adjacency rules between them.
//! - [`switching`] – the real-time state machine that moves input control
//!   across the grid.
//! - [`clipboard`] – who owns each clipboard and who must be told when it
//!   changes.

/// Clipboard ownership and propagation policy.
pub mod clipboard;
/// Rectangles, grid directions and screen corners.
pub mod geometry;
/// A single grid cell.
pub mod screen;
/// The switching state machine.
pub mod switching;
/// The screen grid, the core domain concept.
///
/// See [`topology::Topology`] for the main type.
pub mod topology;
