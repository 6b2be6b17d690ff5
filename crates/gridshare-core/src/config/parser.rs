//! Reads the server text format back into a [`ServerConfig`].
//!
//! The text carries no grid coordinates, only links between named screens,
//! so the grid is rebuilt from the links: the first declared screen is placed
//! at the origin and every link places its target one cell away, breadth
//! first.  Screens not reachable through links start a new group two columns
//! to the right of everything placed so far, so groups never touch.  The
//! bounding box is then centred in a grid of at least 5×3 cells.
//!
//! Indentation is insignificant, blank lines and lines starting with `#` are
//! ignored.  The first error aborts the load and carries its 1-based line
//! number.

use std::collections::{HashMap, VecDeque};

use thiserror::Error;
use tracing::debug;

use super::{Options, Protocol, ServerConfig};
use crate::domain::geometry::{CornerSet, Direction};
use crate::domain::screen::Screen;
use crate::domain::topology::{Topology, DEFAULT_COLUMNS, DEFAULT_ROWS, MAX_CELLS};
use crate::hotkey::action::ActionParseError;
use crate::hotkey::engine::Hotkey;
use crate::input::Modifier;

/// Errors produced while parsing config text.  Every variant carries the
/// line it was found on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("line {line}: expected {expected}, got {text:?}")]
    Syntax {
        line: usize,
        expected: &'static str,
        text: String,
    },

    #[error("line {line}: unknown section {name:?}")]
    UnknownSection { line: usize, name: String },

    #[error("line {line}: section opened on line {opened} is not closed with `end`")]
    UnterminatedSection { line: usize, opened: usize },

    #[error("line {line}: unknown option {name:?}")]
    UnknownOption { line: usize, name: String },

    #[error("line {line}: invalid value {value:?} for {name}")]
    InvalidValue {
        line: usize,
        name: String,
        value: String,
    },

    #[error("line {line}: unknown screen {name:?}")]
    UnknownScreen { line: usize, name: String },

    #[error("line {line}: screen name {name:?} is already in use")]
    DuplicateScreen { line: usize, name: String },

    #[error("line {line}: link {from} {direction} = {to} contradicts the other links")]
    ContradictoryLink {
        line: usize,
        from: String,
        direction: &'static str,
        to: String,
    },

    #[error("line {line}: layout needs a {columns}x{rows} grid, more than {MAX_CELLS} cells")]
    GridTooLarge {
        line: usize,
        columns: usize,
        rows: usize,
    },

    #[error("line {line}: {source}")]
    Hotkey {
        line: usize,
        #[source]
        source: ActionParseError,
    },
}

impl ConfigError {
    /// 1-based line the error was found on.
    pub fn line(&self) -> usize {
        match self {
            ConfigError::Syntax { line, .. }
            | ConfigError::UnknownSection { line, .. }
            | ConfigError::UnterminatedSection { line, .. }
            | ConfigError::UnknownOption { line, .. }
            | ConfigError::InvalidValue { line, .. }
            | ConfigError::UnknownScreen { line, .. }
            | ConfigError::DuplicateScreen { line, .. }
            | ConfigError::ContradictoryLink { line, .. }
            | ConfigError::GridTooLarge { line, .. }
            | ConfigError::Hotkey { line, .. } => *line,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Screens,
    Aliases,
    Links,
    Options,
}

struct Link {
    line: usize,
    from: usize,
    direction: Direction,
    to: usize,
}

#[derive(Default)]
struct Parsed {
    screens: Vec<Screen>,
    links: Vec<Link>,
    options: Options,
    hotkeys: Vec<Hotkey>,
}

impl Parsed {
    fn find(&self, name: &str) -> Option<usize> {
        self.screens.iter().position(|s| s.answers_to(name))
    }

    fn require(&self, line: usize, name: &str) -> Result<usize, ConfigError> {
        self.find(name).ok_or_else(|| ConfigError::UnknownScreen {
            line,
            name: name.to_string(),
        })
    }
}

fn key_value(line: usize, text: &str) -> Result<(&str, &str), ConfigError> {
    text.split_once('=')
        .map(|(k, v)| (k.trim(), v.trim()))
        .ok_or_else(|| ConfigError::Syntax {
            line,
            expected: "name = value",
            text: text.to_string(),
        })
}

fn invalid(line: usize, name: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        line,
        name: name.to_string(),
        value: value.to_string(),
    }
}

fn parse_bool(line: usize, name: &str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(invalid(line, name, value)),
    }
}

fn parse_number<T: std::str::FromStr>(line: usize, name: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| invalid(line, name, value))
}

fn parse_corners(line: usize, name: &str, value: &str) -> Result<CornerSet, ConfigError> {
    CornerSet::from_option_value(value).ok_or_else(|| invalid(line, name, value))
}

fn apply_screen_option(screen: &mut Screen, line: usize, name: &str, value: &str) -> Result<(), ConfigError> {
    let fixes = &mut screen.fixes;
    match name {
        "halfDuplexCapsLock" => fixes.half_duplex_caps_lock = parse_bool(line, name, value)?,
        "halfDuplexNumLock" => fixes.half_duplex_num_lock = parse_bool(line, name, value)?,
        "halfDuplexScrollLock" => fixes.half_duplex_scroll_lock = parse_bool(line, name, value)?,
        "xtestIsXineramaUnaware" => fixes.xtest_is_xinerama_unaware = parse_bool(line, name, value)?,
        "preserveFocus" => fixes.preserve_focus = parse_bool(line, name, value)?,
        "switchCorners" => screen.switch_corners = parse_corners(line, name, value)?,
        "switchCornerSize" => screen.switch_corner_size = parse_number(line, name, value)?,
        _ => {
            let from = Modifier::from_config_name(name).ok_or_else(|| ConfigError::UnknownOption {
                line,
                name: name.to_string(),
            })?;
            let to = Modifier::from_config_name(value).ok_or_else(|| invalid(line, name, value))?;
            screen.modifier_map.set(from, to);
        }
    }
    Ok(())
}

fn apply_option(options: &mut Options, line: usize, name: &str, value: &str) -> Result<(), ConfigError> {
    match name {
        "heartbeat" => {
            options.heartbeat = parse_number(line, name, value)?;
            options.has_heartbeat = true;
        }
        "protocol" => {
            options.protocol = Protocol::from_name(value).ok_or_else(|| invalid(line, name, value))?;
        }
        "relativeMouseMoves" => options.relative_mouse_moves = parse_bool(line, name, value)?,
        "win32KeepForeground" => options.win32_keep_foreground = parse_bool(line, name, value)?,
        "disableLockToScreen" => options.disable_lock_to_screen = parse_bool(line, name, value)?,
        "clipboardSharing" => options.clipboard_sharing = parse_bool(line, name, value)?,
        "clipboardSharingSize" => options.clipboard_sharing_size = parse_number(line, name, value)?,
        "switchDelay" => {
            options.switch_delay = parse_number(line, name, value)?;
            options.has_switch_delay = true;
        }
        "switchDoubleTap" => {
            options.switch_double_tap = parse_number(line, name, value)?;
            options.has_switch_double_tap = true;
        }
        "switchCorners" => options.switch_corners = parse_corners(line, name, value)?,
        "switchCornerSize" => options.switch_corner_size = parse_number(line, name, value)?,
        _ => {
            return Err(ConfigError::UnknownOption {
                line,
                name: name.to_string(),
            })
        }
    }
    Ok(())
}

/// Parses config text.
///
/// The returned grid has no server flag; the caller marks the server by
/// name.
///
/// # Errors
///
/// Returns the first [`ConfigError`] found.
pub fn parse_config(text: &str) -> Result<ServerConfig, ConfigError> {
    let mut parsed = Parsed::default();
    let mut section: Option<(Section, usize)> = None;
    // Screen named by the last `name:` line in the current section.
    let mut current: Option<usize> = None;
    let mut last_line = 0;

    for (number, raw) in text.lines().enumerate() {
        let line = number + 1;
        last_line = line;
        let text = raw.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }

        let Some((kind, _)) = section else {
            let name = text
                .strip_prefix("section:")
                .map(str::trim)
                .ok_or_else(|| ConfigError::Syntax {
                    line,
                    expected: "section: <name>",
                    text: text.to_string(),
                })?;
            let kind = match name {
                "screens" => Section::Screens,
                "aliases" => Section::Aliases,
                "links" => Section::Links,
                "options" => Section::Options,
                _ => {
                    return Err(ConfigError::UnknownSection {
                        line,
                        name: name.to_string(),
                    })
                }
            };
            section = Some((kind, line));
            current = None;
            continue;
        };

        if text == "end" {
            section = None;
            continue;
        }

        // `name:` opens a screen block, except in options where hotkey
        // triggers and values may contain colons.
        if kind != Section::Options && text.ends_with(':') && !text.contains('=') {
            let name = text.trim_end_matches(':').trim();
            current = Some(match kind {
                Section::Screens => {
                    if parsed.find(name).is_some() {
                        return Err(ConfigError::DuplicateScreen {
                            line,
                            name: name.to_string(),
                        });
                    }
                    parsed.screens.push(Screen::new(name));
                    parsed.screens.len() - 1
                }
                _ => parsed.require(line, name)?,
            });
            continue;
        }

        match kind {
            Section::Screens => {
                let index = current.ok_or_else(|| ConfigError::Syntax {
                    line,
                    expected: "<screen>:",
                    text: text.to_string(),
                })?;
                let (name, value) = key_value(line, text)?;
                apply_screen_option(&mut parsed.screens[index], line, name, value)?;
            }
            Section::Aliases => {
                let index = current.ok_or_else(|| ConfigError::Syntax {
                    line,
                    expected: "<screen>:",
                    text: text.to_string(),
                })?;
                match parsed.find(text) {
                    Some(owner) if owner == index => {}
                    Some(_) => {
                        return Err(ConfigError::DuplicateScreen {
                            line,
                            name: text.to_string(),
                        })
                    }
                    None => {
                        parsed.screens[index].add_alias(text);
                    }
                }
            }
            Section::Links => {
                let from = current.ok_or_else(|| ConfigError::Syntax {
                    line,
                    expected: "<screen>:",
                    text: text.to_string(),
                })?;
                let (name, value) = key_value(line, text)?;
                let direction = Direction::from_name(name).ok_or_else(|| invalid(line, "link", name))?;
                let to = parsed.require(line, value)?;
                parsed.links.push(Link {
                    line,
                    from,
                    direction,
                    to,
                });
            }
            Section::Options => {
                let (name, value) = key_value(line, text)?;
                if name.contains('(') {
                    let hotkey: Hotkey = text
                        .parse()
                        .map_err(|source| ConfigError::Hotkey { line, source })?;
                    parsed.hotkeys.push(hotkey);
                } else {
                    apply_option(&mut parsed.options, line, name, value)?;
                }
            }
        }
    }

    if let Some((_, opened)) = section {
        return Err(ConfigError::UnterminatedSection {
            line: last_line,
            opened,
        });
    }

    let topology = build_grid(&parsed)?;
    debug!(
        screens = topology.num_screens(),
        columns = topology.columns(),
        rows = topology.rows(),
        "config parsed"
    );
    Ok(ServerConfig {
        topology,
        options: parsed.options,
        hotkeys: parsed.hotkeys,
    })
}

/// Places the parsed screens on a grid according to their links.
fn build_grid(parsed: &Parsed) -> Result<Topology, ConfigError> {
    let count = parsed.screens.len();
    let mut positions: Vec<Option<(i64, i64)>> = vec![None; count];

    // Links are followed both ways so a group can be entered from any member.
    let mut edges: Vec<Vec<(usize, Direction)>> = vec![Vec::new(); count];
    for link in &parsed.links {
        edges[link.from].push((link.to, link.direction));
        edges[link.to].push((link.from, link.direction.opposite()));
    }

    let mut next_group_x = 0i64;
    for root in 0..count {
        if positions[root].is_some() {
            continue;
        }

        // Lay the group out around its own origin first.
        let mut local: HashMap<usize, (i64, i64)> = HashMap::from([(root, (0, 0))]);
        let mut taken: HashMap<(i64, i64), usize> = HashMap::from([((0, 0), root)]);
        let mut queue = VecDeque::from([root]);
        while let Some(index) = queue.pop_front() {
            let (x, y) = local[&index];
            for &(neighbor, direction) in &edges[index] {
                if local.contains_key(&neighbor) {
                    continue;
                }
                let (dx, dy) = direction.delta();
                let cell = (x + i64::from(dx), y + i64::from(dy));
                // A taken cell is reported with the offending link below.
                if taken.contains_key(&cell) {
                    continue;
                }
                local.insert(neighbor, cell);
                taken.insert(cell, neighbor);
                queue.push_back(neighbor);
            }
        }

        // Then shift it to the right of the previous groups.
        let min_x = local.values().map(|p| p.0).min().unwrap_or(0);
        let max_x = local.values().map(|p| p.0).max().unwrap_or(0);
        let shift = next_group_x - min_x;
        for (&index, &(x, y)) in &local {
            positions[index] = Some((x + shift, y));
        }
        next_group_x += max_x - min_x + 2;
    }

    for link in &parsed.links {
        let expected = positions[link.from].map(|(x, y)| {
            let (dx, dy) = link.direction.delta();
            (x + i64::from(dx), y + i64::from(dy))
        });
        if positions[link.to].is_none() || positions[link.to] != expected {
            return Err(ConfigError::ContradictoryLink {
                line: link.line,
                from: parsed.screens[link.from].name.clone(),
                direction: link.direction.name(),
                to: parsed.screens[link.to].name.clone(),
            });
        }
    }

    let placed: Vec<(i64, i64)> = positions.iter().flatten().copied().collect();
    let min_x = placed.iter().map(|p| p.0).min().unwrap_or(0);
    let max_x = placed.iter().map(|p| p.0).max().unwrap_or(0);
    let min_y = placed.iter().map(|p| p.1).min().unwrap_or(0);
    let max_y = placed.iter().map(|p| p.1).max().unwrap_or(0);
    let width = (max_x - min_x + 1) as usize;
    let height = (max_y - min_y + 1) as usize;
    let columns = width.max(DEFAULT_COLUMNS);
    let rows = height.max(DEFAULT_ROWS);
    let too_large = ConfigError::GridTooLarge {
        line: parsed.links.last().map_or(1, |link| link.line),
        columns,
        rows,
    };
    if columns.checked_mul(rows).map_or(true, |cells| cells > MAX_CELLS) {
        return Err(too_large);
    }
    let offset_x = ((columns - width + 1) / 2) as i64;
    let offset_y = ((rows - height + 1) / 2) as i64;

    let mut cells = vec![Screen::null(); columns * rows];
    for (screen, position) in parsed.screens.iter().zip(&positions) {
        if let Some((x, y)) = *position {
            let column = (x - min_x + offset_x) as usize;
            let row = (y - min_y + offset_y) as usize;
            cells[row * columns + column] = screen.clone();
        }
    }
    Topology::from_cells(columns, rows, cells).map_err(|_| too_large)
}
