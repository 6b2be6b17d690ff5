//! Writes a [`ServerConfig`] in the server's text format.
//!
//! ```text
//! section: screens
//!     <name>:
//!         halfDuplexCapsLock = false
//!         ...
//! end
//!
//! section: aliases
//!     <name>:
//!         <alias>
//! end
//!
//! section: links
//!     <name>:
//!         right = <neighbour>
//! end
//!
//! section: options
//!     protocol = synergy
//!     ...
//!     keystroke(Control+F1) = switchToScreen(laptop)
//! end
//! ```
//!
//! Only occupied cells are written.  Links are derived from grid adjacency in
//! the order right, left, up, down.  `heartbeat`, `switchDelay` and
//! `switchDoubleTap` appear only when enabled, and hotkeys without actions are
//! skipped.

use std::fmt::{self, Write};

use super::ServerConfig;
use crate::domain::geometry::Direction;
use crate::domain::screen::Screen;

fn bool_text(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn write_screen(out: &mut impl Write, screen: &Screen) -> fmt::Result {
    let fixes = &screen.fixes;
    writeln!(out, "\t{}:", screen.name)?;
    writeln!(out, "\t\thalfDuplexCapsLock = {}", bool_text(fixes.half_duplex_caps_lock))?;
    writeln!(out, "\t\thalfDuplexNumLock = {}", bool_text(fixes.half_duplex_num_lock))?;
    writeln!(out, "\t\thalfDuplexScrollLock = {}", bool_text(fixes.half_duplex_scroll_lock))?;
    writeln!(
        out,
        "\t\txtestIsXineramaUnaware = {}",
        bool_text(fixes.xtest_is_xinerama_unaware)
    )?;
    writeln!(out, "\t\tpreserveFocus = {}", bool_text(fixes.preserve_focus))?;
    for (from, to) in screen.modifier_map.remapped() {
        writeln!(out, "\t\t{} = {}", from.config_name(), to.config_name())?;
    }
    writeln!(out, "\t\tswitchCorners = {}", screen.switch_corners.to_option_value())?;
    writeln!(out, "\t\tswitchCornerSize = {}", screen.switch_corner_size)
}

impl fmt::Display for ServerConfig {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        let topology = &self.topology;
        let occupied = || {
            topology
                .screens()
                .iter()
                .enumerate()
                .filter(|(_, s)| !s.is_null())
        };

        writeln!(out, "section: screens")?;
        for (_, screen) in occupied() {
            write_screen(out, screen)?;
        }
        writeln!(out, "end")?;
        writeln!(out)?;

        writeln!(out, "section: aliases")?;
        for (_, screen) in occupied().filter(|(_, s)| !s.aliases.is_empty()) {
            writeln!(out, "\t{}:", screen.name)?;
            for alias in &screen.aliases {
                writeln!(out, "\t\t{alias}")?;
            }
        }
        writeln!(out, "end")?;
        writeln!(out)?;

        writeln!(out, "section: links")?;
        for (index, screen) in occupied() {
            writeln!(out, "\t{}:", screen.name)?;
            for direction in Direction::LINK_ORDER {
                if let Some(neighbor) = topology
                    .neighbor(index, direction)
                    .and_then(|i| topology.screen_at(i))
                {
                    writeln!(out, "\t\t{} = {}", direction.name(), neighbor.name)?;
                }
            }
        }
        writeln!(out, "end")?;
        writeln!(out)?;

        let options = &self.options;
        writeln!(out, "section: options")?;
        if options.has_heartbeat {
            writeln!(out, "\theartbeat = {}", options.heartbeat)?;
        }
        writeln!(out, "\tprotocol = {}", options.protocol)?;
        writeln!(out, "\trelativeMouseMoves = {}", bool_text(options.relative_mouse_moves))?;
        writeln!(out, "\twin32KeepForeground = {}", bool_text(options.win32_keep_foreground))?;
        writeln!(out, "\tdisableLockToScreen = {}", bool_text(options.disable_lock_to_screen))?;
        writeln!(out, "\tclipboardSharing = {}", bool_text(options.clipboard_sharing))?;
        writeln!(out, "\tclipboardSharingSize = {}", options.clipboard_sharing_size)?;
        if options.has_switch_delay {
            writeln!(out, "\tswitchDelay = {}", options.switch_delay)?;
        }
        if options.has_switch_double_tap {
            writeln!(out, "\tswitchDoubleTap = {}", options.switch_double_tap)?;
        }
        writeln!(out, "\tswitchCorners = {}", options.switch_corners.to_option_value())?;
        writeln!(out, "\tswitchCornerSize = {}", options.switch_corner_size)?;
        for hotkey in self.hotkeys.iter().filter(|h| !h.actions.is_empty()) {
            writeln!(out, "\t{hotkey}")?;
        }
        writeln!(out, "end")
    }
}
