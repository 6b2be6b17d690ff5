//! TOML-based settings persistence for the server.
//!
//! Reads and writes [`Settings`] to the platform-appropriate settings file:
//! - Windows:  `%APPDATA%\Gridshare\settings.toml`
//! - Linux:    `~/.config/gridshare/settings.toml`
//! - macOS:    `~/Library/Application Support/Gridshare/settings.toml`
//!
//! # File layout
//!
//! ```toml
//! screenName = "desk"
//!
//! [internalConfig]
//! numColumns = 5
//! numRows = 3
//! protocol = "synergy"
//! switchCorner = [false, false, false, false]
//! hotkeys = ["keystroke(Control+Alt+Right) = switchInDirection(right)"]
//!
//! [[internalConfig.screens]]
//! name = ""
//! # ... one entry per grid cell, row-major
//! ```
//!
//! # Recovery
//!
//! Loading is lenient.  The file is parsed into a generic TOML table first and
//! each key is converted on its own: a missing or malformed key falls back to
//! its default and a warning names it.  A malformed screen entry becomes an
//! empty cell; a malformed hotkey line is skipped.  Only text that is not TOML
//! at all is an error.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use gridshare_core::domain::clipboard::round_sharing_size;
use gridshare_core::domain::topology::{DEFAULT_COLUMNS, DEFAULT_ROWS, MAX_CELLS};
use gridshare_core::{CornerSet, Hotkey, Options, Protocol, Screen, ServerConfig, Topology};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use toml::{Table, Value};
use tracing::{debug, warn};

/// Error type for settings file operations.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing settings at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML.
    #[error("failed to parse settings TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The settings could not be serialized to TOML.
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Everything the server persists between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Name this machine's screen answers to.
    pub screen_name: String,
    pub config: ServerConfig,
}

impl Settings {
    /// First-run settings: a default grid with the server in the centre cell.
    pub fn new(screen_name: impl Into<String>) -> Self {
        let screen_name = screen_name.into();
        let mut config = ServerConfig::default();
        config.topology.fix_no_server(&screen_name);
        Self {
            screen_name,
            config,
        }
    }

    /// Parses settings text, recovering key by key.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Parse`] only if `text` is not TOML.
    pub fn from_toml(text: &str) -> Result<Self, SettingsError> {
        let table: Table = text.parse()?;
        let screen_name = match table.get("screenName").and_then(Value::as_str) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => default_screen_name(),
        };

        let Some(internal) = table.get("internalConfig").and_then(Value::as_table) else {
            debug!("no internalConfig table; using defaults");
            return Ok(Self::new(screen_name));
        };

        let mut reader = KeyReader::new(internal);
        let config = reader.server_config();
        if reader.recovered > 0 {
            warn!(keys = reader.recovered, "settings recovered with defaults");
        }
        Ok(Self {
            screen_name,
            config,
        })
    }

    /// Renders the settings as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Serialize`] if serialization fails.
    pub fn to_toml(&self) -> Result<String, SettingsError> {
        let options = &self.config.options;
        let topology = &self.config.topology;
        let doc = SettingsDoc {
            screen_name: &self.screen_name,
            internal_config: InternalConfigDoc {
                num_columns: topology.columns(),
                num_rows: topology.rows(),
                has_heartbeat: options.has_heartbeat,
                heartbeat: options.heartbeat,
                protocol: options.protocol,
                relative_mouse_moves: options.relative_mouse_moves,
                win32_keep_foreground: options.win32_keep_foreground,
                has_switch_delay: options.has_switch_delay,
                switch_delay: options.switch_delay,
                has_switch_double_tap: options.has_switch_double_tap,
                switch_double_tap: options.switch_double_tap,
                switch_corner_size: options.switch_corner_size,
                disable_lock_to_screen: options.disable_lock_to_screen,
                clipboard_sharing: options.clipboard_sharing,
                clipboard_sharing_size: options.clipboard_sharing_size,
                switch_corner: options.switch_corners.0,
                hotkeys: self.config.hotkeys.iter().map(Hotkey::to_string).collect(),
                screens: topology.screens(),
            },
        };
        Ok(toml::to_string_pretty(&doc)?)
    }
}

// ── Serialized layout ─────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SettingsDoc<'a> {
    screen_name: &'a str,
    internal_config: InternalConfigDoc<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InternalConfigDoc<'a> {
    num_columns: usize,
    num_rows: usize,
    has_heartbeat: bool,
    heartbeat: u32,
    protocol: Protocol,
    relative_mouse_moves: bool,
    win32_keep_foreground: bool,
    has_switch_delay: bool,
    switch_delay: u32,
    has_switch_double_tap: bool,
    switch_double_tap: u32,
    switch_corner_size: u32,
    disable_lock_to_screen: bool,
    clipboard_sharing: bool,
    clipboard_sharing_size: u64,
    switch_corner: [bool; 4],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    hotkeys: Vec<String>,
    screens: &'a [Screen],
}

// ── Lenient reader ────────────────────────────────────────────────────────────

/// Reads `[internalConfig]` keys one at a time, counting recoveries.
struct KeyReader<'a> {
    table: &'a Table,
    recovered: usize,
}

impl<'a> KeyReader<'a> {
    fn new(table: &'a Table) -> Self {
        Self {
            table,
            recovered: 0,
        }
    }

    /// Value of `key`, or `default` with a warning if it is missing or has
    /// the wrong type.
    fn get<T: DeserializeOwned + std::fmt::Debug>(&mut self, key: &str, default: T) -> T {
        let Some(value) = self.table.get(key) else {
            warn!(key, ?default, "settings key missing; using default");
            self.recovered += 1;
            return default;
        };
        match value.clone().try_into::<T>() {
            Ok(v) => v,
            Err(e) => {
                warn!(key, ?default, error = %e, "settings key invalid; using default");
                self.recovered += 1;
                default
            }
        }
    }

    fn server_config(&mut self) -> ServerConfig {
        let defaults = Options::default();

        let protocol_name: String = self.get("protocol", defaults.protocol.name().to_string());
        let protocol = Protocol::from_name(&protocol_name).unwrap_or_else(|| {
            warn!(key = "protocol", value = %protocol_name, "unknown protocol; using synergy");
            self.recovered += 1;
            Protocol::default()
        });

        let clipboard_sharing = self.get("clipboardSharing", defaults.clipboard_sharing);
        let sharing_size: u64 = self.get("clipboardSharingSize", defaults.clipboard_sharing_size);

        let options = Options {
            has_heartbeat: self.get("hasHeartbeat", defaults.has_heartbeat),
            heartbeat: self.get("heartbeat", defaults.heartbeat),
            protocol,
            relative_mouse_moves: self.get("relativeMouseMoves", defaults.relative_mouse_moves),
            win32_keep_foreground: self.get("win32KeepForeground", defaults.win32_keep_foreground),
            has_switch_delay: self.get("hasSwitchDelay", defaults.has_switch_delay),
            switch_delay: self.get("switchDelay", defaults.switch_delay),
            has_switch_double_tap: self.get("hasSwitchDoubleTap", defaults.has_switch_double_tap),
            switch_double_tap: self.get("switchDoubleTap", defaults.switch_double_tap),
            switch_corners: CornerSet(self.get("switchCorner", defaults.switch_corners.0)),
            switch_corner_size: self.get("switchCornerSize", defaults.switch_corner_size),
            disable_lock_to_screen: self.get("disableLockToScreen", defaults.disable_lock_to_screen),
            clipboard_sharing,
            clipboard_sharing_size: round_sharing_size(sharing_size),
        };

        ServerConfig {
            topology: self.topology(),
            options,
            hotkeys: self.hotkeys(),
        }
    }

    fn topology(&mut self) -> Topology {
        let mut columns: usize = self.get("numColumns", DEFAULT_COLUMNS);
        let mut rows: usize = self.get("numRows", DEFAULT_ROWS);
        let cells = match columns.checked_mul(rows) {
            Some(cells) if cells > 0 && cells <= MAX_CELLS => cells,
            _ => {
                warn!(
                    columns,
                    rows,
                    max_cells = MAX_CELLS,
                    "grid dimensions out of range; using 5x3"
                );
                self.recovered += 1;
                columns = DEFAULT_COLUMNS;
                rows = DEFAULT_ROWS;
                columns * rows
            }
        };

        let entries: &[Value] = match self.table.get("screens") {
            Some(Value::Array(entries)) => entries.as_slice(),
            Some(_) => {
                warn!(key = "screens", "settings key invalid; using an empty grid");
                self.recovered += 1;
                &[]
            }
            None => {
                warn!(key = "screens", "settings key missing; using an empty grid");
                self.recovered += 1;
                &[]
            }
        };
        if entries.len() > cells {
            warn!(
                stored = entries.len(),
                cells,
                "more screens than grid cells; extra entries dropped"
            );
        }

        let mut cells = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            match entry.clone().try_into::<Screen>() {
                Ok(screen) => cells.push(screen),
                Err(e) => {
                    warn!(index, error = %e, "invalid screen entry; cell left empty");
                    self.recovered += 1;
                    cells.push(Screen::null());
                }
            }
        }

        // Dimensions are in range here.
        Topology::from_cells(columns, rows, cells).unwrap_or_default()
    }

    fn hotkeys(&mut self) -> Vec<Hotkey> {
        let lines: Vec<String> = match self.table.get("hotkeys") {
            None => return Vec::new(),
            Some(value) => match value.clone().try_into() {
                Ok(lines) => lines,
                Err(e) => {
                    warn!(key = "hotkeys", error = %e, "settings key invalid; no hotkeys loaded");
                    self.recovered += 1;
                    return Vec::new();
                }
            },
        };

        lines
            .iter()
            .filter_map(|line| match Hotkey::from_str(line) {
                Ok(hotkey) => Some(hotkey),
                Err(e) => {
                    warn!(line = %line, error = %e, "invalid hotkey skipped");
                    self.recovered += 1;
                    None
                }
            })
            .collect()
    }
}

// ── Settings repository ───────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the settings file.
///
/// # Errors
///
/// Returns [`SettingsError::NoPlatformConfigDir`] when the platform config
/// base directory cannot be determined from the environment.
pub fn settings_dir() -> Result<PathBuf, SettingsError> {
    platform_config_dir().ok_or(SettingsError::NoPlatformConfigDir)
}

/// Resolves the full path to the settings file.
///
/// # Errors
///
/// Returns [`SettingsError::NoPlatformConfigDir`] if the base directory cannot
/// be determined.
pub fn settings_file_path() -> Result<PathBuf, SettingsError> {
    Ok(settings_dir()?.join("settings.toml"))
}

/// Loads settings from `path`, returning first-run defaults if the file does
/// not exist yet.
///
/// # Errors
///
/// Returns [`SettingsError::Io`] for file-system errors other than "not found"
/// and [`SettingsError::Parse`] if the file is not TOML.
pub fn load_settings(path: &Path) -> Result<Settings, SettingsError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Settings::from_toml(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file; using defaults");
            Ok(Settings::new(default_screen_name()))
        }
        Err(source) => Err(SettingsError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Persists `settings` to `path`, creating the directory if needed.
///
/// # Errors
///
/// Returns [`SettingsError::Io`] for file-system failures or
/// [`SettingsError::Serialize`] if serialization fails.
pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| SettingsError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = settings.to_toml()?;
    std::fs::write(path, content).map_err(|source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// This machine's name as reported by the environment, or `"server"`.
pub fn default_screen_name() -> String {
    ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "server".to_string())
}

/// Resolves the platform config base directory including the `Gridshare`
/// subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("Gridshare"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("gridshare"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("Gridshare")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
