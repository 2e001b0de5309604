use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ratatui::style::Color;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use xdg::BaseDirectories;

use crate::grid::{GridError, GridSpec, GridWarning, Position};

/// File name of the configuration document inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Pre-XDG location, migrated on startup
pub const LEGACY_CONFIG_DIR: &str = "~/.griddash";

/// Smallest refresh interval a widget can run at
pub const MIN_REFRESH_INTERVAL_SECS: i64 = 1;

/// Configuration errors. All of them stop the process before any widget runs.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file {} does not exist", .path.display())]
    Missing { path: PathBuf },

    #[error("configuration file {} has a syntax error: {source}", .path.display())]
    Syntax {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("could not access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to determine the configuration directory")]
    NoConfigDir,

    #[error("widget '{widget}' is malformed: {source}")]
    InvalidWidget {
        widget: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("widget '{widget}' has invalid settings: {source}")]
    InvalidSettings {
        widget: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("widget '{widget}' uses unknown kind '{kind}'")]
    UnknownKind { widget: String, kind: String },

    #[error("invalid layout: {0}")]
    Grid(#[from] GridError),
}

/// Problems worth reporting that do not stop the dashboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    UnknownKey { widget: String, key: String },
    ClampedInterval { widget: String, requested: i64 },
    Grid(GridWarning),
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::UnknownKey { widget, key } => {
                write!(f, "widget '{}' ignores unknown setting '{}'", widget, key)
            }
            ConfigWarning::ClampedInterval { widget, requested } => write!(
                f,
                "widget '{}' refresh interval {} raised to {} second(s)",
                widget, requested, MIN_REFRESH_INTERVAL_SECS
            ),
            ConfigWarning::Grid(warning) => write!(f, "{}", warning),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    pub log_file: String,
    #[serde(alias = "refreshInterval")]
    pub refresh_interval: i64,
    /// Seconds a data provider gets per fetch
    #[serde(alias = "fetchTimeout")]
    pub fetch_timeout: u64,
    pub grid: GridSpec,
    pub colors: ColorsConfig,
    /// Widget entries in declaration order, keyed by widget name
    pub widgets: toml::Table,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ColorsConfig {
    pub border: BorderColors,
    pub rows: RowColors,
    pub highlight: HighlightColors,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BorderColors {
    /// Border of the widget under the mouse pointer
    #[serde(deserialize_with = "deserialize_color")]
    pub focusable: Color,
    #[serde(deserialize_with = "deserialize_color")]
    pub focused: Color,
    #[serde(deserialize_with = "deserialize_color")]
    pub normal: Color,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RowColors {
    #[serde(deserialize_with = "deserialize_color")]
    pub even: Color,
    #[serde(deserialize_with = "deserialize_color")]
    pub odd: Color,
}

/// Selected row of the focused widget
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HighlightColors {
    #[serde(deserialize_with = "deserialize_color")]
    pub fore: Color,
    #[serde(deserialize_with = "deserialize_color")]
    pub back: Color,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: "info".to_string(),
            log_file: "/dev/null".to_string(),
            refresh_interval: 300,
            fetch_timeout: 2,
            grid: GridSpec::default(),
            colors: ColorsConfig::default(),
            widgets: toml::Table::new(),
        }
    }
}

impl Default for BorderColors {
    fn default() -> Self {
        BorderColors {
            focusable: Color::Rgb(72, 61, 139), // darkslateblue
            focused: Color::Rgb(255, 165, 0),   // orange
            normal: Color::Gray,
        }
    }
}

impl Default for RowColors {
    fn default() -> Self {
        RowColors {
            even: Color::LightBlue,
            odd: Color::White,
        }
    }
}

impl Default for HighlightColors {
    fn default() -> Self {
        HighlightColors {
            fore: Color::Black,
            back: Color::Rgb(255, 165, 0), // orange
        }
    }
}

impl RowColors {
    /// Colour for the row at `idx`, alternating even/odd
    pub fn for_row(&self, idx: usize) -> Color {
        if idx % 2 == 0 {
            self.even
        } else {
            self.odd
        }
    }
}

/// One `[widgets.<name>]` entry after validation
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetConfig {
    pub name: String,
    pub kind: String,
    pub enabled: bool,
    pub position: Position,
    pub refresh_interval: Duration,
    /// Kind-specific keys, interpreted by the widget kind
    pub settings: toml::Table,
}

#[derive(Debug, Deserialize)]
struct WidgetEntry {
    kind: Option<String>,
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    position: Position,
    #[serde(default, alias = "refreshInterval")]
    refresh_interval: Option<i64>,
    #[serde(flatten)]
    settings: toml::Table,
}

impl Config {
    /// Time budget handed to every fetch
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout.max(1))
    }

    /// Build the typed widget list in declaration order
    ///
    /// Disabled entries are returned too; callers decide whether to skip them.
    pub fn widget_configs(&self) -> Result<(Vec<WidgetConfig>, Vec<ConfigWarning>), ConfigError> {
        let mut configs = Vec::with_capacity(self.widgets.len());
        let mut warnings = Vec::new();

        for (name, value) in &self.widgets {
            let entry = value.clone().try_into::<WidgetEntry>().map_err(|source| {
                ConfigError::InvalidWidget {
                    widget: name.clone(),
                    source,
                }
            })?;

            let requested = entry.refresh_interval.unwrap_or(self.refresh_interval);
            if requested < MIN_REFRESH_INTERVAL_SECS {
                warn!(
                    "CONFIG: widget '{}' refresh interval {} clamped to {}s",
                    name, requested, MIN_REFRESH_INTERVAL_SECS
                );
                warnings.push(ConfigWarning::ClampedInterval {
                    widget: name.clone(),
                    requested,
                });
            }

            configs.push(WidgetConfig {
                name: name.clone(),
                kind: entry.kind.unwrap_or_else(|| name.clone()),
                enabled: entry.enabled,
                position: entry.position,
                refresh_interval: clamp_interval(requested),
                settings: entry.settings,
            });
        }

        Ok((configs, warnings))
    }
}

/// Convert a configured interval in seconds into a timer period, never below the floor
pub fn clamp_interval(secs: i64) -> Duration {
    Duration::from_secs(secs.max(MIN_REFRESH_INTERVAL_SECS) as u64)
}

/// Named colours accepted in the configuration document
static NAMED_COLORS: phf::Map<&'static str, Color> = phf::phf_map! {
    "black" => Color::Black,
    "red" => Color::Red,
    "green" => Color::Green,
    "yellow" => Color::Yellow,
    "blue" => Color::Blue,
    "magenta" => Color::Magenta,
    "cyan" => Color::Cyan,
    "gray" => Color::Gray,
    "grey" => Color::Gray,
    "darkgray" => Color::DarkGray,
    "darkgrey" => Color::DarkGray,
    "lightred" => Color::LightRed,
    "lightgreen" => Color::LightGreen,
    "lightyellow" => Color::LightYellow,
    "lightblue" => Color::LightBlue,
    "lightmagenta" => Color::LightMagenta,
    "lightcyan" => Color::LightCyan,
    "white" => Color::White,
    "orange" => Color::Rgb(255, 165, 0),
    "darkslateblue" => Color::Rgb(72, 61, 139),
    "slategray" => Color::Rgb(112, 128, 144),
    "gold" => Color::Rgb(255, 215, 0),
    "purple" => Color::Rgb(128, 0, 128),
    "navy" => Color::Rgb(0, 0, 128),
    "teal" => Color::Rgb(0, 128, 128),
};

/// Deserialize a color from a string (supports named colors, RGB hex, or RGB tuple)
fn deserialize_color<'de, D>(deserializer: D) -> Result<Color, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_color(&s).ok_or_else(|| serde::de::Error::custom(format!("Invalid color: {}", s)))
}

/// Parse a color string into a ratatui Color
/// Supports:
/// - Named colors: "red", "orange", "darkslateblue", etc.
/// - Hex colors: "#FF6600", "#f60"
/// - RGB tuples: "255,165,0"
pub fn parse_color(s: &str) -> Option<Color> {
    let s = s.trim().to_lowercase();

    if let Some(color) = NAMED_COLORS.get(s.as_str()) {
        return Some(*color);
    }

    if let Some(hex) = s.strip_prefix('#') {
        if hex.len() == 6 {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            return Some(Color::Rgb(r, g, b));
        } else if hex.len() == 3 {
            let r = u8::from_str_radix(&hex[0..1].repeat(2), 16).ok()?;
            let g = u8::from_str_radix(&hex[1..2].repeat(2), 16).ok()?;
            let b = u8::from_str_radix(&hex[2..3].repeat(2), 16).ok()?;
            return Some(Color::Rgb(r, g, b));
        }
    }

    if s.contains(',') {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() == 3 {
            let r = parts[0].trim().parse::<u8>().ok()?;
            let g = parts[1].trim().parse::<u8>().ok()?;
            let b = parts[2].trim().parse::<u8>().ok()?;
            return Some(Color::Rgb(r, g, b));
        }
    }

    None
}

/// Expand a leading `~` to the current user's home directory
///
/// `~user/...` forms are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\') => rest,
        _ => return PathBuf::from(path),
    };

    match dirs::home_dir() {
        Some(home) => home.join(rest.trim_start_matches(['/', '\\'])),
        None => PathBuf::from(path),
    }
}

/// Absolute path of the configuration directory
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    let pgm = env!("CARGO_PKG_NAME");
    let xdg_dirs = BaseDirectories::with_prefix(pgm);
    xdg_dirs.get_config_home().ok_or(ConfigError::NoConfigDir)
}

/// Absolute path of the configuration document
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Move a pre-XDG configuration directory into the XDG location
///
/// Does nothing when the legacy directory is absent or the new one already exists.
pub fn migrate_legacy_dir() {
    let dest = match config_dir() {
        Ok(dest) => dest,
        Err(e) => {
            warn!("CONFIG: skipping migration: {}", e);
            return;
        }
    };
    migrate_dir(&expand_home(LEGACY_CONFIG_DIR), &dest);
}

fn migrate_dir(src: &Path, dest: &Path) {
    if !src.is_dir() || dest.exists() {
        return;
    }

    info!("CONFIG: migrating {} to {}", src.display(), dest.display());
    if let Err(e) = copy_dir(src, dest) {
        warn!("CONFIG: migration failed: {}", e);
        return;
    }
    if let Err(e) = fs::remove_dir_all(src) {
        warn!("CONFIG: could not remove {}: {}", src.display(), e);
    }
}

fn copy_dir(src: &Path, dest: &Path) -> io::Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}

/// Create the configuration directory and a starter document if needed
///
/// An existing non-empty file is never touched.
pub fn ensure_default_config() -> Result<PathBuf, ConfigError> {
    let path = config_path()?;
    ensure_config_at(&path)?;
    Ok(path)
}

/// Write the starter document to `path` when it is missing or empty
pub fn ensure_config_at(path: &Path) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(io_err)?;
    }

    let is_empty = match fs::metadata(path) {
        Ok(meta) => meta.len() == 0,
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(e) => return Err(io_err(e)),
    };

    if is_empty {
        info!("CONFIG: writing default configuration to {}", path.display());
        fs::write(path, DEFAULT_CONFIG).map_err(io_err)?;
    }
    Ok(())
}

/// Read and parse the configuration document at `path`
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ConfigError::Missing {
                path: path.to_path_buf(),
            })
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    toml::from_str(&content).map_err(|source| ConfigError::Syntax {
        path: path.to_path_buf(),
        source,
    })
}

/// Starter document written by `ensure_default_config`
pub const DEFAULT_CONFIG: &str = r#"log_level = "info"
log_file = "/dev/null"
refresh_interval = 300
fetch_timeout = 2

[grid]
columns = [40, 40]
rows = [13, 13, 4]

[colors.border]
focusable = "darkslateblue"
focused = "orange"
normal = "gray"

[colors.rows]
even = "lightblue"
odd = "white"

[colors.highlight]
fore = "black"
back = "orange"

[widgets.config]
kind = "textfile"
enabled = true
position = { top = 0, left = 0, height = 2, width = 1 }
refresh_interval = 30
file_path = "~/.config/griddash/config.toml"

[widgets.uptime]
kind = "cmdrunner"
enabled = true
position = { top = 0, left = 1, height = 1, width = 1 }
refresh_interval = 15
cmd = "uptime"
args = []

[widgets.security]
kind = "hibp"
enabled = false
position = { top = 1, left = 1, height = 1, width = 1 }
refresh_interval = 3600
accounts = ["you@example.com"]

[widgets.disk]
kind = "cmdrunner"
enabled = true
position = { top = 2, left = 0, height = 1, width = 2 }
refresh_interval = 60
cmd = "df"
args = ["-h", "/"]
"#;
