//! User configuration.
//!
//! Configuration is stored as TOML in `~/.vola.toml`:
//!
//! ```toml
//! [vola]
//! user = "someone"
//! attempts = 3
//!
//! [aliases]
//! home = "BEEPi"
//!
//! [room_passwords]
//! BEEPi = "sesame"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Name of the config file in the home directory.
pub const CONFIG_FILE: &str = ".vola.toml";

/// Defaults for command line flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolaSection {
    pub user: Option<String>,
    pub passwd: Option<String>,
    pub attempts: Option<u32>,
    /// Verify checksums after upload.
    pub checksum: Option<bool>,
    pub sort: Option<String>,
    pub prefix: Option<String>,
    pub delete_after: Option<bool>,
    pub block_size: Option<usize>,
    pub spam: Option<bool>,
    /// File with one nickname per line.
    pub nicks: Option<PathBuf>,
    /// Root of the spool directory rooms are delivered into.
    pub spool: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub vola: VolaSection,
    /// Room alias to room id.
    pub aliases: HashMap<String, String>,
    /// Room id to room password.
    pub room_passwords: HashMap<String, String>,
}

impl Config {
    /// Loads configuration from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file");
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Resolves a room alias, ignoring case. Unknown names are room ids.
    pub fn resolve_room(&self, room: &str) -> String {
        self.aliases
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(room))
            .map(|(_, id)| id.clone())
            .unwrap_or_else(|| room.to_string())
    }

    /// Password configured for a room id.
    pub fn room_password(&self, room: &str) -> Option<String> {
        self.room_passwords.get(room).cloned()
    }
}

/// Returns the default config file path.
pub fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_FILE)
}

/// Returns the default spool root.
pub fn default_spool() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("volaupload")
        .join("spool")
}
