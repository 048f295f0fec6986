//! Configuration handling for the loom controller.
//!
//! Settings are read from a YAML file, then overridden by environment variables,
//! then by command-line flags. A missing or unreadable file falls back to defaults.

use anyhow::{Context, Result};
use loom_session::{
    AccessPointLink, DisabledLink, NetworkLink, RuntimeConfig, StationLink, TransportKind,
};
use loom_storage::StorageMode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Default command channel address
const DEFAULT_COMMAND_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 5000);

/// Default bulk channel address on boards that have one
const DEFAULT_BULK_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 8080);

/// Controller board the firmware runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BoardVariant {
    /// Main controller board: stream transport, no network radio
    Mcb,
    /// Card controller board: stream transport, no network radio
    Ccb,
    /// Wireless board hosting its own access point
    CbleAp,
    /// Wireless board joining an existing network
    CbleIot,
}

impl BoardVariant {
    /// Command channel flavor
    pub fn transport(self) -> TransportKind {
        match self {
            BoardVariant::Mcb | BoardVariant::Ccb => TransportKind::Stream,
            BoardVariant::CbleAp | BoardVariant::CbleIot => TransportKind::Datagram,
        }
    }

    /// Whether the board serves a bulk channel
    pub fn has_bulk_channel(self) -> bool {
        matches!(self, BoardVariant::CbleAp | BoardVariant::CbleIot)
    }
}

impl fmt::Display for BoardVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BoardVariant::Mcb => "mcb",
            BoardVariant::Ccb => "ccb",
            BoardVariant::CbleAp => "cble-ap",
            BoardVariant::CbleIot => "cble-iot",
        })
    }
}

impl FromStr for BoardVariant {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mcb" => Ok(BoardVariant::Mcb),
            "ccb" => Ok(BoardVariant::Ccb),
            "cble-ap" => Ok(BoardVariant::CbleAp),
            "cble-iot" => Ok(BoardVariant::CbleIot),
            other => anyhow::bail!("unknown board variant {:?}", other),
        }
    }
}

/// Protocol options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Reply with 0x03 to unknown commands and 0x04 to rejected transfers
    pub explicit_errors: bool,
}

/// Loom controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoomConfig {
    /// Board variant
    pub board: BoardVariant,
    /// Command channel bind address
    pub command_addr: SocketAddr,
    /// Bulk channel bind address (ignored on boards without one)
    pub bulk_addr: SocketAddr,
    /// Pattern directory; patterns are kept in memory when unset
    pub data_dir: Option<PathBuf>,
    /// Simulated station association time, e.g. "3s"
    pub join_delay: Option<String>,
    /// Protocol options
    pub protocol: ProtocolConfig,
}

impl Default for LoomConfig {
    fn default() -> Self {
        Self {
            board: BoardVariant::CbleAp,
            command_addr: SocketAddr::from(DEFAULT_COMMAND_ADDR),
            bulk_addr: SocketAddr::from(DEFAULT_BULK_ADDR),
            data_dir: None,
            join_delay: None,
            protocol: ProtocolConfig::default(),
        }
    }
}

impl LoomConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let path = config_path.as_ref();
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str::<LoomConfig>(&content) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file {:?} ({}), using defaults", path, e);
                    Self::default()
                }
            },
            Err(_) => {
                warn!("Config file {:?} not found, using defaults", path);
                Self::default()
            }
        };

        config.apply_environment_overrides();
        config.join_delay()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_environment_overrides(&mut self) {
        if let Ok(board) = std::env::var("LOOM_BOARD") {
            match board.parse() {
                Ok(board) => {
                    self.board = board;
                    info!("Board overridden by environment: {}", self.board);
                }
                Err(e) => warn!("Ignoring LOOM_BOARD: {}", e),
            }
        }

        if let Ok(addr) = std::env::var("LOOM_COMMAND_ADDR") {
            match addr.parse() {
                Ok(addr) => {
                    self.command_addr = addr;
                    info!("Command address overridden by environment: {}", addr);
                }
                Err(e) => warn!("Ignoring LOOM_COMMAND_ADDR {:?}: {}", addr, e),
            }
        }

        if let Ok(addr) = std::env::var("LOOM_BULK_ADDR") {
            match addr.parse() {
                Ok(addr) => {
                    self.bulk_addr = addr;
                    info!("Bulk address overridden by environment: {}", addr);
                }
                Err(e) => warn!("Ignoring LOOM_BULK_ADDR {:?}: {}", addr, e),
            }
        }

        if let Ok(dir) = std::env::var("LOOM_DATA_DIR") {
            info!("Data directory overridden by environment: {}", dir);
            self.data_dir = Some(PathBuf::from(dir));
        }

        if let Ok(flag) = std::env::var("LOOM_EXPLICIT_ERRORS") {
            self.protocol.explicit_errors = matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes");
            info!(
                "Explicit error codes overridden by environment: {}",
                self.protocol.explicit_errors
            );
        }
    }

    /// Parsed station join delay
    pub fn join_delay(&self) -> Result<Option<Duration>> {
        self.join_delay
            .as_deref()
            .map(|text| {
                humantime::parse_duration(text)
                    .with_context(|| format!("invalid join_delay {:?}", text))
            })
            .transpose()
    }

    /// Channel layout for the runtime loop
    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            transport: self.board.transport(),
            command_addr: self.command_addr,
            bulk_addr: self.board.has_bulk_channel().then_some(self.bulk_addr),
        }
    }

    /// Pattern storage backend
    pub fn storage_mode(&self) -> StorageMode {
        match &self.data_dir {
            Some(data_dir) => StorageMode::Directory {
                data_dir: data_dir.clone(),
            },
            None => StorageMode::InMemory,
        }
    }

    /// Network link matching the board
    pub fn network_link(&self) -> Result<Box<dyn NetworkLink>> {
        Ok(match self.board {
            BoardVariant::Mcb | BoardVariant::Ccb => Box::new(DisabledLink),
            BoardVariant::CbleAp => Box::new(AccessPointLink),
            BoardVariant::CbleIot => Box::new(StationLink::new(self.join_delay()?)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_session::join_status;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = LoomConfig::default();
        assert_eq!(config.board, BoardVariant::CbleAp);
        assert_eq!(config.command_addr.port(), 5000);
        assert_eq!(config.bulk_addr.port(), 8080);
        assert!(!config.protocol.explicit_errors);
        assert!(matches!(config.storage_mode(), StorageMode::InMemory));
    }

    #[test]
    fn test_load_from_file() {
        let yaml_content = r#"
board: cble-iot
command_addr: 127.0.0.1:6000
data_dir: /var/lib/loom
join_delay: 2s
protocol:
  explicit_errors: true
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        let config = LoomConfig::load_from_file(temp_file.path()).unwrap();

        assert_eq!(config.board, BoardVariant::CbleIot);
        assert_eq!(config.command_addr, "127.0.0.1:6000".parse().unwrap());
        assert_eq!(config.bulk_addr.port(), 8080);
        assert_eq!(config.data_dir, Some(PathBuf::from("/var/lib/loom")));
        assert_eq!(config.join_delay().unwrap(), Some(Duration::from_secs(2)));
        assert!(config.protocol.explicit_errors);

        let link = config.network_link().unwrap();
        assert_eq!(link.join_status(), join_status::IDLE);
    }

    #[test]
    fn test_unparseable_file_uses_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"board: [not, a, board]").unwrap();

        let config = LoomConfig::load_from_file(temp_file.path()).unwrap();
        assert_eq!(config.board, BoardVariant::CbleAp);
    }

    #[test]
    fn test_invalid_join_delay_rejected() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"join_delay: soon\n").unwrap();

        assert!(LoomConfig::load_from_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_board_layouts() {
        let mut config = LoomConfig {
            board: BoardVariant::Mcb,
            ..LoomConfig::default()
        };
        let runtime = config.runtime_config();
        assert_eq!(runtime.transport, TransportKind::Stream);
        assert!(runtime.bulk_addr.is_none());
        assert_eq!(
            config.network_link().unwrap().join_status(),
            join_status::CONNECTED
        );

        config.board = BoardVariant::CbleAp;
        let runtime = config.runtime_config();
        assert_eq!(runtime.transport, TransportKind::Datagram);
        assert_eq!(runtime.bulk_addr.map(|a| a.port()), Some(8080));
        assert_eq!(
            config.network_link().unwrap().join_status(),
            join_status::CONNECTED
        );
    }

    #[test]
    fn test_board_names() {
        for board in [
            BoardVariant::Mcb,
            BoardVariant::Ccb,
            BoardVariant::CbleAp,
            BoardVariant::CbleIot,
        ] {
            assert_eq!(board.to_string().parse::<BoardVariant>().unwrap(), board);
        }
        assert!("cble".parse::<BoardVariant>().is_err());
    }
}
