use std::{fs, path::PathBuf};

use common::config::MergeConfig;
use common::device::{Cid, ConnectionRegistry, DeviceId, DeviceSelector, PeerConnection, PeerStatus};
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "mergefs";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DATA_DIR_NAME: &str = "data";
pub const LOG_DIR_NAME: &str = "logs";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeerConfig {
    /// Numeric device id, never 0
    pub id: u64,
    /// Content id naming the peer's subtree. Derived from `id` when unset.
    #[serde(default)]
    pub cid: Option<Cid>,
    #[serde(default = "default_online")]
    pub online: bool,
}

fn default_online() -> bool {
    true
}

impl PeerConfig {
    pub fn cid(&self) -> Cid {
        self.cid
            .clone()
            .unwrap_or_else(|| Cid::from_device(DeviceId(self.id)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Directory holding `device_view/` (defaults to ~/.mergefs/data)
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Default log filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Also write daily-rolled logs under ~/.mergefs/logs
    #[serde(default)]
    pub log_to_file: bool,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub peers: Vec<PeerConfig>,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            log_level: default_log_level(),
            log_to_file: false,
            merge: MergeConfig::default(),
            peers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the mergefs directory (~/.mergefs)
    pub mergefs_dir: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Root of the backing store
    pub data_path: PathBuf,
    /// Path to the rolling log directory
    pub log_dir: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the mergefs directory path (custom or default ~/.mergefs)
    pub fn mergefs_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }
        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Initialize a new state directory with an empty local device
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let mergefs_dir = Self::mergefs_dir(custom_path)?;
        if mergefs_dir.exists() {
            return Err(StateError::AlreadyInitialized);
        }
        fs::create_dir_all(&mergefs_dir)?;

        let config = config.unwrap_or_default();
        config
            .merge
            .validate()
            .map_err(|e| StateError::InvalidConfig(e.to_string()))?;
        let state = Self::from_parts(mergefs_dir, config);

        fs::create_dir_all(state.device_root(&DeviceSelector::Local))?;
        for peer in &state.config.peers {
            fs::create_dir_all(state.device_root(&DeviceSelector::Remote(peer.cid())))?;
        }
        state.save()?;
        Ok(state)
    }

    /// Load existing state from the mergefs directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let mergefs_dir = Self::mergefs_dir(custom_path)?;
        if !mergefs_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let config_path = mergefs_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }
        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;
        config
            .merge
            .validate()
            .map_err(|e| StateError::InvalidConfig(e.to_string()))?;

        let state = Self::from_parts(mergefs_dir, config);
        if !state.data_path.exists() {
            return Err(StateError::MissingFile(state.data_path.display().to_string()));
        }
        Ok(state)
    }

    fn from_parts(mergefs_dir: PathBuf, config: AppConfig) -> Self {
        let data_path = config
            .data_dir
            .clone()
            .unwrap_or_else(|| mergefs_dir.join(DATA_DIR_NAME));
        Self {
            config_path: mergefs_dir.join(CONFIG_FILE_NAME),
            log_dir: mergefs_dir.join(LOG_DIR_NAME),
            data_path,
            mergefs_dir,
            config,
        }
    }

    /// Write the current config back to disk
    pub fn save(&self) -> Result<(), StateError> {
        let config_toml = toml::to_string_pretty(&self.config)?;
        fs::write(&self.config_path, config_toml)?;
        Ok(())
    }

    /// On-disk root of one device's subtree
    pub fn device_root(&self, selector: &DeviceSelector) -> PathBuf {
        self.data_path.join(selector.root())
    }

    /// Register a peer and create its subtree root
    pub fn add_peer(&mut self, peer: PeerConfig) -> Result<(), StateError> {
        if peer.id == DeviceId::LOCAL.0 {
            return Err(StateError::InvalidPeer("device id 0 is the local device".into()));
        }
        if self.config.peers.iter().any(|p| p.id == peer.id) {
            return Err(StateError::InvalidPeer(format!("device {} already exists", peer.id)));
        }
        fs::create_dir_all(self.device_root(&DeviceSelector::Remote(peer.cid())))?;
        self.config.peers.push(peer);
        self.save()
    }

    /// Forget a peer. Its subtree is left on disk.
    pub fn remove_peer(&mut self, id: u64) -> Result<PeerConfig, StateError> {
        let idx = self
            .config
            .peers
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| StateError::InvalidPeer(format!("unknown device {}", id)))?;
        let peer = self.config.peers.remove(idx);
        self.save()?;
        Ok(peer)
    }

    pub fn set_peer_online(&mut self, id: u64, online: bool) -> Result<(), StateError> {
        let peer = self
            .config
            .peers
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StateError::InvalidPeer(format!("unknown device {}", id)))?;
        peer.online = online;
        self.save()
    }

    /// Connection registry built from the configured peers
    pub fn registry(&self) -> Result<ConnectionRegistry, StateError> {
        let registry = ConnectionRegistry::new();
        for peer in &self.config.peers {
            let device = DeviceId(peer.id);
            registry
                .add(PeerConnection::new(device, peer.cid()))
                .map_err(|e| StateError::InvalidPeer(e.to_string()))?;
            if !peer.online {
                registry
                    .set_status(device, PeerStatus::Offline)
                    .map_err(|e| StateError::InvalidPeer(e.to_string()))?;
            }
        }
        Ok(registry)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("mergefs directory not initialized. Run 'mergefs init' first")]
    NotInitialized,

    #[error("mergefs directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid peer: {0}")]
    InvalidPeer(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("state");
        let state = AppState::init(Some(root.clone()), None).unwrap();
        assert!(state.device_root(&DeviceSelector::Local).is_dir());
        assert!(state.config_path.is_file());

        let loaded = AppState::load(Some(root)).unwrap();
        assert_eq!(loaded.config, state.config);
        assert_eq!(loaded.data_path, state.data_path);
    }

    #[test]
    fn test_init_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("state");
        AppState::init(Some(root.clone()), None).unwrap();
        assert!(matches!(
            AppState::init(Some(root), None),
            Err(StateError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_load_uninitialized() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            AppState::load(Some(dir.path().join("missing"))),
            Err(StateError::NotInitialized)
        ));
    }

    #[test]
    fn test_peers_roundtrip_through_config() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("state");
        let mut state = AppState::init(Some(root.clone()), None).unwrap();
        state
            .add_peer(PeerConfig {
                id: 7,
                cid: None,
                online: true,
            })
            .unwrap();
        state.set_peer_online(7, false).unwrap();
        assert!(state
            .device_root(&DeviceSelector::Remote(Cid::from_device(DeviceId(7))))
            .is_dir());

        let loaded = AppState::load(Some(root)).unwrap();
        assert_eq!(loaded.config.peers.len(), 1);
        let registry = loaded.registry().unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.online().is_empty());
    }

    #[test]
    fn test_local_device_id_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = AppState::init(Some(dir.path().join("state")), None).unwrap();
        let err = state
            .add_peer(PeerConfig {
                id: 0,
                cid: None,
                online: true,
            })
            .unwrap_err();
        assert!(matches!(err, StateError::InvalidPeer(_)));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [merge]
            lookup_workers = 2

            [[peers]]
            id = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.merge.lookup_workers, 2);
        assert_eq!(config.log_level, "warn");
        assert!(config.peers[0].online);
        assert_eq!(config.peers[0].cid(), Cid::from_device(DeviceId(3)));
    }
}
