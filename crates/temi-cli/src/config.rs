//! Bridge configuration – reads/writes `~/.temi-bridge/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

/// Persisted configuration stored in `~/.temi-bridge/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Interface the WebSocket transport binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// WebSocket port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Events buffered per subscriber before drops begin.
    #[serde(default = "default_stream_capacity")]
    pub stream_capacity: usize,

    /// Seconds between simulated battery updates; `0` disables them.
    #[serde(default = "default_battery_interval")]
    pub simulated_battery_interval_secs: u64,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8765
}
fn default_stream_capacity() -> usize {
    256
}
fn default_battery_interval() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            stream_capacity: default_stream_capacity(),
            simulated_battery_interval_secs: default_battery_interval(),
        }
    }
}

impl Config {
    /// The address the transport should listen on.
    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        let ip: IpAddr = self
            .bind_address
            .parse()
            .map_err(|e| format!("Invalid bind address '{}': {}", self.bind_address, e))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Return the path to `~/.temi-bridge/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".temi-bridge").join("config.toml")
}

/// Load the config, writing defaults on first run, then apply environment
/// overrides.
pub fn load_or_init() -> Result<Config, String> {
    let path = config_path();
    let mut cfg = match load_from(&path)? {
        Some(cfg) => cfg,
        None => {
            let cfg = Config::default();
            save_to(&cfg, &path)?;
            cfg
        }
    };
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Load the config from a specific path.  Returns `None` if the file does
/// not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `TEMI_BRIDGE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `TEMI_BRIDGE_BIND` | `bind_address` |
/// | `TEMI_BRIDGE_PORT` | `port` |
/// | `TEMI_BRIDGE_STREAM_CAPACITY` | `stream_capacity` |
///
/// Unparsable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("TEMI_BRIDGE_BIND") {
        cfg.bind_address = v;
    }
    if let Ok(v) = std::env::var("TEMI_BRIDGE_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.port = port;
    }
    if let Ok(v) = std::env::var("TEMI_BRIDGE_STREAM_CAPACITY")
        && let Ok(capacity) = v.parse::<usize>()
        && capacity > 0
    {
        cfg.stream_capacity = capacity;
    }
}

/// Save the config to a specific path, creating its directory if needed.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
