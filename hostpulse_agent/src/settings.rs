//! Settings file: a JSON `MonitorConfig` stored under the XDG config dir:
//! $XDG_CONFIG_HOME/hostpulse/config.json (fallback ~/.config/hostpulse/config.json)

use std::{
    fs,
    io,
    path::{Path, PathBuf},
};

use hostpulse::MonitorConfig;
use tracing::{debug, warn};

pub fn config_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg).join("hostpulse")
    } else {
        dirs_next::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hostpulse")
    }
}

pub fn settings_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Loads `path` (or the default location). A missing file yields defaults; a
/// malformed one is logged and ignored.
pub fn load_settings(path: Option<&Path>) -> MonitorConfig {
    let path = path.map(Path::to_path_buf).unwrap_or_else(settings_path);
    match fs::read_to_string(&path) {
        Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
            warn!("ignoring malformed settings file {}: {e}", path.display());
            MonitorConfig::default()
        }),
        Err(e) => {
            debug!("no settings file at {}: {e}", path.display());
            MonitorConfig::default()
        }
    }
}

pub fn save_settings(path: Option<&Path>, config: &MonitorConfig) -> io::Result<PathBuf> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(settings_path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_vec_pretty(config).map_err(io::Error::other)?;
    fs::write(&path, data)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostpulse::RankBy;

    #[test]
    fn round_trips_through_file() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("nested").join("config.json");
        let cfg = MonitorConfig {
            interval_ms: 2500,
            top_n: 7,
            rank_by: RankBy::Cpu,
        };
        save_settings(Some(&path), &cfg).unwrap();
        assert_eq!(load_settings(Some(&path)), cfg);
    }

    #[test]
    fn missing_or_malformed_file_gives_defaults() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("config.json");
        assert_eq!(load_settings(Some(&path)), MonitorConfig::default());
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_settings(Some(&path)), MonitorConfig::default());
    }
}
