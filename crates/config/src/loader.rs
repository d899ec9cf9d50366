use std::{
    path::{Path, PathBuf},
    sync::RwLock,
};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::EduliftConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "edulift.toml",
    "edulift.yaml",
    "edulift.yml",
    "edulift.json",
];

static CONFIG_DIR_OVERRIDE: RwLock<Option<PathBuf>> = RwLock::new(None);
static DATA_DIR_OVERRIDE: RwLock<Option<PathBuf>> = RwLock::new(None);

/// Override the config directory for the rest of the process.
pub fn set_config_dir(dir: PathBuf) {
    if let Ok(mut slot) = CONFIG_DIR_OVERRIDE.write() {
        *slot = Some(dir);
    }
}

/// Override the data directory for the rest of the process.
pub fn set_data_dir(dir: PathBuf) {
    if let Ok(mut slot) = DATA_DIR_OVERRIDE.write() {
        *slot = Some(dir);
    }
}

pub fn clear_data_dir() {
    if let Ok(mut slot) = DATA_DIR_OVERRIDE.write() {
        *slot = None;
    }
}

/// Returns the config directory.
///
/// Resolution order:
/// 1. programmatic override (`set_config_dir`)
/// 2. `EDULIFT_CONFIG_DIR`
/// 3. `~/.config/edulift`
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = CONFIG_DIR_OVERRIDE.read().ok().and_then(|d| d.clone()) {
        return Some(dir);
    }
    if let Ok(dir) = std::env::var("EDULIFT_CONFIG_DIR")
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    directories::ProjectDirs::from("", "", "edulift").map(|d| d.config_dir().to_path_buf())
}

/// Returns the data directory (override, `EDULIFT_DATA_DIR`, then the
/// platform data dir, then `.edulift`).
pub fn data_dir() -> PathBuf {
    if let Some(dir) = DATA_DIR_OVERRIDE.read().ok().and_then(|d| d.clone()) {
        return dir;
    }
    if let Ok(dir) = std::env::var("EDULIFT_DATA_DIR")
        && !dir.is_empty()
    {
        return PathBuf::from(dir);
    }
    directories::ProjectDirs::from("", "", "edulift")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".edulift"))
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<EduliftConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply env overrides.
///
/// Search order:
/// 1. `./edulift.{toml,yaml,yml,json}` (project-local)
/// 2. `<config_dir>/edulift.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `EduliftConfig::default()` if no config file is found or it
/// fails to parse.
pub fn discover_and_load() -> EduliftConfig {
    let mut config = if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                EduliftConfig::default()
            },
        }
    } else {
        debug!("no config file found, using defaults");
        EduliftConfig::default()
    };
    apply_env_overrides(&mut config);
    config
}

/// Apply `EDULIFT_API_URL` and `EDULIFT_API_TIMEOUT_SECS` on top of a loaded config.
pub fn apply_env_overrides(config: &mut EduliftConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(config: &mut EduliftConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup("EDULIFT_API_URL").filter(|v| !v.trim().is_empty()) {
        debug!(base_url = %url, "api base url overridden from environment");
        config.api.base_url = url;
    }
    if let Some(raw) = lookup("EDULIFT_API_TIMEOUT_SECS") {
        match raw.trim().parse::<u64>() {
            Ok(secs) => config.api.timeout_secs = secs,
            Err(e) => warn!(value = %raw, error = %e, "ignoring invalid EDULIFT_API_TIMEOUT_SECS"),
        }
    }
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<EduliftConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edulift.toml");
        std::fs::write(
            &path,
            "[api]\nbase_url = \"https://api.edulift.lk\"\ntimeout_secs = 5\n",
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.api.base_url, "https://api.edulift.lk");
        assert_eq!(cfg.api.timeout_secs, 5);
    }

    #[test]
    fn loads_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edulift.yaml");
        std::fs::write(
            &path,
            "api:\n  refresh_path: /auth/token/refresh\n  expiry_marker:\n    field: code\n",
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.api.refresh_path, "/auth/token/refresh");
        assert_eq!(cfg.api.expiry_marker.field, "code");
        assert_eq!(cfg.api.expiry_marker.code, 42);
    }

    #[test]
    fn loads_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edulift.json");
        std::fs::write(&path, r#"{"session":{"path":"/var/lib/edulift/s.json"}}"#).unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(
            cfg.session.path.as_deref(),
            Some(Path::new("/var/lib/edulift/s.json"))
        );
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edulift.ini");
        std::fs::write(&path, "api=1").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = EduliftConfig::default();
        apply_env_overrides_with(&mut cfg, |name| match name {
            "EDULIFT_API_URL" => Some("https://staging.edulift.lk/api".into()),
            "EDULIFT_API_TIMEOUT_SECS" => Some("12".into()),
            _ => None,
        });
        assert_eq!(cfg.api.base_url, "https://staging.edulift.lk/api");
        assert_eq!(cfg.api.timeout_secs, 12);
    }

    #[test]
    fn invalid_timeout_override_is_ignored() {
        let mut cfg = EduliftConfig::default();
        apply_env_overrides_with(&mut cfg, |name| {
            (name == "EDULIFT_API_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert_eq!(cfg.api.timeout_secs, 30);
    }
}
