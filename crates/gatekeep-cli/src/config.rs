//! Configuration loading for the CLI.
//!
//! Lookup order for the config file:
//! 1. `--config <path>` (or `GATEKEEP_CONFIG`, resolved by clap)
//! 2. `./gatekeep.toml` if present
//!
//! With neither, built-in defaults apply.

use anyhow::Context;
use gatekeep_core::{GatekeepConfig, KeySource};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "gatekeep.toml";

/// Load configuration from the first source that exists.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<GatekeepConfig> {
    let path = explicit
        .map(Path::to_path_buf)
        .or_else(|| {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            default.exists().then_some(default)
        });

    match path {
        Some(path) => load_file(&path),
        None => {
            tracing::debug!("no config file found, using defaults");
            Ok(GatekeepConfig::default())
        }
    }
}

pub fn load_file(path: &Path) -> anyhow::Result<GatekeepConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: GatekeepConfig = toml::from_str(&raw)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Resolve a configured key to its base64 text, if configured at all.
///
/// An inline value wins over the environment. Either may name a file holding the
/// key instead of the key itself.
pub fn resolve_key(source: &KeySource) -> anyhow::Result<Option<String>> {
    let raw = match (&source.value, &source.env) {
        (Some(value), _) => Some(value.clone()),
        (None, Some(var)) => std::env::var(var).ok(),
        (None, None) => None,
    };
    raw.map(|value| read_key_text(&value)).transpose()
}

/// Treat `value` as a path when such a file exists, otherwise as the key itself.
pub fn read_key_text(value: &str) -> anyhow::Result<String> {
    let path = Path::new(value.trim());
    if path.is_file() {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read key file: {}", path.display()))?;
        return Ok(text.trim().to_string());
    }
    Ok(value.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_file_with_overrides() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gatekeep.toml");
        fs::write(
            &path,
            r#"
            [token]
            ttl_secs = 900

            [store]
            write_timeout_ms = 2500
            "#,
        )
        .unwrap();

        let config = load(Some(path.as_path())).unwrap();
        assert_eq!(config.token.ttl_secs, 900);
        assert_eq!(config.store.write_timeout_ms, 2500);
        assert_eq!(config.store.read_timeout_ms, 5000);
    }

    #[test]
    fn test_bad_toml_names_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[token\nttl_secs = ").unwrap();

        let err = load_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("broken.toml"));
    }

    #[test]
    fn test_resolve_inline_and_file_keys() {
        let inline = KeySource {
            value: Some("  AAAA  ".to_string()),
            env: Some("GATEKEEP_TEST_UNSET_VARIABLE".to_string()),
        };
        assert_eq!(resolve_key(&inline).unwrap().as_deref(), Some("AAAA"));

        let dir = tempdir().unwrap();
        let key_path = dir.path().join("public.key");
        fs::write(&key_path, "BBBB\n").unwrap();
        let from_file = KeySource {
            value: Some(key_path.display().to_string()),
            env: None,
        };
        assert_eq!(resolve_key(&from_file).unwrap().as_deref(), Some("BBBB"));

        let missing = KeySource::from_env("GATEKEEP_TEST_UNSET_VARIABLE");
        assert_eq!(resolve_key(&missing).unwrap(), None);
    }
}
