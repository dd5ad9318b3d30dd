//! Configuration file handling
//!
//! One JSON file next to the executable, matching how the tool deploys:
//! drop the binary and its config in a directory together. Relative paths
//! in the file resolve against that directory, and every value is passed
//! explicitly into the component that needs it.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Name of the configuration file
const CONFIG_NAME: &str = "onetime.json";

/// Server and store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Token store snapshot
    pub token_db: PathBuf,
    /// Serve-mode log destination; empty keeps logs on stderr
    pub log_file: PathBuf,
    /// Public URL prefix the printed links start with
    pub base_addr: String,
    /// Address the server binds, `host:port`
    pub listen: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token_db: PathBuf::from("token.db"),
            log_file: PathBuf::from("onetime.log"),
            base_addr: "http://localhost:2500".to_string(),
            listen: "127.0.0.1:2500".to_string(),
        }
    }
}

impl Config {
    /// Default location: next to the executable
    pub fn default_path() -> Result<PathBuf> {
        let exe = std::env::current_exe().context("cannot locate the running executable")?;
        let dir = exe.parent().unwrap_or_else(|| Path::new("."));
        Ok(dir.join(CONFIG_NAME))
    }

    /// Load and validate, resolving relative paths against the config dir
    pub fn load(path: &Path) -> Result<Config> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let mut config: Config = serde_json::from_str(&raw)
            .with_context(|| format!("cannot parse {}", path.display()))?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        config.token_db = resolve(dir, &config.token_db);
        if !config.log_file.as_os_str().is_empty() {
            config.log_file = resolve(dir, &config.log_file);
        }

        config.validate()?;
        Ok(config)
    }

    /// Write the default config. Refuses to clobber an existing file so a
    /// stray `config` run cannot wipe a tuned setup.
    pub fn write_default(path: &Path) -> Result<()> {
        use std::io::Write;

        let json = serde_json::to_string_pretty(&Config::default())
            .context("cannot serialize default config")?;
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .with_context(|| format!("cannot create {}", path.display()))?;
        file.write_all(json.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .with_context(|| format!("cannot write {}", path.display()))?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.token_db.as_os_str().is_empty() {
            bail!("token_db must not be empty");
        }
        if !self.base_addr.starts_with("http://") && !self.base_addr.starts_with("https://") {
            bail!(
                "base_addr must start with http:// or https://, got {:?}",
                self.base_addr
            );
        }
        if self.listen.is_empty() || !self.listen.contains(':') {
            bail!("listen must be host:port, got {:?}", self.listen);
        }
        Ok(())
    }

    /// The log file, unless logging stays on stderr
    pub fn log_destination(&self) -> Option<&Path> {
        if self.log_file.as_os_str().is_empty() {
            None
        } else {
            Some(&self.log_file)
        }
    }

    /// Base address without a trailing slash, ready to append a token to
    pub fn link_base(&self) -> &str {
        self.base_addr.trim_end_matches('/')
    }
}

fn resolve(dir: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        dir.join(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join(CONFIG_NAME);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_write_default_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_NAME);

        Config::write_default(&path).unwrap();
        let config = Config::load(&path).unwrap();

        assert_eq!(config.token_db, dir.path().join("token.db"));
        assert_eq!(config.log_file, dir.path().join("onetime.log"));
        assert_eq!(config.base_addr, "http://localhost:2500");
        assert_eq!(config.listen, "127.0.0.1:2500");
    }

    #[test]
    fn test_write_default_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "{}");
        assert!(Config::write_default(&path).is_err());
        // The existing file is untouched
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn test_absolute_paths_stay_absolute() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"{"token_db": "/var/lib/onetime/token.db", "log_file": ""}"#,
        );
        let config = Config::load(&path).unwrap();
        assert_eq!(config.token_db, PathBuf::from("/var/lib/onetime/token.db"));
        assert_eq!(config.log_destination(), None);
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, r#"{"base_addr": "https://files.example.org"}"#);
        let config = Config::load(&path).unwrap();
        assert_eq!(config.base_addr, "https://files.example.org");
        assert_eq!(config.token_db, dir.path().join("token.db"));
    }

    #[test]
    fn test_rejects_bad_values() {
        let dir = TempDir::new().unwrap();

        let path = write_config(&dir, r#"{"base_addr": "files.example.org"}"#);
        assert!(Config::load(&path).is_err());

        let path = write_config(&dir, r#"{"listen": "2500"}"#);
        assert!(Config::load(&path).is_err());

        let path = write_config(&dir, r#"{"token_db": ""}"#);
        assert!(Config::load(&path).is_err());

        let path = write_config(&dir, "not json at all");
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_link_base_strips_trailing_slash() {
        let config = Config {
            base_addr: "https://files.example.org/".to_string(),
            ..Config::default()
        };
        assert_eq!(config.link_base(), "https://files.example.org");
    }
}
