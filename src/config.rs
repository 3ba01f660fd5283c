use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  /// Override for the data directory (ledger.db, shell.db, lock.json).
  #[serde(default)]
  pub data_dir: Option<PathBuf>,
  /// Offline shell mirror settings. Shell commands require this section.
  #[serde(default)]
  pub shell: Option<ShellConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShellConfig {
  /// Origin the shell is deployed at, e.g. "https://ledger.example/".
  pub base_url: String,
  /// Current cache generation tag. Bumping it forces a full shell refresh.
  pub generation: String,
  /// Fixed asset manifest cached verbatim on install.
  #[serde(default = "default_manifest")]
  pub manifest: Vec<String>,
  /// Bound on network attempts before the cache fallback kicks in.
  #[serde(default = "default_network_timeout_secs")]
  pub network_timeout_secs: u64,
}

fn default_manifest() -> Vec<String> {
  [
    "/",
    "/index.html",
    "/styles.css",
    "/app.js",
    "/manifest.webmanifest",
    "/sw.js",
  ]
  .map(String::from)
  .to_vec()
}

fn default_network_timeout_secs() -> u64 {
  10
}

impl ShellConfig {
  pub fn base_url(&self) -> Result<Url> {
    self
      .base_url
      .parse()
      .map_err(|e| eyre!("Invalid shell base_url {}: {}", self.base_url, e))
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./slotbook.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/slotbook/config.yaml
  ///
  /// The ledger works with zero setup, so a missing file yields defaults.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("slotbook.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("slotbook").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Resolved data directory: explicit override or the platform default.
  pub fn data_dir(&self) -> Result<PathBuf> {
    if let Some(dir) = &self.data_dir {
      return Ok(dir.clone());
    }

    dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .map(|p| p.join("slotbook"))
      .ok_or_else(|| eyre!("Could not determine data directory"))
  }

  pub fn ledger_db_path(&self) -> Result<PathBuf> {
    Ok(self.data_dir()?.join("ledger.db"))
  }

  pub fn shell_db_path(&self) -> Result<PathBuf> {
    Ok(self.data_dir()?.join("shell.db"))
  }

  pub fn lock_state_path(&self) -> Result<PathBuf> {
    Ok(self.data_dir()?.join("lock.json"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_full_config() {
    let yaml = r#"
data_dir: /tmp/slotbook-test
shell:
  base_url: "https://ledger.example/"
  generation: "v10"
  manifest: ["/", "/app.js"]
  network_timeout_secs: 3
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(config.data_dir.as_deref(), Some(Path::new("/tmp/slotbook-test")));

    let shell = config.shell.unwrap();
    assert_eq!(shell.generation, "v10");
    assert_eq!(shell.manifest, vec!["/", "/app.js"]);
    assert_eq!(shell.network_timeout_secs, 3);
    assert_eq!(shell.base_url().unwrap().origin().ascii_serialization(), "https://ledger.example");
  }

  #[test]
  fn test_shell_defaults() {
    let yaml = r#"
shell:
  base_url: "https://ledger.example/"
  generation: "v1"
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    let shell = config.shell.unwrap();
    assert_eq!(shell.network_timeout_secs, 10);
    assert!(shell.manifest.contains(&"/index.html".to_string()));
    assert!(shell.manifest.contains(&"/sw.js".to_string()));
  }

  #[test]
  fn test_empty_config_defaults() {
    let config: Config = serde_yaml::from_str("{}").unwrap();
    assert!(config.shell.is_none());
    assert!(config.data_dir.is_none());
  }
}
