use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub store: StoreConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub list: ListConfig,
  #[serde(default)]
  pub report: ReportConfig,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
  /// Bearer token from STOCKROOM_API_TOKEN or SHOP_API_TOKEN
  #[default]
  Bearer,
  /// No Authorization header (local development backends)
  None,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
  /// Base URL of the shop API, e.g. https://shop.example.com/api
  pub url: String,
  #[serde(default)]
  pub auth_type: AuthType,
  /// Per-request timeout in seconds
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// How long a fetched collection is served without refetching
  #[serde(default = "default_ttl_secs")]
  pub ttl_secs: u64,
  /// Keep snapshots in a local SQLite file between runs
  #[serde(default = "default_true")]
  pub persist: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      ttl_secs: default_ttl_secs(),
      persist: true,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListConfig {
  #[serde(default = "default_page_size")]
  pub page_size: usize,
}

impl Default for ListConfig {
  fn default() -> Self {
    Self {
      page_size: default_page_size(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
  /// Number of best-selling parts shown in the report
  #[serde(default = "default_top_parts")]
  pub top_parts: usize,
}

impl Default for ReportConfig {
  fn default() -> Self {
    Self {
      top_parts: default_top_parts(),
    }
  }
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_ttl_secs() -> u64 {
  180
}

fn default_page_size() -> usize {
  20
}

fn default_top_parts() -> usize {
  5
}

fn default_true() -> bool {
  true
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./stockroom.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/stockroom/config.yaml
  /// 4. ~/.config/stockroom/config.yaml
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
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/stockroom/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("stockroom.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("stockroom").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml_str(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))?;
    if config.store.url.trim().is_empty() {
      return Err(eyre!("store.url must not be empty"));
    }
    Ok(config)
  }

  /// Snapshot time-to-live as a chrono duration, capped at the largest
  /// duration chrono can represent in whole seconds.
  pub fn ttl(&self) -> chrono::Duration {
    let max_secs = (i64::MAX / 1000) as u64;
    chrono::Duration::seconds(self.cache.ttl_secs.min(max_secs) as i64)
  }

  /// Get the shop API token from environment variables.
  ///
  /// Checks STOCKROOM_API_TOKEN first, then SHOP_API_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("STOCKROOM_API_TOKEN")
      .or_else(|_| std::env::var("SHOP_API_TOKEN"))
      .map_err(|_| {
        eyre!("API token not found. Set STOCKROOM_API_TOKEN or SHOP_API_TOKEN environment variable.")
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_gets_defaults() {
    let config = Config::from_yaml_str("store:\n  url: https://shop.example.com/api\n").unwrap();

    assert_eq!(config.store.auth_type, AuthType::Bearer);
    assert_eq!(config.store.timeout_secs, 30);
    assert_eq!(config.cache.ttl_secs, 180);
    assert!(config.cache.persist);
    assert_eq!(config.list.page_size, 20);
    assert_eq!(config.report.top_parts, 5);
    assert_eq!(config.ttl(), chrono::Duration::minutes(3));
  }

  #[test]
  fn test_full_config() {
    let yaml = r#"
store:
  url: http://localhost:8080
  auth_type: none
  timeout_secs: 5
cache:
  ttl_secs: 60
  persist: false
list:
  page_size: 50
report:
  top_parts: 10
"#;
    let config = Config::from_yaml_str(yaml).unwrap();

    assert_eq!(config.store.auth_type, AuthType::None);
    assert_eq!(config.store.timeout_secs, 5);
    assert_eq!(config.cache.ttl_secs, 60);
    assert!(!config.cache.persist);
    assert_eq!(config.list.page_size, 50);
    assert_eq!(config.report.top_parts, 10);
  }

  #[test]
  fn test_partial_section_keeps_other_defaults() {
    let yaml = "store:\n  url: http://localhost\ncache:\n  persist: false\n";
    let config = Config::from_yaml_str(yaml).unwrap();
    assert_eq!(config.cache.ttl_secs, 180);
    assert!(!config.cache.persist);
  }

  #[test]
  fn test_huge_ttl_is_capped() {
    let yaml = "store:\n  url: http://localhost\ncache:\n  ttl_secs: 18446744073709551615\n";
    let config = Config::from_yaml_str(yaml).unwrap();
    assert_eq!(config.ttl(), chrono::Duration::seconds(i64::MAX / 1000));
    assert!(config.ttl() > chrono::Duration::days(365 * 1000));
  }

  #[test]
  fn test_missing_or_empty_url_is_rejected() {
    assert!(Config::from_yaml_str("cache:\n  ttl_secs: 10\n").is_err());
    assert!(Config::from_yaml_str("store:\n  url: \"  \"\n").is_err());
  }

  #[test]
  fn test_unknown_auth_type_is_rejected() {
    let yaml = "store:\n  url: http://localhost\n  auth_type: basic\n";
    assert!(Config::from_yaml_str(yaml).is_err());
  }

  #[test]
  fn test_load_explicit_missing_path() {
    let err = Config::load(Some(Path::new("/nonexistent/stockroom.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }
}
