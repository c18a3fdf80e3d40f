use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Root application configuration, loaded from `~/.config/citeweave/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub core: CoreConfig,
    pub scopus: ScopusConfig,
    pub crossref: CrossRefConfig,
    pub merge: MergeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopusConfig {
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub inst_token_env: String,
    pub min_interval_ms: u64,
    pub max_retries: u32,
    pub page_size: u32,
    /// Keyword searching stops once the remaining quota is at or below this.
    pub search_quota_floor: u32,
    pub citing_quota_floor: u32,
    pub references_quota_floor: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossRefConfig {
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polite_email: Option<String>,
    pub min_interval_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Fixed seed for the candidate shuffle; random when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for CoreConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("citeweave");

        Self {
            data_dir: data_dir.to_string_lossy().to_string(),
        }
    }
}

impl Default for ScopusConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.elsevier.com".to_string(),
            api_key_env: "SCOPUS_API_KEY".to_string(),
            inst_token_env: "SCOPUS_INST_TOKEN".to_string(),
            min_interval_ms: 150,
            max_retries: 3,
            page_size: 25,
            search_quota_floor: 50,
            citing_quota_floor: 10,
            references_quota_floor: 10,
        }
    }
}

impl Default for CrossRefConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.crossref.org".to_string(),
            polite_email: None,
            min_interval_ms: 100,
        }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/citeweave/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("CITEWEAVE_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("citeweave")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn set_data_dir(&mut self, dir: PathBuf) {
        self.core.data_dir = dir.to_string_lossy().to_string();
    }

    // ─── Derived paths ─────────────────────────────────────

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.core.data_dir)
    }

    /// Path to the SQLite record store.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join("citeweave.db")
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.data_dir().join("checkpoint.json")
    }

    /// Keyword vocabulary, one `keyword : TAG` pair per line.
    pub fn vocabulary_path(&self) -> PathBuf {
        self.data_dir().join("keywords.txt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.scopus.search_quota_floor, 50);
        assert_eq!(cfg.scopus.citing_quota_floor, 10);
        assert_eq!(cfg.scopus.api_key_env, "SCOPUS_API_KEY");
        assert!(!cfg.core.data_dir.is_empty());
        assert_eq!(cfg.merge.seed, None);
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut cfg = AppConfig::default();
        cfg.merge.seed = Some(7);
        cfg.crossref.polite_email = Some("ops@example.org".to_string());
        cfg.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.merge.seed, Some(7));
        assert_eq!(loaded.crossref.polite_email.as_deref(), Some("ops@example.org"));
        assert_eq!(loaded.scopus.base_url, cfg.scopus.base_url);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[scopus]\nsearch_quota_floor = 200\n").unwrap();

        let cfg = AppConfig::load_from(&path).unwrap();
        assert_eq!(cfg.scopus.search_quota_floor, 200);
        assert_eq!(cfg.scopus.citing_quota_floor, 10);
        assert_eq!(cfg.crossref.base_url, "https://api.crossref.org");
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let cfg = AppConfig::load_from(Path::new("/tmp/nonexistent_citeweave_config.toml")).unwrap();
        assert_eq!(cfg.scopus.page_size, 25);
    }

    #[test]
    fn test_derived_paths() {
        let mut cfg = AppConfig::default();
        cfg.set_data_dir(PathBuf::from("/srv/cw"));
        assert_eq!(cfg.database_path(), PathBuf::from("/srv/cw/citeweave.db"));
        assert_eq!(cfg.checkpoint_path(), PathBuf::from("/srv/cw/checkpoint.json"));
        assert_eq!(cfg.vocabulary_path(), PathBuf::from("/srv/cw/keywords.txt"));
    }
}
