use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use core_types::{DEFAULT_DOCUMENT_EXTENSIONS, DEMO_KNOWLEDGE_BASES, DEMO_REPLIES, UiLanguage};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const CURRENT_SCHEMA_VERSION: u32 = 2;
pub const SERVICE_URL_ENV: &str = "KBDESK_SERVICE_URL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    pub base_url: String,
    /// Unset means requests may wait indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout_ms: None,
        }
    }
}

impl ServiceConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FallbackConfig {
    #[serde(default = "default_settling_delay_ms")]
    pub settling_delay_ms: u64,
    #[serde(default = "default_fallback_knowledge_bases")]
    pub knowledge_bases: Vec<String>,
    #[serde(default = "default_fallback_replies")]
    pub replies: Vec<String>,
}

const fn default_settling_delay_ms() -> u64 {
    600
}

fn default_fallback_knowledge_bases() -> Vec<String> {
    DEMO_KNOWLEDGE_BASES.iter().map(|s| s.to_string()).collect()
}

fn default_fallback_replies() -> Vec<String> {
    DEMO_REPLIES.iter().map(|s| s.to_string()).collect()
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            settling_delay_ms: default_settling_delay_ms(),
            knowledge_bases: default_fallback_knowledge_bases(),
            replies: default_fallback_replies(),
        }
    }
}

impl FallbackConfig {
    /// Refills pools left empty by hand edits.
    fn backfill(&mut self) {
        if self.knowledge_bases.is_empty() {
            self.knowledge_bases = default_fallback_knowledge_bases();
        }
        if self.replies.is_empty() {
            self.replies = default_fallback_replies();
        }
    }

    pub fn settling_delay(&self) -> Duration {
        Duration::from_millis(self.settling_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadConfig {
    #[serde(default)]
    pub accepted_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            accepted_extensions: DEFAULT_DOCUMENT_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub schema_version: u32,
    pub language: UiLanguage,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            language: UiLanguage::EnUs,
            service: ServiceConfig::default(),
            fallback: FallbackConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

impl AppConfig {
    /// Applies `KBDESK_SERVICE_URL` when set and non-blank.
    pub fn apply_env_overrides(&mut self) {
        self.apply_service_url(std::env::var(SERVICE_URL_ENV).ok());
    }

    fn apply_service_url(&mut self, value: Option<String>) {
        if let Some(url) = value.map(|url| url.trim().to_string())
            && !url.is_empty()
        {
            info!(%url, "service url overridden from environment");
            self.service.base_url = url;
        }
    }
}

pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            path: dir.into().join("config.json"),
        }
    }

    pub fn from_default_location() -> Result<Self> {
        let mut dir = dirs::config_dir().context("failed to resolve config_dir")?;
        dir.push("kbdesk");
        Ok(Self::from_dir(dir))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        if !self.path.exists() {
            let config = AppConfig::default();
            self.save(&config)?;
            return Ok(config);
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let mut config: AppConfig =
            serde_json::from_str(&raw).context("failed to parse app config json")?;
        self.migrate(&mut config);
        config.fallback.backfill();
        self.save(&config)?;
        Ok(config)
    }

    pub fn save(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let text = serde_json::to_string_pretty(config).context("failed to serialize config")?;
        fs::write(&self.path, text)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }

    fn migrate(&self, config: &mut AppConfig) {
        if config.schema_version >= CURRENT_SCHEMA_VERSION {
            return;
        }

        warn!(
            from = config.schema_version,
            to = CURRENT_SCHEMA_VERSION,
            "migrating app config schema"
        );
        config.schema_version = CURRENT_SCHEMA_VERSION;
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn creates_default_config_when_missing() {
        let dir = tempdir().expect("tempdir");
        let store = ConfigStore::from_dir(dir.path());
        let config = store.load_or_init().expect("load default");
        assert_eq!(config.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(config.fallback.knowledge_bases.len(), 2);
        assert_eq!(config.service.request_timeout(), None);
        assert!(store.path().exists());
    }

    #[test]
    fn migrates_old_schema_and_backfills_fallbacks() {
        let dir = tempdir().expect("tempdir");
        let store = ConfigStore::from_dir(dir.path());
        fs::write(
            store.path(),
            r#"{
                "schema_version": 1,
                "language": "zh_cn",
                "service": {"base_url": "http://rag.internal:9000", "request_timeout_ms": 1500},
                "fallback": {"knowledge_bases": [], "replies": []}
            }"#,
        )
        .expect("write legacy config");

        let config = store.load_or_init().expect("load legacy");
        assert_eq!(config.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(config.language, UiLanguage::ZhCn);
        assert_eq!(config.service.base_url, "http://rag.internal:9000");
        assert_eq!(
            config.service.request_timeout(),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(config.fallback.settling_delay_ms, 600);
        assert_eq!(config.fallback.replies.len(), DEMO_REPLIES.len());
        assert_eq!(config.upload, UploadConfig::default());

        let reloaded = store.load_or_init().expect("reload");
        assert_eq!(reloaded, config);
    }

    #[test]
    fn current_schema_keeps_fallback_pools_populated() {
        let dir = tempdir().expect("tempdir");
        let store = ConfigStore::from_dir(dir.path());
        fs::write(
            store.path(),
            r#"{
                "schema_version": 2,
                "language": "en_us",
                "fallback": {"settling_delay_ms": 0, "knowledge_bases": [], "replies": []}
            }"#,
        )
        .expect("write edited config");

        let config = store.load_or_init().expect("load edited");
        assert_eq!(config.fallback.settling_delay_ms, 0);
        assert_eq!(config.fallback.knowledge_bases, DEMO_KNOWLEDGE_BASES.to_vec());
        assert_eq!(config.fallback.replies.len(), DEMO_REPLIES.len());
    }

    #[test]
    fn missing_fallback_pools_use_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{"schema_version": 2, "language": "en_us", "fallback": {"settling_delay_ms": 50}}"#,
        )
        .expect("parse partial config");
        assert_eq!(config.fallback.knowledge_bases, DEMO_KNOWLEDGE_BASES.to_vec());
        assert_eq!(config.fallback.replies.len(), DEMO_REPLIES.len());
    }

    #[test]
    fn service_url_override_ignores_blank_values() {
        let mut config = AppConfig::default();
        config.apply_service_url(Some("   ".to_string()));
        assert_eq!(config.service.base_url, "http://localhost:8000");

        config.apply_service_url(Some(" http://10.0.0.5:8000 ".to_string()));
        assert_eq!(config.service.base_url, "http://10.0.0.5:8000");
    }
}
