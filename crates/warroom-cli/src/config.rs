//! Configuration: optional `warroom.toml`, overlaid key by key with the
//! chain environment variable → secret store → file/default value → error.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use warroom_core::{WarroomError, WarroomResult};
use warroom_orchestrator::DriverConfig;

/// Environment variable naming the secret directory.
pub const SECRETS_DIR_ENV: &str = "WARROOM_SECRETS_DIR";

/// Secrets stored one per file, named after the secret.
#[derive(Debug, Clone)]
pub struct SecretStore {
    dir: PathBuf,
}

impl SecretStore {
    /// Store reading from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store named by `WARROOM_SECRETS_DIR`, if set.
    pub fn from_env() -> Option<Self> {
        std::env::var(SECRETS_DIR_ENV)
            .ok()
            .filter(|d| !d.trim().is_empty())
            .map(Self::new)
    }

    /// Value of secret `name`, trimmed. Missing or unreadable secrets are `None`.
    pub fn get(&self, name: &str) -> Option<String> {
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return None;
        }
        match std::fs::read_to_string(self.dir.join(name)) {
            Ok(value) => Some(value.trim().to_string()).filter(|v| !v.is_empty()),
            Err(e) => {
                debug!(secret = %name, error = %e, "Secret not found");
                None
            }
        }
    }
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolves one configuration key at a time.
pub struct ConfigLoader {
    env: EnvLookup,
    secrets: Option<SecretStore>,
}

impl ConfigLoader {
    /// Loader over the process environment and `WARROOM_SECRETS_DIR`.
    pub fn from_env() -> Self {
        Self {
            env: Box::new(|key| std::env::var(key).ok()),
            secrets: SecretStore::from_env(),
        }
    }

    /// Loader over a fixed environment.
    pub fn with_vars(vars: HashMap<String, String>, secrets: Option<SecretStore>) -> Self {
        Self {
            env: Box::new(move |key| vars.get(key).cloned()),
            secrets,
        }
    }

    /// Resolve `key`: environment, then `secret` in the secret store, then
    /// `default`. Empty values count as unset.
    pub fn get(
        &self,
        key: &str,
        default: Option<&str>,
        secret: Option<&str>,
    ) -> WarroomResult<String> {
        self.lookup(key, secret)
            .or_else(|| default.map(str::to_string))
            .ok_or_else(|| {
                WarroomError::Config(format!(
                    "Configuration missing for {key}. Checked environment and secrets."
                ))
            })
    }

    /// Resolve `key` without a default.
    pub fn lookup(&self, key: &str, secret: Option<&str>) -> Option<String> {
        if let Some(value) = (self.env)(key).filter(|v| !v.trim().is_empty()) {
            return Some(value);
        }
        let secret = secret?;
        let value = self.secrets.as_ref()?.get(secret)?;
        info!(key = %key, secret = %secret, "Loaded configuration from secret store");
        Some(value)
    }
}

/// Mock API server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MockApiConfig {
    /// Port `serve-mock` listens on.
    pub port: u16,
}

impl Default for MockApiConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// Contents of `warroom.toml`. Every section is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Root of the workspace, documents, database, drive and audit log.
    pub data_dir: PathBuf,
    /// Driver policy.
    pub driver: DriverConfig,
    /// Mock API settings.
    pub mock_api: MockApiConfig,
    /// Fallback values for the environment keys (e.g. `BIGQUERY_DATASET`).
    pub defaults: HashMap<String, String>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            driver: DriverConfig::default(),
            mock_api: MockApiConfig::default(),
            defaults: HashMap::new(),
        }
    }
}

impl FileConfig {
    /// Read `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> WarroomResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| {
            WarroomError::Config(format!("Invalid config file '{}': {e}", path.display()))
        })
    }
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Cloud project the assets belong to.
    pub project_id: String,
    /// Cloud region.
    pub region: String,
    /// Dataset the inventory tables are attached under.
    pub dataset: String,
    /// Legacy inventory table.
    pub table_inventory: String,
    /// Catalog table.
    pub table_catalog: String,
    /// Document collection name (a directory under `data_dir`).
    pub docs_bucket: String,
    /// Market API base URL.
    pub api_base_url: String,
    /// Remote report sink, if any.
    pub report_sink_url: Option<String>,
    /// Model the agents are labelled with.
    pub model_name: String,
    /// Driver policy after overrides.
    pub driver: DriverConfig,
    /// Root data directory.
    pub data_dir: PathBuf,
    /// Mock API port.
    pub mock_port: u16,
}

impl Settings {
    /// Resolve every key against `loader`, falling back to `file`.
    pub fn resolve(file: &FileConfig, loader: &ConfigLoader) -> WarroomResult<Self> {
        let fallback = |key: &str, default: &str| -> String {
            file.defaults
                .get(key)
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };
        let get = |key: &str, default: &str| loader.get(key, Some(&fallback(key, default)), None);

        let project_id = loader
            .lookup("GOOGLE_CLOUD_PROJECT", None)
            .or_else(|| loader.lookup("PROJECT_ID", None))
            .unwrap_or_else(|| fallback("GOOGLE_CLOUD_PROJECT", "warroom-local"));

        let mut driver = file.driver.clone();
        if let Some(raw) = loader.lookup("MAX_STEPS", None) {
            driver.max_steps = raw.trim().parse().map_err(|_| {
                WarroomError::Config(format!("MAX_STEPS must be a positive integer, got '{raw}'"))
            })?;
        }
        driver.validate()?;

        Ok(Self {
            region: get("GOOGLE_CLOUD_REGION", "us-central1")?,
            dataset: get("BIGQUERY_DATASET", "gpu_procurement_db")?,
            table_inventory: get("TABLE_INVENTORY", "LEGACY_INV_MAIN_V2")?,
            table_catalog: get("TABLE_CATALOG", "REF_CATALOG_DUMP")?,
            docs_bucket: get("DOCS_BUCKET", &format!("{project_id}-gpu-procurement-docs"))?,
            api_base_url: loader.get(
                "MOCK_API_URL",
                Some(&fallback("MOCK_API_URL", "http://localhost:8080")),
                Some("GPU_PROCUREMENT_API_URL"),
            )?,
            report_sink_url: loader
                .lookup("REPORT_SINK_URL", Some("REPORT_SINK_URL"))
                .or_else(|| file.defaults.get("REPORT_SINK_URL").cloned()),
            model_name: get("MODEL_NAME", "gemini-2.5-pro")?,
            project_id,
            driver,
            data_dir: file.data_dir.clone(),
            mock_port: file.mock_api.port,
        })
    }

    /// Sandboxed agent workspace.
    pub fn workspace_dir(&self) -> PathBuf {
        self.data_dir.join("workspace")
    }

    /// Contract documents.
    pub fn docs_dir(&self) -> PathBuf {
        self.data_dir.join(&self.docs_bucket)
    }

    /// Local report backups.
    pub fn drive_dir(&self) -> PathBuf {
        self.data_dir.join("drive")
    }

    /// SQLite file holding the dataset.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.db", self.dataset))
    }

    /// Audit log directory.
    pub fn audit_dir(&self) -> PathBuf {
        self.data_dir.join("audit")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_env_beats_secret_beats_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("GPU_PROCUREMENT_API_URL"), "https://api.run.app\n").unwrap();
        let secrets = Some(SecretStore::new(dir.path()));

        let loader = ConfigLoader::with_vars(HashMap::new(), secrets.clone());
        let url = loader
            .get("MOCK_API_URL", Some("http://localhost:8080"), Some("GPU_PROCUREMENT_API_URL"))
            .unwrap();
        assert_eq!(url, "https://api.run.app");

        let loader = ConfigLoader::with_vars(vars(&[("MOCK_API_URL", "http://env:1")]), secrets);
        let url = loader
            .get("MOCK_API_URL", Some("http://localhost:8080"), Some("GPU_PROCUREMENT_API_URL"))
            .unwrap();
        assert_eq!(url, "http://env:1");

        let loader = ConfigLoader::with_vars(HashMap::new(), None);
        let url = loader
            .get("MOCK_API_URL", Some("http://localhost:8080"), Some("GPU_PROCUREMENT_API_URL"))
            .unwrap();
        assert_eq!(url, "http://localhost:8080");
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let loader = ConfigLoader::with_vars(vars(&[("MODEL_NAME", "  ")]), None);
        let err = loader.get("MODEL_NAME", None, None).unwrap_err();
        assert!(matches!(err, WarroomError::Config(_)));
        assert!(err.to_string().contains("MODEL_NAME"));
    }

    #[test]
    fn test_secret_names_cannot_escape() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ok"), "v").unwrap();
        let store = SecretStore::new(dir.path().join("sub"));
        assert!(store.get("../ok").is_none());
        assert!(SecretStore::new(dir.path()).get("ok").is_some());
    }

    #[test]
    fn test_settings_defaults() {
        let loader = ConfigLoader::with_vars(vars(&[("PROJECT_ID", "acme")]), None);
        let settings = Settings::resolve(&FileConfig::default(), &loader).unwrap();
        assert_eq!(settings.project_id, "acme");
        assert_eq!(settings.dataset, "gpu_procurement_db");
        assert_eq!(settings.docs_bucket, "acme-gpu-procurement-docs");
        assert_eq!(settings.api_base_url, "http://localhost:8080");
        assert!(settings.report_sink_url.is_none());
        assert_eq!(settings.driver.max_steps, 100);
        assert_eq!(
            settings.database_path(),
            PathBuf::from("./data/gpu_procurement_db.db")
        );
    }

    #[test]
    fn test_file_values_and_max_steps_override() {
        let file: FileConfig = toml::from_str(
            r#"
            data_dir = "/srv/warroom"

            [driver]
            max_steps = 40

            [defaults]
            BIGQUERY_DATASET = "ops"
            "#,
        )
        .unwrap();
        assert_eq!(file.mock_api.port, 8080);

        let loader = ConfigLoader::with_vars(vars(&[("MAX_STEPS", "12")]), None);
        let settings = Settings::resolve(&file, &loader).unwrap();
        assert_eq!(settings.dataset, "ops");
        assert_eq!(settings.driver.max_steps, 12);
        assert!(settings.driver.stop_on_terminal);
        assert_eq!(settings.workspace_dir(), PathBuf::from("/srv/warroom/workspace"));

        let loader = ConfigLoader::with_vars(vars(&[("MAX_STEPS", "lots")]), None);
        assert!(Settings::resolve(&file, &loader).is_err());
        let loader = ConfigLoader::with_vars(vars(&[("MAX_STEPS", "0")]), None);
        assert!(Settings::resolve(&file, &loader).is_err());
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let file = FileConfig::load(&dir.path().join("warroom.toml")).unwrap();
        assert_eq!(file.data_dir, PathBuf::from("./data"));

        std::fs::write(dir.path().join("bad.toml"), "data_dir = [").unwrap();
        let err = FileConfig::load(&dir.path().join("bad.toml")).unwrap_err();
        assert!(matches!(err, WarroomError::Config(_)));
    }
}
