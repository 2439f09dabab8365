//! Configuration Vault – reads/writes `~/.mnemos/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mnemos_memory::DEFAULT_DIMENSIONS;
use mnemos_runtime::LogSettings;
use mnemos_types::Deadline;
use zeroize::{Zeroize, ZeroizeOnDrop};

// ─────────────────────────────────────────────────────────────────────────────
// Secrets
// ─────────────────────────────────────────────────────────────────────────────

/// An API key.  Redacted in `Debug`, wiped from memory on drop.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The key, or `None` when unset.
    pub fn expose(&self) -> Option<&str> {
        if self.0.is_empty() { None } else { Some(&self.0) }
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(if self.0.is_empty() { "<not set>" } else { "<redacted>" })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Config
// ─────────────────────────────────────────────────────────────────────────────

/// Embedding provider settings.  Without a `url` the offline hashing
/// embedder is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "ApiKey::is_empty")]
    pub api_key: ApiKey,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: ApiKey::default(),
            model: default_embedding_model(),
            dimensions: default_dimensions(),
        }
    }
}

/// One generation endpoint and the model ids (`exact` or `prefix*`) it serves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "ApiKey::is_empty")]
    pub api_key: ApiKey,
    #[serde(default)]
    pub models: Vec<String>,
}

/// Forward record operations to a remote mnemos server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub url: String,
    #[serde(default, skip_serializing_if = "ApiKey::is_empty")]
    pub api_key: ApiKey,
}

/// Persisted user configuration stored in `~/.mnemos/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Database name; the file is `~/.mnemos/<database>.db`.
    #[serde(default = "default_database")]
    pub database: String,

    /// Model id used by `/infer` unless switched with `/model`.
    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default)]
    pub verbose: bool,

    /// Suppress all logging.
    #[serde(default)]
    pub quiet: bool,

    /// Budget of one provider-backed operation; 0 means unbounded.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteConfig>,

    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
}

fn default_database() -> String {
    "mnemos".to_string()
}
fn default_model() -> String {
    "llama3".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dimensions() -> usize {
    DEFAULT_DIMENSIONS
}
fn default_providers() -> Vec<ProviderConfig> {
    vec![ProviderConfig {
        name: "ollama".to_string(),
        url: "http://localhost:11434".to_string(),
        api_key: ApiKey::default(),
        models: vec!["*".to_string()],
    }]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: default_database(),
            default_model: default_model(),
            verbose: false,
            quiet: false,
            timeout_secs: default_timeout_secs(),
            embedding: EmbeddingConfig::default(),
            remote: None,
            providers: default_providers(),
        }
    }
}

impl Config {
    pub fn log_settings(&self) -> LogSettings {
        LogSettings {
            verbose: self.verbose,
            quiet: self.quiet,
        }
    }

    /// Fresh deadline for one operation.
    pub fn deadline(&self) -> Deadline {
        match self.timeout_secs {
            0 => Deadline::none(),
            secs => Deadline::after(Duration::from_secs(secs)),
        }
    }

    /// Database file inside `dir`.
    pub fn database_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.db", self.database))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Paths
// ─────────────────────────────────────────────────────────────────────────────

fn home() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string())
}

/// `~/.mnemos`.
pub fn data_dir() -> PathBuf {
    data_dir_for_home(&home())
}

pub(crate) fn data_dir_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".mnemos")
}

/// Return the path to `~/.mnemos/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(&home())
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    data_dir_for_home(home).join("config.toml")
}

// ─────────────────────────────────────────────────────────────────────────────
// Load / save
// ─────────────────────────────────────────────────────────────────────────────

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path and apply environment overrides.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `MNEMOS_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `MNEMOS_DATABASE` | `database` |
/// | `MNEMOS_MODEL` | `default_model` |
/// | `MNEMOS_EMBEDDING_URL` | `embedding.url` |
/// | `MNEMOS_EMBEDDING_KEY` | `embedding.api_key` |
/// | `MNEMOS_VERBOSE` | `verbose` |
/// | `MNEMOS_QUIET` | `quiet` |
/// | `MNEMOS_REMOTE_URL` | `remote.url` |
/// | `MNEMOS_TIMEOUT_SECS` | `timeout_secs` |
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |name| std::env::var(name).ok());
}

pub(crate) fn apply_overrides(cfg: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("MNEMOS_DATABASE") {
        cfg.database = v;
    }
    if let Some(v) = var("MNEMOS_MODEL") {
        cfg.default_model = v;
    }
    if let Some(v) = var("MNEMOS_EMBEDDING_URL") {
        cfg.embedding.url = Some(v);
    }
    if let Some(v) = var("MNEMOS_EMBEDDING_KEY") {
        cfg.embedding.api_key = ApiKey::new(v);
    }
    if let Some(v) = var("MNEMOS_VERBOSE")
        && let Some(flag) = parse_flag(&v)
    {
        cfg.verbose = flag;
    }
    if let Some(v) = var("MNEMOS_QUIET")
        && let Some(flag) = parse_flag(&v)
    {
        cfg.quiet = flag;
    }
    if let Some(url) = var("MNEMOS_REMOTE_URL") {
        match cfg.remote.as_mut() {
            Some(remote) => remote.url = url,
            None => {
                cfg.remote = Some(RemoteConfig {
                    url,
                    api_key: ApiKey::default(),
                })
            }
        }
    }
    if let Some(v) = var("MNEMOS_TIMEOUT_SECS")
        && let Ok(secs) = v.trim().parse::<u64>()
    {
        cfg.timeout_secs = secs;
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Save the config to disk, creating `~/.mnemos/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Owner only (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    // Owner-only read/write (rw-------) on Unix.
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── secrets ──────────────────────────────────────────────────────────────

    #[test]
    fn config_debug_redacts_api_keys() {
        let mut cfg = Config::default();
        cfg.embedding.api_key = ApiKey::new("sk-super-secret");
        cfg.providers[0].api_key = ApiKey::new("ant-super-secret");
        let debug_str = format!("{:?}", cfg);
        assert!(!debug_str.contains("sk-super-secret"));
        assert!(!debug_str.contains("ant-super-secret"));
        assert!(debug_str.contains("<redacted>"));
    }

    #[test]
    fn unset_key_is_not_exposed() {
        assert_eq!(ApiKey::default().expose(), None);
        assert_eq!(format!("{:?}", ApiKey::default()), "<not set>");
        assert_eq!(ApiKey::new("k").expose(), Some("k"));
    }

    // ── persistence ──────────────────────────────────────────────────────────

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = std::fs::metadata(path.parent().unwrap())
            .expect("dir metadata")
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn roundtrip_config_with_secrets_and_remote() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let mut cfg = Config::default();
        cfg.embedding.url = Some("https://api.openai.com".into());
        cfg.embedding.api_key = ApiKey::new("sk-1");
        cfg.remote = Some(RemoteConfig {
            url: "https://mnemos.internal".into(),
            api_key: ApiKey::default(),
        });
        cfg.providers.push(ProviderConfig {
            name: "openai".into(),
            url: "https://api.openai.com".into(),
            api_key: ApiKey::new("sk-2"),
            models: vec!["gpt-*".into()],
        });
        save_to(&cfg, &path).expect("save");

        let raw = std::fs::read_to_string(&path).unwrap();
        let loaded: Config = toml::from_str(&raw).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn missing_keys_take_defaults() {
        let cfg: Config = toml::from_str("database = \"work\"").unwrap();
        assert_eq!(cfg.database, "work");
        assert_eq!(cfg.default_model, "llama3");
        assert_eq!(cfg.embedding.dimensions, DEFAULT_DIMENSIONS);
        assert_eq!(cfg.providers.len(), 1);
        assert!(cfg.remote.is_none());
    }

    #[test]
    fn config_path_points_to_mnemos_dir() {
        let p = config_path_for_home("/home/testuser");
        assert_eq!(p, PathBuf::from("/home/testuser/.mnemos/config.toml"));
        let db = Config::default().database_path(&data_dir_for_home("/home/testuser"));
        assert_eq!(db, PathBuf::from("/home/testuser/.mnemos/mnemos.db"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "timeout_secs = \"soon\"").unwrap();
        assert!(load_from(&path).unwrap_err().starts_with("Failed to parse config"));
    }

    // ── overrides ────────────────────────────────────────────────────────────

    #[test]
    fn overrides_apply_to_every_field() {
        let mut cfg = Config::default();
        apply_overrides(
            &mut cfg,
            overrides(&[
                ("MNEMOS_DATABASE", "scratch"),
                ("MNEMOS_MODEL", "gpt-4o"),
                ("MNEMOS_EMBEDDING_URL", "http://embed:8080"),
                ("MNEMOS_EMBEDDING_KEY", "sk-e"),
                ("MNEMOS_VERBOSE", "yes"),
                ("MNEMOS_QUIET", "1"),
                ("MNEMOS_REMOTE_URL", "http://remote:7700"),
                ("MNEMOS_TIMEOUT_SECS", "5"),
            ]),
        );
        assert_eq!(cfg.database, "scratch");
        assert_eq!(cfg.default_model, "gpt-4o");
        assert_eq!(cfg.embedding.url.as_deref(), Some("http://embed:8080"));
        assert_eq!(cfg.embedding.api_key.expose(), Some("sk-e"));
        assert!(cfg.verbose && cfg.quiet);
        assert_eq!(cfg.remote.unwrap().url, "http://remote:7700");
        assert_eq!(cfg.timeout_secs, 5);
    }

    #[test]
    fn invalid_override_values_are_ignored() {
        let mut cfg = Config::default();
        apply_overrides(
            &mut cfg,
            overrides(&[("MNEMOS_TIMEOUT_SECS", "soon"), ("MNEMOS_VERBOSE", "maybe")]),
        );
        assert_eq!(cfg.timeout_secs, default_timeout_secs());
        assert!(!cfg.verbose);
    }

    #[test]
    fn zero_timeout_means_unbounded() {
        let mut cfg = Config::default();
        cfg.timeout_secs = 0;
        assert!(cfg.deadline().remaining().is_none());
        cfg.timeout_secs = 30;
        assert!(cfg.deadline().remaining().is_some());
    }
}
