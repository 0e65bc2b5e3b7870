use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub budget_password: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:5007".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            budget_password: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunConfig {
    /// 0 means every notes update is issued at once.
    #[serde(default)]
    pub max_concurrency: usize,
    #[serde(default)]
    pub strict_exit: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ArchiverConfig {
    pub server: ServerConfig,
    pub run: RunConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialArchiverConfig {
    server: Option<ServerConfig>,
    run: Option<RunConfig>,
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_usize(var: &str, fallback: usize) -> usize {
    match env::var(var) {
        Ok(v) => v.trim().parse::<usize>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "1" | "true" | "TRUE" | "yes" | "on" => Some(true),
        "0" | "false" | "FALSE" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => parse_bool(&v).unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_or_secret(var: &str, fallback: Option<String>) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => fallback,
    }
}

/// Strict exit codes as requested by the environment alone.
///
/// Used before any config file is read, so argument errors never depend on
/// a parseable config.
pub fn strict_exit_from_env() -> bool {
    env_or_bool("ARCHIVER_STRICT_EXIT", false)
}

fn validate(cfg: &ArchiverConfig) -> Result<()> {
    let url = cfg.server.base_url.trim();
    if url.is_empty() {
        return Err(anyhow!("invalid server base url: cannot be empty"));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(anyhow!(
            "invalid server base url `{url}`: must start with http:// or https://"
        ));
    }
    Ok(())
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("ARCHIVER_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let config_dir = dirs::config_dir()?;
    Some(config_dir.join("category-archiver").join("config.toml"))
}

fn apply_file_config(base: &mut ArchiverConfig, raw: &str, path: &Path) -> Result<()> {
    let parsed: PartialArchiverConfig = toml::from_str(raw)
        .map_err(|err| anyhow!("failed to parse archiver config {}: {err}", path.display()))?;
    if let Some(server) = parsed.server {
        base.server = server;
    }
    if let Some(run) = parsed.run {
        base.run = run;
    }
    Ok(())
}

fn merge_file_config(base: &mut ArchiverConfig) -> Result<()> {
    let Some(path) = resolve_config_path() else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)?;
    apply_file_config(base, &raw, &path)
}

pub fn load_config() -> Result<ArchiverConfig> {
    let mut cfg = ArchiverConfig::default();
    merge_file_config(&mut cfg)?;

    cfg.server.base_url = env_or_string("ARCHIVER_SERVER_URL", &cfg.server.base_url);
    cfg.server.api_key = env_or_secret("ARCHIVER_API_KEY", cfg.server.api_key.take());
    cfg.server.budget_password =
        env_or_secret("ARCHIVER_BUDGET_PASSWORD", cfg.server.budget_password.take());
    cfg.server.request_timeout_secs =
        env_or_u64("ARCHIVER_TIMEOUT_SECS", cfg.server.request_timeout_secs);
    cfg.run.max_concurrency = env_or_usize("ARCHIVER_MAX_CONCURRENCY", cfg.run.max_concurrency);
    cfg.run.strict_exit = env_or_bool("ARCHIVER_STRICT_EXIT", cfg.run.strict_exit);

    validate(&cfg)?;
    Ok(cfg)
}
