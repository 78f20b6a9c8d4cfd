use anyhow::anyhow;
use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080, worker_threads: Some(4) }
    }
}

/// Which `EntryStore` implementation the process runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Remote Redis-compatible set reached over its REST API.
    Set,
    /// Single JSON document on local (possibly transient) storage.
    File,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "set" | "redis" | "kv" => Ok(Self::Set),
            "file" | "json" => Ok(Self::File),
            other => Err(anyhow!("unknown store backend `{other}` (expected `set` or `file`)")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Explicit backend; when absent it is inferred from the REST credentials.
    #[serde(default)]
    pub backend: Option<StoreBackend>,
    #[serde(default = "default_file_path")]
    pub file_path: String,
    #[serde(default)]
    pub rest_url: String,
    #[serde(default)]
    pub rest_token: String,
    #[serde(default = "default_set_key")]
    pub set_key: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Reject `<script`/`javascript:` markers. Defaults to on for the file backend only.
    #[serde(default)]
    pub screen_content: Option<bool>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: None,
            file_path: default_file_path(),
            rest_url: String::new(),
            rest_token: String::new(),
            set_key: default_set_key(),
            request_timeout_secs: default_request_timeout(),
            screen_content: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u64,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default)]
    pub require_hex_site_id: bool,
    #[serde(default = "default_max_name_len")]
    pub max_name_len: usize,
    #[serde(default = "default_max_description_len")]
    pub max_description_len: usize,
    #[serde(default = "default_max_site_id_len")]
    pub max_site_id_len: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_minute: default_rate_limit(),
            max_body_bytes: default_max_body_bytes(),
            require_hex_site_id: false,
            max_name_len: default_max_name_len(),
            max_description_len: default_max_description_len(),
            max_site_id_len: default_max_site_id_len(),
        }
    }
}

fn default_file_path() -> String {
    std::env::temp_dir().join("site_index").join("sites.json").to_string_lossy().into_owned()
}
fn default_set_key() -> String { "sites".into() }
fn default_request_timeout() -> u64 { 10 }
fn default_rate_limit() -> u64 { 100 }
fn default_max_body_bytes() -> usize { 64 * 1024 }
fn default_max_name_len() -> usize { 200 }
fn default_max_description_len() -> usize { 2000 }
fn default_max_site_id_len() -> usize { 128 }

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    load_from_str(&content)
}

pub fn load_from_str(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Load `config.toml` (or `CONFIG_PATH`), fall back to defaults when it is
    /// absent, then overlay the process environment and validate.
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = match load_default() {
            Ok(cfg) => cfg,
            Err(e) if is_not_found(&e) => AppConfig::default(),
            Err(e) => return Err(e),
        };
        cfg.apply_env(|key| std::env::var(key).ok())?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    /// Overlay environment variables; `lookup` is injected so tests stay off the real env.
    /// Every variable that is set wins over the file. Unparseable values are errors.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&'static str]| {
            keys.iter()
                .find_map(|k| lookup(*k).filter(|v| !v.trim().is_empty()).map(|v| (*k, v)))
        };

        if let Some((_, host)) = first(&["SERVER_HOST"]) {
            self.server.host = host;
        }
        if let Some(var) = first(&["SERVER_PORT"]) {
            self.server.port = parse_var(var)?;
        }
        if let Some(var) = first(&["TOKIO_WORKER_THREADS"]) {
            self.server.worker_threads = Some(parse_var(var)?);
        }
        if let Some(var) = first(&["STORE_BACKEND"]) {
            self.store.backend = Some(parse_var(var)?);
        }
        if let Some((_, path)) = first(&["STORE_FILE_PATH"]) {
            self.store.file_path = path;
        }
        if let Some((_, url)) = first(&["KV_REST_API_URL", "UPSTASH_REDIS_REST_URL"]) {
            self.store.rest_url = url;
        }
        if let Some((_, token)) = first(&["KV_REST_API_TOKEN", "UPSTASH_REDIS_REST_TOKEN"]) {
            self.store.rest_token = token;
        }
        if let Some((_, key)) = first(&["STORE_SET_KEY"]) {
            self.store.set_key = key;
        }
        if let Some(var) = first(&["RATE_LIMIT_PER_MINUTE"]) {
            self.limits.rate_limit_per_minute = parse_var(var)?;
        }
        Ok(())
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.store.validate()?;
        self.limits.validate()?;
        Ok(())
    }
}

/// Parse one environment value, naming the variable on failure.
fn parse_var<T>((key, raw): (&str, String)) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow!("invalid value `{raw}` for {key}: {e}"))
}

fn is_not_found(e: &anyhow::Error) -> bool {
    e.downcast_ref::<std::io::Error>()
        .map(|io| io.kind() == std::io::ErrorKind::NotFound)
        .unwrap_or(false)
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be in 1..=65535"));
        }
        match self.worker_threads {
            Some(0) | None => self.worker_threads = Some(4),
            Some(_) => {}
        }
        Ok(())
    }
}

impl StoreConfig {
    /// Backend actually used: explicit choice, else `set` when REST credentials exist.
    pub fn resolved_backend(&self) -> StoreBackend {
        match self.backend {
            Some(b) => b,
            None if self.has_rest_credentials() => StoreBackend::Set,
            None => StoreBackend::File,
        }
    }

    pub fn has_rest_credentials(&self) -> bool {
        !self.rest_url.trim().is_empty() && !self.rest_token.trim().is_empty()
    }

    /// Content screening defaults to the file backend's behaviour.
    pub fn screen_content_enabled(&self) -> bool {
        self.screen_content
            .unwrap_or(self.resolved_backend() == StoreBackend::File)
    }

    pub fn validate(&self) -> Result<()> {
        match self.resolved_backend() {
            StoreBackend::Set => {
                if !self.has_rest_credentials() {
                    return Err(anyhow!(
                        "store.backend = \"set\" needs store.rest_url and store.rest_token (or KV_REST_API_URL / KV_REST_API_TOKEN)"
                    ));
                }
                let lower = self.rest_url.to_lowercase();
                if !(lower.starts_with("http://") || lower.starts_with("https://")) {
                    return Err(anyhow!("store.rest_url must start with http:// or https://"));
                }
                if self.set_key.trim().is_empty() {
                    return Err(anyhow!("store.set_key must not be empty"));
                }
                if self.request_timeout_secs == 0 {
                    return Err(anyhow!("store.request_timeout_secs must be a positive number of seconds"));
                }
            }
            StoreBackend::File => {
                if self.file_path.trim().is_empty() {
                    return Err(anyhow!("store.file_path must not be empty"));
                }
            }
        }
        Ok(())
    }
}

impl LimitsConfig {
    fn validate(&self) -> Result<()> {
        if self.max_body_bytes == 0 {
            return Err(anyhow!("limits.max_body_bytes must be >= 1"));
        }
        if self.max_name_len == 0 || self.max_description_len == 0 || self.max_site_id_len == 0 {
            return Err(anyhow!("limits field length caps must be >= 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn empty_toml_yields_file_backend_defaults() {
        let mut cfg = load_from_str("").unwrap();
        cfg.normalize_and_validate().unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.store.resolved_backend(), StoreBackend::File);
        assert!(cfg.store.screen_content_enabled());
        assert_eq!(cfg.limits.rate_limit_per_minute, 100);
        assert!(cfg.store.file_path.ends_with("sites.json"));
    }

    #[test]
    fn rest_credentials_from_env_select_set_backend() {
        let mut cfg = AppConfig::default();
        let vars = env(&[
            ("KV_REST_API_URL", "https://kv.example.com"),
            ("KV_REST_API_TOKEN", "secret"),
        ]);
        cfg.apply_env(|k| vars.get(k).cloned()).unwrap();
        cfg.normalize_and_validate().unwrap();
        assert_eq!(cfg.store.resolved_backend(), StoreBackend::Set);
        assert!(!cfg.store.screen_content_enabled());
        assert_eq!(cfg.store.rest_token, "secret");
    }

    #[test]
    fn upstash_variable_names_are_accepted() {
        let mut cfg = AppConfig::default();
        let vars = env(&[
            ("UPSTASH_REDIS_REST_URL", "https://u.example.com"),
            ("UPSTASH_REDIS_REST_TOKEN", "t"),
        ]);
        cfg.apply_env(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(cfg.store.rest_url, "https://u.example.com");
        assert_eq!(cfg.store.resolved_backend(), StoreBackend::Set);
    }

    #[test]
    fn explicit_set_backend_without_credentials_fails() {
        let mut cfg = load_from_str("[store]\nbackend = \"set\"\n").unwrap();
        assert!(cfg.normalize_and_validate().is_err());
    }

    #[test]
    fn explicit_file_backend_wins_over_credentials() {
        let toml = r#"
            [store]
            backend = "file"
            rest_url = "https://kv.example.com"
            rest_token = "x"
            file_path = "/tmp/custom.json"
            screen_content = false
        "#;
        let mut cfg = load_from_str(toml).unwrap();
        cfg.normalize_and_validate().unwrap();
        assert_eq!(cfg.store.resolved_backend(), StoreBackend::File);
        assert_eq!(cfg.store.file_path, "/tmp/custom.json");
        assert!(!cfg.store.screen_content_enabled());
    }

    #[test]
    fn env_overrides_server_and_limits() {
        let mut cfg = AppConfig::default();
        let vars = env(&[
            ("SERVER_HOST", "0.0.0.0"),
            ("SERVER_PORT", "9999"),
            ("STORE_BACKEND", "file"),
            ("RATE_LIMIT_PER_MINUTE", "0"),
        ]);
        cfg.apply_env(|k| vars.get(k).cloned()).unwrap();
        cfg.normalize_and_validate().unwrap();
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 9999);
        assert_eq!(cfg.limits.rate_limit_per_minute, 0);
    }

    #[test]
    fn env_credentials_replace_file_values() {
        let toml = r#"
            [store]
            rest_url = "https://old.example.com"
            rest_token = "old"
        "#;
        let mut cfg = load_from_str(toml).unwrap();
        let vars = env(&[
            ("KV_REST_API_URL", "https://new.example.com"),
            ("UPSTASH_REDIS_REST_TOKEN", "rotated"),
        ]);
        cfg.apply_env(|k| vars.get(k).cloned()).unwrap();
        cfg.normalize_and_validate().unwrap();
        assert_eq!(cfg.store.rest_url, "https://new.example.com");
        assert_eq!(cfg.store.rest_token, "rotated");
    }

    #[test]
    fn unset_env_keeps_file_credentials() {
        let mut cfg = load_from_str("[store]\nrest_url = \"https://kv.example.com\"\nrest_token = \"t\"\n").unwrap();
        cfg.apply_env(|_| None).unwrap();
        assert_eq!(cfg.store.rest_url, "https://kv.example.com");
        assert_eq!(cfg.store.rest_token, "t");
    }

    #[test]
    fn bad_backend_name_in_env_is_an_error() {
        let mut cfg = AppConfig::default();
        let vars = env(&[("STORE_BACKEND", "redsi")]);
        let err = cfg.apply_env(|k| vars.get(k).cloned()).unwrap_err().to_string();
        assert!(err.contains("STORE_BACKEND"), "{err}");
        assert!(err.contains("redsi"), "{err}");
        assert_eq!(cfg.store.backend, None);
    }

    #[test]
    fn bad_numbers_in_env_are_errors() {
        for (key, value) in [
            ("SERVER_PORT", "80800"),
            ("TOKIO_WORKER_THREADS", "many"),
            ("RATE_LIMIT_PER_MINUTE", "-5"),
        ] {
            let mut cfg = AppConfig::default();
            let vars = env(&[(key, value)]);
            let err = cfg.apply_env(|k| vars.get(k).cloned()).unwrap_err().to_string();
            assert!(err.contains(key) && err.contains(value), "{err}");
        }
    }

    #[test]
    fn non_http_rest_url_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.store.rest_url = "redis://localhost:6379".into();
        cfg.store.rest_token = "t".into();
        assert!(cfg.normalize_and_validate().is_err());
    }

    #[test]
    fn backend_names_parse() {
        assert_eq!("SET".parse::<StoreBackend>().unwrap(), StoreBackend::Set);
        assert_eq!("json".parse::<StoreBackend>().unwrap(), StoreBackend::File);
        assert!("sqlite".parse::<StoreBackend>().is_err());
    }
}
