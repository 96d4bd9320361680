use crate::constants::{
    DEFAULT_MAX_SERVICES, DEFAULT_REGISTRY_TAP_URL, DEFAULT_SESAME_URL, DEFAULT_USER_AGENT,
};
use crate::error::{Result, VoError};
use crate::query::{ErrorHandling, RetryPolicy};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "navo.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(from = "ConfigFile")]
pub struct Config {
    pub http: HttpConfig,
    pub registry: RegistryConfig,
    pub resolver: ResolverConfig,
    pub query: QueryConfig,
    pub cone: ServiceConfig,
    pub image: ServiceConfig,
    pub spectra: ServiceConfig,
    pub tap: ServiceConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    /// Pause between retry attempts
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub tap_url: String,
    pub timeout_seconds: u64,
    pub attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub sesame_url: String,
    pub timeout_seconds: u64,
    pub attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub max_services: usize,
    pub error_handling: ErrorHandling,
}

/// Timeout and retry settings for one service type.
#[derive(Debug, Clone, Copy)]
pub struct ServiceConfig {
    pub timeout_seconds: u64,
    /// Total number of tries, not additional retries
    pub attempts: u32,
}

impl ServiceConfig {
    pub const fn new(timeout_seconds: u64, attempts: u32) -> Self {
        Self {
            timeout_seconds,
            attempts,
        }
    }

    pub fn retry_policy(&self, backoff_ms: u64) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_secs(self.timeout_seconds),
            attempts: self.attempts,
            backoff: Duration::from_millis(backoff_ms),
        }
    }
}

/// On-disk shape of the file. Service sections differ in their defaults,
/// so their keys stay optional until merged in `From<ConfigFile>`.
#[derive(Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    http: HttpConfig,
    registry: RegistryConfig,
    resolver: ResolverConfig,
    query: QueryConfig,
    cone: ServiceSection,
    image: ServiceSection,
    spectra: ServiceSection,
    tap: ServiceSection,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct ServiceSection {
    timeout_seconds: Option<u64>,
    attempts: Option<u32>,
}

impl ServiceSection {
    fn or(self, defaults: ServiceConfig) -> ServiceConfig {
        ServiceConfig {
            timeout_seconds: self.timeout_seconds.unwrap_or(defaults.timeout_seconds),
            attempts: self.attempts.unwrap_or(defaults.attempts),
        }
    }
}

impl From<ConfigFile> for Config {
    fn from(file: ConfigFile) -> Self {
        let defaults = Config::default();
        Self {
            http: file.http,
            registry: file.registry,
            resolver: file.resolver,
            query: file.query,
            cone: file.cone.or(defaults.cone),
            image: file.image.or(defaults.image),
            spectra: file.spectra.or(defaults.spectra),
            tap: file.tap.or(defaults.tap),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retry_backoff_ms: 2000,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            tap_url: DEFAULT_REGISTRY_TAP_URL.to_string(),
            timeout_seconds: 60,
            attempts: 3,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            sesame_url: DEFAULT_SESAME_URL.to_string(),
            timeout_seconds: 30,
            attempts: 2,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_services: DEFAULT_MAX_SERVICES,
            error_handling: ErrorHandling::ContinueOnError,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            registry: RegistryConfig::default(),
            resolver: ResolverConfig::default(),
            query: QueryConfig::default(),
            cone: ServiceConfig::new(60, 3),
            image: ServiceConfig::new(60, 3),
            spectra: ServiceConfig::new(30, 3),
            tap: ServiceConfig::new(60, 1),
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// Resolution order: the explicit path, then `NAVO_CONFIG`, then `navo.toml`
    /// in the working directory. A missing default file is not an error; a
    /// missing explicit file is. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let explicit: Option<PathBuf> = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("NAVO_CONFIG").ok().map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    debug!("No {} found, using built-in defaults", DEFAULT_CONFIG_FILE);
                    Self::default()
                }
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            VoError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        // Missing sections and keys fall back to Config::default()
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("NAVO_REGISTRY_URL") {
            self.registry.tap_url = url;
        }
        if let Ok(url) = std::env::var("NAVO_SESAME_URL") {
            self.resolver.sesame_url = url;
        }
        if let Ok(agent) = std::env::var("NAVO_USER_AGENT") {
            self.http.user_agent = agent;
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, service) in [
            ("cone", &self.cone),
            ("image", &self.image),
            ("spectra", &self.spectra),
            ("tap", &self.tap),
        ] {
            if service.attempts == 0 {
                return Err(VoError::Config(format!("[{}] attempts must be at least 1", name)));
            }
        }
        if self.registry.attempts == 0 || self.resolver.attempts == 0 {
            return Err(VoError::Config("attempts must be at least 1".into()));
        }
        if self.query.max_services == 0 {
            return Err(VoError::Config("[query] max_services must be at least 1".into()));
        }
        Ok(())
    }

    pub fn registry_policy(&self) -> RetryPolicy {
        ServiceConfig::new(self.registry.timeout_seconds, self.registry.attempts)
            .retry_policy(self.http.retry_backoff_ms)
    }

    pub fn resolver_policy(&self) -> RetryPolicy {
        ServiceConfig::new(self.resolver.timeout_seconds, self.resolver.attempts)
            .retry_policy(self.http.retry_backoff_ms)
    }
}
