use chirp_core::password::PasswordHashing;
use chirp_store_sqlite::SqliteStoreConfig;
use chirp_web::WebConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Ten years
const MAX_SESSION_TTL_SECS: u64 = 315_360_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Argon2 cost for new password hashes
    #[serde(default)]
    pub password_hashing: PasswordHashing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file path, `~` is expanded
    #[serde(default = "default_database_path")]
    pub path: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: u64,

    #[serde(default = "default_false")]
    pub secure_cookie: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_false")]
    pub log_sql_queries: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database: DatabaseConfig::default(),
            session: SessionConfig::default(),
            logging: LoggingConfig::default(),
            password_hashing: PasswordHashing::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            ttl_secs: default_session_ttl_secs(),
            secure_cookie: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_sql_queries: false,
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        let config = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&contents)?
        } else {
            // Default to YAML
            serde_yaml::from_str(&contents)?
        };

        Ok(config)
    }

    /// Merge environment variables into config (env vars take precedence)
    pub fn merge_env(&mut self) {
        if let Ok(val) = std::env::var("CHIRP_HOST") {
            self.host = val;
        }

        if let Ok(val) = std::env::var("CHIRP_PORT") {
            match val.parse::<u16>() {
                Ok(port) => self.port = port,
                Err(_) => eprintln!("Warning: Invalid CHIRP_PORT '{}', ignoring", val),
            }
        }

        if let Ok(val) = std::env::var("CHIRP_DATABASE_PATH") {
            self.database.path = val;
        }

        if let Ok(val) = std::env::var("CHIRP_SESSION_TTL_SECS") {
            match val.parse::<u64>() {
                Ok(secs) => self.session.ttl_secs = secs,
                Err(_) => eprintln!("Warning: Invalid CHIRP_SESSION_TTL_SECS '{}', ignoring", val),
            }
        }

        if let Ok(val) = std::env::var("CHIRP_COOKIE_SECURE")
            && let Ok(secure) = val.parse::<bool>()
        {
            self.session.secure_cookie = secure;
        }

        if let Ok(val) = std::env::var("CHIRP_LOG_LEVEL") {
            self.logging.level = val;
        }

        if let Ok(val) = std::env::var("CHIRP_LOG_SQL_QUERIES")
            && let Ok(enabled) = val.parse::<bool>()
        {
            self.logging.log_sql_queries = enabled;
        }
    }

    /// Reject settings the server cannot start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be at least 1".into(),
            ));
        }
        if self.session.ttl_secs == 0 || self.session.ttl_secs > MAX_SESSION_TTL_SECS {
            return Err(ConfigError::Invalid(format!(
                "session.ttl_secs must be between 1 and {}",
                MAX_SESSION_TTL_SECS
            )));
        }
        if self.session.cookie_name.is_empty()
            || !self
                .session
                .cookie_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ConfigError::Invalid(format!(
                "session.cookie_name '{}' is not a valid cookie name",
                self.session.cookie_name
            )));
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.database.path).to_string())
    }

    pub fn web_config(&self) -> WebConfig {
        WebConfig {
            host: self.host.clone(),
            port: self.port,
            cookie_name: self.session.cookie_name.clone(),
            session_ttl_secs: self.session.ttl_secs,
            secure_cookie: self.session.secure_cookie,
        }
    }

    pub fn store_config(&self) -> SqliteStoreConfig {
        SqliteStoreConfig {
            max_connections: self.database.max_connections,
            session_ttl: chrono::Duration::seconds(
                self.session.ttl_secs.min(MAX_SESSION_TTL_SECS) as i64,
            ),
            hashing: self.password_hashing,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_database_path() -> String {
    "~/.chirp/chirp.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_cookie_name() -> String {
    "chirp_session".to_string()
}

fn default_session_ttl_secs() -> u64 {
    1_209_600
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_false() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    const ENV_VARS: [&str; 7] = [
        "CHIRP_HOST",
        "CHIRP_PORT",
        "CHIRP_DATABASE_PATH",
        "CHIRP_SESSION_TTL_SECS",
        "CHIRP_COOKIE_SECURE",
        "CHIRP_LOG_LEVEL",
        "CHIRP_LOG_SQL_QUERIES",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            // SAFETY: tests touching the environment run under #[serial]
            unsafe { std::env::remove_var(var) };
        }
    }

    fn write_config(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8000);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.session.cookie_name, "chirp_session");
        assert_eq!(config.session.ttl_secs, 1_209_600);
        assert!(!config.session.secure_cookie);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_file() {
        let file = write_config(
            ".yaml",
            r#"
port: 9000
database:
  path: /tmp/chirp-test.db
session:
  secure_cookie: true
logging:
  level: debug
  log_sql_queries: true
"#,
        );

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.database.path, "/tmp/chirp-test.db");
        assert_eq!(config.database.max_connections, 5);
        assert!(config.session.secure_cookie);
        assert_eq!(config.session.ttl_secs, 1_209_600);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.log_sql_queries);
    }

    #[test]
    fn test_from_toml_file() {
        let file = write_config(
            ".toml",
            r#"
host = "0.0.0.0"

[session]
cookie_name = "sid"
ttl_secs = 3600

[password_hashing]
memory_kib = 1024
iterations = 1
parallelism = 1
"#,
        );

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.session.cookie_name, "sid");
        assert_eq!(config.session.ttl_secs, 3600);
        assert_eq!(config.password_hashing.memory_kib, 1024);
        assert_eq!(config.store_config().session_ttl, chrono::Duration::hours(1));
    }

    #[test]
    fn test_from_file_errors() {
        let file = write_config(".yaml", "port: [not a port");
        assert!(matches!(
            ServerConfig::from_file(file.path()),
            Err(ConfigError::Yaml(_))
        ));

        assert!(matches!(
            ServerConfig::from_file("/nonexistent/chirp.yaml"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    #[serial]
    fn test_merge_env_overrides() {
        clear_env();
        unsafe {
            std::env::set_var("CHIRP_HOST", "0.0.0.0");
            std::env::set_var("CHIRP_PORT", "8123");
            std::env::set_var("CHIRP_DATABASE_PATH", "/var/lib/chirp/chirp.db");
            std::env::set_var("CHIRP_SESSION_TTL_SECS", "60");
            std::env::set_var("CHIRP_COOKIE_SECURE", "true");
            std::env::set_var("CHIRP_LOG_LEVEL", "warn");
            std::env::set_var("CHIRP_LOG_SQL_QUERIES", "true");
        }

        let mut config = ServerConfig::default();
        config.merge_env();
        clear_env();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8123);
        assert_eq!(config.database.path, "/var/lib/chirp/chirp.db");
        assert_eq!(config.session.ttl_secs, 60);
        assert!(config.session.secure_cookie);
        assert_eq!(config.logging.level, "warn");
        assert!(config.logging.log_sql_queries);
    }

    #[test]
    #[serial]
    fn test_merge_env_ignores_unparseable_values() {
        clear_env();
        unsafe {
            std::env::set_var("CHIRP_PORT", "not-a-port");
            std::env::set_var("CHIRP_COOKIE_SECURE", "maybe");
        }

        let mut config = ServerConfig::default();
        config.merge_env();
        clear_env();

        assert_eq!(config.port, 8000);
        assert!(!config.session.secure_cookie);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ServerConfig::default();
        config.session.ttl_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        config.session.ttl_secs = u64::MAX;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.session.cookie_name = "bad name;".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_database_path_expands_tilde() {
        let config = ServerConfig::default();
        let path = config.database_path();
        assert!(!path.to_string_lossy().starts_with('~'));
        assert!(path.ends_with(".chirp/chirp.db"));
    }

    #[test]
    fn test_web_config_mirrors_session_settings() {
        let mut config = ServerConfig::default();
        config.port = 9999;
        config.session.secure_cookie = true;

        let web = config.web_config();
        assert_eq!(web.port, 9999);
        assert_eq!(web.cookie_name, "chirp_session");
        assert_eq!(web.session_ttl_secs, 1_209_600);
        assert!(web.secure_cookie);
    }
}
