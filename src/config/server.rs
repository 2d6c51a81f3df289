use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

const DEFAULT_MAGIC_LINK_TTL_SECS: i64 = 15 * 60;
const DEFAULT_SESSION_TTL_SECS: i64 = 30 * 24 * 60 * 60;
/// Upper bound for every configured duration: ten years.
pub const MAX_DURATION_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Rate limit applied by the signup procedure per `(project, ip)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SignupLimits {
    pub max_attempts: u32,
    pub window_secs: i64,
}

impl Default for SignupLimits {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            window_secs: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Public base URL for external access (e.g., "https://join.example.com").
    /// Used for tracking and magic links. If not set, URLs are derived from request headers.
    pub public_base_url: Option<String>,
    /// Take the visitor IP from `X-Forwarded-For`. Without it no IP is recorded
    /// and signups are not rate limited.
    pub trust_forwarded_for: bool,
    /// Where browsers without a session are sent.
    pub login_url: String,
    pub magic_link_ttl_secs: i64,
    pub session_ttl_secs: i64,
    pub signup_limits: SignupLimits,
}

/// Optional overrides read from `<data_dir>/waitlist.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub public_base_url: Option<String>,
    pub trust_forwarded_for: Option<bool>,
    pub login_url: Option<String>,
    pub magic_link_ttl_secs: Option<i64>,
    pub session_ttl_secs: Option<i64>,
    pub signup_limits: Option<SignupLimits>,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("waitlist.db")
    }

    #[must_use]
    pub fn config_file_path(&self) -> PathBuf {
        self.data_dir.join("waitlist.toml")
    }

    /// Applies `waitlist.toml` from the data directory when present.
    /// Values given on the command line are only replaced by explicit file entries.
    pub fn load_file_overrides(&mut self) -> Result<bool> {
        let path = self.config_file_path();
        if !path.exists() {
            return Ok(false);
        }
        let file = read_config_file(&path)?;
        self.apply(file)?;
        Ok(true)
    }

    pub fn apply(&mut self, file: ConfigFile) -> Result<()> {
        if let Some(url) = file.public_base_url {
            self.public_base_url = Some(url);
        }
        if let Some(trust) = file.trust_forwarded_for {
            self.trust_forwarded_for = trust;
        }
        if let Some(login_url) = file.login_url {
            self.login_url = login_url;
        }
        if let Some(ttl) = file.magic_link_ttl_secs {
            self.magic_link_ttl_secs = ttl;
        }
        if let Some(ttl) = file.session_ttl_secs {
            self.session_ttl_secs = ttl;
        }
        if let Some(limits) = file.signup_limits {
            self.signup_limits = limits;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        check_duration("magic_link_ttl_secs", self.magic_link_ttl_secs)?;
        check_duration("session_ttl_secs", self.session_ttl_secs)?;
        if self.signup_limits.max_attempts == 0 {
            return Err(Error::Config("signup_limits.max_attempts must be at least 1".into()));
        }
        check_duration("signup_limits.window_secs", self.signup_limits.window_secs)
    }
}

fn check_duration(name: &str, secs: i64) -> Result<()> {
    if secs <= 0 {
        return Err(Error::Config(format!("{name} must be positive")));
    }
    if secs > MAX_DURATION_SECS {
        return Err(Error::Config(format!(
            "{name} cannot exceed {MAX_DURATION_SECS} seconds"
        )));
    }
    Ok(())
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let content = fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            public_base_url: None,
            trust_forwarded_for: false,
            login_url: "/login".to_string(),
            magic_link_ttl_secs: DEFAULT_MAGIC_LINK_TTL_SECS,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            signup_limits: SignupLimits::default(),
        }
    }
}
