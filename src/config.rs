use crate::{PanelError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PanelConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API root, including the `/api2/json` prefix
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_true")]
    pub verify_tls: bool,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthConfig {
    /// `Authorization: PVEAPIToken=USER@REALM!TOKENID=SECRET`
    Token {
        user: String,
        token_id: String,
        secret: String,
    },
    /// Cookie ticket, either pre-issued or obtained with username/password.
    Ticket {
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        password: Option<String>,
        #[serde(default)]
        ticket: Option<String>,
        #[serde(default)]
        csrf_token: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    #[serde(default = "default_command_timeout")]
    pub stop_timeout_seconds: u64,
    #[serde(default = "default_command_timeout")]
    pub shutdown_timeout_seconds: u64,
    #[serde(default = "default_true")]
    pub confirm_destructive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_ui_theme")]
    pub theme: String,
    #[serde(default = "default_ui_font_size")]
    pub font_size: f32,
    #[serde(default = "default_true")]
    pub show_event_log: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            verify_tls: true,
            timeout_seconds: default_timeout_seconds(),
            auth: None,
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            stop_timeout_seconds: default_command_timeout(),
            shutdown_timeout_seconds: default_command_timeout(),
            confirm_destructive: true,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            theme: default_ui_theme(),
            font_size: default_ui_font_size(),
            show_event_log: true,
        }
    }
}

impl FromStr for PanelConfig {
    type Err = PanelError;

    /// Parse and validate a TOML document.
    fn from_str(contents: &str) -> Result<Self> {
        let config: PanelConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }
}

fn default_base_url() -> String {
    "https://localhost:8006/api2/json".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_command_timeout() -> u64 {
    30
}

fn default_ui_theme() -> String {
    "ocean".to_string()
}

fn default_ui_font_size() -> f32 {
    14.0
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Scheme, host and port of `base_url`, used to build console links.
    pub fn origin(&self) -> String {
        let url = self.base_url.trim_end_matches('/');
        match url.find("/api2") {
            Some(idx) => url[..idx].to_string(),
            None => url.to_string(),
        }
    }
}

impl PanelConfig {
    /// `$XDG_CONFIG_HOME/vmpanel/config.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/etc"))
            .join("vmpanel")
            .join("config.toml")
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        contents.parse()
    }

    /// Missing file means defaults; an unreadable or invalid one is an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| PanelError::ConfigError(e.to_string()))?;
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(PanelError::ConfigError(format!(
                "api.base_url must be an http(s) URL, got '{}'",
                self.api.base_url
            )));
        }
        if self.poller.interval_ms == 0 {
            return Err(PanelError::ConfigError(
                "poller.interval_ms must be greater than zero".to_string(),
            ));
        }
        if let Some(AuthConfig::Ticket {
            username,
            password,
            ticket,
            ..
        }) = &self.api.auth
        {
            let has_login = username.is_some() && password.is_some();
            if !has_login && ticket.is_none() {
                return Err(PanelError::ConfigError(
                    "ticket auth needs either username/password or a ticket".to_string(),
                ));
            }
        }
        Ok(())
    }
}
