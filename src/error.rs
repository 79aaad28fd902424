use thiserror::Error;

#[derive(Debug, Error)]
pub enum PanelError {
    #[error("no node name specified")]
    MissingNode,

    #[error("no VM ID specified")]
    MissingVmid,

    /// The server answered with a non-success status. `status_text` is what
    /// gets shown to the user.
    #[error("{status_text}")]
    Api { status: u16, status_text: String },

    #[error("Connection error: {0}")]
    Transport(String),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid migration target: {0}")]
    InvalidMigrationTarget(String),

    #[error("Console could not be opened: {0}")]
    Console(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration parse error: {0}")]
    SerdeError(String),
}

impl PanelError {
    /// Text suitable for an error alert.
    pub fn status_text(&self) -> String {
        match self {
            PanelError::Api { status_text, .. } => status_text.clone(),
            other => other.to_string(),
        }
    }
}

impl From<toml::de::Error> for PanelError {
    fn from(err: toml::de::Error) -> Self {
        PanelError::SerdeError(err.to_string())
    }
}

impl From<serde_json::Error> for PanelError {
    fn from(err: serde_json::Error) -> Self {
        PanelError::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for PanelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            PanelError::Decode(err.to_string())
        } else {
            PanelError::Transport(err.to_string())
        }
    }
}
