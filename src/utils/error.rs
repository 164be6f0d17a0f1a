use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvError {
    #[error("WebSocket error: {0}")]
    WebSocketError(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    #[error("Login server request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Connection closed by server")]
    ConnectionClosed,

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Authentication failed: {message}")]
    AuthError { message: String },

    #[error("Protocol error: {message}")]
    ProtocolError { message: String },

    #[error("Invalid action {action}: {reason}")]
    InvalidAction { action: usize, reason: String },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },
}

impl From<tokio_tungstenite::tungstenite::Error> for EnvError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        EnvError::WebSocketError(Box::new(err))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Authentication,
    Protocol,
    Agent,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EnvError {
    pub fn protocol(message: impl Into<String>) -> Self {
        EnvError::ProtocolError {
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        EnvError::AuthError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EnvError::WebSocketError(_) | EnvError::HttpError(_) | EnvError::ConnectionClosed => {
                ErrorCategory::Network
            }
            EnvError::ConfigError { .. }
            | EnvError::MissingConfigError { .. }
            | EnvError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            EnvError::AuthError { .. } => ErrorCategory::Authentication,
            EnvError::ProtocolError { .. } | EnvError::SerializationError(_) => {
                ErrorCategory::Protocol
            }
            EnvError::InvalidAction { .. } | EnvError::Unsupported { .. } => ErrorCategory::Agent,
            EnvError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Agent => ErrorSeverity::Low,
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Protocol | ErrorCategory::Authentication => ErrorSeverity::High,
            ErrorCategory::Configuration | ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EnvError::ConnectionClosed => "The Showdown server closed the connection".to_string(),
            EnvError::WebSocketError(_) => "Could not talk to the Showdown server".to_string(),
            EnvError::HttpError(_) => "Could not reach the Showdown login server".to_string(),
            EnvError::AuthError { message } => format!("Login failed: {}", message),
            EnvError::InvalidAction { action, reason } => {
                format!("Action {} is not allowed right now: {}", action, reason)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check your network connection and the server URL, then retry",
            ErrorCategory::Configuration => "Fix the configuration value and run again",
            ErrorCategory::Authentication => {
                "Check the credentials file (username on the first line, password on the second)"
            }
            ErrorCategory::Protocol => "Run with --verbose and report the logged server message",
            ErrorCategory::Agent => "Pick one of the actions in the valid-action mask",
            ErrorCategory::System => "Check file permissions and available disk space",
        }
    }
}

pub type Result<T> = std::result::Result<T, EnvError>;
