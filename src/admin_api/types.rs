use serde::Deserialize;
use std::fmt;

/// Admin client error type
///
/// Represents the errors that can occur while establishing an admin session,
/// talking to the management API, or inspecting the session's access token.
#[derive(Debug)]
pub enum AdminError {
    /// Access token could not be decoded
    Decode(String),
    /// API request failed (network, HTTP, or response parsing error)
    Api(ApiError),
    /// Configuration error
    Config(String),
    /// A resource description violates its invariants
    InvalidResource(String),
}

impl fmt::Display for AdminError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminError::Decode(msg) => write!(f, "Token decode failed: {}", msg),
            AdminError::Api(err) => write!(f, "API error: {}", err),
            AdminError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AdminError::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
        }
    }
}

impl std::error::Error for AdminError {}

impl From<ApiError> for AdminError {
    fn from(err: ApiError) -> Self {
        AdminError::Api(err)
    }
}

/// API-specific errors
#[derive(Debug)]
pub enum ApiError {
    /// Network error (connection, timeout, etc.)
    Network(String),
    /// HTTP error with status code
    Http { status: u16, message: String },
    /// Failed to parse response
    Parse(String),
    /// Request building failed
    Request(String),
    /// The session could not supply an access token for the request
    Authentication(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Network(msg) => write!(f, "Network error: {}", msg),
            ApiError::Http { status, message } => {
                write!(f, "HTTP {} error: {}", status, message)
            }
            ApiError::Parse(msg) => write!(f, "Parse error: {}", msg),
            ApiError::Request(msg) => write!(f, "Request error: {}", msg),
            ApiError::Authentication(msg) => write!(f, "Authentication failed: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Network("Request timeout".to_string())
        } else if err.is_connect() {
            ApiError::Network(format!("Connection failed: {}", err))
        } else if let Some(status) = err.status() {
            ApiError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Response from the identity provider's token endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime of the access token in seconds, when the server states it
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub refresh_expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Status and body of a management API call that produced a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: String,
    /// Why the body could not be read, if it could not
    pub body_error: Option<String>,
}

impl RemoteResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            body_error: None,
        }
    }

    /// A response whose status arrived but whose body could not be read
    pub fn unreadable(status: u16, error: impl Into<String>) -> Self {
        Self {
            status,
            body: String::new(),
            body_error: Some(error.into()),
        }
    }

    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
