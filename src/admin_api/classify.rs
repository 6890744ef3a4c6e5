//! Classification of management API responses that did not report creation.
//!
//! Every provisioning path shares this one policy: a conflict means the
//! resource is already there, anything else becomes a [`RemoteFailure`]
//! carrying whatever the response body could tell us.

use crate::admin_api::types::RemoteResponse;
use reqwest::StatusCode;
use serde_json::Value;
use std::fmt;

/// Status the API answers with when a uniqueness constraint is violated
pub const CONFLICT: u16 = 409;

/// Result of classifying a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The resource exists already; recoverable
    AlreadyExists,
    /// Any other status, with full diagnostic detail
    Diagnostic(RemoteFailure),
}

/// A non-success response from the management API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFailure {
    pub status: u16,
    /// Canonical reason phrase for `status`, empty when the status has none
    pub reason: String,
    pub body: ErrorBody,
}

/// What could be read from an error response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorBody {
    /// The body was a JSON object
    Structured(ErrorDetails),
    /// The body was empty or not a JSON object
    Unreadable(String),
}

/// Error fields reported by the API
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorDetails {
    pub error: Option<String>,
    pub error_description: Option<String>,
    /// Keycloak's admin endpoints report `errorMessage` instead of `error`
    pub error_message: Option<String>,
}

/// Classify a response whose status is not the designated "created" status
pub fn classify(response: &RemoteResponse) -> Classification {
    if response.status == CONFLICT {
        Classification::AlreadyExists
    } else {
        Classification::Diagnostic(RemoteFailure::from_response(response))
    }
}

impl RemoteFailure {
    pub fn from_response(response: &RemoteResponse) -> Self {
        Self {
            status: response.status,
            reason: reason_phrase(response.status),
            body: match &response.body_error {
                Some(error) => ErrorBody::Unreadable(format!("failed to read body: {}", error)),
                None => ErrorBody::parse(&response.body),
            },
        }
    }
}

fn reason_phrase(status: u16) -> String {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or_default()
        .to_string()
}

impl ErrorBody {
    pub fn parse(body: &str) -> Self {
        if body.trim().is_empty() {
            return ErrorBody::Unreadable("empty body".to_string());
        }

        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => ErrorBody::Structured(ErrorDetails {
                error: map.get("error").map(field_text),
                error_description: map.get("error_description").map(field_text),
                error_message: map.get("errorMessage").map(field_text),
            }),
            Ok(other) => ErrorBody::Unreadable(format!(
                "expected a JSON object, found {}",
                json_type_name(&other)
            )),
            Err(e) => ErrorBody::Unreadable(e.to_string()),
        }
    }
}

fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status: {}", self.status)?;
        if !self.reason.is_empty() {
            write!(f, ", reason: {}", self.reason)?;
        }
        write!(f, ", {}", self.body)
    }
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorBody::Structured(details) => {
                let unset = "<none>";
                write!(
                    f,
                    "error: {}, error_description: {}",
                    details.error.as_deref().unwrap_or(unset),
                    details.error_description.as_deref().unwrap_or(unset)
                )?;
                if let Some(message) = &details.error_message {
                    write!(f, ", errorMessage: {}", message)?;
                }
                Ok(())
            }
            ErrorBody::Unreadable(why) => write!(f, "body unreadable ({})", why),
        }
    }
}
