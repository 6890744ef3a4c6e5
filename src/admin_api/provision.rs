//! Idempotent creation of admin resources.
//!
//! [`provision`] issues exactly one create request and folds the answer into a
//! [`ProvisionOutcome`]. A conflict is reported as [`ProvisionOutcome::AlreadyExists`]
//! rather than as a failure, so running the same plan again converges instead
//! of erroring. There is no retry: repeating the call is what makes it idempotent.

use crate::admin_api::classify::{classify, Classification, RemoteFailure};
use crate::admin_api::client::AdminSession;
use crate::admin_api::resources::ResourceSpec;
use crate::admin_api::types::{ApiError, RemoteResponse};
use std::fmt;

/// Result of one provisioning call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Created,
    AlreadyExists,
    Failed(Diagnostic),
}

impl ProvisionOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, ProvisionOutcome::Failed(_))
    }
}

/// Why a provisioning call or administrative action failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The API answered with a status other than the expected one
    Remote(RemoteFailure),
    /// No response was obtained
    Transport(String),
    /// The session could not supply an access token, so nothing was sent
    Authentication(String),
    /// The resource was rejected locally; nothing was sent
    Invalid(String),
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Remote(failure) => write!(f, "{}", failure),
            Diagnostic::Transport(msg) => write!(f, "transport failure: {}", msg),
            Diagnostic::Authentication(msg) => write!(f, "authentication failure: {}", msg),
            Diagnostic::Invalid(msg) => f.write_str(msg),
        }
    }
}

/// Create `spec` in `realm`, treating "already exists" as success
///
/// `realm` scopes users, roles and clients; it is ignored for a realm spec,
/// whose own name is the scope.
pub async fn provision<S>(session: &S, realm: &str, spec: &ResourceSpec) -> ProvisionOutcome
where
    S: AdminSession + ?Sized,
{
    let kind = spec.kind();
    let name = spec.name();

    if let Err(e) = spec.validate() {
        tracing::warn!("Skipping {} '{}': {}", kind, name, e);
        return ProvisionOutcome::Failed(Diagnostic::Invalid(e.to_string()));
    }

    let body = match serde_json::to_value(spec) {
        Ok(body) => body,
        Err(e) => {
            return ProvisionOutcome::Failed(Diagnostic::Invalid(format!(
                "Failed to serialize {} '{}': {}",
                kind, name, e
            )))
        }
    };

    let segments = spec.path_segments(realm);
    tracing::debug!("Creating {} '{}' at /{}", kind, name, segments.join("/"));

    match session.post(&segments, Some(&body)).await {
        Ok(response) => outcome_for(spec, &response),
        Err(e) => {
            tracing::debug!("No response creating {} '{}': {}", kind, name, e);
            ProvisionOutcome::Failed(Diagnostic::from(e))
        }
    }
}

impl From<ApiError> for Diagnostic {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Authentication(msg) => Diagnostic::Authentication(msg),
            other => Diagnostic::Transport(other.to_string()),
        }
    }
}

fn outcome_for(spec: &ResourceSpec, response: &RemoteResponse) -> ProvisionOutcome {
    if response.status == spec.kind().created_status() {
        return ProvisionOutcome::Created;
    }

    match classify(response) {
        Classification::AlreadyExists => ProvisionOutcome::AlreadyExists,
        Classification::Diagnostic(failure) => {
            tracing::debug!(
                "Creating {} '{}' returned HTTP {}",
                spec.kind(),
                spec.name(),
                failure.status
            );
            ProvisionOutcome::Failed(Diagnostic::Remote(failure))
        }
    }
}

/// Force logout of every active session in `realm`
///
/// Any 2xx answer counts as success.
pub async fn logout_all<S>(session: &S, realm: &str) -> Result<(), Diagnostic>
where
    S: AdminSession + ?Sized,
{
    let segments = ["realms", realm, "logout-all"];
    tracing::debug!("Logging out all sessions in realm '{}'", realm);

    match session.post(&segments, None).await {
        Ok(response) if response.is_success() => Ok(()),
        Ok(response) => Err(Diagnostic::Remote(RemoteFailure::from_response(&response))),
        Err(e) => Err(Diagnostic::from(e)),
    }
}
