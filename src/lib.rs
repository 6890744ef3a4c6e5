//! IAM Provisioner
//!
//! A Rust library for idempotent provisioning against a Keycloak-style
//! identity provider admin REST API.
//!
//! This crate provides:
//! - An authenticated admin session with password grant and token refresh
//! - Idempotent creation of realms, users, roles and clients, where "already
//!   exists" counts as success
//! - Classification of failed responses into readable diagnostics
//! - Unverified decoding of access token claims for display
//! - A provisioning run that reports each step and never aborts on failure
//!
//! # Example
//!
//! ```no_run
//! use iam_provisioner::{AdminClient, AppConfig, Orchestrator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load(None, |key| std::env::var(key).ok(), |_| {})?;
//!
//! // Authenticate as the admin account
//! let client = AdminClient::connect(&config.connection).await?;
//!
//! // Create realm, user, role and client, then log out the realm's sessions
//! let report = Orchestrator::new(&client, &config.plan).run().await;
//! println!("failures: {}", report.has_failures());
//! # Ok(())
//! # }
//! ```

pub mod admin_api;
pub mod config;
pub mod orchestrator;

// Re-export commonly used types and functions
pub use admin_api::{
    classify::{classify, Classification, ErrorBody, RemoteFailure},
    client::{AdminClient, AdminSession},
    jwt::{decode_access_token, inspect, AccessTokenClaims},
    provision::{logout_all, provision, Diagnostic, ProvisionOutcome},
    resources::{
        ClientRepresentation, CredentialRepresentation, RealmRepresentation, ResourceKind,
        ResourceSpec, RoleRepresentation, UserRepresentation,
    },
    types::{AdminError, ApiError, RemoteResponse},
};
pub use config::{AppConfig, ConnectionConfig, ProvisioningPlan};
pub use orchestrator::{
    Orchestrator, ProgressEvent, ProgressSink, RunReport, Step, StepResult, TracingSink,
};
