/// Identity provider admin API integration module
///
/// This module holds everything that talks to the admin REST API: the
/// authenticated session, resource representations, response classification,
/// idempotent provisioning and access token inspection.
///
/// ## Provisioning Flow
///
/// 1. `AdminClient::connect` obtains an access token with the password grant
/// 2. Each resource is POSTed once to its collection endpoint
/// 3. The designated created status means the resource was created
/// 4. A conflict (409) means it already exists, which is also success
/// 5. Anything else is classified into a diagnostic and reported
pub mod classify;
pub mod client;
pub mod jwt;
pub mod provision;
pub mod resources;
pub mod types;

pub use classify::{classify, Classification, ErrorBody, ErrorDetails, RemoteFailure};
pub use client::{AdminClient, AdminSession};
pub use jwt::{decode_access_token, inspect, AccessTokenClaims};
pub use provision::{logout_all, provision, Diagnostic, ProvisionOutcome};
pub use resources::*;
pub use types::{AdminError, ApiError, RemoteResponse, TokenResponse};
