use crate::admin_api::client::AdminSession;
use crate::admin_api::types::AdminError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Identity claims read from an access token, for diagnostic display
///
/// Every claim is optional: a token lacking one, or carrying one with an
/// unexpected type, still decodes and the field is simply empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject - the authenticated user's ID
    #[serde(rename = "sub", default, deserialize_with = "lenient_string")]
    pub subject: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub preferred_username: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub given_name: Option<String>,
    /// Issuer - the realm URL that signed the token
    #[serde(rename = "iss", default, deserialize_with = "lenient_string")]
    pub issuer: Option<String>,
    /// Expiration time (Unix timestamp, fractional seconds truncated)
    #[serde(rename = "exp", default, deserialize_with = "lenient_numeric_date")]
    pub expires_at: Option<i64>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// NumericDate may be an integer or a float
fn lenient_numeric_date<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|secs| secs.is_finite())
                .map(|secs| secs.floor() as i64)
        }),
        _ => None,
    })
}

impl AccessTokenClaims {
    /// Expiration as a UTC timestamp, if the token carries one
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        self.expires_at
            .and_then(|exp| DateTime::<Utc>::from_timestamp(exp, 0))
    }

    /// Check if the token has expired; tokens without `exp` never do
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(exp) => exp < Utc::now().timestamp(),
            None => false,
        }
    }
}

impl fmt::Display for AccessTokenClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "subject: {}, preferredUsername: {}, givenName: {}",
            self.subject.as_deref().unwrap_or(""),
            self.preferred_username.as_deref().unwrap_or(""),
            self.given_name.as_deref().unwrap_or("")
        )
    }
}

/// Fetch the session's current access token and decode its claims
///
/// The session may refresh the token first. The signature is not verified:
/// the claims are only displayed, never trusted.
pub async fn inspect<S>(session: &S) -> Result<AccessTokenClaims, AdminError>
where
    S: AdminSession + ?Sized,
{
    let token = session.access_token().await?;
    tracing::debug!("Inspecting access token (length: {})", token.len());
    decode_access_token(&token)
}

/// Decode the payload of a signed token without verifying its signature
///
/// Fails with [`AdminError::Decode`] only on structural damage: a segment count
/// other than three, a header that is not a base64url JSON object with an
/// `alg` string, or a payload that is not a base64url JSON object. The
/// algorithm itself is not checked, so any JOSE algorithm is accepted.
pub fn decode_access_token(token: &str) -> Result<AccessTokenClaims, AdminError> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    if segments.len() != 3 {
        return Err(AdminError::Decode(format!(
            "expected 3 token segments, found {}",
            segments.len()
        )));
    }

    let header = decode_json_object("header", segments[0])?;
    let alg = match header.get("alg") {
        Some(Value::String(alg)) => alg.clone(),
        _ => {
            return Err(AdminError::Decode(
                "token header has no \"alg\" string".to_string(),
            ))
        }
    };

    let payload = decode_json_object("payload", segments[1])?;
    let claims: AccessTokenClaims = serde_json::from_value(Value::Object(payload))
        .map_err(|e| AdminError::Decode(format!("Invalid claims: {}", e)))?;

    tracing::debug!(
        "Access token decoded: alg={}, kid={:?}, sub={:?}",
        alg,
        header.get("kid").and_then(serde_json::Value::as_str),
        claims.subject
    );

    Ok(claims)
}

fn decode_json_object(
    part: &str,
    segment: &str,
) -> Result<serde_json::Map<String, Value>, AdminError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| AdminError::Decode(format!("Invalid {} encoding: {}", part, e)))?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AdminError::Decode(format!(
            "token {} is not a JSON object",
            part
        ))),
        Err(e) => Err(AdminError::Decode(format!("Invalid {} JSON: {}", part, e))),
    }
}
