use crate::admin_api::jwt::decode_access_token;
use crate::admin_api::types::{AdminError, ApiError, RemoteResponse, TokenResponse};
use crate::config::ConnectionConfig;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use url::Url;

/// Tokens expiring within this window are refreshed before use
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(30);

/// Capabilities the provisioning workflow needs from an authenticated session
///
/// [`AdminClient`] implements this over HTTP. The trait is object safe so the
/// orchestrator and provisioners can run against any session implementation.
pub trait AdminSession: Send + Sync {
    /// Current bearer token, refreshed first if it is about to expire
    fn access_token(&self) -> Pin<Box<dyn Future<Output = Result<String, AdminError>> + Send + '_>>;

    /// POST to an admin endpoint given as path segments below the admin root
    ///
    /// Returns `Ok` whenever the API answered, whatever the status. `Err` means
    /// no response was obtained.
    fn post<'a>(
        &'a self,
        segments: &'a [&'a str],
        body: Option<&'a Value>,
    ) -> Pin<Box<dyn Future<Output = Result<RemoteResponse, ApiError>> + Send + 'a>>;
}

/// Access token held by a session
struct CachedToken {
    access_token: String,
    refresh_token: Option<String>,
    /// `None` when neither the grant nor the token states an expiry; such a
    /// token is used until the server rejects it
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn from_response(response: TokenResponse) -> Self {
        let lifetime = response
            .expires_in
            .map(Duration::from_secs)
            .or_else(|| lifetime_from_claims(&response.access_token));
        if lifetime.is_none() {
            tracing::debug!("Token grant states no expiry; keeping token until rejected");
        }

        Self {
            expires_at: lifetime.map(|lifetime| Instant::now() + lifetime),
            access_token: response.access_token,
            refresh_token: response.refresh_token,
        }
    }

    fn is_fresh(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at > Instant::now() + TOKEN_REFRESH_MARGIN,
            None => true,
        }
    }
}

/// Remaining lifetime according to the token's own `exp` claim
fn lifetime_from_claims(access_token: &str) -> Option<Duration> {
    let expires_at = decode_access_token(access_token).ok()?.expires_at?;
    let remaining = expires_at.saturating_sub(Utc::now().timestamp());
    Some(Duration::from_secs(u64::try_from(remaining).unwrap_or(0)))
}

/// HTTP client for the identity provider's admin REST API
///
/// Owns the session state: the credentials it authenticates with and the
/// cached access token. Created with [`AdminClient::connect`], which performs
/// the initial password grant.
pub struct AdminClient {
    /// Server root, e.g. `http://localhost:8080/auth`
    server_url: Url,
    /// Realm the admin account authenticates against
    realm: String,
    client_id: String,
    username: String,
    password: SecretString,
    client: reqwest::Client,
    token: RwLock<Option<CachedToken>>,
}

impl fmt::Debug for AdminClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminClient")
            .field("server_url", &self.server_url.as_str())
            .field("realm", &self.realm)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl AdminClient {
    /// Establish an authenticated admin session
    ///
    /// Builds the HTTP client from the connection settings and obtains the
    /// first access token with the password grant. A failure here is fatal
    /// to a provisioning run, since no later call can succeed without it.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use iam_provisioner::{AdminClient, ConnectionConfig};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = ConnectionConfig::default();
    /// let client = AdminClient::connect(&config).await?;
    /// println!("Connected to {}", client.server_url());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, AdminError> {
        let server_url = Url::parse(&config.server_url).map_err(|e| {
            AdminError::Config(format!("Invalid server URL '{}': {}", config.server_url, e))
        })?;
        if server_url.cannot_be_a_base() {
            return Err(AdminError::Config(format!(
                "Server URL '{}' cannot be used as a base URL",
                config.server_url
            )));
        }

        let mut builder =
            reqwest::Client::builder().pool_max_idle_per_host(config.connection_pool_size);
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ApiError::Request(format!("Failed to create HTTP client: {}", e)))?;

        tracing::debug!(
            "Creating AdminClient for {} (realm={}, client_id={}, pool={})",
            server_url,
            config.realm,
            config.client_id,
            config.connection_pool_size
        );

        let admin = Self {
            server_url,
            realm: config.realm.clone(),
            client_id: config.client_id.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            client,
            token: RwLock::new(None),
        };

        let response = admin.password_grant().await.map_err(|e| {
            tracing::error!("Failed to establish admin session: {}", e);
            e
        })?;
        tracing::info!(
            "Admin session established for user '{}' in realm '{}'",
            admin.username,
            admin.realm
        );
        *admin.token.write().await = Some(CachedToken::from_response(response));

        Ok(admin)
    }

    /// Get the server URL for this client
    pub fn server_url(&self) -> &str {
        self.server_url.as_str()
    }

    /// Realm the session is authenticated against
    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Return the cached token, or obtain a new one if it is about to expire
    ///
    /// A refresh grant is tried first when a refresh token is held; if the
    /// server rejects it the session falls back to the password grant.
    pub async fn current_token(&self) -> Result<String, AdminError> {
        {
            let guard = self.token.read().await;
            if let Some(token) = guard.as_ref() {
                if token.is_fresh() {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut guard = self.token.write().await;
        // Another caller may have refreshed while we waited for the lock
        if let Some(token) = guard.as_ref() {
            if token.is_fresh() {
                return Ok(token.access_token.clone());
            }
        }

        let refresh_token = guard.as_ref().and_then(|t| t.refresh_token.clone());
        let response = match refresh_token {
            Some(refresh_token) => match self.refresh_grant(&refresh_token).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!("Token refresh rejected, repeating password grant: {}", e);
                    self.password_grant().await?
                }
            },
            None => self.password_grant().await?,
        };

        let cached = CachedToken::from_response(response);
        let access_token = cached.access_token.clone();
        *guard = Some(cached);
        Ok(access_token)
    }

    async fn password_grant(&self) -> Result<TokenResponse, ApiError> {
        tracing::debug!("Requesting access token with password grant");
        let form = [
            ("grant_type", "password"),
            ("client_id", self.client_id.as_str()),
            ("username", self.username.as_str()),
            ("password", self.password.expose_secret()),
        ];
        self.request_token(&form).await
    }

    async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenResponse, ApiError> {
        tracing::debug!("Refreshing access token");
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("refresh_token", refresh_token),
        ];
        self.request_token(&form).await
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse, ApiError> {
        let url = self.endpoint(&[
            "realms",
            self.realm.as_str(),
            "protocol",
            "openid-connect",
            "token",
        ])?;

        let response = self
            .client
            .post(url.clone())
            .form(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send token request to {}: {}", url, e);
                ApiError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!(
                "Token request failed: HTTP {} - {}",
                status.as_u16(),
                error_body
            );
            return Err(ApiError::Http {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse token response: {}", e);
            ApiError::Parse(format!("Failed to parse token response JSON: {}", e))
        })?;

        tracing::debug!(
            "Access token received (length: {}, expires_in: {:?})",
            token.access_token.len(),
            token.expires_in
        );
        Ok(token)
    }

    async fn send_admin(
        &self,
        segments: &[&str],
        body: Option<&Value>,
    ) -> Result<RemoteResponse, ApiError> {
        let token = self.current_token().await.map_err(|e| match e {
            // The token endpoint was unreachable: no response at all
            AdminError::Api(ApiError::Network(msg)) => ApiError::Network(msg),
            other => {
                tracing::error!("No access token for admin request: {}", other);
                ApiError::Authentication(other.to_string())
            }
        })?;

        let mut full_path = Vec::with_capacity(segments.len() + 1);
        full_path.push("admin");
        full_path.extend_from_slice(segments);
        let url = self.endpoint(&full_path)?;

        tracing::debug!("POST {}", url);

        let mut request = self.client.post(url.clone()).bearer_auth(&token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!("Failed to send request to {}: {}", url, e);
            ApiError::from(e)
        })?;

        let status = response.status().as_u16();
        tracing::debug!("Received HTTP {} from {}", status, url);

        if status == 401 {
            self.discard_token(&token).await;
        }

        match response.text().await {
            Ok(body) => Ok(RemoteResponse::new(status, body)),
            Err(e) => {
                tracing::warn!("Failed to read response body from {}: {}", url, e);
                Ok(RemoteResponse::unreadable(status, e.to_string()))
            }
        }
    }

    /// Drop `rejected` from the cache so the next call obtains a new token
    async fn discard_token(&self, rejected: &str) {
        let mut guard = self.token.write().await;
        if guard.as_ref().map(|t| t.access_token.as_str()) == Some(rejected) {
            tracing::warn!("Access token rejected by the server; discarding it");
            *guard = None;
        }
    }

    /// Server URL with `segments` appended, each percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.server_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ApiError::Request(format!(
                    "Server URL cannot be a base: {}",
                    self.server_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

impl AdminSession for AdminClient {
    fn access_token(&self) -> Pin<Box<dyn Future<Output = Result<String, AdminError>> + Send + '_>> {
        Box::pin(self.current_token())
    }

    fn post<'a>(
        &'a self,
        segments: &'a [&'a str],
        body: Option<&'a Value>,
    ) -> Pin<Box<dyn Future<Output = Result<RemoteResponse, ApiError>> + Send + 'a>> {
        Box::pin(self.send_admin(segments, body))
    }
}
