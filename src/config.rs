//! Configuration for a provisioning run.
//!
//! A run is described by two records: [`ConnectionConfig`], the credentials the
//! admin session is established with, and [`ProvisioningPlan`], the resources
//! to create. Both deserialize from TOML and every field has a default, so an
//! empty file (or no file) describes a local development server.
//!
//! ```toml
//! [connection]
//! server_url = "http://localhost:8080/auth"
//! realm = "master"
//! username = "admin"
//! password = "password"
//! client_id = "admin-cli"
//! connection_pool_size = 10
//!
//! [plan]
//! realm = "realm1"
//! username = "user1"
//! user_password = "password"
//! role = "role1"
//! client = "client1"
//! ```

use crate::admin_api::resources::ResourceSpec;
use crate::admin_api::types::AdminError;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const ENV_SERVER_URL: &str = "IAM_PROVISIONER_SERVER_URL";
pub const ENV_REALM: &str = "IAM_PROVISIONER_REALM";
pub const ENV_USERNAME: &str = "IAM_PROVISIONER_USERNAME";
pub const ENV_PASSWORD: &str = "IAM_PROVISIONER_PASSWORD";
pub const ENV_CLIENT_ID: &str = "IAM_PROVISIONER_CLIENT_ID";

/// Complete configuration of a provisioning run
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub connection: ConnectionConfig,
    pub plan: ProvisioningPlan,
}

/// Credentials and connection settings for the admin session
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Server root, including any context path (e.g. `/auth`)
    pub server_url: String,
    /// Realm the admin account lives in
    pub realm: String,
    pub username: String,
    pub password: SecretString,
    /// Client the admin account requests tokens through
    pub client_id: String,
    /// Idle connections kept per host
    pub connection_pool_size: usize,
    /// Per-request timeout; the HTTP client's default applies when unset
    pub request_timeout_secs: Option<u64>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080/auth".to_string(),
            realm: "master".to_string(),
            username: "admin".to_string(),
            password: SecretString::from("password".to_string()),
            client_id: "admin-cli".to_string(),
            connection_pool_size: 10,
            request_timeout_secs: None,
        }
    }
}

impl ConnectionConfig {
    pub fn new(
        server_url: impl Into<String>,
        realm: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            realm: realm.into(),
            username: username.into(),
            password: SecretString::from(password.into()),
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), AdminError> {
        let url = Url::parse(&self.server_url).map_err(|e| {
            AdminError::Config(format!("server_url '{}' is invalid: {}", self.server_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(AdminError::Config(format!(
                "server_url '{}' must be an http or https URL",
                self.server_url
            )));
        }

        require_non_empty("connection.realm", &self.realm)?;
        require_non_empty("connection.username", &self.username)?;
        require_non_empty("connection.client_id", &self.client_id)?;
        if self.password.expose_secret().is_empty() {
            return Err(AdminError::Config(
                "connection.password must not be empty".to_string(),
            ));
        }

        if self.connection_pool_size == 0 {
            return Err(AdminError::Config(
                "connection.connection_pool_size must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_secs == Some(0) {
            return Err(AdminError::Config(
                "connection.request_timeout_secs must be at least 1 when set".to_string(),
            ));
        }

        Ok(())
    }
}

/// Resources a run creates, in realm → user → role → client order
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProvisioningPlan {
    /// Realm to create, and the scope of everything else in the plan
    pub realm: String,
    pub username: String,
    pub user_password: SecretString,
    /// Whether the user must change the password on first login
    pub temporary_password: bool,
    pub role: String,
    pub client_role: bool,
    pub client: String,
}

impl Default for ProvisioningPlan {
    fn default() -> Self {
        Self {
            realm: "realm1".to_string(),
            username: "user1".to_string(),
            user_password: SecretString::from("password".to_string()),
            temporary_password: false,
            role: "role1".to_string(),
            client_role: true,
            client: "client1".to_string(),
        }
    }
}

impl ProvisioningPlan {
    /// The four resource specs of the plan, in provisioning order
    pub fn resource_specs(&self) -> Vec<ResourceSpec> {
        vec![
            ResourceSpec::realm(self.realm.clone()),
            ResourceSpec::user(
                self.username.clone(),
                self.user_password.expose_secret().to_string(),
                self.temporary_password,
            ),
            ResourceSpec::role(self.role.clone(), self.client_role),
            ResourceSpec::client(self.client.clone()),
        ]
    }

    pub fn validate(&self) -> Result<(), AdminError> {
        require_non_empty("plan.realm", &self.realm)?;
        require_non_empty("plan.username", &self.username)?;
        require_non_empty("plan.role", &self.role)?;
        require_non_empty("plan.client", &self.client)
    }
}

impl AppConfig {
    /// Load configuration for a run
    ///
    /// Layers, lowest precedence first: built-in defaults, the TOML file at
    /// `path`, the `ENV_*` variables resolved through `lookup`, then `adjust`
    /// (command-line flags). The result is validated once, after every layer
    /// has been applied.
    pub fn load(
        path: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
        adjust: impl FnOnce(&mut Self),
    ) -> Result<Self, AdminError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(lookup);
        adjust(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, AdminError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AdminError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, AdminError> {
        toml::from_str(content)
            .map_err(|e| AdminError::Config(format!("Failed to parse configuration: {}", e)))
    }

    /// Override connection settings from `lookup`, keyed by the `ENV_*` names
    ///
    /// Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let value = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(server_url) = value(ENV_SERVER_URL) {
            self.connection.server_url = server_url;
        }
        if let Some(realm) = value(ENV_REALM) {
            self.connection.realm = realm;
        }
        if let Some(username) = value(ENV_USERNAME) {
            self.connection.username = username;
        }
        if let Some(password) = value(ENV_PASSWORD) {
            tracing::debug!("Admin password taken from {}", ENV_PASSWORD);
            self.connection.password = SecretString::from(password);
        }
        if let Some(client_id) = value(ENV_CLIENT_ID) {
            self.connection.client_id = client_id;
        }
    }

    pub fn validate(&self) -> Result<(), AdminError> {
        self.connection.validate()?;
        self.plan.validate()
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), AdminError> {
    if value.trim().is_empty() {
        Err(AdminError::Config(format!("{} must not be empty", field)))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_describe_local_server() {
        let config = AppConfig::default();
        assert_eq!(config.connection.server_url, "http://localhost:8080/auth");
        assert_eq!(config.connection.realm, "master");
        assert_eq!(config.connection.client_id, "admin-cli");
        assert_eq!(config.connection.connection_pool_size, 10);
        assert_eq!(config.plan.realm, "realm1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.connection.username, "admin");
        assert_eq!(config.plan.client, "client1");
    }

    #[test]
    fn test_overrides_replace_connection_fields() {
        let env: HashMap<&str, &str> = [
            (ENV_SERVER_URL, "https://idp.example.com"),
            (ENV_PASSWORD, "s3cret"),
            (ENV_REALM, ""),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.connection.server_url, "https://idp.example.com");
        assert_eq!(config.connection.password.expose_secret(), "s3cret");
        // empty override is ignored
        assert_eq!(config.connection.realm, "master");
    }

    #[test]
    fn test_load_without_file_validates_after_adjust() {
        let config = AppConfig::load(None, |_| None, |config| {
            config.plan.realm = "staff".to_string();
        })
        .unwrap();
        assert_eq!(config.plan.realm, "staff");

        let result = AppConfig::load(None, |_| None, |config| config.plan.client.clear());
        assert!(matches!(result, Err(AdminError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_server_url() {
        let mut config = AppConfig::default();
        config.connection.server_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(AdminError::Config(_))));

        config.connection.server_url = "mailto:admin@example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_pool() {
        let mut config = AppConfig::default();
        config.connection.connection_pool_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("connection_pool_size"));
    }

    #[test]
    fn test_plan_specs_are_ordered() {
        let specs = ProvisioningPlan::default().resource_specs();
        let names: Vec<&str> = specs.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["realm1", "user1", "role1", "client1"]);
    }
}
