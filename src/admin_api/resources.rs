use crate::admin_api::types::AdminError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Realm representation sent to `POST /realms`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealmRepresentation {
    /// Realm name, also the realm's identifier in every admin path
    pub realm: String,
    pub enabled: bool,
}

/// Credential embedded in a user creation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRepresentation {
    #[serde(rename = "type")]
    pub credential_type: String,
    pub value: String,
    /// Whether the user must change the credential on first login
    pub temporary: bool,
}

impl CredentialRepresentation {
    pub const PASSWORD: &'static str = "password";

    pub fn password(value: impl Into<String>, temporary: bool) -> Self {
        Self {
            credential_type: Self::PASSWORD.to_string(),
            value: value.into(),
            temporary,
        }
    }
}

/// User representation sent to `POST /realms/{realm}/users`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRepresentation {
    pub username: String,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub credentials: Vec<CredentialRepresentation>,
}

/// Role representation sent to `POST /realms/{realm}/roles`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRepresentation {
    pub name: String,
    pub client_role: bool,
}

/// Client representation sent to `POST /realms/{realm}/clients`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRepresentation {
    /// The identifier the API keys clients on; mirrors `name`
    pub client_id: String,
    pub name: String,
    pub enabled: bool,
}

/// The four resource kinds the provisioner knows how to create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Realm,
    User,
    Role,
    Client,
}

impl ResourceKind {
    /// Status the API answers with when the resource was created
    pub fn created_status(&self) -> u16 {
        match self {
            ResourceKind::Realm | ResourceKind::User | ResourceKind::Client => 201,
            ResourceKind::Role => 204,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Realm => "realm",
            ResourceKind::User => "user",
            ResourceKind::Role => "role",
            ResourceKind::Client => "client",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource to create, carrying the minimal fields its kind requires
///
/// Serializes to the bare representation (no tag), which is the JSON body of
/// the creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResourceSpec {
    Realm(RealmRepresentation),
    User(UserRepresentation),
    Role(RoleRepresentation),
    Client(ClientRepresentation),
}

impl ResourceSpec {
    /// An enabled realm
    pub fn realm(name: impl Into<String>) -> Self {
        ResourceSpec::Realm(RealmRepresentation {
            realm: name.into(),
            enabled: true,
        })
    }

    /// An enabled user with a single password credential
    pub fn user(username: impl Into<String>, password: impl Into<String>, temporary: bool) -> Self {
        ResourceSpec::User(UserRepresentation {
            username: username.into(),
            enabled: true,
            credentials: vec![CredentialRepresentation::password(password, temporary)],
        })
    }

    pub fn role(name: impl Into<String>, client_role: bool) -> Self {
        ResourceSpec::Role(RoleRepresentation {
            name: name.into(),
            client_role,
        })
    }

    /// An enabled client whose `clientId` is its name
    pub fn client(name: impl Into<String>) -> Self {
        let name = name.into();
        ResourceSpec::Client(ClientRepresentation {
            client_id: name.clone(),
            name,
            enabled: true,
        })
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSpec::Realm(_) => ResourceKind::Realm,
            ResourceSpec::User(_) => ResourceKind::User,
            ResourceSpec::Role(_) => ResourceKind::Role,
            ResourceSpec::Client(_) => ResourceKind::Client,
        }
    }

    /// The natural key the API uses for conflict detection
    pub fn name(&self) -> &str {
        match self {
            ResourceSpec::Realm(realm) => &realm.realm,
            ResourceSpec::User(user) => &user.username,
            ResourceSpec::Role(role) => &role.name,
            ResourceSpec::Client(client) => &client.name,
        }
    }

    /// Path segments of the creation endpoint, relative to the admin root
    ///
    /// A realm is created at the top level, so `realm` is ignored for it.
    pub fn path_segments<'a>(&'a self, realm: &'a str) -> Vec<&'a str> {
        match self {
            ResourceSpec::Realm(_) => vec!["realms"],
            ResourceSpec::User(_) => vec!["realms", realm, "users"],
            ResourceSpec::Role(_) => vec!["realms", realm, "roles"],
            ResourceSpec::Client(_) => vec!["realms", realm, "clients"],
        }
    }

    /// Check the invariants that must hold before a creation request is sent
    pub fn validate(&self) -> Result<(), AdminError> {
        if self.name().trim().is_empty() {
            return Err(AdminError::InvalidResource(format!(
                "{} name must not be empty",
                self.kind()
            )));
        }

        if let ResourceSpec::User(user) = self {
            for credential in &user.credentials {
                if credential.credential_type.trim().is_empty() {
                    return Err(AdminError::InvalidResource(format!(
                        "credential type for user '{}' must not be empty",
                        user.username
                    )));
                }
            }
        }

        Ok(())
    }
}
