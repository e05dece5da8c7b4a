//! Authentication provider types and the client credential payload derived
//! from them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FactoryError, Result};

/// Authentication provider reported by the service metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthenticationProviderType {
    #[default]
    None,
    ActiveDirectory,
    Federation,
    LiveId,
    OnlineFederation,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for AuthenticationProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "None",
            Self::ActiveDirectory => "ActiveDirectory",
            Self::Federation => "Federation",
            Self::LiveId => "LiveId",
            Self::OnlineFederation => "OnlineFederation",
            Self::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// How the factory's current session was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Integrated Windows credentials, no expiring token
    WindowsIntegrated,
    /// Claims-based security token with an expiry
    Federated,
    /// Anonymous endpoint
    None,
}

/// Credential payload sent to the authentication endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ClientCredentials {
    Windows {
        username: String,
        password: String,
        domain: String,
    },
    UserName { username: String, password: String },
    Anonymous,
}

impl ClientCredentials {
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::Windows { username, .. } | Self::UserName { username, .. } => Some(username),
            Self::Anonymous => None,
        }
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Windows {
                username, domain, ..
            } => f
                .debug_struct("Windows")
                .field("username", username)
                .field("domain", domain)
                .finish_non_exhaustive(),
            Self::UserName { username, .. } => f
                .debug_struct("UserName")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::Anonymous => f.write_str("Anonymous"),
        }
    }
}

/// Pick the credential shape the endpoint expects for its provider type.
pub fn client_credentials_for(
    provider: &AuthenticationProviderType,
    username: &str,
    password: &str,
    domain: &str,
) -> Result<ClientCredentials> {
    match provider {
        AuthenticationProviderType::ActiveDirectory => Ok(ClientCredentials::Windows {
            username: username.to_string(),
            password: password.to_string(),
            domain: domain.to_string(),
        }),
        AuthenticationProviderType::Federation | AuthenticationProviderType::OnlineFederation => {
            Ok(ClientCredentials::UserName {
                username: username.to_string(),
                password: password.to_string(),
            })
        }
        AuthenticationProviderType::None => Ok(ClientCredentials::Anonymous),
        other => Err(FactoryError::UnsupportedAuthMode(other.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_directory_embeds_domain() {
        let creds = client_credentials_for(
            &AuthenticationProviderType::ActiveDirectory,
            "jdoe",
            "pw",
            "CONTOSO",
        )
        .unwrap();
        assert_eq!(
            creds,
            ClientCredentials::Windows {
                username: "jdoe".into(),
                password: "pw".into(),
                domain: "CONTOSO".into(),
            }
        );
    }

    #[test]
    fn test_federated_variants_use_user_name_credential() {
        for provider in [
            AuthenticationProviderType::Federation,
            AuthenticationProviderType::OnlineFederation,
        ] {
            let creds = client_credentials_for(&provider, "jdoe", "pw", "CONTOSO").unwrap();
            assert_eq!(
                creds,
                ClientCredentials::UserName {
                    username: "jdoe".into(),
                    password: "pw".into(),
                }
            );
        }
    }

    #[test]
    fn test_none_is_anonymous() {
        let creds =
            client_credentials_for(&AuthenticationProviderType::None, "jdoe", "pw", "").unwrap();
        assert_eq!(creds, ClientCredentials::Anonymous);
        assert_eq!(creds.username(), None);
    }

    #[test]
    fn test_unsupported_providers() {
        for provider in [
            AuthenticationProviderType::LiveId,
            AuthenticationProviderType::Unknown,
        ] {
            let err = client_credentials_for(&provider, "u", "p", "d").unwrap_err();
            assert!(matches!(err, FactoryError::UnsupportedAuthMode(p) if p == provider));
        }
    }

    #[test]
    fn test_provider_type_deserializes_unknown_names() {
        let parsed: AuthenticationProviderType =
            serde_json::from_str("\"Kerberos\"").expect("unknown provider should parse");
        assert_eq!(parsed, AuthenticationProviderType::Unknown);

        let parsed: AuthenticationProviderType =
            serde_json::from_str("\"OnlineFederation\"").unwrap();
        assert_eq!(parsed, AuthenticationProviderType::OnlineFederation);
    }

    #[test]
    fn test_debug_hides_password() {
        let creds = ClientCredentials::UserName {
            username: "jdoe".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }
}
