//! Organization service endpoint abstraction and its HTTP implementation.
//!
//! The factory only needs four things from the remote side: the service
//! metadata, an authentication round trip, an optional type catalog, and a
//! way to execute requests. `ServiceEndpoint` captures exactly that so the
//! factory can be driven by a mock in tests.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::{AuthMode, AuthenticationProviderType, ClientCredentials};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Header carrying the impersonated user id on every call.
pub const CALLER_ID_HEADER: &str = "MSCRMCallerID";

// ============================================================================
// Wire types
// ============================================================================

/// Description of an organization service, downloaded once per session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMetadata {
    /// URL the metadata was downloaded from
    #[serde(skip)]
    pub service_url: String,
    pub authentication_type: AuthenticationProviderType,
    #[serde(default)]
    pub organization_name: Option<String>,
    /// Security token service for federated providers
    #[serde(default)]
    pub issuer_endpoint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityTokenResponse {
    pub token: String,
    pub valid_to: DateTime<Utc>,
}

/// Outcome of authenticating: the credentials that were accepted and, for
/// federated providers, the issued security token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationResult {
    pub client_credentials: ClientCredentials,
    pub security_token_response: Option<SecurityTokenResponse>,
}

impl AuthenticationResult {
    /// Expiry of the security token, if one was issued
    pub fn token_expiry(&self) -> Option<DateTime<Utc>> {
        self.security_token_response.as_ref().map(|t| t.valid_to)
    }

    /// A security token means federated; without one the session is
    /// integrated (or anonymous) and never expires.
    pub fn auth_mode(&self) -> AuthMode {
        match (&self.security_token_response, &self.client_credentials) {
            (Some(_), _) => AuthMode::Federated,
            (None, ClientCredentials::Anonymous) => AuthMode::None,
            (None, _) => AuthMode::WindowsIntegrated,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    #[serde(default)]
    security_token_response: Option<SecurityTokenResponse>,
}

/// Mapping of response names to the richer type names the service reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCatalog {
    #[serde(default)]
    pub types: HashMap<String, String>,
}

impl TypeCatalog {
    pub fn resolve(&self, response_name: &str) -> Option<&str> {
        self.types.get(response_name).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationRequest {
    pub request_name: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl OrganizationRequest {
    pub fn new(request_name: impl Into<String>) -> Self {
        Self {
            request_name: request_name.into(),
            parameters: Map::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn who_am_i() -> Self {
        Self::new("WhoAmI")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationResponse {
    pub response_name: String,
    #[serde(default)]
    pub results: Map<String, Value>,
    /// Filled in from the type catalog when type enrichment is on
    #[serde(skip)]
    pub type_name: Option<String>,
}

/// Identity of the principal a call executes as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WhoAmIResponse {
    pub user_id: Uuid,
    pub business_unit_id: Uuid,
    pub organization_id: Uuid,
}

impl TryFrom<OrganizationResponse> for WhoAmIResponse {
    type Error = ApiError;

    fn try_from(response: OrganizationResponse) -> Result<Self, Self::Error> {
        serde_json::from_value(Value::Object(response.results))
            .map_err(|e| ApiError::InvalidResponse(format!("Malformed WhoAmI response: {}", e)))
    }
}

// ============================================================================
// Endpoint abstraction
// ============================================================================

/// Remote side of an organization service session.
pub trait ServiceEndpoint: Send + Sync {
    /// Download the service description for `service_url`
    fn download_metadata(&self, service_url: &str) -> Result<ServiceMetadata, ApiError>;

    /// Present credentials and obtain an authentication result
    fn authenticate(
        &self,
        metadata: &ServiceMetadata,
        credentials: ClientCredentials,
    ) -> Result<AuthenticationResult, ApiError>;

    /// Fetch the catalog used for type enrichment
    fn fetch_type_catalog(
        &self,
        metadata: &ServiceMetadata,
        auth: &AuthenticationResult,
    ) -> Result<TypeCatalog, ApiError>;

    /// Execute a request, optionally on behalf of `caller_id`
    fn execute(
        &self,
        metadata: &ServiceMetadata,
        auth: &AuthenticationResult,
        caller_id: Option<Uuid>,
        request: &OrganizationRequest,
    ) -> Result<OrganizationResponse, ApiError>;

    /// Release whatever the endpoint keeps for a closed handle
    fn disconnect(
        &self,
        _handle_id: Uuid,
        _metadata: &ServiceMetadata,
        _auth: &AuthenticationResult,
    ) -> Result<(), ApiError> {
        Ok(())
    }
}

// ============================================================================
// HTTP implementation
// ============================================================================

/// JSON-over-HTTP organization service endpoint.
/// Clone is cheap - reqwest::blocking::Client uses Arc internally.
#[derive(Clone)]
pub struct HttpServiceEndpoint {
    client: Client,
}

impl HttpServiceEndpoint {
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    fn url(service_url: &str, path: &str) -> String {
        format!("{}/{}", service_url.trim_end_matches('/'), path)
    }

    fn authorize(builder: RequestBuilder, auth: &AuthenticationResult) -> RequestBuilder {
        if let Some(ref token) = auth.security_token_response {
            return builder.bearer_auth(&token.token);
        }
        match &auth.client_credentials {
            ClientCredentials::Windows {
                username,
                password,
                domain,
            } => {
                let account = if domain.is_empty() {
                    username.clone()
                } else {
                    format!("{}\\{}", domain, username)
                };
                builder.basic_auth(account, Some(password))
            }
            ClientCredentials::UserName { username, password } => {
                builder.basic_auth(username, Some(password))
            }
            ClientCredentials::Anonymous => builder,
        }
    }

    /// Check if response is successful, returning an error with body if not.
    fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    fn parse_json<T: serde::de::DeserializeOwned>(
        response: Response,
        what: &str,
    ) -> Result<T, ApiError> {
        let text = response.text()?;
        serde_json::from_str(&text).map_err(|e| {
            warn!(error = %e, what, "Failed to parse service response");
            ApiError::InvalidResponse(format!("Malformed {}: {}", what, e))
        })
    }
}

impl ServiceEndpoint for HttpServiceEndpoint {
    fn download_metadata(&self, service_url: &str) -> Result<ServiceMetadata, ApiError> {
        let url = Self::url(service_url, "metadata");
        debug!(url = %url, "Downloading service metadata");

        let response = self.client.get(&url).send()?;
        let response = Self::check_response(response)?;

        let mut metadata: ServiceMetadata = Self::parse_json(response, "service metadata")?;
        metadata.service_url = service_url.to_string();
        Ok(metadata)
    }

    fn authenticate(
        &self,
        metadata: &ServiceMetadata,
        credentials: ClientCredentials,
    ) -> Result<AuthenticationResult, ApiError> {
        let url = metadata
            .issuer_endpoint
            .clone()
            .unwrap_or_else(|| Self::url(&metadata.service_url, "authenticate"));
        debug!(url = %url, username = ?credentials.username(), "Authenticating");

        let response = self.client.post(&url).json(&credentials).send()?;
        let response = Self::check_response(response)?;
        let auth: AuthResponse = Self::parse_json(response, "authentication response")?;

        Ok(AuthenticationResult {
            client_credentials: credentials,
            security_token_response: auth.security_token_response,
        })
    }

    fn fetch_type_catalog(
        &self,
        metadata: &ServiceMetadata,
        auth: &AuthenticationResult,
    ) -> Result<TypeCatalog, ApiError> {
        let url = Self::url(&metadata.service_url, "types");
        let response = Self::authorize(self.client.get(&url), auth).send()?;
        let response = Self::check_response(response)?;
        Self::parse_json(response, "type catalog")
    }

    fn execute(
        &self,
        metadata: &ServiceMetadata,
        auth: &AuthenticationResult,
        caller_id: Option<Uuid>,
        request: &OrganizationRequest,
    ) -> Result<OrganizationResponse, ApiError> {
        let url = Self::url(&metadata.service_url, "execute");
        let mut builder = Self::authorize(self.client.post(&url), auth).json(request);
        if let Some(caller_id) = caller_id {
            builder = builder.header(CALLER_ID_HEADER, caller_id.to_string());
        }

        let response = Self::check_response(builder.send()?)?;
        Self::parse_json(response, "execute response")
    }
}
