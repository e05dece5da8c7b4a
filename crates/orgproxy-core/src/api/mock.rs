//! Scriptable in-memory endpoint for exercising the factory without a server.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{Duration, Utc};
use parking_lot::Mutex;
use serde_json::{json, Map};
use uuid::Uuid;

use crate::auth::{AuthenticationProviderType, ClientCredentials};

use super::{
    ApiError, AuthenticationResult, OrganizationRequest, OrganizationResponse,
    SecurityTokenResponse, ServiceEndpoint, ServiceMetadata, TypeCatalog,
};

pub const PRINCIPAL_ID: Uuid = Uuid::from_u128(0x0e65066c_ab20_4da0_b3bf_79dfd0668049);

pub struct MockEndpoint {
    provider: Mutex<AuthenticationProviderType>,
    /// Token lifetime for each upcoming authentication; `None` issues no token
    lifetimes: Mutex<VecDeque<Option<Duration>>>,
    default_lifetime: Option<Duration>,
    pub fail_metadata: AtomicBool,
    pub reject_credentials: AtomicBool,
    pub fail_disconnect: AtomicBool,
    pub metadata_calls: AtomicUsize,
    pub auth_calls: AtomicUsize,
    pub catalog_calls: AtomicUsize,
    pub execute_calls: AtomicUsize,
    pub authenticated_users: Mutex<Vec<String>>,
    /// Handle ids in the order their connections were released
    pub disconnected: Mutex<Vec<Uuid>>,
}

impl MockEndpoint {
    fn new(provider: AuthenticationProviderType, default_lifetime: Option<Duration>) -> Self {
        Self {
            provider: Mutex::new(provider),
            lifetimes: Mutex::new(VecDeque::new()),
            default_lifetime,
            fail_metadata: AtomicBool::new(false),
            reject_credentials: AtomicBool::new(false),
            fail_disconnect: AtomicBool::new(false),
            metadata_calls: AtomicUsize::new(0),
            auth_calls: AtomicUsize::new(0),
            catalog_calls: AtomicUsize::new(0),
            execute_calls: AtomicUsize::new(0),
            authenticated_users: Mutex::new(Vec::new()),
            disconnected: Mutex::new(Vec::new()),
        }
    }

    /// Windows-integrated endpoint: never issues a token
    pub fn integrated() -> Self {
        Self::new(AuthenticationProviderType::ActiveDirectory, None)
    }

    /// Federated endpoint issuing one-hour tokens unless scripted otherwise
    pub fn federated() -> Self {
        Self::new(AuthenticationProviderType::Federation, Some(Duration::hours(1)))
    }

    /// Queue the lifetime of the token issued by the next authentication
    pub fn push_lifetime(&self, lifetime: Duration) -> &Self {
        self.lifetimes.lock().push_back(Some(lifetime));
        self
    }

    pub fn set_provider(&self, provider: AuthenticationProviderType) {
        *self.provider.lock() = provider;
    }

    pub fn auth_count(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }
}

impl ServiceEndpoint for MockEndpoint {
    fn download_metadata(&self, service_url: &str) -> Result<ServiceMetadata, ApiError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_metadata.load(Ordering::SeqCst) {
            return Err(ApiError::InvalidResponse("Malformed service metadata".into()));
        }
        Ok(ServiceMetadata {
            service_url: service_url.to_string(),
            authentication_type: self.provider.lock().clone(),
            organization_name: Some("contoso".into()),
            issuer_endpoint: None,
        })
    }

    fn authenticate(
        &self,
        _metadata: &ServiceMetadata,
        credentials: ClientCredentials,
    ) -> Result<AuthenticationResult, ApiError> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_credentials.load(Ordering::SeqCst) {
            return Err(ApiError::Unauthorized);
        }
        if let Some(username) = credentials.username() {
            self.authenticated_users.lock().push(username.to_string());
        }

        let lifetime = self
            .lifetimes
            .lock()
            .pop_front()
            .unwrap_or(self.default_lifetime);
        let security_token_response = lifetime.map(|lifetime| SecurityTokenResponse {
            token: format!("token-{}", self.auth_count()),
            valid_to: Utc::now() + lifetime,
        });

        Ok(AuthenticationResult {
            client_credentials: credentials,
            security_token_response,
        })
    }

    fn fetch_type_catalog(
        &self,
        _metadata: &ServiceMetadata,
        _auth: &AuthenticationResult,
    ) -> Result<TypeCatalog, ApiError> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        let mut catalog = TypeCatalog::default();
        catalog.types.insert(
            "WhoAmI".into(),
            "Microsoft.Crm.Sdk.Messages.WhoAmIResponse".into(),
        );
        Ok(catalog)
    }

    fn execute(
        &self,
        _metadata: &ServiceMetadata,
        auth: &AuthenticationResult,
        caller_id: Option<Uuid>,
        request: &OrganizationRequest,
    ) -> Result<OrganizationResponse, ApiError> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);
        let mut results = Map::new();
        results.insert(
            "UserId".into(),
            json!(caller_id.unwrap_or(PRINCIPAL_ID).to_string()),
        );
        results.insert("BusinessUnitId".into(), json!(Uuid::nil().to_string()));
        results.insert("OrganizationId".into(), json!(Uuid::nil().to_string()));
        if let Some(ref token) = auth.security_token_response {
            results.insert("Token".into(), json!(token.token));
        }
        Ok(OrganizationResponse {
            response_name: request.request_name.clone(),
            results,
            type_name: None,
        })
    }

    fn disconnect(
        &self,
        handle_id: Uuid,
        _metadata: &ServiceMetadata,
        _auth: &AuthenticationResult,
    ) -> Result<(), ApiError> {
        self.disconnected.lock().push(handle_id);
        if self.fail_disconnect.load(Ordering::SeqCst) {
            return Err(ApiError::ServerError("connection reset".into()));
        }
        Ok(())
    }
}
