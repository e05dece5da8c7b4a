//! Authenticated session shared by many short-lived service handles.
//!
//! The factory authenticates once on construction and then mints handles on
//! demand. Federated sessions carry a token with an expiry; a handle request
//! that lands inside the safety window re-authenticates first, so callers
//! never receive a handle whose token is about to lapse.
//!
//! Auth context, token expiry and the handle registry live behind a single
//! lock. Expiry check, mint and register therefore happen atomically, and
//! only one thread ever re-authenticates at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{
    AuthenticationResult, HttpServiceEndpoint, ServiceEndpoint, ServiceMetadata, TypeCatalog,
};
use crate::auth::{client_credentials_for, AuthMode, Credentials};
use crate::config::FactoryConfig;
use crate::error::{FactoryError, Result};

use super::handle::{Connection, HandleInner, ServiceHandle};

/// Everything established by one metadata download + authentication.
struct Session {
    credentials: Credentials,
    metadata: Arc<ServiceMetadata>,
    authentication: Arc<AuthenticationResult>,
    /// Cached per metadata download, fetched on first enriched mint
    type_catalog: Option<Arc<TypeCatalog>>,
}

struct FactoryState {
    session: Session,
    handles: IndexMap<Uuid, Arc<HandleInner>>,
    closed: bool,
}

pub(crate) struct FactoryShared {
    service_url: String,
    endpoint: Arc<dyn ServiceEndpoint>,
    safety_window: chrono::Duration,
    type_enrichment: AtomicBool,
    state: Mutex<FactoryState>,
}

impl FactoryShared {
    /// Drop a closed handle from the registry.
    pub(crate) fn release(&self, id: Uuid) {
        let removed = self.state.lock().handles.shift_remove(&id);
        if removed.is_some() {
            debug!(handle = %id, "Service handle released");
        }
    }
}

/// Mints service handles against one authenticated organization session.
///
/// Share it between threads with `Arc<ServiceFactory>`. Dropping the factory
/// closes every handle it still tracks.
pub struct ServiceFactory {
    shared: Arc<FactoryShared>,
}

impl ServiceFactory {
    /// Connect over HTTP with default configuration.
    pub fn new(endpoint_url: &str, credentials: Credentials) -> Result<Self> {
        Self::with_config(endpoint_url, credentials, FactoryConfig::default())
    }

    pub fn with_config(
        endpoint_url: &str,
        credentials: Credentials,
        config: FactoryConfig,
    ) -> Result<Self> {
        validate_endpoint_url(endpoint_url)?;
        let endpoint =
            HttpServiceEndpoint::new(config.request_timeout()).map_err(FactoryError::Connectivity)?;
        Self::with_endpoint(endpoint_url, credentials, Arc::new(endpoint), config)
    }

    /// Build a factory on top of any endpoint implementation.
    ///
    /// Downloads metadata and authenticates before returning.
    pub fn with_endpoint(
        endpoint_url: &str,
        credentials: Credentials,
        endpoint: Arc<dyn ServiceEndpoint>,
        config: FactoryConfig,
    ) -> Result<Self> {
        validate_endpoint_url(endpoint_url)?;

        let (metadata, authentication) = establish(endpoint.as_ref(), endpoint_url, &credentials)?;
        info!(
            url = endpoint_url,
            mode = ?authentication.auth_mode(),
            organization = ?metadata.organization_name,
            "Organization service session established"
        );

        let state = FactoryState {
            session: Session {
                credentials,
                metadata: Arc::new(metadata),
                authentication: Arc::new(authentication),
                type_catalog: None,
            },
            handles: IndexMap::new(),
            closed: false,
        };

        Ok(Self {
            shared: Arc::new(FactoryShared {
                service_url: endpoint_url.to_string(),
                endpoint,
                safety_window: config.safety_window(),
                type_enrichment: AtomicBool::new(config.type_enrichment),
                state: Mutex::new(state),
            }),
        })
    }

    /// Re-download metadata and authenticate with a new credential set.
    ///
    /// On failure the previous session stays in place untouched.
    pub fn refresh(&self, credentials: Credentials) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.closed {
            return Err(FactoryError::FactoryClosed);
        }

        let (metadata, authentication) =
            establish(self.shared.endpoint.as_ref(), &self.shared.service_url, &credentials)?;
        info!(
            username = credentials.username(),
            mode = ?authentication.auth_mode(),
            "Organization service session refreshed"
        );

        state.session = Session {
            credentials,
            metadata: Arc::new(metadata),
            authentication: Arc::new(authentication),
            type_catalog: None,
        };
        Ok(())
    }

    pub fn create_handle(&self) -> Result<ServiceHandle> {
        self.mint(None)
    }

    /// Mint a handle whose calls run as `caller_id` instead of the
    /// authenticated principal.
    pub fn create_handle_as(&self, caller_id: Uuid) -> Result<ServiceHandle> {
        self.mint(Some(caller_id))
    }

    pub fn create_service(&self, caller_id: Option<Uuid>) -> Result<ServiceHandle> {
        match caller_id {
            Some(caller_id) => self.create_handle_as(caller_id),
            None => self.create_handle(),
        }
    }

    fn mint(&self, caller_id: Option<Uuid>) -> Result<ServiceHandle> {
        let shared = &self.shared;
        let mut guard = shared.state.lock();
        let state = &mut *guard;
        if state.closed {
            return Err(FactoryError::FactoryClosed);
        }
        let session = &mut state.session;

        if let Some(expiry) = session.authentication.token_expiry() {
            if inside_safety_window(expiry, shared.safety_window) {
                info!(expires_at = %expiry, "Security token near expiry, re-authenticating");
                let renewed = authenticate(
                    shared.endpoint.as_ref(),
                    &session.metadata,
                    &session.credentials,
                )?;
                session.authentication = Arc::new(renewed);
            }
        }

        let type_catalog = if shared.type_enrichment.load(Ordering::SeqCst) {
            let catalog = match session.type_catalog.clone() {
                Some(catalog) => catalog,
                None => {
                    let catalog = shared
                        .endpoint
                        .fetch_type_catalog(&session.metadata, &session.authentication)
                        .map_err(FactoryError::Connectivity)?;
                    let catalog = Arc::new(catalog);
                    session.type_catalog = Some(Arc::clone(&catalog));
                    catalog
                }
            };
            Some(catalog)
        } else {
            None
        };

        let connection = Connection {
            metadata: Arc::clone(&session.metadata),
            authentication: Arc::clone(&session.authentication),
        };
        let inner = Arc::new(HandleInner::new(
            Arc::downgrade(shared),
            Arc::clone(&shared.endpoint),
            connection,
            caller_id,
            type_catalog,
        ));
        state.handles.insert(inner.id(), Arc::clone(&inner));
        debug!(
            handle = %inner.id(),
            caller = ?caller_id,
            live = state.handles.len(),
            "Service handle created"
        );

        Ok(ServiceHandle::new(inner))
    }

    /// Toggle type enrichment for handles minted from now on.
    pub fn set_type_enrichment(&self, enabled: bool) {
        self.shared.type_enrichment.store(enabled, Ordering::SeqCst);
    }

    pub fn type_enrichment(&self) -> bool {
        self.shared.type_enrichment.load(Ordering::SeqCst)
    }

    /// Close every live handle, newest first. Safe to call more than once.
    pub fn close(&self) {
        // Snapshot, then close with the lock released: each handle takes
        // the lock again to deregister itself.
        let snapshot: Vec<Arc<HandleInner>> = {
            let mut state = self.shared.state.lock();
            state.closed = true;
            state.handles.values().rev().cloned().collect()
        };

        if !snapshot.is_empty() {
            info!(count = snapshot.len(), "Closing live service handles");
        }
        for handle in snapshot {
            handle.close();
        }

        let mut state = self.shared.state.lock();
        if !state.handles.is_empty() {
            warn!(
                remaining = state.handles.len(),
                "Handles still registered after close, dropping them"
            );
            state.handles.clear();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.shared.state.lock().session.authentication.auth_mode()
    }

    /// Expiry of the current security token (federated sessions only)
    pub fn token_expiry(&self) -> Option<DateTime<Utc>> {
        self.shared.state.lock().session.authentication.token_expiry()
    }

    /// Number of handles minted and not yet closed
    pub fn live_handles(&self) -> usize {
        self.shared.state.lock().handles.len()
    }

    pub fn organization_name(&self) -> Option<String> {
        self.shared
            .state
            .lock()
            .session
            .metadata
            .organization_name
            .clone()
    }

    pub fn service_url(&self) -> &str {
        &self.shared.service_url
    }
}

impl Drop for ServiceFactory {
    fn drop(&mut self) {
        self.close();
    }
}

fn validate_endpoint_url(endpoint_url: &str) -> Result<()> {
    if endpoint_url.trim().is_empty() {
        return Err(FactoryError::InvalidArgument("endpoint URL must not be empty"));
    }
    Ok(())
}

/// True when `expiry` falls within `window` from now. A window too large to
/// add to the current time always counts as inside.
fn inside_safety_window(expiry: DateTime<Utc>, window: chrono::Duration) -> bool {
    Utc::now()
        .checked_add_signed(window)
        .map_or(true, |deadline| deadline > expiry)
}

fn establish(
    endpoint: &dyn ServiceEndpoint,
    service_url: &str,
    credentials: &Credentials,
) -> Result<(ServiceMetadata, AuthenticationResult)> {
    let metadata = endpoint
        .download_metadata(service_url)
        .map_err(FactoryError::Connectivity)?;
    let authentication = authenticate(endpoint, &metadata, credentials)?;
    Ok((metadata, authentication))
}

fn authenticate(
    endpoint: &dyn ServiceEndpoint,
    metadata: &ServiceMetadata,
    credentials: &Credentials,
) -> Result<AuthenticationResult> {
    let client_credentials = client_credentials_for(
        &metadata.authentication_type,
        credentials.username(),
        credentials.password(),
        credentials.domain(),
    )?;
    endpoint
        .authenticate(metadata, client_credentials)
        .map_err(FactoryError::from_authentication)
}
