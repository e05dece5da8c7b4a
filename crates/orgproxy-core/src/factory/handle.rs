//! Service handles minted by the factory.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::{
    AuthenticationResult, OrganizationRequest, OrganizationResponse, ServiceEndpoint,
    ServiceMetadata, TypeCatalog, WhoAmIResponse,
};
use crate::error::{FactoryError, Result};

use super::service_factory::FactoryShared;

/// Session context a handle was minted against.
#[derive(Clone)]
pub(crate) struct Connection {
    pub metadata: Arc<ServiceMetadata>,
    pub authentication: Arc<AuthenticationResult>,
}

pub(crate) struct HandleInner {
    id: Uuid,
    factory: Weak<FactoryShared>,
    endpoint: Arc<dyn ServiceEndpoint>,
    caller_id: Option<Uuid>,
    type_catalog: Option<Arc<TypeCatalog>>,
    connection: Mutex<Option<Connection>>,
    closed: AtomicBool,
}

impl HandleInner {
    pub(crate) fn new(
        factory: Weak<FactoryShared>,
        endpoint: Arc<dyn ServiceEndpoint>,
        connection: Connection,
        caller_id: Option<Uuid>,
        type_catalog: Option<Arc<TypeCatalog>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            factory,
            endpoint,
            caller_id,
            type_catalog,
            connection: Mutex::new(Some(connection)),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    /// Deregister from the owning factory, then release the connection.
    ///
    /// Takes the factory lock only through `release`, never while the
    /// factory itself is iterating its registry.
    pub(crate) fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(factory) = self.factory.upgrade() {
            factory.release(self.id);
        }

        let connection = self.connection.lock().take();
        if let Some(connection) = connection {
            if let Err(e) =
                self.endpoint
                    .disconnect(self.id, &connection.metadata, &connection.authentication)
            {
                warn!(handle = %self.id, error = %e, "Failed to release service connection");
            }
        }
        debug!(handle = %self.id, "Service handle closed");
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A short-lived proxy to the organization service.
///
/// Closing (or dropping) the handle removes it from the factory that minted
/// it. Calls made through a handle created with
/// [`ServiceFactory::create_handle_as`](super::ServiceFactory::create_handle_as)
/// execute as the impersonated user.
pub struct ServiceHandle {
    inner: Arc<HandleInner>,
}

impl ServiceHandle {
    pub(crate) fn new(inner: Arc<HandleInner>) -> Self {
        Self { inner }
    }

    #[cfg(test)]
    pub(crate) fn id(&self) -> Uuid {
        self.inner.id()
    }

    /// Identity calls are impersonating, if any
    pub fn caller_id(&self) -> Option<Uuid> {
        self.inner.caller_id
    }

    pub fn type_enrichment_enabled(&self) -> bool {
        self.inner.type_catalog.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    pub fn execute(&self, request: &OrganizationRequest) -> Result<OrganizationResponse> {
        // Clone the Arcs out so the network call runs without the lock held
        let connection = self
            .inner
            .connection
            .lock()
            .clone()
            .ok_or(FactoryError::HandleClosed)?;

        let mut response = self
            .inner
            .endpoint
            .execute(
                &connection.metadata,
                &connection.authentication,
                self.inner.caller_id,
                request,
            )
            .map_err(FactoryError::Service)?;

        if let Some(ref catalog) = self.inner.type_catalog {
            response.type_name = catalog.resolve(&response.response_name).map(str::to_string);
        }
        Ok(response)
    }

    pub fn who_am_i(&self) -> Result<WhoAmIResponse> {
        let response = self.execute(&OrganizationRequest::who_am_i())?;
        WhoAmIResponse::try_from(response).map_err(FactoryError::Service)
    }

    /// Close the handle. Safe to call more than once.
    pub fn close(&self) {
        self.inner.close();
    }
}

impl Drop for ServiceHandle {
    fn drop(&mut self) {
        self.inner.close();
    }
}

impl fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("caller_id", &self.inner.caller_id)
            .field("type_enrichment", &self.type_enrichment_enabled())
            .field("closed", &self.is_closed())
            .finish()
    }
}
