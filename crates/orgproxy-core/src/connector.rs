//! One-shot connectivity check against an organization service.

use std::sync::Arc;

use tracing::info;

use crate::api::{HttpServiceEndpoint, ServiceEndpoint, WhoAmIResponse};
use crate::auth::Credentials;
use crate::config::FactoryConfig;
use crate::error::{FactoryError, Result};
use crate::factory::ServiceFactory;

/// Authenticate, mint one enriched handle and ask the service who we are.
pub fn test_connection(credentials: &Credentials, config: FactoryConfig) -> Result<WhoAmIResponse> {
    let endpoint =
        HttpServiceEndpoint::new(config.request_timeout()).map_err(FactoryError::Connectivity)?;
    test_connection_with(credentials, Arc::new(endpoint), config)
}

pub fn test_connection_with(
    credentials: &Credentials,
    endpoint: Arc<dyn ServiceEndpoint>,
    config: FactoryConfig,
) -> Result<WhoAmIResponse> {
    let endpoint_url = credentials
        .endpoint_url()
        .ok_or(FactoryError::InvalidArgument("credentials carry no server endpoint"))?;

    let factory = ServiceFactory::with_endpoint(endpoint_url, credentials.clone(), endpoint, config)?;
    factory.set_type_enrichment(true);

    let service = factory.create_service(None)?;
    let who = service.who_am_i()?;
    info!(user = %who.user_id, organization = %who.organization_id, "Connection test succeeded");
    Ok(who)
}
