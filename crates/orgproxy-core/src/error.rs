//! Error types surfaced by the service factory and its handles.

use thiserror::Error;

use crate::api::ApiError;
use crate::auth::{AuthenticationProviderType, DescriptorError};

#[derive(Error, Debug)]
pub enum FactoryError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("Could not reach organization service: {0}")]
    Connectivity(#[source] ApiError),

    #[error("Authentication failed: {0}")]
    Authentication(#[source] ApiError),

    #[error("Authentication type '{0}' is not supported")]
    UnsupportedAuthMode(AuthenticationProviderType),

    #[error("Malformed connection descriptor: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("Service handle has been closed")]
    HandleClosed,

    #[error("Service factory has been closed")]
    FactoryClosed,

    #[error("Service call failed: {0}")]
    Service(#[source] ApiError),
}

impl FactoryError {
    /// Classify a failure raised while authenticating.
    ///
    /// Rejected credentials are an authentication error, anything else means
    /// the endpoint could not be talked to.
    pub(crate) fn from_authentication(err: ApiError) -> Self {
        if err.is_rejection() {
            FactoryError::Authentication(err)
        } else {
            FactoryError::Connectivity(err)
        }
    }
}

pub type Result<T, E = FactoryError> = std::result::Result<T, E>;
