//! Organization service endpoint module.
//!
//! This module provides the `ServiceEndpoint` trait the factory talks to and
//! `HttpServiceEndpoint`, its JSON-over-HTTP implementation. Authentication
//! yields either an integrated acknowledgement or a security token carrying
//! a `validTo` timestamp.

pub mod client;
pub mod error;

#[cfg(test)]
pub(crate) mod mock;

pub use client::{
    AuthenticationResult, HttpServiceEndpoint, OrganizationRequest, OrganizationResponse,
    SecurityTokenResponse, ServiceEndpoint, ServiceMetadata, TypeCatalog, WhoAmIResponse,
    CALLER_ID_HEADER, DEFAULT_REQUEST_TIMEOUT_SECS,
};
pub use error::ApiError;
