//! orgproxy core library.
//!
//! Authenticates against an organization service, hands out short-lived
//! service handles, and renews federated security tokens before they expire.
//!
//! ```no_run
//! use orgproxy_core::{Credentials, ServiceFactory};
//!
//! let creds = Credentials::parse(
//!     "server=https://crm.contoso.com;domain=CONTOSO;username=jdoe;password=secret",
//! )?;
//! let factory = ServiceFactory::new(creds.endpoint_url().unwrap_or_default(), creds.clone())?;
//! let service = factory.create_service(None)?;
//! println!("{:?}", service.who_am_i()?);
//! # Ok::<(), orgproxy_core::FactoryError>(())
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod connector;
pub mod error;
pub mod factory;

pub use api::{ApiError, OrganizationRequest, OrganizationResponse, ServiceEndpoint, WhoAmIResponse};
pub use auth::{AuthMode, CredentialStore, Credentials, DescriptorError};
pub use config::FactoryConfig;
pub use connector::test_connection;
pub use error::FactoryError;
pub use factory::{ServiceFactory, ServiceHandle};
