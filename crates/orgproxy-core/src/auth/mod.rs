//! Credentials and authentication-mode handling.
//!
//! This module provides:
//! - `Credentials`: immutable login bundle parsed from a connection descriptor
//! - `client_credentials_for`: maps the endpoint's provider type to the
//!   credential payload it expects
//! - `CredentialStore`: OS keychain storage for account passwords

pub mod credentials;
pub mod keychain;
pub mod mode;

pub use credentials::{endpoint_from_server, Credentials, DescriptorError};
pub use keychain::CredentialStore;
pub use mode::{client_credentials_for, AuthMode, AuthenticationProviderType, ClientCredentials};
