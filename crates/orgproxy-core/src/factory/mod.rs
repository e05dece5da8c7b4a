//! Service factory and the handles it mints.
//!
//! - `ServiceFactory`: authenticated session, token renewal, handle registry
//! - `ServiceHandle`: short-lived proxy that deregisters itself on close

pub mod handle;
pub mod service_factory;

pub use handle::ServiceHandle;
pub use service_factory::ServiceFactory;
