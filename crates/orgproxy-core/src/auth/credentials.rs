//! Connection credentials and connection-descriptor parsing.
//!
//! A descriptor looks like
//! `server=https://crm.contoso.com;domain=CONTOSO;username=jdoe;password=secret`.

use std::fmt;

use thiserror::Error;

/// Versioned path of the organization service below the server root.
pub const ORGANIZATION_SERVICE_PATH: &str = "XRMServices/2011/Organization.svc";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("Connection descriptor is empty")]
    Empty,

    #[error("Connection descriptor contains a control character at byte {0}")]
    ControlCharacter(usize),
}

/// Username/password/domain plus the organization service endpoint.
///
/// Immutable once built. Rotating credentials means building a new value.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
    domain: String,
    endpoint_url: Option<String>,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            domain: domain.into(),
            endpoint_url: None,
        }
    }

    /// Set the endpoint from a server root URL
    pub fn with_server(mut self, server_url: &str) -> Self {
        self.endpoint_url = Some(endpoint_from_server(server_url));
        self
    }

    /// Set an already complete endpoint URL
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// Copy of these credentials with a different password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Parse a `key=value;key=value` connection descriptor.
    ///
    /// Whitespace is removed before splitting. Segments without `=` and
    /// segments with an empty value are skipped, as are unknown keys.
    pub fn parse(descriptor: &str) -> Result<Self, DescriptorError> {
        if let Some((pos, _)) = descriptor
            .char_indices()
            .find(|(_, c)| c.is_control() && !c.is_whitespace())
        {
            return Err(DescriptorError::ControlCharacter(pos));
        }

        let compact: String = descriptor.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(DescriptorError::Empty);
        }

        let mut credentials = Credentials::default();
        for segment in compact.split(';') {
            let Some((key, value)) = segment.split_once('=') else {
                continue;
            };
            if value.is_empty() {
                continue;
            }

            match key.to_ascii_lowercase().as_str() {
                "server" => credentials.endpoint_url = Some(endpoint_from_server(value)),
                "domain" => credentials.domain = value.to_string(),
                "username" => credentials.username = value.to_string(),
                "password" => credentials.password = value.to_string(),
                _ => {}
            }
        }

        Ok(credentials)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn endpoint_url(&self) -> Option<&str> {
        self.endpoint_url.as_deref()
    }

    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("domain", &self.domain)
            .field("endpoint_url", &self.endpoint_url)
            .finish()
    }
}

/// Build the organization service URL for a server root.
pub fn endpoint_from_server(server_url: &str) -> String {
    format!(
        "{}/{}",
        server_url.trim_end_matches('/'),
        ORGANIZATION_SERVICE_PATH
    )
}
