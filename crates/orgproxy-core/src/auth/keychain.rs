use anyhow::{Context, Result};
use keyring::Entry;
use tracing::debug;

const SERVICE_NAME: &str = "orgproxy";

/// Passwords for organization service accounts, kept in the OS keychain.
///
/// Entries are keyed by `DOMAIN\username` when a domain is given so the same
/// login on two domains does not collide.
pub struct CredentialStore;

impl CredentialStore {
    fn account(username: &str, domain: &str) -> String {
        if domain.is_empty() {
            username.to_string()
        } else {
            format!("{}\\{}", domain, username)
        }
    }

    fn entry(username: &str, domain: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &Self::account(username, domain))
            .context("Failed to create keyring entry")
    }

    /// Store a password in the OS keychain
    pub fn store(username: &str, domain: &str, password: &str) -> Result<()> {
        Self::entry(username, domain)?
            .set_password(password)
            .context("Failed to store password in keychain")?;
        debug!(username, domain, "Stored password in keychain");
        Ok(())
    }

    /// Retrieve the stored password for an account
    pub fn get_password(username: &str, domain: &str) -> Result<String> {
        Self::entry(username, domain)?
            .get_password()
            .context("Failed to retrieve password from keychain")
    }

    /// Delete the stored password for an account
    pub fn delete(username: &str, domain: &str) -> Result<()> {
        Self::entry(username, domain)?
            .delete_credential()
            .context("Failed to delete credential from keychain")?;
        Ok(())
    }

    pub fn has_credentials(username: &str, domain: &str) -> bool {
        Self::entry(username, domain)
            .map(|entry| entry.get_password().is_ok())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_key_includes_domain() {
        assert_eq!(CredentialStore::account("jdoe", ""), "jdoe");
        assert_eq!(CredentialStore::account("jdoe", "CONTOSO"), "CONTOSO\\jdoe");
    }
}
