//! orgproxy - connectivity check for organization service endpoints.
//!
//! Parses a connection descriptor, authenticates, mints one service handle
//! and prints the identity the service reports for it.

use std::io;

use anyhow::{bail, Context, Result};
use orgproxy_core::{test_connection, CredentialStore, Credentials, FactoryConfig};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the connection descriptor
const CONNECTION_ENV: &str = "ORGPROXY_CONNECTION";

const USAGE: &str = "\
Usage:
  orgproxy --test [DESCRIPTOR]         Authenticate and run WhoAmI
  orgproxy --save-password USER [DOM]  Store a password in the OS keychain
  orgproxy --forget-password USER [DOM]
  orgproxy --help

DESCRIPTOR defaults to $ORGPROXY_CONNECTION, e.g.
  server=https://crm.contoso.com;domain=CONTOSO;username=jdoe;password=secret
Without a password the keychain entry for the user is used.";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("--test") => run_test(args.get(1).cloned()),
        Some("--save-password") => {
            let (username, domain) = account_args(&args)?;
            let password = rpassword::prompt_password(format!("Password for {}: ", username))?;
            CredentialStore::store(username, domain, &password)?;
            eprintln!("Password stored.");
            Ok(())
        }
        Some("--forget-password") => {
            let (username, domain) = account_args(&args)?;
            CredentialStore::delete(username, domain)?;
            eprintln!("Password removed.");
            Ok(())
        }
        Some("--help") | Some("-h") | None => {
            println!("{}", USAGE);
            Ok(())
        }
        Some(other) => bail!("Unknown argument '{}'\n\n{}", other, USAGE),
    }
}

fn account_args(args: &[String]) -> Result<(&str, &str)> {
    let username = args
        .get(1)
        .map(String::as_str)
        .context("Missing USER argument")?;
    let domain = args.get(2).map(String::as_str).unwrap_or("");
    Ok((username, domain))
}

fn run_test(descriptor: Option<String>) -> Result<()> {
    let descriptor = match descriptor {
        Some(d) => d,
        None => std::env::var(CONNECTION_ENV)
            .with_context(|| format!("No descriptor given and {} is not set", CONNECTION_ENV))?,
    };

    let mut credentials =
        Credentials::parse(&descriptor).context("Failed to parse connection descriptor")?;
    if !credentials.has_password() && !credentials.username().is_empty() {
        match CredentialStore::get_password(credentials.username(), credentials.domain()) {
            Ok(password) => credentials = credentials.with_password(password),
            Err(e) => warn!(error = %e, "No stored password, continuing without one"),
        }
    }

    let config = FactoryConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        FactoryConfig::default()
    });

    info!(endpoint = ?credentials.endpoint_url(), "Testing connection");
    let who = test_connection(&credentials, config).context("Connection test failed")?;

    println!("Connected.");
    println!("  User:          {}", who.user_id);
    println!("  Business unit: {}", who.business_unit_id);
    println!("  Organization:  {}", who.organization_id);
    Ok(())
}
