//! Rust wrapper around the Microsoft Azure REST APIs for Azure Table storage
//! and Azure Key Vault.
//!
//! The crate authenticates against Azure Active Directory as a confidential
//! client application: a previously cached token is preferred (no network
//! round trip), and a client credential exchange is performed only when the
//! cache holds no usable token. The token cache lives behind the
//! [`TokenCacheAccessor`] capability so it can be backed by a file
//! ([`FileTokenCache`]), kept in memory ([`InMemoryTokenCache`]), or swapped
//! out entirely.
//!
//! # Examples
//!
//! ```no_run
//! use azure_sdk_tables::{ConfidentialClient, FileTokenCache, KeyVaultClient};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), azure_sdk_tables::Error> {
//! let cache = Arc::new(FileTokenCache::new("token.json"));
//! let auth = ConfidentialClient::new(
//!     "{client_id}",
//!     "{client_secret}",
//!     "https://login.microsoftonline.com/{tenant_id}",
//!     cache,
//! )?;
//!
//! let client = KeyVaultClient::new("https://test-keyvault.vault.azure.net", auth)?;
//! let secret = client.get_secret("secret_name").await?;
//! # Ok(())
//! # }
//! ```

mod auth;
mod cache;
mod client;
mod secret;
mod table;

pub use auth::{AuthenticationResult, ConfidentialClient};
pub use cache::{FileTokenCache, InMemoryTokenCache, TokenCacheAccessor};
pub use client::KeyVaultClient;
pub use secret::KeyVaultSecret;
pub use table::{StorageCredentials, TableClient, TableEntity};

use thiserror::Error;

/// Errors returned by the clients in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The Azure Active Directory authority URL could not be parsed.
    /// Surfaced at construction time, before any network interaction.
    #[error("Malformed authority URL: {url}")]
    MalformedAuthorityUrl { url: String, source: url::ParseError },

    /// A vault or storage endpoint URL could not be parsed.
    #[error("Malformed URL: {url}")]
    MalformedUrl { url: String, source: url::ParseError },

    /// The token cache held no non-expired token for the requested client
    /// and scopes. Silent acquisition reports this; callers of
    /// [`ConfidentialClient::acquire_token`] never observe it because it
    /// triggers the client credential fallback.
    #[error("No cached token available for the requested scopes")]
    NoCachedToken,

    /// The token cache could not be read, written, or deserialized.
    #[error("Failed to access the token cache: {0}")]
    TokenCacheError(anyhow::Error),

    /// Azure Active Directory rejected the token request, or it could not
    /// be delivered.
    #[error("Failed to authenticate to Azure Active Directory: {0}")]
    AuthorizationError(anyhow::Error),

    /// A Key Vault or Table storage request failed.
    #[error("Request to the Azure service failed: {0}")]
    RequestError(anyhow::Error),
}
