use crate::auth::ConfidentialClient;
use crate::Error;
use anyhow::{anyhow, Context};
use tracing::debug;
use url::Url;

const VAULT_SCOPE: &str = "https://vault.azure.net/.default";

/// Client for Key Vault operations - getting a secret, etc.
///
/// Bearer tokens for the vault scope are obtained through the
/// [`ConfidentialClient`], so repeated requests reuse the cached token
/// instead of re-authenticating.
///
/// # Examples
///
/// ```
/// use azure_sdk_tables::{ConfidentialClient, FileTokenCache, KeyVaultClient};
/// use std::sync::Arc;
///
/// let cache = Arc::new(FileTokenCache::new("token.json"));
/// let auth = ConfidentialClient::new(
///     "{client_id}",
///     "{client_secret}",
///     "https://login.microsoftonline.com/{tenant_id}",
///     cache,
/// ).unwrap();
/// let client = KeyVaultClient::new("https://test-keyvault.vault.azure.net", auth);
/// ```
#[derive(Clone)]
pub struct KeyVaultClient {
    pub(crate) vault_url: Url,
    pub(crate) auth: ConfidentialClient,
    pub(crate) http: reqwest::Client,
}

impl KeyVaultClient {
    /// Creates a new `KeyVaultClient` for the vault at `vault_url`.
    pub fn new(vault_url: &str, auth: ConfidentialClient) -> Result<Self, Error> {
        let vault_url = Url::parse(vault_url).map_err(|source| Error::MalformedUrl {
            url: vault_url.to_owned(),
            source,
        })?;
        Ok(Self {
            vault_url,
            auth,
            http: reqwest::Client::new(),
        })
    }

    pub(crate) async fn get_authed(&self, uri: String) -> Result<String, Error> {
        let token = self.auth.acquire_token(&[VAULT_SCOPE]).await?;
        debug!(%uri, "sending authorized request to Key Vault");

        let resp = self
            .http
            .get(&uri)
            .header(
                "Authorization",
                format!("Bearer {}", token.access_token().secret()),
            )
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", uri))
            .map_err(Error::RequestError)?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .with_context(|| format!("Failed to read response from {}", uri))
            .map_err(Error::RequestError)?;
        if !status.is_success() {
            return Err(Error::RequestError(anyhow!(
                "Key Vault returned {}: {}",
                status,
                body
            )));
        }
        Ok(body)
    }
}
