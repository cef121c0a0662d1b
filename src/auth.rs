use crate::cache::TokenCacheAccessor;
use crate::Error;
use anyhow::{anyhow, Context};
use chrono::{DateTime, Duration, Utc};
use getset::Getters;
use oauth2::{AccessToken, ClientId, ClientSecret};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use url::Url;

const TOKEN_ENDPOINT_PATH: &str = "oauth2/v2.0/token";

/// Confidential client application that acquires Azure Active Directory
/// access tokens for a client id/secret pair registered with a tenant.
///
/// Acquisition prefers the token cache: [`ConfidentialClient::acquire_token`]
/// first performs a silent lookup against the injected
/// [`TokenCacheAccessor`] and only exchanges the client credential over the
/// network when the cache holds no usable token. Freshly exchanged tokens
/// are written back through the accessor, so a subsequent run of the same
/// process (with a persistent accessor such as
/// [`FileTokenCache`](crate::FileTokenCache)) starts warm.
///
/// # Examples
///
/// ```
/// use azure_sdk_tables::{ConfidentialClient, FileTokenCache};
/// use std::sync::Arc;
///
/// let cache = Arc::new(FileTokenCache::new("token.json"));
/// let client = ConfidentialClient::new(
///     "{client_id}",
///     "{client_secret}",
///     "https://login.microsoftonline.com/{tenant_id}",
///     cache,
/// );
/// ```
#[derive(Clone)]
pub struct ConfidentialClient {
    client_id: ClientId,
    client_secret: ClientSecret,
    token_endpoint: Url,
    http: reqwest::Client,
    cache: Arc<dyn TokenCacheAccessor>,
}

impl std::fmt::Debug for ConfidentialClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfidentialClient")
            .field("client_id", &self.client_id)
            .field("token_endpoint", &self.token_endpoint)
            .finish_non_exhaustive()
    }
}

/// A token returned by one of the acquisition paths.
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub")]
pub struct AuthenticationResult {
    access_token: AccessToken,
    expires_on: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TokenCacheContents {
    entries: HashMap<String, CachedToken>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedToken {
    access_token: String,
    expires_on: DateTime<Utc>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Cache entries are keyed by client id and the sorted scope set, so scope
/// ordering does not defeat a lookup.
fn cache_key(client_id: &ClientId, scopes: &[&str]) -> String {
    let mut sorted = scopes.to_vec();
    sorted.sort_unstable();
    format!("{}|{}", client_id.as_str(), sorted.join(" "))
}

impl ConfidentialClient {
    /// Creates a new `ConfidentialClient` for the given authority, e.g.
    /// `https://login.microsoftonline.com/{tenant_id}`.
    ///
    /// A malformed authority is a configuration error and fails here,
    /// before any network interaction.
    pub fn new(
        client_id: &str,
        client_secret: &str,
        authority: &str,
        cache: Arc<dyn TokenCacheAccessor>,
    ) -> Result<Self, Error> {
        let token_endpoint = Url::parse(&format!(
            "{}/{}",
            authority.trim_end_matches('/'),
            TOKEN_ENDPOINT_PATH
        ))
        .map_err(|source| Error::MalformedAuthorityUrl {
            url: authority.to_owned(),
            source,
        })?;

        Ok(Self {
            client_id: ClientId::new(client_id.to_owned()),
            client_secret: ClientSecret::new(client_secret.to_owned()),
            token_endpoint,
            http: reqwest::Client::new(),
            cache,
        })
    }

    /// Acquires a token for `scopes`, trying the cache first.
    ///
    /// A cache hit returns without touching the network. On a cache miss
    /// (no entry, or an expired one) exactly one client credential exchange
    /// is performed. Any other failure during the silent lookup is
    /// propagated unchanged and no fallback is attempted.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use azure_sdk_tables::{ConfidentialClient, FileTokenCache};
    /// # use std::sync::Arc;
    /// # async fn example() -> Result<(), azure_sdk_tables::Error> {
    /// let cache = Arc::new(FileTokenCache::new("token.json"));
    /// let client = ConfidentialClient::new(
    ///     "{client_id}",
    ///     "{client_secret}",
    ///     "https://login.microsoftonline.com/{tenant_id}",
    ///     cache,
    /// )?;
    /// let token = client.acquire_token(&["https://vault.azure.net/.default"]).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn acquire_token(&self, scopes: &[&str]) -> Result<AuthenticationResult, Error> {
        match self.acquire_token_silent(scopes) {
            Ok(result) => Ok(result),
            Err(Error::NoCachedToken) => {
                debug!("no usable cached token, falling back to a client credential exchange");
                self.acquire_token_by_client_credential(scopes).await
            }
            Err(e) => Err(e),
        }
    }

    /// Looks up a non-expired token for `scopes` in the cache. Consults only
    /// local cache state, never the network.
    pub fn acquire_token_silent(&self, scopes: &[&str]) -> Result<AuthenticationResult, Error> {
        let contents = self.load_cache()?;
        match contents.entries.get(&cache_key(&self.client_id, scopes)) {
            Some(entry) if entry.expires_on > Utc::now() => {
                debug!(expires_on = %entry.expires_on, "using cached token");
                Ok(AuthenticationResult {
                    access_token: AccessToken::new(entry.access_token.clone()),
                    expires_on: entry.expires_on,
                })
            }
            _ => Err(Error::NoCachedToken),
        }
    }

    /// Exchanges the client credential for a fresh token and stores it in
    /// the cache. One network round trip, no retries.
    pub async fn acquire_token_by_client_credential(
        &self,
        scopes: &[&str],
    ) -> Result<AuthenticationResult, Error> {
        if scopes.is_empty() {
            return Err(Error::AuthorizationError(anyhow!(
                "At least one scope is required"
            )));
        }

        let scope = scopes.join(" ");
        let response = self
            .http
            .post(self.token_endpoint.clone())
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.secret().as_str()),
                ("scope", scope.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to reach token endpoint {}", self.token_endpoint))
            .map_err(Error::AuthorizationError)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| "Failed to read the token endpoint response")
            .map_err(Error::AuthorizationError)?;
        if !status.is_success() {
            return Err(Error::AuthorizationError(anyhow!(
                "Token endpoint returned {}: {}",
                status,
                body
            )));
        }

        let token = serde_json::from_str::<TokenResponse>(&body)
            .with_context(|| "Failed to deserialize the token endpoint response")
            .map_err(Error::AuthorizationError)?;
        let result = AuthenticationResult {
            access_token: AccessToken::new(token.access_token),
            expires_on: Utc::now() + Duration::seconds(token.expires_in),
        };

        self.store_in_cache(scopes, &result)?;
        debug!(expires_on = %result.expires_on, "acquired token via client credential exchange");
        Ok(result)
    }

    fn load_cache(&self) -> Result<TokenCacheContents, Error> {
        let bytes = self.cache.load().map_err(Error::TokenCacheError)?;
        if bytes.is_empty() {
            return Ok(TokenCacheContents::default());
        }
        serde_json::from_slice(&bytes).map_err(|e| {
            Error::TokenCacheError(
                anyhow::Error::new(e).context("Token cache contents are not valid JSON"),
            )
        })
    }

    fn store_in_cache(
        &self,
        scopes: &[&str],
        result: &AuthenticationResult,
    ) -> Result<(), Error> {
        let mut contents = self.load_cache()?;
        contents.entries.insert(
            cache_key(&self.client_id, scopes),
            CachedToken {
                access_token: result.access_token.secret().clone(),
                expires_on: result.expires_on,
            },
        );
        let serialized = serde_json::to_vec(&contents)
            .with_context(|| "Failed to serialize the token cache")
            .map_err(Error::TokenCacheError)?;
        self.cache.store(&serialized).map_err(Error::TokenCacheError)
    }
}
