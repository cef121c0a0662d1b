use crate::Error;
use crate::KeyVaultClient;
use anyhow::Context;
use chrono::serde::ts_seconds;
use chrono::{DateTime, Utc};
use getset::Getters;
use serde::Deserialize;
use url::Url;

const API_VERSION: &str = "7.0";

/// A secret fetched from the Key Vault.
#[derive(Debug, Getters)]
#[getset(get = "pub")]
pub struct KeyVaultSecret {
    id: String,
    value: String,
    enabled: bool,
    time_created: DateTime<Utc>,
    time_updated: DateTime<Utc>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct KeyVaultGetSecretResponse {
    value: String,
    id: String,
    attributes: KeyVaultGetSecretResponseAttributes,
}

#[derive(Deserialize, Debug)]
pub(crate) struct KeyVaultGetSecretResponseAttributes {
    enabled: bool,
    #[serde(with = "ts_seconds")]
    created: DateTime<Utc>,
    #[serde(with = "ts_seconds")]
    updated: DateTime<Utc>,
    #[serde(rename = "recoveryLevel")]
    recovery_level: String,
}

impl KeyVaultClient {
    /// Gets a secret from the Key Vault.
    /// Note that the latest version is fetched. For a specific version, use `get_secret_with_version`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use azure_sdk_tables::{ConfidentialClient, FileTokenCache, KeyVaultClient};
    /// # use std::sync::Arc;
    /// # async fn example() -> Result<(), azure_sdk_tables::Error> {
    /// # let cache = Arc::new(FileTokenCache::new("token.json"));
    /// # let auth = ConfidentialClient::new("{client_id}", "{client_secret}", "https://login.microsoftonline.com/{tenant_id}", cache)?;
    /// let client = KeyVaultClient::new("https://test-keyvault.vault.azure.net", auth)?;
    /// let secret = client.get_secret("secret_name").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_secret(&self, secret_name: &str) -> Result<KeyVaultSecret, Error> {
        self.get_secret_with_version(secret_name, "").await
    }

    /// Gets a secret from the Key Vault with a specific version.
    /// If you need the latest version, use `get_secret`.
    pub async fn get_secret_with_version(
        &self,
        secret_name: &str,
        secret_version_name: &str,
    ) -> Result<KeyVaultSecret, Error> {
        let uri = Url::parse_with_params(
            &format!(
                "{}/secrets/{}/{}",
                self.vault_url.as_str().trim_end_matches('/'),
                secret_name,
                secret_version_name
            ),
            &[("api-version", API_VERSION)],
        )
        .with_context(|| format!("Failed to build the URL for secret {}", secret_name))
        .map_err(Error::RequestError)?;

        let resp_body = self.get_authed(uri.to_string()).await?;
        let response = serde_json::from_str::<KeyVaultGetSecretResponse>(&resp_body)
            .with_context(|| format!("Failed to deserialize secret {}", secret_name))
            .map_err(Error::RequestError)?;

        Ok(KeyVaultSecret {
            enabled: response.attributes.enabled,
            value: response.value,
            time_created: response.attributes.created,
            time_updated: response.attributes.updated,
            id: response.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConfidentialClient, InMemoryTokenCache};
    use mockito::{Matcher, Server, ServerGuard};
    use std::sync::Arc;

    fn client_for(server: &ServerGuard) -> KeyVaultClient {
        let auth = ConfidentialClient::new(
            "app1",
            "s3cr3t",
            &format!("{}/tenant-x", server.url()),
            Arc::new(InMemoryTokenCache::new()),
        )
        .unwrap();
        KeyVaultClient::new(&server.url(), auth).unwrap()
    }

    fn token_mock(server: &mut ServerGuard) -> mockito::Mock {
        server
            .mock("POST", "/tenant-x/oauth2/v2.0/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token_type":"Bearer","expires_in":3599,"access_token":"test-token"}"#)
    }

    #[tokio::test]
    async fn get_secret_fetches_and_parses_the_secret() {
        let mut server = Server::new_async().await;
        let token = token_mock(&mut server).create_async().await;
        let secret = server
            .mock("GET", "/secrets/test-secret/")
            .match_query(Matcher::UrlEncoded("api-version".into(), API_VERSION.into()))
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "value": "s3cr3t",
                    "id": "https://test-keyvault.vault.azure.net/secrets/test-secret/abc123",
                    "attributes": {
                        "enabled": true,
                        "created": 1594000000,
                        "updated": 1594050000,
                        "recoveryLevel": "Recoverable+Purgeable"
                    }
                }"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let result = client.get_secret("test-secret").await.unwrap();

        assert_eq!(result.value().as_str(), "s3cr3t");
        assert!(*result.enabled());
        assert_eq!(result.time_created().timestamp(), 1_594_000_000);
        assert_eq!(result.time_updated().timestamp(), 1_594_050_000);
        token.assert_async().await;
        secret.assert_async().await;
    }

    #[tokio::test]
    async fn get_secret_with_version_addresses_the_version() {
        let mut server = Server::new_async().await;
        let _token = token_mock(&mut server).create_async().await;
        let secret = server
            .mock("GET", "/secrets/test-secret/abc123")
            .match_query(Matcher::UrlEncoded("api-version".into(), API_VERSION.into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "value": "pinned",
                    "id": "https://test-keyvault.vault.azure.net/secrets/test-secret/abc123",
                    "attributes": {
                        "enabled": true,
                        "created": 1594000000,
                        "updated": 1594000000,
                        "recoveryLevel": "Recoverable+Purgeable"
                    }
                }"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let result = client
            .get_secret_with_version("test-secret", "abc123")
            .await
            .unwrap();

        assert_eq!(result.value().as_str(), "pinned");
        secret.assert_async().await;
    }

    #[tokio::test]
    async fn vault_error_status_is_surfaced() {
        let mut server = Server::new_async().await;
        let _token = token_mock(&mut server).create_async().await;
        let _secret = server
            .mock("GET", "/secrets/missing/")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":{"code":"SecretNotFound"}}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.get_secret("missing").await.unwrap_err();
        assert!(matches!(err, crate::Error::RequestError(_)));
    }
}
