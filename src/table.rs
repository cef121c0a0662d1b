use crate::Error;
use anyhow::{anyhow, Context};
use getset::Getters;
use reqwest::StatusCode;
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

const STORAGE_API_VERSION: &str = "2019-02-02";
const ACCEPT_NO_METADATA: &str = "application/json;odata=nometadata";

/// Credentials for authenticating requests against Table storage.
#[derive(Debug, Clone)]
pub enum StorageCredentials {
    /// A shared access signature query string issued for the storage
    /// account.
    SharedAccessSignature(String),
}

impl StorageCredentials {
    /// Creates a shared access signature credential. A leading `?` on the
    /// token is tolerated.
    pub fn sas(token: &str) -> Self {
        StorageCredentials::SharedAccessSignature(token.trim_start_matches('?').to_owned())
    }
}

/// An entity stored in a table, identified by partition key and row key.
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub")]
pub struct TableEntity {
    partition_key: String,
    row_key: String,
    etag: Option<String>,
}

/// Client for Table storage operations - creating a table, inserting an
/// entity.
///
/// # Examples
///
/// ```
/// use azure_sdk_tables::{StorageCredentials, TableClient};
///
/// let credentials = StorageCredentials::sas("?sv=2019-02-02&sig={signature}");
/// let client = TableClient::new("https://myaccount.table.core.windows.net", credentials);
/// ```
pub struct TableClient {
    endpoint: Url,
    credentials: StorageCredentials,
    http: reqwest::Client,
}

impl TableClient {
    /// Creates a new `TableClient` for the Table storage account at
    /// `endpoint`.
    pub fn new(endpoint: &str, credentials: StorageCredentials) -> Result<Self, Error> {
        let endpoint = Url::parse(endpoint).map_err(|source| Error::MalformedUrl {
            url: endpoint.to_owned(),
            source,
        })?;
        Ok(Self {
            endpoint,
            credentials,
            http: reqwest::Client::new(),
        })
    }

    /// Creates the table if it does not already exist.
    ///
    /// Returns `true` when the table was created and `false` when it was
    /// already there.
    pub async fn create_if_not_exists(&self, table_name: &str) -> Result<bool, Error> {
        let url = self.authed_url("Tables")?;
        let mut request_body = Map::new();
        request_body.insert("TableName".to_owned(), Value::String(table_name.to_owned()));

        let resp = self
            .http
            .post(url)
            .header("Accept", ACCEPT_NO_METADATA)
            .header("x-ms-version", STORAGE_API_VERSION)
            .json(&Value::Object(request_body))
            .send()
            .await
            .with_context(|| format!("Failed to create table {}", table_name))
            .map_err(Error::RequestError)?;

        let status = resp.status();
        if status == StatusCode::CONFLICT {
            // 409 means the table already exists.
            debug!(%table_name, "table already exists");
            return Ok(false);
        }

        let body = resp
            .text()
            .await
            .with_context(|| format!("Failed to read response for table {}", table_name))
            .map_err(Error::RequestError)?;
        if !status.is_success() {
            return Err(Error::RequestError(anyhow!(
                "Table storage returned {}: {}",
                status,
                body
            )));
        }
        debug!(%table_name, "created table");
        Ok(true)
    }

    /// Inserts an entity into the table, returning the created entity with
    /// the ETag reported by the service.
    pub async fn insert_entity(
        &self,
        table_name: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<TableEntity, Error> {
        let url = self.authed_url(table_name)?;
        let mut request_body = Map::new();
        request_body.insert(
            "PartitionKey".to_owned(),
            Value::String(partition_key.to_owned()),
        );
        request_body.insert("RowKey".to_owned(), Value::String(row_key.to_owned()));

        let resp = self
            .http
            .post(url)
            .header("Accept", ACCEPT_NO_METADATA)
            .header("x-ms-version", STORAGE_API_VERSION)
            .json(&Value::Object(request_body))
            .send()
            .await
            .with_context(|| format!("Failed to insert entity into table {}", table_name))
            .map_err(Error::RequestError)?;

        let status = resp.status();
        let etag = resp
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = resp
            .text()
            .await
            .with_context(|| format!("Failed to read response for table {}", table_name))
            .map_err(Error::RequestError)?;
        if !status.is_success() {
            return Err(Error::RequestError(anyhow!(
                "Table storage returned {}: {}",
                status,
                body
            )));
        }

        debug!(%table_name, %partition_key, %row_key, "inserted entity");
        Ok(TableEntity {
            partition_key: partition_key.to_owned(),
            row_key: row_key.to_owned(),
            etag,
        })
    }

    /// The SAS token rides as the URL query.
    fn authed_url(&self, path: &str) -> Result<Url, Error> {
        let raw = format!("{}/{}", self.endpoint.as_str().trim_end_matches('/'), path);
        let mut url = Url::parse(&raw).map_err(|source| Error::MalformedUrl { url: raw, source })?;
        let StorageCredentials::SharedAccessSignature(sas) = &self.credentials;
        url.set_query(Some(sas));
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server, ServerGuard};

    fn client_for(server: &ServerGuard) -> TableClient {
        TableClient::new(&server.url(), StorageCredentials::sas("?sv=2019-02-02&sig=testsig"))
            .unwrap()
    }

    #[tokio::test]
    async fn create_table_posts_the_table_name() {
        let mut server = Server::new_async().await;
        let create = server
            .mock("POST", "/Tables")
            .match_query(Matcher::UrlEncoded("sig".into(), "testsig".into()))
            .match_body(Matcher::Json(serde_json::json!({ "TableName": "MyTable" })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"TableName":"MyTable"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let created = client.create_if_not_exists("MyTable").await.unwrap();

        assert!(created);
        create.assert_async().await;
    }

    #[tokio::test]
    async fn create_table_reports_an_existing_table() {
        let mut server = Server::new_async().await;
        let _create = server
            .mock("POST", "/Tables")
            .match_query(Matcher::Any)
            .with_status(409)
            .with_body(r#"{"odata.error":{"code":"TableAlreadyExists"}}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let created = client.create_if_not_exists("MyTable").await.unwrap();
        assert!(!created);
    }

    #[tokio::test]
    async fn insert_entity_returns_the_created_entity() {
        let mut server = Server::new_async().await;
        let insert = server
            .mock("POST", "/MyTable")
            .match_query(Matcher::UrlEncoded("sig".into(), "testsig".into()))
            .match_body(Matcher::Json(serde_json::json!({
                "PartitionKey": "my-partition",
                "RowKey": "my-row",
            })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_header("etag", "W/\"datetime'2020-07-06T12%3A00%3A00Z'\"")
            .with_body(r#"{"PartitionKey":"my-partition","RowKey":"my-row"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let entity = client
            .insert_entity("MyTable", "my-partition", "my-row")
            .await
            .unwrap();

        assert_eq!(entity.partition_key().as_str(), "my-partition");
        assert_eq!(entity.row_key().as_str(), "my-row");
        assert!(entity.etag().is_some());
        insert.assert_async().await;
    }

    #[tokio::test]
    async fn insert_conflict_is_surfaced() {
        let mut server = Server::new_async().await;
        let _insert = server
            .mock("POST", "/MyTable")
            .match_query(Matcher::Any)
            .with_status(409)
            .with_body(r#"{"odata.error":{"code":"EntityAlreadyExists"}}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client
            .insert_entity("MyTable", "my-partition", "my-row")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RequestError(_)));
    }
}
