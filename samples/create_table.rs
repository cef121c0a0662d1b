use azure_sdk_tables::{ConfidentialClient, FileTokenCache, KeyVaultClient, StorageCredentials, TableClient};
use std::env;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

// Names of the Key Vault secrets holding the Table storage SAS token and
// account URL.
const TABLES_SAS_TOKEN_SECRET: &str = "tables-sas-token";
const TABLES_URL_SECRET: &str = "tables-url";

fn env_var(name: &str) -> Result<String, Box<dyn std::error::Error>> {
    let value = env::var(name).unwrap_or_default();
    if value.is_empty() {
        return Err(format!("Environment variable {} is not set", name).into());
    }
    Ok(value)
}

fn prompt(label: &str) -> io::Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_owned())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let client_id = env_var("AZURE_CLIENT_ID")?;
    let client_secret = env_var("AZURE_CLIENT_SECRET")?;
    let tenant_id = env_var("AZURE_TENANT_ID")?;
    let key_vault_url = env_var("AZURE_KEY_VAULT_URL")?;
    let authority = format!("https://login.microsoftonline.com/{}", tenant_id);

    let cache = Arc::new(FileTokenCache::new("token.json"));
    let auth = ConfidentialClient::new(&client_id, &client_secret, &authority, cache)?;
    let key_vault_client = KeyVaultClient::new(&key_vault_url, auth)?;

    println!("Fetching the SAS token and tables URL from Key Vault.");
    let sas_token = key_vault_client.get_secret(TABLES_SAS_TOKEN_SECRET).await?;
    let tables_url = key_vault_client.get_secret(TABLES_URL_SECRET).await?;

    println!("Creating client for: {}", tables_url.value());
    let table_client = TableClient::new(
        tables_url.value(),
        StorageCredentials::sas(sas_token.value()),
    )?;

    let table_name = prompt("Enter name of table")?;
    println!("Creating table '{}'.", table_name);
    if !table_client.create_if_not_exists(&table_name).await? {
        println!("Table '{}' already exists.", table_name);
    }

    let partition_key = prompt("Enter partition key")?;
    let row_key = prompt("Enter row key")?;

    println!(
        "Adding table entity. Partition key: {}, row key: {}.",
        partition_key, row_key
    );
    let entity = table_client
        .insert_entity(&table_name, &partition_key, &row_key)
        .await?;

    println!(
        "Added table entity. Partition key: {}, row key: {}, ETag: {}.",
        entity.partition_key(),
        entity.row_key(),
        entity.etag().as_deref().unwrap_or("<none>")
    );
    println!("Finished.");

    Ok(())
}
