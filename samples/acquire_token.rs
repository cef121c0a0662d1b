use azure_sdk_tables::{ConfidentialClient, FileTokenCache};
use std::env;
use std::sync::Arc;

const VAULT_SCOPE: &str = "https://vault.azure.net/.default";

fn env_var(name: &str) -> Result<String, Box<dyn std::error::Error>> {
    let value = env::var(name).unwrap_or_default();
    if value.is_empty() {
        return Err(format!("Environment variable {} is not set", name).into());
    }
    Ok(value)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let client_id = env_var("AZURE_CLIENT_ID")?;
    let client_secret = env_var("AZURE_CLIENT_SECRET")?;
    let tenant_id = env_var("AZURE_TENANT_ID")?;
    let authority = format!("https://login.microsoftonline.com/{}", tenant_id);

    let cache = Arc::new(FileTokenCache::new("token.json"));
    let client = ConfidentialClient::new(&client_id, &client_secret, &authority, cache)?;

    let token = client.acquire_token(&[VAULT_SCOPE]).await?;
    println!("Acquired a token, expires on {}.", token.expires_on());

    Ok(())
}
