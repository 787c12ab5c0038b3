mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use serde::de::DeserializeOwned;

use crate::error::ConnectorError;

/// Sends `req` and returns the body, turning any non-2xx status into
/// [`ConnectorError::Status`].
pub async fn fetch_bytes<C: HttpClient>(
    client: &C,
    req: reqwest::Request,
) -> Result<Vec<u8>, ConnectorError> {
    let resp = client.execute(req).await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ConnectorError::Status { status, body });
    }

    Ok(resp.bytes().await?.to_vec())
}

/// Like [`fetch_bytes`], decoding the body as JSON.
pub async fn fetch_json<C: HttpClient, T: DeserializeOwned>(
    client: &C,
    req: reqwest::Request,
) -> Result<T, ConnectorError> {
    let bytes = fetch_bytes(client, req).await?;
    Ok(serde_json::from_slice(&bytes)?)
}
