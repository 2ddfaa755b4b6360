/*
 * The inspect command: fetches the runtime's full description of one resource and
 * formats it for read-only display.
 */
use super::errors::Result;
use super::runtime_client::{ClientError, RuntimeClientOperations};

pub async fn inspect_item<C: RuntimeClientOperations>(client: &C, id: &str) -> Result<String> {
    log::debug!("Inspect: Inspecting '{id}'.");
    let documents = client.inspect(&[id.to_string()]).await?;
    let document = documents
        .into_iter()
        .find(|doc| doc.id == id)
        .ok_or_else(|| ClientError::NotFound(id.to_string()))?;

    let value: serde_json::Value = serde_json::from_str(&document.raw).map_err(ClientError::from)?;
    let pretty = serde_json::to_string_pretty(&value).map_err(ClientError::from)?;
    Ok(pretty)
}
