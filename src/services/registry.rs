use std::collections::HashMap;

use crate::models::schema::NodeTypeDef;
use crate::services::HTTP;

/// Fetch the executor's node-type registry. Consumed once at startup; new
/// nodes are seeded from these definitions.
pub async fn fetch_node_registry(
    address: &str,
) -> Result<HashMap<String, NodeTypeDef>, String> {
    let url = format!("http://{}/nodes", address);
    let response = HTTP
        .get(&url)
        .send()
        .await
        .map_err(|e| format!("Can't connect to route `/nodes`: {}", e))?;

    if !response.status().is_success() {
        return Err(format!("Registry fetch failed: HTTP {}", response.status()));
    }

    response
        .json()
        .await
        .map_err(|e| format!("Failed to decode node registry: {}", e))
}
