use serde_json::json;

use crate::models::schema::GraphExport;
use crate::services::HTTP;

/// Submit an execution request. The executor queues it and reports back over
/// the realtime channel; the HTTP response body carries nothing the client
/// needs. Callers treat failures as best-effort: log and move on, no retry.
pub async fn post_graph(address: &str, graph: &GraphExport) -> Result<(), String> {
    let url = format!("http://{}/graph", address);
    let response = HTTP
        .post(&url)
        .json(graph)
        .send()
        .await
        .map_err(|e| format!("Failed to reach executor at {}: {}", url, e))?;

    if !response.status().is_success() {
        return Err(format!(
            "Executor rejected graph submission: HTTP {}",
            response.status()
        ));
    }
    Ok(())
}

/// Ask the executor to drop cached results for removed nodes.
pub async fn clear_node_cache(address: &str, node_ids: &[String]) -> Result<(), String> {
    let url = format!("http://{}/clearNodeCache", address);
    let response = HTTP
        .delete(&url)
        .json(&json!({ "nodeId": node_ids }))
        .send()
        .await
        .map_err(|e| format!("Failed to reach executor at {}: {}", url, e))?;

    if !response.status().is_success() {
        return Err(format!(
            "Executor rejected cache clear: HTTP {}",
            response.status()
        ));
    }
    Ok(())
}
