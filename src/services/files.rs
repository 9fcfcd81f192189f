use crate::services::HTTP;

/// Pass-through client for the executor's generic file storage. The core
/// never looks inside files; widgets hand path strings around as parameter
/// values.
pub async fn upload_file(address: &str, name: &str, bytes: Vec<u8>) -> Result<(), String> {
    let url = format!("http://{}/data/files", address);
    let part = reqwest::multipart::Part::bytes(bytes).file_name(name.to_string());
    let form = reqwest::multipart::Form::new().part("file", part);

    let response = HTTP
        .post(&url)
        .multipart(form)
        .send()
        .await
        .map_err(|e| format!("Failed to upload {}: {}", name, e))?;

    if !response.status().is_success() {
        return Err(format!("Upload of {} failed: HTTP {}", name, response.status()));
    }
    Ok(())
}

pub async fn file_exists(address: &str, name: &str) -> Result<bool, String> {
    let url = format!("http://{}/data/files/{}", address, name);
    let response = HTTP
        .head(&url)
        .send()
        .await
        .map_err(|e| format!("Failed to check {}: {}", name, e))?;
    Ok(response.status().is_success())
}

pub async fn delete_file(address: &str, name: &str) -> Result<(), String> {
    let url = format!("http://{}/data/files/{}", address, name);
    let response = HTTP
        .delete(&url)
        .send()
        .await
        .map_err(|e| format!("Failed to delete {}: {}", name, e))?;

    if !response.status().is_success() {
        return Err(format!(
            "Delete of {} failed: HTTP {}",
            name,
            response.status()
        ));
    }
    Ok(())
}
