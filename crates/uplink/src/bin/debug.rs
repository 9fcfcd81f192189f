//! Standalone uplink debug tool.
//! Run with: cargo run -p uplink --bin uplink-debug -- 127.0.0.1:8080
//!
//! Connects to an executor's realtime endpoint and prints every inbound
//! event as one JSON line until interrupted.

use std::sync::Arc;
use tokio::sync::Mutex;

use uplink::{Session, UplinkClient};

#[tokio::main]
async fn main() -> Result<(), String> {
    let address = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8080".to_string());

    eprintln!("[uplink-debug] connecting to {address}");

    let session = Arc::new(Mutex::new(Session::new()));
    let client = UplinkClient::start(address, session.clone(), |event| {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("[uplink-debug] unprintable event: {e}"),
        }
    })
    .await?;

    {
        let s = session.lock().await;
        eprintln!(
            "[uplink-debug] session id {}",
            s.sid.as_deref().unwrap_or("(pending)")
        );
    }

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to wait for interrupt: {e}"))?;

    client.stop().await;
    Ok(())
}
