//! Headless runner: restores the last-active workflow, connects to the
//! executor, submits the graph, and prints events until interrupted.
//! Run with: cargo run -- 127.0.0.1:8080

use std::sync::Arc;
use tokio::sync::Mutex;

use patchbay_lib::database;
use patchbay_lib::realtime::UplinkManager;
use patchbay_lib::settings::AppSettings;
use patchbay_lib::uplink::Session;
use patchbay_lib::workspace::Workspace;

#[tokio::main]
async fn main() -> Result<(), String> {
    let mut settings = AppSettings::from_env();
    if let Some(address) = std::env::args().nth(1) {
        settings.server_address = address;
    }
    println!("[patchbay] executor at {}", settings.server_address);

    let db = database::init_state_db(&AppSettings::data_dir()).await?;
    let session = Arc::new(Mutex::new(Session::new()));

    let mut workspace = Workspace::new(db, settings.clone(), session.clone());
    workspace.bootstrap().await?;
    match workspace.update_node_registry().await {
        Ok(count) => println!("[patchbay] node registry loaded ({count} types)"),
        Err(e) => eprintln!("[patchbay] {e}"),
    }
    println!(
        "[patchbay] workflow restored: {} nodes, {} edges",
        workspace.store().nodes().len(),
        workspace.store().edges().len()
    );

    let workspace = Arc::new(Mutex::new(workspace));
    let manager = UplinkManager::new(session);
    manager
        .start(settings.server_address.clone(), workspace.clone())
        .await?;

    // Let the welcome handshake settle before submitting the stored graph.
    tokio::time::sleep(std::time::Duration::from_millis(750)).await;
    workspace.lock().await.run_graph().await;

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to wait for interrupt: {e}"))?;
    manager.stop().await;
    Ok(())
}
