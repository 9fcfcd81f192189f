use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use uplink::{ConnectionState, ServerEvent, Session, UplinkClient};

use crate::workspace::Workspace;

/// Bridges the uplink client into the workspace: inbound events flow through
/// one queue with one consumer, so they mutate the store in arrival order
/// with no reordering or coalescing.
pub struct UplinkManager {
    inner: Mutex<Option<UplinkClient>>,
    session: Arc<Mutex<Session>>,
}

impl UplinkManager {
    pub fn new(session: Arc<Mutex<Session>>) -> Self {
        Self {
            inner: Mutex::new(None),
            session,
        }
    }

    pub fn session(&self) -> Arc<Mutex<Session>> {
        self.session.clone()
    }

    /// Connect to the executor's realtime endpoint. A no-op while a client
    /// is already running.
    pub async fn start(
        &self,
        address: String,
        workspace: Arc<Mutex<Workspace>>,
    ) -> Result<(), String> {
        let mut guard = self.inner.lock().await;
        if guard.is_some() {
            println!("[realtime] uplink already running");
            return Ok(());
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let mut ws = workspace.lock().await;
                if let Err(e) = ws.apply_event(event).await {
                    eprintln!("[realtime] failed to apply event: {e}");
                }
            }
        });

        let client = UplinkClient::start(address, self.session.clone(), move |event| {
            let _ = tx.send(event);
        })
        .await?;

        *guard = Some(client);
        Ok(())
    }

    /// Close the socket and cancel any pending reconnect. The session id
    /// survives for a later reconnect.
    pub async fn stop(&self) {
        let mut guard = self.inner.lock().await;
        if let Some(client) = guard.take() {
            client.stop().await;
        }
    }

    /// Stop and forget the session identity entirely.
    pub async fn destroy(&self) {
        self.stop().await;
        let mut session = self.session.lock().await;
        session.sid = None;
        session.address = None;
        session.state = ConnectionState::Disconnected;
    }
}
