pub mod protocol;
pub mod types;

pub use types::{ConnectionState, ServerEvent, Session, RECONNECT_DELAY_MS};

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Duration;

use futures_util::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Realtime client for the executor's event channel.
///
/// One driver task owns the whole connect/read/reconnect cycle, so there is
/// never more than one pending reconnect timer. Parsed events are handed to
/// the callback in arrival order; the channel is receive-only.
pub struct UplinkClient {
    stop_tx: mpsc::Sender<()>,
}

impl UplinkClient {
    /// Start the client against `address` (host:port). Generates a session
    /// id if the session does not carry one yet; a `welcome` frame may later
    /// replace it with the server's authoritative id.
    pub async fn start(
        address: String,
        session: Arc<Mutex<Session>>,
        callback: impl Fn(ServerEvent) + Send + Sync + 'static,
    ) -> Result<Self, String> {
        {
            let mut s = session.lock().await;
            s.address = Some(address.clone());
            if s.sid.is_none() {
                s.sid = Some(uuid::Uuid::new_v4().to_string());
            }
        }

        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        let sess = session.clone();

        tokio::spawn(async move {
            loop {
                let url = {
                    let mut s = sess.lock().await;
                    s.state = ConnectionState::Connecting;
                    protocol::socket_url(&address, s.sid.as_deref().unwrap_or_default())
                };

                match connect_async(url.as_str()).await {
                    Ok((mut ws, _response)) => {
                        {
                            let mut s = sess.lock().await;
                            s.state = ConnectionState::Connected;
                        }
                        eprintln!("[uplink] connected to {url}");

                        let mut stopped = false;
                        loop {
                            tokio::select! {
                                _ = stop_rx.recv() => {
                                    let _ = ws.close(None).await;
                                    stopped = true;
                                    break;
                                }
                                frame = ws.next() => match frame {
                                    Some(Ok(Message::Text(text))) => {
                                        if let Some(event) = protocol::parse_event(&text) {
                                            if let ServerEvent::Welcome { sid } = &event {
                                                let mut s = sess.lock().await;
                                                if s.sid.as_deref() != Some(sid.as_str()) {
                                                    eprintln!("[uplink] session id mismatch, adopting {sid}");
                                                    s.sid = Some(sid.clone());
                                                }
                                            }
                                            callback(event);
                                        }
                                    }
                                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                                    Some(Ok(_)) => {}
                                }
                            }
                        }

                        {
                            let mut s = sess.lock().await;
                            s.state = ConnectionState::Disconnected;
                        }
                        if stopped {
                            return;
                        }
                        eprintln!("[uplink] connection closed, retrying in {RECONNECT_DELAY_MS}ms");
                    }
                    Err(e) => {
                        {
                            let mut s = sess.lock().await;
                            s.state = ConnectionState::Disconnected;
                        }
                        eprintln!("[uplink] connect to {url} failed: {e}; retrying in {RECONNECT_DELAY_MS}ms");
                    }
                }

                // Fixed-delay retry. Stopping cancels the pending timer.
                tokio::select! {
                    _ = stop_rx.recv() => return,
                    _ = tokio::time::sleep(Duration::from_millis(RECONNECT_DELAY_MS)) => {}
                }
            }
        });

        Ok(Self { stop_tx })
    }

    /// Close the socket and cancel any pending reconnect. The session id is
    /// kept so a later start resumes the same identity.
    pub async fn stop(&self) {
        let _ = self.stop_tx.send(()).await;
    }
}
