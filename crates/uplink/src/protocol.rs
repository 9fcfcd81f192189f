use crate::types::ServerEvent;

/// Decode one inbound frame. Unknown or malformed messages are dropped with
/// a logged warning; the channel itself stays alive.
pub fn parse_event(raw: &str) -> Option<ServerEvent> {
    match serde_json::from_str::<ServerEvent>(raw) {
        Ok(event) => Some(event),
        Err(e) => {
            eprintln!("[uplink] ignoring unrecognized message: {e}");
            None
        }
    }
}

/// Build the socket url for an executor address. Addresses are host:port;
/// a full ws:// url is passed through untouched.
pub fn socket_url(address: &str, sid: &str) -> String {
    let base = if address.contains("://") {
        address.to_string()
    } else {
        format!("ws://{}{}", address, crate::types::SOCKET_PATH)
    };
    format!("{base}?sid={sid}")
}
