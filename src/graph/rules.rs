use serde::{Deserialize, Serialize};

use crate::graph::store::GraphStore;
use crate::models::schema::Connection;

/// Hard cap on spawned sibling parameters per base key.
pub const SPAWN_CAP: usize = 32;

/// Source types implicitly match everything via this tag.
pub const WILDCARD_TYPE: &str = "any";

/// Connection-legality policy. `TypeCheck` requires intersecting type tags;
/// `AcceptAll` only rejects self-loops and missing handles.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPolicy {
    TypeCheck,
    AcceptAll,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        ValidationPolicy::TypeCheck
    }
}

/// Decide whether a proposed edge is legal. Consulted before `connect`;
/// rejections are silent.
pub fn is_valid_connection(
    store: &GraphStore,
    conn: &Connection,
    policy: ValidationPolicy,
) -> bool {
    let (Some(source_handle), Some(target_handle)) =
        (conn.source_handle.as_deref(), conn.target_handle.as_deref())
    else {
        return false;
    };

    if conn.source == conn.target {
        return false;
    }

    match policy {
        ValidationPolicy::AcceptAll => true,
        ValidationPolicy::TypeCheck => {
            let mut source_types = store.param_type_tags(&conn.source, source_handle);
            source_types.push(WILDCARD_TYPE.to_string());
            let target_types = store.param_type_tags(&conn.target, target_handle);
            // An untyped target accepts anything.
            if target_types.is_empty() {
                return true;
            }
            source_types.iter().any(|tag| target_types.contains(tag))
        }
    }
}

/// Base key of a possibly indexed spawn sibling: `images[3]` -> `images`.
pub fn spawn_base(key: &str) -> &str {
    match (key.rfind('['), key.ends_with(']')) {
        (Some(open), true) if key[open + 1..key.len() - 1].chars().all(|c| c.is_ascii_digit()) => {
            &key[..open]
        }
        _ => key,
    }
}

/// Index of a spawn sibling: `images[3]` -> `Some(3)`, `images` -> `None`.
pub fn spawn_index(key: &str) -> Option<usize> {
    let open = key.rfind('[')?;
    if !key.ends_with(']') {
        return None;
    }
    key[open + 1..key.len() - 1].parse().ok()
}
