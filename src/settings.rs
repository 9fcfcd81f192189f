use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::graph::ValidationPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Executor address as host:port; http and ws endpoints derive from it.
    pub server_address: String,
    /// Connection-legality policy applied on connect gestures.
    pub validation: ValidationPolicy,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:8080".to_string(),
            validation: ValidationPolicy::TypeCheck,
        }
    }
}

impl AppSettings {
    /// Defaults with the `PATCHBAY_SERVER` environment override applied.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Ok(address) = std::env::var("PATCHBAY_SERVER") {
            if !address.is_empty() {
                settings.server_address = address;
            }
        }
        settings
    }

    /// Platform data dir for the state database.
    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("patchbay")
    }
}
