pub mod dispatch;
pub mod files;
pub mod registry;

use once_cell::sync::Lazy;
use reqwest::Client;

/// One HTTP client shared by every service call.
pub static HTTP: Lazy<Client> = Lazy::new(Client::new);
