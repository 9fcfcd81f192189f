//! Headless core of a node-based media generation editor: the graph model
//! and its mutation rules, dependency-path extraction, the execution
//! request protocol, the realtime event channel, and per-mode workflow
//! persistence. Rendering and widgets live in the host UI; it talks to this
//! core through `Workspace` and reads back through the store accessors.

pub mod database;
pub mod graph;
pub mod models;
pub mod realtime;
pub mod services;
pub mod settings;
pub mod workspace;

pub use uplink;

pub use graph::{GraphStore, ParamField, SetOutcome, ValidationPolicy};
pub use realtime::UplinkManager;
pub use settings::AppSettings;
pub use workspace::Workspace;
