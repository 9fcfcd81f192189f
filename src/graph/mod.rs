mod path;
mod rules;
mod store;

pub use path::{adjacency, build_path, sinks};
pub use rules::{is_valid_connection, spawn_base, spawn_index, ValidationPolicy, SPAWN_CAP};
pub use store::{GraphStore, ParamField, SetOutcome};

#[cfg(test)]
mod tests;
