use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::Mutex;
use uuid::Uuid;

use uplink::{ServerEvent, Session};

use crate::database::{self, StateDb};
use crate::graph::{self, GraphStore, ParamField};
use crate::models::schema::{
    Connection, EdgeChange, ExecutionType, GraphExport, GraphNode, Mode, NodeChange, NodeProgress,
    NodeTypeDef, Position, StoredWorkflow, Viewport,
};
use crate::services::{dispatch, registry};
use crate::settings::AppSettings;

/// Owner of the editing state: wraps every store mutation with snapshot
/// persistence, remote cache invalidation, and the automatic partial run
/// for `continuous` nodes. Also the single entry point through which
/// realtime events mutate the graph, so there is exactly one mutation
/// surface.
pub struct Workspace {
    store: GraphStore,
    db: StateDb,
    settings: AppSettings,
    registry: HashMap<String, NodeTypeDef>,
    node_progress: HashMap<String, NodeProgress>,
    session: Arc<Mutex<Session>>,
}

impl Workspace {
    pub fn new(db: StateDb, settings: AppSettings, session: Arc<Mutex<Session>>) -> Self {
        Self {
            store: GraphStore::new(),
            db,
            settings,
            registry: HashMap::new(),
            node_progress: HashMap::new(),
            session,
        }
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn registry(&self) -> &HashMap<String, NodeTypeDef> {
        &self.registry
    }

    pub fn node_progress(&self) -> &HashMap<String, NodeProgress> {
        &self.node_progress
    }

    /// Tear down the workspace, handing back its database pool.
    pub fn into_db(self) -> sqlx::SqlitePool {
        self.db.0
    }

    /// Restore the last-active mode's workflow.
    pub async fn bootstrap(&mut self) -> Result<(), String> {
        let mode = database::load_last_mode(&self.db.0).await?;
        self.load_workflow(Some(mode)).await
    }

    /// Load the stored workflow for `override_mode` (or the current mode).
    /// Modes never merge: switching swaps the whole graph.
    pub async fn load_workflow(&mut self, override_mode: Option<Mode>) -> Result<(), String> {
        let mode = override_mode.unwrap_or_else(|| self.store.mode());
        if override_mode.is_some() {
            database::save_last_mode(&self.db.0, mode).await?;
        }

        let workflow = database::load_snapshot(&self.db.0, mode)
            .await?
            .unwrap_or(StoredWorkflow {
                mode,
                nodes: Vec::new(),
                edges: Vec::new(),
                viewport: None,
            });
        self.store.load(workflow);
        Ok(())
    }

    /// Import a dropped workflow file: a missing `type` defaults to the
    /// workflow mode, then the snapshot is stored and activated.
    pub async fn import_workflow(&mut self, raw: &str) -> Result<(), String> {
        let workflow: StoredWorkflow =
            serde_json::from_str(raw).map_err(|e| format!("Not a workflow file: {}", e))?;
        let mode = workflow.mode;
        database::save_snapshot(&self.db.0, &workflow).await?;
        self.load_workflow(Some(mode)).await
    }

    async fn persist(&self) -> Result<(), String> {
        database::save_snapshot(&self.db.0, &self.store.snapshot()).await?;
        database::save_last_mode(&self.db.0, self.store.mode()).await
    }

    pub async fn add_node(&mut self, node: GraphNode) -> Result<(), String> {
        self.store.add_node(node);
        self.persist().await
    }

    /// Seed a node from the registry, as on a drop-from-sidebar gesture.
    pub async fn add_node_from_registry(
        &mut self,
        type_key: &str,
        position: Position,
    ) -> Result<String, String> {
        let def = self
            .registry
            .get(type_key)
            .cloned()
            .ok_or_else(|| format!("Unknown node type: {}", type_key))?;
        let id = Uuid::new_v4().to_string();
        self.add_node(GraphNode {
            id: id.clone(),
            node_type: Some("custom".to_string()),
            position,
            data: def.into_node_data(),
        })
        .await?;
        Ok(id)
    }

    /// Apply node diffs; removals trigger a fire-and-forget remote cache
    /// invalidation (failure is logged, never surfaced or retried).
    pub async fn on_nodes_change(&mut self, changes: Vec<NodeChange>) -> Result<(), String> {
        let removed = self.store.apply_node_changes(changes);
        self.persist().await?;

        if !removed.is_empty() {
            let address = self.settings.server_address.clone();
            tokio::spawn(async move {
                if let Err(e) = dispatch::clear_node_cache(&address, &removed).await {
                    eprintln!("[workspace] can't clear remote node cache: {e}");
                }
            });
        }
        Ok(())
    }

    pub async fn on_edges_change(&mut self, changes: Vec<EdgeChange>) -> Result<(), String> {
        self.store.apply_edge_changes(changes);
        self.persist().await
    }

    /// Remove one edge, as on an edge double-click in the host UI.
    pub async fn disconnect_edge(&mut self, edge_id: &str) -> Result<(), String> {
        self.on_edges_change(vec![EdgeChange::Remove {
            id: edge_id.to_string(),
        }])
        .await
    }

    /// Validate and materialize a connect gesture. Illegal connections are
    /// rejected silently.
    pub async fn on_connect(&mut self, conn: Connection) -> Result<(), String> {
        if !graph::is_valid_connection(&self.store, &conn, self.settings.validation) {
            return Ok(());
        }
        self.store.connect(conn);
        self.persist().await
    }

    /// Set a parameter value. A deep-equal value is a complete no-op: no
    /// snapshot write, no execution trigger.
    pub async fn set_param_value(&mut self, id: &str, key: &str, value: Value) -> Result<(), String> {
        if !self.store.set_param_value(id, key, value).changed() {
            return Ok(());
        }
        self.persist().await?;
        self.run_continuous(id).await;
        Ok(())
    }

    /// Set one field of one parameter (the value field being the default
    /// case shares the no-op guarantee above).
    pub async fn set_param(
        &mut self,
        id: &str,
        key: &str,
        field: ParamField,
        value: Value,
    ) -> Result<(), String> {
        if !self.store.set_param(id, key, field, value).changed() {
            return Ok(());
        }
        self.persist().await?;
        self.run_continuous(id).await;
        Ok(())
    }

    async fn run_continuous(&self, id: &str) {
        if self.store.execution_type(id) == Some(ExecutionType::Continuous) {
            self.run_sub_graph(id).await;
        }
    }

    pub async fn set_viewport(&mut self, viewport: Viewport) -> Result<(), String> {
        self.store.set_viewport(viewport);
        self.persist().await
    }

    pub async fn update_node_registry(&mut self) -> Result<usize, String> {
        self.registry = registry::fetch_node_registry(&self.settings.server_address).await?;
        Ok(self.registry.len())
    }

    /// Submit the whole graph for execution.
    pub async fn run_graph(&self) {
        let graph = self.store.export_graph(&self.sid().await);
        self.submit(graph);
    }

    /// Submit only the dependency paths that involve `node_id`.
    pub async fn run_sub_graph(&self, node_id: &str) {
        let graph = self.store.sub_graph(&self.sid().await, node_id);
        self.submit(graph);
    }

    async fn sid(&self) -> String {
        self.session.lock().await.sid.clone().unwrap_or_default()
    }

    fn submit(&self, graph: GraphExport) {
        let address = self.settings.server_address.clone();
        tokio::spawn(async move {
            if let Err(e) = dispatch::post_graph(&address, &graph).await {
                eprintln!("[workspace] graph dispatch failed: {e}");
            }
        });
    }

    pub fn update_node_progress(&mut self, node_id: &str, progress: f64) {
        self.node_progress
            .insert(node_id.to_string(), NodeProgress::from_wire(progress));
    }

    /// Reconcile one realtime event into the store. Events arrive in socket
    /// order and are applied one at a time.
    ///
    /// Result payloads (`image`/`3d`/`text`/`json`) set the parameter value
    /// without re-triggering continuous execution; `updateValues` goes
    /// through the full value-mutation path, whose no-op guard keeps remote
    /// echoes from looping.
    pub async fn apply_event(&mut self, event: ServerEvent) -> Result<(), String> {
        match event {
            ServerEvent::Welcome { sid } => {
                println!("[workspace] session {sid} confirmed");
                Ok(())
            }
            ServerEvent::Progress { node_id, progress } => {
                self.update_node_progress(&node_id, progress);
                Ok(())
            }
            ServerEvent::Image { node_id, key, data }
            | ServerEvent::Text { node_id, key, data }
            | ServerEvent::Json { node_id, key, data } => {
                self.apply_result(&node_id, &key, data).await
            }
            ServerEvent::ThreeD { node_id, key, data } => {
                self.apply_result(&node_id, &key, data.unwrap_or_else(|| json!({ "url": null })))
                    .await
            }
            ServerEvent::Executed {
                node_id,
                time,
                memory,
            } => {
                self.store.set_node_executed(&node_id, true, time, memory);
                self.update_node_progress(&node_id, -2.0);
                Ok(())
            }
            ServerEvent::UpdateValues {
                node_id,
                key,
                value,
            } => self.set_param_value(&node_id, &key, value).await,
            ServerEvent::Error { error, message } => {
                eprintln!(
                    "[workspace] executor error: {}",
                    error
                        .or(message)
                        .unwrap_or_else(|| "unknown error".to_string())
                );
                self.node_progress.clear();
                Ok(())
            }
            ServerEvent::Pong => Ok(()),
        }
    }

    async fn apply_result(&mut self, node_id: &str, key: &str, data: Value) -> Result<(), String> {
        if self
            .store
            .set_param(node_id, key, ParamField::Value, data)
            .changed()
        {
            self.persist().await?;
        }
        Ok(())
    }
}
