use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::Value;
use uuid::Uuid;

use crate::graph::{path, rules};
use crate::models::schema::{
    ApiNode, ApiParam, Connection, EdgeChange, EdgeStyle, ExecutionType, GraphEdge, GraphExport,
    GraphNode, GroupState, Mode, NodeChange, OnChange, StoredWorkflow, Viewport,
};

/// Fallback edge color when the UI does not report the handle's rendered one.
const DEFAULT_EDGE_STROKE: &str = "#aaaaaa";

/// Whether a mutation actually changed anything. `Unchanged` must not be
/// persisted or trigger execution, or remote echoes would loop forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    Changed,
    Unchanged,
}

impl SetOutcome {
    pub fn changed(&self) -> bool {
        matches!(self, SetOutcome::Changed)
    }
}

/// Which field of a parameter a `set_param` call addresses. `Group` routes
/// to the node-level group state instead of the parameter itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamField {
    Value,
    Disabled,
    Hidden,
    Group,
}

/// The authoritative in-memory graph. Single writer: every mutation goes
/// through these methods, readers go through the accessors.
#[derive(Debug, Default)]
pub struct GraphStore {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    mode: Mode,
    viewport: Option<Viewport>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    fn node_mut(&mut self, id: &str) -> Option<&mut GraphNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn execution_type(&self, id: &str) -> Option<ExecutionType> {
        self.node(id).map(|n| n.data.execution_type)
    }

    /// Append a node, initializing every missing parameter value from its
    /// declared default.
    pub fn add_node(&mut self, mut node: GraphNode) {
        for spec in node.data.params.values_mut() {
            if spec.value.is_none() {
                spec.value = spec.default.clone();
            }
        }
        self.nodes.push(node);
    }

    /// Apply a batch of node diffs. Removing a node also removes every edge
    /// touching it. Returns the removed node ids so the owner can request
    /// remote cache invalidation.
    pub fn apply_node_changes(&mut self, changes: Vec<NodeChange>) -> Vec<String> {
        let mut removed = Vec::new();
        for change in changes {
            match change {
                NodeChange::Add { item } => self.add_node(item),
                NodeChange::Position { id, position } => {
                    if let Some(node) = self.node_mut(&id) {
                        node.position = position;
                    }
                }
                NodeChange::Remove { id } => {
                    let touching: Vec<EdgeChange> = self
                        .edges
                        .iter()
                        .filter(|e| e.source == id || e.target == id)
                        .map(|e| EdgeChange::Remove { id: e.id.clone() })
                        .collect();
                    self.apply_edge_changes(touching);
                    self.nodes.retain(|n| n.id != id);
                    removed.push(id);
                }
            }
        }
        removed
    }

    /// Apply a batch of edge diffs. Removing the edge that feeds a
    /// spawn-marked handle also deletes that parameter key from the target
    /// node, so no orphaned array slots survive a disconnect.
    pub fn apply_edge_changes(&mut self, changes: Vec<EdgeChange>) {
        for change in changes {
            match change {
                EdgeChange::Add { item } => self.edges.push(item),
                EdgeChange::Remove { id } => {
                    let Some(index) = self.edges.iter().position(|e| e.id == id) else {
                        continue;
                    };
                    let edge = self.edges.remove(index);
                    if let Some(handle) = edge.target_handle.as_deref() {
                        if self.param_is_spawn(&edge.target, handle) {
                            if let Some(node) = self.node_mut(&edge.target) {
                                node.data.params.shift_remove(handle);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Materialize a connect gesture. Any edge already occupying the same
    /// `(target, targetHandle)` is replaced atomically. Connecting to a
    /// spawn-marked handle (other than as a same-handle replacement)
    /// allocates the next indexed sibling parameter, inserted right after
    /// the connected key; past the sibling cap the gesture is dropped
    /// entirely.
    pub fn connect(&mut self, conn: Connection) {
        let Some(target_handle) = conn.target_handle.clone() else {
            return;
        };

        let is_reconnection = self.edges.iter().any(|e| {
            e.target == conn.target && e.target_handle.as_deref() == Some(target_handle.as_str())
        });
        let spawn = self.param_is_spawn(&conn.target, &target_handle);

        if spawn && !is_reconnection && !self.allocate_spawn_sibling(&conn.target, &target_handle) {
            return;
        }

        self.edges.retain(|e| {
            !(e.target == conn.target
                && e.target_handle.as_deref() == Some(target_handle.as_str()))
        });
        self.edges.push(GraphEdge {
            id: Uuid::new_v4().to_string(),
            source: conn.source,
            source_handle: conn.source_handle,
            target: conn.target,
            target_handle: Some(target_handle),
            style: Some(EdgeStyle {
                stroke: Some(
                    conn.stroke
                        .unwrap_or_else(|| DEFAULT_EDGE_STROKE.to_string()),
                ),
            }),
        });
    }

    fn allocate_spawn_sibling(&mut self, node_id: &str, handle: &str) -> bool {
        let Some(node) = self.nodes.iter_mut().find(|n| n.id == node_id) else {
            return true;
        };
        let base = rules::spawn_base(handle).to_string();
        let siblings: Vec<String> = node
            .data
            .params
            .keys()
            .filter(|key| rules::spawn_base(key) == base)
            .cloned()
            .collect();
        if siblings.len() > rules::SPAWN_CAP {
            return false;
        }

        let next = siblings
            .iter()
            .map(|key| rules::spawn_index(key).unwrap_or(0))
            .max()
            .unwrap_or(0)
            + 1;
        let Some(position) = node.data.params.get_index_of(handle) else {
            return true;
        };
        let Some(spec) = node.data.params.get(handle).cloned() else {
            return true;
        };
        node.data
            .params
            .shift_insert(position + 1, format!("{base}[{next}]"), spec);
        true
    }

    /// Set a parameter's current value. Deep-equal values are a guaranteed
    /// no-op: no mutation, no persistence, no execution trigger. A real
    /// change also applies the parameter's declared on-change actions.
    pub fn set_param_value(&mut self, id: &str, key: &str, value: Value) -> SetOutcome {
        let Some(node) = self.nodes.iter_mut().find(|n| n.id == id) else {
            return SetOutcome::Unchanged;
        };
        let Some(spec) = node.data.params.get_mut(key) else {
            return SetOutcome::Unchanged;
        };
        if spec.value.as_ref() == Some(&value) {
            return SetOutcome::Unchanged;
        }

        spec.value = Some(value.clone());
        let on_change = spec.on_change.clone();
        if let Some(action) = on_change {
            self.apply_on_change(id, &action, &value);
        }
        SetOutcome::Changed
    }

    /// Set one field of one parameter; `ParamField::Value` is the common
    /// case and shares `set_param_value`'s no-op guarantee.
    pub fn set_param(&mut self, id: &str, key: &str, field: ParamField, value: Value) -> SetOutcome {
        match field {
            ParamField::Value => self.set_param_value(id, key, value),
            ParamField::Disabled => {
                let flag = value.as_bool().unwrap_or(false);
                let Some(spec) = self
                    .nodes
                    .iter_mut()
                    .find(|n| n.id == id)
                    .and_then(|n| n.data.params.get_mut(key))
                else {
                    return SetOutcome::Unchanged;
                };
                if spec.disabled == Some(flag) {
                    return SetOutcome::Unchanged;
                }
                spec.disabled = Some(flag);
                SetOutcome::Changed
            }
            ParamField::Hidden => {
                let flag = value.as_bool().unwrap_or(false);
                let Some(spec) = self
                    .nodes
                    .iter_mut()
                    .find(|n| n.id == id)
                    .and_then(|n| n.data.params.get_mut(key))
                else {
                    return SetOutcome::Unchanged;
                };
                if spec.hidden == Some(flag) {
                    return SetOutcome::Unchanged;
                }
                spec.hidden = Some(flag);
                SetOutcome::Changed
            }
            ParamField::Group => {
                let patch: GroupState = serde_json::from_value(value).unwrap_or_default();
                self.set_group_state(id, key, &patch)
            }
        }
    }

    /// Merge a partial group state into a node's group map.
    pub fn set_group_state(&mut self, id: &str, group_key: &str, patch: &GroupState) -> SetOutcome {
        let Some(node) = self.nodes.iter_mut().find(|n| n.id == id) else {
            return SetOutcome::Unchanged;
        };
        let groups = node.data.groups.get_or_insert_with(Default::default);
        let entry = groups.entry(group_key.to_string()).or_default();
        if entry.merge(patch) {
            SetOutcome::Changed
        } else {
            SetOutcome::Unchanged
        }
    }

    fn apply_on_change(&mut self, id: &str, action: &OnChange, value: &Value) {
        match action.action() {
            "show" => {
                let Some(Value::Object(map)) = action.target() else {
                    return;
                };
                let selected = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                for (option, targets) in map {
                    let hidden = *option != selected;
                    for target in target_list(targets) {
                        if target.ends_with("_group") {
                            self.set_group_state(
                                id,
                                &target,
                                &GroupState {
                                    hidden: Some(hidden),
                                    ..Default::default()
                                },
                            );
                        } else {
                            self.set_param(id, &target, ParamField::Hidden, Value::Bool(hidden));
                        }
                    }
                }
            }
            "disable" => {
                let Some(Value::Object(map)) = action.target() else {
                    return;
                };
                let state = value.as_bool().unwrap_or(false);
                let on_true = map.get("true").map(target_list).unwrap_or_default();
                let on_false = map.get("false").map(target_list).unwrap_or_default();
                for target in on_true {
                    self.apply_disable(id, &target, state);
                }
                for target in on_false {
                    self.apply_disable(id, &target, !state);
                }
            }
            _ => {}
        }
    }

    fn apply_disable(&mut self, id: &str, target: &str, disabled: bool) {
        if target.ends_with("_group") {
            self.set_group_state(
                id,
                target,
                &GroupState {
                    disabled: Some(disabled),
                    ..Default::default()
                },
            );
        } else {
            self.set_param(id, target, ParamField::Disabled, Value::Bool(disabled));
        }
    }

    pub fn param_value(&self, id: &str, key: &str) -> Option<&Value> {
        self.node(id)?.data.params.get(key)?.value.as_ref()
    }

    pub fn param_is_spawn(&self, id: &str, key: &str) -> bool {
        self.node(id)
            .and_then(|n| n.data.params.get(key))
            .map(|spec| spec.is_spawn())
            .unwrap_or(false)
    }

    pub fn param_type_tags(&self, id: &str, key: &str) -> Vec<String> {
        self.node(id)
            .and_then(|n| n.data.params.get(key))
            .map(|spec| spec.type_vec())
            .unwrap_or_default()
    }

    pub fn param_display(&self, id: &str, key: &str) -> Option<String> {
        self.node(id)?.data.params.get(key)?.display.clone()
    }

    /// Record the executor's reported stats for a node. Pure state update.
    pub fn set_node_executed(&mut self, id: &str, cache: bool, time: f64, memory: f64) {
        if let Some(node) = self.node_mut(id) {
            node.data.cache = Some(cache);
            node.data.time = Some(time);
            node.data.memory = Some(memory);
        }
    }

    /// Per-node projection for an execution request: every non-output
    /// parameter records either the edge feeding it or its local value.
    fn project_node(&self, node: &GraphNode) -> ApiNode {
        let input_edges: Vec<&GraphEdge> =
            self.edges.iter().filter(|e| e.target == node.id).collect();
        let mut params = IndexMap::new();

        for (key, spec) in &node.data.params {
            if spec.is_output() {
                continue;
            }
            let edge = input_edges
                .iter()
                .find(|e| e.target_handle.as_deref() == Some(key.as_str()));
            let source_key = match edge {
                Some(e) => e.source_handle.clone(),
                None => spec.source.clone(),
            };
            params.insert(
                key.clone(),
                ApiParam {
                    source_id: edge.map(|e| e.source.clone()),
                    source_key,
                    value: spec.value.clone(),
                    display: spec.display.clone(),
                    type_tags: spec.type_tags.clone(),
                },
            );
        }

        ApiNode {
            module: node.data.module.clone(),
            action: node.data.action.clone(),
            params,
        }
    }

    /// Full-graph execution request: one dependency path per sink node plus
    /// a projection of every node.
    pub fn export_graph(&self, sid: &str) -> GraphExport {
        let graph = path::adjacency(&self.nodes, &self.edges);
        let paths = path::sinks(&graph, &self.nodes)
            .into_iter()
            .map(|sink| path::build_path(&graph, sink, HashSet::new()))
            .collect();

        GraphExport {
            sid: sid.to_string(),
            mode: self.mode,
            nodes: self
                .nodes
                .iter()
                .map(|n| (n.id.clone(), self.project_node(n)))
                .collect(),
            paths,
        }
    }

    /// Partial execution request for one node: same projections as the full
    /// export, but only the sink paths that include the node. A node on no
    /// sink path (a dead end) gets a single path to itself.
    pub fn sub_graph(&self, sid: &str, node_id: &str) -> GraphExport {
        let graph = path::adjacency(&self.nodes, &self.edges);
        let mut paths: Vec<Vec<String>> = path::sinks(&graph, &self.nodes)
            .into_iter()
            .filter_map(|sink| {
                let p = path::build_path(&graph, sink, HashSet::new());
                p.iter().any(|id| id.as_str() == node_id).then_some(p)
            })
            .collect();

        if paths.is_empty() {
            if let Some(node) = self.node(node_id) {
                paths.push(path::build_path(&graph, node.id.as_str(), HashSet::new()));
            }
        }

        GraphExport {
            sid: sid.to_string(),
            mode: self.mode,
            nodes: self
                .nodes
                .iter()
                .map(|n| (n.id.clone(), self.project_node(n)))
                .collect(),
            paths,
        }
    }

    /// Swap in a stored workflow wholesale.
    pub fn load(&mut self, workflow: StoredWorkflow) {
        self.mode = workflow.mode;
        self.nodes = workflow.nodes;
        self.edges = workflow.edges;
        self.viewport = workflow.viewport;
    }

    pub fn snapshot(&self) -> StoredWorkflow {
        StoredWorkflow {
            mode: self.mode,
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
            viewport: self.viewport,
        }
    }
}

fn target_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}
