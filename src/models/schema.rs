use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use ts_rs::TS;

/// Editing mode. Each mode owns an independent stored workflow; switching
/// modes swaps the whole graph, it never merges.
#[derive(TS, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/schema.ts")]
pub enum Mode {
    Workflow,
    Tool,
}

impl Mode {
    pub fn storage_key(&self) -> &'static str {
        match self {
            Mode::Workflow => "workflow",
            Mode::Tool => "tool",
        }
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Workflow
    }
}

#[derive(TS, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/schema.ts")]
pub enum ExecutionType {
    /// Runs when the whole workflow is submitted.
    Workflow,
    /// Runs on an explicit per-node trigger.
    Button,
    /// Any local parameter edit re-runs the node's dependency path.
    Continuous,
}

impl Default for ExecutionType {
    fn default() -> Self {
        ExecutionType::Workflow
    }
}

#[derive(TS, Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[ts(export, export_to = "bindings/schema.ts")]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

#[derive(TS, Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[ts(export, export_to = "bindings/schema.ts")]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Accepted/produced type tags of a handle. Servers send either one tag or
/// a list; both are kept as-is for round-tripping.
#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
#[ts(export, export_to = "bindings/schema.ts")]
pub enum TypeTags {
    One(String),
    Many(Vec<String>),
}

impl TypeTags {
    pub fn as_vec(&self) -> Vec<String> {
        match self {
            TypeTags::One(tag) => vec![tag.clone()],
            TypeTags::Many(tags) => tags.clone(),
        }
    }
}

/// Declarative side effect of a parameter value change: `show` tracks a
/// select value and hides every non-matching target, `disable` mirrors a
/// boolean onto its targets. Targets ending in `_group` address a whole
/// visual group.
#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
#[ts(export, export_to = "bindings/schema.ts")]
pub enum OnChange {
    Action(String),
    Spec {
        action: String,
        #[serde(default)]
        #[ts(type = "unknown")]
        target: Option<Value>,
    },
}

impl OnChange {
    pub fn action(&self) -> &str {
        match self {
            OnChange::Action(action) => action,
            OnChange::Spec { action, .. } => action,
        }
    }

    pub fn target(&self) -> Option<&Value> {
        match self {
            OnChange::Action(_) => None,
            OnChange::Spec { target, .. } => target.as_ref(),
        }
    }
}

/// Visual grouping reference carried by a parameter.
#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[ts(export, export_to = "bindings/schema.ts")]
pub struct GroupRef {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
}

/// Node-level state of one visual group.
#[derive(TS, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[ts(export, export_to = "bindings/schema.ts")]
pub struct GroupState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<bool>,
}

impl GroupState {
    /// Overlay the set fields of `patch` onto self.
    pub fn merge(&mut self, patch: &GroupState) -> bool {
        let mut changed = false;
        if patch.disabled.is_some() && patch.disabled != self.disabled {
            self.disabled = patch.disabled;
            changed = true;
        }
        if patch.hidden.is_some() && patch.hidden != self.hidden {
            self.hidden = patch.hidden;
            changed = true;
        }
        if patch.open.is_some() && patch.open != self.open {
            self.open = patch.open;
            changed = true;
        }
        changed
    }
}

/// Schema and current state of one node parameter.
///
/// `display` stays an open string: server modules introduce widget kinds the
/// client has never seen, and they must survive a round trip. The core only
/// dispatches on `output` (export exclusion).
#[derive(TS, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[ts(export, export_to = "bindings/schema.ts")]
pub struct ParamSpec {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_tags: Option<TypeTags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "unknown")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "unknown")]
    pub default: Option<Value>,
    /// Marks the handle as array-expandable: every connection materializes a
    /// fresh indexed sibling parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spawn: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "unknown")]
    pub options: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "Record<string, string>")]
    pub style: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_validation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(rename = "onChange", default, skip_serializing_if = "Option::is_none")]
    pub on_change: Option<OnChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl ParamSpec {
    pub fn is_output(&self) -> bool {
        self.display.as_deref() == Some("output")
    }

    pub fn is_spawn(&self) -> bool {
        self.spawn == Some(true)
    }

    pub fn type_vec(&self) -> Vec<String> {
        self.type_tags
            .as_ref()
            .map(|tags| tags.as_vec())
            .unwrap_or_default()
    }
}

/// Payload of one graph node: the action it stands for plus its parameters
/// and the executor's last reported stats.
#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[ts(export, export_to = "bindings/schema.ts")]
pub struct NodeData {
    pub module: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub execution_type: ExecutionType,
    #[serde(default)]
    #[ts(type = "Record<string, ParamSpec>")]
    pub params: IndexMap<String, ParamSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<HashMap<String, GroupState>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "Record<string, string>")]
    pub style: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resizable: Option<bool>,
}

#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[ts(export, export_to = "bindings/schema.ts")]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    pub position: Position,
    pub data: NodeData,
}

#[derive(TS, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[ts(export, export_to = "bindings/schema.ts")]
pub struct EdgeStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
}

#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/schema.ts")]
#[ts(rename_all = "camelCase")]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<EdgeStyle>,
}

/// A connect gesture from the host UI. `stroke` is the rendered color of the
/// target handle; purely a display concern.
#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/schema.ts")]
#[ts(rename_all = "camelCase")]
pub struct Connection {
    pub source: String,
    #[serde(default)]
    pub source_handle: Option<String>,
    pub target: String,
    #[serde(default)]
    pub target_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
}

/// Batch node diff from the host UI.
#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
#[ts(export, export_to = "bindings/schema.ts")]
pub enum NodeChange {
    Add { item: GraphNode },
    Position { id: String, position: Position },
    Remove { id: String },
}

/// Batch edge diff from the host UI.
#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
#[ts(export, export_to = "bindings/schema.ts")]
pub enum EdgeChange {
    Add { item: GraphEdge },
    Remove { id: String },
}

/// Unit of durable persistence and of drag-and-drop import/export. A missing
/// `type` on import defaults to the workflow mode.
#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[ts(export, export_to = "bindings/schema.ts")]
pub struct StoredWorkflow {
    #[serde(rename = "type", default)]
    pub mode: Mode,
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
}

/// One entry of the executor's node-type registry (`GET /nodes`), keyed by
/// `"<module>-<action>"`.
#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[ts(export, export_to = "bindings/schema.ts")]
pub struct NodeTypeDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub module: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub execution_type: ExecutionType,
    #[serde(default)]
    #[ts(type = "Record<string, ParamSpec>")]
    pub params: IndexMap<String, ParamSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<HashMap<String, GroupState>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "Record<string, string>")]
    pub style: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resizable: Option<bool>,
}

impl NodeTypeDef {
    pub fn into_node_data(self) -> NodeData {
        NodeData {
            module: self.module,
            action: self.action,
            category: self.category,
            label: self.label,
            description: None,
            execution_type: self.execution_type,
            params: self.params,
            cache: None,
            time: None,
            memory: None,
            groups: self.groups,
            style: self.style,
            resizable: self.resizable,
        }
    }
}

/// Per-parameter projection inside an execution request: either the edge
/// feeding it or the locally set value.
#[derive(TS, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/schema.ts")]
#[ts(rename_all = "camelCase")]
pub struct ApiParam {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "unknown")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_tags: Option<TypeTags>,
}

#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[ts(export, export_to = "bindings/schema.ts")]
pub struct ApiNode {
    pub module: String,
    pub action: String,
    #[ts(type = "Record<string, ApiParam>")]
    pub params: IndexMap<String, ApiParam>,
}

/// Execution request for the whole graph or a sub-graph: every node's
/// projection plus the dependency paths that should actually run.
#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[ts(export, export_to = "bindings/schema.ts")]
pub struct GraphExport {
    pub sid: String,
    #[serde(rename = "type")]
    pub mode: Mode,
    pub nodes: HashMap<String, ApiNode>,
    pub paths: Vec<Vec<String>>,
}

#[derive(TS, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/schema.ts")]
pub enum ProgressKind {
    Determinate,
    Indeterminate,
    Disabled,
}

/// Client-side progress state of one node.
#[derive(TS, Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[ts(export, export_to = "bindings/schema.ts")]
pub struct NodeProgress {
    pub value: f64,
    #[serde(rename = "type")]
    pub kind: ProgressKind,
}

impl NodeProgress {
    /// Map a wire progress value onto display state: -1 indeterminate,
    /// -2 disabled, anything else a clamped-at-zero percentage.
    pub fn from_wire(progress: f64) -> Self {
        let kind = if progress == -1.0 {
            ProgressKind::Indeterminate
        } else if progress == -2.0 {
            ProgressKind::Disabled
        } else {
            ProgressKind::Determinate
        };
        Self {
            value: if progress < 0.0 { 0.0 } else { progress },
            kind,
        }
    }
}
