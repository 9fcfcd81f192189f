use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::{json, Value};

use super::{
    adjacency, build_path, is_valid_connection, sinks, spawn_base, spawn_index, GraphStore,
    ParamField, SetOutcome, ValidationPolicy, SPAWN_CAP,
};
use crate::models::schema::{
    Connection, EdgeChange, ExecutionType, GraphNode, GroupState, NodeChange, NodeData, OnChange,
    ParamSpec, Position, TypeTags,
};

fn node(id: &str, params: Vec<(&str, ParamSpec)>) -> GraphNode {
    let mut map = IndexMap::new();
    for (key, spec) in params {
        map.insert(key.to_string(), spec);
    }
    GraphNode {
        id: id.to_string(),
        node_type: Some("custom".to_string()),
        position: Position { x: 0.0, y: 0.0 },
        data: NodeData {
            module: "Test".to_string(),
            action: id.to_string(),
            category: None,
            label: None,
            description: None,
            execution_type: ExecutionType::Workflow,
            params: map,
            cache: None,
            time: None,
            memory: None,
            groups: None,
            style: None,
            resizable: None,
        },
    }
}

fn output(tags: &[&str]) -> ParamSpec {
    ParamSpec {
        display: Some("output".to_string()),
        type_tags: Some(TypeTags::Many(tags.iter().map(|t| t.to_string()).collect())),
        ..Default::default()
    }
}

fn input(tags: &[&str]) -> ParamSpec {
    ParamSpec {
        display: Some("input".to_string()),
        type_tags: Some(TypeTags::Many(tags.iter().map(|t| t.to_string()).collect())),
        ..Default::default()
    }
}

fn spawn_input(tags: &[&str]) -> ParamSpec {
    ParamSpec {
        spawn: Some(true),
        ..input(tags)
    }
}

fn value_param(value: Value) -> ParamSpec {
    ParamSpec {
        value: Some(value),
        ..Default::default()
    }
}

fn connect(store: &mut GraphStore, source: &str, source_handle: &str, target: &str, handle: &str) {
    store.connect(Connection {
        source: source.to_string(),
        source_handle: Some(source_handle.to_string()),
        target: target.to_string(),
        target_handle: Some(handle.to_string()),
        stroke: None,
    });
}

/// A -> B -> C, with C the only sink.
fn chain_store() -> GraphStore {
    let mut store = GraphStore::new();
    store.add_node(node(
        "A",
        vec![("seed", value_param(json!(5))), ("out", output(&["image"]))],
    ));
    store.add_node(node(
        "B",
        vec![("in", input(&["image"])), ("out", output(&["image"]))],
    ));
    store.add_node(node("C", vec![("in", input(&["image"]))]));
    connect(&mut store, "A", "out", "B", "in");
    connect(&mut store, "B", "out", "C", "in");
    store
}

#[test]
fn build_path_puts_every_ancestor_before_the_node() {
    let store = chain_store();
    let graph = adjacency(store.nodes(), store.edges());
    assert_eq!(build_path(&graph, "C", HashSet::new()), vec!["A", "B", "C"]);
    assert_eq!(build_path(&graph, "B", HashSet::new()), vec!["A", "B"]);
    assert_eq!(build_path(&graph, "A", HashSet::new()), vec!["A"]);
}

#[test]
fn build_path_keeps_duplicates_across_diamond_branches() {
    let mut store = GraphStore::new();
    for id in ["A", "B", "C", "D"] {
        store.add_node(node(
            id,
            vec![
                ("a", input(&["image"])),
                ("b", input(&["image"])),
                ("out", output(&["image"])),
            ],
        ));
    }
    connect(&mut store, "A", "out", "B", "a");
    connect(&mut store, "A", "out", "C", "a");
    connect(&mut store, "B", "out", "D", "a");
    connect(&mut store, "C", "out", "D", "b");

    let graph = adjacency(store.nodes(), store.edges());
    // Sibling branches each resolve their own ancestry; the shared ancestor
    // legitimately shows up once per branch.
    assert_eq!(
        build_path(&graph, "D", HashSet::new()),
        vec!["A", "B", "A", "C", "D"]
    );
}

#[test]
fn build_path_terminates_on_cycles() {
    let mut store = GraphStore::new();
    store.add_node(node(
        "A",
        vec![("in", input(&["image"])), ("out", output(&["image"]))],
    ));
    store.add_node(node(
        "B",
        vec![("in", input(&["image"])), ("out", output(&["image"]))],
    ));
    connect(&mut store, "A", "out", "B", "in");
    connect(&mut store, "B", "out", "A", "in");

    let graph = adjacency(store.nodes(), store.edges());
    assert_eq!(build_path(&graph, "B", HashSet::new()), vec!["A", "B"]);
    assert_eq!(build_path(&graph, "A", HashSet::new()), vec!["B", "A"]);
}

#[test]
fn parallel_edges_collapse_to_one_incomer() {
    let mut store = GraphStore::new();
    store.add_node(node(
        "S",
        vec![("one", output(&["image"])), ("two", output(&["image"]))],
    ));
    store.add_node(node(
        "T",
        vec![("a", input(&["image"])), ("b", input(&["image"]))],
    ));
    connect(&mut store, "S", "one", "T", "a");
    connect(&mut store, "S", "two", "T", "b");

    let graph = adjacency(store.nodes(), store.edges());
    assert_eq!(build_path(&graph, "T", HashSet::new()), vec!["S", "T"]);
}

#[test]
fn isolated_nodes_are_sinks() {
    let mut store = GraphStore::new();
    store.add_node(node("lonely", vec![]));
    let graph = adjacency(store.nodes(), store.edges());
    assert_eq!(sinks(&graph, store.nodes()), vec!["lonely"]);
    assert_eq!(build_path(&graph, "lonely", HashSet::new()), vec!["lonely"]);
}

#[test]
fn connect_replaces_the_edge_on_an_occupied_handle() {
    let mut store = GraphStore::new();
    store.add_node(node("S1", vec![("out", output(&["image"]))]));
    store.add_node(node("S2", vec![("out", output(&["image"]))]));
    store.add_node(node("T", vec![("in", input(&["image"]))]));

    connect(&mut store, "S1", "out", "T", "in");
    connect(&mut store, "S2", "out", "T", "in");

    let inbound: Vec<_> = store
        .edges()
        .iter()
        .filter(|e| e.target == "T" && e.target_handle.as_deref() == Some("in"))
        .collect();
    assert_eq!(inbound.len(), 1);
    assert_eq!(inbound[0].source, "S2");
}

#[test]
fn connect_without_target_handle_is_ignored() {
    let mut store = GraphStore::new();
    store.add_node(node("S", vec![("out", output(&["image"]))]));
    store.add_node(node("T", vec![("in", input(&["image"]))]));
    store.connect(Connection {
        source: "S".to_string(),
        source_handle: Some("out".to_string()),
        target: "T".to_string(),
        target_handle: None,
        stroke: None,
    });
    assert!(store.edges().is_empty());
}

#[test]
fn spawn_connections_allocate_adjacent_siblings() {
    let mut store = GraphStore::new();
    for id in ["S1", "S2", "S3"] {
        store.add_node(node(id, vec![("out", output(&["image"]))]));
    }
    store.add_node(node(
        "T",
        vec![
            ("images", spawn_input(&["image"])),
            ("strength", value_param(json!(1.0))),
        ],
    ));

    connect(&mut store, "S1", "out", "T", "images");
    connect(&mut store, "S2", "out", "T", "images[1]");
    connect(&mut store, "S3", "out", "T", "images[2]");

    // Every connection materialized the next sibling right after the
    // connected key; the last one is the empty slot awaiting a connection.
    let keys: Vec<&String> = store.node("T").unwrap().data.params.keys().collect();
    assert_eq!(
        keys,
        vec!["images", "images[1]", "images[2]", "images[3]", "strength"]
    );

    // Each connected sibling holds exactly one inbound edge.
    for handle in ["images", "images[1]", "images[2]"] {
        let count = store
            .edges()
            .iter()
            .filter(|e| e.target_handle.as_deref() == Some(handle))
            .count();
        assert_eq!(count, 1, "handle {handle}");
    }

    // Values are independent per sibling.
    store.set_param_value("T", "images", json!("a"));
    store.set_param_value("T", "images[1]", json!("b"));
    assert_eq!(store.param_value("T", "images"), Some(&json!("a")));
    assert_eq!(store.param_value("T", "images[1]"), Some(&json!("b")));
}

#[test]
fn disconnecting_a_spawned_sibling_removes_only_that_key() {
    let mut store = GraphStore::new();
    for id in ["S1", "S2", "S3"] {
        store.add_node(node(id, vec![("out", output(&["image"]))]));
    }
    store.add_node(node("T", vec![("images", spawn_input(&["image"]))]));

    connect(&mut store, "S1", "out", "T", "images");
    connect(&mut store, "S2", "out", "T", "images[1]");
    connect(&mut store, "S3", "out", "T", "images[2]");

    let edge_id = store
        .edges()
        .iter()
        .find(|e| e.target_handle.as_deref() == Some("images[1]"))
        .unwrap()
        .id
        .clone();
    store.apply_edge_changes(vec![EdgeChange::Remove { id: edge_id }]);

    let keys: Vec<&String> = store.node("T").unwrap().data.params.keys().collect();
    assert_eq!(keys, vec!["images", "images[2]", "images[3]"]);
    assert!(store
        .edges()
        .iter()
        .all(|e| e.target_handle.as_deref() != Some("images[1]")));
}

#[test]
fn spawn_allocation_stops_at_the_cap() {
    let mut store = GraphStore::new();
    store.add_node(node("S", vec![("out", output(&["image"]))]));

    let mut params = vec![("images", spawn_input(&["image"]))];
    let sibling_keys: Vec<String> = (1..=SPAWN_CAP).map(|i| format!("images[{i}]")).collect();
    for key in &sibling_keys {
        params.push((key.as_str(), spawn_input(&["image"])));
    }
    store.add_node(node("T", params));
    let before = store.node("T").unwrap().data.params.len();

    connect(&mut store, "S", "out", "T", "images");

    // Cap reached: no new sibling, no new edge, nothing replaced.
    assert_eq!(store.node("T").unwrap().data.params.len(), before);
    assert!(store.edges().is_empty());
}

#[test]
fn node_removal_cascades_edges_and_spawned_params() {
    let mut store = GraphStore::new();
    store.add_node(node("S", vec![("out", output(&["image"]))]));
    store.add_node(node("T", vec![("images", spawn_input(&["image"]))]));
    connect(&mut store, "S", "out", "T", "images");
    assert_eq!(store.edges().len(), 1);

    // Connecting spawned the next sibling alongside the connected key.
    let keys: Vec<&String> = store.node("T").unwrap().data.params.keys().collect();
    assert_eq!(keys, vec!["images", "images[1]"]);

    let removed = store.apply_node_changes(vec![NodeChange::Remove {
        id: "S".to_string(),
    }]);
    assert_eq!(removed, vec!["S"]);
    assert!(store.edges().is_empty());
    // The disconnect side effect dropped the spawn key that edge was feeding.
    let keys: Vec<&String> = store.node("T").unwrap().data.params.keys().collect();
    assert_eq!(keys, vec!["images[1]"]);
    assert!(store.node("S").is_none());
}

#[test]
fn set_param_value_is_a_noop_for_deep_equal_values() {
    let mut store = GraphStore::new();
    store.add_node(node("A", vec![("cfg", value_param(json!({ "a": [1, 2] })))]));

    assert_eq!(
        store.set_param_value("A", "cfg", json!({ "a": [1, 2] })),
        SetOutcome::Unchanged
    );
    assert_eq!(
        store.set_param_value("A", "cfg", json!({ "a": [1, 2, 3] })),
        SetOutcome::Changed
    );
    assert_eq!(
        store.set_param_value("missing", "cfg", json!(1)),
        SetOutcome::Unchanged
    );
    assert_eq!(
        store.set_param_value("A", "missing", json!(1)),
        SetOutcome::Unchanged
    );
}

#[test]
fn show_action_hides_non_matching_targets() {
    let mut store = GraphStore::new();
    let selector = ParamSpec {
        value: Some(json!("simple")),
        on_change: Some(OnChange::Spec {
            action: "show".to_string(),
            target: Some(json!({
                "simple": "steps",
                "advanced": ["sampler", "extras_group"]
            })),
        }),
        ..Default::default()
    };
    store.add_node(node(
        "A",
        vec![
            ("mode", selector),
            ("steps", value_param(json!(20))),
            ("sampler", value_param(json!("euler"))),
        ],
    ));

    store.set_param_value("A", "mode", json!("advanced"));
    let data = &store.node("A").unwrap().data;
    assert_eq!(data.params["steps"].hidden, Some(true));
    assert_eq!(data.params["sampler"].hidden, Some(false));
    assert_eq!(
        data.groups.as_ref().unwrap()["extras_group"].hidden,
        Some(false)
    );

    store.set_param_value("A", "mode", json!("simple"));
    let data = &store.node("A").unwrap().data;
    assert_eq!(data.params["steps"].hidden, Some(false));
    assert_eq!(data.params["sampler"].hidden, Some(true));
    assert_eq!(
        data.groups.as_ref().unwrap()["extras_group"].hidden,
        Some(true)
    );
}

#[test]
fn disable_action_mirrors_the_toggle_onto_its_targets() {
    let mut store = GraphStore::new();
    let toggle = ParamSpec {
        value: Some(json!(false)),
        on_change: Some(OnChange::Spec {
            action: "disable".to_string(),
            target: Some(json!({ "true": "manual_seed", "false": ["auto_group"] })),
        }),
        ..Default::default()
    };
    store.add_node(node(
        "A",
        vec![("randomize", toggle), ("manual_seed", value_param(json!(0)))],
    ));

    store.set_param_value("A", "randomize", json!(true));
    let data = &store.node("A").unwrap().data;
    assert_eq!(data.params["manual_seed"].disabled, Some(true));
    assert_eq!(
        data.groups.as_ref().unwrap()["auto_group"].disabled,
        Some(false)
    );

    store.set_param_value("A", "randomize", json!(false));
    let data = &store.node("A").unwrap().data;
    assert_eq!(data.params["manual_seed"].disabled, Some(false));
    assert_eq!(
        data.groups.as_ref().unwrap()["auto_group"].disabled,
        Some(true)
    );
}

#[test]
fn add_node_seeds_missing_values_from_defaults() {
    let mut store = GraphStore::new();
    store.add_node(node(
        "A",
        vec![
            (
                "steps",
                ParamSpec {
                    default: Some(json!(20)),
                    ..Default::default()
                },
            ),
            (
                "preset",
                ParamSpec {
                    value: Some(json!("keep")),
                    default: Some(json!("ignored")),
                    ..Default::default()
                },
            ),
        ],
    ));
    assert_eq!(store.param_value("A", "steps"), Some(&json!(20)));
    assert_eq!(store.param_value("A", "preset"), Some(&json!("keep")));
}

#[test]
fn set_param_field_updates_are_idempotent() {
    let mut store = GraphStore::new();
    store.add_node(node("A", vec![("steps", value_param(json!(1)))]));

    assert_eq!(
        store.set_param("A", "steps", ParamField::Hidden, json!(true)),
        SetOutcome::Changed
    );
    assert_eq!(
        store.set_param("A", "steps", ParamField::Hidden, json!(true)),
        SetOutcome::Unchanged
    );

    assert_eq!(
        store.set_param("A", "opts_group", ParamField::Group, json!({ "open": true })),
        SetOutcome::Changed
    );
    assert_eq!(
        store.set_param("A", "opts_group", ParamField::Group, json!({ "open": true })),
        SetOutcome::Unchanged
    );
    let groups = store.node("A").unwrap().data.groups.as_ref().unwrap();
    assert_eq!(
        groups["opts_group"],
        GroupState {
            disabled: None,
            hidden: None,
            open: Some(true)
        }
    );
}

#[test]
fn export_projects_the_chain_with_source_bindings() {
    let store = chain_store();
    let export = store.export_graph("sid-1");

    assert_eq!(export.sid, "sid-1");
    assert_eq!(export.paths, vec![vec!["A", "B", "C"]]);
    assert_eq!(export.nodes.len(), 3);

    // Output handles are never exported.
    let a = &export.nodes["A"];
    assert!(a.params.contains_key("seed"));
    assert!(!a.params.contains_key("out"));
    assert_eq!(a.params["seed"].value, Some(json!(5)));
    assert_eq!(a.params["seed"].source_id, None);

    // Consumed parameters carry their upstream producer.
    let b = &export.nodes["B"];
    assert_eq!(b.params["in"].source_id.as_deref(), Some("A"));
    assert_eq!(b.params["in"].source_key.as_deref(), Some("out"));

    let c = &export.nodes["C"];
    assert_eq!(c.params["in"].source_id.as_deref(), Some("B"));
    assert_eq!(c.params["in"].source_key.as_deref(), Some("out"));
}

#[test]
fn removing_a_node_leaves_no_trace_in_the_export() {
    let mut store = chain_store();
    let removed = store.apply_node_changes(vec![NodeChange::Remove {
        id: "B".to_string(),
    }]);
    assert_eq!(removed, vec!["B"]);
    assert!(store.edges().is_empty());

    let export = store.export_graph("sid-1");
    assert!(!export.nodes.contains_key("B"));
    assert_eq!(export.paths, vec![vec!["A"], vec!["C"]]);
    assert_eq!(export.nodes["C"].params["in"].source_id, None);
}

#[test]
fn sub_graph_keeps_only_paths_through_the_node() {
    let mut store = chain_store();
    // Second, unrelated chain X -> Y.
    store.add_node(node("X", vec![("out", output(&["image"]))]));
    store.add_node(node("Y", vec![("in", input(&["image"]))]));
    connect(&mut store, "X", "out", "Y", "in");

    let export = store.sub_graph("sid-1", "A");
    assert_eq!(export.paths, vec![vec!["A", "B", "C"]]);
    // Full context still ships: every node is projected.
    assert_eq!(export.nodes.len(), 5);
}

#[test]
fn sub_graph_falls_back_to_the_node_itself_when_no_sink_reaches_it() {
    let mut store = GraphStore::new();
    store.add_node(node(
        "A",
        vec![("in", input(&["image"])), ("out", output(&["image"]))],
    ));
    store.add_node(node(
        "B",
        vec![("in", input(&["image"])), ("out", output(&["image"]))],
    ));
    connect(&mut store, "A", "out", "B", "in");
    connect(&mut store, "B", "out", "A", "in");

    // Pure cycle: no sinks at all.
    let export = store.sub_graph("sid-1", "A");
    assert_eq!(export.paths, vec![vec!["B", "A"]]);
}

#[test]
fn spawn_key_arithmetic() {
    assert_eq!(spawn_base("images"), "images");
    assert_eq!(spawn_base("images[3]"), "images");
    assert_eq!(spawn_base("images[30]"), "images");
    assert_eq!(spawn_base("a[b]"), "a[b]");
    assert_eq!(spawn_index("images"), None);
    assert_eq!(spawn_index("images[3]"), Some(3));
    assert_eq!(spawn_index("images[]"), None);
}

#[test]
fn validation_rejects_self_loops_and_missing_handles() {
    let mut store = GraphStore::new();
    store.add_node(node(
        "A",
        vec![("in", input(&["image"])), ("out", output(&["image"]))],
    ));
    store.add_node(node("B", vec![("in", input(&["image"]))]));

    let self_loop = Connection {
        source: "A".to_string(),
        source_handle: Some("out".to_string()),
        target: "A".to_string(),
        target_handle: Some("in".to_string()),
        stroke: None,
    };
    let missing_handle = Connection {
        source: "A".to_string(),
        source_handle: None,
        target: "B".to_string(),
        target_handle: Some("in".to_string()),
        stroke: None,
    };

    for policy in [ValidationPolicy::TypeCheck, ValidationPolicy::AcceptAll] {
        assert!(!is_valid_connection(&store, &self_loop, policy));
        assert!(!is_valid_connection(&store, &missing_handle, policy));
    }
}

#[test]
fn validation_requires_intersecting_type_tags() {
    let mut store = GraphStore::new();
    store.add_node(node(
        "S",
        vec![
            ("image_out", output(&["image"])),
            ("mask_out", output(&["mask"])),
        ],
    ));
    store.add_node(node(
        "T",
        vec![
            ("image_in", input(&["image", "latent"])),
            ("any_in", input(&["any"])),
        ],
    ));

    let conn = |source_handle: &str, target_handle: &str| Connection {
        source: "S".to_string(),
        source_handle: Some(source_handle.to_string()),
        target: "T".to_string(),
        target_handle: Some(target_handle.to_string()),
        stroke: None,
    };

    let strict = ValidationPolicy::TypeCheck;
    assert!(is_valid_connection(&store, &conn("image_out", "image_in"), strict));
    assert!(!is_valid_connection(&store, &conn("mask_out", "image_in"), strict));
    // A target advertising `any` accepts every source.
    assert!(is_valid_connection(&store, &conn("mask_out", "any_in"), strict));
    // The permissive variant accepts the mismatch.
    assert!(is_valid_connection(
        &store,
        &conn("mask_out", "image_in"),
        ValidationPolicy::AcceptAll
    ));
}

#[test]
fn snapshot_roundtrips_through_load() {
    let store = chain_store();
    let snapshot = store.snapshot();

    let mut restored = GraphStore::new();
    restored.load(snapshot.clone());
    assert_eq!(restored.nodes().len(), 3);
    assert_eq!(restored.edges().len(), 2);
    assert_eq!(restored.snapshot(), snapshot);
}
