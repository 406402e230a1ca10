//! Groups and iteration: linking, feedback between passes, failure handling

use nodeflow::config::EngineConfig;
use nodeflow::constants::group::COUNT_PROPERTY;
use nodeflow::nodes::group::{GroupInputsNode, GroupNode, GroupOutputsNode};
use nodeflow::nodes::library::math::B_PROPERTY;
use nodeflow::nodes::library::{IntegerNode, MathOp, ScalarMathNode, ViewerHandle, ViewerNode};
use nodeflow::nodes::{
    execute, execute_with_cancel, make_update_list, CancelToken, DataKind, Graph, Node,
    NodeContext, NodeGraphEngine, NodeProcessor, NodeState, Socket, SocketValue,
};
use nodeflow::EngineError;

/// Seed -> [In -> Step(+1) -> Out] -> Viewer, with the group node built by `group`
fn grouped(seed: i64, group: GroupNode) -> (Graph, ViewerHandle) {
    let viewer = ViewerNode::new();
    let handle = viewer.handle();
    let mut graph = Graph::new();

    graph.add_node(Node::new("Seed", IntegerNode::new(seed))).unwrap();
    graph.add_node(Node::new("In", GroupInputsNode::new())).unwrap();
    graph.add_node(Node::new("Step", ScalarMathNode::add())).unwrap();
    graph.add_node(Node::new("Out", GroupOutputsNode::new())).unwrap();
    graph.set_property("Step", B_PROPERTY, SocketValue::scalar(1.0)).unwrap();
    graph.add_link("In", "Data1", "Step", "A").unwrap();
    graph.add_link("Step", "Result", "Out", "Data1").unwrap();

    graph.add_node(Node::new("Group", group)).unwrap();
    graph.link_group("Group").unwrap();
    graph.add_node(Node::new("Viewer", viewer)).unwrap();
    graph.add_link("Seed", "Integer", "Group", "Data1").unwrap();
    graph.add_link("Group", "Data1", "Viewer", "Data").unwrap();
    (graph, handle)
}

fn group_output(graph: &Graph) -> Option<f64> {
    graph
        .output_value(graph.id_of("Group")?, "Data1")
        .and_then(|v| v.first_scalar())
}

#[test]
fn outer_list_runs_the_group_not_its_interior() {
    let (graph, _) = grouped(0, GroupNode::iteration("In", 3));
    assert_eq!(
        make_update_list(&["Seed"], &graph).unwrap(),
        ["Seed", "Group", "Viewer"]
    );
    // editing an interior node re-runs the group
    assert_eq!(
        make_update_list(&["Step"], &graph).unwrap(),
        ["Group", "Viewer"]
    );
    assert_eq!(graph.node("Group").unwrap().state, NodeState::Active);
}

#[test]
fn iteration_feeds_outputs_back_into_inputs() {
    let (mut graph, seen) = grouped(0, GroupNode::iteration("In", 3));
    let report = NodeGraphEngine::default().update_all(&mut graph).unwrap();

    assert!(report.is_clean());
    assert_eq!(group_output(&graph), Some(3.0));
    assert_eq!(seen.last(), Some(SocketValue::scalar(3.0)));
    // the interior ran once per pass
    let steps = report.executed.iter().filter(|n| *n == "Step").count();
    assert_eq!(steps, 3);
}

#[test]
fn single_iteration_matches_a_plain_group() {
    let (mut single, _) = grouped(5, GroupNode::new("In"));
    let (mut once, _) = grouped(5, GroupNode::iteration("In", 1));
    NodeGraphEngine::default().update_all(&mut single).unwrap();
    NodeGraphEngine::default().update_all(&mut once).unwrap();

    assert_eq!(group_output(&single), Some(6.0));
    assert_eq!(group_output(&single), group_output(&once));
}

#[test]
fn count_property_changes_the_loop() {
    let (mut graph, _) = grouped(0, GroupNode::iteration("In", 3));
    let mut engine = NodeGraphEngine::default();
    engine.update_all(&mut graph).unwrap();

    graph
        .set_property("Group", COUNT_PROPERTY, SocketValue::scalar(7.0))
        .unwrap();
    let report = engine.on_property_changed("Group", &mut graph).unwrap().unwrap();
    assert_eq!(report.executed.first().map(String::as_str), Some("Step"));
    assert_eq!(group_output(&graph), Some(7.0));
}

#[test]
fn count_is_clamped_by_config() {
    let config = EngineConfig {
        max_iterations: 2,
        ..EngineConfig::default()
    };
    let (mut graph, _) = grouped(0, GroupNode::iteration_from_config("In", &config));
    graph
        .set_property("Group", COUNT_PROPERTY, SocketValue::scalar(50.0))
        .unwrap();
    NodeGraphEngine::new(config).update_all(&mut graph).unwrap();
    assert_eq!(group_output(&graph), Some(2.0));
}

#[test]
fn processing_an_unlinked_group_is_a_missing_dependency() {
    let mut graph = Graph::new();
    graph.add_node(Node::new("Group", GroupNode::iteration("In", 2))).unwrap();
    assert_eq!(graph.node("Group").unwrap().state, NodeState::NotReady);

    let err = execute(&["Group".to_string()], &mut graph).unwrap_err();
    assert!(matches!(err, EngineError::MissingDependency { .. }));
}

#[test]
fn unlinked_group_cannot_run_after_unlink() {
    let (mut graph, seen) = grouped(0, GroupNode::iteration("In", 2));
    graph.unlink_group("Group").unwrap();

    let err = execute(&["Group".to_string()], &mut graph).unwrap_err();
    assert!(matches!(err, EngineError::MissingDependency { .. }));
    assert!(seen.is_empty());
    // the interior is ordinary graph again
    assert_eq!(make_update_list(&["In"], &graph).unwrap(), ["In", "Step", "Out"]);
}

#[test]
fn missing_outputs_boundary() {
    let mut graph = Graph::new();
    graph.add_node(Node::new("In", GroupInputsNode::new())).unwrap();
    graph.add_node(Node::new("Step", ScalarMathNode::add())).unwrap();
    graph.add_link("In", "Data1", "Step", "A").unwrap();
    graph.add_node(Node::new("Group", GroupNode::new("In"))).unwrap();

    assert_eq!(
        graph.link_group("Group"),
        Err(EngineError::BoundaryNotFound { inputs: "In".into() })
    );
    assert_eq!(graph.node("Group").unwrap().state, NodeState::Inactive);
}

#[test]
fn interior_failure_is_contained() {
    let viewer = ViewerNode::new();
    let seen = viewer.handle();
    let mut graph = Graph::new();
    graph.add_node(Node::new("Seed", IntegerNode::new(8))).unwrap();
    graph.add_node(Node::new("In", GroupInputsNode::new())).unwrap();
    graph
        .add_node(Node::new("Halve", ScalarMathNode::new(MathOp::Divide)))
        .unwrap();
    graph.add_node(Node::new("Out", GroupOutputsNode::new())).unwrap();
    graph.set_property("Halve", B_PROPERTY, SocketValue::scalar(2.0)).unwrap();
    graph.add_link("In", "Data1", "Halve", "A").unwrap();
    graph.add_link("Halve", "Result", "Out", "Data1").unwrap();
    graph.add_node(Node::new("Group", GroupNode::iteration("In", 2))).unwrap();
    graph.link_group("Group").unwrap();
    graph.add_node(Node::new("Viewer", viewer)).unwrap();
    graph.add_link("Seed", "Integer", "Group", "Data1").unwrap();
    graph.add_link("Group", "Data1", "Viewer", "Data").unwrap();

    let mut engine = NodeGraphEngine::default();
    engine.update_all(&mut graph).unwrap();
    assert_eq!(group_output(&graph), Some(2.0));

    graph.set_property("Halve", B_PROPERTY, SocketValue::scalar(0.0)).unwrap();
    let report = engine.on_property_changed("Halve", &mut graph).unwrap().unwrap();

    assert!(report.failure("Halve").is_some());
    // the second pass skips the failed node
    assert_eq!(report.skipped, ["Halve"]);
    assert_eq!(graph.node("Halve").unwrap().state, NodeState::Failed);
    // the group itself succeeded on the stale interior output
    assert!(report.executed.contains(&"Group".to_string()));
    assert_eq!(seen.len(), 2);
}

#[test]
fn groups_nest() {
    let viewer = ViewerNode::new();
    let seen = viewer.handle();
    let mut graph = Graph::new();
    graph.add_node(Node::new("Seed", IntegerNode::new(0))).unwrap();

    // inner: +1, twice per call
    graph.add_node(Node::new("Inner In", GroupInputsNode::new())).unwrap();
    graph.add_node(Node::new("Inc", ScalarMathNode::add())).unwrap();
    graph.add_node(Node::new("Inner Out", GroupOutputsNode::new())).unwrap();
    graph.set_property("Inc", B_PROPERTY, SocketValue::scalar(1.0)).unwrap();
    graph.add_link("Inner In", "Data1", "Inc", "A").unwrap();
    graph.add_link("Inc", "Result", "Inner Out", "Data1").unwrap();
    graph
        .add_node(Node::new("Inner", GroupNode::iteration("Inner In", 2)))
        .unwrap();
    graph.link_group("Inner").unwrap();

    // outer: three calls of the inner group
    graph.add_node(Node::new("Outer In", GroupInputsNode::new())).unwrap();
    graph.add_node(Node::new("Outer Out", GroupOutputsNode::new())).unwrap();
    graph.add_link("Outer In", "Data1", "Inner", "Data1").unwrap();
    graph.add_link("Inner", "Data1", "Outer Out", "Data1").unwrap();
    graph
        .add_node(Node::new("Outer", GroupNode::iteration("Outer In", 3)))
        .unwrap();
    graph.link_group("Outer").unwrap();

    graph.add_node(Node::new("Viewer", viewer)).unwrap();
    graph.add_link("Seed", "Integer", "Outer", "Data1").unwrap();
    graph.add_link("Outer", "Data1", "Viewer", "Data").unwrap();

    assert_eq!(
        make_update_list(&["Seed"], &graph).unwrap(),
        ["Seed", "Outer", "Viewer"]
    );
    NodeGraphEngine::default().update_all(&mut graph).unwrap();
    assert_eq!(seen.last(), Some(SocketValue::scalar(6.0)));
}

#[test]
fn consumers_outside_the_outputs_path_stay_outer() {
    let (mut graph, _) = grouped(0, GroupNode::iteration("In", 3));
    let total = ViewerNode::new();
    let seen = total.handle();
    graph.add_node(Node::new("Sum", ScalarMathNode::add())).unwrap();
    graph.add_node(Node::new("Total", total)).unwrap();
    graph.add_link("Group", "Data1", "Sum", "A").unwrap();
    graph.add_link("Step", "Result", "Sum", "B").unwrap();
    graph.add_link("Sum", "Result", "Total", "Data").unwrap();

    let group = graph.id_of("Group").unwrap();
    let step = graph.id_of("Step").unwrap();
    assert_eq!(graph.cache().peek(group).unwrap().update_list, vec![step]);
    assert_eq!(
        make_update_list(&["Seed"], &graph).unwrap(),
        ["Seed", "Group", "Viewer", "Sum", "Total"]
    );

    let report = NodeGraphEngine::default().update_all(&mut graph).unwrap();
    assert!(report.is_clean());
    // group result 3 plus the interior's last value 3
    assert_eq!(seen.last(), Some(SocketValue::scalar(6.0)));
}

#[test]
fn interior_cycle_fails_the_link() {
    let mut graph = Graph::new();
    graph.add_node(Node::new("In", GroupInputsNode::new())).unwrap();
    graph.add_node(Node::new("M", ScalarMathNode::add())).unwrap();
    graph.add_node(Node::new("N", ScalarMathNode::add())).unwrap();
    graph.add_node(Node::new("Out", GroupOutputsNode::new())).unwrap();
    graph.add_link("In", "Data1", "M", "A").unwrap();
    graph.add_link("M", "Result", "N", "A").unwrap();
    graph.add_link("N", "Result", "M", "B").unwrap();
    graph.add_link("M", "Result", "Out", "Data1").unwrap();
    graph.add_node(Node::new("G", GroupNode::iteration("In", 2))).unwrap();

    match graph.link_group("G") {
        Err(EngineError::CycleDetected { nodes }) => assert_eq!(nodes, ["M", "N"]),
        other => panic!("expected a cycle, got {:?}", other),
    }
    let id = graph.id_of("G").unwrap();
    assert!(!graph.cache().contains(id));
    assert!(matches!(
        execute(&["G".to_string()], &mut graph),
        Err(EngineError::MissingDependency { .. })
    ));
}

#[test]
fn boundary_already_captured_names_the_owner() {
    let (mut graph, seen) = grouped(0, GroupNode::iteration("In", 3));
    graph.add_node(Node::new("Second", GroupNode::new("In"))).unwrap();

    match graph.link_group("Second") {
        Err(EngineError::InvalidGroup { node, reason }) => {
            assert_eq!(node, "Second");
            assert!(reason.contains("already captured by 'Group'"), "{}", reason);
        }
        other => panic!("expected an invalid group, got {:?}", other),
    }
    // the first group is untouched
    let list = make_update_list(&["Seed"], &graph).unwrap();
    assert_eq!(list, ["Seed", "Group", "Viewer"]);
    execute(&list, &mut graph).unwrap();
    assert_eq!(seen.last(), Some(SocketValue::scalar(3.0)));
}

/// Forwards its input and cancels the run it is part of
#[derive(Clone)]
struct CancelDuringRun(CancelToken);

impl NodeProcessor for CancelDuringRun {
    fn type_id(&self) -> &'static str {
        "test.cancel_during_run"
    }

    fn init(&mut self, node: &mut Node) {
        node.add_input(Socket::input("A", DataKind::scalar_list()));
        node.add_output(Socket::output("Result", DataKind::scalar_list()));
    }

    fn process(&mut self, ctx: &mut NodeContext<'_>) -> nodeflow::Result<()> {
        let value = ctx.get("A")?;
        ctx.set("Result", value)?;
        self.0.cancel();
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn NodeProcessor> {
        Box::new(self.clone())
    }
}

#[test]
fn cancelled_group_is_not_reported_as_executed() {
    let cancel = CancelToken::new();
    let viewer = ViewerNode::new();
    let seen = viewer.handle();
    let mut graph = Graph::new();
    graph.add_node(Node::new("Seed", IntegerNode::new(0))).unwrap();
    graph.add_node(Node::new("In", GroupInputsNode::new())).unwrap();
    graph
        .add_node(Node::new("Stop", CancelDuringRun(cancel.clone())))
        .unwrap();
    graph.add_node(Node::new("Out", GroupOutputsNode::new())).unwrap();
    graph.add_link("In", "Data1", "Stop", "A").unwrap();
    graph.add_link("Stop", "Result", "Out", "Data1").unwrap();
    graph
        .add_node(Node::new("Group", GroupNode::iteration("In", 3)))
        .unwrap();
    graph.link_group("Group").unwrap();
    graph.add_node(Node::new("Viewer", viewer)).unwrap();
    graph.add_link("Seed", "Integer", "Group", "Data1").unwrap();
    graph.add_link("Group", "Data1", "Viewer", "Data").unwrap();

    let list = make_update_list(&["Seed"], &graph).unwrap();
    let report = execute_with_cancel(&list, &mut graph, &cancel).unwrap();
    assert!(report.cancelled);
    assert_eq!(report.executed, ["Seed", "Stop"]);
    assert_eq!(group_output(&graph), None);
    assert_eq!(seen.last(), None);
}
