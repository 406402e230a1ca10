//! Demo: an iteration group doubling a seed value, run once and reported as JSON

use log::{error, info};

use nodeflow::config::EngineConfig;
use nodeflow::constants::group::COUNT_PROPERTY;
use nodeflow::nodes::group::{GroupInputsNode, GroupNode, GroupOutputsNode};
use nodeflow::nodes::library::math::B_PROPERTY;
use nodeflow::nodes::library::{IntegerNode, ScalarMathNode, ViewerNode};
use nodeflow::nodes::{Graph, Node, NodeGraphEngine, SocketValue};
use nodeflow::{logging, Result};

fn build(graph: &mut Graph, config: &EngineConfig, viewer: ViewerNode) -> Result<()> {
    graph.add_node(Node::new("Seed", IntegerNode::new(1)))?;

    graph.add_node(Node::new("Group Inputs", GroupInputsNode::from_config(config)))?;
    graph.add_node(Node::new("Double", ScalarMathNode::multiply()))?;
    graph.add_node(Node::new("Group Outputs", GroupOutputsNode::from_config(config)))?;
    graph.set_property("Double", B_PROPERTY, SocketValue::scalar(2.0))?;
    graph.add_link("Group Inputs", "Data1", "Double", "A")?;
    graph.add_link("Double", "Result", "Group Outputs", "Data1")?;

    graph.add_node(Node::new(
        "Repeat",
        GroupNode::iteration_from_config("Group Inputs", config),
    ))?;
    graph.set_property("Repeat", COUNT_PROPERTY, SocketValue::scalar(4.0))?;
    graph.link_group("Repeat")?;

    graph.add_node(Node::new("Viewer", viewer))?;
    graph.add_link("Seed", "Integer", "Repeat", "Data1")?;
    graph.add_link("Repeat", "Data1", "Viewer", "Data")?;
    Ok(())
}

fn run() -> Result<()> {
    let config = EngineConfig::load_or_default().unwrap_or_else(|err| {
        eprintln!("{}, using defaults", err);
        EngineConfig::default()
    });
    logging::init(&config);

    let viewer = ViewerNode::new();
    let seen = viewer.handle();
    let mut graph = Graph::new();
    build(&mut graph, &config, viewer)?;

    let mut engine = NodeGraphEngine::new(config);
    let report = engine.update_all(&mut graph)?;
    info!("Viewer received {:?}", seen.last());

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(err) => error!("Failed to serialize report: {}", err),
    }
    let stats = engine.get_stats(&graph);
    info!(
        "{} nodes: {} active, {} inactive, {} failed",
        stats.total_nodes, stats.active_nodes, stats.inactive_nodes, stats.failed_nodes
    );
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        error!("{}", err);
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}
