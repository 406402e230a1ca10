//! Node graph execution engine
//!
//! This module provides:
//! - The executor, which runs an update list in order and contains evaluation
//!   errors to the node that raised them
//! - Run reports and cancellation
//! - [`NodeGraphEngine`], which turns edit notifications into update lists and
//!   runs them immediately or on demand

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use super::context::NodeContext;
use super::dependency;
use super::graph::Graph;
use super::node::{NodeId, NodeState};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

/// Execution mode for the graph engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineExecutionMode {
    /// Execute immediately when parameters or connections change
    #[default]
    Auto,
    /// Only execute when manually triggered
    Manual,
}

/// Flag a caller can raise to abandon a run between two `process` calls
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// An evaluation error recorded against a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeFailure {
    pub node: String,
    pub message: String,
}

/// Outcome of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub started_at: DateTime<Utc>,
    /// Nodes whose `process` returned successfully, in call order
    pub executed: Vec<String>,
    /// Nodes passed over because they already failed in this run
    pub skipped: Vec<String>,
    pub failures: Vec<NodeFailure>,
    /// The run was abandoned before its list was exhausted
    pub cancelled: bool,
}

impl ExecutionReport {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            executed: Vec::new(),
            skipped: Vec::new(),
            failures: Vec::new(),
            cancelled: false,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    /// The failure recorded for a node, if any
    pub fn failure(&self, node: &str) -> Option<&NodeFailure> {
        self.failures.iter().find(|f| f.node == node)
    }
}

/// Book-keeping for a run in progress, shared by nested passes
#[derive(Debug)]
pub struct RunLog {
    failed: HashSet<NodeId>,
    report: ExecutionReport,
    cancel: Option<CancelToken>,
}

impl RunLog {
    fn new(cancel: Option<CancelToken>) -> Self {
        Self {
            failed: HashSet::new(),
            report: ExecutionReport::new(),
            cancel,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.report.cancelled || self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    fn into_report(self) -> ExecutionReport {
        self.report
    }
}

/// Execute an update list given by node name
pub fn execute(update_list: &[String], graph: &mut Graph) -> Result<ExecutionReport> {
    let ids = ids_for(update_list, graph)?;
    execute_ids(&ids, graph)
}

/// Execute an update list given by node id
pub fn execute_ids(update_list: &[NodeId], graph: &mut Graph) -> Result<ExecutionReport> {
    let mut run = RunLog::new(None);
    execute_pass(graph, update_list, &mut run)?;
    Ok(run.into_report())
}

/// Execute an update list, checking `cancel` before each node
pub fn execute_with_cancel(
    update_list: &[String],
    graph: &mut Graph,
    cancel: &CancelToken,
) -> Result<ExecutionReport> {
    let ids = ids_for(update_list, graph)?;
    let mut run = RunLog::new(Some(cancel.clone()));
    execute_pass(graph, &ids, &mut run)?;
    Ok(run.into_report())
}

fn ids_for(update_list: &[String], graph: &Graph) -> Result<Vec<NodeId>> {
    update_list
        .iter()
        .map(|name| {
            graph
                .id_of(name)
                .ok_or_else(|| EngineError::NodeNotFound(name.clone()))
        })
        .collect()
}

/// Run every node of `update_list` once, in order, within an existing run
pub(crate) fn execute_pass(graph: &mut Graph, update_list: &[NodeId], run: &mut RunLog) -> Result<()> {
    for &id in update_list {
        if run.is_cancelled() {
            if !run.report.cancelled {
                info!("Run cancelled");
            }
            run.report.cancelled = true;
            return Ok(());
        }
        execute_single_node(graph, id, run)?;
    }
    Ok(())
}

fn execute_single_node(graph: &mut Graph, id: NodeId, run: &mut RunLog) -> Result<()> {
    let name = graph
        .name_of(id)
        .ok_or_else(|| EngineError::NodeNotFound(id.to_string()))?
        .to_string();

    if run.failed.contains(&id) {
        debug!("Skipping '{}', it failed earlier in this run", name);
        run.report.skipped.push(name);
        return Ok(());
    }

    let mut processor = graph
        .node_by_id_mut(id)
        .and_then(|n| n.take_processor())
        .ok_or_else(|| EngineError::InvalidGroup {
            node: name.clone(),
            reason: "node was re-entered while processing".to_string(),
        })?;

    let (result, pending, interrupted) = {
        let mut ctx = NodeContext::new(graph, id, run);
        let result = processor.process(&mut ctx);
        let (pending, interrupted) = ctx.into_parts();
        (result, pending, interrupted)
    };
    if let Some(node) = graph.node_by_id_mut(id) {
        node.restore_processor(processor);
    }

    match result {
        Ok(()) if interrupted => {
            debug!("'{}' was interrupted, outputs left unchanged", name);
            run.report.cancelled = true;
            Ok(())
        }
        Ok(()) => {
            for (socket, value) in pending {
                graph.write_output(id, &socket, value)?;
            }
            if graph.node_by_id(id).map(|n| n.state) == Some(NodeState::Failed) {
                let state = graph.structural_state(id);
                if let Some(node) = graph.node_by_id_mut(id) {
                    node.state = state;
                }
            }
            debug!("Processed '{}'", name);
            run.report.executed.push(name);
            Ok(())
        }
        Err(EngineError::Evaluation(err)) => {
            warn!("Node '{}' failed: {}", name, err);
            if let Some(node) = graph.node_by_id_mut(id) {
                node.state = NodeState::Failed;
            }
            run.failed.insert(id);
            run.report.failures.push(NodeFailure {
                node: name,
                message: err.message,
            });
            Ok(())
        }
        Err(err) => {
            error!("Run aborted at '{}': {}", name, err);
            Err(err)
        }
    }
}

/// Statistics about the engine and the graph it drives
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub total_nodes: usize,
    pub not_ready_nodes: usize,
    pub inactive_nodes: usize,
    pub active_nodes: usize,
    pub failed_nodes: usize,
    pub pending_triggers: usize,
    pub cached_subgraphs: usize,
    pub runs: usize,
}

/// Execution engine for node graphs.
///
/// In [`EngineExecutionMode::Auto`] every trigger is resolved and executed as
/// soon as it arrives. In [`EngineExecutionMode::Manual`] triggers accumulate
/// until [`cook`](Self::cook) is called.
#[derive(Debug)]
pub struct NodeGraphEngine {
    config: EngineConfig,
    execution_mode: EngineExecutionMode,
    pending_triggers: Vec<NodeId>,
    last_report: Option<ExecutionReport>,
    runs: usize,
}

impl NodeGraphEngine {
    /// Create a new execution engine
    pub fn new(config: EngineConfig) -> Self {
        Self {
            execution_mode: config.execution_mode,
            config,
            pending_triggers: Vec::new(),
            last_report: None,
            runs: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Set the execution mode
    pub fn set_execution_mode(&mut self, mode: EngineExecutionMode) {
        self.execution_mode = mode;
    }

    /// Get the current execution mode
    pub fn get_execution_mode(&self) -> EngineExecutionMode {
        self.execution_mode
    }

    /// Queue trigger nodes; in auto mode run them straight away
    pub fn trigger(&mut self, nodes: &[&str], graph: &mut Graph) -> Result<Option<ExecutionReport>> {
        for name in nodes {
            let id = graph
                .id_of(name)
                .ok_or_else(|| EngineError::NodeNotFound(name.to_string()))?;
            if !self.pending_triggers.contains(&id) {
                self.pending_triggers.push(id);
            }
        }
        match self.execution_mode {
            EngineExecutionMode::Auto => self.cook(graph).map(Some),
            EngineExecutionMode::Manual => {
                debug!("Manual mode, {} trigger(s) waiting", self.pending_triggers.len());
                Ok(None)
            }
        }
    }

    /// A node's property changed
    pub fn on_property_changed(&mut self, node: &str, graph: &mut Graph) -> Result<Option<ExecutionReport>> {
        self.trigger(&[node], graph)
    }

    /// Links into the given nodes were added or removed
    pub fn on_links_changed(&mut self, nodes: &[&str], graph: &mut Graph) -> Result<Option<ExecutionReport>> {
        let present: Vec<&str> = nodes.iter().copied().filter(|n| graph.contains(n)).collect();
        self.trigger(&present, graph)
    }

    /// The current frame changed; animated nodes are re-run
    pub fn on_frame_changed(&mut self, graph: &mut Graph) -> Result<Option<ExecutionReport>> {
        let animated: Vec<String> = graph
            .nodes()
            .filter(|n| n.animated)
            .map(|n| n.name.clone())
            .collect();
        if animated.is_empty() {
            return Ok(None);
        }
        let names: Vec<&str> = animated.iter().map(String::as_str).collect();
        self.trigger(&names, graph)
    }

    /// Re-evaluate the whole graph regardless of mode
    pub fn update_all(&mut self, graph: &mut Graph) -> Result<ExecutionReport> {
        self.pending_triggers.clear();
        let list = dependency::full_update_list(graph)?;
        self.run(&list, graph)
    }

    /// Run everything queued since the last run
    pub fn cook(&mut self, graph: &mut Graph) -> Result<ExecutionReport> {
        let triggers: Vec<NodeId> = std::mem::take(&mut self.pending_triggers)
            .into_iter()
            .filter(|id| graph.node_by_id(*id).is_some())
            .collect();
        let list = dependency::resolve(graph, &triggers)?;
        self.run(&list, graph)
    }

    fn run(&mut self, list: &[NodeId], graph: &mut Graph) -> Result<ExecutionReport> {
        debug!("Executing {} node(s)", list.len());
        let report = execute_ids(list, graph)?;
        self.runs += 1;
        if !report.failures.is_empty() {
            info!("Run finished with {} failure(s)", report.failures.len());
        }
        self.last_report = Some(report.clone());
        Ok(report)
    }

    pub fn pending_triggers(&self) -> usize {
        self.pending_triggers.len()
    }

    pub fn last_report(&self) -> Option<&ExecutionReport> {
        self.last_report.as_ref()
    }

    /// Get execution statistics
    pub fn get_stats(&self, graph: &Graph) -> ExecutionStats {
        let mut stats = ExecutionStats {
            total_nodes: graph.len(),
            pending_triggers: self.pending_triggers.len(),
            cached_subgraphs: graph.cache().len(),
            runs: self.runs,
            ..Default::default()
        };
        for node in graph.nodes() {
            match node.state {
                NodeState::NotReady => stats.not_ready_nodes += 1,
                NodeState::Inactive => stats.inactive_nodes += 1,
                NodeState::Active => stats.active_nodes += 1,
                NodeState::Failed => stats.failed_nodes += 1,
            }
        }
        stats
    }
}

impl Default for NodeGraphEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
