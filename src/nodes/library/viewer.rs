//! Sink that records what reaches it

use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

use crate::error::Result;
use crate::nodes::context::NodeContext;
use crate::nodes::node::{Node, NodeProcessor};
use crate::nodes::socket::Socket;
use crate::nodes::value::{DataKind, SocketValue};

/// Read side of a viewer's history
#[derive(Debug, Clone, Default)]
pub struct ViewerHandle(Rc<RefCell<Vec<SocketValue>>>);

impl ViewerHandle {
    /// Every value received, oldest first
    pub fn history(&self) -> Vec<SocketValue> {
        self.0.borrow().clone()
    }

    pub fn last(&self) -> Option<SocketValue> {
        self.0.borrow().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

/// Keeps a copy of every value on its `Data` input
#[derive(Debug, Clone, Default)]
pub struct ViewerNode {
    history: ViewerHandle,
}

impl ViewerNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for reading the history after the node is added to a graph
    pub fn handle(&self) -> ViewerHandle {
        self.history.clone()
    }
}

impl NodeProcessor for ViewerNode {
    fn type_id(&self) -> &'static str {
        "viz.viewer"
    }

    fn init(&mut self, node: &mut Node) {
        node.add_input(Socket::input("Data", DataKind::any()));
    }

    fn process(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
        if !ctx.is_input_linked("Data") {
            return Ok(());
        }
        let value = ctx.get("Data")?;
        debug!("Viewer '{}' received {:?}", ctx.name(), value);
        self.history.0.borrow_mut().push(value);
        Ok(())
    }

    fn is_sink(&self) -> bool {
        true
    }

    fn clone_box(&self) -> Box<dyn NodeProcessor> {
        // copies get their own history
        Box::new(Self::new())
    }
}
