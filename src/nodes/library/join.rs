//! List join over a growable input sequence

use crate::error::{EvaluationError, Result};
use crate::nodes::context::NodeContext;
use crate::nodes::multi_socket::MultiSocket;
use crate::nodes::node::{Node, NodeProcessor};
use crate::nodes::socket::Socket;
use crate::nodes::value::{DataKind, SocketValue};

/// Concatenates the objects of every linked `Data*` input, in socket order
#[derive(Debug, Clone, Default)]
pub struct ListJoinNode;

impl ListJoinNode {
    pub fn new() -> Self {
        Self
    }
}

impl NodeProcessor for ListJoinNode {
    fn type_id(&self) -> &'static str {
        "list.join"
    }

    fn init(&mut self, node: &mut Node) {
        let sockets = MultiSocket::new("Data", DataKind::scalar_list(), 1);
        node.add_input(Socket::input(sockets.socket_name(0), DataKind::scalar_list()).optional());
        node.multi_inputs = Some(sockets);
        node.add_output(Socket::output("Data", DataKind::scalar_list()));
    }

    fn process(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
        let linked: Vec<String> = ctx
            .node()?
            .inputs
            .iter()
            .filter(|s| ctx.is_input_linked(&s.name))
            .map(|s| s.name.clone())
            .collect();

        let mut joined = Vec::new();
        for name in &linked {
            let value = ctx.get_shared(name)?;
            let lists = value
                .as_scalars()
                .ok_or_else(|| EvaluationError::new(format!("'{}' is not a number list", name)))?;
            joined.extend(lists.iter().cloned());
        }
        ctx.set("Data", SocketValue::Scalars(joined))
    }

    fn clone_box(&self) -> Box<dyn NodeProcessor> {
        Box::new(self.clone())
    }
}
