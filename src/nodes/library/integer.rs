//! Integer source node

use crate::error::{EvaluationError, Result};
use crate::nodes::context::NodeContext;
use crate::nodes::node::{Node, NodeProcessor};
use crate::nodes::socket::Socket;
use crate::nodes::value::{DataKind, SocketValue};

/// Property the input falls back to
pub const INT_PROPERTY: &str = "int_";

/// Emits one integer as `[[n]]`, taken from its input or its `int_` property
#[derive(Debug, Clone)]
pub struct IntegerNode {
    initial: i64,
}

impl IntegerNode {
    pub fn new(initial: i64) -> Self {
        Self { initial }
    }
}

impl Default for IntegerNode {
    fn default() -> Self {
        Self::new(1)
    }
}

impl NodeProcessor for IntegerNode {
    fn type_id(&self) -> &'static str {
        "number.integer"
    }

    fn init(&mut self, node: &mut Node) {
        node.properties
            .insert(INT_PROPERTY.to_string(), SocketValue::scalar(self.initial as f64));
        node.add_input(Socket::input("Integer", DataKind::scalar_list()).with_property(INT_PROPERTY));
        node.add_output(Socket::output("Integer", DataKind::scalar_list()));
    }

    fn process(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
        let number = ctx
            .get("Integer")?
            .first_scalar()
            .ok_or_else(|| EvaluationError::new("Integer input holds no number"))?;
        ctx.set("Integer", SocketValue::scalar(number.round()))
    }

    fn clone_box(&self) -> Box<dyn NodeProcessor> {
        Box::new(self.clone())
    }
}
