//! Element-wise arithmetic on number lists

use crate::error::{EvaluationError, Result};
use crate::nodes::context::NodeContext;
use crate::nodes::node::{Node, NodeProcessor};
use crate::nodes::socket::Socket;
use crate::nodes::value::{DataKind, SocketValue};

use super::match_long_repeat;

/// Property the `B` input falls back to
pub const B_PROPERTY: &str = "b_";

/// Operation applied pairwise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl MathOp {
    fn apply(self, a: f64, b: f64) -> std::result::Result<f64, EvaluationError> {
        match self {
            MathOp::Add => Ok(a + b),
            MathOp::Subtract => Ok(a - b),
            MathOp::Multiply => Ok(a * b),
            MathOp::Divide if b == 0.0 => Err(EvaluationError::new("division by zero")),
            MathOp::Divide => Ok(a / b),
        }
    }

    /// Value `B` starts with, so an unlinked `B` leaves `A` unchanged
    fn identity(self) -> f64 {
        match self {
            MathOp::Add | MathOp::Subtract => 0.0,
            MathOp::Multiply | MathOp::Divide => 1.0,
        }
    }
}

/// Apply `op` to two nested number lists.
///
/// Objects are paired up first, then the numbers inside each pair; the shorter
/// side repeats its last entry in both cases.
pub fn combine(
    op: MathOp,
    a: &[Vec<f64>],
    b: &[Vec<f64>],
) -> std::result::Result<Vec<Vec<f64>>, EvaluationError> {
    let objects = a.len().max(b.len());
    let mut result = Vec::with_capacity(objects);
    for index in 0..objects {
        let left = a.get(index).or(a.last());
        let right = b.get(index).or(b.last());
        let (Some(left), Some(right)) = (left, right) else {
            break;
        };
        let matched = match_long_repeat(&[left.clone(), right.clone()]);
        let values = matched[0]
            .iter()
            .zip(&matched[1])
            .map(|(x, y)| op.apply(*x, *y))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        result.push(values);
    }
    Ok(result)
}

/// `Result = A <op> B`
#[derive(Debug, Clone)]
pub struct ScalarMathNode {
    op: MathOp,
}

impl ScalarMathNode {
    pub fn new(op: MathOp) -> Self {
        Self { op }
    }

    pub fn add() -> Self {
        Self::new(MathOp::Add)
    }

    pub fn multiply() -> Self {
        Self::new(MathOp::Multiply)
    }
}

impl NodeProcessor for ScalarMathNode {
    fn type_id(&self) -> &'static str {
        match self.op {
            MathOp::Add => "math.add",
            MathOp::Subtract => "math.subtract",
            MathOp::Multiply => "math.multiply",
            MathOp::Divide => "math.divide",
        }
    }

    fn init(&mut self, node: &mut Node) {
        node.properties
            .insert(B_PROPERTY.to_string(), SocketValue::scalar(self.op.identity()));
        node.add_input(Socket::input("A", DataKind::scalar_list()));
        node.add_input(Socket::input("B", DataKind::scalar_list()).with_property(B_PROPERTY));
        node.add_output(Socket::output("Result", DataKind::scalar_list()));
    }

    fn process(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
        let a = ctx.get_shared("A")?;
        let b = ctx.get_shared("B")?;
        let (Some(a), Some(b)) = (a.as_scalars(), b.as_scalars()) else {
            return Err(EvaluationError::new("math inputs must be number lists").into());
        };
        let result = combine(self.op, a, b)?;
        ctx.set("Result", SocketValue::Scalars(result))
    }

    fn clone_box(&self) -> Box<dyn NodeProcessor> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combines_pairwise() {
        let result = combine(MathOp::Add, &[vec![1.0, 2.0]], &[vec![10.0, 20.0]]).unwrap();
        assert_eq!(result, vec![vec![11.0, 22.0]]);
    }

    #[test]
    fn shorter_side_repeats() {
        let result = combine(
            MathOp::Multiply,
            &[vec![1.0, 2.0, 3.0], vec![4.0]],
            &[vec![2.0]],
        )
        .unwrap();
        assert_eq!(result, vec![vec![2.0, 4.0, 6.0], vec![8.0]]);
    }

    #[test]
    fn empty_side_gives_nothing() {
        assert!(combine(MathOp::Add, &[], &[vec![1.0]]).unwrap().is_empty());
    }

    #[test]
    fn division_by_zero_is_an_evaluation_error() {
        let err = combine(MathOp::Divide, &[vec![1.0]], &[vec![0.0]]).unwrap_err();
        assert_eq!(err.message, "division by zero");
        assert_eq!(combine(MathOp::Subtract, &[vec![1.0]], &[vec![3.0]]).unwrap(), vec![vec![-2.0]]);
    }
}
