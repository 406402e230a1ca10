//! Reference node implementations
//!
//! Small, self-contained nodes used by the demo binary and the tests. Each
//! keeps its computation in plain functions next to the processor.

pub mod integer;
pub mod join;
pub mod math;
pub mod range_int;
pub mod viewer;

pub use integer::IntegerNode;
pub use join::ListJoinNode;
pub use math::{MathOp, ScalarMathNode};
pub use range_int::{RangeIntNode, RangeMode};
pub use viewer::{ViewerHandle, ViewerNode};

/// Extend every list to the longest one by repeating its last element.
///
/// Empty lists stay empty, since there is nothing to repeat.
pub fn match_long_repeat(lists: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let longest = lists.iter().map(Vec::len).max().unwrap_or(0);
    lists
        .iter()
        .map(|list| match list.last() {
            Some(last) => {
                let mut extended = list.clone();
                extended.resize(longest, *last);
                extended
            }
            None => Vec::new(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_repeat_pads_with_last_element() {
        let matched = match_long_repeat(&[vec![1.0, 2.0, 3.0], vec![5.0], vec![]]);
        assert_eq!(matched, vec![vec![1.0, 2.0, 3.0], vec![5.0, 5.0, 5.0], vec![]]);
        assert!(match_long_repeat(&[]).is_empty());
    }
}
