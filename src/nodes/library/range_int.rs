//! Integer range generator
//!
//! Two flavours: a "lazy" range that always steps towards `stop`, and a
//! count-based range that emits a fixed number of values.

use crate::constants::range;
use crate::error::{EvaluationError, Result};
use crate::nodes::context::NodeContext;
use crate::nodes::node::{Node, NodeProcessor};
use crate::nodes::socket::{Socket, SocketDirection};
use crate::nodes::value::{DataKind, SocketValue};

use super::match_long_repeat;

pub const START_PROPERTY: &str = "start_";
pub const STEP_PROPERTY: &str = "step_";
pub const STOP_PROPERTY: &str = "stop_";
pub const COUNT_PROPERTY: &str = "count_";
/// Text property holding the current [`RangeMode`]
pub const MODE_PROPERTY: &str = "mode";

/// `start..stop`, exclusive of `stop`. Steps below 1 are raised to 1 and the
/// direction follows `stop`.
pub fn int_range(start: i64, step: i64, stop: i64) -> std::result::Result<Vec<i64>, EvaluationError> {
    if start == stop {
        return Ok(Vec::new());
    }
    let step = step.max(1);
    let len = (i128::from(stop) - i128::from(start)).unsigned_abs().div_ceil(step as u128);
    check_len(len)?;

    let step = if stop < start { -step } else { step };
    let mut values = Vec::with_capacity(len as usize);
    let mut current = Some(start);
    while let Some(value) = current {
        if (step > 0 && value >= stop) || (step < 0 && value <= stop) {
            break;
        }
        values.push(value);
        current = value.checked_add(step);
    }
    Ok(values)
}

/// `count` values starting at `start`, `step` apart
pub fn count_range(start: i64, step: i64, count: i64) -> std::result::Result<Vec<i64>, EvaluationError> {
    let count = count.max(0);
    if count == 0 {
        return Ok(Vec::new());
    }
    if step == 0 {
        return Err(EvaluationError::new("count range step must not be zero"));
    }
    check_len(count as u128)?;
    (0..count)
        .map(|i| {
            i.checked_mul(step)
                .and_then(|offset| start.checked_add(offset))
                .ok_or_else(|| EvaluationError::new("count range overflows a 64-bit integer"))
        })
        .collect()
}

fn check_len(len: u128) -> std::result::Result<(), EvaluationError> {
    if len > range::MAX_VALUES as u128 {
        return Err(EvaluationError::new(format!(
            "range of {} values exceeds the limit of {}",
            len,
            range::MAX_VALUES
        )));
    }
    Ok(())
}

/// How the third input is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeMode {
    /// Third input is the exclusive stop
    Range,
    /// Third input is the number of values
    Count,
}

impl RangeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RangeMode::Range => "LAZYRANGE",
            RangeMode::Count => "COUNTRANGE",
        }
    }

    fn from_property(value: Option<&SocketValue>) -> Self {
        match value {
            Some(SocketValue::Text(text)) if text.first().map(String::as_str) == Some("COUNTRANGE") => {
                RangeMode::Count
            }
            _ => RangeMode::Range,
        }
    }

    fn bound_property(&self) -> &'static str {
        match self {
            RangeMode::Range => STOP_PROPERTY,
            RangeMode::Count => COUNT_PROPERTY,
        }
    }
}

/// Generates one integer range per matched set of `Start`, `Step` and `Stop`
#[derive(Debug, Clone, Default)]
pub struct RangeIntNode;

impl RangeIntNode {
    pub fn new() -> Self {
        Self
    }

    /// Switch a range node's mode, re-binding its last input to the matching property
    pub fn set_mode(node: &mut Node, mode: RangeMode) {
        node.properties.insert(
            MODE_PROPERTY.to_string(),
            SocketValue::Text(vec![mode.as_str().to_string()]),
        );
        if let Some(last) = node.sockets_mut(SocketDirection::Input).last_mut() {
            last.prop_name = Some(mode.bound_property().to_string());
        }
    }

    fn first_list(ctx: &NodeContext<'_>, input: &str) -> std::result::Result<Vec<f64>, EvaluationError> {
        let value = ctx.get_shared(input)?;
        value
            .as_scalars()
            .and_then(|lists| lists.first())
            .cloned()
            .ok_or_else(|| EvaluationError::new(format!("'{}' holds no numbers", input)))
    }
}

impl NodeProcessor for RangeIntNode {
    fn type_id(&self) -> &'static str {
        "number.range_int"
    }

    fn init(&mut self, node: &mut Node) {
        for (name, value) in [
            (START_PROPERTY, 0.0),
            (STEP_PROPERTY, 1.0),
            (STOP_PROPERTY, 10.0),
            (COUNT_PROPERTY, 10.0),
        ] {
            node.properties.insert(name.to_string(), SocketValue::scalar(value));
        }
        node.add_input(Socket::input("Start", DataKind::scalar_list()).with_property(START_PROPERTY));
        node.add_input(Socket::input("Step", DataKind::scalar_list()).with_property(STEP_PROPERTY));
        node.add_input(Socket::input("Stop", DataKind::scalar_list()).with_property(STOP_PROPERTY));
        node.add_output(Socket::output("Range", DataKind::scalar_list()));
        Self::set_mode(node, RangeMode::Range);
    }

    fn process(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
        if !ctx.is_output_linked("Range") {
            return Ok(());
        }
        let mode = RangeMode::from_property(ctx.property(MODE_PROPERTY));
        let params = [
            Self::first_list(ctx, "Start")?,
            Self::first_list(ctx, "Step")?,
            Self::first_list(ctx, "Stop")?,
        ];
        let matched = match_long_repeat(&params);

        // an empty parameter list yields no ranges at all
        let objects = matched.iter().map(Vec::len).min().unwrap_or(0);
        let mut ranges = Vec::with_capacity(objects);
        for index in 0..objects {
            let [start, step, last] = [0, 1, 2].map(|p| matched[p][index].round() as i64);
            let values = match mode {
                RangeMode::Range => int_range(start, step, last)?,
                RangeMode::Count => count_range(start, step, last)?,
            };
            ranges.push(values.into_iter().map(|v| v as f64).collect());
        }
        ctx.set("Range", SocketValue::Scalars(ranges))
    }

    fn clone_box(&self) -> Box<dyn NodeProcessor> {
        Box::new(self.clone())
    }
}
