//! Arithmetic between patterns.
//!
//! All operators read the derived data of their operands and return a new detached
//! [`Pattern`] named after the left operand. Nothing links the result back to its operands.

use crate::error::Result;
use crate::grid::{align, InterpolationKind};
use crate::pattern::{Pattern, PatternData};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineOp {
    Add,
    Subtract,
}

/// Combines the derived data of `a` and `b`.
///
/// `b` is interpolated with a cubic spline onto the part of the grid of `a` that lies
/// inside the domain of `b`; identical grids are combined element-wise.
///
/// # Errors
/// [`crate::error::PatternError::RangeOverlap`] with the name of `a` when the grids do not
/// overlap.
pub fn combine(a: &Pattern, b: &Pattern, op: CombineOp) -> Result<Pattern> {
    let (x_a, y_a) = a.derived();
    let (x_b, y_b) = b.derived();
    let aligned = align(x_a, y_a, x_b, y_b, InterpolationKind::Cubic, &a.name)?;
    let y = match op {
        CombineOp::Add => &aligned.y_a + &aligned.y_b,
        CombineOp::Subtract => &aligned.y_a - &aligned.y_b,
    };
    log::debug!("{op:?} {} and {}: {} samples", a.name, b.name, y.len());
    Ok(Pattern::new(PatternData { x: aligned.x, y }, &a.name))
}

pub fn add(a: &Pattern, b: &Pattern) -> Result<Pattern> {
    combine(a, b, CombineOp::Add)
}

pub fn subtract(a: &Pattern, b: &Pattern) -> Result<Pattern> {
    combine(a, b, CombineOp::Subtract)
}

/// Multiplies the derived y of `a` by `factor`. Negative factors are kept as they are.
pub fn scale_by(a: &Pattern, factor: f64) -> Pattern {
    let (x, y) = a.derived();
    Pattern::new(
        PatternData {
            x: x.clone(),
            y: y * factor,
        },
        &a.name,
    )
}
