//! Mixed-radix enumeration over a set of axes.
//!
//! Each call to [`apply_axes`] writes the current combination onto a request
//! and then advances the odometer by one. Axes are visited cheapest first, so
//! the cheapest axis changes on every call and the most expensive one (model
//! swaps) changes least often.

use std::collections::BTreeMap;
use std::fmt;

use crate::axis::Axis;
use crate::error::CoreError;
use crate::parse::MAX_AXIS_VALUES;
use crate::request::GenerationRequest;
use crate::types::AxisValue;

/// Digits used by the position code.
const CHAR_SET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Width of one axis in the position code.
const DIGITS_PER_AXIS: usize = 2;

/// Applied values keyed by axis id: `axis_id -> (label, value)`.
pub type Selection = BTreeMap<String, (String, AxisValue)>;

// ---------------------------------------------------------------------------
// PositionCode
// ---------------------------------------------------------------------------

/// Fixed-width identifier of a cell's place in the grid.
///
/// Holds one 1-based cursor per axis in original axis order. Renders as two
/// base-36 characters per axis, last axis first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PositionCode(Vec<usize>);

impl PositionCode {
    pub fn new(digits: Vec<usize>) -> Self {
        Self(digits)
    }

    /// Number of axes encoded.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 1-based cursor positions in original axis order.
    pub fn digits(&self) -> &[usize] {
        &self.0
    }
}

/// Base-36, zero-padded to two characters.
fn encode_digit(mut num: usize) -> String {
    debug_assert!(num <= MAX_AXIS_VALUES);
    let mut encoded = Vec::new();
    while num > 0 {
        encoded.push(CHAR_SET[num % CHAR_SET.len()]);
        num /= CHAR_SET.len();
    }
    while encoded.len() < DIGITS_PER_AXIS {
        encoded.push(b'0');
    }
    encoded.reverse();
    String::from_utf8_lossy(&encoded).into_owned()
}

impl fmt::Display for PositionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for digit in self.0.iter().rev() {
            f.write_str(&encode_digit(*digit))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Enumeration
// ---------------------------------------------------------------------------

/// Outcome of applying one combination.
#[derive(Debug, Clone)]
pub struct AxisSet {
    pub selection: Selection,
    pub position_code: PositionCode,
    /// Per-axis application failures; the combination is unusable if any.
    pub errors: Vec<CoreError>,
}

/// Number of combinations spanned by `axes`.
pub fn combination_count(axes: &[Axis]) -> usize {
    axes.iter().map(Axis::len).product()
}

/// Apply the current combination to `config`, then advance the odometer.
///
/// Errors are collected per axis without aborting, and the cursor advances
/// regardless so the enumeration stays in lockstep.
pub fn apply_axes(config: &mut GenerationRequest, axes: &mut [Axis]) -> AxisSet {
    let mut order: Vec<usize> = (0..axes.len()).collect();
    order.sort_by(|a, b| axes[*a].cost().total_cmp(&axes[*b].cost()));

    let mut selection = Selection::new();
    let mut digits = vec![0; axes.len()];
    let mut errors = Vec::new();
    let mut carry = true;

    for index in order {
        let axis = &mut axes[index];
        digits[index] = axis.cursor() + 1;
        match axis.apply(config) {
            Ok(()) => {
                if let Some(value) = axis.value() {
                    selection.insert(axis.id(), (axis.label().to_string(), value.clone()));
                }
            }
            Err(err) => errors.push(err),
        }
        if carry {
            carry = !axis.advance();
        }
    }

    AxisSet {
        selection,
        position_code: PositionCode::new(digits),
        errors,
    }
}
