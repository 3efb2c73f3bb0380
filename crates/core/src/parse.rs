//! Value parser: raw axis strings to typed value sequences.
//!
//! Supported syntaxes, fragment by fragment:
//!
//! - plain values separated by `,` (or by `||` when the string contains one,
//!   which lets values carry commas),
//! - numeric ranges `start-end` and `start-end(step)`,
//! - numeric counts `start-end[count]` (evenly spaced, both ends included).
//!
//! Float ranges follow half-open `arange` semantics over `end + step`, so step
//! accumulation can produce one element past `end` (`0-0.2(0.1)` yields four
//! values, the last being `0.30000000000000004`). This is kept as observable
//! behaviour rather than corrected.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::CoreError;
use crate::types::{AxisValue, ValueType};

/// Fragment separator used when values may themselves contain commas.
pub const DOUBLE_PIPE: &str = "||";

/// Largest number of values an axis may hold. Position codes use two base-36
/// digits per axis with 1-based cursors, so `36 * 36 - 1` is the ceiling.
pub const MAX_AXIS_VALUES: usize = 36 * 36 - 1;

/// Decimal places kept for plain float fragments.
const FLOAT_DECIMALS: i32 = 8;

const TRUTHY: &[&str] = &["true", "yes", "1", "on"];
const FALSY: &[&str] = &["false", "no", "0", "off"];

static INT_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([+-]?\s*\d+)\s*-\s*([+-]?\s*\d+)(?:\s*\(\s*([+-]?\d+)\s*\))?\s*$")
        .expect("valid regex")
});

static INT_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([+-]?\s*\d+)\s*-\s*([+-]?\s*\d+)\s*\[\s*(\d+)\s*\]\s*$").expect("valid regex")
});

static FLOAT_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*([+-]?\s*\d+(?:\.\d*)?)\s*-\s*([+-]?\s*\d+(?:\.\d*)?)(?:\s*\(\s*([+-]?\d+(?:\.\d*)?)\s*\))?\s*$",
    )
    .expect("valid regex")
});

static FLOAT_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([+-]?\s*\d+(?:\.\d*)?)\s*-\s*([+-]?\s*\d+(?:\.\d*)?)\s*\[\s*(\d+)\s*\]\s*$")
        .expect("valid regex")
});

// ---------------------------------------------------------------------------
// Splitting
// ---------------------------------------------------------------------------

/// Split a raw axis string into trimmed, non-empty fragments.
pub fn split_fragments(raw: &str) -> Vec<&str> {
    let separator = if raw.contains(DOUBLE_PIPE) { DOUBLE_PIPE } else { "," };
    raw.split(separator)
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// Numeric parsing
// ---------------------------------------------------------------------------

/// Expand integer fragments (plain, range or count) into a flat list.
pub fn parse_range_int(raw: &str) -> Result<Vec<i64>, CoreError> {
    let mut parsed = Vec::new();
    for fragment in split_fragments(raw) {
        if let Some(caps) = INT_RANGE.captures(fragment) {
            let start = capture_i64(&caps, 1, fragment)?;
            let end = capture_i64(&caps, 2, fragment)?;
            let step = match caps.get(3) {
                Some(_) => capture_i64(&caps, 3, fragment)?,
                None => 1,
            };
            expand_int_range(start, end, step, fragment, &mut parsed)?;
        } else if let Some(caps) = INT_COUNT.captures(fragment) {
            let start = capture_i64(&caps, 1, fragment)?;
            let end = capture_i64(&caps, 2, fragment)?;
            let count = capture_count(&caps, fragment)?;
            parsed.extend(
                linspace(start as f64, end as f64, count)
                    .into_iter()
                    .map(|v| v.round() as i64),
            );
        } else {
            let value = fragment.parse::<i64>().map_err(|_| {
                CoreError::Parse(format!("Invalid integer value '{fragment}'"))
            })?;
            parsed.push(value);
        }
        check_len(parsed.len(), fragment)?;
    }
    Ok(parsed)
}

/// Expand float fragments (plain, range or count) into a flat list.
///
/// Plain fragments are rounded to 8 decimals; expanded ranges are not.
pub fn parse_range_float(raw: &str) -> Result<Vec<f64>, CoreError> {
    let mut parsed = Vec::new();
    for fragment in split_fragments(raw) {
        if let Some(caps) = FLOAT_RANGE.captures(fragment) {
            let start = capture_f64(&caps, 1, fragment)?;
            let end = capture_f64(&caps, 2, fragment)?;
            let step = match caps.get(3) {
                Some(_) => capture_f64(&caps, 3, fragment)?,
                None => 1.0,
            };
            expand_float_range(start, end, step, fragment, &mut parsed)?;
        } else if let Some(caps) = FLOAT_COUNT.captures(fragment) {
            let start = capture_f64(&caps, 1, fragment)?;
            let end = capture_f64(&caps, 2, fragment)?;
            let count = capture_count(&caps, fragment)?;
            parsed.extend(linspace(start, end, count));
        } else {
            let value = fragment
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| CoreError::Parse(format!("Invalid float value '{fragment}'")))?;
            parsed.push(round_to(value, FLOAT_DECIMALS));
        }
        check_len(parsed.len(), fragment)?;
    }
    Ok(parsed)
}

fn expand_int_range(
    start: i64,
    end: i64,
    step: i64,
    fragment: &str,
    out: &mut Vec<i64>,
) -> Result<(), CoreError> {
    if step == 0 {
        return Err(CoreError::Parse(format!("Step must not be zero in '{fragment}'")));
    }
    // Widened so that any pair of i64 bounds and steps stays representable.
    let (start, end, step) = (i128::from(start), i128::from(end), i128::from(step));
    let span = if step > 0 { end - start } else { start - end };
    if span < 0 {
        return Ok(());
    }
    let len = span / step.abs() + 1;
    check_len(
        out.len().saturating_add(usize::try_from(len).unwrap_or(usize::MAX)),
        fragment,
    )?;
    for i in 0..len {
        let value = i64::try_from(start + i * step)
            .map_err(|_| CoreError::Parse(format!("Value out of range in '{fragment}'")))?;
        out.push(value);
    }
    Ok(())
}

fn expand_float_range(
    start: f64,
    end: f64,
    step: f64,
    fragment: &str,
    out: &mut Vec<f64>,
) -> Result<(), CoreError> {
    if step == 0.0 {
        return Err(CoreError::Parse(format!("Step must not be zero in '{fragment}'")));
    }
    let len = ((end + step - start) / step).ceil();
    if !len.is_finite() || len <= 0.0 {
        return Ok(());
    }
    let len = len as usize;
    check_len(out.len().saturating_add(len), fragment)?;
    out.extend((0..len).map(|i| start + i as f64 * step));
    Ok(())
}

/// `count` evenly spaced values from `start` to `end` inclusive.
fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let delta = (end - start) / (count - 1) as f64;
            let mut values: Vec<f64> = (0..count).map(|i| start + i as f64 * delta).collect();
            values[count - 1] = end;
            values
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn capture_i64(caps: &Captures<'_>, idx: usize, fragment: &str) -> Result<i64, CoreError> {
    let text = capture_compact(caps, idx);
    text.parse::<i64>()
        .map_err(|_| CoreError::Parse(format!("Invalid integer '{text}' in '{fragment}'")))
}

fn capture_f64(caps: &Captures<'_>, idx: usize, fragment: &str) -> Result<f64, CoreError> {
    let text = capture_compact(caps, idx);
    text.parse::<f64>()
        .map_err(|_| CoreError::Parse(format!("Invalid number '{text}' in '{fragment}'")))
}

fn capture_count(caps: &Captures<'_>, fragment: &str) -> Result<usize, CoreError> {
    let text = capture_compact(caps, 3);
    let count = text
        .parse::<usize>()
        .map_err(|_| CoreError::Parse(format!("Invalid count '{text}' in '{fragment}'")))?;
    check_len(count, fragment)?;
    Ok(count)
}

/// Capture text with inner whitespace removed (`"- 5"` becomes `"-5"`).
fn capture_compact(caps: &Captures<'_>, idx: usize) -> String {
    caps.get(idx)
        .map(|m| m.as_str().chars().filter(|c| !c.is_whitespace()).collect())
        .unwrap_or_default()
}

fn check_len(len: usize, fragment: &str) -> Result<(), CoreError> {
    if len > MAX_AXIS_VALUES {
        return Err(CoreError::Parse(format!(
            "'{fragment}' expands past the limit of {MAX_AXIS_VALUES} values per axis"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Booleans and choices
// ---------------------------------------------------------------------------

/// Case-insensitive boolean coercion. `None` when the fragment is neither.
pub fn parse_bool(fragment: &str) -> Option<bool> {
    let lowered = fragment.to_lowercase();
    if TRUTHY.contains(&lowered.as_str()) {
        Some(true)
    } else if FALSY.contains(&lowered.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// Resolve `name` against `choices`: exact match first, then the shortest
/// choice containing `name`. Ties keep list order.
pub fn closest_match<'a>(name: &str, choices: &'a [String]) -> Option<&'a str> {
    if let Some(exact) = choices.iter().find(|choice| choice.as_str() == name) {
        return Some(exact);
    }
    choices
        .iter()
        .filter(|choice| choice.contains(name))
        .min_by_key(|choice| choice.len())
        .map(String::as_str)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Parse a raw axis string into typed values.
///
/// `choices` is the current legal list for enumerated string axes; unmatched
/// fragments are dropped rather than substituted. Booleans that do not coerce
/// are kept as text so validation can report them.
pub fn parse_values(
    raw: &str,
    value_type: ValueType,
    choices: Option<&[String]>,
) -> Result<Vec<AxisValue>, CoreError> {
    let values = match value_type {
        ValueType::Integer => parse_range_int(raw)?
            .into_iter()
            .map(AxisValue::Int)
            .collect(),
        ValueType::Float => parse_range_float(raw)?
            .into_iter()
            .map(AxisValue::Float)
            .collect(),
        ValueType::Boolean => split_fragments(raw)
            .into_iter()
            .map(|fragment| match parse_bool(fragment) {
                Some(flag) => AxisValue::Bool(flag),
                None => AxisValue::Text(fragment.to_lowercase()),
            })
            .collect(),
        ValueType::String => split_fragments(raw)
            .into_iter()
            .filter_map(|fragment| match choices {
                Some(list) => closest_match(fragment, list).map(str::to_string),
                None => Some(fragment.to_string()),
            })
            .filter(|value| !value.is_empty())
            .map(AxisValue::Text)
            .collect::<Vec<_>>(),
        ValueType::None => Vec::new(),
    };
    check_len(values.len(), raw)?;
    Ok(values)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn choices(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    // -- splitting --

    #[test]
    fn splits_on_comma_and_drops_empty() {
        assert_eq!(split_fragments(" a, b ,, c ,"), vec!["a", "b", "c"]);
    }

    #[test]
    fn double_pipe_takes_precedence() {
        assert_eq!(
            split_fragments("red, blue || green"),
            vec!["red, blue", "green"]
        );
    }

    #[test]
    fn plain_fragments_preserve_count_and_order() {
        let values = parse_values("c, a, b", ValueType::String, None).unwrap();
        assert_eq!(
            values,
            vec![
                AxisValue::Text("c".into()),
                AxisValue::Text("a".into()),
                AxisValue::Text("b".into()),
            ]
        );
        let values = parse_values("3 || 1 || 2", ValueType::Integer, None).unwrap();
        assert_eq!(values.len(), 3);
    }

    // -- integers --

    #[test]
    fn int_range_inclusive() {
        assert_eq!(parse_range_int("2-5").unwrap(), vec![2, 3, 4, 5]);
    }

    #[test]
    fn int_range_with_step() {
        assert_eq!(parse_range_int("2-10(2)").unwrap(), vec![2, 4, 6, 8, 10]);
        assert_eq!(parse_range_int("1-10(+4)").unwrap(), vec![1, 5, 9]);
    }

    #[test]
    fn int_range_descending_with_negative_step() {
        assert_eq!(parse_range_int("10-1(-3)").unwrap(), vec![10, 7, 4, 1]);
    }

    #[test]
    fn int_range_with_negative_bounds() {
        assert_eq!(parse_range_int("-3--1").unwrap(), vec![-3, -2, -1]);
    }

    #[test]
    fn int_count_rounds() {
        assert_eq!(parse_range_int("1-10[4]").unwrap(), vec![1, 4, 7, 10]);
        assert_eq!(parse_range_int("0-1[3]").unwrap(), vec![0, 1, 1]);
        assert_eq!(parse_range_int("5-9[1]").unwrap(), vec![5]);
    }

    #[test]
    fn int_mixed_fragments() {
        assert_eq!(
            parse_range_int("1, 5-7, 20").unwrap(),
            vec![1, 5, 6, 7, 20]
        );
    }

    #[test]
    fn int_malformed_names_fragment() {
        let err = parse_range_int("1, two").unwrap_err();
        assert_matches!(err, CoreError::Parse(ref msg) if msg.contains("two"));
    }

    #[test]
    fn int_zero_step_rejected() {
        assert_matches!(parse_range_int("1-5(0)"), Err(CoreError::Parse(_)));
    }

    #[test]
    fn oversized_range_rejected() {
        assert_matches!(parse_range_int("0-100000"), Err(CoreError::Parse(_)));
    }

    #[test]
    fn extreme_int_bounds_do_not_overflow() {
        let err = parse_range_int("-9000000000000000000-9000000000000000000").unwrap_err();
        assert_matches!(err, CoreError::Parse(ref msg) if msg.contains("9000000000000000000"));
        assert_eq!(
            parse_range_int("1-0(-9223372036854775808)").unwrap(),
            vec![1]
        );
        assert_eq!(
            parse_range_int("9223372036854775806-9223372036854775807").unwrap(),
            vec![i64::MAX - 1, i64::MAX]
        );
    }

    // -- floats --

    #[test]
    fn float_count_evenly_spaced() {
        assert_eq!(parse_range_float("1-2[3]").unwrap(), vec![1.0, 1.5, 2.0]);
    }

    #[test]
    fn float_range_with_step() {
        assert_eq!(parse_range_float("1-2(0.5)").unwrap(), vec![1.0, 1.5, 2.0]);
        assert_eq!(
            parse_range_float("0-1(0.25)").unwrap(),
            vec![0.0, 0.25, 0.5, 0.75, 1.0]
        );
    }

    #[test]
    fn float_range_boundary_can_overshoot() {
        // (0.2 + 0.1) / 0.1 is slightly above 3, so a fourth value appears.
        let values = parse_range_float("0-0.2(0.1)").unwrap();
        assert_eq!(values.len(), 4);
        assert!(values[3] > 0.2);
    }

    #[test]
    fn float_range_boundary_exact() {
        let values = parse_range_float("0-1(0.1)").unwrap();
        assert_eq!(values.len(), 11);
        assert!((values[10] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn float_plain_rounded_to_eight_decimals() {
        assert_eq!(
            parse_range_float("0.123456789, 7").unwrap(),
            vec![0.12345679, 7.0]
        );
    }

    #[test]
    fn float_malformed_rejected() {
        let err = parse_range_float("1.5, abc").unwrap_err();
        assert_matches!(err, CoreError::Parse(ref msg) if msg.contains("abc"));
    }

    // -- booleans --

    #[test]
    fn bool_coercion_is_case_insensitive() {
        let values = parse_values("True, no, ON, 0", ValueType::Boolean, None).unwrap();
        assert_eq!(
            values,
            vec![
                AxisValue::Bool(true),
                AxisValue::Bool(false),
                AxisValue::Bool(true),
                AxisValue::Bool(false),
            ]
        );
    }

    #[test]
    fn bool_unknown_kept_as_text() {
        let values = parse_values("maybe", ValueType::Boolean, None).unwrap();
        assert_eq!(values, vec![AxisValue::Text("maybe".into())]);
    }

    // -- choices --

    #[test]
    fn closest_match_prefers_exact() {
        let list = choices(&["Euler a", "Euler"]);
        assert_eq!(closest_match("Euler", &list), Some("Euler"));
    }

    #[test]
    fn closest_match_picks_shortest_container() {
        let list = choices(&["DPM++ 2M Karras", "DPM++ 2M", "DPM++ 2M SDE"]);
        assert_eq!(closest_match("2M", &list), Some("DPM++ 2M"));
    }

    #[test]
    fn unmatched_choices_are_dropped() {
        let list = choices(&["Euler a", "DDIM"]);
        let values = parse_values("ddim, DDIM, Heun", ValueType::String, Some(&list)).unwrap();
        assert_eq!(values, vec![AxisValue::Text("DDIM".into())]);
    }

    #[test]
    fn none_type_has_no_values() {
        assert!(parse_values("anything", ValueType::None, None)
            .unwrap()
            .is_empty());
    }
}
