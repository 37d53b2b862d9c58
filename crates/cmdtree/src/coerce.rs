//! Token-to-value coercion.
//!
//! Coercion failure is silent by design: the caller treats `None` as
//! "this branch does not accept these tokens" and the host falls back to
//! its own unknown-command behavior. No structured exception is raised
//! here.

use crate::command::{ArgSpec, ArgType, ArgValue};

/// Coerces a single raw token against the given spec.
pub(crate) fn coerce_single(spec: &ArgSpec, token: &str) -> Option<ArgValue> {
    match spec.ty() {
        ArgType::Int32 => {
            let (lo, hi) = effective_bounds(spec, i32::MIN as f64, i32::MAX as f64);
            let value: i32 = token.parse().ok()?;
            in_bounds(value as f64, lo, hi).then_some(ArgValue::Int32(value))
        }
        ArgType::Int64 => {
            let (lo, hi) = effective_bounds(spec, i64::MIN as f64, i64::MAX as f64);
            let value: i64 = token.parse().ok()?;
            in_bounds(value as f64, lo, hi).then_some(ArgValue::Int64(value))
        }
        ArgType::Float64 => {
            let (lo, hi) = effective_bounds(spec, f64::MIN, f64::MAX);
            let value: f64 = token.parse().ok()?;
            in_bounds(value, lo, hi).then_some(ArgValue::Float64(value))
        }
        ArgType::Bool => match token {
            "true" => Some(ArgValue::Bool(true)),
            "false" => Some(ArgValue::Bool(false)),
            _ => None,
        },
        ArgType::Text => {
            length_ok(spec, token).then(|| ArgValue::Text(token.to_string()))
        }
        // Accepted unresolved; the handler resolves the name.
        ArgType::EntityRef => Some(ArgValue::EntityRef(token.to_string())),
    }
}

/// Coerces the whole remaining tail for a greedy text argument, joining
/// the tokens with single spaces.
pub(crate) fn coerce_greedy(spec: &ArgSpec, tokens: &[&str]) -> Option<ArgValue> {
    let joined = tokens.join(" ");
    length_ok(spec, &joined).then_some(ArgValue::Text(joined))
}

/// Intersects the declared bounds with the type's representable range.
fn effective_bounds(spec: &ArgSpec, type_min: f64, type_max: f64) -> (f64, f64) {
    let (min, max) = spec.bounds();
    (min.max(type_min), max.min(type_max))
}

// NaN fails both comparisons, so a "NaN" token is rejected.
fn in_bounds(value: f64, lo: f64, hi: f64) -> bool {
    value >= lo && value <= hi
}

fn length_ok(spec: &ArgSpec, text: &str) -> bool {
    let len = text.chars().count();
    let (min_len, max_len) = spec.len_bounds();
    len >= min_len && max_len.map_or(true, |max| len <= max)
}
