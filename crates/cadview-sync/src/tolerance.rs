// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tolerant structural equality over JSON values.

use serde_json::Value;

/// Absolute tolerance applied to numbers unless configured otherwise.
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

/// [`is_tol_equal_with`] at [`DEFAULT_TOLERANCE`].
pub fn is_tol_equal(a: &Value, b: &Value) -> bool {
    is_tol_equal_with(a, b, DEFAULT_TOLERANCE)
}

/// Compare two values, treating numbers closer than `tol` as equal.
///
/// Arrays compare element-wise and in order. Objects must have the same key
/// set. Everything else compares exactly.
pub fn is_tol_equal_with(a: &Value, b: &Value, tol: f64) -> bool {
    match (a, b) {
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| is_tol_equal_with(x, y, tol))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| is_tol_equal_with(x, y, tol)))
        }
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => (x - y).abs() < tol,
            _ => x == y,
        },
        _ => a == b,
    }
}

/// Numeric slices compared element-wise at `tol`.
pub fn slices_tol_equal(a: &[f64], b: &[f64], tol: f64) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < tol)
}
