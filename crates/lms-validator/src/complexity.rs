//! Complexity pre-screen
//!
//! # Invariants
//! - Neither check recurses; both run in O(input) time with O(depth) state.
//! - A document that fails either check produces exactly one error.
//!
//! # Algorithm
//! - Bytes: a single pass tracks string/escape state, bracket depth and
//!   value count, before any tree is built. 100,000 opening brackets are
//!   rejected at the 33rd.
//! - Trees: an explicit stack walk over `serde_json::Value` measures depth
//!   and node count and records the path of every object carrying `$ref`.

use serde_json::Value;

use crate::config::ComplexityLimits;
use crate::error::{ErrorKind, FieldError};

/// Shape of an accepted tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeMetrics {
    /// Deepest container nesting (0 for a scalar root)
    pub depth: usize,
    /// Values counted, containers included
    pub nodes: usize,
    /// Paths of objects that carry a `$ref` key
    pub references: Vec<String>,
}

fn too_complex(reason: String) -> FieldError {
    FieldError::root(ErrorKind::Complexity(reason))
}

/// Streaming check of raw JSON bytes.
///
/// Malformed input is not reported here; the parser reports it with a
/// position. Only size, depth and value count are enforced.
pub fn prescreen_bytes(bytes: &[u8], limits: &ComplexityLimits) -> Result<(), FieldError> {
    if bytes.len() > limits.max_document_bytes {
        return Err(too_complex(format!(
            "document is {} bytes, limit is {}",
            bytes.len(),
            limits.max_document_bytes
        )));
    }

    let mut depth = 0usize;
    let mut values = 0usize;
    let mut colons = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut in_scalar = false;

    for &b in bytes {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'{' | b'[' => {
                in_scalar = false;
                depth += 1;
                values += 1;
                if depth > limits.max_depth {
                    return Err(too_complex(format!("nesting depth exceeds {}", limits.max_depth)));
                }
            }
            b'}' | b']' => {
                in_scalar = false;
                depth = depth.saturating_sub(1);
            }
            b'"' => {
                in_scalar = false;
                in_string = true;
                values += 1;
            }
            b':' => {
                in_scalar = false;
                colons += 1;
            }
            b',' | b' ' | b'\t' | b'\n' | b'\r' => in_scalar = false,
            _ => {
                if !in_scalar {
                    in_scalar = true;
                    values += 1;
                }
            }
        }

        // Object keys are strings followed by ':'; they are not values
        if values.saturating_sub(colons) > limits.max_nodes {
            return Err(too_complex(format!("more than {} nodes", limits.max_nodes)));
        }
    }

    Ok(())
}

/// Measure a parsed tree with an explicit stack
pub fn measure_value(value: &Value, limits: &ComplexityLimits) -> Result<TreeMetrics, FieldError> {
    let mut metrics = TreeMetrics::default();
    // (node, container depth of node if it is a container, path)
    let mut stack: Vec<(&Value, usize, String)> = vec![(value, 1, String::new())];

    while let Some((node, depth, path)) = stack.pop() {
        metrics.nodes += 1;
        if metrics.nodes > limits.max_nodes {
            return Err(too_complex(format!("more than {} nodes", limits.max_nodes)));
        }

        match node {
            Value::Array(items) => {
                check_depth(depth, limits)?;
                metrics.depth = metrics.depth.max(depth);
                for (i, item) in items.iter().enumerate() {
                    if item.is_array() || item.is_object() {
                        stack.push((item, depth + 1, format!("{path}[{i}]")));
                    } else {
                        count_leaf(&mut metrics, limits)?;
                    }
                }
            }
            Value::Object(map) => {
                check_depth(depth, limits)?;
                metrics.depth = metrics.depth.max(depth);
                if map.contains_key("$ref") {
                    metrics.references.push(path.clone());
                }
                for (key, item) in map {
                    if item.is_array() || item.is_object() {
                        let child = if path.is_empty() {
                            key.clone()
                        } else {
                            format!("{path}.{key}")
                        };
                        stack.push((item, depth + 1, child));
                    } else {
                        count_leaf(&mut metrics, limits)?;
                    }
                }
            }
            _ => {}
        }
    }

    Ok(metrics)
}

fn check_depth(depth: usize, limits: &ComplexityLimits) -> Result<(), FieldError> {
    if depth > limits.max_depth {
        Err(too_complex(format!("nesting depth exceeds {}", limits.max_depth)))
    } else {
        Ok(())
    }
}

fn count_leaf(metrics: &mut TreeMetrics, limits: &ComplexityLimits) -> Result<(), FieldError> {
    metrics.nodes += 1;
    if metrics.nodes > limits.max_nodes {
        Err(too_complex(format!("more than {} nodes", limits.max_nodes)))
    } else {
        Ok(())
    }
}
