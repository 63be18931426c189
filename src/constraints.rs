//! Constraint Evaluator (C1): pure `(constraint, observed value)` checks
//! returning allow/reject with a deterministic reason string (§4.2).

use std::sync::mpsc;
use std::time::Duration;

use regex::Regex;
use serde_json::Value;

use crate::path::{display_list, display_quoted, display_value, resolve, to_number};
use crate::types::ConstraintSpec;

/// Result of evaluating one constraint object against one parameter path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintOutcome {
    Allow,
    Reject(String),
}

impl ConstraintOutcome {
    pub fn is_allow(&self) -> bool {
        matches!(self, ConstraintOutcome::Allow)
    }
}

/// Evaluate a single constraint object against `params` for `path`.
///
/// Evaluation order is fixed (`max, min, in, not_in, pattern, not_pattern,
/// equals`) so rejection messages are deterministic when multiple keys are
/// present on the same constraint. `regex_timeout` bounds `pattern` and
/// `not_pattern` evaluation to deny ReDoS as a denial-of-policy vector.
pub fn evaluate(
    path: &str,
    spec: &ConstraintSpec,
    params: &Value,
    regex_timeout: Duration,
) -> ConstraintOutcome {
    let resolved = resolve(path, params);

    let value = match resolved {
        Some(v) => v,
        None => {
            return if spec.requires_present_value() {
                ConstraintOutcome::Reject(format!("required parameter {path} is missing"))
            } else {
                // `not_pattern` alone on an absent value is allow.
                ConstraintOutcome::Allow
            };
        }
    };

    if let Some(max) = spec.max {
        match to_number(value) {
            Ok(n) if n > max => {
                return ConstraintOutcome::Reject(format!(
                    "{path} value {} exceeds maximum {max}",
                    display_quoted(value)
                ));
            }
            Ok(_) => {}
            Err(_) => {
                return ConstraintOutcome::Reject(format!("parameter {path} cannot be compared numerically"));
            }
        }
    }

    if let Some(min) = spec.min {
        match to_number(value) {
            Ok(n) if n < min => {
                return ConstraintOutcome::Reject(format!(
                    "{path} value {} is below minimum {min}",
                    display_quoted(value)
                ));
            }
            Ok(_) => {}
            Err(_) => {
                return ConstraintOutcome::Reject(format!("parameter {path} cannot be compared numerically"));
            }
        }
    }

    if let Some(allowed) = &spec.in_values {
        if !allowed.contains(value) {
            return ConstraintOutcome::Reject(format!(
                "{path} value {} not in allowed values {}",
                display_quoted(value),
                display_list(allowed)
            ));
        }
    }

    if let Some(blocked) = &spec.not_in {
        if blocked.contains(value) {
            return ConstraintOutcome::Reject(format!("{path} value {} is blocked", display_quoted(value)));
        }
    }

    if let Some(pattern) = &spec.pattern {
        match matches_anchored(pattern, &display_value(value), regex_timeout) {
            Ok(true) => {}
            Ok(false) => {
                return ConstraintOutcome::Reject(format!(
                    "{path} value {} does not match pattern {pattern}",
                    display_quoted(value)
                ));
            }
            Err(_) => return ConstraintOutcome::Reject("regex evaluation timeout".to_string()),
        }
    }

    if let Some(pattern) = &spec.not_pattern {
        match matches_anchored(pattern, &display_value(value), regex_timeout) {
            Ok(false) => {}
            Ok(true) => {
                let reason = spec
                    .reason
                    .clone()
                    .unwrap_or_else(|| format!("{path} contains forbidden pattern"));
                return ConstraintOutcome::Reject(reason);
            }
            Err(_) => return ConstraintOutcome::Reject("regex evaluation timeout".to_string()),
        }
    }

    if let Some(expected) = &spec.equals {
        if value != expected {
            return ConstraintOutcome::Reject(format!("{path} must equal {}", display_quoted(expected)));
        }
    }

    ConstraintOutcome::Allow
}

/// "Match at start" semantics, the same as Python's `re.match`: the regex
/// need not consume the whole string, only anchor at position 0.
///
/// Runs on a helper thread so a pathological pattern cannot stall the
/// caller past `timeout`; the helper thread is abandoned (not killed) on
/// timeout, matching the accepted trade-off in §4.2/§5.
fn matches_anchored(pattern: &str, text: &str, timeout: Duration) -> Result<bool, ()> {
    let pattern = pattern.to_string();
    let text = text.to_string();
    let (tx, rx) = mpsc::channel();

    std::thread::spawn(move || {
        let outcome = Regex::new(&pattern)
            .ok()
            .and_then(|re| re.find(&text))
            .map(|m| m.start() == 0)
            .unwrap_or(false);
        let _ = tx.send(outcome);
    });

    rx.recv_timeout(timeout).map_err(|_| ())
}
