//! Status changes - numeric attribute updates applied when a choice is taken.
//!
//! Attributes are named numbers (`金钱`, `暴露度`, `好感度`...). A choice carries a list
//! of [`StatusChange`]s which [`apply_status_changes`] folds over the current state.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Named numeric attributes of a play session.
pub type StatusState = BTreeMap<String, f64>;

/// Lower bound of percentage-style attributes.
pub const PERCENT_MIN: f64 = 0.0;
/// Upper bound of percentage-style attributes.
pub const PERCENT_MAX: f64 = 100.0;

/// Arithmetic applied by a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusOp {
    #[serde(rename = "+", alias = "add")]
    Add,
    #[serde(rename = "-", alias = "subtract")]
    Subtract,
    #[serde(rename = "*", alias = "multiply")]
    Multiply,
    #[serde(rename = "/", alias = "divide")]
    Divide,
    #[serde(rename = "=", alias = "set")]
    Set,
}

impl StatusOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Set => "=",
        }
    }
}

impl fmt::Display for StatusOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StatusOp {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "+" | "add" => Ok(Self::Add),
            "-" | "subtract" => Ok(Self::Subtract),
            "*" | "multiply" => Ok(Self::Multiply),
            "/" | "divide" => Ok(Self::Divide),
            "=" | "set" => Ok(Self::Set),
            other => Err(DomainError::parse(format!("Unknown status operation: {}", other))),
        }
    }
}

/// One authored change to a named attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub attribute: String,
    pub operation: StatusOp,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl StatusChange {
    pub fn new(attribute: impl Into<String>, operation: StatusOp, value: f64) -> Self {
        Self {
            attribute: attribute.into(),
            operation,
            value,
            min: None,
            max: None,
        }
    }

    pub fn with_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }
}

/// Whether an attribute is a rate/degree-style stat (`暴露度`, `成功率`...).
///
/// These are always held inside [0, 100], on top of whatever bounds the author set.
/// NOTE: this couples a naming convention to numeric policy; players' saves rely on
/// it, so it is kept even when an author sets a wider `max`.
pub fn is_percentage_attribute(attribute: &str) -> bool {
    attribute.contains('度') || attribute.contains('率')
}

/// Apply `changes` in order to a copy of `state`.
///
/// - attributes missing from `state` start at 0
/// - division by zero leaves the value unchanged
/// - a non-finite result is discarded in favour of the prior value
/// - the explicit `[min, max]` clamp runs first, then percentage attributes are clamped to [0, 100]
pub fn apply_status_changes(state: &StatusState, changes: &[StatusChange]) -> StatusState {
    let mut next = state.clone();

    for change in changes {
        let current = next.get(&change.attribute).copied().unwrap_or(0.0);

        let computed = match change.operation {
            StatusOp::Add => current + change.value,
            StatusOp::Subtract => current - change.value,
            StatusOp::Multiply => current * change.value,
            StatusOp::Divide if change.value == 0.0 => current,
            StatusOp::Divide => current / change.value,
            StatusOp::Set => change.value,
        };

        let mut value = if computed.is_finite() { computed } else { current };

        if let Some(min) = change.min.filter(|m| m.is_finite()) {
            value = value.max(min);
        }
        if let Some(max) = change.max.filter(|m| m.is_finite()) {
            value = value.min(max);
        }
        if is_percentage_attribute(&change.attribute) {
            value = value.clamp(PERCENT_MIN, PERCENT_MAX);
        }

        next.insert(change.attribute.clone(), value);
    }

    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(pairs: &[(&str, f64)]) -> StatusState {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn percentage_attribute_clamps_to_hundred_regardless_of_authored_max() {
        let start = state(&[("暴露度", 50.0)]);
        let change = StatusChange::new("暴露度", StatusOp::Add, 1000.0).with_bounds(None, Some(200.0));

        let next = apply_status_changes(&start, &[change]);

        assert_eq!(next["暴露度"], 100.0);
    }

    #[test]
    fn percentage_attribute_never_drops_below_zero() {
        let start = state(&[("成功率", 10.0)]);
        let change = StatusChange::new("成功率", StatusOp::Subtract, 40.0).with_bounds(Some(-50.0), None);

        let next = apply_status_changes(&start, &[change]);

        assert_eq!(next["成功率"], 0.0);
    }

    #[test]
    fn division_by_zero_leaves_value_unchanged() {
        let start = state(&[("x", 10.0)]);
        let next = apply_status_changes(&start, &[StatusChange::new("x", StatusOp::Divide, 0.0)]);
        assert_eq!(next["x"], 10.0);
    }

    #[test]
    fn non_finite_results_are_discarded() {
        let start = state(&[("gold", 5.0)]);
        let next = apply_status_changes(
            &start,
            &[StatusChange::new("gold", StatusOp::Multiply, f64::INFINITY)],
        );
        assert_eq!(next["gold"], 5.0);
    }

    #[test]
    fn explicit_bounds_apply_to_plain_attributes() {
        let start = state(&[("gold", 5.0)]);
        let change = StatusChange::new("gold", StatusOp::Add, 500.0).with_bounds(Some(0.0), Some(120.0));
        let next = apply_status_changes(&start, &[change]);
        assert_eq!(next["gold"], 120.0);
    }

    #[test]
    fn missing_attributes_start_at_zero_and_input_is_untouched() {
        let start = StatusState::new();
        let next = apply_status_changes(&start, &[StatusChange::new("勇气", StatusOp::Add, 3.0)]);
        assert_eq!(next["勇气"], 3.0);
        assert!(start.is_empty());
    }

    #[test]
    fn changes_apply_in_order() {
        let start = state(&[("x", 2.0)]);
        let changes = [
            StatusChange::new("x", StatusOp::Multiply, 3.0),
            StatusChange::new("x", StatusOp::Subtract, 1.0),
            StatusChange::new("y", StatusOp::Set, 7.0),
        ];
        let next = apply_status_changes(&start, &changes);
        assert_eq!(next["x"], 5.0);
        assert_eq!(next["y"], 7.0);
    }

    #[test]
    fn operations_deserialize_from_symbols_and_legacy_words() {
        let symbol: StatusChange =
            serde_json::from_str(r#"{"attribute":"a","operation":"/","value":2}"#).unwrap();
        let word: StatusChange =
            serde_json::from_str(r#"{"attribute":"a","operation":"subtract","value":2}"#).unwrap();
        assert_eq!(symbol.operation, StatusOp::Divide);
        assert_eq!(word.operation, StatusOp::Subtract);
        assert_eq!("=".parse::<StatusOp>().unwrap(), StatusOp::Set);
    }
}
