// WHERE-clause evaluation over column/value pairs. Clauses are always
// AND-combined. Equality follows the engine-wide value comparison, where
// NULL equals NULL; range operators never match when either side is null;
// LIKE is case-insensitive with `%` (any run) and `_` (one character).

use crate::common::Value;
use crate::execution::{CompareOp, Condition};
use crate::index::IndexKey;
use regex::Regex;
use std::cmp::Ordering;

/// True when every condition holds for the given column/value pairs.
pub fn matches_all(values: &[(String, Value)], conditions: &[Condition]) -> bool {
    conditions.iter().all(|c| matches_one(values, c))
}

pub fn matches_one(values: &[(String, Value)], condition: &Condition) -> bool {
    let actual = values
        .iter()
        .find(|(name, _)| name == &condition.column)
        .map(|(_, value)| value)
        .unwrap_or(&Value::Null);

    match condition.op {
        CompareOp::Eq => IndexKey::values_equal(actual, &condition.value),
        CompareOp::NotEq => !IndexKey::values_equal(actual, &condition.value),
        CompareOp::Gt => ordered(actual, &condition.value, |o| o == Ordering::Greater),
        CompareOp::Gte => ordered(actual, &condition.value, |o| o != Ordering::Less),
        CompareOp::Lt => ordered(actual, &condition.value, |o| o == Ordering::Less),
        CompareOp::Lte => ordered(actual, &condition.value, |o| o != Ordering::Greater),
        CompareOp::Like => match actual {
            Value::Null => false,
            other => like_matches(&other.as_text(), &condition.value.as_text()),
        },
        CompareOp::IsNull => actual.is_null(),
        CompareOp::IsNotNull => !actual.is_null(),
    }
}

fn ordered(actual: &Value, expected: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    if actual.is_null() || expected.is_null() {
        return false;
    }
    accept(IndexKey::compare(actual, expected))
}

/// SQL LIKE matching, translated to an anchored case-insensitive regex.
pub fn like_matches(text: &str, pattern: &str) -> bool {
    let mut translated = String::with_capacity(pattern.len() + 8);
    translated.push_str("(?is)^");
    for ch in pattern.chars() {
        match ch {
            '%' => translated.push_str(".*"),
            '_' => translated.push('.'),
            other => translated.push_str(&regex::escape(&other.to_string())),
        }
    }
    translated.push('$');
    Regex::new(&translated)
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}
