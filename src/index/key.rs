// Polymorphic comparable wrapper around `Value`. Index keys of any column
// type end up in one ordered map, so the ordering must be total across
// types. The comparison contract, applied in order:
//
//   1. nulls first (NULL sorts below everything, NULL == NULL);
//   2. values of the same concrete type use their natural order;
//   3. two numeric values compare as f64;
//   4. if both textual representations parse as f64, compare numerically;
//   5. otherwise compare the textual representations as strings.

use crate::common::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone)]
pub struct IndexKey(pub Value);

impl IndexKey {
    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn compare(a: &Value, b: &Value) -> Ordering {
        match (a.is_null(), b.is_null()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }

        match (a, b) {
            (Value::Integer(x), Value::Integer(y)) => return x.cmp(y),
            (Value::BigInt(x), Value::BigInt(y)) => return x.cmp(y),
            (Value::Double(x), Value::Double(y)) => return x.total_cmp(y),
            (Value::Boolean(x), Value::Boolean(y)) => return x.cmp(y),
            (Value::String(x), Value::String(y)) => return x.cmp(y),
            _ => {}
        }

        if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
            return x.total_cmp(&y);
        }

        let (text_a, text_b) = (a.as_text(), b.as_text());
        if let (Ok(x), Ok(y)) = (text_a.parse::<f64>(), text_b.parse::<f64>()) {
            return x.total_cmp(&y);
        }
        text_a.cmp(&text_b)
    }

    /// Engine-wide value equality: the `=` semantics of WHERE clauses and
    /// join keys (NULL equals NULL here).
    pub fn values_equal(a: &Value, b: &Value) -> bool {
        Self::compare(a, b) == Ordering::Equal
    }
}

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        Self::compare(&self.0, &other.0) == Ordering::Equal
    }
}

impl Eq for IndexKey {}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        Self::compare(&self.0, &other.0)
    }
}
