//! Values produced by computation nodes.
//!
//! A node computes `Option<T>`; `None` means the stat does not apply to the
//! unit (it is never coerced to zero). [`NodeValue`] abstracts over the value
//! types a node can hold so the default sort key and display text can be
//! derived uniformly.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Trait for values a [`StatNode`](crate::node::StatNode) can compute.
pub trait NodeValue: Clone + PartialEq + fmt::Debug {
    /// Key used to order rows by this value.
    ///
    /// Numbers are negated when `reversed` is set so that lower-is-better
    /// columns sort ascending by raw magnitude.
    fn sort_key(&self, reversed: bool) -> SortKey;

    /// Default display text. Numbers are printed without decimals.
    fn to_text(&self) -> String;
}

impl NodeValue for i64 {
    fn sort_key(&self, reversed: bool) -> SortKey {
        SortKey::number(*self as f64, reversed)
    }

    fn to_text(&self) -> String {
        self.to_string()
    }
}

impl NodeValue for f64 {
    fn sort_key(&self, reversed: bool) -> SortKey {
        SortKey::number(*self, reversed)
    }

    fn to_text(&self) -> String {
        format!("{:.0}", self)
    }
}

impl NodeValue for String {
    fn sort_key(&self, _reversed: bool) -> SortKey {
        SortKey::Text(self.clone())
    }

    fn to_text(&self) -> String {
        self.clone()
    }
}

/// A stat value: an integer game number, a fractional rate, or a label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Real(f64),
    Text(String),
}

impl Value {
    /// The integer value, if this is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The numeric value as `f64`, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Real(v) => Some(*v),
            Value::Text(_) => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl NodeValue for Value {
    fn sort_key(&self, reversed: bool) -> SortKey {
        match self {
            Value::Int(v) => v.sort_key(reversed),
            Value::Real(v) => v.sort_key(reversed),
            Value::Text(v) => v.sort_key(reversed),
        }
    }

    fn to_text(&self) -> String {
        match self {
            Value::Int(v) => v.to_text(),
            Value::Real(v) => v.to_text(),
            Value::Text(v) => v.to_text(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Sort key of a stat cell. Numbers order before labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SortKey {
    Number(f64),
    Text(String),
}

impl SortKey {
    fn number(v: f64, reversed: bool) -> Self {
        SortKey::Number(if reversed { -v } else { v })
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (SortKey::Number(a), SortKey::Number(b)) => a.partial_cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => Some(a.cmp(b)),
            (SortKey::Number(_), SortKey::Text(_)) => Some(Ordering::Less),
            (SortKey::Text(_), SortKey::Number(_)) => Some(Ordering::Greater),
        }
    }
}
