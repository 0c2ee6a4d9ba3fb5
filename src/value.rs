use std::collections::BTreeMap;

/// Values that composite yieldables can be resolved into
///
/// A [`Yieldable::Sequence`](crate::Yieldable::Sequence) resolves to
/// `from_seq` of its element values in input order, a
/// [`Yieldable::Mapping`](crate::Yieldable::Mapping) to `from_map`.
pub trait Aggregate: Sized {
    /// Combines the values of a sequence, in input order
    fn from_seq(items: Vec<Self>) -> Self;
    /// Combines the values of a mapping, by key
    fn from_map(entries: BTreeMap<String, Self>) -> Self;
}

/// A dynamically typed value
///
/// Useful when the yielded operations of one body produce values of different
/// shapes.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// No value, what `()` converts to
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// The value of a resolved sequence
    List(Vec<Value>),
    /// The value of a resolved mapping
    Map(BTreeMap<String, Value>),
}

/// Accessors return `None` when the value holds another variant.
impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers widen to floats
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The items of a list
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// The entries of a map
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Takes the items out of a list, anything else becomes a single item
    pub fn into_list(self) -> Vec<Value> {
        match self {
            Value::List(items) => items,
            other => vec![other],
        }
    }
}

impl Aggregate for Value {
    fn from_seq(items: Vec<Self>) -> Self {
        Value::List(items)
    }

    fn from_map(entries: BTreeMap<String, Self>) -> Self {
        Value::Map(entries)
    }
}

impl Aggregate for () {
    fn from_seq(_: Vec<Self>) -> Self {}

    fn from_map(_: BTreeMap<String, Self>) -> Self {}
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i.into())
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_into_list_and_map() {
        let list = Value::from_seq(vec![Value::from(1), Value::from("two")]);
        assert_eq!(list, Value::List(vec![Value::Int(1), Value::Str("two".into())]));

        let map = Value::from_map([("k".to_string(), Value::Null)].into_iter().collect());
        assert_eq!(map.as_map().map(|m| m.len()), Some(1));
    }

    #[test]
    fn accessors_match_variants() {
        assert_eq!(Value::from(3).as_int(), Some(3));
        assert_eq!(Value::from(3).as_float(), Some(3.0));
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert_eq!(Value::from("a").as_int(), None);
        assert!(Value::from(()).is_null());
        assert_eq!(Value::from(vec![1, 2]).as_list().map(<[Value]>::len), Some(2));
    }

    #[test]
    fn into_list_wraps_scalars() {
        assert_eq!(Value::from(vec![1, 2]).into_list(), vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(Value::Int(1).into_list(), vec![Value::Int(1)]);
    }
}
