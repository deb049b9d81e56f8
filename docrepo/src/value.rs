use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A property value held in a document.
///
/// Values keep the width they were written with: `Int(1)` and `Long(1)` are
/// different values and never compare equal. Finders rely on this to match
/// exactly what the generated serializer wrote, with no coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_byte(&self) -> Option<i8> {
        match self {
            Value::Byte(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_short(&self) -> Option<i16> {
        match self {
            Value::Short(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            Value::Char(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    /// Owned string unboxing, used by generated unserializers.
    pub fn as_string(&self) -> Option<String> {
        self.as_str().map(str::to_owned)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// False when the value holds NaN or an infinity anywhere, including
    /// nested in lists and maps. Such values have no JSON representation.
    pub fn is_finite(&self) -> bool {
        match self {
            Value::Float(v) => v.is_finite(),
            Value::Double(v) => v.is_finite(),
            Value::List(items) => items.iter().all(Value::is_finite),
            Value::Map(entries) => entries.values().all(Value::is_finite),
            _ => true,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Byte(_)
            | Value::Short(_)
            | Value::Int(_)
            | Value::Long(_)
            | Value::Float(_)
            | Value::Double(_) => 2,
            Value::Char(_) | Value::String(_) => 3,
            Value::List(_) => 4,
            Value::Map(_) => 5,
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Byte(v) => Some(f64::from(*v)),
            Value::Short(v) => Some(f64::from(*v)),
            Value::Int(v) => Some(f64::from(*v)),
            Value::Long(v) => Some(*v as f64),
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Total order used to sort view rows by key: null, booleans, numbers,
    /// text, lists, maps. Numbers of different widths sort by magnitude even
    /// though they never compare equal.
    pub fn collate(&self, other: &Value) -> Ordering {
        let by_rank = self.rank().cmp(&other.rank());
        if by_rank != Ordering::Equal {
            return by_rank;
        }
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.collate(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Map(a), Value::Map(b)) => {
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    let ord = ka.cmp(kb).then_with(|| va.collate(vb));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => {
                if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
                    return a.partial_cmp(&b).unwrap_or(Ordering::Equal);
                }
                self.text().cmp(&other.text())
            }
        }
    }

    fn text(&self) -> String {
        match self {
            Value::Char(c) => c.to_string(),
            Value::String(s) => s.clone(),
            _ => String::new(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Byte(v) => write!(f, "{v}"),
            Value::Short(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Char(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

macro_rules! impl_from {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        }
    };
}

impl_from!(bool, Bool);
impl_from!(i8, Byte);
impl_from!(i16, Short);
impl_from!(i32, Int);
impl_from!(i64, Long);
impl_from!(f32, Float);
impl_from!(f64, Double);
impl_from!(char, Char);
impl_from!(String, String);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_equality_does_not_coerce() {
        assert_ne!(Value::Int(1), Value::Long(1));
        assert_ne!(Value::Float(1.0), Value::Double(1.0));
        assert_ne!(Value::Char('a'), Value::String("a".into()));
        assert_eq!(Value::from("a"), Value::String("a".into()));
    }

    #[test]
    fn test_unboxing_is_strict() {
        assert_eq!(Value::Int(7).as_int(), Some(7));
        assert_eq!(Value::Int(7).as_long(), None);
        assert_eq!(Value::Short(3).as_int(), None);
        assert_eq!(Value::from("x").as_string(), Some("x".to_string()));
    }

    #[test]
    fn test_collate_orders_kinds_then_contents() {
        let mut values = vec![
            Value::from("b"),
            Value::Long(10),
            Value::Null,
            Value::Int(2),
            Value::from("a"),
            Value::Bool(true),
        ];
        values.sort_by(|a, b| a.collate(b));
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Bool(true),
                Value::Int(2),
                Value::Long(10),
                Value::from("a"),
                Value::from("b"),
            ]
        );
    }

    #[test]
    fn test_collate_lists_elementwise() {
        let a = Value::List(vec![Value::Int(1), Value::from("x")]);
        let b = Value::List(vec![Value::Int(1), Value::from("y")]);
        assert_eq!(a.collate(&b), Ordering::Less);
        assert_eq!(a.collate(&a.clone()), Ordering::Equal);
    }

    #[test]
    fn test_is_finite() {
        assert!(Value::Double(1.5).is_finite());
        assert!(!Value::Float(f32::NAN).is_finite());
        assert!(!Value::Map(
            [("w".to_string(), Value::Double(f64::INFINITY))].into_iter().collect()
        )
        .is_finite());
        assert!(Value::from("nan").is_finite());
    }

    #[test]
    fn test_serde_keeps_width() {
        let json = serde_json::to_string(&Value::Short(4)).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Value::Short(4));
    }
}
