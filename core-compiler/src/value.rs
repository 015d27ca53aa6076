// Runtime values for compiled snippets.
// One variant per primitive width so values carry their exact static type.

use crate::types::Type;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use std::fmt;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Char(char),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(String),
    DateTime(DateTime<Utc>),
    Duration(Duration),
    Uuid(Uuid),
    Unit,
    List(Vec<Value>),
    Struct(StructValue),
}

/// Instance of a snippet-declared struct. Fields keep declaration order.
#[derive(Clone, Debug, PartialEq)]
pub struct StructValue {
    pub name: String,
    pub fields: Vec<(String, Value)>,
}

impl StructValue {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

impl Value {
    /// Runtime type tag. Lists report the tag of their first element.
    pub fn type_of(&self) -> Type {
        match self {
            Value::Bool(_) => Type::Bool,
            Value::Char(_) => Type::Char,
            Value::I8(_) => Type::I8,
            Value::I16(_) => Type::I16,
            Value::I32(_) => Type::I32,
            Value::I64(_) => Type::I64,
            Value::U8(_) => Type::U8,
            Value::U16(_) => Type::U16,
            Value::U32(_) => Type::U32,
            Value::U64(_) => Type::U64,
            Value::F32(_) => Type::F32,
            Value::F64(_) => Type::F64,
            Value::Str(_) => Type::Str,
            Value::DateTime(_) => Type::DateTime,
            Value::Duration(_) => Type::Duration,
            Value::Uuid(_) => Type::Uuid,
            Value::Unit => Type::Unit,
            Value::List(items) => Type::List(Box::new(
                items.first().map(Value::type_of).unwrap_or(Type::Any),
            )),
            Value::Struct(s) => Type::Struct(s.name.clone()),
        }
    }

    /// Whether this value may be passed where `ty` is declared.
    pub fn conforms_to(&self, ty: &Type) -> bool {
        match (self, ty) {
            (_, Type::Any) => true,
            (Value::List(items), Type::List(inner)) => items.iter().all(|v| v.conforms_to(inner)),
            (Value::Struct(s), Type::Struct(name)) => &s.name == name,
            _ => self.type_of() == *ty,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Any integer variant widened to i128.
    pub fn as_i128(&self) -> Option<i128> {
        let n = match self {
            Value::I8(n) => *n as i128,
            Value::I16(n) => *n as i128,
            Value::I32(n) => *n as i128,
            Value::I64(n) => *n as i128,
            Value::U8(n) => *n as i128,
            Value::U16(n) => *n as i128,
            Value::U32(n) => *n as i128,
            Value::U64(n) => *n as i128,
            _ => return None,
        };
        Some(n)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_i128().and_then(|n| i64::try_from(n).ok())
    }

    /// Any numeric variant widened to f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F32(x) => Some(*x as f64),
            Value::F64(x) => Some(*x),
            other => other.as_i128().map(|n| n as f64),
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Build an integer value of type `ty`, or `None` when `n` is out of range.
    pub fn from_i128(ty: &Type, n: i128) -> Option<Value> {
        let value = match ty {
            Type::I8 => Value::I8(i8::try_from(n).ok()?),
            Type::I16 => Value::I16(i16::try_from(n).ok()?),
            Type::I32 => Value::I32(i32::try_from(n).ok()?),
            Type::I64 => Value::I64(i64::try_from(n).ok()?),
            Type::U8 => Value::U8(u8::try_from(n).ok()?),
            Type::U16 => Value::U16(u16::try_from(n).ok()?),
            Type::U32 => Value::U32(u32::try_from(n).ok()?),
            Type::U64 => Value::U64(u64::try_from(n).ok()?),
            _ => return None,
        };
        Some(value)
    }

    /// Build a float value of type `ty` (`f32` or `f64`).
    pub fn from_f64(ty: &Type, x: f64) -> Option<Value> {
        match ty {
            Type::F32 => Some(Value::F32(x as f32)),
            Type::F64 => Some(Value::F64(x)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Char(c) => write!(f, "{}", c),
            Value::I8(n) => write!(f, "{}", n),
            Value::I16(n) => write!(f, "{}", n),
            Value::I32(n) => write!(f, "{}", n),
            Value::I64(n) => write!(f, "{}", n),
            Value::U8(n) => write!(f, "{}", n),
            Value::U16(n) => write!(f, "{}", n),
            Value::U32(n) => write!(f, "{}", n),
            Value::U64(n) => write!(f, "{}", n),
            Value::F32(x) => write!(f, "{}", x),
            Value::F64(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::DateTime(t) => write!(f, "{}", t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Duration(d) => write!(f, "{}", d),
            Value::Uuid(u) => write!(f, "{}", u),
            Value::Unit => write!(f, "()"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Struct(s) => {
                write!(f, "{} {{", s.name)?;
                for (i, (name, value)) in s.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {}: {}", name, value)?;
                }
                write!(f, " }}")
            }
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    char => Char,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => Str,
    DateTime<Utc> => DateTime,
    Duration => Duration,
    Uuid => Uuid,
    Vec<Value> => List,
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_range_checked_on_construction() {
        assert_eq!(Value::from_i128(&Type::U8, 255), Some(Value::U8(255)));
        assert_eq!(Value::from_i128(&Type::U8, 256), None);
        assert_eq!(Value::from_i128(&Type::I8, -129), None);
        assert_eq!(Value::from_i128(&Type::Str, 1), None);
    }

    #[test]
    fn lists_conform_element_wise() {
        let list = Value::List(vec![Value::I32(1), Value::I32(2)]);
        assert!(list.conforms_to(&Type::List(Box::new(Type::I32))));
        assert!(!list.conforms_to(&Type::List(Box::new(Type::I64))));
        assert!(Value::List(vec![]).conforms_to(&Type::List(Box::new(Type::Str))));
    }

    #[test]
    fn display_matches_source_notation() {
        let s = Value::Struct(StructValue {
            name: "Point".to_string(),
            fields: vec![("x".to_string(), Value::I32(1)), ("y".to_string(), Value::I32(2))],
        });
        assert_eq!(s.to_string(), "Point { x: 1, y: 2 }");
        assert_eq!(Value::List(vec![Value::from("a"), Value::from("b")]).to_string(), "[a, b]");
    }
}
