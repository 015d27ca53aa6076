// Static types of the snippet language.
// The same tags describe entry point signatures on the host side.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Type {
    Bool,
    Char,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Str,
    DateTime,
    Duration,
    Uuid,
    Unit,
    /// Accepts any value. Only native signatures and explicit `any` annotations use it.
    Any,
    List(Box<Type>),
    Struct(String),
}

impl Type {
    /// Resolve a builtin type keyword. Struct names are resolved by the checker.
    pub fn from_keyword(name: &str) -> Option<Type> {
        let ty = match name {
            "bool" => Type::Bool,
            "char" => Type::Char,
            "i8" => Type::I8,
            "i16" => Type::I16,
            "i32" => Type::I32,
            "i64" => Type::I64,
            "u8" => Type::U8,
            "u16" => Type::U16,
            "u32" => Type::U32,
            "u64" => Type::U64,
            "f32" => Type::F32,
            "f64" => Type::F64,
            "string" => Type::Str,
            "datetime" => Type::DateTime,
            "duration" => Type::Duration,
            "uuid" => Type::Uuid,
            "unit" => Type::Unit,
            "any" => Type::Any,
            _ => return None,
        };
        Some(ty)
    }

    /// Module that has to be referenced before the type can be named in source.
    pub fn required_module(&self) -> Option<&'static str> {
        match self {
            Type::DateTime | Type::Duration => Some("time"),
            Type::Uuid => Some("uuid"),
            Type::List(inner) => inner.required_module(),
            _ => None,
        }
    }

    pub fn is_signed_integer(&self) -> bool {
        matches!(self, Type::I8 | Type::I16 | Type::I32 | Type::I64)
    }

    pub fn is_unsigned_integer(&self) -> bool {
        matches!(self, Type::U8 | Type::U16 | Type::U32 | Type::U64)
    }

    pub fn is_integer(&self) -> bool {
        self.is_signed_integer() || self.is_unsigned_integer()
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::F32 | Type::F64)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Scalar values: everything except unit, lists, structs and `any`.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Type::Unit | Type::Any | Type::List(_) | Type::Struct(_))
    }

    /// Values of this type can be ordered with `<`, `<=`, `>`, `>=`.
    pub fn is_ordered(&self) -> bool {
        self.is_numeric()
            || matches!(self, Type::Char | Type::Str | Type::DateTime | Type::Duration)
    }

    /// Inclusive value range for integer types, widened to i128.
    pub fn integer_range(&self) -> Option<(i128, i128)> {
        let range = match self {
            Type::I8 => (i8::MIN as i128, i8::MAX as i128),
            Type::I16 => (i16::MIN as i128, i16::MAX as i128),
            Type::I32 => (i32::MIN as i128, i32::MAX as i128),
            Type::I64 => (i64::MIN as i128, i64::MAX as i128),
            Type::U8 => (0, u8::MAX as i128),
            Type::U16 => (0, u16::MAX as i128),
            Type::U32 => (0, u32::MAX as i128),
            Type::U64 => (0, u64::MAX as i128),
            _ => return None,
        };
        Some(range)
    }

    /// Whether a value of type `other` may be stored where `self` is expected.
    pub fn accepts(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Any, _) => true,
            (Type::List(a), Type::List(b)) => a.accepts(b),
            _ => self == other,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => write!(f, "bool"),
            Type::Char => write!(f, "char"),
            Type::I8 => write!(f, "i8"),
            Type::I16 => write!(f, "i16"),
            Type::I32 => write!(f, "i32"),
            Type::I64 => write!(f, "i64"),
            Type::U8 => write!(f, "u8"),
            Type::U16 => write!(f, "u16"),
            Type::U32 => write!(f, "u32"),
            Type::U64 => write!(f, "u64"),
            Type::F32 => write!(f, "f32"),
            Type::F64 => write!(f, "f64"),
            Type::Str => write!(f, "string"),
            Type::DateTime => write!(f, "datetime"),
            Type::Duration => write!(f, "duration"),
            Type::Uuid => write!(f, "uuid"),
            Type::Unit => write!(f, "unit"),
            Type::Any => write!(f, "any"),
            Type::List(inner) => write!(f, "[{}]", inner),
            Type::Struct(name) => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_round_trip_through_display() {
        for keyword in ["bool", "i8", "u64", "f32", "string", "datetime", "uuid", "any"] {
            let ty = Type::from_keyword(keyword).unwrap();
            assert_eq!(ty.to_string(), keyword);
        }
        assert_eq!(Type::from_keyword("int"), None);
    }

    #[test]
    fn value_types_name_their_module() {
        assert_eq!(Type::Duration.required_module(), Some("time"));
        assert_eq!(Type::List(Box::new(Type::Uuid)).required_module(), Some("uuid"));
        assert_eq!(Type::I32.required_module(), None);
    }

    #[test]
    fn any_accepts_everything_but_lists_are_invariant() {
        assert!(Type::Any.accepts(&Type::List(Box::new(Type::Str))));
        assert!(!Type::List(Box::new(Type::I64)).accepts(&Type::List(Box::new(Type::I32))));
    }
}
