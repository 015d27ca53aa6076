// Signature whitelist for callable adaptation.
//
// Only primitive-shaped values cross the callable boundary; lists, structs,
// `unit` and `any` have no fixed slot representation.

use crate::catalog::EntryPoint;
use snippet_compiler::Type;
use thiserror::Error;

/// Highest parameter count a callable can carry.
pub const MAX_PARAMETERS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("function requires an instance")]
    RequiresInstance,
    #[error("return type '{0}' is not supported")]
    UnsupportedReturn(Type),
    #[error("{count} parameters exceed the limit of {}", MAX_PARAMETERS)]
    TooManyParameters { count: usize },
    #[error("parameter '{name}' has unsupported type '{ty}'")]
    UnsupportedParameter { name: String, ty: Type },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    failure: Option<ValidationFailure>,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.failure.is_none()
    }

    pub fn failure(&self) -> Option<&ValidationFailure> {
        self.failure.as_ref()
    }

    pub fn reason(&self) -> Option<String> {
        self.failure.as_ref().map(ToString::to_string)
    }
}

/// Whether values of `ty` may be passed to or returned from a callable.
pub fn is_whitelisted(ty: &Type) -> bool {
    matches!(
        ty,
        Type::Bool
            | Type::Char
            | Type::I8
            | Type::I16
            | Type::I32
            | Type::I64
            | Type::U8
            | Type::U16
            | Type::U32
            | Type::U64
            | Type::F32
            | Type::F64
            | Type::Str
            | Type::DateTime
            | Type::Duration
            | Type::Uuid
    )
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SignatureValidator;

impl SignatureValidator {
    /// First failing rule wins: instance, return type, parameter count, parameters.
    pub fn validate(&self, entry: &EntryPoint) -> ValidationOutcome {
        ValidationOutcome {
            failure: first_failure(entry),
        }
    }
}

fn first_failure(entry: &EntryPoint) -> Option<ValidationFailure> {
    if entry.requires_instance() {
        return Some(ValidationFailure::RequiresInstance);
    }
    if !is_whitelisted(entry.return_type()) {
        return Some(ValidationFailure::UnsupportedReturn(entry.return_type().clone()));
    }

    let count = entry.parameter_types().len();
    if count > MAX_PARAMETERS {
        return Some(ValidationFailure::TooManyParameters { count });
    }

    entry
        .parameter_names()
        .iter()
        .zip(entry.parameter_types())
        .find(|(_, ty)| !is_whitelisted(ty))
        .map(|(name, ty)| ValidationFailure::UnsupportedParameter {
            name: name.clone(),
            ty: ty.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Type::Bool, true)]
    #[case(Type::Char, true)]
    #[case(Type::I8, true)]
    #[case(Type::U64, true)]
    #[case(Type::F32, true)]
    #[case(Type::Str, true)]
    #[case(Type::DateTime, true)]
    #[case(Type::Duration, true)]
    #[case(Type::Uuid, true)]
    #[case(Type::Unit, false)]
    #[case(Type::Any, false)]
    #[case(Type::List(Box::new(Type::I32)), false)]
    #[case(Type::Struct("Point".to_string()), false)]
    fn whitelist(#[case] ty: Type, #[case] expected: bool) {
        assert_eq!(is_whitelisted(&ty), expected);
    }

    #[test]
    fn failure_reasons_read_well() {
        assert_eq!(
            ValidationFailure::TooManyParameters { count: 17 }.to_string(),
            "17 parameters exceed the limit of 16"
        );
        assert_eq!(
            ValidationFailure::UnsupportedParameter {
                name: "xs".to_string(),
                ty: Type::List(Box::new(Type::I32)),
            }
            .to_string(),
            "parameter 'xs' has unsupported type '[i32]'"
        );
    }
}
