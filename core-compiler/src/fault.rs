// Runtime faults raised while executing a compiled snippet.

use thiserror::Error;

pub const DIVIDE_BY_ZERO: &str = "Attempted to divide by zero.";
pub const OVERFLOW: &str = "Arithmetic operation resulted in an overflow.";
pub const INDEX_OUT_OF_RANGE: &str = "Index was outside the bounds of the array.";

/// A fault raised by snippet code or by a native library function.
///
/// Faults nest: a host-side wrapper keeps the original fault as its `source`,
/// and [`RuntimeFault::root_cause`] walks back to the innermost one.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RuntimeFault {
    message: String,
    #[source]
    inner: Option<Box<RuntimeFault>>,
}

impl RuntimeFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            inner: None,
        }
    }

    pub fn wrap(message: impl Into<String>, inner: RuntimeFault) -> Self {
        Self {
            message: message.into(),
            inner: Some(Box::new(inner)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn inner(&self) -> Option<&RuntimeFault> {
        self.inner.as_deref()
    }

    pub fn root_cause(&self) -> &RuntimeFault {
        let mut fault = self;
        while let Some(inner) = fault.inner() {
            fault = inner;
        }
        fault
    }

    pub fn divide_by_zero() -> Self {
        Self::new(DIVIDE_BY_ZERO)
    }

    pub fn overflow() -> Self {
        Self::new(OVERFLOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn root_cause_is_innermost_fault() {
        let fault = RuntimeFault::wrap("outer", RuntimeFault::wrap("middle", RuntimeFault::divide_by_zero()));
        assert_eq!(fault.root_cause().message(), DIVIDE_BY_ZERO);
        assert_eq!(fault.source().map(|s| s.to_string()), Some("middle".to_string()));
    }
}
