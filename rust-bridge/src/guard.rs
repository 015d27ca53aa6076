// Execution guard: run a callable and hand back every outcome as data.

use crate::adapter::{Callable, Signature, Typed};
use snippet_compiler::{RuntimeFault, Value};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::debug;

/// Result of one guarded invocation. `success()` holds exactly when a value
/// is present; otherwise `error_message()` says what went wrong.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationResult<T = Value> {
    value: Option<T>,
    error_message: String,
}

impl<T> InvocationResult<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value: Some(value),
            error_message: String::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            value: None,
            error_message: message.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.value.is_some()
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Option<T> {
        self.value
    }

    /// Empty on success.
    pub fn error_message(&self) -> &str {
        &self.error_message
    }
}

/// Invoke `callable`. Faults and panics inside the snippet or a library
/// function never escape; the innermost fault message is reported.
pub fn invoke(callable: &Callable, args: &[Value]) -> InvocationResult {
    guarded(callable.name(), || callable.call(args))
}

/// Invoke a typed callable with host values.
pub fn invoke_typed<S: Signature>(typed: &Typed<S>, args: S::Args) -> InvocationResult<S::Output> {
    guarded(typed.callable().name(), || typed.call(args))
}

fn guarded<T>(name: &str, call: impl FnOnce() -> Result<T, RuntimeFault>) -> InvocationResult<T> {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(value)) => InvocationResult::ok(value),
        Ok(Err(fault)) => {
            let message = fault.root_cause().message().to_string();
            debug!(callable = name, error = %message, "invocation faulted");
            InvocationResult::failed(message)
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            debug!(callable = name, error = %message, "invocation panicked");
            InvocationResult::failed(message)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Invocation panicked.".to_string()
    }
}
