// Library interface for snippet-bridge
// Compiles snippets and exposes their public functions as typed callables:
// references -> compilation -> entry points -> validation -> adapter -> guard.

pub mod adapter;
pub mod catalog;
pub mod error;
pub mod guard;
pub mod orchestrator;
pub mod resolver;
pub mod rules;
pub mod signature;

pub use adapter::{Callable, Primitive, Signature, Typed, adapt, adapt_typed};
pub use catalog::{EntryPoint, describe, list_entry_points};
pub use error::{AdaptError, PreconditionError};
pub use guard::{InvocationResult, invoke, invoke_typed};
pub use orchestrator::{CompilationOrchestrator, CompilationResult, OrchestratorBuilder};
pub use resolver::{BASE_MODULES, ReferenceResolver, ReferenceSet, SkippedReference};
pub use rules::{DetectionRule, Predicate, RuleRegistry};
pub use signature::{SignatureValidator, ValidationFailure, ValidationOutcome};

pub use snippet_compiler::{CompiledUnit, CompilerConfig, Type, Value};

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod pipeline_tests;
