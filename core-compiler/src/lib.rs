// Library interface for snippet-compiler
// Snippet language front end, interpreter and loadable module library.

pub mod ast;
pub mod backend;
pub mod checker;
pub mod config;
pub mod diagnostic;
pub mod fault;
mod interp;
pub mod ir;
pub mod library;
pub mod parser;
pub mod trace;
pub mod types;
pub mod unit;
pub mod value;

pub use backend::{BackendOutput, CompileRequest, CompilerBackend, SnippetBackend};
pub use config::{CompilerConfig, ConfigError};
pub use diagnostic::{Diagnostic, Position, Severity};
pub use fault::RuntimeFault;
pub use library::{Library, LibraryModule, LoadError, ModuleLoader, NativeFn};
pub use types::Type;
pub use unit::CompiledUnit;
pub use value::{StructValue, Value};
