// Loadable library modules for snippets.
// A module is a named namespace of native functions; the compiler only sees
// the modules a compilation references.

mod base;
mod data;
mod math;
mod time;

use crate::fault::RuntimeFault;
use crate::types::Type;
use crate::value::Value;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub type NativeImpl = dyn Fn(&[Value]) -> Result<Value, RuntimeFault> + Send + Sync;

/// A host function callable from snippet code.
pub struct NativeFn {
    pub name: String,
    pub params: Vec<Type>,
    pub ret: Type,
    func: Arc<NativeImpl>,
}

impl NativeFn {
    pub fn call(&self, args: &[Value]) -> Result<Value, RuntimeFault> {
        (self.func)(args)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("ret", &self.ret)
            .finish()
    }
}

#[derive(Debug)]
pub struct LibraryModule {
    name: String,
    namespace: String,
    functions: Vec<Arc<NativeFn>>,
}

impl LibraryModule {
    pub fn builder(name: impl Into<String>, namespace: impl Into<String>) -> ModuleBuilder {
        ModuleBuilder {
            module: LibraryModule {
                name: name.into(),
                namespace: namespace.into(),
                functions: Vec::new(),
            },
        }
    }

    /// Short module name used for references, e.g. `math`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dotted namespace visible to snippet code, e.g. `Std.Math`.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn functions(&self) -> &[Arc<NativeFn>] {
        &self.functions
    }

    pub fn function(&self, name: &str) -> Option<&Arc<NativeFn>> {
        self.functions.iter().find(|f| f.name == name)
    }
}

pub struct ModuleBuilder {
    module: LibraryModule,
}

impl ModuleBuilder {
    pub fn function<F>(mut self, name: &str, params: &[Type], ret: Type, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, RuntimeFault> + Send + Sync + 'static,
    {
        self.module.functions.push(Arc::new(NativeFn {
            name: name.to_string(),
            params: params.to_vec(),
            ret,
            func: Arc::new(func),
        }));
        self
    }

    pub fn build(self) -> LibraryModule {
        self.module
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("module '{0}' is not available")]
    NotFound(String),
    #[error("module '{name}' could not be loaded: {reason}")]
    Unavailable { name: String, reason: String },
}

/// Source of library modules for a compilation.
pub trait ModuleLoader: Send + Sync {
    fn load(&self, name: &str) -> Result<Arc<LibraryModule>, LoadError>;
}

/// In-memory module registry.
pub struct Library {
    modules: RwLock<BTreeMap<String, Arc<LibraryModule>>>,
}

impl Library {
    pub fn empty() -> Self {
        Self {
            modules: RwLock::new(BTreeMap::new()),
        }
    }

    /// Library holding every bundled module.
    pub fn standard() -> Self {
        let library = Self::empty();
        for module in [
            base::std_module(),
            base::text_module(),
            math::math_module(),
            data::regex_module(),
            time::time_module(),
            data::uuid_module(),
            data::json_module(),
            data::io_module(),
        ] {
            library.register(module);
        }
        library
    }

    /// Add or replace a module under its name.
    pub fn register(&self, module: LibraryModule) {
        let module = Arc::new(module);
        self.modules.write().insert(module.name().to_string(), module);
    }

    pub fn names(&self) -> Vec<String> {
        self.modules.read().keys().cloned().collect()
    }
}

impl Default for Library {
    fn default() -> Self {
        Self::standard()
    }
}

impl ModuleLoader for Library {
    fn load(&self, name: &str) -> Result<Arc<LibraryModule>, LoadError> {
        self.modules
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(name.to_string()))
    }
}

// Argument accessors shared by the bundled modules. Arguments are type-checked
// at compile time, so a mismatch here means a host called the native directly.

fn arg<'a>(args: &'a [Value], index: usize) -> Result<&'a Value, RuntimeFault> {
    args.get(index)
        .ok_or_else(|| RuntimeFault::new(format!("Missing argument {}.", index + 1)))
}

fn str_arg(args: &[Value], index: usize) -> Result<&str, RuntimeFault> {
    let value = arg(args, index)?;
    value.as_str().ok_or_else(|| mismatch(value, "string"))
}

fn f64_arg(args: &[Value], index: usize) -> Result<f64, RuntimeFault> {
    let value = arg(args, index)?;
    value.as_f64().ok_or_else(|| mismatch(value, "f64"))
}

fn i64_arg(args: &[Value], index: usize) -> Result<i64, RuntimeFault> {
    let value = arg(args, index)?;
    value.as_i64().ok_or_else(|| mismatch(value, "i64"))
}

fn mismatch(value: &Value, expected: &str) -> RuntimeFault {
    RuntimeFault::new(format!(
        "Object of type '{}' cannot be converted to type '{}'.",
        value.type_of(),
        expected
    ))
}

fn i32_result(n: usize) -> Result<Value, RuntimeFault> {
    i32::try_from(n).map(Value::I32).map_err(|_| RuntimeFault::overflow())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_library_loads_every_bundled_module() {
        let library = Library::standard();
        assert_eq!(
            library.names(),
            vec!["io", "json", "math", "regex", "std", "text", "time", "uuid"]
        );
        let math = library.load("math").unwrap();
        assert_eq!(math.namespace(), "Std.Math");
        assert!(math.function("sqrt").is_some());
    }

    #[test]
    fn unknown_module_is_a_load_error() {
        let err = Library::standard().load("graphics").unwrap_err();
        assert_eq!(err, LoadError::NotFound("graphics".to_string()));
        assert_eq!(err.to_string(), "module 'graphics' is not available");
    }

    #[test]
    fn registered_module_replaces_existing() {
        let library = Library::empty();
        library.register(
            LibraryModule::builder("geo", "Geo")
                .function("origin", &[], Type::I32, |_| Ok(Value::I32(0)))
                .build(),
        );
        let geo = library.load("geo").unwrap();
        assert_eq!(geo.function("origin").unwrap().call(&[]).unwrap(), Value::I32(0));
    }
}
