// A compiled, executable snippet.

use crate::checker::Checked;
use crate::fault::RuntimeFault;
use crate::interp::Interpreter;
use crate::ir::{Function, StructDef};
use crate::types::Type;
use crate::value::Value;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_UNIT_ID: AtomicU64 = AtomicU64::new(1);

/// Functions and struct layouts of one successful compilation.
///
/// A unit is immutable; share it as `Arc<CompiledUnit>` between the catalog
/// and every callable built from it.
#[derive(Debug)]
pub struct CompiledUnit {
    id: u64,
    functions: Vec<Function>,
    structs: Vec<StructDef>,
    references: Vec<String>,
    max_call_depth: usize,
}

impl CompiledUnit {
    pub(crate) fn new(checked: Checked, references: Vec<String>, max_call_depth: usize) -> Self {
        Self {
            id: NEXT_UNIT_ID.fetch_add(1, Ordering::Relaxed),
            functions: checked.functions,
            structs: checked.structs,
            references,
            max_call_depth,
        }
    }

    /// Process-unique identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Every function in declaration order, public or not.
    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn function(&self, index: usize) -> Option<&Function> {
        self.functions.get(index)
    }

    /// Index of `Type.name` (or a free function `name`).
    pub fn find(&self, qualified_name: &str) -> Option<usize> {
        self.functions
            .iter()
            .position(|f| f.qualified_name() == qualified_name)
    }

    pub fn structs(&self) -> &[StructDef] {
        &self.structs
    }

    /// Names of the library modules the unit was compiled against.
    pub fn references(&self) -> &[String] {
        &self.references
    }

    /// Run function `index`. Methods take their receiver as the first argument.
    pub fn invoke(&self, index: usize, args: &[Value]) -> Result<Value, RuntimeFault> {
        let function = self
            .functions
            .get(index)
            .ok_or_else(|| RuntimeFault::new(format!("No function at index {}.", index)))?;

        if args.len() != function.arity() {
            return Err(RuntimeFault::new("Parameter count mismatch."));
        }

        let receiver = function
            .has_self
            .then(|| Type::Struct(function.declaring_type.clone().unwrap_or_default()));
        let expected = receiver.iter().chain(function.params.iter().map(|p| &p.ty));
        for (arg, ty) in args.iter().zip(expected) {
            if !arg.conforms_to(ty) {
                return Err(RuntimeFault::new(format!(
                    "Object of type '{}' cannot be converted to type '{}'.",
                    arg.type_of(),
                    ty
                )));
            }
        }

        Interpreter::new(&self.functions, self.max_call_depth).call(index, args.to_vec())
    }
}
