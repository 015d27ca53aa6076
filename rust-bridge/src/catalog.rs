// Entry point discovery over a compiled unit.

use crate::error::PreconditionError;
use serde::Serialize;
use snippet_compiler::{CompiledUnit, Type};
use std::fmt;
use std::sync::Arc;

/// One function of a compiled unit, as seen from the host.
///
/// Keeps its unit alive, so callables built from it stay valid after the
/// `CompilationResult` is dropped.
#[derive(Clone, Serialize)]
pub struct EntryPoint {
    name: String,
    declaring_type: Option<String>,
    parameter_names: Vec<String>,
    parameter_types: Vec<Type>,
    return_type: Type,
    requires_instance: bool,
    #[serde(skip)]
    unit: Arc<CompiledUnit>,
    #[serde(skip)]
    index: usize,
}

impl EntryPoint {
    fn new(unit: &Arc<CompiledUnit>, index: usize) -> Option<Self> {
        let function = unit.function(index)?;
        Some(Self {
            name: function.name.clone(),
            declaring_type: function.declaring_type.clone(),
            parameter_names: function.params.iter().map(|p| p.name.clone()).collect(),
            parameter_types: function.params.iter().map(|p| p.ty.clone()).collect(),
            return_type: function.ret.clone(),
            requires_instance: function.has_self,
            unit: Arc::clone(unit),
            index,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module or struct declaring the function; `None` for free functions.
    pub fn declaring_type(&self) -> Option<&str> {
        self.declaring_type.as_deref()
    }

    pub fn qualified_name(&self) -> String {
        match &self.declaring_type {
            Some(ty) => format!("{}.{}", ty, self.name),
            None => self.name.clone(),
        }
    }

    pub fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }

    pub fn parameter_types(&self) -> &[Type] {
        &self.parameter_types
    }

    pub fn return_type(&self) -> &Type {
        &self.return_type
    }

    /// Needs a receiver; never true for listed entry points.
    pub fn requires_instance(&self) -> bool {
        self.requires_instance
    }

    pub fn unit(&self) -> &Arc<CompiledUnit> {
        &self.unit
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Debug for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPoint")
            .field("name", &self.qualified_name())
            .field("parameter_types", &self.parameter_types)
            .field("return_type", &self.return_type)
            .field("requires_instance", &self.requires_instance)
            .field("unit", &self.unit.id())
            .finish()
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.qualified_name())?;
        for (i, (name, ty)) in self.parameter_names.iter().zip(&self.parameter_types).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, ty)?;
        }
        write!(f, ") -> {}", self.return_type)
    }
}

/// Public functions callable without an instance, in declaration order.
///
/// Signatures are not filtered here; whether an entry point can be adapted is
/// decided by `SignatureValidator`.
pub fn list_entry_points(unit: Option<&Arc<CompiledUnit>>) -> Result<Vec<EntryPoint>, PreconditionError> {
    let unit = unit.ok_or(PreconditionError::MissingUnit)?;
    let entries = unit
        .functions()
        .iter()
        .enumerate()
        .filter(|(_, f)| f.is_pub && !f.has_self)
        .filter_map(|(index, _)| EntryPoint::new(unit, index))
        .collect();
    Ok(entries)
}

/// Describe any function of the unit by qualified name, listed or not.
pub fn describe(unit: &Arc<CompiledUnit>, qualified_name: &str) -> Option<EntryPoint> {
    unit.find(qualified_name)
        .and_then(|index| EntryPoint::new(unit, index))
}
