// Compiler backend seam and the snippet language implementation of it.

use crate::checker;
use crate::config::CompilerConfig;
use crate::diagnostic::{Diagnostic, Severity};
use crate::library::LibraryModule;
use crate::parser;
use crate::unit::CompiledUnit;
use std::sync::Arc;
use tracing::debug;

/// One compilation: source plus every module it may use, emitted in memory.
pub struct CompileRequest<'a> {
    pub source: &'a str,
    pub references: &'a [Arc<LibraryModule>],
    pub options: &'a CompilerConfig,
}

/// A unit on success; diagnostics in source order either way.
#[derive(Debug)]
pub struct BackendOutput {
    pub unit: Option<CompiledUnit>,
    pub diagnostics: Vec<Diagnostic>,
}

impl BackendOutput {
    pub fn succeeded(&self) -> bool {
        self.unit.is_some()
    }
}

pub trait CompilerBackend: Send + Sync {
    fn compile(&self, request: CompileRequest<'_>) -> BackendOutput;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SnippetBackend;

impl CompilerBackend for SnippetBackend {
    fn compile(&self, request: CompileRequest<'_>) -> BackendOutput {
        let (file, mut diagnostics) = parser::parse(request.source);
        debug!(
            uses = file.uses.len(),
            items = file.items.len(),
            errors = diagnostics.len(),
            "parsed snippet"
        );

        // Name resolution on a broken tree only produces noise
        let checked = if diagnostics.is_empty() {
            let (checked, found) = checker::check(&file, request.references);
            diagnostics.extend(found);
            Some(checked)
        } else {
            None
        };

        for diagnostic in &mut diagnostics {
            if diagnostic.severity == Severity::Warning && request.options.escalates(diagnostic.code) {
                diagnostic.escalated = true;
            }
        }
        diagnostics.sort_by_key(|d| d.position);

        let failed = diagnostics.iter().any(Diagnostic::is_error);
        let unit = match checked {
            Some(checked) if !failed => {
                let references = request.references.iter().map(|m| m.name().to_string()).collect();
                Some(CompiledUnit::new(checked, references, request.options.max_call_depth))
            }
            _ => None,
        };

        debug!(
            success = unit.is_some(),
            diagnostics = diagnostics.len(),
            "compiled snippet"
        );
        BackendOutput { unit, diagnostics }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::codes;
    use crate::library::{Library, ModuleLoader};
    use crate::value::Value;

    fn compile(source: &str, options: &CompilerConfig) -> BackendOutput {
        let library = Library::standard();
        let references: Vec<_> = ["std", "text"]
            .iter()
            .map(|name| library.load(name).unwrap())
            .collect();
        SnippetBackend.compile(CompileRequest {
            source,
            references: &references,
            options,
        })
    }

    #[test]
    fn successful_compile_yields_an_invocable_unit() {
        let output = compile(
            "module M { pub fn twice(s: string) -> string { return s + s; } }",
            &CompilerConfig::default(),
        );
        assert!(output.succeeded());
        let unit = output.unit.unwrap();
        assert_eq!(unit.references(), ["std", "text"]);

        let index = unit.find("M.twice").unwrap();
        assert_eq!(unit.invoke(index, &[Value::from("ab")]).unwrap(), Value::from("abab"));
        assert_eq!(
            unit.invoke(index, &[]).unwrap_err().message(),
            "Parameter count mismatch."
        );
    }

    #[test]
    fn parse_errors_skip_checking() {
        // `missing` would be SN0103 if the checker ran
        let output = compile(
            "pub fn f() -> i32 { return missing }",
            &CompilerConfig::default(),
        );
        let found: Vec<_> = output.diagnostics.iter().map(|d| d.code).collect();
        assert_eq!(found, vec![codes::SEMICOLON_EXPECTED]);
        assert!(output.unit.is_none());
    }

    #[test]
    fn escalated_warnings_fail_the_compile() {
        let source = "pub fn f() -> i32 { let x = 1; return 2; }";
        assert!(compile(source, &CompilerConfig::default()).succeeded());

        let strict = CompilerConfig {
            warnings_as_errors: true,
            ..CompilerConfig::default()
        };
        let output = compile(source, &strict);
        assert!(!output.succeeded());
        assert!(output.diagnostics[0].escalated);
        assert!(output.diagnostics[0].is_error());
    }
}
