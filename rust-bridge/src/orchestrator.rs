// Compilation orchestration: resolve references, run the backend, and turn the
// outcome into a `CompilationResult`.

use crate::error::PreconditionError;
use crate::resolver::{ReferenceResolver, SkippedReference};
use crate::rules::RuleRegistry;
use snippet_compiler::diagnostic::codes;
use snippet_compiler::{
    CompileRequest, CompiledUnit, CompilerBackend, CompilerConfig, Diagnostic, Library,
    ModuleLoader, Position, SnippetBackend,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of one compilation.
///
/// `success()` holds exactly when a unit is present, and then `diagnostics()`
/// is empty. A failed result always carries at least one diagnostic.
#[derive(Debug, Clone)]
pub struct CompilationResult {
    unit: Option<Arc<CompiledUnit>>,
    diagnostics: Vec<String>,
    warnings: Vec<String>,
    references: Vec<String>,
    skipped: Vec<SkippedReference>,
}

impl CompilationResult {
    pub fn success(&self) -> bool {
        self.unit.is_some()
    }

    pub fn unit(&self) -> Option<&Arc<CompiledUnit>> {
        self.unit.as_ref()
    }

    pub fn into_unit(self) -> Option<Arc<CompiledUnit>> {
        self.unit
    }

    /// `Error (<code>): <message> at line <N>` lines, in source order.
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    /// Diagnostics joined with newlines.
    pub fn error_report(&self) -> String {
        self.diagnostics.join("\n")
    }

    /// Warnings that did not fail the compilation.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Modules the snippet was compiled against.
    pub fn references(&self) -> &[String] {
        &self.references
    }

    pub fn skipped(&self) -> &[SkippedReference] {
        &self.skipped
    }
}

/// Builder for [`CompilationOrchestrator`]
///
/// Every collaborator is optional: the standard library, the snippet backend,
/// built-in detection rules and default configuration are used otherwise.
#[derive(Default)]
pub struct OrchestratorBuilder {
    config: Option<CompilerConfig>,
    loader: Option<Arc<dyn ModuleLoader>>,
    backend: Option<Arc<dyn CompilerBackend>>,
    rules: Option<Arc<RuleRegistry>>,
}

impl OrchestratorBuilder {
    pub fn config(mut self, config: CompilerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn CompilerBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Share a rule registry, e.g. between several orchestrators.
    pub fn rules(mut self, rules: Arc<RuleRegistry>) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn build(self) -> CompilationOrchestrator {
        let loader: Arc<dyn ModuleLoader> = match self.loader {
            Some(loader) => loader,
            None => Arc::new(Library::standard()),
        };
        let backend: Arc<dyn CompilerBackend> = match self.backend {
            Some(backend) => backend,
            None => Arc::new(SnippetBackend),
        };
        let rules = self
            .rules
            .unwrap_or_else(|| Arc::new(RuleRegistry::builtin()));

        CompilationOrchestrator {
            config: self.config.unwrap_or_default(),
            resolver: ReferenceResolver::new(Arc::clone(&rules), loader),
            rules,
            backend,
        }
    }
}

/// Compiles snippets into shareable units.
///
/// Holds no per-compilation state, so one orchestrator may compile different
/// snippets from several threads at once.
pub struct CompilationOrchestrator {
    config: CompilerConfig,
    rules: Arc<RuleRegistry>,
    resolver: ReferenceResolver,
    backend: Arc<dyn CompilerBackend>,
}

impl Default for CompilationOrchestrator {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl CompilationOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn resolver(&self) -> &ReferenceResolver {
        &self.resolver
    }

    /// Add detection rules for `module`. Affects every later compilation,
    /// including ones already running on other threads.
    pub fn register_rule(&self, module: &str, namespace: &str, type_patterns: &[&str]) {
        self.rules.register(module, namespace, type_patterns);
    }

    pub fn compile(&self, source: &str) -> Result<CompilationResult, PreconditionError> {
        if source.trim().is_empty() {
            return Err(PreconditionError::EmptySource);
        }

        let references = self.resolver.resolve(source)?;
        let modules = references.modules();
        let output = self.backend.compile(CompileRequest {
            source,
            references: &modules,
            options: &self.config,
        });

        let (errors, warnings): (Vec<&Diagnostic>, Vec<&Diagnostic>) =
            output.diagnostics.iter().partition(|d| d.is_error());
        let warnings: Vec<String> = warnings.iter().map(ToString::to_string).collect();
        let references_used: Vec<String> = references.names().into_iter().map(str::to_string).collect();
        let skipped = references.skipped().to_vec();

        let result = match output.unit {
            Some(unit) if errors.is_empty() => {
                info!(unit = unit.id(), functions = unit.functions().len(), "snippet compiled");
                CompilationResult {
                    unit: Some(Arc::new(unit)),
                    diagnostics: Vec::new(),
                    warnings,
                    references: references_used,
                    skipped,
                }
            }
            _ => {
                let mut diagnostics: Vec<String> = errors.iter().map(ToString::to_string).collect();
                if diagnostics.is_empty() {
                    let fallback = Diagnostic::error(
                        codes::COMPILATION_FAILED,
                        "Compilation failed without reporting a diagnostic.",
                        Position::default(),
                    );
                    diagnostics.push(fallback.to_string());
                }
                debug!(errors = diagnostics.len(), "snippet failed to compile");
                CompilationResult {
                    unit: None,
                    diagnostics,
                    warnings,
                    references: references_used,
                    skipped,
                }
            }
        };
        Ok(result)
    }

    /// Read `path` and compile its contents.
    pub fn compile_from_path(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<CompilationResult, PreconditionError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(PreconditionError::EmptyPath);
        }
        if !path.is_file() {
            return Err(PreconditionError::NotFound(path.to_path_buf()));
        }

        let source = fs::read_to_string(path).map_err(|source| PreconditionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), bytes = source.len(), "read snippet file");
        self.compile(&source)
    }
}
