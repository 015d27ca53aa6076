// Reference resolution: decide which library modules a snippet needs before
// it is compiled.
//
// Three independent detection layers feed one candidate set:
//   1. `use` declarations, matched against namespace rules
//   2. pattern rules, run over the whole text
//   3. a fixed inference table of characteristic type names
// The base modules are always added. Every candidate is then loaded through
// the module loader. Any other module that fails to load is skipped; a base
// module that fails to load stops resolution.

use crate::error::PreconditionError;
use crate::rules::{DetectionRule, RuleRegistry};
use regex::Regex;
use snippet_compiler::{LibraryModule, ModuleLoader};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace, warn};

/// Modules every snippet is compiled against. A loader that cannot provide
/// one of them fails every compilation with `BaseModuleUnavailable`.
pub const BASE_MODULES: &[&str] = &["std", "text"];

// Characteristic type names -> module providing them.
const INFERENCE: &[(&str, &[&str])] = &[
    ("time", &["datetime", "duration", "stopwatch"]),
    ("uuid", &["uuid", "guid"]),
    ("regex", &["regex", "captures"]),
    ("io", &["stream", "reader", "writer"]),
];

static INFERENCE_PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();

fn inference_patterns() -> &'static [(&'static str, Regex)] {
    INFERENCE_PATTERNS.get_or_init(|| {
        INFERENCE
            .iter()
            .filter_map(|(module, names)| {
                let pattern = format!(r"(?i)\b(?:{})\b", names.join("|"));
                Regex::new(&pattern).ok().map(|regex| (*module, regex))
            })
            .collect()
    })
}

/// A module that was detected but could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedReference {
    pub module: String,
    pub reason: String,
}

/// Loaded modules for one compilation, keyed by name.
#[derive(Clone, Default)]
pub struct ReferenceSet {
    modules: BTreeMap<String, Arc<LibraryModule>>,
    skipped: Vec<SkippedReference>,
}

impl ReferenceSet {
    /// Module names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.modules.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, module: &str) -> bool {
        self.modules.contains_key(module)
    }

    pub fn modules(&self) -> Vec<Arc<LibraryModule>> {
        self.modules.values().cloned().collect()
    }

    /// Detected modules the loader refused, in detection order.
    pub fn skipped(&self) -> &[SkippedReference] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl fmt::Debug for ReferenceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceSet")
            .field("modules", &self.names())
            .field("skipped", &self.skipped)
            .finish()
    }
}

#[derive(Clone)]
pub struct ReferenceResolver {
    rules: Arc<RuleRegistry>,
    loader: Arc<dyn ModuleLoader>,
}

impl ReferenceResolver {
    pub fn new(rules: Arc<RuleRegistry>, loader: Arc<dyn ModuleLoader>) -> Self {
        Self { rules, loader }
    }

    /// Module names the snippet needs, base set included. Does not load anything.
    pub fn detect(&self, source: &str) -> BTreeSet<String> {
        let mut found: BTreeSet<String> = BASE_MODULES.iter().map(|m| m.to_string()).collect();
        let imports = declared_imports(source);

        // Evaluated on a snapshot so predicates never run under the registry lock
        for (module, rules) in self.rules.snapshot() {
            let hit = rules.iter().find(|rule| match rule {
                DetectionRule::Namespace { prefix } => {
                    imports.iter().any(|path| namespace_matches(path, prefix))
                }
                DetectionRule::Pattern(predicate) => predicate.matches(source),
            });
            if let Some(rule) = hit {
                trace!(module = %module, ?rule, "detection rule matched");
                found.insert(module);
            }
        }

        for (module, pattern) in inference_patterns() {
            if pattern.is_match(source) {
                trace!(module, "type name inferred module");
                found.insert(module.to_string());
            }
        }

        found
    }

    /// Detect and load. Refused modules land in `skipped()`, except base
    /// modules, which are required.
    pub fn resolve(&self, source: &str) -> Result<ReferenceSet, PreconditionError> {
        let mut set = ReferenceSet::default();
        for module in self.detect(source) {
            match self.loader.load(&module) {
                Ok(loaded) => {
                    set.modules.insert(module, loaded);
                }
                Err(e) if BASE_MODULES.contains(&module.as_str()) => {
                    warn!(module = %module, error = %e, "base module unavailable");
                    return Err(PreconditionError::BaseModuleUnavailable {
                        module,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!(module = %module, error = %e, "skipping unresolved reference");
                    set.skipped.push(SkippedReference {
                        module,
                        reason: e.to_string(),
                    });
                }
            }
        }

        debug!(modules = ?set.names(), skipped = set.skipped.len(), "resolved references");
        Ok(set)
    }
}

/// Paths of every `use <path>;` declaration, scanned line by line.
/// A declaration without its terminating `;` on the same line is ignored.
pub fn declared_imports(source: &str) -> Vec<String> {
    let mut imports = Vec::new();
    for line in source.lines() {
        let code = line.split("//").next().unwrap_or_default();
        let mut statements: Vec<&str> = code.split(';').collect();
        statements.pop();

        for statement in statements {
            let statement = statement.trim();
            let Some(rest) = statement.strip_prefix("use") else {
                continue;
            };
            if !rest.starts_with(char::is_whitespace) {
                continue;
            }
            let path: String = rest.split_whitespace().collect();
            if !path.is_empty() {
                imports.push(path);
            }
        }
    }
    imports
}

/// `Std.Text.Regex` matches the prefixes `Std.Text.Regex` and `Std.Text`, not `Std.Te`.
fn namespace_matches(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}
