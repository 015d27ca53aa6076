// Detection rules: which library module a snippet needs, keyed by module name.

use parking_lot::RwLock;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

type Test = dyn Fn(&str) -> bool + Send + Sync;

/// A named test over the whole snippet text.
#[derive(Clone)]
pub struct Predicate {
    description: String,
    test: Arc<Test>,
}

impl Predicate {
    pub fn new<F>(description: impl Into<String>, test: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            test: Arc::new(test),
        }
    }

    /// Predicate that is true when `pattern` matches anywhere in the text.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(pattern)?;
        Ok(Self::new(pattern, move |text| regex.is_match(text)))
    }

    /// Case-insensitive whole-word match of a literal type or API name.
    pub fn word(name: &str) -> Result<Self, regex::Error> {
        Self::regex(&format!(r"(?i)\b{}\b", regex::escape(name)))
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn matches(&self, text: &str) -> bool {
        (self.test)(text)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Predicate").field(&self.description).finish()
    }
}

#[derive(Debug, Clone)]
pub enum DetectionRule {
    /// Matches `use` declarations whose path starts with this namespace.
    Namespace { prefix: String },
    /// Runs over the entire snippet text.
    Pattern(Predicate),
}

impl DetectionRule {
    pub fn namespace(prefix: impl Into<String>) -> Self {
        DetectionRule::Namespace {
            prefix: prefix.into(),
        }
    }
}

/// Module name -> ordered detection rules.
///
/// Shared by every resolver of an orchestrator. Rules are only ever added, so
/// a resolution racing a registration either sees the new rule or it doesn't.
pub struct RuleRegistry {
    rules: RwLock<BTreeMap<String, Vec<DetectionRule>>>,
}

// Bundled modules outside the base set: (module, namespace, qualifier).
const BUILTIN: &[(&str, &str, &str)] = &[
    ("math", "Std.Math", "Math"),
    ("regex", "Std.Text.Regex", "Regex"),
    ("time", "Std.Time", "Time"),
    ("uuid", "Std.Uuid", "Uuid"),
    ("json", "Std.Json", "Json"),
    ("io", "Std.Io", "Io"),
];

impl RuleRegistry {
    pub fn empty() -> Self {
        Self {
            rules: RwLock::new(BTreeMap::new()),
        }
    }

    /// Rules for every bundled library module: its namespace, plus a
    /// case-insensitive `Qualifier.` pattern for qualified calls.
    pub fn builtin() -> Self {
        let registry = Self::empty();
        for (module, namespace, qualifier) in BUILTIN {
            registry.add(module, DetectionRule::namespace(*namespace));
            match Predicate::regex(&format!(r"(?i)\b{}\s*\.", qualifier)) {
                Ok(pattern) => registry.add(module, DetectionRule::Pattern(pattern)),
                Err(e) => warn!(module, error = %e, "skipping built-in detection pattern"),
            }
        }
        registry
    }

    /// Append one rule to `module`'s list, creating the list if needed.
    pub fn add(&self, module: &str, rule: DetectionRule) {
        self.rules
            .write()
            .entry(module.to_string())
            .or_default()
            .push(rule);
    }

    /// Namespace rule plus one whole-word predicate per type pattern.
    pub fn register(&self, module: &str, namespace: &str, type_patterns: &[&str]) {
        let mut added = vec![DetectionRule::namespace(namespace)];
        for pattern in type_patterns {
            match Predicate::word(pattern) {
                Ok(predicate) => added.push(DetectionRule::Pattern(predicate)),
                Err(e) => warn!(module, pattern, error = %e, "skipping detection pattern"),
            }
        }

        debug!(module, namespace, rules = added.len(), "registering detection rules");
        self.rules
            .write()
            .entry(module.to_string())
            .or_default()
            .extend(added);
    }

    pub fn modules(&self) -> Vec<String> {
        self.rules.read().keys().cloned().collect()
    }

    pub fn rules_for(&self, module: &str) -> Vec<DetectionRule> {
        self.rules.read().get(module).cloned().unwrap_or_default()
    }

    /// Copy of the whole registry. Predicates are shared, not cloned.
    pub(crate) fn snapshot(&self) -> Vec<(String, Vec<DetectionRule>)> {
        self.rules
            .read()
            .iter()
            .map(|(module, rules)| (module.clone(), rules.clone()))
            .collect()
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_rules_cover_every_optional_module() {
        let registry = RuleRegistry::builtin();
        assert_eq!(registry.modules(), vec!["io", "json", "math", "regex", "time", "uuid"]);
        assert!(matches!(
            registry.rules_for("regex")[0],
            DetectionRule::Namespace { ref prefix } if prefix == "Std.Text.Regex"
        ));
    }

    #[test]
    fn word_predicates_are_case_insensitive_and_bounded() {
        let predicate = Predicate::word("Matrix").unwrap();
        assert!(predicate.matches("let m = matrix.identity();"));
        assert!(!predicate.matches("let m = matrices;"));
        assert!(Predicate::word("a+b").unwrap().matches("x a+b y"));
    }

    #[test]
    fn register_appends_to_existing_lists() {
        let registry = RuleRegistry::builtin();
        registry.register("math", "Ext.Linear", &["Vector", "Matrix"]);
        assert_eq!(registry.rules_for("math").len(), 5);

        registry.register("geo", "Ext.Geo", &[]);
        assert_eq!(registry.rules_for("geo").len(), 1);
    }
}
