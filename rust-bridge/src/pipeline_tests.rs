//! End-to-end tests for the snippet pipeline
//!
//! Source text goes through reference resolution, compilation, entry point
//! discovery, validation, adaptation and guarded invocation, using the
//! standard library and the bundled snippet backend.

use super::*;
use snippet_compiler::fault::DIVIDE_BY_ZERO;
use snippet_compiler::{Library, LibraryModule, LoadError, ModuleLoader};
use std::sync::Arc;

const CALCULATOR: &str = "module Snippet {\n\
    pub fn add(a: i32, b: i32) -> i32 {\n\
        return a + b;\n\
    }\n\
\n\
    pub fn get_message() -> string {\n\
        return \"Hello from a snippet\";\n\
    }\n\
}\n";

fn compile_ok(orchestrator: &CompilationOrchestrator, source: &str) -> Arc<CompiledUnit> {
    let result = orchestrator.compile(source).unwrap();
    assert!(result.success(), "compile failed:\n{}", result.error_report());
    result.into_unit().unwrap()
}

fn entry(unit: &Arc<CompiledUnit>, name: &str) -> EntryPoint {
    list_entry_points(Some(unit))
        .unwrap()
        .into_iter()
        .find(|e| e.name() == name)
        .unwrap_or_else(|| panic!("no entry point named {}", name))
}

fn seventeen_parameters() -> String {
    let params: Vec<String> = (0..17).map(|i| format!("p{}: i32", i)).collect();
    format!(
        "module Wide {{\n    pub fn wide({}) -> i32 {{ return p0; }}\n    pub fn narrow() -> i32 {{ return 1; }}\n}}",
        params.join(", ")
    )
}

/// Loader that refuses one module and serves the rest from a library.
struct RefusingLoader {
    refused: &'static str,
    library: Library,
}

impl ModuleLoader for RefusingLoader {
    fn load(&self, name: &str) -> Result<Arc<LibraryModule>, LoadError> {
        if name == self.refused {
            return Err(LoadError::Unavailable {
                name: name.to_string(),
                reason: "disabled for this host".to_string(),
            });
        }
        self.library.load(name)
    }
}

// ============================================================================
// Reference Resolution
// ============================================================================

#[cfg(test)]
mod reference_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_snippet_compiles_against_base_set_only() {
        let result = CompilationOrchestrator::new().compile(CALCULATOR).unwrap();
        assert!(result.success());
        assert_eq!(result.references(), ["std", "text"]);
    }

    #[test]
    fn test_registered_rule_is_always_picked_up() {
        let library = Library::standard();
        library.register(
            LibraryModule::builder("geo", "Ext.Geo")
                .function("area", &[Type::F64, Type::F64], Type::F64, |args| {
                    let w = args[0].as_f64().unwrap_or_default();
                    let h = args[1].as_f64().unwrap_or_default();
                    Ok(Value::F64(w * h))
                })
                .build(),
        );
        let orchestrator = CompilationOrchestrator::builder()
            .loader(Arc::new(library))
            .build();

        let source = "use Ext.Geo;\n// polygon helpers\nmodule Shapes { pub fn rect(w: f64, h: f64) -> f64 { return area(w, h); } }";
        let before = orchestrator.resolver().detect("let shape = Polygon;");
        assert!(!before.contains("geo"));

        orchestrator.register_rule("geo", "Ext.Geo", &["Polygon"]);
        assert!(orchestrator.resolver().detect("let shape = Polygon;").contains("geo"));

        let unit = compile_ok(&orchestrator, source);
        let rect = adapt(&entry(&unit, "rect")).unwrap();
        assert_eq!(
            invoke(&rect, &[Value::F64(2.0), Value::F64(3.5)]).value(),
            Some(&Value::F64(7.0))
        );
    }

    #[test]
    fn test_refused_module_is_skipped_not_fatal() {
        let orchestrator = CompilationOrchestrator::builder()
            .loader(Arc::new(RefusingLoader {
                refused: "math",
                library: Library::standard(),
            }))
            .build();

        let result = orchestrator
            .compile("module M { pub fn root(x: f64) -> f64 { return Math.sqrt(x); } }")
            .unwrap();

        assert!(!result.success());
        assert_eq!(result.skipped().len(), 1);
        assert_eq!(result.skipped()[0].module, "math");
        assert!(result.diagnostics()[0].starts_with("Error (SN0234):"));
    }

    #[test]
    fn test_refused_base_module_fails_the_compile() {
        for &base in BASE_MODULES {
            let orchestrator = CompilationOrchestrator::builder()
                .loader(Arc::new(RefusingLoader {
                    refused: base,
                    library: Library::standard(),
                }))
                .build();

            match orchestrator.compile(CALCULATOR) {
                Err(PreconditionError::BaseModuleUnavailable { module, reason }) => {
                    assert_eq!(module, base);
                    assert!(reason.contains("disabled for this host"), "{}", reason);
                }
                other => panic!("expected a base module failure, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_detected_modules_make_their_api_available() {
        let unit = compile_ok(
            &CompilationOrchestrator::new(),
            "module M { pub fn hyp(a: f64, b: f64) -> f64 { return Math.sqrt(a * a + b * b); } }",
        );
        assert!(unit.references().iter().any(|r| r == "math"));
        let hyp = adapt(&entry(&unit, "hyp")).unwrap();
        assert_eq!(
            invoke(&hyp, &[Value::F64(3.0), Value::F64(4.0)]).into_value(),
            Some(Value::F64(5.0))
        );
    }
}

// ============================================================================
// Compilation
// ============================================================================

#[cfg(test)]
mod compile_tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_empty_source_is_a_precondition_error() {
        let orchestrator = CompilationOrchestrator::new();
        for source in ["", "   ", "\n\t\n"] {
            assert!(matches!(
                orchestrator.compile(source),
                Err(PreconditionError::EmptySource)
            ));
        }
    }

    #[test]
    fn test_missing_semicolon_reports_the_defective_line() {
        let source = "module M {\n    pub fn f() -> i32 {\n        let x = 1\n        return x;\n    }\n}";
        let result = CompilationOrchestrator::new().compile(source).unwrap();

        assert!(!result.success());
        assert!(result.unit().is_none());
        assert_eq!(result.diagnostics(), ["Error (SN1002): ; expected at line 3"]);
        assert_eq!(result.error_report(), "Error (SN1002): ; expected at line 3");
    }

    #[test]
    fn test_overly_nested_expressions_fail_as_data() {
        let orchestrator = CompilationOrchestrator::new();
        let parens = format!(
            "module M {{ pub fn f() -> i32 {{ return {}1{}; }} }}",
            "(".repeat(300),
            ")".repeat(300)
        );
        let chain = format!("module M {{ pub fn f() -> i32 {{ return 0{}; }} }}", " + 1".repeat(500));

        for source in [parens, chain] {
            let result = orchestrator.compile(&source).unwrap();
            assert!(!result.success());
            assert_eq!(
                result.diagnostics(),
                ["Error (SN8078): Expression is too long or complex to compile at line 1"]
            );
        }
    }

    #[test]
    fn test_long_expressions_below_the_limit_still_run() {
        let source = format!("module M {{ pub fn f() -> i32 {{ return 0{}; }} }}", " + 1".repeat(100));
        let unit = compile_ok(&CompilationOrchestrator::new(), &source);
        let f = adapt(&entry(&unit, "f")).unwrap();
        assert_eq!(invoke(&f, &[]).into_value(), Some(Value::I32(100)));
    }

    #[test]
    fn test_report_keeps_errors_in_source_order() {
        let source = "module M {\n    pub fn f() -> i32 { return missing; }\n    pub fn g() -> string { return 1; }\n}";
        let result = CompilationOrchestrator::new().compile(source).unwrap();

        let report = result.error_report();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Error (SN0103):") && lines[0].ends_with("at line 2"));
        assert!(lines[1].starts_with("Error (SN0029):") && lines[1].ends_with("at line 3"));
    }

    #[test]
    fn test_warnings_only_fail_when_escalated() {
        let source = "module M { pub fn f() -> i32 { let unused = 1; return 2; } }";

        let relaxed = CompilationOrchestrator::new().compile(source).unwrap();
        assert!(relaxed.success());
        assert!(relaxed.diagnostics().is_empty());
        assert_eq!(relaxed.warnings().len(), 1);

        let strict = CompilationOrchestrator::builder()
            .config(CompilerConfig {
                escalated_warnings: vec!["SN0168".to_string()],
                ..CompilerConfig::default()
            })
            .build()
            .compile(source)
            .unwrap();
        assert!(!strict.success());
        assert!(strict.diagnostics()[0].starts_with("Error (SN0168):"));
        assert!(strict.warnings().is_empty());
    }

    #[test]
    fn test_compile_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CALCULATOR.as_bytes()).unwrap();

        let orchestrator = CompilationOrchestrator::new();
        let result = orchestrator.compile_from_path(file.path()).unwrap();
        assert!(result.success());

        assert!(matches!(
            orchestrator.compile_from_path(""),
            Err(PreconditionError::EmptyPath)
        ));
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            orchestrator.compile_from_path(dir.path().join("missing.snip")),
            Err(PreconditionError::NotFound(_))
        ));
    }

    #[test]
    fn test_concurrent_compilations_share_one_orchestrator() {
        let orchestrator = CompilationOrchestrator::new();
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|i| {
                    let orchestrator = &orchestrator;
                    scope.spawn(move || {
                        let source = format!("module M{} {{ pub fn f() -> i32 {{ return {}; }} }}", i, i);
                        let unit = compile_ok(orchestrator, &source);
                        invoke(&adapt(&entry(&unit, "f")).unwrap(), &[]).into_value()
                    })
                })
                .collect();
            for (i, handle) in handles.into_iter().enumerate() {
                assert_eq!(handle.join().unwrap(), Some(Value::I32(i as i32)));
            }
        });
    }
}

// ============================================================================
// Entry Points and Validation
// ============================================================================

#[cfg(test)]
mod catalog_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_catalog_lists_public_stateless_functions_in_order() {
        let unit = compile_ok(&CompilationOrchestrator::new(), CALCULATOR);
        let entries = list_entry_points(Some(&unit)).unwrap();

        let names: Vec<String> = entries.iter().map(EntryPoint::qualified_name).collect();
        assert_eq!(names, vec!["Snippet.add", "Snippet.get_message"]);
        assert_eq!(entries[0].parameter_types(), [Type::I32, Type::I32]);
        assert_eq!(entries[0].return_type(), &Type::I32);
        assert!(entries[1].parameter_types().is_empty());
        assert_eq!(entries[1].to_string(), "Snippet.get_message() -> string");

        let again: Vec<String> = list_entry_points(Some(&unit))
            .unwrap()
            .iter()
            .map(EntryPoint::qualified_name)
            .collect();
        assert_eq!(again, names);
    }

    #[test]
    fn test_catalog_skips_private_and_instance_functions() {
        let source = "struct Counter {\n\
                          count: i64,\n\
                          pub fn start() -> i64 { return 0; }\n\
                          pub fn next(self) -> i64 { return self.count + 1; }\n\
                          fn hidden() -> i64 { return 2; }\n\
                      }\n\
                      pub fn free(x: i64) -> i64 { return x; }";
        let unit = compile_ok(&CompilationOrchestrator::new(), source);
        let names: Vec<String> = list_entry_points(Some(&unit))
            .unwrap()
            .iter()
            .map(EntryPoint::qualified_name)
            .collect();
        assert_eq!(names, vec!["Counter.start", "free"]);

        let next = describe(&unit, "Counter.next").unwrap();
        assert!(next.requires_instance());
        assert_eq!(
            SignatureValidator.validate(&next).failure(),
            Some(&ValidationFailure::RequiresInstance)
        );
    }

    #[test]
    fn test_missing_unit_is_a_precondition_error() {
        assert!(matches!(
            list_entry_points(None),
            Err(PreconditionError::MissingUnit)
        ));
    }

    #[test]
    fn test_wide_function_is_listed_but_not_adaptable() {
        let unit = compile_ok(&CompilationOrchestrator::new(), &seventeen_parameters());
        let entries = list_entry_points(Some(&unit)).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].parameter_types().len(), 17);

        assert_eq!(
            adapt(&entries[0]).unwrap_err(),
            AdaptError::ArityExceeded {
                entry_point: "Wide.wide".to_string(),
                count: 17,
                max: 16,
            }
        );
        assert!(adapt(&entries[1]).is_ok());
    }

    #[test]
    fn test_validation_rules_apply_in_order() {
        let source = "module M {\n\
                          pub fn sum(xs: [i32]) -> i32 { return xs[0]; }\n\
                          pub fn log(message: string) { }\n\
                          pub fn pair(a: [i32]) -> [i32] { return a; }\n\
                          pub fn ok(d: f64, s: string, c: char) -> bool { return true; }\n\
                      }";
        let unit = compile_ok(&CompilationOrchestrator::new(), source);
        let validator = SignatureValidator;

        let reason = |name: &str| validator.validate(&entry(&unit, name)).reason();
        assert_eq!(reason("sum"), Some("parameter 'xs' has unsupported type '[i32]'".to_string()));
        assert_eq!(reason("log"), Some("return type 'unit' is not supported".to_string()));
        assert_eq!(reason("pair"), Some("return type '[i32]' is not supported".to_string()));
        assert_eq!(reason("ok"), None);

        assert!(matches!(
            adapt(&entry(&unit, "sum")),
            Err(AdaptError::UnsupportedShape { .. })
        ));
    }

    #[test]
    fn test_entry_points_serialize_without_their_unit() {
        let unit = compile_ok(&CompilationOrchestrator::new(), CALCULATOR);
        let json = serde_json::to_value(entry(&unit, "add")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "add",
                "declaring_type": "Snippet",
                "parameter_names": ["a", "b"],
                "parameter_types": ["i32", "i32"],
                "return_type": "i32",
                "requires_instance": false,
            })
        );
    }
}

// ============================================================================
// Adaptation and Guarded Invocation
// ============================================================================

#[cfg(test)]
mod invocation_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_add_and_message_round_trip() {
        let unit = compile_ok(&CompilationOrchestrator::new(), CALCULATOR);
        let add = adapt(&entry(&unit, "add")).unwrap();
        let message = adapt(&entry(&unit, "get_message")).unwrap();

        assert!(matches!(add, Callable::Fn2(_)));
        assert!(matches!(message, Callable::Fn0(_)));

        let sum = invoke(&add, &[Value::I32(10), Value::I32(5)]);
        assert!(sum.success());
        assert_eq!(sum.value(), Some(&Value::I32(15)));
        assert_eq!(sum.error_message(), "");

        let text = invoke(&message, &[]);
        assert_eq!(text.into_value(), Some(Value::from("Hello from a snippet")));
    }

    #[test]
    fn test_division_by_zero_is_reported_as_data() {
        let source = "module Calc {\n\
                          pub fn divide(a: i32, b: i32) -> i32 { return a / b; }\n\
                          pub fn checked(a: i32, b: i32) -> i32 {\n\
                              if b == 0 { throw \"Divisor must not be zero\"; }\n\
                              return a / b;\n\
                          }\n\
                      }";
        let unit = compile_ok(&CompilationOrchestrator::new(), source);

        let divide = adapt(&entry(&unit, "divide")).unwrap();
        let failed = invoke(&divide, &[Value::I32(10), Value::I32(0)]);
        assert!(!failed.success());
        assert!(failed.value().is_none());
        assert_eq!(failed.error_message(), DIVIDE_BY_ZERO);

        let checked = adapt(&entry(&unit, "checked")).unwrap();
        let failed = invoke(&checked, &[Value::I32(1), Value::I32(0)]);
        assert!(failed.error_message().contains("Divisor must not be zero"));
        assert_eq!(invoke(&checked, &[Value::I32(9), Value::I32(3)]).into_value(), Some(Value::I32(3)));
    }

    #[test]
    fn test_bad_arguments_fail_without_running() {
        let unit = compile_ok(&CompilationOrchestrator::new(), CALCULATOR);
        let add = adapt(&entry(&unit, "add")).unwrap();

        assert_eq!(invoke(&add, &[Value::I32(1)]).error_message(), "Parameter count mismatch.");
        assert_eq!(
            invoke(&add, &[Value::I32(1), Value::I64(2)]).error_message(),
            "Object of type 'i64' cannot be converted to type 'i32'."
        );
    }

    #[test]
    fn test_adapting_twice_gives_independent_callables() {
        let unit = compile_ok(&CompilationOrchestrator::new(), CALCULATOR);
        let add = entry(&unit, "add");
        let first = adapt(&add).unwrap();
        let second = adapt(&add).unwrap();
        drop(unit);

        for (a, b) in [(1, 2), (-7, 7), (i32::MAX, 0)] {
            let args = [Value::I32(a), Value::I32(b)];
            assert_eq!(invoke(&first, &args), invoke(&second, &args));
        }
        assert_eq!(
            invoke(&first, &[Value::I32(i32::MAX), Value::I32(1)]).error_message(),
            "Arithmetic operation resulted in an overflow."
        );
    }

    #[test]
    fn test_typed_adaptation_checks_the_requested_shape() {
        let unit = compile_ok(&CompilationOrchestrator::new(), CALCULATOR);
        let add = entry(&unit, "add");

        let typed = adapt_typed::<fn(i32, i32) -> i32>(&add).unwrap();
        assert_eq!(invoke_typed(&typed, (10, 5)).into_value(), Some(15));

        let message = adapt_typed::<fn() -> String>(&entry(&unit, "get_message")).unwrap();
        assert_eq!(
            invoke_typed(&message, ()).into_value().as_deref(),
            Some("Hello from a snippet")
        );

        assert_eq!(
            adapt_typed::<fn(i64, i64) -> i64>(&add).unwrap_err(),
            AdaptError::CastMismatch {
                entry_point: "Snippet.add".to_string(),
                requested: "fn(i64, i64) -> i64".to_string(),
                actual: "fn(i32, i32) -> i32".to_string(),
            }
        );
    }

    #[test]
    fn test_value_types_cross_the_boundary() {
        let source = "use Std.Time;\n\
                      module Clock {\n\
                          pub fn later(t: datetime, d: duration) -> datetime { return t + d; }\n\
                          pub fn same(id: uuid) -> uuid { return id; }\n\
                      }";
        let unit = compile_ok(&CompilationOrchestrator::new(), source);

        let later = adapt_typed::<fn(chrono::DateTime<chrono::Utc>, chrono::Duration) -> chrono::DateTime<chrono::Utc>>(
            &entry(&unit, "later"),
        )
        .unwrap();
        let start = chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let result = invoke_typed(&later, (start, chrono::Duration::seconds(90)));
        assert_eq!(result.into_value(), Some(start + chrono::Duration::seconds(90)));

        let same = adapt_typed::<fn(uuid::Uuid) -> uuid::Uuid>(&entry(&unit, "same")).unwrap();
        let id = uuid::Uuid::new_v4();
        assert_eq!(invoke_typed(&same, (id,)).into_value(), Some(id));
    }

    #[test]
    fn test_native_panics_are_contained() {
        let library = Library::standard();
        library.register(
            LibraryModule::builder("boom", "Ext.Boom")
                .function("explode", &[], Type::I32, |_| panic!("native code panicked"))
                .build(),
        );
        let orchestrator = CompilationOrchestrator::builder()
            .loader(Arc::new(library))
            .build();
        orchestrator.register_rule("boom", "Ext.Boom", &[]);

        let unit = compile_ok(
            &orchestrator,
            "use Ext.Boom;\nmodule M { pub fn f() -> i32 { return explode(); } }",
        );
        let result = invoke(&adapt(&entry(&unit, "f")).unwrap(), &[]);
        assert!(!result.success());
        assert_eq!(result.error_message(), "native code panicked");
    }

    #[test]
    fn test_remainder_overflow_faults_like_division() {
        let unit = compile_ok(
            &CompilationOrchestrator::new(),
            "module M {\n    pub fn d(a: i32, b: i32) -> i32 { return a / b; }\n    pub fn m(a: i32, b: i32) -> i32 { return a % b; }\n}",
        );
        let args = [Value::I32(i32::MIN), Value::I32(-1)];
        for name in ["d", "m"] {
            let callable = adapt(&entry(&unit, name)).unwrap();
            let result = invoke(&callable, &args);
            assert!(!result.success());
            assert_eq!(result.error_message(), "Arithmetic operation resulted in an overflow.");
        }
    }

    #[test]
    fn test_runaway_recursion_hits_the_depth_limit() {
        let orchestrator = CompilationOrchestrator::builder()
            .config(CompilerConfig {
                max_call_depth: 8,
                ..CompilerConfig::default()
            })
            .build();
        let unit = compile_ok(
            &orchestrator,
            "module R { pub fn down(n: i32) -> i32 { return R.down(n + 1); } }",
        );
        let result = invoke(&adapt(&entry(&unit, "down")).unwrap(), &[Value::I32(0)]);
        assert_eq!(result.error_message(), "Call depth exceeded the limit of 8 frames.");
    }
}
