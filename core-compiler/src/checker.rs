// Semantic checker: resolves names and types, then lowers the syntax tree to IR.
//
// Two passes. The declaration pass records every type, field and function
// signature so bodies can call forward. The body pass types each function body
// against those signatures and the referenced library modules.
//
// Checking functions return `None` once a diagnostic has been reported for the
// expression, so one mistake does not cascade into follow-up errors.

use crate::ast::{self, BinaryOp, ElseBranch, ExprKind, Item, TypeExpr, TypeKind, UnaryOp};
use crate::diagnostic::{Diagnostic, Position, codes};
use crate::ir::{self, Callee, Expr, Stmt};
use crate::library::{LibraryModule, NativeFn};
use crate::types::Type;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Lowered functions (declaration order) and struct layouts.
#[derive(Debug, Default)]
pub struct Checked {
    pub functions: Vec<ir::Function>,
    pub structs: Vec<ir::StructDef>,
}

/// Check `file` against the referenced `modules`.
pub fn check(file: &ast::SourceFile, modules: &[Arc<LibraryModule>]) -> (Checked, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();
    let cx = Context::declare(file, modules, &mut diagnostics);

    let mut functions = Vec::with_capacity(cx.signatures.len());
    let decls = file.items.iter().flat_map(|item| match item {
        Item::Function(f) => std::slice::from_ref(f),
        Item::Type(t) => t.functions.as_slice(),
    });
    for (index, decl) in decls.enumerate() {
        functions.push(BodyChecker::check_function(&cx, &mut diagnostics, index, decl));
    }

    let checked = Checked {
        functions,
        structs: cx.structs,
    };
    (checked, diagnostics)
}

// ----------------------------------------------------------------------
// Declarations
// ----------------------------------------------------------------------

struct TypeEntry {
    kind: TypeKind,
    functions: HashMap<String, usize>,
}

struct Signature {
    name: String,
    declaring_type: Option<String>,
    is_pub: bool,
    has_self: bool,
    params: Vec<ir::Param>,
    ret: Type,
    position: Position,
}

impl Signature {
    fn qualified_name(&self) -> String {
        match &self.declaring_type {
            Some(ty) => format!("{}.{}", ty, self.name),
            None => self.name.clone(),
        }
    }
}

struct Context<'a> {
    modules: &'a [Arc<LibraryModule>],
    // Namespaces whose functions are callable unqualified; `Std` is implicit
    namespaces: Vec<String>,
    types: HashMap<String, TypeEntry>,
    free_functions: HashMap<String, usize>,
    signatures: Vec<Signature>,
    structs: Vec<ir::StructDef>,
    struct_index: HashMap<String, usize>,
}

impl<'a> Context<'a> {
    fn declare(
        file: &ast::SourceFile,
        modules: &'a [Arc<LibraryModule>],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Self {
        let mut cx = Context {
            modules,
            namespaces: vec!["Std".to_string()],
            types: HashMap::new(),
            free_functions: HashMap::new(),
            signatures: Vec::new(),
            structs: Vec::new(),
            struct_index: HashMap::new(),
        };

        for decl in &file.uses {
            let dotted = decl.dotted();
            let nested = format!("{}.", dotted);
            let known = modules
                .iter()
                .any(|m| m.namespace() == dotted || m.namespace().starts_with(&nested));
            if !known {
                diagnostics.push(Diagnostic::error(
                    codes::MISSING_NAMESPACE,
                    missing_namespace_message(&decl.path),
                    decl.position,
                ));
            } else if !cx.namespaces.contains(&dotted) {
                cx.namespaces.push(dotted);
            }
        }

        let type_decls: Vec<&ast::TypeDecl> = file
            .items
            .iter()
            .filter_map(|item| match item {
                Item::Type(t) => Some(t),
                Item::Function(_) => None,
            })
            .collect();

        for decl in &type_decls {
            if cx.types.contains_key(&decl.name) {
                diagnostics.push(Diagnostic::error(
                    codes::DUPLICATE_MEMBER,
                    format!("The namespace already contains a definition for '{}'", decl.name),
                    decl.position,
                ));
                continue;
            }
            cx.types.insert(
                decl.name.clone(),
                TypeEntry {
                    kind: decl.kind,
                    functions: HashMap::new(),
                },
            );
        }

        // Field types may name any struct, so layouts are resolved after all names exist
        for decl in type_decls.iter().filter(|t| t.kind == TypeKind::Struct) {
            if cx.struct_index.contains_key(&decl.name) {
                continue;
            }
            let mut fields: Vec<ir::Param> = Vec::new();
            for field in &decl.fields {
                if fields.iter().any(|f| f.name == field.name) {
                    diagnostics.push(Diagnostic::error(
                        codes::DUPLICATE_MEMBER,
                        format!(
                            "The type '{}' already contains a definition for '{}'",
                            decl.name, field.name
                        ),
                        field.position,
                    ));
                    continue;
                }
                let ty = cx.resolve_type(&field.ty, diagnostics);
                fields.push(ir::Param {
                    name: field.name.clone(),
                    ty,
                });
            }
            cx.struct_index.insert(decl.name.clone(), cx.structs.len());
            cx.structs.push(ir::StructDef {
                name: decl.name.clone(),
                fields,
            });
        }

        for item in &file.items {
            match item {
                Item::Function(f) => {
                    let index = cx.declare_function(f, None, diagnostics);
                    if cx.free_functions.contains_key(&f.name) {
                        diagnostics.push(Diagnostic::error(
                            codes::DUPLICATE_MEMBER,
                            format!("The namespace already contains a definition for '{}'", f.name),
                            f.position,
                        ));
                    } else {
                        cx.free_functions.insert(f.name.clone(), index);
                    }
                }
                Item::Type(t) => {
                    for f in &t.functions {
                        let index = cx.declare_function(f, Some(t), diagnostics);
                        let Some(entry) = cx.types.get_mut(&t.name) else {
                            continue;
                        };
                        if entry.functions.contains_key(&f.name) {
                            diagnostics.push(Diagnostic::error(
                                codes::DUPLICATE_MEMBER,
                                format!("Type '{}' already defines a member called '{}'", t.name, f.name),
                                f.position,
                            ));
                        } else {
                            entry.functions.insert(f.name.clone(), index);
                        }
                    }
                }
            }
        }

        cx
    }

    fn declare_function(
        &mut self,
        decl: &ast::FnDecl,
        owner: Option<&ast::TypeDecl>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> usize {
        let in_struct = owner.is_some_and(|t| t.kind == TypeKind::Struct);
        if decl.has_self && !in_struct {
            diagnostics.push(Diagnostic::error(
                codes::SELF_OUTSIDE_METHOD,
                format!("'self' is not valid in '{}'; only struct methods take a receiver", decl.name),
                decl.position,
            ));
        }

        let params = decl
            .params
            .iter()
            .map(|p| ir::Param {
                name: p.name.clone(),
                ty: self.resolve_type(&p.ty, diagnostics),
            })
            .collect();
        let ret = match &decl.ret {
            Some(ty) => self.resolve_type(ty, diagnostics),
            None => Type::Unit,
        };

        self.signatures.push(Signature {
            name: decl.name.clone(),
            declaring_type: owner.map(|t| t.name.clone()),
            is_pub: decl.is_pub,
            has_self: decl.has_self && in_struct,
            params,
            ret,
            position: decl.position,
        });
        self.signatures.len() - 1
    }

    // Unresolvable types are reported and treated as `any` so checking can go on
    fn resolve_type(&self, ty: &TypeExpr, diagnostics: &mut Vec<Diagnostic>) -> Type {
        match ty {
            TypeExpr::List(inner, _) => Type::List(Box::new(self.resolve_type(inner, diagnostics))),
            TypeExpr::Named(name, position) => {
                if let Some(ty) = Type::from_keyword(name) {
                    if let Some(module) = ty.required_module() {
                        if !self.modules.iter().any(|m| m.name() == module) {
                            diagnostics.push(Diagnostic::error(
                                codes::UNKNOWN_TYPE,
                                format!(
                                    "The type '{}' could not be found (are you missing a reference to module '{}'?)",
                                    name, module
                                ),
                                *position,
                            ));
                        }
                    }
                    return ty;
                }
                if self
                    .types
                    .get(name)
                    .is_some_and(|t| t.kind == TypeKind::Struct)
                {
                    return Type::Struct(name.clone());
                }
                diagnostics.push(Diagnostic::error(
                    codes::UNKNOWN_TYPE,
                    format!("The type or namespace name '{}' could not be found", name),
                    *position,
                ));
                Type::Any
            }
        }
    }

    fn struct_def(&self, name: &str) -> Option<&ir::StructDef> {
        self.struct_index.get(name).map(|&i| &self.structs[i])
    }

    // `Math` resolves through the implicit `Std`, `Regex` through `use Std.Text;`
    fn module_for(&self, prefix: &str) -> Option<&Arc<LibraryModule>> {
        let exact = self.modules.iter().find(|m| m.namespace() == prefix);
        exact.or_else(|| {
            self.namespaces.iter().find_map(|ns| {
                let full = format!("{}.{}", ns, prefix);
                self.modules.iter().find(|m| m.namespace() == full)
            })
        })
    }

    fn visible_natives(&self, name: &str) -> Vec<(&str, Arc<NativeFn>)> {
        self.modules
            .iter()
            .filter(|m| self.namespaces.iter().any(|ns| ns == m.namespace()))
            .filter_map(|m| m.function(name).map(|f| (m.namespace(), f.clone())))
            .collect()
    }
}

fn missing_namespace_message(path: &[String]) -> String {
    match path.split_last() {
        Some((last, parent)) if !parent.is_empty() => format!(
            "The type or namespace name '{}' does not exist in the namespace '{}' (are you missing a module reference?)",
            last,
            parent.join(".")
        ),
        _ => format!(
            "The type or namespace name '{}' could not be found (are you missing a module reference?)",
            path.join(".")
        ),
    }
}

// ----------------------------------------------------------------------
// Function bodies
// ----------------------------------------------------------------------

struct Local {
    name: String,
    // `None` after a failed initialiser; reads are silently rejected
    ty: Option<Type>,
    position: Position,
    read: bool,
    is_let: bool,
}

struct BodyChecker<'c, 'a> {
    cx: &'c Context<'a>,
    diagnostics: &'c mut Vec<Diagnostic>,
    sig: &'c Signature,
    locals: Vec<Local>,
    scopes: Vec<Vec<usize>>,
}

impl<'c, 'a> BodyChecker<'c, 'a> {
    fn check_function(
        cx: &'c Context<'a>,
        diagnostics: &'c mut Vec<Diagnostic>,
        index: usize,
        decl: &ast::FnDecl,
    ) -> ir::Function {
        let sig = &cx.signatures[index];
        let mut checker = BodyChecker {
            cx,
            diagnostics,
            sig,
            locals: Vec::new(),
            scopes: vec![Vec::new()],
        };

        if sig.has_self {
            let ty = sig.declaring_type.clone().map(Type::Struct);
            checker.declare("self", ty, sig.position, false);
        }
        for (param, decl_param) in sig.params.iter().zip(&decl.params) {
            checker.declare(&param.name, Some(param.ty.clone()), decl_param.position, false);
        }

        let (body, terminates) = checker.block(&decl.body);

        if sig.ret != Type::Unit && !terminates {
            checker.error(
                codes::NOT_ALL_PATHS_RETURN,
                format!("'{}': not all code paths return a value", sig.qualified_name()),
                sig.position,
            );
        }

        let unused: Vec<(String, Position)> = checker
            .locals
            .iter()
            .filter(|l| l.is_let && !l.read && !l.name.starts_with('_'))
            .map(|l| (l.name.clone(), l.position))
            .collect();
        for (name, position) in unused {
            checker.diagnostics.push(Diagnostic::warning(
                codes::UNUSED_VARIABLE,
                format!("The variable '{}' is assigned but its value is never used", name),
                position,
            ));
        }

        ir::Function {
            name: sig.name.clone(),
            declaring_type: sig.declaring_type.clone(),
            is_pub: sig.is_pub,
            has_self: sig.has_self,
            params: sig.params.clone(),
            ret: sig.ret.clone(),
            slots: checker.locals.len(),
            body,
        }
    }

    fn error(&mut self, code: &'static str, message: impl Into<String>, position: Position) {
        self.diagnostics.push(Diagnostic::error(code, message, position));
    }

    fn fail<T>(&mut self, code: &'static str, message: impl Into<String>, position: Position) -> Option<T> {
        self.error(code, message, position);
        None
    }

    // ------------------------------------------------------------------
    // Locals
    // ------------------------------------------------------------------

    fn lookup(&self, name: &str) -> Option<usize> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .copied()
            .find(|&slot| self.locals[slot].name == name)
    }

    fn declare(&mut self, name: &str, ty: Option<Type>, position: Position, is_let: bool) -> usize {
        if self.lookup(name).is_some() {
            self.error(
                codes::DUPLICATE_LOCAL,
                format!(
                    "A local variable or parameter named '{}' is already defined in this scope",
                    name
                ),
                position,
            );
        }
        let slot = self.locals.len();
        self.locals.push(Local {
            name: name.to_string(),
            ty,
            position,
            read: false,
            is_let,
        });
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(slot);
        }
        slot
    }

    fn read_local(&mut self, slot: usize) -> Option<Expr> {
        let local = &mut self.locals[slot];
        local.read = true;
        let ty = local.ty.clone()?;
        Some(Expr {
            kind: ir::ExprKind::Local(slot),
            ty,
        })
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    // Returns the lowered statements and whether the block never falls through
    fn block(&mut self, block: &ast::Block) -> (Vec<Stmt>, bool) {
        self.scopes.push(Vec::new());
        let mut lowered = Vec::new();
        let mut terminated = false;
        let mut warned = false;

        for stmt in &block.stmts {
            if terminated && !warned {
                self.diagnostics.push(Diagnostic::warning(
                    codes::UNREACHABLE_CODE,
                    "Unreachable code detected",
                    stmt.position(),
                ));
                warned = true;
            }
            let (stmt, terminates) = self.stmt(stmt);
            lowered.extend(stmt);
            terminated |= terminates;
        }

        self.scopes.pop();
        (lowered, terminated)
    }

    fn stmt(&mut self, stmt: &ast::Stmt) -> (Option<Stmt>, bool) {
        match stmt {
            ast::Stmt::Let {
                name,
                ty,
                value,
                position,
            } => {
                let declared = ty
                    .as_ref()
                    .map(|t| self.cx.resolve_type(t, &mut *self.diagnostics));
                let value = match &declared {
                    Some(t) => self.expr_as(value, t),
                    None => self.expr(value, None),
                };
                let slot_ty = declared.or_else(|| value.as_ref().map(|v| v.ty.clone()));
                let slot = self.declare(name, slot_ty, *position, true);
                (value.map(|value| Stmt::Store { slot, value }), false)
            }
            ast::Stmt::Assign {
                name,
                value,
                position,
            } => {
                let Some(slot) = self.lookup(name) else {
                    self.error(
                        codes::UNKNOWN_NAME,
                        format!("The name '{}' does not exist in the current context", name),
                        *position,
                    );
                    return (None, false);
                };
                let Some(ty) = self.locals[slot].ty.clone() else {
                    return (None, false);
                };
                let value = self.expr_as(value, &ty);
                (value.map(|value| Stmt::Store { slot, value }), false)
            }
            ast::Stmt::If {
                cond,
                then_block,
                else_branch,
                ..
            } => {
                let cond = self.expr_as(cond, &Type::Bool);
                let (then_body, then_returns) = self.block(then_block);
                let (else_body, else_returns) = match else_branch {
                    None => (Vec::new(), false),
                    Some(ElseBranch::Block(block)) => self.block(block),
                    Some(ElseBranch::If(nested)) => {
                        let (stmt, returns) = self.stmt(nested);
                        (stmt.into_iter().collect(), returns)
                    }
                };
                let lowered = cond.map(|cond| Stmt::If {
                    cond,
                    then_body,
                    else_body,
                });
                (lowered, then_returns && else_returns)
            }
            ast::Stmt::While { cond, body, .. } => {
                // `while true` never falls through
                let endless = matches!(cond.kind, ExprKind::Bool(true));
                let cond = self.expr_as(cond, &Type::Bool);
                let (body, _) = self.block(body);
                (cond.map(|cond| Stmt::While { cond, body }), endless)
            }
            ast::Stmt::Return { value, position } => {
                let ret = self.sig.ret.clone();
                let lowered = match value {
                    None if ret == Type::Unit => Some(Stmt::Return(None)),
                    None => self.fail(
                        codes::MISSING_RETURN_VALUE,
                        format!("An object of a type convertible to '{}' is required", ret),
                        *position,
                    ),
                    Some(value) if ret == Type::Unit => self.fail(
                        codes::UNEXPECTED_RETURN_VALUE,
                        format!(
                            "Since '{}' returns unit, a return keyword must not be followed by an object expression",
                            self.sig.qualified_name()
                        ),
                        value.position,
                    ),
                    Some(value) => self.expr_as(value, &ret).map(|e| Stmt::Return(Some(e))),
                };
                (lowered, true)
            }
            ast::Stmt::Throw { value, .. } => (self.expr_as(value, &Type::Str).map(Stmt::Throw), true),
            ast::Stmt::Expr(expr) => {
                if !matches!(expr.kind, ExprKind::Call { .. } | ExprKind::MethodCall { .. }) {
                    self.error(
                        codes::NOT_A_STATEMENT,
                        "Only call expressions can be used as a statement",
                        expr.position,
                    );
                    return (None, false);
                }
                (self.expr(expr, None).map(Stmt::Expr), false)
            }
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expr_as(&mut self, expr: &ast::Expr, expected: &Type) -> Option<Expr> {
        let lowered = self.expr(expr, Some(expected))?;
        if expected.accepts(&lowered.ty) {
            return Some(lowered);
        }
        self.fail(
            codes::TYPE_MISMATCH,
            format!("Cannot implicitly convert type '{}' to '{}'", lowered.ty, expected),
            expr.position,
        )
    }

    // `expected` only steers literal typing; callers check the result
    fn expr(&mut self, expr: &ast::Expr, expected: Option<&Type>) -> Option<Expr> {
        let position = expr.position;
        match &expr.kind {
            ExprKind::Int(n) => self.int_literal(*n as i128, expected, position),
            ExprKind::Float(x) => Some(float_literal(*x, expected)),
            ExprKind::Str(s) => Some(constant(Value::Str(s.clone()))),
            ExprKind::Char(c) => Some(constant(Value::Char(*c))),
            ExprKind::Bool(b) => Some(constant(Value::Bool(*b))),
            ExprKind::SelfValue => {
                if self.sig.has_self {
                    self.read_local(0)
                } else {
                    self.fail(
                        codes::SELF_OUTSIDE_METHOD,
                        "Keyword 'self' is not available in a static function",
                        position,
                    )
                }
            }
            ExprKind::Path(segments) => self.path(segments, position),
            ExprKind::Call { callee, args } => self.call(callee, args, position),
            ExprKind::Field { base, name } => {
                let base = self.expr(base, None)?;
                self.field(base, name, position)
            }
            ExprKind::MethodCall {
                receiver,
                method,
                args,
            } => {
                let receiver = self.expr(receiver, None)?;
                self.method_call(receiver, method, args, position)
            }
            ExprKind::Unary { op, operand } => self.unary(*op, operand, expected, position),
            ExprKind::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs, expected, position),
            ExprKind::List(items) => self.list(items, expected, position),
            ExprKind::Index { base, index } => {
                let base = self.expr(base, None);
                let index_expr = self.expr(index, Some(&Type::I32));
                let (base, index_expr) = (base?, index_expr?);
                if !index_expr.ty.is_integer() {
                    return self.fail(
                        codes::TYPE_MISMATCH,
                        format!("Cannot implicitly convert type '{}' to 'i32'", index_expr.ty),
                        index.position,
                    );
                }
                let ty = match &base.ty {
                    Type::List(inner) => (**inner).clone(),
                    Type::Str => Type::Char,
                    other => {
                        return self.fail(
                            codes::INDEXING,
                            format!("Cannot apply indexing with [] to an expression of type '{}'", other),
                            position,
                        );
                    }
                };
                Some(Expr {
                    kind: ir::ExprKind::Index {
                        base: Box::new(base),
                        index: Box::new(index_expr),
                    },
                    ty,
                })
            }
            ExprKind::Cast { expr: inner, ty } => {
                let target = self.cx.resolve_type(ty, &mut *self.diagnostics);
                let hint = target.is_numeric().then_some(&target);
                let inner = self.expr(inner, hint)?;
                if !castable(&inner.ty, &target) {
                    return self.fail(
                        codes::INVALID_CAST,
                        format!("Cannot convert type '{}' to '{}'", inner.ty, target),
                        position,
                    );
                }
                Some(Expr {
                    kind: ir::ExprKind::Cast {
                        expr: Box::new(inner),
                        to: target.clone(),
                    },
                    ty: target,
                })
            }
            ExprKind::StructLit { name, fields } => self.struct_literal(name, fields, position),
        }
    }

    fn int_literal(&mut self, n: i128, expected: Option<&Type>, position: Position) -> Option<Expr> {
        let ty = match expected {
            Some(t) if t.is_numeric() => t.clone(),
            _ if i32::try_from(n).is_ok() => Type::I32,
            _ if i64::try_from(n).is_ok() => Type::I64,
            _ => Type::U64,
        };
        if let Some(value) = Value::from_f64(&ty, n as f64) {
            return Some(constant(value));
        }
        match Value::from_i128(&ty, n) {
            Some(value) => Some(constant(value)),
            None => self.fail(
                codes::TYPE_MISMATCH,
                format!("Constant value '{}' cannot be converted to a '{}'", n, ty),
                position,
            ),
        }
    }

    fn path(&mut self, segments: &[String], position: Position) -> Option<Expr> {
        let Some(slot) = self.lookup(&segments[0]) else {
            return self.fail(
                codes::UNKNOWN_NAME,
                format!("The name '{}' does not exist in the current context", segments.join(".")),
                position,
            );
        };
        let mut expr = self.read_local(slot)?;
        for name in &segments[1..] {
            expr = self.field(expr, name, position)?;
        }
        Some(expr)
    }

    fn field(&mut self, base: Expr, name: &str, position: Position) -> Option<Expr> {
        let cx = self.cx;
        if let Type::Struct(struct_name) = &base.ty {
            if let Some(def) = cx.struct_def(struct_name) {
                if let Some(index) = def.fields.iter().position(|f| f.name == name) {
                    let ty = def.fields[index].ty.clone();
                    return Some(Expr {
                        kind: ir::ExprKind::Field {
                            base: Box::new(base),
                            index,
                        },
                        ty,
                    });
                }
            }
        }
        self.fail(
            codes::UNKNOWN_NAME,
            format!("'{}' does not contain a definition for '{}'", base.ty, name),
            position,
        )
    }

    fn call(&mut self, callee: &[String], args: &[ast::Expr], position: Position) -> Option<Expr> {
        let cx = self.cx;
        let Some((name, prefix)) = callee.split_last() else {
            return None;
        };

        // `point.describe()` parses as a qualified call on a local
        if !prefix.is_empty() && self.lookup(&prefix[0]).is_some() {
            let receiver = self.path(prefix, position)?;
            return self.method_call(receiver, name, args, position);
        }

        if prefix.is_empty() {
            let in_type = self
                .sig
                .declaring_type
                .as_ref()
                .and_then(|t| cx.types.get(t))
                .and_then(|t| t.functions.get(name));
            if let Some(&index) = in_type.or_else(|| cx.free_functions.get(name)) {
                return self.user_call(index, None, args, position);
            }
            let natives = cx.visible_natives(name);
            return match natives.as_slice() {
                [] => self.fail(
                    codes::UNKNOWN_NAME,
                    format!("The name '{}' does not exist in the current context", name),
                    position,
                ),
                [(_, native)] => self.native_call(native.clone(), None, args, position),
                [(first, _), (second, _), ..] => self.fail(
                    codes::AMBIGUOUS_CALL,
                    format!(
                        "The call is ambiguous between '{}.{}' and '{}.{}'",
                        first, name, second, name
                    ),
                    position,
                ),
            };
        }

        if prefix.len() == 1 {
            if let Some(entry) = cx.types.get(&prefix[0]) {
                return match entry.functions.get(name) {
                    Some(&index) => self.user_call(index, None, args, position),
                    None => self.fail(
                        codes::UNKNOWN_NAME,
                        format!("'{}' does not contain a definition for '{}'", prefix[0], name),
                        position,
                    ),
                };
            }
        }

        let namespace = prefix.join(".");
        let native = cx
            .module_for(&namespace)
            .map(|m| (m.namespace().to_string(), m.function(name).cloned()));
        match native {
            Some((_, Some(native))) => self.native_call(native, None, args, position),
            Some((full, None)) => self.fail(
                codes::UNKNOWN_NAME,
                format!("'{}' does not contain a definition for '{}'", full, name),
                position,
            ),
            None => self.fail(
                codes::MISSING_NAMESPACE,
                missing_namespace_message(prefix),
                position,
            ),
        }
    }

    fn method_call(
        &mut self,
        receiver: Expr,
        method: &str,
        args: &[ast::Expr],
        position: Position,
    ) -> Option<Expr> {
        let cx = self.cx;
        if let Type::Struct(struct_name) = &receiver.ty {
            let found = cx
                .types
                .get(struct_name)
                .and_then(|t| t.functions.get(method))
                .copied();
            if let Some(index) = found {
                let sig = &cx.signatures[index];
                if !sig.has_self {
                    return self.fail(
                        codes::INSTANCE_REFERENCE,
                        format!(
                            "Member '{}' cannot be accessed with an instance reference; qualify it with a type name instead",
                            sig.qualified_name()
                        ),
                        position,
                    );
                }
                return self.user_call(index, Some(receiver), args, position);
            }
        }

        // Library functions whose first parameter takes the receiver
        let candidates: Vec<(&str, Arc<NativeFn>)> = cx
            .visible_natives(method)
            .into_iter()
            .filter(|(_, f)| f.params.first().is_some_and(|p| p.accepts(&receiver.ty)))
            .collect();
        match candidates.as_slice() {
            [] => self.fail(
                codes::UNKNOWN_NAME,
                format!("'{}' does not contain a definition for '{}'", receiver.ty, method),
                position,
            ),
            [(_, native)] => self.native_call(native.clone(), Some(receiver), args, position),
            [(first, _), (second, _), ..] => self.fail(
                codes::AMBIGUOUS_CALL,
                format!(
                    "The call is ambiguous between '{}.{}' and '{}.{}'",
                    first, method, second, method
                ),
                position,
            ),
        }
    }

    fn user_call(
        &mut self,
        index: usize,
        receiver: Option<Expr>,
        args: &[ast::Expr],
        position: Position,
    ) -> Option<Expr> {
        let cx = self.cx;
        let sig = &cx.signatures[index];
        let name = sig.qualified_name();
        if sig.has_self && receiver.is_none() {
            return self.fail(
                codes::OBJECT_REFERENCE_REQUIRED,
                format!("An object reference is required for the non-static member '{}'", name),
                position,
            );
        }
        if !sig.is_pub && sig.declaring_type.is_some() && sig.declaring_type != self.sig.declaring_type {
            return self.fail(
                codes::INACCESSIBLE,
                format!("'{}' is inaccessible due to its protection level", name),
                position,
            );
        }

        let params: Vec<Type> = sig.params.iter().map(|p| p.ty.clone()).collect();
        let ret = sig.ret.clone();
        let mut lowered = self.args(&name, &params, args, position)?;
        if let Some(receiver) = receiver {
            lowered.insert(0, receiver);
        }
        Some(Expr {
            kind: ir::ExprKind::Call {
                callee: Callee::User(index),
                args: lowered,
            },
            ty: ret,
        })
    }

    fn native_call(
        &mut self,
        native: Arc<NativeFn>,
        receiver: Option<Expr>,
        args: &[ast::Expr],
        position: Position,
    ) -> Option<Expr> {
        let skip = usize::from(receiver.is_some());
        let params = native.params[skip..].to_vec();
        let mut lowered = self.args(&native.name, &params, args, position)?;
        if let Some(receiver) = receiver {
            lowered.insert(0, receiver);
        }
        Some(Expr {
            ty: native.ret.clone(),
            kind: ir::ExprKind::Call {
                callee: Callee::Native(native),
                args: lowered,
            },
        })
    }

    fn args(
        &mut self,
        name: &str,
        params: &[Type],
        args: &[ast::Expr],
        position: Position,
    ) -> Option<Vec<Expr>> {
        if args.len() != params.len() {
            return self.fail(
                codes::ARGUMENT_COUNT,
                format!("No overload for method '{}' takes {} arguments", name, args.len()),
                position,
            );
        }
        let mut lowered = Vec::with_capacity(args.len());
        let mut ok = true;
        for (arg, param) in args.iter().zip(params) {
            match self.expr_as(arg, param) {
                Some(expr) => lowered.push(expr),
                None => ok = false,
            }
        }
        ok.then_some(lowered)
    }

    fn unary(
        &mut self,
        op: UnaryOp,
        operand: &ast::Expr,
        expected: Option<&Type>,
        position: Position,
    ) -> Option<Expr> {
        let inner = match (op, &operand.kind) {
            // Negative literals are typed as a whole so `-128` fits an i8
            (UnaryOp::Neg, ExprKind::Int(n)) => return self.int_literal(-(*n as i128), expected, position),
            (UnaryOp::Neg, ExprKind::Float(x)) => return Some(float_literal(-x, expected)),
            (UnaryOp::Neg, _) => self.expr(operand, expected.filter(|t| t.is_numeric()))?,
            (UnaryOp::Not, _) => self.expr(operand, Some(&Type::Bool))?,
        };
        let valid = match op {
            UnaryOp::Neg => {
                inner.ty.is_signed_integer() || inner.ty.is_float() || inner.ty == Type::Duration
            }
            UnaryOp::Not => inner.ty == Type::Bool,
        };
        if !valid {
            let symbol = if op == UnaryOp::Neg { "-" } else { "!" };
            return self.fail(
                codes::UNARY_OPERATOR,
                format!("Operator '{}' cannot be applied to operand of type '{}'", symbol, inner.ty),
                position,
            );
        }
        Some(Expr {
            ty: inner.ty.clone(),
            kind: ir::ExprKind::Unary {
                op,
                operand: Box::new(inner),
            },
        })
    }

    fn binary(
        &mut self,
        op: BinaryOp,
        lhs: &ast::Expr,
        rhs: &ast::Expr,
        expected: Option<&Type>,
        position: Position,
    ) -> Option<Expr> {
        let (lhs, rhs) = if matches!(op, BinaryOp::And | BinaryOp::Or) {
            let lhs = self.expr(lhs, Some(&Type::Bool));
            let rhs = self.expr(rhs, Some(&Type::Bool));
            (lhs?, rhs?)
        } else {
            let hint = if op.is_comparison() {
                None
            } else {
                expected.filter(|t| t.is_numeric())
            };
            // A literal operand takes its type from the other side
            if is_literal(lhs) && !is_literal(rhs) {
                let rhs = self.expr(rhs, hint);
                let rhs_ty = rhs.as_ref().map(|e| e.ty.clone());
                let lhs = self.expr(lhs, rhs_ty.as_ref().or(hint));
                (lhs?, rhs?)
            } else {
                let lhs = self.expr(lhs, hint);
                let lhs_ty = lhs.as_ref().map(|e| e.ty.clone());
                let rhs = self.expr(rhs, lhs_ty.as_ref().or(hint));
                (lhs?, rhs?)
            }
        };

        let ty = binary_result(op, &lhs.ty, &rhs.ty);
        let Some(ty) = ty else {
            return self.fail(
                codes::BINARY_OPERATOR,
                format!(
                    "Operator '{}' cannot be applied to operands of type '{}' and '{}'",
                    op.symbol(),
                    lhs.ty,
                    rhs.ty
                ),
                position,
            );
        };
        Some(Expr {
            kind: ir::ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
        })
    }

    fn list(&mut self, items: &[ast::Expr], expected: Option<&Type>, position: Position) -> Option<Expr> {
        let mut element = match expected {
            Some(Type::List(inner)) => Some((**inner).clone()),
            _ => None,
        };
        if items.is_empty() && element.is_none() {
            return self.fail(
                codes::TYPE_MISMATCH,
                "Cannot infer the element type of an empty list",
                position,
            );
        }

        let mut lowered = Vec::with_capacity(items.len());
        let mut ok = true;
        for item in items {
            let Some(expr) = self.expr(item, element.as_ref()) else {
                ok = false;
                continue;
            };
            match &element {
                Some(ty) if !ty.accepts(&expr.ty) => {
                    self.error(
                        codes::TYPE_MISMATCH,
                        format!("Cannot implicitly convert type '{}' to '{}'", expr.ty, ty),
                        item.position,
                    );
                    ok = false;
                }
                Some(_) => lowered.push(expr),
                None => {
                    element = Some(expr.ty.clone());
                    lowered.push(expr);
                }
            }
        }

        let element = element.filter(|_| ok)?;
        Some(Expr {
            kind: ir::ExprKind::List(lowered),
            ty: Type::List(Box::new(element)),
        })
    }

    fn struct_literal(
        &mut self,
        name: &str,
        fields: &[(String, ast::Expr)],
        position: Position,
    ) -> Option<Expr> {
        let cx = self.cx;
        let Some(def) = cx.struct_def(name) else {
            return self.fail(
                codes::UNKNOWN_TYPE,
                format!("The type or namespace name '{}' could not be found", name),
                position,
            );
        };

        let mut given: HashMap<&str, Expr> = HashMap::new();
        let mut ok = true;
        for (field_name, value) in fields {
            let Some(field) = def.fields.iter().find(|f| &f.name == field_name) else {
                self.error(
                    codes::UNKNOWN_NAME,
                    format!("'{}' does not contain a definition for '{}'", name, field_name),
                    value.position,
                );
                ok = false;
                continue;
            };
            if given.contains_key(field_name.as_str()) {
                self.error(
                    codes::DUPLICATE_MEMBER,
                    format!("Duplicate initialization of member '{}'", field_name),
                    value.position,
                );
                ok = false;
                continue;
            }
            match self.expr_as(value, &field.ty) {
                Some(expr) => {
                    given.insert(field.name.as_str(), expr);
                }
                None => ok = false,
            }
        }

        let mut lowered = Vec::with_capacity(def.fields.len());
        for field in &def.fields {
            match given.remove(field.name.as_str()) {
                Some(expr) => lowered.push((field.name.clone(), expr)),
                None if ok => {
                    self.error(
                        codes::UNASSIGNED_FIELD,
                        format!("Field '{}.{}' must be fully assigned", name, field.name),
                        position,
                    );
                    ok = false;
                }
                None => {}
            }
        }

        ok.then(|| Expr {
            kind: ir::ExprKind::Struct {
                name: name.to_string(),
                fields: lowered,
            },
            ty: Type::Struct(name.to_string()),
        })
    }
}

fn constant(value: Value) -> Expr {
    Expr {
        ty: value.type_of(),
        kind: ir::ExprKind::Const(value),
    }
}

fn float_literal(x: f64, expected: Option<&Type>) -> Expr {
    match expected {
        Some(Type::F32) => constant(Value::F32(x as f32)),
        _ => constant(Value::F64(x)),
    }
}

fn is_literal(expr: &ast::Expr) -> bool {
    match &expr.kind {
        ExprKind::Int(_) | ExprKind::Float(_) => true,
        ExprKind::Unary {
            op: UnaryOp::Neg,
            operand,
        } => matches!(operand.kind, ExprKind::Int(_) | ExprKind::Float(_)),
        _ => false,
    }
}

fn binary_result(op: BinaryOp, lhs: &Type, rhs: &Type) -> Option<Type> {
    if op.is_comparison() {
        let equality = matches!(op, BinaryOp::Eq | BinaryOp::Ne);
        return (lhs == rhs && (equality || lhs.is_ordered())).then_some(Type::Bool);
    }
    match (op, lhs, rhs) {
        (BinaryOp::And | BinaryOp::Or, Type::Bool, Type::Bool) => Some(Type::Bool),
        (BinaryOp::And | BinaryOp::Or, _, _) => None,
        (_, a, b) if a == b && a.is_numeric() => Some(a.clone()),
        (BinaryOp::Add, Type::Str, b) if b.is_scalar() => Some(Type::Str),
        (BinaryOp::Add, a, Type::Str) if a.is_scalar() => Some(Type::Str),
        (BinaryOp::Add | BinaryOp::Sub, Type::Duration, Type::Duration) => Some(Type::Duration),
        (BinaryOp::Add | BinaryOp::Sub, Type::DateTime, Type::Duration) => Some(Type::DateTime),
        (BinaryOp::Sub, Type::DateTime, Type::DateTime) => Some(Type::Duration),
        _ => None,
    }
}

fn castable(from: &Type, to: &Type) -> bool {
    from == to
        || (from.is_numeric() && to.is_numeric())
        || (*from == Type::Char && to.is_integer())
        || (from.is_integer() && *to == Type::Char)
}

#[cfg(test)]
#[path = "checker_tests.rs"]
mod checker_tests;
