// Snippet parser: tokenizer and recursive-descent parser.
// Parses: use declarations, modules, structs, free functions, statements, expressions.
// Errors are collected as diagnostics; parsing recovers at statement and item
// boundaries so a single pass reports every syntax error it can.

use crate::ast::*;
use crate::diagnostic::{Diagnostic, Position, codes};

const KEYWORDS: &[&str] = &[
    "use", "module", "struct", "pub", "fn", "let", "if", "else", "while", "return", "throw",
    "true", "false", "self", "as",
];

/// Deepest expression or block nesting the parser accepts. Each folded binary
/// operator counts as one level, since it deepens the left spine of the tree.
pub const MAX_NESTING: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Ident,
    Int,
    Float,
    Str,
    Char,
    Punct,
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    // Unescaped content for string/char literals, raw text otherwise
    text: String,
    position: Position,
    end: Position,
}

/// Parse snippet source. Always returns a tree; it is complete only when no
/// error diagnostics were produced.
pub fn parse(source: &str) -> (SourceFile, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();
    let tokens = tokenize(source, &mut diagnostics);
    let mut parser = Parser {
        tokens,
        pos: 0,
        diagnostics,
        no_struct_literal: false,
        depth: 0,
    };
    let file = parser.parse_file();
    (file, parser.diagnostics)
}

// Marker for a parse failure whose diagnostic has already been recorded
struct Recover;

type PResult<T> = Result<T, Recover>;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
    // Set while parsing `if`/`while` conditions where `{` opens the body
    no_struct_literal: bool,
    // Current nesting, bounded by MAX_NESTING
    depth: usize,
}

impl Parser {
    fn parse_file(&mut self) -> SourceFile {
        let mut file = SourceFile::default();

        while !self.at_eof() {
            let result = if self.at("use") {
                self.parse_use().map(|u| file.uses.push(u))
            } else {
                self.parse_item().map(|i| file.items.push(i))
            };
            if result.is_err() {
                self.synchronize_item();
            }
        }

        file
    }

    fn parse_use(&mut self) -> PResult<UseDecl> {
        let position = self.expect("use")?.position;
        let path = self.parse_path()?;
        self.expect_semicolon();
        Ok(UseDecl { path, position })
    }

    fn parse_path(&mut self) -> PResult<Vec<String>> {
        let mut path = vec![self.expect_ident()?.0];
        while self.eat(".") {
            path.push(self.expect_ident()?.0);
        }
        Ok(path)
    }

    fn parse_item(&mut self) -> PResult<Item> {
        let is_pub = self.eat("pub");
        if self.at("fn") {
            return Ok(Item::Function(self.parse_function(is_pub)?));
        }
        if self.at("module") || self.at("struct") {
            return Ok(Item::Type(self.parse_type_decl(is_pub)?));
        }
        let found = self.peek().text.clone();
        Err(self.error_here(
            codes::TOKEN_EXPECTED,
            format!("Expected 'fn', 'module', 'struct' or 'use', found '{}'", found),
        ))
    }

    // Example: struct Point { x: i32, y: i32, pub fn origin() -> Point { ... } }
    fn parse_type_decl(&mut self, is_pub: bool) -> PResult<TypeDecl> {
        let keyword = self.advance();
        let kind = if keyword.text == "module" {
            TypeKind::Module
        } else {
            TypeKind::Struct
        };
        let (name, _) = self.expect_ident()?;
        self.expect("{")?;

        let mut fields = Vec::new();
        let mut functions = Vec::new();
        while !self.at("}") && !self.at_eof() {
            let member = if self.at("pub") || self.at("fn") {
                let member_pub = self.eat("pub");
                self.parse_function(member_pub).map(|f| functions.push(f))
            } else if kind == TypeKind::Struct {
                self.parse_field().map(|f| fields.push(f))
            } else {
                let found = self.peek().text.clone();
                Err(self.error_here(
                    codes::TOKEN_EXPECTED,
                    format!("Expected 'fn' in module body, found '{}'", found),
                ))
            };
            if member.is_err() {
                self.synchronize_member();
            }
        }
        self.expect("}")?;

        Ok(TypeDecl {
            kind,
            name,
            is_pub,
            fields,
            functions,
            position: keyword.position,
        })
    }

    fn parse_field(&mut self) -> PResult<FieldDecl> {
        let (name, position) = self.expect_ident()?;
        self.expect(":")?;
        let ty = self.parse_type()?;
        if !self.eat(",") {
            self.eat(";");
        }
        Ok(FieldDecl { name, ty, position })
    }

    fn parse_function(&mut self, is_pub: bool) -> PResult<FnDecl> {
        let position = self.expect("fn")?.position;
        let (name, _) = self.expect_ident()?;
        self.expect("(")?;

        let mut has_self = false;
        if self.eat("self") {
            has_self = true;
            if !self.at(")") {
                self.expect(",")?;
            }
        }

        let mut params = Vec::new();
        while !self.at(")") && !self.at_eof() {
            let (param_name, param_pos) = self.expect_ident()?;
            self.expect(":")?;
            let ty = self.parse_type()?;
            params.push(Param {
                name: param_name,
                ty,
                position: param_pos,
            });
            if !self.eat(",") {
                break;
            }
        }
        self.expect(")")?;

        let ret = if self.eat("->") {
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = self.parse_block()?;
        Ok(FnDecl {
            name,
            is_pub,
            has_self,
            params,
            ret,
            body,
            position,
        })
    }

    // Handles: i32, string, StructName, [T], [[T]]
    fn parse_type(&mut self) -> PResult<TypeExpr> {
        let position = self.peek().position;
        if self.eat("[") {
            let inner = self.nested(Self::parse_type)?;
            self.expect("]")?;
            return Ok(TypeExpr::List(Box::new(inner), position));
        }
        let (name, position) = self.expect_ident()?;
        Ok(TypeExpr::Named(name, position))
    }

    fn parse_block(&mut self) -> PResult<Block> {
        self.nested(Self::parse_block_body)
    }

    fn parse_block_body(&mut self) -> PResult<Block> {
        let position = self.expect("{")?.position;
        let mut stmts = Vec::new();

        while !self.at("}") && !self.at_eof() {
            match self.parse_stmt() {
                Ok(stmt) => stmts.push(stmt),
                Err(Recover) => self.synchronize_stmt(),
            }
        }

        self.expect("}")?;
        Ok(Block { stmts, position })
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        let position = self.peek().position;

        if self.eat("let") {
            let (name, _) = self.expect_ident()?;
            let ty = if self.eat(":") {
                Some(self.parse_type()?)
            } else {
                None
            };
            self.expect("=")?;
            let value = self.parse_expr()?;
            self.expect_semicolon();
            return Ok(Stmt::Let {
                name,
                ty,
                value,
                position,
            });
        }

        if self.at("if") {
            return self.parse_if();
        }

        if self.eat("while") {
            let cond = self.parse_condition()?;
            let body = self.parse_block()?;
            return Ok(Stmt::While {
                cond,
                body,
                position,
            });
        }

        if self.eat("return") {
            let value = if self.at(";") || self.at("}") {
                None
            } else {
                Some(self.parse_expr()?)
            };
            self.expect_semicolon();
            return Ok(Stmt::Return { value, position });
        }

        if self.eat("throw") {
            let value = self.parse_expr()?;
            self.expect_semicolon();
            return Ok(Stmt::Throw { value, position });
        }

        // Assignment: name = expr;
        if self.peek().kind == TokenKind::Ident
            && !is_keyword(&self.peek().text)
            && self.peek_at(1).kind == TokenKind::Punct
            && self.peek_at(1).text == "="
        {
            let name = self.advance().text;
            self.advance();
            let value = self.parse_expr()?;
            self.expect_semicolon();
            return Ok(Stmt::Assign {
                name,
                value,
                position,
            });
        }

        let expr = self.parse_expr()?;
        self.expect_semicolon();
        Ok(Stmt::Expr(expr))
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        let position = self.expect("if")?.position;
        let cond = self.parse_condition()?;
        let then_block = self.parse_block()?;

        let else_branch = if self.eat("else") {
            if self.at("if") {
                Some(ElseBranch::If(Box::new(self.nested(Self::parse_if)?)))
            } else {
                Some(ElseBranch::Block(self.parse_block()?))
            }
        } else {
            None
        };

        Ok(Stmt::If {
            cond,
            then_block,
            else_branch,
            position,
        })
    }

    fn parse_condition(&mut self) -> PResult<Expr> {
        let saved = self.no_struct_literal;
        self.no_struct_literal = true;
        let cond = self.parse_expr();
        self.no_struct_literal = saved;
        cond
    }

    fn parse_expr(&mut self) -> PResult<Expr> {
        self.nested(|p| p.parse_binary(1))
    }

    fn binary_op(&self) -> Option<(BinaryOp, u8)> {
        let token = self.peek();
        if token.kind != TokenKind::Punct {
            return None;
        }
        let op = match token.text.as_str() {
            "||" => (BinaryOp::Or, 1),
            "&&" => (BinaryOp::And, 2),
            "==" => (BinaryOp::Eq, 3),
            "!=" => (BinaryOp::Ne, 3),
            "<" => (BinaryOp::Lt, 4),
            "<=" => (BinaryOp::Le, 4),
            ">" => (BinaryOp::Gt, 4),
            ">=" => (BinaryOp::Ge, 4),
            "+" => (BinaryOp::Add, 5),
            "-" => (BinaryOp::Sub, 5),
            "*" => (BinaryOp::Mul, 6),
            "/" => (BinaryOp::Div, 6),
            "%" => (BinaryOp::Rem, 6),
            _ => return None,
        };
        Some(op)
    }

    fn parse_binary(&mut self, min_prec: u8) -> PResult<Expr> {
        let entry = self.depth;
        let result = self.parse_binary_chain(min_prec);
        self.depth = entry;
        result
    }

    // Left-associative chain; every fold raises `depth` until the chain ends
    fn parse_binary_chain(&mut self, min_prec: u8) -> PResult<Expr> {
        let mut lhs = self.parse_unary()?;

        while let Some((op, prec)) = self.binary_op() {
            if prec < min_prec {
                break;
            }
            self.descend()?;
            self.advance();
            let rhs = self.parse_binary(prec + 1)?;
            let position = lhs.position;
            lhs = Expr {
                kind: ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                position,
            };
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let position = self.peek().position;
        let op = if self.eat("-") {
            UnaryOp::Neg
        } else if self.eat("!") {
            UnaryOp::Not
        } else {
            return self.parse_postfix();
        };
        let operand = self.nested(Self::parse_unary)?;
        Ok(Expr {
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            position,
        })
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let entry = self.depth;
        let result = self.parse_postfix_chain();
        self.depth = entry;
        result
    }

    fn parse_postfix_chain(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;

        loop {
            let position = expr.position;
            if self.at(".") || self.at("[") || self.at("as") {
                self.descend()?;
            }
            if self.eat(".") {
                let (name, _) = self.expect_ident()?;
                let kind = if self.at("(") {
                    let args = self.parse_args()?;
                    ExprKind::MethodCall {
                        receiver: Box::new(expr),
                        method: name,
                        args,
                    }
                } else {
                    ExprKind::Field {
                        base: Box::new(expr),
                        name,
                    }
                };
                expr = Expr { kind, position };
            } else if self.eat("[") {
                let index = self.parse_nested_expr()?;
                self.expect("]")?;
                expr = Expr {
                    kind: ExprKind::Index {
                        base: Box::new(expr),
                        index: Box::new(index),
                    },
                    position,
                };
            } else if self.eat("as") {
                let ty = self.parse_type()?;
                expr = Expr {
                    kind: ExprKind::Cast {
                        expr: Box::new(expr),
                        ty,
                    },
                    position,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let token = self.peek().clone();
        let position = token.position;
        let expr = |kind| Ok(Expr { kind, position });

        match token.kind {
            TokenKind::Int => {
                self.advance();
                match token.text.parse::<u128>() {
                    Ok(n) if n <= u64::MAX as u128 => expr(ExprKind::Int(n)),
                    _ => {
                        self.diagnostics.push(Diagnostic::error(
                            codes::CONSTANT_TOO_LARGE,
                            "Integral constant is too large",
                            position,
                        ));
                        expr(ExprKind::Int(0))
                    }
                }
            }
            TokenKind::Float => {
                self.advance();
                match token.text.parse::<f64>() {
                    Ok(x) => expr(ExprKind::Float(x)),
                    Err(_) => Err(self.error_at(
                        codes::INVALID_EXPRESSION,
                        format!("Invalid real literal '{}'", token.text),
                        position,
                    )),
                }
            }
            TokenKind::Str => {
                self.advance();
                expr(ExprKind::Str(token.text))
            }
            TokenKind::Char => {
                self.advance();
                match token.text.chars().next() {
                    Some(c) if token.text.chars().count() == 1 => expr(ExprKind::Char(c)),
                    _ => Err(self.error_at(
                        codes::INVALID_EXPRESSION,
                        "Character literal must contain exactly one character",
                        position,
                    )),
                }
            }
            TokenKind::Punct if token.text == "(" => {
                self.advance();
                let inner = self.parse_nested_expr()?;
                self.expect(")")?;
                Ok(inner)
            }
            TokenKind::Punct if token.text == "[" => {
                self.advance();
                let mut items = Vec::new();
                while !self.at("]") && !self.at_eof() {
                    items.push(self.parse_nested_expr()?);
                    if !self.eat(",") {
                        break;
                    }
                }
                self.expect("]")?;
                expr(ExprKind::List(items))
            }
            TokenKind::Ident if token.text == "true" || token.text == "false" => {
                self.advance();
                expr(ExprKind::Bool(token.text == "true"))
            }
            TokenKind::Ident if token.text == "self" => {
                self.advance();
                expr(ExprKind::SelfValue)
            }
            TokenKind::Ident if !is_keyword(&token.text) => {
                self.advance();
                let mut segments = vec![token.text.clone()];

                // Qualified names: Calc.add, Std.Math.sqrt, point.x
                while self.at(".")
                    && self.peek_at(1).kind == TokenKind::Ident
                    && !is_keyword(&self.peek_at(1).text)
                {
                    self.advance();
                    segments.push(self.advance().text);
                }

                if self.at("(") {
                    let args = self.parse_args()?;
                    return expr(ExprKind::Call {
                        callee: segments,
                        args,
                    });
                }

                // Struct literal only if the name starts with uppercase (type name convention)
                let is_type_name = token.text.chars().next().is_some_and(|c| c.is_uppercase());
                if segments.len() == 1 && is_type_name && self.at("{") && !self.no_struct_literal {
                    return self.parse_struct_literal(segments.remove(0), position);
                }

                expr(ExprKind::Path(segments))
            }
            _ => {
                let found = if token.kind == TokenKind::Eof {
                    "end of input".to_string()
                } else {
                    token.text.clone()
                };
                Err(self.error_here(
                    codes::INVALID_EXPRESSION,
                    format!("Invalid expression term '{}'", found),
                ))
            }
        }
    }

    // Parenthesised and bracketed expressions may contain struct literals again
    fn parse_nested_expr(&mut self) -> PResult<Expr> {
        let saved = self.no_struct_literal;
        self.no_struct_literal = false;
        let expr = self.parse_expr();
        self.no_struct_literal = saved;
        expr
    }

    fn parse_args(&mut self) -> PResult<Vec<Expr>> {
        self.expect("(")?;
        let mut args = Vec::new();
        while !self.at(")") && !self.at_eof() {
            args.push(self.parse_nested_expr()?);
            if !self.eat(",") {
                break;
            }
        }
        self.expect(")")?;
        Ok(args)
    }

    fn parse_struct_literal(&mut self, name: String, position: Position) -> PResult<Expr> {
        self.expect("{")?;
        let mut fields = Vec::new();
        while !self.at("}") && !self.at_eof() {
            let (field, _) = self.expect_ident()?;
            self.expect(":")?;
            let value = self.parse_nested_expr()?;
            fields.push((field, value));
            if !self.eat(",") {
                break;
            }
        }
        self.expect("}")?;
        Ok(Expr {
            kind: ExprKind::StructLit { name, fields },
            position,
        })
    }

    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let index = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    // Keywords and punctuation only; a string literal "fn" never matches
    fn at(&self, text: &str) -> bool {
        let token = self.peek();
        matches!(token.kind, TokenKind::Ident | TokenKind::Punct) && token.text == text
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, text: &str) -> bool {
        if self.at(text) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &str) -> PResult<Token> {
        if self.at(expected) {
            return Ok(self.advance());
        }
        Err(self.error_here(codes::TOKEN_EXPECTED, format!("'{}' expected", expected)))
    }

    fn expect_ident(&mut self) -> PResult<(String, Position)> {
        let token = self.peek();
        if token.kind == TokenKind::Ident && !is_keyword(&token.text) {
            let token = self.advance();
            return Ok((token.text, token.position));
        }
        Err(self.error_here(codes::IDENTIFIER_EXPECTED, "Identifier expected"))
    }

    // A missing terminator is reported at the end of the previous token and
    // parsing continues as if it were present.
    fn expect_semicolon(&mut self) {
        if self.eat(";") {
            return;
        }
        let position = if self.pos > 0 {
            self.tokens[self.pos - 1].end
        } else {
            self.peek().position
        };
        self.diagnostics.push(Diagnostic::error(
            codes::SEMICOLON_EXPECTED,
            "; expected",
            position,
        ));
    }

    // Run `parse` one nesting level deeper
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        let entry = self.depth;
        let result = self.descend().and_then(|()| parse(self));
        self.depth = entry;
        result
    }

    fn descend(&mut self) -> PResult<()> {
        if self.depth >= MAX_NESTING {
            return Err(self.error_here(
                codes::TOO_COMPLEX,
                "Expression is too long or complex to compile",
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn error_here(&mut self, code: &'static str, message: impl Into<String>) -> Recover {
        let position = self.peek().position;
        self.error_at(code, message, position)
    }

    fn error_at(&mut self, code: &'static str, message: impl Into<String>, position: Position) -> Recover {
        self.diagnostics.push(Diagnostic::error(code, message, position));
        Recover
    }

    // Skip to the end of the current statement: past the next `;` at this
    // nesting depth, or up to (not past) the enclosing `}`.
    fn synchronize_stmt(&mut self) {
        let mut depth = 0usize;
        while !self.at_eof() {
            if self.at("{") {
                depth += 1;
            } else if self.at("}") {
                if depth == 0 {
                    return;
                }
                depth -= 1;
            } else if self.at(";") && depth == 0 {
                self.advance();
                return;
            }
            self.advance();
        }
    }

    fn synchronize_member(&mut self) {
        self.synchronize_until(&["pub", "fn"], true);
    }

    fn synchronize_item(&mut self) {
        self.synchronize_until(&["use", "pub", "fn", "module", "struct"], false);
    }

    // Skip tokens until one of `starters` appears outside any braces. Inside a
    // type body (`in_body`) the body's closing brace also stops the scan.
    fn synchronize_until(&mut self, starters: &[&str], in_body: bool) {
        if in_body && self.at("}") {
            return;
        }
        let mut depth = 0usize;
        loop {
            if self.at("{") {
                depth += 1;
            } else if self.at("}") && depth > 0 {
                depth -= 1;
            }
            self.advance();
            if self.at_eof() {
                return;
            }
            if depth == 0 && (starters.iter().any(|s| self.at(s)) || (in_body && self.at("}"))) {
                return;
            }
        }
    }
}

fn is_keyword(text: &str) -> bool {
    KEYWORDS.contains(&text)
}

// ----------------------------------------------------------------------
// Tokenizer
// ----------------------------------------------------------------------

struct Cursor {
    chars: Vec<char>,
    index: usize,
    line: usize,
    column: usize,
}

impl Cursor {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.index + 1).copied()
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.index += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(c)
    }
}

fn tokenize(source: &str, diagnostics: &mut Vec<Diagnostic>) -> Vec<Token> {
    let mut cursor = Cursor {
        chars: source.chars().collect(),
        index: 0,
        line: 0,
        column: 0,
    };
    let mut tokens = Vec::new();

    while let Some(ch) = cursor.peek() {
        let start = cursor.position();

        if ch.is_whitespace() {
            cursor.bump();
        } else if ch == '/' && cursor.peek_next() == Some('/') {
            // Skip line comment
            while let Some(c) = cursor.peek() {
                if c == '\n' {
                    break;
                }
                cursor.bump();
            }
        } else if ch == '/' && cursor.peek_next() == Some('*') {
            cursor.bump();
            cursor.bump();
            let mut closed = false;
            while let Some(c) = cursor.bump() {
                if c == '*' && cursor.peek() == Some('/') {
                    cursor.bump();
                    closed = true;
                    break;
                }
            }
            if !closed {
                diagnostics.push(Diagnostic::error(
                    codes::UNTERMINATED_LITERAL,
                    "End-of-file found, '*/' expected",
                    start,
                ));
            }
        } else if ch.is_ascii_digit() {
            let mut text = String::new();
            let mut kind = TokenKind::Int;
            while let Some(c) = cursor.peek() {
                if c.is_ascii_digit() {
                    text.push(c);
                } else if c == '_' {
                    // digit separator
                } else if c == '.'
                    && kind == TokenKind::Int
                    && cursor.peek_next().is_some_and(|n| n.is_ascii_digit())
                {
                    kind = TokenKind::Float;
                    text.push(c);
                } else if (c == 'e' || c == 'E')
                    && cursor
                        .peek_next()
                        .is_some_and(|n| n.is_ascii_digit() || n == '-' || n == '+')
                {
                    kind = TokenKind::Float;
                    text.push(c);
                    cursor.bump();
                    if let Some(sign) = cursor.peek().filter(|s| *s == '-' || *s == '+') {
                        text.push(sign);
                        cursor.bump();
                    }
                    continue;
                } else {
                    break;
                }
                cursor.bump();
            }
            tokens.push(Token {
                kind,
                text,
                position: start,
                end: cursor.position(),
            });
        } else if ch.is_alphabetic() || ch == '_' {
            let mut text = String::new();
            while let Some(c) = cursor.peek().filter(|c| c.is_alphanumeric() || *c == '_') {
                text.push(c);
                cursor.bump();
            }
            tokens.push(Token {
                kind: TokenKind::Ident,
                text,
                position: start,
                end: cursor.position(),
            });
        } else if ch == '"' || ch == '\'' {
            let quote = ch;
            cursor.bump();
            let mut content = String::new();
            let mut closed = false;
            while let Some(c) = cursor.peek() {
                if c == quote {
                    cursor.bump();
                    closed = true;
                    break;
                }
                if c == '\n' {
                    break;
                }
                cursor.bump();
                if c == '\\' {
                    match cursor.bump() {
                        Some('n') => content.push('\n'),
                        Some('t') => content.push('\t'),
                        Some('r') => content.push('\r'),
                        Some('0') => content.push('\0'),
                        Some('\\') => content.push('\\'),
                        Some('"') => content.push('"'),
                        Some('\'') => content.push('\''),
                        Some(other) => {
                            // Unknown escape sequence - keep as is
                            content.push('\\');
                            content.push(other);
                        }
                        None => content.push('\\'),
                    }
                } else {
                    content.push(c);
                }
            }
            if !closed {
                diagnostics.push(Diagnostic::error(
                    codes::UNTERMINATED_LITERAL,
                    "Newline in constant",
                    start,
                ));
            }
            tokens.push(Token {
                kind: if quote == '"' { TokenKind::Str } else { TokenKind::Char },
                text: content,
                position: start,
                end: cursor.position(),
            });
        } else {
            let two: String = [Some(ch), cursor.peek_next()].into_iter().flatten().collect();
            let text = if ["->", "==", "!=", "<=", ">=", "&&", "||"].contains(&two.as_str()) {
                cursor.bump();
                cursor.bump();
                two
            } else if "(){}[],.;:<>+-*/%=!".contains(ch) {
                cursor.bump();
                ch.to_string()
            } else {
                cursor.bump();
                diagnostics.push(Diagnostic::error(
                    codes::UNEXPECTED_CHARACTER,
                    format!("Unexpected character '{}'", ch),
                    start,
                ));
                continue;
            };
            tokens.push(Token {
                kind: TokenKind::Punct,
                text,
                position: start,
                end: cursor.position(),
            });
        }
    }

    let end = cursor.position();
    tokens.push(Token {
        kind: TokenKind::Eof,
        text: String::new(),
        position: end,
        end,
    });
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_ok(source: &str) -> SourceFile {
        let (file, diagnostics) = parse(source);
        assert!(diagnostics.is_empty(), "unexpected diagnostics: {:?}", diagnostics);
        file
    }

    #[test]
    fn test_parses_uses_modules_and_free_functions() {
        let file = parse_ok(
            "use Std.Math;\n\
             module Calc { pub fn add(a: i32, b: i32) -> i32 { return a + b; } }\n\
             pub fn hello() -> string { return \"hi\"; }",
        );
        assert_eq!(file.uses.len(), 1);
        assert_eq!(file.uses[0].dotted(), "Std.Math");
        assert_eq!(file.items.len(), 2);
        match &file.items[0] {
            Item::Type(t) => {
                assert_eq!(t.name, "Calc");
                assert_eq!(t.functions[0].params.len(), 2);
            }
            other => panic!("expected module, got {:?}", other),
        }
    }

    #[test]
    fn test_struct_with_fields_and_methods() {
        let file = parse_ok(
            "struct Counter { count: i64, pub fn bump(self, by: i64) -> i64 { return self.count + by; } }",
        );
        let Item::Type(t) = &file.items[0] else {
            panic!("expected struct");
        };
        assert_eq!(t.kind, TypeKind::Struct);
        assert_eq!(t.fields.len(), 1);
        assert!(t.functions[0].has_self);
        assert_eq!(t.functions[0].params.len(), 1);
    }

    #[test]
    fn test_missing_semicolon_reported_on_defective_line() {
        let source = "pub fn f() -> i32 {\n    let x = 1\n    return x;\n}";
        let (_, diagnostics) = parse(source);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, codes::SEMICOLON_EXPECTED);
        assert_eq!(diagnostics[0].position.line, 1);
    }

    #[test]
    fn test_recovers_and_reports_multiple_errors() {
        let source = "pub fn f() -> i32 {\n    let = 3;\n    return );\n}\npub fn g() -> i32 { return 1; }";
        let (file, diagnostics) = parse(source);
        assert_eq!(diagnostics.len(), 2, "{:?}", diagnostics);
        assert_eq!(diagnostics[0].position.line, 1);
        assert_eq!(diagnostics[1].position.line, 2);
        assert_eq!(file.items.len(), 2);
    }

    #[test]
    fn test_precedence_and_casts() {
        let file = parse_ok("fn f(a: i32) -> i64 { return 1 + a as i64 * 2; }");
        let Item::Function(f) = &file.items[0] else {
            panic!("expected function");
        };
        let Stmt::Return { value: Some(e), .. } = &f.body.stmts[0] else {
            panic!("expected return");
        };
        let ExprKind::Binary { op, rhs, .. } = &e.kind else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(rhs.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_struct_literal_not_parsed_in_condition() {
        parse_ok("struct P { x: i32 }\nfn f(X: bool) -> i32 { if X { return 1; } return 0; }");
        parse_ok("struct P { x: i32 }\nfn f() -> i32 { let p = P { x: 1 }; return p.x; }");
    }

    #[test]
    fn test_string_escapes_and_unterminated_literal() {
        let (file, diagnostics) = parse("fn f() -> string { return \"a\\tb\"; }");
        assert!(diagnostics.is_empty());
        let Item::Function(f) = &file.items[0] else {
            panic!("expected function");
        };
        let Stmt::Return { value: Some(e), .. } = &f.body.stmts[0] else {
            panic!("expected return");
        };
        assert!(matches!(&e.kind, ExprKind::Str(s) if s == "a\tb"));

        let (_, diagnostics) = parse("fn f() -> string {\n return \"abc;\n}");
        assert!(diagnostics.iter().any(|d| d.code == codes::UNTERMINATED_LITERAL));
    }

    fn too_complex(source: &str) -> usize {
        let (_, diagnostics) = parse(source);
        diagnostics.iter().filter(|d| d.code == codes::TOO_COMPLEX).count()
    }

    #[test]
    fn test_nesting_limit_on_parentheses() {
        let nested = |n: usize| format!("fn f() -> i32 {{ return {}1{}; }}", "(".repeat(n), ")".repeat(n));
        parse_ok(&nested(100));

        assert_eq!(too_complex(&nested(300)), 1);
        assert_eq!(too_complex(&nested(20_000)), 1);
        assert_eq!(too_complex(&format!("fn f() -> i32 {{ return {}1; }}", "-".repeat(5_000))), 1);
    }

    #[test]
    fn test_nesting_limit_on_binary_chains() {
        let chain = |n: usize| format!("fn f() -> i32 {{ return 0{}; }}", " + 1".repeat(n));
        parse_ok(&chain(100));

        let (_, diagnostics) = parse(&chain(5_000));
        assert_eq!(diagnostics.len(), 1, "{:?}", diagnostics);
        assert_eq!(diagnostics[0].code, codes::TOO_COMPLEX);
        assert_eq!(diagnostics[0].message, "Expression is too long or complex to compile");
    }

    #[test]
    fn test_nesting_limit_on_blocks_and_postfix() {
        let blocks = |n: usize| {
            format!("fn f() -> i32 {{ {} return 1; {} return 0; }}", "if true { ".repeat(n), "} ".repeat(n))
        };
        parse_ok(&blocks(50));
        assert_eq!(too_complex(&blocks(1_000)), 1);

        let fields = format!("fn f(s: string) -> i32 {{ return s{}; }}", ".length()".repeat(1_000));
        assert_eq!(too_complex(&fields), 1);
    }

    #[test]
    fn test_integral_constant_too_large() {
        let (_, diagnostics) = parse("fn f() -> u64 { return 99999999999999999999999; }");
        assert_eq!(diagnostics[0].code, codes::CONSTANT_TOO_LARGE);
    }
}
