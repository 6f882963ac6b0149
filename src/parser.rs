// ABOUTME: Recursive-descent parser producing an AST from a token stream

use crate::ast::{Expr, ImportForm, Param, Program, Stmt};
use crate::error::ParseError;
use crate::token::{Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    /// Parse the whole token stream, collecting as many statements and
    /// errors as possible rather than stopping at the first problem.
    pub fn parse(mut self) -> (Program, Vec<ParseError>) {
        let mut program = Vec::new();
        self.skip_newlines();
        while !self.is_at_end() {
            program.push(self.parse_statement());
            self.skip_terminators();
        }
        (program, self.errors)
    }

    // --- token stream helpers -------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn is_at_end(&self) -> bool {
        self.peek_kind() == TokenKind::Eof
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn skip_newlines(&mut self) {
        while self.check(TokenKind::Newline) {
            self.advance();
        }
    }

    fn skip_terminators(&mut self) {
        while self.check(TokenKind::Newline) || self.check(TokenKind::Semicolon) {
            self.advance();
        }
    }

    /// Consume a token of `kind`, or record a parse error and synthesize a
    /// placeholder so the caller can keep going.
    fn expect(&mut self, kind: TokenKind, context: &str) -> Token {
        if self.check(kind) {
            self.advance()
        } else {
            let found = self.peek().clone();
            self.errors.push(ParseError::ExpectedToken {
                line: found.line,
                expected: context.to_string(),
                found: format!("{:?}", found.kind),
            });
            found
        }
    }

    fn expect_identifier(&mut self, context: &str) -> String {
        if self.check(TokenKind::Identifier) {
            self.advance().lexeme
        } else {
            let found = self.peek().clone();
            self.errors.push(ParseError::ExpectedToken {
                line: found.line,
                expected: context.to_string(),
                found: format!("{:?}", found.kind),
            });
            String::new()
        }
    }

    fn error_here(&mut self, message: impl Into<String>) {
        let line = self.peek().line;
        self.errors.push(ParseError::Unexpected {
            line,
            message: message.into(),
        });
    }

    // --- statements -------------------------------------------------------

    fn parse_statement(&mut self) -> Stmt {
        match self.peek_kind() {
            TokenKind::Var => self.parse_var_decl(),
            TokenKind::Fn => self.parse_fn_decl(false),
            TokenKind::Async => {
                self.advance();
                self.expect(TokenKind::Fn, "'fn' after 'async'");
                self.parse_fn_decl(true)
            }
            TokenKind::Class => self.parse_class_decl(),
            TokenKind::Return => self.parse_return(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Do => self.parse_do_while(),
            TokenKind::Break => {
                self.advance();
                Stmt::Break
            }
            TokenKind::Continue => {
                self.advance();
                Stmt::Continue
            }
            TokenKind::Print => self.parse_print(),
            TokenKind::Import => self.parse_import(),
            TokenKind::From => self.parse_from_import(),
            TokenKind::Export => self.parse_export(),
            TokenKind::LBrace => Stmt::Block(self.parse_block()),
            _ => Stmt::Expr(self.parse_expression()),
        }
    }

    fn parse_var_decl(&mut self) -> Stmt {
        self.advance(); // 'var'
        let name = self.expect_identifier("variable name");
        let value = if self.check(TokenKind::Assign) {
            self.advance();
            Some(self.parse_expression())
        } else {
            None
        };
        Stmt::VarDecl { name, value }
    }

    fn parse_params(&mut self) -> Vec<Param> {
        self.expect(TokenKind::LParen, "'(' to start parameter list");
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                let name = self.expect_identifier("parameter name");
                let default = if self.check(TokenKind::Assign) {
                    self.advance();
                    Some(Box::new(self.parse_expression()))
                } else {
                    None
                };
                params.push(Param { name, default });
                if self.check(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')' to close parameter list");
        params
    }

    fn parse_fn_decl(&mut self, is_async: bool) -> Stmt {
        self.advance(); // 'fn'
        let name = self.expect_identifier("function name");
        let params = self.parse_params();
        let body = self.parse_block();
        Stmt::FnDecl {
            name,
            params,
            body,
            is_async,
        }
    }

    fn parse_class_decl(&mut self) -> Stmt {
        let line = self.advance().line; // 'class'
        let name = self.expect_identifier("class name");
        let parent = if self.check(TokenKind::Extends) {
            self.advance();
            Some(self.expect_identifier("parent class name"))
        } else {
            None
        };
        self.expect(TokenKind::LBrace, "'{' to start class body");
        self.skip_newlines();
        let mut methods = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            let is_async = if self.check(TokenKind::Async) {
                self.advance();
                true
            } else {
                false
            };
            if self.check(TokenKind::Fn) {
                methods.push(self.parse_fn_decl(is_async));
            } else {
                self.error_here("expected a method declaration in class body");
                self.advance();
            }
            self.skip_terminators();
        }
        self.expect(TokenKind::RBrace, "'}' to close class body");
        Stmt::ClassDecl {
            name,
            parent,
            methods,
            line,
        }
    }

    fn parse_return(&mut self) -> Stmt {
        let line = self.advance().line; // 'return'
        let value = if self.check(TokenKind::Newline)
            || self.check(TokenKind::Semicolon)
            || self.check(TokenKind::RBrace)
            || self.is_at_end()
        {
            None
        } else {
            Some(self.parse_expression())
        };
        Stmt::Return { value, line }
    }

    fn parse_if(&mut self) -> Stmt {
        self.advance(); // 'if'
        self.expect(TokenKind::LParen, "'(' after 'if'");
        let cond = self.parse_expression();
        self.expect(TokenKind::RParen, "')' after condition");
        let then_branch = self.parse_block();
        let saved = self.pos;
        self.skip_newlines();
        let else_branch = if self.check(TokenKind::Else) {
            self.advance();
            self.skip_newlines();
            if self.check(TokenKind::If) {
                Some(vec![self.parse_if()])
            } else {
                Some(self.parse_block())
            }
        } else {
            self.pos = saved;
            None
        };
        Stmt::If {
            cond,
            then_branch,
            else_branch,
        }
    }

    fn parse_while(&mut self) -> Stmt {
        self.advance(); // 'while'
        self.expect(TokenKind::LParen, "'(' after 'while'");
        let cond = self.parse_expression();
        self.expect(TokenKind::RParen, "')' after condition");
        let body = self.parse_block();
        Stmt::While { cond, body }
    }

    /// Parses both the C-style three-slot form `for (init; cond; update) {}`
    /// and the iteration form `for name in expr {}`.
    fn parse_for(&mut self) -> Stmt {
        self.advance(); // 'for'
        if self.check(TokenKind::LParen) {
            self.advance();
            let init = if self.check(TokenKind::Var) {
                self.parse_var_decl()
            } else {
                Stmt::Expr(self.parse_expression())
            };
            self.expect(TokenKind::Semicolon, "';' after for-loop initializer");
            let cond = self.parse_expression();
            self.expect(TokenKind::Semicolon, "';' after for-loop condition");
            let update = Stmt::Expr(self.parse_expression());
            self.expect(TokenKind::RParen, "')' after for-loop update");
            let body = self.parse_block();
            Stmt::For {
                init: Box::new(init),
                cond,
                update: Box::new(update),
                body,
            }
        } else {
            let var_name = self.expect_identifier("loop variable name");
            self.expect(TokenKind::In, "'in' in for-in loop");
            let iterable = self.parse_expression();
            let body = self.parse_block();
            Stmt::ForIn {
                var_name,
                iterable,
                body,
            }
        }
    }

    fn parse_do_while(&mut self) -> Stmt {
        self.advance(); // 'do'
        let body = self.parse_block();
        self.skip_newlines();
        self.expect(TokenKind::While, "'while' after 'do' block");
        self.expect(TokenKind::LParen, "'(' after 'while'");
        let cond = self.parse_expression();
        self.expect(TokenKind::RParen, "')' after condition");
        Stmt::DoWhile { body, cond }
    }

    fn parse_print(&mut self) -> Stmt {
        self.advance(); // 'print'
        self.expect(TokenKind::LParen, "'(' after 'print'");
        let args = self.parse_arg_list();
        self.expect(TokenKind::RParen, "')' to close print arguments");
        Stmt::Print(args)
    }

    fn parse_import(&mut self) -> Stmt {
        let line = self.advance().line; // 'import'
        let path = self.expect_string("module path string");
        let form = if self.check(TokenKind::As) {
            self.advance();
            ImportForm::Aliased(self.expect_identifier("import alias"))
        } else {
            ImportForm::Plain
        };
        Stmt::Import { path, form, line }
    }

    fn parse_from_import(&mut self) -> Stmt {
        let line = self.advance().line; // 'from'
        let path = self.expect_string("module path string");
        self.expect(TokenKind::Import, "'import' after module path");
        let form = if self.check(TokenKind::Star) {
            self.advance();
            ImportForm::Wildcard
        } else {
            let mut names = vec![self.expect_identifier("imported name")];
            while self.check(TokenKind::Comma) {
                self.advance();
                names.push(self.expect_identifier("imported name"));
            }
            ImportForm::Selective(names)
        };
        Stmt::Import { path, form, line }
    }

    fn parse_export(&mut self) -> Stmt {
        self.advance(); // 'export'
        let inner = self.parse_statement();
        Stmt::Export(Box::new(inner))
    }

    fn expect_string(&mut self, context: &str) -> String {
        if self.check(TokenKind::String) {
            self.advance().lexeme
        } else {
            let found = self.peek().clone();
            self.errors.push(ParseError::ExpectedToken {
                line: found.line,
                expected: context.to_string(),
                found: format!("{:?}", found.kind),
            });
            String::new()
        }
    }

    fn parse_block(&mut self) -> Vec<Stmt> {
        self.expect(TokenKind::LBrace, "'{' to start a block");
        self.skip_newlines();
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            stmts.push(self.parse_statement());
            self.skip_terminators();
        }
        self.expect(TokenKind::RBrace, "'}' to close a block");
        stmts
    }

    fn parse_arg_list(&mut self) -> Vec<Expr> {
        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                args.push(self.parse_expression());
                if self.check(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        args
    }

    // --- expressions --------------------------------------------------------
    //
    // Precedence, loosest to tightest:
    //   assignment > or > and > equality > comparison (incl. instanceof)
    //   > additive > multiplicative > unary (- not) > postfix (call/./[]/++/--)
    //   > primary

    fn parse_expression(&mut self) -> Expr {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Expr {
        let lhs = self.parse_or();

        let compound_op = match self.peek_kind() {
            TokenKind::PlusEq => Some("+"),
            TokenKind::MinusEq => Some("-"),
            TokenKind::StarEq => Some("*"),
            TokenKind::SlashEq => Some("/"),
            _ => None,
        };

        if self.check(TokenKind::Assign) {
            let line = self.advance().line;
            let value = Box::new(self.parse_assignment());
            return self.build_assignment(lhs, value, line);
        }

        if let Some(op) = compound_op {
            let line = self.advance().line;
            let rhs = self.parse_assignment();
            return self.build_compound_assignment(lhs, op, rhs, line);
        }

        lhs
    }

    fn build_assignment(&mut self, lhs: Expr, value: Box<Expr>, line: usize) -> Expr {
        match lhs {
            Expr::Identifier(name) => Expr::Assign { name, value, line },
            Expr::PropertyGet { object, name, line } => Expr::PropertySet {
                object,
                name,
                value,
                line,
            },
            Expr::Index { object, index, line } => Expr::IndexSet {
                object,
                index,
                value,
                line,
            },
            _ => {
                self.error_here("invalid assignment target");
                lhs
            }
        }
    }

    fn build_compound_assignment(&mut self, lhs: Expr, op: &str, rhs: Expr, line: usize) -> Expr {
        match lhs {
            Expr::Identifier(name) => Expr::CompoundAssign {
                name,
                op: op.to_string(),
                value: Box::new(rhs),
                line,
            },
            Expr::PropertyGet { object, name, line } => {
                let read = Expr::PropertyGet {
                    object: object.clone(),
                    name: name.clone(),
                    line,
                };
                let combined = Expr::Binary {
                    op: op.to_string(),
                    left: Box::new(read),
                    right: Box::new(rhs),
                    line,
                };
                Expr::PropertySet {
                    object,
                    name,
                    value: Box::new(combined),
                    line,
                }
            }
            _ => {
                self.error_here("invalid compound assignment target");
                lhs
            }
        }
    }

    fn parse_or(&mut self) -> Expr {
        let mut left = self.parse_and();
        while self.check(TokenKind::Or) {
            let line = self.advance().line;
            let right = self.parse_and();
            left = Expr::Binary {
                op: "or".to_string(),
                left: Box::new(left),
                right: Box::new(right),
                line,
            };
        }
        left
    }

    fn parse_and(&mut self) -> Expr {
        let mut left = self.parse_equality();
        while self.check(TokenKind::And) {
            let line = self.advance().line;
            let right = self.parse_equality();
            left = Expr::Binary {
                op: "and".to_string(),
                left: Box::new(left),
                right: Box::new(right),
                line,
            };
        }
        left
    }

    fn parse_equality(&mut self) -> Expr {
        let mut left = self.parse_comparison();
        loop {
            let op = match self.peek_kind() {
                TokenKind::Eq => "==",
                TokenKind::NotEq => "!=",
                _ => break,
            };
            let line = self.advance().line;
            let right = self.parse_comparison();
            left = Expr::Binary {
                op: op.to_string(),
                left: Box::new(left),
                right: Box::new(right),
                line,
            };
        }
        left
    }

    fn parse_comparison(&mut self) -> Expr {
        let mut left = self.parse_additive();
        loop {
            if self.check(TokenKind::Instanceof) {
                let line = self.advance().line;
                let class_name = self.expect_identifier("class name after 'instanceof'");
                left = Expr::Instanceof {
                    object: Box::new(left),
                    class_name,
                    line,
                };
                continue;
            }
            let op = match self.peek_kind() {
                TokenKind::Lt => "<",
                TokenKind::Gt => ">",
                TokenKind::Lte => "<=",
                TokenKind::Gte => ">=",
                _ => break,
            };
            let line = self.advance().line;
            let right = self.parse_additive();
            left = Expr::Binary {
                op: op.to_string(),
                left: Box::new(left),
                right: Box::new(right),
                line,
            };
        }
        left
    }

    fn parse_additive(&mut self) -> Expr {
        let mut left = self.parse_multiplicative();
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => "+",
                TokenKind::Minus => "-",
                _ => break,
            };
            let line = self.advance().line;
            let right = self.parse_multiplicative();
            left = Expr::Binary {
                op: op.to_string(),
                left: Box::new(left),
                right: Box::new(right),
                line,
            };
        }
        left
    }

    fn parse_multiplicative(&mut self) -> Expr {
        let mut left = self.parse_unary();
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => "*",
                TokenKind::Slash => "/",
                TokenKind::Percent => "%",
                _ => break,
            };
            let line = self.advance().line;
            let right = self.parse_unary();
            left = Expr::Binary {
                op: op.to_string(),
                left: Box::new(left),
                right: Box::new(right),
                line,
            };
        }
        left
    }

    fn parse_unary(&mut self) -> Expr {
        match self.peek_kind() {
            TokenKind::Minus => {
                let line = self.advance().line;
                let operand = self.parse_unary();
                Expr::Unary {
                    op: "-".to_string(),
                    operand: Box::new(operand),
                    line,
                }
            }
            TokenKind::Not => {
                let line = self.advance().line;
                let operand = self.parse_unary();
                Expr::Unary {
                    op: "not".to_string(),
                    operand: Box::new(operand),
                    line,
                }
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Expr {
        let mut expr = self.parse_primary();
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    let line = self.advance().line;
                    let name = self.expect_identifier("property or method name");
                    if self.check(TokenKind::LParen) {
                        self.advance();
                        let args = self.parse_arg_list();
                        self.expect(TokenKind::RParen, "')' to close method arguments");
                        expr = Expr::MethodCall {
                            object: Box::new(expr),
                            method: name,
                            args,
                            line,
                        };
                    } else {
                        expr = Expr::PropertyGet {
                            object: Box::new(expr),
                            name,
                            line,
                        };
                    }
                }
                TokenKind::LBracket => {
                    let line = self.advance().line;
                    let index = self.parse_expression();
                    self.expect(TokenKind::RBracket, "']' to close index expression");
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        line,
                    };
                }
                TokenKind::PlusPlus => {
                    let line = self.advance().line;
                    expr = self.desugar_postfix_step(expr, "+", line);
                    break;
                }
                TokenKind::MinusMinus => {
                    let line = self.advance().line;
                    expr = self.desugar_postfix_step(expr, "-", line);
                    break;
                }
                _ => break,
            }
        }
        expr
    }

    /// `x++`/`x--` on a bare name become dedicated increment/decrement nodes;
    /// on a property they desugar to a get-then-set, matching the
    /// double-evaluation behaviour of compound property assignment.
    fn desugar_postfix_step(&mut self, target: Expr, op: &str, line: usize) -> Expr {
        match target {
            Expr::Identifier(name) => {
                if op == "+" {
                    Expr::Increment { name, line }
                } else {
                    Expr::Decrement { name, line }
                }
            }
            Expr::PropertyGet { object, name, line } => {
                let read = Expr::PropertyGet {
                    object: object.clone(),
                    name: name.clone(),
                    line,
                };
                let step = Expr::Binary {
                    op: op.to_string(),
                    left: Box::new(read),
                    right: Box::new(Expr::Number(1.0)),
                    line,
                };
                Expr::PropertySet {
                    object,
                    name,
                    value: Box::new(step),
                    line,
                }
            }
            other => {
                self.error_here("'++'/'--' require a variable or property target");
                other
            }
        }
    }

    fn parse_primary(&mut self) -> Expr {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Number => {
                self.advance();
                Expr::Number(tok.lexeme.parse().unwrap_or(0.0))
            }
            TokenKind::String => {
                self.advance();
                Expr::Str(tok.lexeme)
            }
            TokenKind::True => {
                self.advance();
                Expr::Bool(true)
            }
            TokenKind::False => {
                self.advance();
                Expr::Bool(false)
            }
            TokenKind::Null => {
                self.advance();
                Expr::Null
            }
            TokenKind::This => {
                self.advance();
                Expr::This
            }
            TokenKind::Super => {
                let line = self.advance().line;
                self.expect(TokenKind::LParen, "'(' after 'super'");
                let args = self.parse_arg_list();
                self.expect(TokenKind::RParen, "')' to close super arguments");
                Expr::SuperCall { args, line }
            }
            TokenKind::New => {
                self.advance();
                let class_name = self.expect_identifier("class name after 'new'");
                let line = self.tokens[self.pos.saturating_sub(1)].line;
                self.expect(TokenKind::LParen, "'(' after class name");
                let args = self.parse_arg_list();
                self.expect(TokenKind::RParen, "')' to close constructor arguments");
                Expr::New {
                    class_name,
                    args,
                    line,
                }
            }
            TokenKind::Typeof => {
                let line = self.advance().line;
                self.expect(TokenKind::LParen, "'(' after 'typeof'");
                let operand = self.parse_expression();
                self.expect(TokenKind::RParen, "')' to close typeof");
                Expr::Typeof {
                    operand: Box::new(operand),
                    line,
                }
            }
            TokenKind::Input => {
                self.advance();
                self.expect(TokenKind::LParen, "'(' after 'input'");
                let prompt = if self.check(TokenKind::RParen) {
                    None
                } else {
                    Some(Box::new(self.parse_expression()))
                };
                self.expect(TokenKind::RParen, "')' to close input");
                Expr::Input { prompt }
            }
            TokenKind::Spawn => {
                let line = self.advance().line;
                let call = self.parse_postfix();
                Expr::Spawn {
                    call: Box::new(call),
                    line,
                }
            }
            TokenKind::Await => {
                let line = self.advance().line;
                let operand = self.parse_unary();
                Expr::Await {
                    operand: Box::new(operand),
                    line,
                }
            }
            TokenKind::LBracket => {
                let line = self.advance().line;
                let mut elements = Vec::new();
                if !self.check(TokenKind::RBracket) {
                    loop {
                        elements.push(self.parse_expression());
                        if self.check(TokenKind::Comma) {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBracket, "']' to close array literal");
                Expr::ArrayLiteral { elements, line }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression();
                self.expect(TokenKind::RParen, "')' to close grouped expression");
                inner
            }
            TokenKind::Identifier => {
                self.advance();
                if self.check(TokenKind::LParen) {
                    let line = tok.line;
                    self.advance();
                    let args = self.parse_arg_list();
                    self.expect(TokenKind::RParen, "')' to close call arguments");
                    Expr::Call {
                        name: tok.lexeme,
                        args,
                        line,
                    }
                } else {
                    Expr::Identifier(tok.lexeme)
                }
            }
            _ => {
                self.error_here(format!("unexpected token {:?} in expression", tok.kind));
                if !self.is_at_end() {
                    self.advance();
                }
                Expr::Null
            }
        }
    }
}

/// Convenience entry point: tokenize and parse source text in one call.
pub fn parse_source(source: &str) -> (Program, Vec<crate::error::LexError>, Vec<ParseError>) {
    let (tokens, lex_errors) = crate::lexer::Lexer::new(source).tokenize();
    let (program, parse_errors) = Parser::new(tokens).parse();
    (program, lex_errors, parse_errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse_ok(src: &str) -> Program {
        let (tokens, lex_errs) = Lexer::new(src).tokenize();
        assert!(lex_errs.is_empty(), "lex errors: {lex_errs:?}");
        let (program, errs) = Parser::new(tokens).parse();
        assert!(errs.is_empty(), "parse errors: {errs:?}");
        program
    }

    #[test]
    fn test_var_decl_with_initializer() {
        let program = parse_ok("var x = 1 + 2\n");
        assert_eq!(program.len(), 1);
        match &program[0] {
            Stmt::VarDecl { name, value } => {
                assert_eq!(name, "x");
                assert!(value.is_some());
            }
            other => panic!("expected VarDecl, got {other:?}"),
        }
    }

    #[test]
    fn test_operator_precedence() {
        let program = parse_ok("var x = 1 + 2 * 3\n");
        let Stmt::VarDecl { value: Some(expr), .. } = &program[0] else {
            panic!("expected var decl");
        };
        match expr {
            Expr::Binary { op, left, right, .. } => {
                assert_eq!(op, "+");
                assert!(matches!(**left, Expr::Number(1.0)));
                assert!(matches!(**right, Expr::Binary { .. }));
            }
            other => panic!("expected top-level +, got {other:?}"),
        }
    }

    #[test]
    fn test_function_declaration_with_default_param() {
        let program = parse_ok("fn greet(name, greeting = \"hi\") {\n  return greeting\n}\n");
        match &program[0] {
            Stmt::FnDecl { name, params, .. } => {
                assert_eq!(name, "greet");
                assert_eq!(params.len(), 2);
                assert!(params[0].default.is_none());
                assert!(params[1].default.is_some());
            }
            other => panic!("expected FnDecl, got {other:?}"),
        }
    }

    #[test]
    fn test_if_else_if_chain() {
        let program = parse_ok("if (x == 1) {\n  print(1)\n} else if (x == 2) {\n  print(2)\n} else {\n  print(3)\n}\n");
        match &program[0] {
            Stmt::If { else_branch, .. } => {
                let else_stmts = else_branch.as_ref().expect("expected else branch");
                assert_eq!(else_stmts.len(), 1);
                assert!(matches!(else_stmts[0], Stmt::If { .. }));
            }
            other => panic!("expected If, got {other:?}"),
        }
    }

    #[test]
    fn test_c_style_for_loop() {
        let program = parse_ok("for (var i = 0; i < 10; i = i + 1) {\n  print(i)\n}\n");
        assert!(matches!(program[0], Stmt::For { .. }));
    }

    #[test]
    fn test_for_in_loop() {
        let program = parse_ok("for item in items {\n  print(item)\n}\n");
        match &program[0] {
            Stmt::ForIn { var_name, .. } => assert_eq!(var_name, "item"),
            other => panic!("expected ForIn, got {other:?}"),
        }
    }

    #[test]
    fn test_do_while_loop() {
        let program = parse_ok("do {\n  x = x + 1\n} while (x < 10)\n");
        assert!(matches!(program[0], Stmt::DoWhile { .. }));
    }

    #[test]
    fn test_class_with_extends_and_methods() {
        let program = parse_ok(
            "class Dog extends Animal {\n  fn speak() {\n    return \"woof\"\n  }\n}\n",
        );
        match &program[0] {
            Stmt::ClassDecl { name, parent, methods, .. } => {
                assert_eq!(name, "Dog");
                assert_eq!(parent.as_deref(), Some("Animal"));
                assert_eq!(methods.len(), 1);
            }
            other => panic!("expected ClassDecl, got {other:?}"),
        }
    }

    #[test]
    fn test_method_call_and_property_chain() {
        let program = parse_ok("print(a.b.c())\n");
        // Just confirm it parses to a Print statement containing a MethodCall
        // whose object is a PropertyGet chain.
        match &program[0] {
            Stmt::Print(args) => {
                assert_eq!(args.len(), 1);
                assert!(matches!(args[0], Expr::MethodCall { .. }));
            }
            other => panic!("expected Print, got {other:?}"),
        }
    }

    #[test]
    fn test_postfix_increment_on_identifier() {
        let program = parse_ok("x++\n");
        match &program[0] {
            Stmt::Expr(Expr::Increment { name, .. }) => assert_eq!(name, "x"),
            other => panic!("expected Increment expr, got {other:?}"),
        }
    }

    #[test]
    fn test_postfix_increment_on_property_desugars() {
        let program = parse_ok("obj.count++\n");
        match &program[0] {
            Stmt::Expr(Expr::PropertySet { name, value, .. }) => {
                assert_eq!(name, "count");
                assert!(matches!(**value, Expr::Binary { .. }));
            }
            other => panic!("expected PropertySet, got {other:?}"),
        }
    }

    #[test]
    fn test_compound_assign_on_identifier() {
        let program = parse_ok("x += 5\n");
        assert!(matches!(program[0], Stmt::Expr(Expr::CompoundAssign { .. })));
    }

    #[test]
    fn test_plain_import() {
        let program = parse_ok("import \"math\"\n");
        match &program[0] {
            Stmt::Import { path, form, .. } => {
                assert_eq!(path, "math");
                assert_eq!(*form, ImportForm::Plain);
            }
            other => panic!("expected Import, got {other:?}"),
        }
    }

    #[test]
    fn test_aliased_import() {
        let program = parse_ok("import \"math\" as m\n");
        match &program[0] {
            Stmt::Import { form, .. } => assert_eq!(*form, ImportForm::Aliased("m".to_string())),
            other => panic!("expected Import, got {other:?}"),
        }
    }

    #[test]
    fn test_selective_from_import() {
        let program = parse_ok("from \"math\" import sqrt, abs\n");
        match &program[0] {
            Stmt::Import { form, .. } => {
                assert_eq!(*form, ImportForm::Selective(vec!["sqrt".into(), "abs".into()]));
            }
            other => panic!("expected Import, got {other:?}"),
        }
    }

    #[test]
    fn test_wildcard_from_import() {
        let program = parse_ok("from \"math\" import *\n");
        match &program[0] {
            Stmt::Import { form, .. } => assert_eq!(*form, ImportForm::Wildcard),
            other => panic!("expected Import, got {other:?}"),
        }
    }

    #[test]
    fn test_export_wraps_declaration() {
        let program = parse_ok("export fn add(a, b) {\n  return a + b\n}\n");
        match &program[0] {
            Stmt::Export(inner) => assert!(matches!(**inner, Stmt::FnDecl { .. })),
            other => panic!("expected Export, got {other:?}"),
        }
    }

    #[test]
    fn test_instanceof_binds_tighter_than_equality() {
        let program = parse_ok("var ok = x instanceof Dog == true\n");
        let Stmt::VarDecl { value: Some(expr), .. } = &program[0] else {
            panic!("expected var decl");
        };
        match expr {
            Expr::Binary { op, left, .. } => {
                assert_eq!(op, "==");
                assert!(matches!(**left, Expr::Instanceof { .. }));
            }
            other => panic!("expected ==, got {other:?}"),
        }
    }

    #[test]
    fn test_array_literal_and_index() {
        let program = parse_ok("var x = [1, 2, 3][0]\n");
        let Stmt::VarDecl { value: Some(expr), .. } = &program[0] else {
            panic!("expected var decl");
        };
        assert!(matches!(expr, Expr::Index { .. }));
    }

    #[test]
    fn test_new_and_super_call() {
        let program = parse_ok(
            "class Dog extends Animal {\n  fn init() {\n    super(1)\n  }\n}\nvar d = new Dog(1)\n",
        );
        assert!(matches!(program[1], Stmt::VarDecl { .. }));
    }

    #[test]
    fn test_spawn_and_await() {
        let program = parse_ok("var f = spawn work()\nvar v = await f\n");
        match &program[0] {
            Stmt::VarDecl { value: Some(Expr::Spawn { .. }), .. } => {}
            other => panic!("expected Spawn, got {other:?}"),
        }
        match &program[1] {
            Stmt::VarDecl { value: Some(Expr::Await { .. }), .. } => {}
            other => panic!("expected Await, got {other:?}"),
        }
    }

    #[test]
    fn test_typeof_expression() {
        let program = parse_ok("print(typeof(x))\n");
        match &program[0] {
            Stmt::Print(args) => assert!(matches!(args[0], Expr::Typeof { .. })),
            other => panic!("expected Print, got {other:?}"),
        }
    }

    #[test]
    fn test_index_assignment() {
        let program = parse_ok("arr[0] = 5\n");
        match &program[0] {
            Stmt::Expr(Expr::IndexSet { .. }) => {}
            other => panic!("expected IndexSet, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_input_reports_error_without_panicking() {
        let (tokens, _) = Lexer::new("var = = =\n").tokenize();
        let (_program, errors) = Parser::new(tokens).parse();
        assert!(!errors.is_empty());
    }
}
