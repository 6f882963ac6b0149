// ABOUTME: Optional, non-blocking type-warning pass over a parsed program

use crate::ast::{Expr, Stmt};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A type name string is one of `"number"`, `"string"`, `"bool"`, `"null"`,
/// `"function"`, or `"any"` (unknown / not worth tracking). No value beyond
/// `"any"` is ever treated as an error — this pass only ever warns.
pub type TypeName = String;

/// Parented like the runtime `Environment`, but maps names to inferred type
/// strings instead of values; nothing here affects evaluation.
pub struct TypeEnv {
    bindings: RefCell<HashMap<String, TypeName>>,
    parent: Option<Rc<TypeEnv>>,
}

impl TypeEnv {
    pub fn new() -> Rc<TypeEnv> {
        Rc::new(TypeEnv {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
        })
    }

    pub fn with_parent(parent: &Rc<TypeEnv>) -> Rc<TypeEnv> {
        Rc::new(TypeEnv {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(parent)),
        })
    }

    fn set(&self, name: &str, ty: TypeName) {
        self.bindings.borrow_mut().insert(name.to_string(), ty);
    }

    fn get(&self, name: &str) -> Option<TypeName> {
        if let Some(ty) = self.bindings.borrow().get(name) {
            return Some(ty.clone());
        }
        self.parent.as_ref().and_then(|p| p.get(name))
    }
}

/// One non-fatal finding from the pass.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeWarning {
    pub line: usize,
    pub message: String,
}

fn types_compatible(expected: &str, actual: &str) -> bool {
    expected == "any" || actual == "any" || expected == actual
}

fn infer_binary(op: &str, left: &str, right: &str, line: usize, warnings: &mut Vec<TypeWarning>) -> TypeName {
    match op {
        "+" | "-" | "*" | "/" => {
            if !types_compatible("number", left) || !types_compatible("number", right) {
                warnings.push(TypeWarning {
                    line,
                    message: format!("operator '{op}' expects numbers, got '{left}' and '{right}'"),
                });
            }
            "number".to_string()
        }
        "<" | ">" | "<=" | ">=" | "==" | "!=" | "and" | "or" => "bool".to_string(),
        _ => "any".to_string(),
    }
}

fn infer_expr(expr: &Expr, env: &Rc<TypeEnv>, warnings: &mut Vec<TypeWarning>) -> TypeName {
    match expr {
        Expr::Number(_) => "number".to_string(),
        Expr::Str(_) => "string".to_string(),
        Expr::Bool(_) => "bool".to_string(),
        Expr::Null => "null".to_string(),
        Expr::Identifier(name) => env.get(name).unwrap_or_else(|| "any".to_string()),
        Expr::Binary { op, left, right, line } => {
            let lt = infer_expr(left, env, warnings);
            let rt = infer_expr(right, env, warnings);
            infer_binary(op, &lt, &rt, *line, warnings)
        }
        Expr::Assign { name, value, .. } => {
            let ty = infer_expr(value, env, warnings);
            env.set(name, ty.clone());
            ty
        }
        Expr::ArrayLiteral { .. } => "array".to_string(),
        Expr::Call { .. } | Expr::MethodCall { .. } | Expr::New { .. } | Expr::SuperCall { .. } => "any".to_string(),
        _ => "any".to_string(),
    }
}

fn infer_stmt(stmt: &Stmt, env: &Rc<TypeEnv>, warnings: &mut Vec<TypeWarning>) -> TypeName {
    match stmt {
        Stmt::VarDecl { name, value } => {
            let ty = match value {
                Some(e) => infer_expr(e, env, warnings),
                None => "any".to_string(),
            };
            env.set(name, ty.clone());
            ty
        }
        Stmt::Expr(e) => infer_expr(e, env, warnings),
        Stmt::Block(stmts) => infer_block(stmts, &TypeEnv::with_parent(env), warnings),
        Stmt::FnDecl { params, body, .. } => {
            let fn_env = TypeEnv::with_parent(env);
            for p in params {
                fn_env.set(&p.name, "any".to_string());
            }
            infer_block(body, &fn_env, warnings);
            "function".to_string()
        }
        Stmt::Export(inner) => infer_stmt(inner, env, warnings),
        _ => "any".to_string(),
    }
}

fn infer_block(stmts: &[Stmt], env: &Rc<TypeEnv>, warnings: &mut Vec<TypeWarning>) -> TypeName {
    let mut last = "null".to_string();
    for s in stmts {
        last = infer_stmt(s, env, warnings);
    }
    last
}

/// Runs the pass over a whole program, returning every warning found.
/// Never returns an `Err` — by design this pass cannot fail the build.
pub fn check_program(program: &[Stmt]) -> Vec<TypeWarning> {
    let env = TypeEnv::new();
    let mut warnings = Vec::new();
    for stmt in program {
        infer_stmt(stmt, &env, &mut warnings);
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn warnings_for(src: &str) -> Vec<TypeWarning> {
        let (program, lex_errs, parse_errs) = parse_source(src);
        assert!(lex_errs.is_empty());
        assert!(parse_errs.is_empty());
        check_program(&program)
    }

    #[test]
    fn test_no_warnings_for_numeric_arithmetic() {
        assert!(warnings_for("var x = 1 + 2;").is_empty());
    }

    #[test]
    fn test_warns_on_string_plus_bool_arithmetic() {
        let w = warnings_for(r#"var a = "x"; var b = true; var c = a - b;"#);
        assert_eq!(w.len(), 1);
        assert!(w[0].message.contains("expects numbers"));
    }

    #[test]
    fn test_function_params_are_any_and_silent() {
        assert!(warnings_for("fn f(a, b) { return a + b; }").is_empty());
    }

    #[test]
    fn test_comparison_never_warns() {
        assert!(warnings_for(r#"var a = "x"; var b = 1; var c = a == b;"#).is_empty());
    }
}
