// ABOUTME: The Xenly abstract syntax tree

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<Box<Expr>>,
}

impl Param {
    pub fn required(name: impl Into<String>) -> Self {
        Param {
            name: name.into(),
            default: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportForm {
    Plain,
    Aliased(String),
    Selective(Vec<String>),
    Wildcard,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Identifier(String),
    This,
    Binary {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
        line: usize,
    },
    Unary {
        op: String,
        operand: Box<Expr>,
        line: usize,
    },
    Assign {
        name: String,
        value: Box<Expr>,
        line: usize,
    },
    CompoundAssign {
        name: String,
        op: String,
        value: Box<Expr>,
        line: usize,
    },
    Increment {
        name: String,
        line: usize,
    },
    Decrement {
        name: String,
        line: usize,
    },
    Call {
        name: String,
        args: Vec<Expr>,
        line: usize,
    },
    MethodCall {
        object: Box<Expr>,
        method: String,
        args: Vec<Expr>,
        line: usize,
    },
    New {
        class_name: String,
        args: Vec<Expr>,
        line: usize,
    },
    SuperCall {
        args: Vec<Expr>,
        line: usize,
    },
    PropertyGet {
        object: Box<Expr>,
        name: String,
        line: usize,
    },
    PropertySet {
        object: Box<Expr>,
        name: String,
        value: Box<Expr>,
        line: usize,
    },
    Typeof {
        operand: Box<Expr>,
        line: usize,
    },
    Instanceof {
        object: Box<Expr>,
        class_name: String,
        line: usize,
    },
    ArrayLiteral {
        elements: Vec<Expr>,
        line: usize,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        line: usize,
    },
    IndexSet {
        object: Box<Expr>,
        index: Box<Expr>,
        value: Box<Expr>,
        line: usize,
    },
    Input {
        prompt: Option<Box<Expr>>,
    },
    Spawn {
        call: Box<Expr>,
        line: usize,
    },
    Await {
        operand: Box<Expr>,
        line: usize,
    },
}

impl Expr {
    pub fn line(&self) -> usize {
        match self {
            Expr::Binary { line, .. }
            | Expr::Unary { line, .. }
            | Expr::Assign { line, .. }
            | Expr::CompoundAssign { line, .. }
            | Expr::Increment { line, .. }
            | Expr::Decrement { line, .. }
            | Expr::Call { line, .. }
            | Expr::MethodCall { line, .. }
            | Expr::New { line, .. }
            | Expr::SuperCall { line, .. }
            | Expr::PropertyGet { line, .. }
            | Expr::PropertySet { line, .. }
            | Expr::Typeof { line, .. }
            | Expr::Instanceof { line, .. }
            | Expr::ArrayLiteral { line, .. }
            | Expr::Index { line, .. }
            | Expr::IndexSet { line, .. }
            | Expr::Spawn { line, .. }
            | Expr::Await { line, .. } => *line,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    VarDecl {
        name: String,
        value: Option<Expr>,
    },
    Block(Vec<Stmt>),
    FnDecl {
        name: String,
        params: Vec<Param>,
        body: Vec<Stmt>,
        is_async: bool,
    },
    Return {
        value: Option<Expr>,
        line: usize,
    },
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    For {
        init: Box<Stmt>,
        cond: Expr,
        update: Box<Stmt>,
        body: Vec<Stmt>,
    },
    ForIn {
        var_name: String,
        iterable: Expr,
        body: Vec<Stmt>,
    },
    DoWhile {
        body: Vec<Stmt>,
        cond: Expr,
    },
    Break,
    Continue,
    Print(Vec<Expr>),
    Import {
        path: String,
        form: ImportForm,
        line: usize,
    },
    Export(Box<Stmt>),
    ClassDecl {
        name: String,
        parent: Option<String>,
        methods: Vec<Stmt>,
        line: usize,
    },
}

pub type Program = Vec<Stmt>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expr_line_tracking() {
        let e = Expr::Binary {
            op: "+".into(),
            left: Box::new(Expr::Number(1.0)),
            right: Box::new(Expr::Number(2.0)),
            line: 7,
        };
        assert_eq!(e.line(), 7);
    }

    #[test]
    fn test_param_required_has_no_default() {
        let p = Param::required("x");
        assert_eq!(p.name, "x");
        assert!(p.default.is_none());
    }
}
