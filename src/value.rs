// ABOUTME: The tagged runtime value type shared by the interpreter and module shims

use crate::ast::{Param, Stmt};
use crate::env::Environment;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct FnDef {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Rc<Vec<Stmt>>,
    pub closure: Rc<Environment>,
    pub is_async: bool,
}

#[derive(Debug)]
pub struct ClassDef {
    pub name: String,
    pub parent: Option<Rc<ClassDef>>,
    pub methods: Rc<Environment>,
}

impl ClassDef {
    /// Look up a method by name, walking from this class up through its ancestors.
    pub fn find_method(self: &Rc<Self>, name: &str) -> Option<Value> {
        let mut cur = Some(Rc::clone(self));
        while let Some(cls) = cur {
            if let Some(m) = cls.methods.get(name) {
                return Some(m);
            }
            cur = cls.parent.clone();
        }
        None
    }

    /// Like `find_method`, but also returns the class the method was
    /// actually found on (as opposed to the instance's own class) — needed
    /// so `super` inside that method resolves to *that* class's parent,
    /// not the instance's most-derived class.
    pub fn find_method_with_owner(self: &Rc<Self>, name: &str) -> Option<(Value, Rc<ClassDef>)> {
        let mut cur = Some(Rc::clone(self));
        while let Some(cls) = cur {
            if let Some(m) = cls.methods.get(name) {
                return Some((m, Rc::clone(&cls)));
            }
            cur = cls.parent.clone();
        }
        None
    }

    /// True iff `self` is `other` or a descendant of `other`.
    pub fn is_or_descends_from(self: &Rc<Self>, other: &Rc<ClassDef>) -> bool {
        let mut cur = Some(Rc::clone(self));
        while let Some(cls) = cur {
            if Rc::ptr_eq(&cls, other) {
                return true;
            }
            cur = cls.parent.clone();
        }
        false
    }
}

#[derive(Debug)]
pub struct InstanceData {
    pub class: Rc<ClassDef>,
    pub fields: Rc<Environment>,
}

#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Function(Rc<FnDef>),
    Class(Rc<ClassDef>),
    Instance(Rc<InstanceData>),
    Array(Rc<RefCell<Vec<Value>>>),
    /// Resolved future handle produced by `spawn`; `await` unwraps it.
    Future(Rc<Value>),
    /// A loaded module bound to a name (via `import "x" as x` or a bare
    /// `import "x"`), used for `name.function(...)` / `name.Class` access.
    NativeModule(&'static str),
    UserModule(Rc<Environment>),
    /// A single function pulled out of a native module by a selective or
    /// wildcard `from "mod" import ...`, callable by its bare name.
    NativeFn(&'static str, &'static str),
    Return(Box<Value>),
    Break,
    Continue,
}

impl Value {
    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Bool(_) => "bool",
            Value::Null => "null",
            Value::Function(_) => "function",
            Value::Class(_) => "class",
            Value::Instance(_) => "instance",
            Value::Array(_) => "array",
            Value::Future(_) => "future",
            Value::NativeModule(_) | Value::UserModule(_) => "module",
            Value::NativeFn(_, _) => "function",
            Value::Return(_) | Value::Break | Value::Continue => "sentinel",
        }
    }

    /// Whether this value is a control-flow sentinel that must bubble up
    /// through blocks and loops rather than being evaluated further.
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Value::Return(_) | Value::Break | Value::Continue)
    }
}

/// Functions, classes, instances, arrays and modules compare by identity
/// (same underlying `Rc`), not by deep structural equality — arrays can
/// hold themselves, and identity is what `==` means for objects in most
/// scripting languages with reference types anyway.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Future(a), Value::Future(b)) => Rc::ptr_eq(a, b),
            (Value::NativeModule(a), Value::NativeModule(b)) => a == b,
            (Value::UserModule(a), Value::UserModule(b)) => Rc::ptr_eq(a, b),
            (Value::NativeFn(ma, fa), Value::NativeFn(mb, fb)) => ma == mb && fa == fb,
            (Value::Break, Value::Break) | (Value::Continue, Value::Continue) => true,
            (Value::Return(a), Value::Return(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Str(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
            Value::Function(fndef) => write!(f, "<function {}>", fndef.name),
            Value::Class(cls) => write!(f, "<class {}>", cls.name),
            Value::Instance(inst) => write!(f, "<instance of {}>", inst.class.name),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Future(inner) => write!(f, "<future {}>", inner),
            Value::NativeModule(name) => write!(f, "<module {}>", name),
            Value::UserModule(_) => write!(f, "<module>"),
            Value::NativeFn(module, func) => write!(f, "<native function {module}.{func}>"),
            Value::Return(inner) => write!(f, "{}", inner),
            Value::Break => write!(f, "<break>"),
            Value::Continue => write!(f, "<continue>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_display_integer_has_no_trailing_dot_zero() {
        assert_eq!(format!("{}", Value::Number(8.0)), "8");
        assert_eq!(format!("{}", Value::Number(-2.5)), "-2.5");
        assert_eq!(format!("{}", Value::Number(0.0)), "0");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(Value::Number(1.0).is_truthy());
        assert!(Value::Str("x".into()).is_truthy());
    }

    #[test]
    fn test_type_name() {
        assert_eq!(Value::Number(1.0).type_name(), "number");
        assert_eq!(Value::array(vec![]).type_name(), "array");
        assert_eq!(Value::Null.type_name(), "null");
    }

    #[test]
    fn test_array_display() {
        let a = Value::array(vec![Value::Number(1.0), Value::Number(2.0)]);
        assert_eq!(format!("{}", a), "[1, 2]");
    }

    #[test]
    fn test_sentinel_detection() {
        assert!(Value::Break.is_sentinel());
        assert!(Value::Continue.is_sentinel());
        assert!(Value::Return(Box::new(Value::Null)).is_sentinel());
        assert!(!Value::Null.is_sentinel());
    }
}
