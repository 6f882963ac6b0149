// ABOUTME: Error types for each pipeline stage (lex, parse, eval, codegen)

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LexError {
    #[error("Line {line}: Unrecognized character '{ch}'")]
    UnrecognizedChar { line: usize, ch: char },

    #[error("Line {line}: Unterminated string literal")]
    UnterminatedString { line: usize },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("Line {line}: {message}")]
    Unexpected { line: usize, message: String },

    #[error("Line {line}: Expected {expected}, found {found}")]
    ExpectedToken {
        line: usize,
        expected: String,
        found: String,
    },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("Line {line}: Undefined variable '{name}'")]
    UndefinedVariable { line: usize, name: String },

    #[error("Line {line}: '{name}' is not a function")]
    NotCallable { line: usize, name: String },

    #[error("Line {line}: Division by zero")]
    DivisionByZero { line: usize },

    #[error("Line {line}: Type mismatch in '{op}': expected numbers, got {lhs} and {rhs}")]
    TypeMismatch {
        line: usize,
        op: String,
        lhs: String,
        rhs: String,
    },

    #[error("Line {line}: Method '{method}' not found on <{class}>")]
    UnknownMethod {
        line: usize,
        method: String,
        class: String,
    },

    #[error("Line {line}: '{name}' is not a class")]
    NotAClass { line: usize, name: String },

    #[error("Line {line}: Parent class '{name}' not found")]
    UnknownParentClass { line: usize, name: String },

    #[error("Line {line}: Module '{name}' not found")]
    UnknownModule { line: usize, name: String },

    #[error("Line {line}: Function '{name}' not found in module '{module}'")]
    UnknownModuleFunction {
        line: usize,
        module: String,
        name: String,
    },

    #[error("Line {line}: '{name}' is not exported from module '{module}'")]
    NotExported {
        line: usize,
        module: String,
        name: String,
    },

    #[error("Line {line}: Circular import detected: '{path}' is already being loaded")]
    CircularImport { line: usize, path: String },

    #[error("Cannot open module file '{path}'")]
    ModuleNotFound { path: String },

    #[error("Line {line}: 'this' used outside of a method")]
    ThisOutsideMethod { line: usize },

    #[error("Line {line}: 'super' used outside of a class with a parent")]
    SuperOutsideClass { line: usize },

    #[error("Line {line}: Cannot access property '{name}' on a non-object")]
    PropertyOnNonObject { line: usize, name: String },

    #[error("Line {line}: Failed to load module '{path}': {message}")]
    ModuleLoadError {
        line: usize,
        path: String,
        message: String,
    },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodegenError {
    #[error("Line {line}: call to '{name}' passes {argc} arguments; only 6 are supported, extra arguments are truncated")]
    TooManyArguments {
        line: usize,
        name: String,
        argc: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_error_display() {
        let e = EvalError::UndefinedVariable {
            line: 3,
            name: "x".into(),
        };
        assert_eq!(format!("{e}"), "Line 3: Undefined variable 'x'");
    }

    #[test]
    fn test_parse_error_display() {
        let e = ParseError::ExpectedToken {
            line: 1,
            expected: "')'".into(),
            found: "EOF".into(),
        };
        assert!(format!("{e}").contains("Expected ')'"));
    }

    #[test]
    fn test_lex_error_display() {
        let e = LexError::UnrecognizedChar { line: 2, ch: '@' };
        assert!(format!("{e}").contains('@'));
    }
}
