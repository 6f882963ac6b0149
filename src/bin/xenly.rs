// ABOUTME: The `xenly` interpreter driver -- lex/parse/interpret pipeline

use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use xenly_core::diagnostics;
use xenly_core::interpreter::Interpreter;
use xenly_core::parser::parse_source;
use xenly_core::typecheck;

/// Xenly: a small, dynamically typed, general-purpose programming language
#[derive(Parser, Debug)]
#[command(name = "xenly")]
#[command(version = "0.1.0")]
#[command(about = "Tree-walking interpreter for the Xenly language")]
#[command(disable_version_flag = true)]
struct CliArgs {
    /// Source file to run
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Show version
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    version: Option<bool>,

    /// Dump the token stream and exit
    #[arg(long = "tokens")]
    tokens: bool,

    /// Dump the parsed AST and exit
    #[arg(long = "ast")]
    ast: bool,

    /// Run the optional type-warning pass before executing
    #[arg(long = "warn-types")]
    warn_types: bool,
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let Some(path) = args.file else {
        print_usage();
        return ExitCode::SUCCESS;
    };

    let source = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(_) => {
            diagnostics::report_error_no_line(format!(
                "Cannot open file '{}'.",
                path.display()
            ));
            return ExitCode::FAILURE;
        }
    };

    if args.tokens {
        dump_tokens(&source);
        return ExitCode::SUCCESS;
    }

    let (program, lex_errors, parse_errors) = parse_source(&source);

    if !lex_errors.is_empty() || !parse_errors.is_empty() {
        for e in &lex_errors {
            diagnostics::report_error(lex_error_line(e), e);
        }
        for e in &parse_errors {
            diagnostics::report_error(parse_error_line(e), e);
        }
        return ExitCode::FAILURE;
    }

    if args.ast {
        println!("\n  -- AST --------------------------------------\n");
        for stmt in &program {
            println!("{stmt:#?}");
        }
        println!();
        return ExitCode::SUCCESS;
    }

    if args.warn_types {
        for w in typecheck::check_program(&program) {
            diagnostics::report_warning(w.line, w.message);
        }
    }

    let source_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let interp = Interpreter::new(source_dir);
    match interp.run(&program) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            diagnostics::report_error(eval_error_line(&e), e);
            ExitCode::FAILURE
        }
    }
}

fn lex_error_line(e: &xenly_core::error::LexError) -> usize {
    use xenly_core::error::LexError::*;
    match e {
        UnrecognizedChar { line, .. } => *line,
        UnterminatedString { line } => *line,
    }
}

fn parse_error_line(e: &xenly_core::error::ParseError) -> usize {
    use xenly_core::error::ParseError::*;
    match e {
        Unexpected { line, .. } => *line,
        ExpectedToken { line, .. } => *line,
    }
}

fn eval_error_line(e: &xenly_core::error::EvalError) -> usize {
    use xenly_core::error::EvalError::*;
    match e {
        UndefinedVariable { line, .. }
        | NotCallable { line, .. }
        | DivisionByZero { line }
        | TypeMismatch { line, .. }
        | UnknownMethod { line, .. }
        | NotAClass { line, .. }
        | UnknownParentClass { line, .. }
        | UnknownModule { line, .. }
        | UnknownModuleFunction { line, .. }
        | NotExported { line, .. }
        | CircularImport { line, .. }
        | ThisOutsideMethod { line }
        | SuperOutsideClass { line }
        | PropertyOnNonObject { line, .. }
        | ModuleLoadError { line, .. } => *line,
        ModuleNotFound { .. } => 0,
    }
}

fn dump_tokens(source: &str) {
    use xenly_core::lexer::Lexer;
    use xenly_core::token::TokenKind;

    let lexer = Lexer::new(source);
    let (tokens, errors) = lexer.tokenize();

    println!("\n  -- Token Stream -------------------------------\n");
    let mut count = 0;
    for t in &tokens {
        if t.kind == TokenKind::Newline {
            continue;
        }
        count += 1;
        if t.kind == TokenKind::Eof {
            println!("  {count:>3}  {:<12} (line {})", t.kind.to_string(), t.line);
        } else {
            println!(
                "  {count:>3}  {:<12} \"{}\"  (line {})",
                t.kind.to_string(),
                t.lexeme,
                t.line
            );
        }
    }
    println!();

    for e in &errors {
        diagnostics::report_error(lex_error_line(e), e);
    }
}

fn print_usage() {
    println!();
    println!("  Xenly -- a small, dynamically typed programming language");
    println!();
    println!("  Usage:  xenly [flags] <file.xe>");
    println!("  Flags:  --version, -v   Show version");
    println!("          --help, -h      Show this help");
    println!("          --tokens        Dump token stream");
    println!("          --ast           Dump AST tree");
    println!("          --warn-types    Run the optional type-warning pass");
    println!();
    println!("  Examples:");
    println!("          xenly main.xe");
    println!("          xenly --tokens main.xe");
    println!("          xenly --ast main.xe");
    println!();
}
