// ABOUTME: The `xenlyc` native compiler driver -- lex/parse/codegen/assemble/link

use clap::{ArgAction, Parser};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};
use xenly_core::codegen::Codegen;
use xenly_core::diagnostics;
use xenly_core::parser::parse_source;

/// Xenly: native x86-64 compiler
#[derive(Parser, Debug)]
#[command(name = "xenlyc")]
#[command(version = "0.1.0")]
#[command(about = "Native x86-64 compiler for the Xenly language")]
#[command(disable_version_flag = true)]
struct CliArgs {
    /// Source file to compile
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Show version
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    version: Option<bool>,

    /// Output binary name
    #[arg(short = 'o', value_name = "OUT")]
    output: Option<PathBuf>,

    /// Emit assembly only (writes <input>.s, no assemble/link)
    #[arg(long = "emit-asm")]
    emit_asm: bool,
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let Some(input) = args.file else {
        print_usage();
        return ExitCode::SUCCESS;
    };

    let source = match std::fs::read_to_string(&input) {
        Ok(s) => s,
        Err(_) => {
            diagnostics::report_error_no_line(format!("Cannot open '{}'", input.display()));
            return ExitCode::FAILURE;
        }
    };

    let (program, lex_errors, parse_errors) = parse_source(&source);
    if !lex_errors.is_empty() || !parse_errors.is_empty() {
        diagnostics::report_error_no_line("Parse errors; aborting.");
        return ExitCode::FAILURE;
    }

    let (asm, warnings) = Codegen::compile(&program);
    for w in &warnings {
        diagnostics::report_warning(warning_line(w), w);
    }

    let asm_path = swap_ext(&input, "s");
    if std::fs::write(&asm_path, asm).is_err() {
        diagnostics::report_error_no_line("Code generation failed.");
        return ExitCode::FAILURE;
    }

    if args.emit_asm {
        println!("[xenlyc] Assembly written to {}", asm_path.display());
        return ExitCode::SUCCESS;
    }

    let obj_path = swap_ext(&input, "o");
    let as_status = Command::new("as")
        .args(["--64", "-o"])
        .arg(&obj_path)
        .arg(&asm_path)
        .status();

    match as_status {
        Ok(status) if status.success() => {}
        Ok(status) => {
            diagnostics::report_error_no_line(format!(
                "Assembly failed (status {})",
                status.code().unwrap_or(-1)
            ));
            return ExitCode::FAILURE;
        }
        Err(e) => {
            diagnostics::report_error_no_line(format!("Could not run 'as': {e}"));
            return ExitCode::FAILURE;
        }
    }

    let out_name = args.output.unwrap_or_else(|| PathBuf::from("a.out"));
    let rt_dir = runtime_library_dir();

    let link_status = Command::new("gcc")
        .arg("-o")
        .arg(&out_name)
        .arg(&obj_path)
        .arg(format!("-L{}", rt_dir.display()))
        .args(["-lxly_rt", "-lm"])
        .status();

    match link_status {
        Ok(status) if status.success() => {
            println!("[xenlyc] OK  ->  {}", out_name.display());
        }
        Ok(status) => {
            diagnostics::report_error_no_line(format!(
                "Link failed (status {})",
                status.code().unwrap_or(-1)
            ));
            let _ = std::fs::remove_file(&asm_path);
            let _ = std::fs::remove_file(&obj_path);
            return ExitCode::FAILURE;
        }
        Err(e) => {
            diagnostics::report_error_no_line(format!("Could not run 'gcc': {e}"));
            let _ = std::fs::remove_file(&asm_path);
            let _ = std::fs::remove_file(&obj_path);
            return ExitCode::FAILURE;
        }
    }

    let _ = std::fs::remove_file(&asm_path);
    let _ = std::fs::remove_file(&obj_path);

    ExitCode::SUCCESS
}

fn warning_line(w: &xenly_core::error::CodegenError) -> usize {
    let xenly_core::error::CodegenError::TooManyArguments { line, .. } = w;
    *line
}

/// Replaces a trailing `.xe` extension with `ext`, or appends `.ext` if absent.
fn swap_ext(path: &Path, ext: &str) -> PathBuf {
    if path.extension().and_then(|e| e.to_str()) == Some("xe") {
        path.with_extension(ext)
    } else {
        let mut s = path.as_os_str().to_owned();
        s.push(".");
        s.push(ext);
        PathBuf::from(s)
    }
}

/// Derives the directory to search for `libxly_rt.a` from the running
/// executable's own path, mirroring the reference driver's argv[0]-relative
/// lookup so the runtime library ships alongside the compiler binary.
fn runtime_library_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn print_usage() {
    println!();
    println!("  xenlyc -- Xenly native compiler");
    println!();
    println!("  Usage:   xenlyc [options] <file.xe>");
    println!();
    println!("  Options:");
    println!("          -o <file>      Output binary name (default: a.out)");
    println!("          --emit-asm     Emit assembly only (writes .s, no link)");
    println!("          --version      Show version");
    println!("          --help         Show this help");
    println!();
    println!("  Examples:");
    println!("          xenlyc main.xe                  -> ./a.out");
    println!("          xenlyc main.xe -o main          -> ./main");
    println!("          xenlyc --emit-asm main.xe       -> main.s");
    println!();
}
