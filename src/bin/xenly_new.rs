// ABOUTME: The `xenly-new` project scaffolder

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use xenly_core::diagnostics;

const MAIN_XE: &str = "print(\"Hello, World!\")\n\nprint(2*9-6/3*5)\n";

/// Scaffold a new Xenly project directory
#[derive(Parser, Debug)]
#[command(name = "xenly-new")]
#[command(version = "0.1.0")]
#[command(about = "Create a new Xenly project skeleton")]
struct CliArgs {
    /// Name of the project to create
    #[arg(long = "create-project", value_name = "NAME")]
    create_project: Option<String>,
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let Some(name) = args.create_project else {
        println!();
        println!("  xenly-new -- scaffold a new Xenly project");
        println!();
        println!("  Usage:  xenly-new --create-project <name>");
        println!();
        return ExitCode::SUCCESS;
    };

    let dir = PathBuf::from(format!("{name}_project"));
    if std::fs::create_dir(&dir).is_err() {
        diagnostics::report_error_no_line(format!(
            "Unable to create project directory '{}'",
            dir.display()
        ));
        return ExitCode::FAILURE;
    }

    if std::fs::write(dir.join("main.xe"), MAIN_XE).is_err() {
        diagnostics::report_error_no_line("Unable to create source file");
        return ExitCode::FAILURE;
    }

    const GREEN_BG: &str = "\x1b[42m";
    const WHITE: &str = "\x1b[1;37m";
    const RESET: &str = "\x1b[0m";

    println!(
        "New Xenly project initialized in {GREEN_BG}{WHITE} '{}' {RESET} folder.",
        dir.display()
    );

    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_xe_template_matches_reference_program() {
        assert!(MAIN_XE.contains("Hello, World!"));
        assert!(MAIN_XE.contains("print(2*9-6/3*5)"));
    }
}
