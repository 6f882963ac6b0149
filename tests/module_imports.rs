// ABOUTME: End-to-end tests for multi-file module imports and the full
// ABOUTME: lex/parse/interpret pipeline driven through real temp-dir source files

use std::path::PathBuf;
use xenly_core::interpreter::Interpreter;
use xenly_core::parser::parse_source;

fn unique_dir(name: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!(
        "xenly_test_{name}_{:?}",
        std::thread::current().id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn run_file(dir: &PathBuf, entry: &str) -> Result<(), xenly_core::error::EvalError> {
    let source = std::fs::read_to_string(dir.join(entry)).unwrap();
    let (program, lex_errors, parse_errors) = parse_source(&source);
    assert!(lex_errors.is_empty(), "{lex_errors:?}");
    assert!(parse_errors.is_empty(), "{parse_errors:?}");
    Interpreter::new(dir.clone()).run(&program)
}

#[test]
fn test_selective_import_across_files() {
    let dir = unique_dir("selective");
    std::fs::write(
        dir.join("mathutil.xe"),
        "export fn square(n) { return n * n }\nexport fn cube(n) { return n * n * n }\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("main.xe"),
        "from \"mathutil\" import square\nprint(square(5))\n",
    )
    .unwrap();

    let result = run_file(&dir, "main.xe");
    assert!(result.is_ok(), "{result:?}");
}

#[test]
fn test_import_of_undeclared_export_fails() {
    let dir = unique_dir("undeclared_export");
    std::fs::write(dir.join("mathutil.xe"), "export fn square(n) { return n * n }\n").unwrap();
    std::fs::write(
        dir.join("main.xe"),
        "from \"mathutil\" import cube\nprint(cube(2))\n",
    )
    .unwrap();

    let result = run_file(&dir, "main.xe");
    assert!(matches!(
        result,
        Err(xenly_core::error::EvalError::NotExported { .. })
    ));
}

#[test]
fn test_circular_import_is_detected() {
    let dir = unique_dir("circular");
    std::fs::write(dir.join("a.xe"), "import \"b\"\nprint(\"a\")\n").unwrap();
    std::fs::write(dir.join("b.xe"), "import \"a\"\nprint(\"b\")\n").unwrap();

    let result = run_file(&dir, "a.xe");
    assert!(matches!(
        result,
        Err(xenly_core::error::EvalError::CircularImport { .. })
    ));
}

#[test]
fn test_missing_module_file_is_reported() {
    let dir = unique_dir("missing_module");
    std::fs::write(dir.join("main.xe"), "import \"nowhere\"\n").unwrap();

    let result = run_file(&dir, "main.xe");
    assert!(matches!(
        result,
        Err(xenly_core::error::EvalError::ModuleNotFound { .. })
    ));
}

#[test]
fn test_nested_import_resolves_relative_to_module_dir() {
    let dir = unique_dir("nested");
    let sub = dir.join("lib");
    std::fs::create_dir_all(&sub).unwrap();
    std::fs::write(sub.join("base.xe"), "export fn one() { return 1 }\n").unwrap();
    std::fs::write(
        dir.join("main.xe"),
        "from \"lib/base\" import one\nprint(one())\n",
    )
    .unwrap();

    let result = run_file(&dir, "main.xe");
    assert!(result.is_ok(), "{result:?}");
}
