// ABOUTME: Shared stderr diagnostic formatting for the xenly/xenlyc drivers

const RED: &str = "\x1b[1;31m";
const YELLOW: &str = "\x1b[1;33m";
const RESET: &str = "\x1b[0m";

/// Prints `[Xenly Error] Line N: <message>` in red to stderr, matching the
/// reference drivers' uniform error surface across lex/parse/eval/codegen
/// failures.
pub fn report_error(line: usize, message: impl std::fmt::Display) {
    eprintln!("{RED}[Xenly Error] Line {line}: {message}{RESET}");
}

/// Same uniform surface but without a line number, for errors that aren't
/// tied to a specific source location (e.g. "file not found").
pub fn report_error_no_line(message: impl std::fmt::Display) {
    eprintln!("{RED}[Xenly Error] {message}{RESET}");
}

/// Non-fatal warnings (codegen argument truncation, `--warn-types` findings).
pub fn report_warning(line: usize, message: impl std::fmt::Display) {
    eprintln!("{YELLOW}[Xenly Warning] Line {line}: {message}{RESET}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_are_valid_ansi_escapes() {
        assert!(RED.starts_with("\x1b["));
        assert!(YELLOW.starts_with("\x1b["));
        assert_eq!(RESET, "\x1b[0m");
    }
}
