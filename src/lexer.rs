// ABOUTME: One-pass lexer turning Xenly source bytes into a token stream

use crate::error::LexError;
use crate::token::{lookup_keyword, Token, TokenKind};
use crate::unicode::{is_id_continue, is_id_start};

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn skip_whitespace_no_newline(&mut self) {
        while let Some(c) = self.peek() {
            if c == ' ' || c == '\t' || c == '\r' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn make(&self, kind: TokenKind, lexeme: impl Into<String>, line: usize, col: usize) -> Token {
        Token::new(kind, lexeme, line, col)
    }

    /// Produce the next token, or a lexical error.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace_no_newline();
        if let Some('#') = self.peek() {
            self.skip_comment();
            self.skip_whitespace_no_newline();
        }

        let line = self.line;
        let col = self.col;

        let Some(ch) = self.peek() else {
            return Ok(self.make(TokenKind::Eof, "", line, col));
        };

        if ch == '\n' {
            self.advance();
            return Ok(self.make(TokenKind::Newline, "\n", line, col));
        }

        if ch == '"' {
            return self.lex_string(line, col);
        }

        if ch.is_ascii_digit() || (ch == '.' && self.peek_next().is_some_and(|c| c.is_ascii_digit())) {
            return Ok(self.lex_number(line, col));
        }

        if is_id_start(ch) {
            return Ok(self.lex_identifier(line, col));
        }

        self.lex_operator(ch, line, col)
    }

    fn lex_string(&mut self, line: usize, col: usize) -> Result<Token, LexError> {
        self.advance(); // opening quote
        let mut s = String::new();
        loop {
            match self.peek() {
                None => return Err(LexError::UnterminatedString { line }),
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.advance() {
                        Some('n') => s.push('\n'),
                        Some('t') => s.push('\t'),
                        Some('\\') => s.push('\\'),
                        Some('"') => s.push('"'),
                        Some('r') => s.push('\r'),
                        Some('0') => s.push('\0'),
                        Some(other) => s.push(other),
                        None => return Err(LexError::UnterminatedString { line }),
                    }
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
            }
        }
        Ok(self.make(TokenKind::String, s, line, col))
    }

    fn lex_number(&mut self, line: usize, col: usize) -> Token {
        let mut s = String::new();
        let mut seen_dot = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                s.push(c);
                self.advance();
            } else if c == '.' && !seen_dot && self.peek_next().is_some_and(|n| n.is_ascii_digit()) {
                seen_dot = true;
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
        self.make(TokenKind::Number, s, line, col)
    }

    fn lex_identifier(&mut self, line: usize, col: usize) -> Token {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if is_id_continue(c) {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let kind = lookup_keyword(&s).unwrap_or(TokenKind::Identifier);
        self.make(kind, s, line, col)
    }

    fn lex_operator(&mut self, ch: char, line: usize, col: usize) -> Result<Token, LexError> {
        use TokenKind::*;
        self.advance();
        let two = self.peek();

        macro_rules! two_char {
            ($second:expr, $kind:expr, $lex:expr) => {
                if two == Some($second) {
                    self.advance();
                    return Ok(self.make($kind, $lex, line, col));
                }
            };
        }

        match ch {
            '=' => {
                two_char!('=', Eq, "==");
                Ok(self.make(Assign, "=", line, col))
            }
            '!' => {
                two_char!('=', NotEq, "!=");
                Err(LexError::UnrecognizedChar { line, ch: '!' })
            }
            '<' => {
                two_char!('=', Lte, "<=");
                Ok(self.make(Lt, "<", line, col))
            }
            '>' => {
                two_char!('=', Gte, ">=");
                Ok(self.make(Gt, ">", line, col))
            }
            '+' => {
                two_char!('=', PlusEq, "+=");
                two_char!('+', PlusPlus, "++");
                Ok(self.make(Plus, "+", line, col))
            }
            '-' => {
                two_char!('=', MinusEq, "-=");
                two_char!('-', MinusMinus, "--");
                Ok(self.make(Minus, "-", line, col))
            }
            '*' => {
                two_char!('=', StarEq, "*=");
                Ok(self.make(Star, "*", line, col))
            }
            '/' => {
                two_char!('=', SlashEq, "/=");
                Ok(self.make(Slash, "/", line, col))
            }
            '%' => Ok(self.make(Percent, "%", line, col)),
            '(' => Ok(self.make(LParen, "(", line, col)),
            ')' => Ok(self.make(RParen, ")", line, col)),
            '{' => Ok(self.make(LBrace, "{", line, col)),
            '}' => Ok(self.make(RBrace, "}", line, col)),
            '[' => Ok(self.make(LBracket, "[", line, col)),
            ']' => Ok(self.make(RBracket, "]", line, col)),
            ',' => Ok(self.make(Comma, ",", line, col)),
            '.' => Ok(self.make(Dot, ".", line, col)),
            ':' => Ok(self.make(Colon, ":", line, col)),
            ';' => Ok(self.make(Semicolon, ";", line, col)),
            other => Err(LexError::UnrecognizedChar { line, ch: other }),
        }
    }

    /// Lex the whole source into a vector of tokens, stopping at EOF.
    /// On the first lexical error, an `Error` token is substituted and lexing
    /// continues from the next character so callers can batch-report.
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<LexError>) {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();
        loop {
            match self.next_token() {
                Ok(tok) => {
                    let is_eof = tok.kind == TokenKind::Eof;
                    tokens.push(tok);
                    if is_eof {
                        break;
                    }
                }
                Err(e) => {
                    let (line, col) = (self.line, self.col);
                    errors.push(e);
                    tokens.push(Token::new(TokenKind::Error, "", line, col));
                }
            }
        }
        (tokens, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let (toks, errs) = Lexer::new(src).tokenize();
        assert!(errs.is_empty(), "unexpected lex errors: {errs:?}");
        toks.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_numbers() {
        let (toks, _) = Lexer::new("42 3.14 .5").tokenize();
        let lexemes: Vec<_> = toks.iter().map(|t| t.lexeme.as_str()).collect();
        assert_eq!(lexemes[0], "42");
        assert_eq!(lexemes[1], "3.14");
        assert_eq!(lexemes[2], ".5");
    }

    #[test]
    fn test_string_escapes() {
        let (toks, _) = Lexer::new(r#""a\nb\t\"c\\""#).tokenize();
        assert_eq!(toks[0].lexeme, "a\nb\t\"c\\");
    }

    #[test]
    fn test_unterminated_string() {
        let (_, errs) = Lexer::new("\"abc").tokenize();
        assert!(matches!(errs[0], LexError::UnterminatedString { .. }));
    }

    #[test]
    fn test_two_char_operators_greedy() {
        let ks = kinds("== != <= >= += -= *= /= ++ --");
        assert_eq!(
            ks,
            vec![
                TokenKind::Eq,
                TokenKind::NotEq,
                TokenKind::Lte,
                TokenKind::Gte,
                TokenKind::PlusEq,
                TokenKind::MinusEq,
                TokenKind::StarEq,
                TokenKind::SlashEq,
                TokenKind::PlusPlus,
                TokenKind::MinusMinus,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_vs_identifiers() {
        let ks = kinds("var x fn class foo");
        assert_eq!(
            ks,
            vec![
                TokenKind::Var,
                TokenKind::Identifier,
                TokenKind::Fn,
                TokenKind::Class,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comment_to_end_of_line() {
        let ks = kinds("var x # comment here\nvar y");
        assert_eq!(
            ks,
            vec![
                TokenKind::Var,
                TokenKind::Identifier,
                TokenKind::Newline,
                TokenKind::Var,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_newline_is_a_token() {
        let ks = kinds("1\n2");
        assert_eq!(
            ks,
            vec![TokenKind::Number, TokenKind::Newline, TokenKind::Number, TokenKind::Eof]
        );
    }

    #[test]
    fn test_unrecognized_byte() {
        let (_, errs) = Lexer::new("@").tokenize();
        assert!(matches!(errs[0], LexError::UnrecognizedChar { ch: '@', .. }));
    }

    #[test]
    fn test_unicode_identifier() {
        let (toks, errs) = Lexer::new("var caf\u{00e9} = 1").tokenize();
        assert!(errs.is_empty());
        assert_eq!(toks[1].kind, TokenKind::Identifier);
        assert_eq!(toks[1].lexeme, "caf\u{00e9}");
    }
}
