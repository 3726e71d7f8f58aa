pub mod token;

use std::fmt;

use log::warn;
use token::{Token, TokenKind};

/// A character the lexer could not classify. Lexing continues past it.
#[derive(Debug, Clone, PartialEq)]
pub struct LexDiagnostic {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl LexDiagnostic {
    fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for LexDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lex warning at line {}, column {}: {}",
            self.line, self.column, self.message
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexOutput {
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<LexDiagnostic>,
}

pub fn lex(source: &str) -> LexOutput {
    Lexer::new(source).lex()
}

struct Lexer {
    chars: Vec<char>,
    current: usize,
    start: usize,
    line: usize,
    column: usize,
    token_line: usize,
    token_column: usize,
    tokens: Vec<Token>,
    diagnostics: Vec<LexDiagnostic>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            current: 0,
            start: 0,
            line: 1,
            column: 1,
            token_line: 1,
            token_column: 1,
            tokens: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn lex(mut self) -> LexOutput {
        while !self.is_at_end() {
            self.start_token();
            self.scan_token();
        }

        self.tokens.push(Token::new(
            TokenKind::Eof,
            String::new(),
            self.line,
            self.column,
        ));

        LexOutput {
            tokens: self.tokens,
            diagnostics: self.diagnostics,
        }
    }

    fn scan_token(&mut self) {
        let c = self.advance();
        match c {
            '(' => self.add_token(TokenKind::LeftParen),
            ')' => self.add_token(TokenKind::RightParen),
            '[' => self.add_token(TokenKind::LeftBracket),
            ']' => self.add_token(TokenKind::RightBracket),
            ',' => self.add_token(TokenKind::Comma),
            '+' => self.add_token(TokenKind::Plus),
            '-' => self.add_token(TokenKind::Minus),
            '*' => self.add_token(TokenKind::Star),
            '/' => self.add_token(TokenKind::Slash),
            '%' => self.add_token(TokenKind::Percent),
            '\n' => {
                while self.peek() == '\n' {
                    self.advance();
                }
                self.add_token(TokenKind::Newline);
            }
            '=' => {
                if self.matches('=') {
                    self.add_token(TokenKind::EqualEqual);
                } else {
                    self.add_token(TokenKind::Equal);
                }
            }
            '<' => {
                if self.matches('=') {
                    self.add_token(TokenKind::LessEqual);
                } else if self.matches('>') {
                    self.add_token(TokenKind::LessGreater);
                } else {
                    self.add_token(TokenKind::Less);
                }
            }
            '>' => {
                if self.matches('=') {
                    self.add_token(TokenKind::GreaterEqual);
                } else {
                    self.add_token(TokenKind::Greater);
                }
            }
            '"' => self.string(),
            ' ' | '\r' | '\t' => {}
            d if d.is_ascii_digit() => self.number(),
            a if is_ident_start(a) => self.identifier(),
            _ => self.report(format!("illegal character '{}'", c)),
        }
    }

    fn string(&mut self) {
        let mut lookahead = self.current;
        while lookahead < self.chars.len() && !matches!(self.chars[lookahead], '"' | '\n') {
            lookahead += 1;
        }

        if lookahead >= self.chars.len() || self.chars[lookahead] == '\n' {
            // Only the opening quote is skipped; the rest is lexed as ordinary input.
            self.report("illegal character '\"'");
            return;
        }

        let value: String = self.chars[self.current..lookahead].iter().collect();
        while self.current <= lookahead {
            self.advance();
        }
        self.add_token(TokenKind::String(value));
    }

    fn number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        let mut is_double = false;
        if self.peek() == '.' {
            is_double = true;
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let lexeme = self.current_lexeme();
        if is_double {
            match lexeme.parse::<f64>() {
                Ok(value) => self.add_token(TokenKind::Double(value)),
                Err(_) => self.report(format!("invalid double literal '{}'", lexeme)),
            }
        } else {
            match lexeme.parse::<i64>() {
                Ok(value) => self.add_token(TokenKind::Int(value)),
                Err(_) => self.add_token(TokenKind::Int(i64::MAX)),
            }
        }
    }

    fn identifier(&mut self) {
        while is_ident_continue(self.peek()) {
            self.advance();
        }

        let lexeme = self.current_lexeme();
        let kind = TokenKind::keyword(&lexeme).unwrap_or(TokenKind::Identifier(lexeme));
        self.add_token(kind);
    }

    fn report(&mut self, message: impl Into<String>) {
        let diagnostic = LexDiagnostic::new(message, self.token_line, self.token_column);
        warn!("{}", diagnostic);
        self.diagnostics.push(diagnostic);
    }

    fn add_token(&mut self, kind: TokenKind) {
        let lexeme = self.current_lexeme();
        self.tokens
            .push(Token::new(kind, lexeme, self.token_line, self.token_column));
    }

    fn start_token(&mut self) {
        self.start = self.current;
        self.token_line = self.line;
        self.token_column = self.column;
    }

    fn current_lexeme(&self) -> String {
        self.chars[self.start..self.current].iter().collect()
    }

    fn matches(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.peek() != expected {
            return false;
        }
        self.advance();
        true
    }

    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.chars[self.current]
        }
    }

    fn advance(&mut self) -> char {
        let c = self.chars[self.current];
        self.current += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.chars.len()
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}
