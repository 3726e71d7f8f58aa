#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Equal,
    EqualEqual,
    LessGreater,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Newline,
    Identifier(String),
    Int(i64),
    Double(f64),
    String(String),
    IntType,
    DoubleType,
    Input,
    Output,
    If,
    Then,
    Else,
    EndIf,
    While,
    Do,
    EndWhile,
    For,
    To,
    Next,
    Subroutine,
    EndSubroutine,
    Return,
    Eof,
}

impl TokenKind {
    pub fn keyword(word: &str) -> Option<Self> {
        let kind = match word {
            "INT" => TokenKind::IntType,
            "DOUBLE" => TokenKind::DoubleType,
            "INPUT" => TokenKind::Input,
            "OUTPUT" => TokenKind::Output,
            "IF" => TokenKind::If,
            "THEN" => TokenKind::Then,
            "ELSE" => TokenKind::Else,
            "ENDIF" => TokenKind::EndIf,
            "WHILE" => TokenKind::While,
            "DO" => TokenKind::Do,
            "ENDWHILE" => TokenKind::EndWhile,
            "FOR" => TokenKind::For,
            "TO" => TokenKind::To,
            "NEXT" => TokenKind::Next,
            "SUBROUTINE" => TokenKind::Subroutine,
            "ENDSUBROUTINE" => TokenKind::EndSubroutine,
            "RETURN" => TokenKind::Return,
            _ => return None,
        };
        Some(kind)
    }

    /// True when both kinds are the same variant, ignoring literal payloads.
    pub fn same_kind(&self, other: &TokenKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: String, line: usize, column: usize) -> Self {
        Self {
            kind,
            lexeme,
            line,
            column,
        }
    }

    /// Text used when a token shows up in a diagnostic.
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::Newline => "line break".to_string(),
            _ => format!("'{}'", self.lexeme),
        }
    }
}
