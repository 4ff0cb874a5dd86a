/// Lexer for GeneQL query text
///
/// Produces tokens lazily: `Lexer` is an iterator that yields one token per
/// call, ending with a single `Eof` token. A lexical error ends the stream.
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Location of a token in the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Byte offset from the start of the input
    pub offset: usize,
    /// 1-based line number
    pub line: usize,
    /// 1-based column, counted in characters
    pub column: usize,
}

impl Position {
    /// Position of the first character of the input
    pub const START: Position = Position {
        offset: 0,
        line: 1,
        column: 1,
    };
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}, column {} (byte {})",
            self.line, self.column, self.offset
        )
    }
}

/// Token types produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords
    Get,
    Check,
    Grant,
    Revoke,
    Update,
    Delete,
    On,
    To,
    From,
    Where,
    And,
    Or,
    SelfRef,
    Can,
    Set,
    True,
    False,

    // Literals
    Identifier(String),
    String(String),
    Integer(i64),
    Float(f64),

    // Operators
    Eq, // =
    Ne, // !=

    // Punctuation
    LeftParen,  // (
    RightParen, // )
    Comma,      // ,
    Dot,        // .
    Asterisk,   // *
    Colon,      // :

    // End of input
    Eof,
}

impl TokenKind {
    /// Keyword lookup; keywords are case-sensitive
    fn keyword(text: &str) -> Option<TokenKind> {
        let kind = match text {
            "GET" => TokenKind::Get,
            "CHECK" => TokenKind::Check,
            "GRANT" => TokenKind::Grant,
            "REVOKE" => TokenKind::Revoke,
            "UPDATE" => TokenKind::Update,
            "DELETE" => TokenKind::Delete,
            "ON" => TokenKind::On,
            "TO" => TokenKind::To,
            "FROM" => TokenKind::From,
            "WHERE" => TokenKind::Where,
            "AND" => TokenKind::And,
            "OR" => TokenKind::Or,
            "SELF" => TokenKind::SelfRef,
            "CAN" => TokenKind::Can,
            "SET" => TokenKind::Set,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => return None,
        };
        Some(kind)
    }

    /// Whether `text` would lex as a keyword rather than an identifier
    pub fn is_reserved(text: &str) -> bool {
        Self::keyword(text).is_some()
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Get => write!(f, "GET"),
            TokenKind::Check => write!(f, "CHECK"),
            TokenKind::Grant => write!(f, "GRANT"),
            TokenKind::Revoke => write!(f, "REVOKE"),
            TokenKind::Update => write!(f, "UPDATE"),
            TokenKind::Delete => write!(f, "DELETE"),
            TokenKind::On => write!(f, "ON"),
            TokenKind::To => write!(f, "TO"),
            TokenKind::From => write!(f, "FROM"),
            TokenKind::Where => write!(f, "WHERE"),
            TokenKind::And => write!(f, "AND"),
            TokenKind::Or => write!(f, "OR"),
            TokenKind::SelfRef => write!(f, "SELF"),
            TokenKind::Can => write!(f, "CAN"),
            TokenKind::Set => write!(f, "SET"),
            TokenKind::True => write!(f, "true"),
            TokenKind::False => write!(f, "false"),
            TokenKind::Identifier(id) => write!(f, "identifier '{}'", id),
            TokenKind::String(s) => write!(f, "string {:?}", s),
            TokenKind::Integer(i) => write!(f, "number {}", i),
            TokenKind::Float(fl) => write!(f, "number {:?}", fl),
            TokenKind::Eq => write!(f, "'='"),
            TokenKind::Ne => write!(f, "'!='"),
            TokenKind::LeftParen => write!(f, "'('"),
            TokenKind::RightParen => write!(f, "')'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::Dot => write!(f, "'.'"),
            TokenKind::Asterisk => write!(f, "'*'"),
            TokenKind::Colon => write!(f, "':'"),
            TokenKind::Eof => write!(f, "end of query"),
        }
    }
}

/// A token: its kind, the exact source text it was read from, and where
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub position: Position,
}

/// Kinds of lexical failure
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexErrorKind {
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("invalid escape sequence '\\{0}'")]
    InvalidEscape(char),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
}

/// Lexer error with the position of the offending input
#[derive(Debug, Clone, PartialEq, Error)]
#[error("lexical error at {position}: {kind}")]
pub struct LexError {
    pub position: Position,
    pub kind: LexErrorKind,
}

/// Lexer state
pub struct Lexer<'a> {
    input: &'a str,
    offset: usize,
    line: usize,
    column: usize,
    finished: bool,
}

/// Tokenize `input` lazily
pub fn tokenize(input: &str) -> Lexer<'_> {
    Lexer::new(input)
}

impl<'a> Lexer<'a> {
    /// Create a new lexer over the input string
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            offset: 0,
            line: 1,
            column: 1,
            finished: false,
        }
    }

    /// Current position in the input
    pub fn current_position(&self) -> Position {
        Position {
            offset: self.offset,
            line: self.line,
            column: self.column,
        }
    }

    /// Read the next token
    pub fn next_token(&mut self) -> Result<Token<'a>, LexError> {
        self.skip_trivia();

        let start = self.current_position();
        let ch = match self.current_char() {
            Some(ch) => ch,
            None => return Ok(self.token(TokenKind::Eof, start)),
        };

        let single = match ch {
            '(' => Some(TokenKind::LeftParen),
            ')' => Some(TokenKind::RightParen),
            ',' => Some(TokenKind::Comma),
            '.' => Some(TokenKind::Dot),
            '*' => Some(TokenKind::Asterisk),
            ':' => Some(TokenKind::Colon),
            '=' => Some(TokenKind::Eq),
            _ => None,
        };
        if let Some(kind) = single {
            self.advance();
            return Ok(self.token(kind, start));
        }

        match ch {
            '!' => {
                self.advance();
                if self.current_char() == Some('=') {
                    self.advance();
                    return Ok(self.token(TokenKind::Ne, start));
                }
                Err(LexError {
                    position: start,
                    kind: LexErrorKind::UnexpectedCharacter('!'),
                })
            }
            '"' => self.read_string(start),
            '-' if self.peek_char().is_some_and(|c| c.is_ascii_digit()) => self.read_number(start),
            c if c.is_ascii_digit() => self.read_number(start),
            c if c.is_ascii_alphabetic() || c == '_' => Ok(self.read_identifier_or_keyword(start)),
            other => Err(LexError {
                position: start,
                kind: LexErrorKind::UnexpectedCharacter(other),
            }),
        }
    }

    fn token(&self, kind: TokenKind, start: Position) -> Token<'a> {
        Token {
            kind,
            text: &self.input[start.offset..self.offset],
            position: start,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.offset..].chars().next()
    }

    fn peek_char(&self) -> Option<char> {
        let mut chars = self.input[self.offset..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.offset += ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    /// Skip whitespace and `--` comments
    fn skip_trivia(&mut self) {
        loop {
            match self.current_char() {
                Some(ch) if ch.is_whitespace() => self.advance(),
                Some('-') if self.peek_char() == Some('-') => {
                    while let Some(ch) = self.current_char() {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn consume_digits(&mut self) {
        while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn read_number(&mut self, start: Position) -> Result<Token<'a>, LexError> {
        if self.current_char() == Some('-') {
            self.advance();
        }
        self.consume_digits();

        let mut is_float = false;
        if self.current_char() == Some('.') && self.peek_char().is_some_and(|c| c.is_ascii_digit())
        {
            is_float = true;
            self.advance();
            self.consume_digits();
        }

        if matches!(self.current_char(), Some('e') | Some('E')) {
            let mut rest = self.input[self.offset..].chars().skip(1);
            let exponent_follows = match rest.next() {
                Some('+') | Some('-') => rest.next().is_some_and(|c| c.is_ascii_digit()),
                Some(c) => c.is_ascii_digit(),
                None => false,
            };
            if exponent_follows {
                is_float = true;
                self.advance();
                if matches!(self.current_char(), Some('+') | Some('-')) {
                    self.advance();
                }
                self.consume_digits();
            }
        }

        let text = &self.input[start.offset..self.offset];
        let invalid = || LexError {
            position: start,
            kind: LexErrorKind::InvalidNumber(text.to_string()),
        };

        let kind = if is_float {
            text.parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(TokenKind::Float)
                .ok_or_else(invalid)?
        } else {
            text.parse::<i64>()
                .map(TokenKind::Integer)
                .map_err(|_| invalid())?
        };

        Ok(self.token(kind, start))
    }

    fn read_string(&mut self, start: Position) -> Result<Token<'a>, LexError> {
        self.advance(); // skip opening quote
        let mut value = String::new();

        loop {
            let escape_position = self.current_position();
            match self.current_char() {
                None => {
                    return Err(LexError {
                        position: start,
                        kind: LexErrorKind::UnterminatedString,
                    })
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    let escaped = match self.current_char() {
                        Some('"') => '"',
                        Some('\\') => '\\',
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some(other) => {
                            return Err(LexError {
                                position: escape_position,
                                kind: LexErrorKind::InvalidEscape(other),
                            })
                        }
                        None => {
                            return Err(LexError {
                                position: start,
                                kind: LexErrorKind::UnterminatedString,
                            })
                        }
                    };
                    value.push(escaped);
                    self.advance();
                }
                Some(ch) => {
                    value.push(ch);
                    self.advance();
                }
            }
        }

        Ok(self.token(TokenKind::String(value), start))
    }

    fn read_identifier_or_keyword(&mut self, start: Position) -> Token<'a> {
        while self
            .current_char()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.advance();
        }

        let text = &self.input[start.offset..self.offset];
        let kind = TokenKind::keyword(text).unwrap_or_else(|| TokenKind::Identifier(text.to_string()));
        self.token(kind, start)
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = self.next_token();
        match &result {
            Ok(token) if token.kind == TokenKind::Eof => self.finished = true,
            Err(_) => self.finished = true,
            Ok(_) => {}
        }
        Some(result)
    }
}

impl std::iter::FusedIterator for Lexer<'_> {}
