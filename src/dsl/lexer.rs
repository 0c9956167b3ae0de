use serde::Serialize;

use super::error::CompileError;
use super::instruction::Register;

/// Byte range of a token in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Number(f64),
    String(String),
    /// Text between `{` and `}`, handed to the expression parser.
    Expression(String),
    TimePattern(String),
    Register(Register),
    Name(String),

    // Reserved words
    All,
    And,
    As,
    Assign,
    At,
    Begin,
    Break,
    Column,
    Cycle,
    Define,
    Else,
    End,
    From,
    Get,
    Group,
    If,
    In,
    Location,
    Logical,
    Off,
    On,
    Or,
    Print,
    Println,
    Printf,
    Raw,
    Repeat,
    Row,
    Set,
    To,
    Top,
    Units,
    Wait,
    While,
    With,
    Zone,

    // Special
    Unknown(String),
    Eof,
}

impl Token {
    /// Short human-readable form for error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {n}"),
            Token::String(s) => format!("\"{s}\""),
            Token::Expression(e) => format!("{{{e}}}"),
            Token::TimePattern(p) => format!("time pattern {p}"),
            Token::Register(r) => r.name().to_string(),
            Token::Name(n) | Token::Unknown(n) => format!("\"{n}\""),
            Token::Eof => "end of input".to_string(),
            other => format!("{other:?}").to_lowercase(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

pub fn lex(source: &str) -> Result<Vec<SpannedToken>, Vec<CompileError>> {
    let mut lexer = Lexer::new(source);
    lexer.tokenize()
}

struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    tokens: Vec<SpannedToken>,
    errors: Vec<CompileError>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn tokenize(&mut self) -> Result<Vec<SpannedToken>, Vec<CompileError>> {
        loop {
            self.skip_whitespace_and_comments();
            let Some(ch) = self.peek() else {
                break;
            };
            let start = self.pos;

            match ch {
                b'"' => {
                    self.pos += 1;
                    self.lex_string(start);
                }
                b'{' => {
                    self.pos += 1;
                    self.lex_expression(start);
                }
                b'0'..=b'9' | b'*' => {
                    if !self.lex_time_pattern(start) {
                        self.lex_number(start);
                    }
                }
                b'-' | b'.'
                    if self.peek_at(1).is_some_and(|c| c.is_ascii_digit() || c == b'.') =>
                {
                    self.lex_number(start);
                }
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                    self.lex_word(start);
                }
                _ => {
                    let c = self.source[start..].chars().next().unwrap_or('?');
                    self.pos += c.len_utf8();
                    self.push(Token::Unknown(c.to_string()), start, self.pos);
                }
            }
        }

        self.tokens.push(SpannedToken {
            token: Token::Eof,
            span: Span::new(self.pos, self.pos),
        });

        if self.errors.is_empty() {
            Ok(std::mem::take(&mut self.tokens))
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn push(&mut self, token: Token, start: usize, end: usize) {
        self.tokens.push(SpannedToken {
            token,
            span: Span::new(start, end),
        });
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(ch) = self.peek() {
            match ch {
                b' ' | b'\t' | b'\n' | b'\r' => self.pos += 1,
                b'#' => {
                    while self.peek().is_some_and(|c| c != b'\n') {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) {
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
    }

    fn lex_string(&mut self, start: usize) {
        let str_start = self.pos;
        self.take_while(|c| c != b'"');
        let s = self.source[str_start..self.pos].to_string();
        if self.peek() == Some(b'"') {
            self.pos += 1;
            self.push(Token::String(s), start, self.pos);
        } else {
            self.errors.push(CompileError::lexer(
                "Unterminated string literal",
                Span::new(start, self.pos),
            ));
        }
    }

    fn lex_expression(&mut self, start: usize) {
        let body_start = self.pos;
        let mut depth = 1usize;
        while let Some(ch) = self.peek() {
            match ch {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
        if depth != 0 {
            self.errors.push(CompileError::lexer(
                "Unterminated expression: missing '}'",
                Span::new(start, self.pos),
            ));
            return;
        }
        let body = self.source[body_start..self.pos].trim().to_string();
        self.pos += 1;
        self.push(Token::Expression(body), start, self.pos);
    }

    /// Lex `HH:MM` with `*` wildcards. Leaves the position untouched and
    /// returns false when the text is not a time pattern.
    fn lex_time_pattern(&mut self, start: usize) -> bool {
        let is_part = |c: u8| c.is_ascii_digit() || c == b'*';
        let mut end = start;
        while self.bytes.get(end).copied().is_some_and(is_part) {
            end += 1;
        }
        if self.bytes.get(end) == Some(&b':') {
            let mut minute_end = end + 1;
            while self.bytes.get(minute_end).copied().is_some_and(is_part) {
                minute_end += 1;
            }
            self.pos = minute_end;
        } else if self.source[start..end].contains('*') {
            self.pos = end;
        } else {
            return false;
        }
        let text = self.source[start..self.pos].to_string();
        self.push(Token::TimePattern(text), start, self.pos);
        true
    }

    fn lex_number(&mut self, start: usize) {
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        self.take_while(|c| c.is_ascii_digit());
        if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
            self.take_while(|c| c.is_ascii_digit());
        }
        let text = &self.source[start..self.pos];
        match text.parse::<f64>() {
            Ok(v) => self.push(Token::Number(v), start, self.pos),
            Err(_) => {
                // A lone '-' or '.' that did not lead into digits.
                if self.pos == start {
                    self.pos += 1;
                }
                let text = self.source[start..self.pos].to_string();
                self.push(Token::Unknown(text), start, self.pos);
            }
        }
    }

    fn lex_word(&mut self, start: usize) {
        self.take_while(|c| c.is_ascii_alphanumeric() || c == b'_');
        let word = &self.source[start..self.pos];
        let token = match word {
            "all" => Token::All,
            "and" => Token::And,
            "as" => Token::As,
            "assign" => Token::Assign,
            "at" => Token::At,
            "begin" => Token::Begin,
            "break" => Token::Break,
            "column" => Token::Column,
            "cycle" => Token::Cycle,
            "define" => Token::Define,
            "else" => Token::Else,
            "end" => Token::End,
            "from" => Token::From,
            "get" => Token::Get,
            "group" => Token::Group,
            "if" => Token::If,
            "in" => Token::In,
            "location" => Token::Location,
            "logical" => Token::Logical,
            "off" => Token::Off,
            "on" => Token::On,
            "or" => Token::Or,
            "print" => Token::Print,
            "println" => Token::Println,
            "printf" => Token::Printf,
            "raw" => Token::Raw,
            "repeat" => Token::Repeat,
            "row" => Token::Row,
            "set" => Token::Set,
            "to" => Token::To,
            "top" => Token::Top,
            "units" => Token::Units,
            "wait" => Token::Wait,
            "while" => Token::While,
            "with" => Token::With,
            "zone" => Token::Zone,
            _ => match Register::from_word(word) {
                Some(reg) => Token::Register(reg),
                None => Token::Name(word.to_string()),
            },
        };
        self.push(token, start, self.pos);
    }
}
