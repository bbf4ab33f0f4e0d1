use std::{iter::Peekable, num::ParseIntError};

use crate::token::{Pos, Span, Token, TokenKind, KEYWORDS};

pub const SUGGESTED_TOKENS_CAPACITY: usize = 8_192;

/// Lexes the provided string, producing the tokens into the provided buffer.
pub fn lex(src: &str, tokens: &mut Vec<Token>) {
    Lexer::new(src, tokens).lex();
}

/// A convenience function that allocates a new buffer per lexed input and
/// returns it.
pub fn lex_in_new(src: &str) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY);
    lex(src, &mut tokens);
    tokens
}

struct Lexer<'src, 'tok> {
    iter: Peekable<std::str::Chars<'src>>,
    cursor: usize,
    current_lo: usize,
    line: u32,
    column: u32,
    current_pos: Pos,
    tokens: &'tok mut Vec<Token>,
    src: &'src str,
}

impl Lexer<'_, '_> {
    /// Scans the source string until the input is exhausted.
    ///
    /// Tokens are written into the provided tokens buffer.
    fn lex(mut self) {
        assert_eq!(self.tokens.len(), 0, "must pass clean tokens buffer");
        loop {
            let next = self.scan_token_kind();
            let is_eof = matches!(next, TokenKind::Eof);
            self.produce(next);
            if is_eof {
                break;
            }
        }
    }

    fn scan_token_kind(&mut self) -> TokenKind {
        use TokenKind::*;
        match self.mark_advance() {
            '\0' => Eof,
            '(' => LParen,
            ')' => RParen,
            '{' => LBrace,
            '}' => RBrace,
            '[' => LBracket,
            ']' => RBracket,
            ';' => Semicolon,
            ',' => Comma,
            '@' => At,
            '+' => Plus,
            '-' => Minus,
            '*' => Star,
            '%' => Percent,
            '&' => Amp,
            '|' => Pipe,
            '/' => match self.peek() {
                '/' => self.line_comment(),
                _ => Slash,
            },
            '=' => match self.peek() {
                '=' => self.advance_with(EqEq),
                _ => Assign,
            },
            '!' => match self.peek() {
                '=' => self.advance_with(NotEq),
                _ => Bang,
            },
            '<' => match self.peek() {
                '=' => self.advance_with(LessEq),
                _ => Less,
            },
            '>' => match self.peek() {
                '=' => self.advance_with(GreaterEq),
                _ => Greater,
            },
            '"' => self.string(),
            '\'' => self.char_literal(),
            c if c.is_ascii_alphabetic() || c == '_' => self.identifier_or_keyword(),
            c if c.is_ascii_digit() => self.number(),
            c if c.is_ascii_whitespace() => self.whitespace(),
            _ => ErrorUnexpectedChar,
        }
    }

    /// Lexes a string literal. Escapes are only validated here; they are
    /// resolved by [`extract::escaped_string`], and only for tokens which
    /// actually contain one.
    fn string(&mut self) -> TokenKind {
        let mut has_escaped = false;
        let mut is_escaping = false;
        loop {
            let (current, current_span, current_pos) = self.advance_with_span();
            match (is_escaping, current) {
                (_, '\0') => return TokenKind::ErrorUnclosedString,
                (false, '"') => {
                    return if has_escaped {
                        TokenKind::EscapedString
                    } else {
                        TokenKind::String
                    };
                }
                // Reported, but the scan goes on until the closing quote.
                (false, '\n') => {
                    self.produce_spanned(
                        TokenKind::ErrorUnescapedLineBreak,
                        current_span,
                        current_pos,
                    );
                }
                (false, '\\') => {
                    has_escaped = true;
                    is_escaping = true;
                }
                (_, _) => is_escaping = false,
            }
        }
    }

    /// Lexes `'c'` or `'\c'`.
    fn char_literal(&mut self) -> TokenKind {
        match self.advance() {
            '\0' | '\n' | '\'' => return TokenKind::ErrorUnclosedChar,
            '\\' => {
                if matches!(self.advance(), '\0' | '\n') {
                    return TokenKind::ErrorUnclosedChar;
                }
            }
            _ => (),
        }
        if self.peek() == '\'' {
            self.advance_with(TokenKind::CharLit)
        } else {
            TokenKind::ErrorUnclosedChar
        }
    }

    fn identifier_or_keyword(&mut self) -> TokenKind {
        while matches!(self.peek(), c if c.is_ascii_alphanumeric() || c == '_') {
            self.advance();
        }
        KEYWORDS
            .get(self.substr())
            .copied()
            .unwrap_or(TokenKind::Identifier)
    }

    fn number(&mut self) -> TokenKind {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        TokenKind::Number
    }

    fn whitespace(&mut self) -> TokenKind {
        while self.peek().is_ascii_whitespace() {
            self.advance();
        }
        TokenKind::Whitespace
    }

    fn line_comment(&mut self) -> TokenKind {
        assert_eq!(self.advance(), '/');
        while !matches!(self.peek(), '\n' | '\0') {
            self.advance();
        }
        TokenKind::LineComment
    }
}

impl Lexer<'_, '_> {
    fn new<'src, 'tok>(src: &'src str, tokens: &'tok mut Vec<Token>) -> Lexer<'src, 'tok> {
        Lexer {
            iter: src.chars().peekable(),
            cursor: 0,
            current_lo: 0,
            line: 1,
            column: 1,
            current_pos: Pos::new(1, 1),
            tokens,
            src,
        }
    }

    /// Starts a new token "mark" and advances the iterator.
    fn mark_advance(&mut self) -> char {
        self.current_lo = self.cursor;
        self.current_pos = Pos::new(self.line, self.column);
        self.advance()
    }

    /// Returns the next char and advances the iterator, keeping track of the
    /// current line and column.
    fn advance(&mut self) -> char {
        let Some(c) = self.iter.next() else {
            return '\0';
        };
        self.cursor += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    /// Advances and returns the provided value.
    fn advance_with<T>(&mut self, value: T) -> T {
        self.advance();
        value
    }

    /// Returns the next char (with its span and position) and advances the
    /// iterator.
    fn advance_with_span(&mut self) -> (char, Span, Pos) {
        let lo = self.cursor;
        let pos = Pos::new(self.line, self.column);
        let char = self.advance();
        let hi = lo + char.len_utf8();
        (char, Span::new_of_bounds(lo..hi.min(self.src.len())), pos)
    }

    fn peek(&mut self) -> char {
        self.iter.peek().copied().unwrap_or('\0')
    }

    fn span(&self) -> Span {
        Span::new_of_bounds(self.current_lo..self.cursor)
    }

    fn substr(&self) -> &str {
        self.span().substr(self.src)
    }

    fn produce(&mut self, kind: TokenKind) {
        self.produce_spanned(kind, self.span(), self.current_pos);
    }

    fn produce_spanned(&mut self, kind: TokenKind, span: Span, pos: Pos) {
        self.tokens.push(Token::new(kind, span, pos));
    }
}

/// Functions which map a token into its value.
pub mod extract {
    use super::*;

    pub fn int(token: Token, src: &str) -> Result<i64, ParseIntError> {
        debug_assert_eq!(token.kind, TokenKind::Number);
        token.lexeme(src).parse()
    }

    pub fn ident(token: Token, src: &str) -> String {
        debug_assert_eq!(token.kind, TokenKind::Identifier);
        token.lexeme(src).to_string()
    }

    pub fn string(token: Token, src: &str) -> Box<str> {
        debug_assert_eq!(token.kind, TokenKind::String);
        token.span().offset(1, -1).substr(src).into()
    }

    pub fn escaped_string(token: Token, src: &str) -> Box<str> {
        debug_assert_eq!(token.kind, TokenKind::EscapedString);
        let s = token.span().offset(1, -1).substr(src);
        perform_escape(s).into_boxed_str()
    }

    pub fn char(token: Token, src: &str) -> char {
        debug_assert_eq!(token.kind, TokenKind::CharLit);
        let s = token.span().offset(1, -1).substr(src);
        perform_escape(s).chars().next().unwrap_or('\0')
    }
}

fn perform_escape(raw: &str) -> String {
    let mut buf = String::with_capacity(raw.len());
    let mut escaped = false;
    for char in raw.chars() {
        let char = match (escaped, char) {
            (true, 'n') => '\n',
            (true, 't') => '\t',
            (true, 'r') => '\r',
            (true, '0') => '\0',
            (false, '\\') => {
                escaped = true;
                continue;
            }
            (_, char) => char,
        };
        escaped = false;
        buf.push(char);
    }
    buf
}
