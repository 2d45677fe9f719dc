// A lexeme is the raw sequence of characters in the source code that represents a meaningful unit
// A token is a categorized representation of a lexeme, pairing it with its type

use crate::error::error;
use crate::token::{Literal, Token, TokenType, KEYWORDS};

pub struct Scanner {
    // (byte offset, char) pairs so `index` (spec §3) is a real byte offset
    // without re-walking the string on every `advance`/`peek`.
    chars: Vec<(usize, char)>,
    source_len: usize,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: u32,
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.char_indices().collect(),
            source_len: source.len(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
        }
    }

    pub fn scan_tokens(mut self) -> Vec<Token> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token()
        }

        let eof_index = self.source_len as u32;
        self.tokens.push(Token::new(TokenType::Eof, "", self.line, eof_index));
        self.tokens
    }

    fn scan_token(&mut self) {
        let c = self.advance();
        match c {
            '(' => self.add_token(TokenType::LeftParen),
            ')' => self.add_token(TokenType::RightParen),
            '{' => self.add_token(TokenType::LeftBrace),
            '}' => self.add_token(TokenType::RightBrace),
            ',' => self.add_token(TokenType::Comma),
            '.' => self.add_token(TokenType::Dot),
            '-' => self.add_token(TokenType::Minus),
            '+' => self.add_token(TokenType::Plus),
            ';' => self.add_token(TokenType::Semicolon),
            '*' => self.add_token(TokenType::Star),

            '!' => {
                if self.r#match('=') {
                    self.add_token(TokenType::BangEqual);
                } else {
                    self.add_token(TokenType::Bang);
                }
            }
            '=' => {
                if self.r#match('=') {
                    self.add_token(TokenType::EqualEqual);
                } else {
                    self.add_token(TokenType::Equal);
                }
            }
            '<' => {
                if self.r#match('=') {
                    self.add_token(TokenType::LessEqual);
                } else {
                    self.add_token(TokenType::Less);
                }
            }
            '>' => {
                if self.r#match('=') {
                    self.add_token(TokenType::GreaterEqual);
                } else {
                    self.add_token(TokenType::Greater);
                }
            }

            '/' => {
                if self.r#match('/') {
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else {
                    self.add_token(TokenType::Slash);
                }
            }

            ' ' | '\t' | '\r' => (),

            '\n' => {
                self.line += 1;
            }

            '"' => self.string(),

            c => {
                if c.is_ascii_digit() {
                    self.number()
                } else if c.is_alphabetic() || c == '_' {
                    self.identifier()
                } else {
                    error(self.line, "Unexpected character.")
                }
            }
        }
    }

    // consume characters until we reach the closing "
    fn string(&mut self) {
        let opening_line = self.line;
        while self.peek() != '"' && !self.is_at_end() {
            if self.peek() == '\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.is_at_end() {
            error(opening_line, "Unterminated string.");
            return;
        }

        // the closing "
        self.advance();

        // trim the surrounding quotes
        let literal: String = self.chars[self.start + 1..self.current - 1]
            .iter()
            .map(|(_, ch)| ch)
            .collect();

        self.add_token_with_literal(TokenType::String, Literal::Str(literal));
    }

    fn number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        // the dot must be followed by a digit, otherwise it is not consumed (spec §4.1)
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();

            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let text = self.lexeme_text();
        let literal: f64 = text.parse().expect("scanned number lexeme must parse");

        self.add_token_with_literal(TokenType::Number, Literal::Number(literal));
    }

    fn identifier(&mut self) {
        while self.peek().is_alphanumeric() || self.peek() == '_' {
            self.advance();
        }

        let text = self.lexeme_text();
        let kind = KEYWORDS.get(text.as_str()).copied().unwrap_or(TokenType::Identifier);
        self.add_token(kind);
    }

    fn advance(&mut self) -> char {
        let (_, c) = self.chars[self.current];
        self.current += 1;
        c
    }

    // it's like advance but doesn't consume the next character
    fn peek(&self) -> char {
        self.chars.get(self.current).map(|&(_, c)| c).unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        self.chars.get(self.current + 1).map(|&(_, c)| c).unwrap_or('\0')
    }

    fn lexeme_text(&self) -> String {
        self.chars[self.start..self.current].iter().map(|(_, c)| c).collect()
    }

    fn byte_offset(&self, char_index: usize) -> usize {
        self.chars.get(char_index).map(|&(b, _)| b).unwrap_or(self.source_len)
    }

    fn add_token(&mut self, kind: TokenType) {
        let text = self.lexeme_text();
        let index = self.byte_offset(self.start) as u32;
        self.tokens.push(Token::new(kind, text, self.line, index));
    }

    fn add_token_with_literal(&mut self, kind: TokenType, literal: Literal) {
        let text = self.lexeme_text();
        let index = self.byte_offset(self.start) as u32;
        self.tokens.push(Token::with_literal(kind, text, literal, self.line, index));
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.chars.len()
    }

    // we only consume the current character if that is what we are looking for
    fn r#match(&mut self, expected: char) -> bool {
        if self.peek() != expected {
            return false;
        }
        self.current += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenType> {
        Scanner::new(source).scan_tokens().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn scans_single_and_double_char_operators() {
        assert_eq!(
            kinds("!= == <= >="),
            vec![
                TokenType::BangEqual,
                TokenType::EqualEqual,
                TokenType::LessEqual,
                TokenType::GreaterEqual,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn line_comment_is_discarded() {
        assert_eq!(kinds("// hello\n1"), vec![TokenType::Number, TokenType::Eof]);
    }

    #[test]
    fn number_dot_requires_trailing_digit() {
        let tokens = Scanner::new("1.").scan_tokens();
        assert_eq!(tokens[0].kind, TokenType::Number);
        assert_eq!(tokens[0].lexeme, "1");
        assert_eq!(tokens[1].kind, TokenType::Dot);
    }

    #[test]
    fn string_literal_excludes_quotes() {
        let tokens = Scanner::new("\"hi there\"").scan_tokens();
        match &tokens[0].literal {
            Some(Literal::Str(s)) => assert_eq!(s, "hi there"),
            _ => panic!("expected string literal"),
        }
    }

    #[test]
    fn keywords_are_distinguished_from_identifiers() {
        assert_eq!(kinds("class notakeyword"), vec![TokenType::Class, TokenType::Identifier, TokenType::Eof]);
    }

    #[test]
    fn unexpected_character_is_skipped_and_scanning_continues() {
        assert_eq!(kinds("1 @ 2"), vec![TokenType::Number, TokenType::Number, TokenType::Eof]);
    }

    #[test]
    fn token_index_is_a_byte_offset() {
        let tokens = Scanner::new("var x = 1;").scan_tokens();
        // "x" begins at byte 4
        let x = tokens.iter().find(|t| t.lexeme == "x").unwrap();
        assert_eq!(x.index, 4);
    }
}
