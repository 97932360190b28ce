use crate::error::{Error, Result};
use crate::token::{Keyword, Operator, Punctuation, Token, TokenKind};

pub struct Tokenizer {
    text: Vec<char>,
    current: usize,
    line: usize,
    column: usize,
}

impl Tokenizer {
    pub fn new(text: &str) -> Self {
        Tokenizer {
            text: text.chars().collect(),
            current: 0,
            line: 1,
            column: 1,
        }
    }

    /// Lex the whole input. The first lexical error aborts, located at the offending character.
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn peek_char(&self, ahead: usize) -> Option<char> {
        self.text.get(self.current + ahead).copied()
    }

    // consume one char, keeping line/column in step
    fn bump(&mut self) -> Option<char> {
        let ch = self.peek_char(0)?;
        self.current += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_trivia(&mut self) {
        while let Some(ch) = self.peek_char(0) {
            if ch.is_whitespace() {
                self.bump();
            } else if ch == '/' && self.peek_char(1) == Some('/') {
                while let Some(ch) = self.peek_char(0) {
                    if ch == '\n' {
                        break;
                    }
                    self.bump();
                }
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_trivia();

        let (line, column) = (self.line, self.column);
        let Some(ch) = self.peek_char(0) else {
            return Ok(None);
        };

        let punctuation = match ch {
            '{' => Some(Punctuation::LeftBrace),
            '}' => Some(Punctuation::RightBrace),
            '(' => Some(Punctuation::LeftParen),
            ')' => Some(Punctuation::RightParen),
            ';' => Some(Punctuation::Semicolon),
            '.' => Some(Punctuation::Dot),
            ',' => Some(Punctuation::Comma),
            _ => None,
        };
        if let Some(punctuation) = punctuation {
            self.bump();
            return Ok(Some(Token::new(TokenKind::Punctuation(punctuation), punctuation.as_str(), line, column)));
        }

        // two-char operators have to win over their one-char prefixes
        let followed_by_equals = self.peek_char(1) == Some('=');
        let operator = match (ch, followed_by_equals) {
            ('=', true) => Some(Operator::Equal),
            ('=', false) => Some(Operator::Assign),
            ('>', true) => Some(Operator::GreaterEqual),
            ('>', false) => Some(Operator::Greater),
            ('<', true) => Some(Operator::LessEqual),
            ('<', false) => Some(Operator::Less),
            _ => None,
        };
        if let Some(operator) = operator {
            for _ in 0..operator.as_str().len() {
                self.bump();
            }
            return Ok(Some(Token::new(TokenKind::Operator(operator), operator.as_str(), line, column)));
        }

        match ch {
            '"' => self.string_literal(line, column).map(Some),
            '-' => self.number(line, column).map(Some),
            _ if ch.is_ascii_digit() => self.number(line, column).map(Some),
            _ if ch.is_ascii_alphabetic() || ch == '_' => Ok(Some(self.word(line, column))),
            _ => Err(Error::lex(format!("unsupported character '{}'", ch)).at(line, column)),
        }
    }

    fn number(&mut self, line: usize, column: usize) -> Result<Token> {
        let mut text = String::new();
        if self.peek_char(0) == Some('-') {
            self.bump();
            text.push('-');
        }

        while let Some(ch) = self.peek_char(0) {
            if !ch.is_ascii_digit() {
                break;
            }
            self.bump();
            text.push(ch);
        }

        if text == "-" {
            return Err(Error::lex("'-' must start a number literal").at(line, column));
        }

        // 12a is neither a number nor an identifier
        if let Some(ch) = self.peek_char(0) {
            if ch.is_ascii_alphabetic() || ch == '_' {
                return Err(Error::lex(format!("malformed number literal near '{}{}'", text, ch)).at(line, column));
            }
        }

        if text.parse::<i32>().is_err() {
            return Err(Error::lex(format!(
                "number literal {} is outside [-2147483648, 2147483647]",
                text
            ))
            .at(line, column));
        }

        Ok(Token::new(TokenKind::Number, text, line, column))
    }

    fn word(&mut self, line: usize, column: usize) -> Token {
        let mut fragment = String::new();
        while let Some(ch) = self.peek_char(0) {
            if !(ch.is_ascii_alphanumeric() || ch == '_') {
                break;
            }
            self.bump();
            fragment.push(ch);
        }

        match Keyword::from_word(&fragment) {
            Some(keyword) => Token::new(TokenKind::Keyword(keyword), fragment, line, column),
            None => Token::new(TokenKind::Identifier, fragment, line, column),
        }
    }

    fn string_literal(&mut self, line: usize, column: usize) -> Result<Token> {
        // opening quote
        self.bump();

        let mut content = String::new();
        loop {
            let (escape_line, escape_column) = (self.line, self.column);
            match self.bump() {
                None | Some('\n') => {
                    return Err(Error::lex("unterminated string literal").at(line, column));
                }
                Some('"') => break,
                Some('\\') => {
                    let escaped = match self.bump() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('"') => '"',
                        Some('\\') => '\\',
                        Some(other) => {
                            return Err(Error::lex(format!("unknown escape sequence '\\{}'", other))
                                .at(escape_line, escape_column));
                        }
                        None => {
                            return Err(Error::lex("unterminated string literal").at(line, column));
                        }
                    };
                    content.push(escaped);
                }
                Some(ch) => content.push(ch),
            }
        }

        Ok(Token::new(TokenKind::StringLiteral, content, line, column))
    }
}

/*
Testing
*/
