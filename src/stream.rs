use crate::error::{Error, Result};
use crate::token::{Keyword, Operator, Punctuation, Token, TokenKind};

/// Read-only cursor over the lexed program. Nothing is ever pushed back.
pub struct TokenStream {
    tokens: Vec<Token>,
    pos: usize,
}

impl TokenStream {
    pub fn new(tokens: Vec<Token>) -> Self {
        TokenStream { tokens, pos: 0 }
    }

    pub fn advance(&mut self) -> Result<&Token> {
        let token = self.tokens.get(self.pos).ok_or(Error::UnexpectedEndOfInput)?;
        self.pos += 1;
        Ok(token)
    }

    pub fn peek(&self) -> Result<&Token> {
        self.tokens.get(self.pos).ok_or(Error::UnexpectedEndOfInput)
    }

    // n = 0 is the same token `peek` returns
    pub fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n)
    }

    /// The most recently consumed token.
    pub fn current(&self) -> Option<&Token> {
        self.pos.checked_sub(1).and_then(|index| self.tokens.get(index))
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Where the translation currently stands, for error annotation.
    pub fn position(&self) -> (usize, usize) {
        self.current()
            .or_else(|| self.tokens.first())
            .map(|token| (token.line, token.column))
            .unwrap_or((1, 1))
    }

    pub fn expect_punctuation(&mut self, punctuation: Punctuation) -> Result<()> {
        let token = self.advance()?;
        if token.is_punctuation(punctuation) {
            Ok(())
        } else {
            Err(Error::syntax(format!("expected '{}', found {}", punctuation.as_str(), token)))
        }
    }

    pub fn expect_keyword(&mut self, keyword: Keyword) -> Result<()> {
        let token = self.advance()?;
        if token.is_keyword(keyword) {
            Ok(())
        } else {
            Err(Error::syntax(format!("expected '{}', found {}", keyword.as_str(), token)))
        }
    }

    pub fn expect_operator(&mut self, operator: Operator) -> Result<()> {
        let token = self.advance()?;
        if token.is_operator(operator) {
            Ok(())
        } else {
            Err(Error::syntax(format!("expected '{}', found {}", operator.as_str(), token)))
        }
    }

    pub fn expect_identifier(&mut self) -> Result<String> {
        let token = self.advance()?;
        match token.kind {
            TokenKind::Identifier => Ok(token.literal.clone()),
            _ => Err(Error::syntax(format!("expected an identifier, found {}", token))),
        }
    }

    pub fn next_is_punctuation(&self, punctuation: Punctuation) -> bool {
        self.peek_nth(0).is_some_and(|token| token.is_punctuation(punctuation))
    }

    pub fn next_is_keyword(&self, keyword: Keyword) -> bool {
        self.peek_nth(0).is_some_and(|token| token.is_keyword(keyword))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::Tokenizer;

    fn stream(source: &str) -> TokenStream {
        TokenStream::new(Tokenizer::new(source).tokenize().unwrap())
    }

    #[test]
    fn peek_doesnt_consume() {
        let mut tokens = stream("x = 5;");
        assert_eq!(tokens.peek().unwrap().literal, "x");
        assert_eq!(tokens.peek().unwrap().literal, "x");
        assert_eq!(tokens.peek_nth(2).unwrap().literal, "5");
        assert_eq!(tokens.advance().unwrap().literal, "x");
        assert_eq!(tokens.current().unwrap().literal, "x");
        assert!(tokens.peek().unwrap().is_operator(Operator::Assign));
    }

    #[test]
    fn past_the_end() {
        let mut tokens = stream("x");
        tokens.advance().unwrap();
        assert!(tokens.is_at_end());
        assert!(tokens.peek_nth(0).is_none());
        assert_eq!(tokens.peek().unwrap_err(), Error::UnexpectedEndOfInput);
        assert_eq!(tokens.advance().unwrap_err(), Error::UnexpectedEndOfInput);
    }

    #[test]
    fn expect_reports_what_was_found() {
        let mut tokens = stream("class 5");
        tokens.expect_keyword(Keyword::Class).unwrap();
        let err = tokens.expect_identifier().unwrap_err();
        assert_eq!(err, Error::syntax("expected an identifier, found '5'"));
        assert_eq!(tokens.position(), (1, 7));
    }

    #[test]
    fn position_before_anything_is_consumed() {
        let tokens = stream("\n\n  main");
        assert_eq!(tokens.position(), (3, 3));
        assert_eq!(TokenStream::new(Vec::new()).position(), (1, 1));
    }
}
