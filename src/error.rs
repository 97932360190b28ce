use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure is fatal: the first one aborts translation and nothing is emitted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("lexical error: {message}")]
    Lex { message: String },

    #[error("syntax error: {message}")]
    Syntax { message: String },

    #[error("duplicate declaration: {message}")]
    DuplicateDeclaration { message: String },

    #[error("undefined name: {message}")]
    UndefinedName { message: String },

    #[error("type mismatch: {message}")]
    TypeMismatch { message: String },

    #[error("structural error: {message}")]
    Structural { message: String },

    #[error("unexpected end of input")]
    UnexpectedEndOfInput,

    // only ever added once, by whoever drives the whole pass
    #[error("{source} at line {line}, column {column}")]
    Located {
        line: usize,
        column: usize,
        source: Box<Error>,
    },
}

impl Error {
    pub fn lex(message: impl Into<String>) -> Self {
        Self::Lex { message: message.into() }
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax { message: message.into() }
    }

    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::DuplicateDeclaration { message: message.into() }
    }

    pub fn undefined(message: impl Into<String>) -> Self {
        Self::UndefinedName { message: message.into() }
    }

    pub fn mismatch(message: impl Into<String>) -> Self {
        Self::TypeMismatch { message: message.into() }
    }

    pub fn structural(message: impl Into<String>) -> Self {
        Self::Structural { message: message.into() }
    }

    /// Attach a source position. An error that already carries one keeps it.
    pub fn at(self, line: usize, column: usize) -> Self {
        match self {
            located @ Self::Located { .. } => located,
            other => Self::Located {
                line,
                column,
                source: Box::new(other),
            },
        }
    }

    /// The error without its position, for matching on the kind.
    pub fn root(&self) -> &Error {
        match self {
            Self::Located { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn position(&self) -> Option<(usize, usize)> {
        match self {
            Self::Located { line, column, .. } => Some((*line, *column)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_is_added_once() {
        let err = Error::syntax("expected ';'").at(3, 7).at(9, 9);
        assert_eq!(err.position(), Some((3, 7)));
        assert!(matches!(err.root(), Error::Syntax { .. }));
    }

    #[test]
    fn located_message() {
        let err = Error::undefined("variable 'x'").at(2, 5);
        assert_eq!(err.to_string(), "undefined name: variable 'x' at line 2, column 5");
    }
}
