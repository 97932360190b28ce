use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Class,
    Int,
    String,
    Main,
    CreateInstance,
    This,
    If,
    While,
    Print,
    Prints,
}

impl Keyword {
    pub fn from_word(word: &str) -> Option<Keyword> {
        let keyword = match word {
            "class" => Keyword::Class,
            "int" => Keyword::Int,
            "string" => Keyword::String,
            "main" => Keyword::Main,
            "CreateInstance" => Keyword::CreateInstance,
            "this" => Keyword::This,
            "if" => Keyword::If,
            "while" => Keyword::While,
            "print" => Keyword::Print,
            "prints" => Keyword::Prints,
            _ => return None,
        };
        Some(keyword)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Class => "class",
            Keyword::Int => "int",
            Keyword::String => "string",
            Keyword::Main => "main",
            Keyword::CreateInstance => "CreateInstance",
            Keyword::This => "this",
            Keyword::If => "if",
            Keyword::While => "while",
            Keyword::Print => "print",
            Keyword::Prints => "prints",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punctuation {
    LeftBrace,
    RightBrace,
    LeftParen,
    RightParen,
    Semicolon,
    Dot,
    Comma,
}

impl Punctuation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Punctuation::LeftBrace => "{",
            Punctuation::RightBrace => "}",
            Punctuation::LeftParen => "(",
            Punctuation::RightParen => ")",
            Punctuation::Semicolon => ";",
            Punctuation::Dot => ".",
            Punctuation::Comma => ",",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Assign,
    Equal,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Assign => "=",
            Operator::Equal => "==",
            Operator::Greater => ">",
            Operator::GreaterEqual => ">=",
            Operator::Less => "<",
            Operator::LessEqual => "<=",
        }
    }

    /// Mnemonic of the jump taken when the comparison does NOT hold.
    /// `Assign` is not a comparison and has none.
    pub fn negated_jump(&self) -> Option<&'static str> {
        match self {
            Operator::Equal => Some("JNE"),
            Operator::Greater => Some("JNG"),
            Operator::GreaterEqual => Some("JNGE"),
            Operator::Less => Some("JNL"),
            Operator::LessEqual => Some("JNLE"),
            Operator::Assign => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Keyword(Keyword),
    Number,
    StringLiteral,
    Punctuation(Punctuation),
    Operator(Operator),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    // unescaped content for string literals, source text for everything else
    pub literal: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, literal: impl Into<String>, line: usize, column: usize) -> Self {
        Token {
            kind,
            literal: literal.into(),
            line,
            column,
        }
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
    }

    pub fn is_punctuation(&self, punctuation: Punctuation) -> bool {
        self.kind == TokenKind::Punctuation(punctuation)
    }

    pub fn is_operator(&self, operator: Operator) -> bool {
        self.kind == TokenKind::Operator(operator)
    }

    pub fn is_identifier(&self) -> bool {
        self.kind == TokenKind::Identifier
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            TokenKind::StringLiteral => write!(f, "{:?}", self.literal),
            _ => write!(f, "'{}'", self.literal),
        }
    }
}
