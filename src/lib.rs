//! Single-pass compiler for YADL, a small class-based language, emitting
//! NASM-style 32-bit x86.
//!
//! - `tokenizer` turns source text into located tokens.
//! - `translator` parses, checks and generates code in one pass, with the
//!   statement rules in `statement` and value resolution in `operand`.
//! - `emitter` lays the listings out as one assembly file.

pub mod emitter;
pub mod error;
pub mod listing;
pub mod operand;
pub mod registry;
pub mod scope;
pub mod stream;
pub mod token;
pub mod tokenizer;
pub mod translator;

mod statement;

pub use error::{Error, Result};
pub use token::Token;
pub use translator::{Translation, Translator};

pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    tokenizer::Tokenizer::new(source).tokenize()
}

/// Lex and translate, without emitting.
pub fn translate(source: &str) -> Result<Translation> {
    let tokens = tokenize(source)?;
    log::debug!("{} tokens", tokens.len());
    Translator::new(tokens).analyze()
}

/// Compile a source string into assembly text.
pub fn compile(source: &str) -> Result<String> {
    let translation = translate(source)?;
    Ok(emitter::emit(&translation))
}
