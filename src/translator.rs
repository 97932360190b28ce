use crate::error::{Error, Result};
use crate::listing::{DataSection, Listing, RUNTIME_LABELS, is_generated_label, method_label};
use crate::registry::{MethodSignature, Parameter, Type, TypeRegistry};
use crate::scope::{ScopeChain, Symbol};
use crate::stream::TokenStream;
use crate::token::{Keyword, Punctuation, Token, TokenKind};

/// Everything one successful pass produced, ready for the emitter.
#[derive(Debug)]
pub struct Translation {
    // entry point first, then methods in the order they were defined
    listings: Vec<Listing>,
    data: DataSection,
    registry: TypeRegistry,
}

impl Translation {
    pub fn listing(&self, class: Option<&str>, method: &str) -> Option<&Listing> {
        self.listings
            .iter()
            .find(|listing| listing.class.as_deref() == class && listing.method == method)
    }

    pub fn entry_point(&self) -> Option<&Listing> {
        self.listing(None, "main")
    }

    pub fn methods(&self) -> impl Iterator<Item = &Listing> {
        self.listings.iter().filter(|listing| listing.class.is_some())
    }

    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    pub fn data(&self) -> &DataSection {
        &self.data
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }
}

/*
Single pass, LL(k) with k <= 4. Every grammar rule checks what it reads and
writes its instructions straight into the listing of the method being
translated; there is no tree in between.
*/
pub struct Translator {
    pub(crate) tokens: TokenStream,
    pub(crate) registry: TypeRegistry,
    pub(crate) scope: ScopeChain,
    pub(crate) current_class: Option<String>,
    pub(crate) current_method: String,
    pub(crate) data: DataSection,
    listings: Vec<Listing>,
    label_counter: usize,
}

impl Translator {
    pub fn new(tokens: Vec<Token>) -> Self {
        let mut data = DataSection::new();
        for label in RUNTIME_LABELS {
            data.reserve(label);
        }
        Translator {
            tokens: TokenStream::new(tokens),
            registry: TypeRegistry::new(),
            scope: ScopeChain::new(),
            current_class: None,
            current_method: String::new(),
            data,
            listings: Vec::new(),
            label_counter: 0,
        }
    }

    pub fn analyze(mut self) -> Result<Translation> {
        if let Err(err) = self.program() {
            let (line, column) = self.tokens.position();
            return Err(err.at(line, column));
        }

        // the entry point goes first, whatever order it was translated in
        if let Some(index) = self.listings.iter().position(|listing| listing.class.is_none()) {
            let main = self.listings.remove(index);
            self.listings.insert(0, main);
        }

        Ok(Translation {
            listings: self.listings,
            data: self.data,
            registry: self.registry,
        })
    }

    // Program := ClassDef* MainDef
    fn program(&mut self) -> Result<()> {
        while self.tokens.next_is_keyword(Keyword::Class) {
            self.class_def()?;
        }

        if self.tokens.is_at_end() {
            return Err(Error::syntax("program has no main() definition"));
        }
        if !self.tokens.next_is_keyword(Keyword::Main) {
            return Err(self.reject("'class' or 'main'"));
        }
        self.main_def()?;

        if !self.tokens.is_at_end() {
            return Err(self.reject("end of input after main"));
        }
        Ok(())
    }

    fn class_def(&mut self) -> Result<()> {
        self.tokens.expect_keyword(Keyword::Class)?;
        let name = self.tokens.expect_identifier()?;
        self.registry.declare_class(&name)?;
        self.current_class = Some(name.clone());
        log::debug!("class {}", name);

        self.tokens.expect_punctuation(Punctuation::LeftBrace)?;

        while self.tokens.next_is_keyword(Keyword::Int) {
            self.field_def(&name)?;
        }
        if self.registry.field_count(&name) == 0 {
            return Err(Error::structural(format!(
                "class '{}' must declare at least one int field",
                name
            )));
        }

        let mut methods = 0;
        while self.tokens.peek_nth(0).is_some_and(Token::is_identifier) {
            self.method_def(&name)?;
            methods += 1;
        }
        if methods == 0 {
            return Err(Error::structural(format!(
                "class '{}' must declare at least one method",
                name
            )));
        }

        self.tokens.expect_punctuation(Punctuation::RightBrace)?;
        self.registry.seal(&name);
        self.current_class = None;
        Ok(())
    }

    fn field_def(&mut self, class: &str) -> Result<()> {
        self.tokens.expect_keyword(Keyword::Int)?;
        let field = self.tokens.expect_identifier()?;
        self.tokens.expect_punctuation(Punctuation::Semicolon)?;
        self.registry.add_field(class, &field)?;
        log::trace!("field {}.{}", class, field);
        Ok(())
    }

    fn method_def(&mut self, class: &str) -> Result<()> {
        let name = self.tokens.expect_identifier()?;
        self.tokens.expect_punctuation(Punctuation::LeftParen)?;

        let param = if self.tokens.next_is_punctuation(Punctuation::RightParen) {
            None
        } else {
            let typ = self.declared_type()?;
            let param_name = self.tokens.expect_identifier()?;
            Some(Parameter { name: param_name, typ })
        };
        if self.tokens.next_is_punctuation(Punctuation::Comma) {
            return Err(Error::structural(format!(
                "method '{}' may take at most one parameter",
                name
            )));
        }
        self.tokens.expect_punctuation(Punctuation::RightParen)?;
        self.tokens.expect_punctuation(Punctuation::LeftBrace)?;

        // registered before the body so the method can call itself
        self.registry.add_method(
            class,
            MethodSignature {
                name: name.clone(),
                param: param.clone(),
            },
        )?;
        let entry = method_label(class, &name);
        self.claim_method_label(&entry)?;

        self.begin_listing(Some(class), &name);
        self.scope.clear();
        if let Some(param) = param {
            self.scope.declare_parameter(Symbol::parameter(&param.name, param.typ));
        }

        self.emit_label(&entry);
        self.emit("PUSH EBP");
        self.emit("MOV EBP, ESP");

        self.statements()?;

        self.deallocate_frame();
        self.emit("POP EBP");
        self.emit("RET");
        self.tokens.expect_punctuation(Punctuation::RightBrace)?;

        log::debug!("translated {}", entry);
        Ok(())
    }

    fn main_def(&mut self) -> Result<()> {
        self.tokens.expect_keyword(Keyword::Main)?;
        self.tokens.expect_punctuation(Punctuation::LeftParen)?;
        self.tokens.expect_punctuation(Punctuation::RightParen)?;
        self.tokens.expect_punctuation(Punctuation::LeftBrace)?;

        self.current_class = None;
        self.begin_listing(None, "main");
        self.scope.clear();

        self.emit_label("_main");
        self.emit("MOV EBP, ESP");

        self.statements()?;

        self.deallocate_frame();
        self.tokens.expect_punctuation(Punctuation::RightBrace)?;

        log::debug!("translated _main");
        Ok(())
    }

    // `_A_b_c` is both A.b_c and A_b.c; labels must stay unique in the output
    fn claim_method_label(&mut self, label: &str) -> Result<()> {
        let clashes = is_generated_label(label)
            || self.listings.iter().any(|listing| listing.entry_label() == label)
            || self.data.get(label).is_some();
        if clashes {
            return Err(Error::duplicate(format!(
                "method label '{}' is already used in the generated code",
                label
            )));
        }
        self.data.reserve(label);
        Ok(())
    }

    /// `int`, `string` or a class declared above.
    pub(crate) fn declared_type(&mut self) -> Result<Type> {
        let token = self.tokens.advance()?;
        match token.kind {
            TokenKind::Keyword(Keyword::Int) => Ok(Type::Int),
            TokenKind::Keyword(Keyword::String) => Ok(Type::Str),
            TokenKind::Identifier => {
                let name = token.literal.clone();
                self.registry.resolve_type(&name)
            }
            _ => Err(Error::syntax(format!("expected a type, found {}", token))),
        }
    }

    /// Consume the offending token so the error points at it.
    pub(crate) fn reject(&mut self, expected: &str) -> Error {
        match self.tokens.advance() {
            Ok(token) => Error::syntax(format!("expected {}, found {}", expected, token)),
            Err(err) => err,
        }
    }

    pub(crate) fn frame_offset(&self, name: &str) -> Result<u32> {
        self.scope
            .frame_offset_of(name, &self.registry)
            .ok_or_else(|| Error::undefined(format!("variable '{}' has no stack slot", name)))
    }

    /// Free the innermost frame's locals, if it has any.
    pub(crate) fn deallocate_frame(&mut self) {
        let size = self.scope.frame_size(&self.registry);
        if size > 0 {
            self.emit(format!("ADD ESP, {}", size));
        }
    }

    // counter shared by control-flow labels and string literal labels
    pub(crate) fn next_label_id(&mut self) -> usize {
        self.label_counter += 1;
        self.label_counter
    }

    /// `<Class>_<method>_<name>` inside a class, `main_<name>` in the entry point.
    pub(crate) fn data_label(&self, name: &str) -> String {
        match &self.current_class {
            Some(class) => format!("{}_{}_{}", class, self.current_method, name),
            None => format!("{}_{}", self.current_method, name),
        }
    }

    fn begin_listing(&mut self, class: Option<&str>, method: &str) {
        self.current_method = method.to_string();
        self.listings.push(Listing::new(class, method));
    }

    // instructions always go to the method being translated
    pub(crate) fn emit(&mut self, text: impl Into<String>) {
        if let Some(listing) = self.listings.last_mut() {
            listing.instruction(text);
        }
    }

    pub(crate) fn emit_all(&mut self, code: Vec<String>) {
        for line in code {
            self.emit(line);
        }
    }

    pub(crate) fn emit_label(&mut self, label: &str) {
        if let Some(listing) = self.listings.last_mut() {
            listing.label(label);
        }
    }
}
