use crate::emitter::{PRINT_INT, PRINT_STRING};
use crate::error::{Error, Result};
use crate::listing::method_label;
use crate::operand::{Register, RValue, Storage, frame_slot, memory, object_address, PARAMETER_SLOT, RECEIVER_SLOT};
use crate::registry::Type;
use crate::scope::{Symbol, SymbolRole};
use crate::token::{Keyword, Operator, Punctuation, Token, TokenKind};
use crate::translator::Translator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Production {
    VarInit,
    Assignment,
    MethodCall,
    If,
    While,
    Print,
    PrintString,
}

// who a call runs against
enum Receiver {
    Current(String),
    Object { class: String, storage: Storage },
}

impl Receiver {
    fn class(&self) -> &str {
        match self {
            Receiver::Current(class) => class,
            Receiver::Object { class, .. } => class,
        }
    }
}

// left CompareOp right
struct Condition {
    left: RValue,
    jump: &'static str,
    right: RValue,
}

fn is_name(token: Option<&Token>) -> bool {
    token.is_some_and(|token| token.is_identifier() || token.is_keyword(Keyword::This))
}

impl Translator {
    // Statement+
    pub(crate) fn statements(&mut self) -> Result<()> {
        if self.tokens.next_is_punctuation(Punctuation::RightBrace) {
            return Err(self.reject("at least one statement"));
        }
        while !self.tokens.next_is_punctuation(Punctuation::RightBrace) {
            self.statement()?;
        }
        Ok(())
    }

    // '{' Statement* '}' in a frame of its own
    fn block(&mut self) -> Result<()> {
        self.tokens.expect_punctuation(Punctuation::LeftBrace)?;
        self.scope.push_frame();
        while !self.tokens.next_is_punctuation(Punctuation::RightBrace) {
            self.statement()?;
        }
        self.deallocate_frame();
        self.scope.pop_frame();
        self.tokens.expect_punctuation(Punctuation::RightBrace)
    }

    fn statement(&mut self) -> Result<()> {
        let production = match self.predict()? {
            Some(production) => production,
            None => return Err(self.reject("a statement")),
        };
        log::trace!("{:?} in {}", production, self.current_method);

        match production {
            Production::VarInit => self.var_init(),
            Production::Assignment => self.assignment(),
            Production::MethodCall => self.method_call(),
            Production::If => self.if_stmt(),
            Production::While => self.while_stmt(),
            Production::Print => self.print_stmt(),
            Production::PrintString => self.print_string_stmt(),
        }
    }

    /// Looks at most four tokens ahead, consumes nothing.
    fn predict(&self) -> Result<Option<Production>> {
        let first = self.tokens.peek()?;
        let second = self.tokens.peek_nth(1);

        if first.is_keyword(Keyword::Int) || first.is_keyword(Keyword::String) {
            return Ok(Some(Production::VarInit));
        }
        if first.is_identifier() && second.is_some_and(Token::is_identifier) {
            return Ok(Some(Production::VarInit));
        }

        if is_name(Some(first)) {
            let qualified = second.is_some_and(|token| token.is_punctuation(Punctuation::Dot))
                && self.tokens.peek_nth(2).is_some_and(Token::is_identifier);
            let after = if qualified { self.tokens.peek_nth(3) } else { second };

            if after.is_some_and(|token| token.is_operator(Operator::Assign)) {
                return Ok(Some(Production::Assignment));
            }
            if after.is_some_and(|token| token.is_punctuation(Punctuation::LeftParen)) {
                return Ok(Some(Production::MethodCall));
            }
        }

        Ok(match first.kind {
            TokenKind::Keyword(Keyword::If) => Some(Production::If),
            TokenKind::Keyword(Keyword::While) => Some(Production::While),
            TokenKind::Keyword(Keyword::Print) => Some(Production::Print),
            TokenKind::Keyword(Keyword::Prints) => Some(Production::PrintString),
            _ => None,
        })
    }

    fn var_init(&mut self) -> Result<()> {
        let typ = self.declared_type()?;
        let name = self.tokens.expect_identifier()?;
        if self.scope.lookup_local_only(&name).is_some() {
            return Err(Error::duplicate(format!(
                "variable '{}' has already been defined in this scope",
                name
            )));
        }
        self.tokens.expect_operator(Operator::Assign)?;

        match typ {
            Type::Int => {
                let value = self.get_rvalue_with_expected_type(&Type::Int)?;
                self.tokens.expect_punctuation(Punctuation::Semicolon)?;

                self.emit_all(value.fetch(Register::Eax));
                self.scope.declare_local(Symbol::local(&name, Type::Int))?;
                let offset = self.frame_offset(&name)?;
                self.emit("SUB ESP, 4");
                self.emit(format!("MOV {}, EAX", frame_slot(offset)));
                Ok(())
            }
            Type::Str => self.string_init(&name),
            Type::ClassType(class) => self.object_init(&name, &class),
        }
    }

    // strings get a data entry of their own and no stack slot
    fn string_init(&mut self, name: &str) -> Result<()> {
        let token = self.tokens.advance()?.clone();
        let bytes = match token.kind {
            TokenKind::StringLiteral => token.literal.into_bytes(),
            TokenKind::Identifier => {
                let source = self.resolve_variable(&token.literal)?;
                if source.typ != Type::Str {
                    return Err(Error::mismatch(format!(
                        "cannot initialise string '{}' from '{}' of type {}",
                        name, source.name, source.typ
                    )));
                }
                let Some(label) = &source.label else {
                    return Err(Error::mismatch(format!(
                        "string parameter '{}' cannot initialise a string local",
                        source.name
                    )));
                };
                self.data.get(label).map(|entry| entry.bytes.clone()).unwrap_or_default()
            }
            TokenKind::Number => {
                return Err(Error::mismatch(format!(
                    "cannot initialise string '{}' with int literal {}",
                    name, token.literal
                )));
            }
            _ => {
                return Err(Error::syntax(format!(
                    "expected a string literal or a string variable, found {}",
                    token
                )));
            }
        };
        self.tokens.expect_punctuation(Punctuation::Semicolon)?;

        let label = self.data_label(name);
        let label = self.data.insert(&label, bytes);
        log::trace!("string {} stored as {}", name, label);
        self.scope.declare_local(Symbol::local(name, Type::Str).with_label(label))
    }

    fn object_init(&mut self, name: &str, class: &str) -> Result<()> {
        let creates = self.tokens.peek_nth(0).is_some_and(Token::is_identifier)
            && self.tokens.peek_nth(1).is_some_and(|token| token.is_punctuation(Punctuation::Dot))
            && self.tokens.peek_nth(2).is_some_and(|token| token.is_keyword(Keyword::CreateInstance));
        let typ = Type::ClassType(class.to_string());
        let fields = self.registry.field_count(class);
        let size = self.registry.slot_size(&typ);

        if creates {
            let created = self.tokens.expect_identifier()?;
            let created_type = self.registry.resolve_type(&created)?;
            if created_type != typ {
                return Err(Error::mismatch(format!(
                    "cannot initialise {} '{}' with a new {}",
                    class, name, created_type
                )));
            }
            self.tokens.expect_punctuation(Punctuation::Dot)?;
            self.tokens.expect_keyword(Keyword::CreateInstance)?;
            self.tokens.expect_punctuation(Punctuation::LeftParen)?;
            self.tokens.expect_punctuation(Punctuation::RightParen)?;
            self.tokens.expect_punctuation(Punctuation::Semicolon)?;

            self.scope.declare_local(Symbol::local(name, typ))?;
            let offset = self.frame_offset(name)?;
            self.emit(format!("SUB ESP, {}", size));
            for index in 0..fields {
                self.emit(format!("MOV DWORD {}, 0", frame_slot(offset + 4 * index as u32)));
            }
            return Ok(());
        }

        // copy form: source address in EAX, fields go through EDX
        let source = self.get_rvalue_with_expected_type(&typ)?;
        self.tokens.expect_punctuation(Punctuation::Semicolon)?;

        self.emit_all(source.fetch(Register::Eax));
        self.scope.declare_local(Symbol::local(name, typ))?;
        let offset = self.frame_offset(name)?;
        self.emit(format!("SUB ESP, {}", size));
        for index in 0..fields {
            let displacement = 4 * index as i64;
            self.emit(format!("MOV EDX, {}", memory("EAX", -displacement)));
            self.emit(format!("MOV {}, EDX", frame_slot(offset + 4 * index as u32)));
        }
        Ok(())
    }

    fn assignment(&mut self) -> Result<()> {
        let target = self.get_lvalue()?;
        let typ = target.value_type();
        if typ == Type::Str {
            return Err(Error::mismatch("string variables cannot be reassigned"));
        }
        self.tokens.expect_operator(Operator::Assign)?;
        let value = self.get_rvalue_with_expected_type(&typ)?;
        self.tokens.expect_punctuation(Punctuation::Semicolon)?;

        self.emit_all(target.address());
        self.emit_all(value.fetch(Register::Eax));
        match &typ {
            Type::ClassType(class) => {
                for index in 0..self.registry.field_count(class) {
                    let displacement = -4 * index as i64;
                    self.emit(format!("MOV EDX, {}", memory("EAX", displacement)));
                    self.emit(format!("MOV {}, EDX", memory("EBX", displacement)));
                }
            }
            _ => self.emit("MOV [EBX], EAX"),
        }
        Ok(())
    }

    // [receiver '.'] method '(' [RValue] ')' ';'
    fn method_call(&mut self) -> Result<()> {
        let first = self.tokens.advance()?.clone();

        let (receiver, method) = if self.tokens.next_is_punctuation(Punctuation::Dot) {
            self.tokens.advance()?;
            let method = self.tokens.expect_identifier()?;
            let receiver = match first.kind {
                TokenKind::Keyword(Keyword::This) => Receiver::Current(self.receiver_class()?),
                TokenKind::Identifier => {
                    let owner = self.resolve_variable(&first.literal)?;
                    let Type::ClassType(class) = &owner.typ else {
                        return Err(Error::mismatch(format!(
                            "'{}' has type {} and has no methods",
                            owner.name, owner.typ
                        )));
                    };
                    Receiver::Object {
                        class: class.clone(),
                        storage: self.storage_of(&owner)?,
                    }
                }
                _ => return Err(Error::syntax(format!("expected an object, found {}", first))),
            };
            (receiver, method)
        } else {
            if !first.is_identifier() {
                return Err(Error::syntax(format!("expected a method name, found {}", first)));
            }
            let class = self.current_class.clone().ok_or_else(|| {
                Error::undefined(format!(
                    "method '{}' called without an object outside of a class",
                    first.literal
                ))
            })?;
            (Receiver::Current(class), first.literal)
        };

        let class = receiver.class().to_string();
        let signature = self.registry.find_method(&class, &method).cloned().ok_or_else(|| {
            Error::undefined(format!("method '{}' is not defined in class '{}'", method, class))
        })?;

        self.tokens.expect_punctuation(Punctuation::LeftParen)?;
        let argument = match &signature.param {
            Some(param) => {
                if self.tokens.next_is_punctuation(Punctuation::RightParen) {
                    return Err(Error::mismatch(format!(
                        "method '{}.{}' expects an argument of type {}",
                        class, method, param.typ
                    )));
                }
                Some(self.get_rvalue_with_expected_type(&param.typ)?)
            }
            None => {
                if !self.tokens.next_is_punctuation(Punctuation::RightParen) {
                    return Err(Error::mismatch(format!(
                        "method '{}.{}' takes no argument",
                        class, method
                    )));
                }
                None
            }
        };
        self.tokens.expect_punctuation(Punctuation::RightParen)?;
        self.tokens.expect_punctuation(Punctuation::Semicolon)?;

        if let Some(argument) = argument {
            self.emit_all(argument.fetch(Register::Eax));
            self.emit("PUSH EAX");
        }
        match &receiver {
            Receiver::Current(_) => self.emit(format!("MOV EAX, {}", memory("EBP", RECEIVER_SLOT))),
            Receiver::Object { storage, .. } => self.emit_all(object_address(storage, Register::Eax)),
        }
        self.emit("PUSH EAX");
        self.emit(format!("CALL {}", method_label(&class, &method)));
        self.emit(format!("ADD ESP, {}", signature.argument_bytes()));
        Ok(())
    }

    // '(' RValue CompareOp RValue ')', both sides int
    fn condition(&mut self) -> Result<Condition> {
        self.tokens.expect_punctuation(Punctuation::LeftParen)?;
        let left = self.get_rvalue_with_expected_type(&Type::Int)?;

        let token = self.tokens.advance()?;
        let jump = match token.kind {
            TokenKind::Operator(operator) => operator.negated_jump(),
            _ => None,
        };
        let Some(jump) = jump else {
            return Err(Error::syntax(format!("expected a comparison operator, found {}", token)));
        };

        let right = self.get_rvalue_with_expected_type(&Type::Int)?;
        self.tokens.expect_punctuation(Punctuation::RightParen)?;
        Ok(Condition { left, jump, right })
    }

    fn compare_and_jump(&mut self, condition: Condition, target: &str) {
        self.emit_all(condition.left.fetch(Register::Eax));
        self.emit_all(condition.right.fetch(Register::Ebx));
        self.emit("CMP EAX, EBX");
        self.emit(format!("{} {}", condition.jump, target));
    }

    fn if_stmt(&mut self) -> Result<()> {
        self.tokens.expect_keyword(Keyword::If)?;
        let condition = self.condition()?;

        let else_label = format!("_else_statement_{}", self.next_label_id());
        self.compare_and_jump(condition, &else_label);
        self.block()?;
        self.emit_label(&else_label);
        Ok(())
    }

    fn while_stmt(&mut self) -> Result<()> {
        self.tokens.expect_keyword(Keyword::While)?;
        let condition = self.condition()?;

        let id = self.next_label_id();
        let condition_label = format!("_while_condition_{}", id);
        let exit_label = format!("_while_exit_{}", id);

        self.emit_label(&condition_label);
        self.compare_and_jump(condition, &exit_label);
        self.block()?;
        self.emit(format!("JMP {}", condition_label));
        self.emit_label(&exit_label);
        Ok(())
    }

    fn print_stmt(&mut self) -> Result<()> {
        self.tokens.expect_keyword(Keyword::Print)?;
        self.tokens.expect_punctuation(Punctuation::LeftParen)?;
        let value = self.get_rvalue_with_expected_type(&Type::Int)?;
        self.tokens.expect_punctuation(Punctuation::RightParen)?;
        self.tokens.expect_punctuation(Punctuation::Semicolon)?;

        self.emit_all(value.fetch(Register::Eax));
        self.emit("PUSH EAX");
        self.emit(format!("CALL {}", PRINT_INT));
        self.emit("ADD ESP, 4");
        Ok(())
    }

    fn print_string_stmt(&mut self) -> Result<()> {
        self.tokens.expect_keyword(Keyword::Prints)?;
        self.tokens.expect_punctuation(Punctuation::LeftParen)?;

        let token = self.tokens.advance()?.clone();
        let push = match token.kind {
            TokenKind::StringLiteral => {
                let id = self.next_label_id();
                let label = self.data_label(&format!("literal_{}", id));
                let label = self.data.insert(&label, token.literal.into_bytes());
                format!("PUSH {}", label)
            }
            TokenKind::Identifier => {
                let symbol = self.resolve_variable(&token.literal)?;
                if symbol.typ != Type::Str {
                    return Err(Error::mismatch(format!(
                        "prints expects a string, '{}' has type {}",
                        symbol.name, symbol.typ
                    )));
                }
                match (&symbol.role, &symbol.label) {
                    (SymbolRole::Local, Some(label)) => format!("PUSH {}", label),
                    _ => format!("PUSH DWORD {}", memory("EBP", PARAMETER_SLOT)),
                }
            }
            _ => {
                return Err(Error::syntax(format!(
                    "expected a string literal or a string variable, found {}",
                    token
                )));
            }
        };
        self.tokens.expect_punctuation(Punctuation::RightParen)?;
        self.tokens.expect_punctuation(Punctuation::Semicolon)?;

        self.emit(push);
        self.emit(format!("CALL {}", PRINT_STRING));
        self.emit("ADD ESP, 4");
        Ok(())
    }
}
