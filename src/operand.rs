use std::fmt;

use crate::error::{Error, Result};
use crate::registry::Type;
use crate::scope::{Symbol, SymbolRole};
use crate::token::{Punctuation, Token, TokenKind, Keyword};
use crate::translator::Translator;

// [EBP + 8] holds the receiver, [EBP + 12] the argument, see the call sequence in statement.rs
pub const RECEIVER_SLOT: i64 = 8;
pub const PARAMETER_SLOT: i64 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    Eax,
    Ebx,
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Register::Eax => write!(f, "EAX"),
            Register::Ebx => write!(f, "EBX"),
        }
    }
}

/// `[base]`, `[base + n]` or `[base - n]`.
pub fn memory(base: impl fmt::Display, displacement: i64) -> String {
    match displacement {
        0 => format!("[{}]", base),
        d if d > 0 => format!("[{} + {}]", base, d),
        d => format!("[{} - {}]", base, -d),
    }
}

/// Stack slot `offset` bytes below the frame pointer.
pub fn frame_slot(offset: u32) -> String {
    memory("EBP", -(offset as i64))
}

// fields grow downwards from the object's address
fn field_displacement(index: usize) -> i64 {
    -4 * index as i64
}

/// Where a variable's storage lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
    Frame(u32),
    Parameter,
    Data(String),
}

/// Instructions leaving the address of an object or string variable in `reg`.
pub fn object_address(storage: &Storage, reg: Register) -> Vec<String> {
    match storage {
        Storage::Frame(offset) => vec![format!("LEA {}, {}", reg, frame_slot(*offset))],
        Storage::Parameter => vec![format!("MOV {}, {}", reg, memory("EBP", PARAMETER_SLOT))],
        Storage::Data(label) => vec![format!("MOV {}, {}", reg, label)],
    }
}

/// Instructions leaving the address of field `index` in `reg`.
fn field_address(storage: &Storage, index: usize, reg: Register) -> Vec<String> {
    if let Storage::Frame(offset) = storage {
        let slot = frame_slot(*offset + 4 * index as u32);
        return vec![format!("LEA {}, {}", reg, slot)];
    }
    let mut code = object_address(storage, reg);
    if index > 0 {
        code.push(format!("LEA {}, {}", reg, memory(reg, field_displacement(index))));
    }
    code
}

fn field_value(storage: &Storage, index: usize, reg: Register) -> Vec<String> {
    if let Storage::Frame(offset) = storage {
        let slot = frame_slot(*offset + 4 * index as u32);
        return vec![format!("MOV {}, {}", reg, slot)];
    }
    let mut code = object_address(storage, reg);
    code.push(format!("MOV {}, {}", reg, memory(reg, field_displacement(index))));
    code
}

fn receiver_field(index: usize, reg: Register) -> Vec<String> {
    vec![
        format!("MOV {}, {}", reg, memory("EBP", RECEIVER_SLOT)),
        format!("MOV {}, {}", reg, memory(reg, field_displacement(index))),
    ]
}

/// Assignment target. Its address always ends up in EBX.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LValue {
    // x
    Variable { symbol: Symbol, storage: Storage },
    // this.f
    ReceiverField { field: String, index: usize },
    // obj.f
    ObjectField { owner: Symbol, storage: Storage, field: String, index: usize },
}

impl LValue {
    pub fn value_type(&self) -> Type {
        match self {
            LValue::Variable { symbol, .. } => symbol.typ.clone(),
            // fields are always int
            LValue::ReceiverField { .. } | LValue::ObjectField { .. } => Type::Int,
        }
    }

    pub fn address(&self) -> Vec<String> {
        let reg = Register::Ebx;
        match self {
            LValue::Variable { symbol, storage } => match (&symbol.typ, storage) {
                (Type::Int, Storage::Frame(offset)) => vec![format!("LEA {}, {}", reg, frame_slot(*offset))],
                (Type::Int, Storage::Parameter) => {
                    vec![format!("LEA {}, {}", reg, memory("EBP", PARAMETER_SLOT))]
                }
                _ => object_address(storage, reg),
            },
            LValue::ReceiverField { index, .. } => {
                let mut code = vec![format!("MOV {}, {}", reg, memory("EBP", RECEIVER_SLOT))];
                if *index > 0 {
                    code.push(format!("LEA {}, {}", reg, memory(reg, field_displacement(*index))));
                }
                code
            }
            LValue::ObjectField { storage, index, .. } => field_address(storage, *index, reg),
        }
    }
}

/// A value (int) or an address (object, string).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RValue {
    Variable { symbol: Symbol, storage: Storage },
    ReceiverField { field: String, index: usize },
    ObjectField { owner: Symbol, storage: Storage, field: String, index: usize },
    Literal(i32),
}

impl From<LValue> for RValue {
    fn from(value: LValue) -> Self {
        match value {
            LValue::Variable { symbol, storage } => RValue::Variable { symbol, storage },
            LValue::ReceiverField { field, index } => RValue::ReceiverField { field, index },
            LValue::ObjectField { owner, storage, field, index } => {
                RValue::ObjectField { owner, storage, field, index }
            }
        }
    }
}

impl RValue {
    pub fn value_type(&self) -> Type {
        match self {
            RValue::Variable { symbol, .. } => symbol.typ.clone(),
            RValue::ReceiverField { .. } | RValue::ObjectField { .. } | RValue::Literal(_) => Type::Int,
        }
    }

    /// Load into `reg`, touching no other register.
    pub fn fetch(&self, reg: Register) -> Vec<String> {
        match self {
            RValue::Literal(value) => vec![format!("MOV {}, {}", reg, value)],
            RValue::Variable { symbol, storage } => match (&symbol.typ, storage) {
                (Type::Int, Storage::Frame(offset)) => vec![format!("MOV {}, {}", reg, frame_slot(*offset))],
                (Type::Int, Storage::Parameter) => {
                    vec![format!("MOV {}, {}", reg, memory("EBP", PARAMETER_SLOT))]
                }
                _ => object_address(storage, reg),
            },
            RValue::ReceiverField { index, .. } => receiver_field(*index, reg),
            RValue::ObjectField { storage, index, .. } => field_value(storage, *index, reg),
        }
    }

    fn describe(&self) -> String {
        match self {
            RValue::Variable { symbol, .. } => format!("'{}'", symbol.name),
            RValue::ReceiverField { field, .. } => format!("'this.{}'", field),
            RValue::ObjectField { owner, field, .. } => format!("'{}.{}'", owner.name, field),
            RValue::Literal(value) => format!("literal {}", value),
        }
    }
}

impl Translator {
    pub(crate) fn get_lvalue(&mut self) -> Result<LValue> {
        let token = self.tokens.advance()?.clone();
        self.resolve_name(&token)
    }

    pub(crate) fn get_rvalue_with_expected_type(&mut self, expected: &Type) -> Result<RValue> {
        let token = self.tokens.advance()?.clone();
        let value = match token.kind {
            TokenKind::Number => {
                let number = token
                    .literal
                    .parse::<i32>()
                    .map_err(|_| Error::lex(format!("number literal {} is out of range", token.literal)))?;
                RValue::Literal(number)
            }
            TokenKind::Identifier | TokenKind::Keyword(Keyword::This) => self.resolve_name(&token)?.into(),
            _ => return Err(Error::syntax(format!("expected a value, found {}", token))),
        };

        let actual = value.value_type();
        if actual != *expected {
            return Err(Error::mismatch(format!(
                "expected a value of type {}, found {} of type {}",
                expected,
                value.describe(),
                actual
            )));
        }
        Ok(value)
    }

    /// `x`, `this.f` or `obj.f`, with `first` already consumed.
    fn resolve_name(&mut self, first: &Token) -> Result<LValue> {
        match first.kind {
            TokenKind::Keyword(Keyword::This) => {
                self.tokens.expect_punctuation(Punctuation::Dot)?;
                let field = self.tokens.expect_identifier()?;
                let class = self.receiver_class()?;
                let index = self.registry.field_offset_index(&class, &field).ok_or_else(|| {
                    Error::undefined(format!("field '{}' is not defined in class '{}'", field, class))
                })?;
                Ok(LValue::ReceiverField { field, index })
            }
            TokenKind::Identifier if self.tokens.next_is_punctuation(Punctuation::Dot) => {
                self.tokens.advance()?;
                let field = self.tokens.expect_identifier()?;
                let owner = self.resolve_variable(&first.literal)?;
                let Type::ClassType(class) = &owner.typ else {
                    return Err(Error::mismatch(format!(
                        "'{}' has type {} and has no fields",
                        owner.name, owner.typ
                    )));
                };
                let index = self.registry.field_offset_index(class, &field).ok_or_else(|| {
                    Error::undefined(format!("field '{}' is not defined in class '{}'", field, class))
                })?;
                let storage = self.storage_of(&owner)?;
                Ok(LValue::ObjectField { owner, storage, field, index })
            }
            TokenKind::Identifier => {
                let symbol = self.resolve_variable(&first.literal)?;
                let storage = self.storage_of(&symbol)?;
                Ok(LValue::Variable { symbol, storage })
            }
            _ => Err(Error::syntax(format!("expected a variable or field, found {}", first))),
        }
    }

    pub(crate) fn resolve_variable(&self, name: &str) -> Result<Symbol> {
        self.scope.lookup_any(name).cloned().ok_or_else(|| {
            Error::undefined(format!(
                "variable '{}' is not defined in method '{}'",
                name, self.current_method
            ))
        })
    }

    pub(crate) fn storage_of(&self, symbol: &Symbol) -> Result<Storage> {
        if symbol.role == SymbolRole::Parameter {
            return Ok(Storage::Parameter);
        }
        if let Some(label) = &symbol.label {
            return Ok(Storage::Data(label.clone()));
        }
        self.frame_offset(&symbol.name).map(Storage::Frame)
    }

    pub(crate) fn receiver_class(&self) -> Result<String> {
        self.current_class
            .clone()
            .ok_or_else(|| Error::undefined("'this' is only available inside class methods"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_local(name: &str, offset: u32) -> RValue {
        RValue::Variable {
            symbol: Symbol::local(name, Type::Int),
            storage: Storage::Frame(offset),
        }
    }

    #[test]
    fn memory_operands() {
        assert_eq!(memory("EBX", 0), "[EBX]");
        assert_eq!(memory("EBP", 12), "[EBP + 12]");
        assert_eq!(memory(Register::Eax, -8), "[EAX - 8]");
        assert_eq!(frame_slot(4), "[EBP - 4]");
    }

    #[test]
    fn fetch_uses_only_the_target_register() {
        let value = RValue::ReceiverField { field: "v".to_string(), index: 2 };
        assert_eq!(value.fetch(Register::Ebx), vec!["MOV EBX, [EBP + 8]", "MOV EBX, [EBX - 8]"]);
        assert_eq!(int_local("x", 8).fetch(Register::Eax), vec!["MOV EAX, [EBP - 8]"]);
        assert_eq!(RValue::Literal(-3).fetch(Register::Ebx), vec!["MOV EBX, -3"]);
    }

    #[test]
    fn object_values_are_addresses() {
        let local = RValue::Variable {
            symbol: Symbol::local("b", Type::ClassType("Box".to_string())),
            storage: Storage::Frame(12),
        };
        assert_eq!(local.fetch(Register::Eax), vec!["LEA EAX, [EBP - 12]"]);

        let param = RValue::Variable {
            symbol: Symbol::parameter("p", Type::ClassType("Box".to_string())),
            storage: Storage::Parameter,
        };
        assert_eq!(param.fetch(Register::Eax), vec!["MOV EAX, [EBP + 12]"]);

        let text = RValue::Variable {
            symbol: Symbol::local("s", Type::Str).with_label("main_s".to_string()),
            storage: Storage::Data("main_s".to_string()),
        };
        assert_eq!(text.fetch(Register::Eax), vec!["MOV EAX, main_s"]);
    }

    #[test]
    fn object_fields() {
        let owner = Symbol::local("b", Type::ClassType("Box".to_string()));
        let local = RValue::ObjectField {
            owner: owner.clone(),
            storage: Storage::Frame(8),
            field: "w".to_string(),
            index: 1,
        };
        assert_eq!(local.fetch(Register::Eax), vec!["MOV EAX, [EBP - 12]"]);

        let through_param = LValue::ObjectField {
            owner,
            storage: Storage::Parameter,
            field: "w".to_string(),
            index: 1,
        };
        assert_eq!(through_param.address(), vec!["MOV EBX, [EBP + 12]", "LEA EBX, [EBX - 4]"]);
    }

    #[test]
    fn lvalue_addresses() {
        let first_field = LValue::ReceiverField { field: "v".to_string(), index: 0 };
        assert_eq!(first_field.address(), vec!["MOV EBX, [EBP + 8]"]);

        let int_param = LValue::Variable {
            symbol: Symbol::parameter("n", Type::Int),
            storage: Storage::Parameter,
        };
        assert_eq!(int_param.address(), vec!["LEA EBX, [EBP + 12]"]);
        assert_eq!(int_param.value_type(), Type::Int);
    }
}
