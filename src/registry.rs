use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Int,
    Str,
    ClassType(String),
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Str => write!(f, "string"),
            Type::ClassType(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub typ: Type,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    pub name: String,
    pub param: Option<Parameter>,
}

impl MethodSignature {
    // bytes the caller pushes: receiver plus the optional argument
    pub fn argument_bytes(&self) -> u32 {
        if self.param.is_some() { 8 } else { 4 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDefinition {
    pub name: String,
    pub fields: Vec<String>,
    pub methods: Vec<MethodSignature>,
}

impl ClassDefinition {
    pub fn field_index(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|name| name == field)
    }

    pub fn find_method(&self, name: &str) -> Option<&MethodSignature> {
        self.methods.iter().find(|method| method.name == name)
    }

    /// Bytes an instance occupies: one 4-byte word per field.
    pub fn instance_size(&self) -> u32 {
        4 * self.fields.len() as u32
    }
}

/*
Classes are only visible after their header has been read, so a type can never
refer forward. A class is sealed at its closing brace and stays read-only from
then on.
*/
#[derive(Debug, Default)]
pub struct TypeRegistry {
    classes: HashMap<String, ClassDefinition>,
    // discovery order, used when emitting
    order: Vec<String>,
    sealed: HashSet<String>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        TypeRegistry::default()
    }

    pub fn declare_class(&mut self, name: &str) -> Result<()> {
        if self.classes.contains_key(name) {
            return Err(Error::duplicate(format!("class '{}' has already been defined", name)));
        }
        self.classes.insert(
            name.to_string(),
            ClassDefinition {
                name: name.to_string(),
                fields: Vec::new(),
                methods: Vec::new(),
            },
        );
        self.order.push(name.to_string());
        Ok(())
    }

    pub fn add_field(&mut self, class: &str, field: &str) -> Result<()> {
        let definition = self.open_class(class)?;
        if definition.field_index(field).is_some() {
            return Err(Error::duplicate(format!(
                "field '{}' has already been defined in class '{}'",
                field, class
            )));
        }
        definition.fields.push(field.to_string());
        Ok(())
    }

    pub fn add_method(&mut self, class: &str, signature: MethodSignature) -> Result<()> {
        let definition = self.open_class(class)?;
        if definition.find_method(&signature.name).is_some() {
            return Err(Error::duplicate(format!(
                "method '{}' has already been defined in class '{}'",
                signature.name, class
            )));
        }
        definition.methods.push(signature);
        Ok(())
    }

    pub fn seal(&mut self, class: &str) {
        self.sealed.insert(class.to_string());
    }

    fn open_class(&mut self, class: &str) -> Result<&mut ClassDefinition> {
        if self.sealed.contains(class) {
            return Err(Error::structural(format!("class '{}' is already closed", class)));
        }
        self.classes
            .get_mut(class)
            .ok_or_else(|| Error::undefined(format!("class '{}'", class)))
    }

    /// `int`, `string`, or a class declared earlier in the file.
    pub fn resolve_type(&self, name: &str) -> Result<Type> {
        match name {
            "int" => Ok(Type::Int),
            "string" => Ok(Type::Str),
            _ if self.classes.contains_key(name) => Ok(Type::ClassType(name.to_string())),
            _ => Err(Error::undefined(format!("type '{}' is not defined above", name))),
        }
    }

    pub fn get(&self, class: &str) -> Option<&ClassDefinition> {
        self.classes.get(class)
    }

    pub fn field_offset_index(&self, class: &str, field: &str) -> Option<usize> {
        self.get(class)?.field_index(field)
    }

    pub fn find_method(&self, class: &str, name: &str) -> Option<&MethodSignature> {
        self.get(class)?.find_method(name)
    }

    pub fn field_count(&self, class: &str) -> usize {
        self.get(class).map_or(0, |definition| definition.fields.len())
    }

    /// Bytes a value of `typ` takes on the stack. Strings live in the data section.
    pub fn slot_size(&self, typ: &Type) -> u32 {
        match typ {
            Type::Int => 4,
            Type::Str => 0,
            Type::ClassType(class) => self.get(class).map_or(0, ClassDefinition::instance_size),
        }
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDefinition> {
        self.order.iter().filter_map(|name| self.classes.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_box() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.declare_class("Box").unwrap();
        registry.add_field("Box", "v").unwrap();
        registry.add_field("Box", "w").unwrap();
        registry
            .add_method("Box", MethodSignature { name: "set".to_string(), param: None })
            .unwrap();
        registry
    }

    #[test]
    fn duplicate_class() {
        let mut registry = registry_with_box();
        let err = registry.declare_class("Box").unwrap_err();
        assert!(matches!(err, Error::DuplicateDeclaration { .. }));
    }

    #[test]
    fn duplicate_field_and_method() {
        let mut registry = registry_with_box();
        assert!(matches!(
            registry.add_field("Box", "w").unwrap_err(),
            Error::DuplicateDeclaration { .. }
        ));
        let again = MethodSignature { name: "set".to_string(), param: None };
        assert!(matches!(
            registry.add_method("Box", again).unwrap_err(),
            Error::DuplicateDeclaration { .. }
        ));
    }

    #[test]
    fn resolve_type() {
        let registry = registry_with_box();
        assert_eq!(registry.resolve_type("int").unwrap(), Type::Int);
        assert_eq!(registry.resolve_type("string").unwrap(), Type::Str);
        assert_eq!(registry.resolve_type("Box").unwrap(), Type::ClassType("Box".to_string()));
        assert!(matches!(
            registry.resolve_type("Crate").unwrap_err(),
            Error::UndefinedName { .. }
        ));
    }

    #[test]
    fn field_offsets_follow_declaration_order() {
        let registry = registry_with_box();
        assert_eq!(registry.field_offset_index("Box", "v"), Some(0));
        assert_eq!(registry.field_offset_index("Box", "w"), Some(1));
        assert_eq!(registry.field_offset_index("Box", "x"), None);
        assert_eq!(registry.slot_size(&Type::ClassType("Box".to_string())), 8);
        assert_eq!(registry.slot_size(&Type::Str), 0);
    }

    #[test]
    fn sealed_class_is_read_only() {
        let mut registry = registry_with_box();
        registry.seal("Box");
        assert!(matches!(registry.add_field("Box", "z").unwrap_err(), Error::Structural { .. }));
        assert!(registry.find_method("Box", "set").is_some());
    }

    #[test]
    fn discovery_order() {
        let mut registry = registry_with_box();
        registry.declare_class("Alpha").unwrap();
        let names: Vec<&str> = registry.classes().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Box", "Alpha"]);
    }
}
