use crate::error::{Error, Result};
use crate::registry::{Type, TypeRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolRole {
    Parameter,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub typ: Type,
    pub role: SymbolRole,
    // data-section label; only string locals have one
    pub label: Option<String>,
}

impl Symbol {
    pub fn local(name: &str, typ: Type) -> Self {
        Symbol {
            name: name.to_string(),
            typ,
            role: SymbolRole::Local,
            label: None,
        }
    }

    pub fn parameter(name: &str, typ: Type) -> Self {
        Symbol {
            name: name.to_string(),
            typ,
            role: SymbolRole::Parameter,
            label: None,
        }
    }

    pub fn with_label(mut self, label: String) -> Self {
        self.label = Some(label);
        self
    }
}

#[derive(Debug, Default)]
struct ScopeFrame {
    locals: Vec<Symbol>,
}

/*
One chain per method. frames[0] is the method body, every if/while body pushes
another frame on top and pops it when the body is done. The parameter belongs
to frames[0] for redeclaration purposes but is addressed above the frame
pointer, so it never takes part in offset arithmetic.
*/
#[derive(Debug)]
pub struct ScopeChain {
    frames: Vec<ScopeFrame>,
    parameter: Option<Symbol>,
}

impl Default for ScopeChain {
    fn default() -> Self {
        ScopeChain {
            frames: vec![ScopeFrame::default()],
            parameter: None,
        }
    }
}

impl ScopeChain {
    pub fn new() -> Self {
        ScopeChain::default()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.frames.push(ScopeFrame::default());
        self.parameter = None;
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push_frame(&mut self) {
        self.frames.push(ScopeFrame::default());
        log::trace!("scope push, depth {}", self.frames.len());
    }

    /// Callers emit the deallocation for `frame_size` before popping.
    pub fn pop_frame(&mut self) {
        // the method frame is only dropped by `clear`
        if self.frames.len() > 1 {
            self.frames.pop();
        }
        log::trace!("scope pop, depth {}", self.frames.len());
    }

    pub fn declare_parameter(&mut self, symbol: Symbol) {
        self.parameter = Some(symbol);
    }

    pub fn declare_local(&mut self, symbol: Symbol) -> Result<()> {
        if self.lookup_local_only(&symbol.name).is_some() {
            return Err(Error::duplicate(format!(
                "variable '{}' has already been defined in this scope",
                symbol.name
            )));
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.locals.push(symbol);
        }
        Ok(())
    }

    pub fn lookup_local_only(&self, name: &str) -> Option<&Symbol> {
        let frame = self.frames.last()?;
        if let Some(symbol) = frame.locals.iter().find(|symbol| symbol.name == name) {
            return Some(symbol);
        }
        if self.frames.len() == 1 {
            return self.parameter.as_ref().filter(|symbol| symbol.name == name);
        }
        None
    }

    pub fn lookup_any(&self, name: &str) -> Option<&Symbol> {
        self.find_local(name)
            .map(|(frame, index)| &self.frames[frame].locals[index])
            .or_else(|| self.parameter.as_ref().filter(|symbol| symbol.name == name))
    }

    // innermost declaration wins
    fn find_local(&self, name: &str) -> Option<(usize, usize)> {
        self.frames.iter().enumerate().rev().find_map(|(frame_index, frame)| {
            frame
                .locals
                .iter()
                .position(|symbol| symbol.name == name)
                .map(|index| (frame_index, index))
        })
    }

    /// Distance below EBP of the local `name`: the first local sits at EBP - 4,
    /// every local declared before it (outer frames first) pushes it further down.
    /// None for the parameter and for unknown names.
    pub fn frame_offset_of(&self, name: &str, registry: &TypeRegistry) -> Option<u32> {
        let (target_frame, target_index) = self.find_local(name)?;

        let mut offset = 4;
        for (frame_index, frame) in self.frames.iter().enumerate().take(target_frame + 1) {
            for (index, symbol) in frame.locals.iter().enumerate() {
                if frame_index == target_frame && index == target_index {
                    return Some(offset);
                }
                offset += registry.slot_size(&symbol.typ);
            }
        }
        None
    }

    /// Stack bytes held by the locals of the innermost frame.
    pub fn frame_size(&self, registry: &TypeRegistry) -> u32 {
        self.frames.last().map_or(0, |frame| {
            frame.locals.iter().map(|symbol| registry.slot_size(&symbol.typ)).sum()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MethodSignature;

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.declare_class("Pair").unwrap();
        registry.add_field("Pair", "a").unwrap();
        registry.add_field("Pair", "b").unwrap();
        registry.add_field("Pair", "c").unwrap();
        registry
            .add_method("Pair", MethodSignature { name: "m".to_string(), param: None })
            .unwrap();
        registry
    }

    fn pair() -> Type {
        Type::ClassType("Pair".to_string())
    }

    #[test]
    fn redeclaration_in_same_frame_fails() {
        let mut scope = ScopeChain::new();
        scope.declare_local(Symbol::local("x", Type::Int)).unwrap();
        let err = scope.declare_local(Symbol::local("x", Type::Int)).unwrap_err();
        assert!(matches!(err, Error::DuplicateDeclaration { .. }));
    }

    #[test]
    fn shadowing_enclosing_frame_is_allowed() {
        let mut scope = ScopeChain::new();
        scope.declare_local(Symbol::local("x", Type::Int)).unwrap();
        scope.push_frame();
        scope.declare_local(Symbol::local("x", pair())).unwrap();
        assert_eq!(scope.lookup_any("x").unwrap().typ, pair());
        scope.pop_frame();
        assert_eq!(scope.lookup_any("x").unwrap().typ, Type::Int);
    }

    #[test]
    fn block_locals_are_gone_after_pop() {
        let mut scope = ScopeChain::new();
        scope.push_frame();
        scope.declare_local(Symbol::local("y", Type::Int)).unwrap();
        assert!(scope.lookup_any("y").is_some());
        scope.pop_frame();
        assert!(scope.lookup_any("y").is_none());
        assert_eq!(scope.depth(), 1);
    }

    #[test]
    fn parameter_lookup() {
        let mut scope = ScopeChain::new();
        scope.declare_parameter(Symbol::parameter("p", Type::Int));
        assert_eq!(scope.lookup_any("p").unwrap().role, SymbolRole::Parameter);
        assert!(matches!(
            scope.declare_local(Symbol::local("p", Type::Int)).unwrap_err(),
            Error::DuplicateDeclaration { .. }
        ));

        // a block may shadow it
        scope.push_frame();
        scope.declare_local(Symbol::local("p", Type::Int)).unwrap();
        assert_eq!(scope.lookup_any("p").unwrap().role, SymbolRole::Local);
    }

    #[test]
    fn parameter_has_no_frame_offset() {
        let registry = registry();
        let mut scope = ScopeChain::new();
        scope.declare_parameter(Symbol::parameter("p", pair()));
        scope.declare_local(Symbol::local("x", Type::Int)).unwrap();
        assert_eq!(scope.frame_offset_of("p", &registry), None);
        assert_eq!(scope.frame_offset_of("x", &registry), Some(4));
        assert_eq!(scope.frame_offset_of("nope", &registry), None);
    }

    #[test]
    fn offsets_accumulate_by_type() {
        let registry = registry();
        let mut scope = ScopeChain::new();
        scope.declare_local(Symbol::local("a", Type::Int)).unwrap();
        scope.declare_local(Symbol::local("obj", pair())).unwrap();
        scope.declare_local(Symbol::local("s", Type::Str).with_label("main_s".to_string())).unwrap();
        scope.declare_local(Symbol::local("b", Type::Int)).unwrap();

        assert_eq!(scope.frame_offset_of("a", &registry), Some(4));
        assert_eq!(scope.frame_offset_of("obj", &registry), Some(8));
        // 3 fields
        assert_eq!(scope.frame_offset_of("b", &registry), Some(20));
        assert_eq!(scope.frame_size(&registry), 4 + 12 + 4);
    }

    #[test]
    fn offsets_strictly_increase_and_never_collide() {
        let registry = registry();
        let mut scope = ScopeChain::new();
        let mut names = Vec::new();
        for i in 0..6 {
            let name = format!("v{}", i);
            let typ = if i % 2 == 0 { Type::Int } else { pair() };
            scope.declare_local(Symbol::local(&name, typ)).unwrap();
            names.push(name);
            if i == 2 {
                scope.push_frame();
            }
        }

        let offsets: Vec<u32> = names
            .iter()
            .map(|name| scope.frame_offset_of(name, &registry).unwrap())
            .collect();
        for window in offsets.windows(2) {
            assert!(window[0] < window[1], "offsets {:?}", offsets);
        }
    }

    #[test]
    fn nested_frames_continue_from_outer_locals() {
        let registry = registry();
        let mut scope = ScopeChain::new();
        scope.declare_local(Symbol::local("x", Type::Int)).unwrap();
        scope.push_frame();
        scope.declare_local(Symbol::local("x", Type::Int)).unwrap();
        scope.declare_local(Symbol::local("o", pair())).unwrap();
        assert_eq!(scope.frame_offset_of("x", &registry), Some(8));
        assert_eq!(scope.frame_offset_of("o", &registry), Some(12));
        assert_eq!(scope.frame_size(&registry), 16);

        scope.pop_frame();
        assert_eq!(scope.frame_offset_of("x", &registry), Some(4));
        scope.declare_local(Symbol::local("y", Type::Int)).unwrap();
        // the popped block's storage is reused
        assert_eq!(scope.frame_offset_of("y", &registry), Some(8));
    }

    #[test]
    fn clear_resets_to_one_frame() {
        let mut scope = ScopeChain::new();
        scope.declare_parameter(Symbol::parameter("p", Type::Int));
        scope.push_frame();
        scope.declare_local(Symbol::local("x", Type::Int)).unwrap();
        scope.clear();
        assert_eq!(scope.depth(), 1);
        assert!(scope.lookup_any("p").is_none());
        assert!(scope.lookup_any("x").is_none());
    }
}
