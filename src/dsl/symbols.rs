use std::collections::HashMap;

use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Constant,
    Param,
}

/// Compile-time view of the names a script has declared. Routines are
/// global; data names are global unless declared while a routine body is
/// being parsed, in which case they live in that routine's scope.
#[derive(Debug, Default)]
pub struct CallContext {
    globals: HashMap<String, SymbolKind>,
    locals: Option<HashMap<String, SymbolKind>>,
    routines: IndexMap<String, Vec<String>>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a routine scope holding its parameters.
    pub fn enter_routine(&mut self, params: &[String]) {
        let scope = params
            .iter()
            .map(|p| (p.clone(), SymbolKind::Param))
            .collect();
        self.locals = Some(scope);
    }

    pub fn exit_routine(&mut self) {
        self.locals = None;
    }

    pub fn in_routine(&self) -> bool {
        self.locals.is_some()
    }

    pub fn add_variable(&mut self, name: &str, kind: SymbolKind) {
        let scope = self.locals.as_mut().unwrap_or(&mut self.globals);
        scope.insert(name.to_string(), kind);
    }

    /// Kind of a data name, searching the routine scope first.
    pub fn resolve(&self, name: &str) -> Option<SymbolKind> {
        self.locals
            .as_ref()
            .and_then(|scope| scope.get(name))
            .or_else(|| self.globals.get(name))
            .copied()
    }

    pub fn is_data(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    pub fn add_routine(&mut self, name: &str, params: Vec<String>) {
        self.routines.insert(name.to_string(), params);
    }

    pub fn routine_params(&self, name: &str) -> Option<&[String]> {
        self.routines.get(name).map(Vec::as_slice)
    }

    pub fn is_routine(&self, name: &str) -> bool {
        self.routines.contains_key(name)
    }

    /// Names that are neither data nor routines yet, for duplicate checks.
    pub fn is_free(&self, name: &str) -> bool {
        !self.is_data(name) && !self.is_routine(name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn routine_scope_shadows_and_expires() {
        let mut ctx = CallContext::new();
        ctx.add_variable("n", SymbolKind::Variable);
        ctx.enter_routine(&["x".to_string()]);
        ctx.add_variable("local", SymbolKind::Variable);
        assert_eq!(ctx.resolve("x"), Some(SymbolKind::Param));
        assert_eq!(ctx.resolve("n"), Some(SymbolKind::Variable));
        ctx.exit_routine();
        assert!(ctx.resolve("x").is_none());
        assert!(ctx.resolve("local").is_none());
        assert!(ctx.is_data("n"));
    }

    #[test]
    fn routines_are_global() {
        let mut ctx = CallContext::new();
        ctx.add_routine("warm", vec!["b".into()]);
        assert!(ctx.is_routine("warm"));
        assert_eq!(ctx.routine_params("warm").unwrap(), ["b".to_string()]);
        assert!(!ctx.is_free("warm"));
        assert!(ctx.is_free("cool"));
    }
}
