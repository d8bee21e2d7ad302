//! The macro symbol table: storage for `#define`d names.

use std::collections::HashMap;

/// Whether a macro takes a parenthesized argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroKind {
    /// No argument list — substituted by name alone.
    Object,
    /// Has a (possibly empty) ordered parameter list.
    Function(Vec<String>),
}

/// One `#define`d entity. The body is kept as raw source text and
/// re-tokenized at every expansion, matching the C rule that a macro body
/// is reparsed at each use rather than cached as a token tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macro {
    pub(crate) name: String,
    pub(crate) kind: MacroKind,
    pub(crate) body: String,
}

impl Macro {
    pub fn params(&self) -> &[String] {
        match &self.kind {
            MacroKind::Object => &[],
            MacroKind::Function(params) => params,
        }
    }

    pub fn is_function_like(&self) -> bool {
        matches!(self.kind, MacroKind::Function(_))
    }
}

/// Maps macro name to definition. Order of insertion is not observable —
/// backed by a plain `HashMap`.
#[derive(Debug, Default)]
pub struct SymbolTable {
    definitions: HashMap<String, Macro>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            definitions: HashMap::new(),
        }
    }

    /// Installs or replaces a macro. `params = None` makes it object-like;
    /// `params = Some(list)` (possibly empty) makes it function-like.
    pub fn define(&mut self, name: impl Into<String>, body: impl Into<String>, params: Option<Vec<String>>) {
        let name = name.into();
        let kind = match params {
            None => MacroKind::Object,
            Some(params) => MacroKind::Function(params),
        };
        self.definitions.insert(
            name.clone(),
            Macro {
                name,
                kind,
                body: body.into(),
            },
        );
    }

    /// Removes a macro if present; silent if absent.
    pub fn undefine(&mut self, name: &str) {
        self.definitions.remove(name);
    }

    pub fn lookup(&self, name: &str) -> Option<&Macro> {
        self.definitions.get(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_and_lookup_object_like() {
        let mut table = SymbolTable::new();
        table.define("PI", "3", None);
        let m = table.lookup("PI").unwrap();
        assert_eq!(m.kind, MacroKind::Object);
        assert_eq!(m.body, "3");
    }

    #[test]
    fn redefine_is_last_write_wins() {
        let mut table = SymbolTable::new();
        table.define("X", "1", None);
        table.define("X", "2", None);
        assert_eq!(table.lookup("X").unwrap().body, "2");
    }

    #[test]
    fn undefine_missing_is_silent() {
        let mut table = SymbolTable::new();
        table.undefine("NOPE");
        assert!(table.lookup("NOPE").is_none());
    }

    #[test]
    fn empty_body_object_like_is_still_defined() {
        let mut table = SymbolTable::new();
        table.define("FLAG", "", None);
        assert!(table.is_defined("FLAG"));
        assert_eq!(table.lookup("FLAG").unwrap().body, "");
    }

    #[test]
    fn function_like_with_zero_params() {
        let mut table = SymbolTable::new();
        table.define("CALL", "body", Some(vec![]));
        assert!(table.lookup("CALL").unwrap().is_function_like());
        assert!(table.lookup("CALL").unwrap().params().is_empty());
    }
}
