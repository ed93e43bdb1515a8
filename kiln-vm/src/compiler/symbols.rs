// kiln-vm - Bytecode compiler and virtual machine for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Lexical scopes and name resolution.
//!
//! Scopes live in an arena owned by [`SymbolTable`] and are addressed by
//! [`ScopeId`]. A function scope owns a slot space; a block scope (the body
//! of an `if`, a loop, a switch case) declares its names in its own map but
//! takes slots from the nearest enclosing function scope.
//!
//! Resolution classifies every name into one of four storage classes:
//!
//! - `Global`: declared in the root function scope (or a block inside it).
//! - `Local`: declared in the current function scope.
//! - `Free`: declared in an enclosing function. Each function scope caches
//!   the free variables it has seen and numbers them in discovery order.
//! - `Builtin`: a registered host function, consulted after the root scope.

use rustc_hash::FxHashMap;

use super::types::{CompileError, Result};

/// Handle to a scope in a [`SymbolTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Function,
    Block,
}

/// Storage class of a resolved name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Local,
    Free,
    Builtin,
}

/// A declared name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    name: String,
    index: u16,
    constant: bool,
}

impl Symbol {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Slot in the owning function's slot space, or the builtin index.
    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn is_constant(&self) -> bool {
        self.constant
    }
}

/// Where a name lives relative to the scope that asked for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub symbol: Symbol,
    pub scope: Scope,
    /// Function boundaries crossed to reach the declaration.
    pub depth: usize,
    /// Position in the resolving function's captured cells. Only
    /// meaningful for `Scope::Free`.
    pub free_index: u16,
}

#[derive(Debug)]
struct ScopeData {
    parent: Option<ScopeId>,
    kind: ScopeKind,
    names: FxHashMap<String, Symbol>,
    /// Slots claimed so far. Only used on function scopes.
    slots: u16,
    free: Vec<Resolution>,
    free_by_name: FxHashMap<String, usize>,
}

impl ScopeData {
    fn new(parent: Option<ScopeId>, kind: ScopeKind) -> Self {
        Self {
            parent,
            kind,
            names: FxHashMap::default(),
            slots: 0,
            free: Vec::new(),
            free_by_name: FxHashMap::default(),
        }
    }
}

/// Arena of scopes plus the builtin registry.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<ScopeData>,
    builtins: Vec<String>,
    builtin_index: FxHashMap<String, u16>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            scopes: vec![ScopeData::new(None, ScopeKind::Function)],
            builtins: Vec::new(),
            builtin_index: FxHashMap::default(),
        }
    }

    /// A root table that already knows the given builtin names, indexed in
    /// order.
    pub fn with_builtins<S: AsRef<str>>(names: impl IntoIterator<Item = S>) -> Result<Self> {
        let mut table = Self::new();
        for name in names {
            table.insert_builtin(name.as_ref())?;
        }
        Ok(table)
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Open a function scope under `parent`.
    pub fn new_child(&mut self, parent: ScopeId) -> ScopeId {
        self.push(parent, ScopeKind::Function)
    }

    /// Open a block scope under `parent`.
    pub fn new_block(&mut self, parent: ScopeId) -> ScopeId {
        self.push(parent, ScopeKind::Block)
    }

    fn push(&mut self, parent: ScopeId, kind: ScopeKind) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(ScopeData::new(Some(parent), kind));
        id
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.0].parent
    }

    pub fn kind(&self, scope: ScopeId) -> ScopeKind {
        self.scopes[scope.0].kind
    }

    /// True for the root scope and blocks nested directly in it.
    pub fn is_global(&self, scope: ScopeId) -> bool {
        let data = &self.scopes[scope.0];
        match data.parent {
            None => true,
            Some(parent) if data.kind == ScopeKind::Block => self.is_global(parent),
            Some(_) => false,
        }
    }

    /// The function scope whose slot space `scope` uses.
    pub fn function_scope(&self, scope: ScopeId) -> ScopeId {
        let mut current = scope;
        while let (ScopeKind::Block, Some(parent)) =
            (self.scopes[current.0].kind, self.scopes[current.0].parent)
        {
            current = parent;
        }
        current
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    pub fn insert_variable(&mut self, scope: ScopeId, name: &str) -> Result<Symbol> {
        self.insert(scope, name, false)
    }

    pub fn insert_constant(&mut self, scope: ScopeId, name: &str) -> Result<Symbol> {
        self.insert(scope, name, true)
    }

    fn insert(&mut self, scope: ScopeId, name: &str, constant: bool) -> Result<Symbol> {
        if self.scopes[scope.0].names.contains_key(name) {
            return Err(CompileError::DuplicateDeclaration(name.to_string()));
        }
        let owner = self.function_scope(scope);
        let index = self.scopes[owner.0].slots;
        if index == u16::MAX {
            return Err(CompileError::TooManySymbols);
        }
        self.scopes[owner.0].slots += 1;
        let symbol = Symbol {
            name: name.to_string(),
            index,
            constant,
        };
        self.scopes[scope.0]
            .names
            .insert(name.to_string(), symbol.clone());
        Ok(symbol)
    }

    /// Register a builtin name. Re-registering a name keeps its index.
    pub fn insert_builtin(&mut self, name: &str) -> Result<u16> {
        if let Some(&index) = self.builtin_index.get(name) {
            return Ok(index);
        }
        let index = u16::try_from(self.builtins.len()).map_err(|_| CompileError::TooManySymbols)?;
        self.builtins.push(name.to_string());
        self.builtin_index.insert(name.to_string(), index);
        Ok(index)
    }

    pub fn builtin_names(&self) -> &[String] {
        &self.builtins
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Look a name up in `scope` only.
    pub fn get(&self, scope: ScopeId, name: &str) -> Option<&Symbol> {
        self.scopes[scope.0].names.get(name)
    }

    /// Resolve a name from `scope` outward.
    ///
    /// Crossing into an enclosing function records the name as a free
    /// variable of every function scope crossed, so later lookups hit the
    /// cache and keep the same free index. Blocks never record free
    /// variables of their own: they report whatever their function scope
    /// resolved.
    pub fn resolve(&mut self, scope: ScopeId, name: &str) -> Result<Option<Resolution>> {
        let data = &self.scopes[scope.0];
        if let Some(symbol) = data.names.get(name) {
            let class = if self.is_global(scope) {
                Scope::Global
            } else {
                Scope::Local
            };
            return Ok(Some(Resolution {
                symbol: symbol.clone(),
                scope: class,
                depth: 0,
                free_index: 0,
            }));
        }
        if let Some(&i) = data.free_by_name.get(name) {
            return Ok(Some(data.free[i].clone()));
        }
        let Some(parent) = data.parent else {
            return Ok(self.resolve_builtin(name));
        };
        let kind = data.kind;

        let Some(outer) = self.resolve(parent, name)? else {
            return Ok(None);
        };
        if kind == ScopeKind::Block || matches!(outer.scope, Scope::Global | Scope::Builtin) {
            return Ok(Some(outer));
        }

        let data = &mut self.scopes[scope.0];
        let position = data.free.len();
        let free_index = u16::try_from(position).map_err(|_| CompileError::TooManySymbols)?;
        let resolution = Resolution {
            symbol: outer.symbol,
            scope: Scope::Free,
            depth: outer.depth + 1,
            free_index,
        };
        data.free.push(resolution.clone());
        data.free_by_name.insert(name.to_string(), position);
        Ok(Some(resolution))
    }

    fn resolve_builtin(&self, name: &str) -> Option<Resolution> {
        let &index = self.builtin_index.get(name)?;
        Some(Resolution {
            symbol: Symbol {
                name: name.to_string(),
                index,
                constant: true,
            },
            scope: Scope::Builtin,
            depth: 0,
            free_index: 0,
        })
    }

    // =========================================================================
    // Counts
    // =========================================================================

    /// Slots claimed in the slot space `scope` uses.
    pub fn slot_count(&self, scope: ScopeId) -> u16 {
        self.scopes[self.function_scope(scope).0].slots
    }

    pub fn free_count(&self, scope: ScopeId) -> usize {
        self.scopes[scope.0].free.len()
    }

    pub fn free(&self, scope: ScopeId, index: usize) -> Option<&Resolution> {
        self.scopes[scope.0].free.get(index)
    }

    /// Free variables of `scope` in free-index order.
    pub fn free_vars(&self, scope: ScopeId) -> &[Resolution] {
        &self.scopes[scope.0].free
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_declarations_are_global() {
        let mut table = SymbolTable::new();
        let root = table.root();
        let a = table.insert_variable(root, "a").unwrap();
        let b = table.insert_constant(root, "b").unwrap();
        assert_eq!((a.index(), b.index()), (0, 1));
        assert!(b.is_constant());

        let r = table.resolve(root, "a").unwrap().unwrap();
        assert_eq!(r.scope, Scope::Global);
        assert_eq!(table.slot_count(root), 2);
    }

    #[test]
    fn duplicate_in_same_scope_is_rejected() {
        let mut table = SymbolTable::new();
        let root = table.root();
        table.insert_variable(root, "x").unwrap();
        assert_eq!(
            table.insert_variable(root, "x"),
            Err(CompileError::DuplicateDeclaration("x".into()))
        );
        // Shadowing in a nested block is fine.
        let block = table.new_block(root);
        assert!(table.insert_variable(block, "x").is_ok());
    }

    #[test]
    fn blocks_take_slots_from_their_function() {
        let mut table = SymbolTable::new();
        let root = table.root();
        let func = table.new_child(root);
        table.insert_variable(func, "a").unwrap();
        let block = table.new_block(func);
        let b = table.insert_variable(block, "b").unwrap();
        let inner = table.new_block(block);
        let c = table.insert_variable(inner, "c").unwrap();

        assert_eq!((b.index(), c.index()), (1, 2));
        assert_eq!(table.slot_count(func), 3);
        assert_eq!(table.function_scope(inner), func);
        assert!(!table.is_global(block));
        assert_eq!(
            table.resolve(inner, "a").unwrap().unwrap().scope,
            Scope::Local
        );
    }

    #[test]
    fn blocks_in_the_root_are_global() {
        let mut table = SymbolTable::new();
        let root = table.root();
        let block = table.new_block(root);
        let sym = table.insert_variable(block, "x").unwrap();
        assert!(table.is_global(block));
        let r = table.resolve(block, "x").unwrap().unwrap();
        assert_eq!((r.scope, r.symbol.index()), (Scope::Global, sym.index()));
    }

    #[test]
    fn free_variables_are_numbered_and_cached() {
        let mut table = SymbolTable::new();
        let root = table.root();
        let outer = table.new_child(root);
        table.insert_variable(outer, "a").unwrap();
        table.insert_variable(outer, "b").unwrap();
        let inner = table.new_child(outer);

        let b = table.resolve(inner, "b").unwrap().unwrap();
        let a = table.resolve(inner, "a").unwrap().unwrap();
        let b_again = table.resolve(inner, "b").unwrap().unwrap();

        assert_eq!((b.scope, b.free_index, b.depth), (Scope::Free, 0, 1));
        assert_eq!((a.scope, a.free_index), (Scope::Free, 1));
        assert_eq!(b_again, b);
        assert_eq!(table.free_count(inner), 2);
        assert_eq!(table.free(inner, 1).unwrap().symbol.name(), "a");
    }

    #[test]
    fn transitive_capture_crosses_every_function() {
        let mut table = SymbolTable::new();
        let root = table.root();
        let f = table.new_child(root);
        table.insert_variable(f, "x").unwrap();
        let g = table.new_child(f);
        let h = table.new_child(g);

        let r = table.resolve(h, "x").unwrap().unwrap();
        assert_eq!((r.scope, r.depth), (Scope::Free, 2));
        assert_eq!(table.free_count(g), 1);
        assert_eq!(table.free(g, 0).unwrap().depth, 1);
    }

    #[test]
    fn block_free_variable_shares_the_function_free_index() {
        let mut table = SymbolTable::new();
        let root = table.root();
        let outer = table.new_child(root);
        table.insert_variable(outer, "x").unwrap();
        table.insert_variable(outer, "y").unwrap();
        let func = table.new_child(outer);
        table.resolve(func, "y").unwrap();
        let block = table.new_block(func);

        let from_block = table.resolve(block, "x").unwrap().unwrap();
        let from_func = table.resolve(func, "x").unwrap().unwrap();
        assert_eq!(from_block, from_func);
        assert_eq!(from_block.free_index, 1);
        assert_eq!(table.free_count(block), 0);
        assert_eq!(table.free_count(func), 2);
    }

    #[test]
    fn globals_and_builtins_are_never_reclassified() {
        let mut table = SymbolTable::with_builtins(["len", "print"]).unwrap();
        let root = table.root();
        table.insert_variable(root, "g").unwrap();
        let f = table.new_child(root);
        let g = table.new_child(f);

        assert_eq!(table.resolve(g, "g").unwrap().unwrap().scope, Scope::Global);
        let print = table.resolve(g, "print").unwrap().unwrap();
        assert_eq!((print.scope, print.symbol.index()), (Scope::Builtin, 1));
        assert_eq!(table.free_count(g), 0);
        assert_eq!(table.resolve(g, "missing").unwrap(), None);
    }

    #[test]
    fn locals_shadow_builtins() {
        let mut table = SymbolTable::with_builtins(["len"]).unwrap();
        let root = table.root();
        table.insert_variable(root, "len").unwrap();
        assert_eq!(
            table.resolve(root, "len").unwrap().unwrap().scope,
            Scope::Global
        );
        assert_eq!(table.insert_builtin("len").unwrap(), 0);
    }
}
