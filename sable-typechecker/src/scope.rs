//! Scope chain and symbol store
//!
//! Scopes live in an arena owned by the `SymbolTable` and follow the AST
//! traversal: `enter_scope` pushes a child of the current scope and
//! `exit_scope` pops it again. Each scope records its parent when it is
//! created, so the chain is always a tree ending in the shared, immutable
//! prelude. Handles carry a generation stamp so a handle to a popped scope
//! never aliases the scope that later reuses its slot.
//!
//! Every registry in a scope (symbols, types, kinds, traits, instances,
//! extension methods, exports) is written only in the current scope and
//! read through the whole chain, which gives lexical shadowing.

use crate::config::ResolverConfig;
use crate::error::{ResolutionError, TypecheckError};
use crate::evidence::EvidenceTable;
use crate::exports::Reexport;
use crate::instances::InstanceDef;
use crate::symbols::{Origin, Symbol, SymbolKind};
use crate::traits::{Constraint, TraitInfo};
use indexmap::{IndexMap, IndexSet};
use sable_types::{Kind, Type};
use std::cell::Cell;
use std::fmt;

/// The lexical role of a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Prelude,
    Global,
    Function,
    Block,
}

/// Generation-stamped handle to a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId {
    index: u32,
    generation: u32,
}

impl ScopeId {
    /// Handle of the shared prelude scope
    pub const PRELUDE: ScopeId = ScopeId {
        index: u32::MAX,
        generation: 0,
    };

    fn new(index: usize, generation: u32) -> Self {
        Self {
            index: index as u32,
            generation,
        }
    }

    pub fn is_prelude(self) -> bool {
        self == Self::PRELUDE
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_prelude() {
            write!(f, "scope#prelude")
        } else {
            write!(f, "scope#{}.{}", self.index, self.generation)
        }
    }
}

/// A single lexical environment
#[derive(Debug, Clone)]
pub struct Scope {
    kind: ScopeKind,
    parent: Option<ScopeId>,
    pub(crate) symbols: IndexMap<String, Symbol>,
    pub(crate) types: IndexMap<String, Type>,
    pub(crate) alias_params: IndexMap<String, Vec<String>>,
    pub(crate) kinds: IndexMap<String, Kind>,
    pub(crate) variants: IndexMap<String, Vec<String>>,
    pub(crate) constraints: IndexMap<String, Vec<Constraint>>,
    pub(crate) modules: IndexMap<String, IndexMap<String, Symbol>>,
    pub(crate) traits: IndexMap<String, TraitInfo>,
    pub(crate) operator_traits: IndexMap<String, String>,
    pub(crate) implementations: IndexMap<String, Vec<InstanceDef>>,
    pub(crate) extension_methods: IndexMap<String, IndexMap<String, Type>>,
    pub(crate) exports: IndexSet<String>,
    pub(crate) reexports: Vec<Reexport>,
}

impl Scope {
    fn new(kind: ScopeKind, parent: Option<ScopeId>) -> Self {
        Self {
            kind,
            parent,
            symbols: IndexMap::new(),
            types: IndexMap::new(),
            alias_params: IndexMap::new(),
            kinds: IndexMap::new(),
            variants: IndexMap::new(),
            constraints: IndexMap::new(),
            modules: IndexMap::new(),
            traits: IndexMap::new(),
            operator_traits: IndexMap::new(),
            implementations: IndexMap::new(),
            extension_methods: IndexMap::new(),
            exports: IndexSet::new(),
            reexports: Vec::new(),
        }
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    /// Look up a symbol in this scope only
    pub fn symbol(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Turn a bootstrapped global scope into the root of every chain
    pub(crate) fn into_prelude(mut self) -> Self {
        self.kind = ScopeKind::Prelude;
        self.parent = None;
        self
    }
}

#[derive(Debug, Clone)]
struct ScopeSlot {
    generation: u32,
    scope: Option<Scope>,
}

/// Iterator over a scope and its ancestors, innermost first
pub struct ScopeChain<'t> {
    table: &'t SymbolTable,
    next: Option<ScopeId>,
}

impl<'t> Iterator for ScopeChain<'t> {
    type Item = (ScopeId, &'t Scope);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let scope = self.table.scope(id)?;
        self.next = scope.parent;
        Some((id, scope))
    }
}

/// The symbol environment of one compilation unit
#[derive(Debug)]
pub struct SymbolTable {
    prelude: Option<&'static Scope>,
    slots: Vec<ScopeSlot>,
    depth: usize,
    config: ResolverConfig,
    match_attempts: Cell<u32>,
    pub(crate) evidence: EvidenceTable,
}

impl SymbolTable {
    /// Create a table whose global scope is chained to the prelude
    pub fn new() -> Self {
        Self::with_config(ResolverConfig::default())
    }

    pub fn with_config(config: ResolverConfig) -> Self {
        let prelude = if config.include_prelude {
            Some(crate::prelude::ensure_prelude())
        } else {
            None
        };

        let global = Scope::new(ScopeKind::Global, prelude.map(|_| ScopeId::PRELUDE));

        Self {
            prelude,
            slots: vec![ScopeSlot {
                generation: 0,
                scope: Some(global),
            }],
            depth: 1,
            config,
            match_attempts: Cell::new(0),
            evidence: EvidenceTable::new(),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Number of live arena scopes (the prelude is not counted)
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn current_scope_id(&self) -> ScopeId {
        let index = self.depth - 1;
        ScopeId::new(index, self.slots[index].generation)
    }

    pub fn global_scope_id(&self) -> ScopeId {
        ScopeId::new(0, self.slots[0].generation)
    }

    pub fn current_kind(&self) -> ScopeKind {
        self.current_scope().kind
    }

    /// Push a child of the current scope and make it current
    pub fn enter_scope(&mut self, kind: ScopeKind) -> ScopeId {
        debug_assert!(kind != ScopeKind::Prelude, "the prelude is never pushed");

        let parent = self.current_scope_id();
        let index = self.depth;
        let scope = Scope::new(kind, Some(parent));

        if index < self.slots.len() {
            self.slots[index].scope = Some(scope);
        } else {
            self.slots.push(ScopeSlot {
                generation: 0,
                scope: Some(scope),
            });
        }
        self.depth += 1;

        let id = ScopeId::new(index, self.slots[index].generation);
        tracing::debug!(%id, ?kind, %parent, "enter scope");
        id
    }

    /// Pop the current scope, discarding everything defined in it
    pub fn exit_scope(&mut self) -> Result<ScopeId, TypecheckError> {
        if self.depth <= 1 {
            return Err(TypecheckError::internal(
                "attempted to exit the global scope",
            ));
        }

        let id = self.current_scope_id();
        let slot = &mut self.slots[self.depth - 1];
        slot.scope = None;
        slot.generation += 1;
        self.depth -= 1;

        tracing::debug!(%id, "exit scope");
        Ok(id)
    }

    /// Resolve a handle, `None` if the scope has been popped
    pub fn scope(&self, id: ScopeId) -> Option<&Scope> {
        if id.is_prelude() {
            return self.prelude;
        }

        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.scope.as_ref()
    }

    pub(crate) fn scope_mut(&mut self, id: ScopeId) -> Option<&mut Scope> {
        if id.is_prelude() {
            return None;
        }

        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.scope.as_mut()
    }

    pub fn current_scope(&self) -> &Scope {
        self.slots[self.depth - 1]
            .scope
            .as_ref()
            .unwrap_or_else(|| unreachable!("live slots always hold a scope"))
    }

    pub(crate) fn current_scope_mut(&mut self) -> &mut Scope {
        self.slots[self.depth - 1]
            .scope
            .as_mut()
            .unwrap_or_else(|| unreachable!("live slots always hold a scope"))
    }

    pub(crate) fn global_scope_mut(&mut self) -> &mut Scope {
        self.slots[0]
            .scope
            .as_mut()
            .unwrap_or_else(|| unreachable!("the global scope is never popped"))
    }

    /// The enclosing scope of `id`
    pub fn outer(&self, id: ScopeId) -> Option<ScopeId> {
        self.scope(id)?.parent
    }

    /// The current scope followed by its ancestors
    pub fn chain(&self) -> ScopeChain<'_> {
        self.chain_from(self.current_scope_id())
    }

    pub fn chain_from(&self, id: ScopeId) -> ScopeChain<'_> {
        ScopeChain {
            table: self,
            next: Some(id),
        }
    }

    /// Suffix used to rename instance variables for one match attempt
    pub(crate) fn next_attempt_suffix(&self) -> String {
        let attempt = self.match_attempts.get();
        self.match_attempts.set(attempt.wrapping_add(1));
        format!("${attempt}")
    }

    /// Insert a symbol into the current scope, replacing a local one of the same name
    pub fn define_symbol(&mut self, symbol: Symbol) {
        tracing::trace!(name = %symbol.name, kind = %symbol.kind, "define");
        self.current_scope_mut()
            .symbols
            .insert(symbol.name.clone(), symbol);
    }

    /// Define a symbol in the global scope, whatever scope is current
    pub fn define_global_symbol(&mut self, symbol: Symbol) {
        tracing::trace!(name = %symbol.name, kind = %symbol.kind, "define global");
        self.global_scope_mut()
            .symbols
            .insert(symbol.name.clone(), symbol);
    }

    /// Define a variable in the current scope
    pub fn define(&mut self, name: impl Into<String>, ty: Type, origin: Origin) {
        self.define_symbol(Symbol::new(name, ty, SymbolKind::Variable, origin));
    }

    pub fn define_constant(&mut self, name: impl Into<String>, ty: Type, origin: Origin) {
        self.define_symbol(Symbol::new(name, ty, SymbolKind::Variable, origin).constant());
    }

    /// Declare a name whose type is filled in by a later pass
    pub fn define_pending(&mut self, name: impl Into<String>, kind: SymbolKind, origin: Origin) {
        let name = name.into();
        let placeholder = Type::con(name.clone());
        self.define_symbol(Symbol::new(name, placeholder, kind, origin).pending());
    }

    /// Define a nominal type
    pub fn define_type(&mut self, name: impl Into<String>, ty: Type, origin: Origin) {
        let name = name.into();
        let scope = self.current_scope_mut();
        scope.types.insert(name.clone(), ty.clone());
        self.define_symbol(Symbol::new(name, ty, SymbolKind::Type, origin));
    }

    /// Define a (possibly parametrized) type alias
    ///
    /// The symbol's type is the nominal form `Box<T>`, its underlying type
    /// the structural expansion used for unification and field access.
    pub fn define_type_alias(
        &mut self,
        name: impl Into<String>,
        params: Vec<String>,
        underlying: Type,
        origin: Origin,
    ) {
        let name = name.into();
        let nominal = Type::app(
            Type::con(name.clone()),
            params.iter().map(Type::var).collect(),
        );

        tracing::debug!(alias = %name, ?params, %underlying, "define type alias");

        let scope = self.current_scope_mut();
        scope.types.insert(name.clone(), nominal.clone());
        scope.kinds.insert(name.clone(), Kind::with_arity(params.len()));
        if params.is_empty() {
            scope.alias_params.shift_remove(&name);
        } else {
            scope.alias_params.insert(name.clone(), params);
        }

        self.define_symbol(
            Symbol::new(name, nominal, SymbolKind::Type, origin).with_underlying(underlying),
        );
    }

    /// Define a data constructor (callable, constant)
    pub fn define_constructor(&mut self, name: impl Into<String>, ty: Type, origin: Origin) {
        self.define_symbol(Symbol::new(name, ty, SymbolKind::Constructor, origin).constant());
    }

    /// Bind an imported module; its type is the record of its exports
    pub fn define_module(
        &mut self,
        name: impl Into<String>,
        exports: IndexMap<String, Symbol>,
        origin: Origin,
    ) {
        let name = name.into();
        let record = Type::record(exports.iter().map(|(export, symbol)| {
            let ty = symbol
                .underlying_type
                .clone()
                .unwrap_or_else(|| symbol.ty.clone());
            (export.clone(), ty)
        }));

        tracing::debug!(module = %name, exports = exports.len(), "define module");

        self.current_scope_mut()
            .modules
            .insert(name.clone(), exports);
        self.define_symbol(Symbol::new(name, record, SymbolKind::Module, origin).constant());
    }

    /// Find a symbol, walking outward from the current scope
    pub fn find(&self, name: &str) -> Option<&Symbol> {
        self.find_in(self.current_scope_id(), name)
    }

    pub fn find_in(&self, scope: ScopeId, name: &str) -> Option<&Symbol> {
        self.chain_from(scope)
            .find_map(|(_, scope)| scope.symbols.get(name))
    }

    /// Find a symbol together with the scope that owns it
    pub fn find_with_scope(&self, name: &str) -> Option<(ScopeId, &Symbol)> {
        self.chain()
            .find_map(|(id, scope)| scope.symbols.get(name).map(|symbol| (id, symbol)))
    }

    /// Replace the type of an existing symbol in the scope that owns it
    pub fn update(&mut self, name: &str, ty: Type) -> Result<(), ResolutionError> {
        let (owner, definition_site) = match self.find_with_scope(name) {
            Some((owner, symbol)) => (owner, symbol.definition_site),
            None => return Err(ResolutionError::symbol_not_found(name, None)),
        };

        let Some(scope) = self.scope_mut(owner) else {
            return Err(ResolutionError::ImmutableSymbol {
                name: name.to_string(),
                span: sable_types::to_source_span(definition_site),
            });
        };

        if let Some(symbol) = scope.symbols.get_mut(name) {
            symbol.ty = ty;
            symbol.is_pending = false;
        }
        Ok(())
    }

    /// Defined in the current scope itself
    pub fn is_defined_locally(&self, name: &str) -> bool {
        self.is_defined_locally_in(self.current_scope_id(), name)
    }

    pub fn is_defined_locally_in(&self, scope: ScopeId, name: &str) -> bool {
        self.scope(scope)
            .is_some_and(|scope| scope.symbols.contains_key(name))
    }

    /// Defined anywhere in the chain
    pub fn is_defined(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Look up a type by name through the chain
    pub fn resolve_type(&self, name: &str) -> Option<&Type> {
        self.chain().find_map(|(_, scope)| scope.types.get(name))
    }

    pub fn register_kind(&mut self, type_name: impl Into<String>, kind: Kind) {
        self.current_scope_mut().kinds.insert(type_name.into(), kind);
    }

    pub fn get_kind(&self, type_name: &str) -> Option<&Kind> {
        self.chain().find_map(|(_, scope)| scope.kinds.get(type_name))
    }

    /// Record the constructors of a sum type
    pub fn register_variants(&mut self, type_name: impl Into<String>, constructors: Vec<String>) {
        self.current_scope_mut()
            .variants
            .insert(type_name.into(), constructors);
    }

    pub fn get_variants(&self, type_name: &str) -> Option<&[String]> {
        self.chain()
            .find_map(|(_, scope)| scope.variants.get(type_name))
            .map(Vec::as_slice)
    }

    /// Record the trait constraints declared on a function
    pub fn register_func_constraints(
        &mut self,
        function: impl Into<String>,
        constraints: Vec<Constraint>,
    ) {
        self.current_scope_mut()
            .constraints
            .insert(function.into(), constraints);
    }

    pub fn get_func_constraints(&self, function: &str) -> Option<&[Constraint]> {
        self.chain()
            .find_map(|(_, scope)| scope.constraints.get(function))
            .map(Vec::as_slice)
    }

    /// Exported symbols of an imported module
    pub fn get_module_exports(&self, module: &str) -> Option<&IndexMap<String, Symbol>> {
        self.chain().find_map(|(_, scope)| scope.modules.get(module))
    }

    /// Detach the global scope, used to build the prelude
    pub(crate) fn into_global_scope(mut self) -> Scope {
        self.slots.truncate(1);
        self.slots
            .pop()
            .and_then(|slot| slot.scope)
            .unwrap_or_else(|| Scope::new(ScopeKind::Global, None))
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
