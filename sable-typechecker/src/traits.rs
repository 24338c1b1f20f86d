//! Trait registry
//!
//! Traits are declared in the header pass and filled in method by method.
//! Registration always targets the scope that owns the trait, so a trait
//! declared in the global scope keeps its methods when an inner scope is
//! popped.

use crate::error::{DeclarationError, TypecheckError};
use crate::hierarchy::SuperTraitGraph;
use crate::scope::{ScopeId, SymbolTable};
use crate::symbols::{Origin, Symbol, SymbolKind};
use indexmap::{IndexMap, IndexSet};
use sable_types::{Kind, Substitution, Type};
use std::fmt;

/// A trait requirement such as `Show<T>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Constraint {
    pub trait_name: String,
    pub args: Vec<Type>,
}

impl Constraint {
    pub fn new(trait_name: impl Into<String>, args: Vec<Type>) -> Self {
        Self {
            trait_name: trait_name.into(),
            args,
        }
    }

    pub fn apply(&self, substitution: &Substitution) -> Self {
        Self {
            trait_name: self.trait_name.clone(),
            args: self.args.iter().map(|arg| substitution.apply(arg)).collect(),
        }
    }

    pub fn rename_free_vars(&self, suffix: &str) -> Self {
        Self {
            trait_name: self.trait_name.clone(),
            args: self
                .args
                .iter()
                .map(|arg| arg.rename_free_vars(suffix))
                .collect(),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}<{}>",
            self.trait_name,
            crate::error::format_types(&self.args)
        )
    }
}

/// Everything known about a declared trait
#[derive(Debug, Clone, PartialEq)]
pub struct TraitInfo {
    pub name: String,
    pub type_params: Vec<String>,
    /// Kinds declared or inferred for the type parameters
    pub param_kinds: IndexMap<String, Kind>,
    pub super_traits: Vec<String>,
    /// Method signatures in declaration order, which is also dictionary order
    pub methods: IndexMap<String, Type>,
    pub default_methods: IndexSet<String>,
    pub origin: Origin,
}

impl TraitInfo {
    pub fn new(
        name: impl Into<String>,
        type_params: Vec<String>,
        super_traits: Vec<String>,
        origin: Origin,
    ) -> Self {
        Self {
            name: name.into(),
            type_params,
            param_kinds: IndexMap::new(),
            super_traits,
            methods: IndexMap::new(),
            default_methods: IndexSet::new(),
            origin,
        }
    }

    pub fn arity(&self) -> usize {
        self.type_params.len()
    }

    /// Methods without a default body
    pub fn required_methods(&self) -> Vec<&str> {
        self.methods
            .keys()
            .filter(|method| !self.default_methods.contains(*method))
            .map(String::as_str)
            .collect()
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    pub fn method_index(&self, method: &str) -> Option<usize> {
        self.methods.get_index_of(method)
    }

    /// Kind of a type parameter, `*` unless declared or inferred otherwise
    pub fn param_kind(&self, param: &str) -> Kind {
        self.param_kinds.get(param).cloned().unwrap_or_default()
    }

    /// Largest number of arguments `param` is applied to in any method
    fn applied_arity(&self, param: &str) -> usize {
        let mut arity = 0;
        for method_type in self.methods.values() {
            method_type.walk(&mut |ty| {
                if let Type::App { constructor, args } = ty {
                    if applies_param(constructor, param) {
                        arity = arity.max(args.len());
                    }
                }
            });
        }
        arity
    }
}

/// Whether `head` names the trait parameter `param`, rigid or free
fn applies_param(head: &Type, param: &str) -> bool {
    match head {
        Type::Var { name } => name == param,
        Type::Con { name, .. } => name == param,
        _ => false,
    }
}

impl SymbolTable {
    /// Declare a trait in the current scope
    pub fn define_trait(
        &mut self,
        name: impl Into<String>,
        type_params: Vec<String>,
        super_traits: Vec<String>,
        origin: Origin,
    ) {
        let name = name.into();
        let nominal = Type::app(
            Type::con(name.clone()),
            type_params.iter().map(Type::var).collect(),
        );

        tracing::debug!(trait_name = %name, ?type_params, ?super_traits, "define trait");

        let info = TraitInfo::new(name.clone(), type_params, super_traits, origin.clone());
        self.current_scope_mut().traits.insert(name.clone(), info);
        self.define_symbol(Symbol::new(name, nominal, SymbolKind::Trait, origin).constant());
    }

    pub fn get_trait(&self, name: &str) -> Option<&TraitInfo> {
        self.chain().find_map(|(_, scope)| scope.traits.get(name))
    }

    /// Every trait visible from the current scope, innermost declaration winning
    pub fn visible_traits(&self) -> IndexMap<&str, &TraitInfo> {
        let mut visible = IndexMap::new();
        for (_, scope) in self.chain() {
            for (name, info) in &scope.traits {
                visible.entry(name.as_str()).or_insert(info);
            }
        }
        visible
    }

    fn trait_owner(&self, trait_name: &str) -> Option<ScopeId> {
        self.chain()
            .find(|(_, scope)| scope.traits.contains_key(trait_name))
            .map(|(id, _)| id)
    }

    /// Mutable access to a trait in the scope that declared it
    fn trait_mut(&mut self, trait_name: &str) -> Result<&mut TraitInfo, TypecheckError> {
        let owner = self.trait_owner(trait_name).ok_or_else(|| {
            TypecheckError::internal(format!(
                "trait {trait_name} is used before it has been declared"
            ))
        })?;

        self.scope_mut(owner)
            .and_then(|scope| scope.traits.get_mut(trait_name))
            .ok_or_else(|| {
                TypecheckError::internal(format!(
                    "trait {trait_name} belongs to the prelude and cannot be extended"
                ))
            })
    }

    /// Add a method to a trait and make it callable as a global constant
    pub fn register_trait_method(
        &mut self,
        method: impl Into<String>,
        trait_name: &str,
        ty: Type,
        origin: Origin,
    ) -> Result<(), TypecheckError> {
        let method = method.into();
        self.trait_mut(trait_name)?
            .methods
            .insert(method.clone(), ty.clone());

        tracing::debug!(%trait_name, %method, %ty, "register trait method");

        let symbol = Symbol::new(method.clone(), ty, SymbolKind::Variable, origin).constant();
        self.define_global_symbol(symbol);
        Ok(())
    }

    /// Mark a declared method as having a default body
    pub fn register_trait_default_method(
        &mut self,
        trait_name: &str,
        method: &str,
    ) -> Result<(), TypecheckError> {
        let info = self.trait_mut(trait_name)?;
        if !info.has_method(method) {
            return Err(TypecheckError::internal(format!(
                "default body for {trait_name}.{method} registered before the method itself"
            )));
        }
        info.default_methods.insert(method.to_string());
        Ok(())
    }

    pub fn register_trait_type_param_kind(
        &mut self,
        trait_name: &str,
        param: &str,
        kind: Kind,
    ) -> Result<(), TypecheckError> {
        let info = self.trait_mut(trait_name)?;
        if !info.type_params.iter().any(|p| p == param) {
            return Err(TypecheckError::internal(format!(
                "{param} is not a type parameter of trait {trait_name}"
            )));
        }
        info.param_kinds.insert(param.to_string(), kind);
        Ok(())
    }

    /// Give every undeclared parameter the kind implied by its method usage
    pub fn infer_trait_param_kinds(&mut self, trait_name: &str) -> Result<(), TypecheckError> {
        let info = self.trait_mut(trait_name)?;
        let inferred: Vec<(String, Kind)> = info
            .type_params
            .iter()
            .filter(|param| !info.param_kinds.contains_key(*param))
            .map(|param| (param.clone(), Kind::with_arity(info.applied_arity(param))))
            .collect();

        for (param, kind) in inferred {
            tracing::trace!(%trait_name, %param, %kind, "inferred parameter kind");
            info.param_kinds.insert(param, kind);
        }
        Ok(())
    }

    /// Bind an operator such as `+` to the trait implementing it
    pub fn register_operator_trait(&mut self, operator: impl Into<String>, trait_name: impl Into<String>) {
        self.current_scope_mut()
            .operator_traits
            .insert(operator.into(), trait_name.into());
    }

    pub fn get_trait_for_operator(&self, operator: &str) -> Option<&str> {
        self.chain()
            .find_map(|(_, scope)| scope.operator_traits.get(operator))
            .map(String::as_str)
    }

    pub fn get_trait_method_type(&self, trait_name: &str, method: &str) -> Option<&Type> {
        self.get_trait(trait_name)?.methods.get(method)
    }

    /// The innermost visible trait declaring `method`
    pub fn find_trait_for_method(&self, method: &str) -> Option<&TraitInfo> {
        self.chain().find_map(|(_, scope)| {
            scope
                .traits
                .values()
                .find(|info| info.has_method(method))
        })
    }

    /// Whether a trait parameter is applied to type arguments, as `F<A>`
    pub fn is_hkt_trait(&self, trait_name: &str) -> bool {
        let Some(info) = self.get_trait(trait_name) else {
            return false;
        };

        info.methods.values().any(|method_type| {
            method_type.any(|ty| match ty {
                Type::App { constructor, .. } => info
                    .type_params
                    .iter()
                    .any(|param| applies_param(constructor, param)),
                _ => false,
            })
        })
    }

    /// All transitive supertraits, nearest first
    pub fn all_super_traits(&self, trait_name: &str) -> Vec<String> {
        SuperTraitGraph::from_traits(self.visible_traits().into_values())
            .ancestors(trait_name)
    }

    /// Reject unknown or cyclic supertraits of a declared trait
    pub fn check_super_traits(&self, trait_name: &str) -> Result<(), DeclarationError> {
        let Some(info) = self.get_trait(trait_name) else {
            return Ok(());
        };

        if let Some(unknown) = info
            .super_traits
            .iter()
            .find(|super_trait| self.get_trait(super_trait).is_none())
        {
            return Err(DeclarationError::UnknownSuperTrait {
                trait_name: trait_name.to_string(),
                super_trait: unknown.clone(),
                span: sable_types::to_source_span(info.origin.span),
            });
        }

        let graph = SuperTraitGraph::from_traits(self.visible_traits().into_values());
        match graph.cycle_through(trait_name) {
            Some(cycle) => Err(DeclarationError::CyclicSuperTraits {
                cycle,
                span: sable_types::to_source_span(info.origin.span),
            }),
            None => Ok(()),
        }
    }
}
