//! Type alias resolution
//!
//! Expands nominal aliases to their structural form. Generic aliases are
//! instantiated with their (already expanded) arguments before expansion
//! continues into the body. A set of aliases currently being expanded is
//! threaded through the recursion; meeting one of them again stops the
//! expansion at its nominal form, so mutually recursive aliases terminate.

use crate::error::ResolutionError;
use crate::scope::SymbolTable;
use crate::symbols::SymbolKind;
use sable_types::{to_source_span, Span, Type};
use std::collections::{HashMap, HashSet};

impl SymbolTable {
    /// Fully unfold every alias in `ty`
    pub fn resolve_type_alias(&self, ty: &Type) -> Type {
        let mut expanding = HashSet::new();
        self.expand_aliases(ty, &mut expanding)
    }

    /// Two types are the same once aliases are unfolded
    pub fn alias_equivalent(&self, left: &Type, right: &Type) -> bool {
        left == right || self.resolve_type_alias(left) == self.resolve_type_alias(right)
    }

    pub fn register_alias_params(&mut self, alias: impl Into<String>, params: Vec<String>) {
        self.current_scope_mut()
            .alias_params
            .insert(alias.into(), params);
    }

    pub fn get_alias_params(&self, alias: &str) -> Option<&[String]> {
        self.chain()
            .find_map(|(_, scope)| scope.alias_params.get(alias))
            .map(Vec::as_slice)
    }

    /// Check that every applied generic alias gets as many arguments as it declares
    pub fn check_alias_arity(&self, ty: &Type, span: Option<Span>) -> Result<(), ResolutionError> {
        let mut mismatch = None;
        ty.walk(&mut |node| {
            if mismatch.is_some() {
                return;
            }
            if let Type::App { constructor, args } = node {
                if let Some(alias) = constructor.con_name() {
                    if let Some(params) = self.get_alias_params(alias) {
                        if params.len() != args.len() {
                            mismatch = Some((alias.to_string(), params.len(), args.len()));
                        }
                    }
                }
            }
        });

        match mismatch {
            Some((alias, expected, found)) => Err(ResolutionError::AliasArityMismatch {
                alias,
                expected,
                found,
                span: to_source_span(span),
            }),
            None => Ok(()),
        }
    }

    fn expand_aliases(&self, ty: &Type, expanding: &mut HashSet<String>) -> Type {
        match ty {
            Type::Con { name, underlying } => {
                if let Some(cached) = underlying.get() {
                    return self.expand_cached(name, cached, ty, expanding);
                }
                self.expand_named(name, &[], ty, expanding)
            }
            Type::App { constructor, args } => match constructor.as_ref() {
                Type::Con { name, underlying } if underlying.get().is_none() => {
                    self.expand_named(name, args, ty, expanding)
                }
                _ => ty.map_children(|child| self.expand_aliases(child, expanding)),
            },
            Type::Var { .. } => ty.clone(),
            _ => ty.map_children(|child| self.expand_aliases(child, expanding)),
        }
    }

    fn expand_cached(
        &self,
        name: &str,
        cached: &Type,
        nominal: &Type,
        expanding: &mut HashSet<String>,
    ) -> Type {
        if !expanding.insert(name.to_string()) {
            return nominal.clone();
        }
        let expanded = self.expand_aliases(cached, expanding);
        expanding.remove(name);
        expanded
    }

    fn expand_named(
        &self,
        name: &str,
        args: &[Type],
        nominal: &Type,
        expanding: &mut HashSet<String>,
    ) -> Type {
        if expanding.contains(name) {
            tracing::trace!(alias = %name, "alias cycle, keeping nominal form");
            return nominal.clone();
        }

        let Some(underlying) = self.alias_body(name) else {
            // not an alias: keep the constructor, expand its arguments
            return Type::app(
                Type::con(name),
                args.iter()
                    .map(|arg| self.expand_aliases(arg, expanding))
                    .collect(),
            );
        };

        expanding.insert(name.to_string());

        let params = self.get_alias_params(name).unwrap_or_default();
        let resolved: Vec<Type> = args
            .iter()
            .map(|arg| self.expand_aliases(arg, expanding))
            .collect();
        let body = if args.is_empty() {
            underlying
        } else {
            let bindings: HashMap<&str, &Type> = params
                .iter()
                .map(String::as_str)
                .zip(resolved.iter())
                .collect();
            let instantiated = substitute_params(&underlying, &bindings);

            // leftover arguments only apply to a body that is itself a constructor
            let extra = resolved.get(params.len()..).unwrap_or_default();
            if !extra.is_empty() && !can_be_applied(&instantiated) {
                tracing::trace!(alias = %name, extra = extra.len(), "over-applied alias, keeping nominal form");
                expanding.remove(name);
                return Type::app(Type::con(name), resolved);
            }
            Type::app(instantiated, extra.to_vec())
        };

        let expanded = self.expand_aliases(&body, expanding);
        expanding.remove(name);
        expanded
    }

    /// Structural body of an alias, local or reached through a module
    fn alias_body(&self, name: &str) -> Option<Type> {
        if let Some(symbol) = self.find(name) {
            return match symbol.kind {
                SymbolKind::Type => symbol.underlying_type.clone(),
                _ => None,
            };
        }

        let (module, member) = name.rsplit_once('.')?;
        let module_symbol = self.find(module)?;
        if module_symbol.kind != SymbolKind::Module {
            return None;
        }
        match &module_symbol.ty {
            Type::Record { fields } => fields
                .iter()
                .find(|(field, _)| field == member)
                .map(|(_, ty)| ty.clone())
                .filter(|ty| ty.con_name() != Some(member) && ty.con_name() != Some(name)),
            _ => None,
        }
    }
}

fn can_be_applied(ty: &Type) -> bool {
    matches!(ty, Type::Con { .. } | Type::App { .. } | Type::Var { .. })
}

/// Replace alias parameters simultaneously, respecting quantifiers
pub(crate) fn substitute_params(ty: &Type, bindings: &HashMap<&str, &Type>) -> Type {
    match ty {
        Type::Var { name } => bindings
            .get(name.as_str())
            .map(|bound| (*bound).clone())
            .unwrap_or_else(|| ty.clone()),
        Type::Forall { vars, body } => {
            let inner: HashMap<&str, &Type> = bindings
                .iter()
                .filter(|(param, _)| !vars.iter().any(|var| var == *param))
                .map(|(param, bound)| (*param, *bound))
                .collect();
            Type::forall(vars.clone(), substitute_params(body, &inner))
        }
        _ => ty.map_children(|child| substitute_params(child, bindings)),
    }
}
