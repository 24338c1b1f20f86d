//! Extension methods
//!
//! Methods attached directly to a nominal type, outside any trait.

use crate::scope::SymbolTable;
use indexmap::IndexMap;
use sable_types::Type;

impl SymbolTable {
    /// Attach `method` to `type_name` in the current scope
    pub fn register_extension_method(
        &mut self,
        type_name: impl Into<String>,
        method: impl Into<String>,
        ty: Type,
    ) {
        let type_name = type_name.into();
        let method = method.into();
        tracing::debug!(%type_name, %method, %ty, "register extension method");

        self.current_scope_mut()
            .extension_methods
            .entry(type_name)
            .or_default()
            .insert(method, ty);
    }

    /// Innermost visible extension `method` of `type_name`
    pub fn get_extension_method(&self, type_name: &str, method: &str) -> Option<&Type> {
        self.chain().find_map(|(_, scope)| {
            scope
                .extension_methods
                .get(type_name)
                .and_then(|methods| methods.get(method))
        })
    }

    /// All visible extension methods of `type_name`, inner definitions shadowing outer ones
    pub fn get_extension_methods(&self, type_name: &str) -> IndexMap<&str, &Type> {
        let mut methods = IndexMap::new();
        for (_, scope) in self.chain() {
            if let Some(local) = scope.extension_methods.get(type_name) {
                for (name, ty) in local {
                    methods.entry(name.as_str()).or_insert(ty);
                }
            }
        }
        methods
    }

    /// Extension method for a value of type `receiver`, looked up by its
    /// base constructor and then by its alias expansion
    pub fn find_extension_method_for(&self, receiver: &Type, method: &str) -> Option<&Type> {
        if let Some(found) = receiver
            .head_name()
            .and_then(|name| self.get_extension_method(name, method))
        {
            return Some(found);
        }

        let expanded = self.resolve_type_alias(receiver);
        let name = expanded.head_name()?;
        self.get_extension_method(name, method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfig;
    use crate::scope::ScopeKind;
    use crate::symbols::Origin;
    use pretty_assertions::assert_eq;

    fn length() -> Type {
        Type::function(vec![Type::con("Text")], Type::con("Int"))
    }

    #[test]
    fn test_extension_lookup_walks_the_chain() {
        let mut table = SymbolTable::with_config(ResolverConfig::isolated());
        table.register_extension_method("Text", "length", length());
        table.enter_scope(ScopeKind::Block);

        assert_eq!(table.get_extension_method("Text", "length"), Some(&length()));
        assert_eq!(table.get_extension_method("Text", "reverse"), None);
        assert_eq!(table.get_extension_method("Int", "length"), None);
    }

    #[test]
    fn test_inner_extension_shadows_outer() {
        let mut table = SymbolTable::with_config(ResolverConfig::isolated());
        table.register_extension_method("Text", "length", length());
        table.register_extension_method(
            "Text",
            "is_empty",
            Type::function(vec![Type::con("Text")], Type::con("Bool")),
        );

        table.enter_scope(ScopeKind::Block);
        let shadow = Type::function(vec![Type::con("Text")], Type::con("Float"));
        table.register_extension_method("Text", "length", shadow.clone());

        let methods = table.get_extension_methods("Text");
        assert_eq!(methods.len(), 2);
        assert_eq!(methods.get("length"), Some(&&shadow));
    }

    #[test]
    fn test_receiver_lookup_uses_head_and_alias() {
        let mut table = SymbolTable::with_config(ResolverConfig::isolated());
        let first = Type::function(
            vec![Type::generic("List", vec![Type::var("T")])],
            Type::generic("Option", vec![Type::var("T")]),
        );
        table.register_extension_method("List", "first", first.clone());
        table.define_type_alias(
            "Chars",
            vec![],
            Type::generic("List", vec![Type::con("Char")]),
            Origin::default(),
        );

        let ints = Type::generic("List", vec![Type::con("Int")]);
        assert_eq!(table.find_extension_method_for(&ints, "first"), Some(&first));
        assert_eq!(
            table.find_extension_method_for(&Type::con("Chars"), "first"),
            Some(&first)
        );
    }
}
