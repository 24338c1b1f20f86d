//! Evidence table and dictionary layouts
//!
//! Once a call site has been resolved to an instance, the canonical key
//! `Trait<Types>` is recorded against the name of that instance's compiled
//! dictionary. Dictionaries lay out their methods in trait declaration
//! order, so method dispatch is an index into the dictionary.

use crate::error::{format_types, ResolutionError};
use crate::matcher::ImplementationMatch;
use crate::scope::SymbolTable;
use indexmap::IndexMap;
use sable_types::Type;

/// Canonical evidence key, `Show<List<Int>>`
pub fn evidence_key(trait_name: &str, types: &[Type]) -> String {
    format!("{trait_name}<{}>", format_types(types))
}

/// Name of the compiled dictionary of an instance, `$impl_Show_List_T`
pub fn dictionary_name(trait_name: &str, types: &[Type]) -> String {
    let mut name = format!("$impl_{trait_name}");
    for ty in types {
        name.push('_');
        let rendered = ty.to_string();
        let mut pending_separator = false;
        for c in rendered.chars() {
            if c.is_alphanumeric() {
                if pending_separator && !name.ends_with('_') {
                    name.push('_');
                }
                pending_separator = false;
                name.push(c);
            } else {
                pending_separator = true;
            }
        }
    }
    name
}

/// Evidence key to dictionary name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvidenceTable {
    entries: IndexMap<String, String>,
}

impl EvidenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `dictionary` for `key`, returning the previous entry
    pub fn insert(&mut self, key: impl Into<String>, dictionary: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), dictionary.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in recording order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, dictionary)| (key.as_str(), dictionary.as_str()))
    }
}

/// Frozen method layout of a trait's dictionaries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodIndexTable {
    pub trait_name: String,
    indices: IndexMap<String, usize>,
}

impl MethodIndexTable {
    pub fn index_of(&self, method: &str) -> Option<usize> {
        self.indices.get(method).copied()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Method names in slot order
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.indices.keys().map(String::as_str)
    }
}

impl SymbolTable {
    /// Record the dictionary for an explicit key
    pub fn register_evidence(&mut self, key: impl Into<String>, dictionary: impl Into<String>) {
        let key = key.into();
        let dictionary = dictionary.into();
        tracing::debug!(%key, %dictionary, "register evidence");
        self.evidence.insert(key, dictionary);
    }

    /// Record the dictionary a resolved call site uses and return its key
    pub fn record_evidence(&mut self, matched: &ImplementationMatch, args: &[Type]) -> String {
        let key = evidence_key(&matched.instance.trait_name, args);
        self.register_evidence(key.clone(), matched.evidence_name());
        key
    }

    /// Resolve `trait_name` for `args` and record its evidence in one step
    pub fn resolve_evidence(
        &mut self,
        trait_name: &str,
        args: &[Type],
    ) -> Result<ImplementationMatch, ResolutionError> {
        let matched = self.find_matching_implementation(trait_name, args)?;
        self.record_evidence(&matched, args);
        Ok(matched)
    }

    pub fn get_evidence(&self, key: &str) -> Option<&str> {
        self.evidence.get(key)
    }

    pub fn evidence_table(&self) -> &EvidenceTable {
        &self.evidence
    }

    /// Dictionary layout of a trait, in method declaration order
    pub fn method_index_table(&self, trait_name: &str) -> Option<MethodIndexTable> {
        let info = self.get_trait(trait_name)?;
        Some(MethodIndexTable {
            trait_name: info.name.clone(),
            indices: info
                .methods
                .keys()
                .enumerate()
                .map(|(index, method)| (method.clone(), index))
                .collect(),
        })
    }

    /// Dictionary slot of `method`
    pub fn get_trait_method_index(&self, trait_name: &str, method: &str) -> Option<usize> {
        self.get_trait(trait_name)?.method_index(method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfig;
    use crate::symbols::Origin;
    use pretty_assertions::assert_eq;

    fn show_table() -> SymbolTable {
        let mut table = SymbolTable::with_config(ResolverConfig::isolated());
        table.define_trait("Show", vec!["A".to_string()], vec![], Origin::default());
        for method in ["show", "show_list"] {
            table
                .register_trait_method(method, "Show", Type::var("A"), Origin::default())
                .unwrap();
        }
        table
            .register_implementation(
                "Show",
                vec![Type::generic("List", vec![Type::var("T")])],
                vec![],
                "$impl_Show_List_T",
            )
            .unwrap();
        table
    }

    #[test]
    fn test_evidence_key_format() {
        assert_eq!(evidence_key("Show", &[Type::con("Int")]), "Show<Int>");
        assert_eq!(
            evidence_key(
                "Convert",
                &[Type::con("Int"), Type::generic("List", vec![Type::con("Bool")])]
            ),
            "Convert<Int, List<Bool>>"
        );
    }

    #[test]
    fn test_dictionary_names() {
        assert_eq!(dictionary_name("Show", &[Type::con("Int")]), "$impl_Show_Int");
        assert_eq!(
            dictionary_name("Show", &[Type::generic("List", vec![Type::var("T")])]),
            "$impl_Show_List_T"
        );
        assert_eq!(
            dictionary_name(
                "Convert",
                &[Type::con("Int"), Type::function(vec![Type::con("A")], Type::con("B"))]
            ),
            "$impl_Convert_Int_A_B"
        );
    }

    #[test]
    fn test_resolved_call_site_records_dictionary() {
        let mut table = show_table();
        let args = [Type::generic("List", vec![Type::con("Int")])];

        let matched = table.resolve_evidence("Show", &args).unwrap();
        assert_eq!(matched.evidence_name(), "$impl_Show_List_T");
        assert_eq!(
            table.get_evidence("Show<List<Int>>"),
            Some("$impl_Show_List_T")
        );
        assert_eq!(table.get_evidence("Show<Int>"), None);
        assert_eq!(table.evidence_table().len(), 1);
    }

    #[test]
    fn test_failed_resolution_records_nothing() {
        let mut table = show_table();
        assert!(table.resolve_evidence("Show", &[Type::con("Int")]).is_err());
        assert!(table.evidence_table().is_empty());
    }

    #[test]
    fn test_method_indices_follow_declaration_order() {
        let table = show_table();
        let layout = table.method_index_table("Show").unwrap();

        assert_eq!(layout.methods().collect::<Vec<_>>(), vec!["show", "show_list"]);
        assert_eq!(layout.index_of("show_list"), Some(1));
        assert_eq!(table.get_trait_method_index("Show", "show"), Some(0));
        assert_eq!(table.get_trait_method_index("Show", "missing"), None);
        assert!(table.method_index_table("Missing").is_none());
    }
}
