//! Inferred types per AST node, handed to the code generator as is

use indexmap::IndexMap;
use sable_types::{NodeId, Substitution, Type};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeMap {
    types: IndexMap<NodeId, Type>,
}

impl TypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the type of `node`, returning the type it replaces
    pub fn record(&mut self, node: NodeId, ty: Type) -> Option<Type> {
        self.types.insert(node, ty)
    }

    pub fn get(&self, node: NodeId) -> Option<&Type> {
        self.types.get(&node)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.types.contains_key(&node)
    }

    /// Push the final inference substitution into every recorded type
    pub fn apply_substitution(&mut self, substitution: &Substitution) {
        for ty in self.types.values_mut() {
            *ty = substitution.apply(ty);
        }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Type)> {
        self.types.iter().map(|(node, ty)| (*node, ty))
    }
}

impl FromIterator<(NodeId, Type)> for TypeMap {
    fn from_iter<I: IntoIterator<Item = (NodeId, Type)>>(iter: I) -> Self {
        Self {
            types: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_substitution_finalizes_recorded_types() {
        let mut map = TypeMap::new();
        map.record(NodeId::new(0), Type::var("t0"));
        map.record(NodeId::new(1), Type::generic("List", vec![Type::var("t0")]));
        map.record(NodeId::new(2), Type::con("Bool"));

        map.apply_substitution(&Substitution::singleton("t0", Type::con("Int")));

        assert_eq!(map.get(NodeId::new(0)), Some(&Type::con("Int")));
        assert_eq!(
            map.get(NodeId::new(1)),
            Some(&Type::generic("List", vec![Type::con("Int")]))
        );
        assert_eq!(map.get(NodeId::new(2)), Some(&Type::con("Bool")));
    }

    #[test]
    fn test_iteration_follows_recording_order() {
        let map: TypeMap = [
            (NodeId::new(7), Type::con("Int")),
            (NodeId::new(3), Type::con("Bool")),
        ]
        .into_iter()
        .collect();

        let nodes: Vec<NodeId> = map.iter().map(|(node, _)| node).collect();
        assert_eq!(nodes, vec![NodeId::new(7), NodeId::new(3)]);
        assert!(map.contains(NodeId::new(3)));
        assert!(!map.contains(NodeId::new(4)));
    }
}
