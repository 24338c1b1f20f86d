//! Supertrait graph using petgraph
//!
//! Edges point from a trait to each of its supertraits. The graph is
//! rebuilt from the visible traits on demand; trait hierarchies are small
//! and the registry keeps changing during the header pass.

use crate::traits::TraitInfo;
use petgraph::graph::NodeIndex;
use petgraph::{algo, Direction, Graph as PetGraph};
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, Default)]
pub struct SuperTraitGraph {
    graph: PetGraph<String, ()>,
    name_to_node: HashMap<String, NodeIndex>,
}

impl SuperTraitGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_traits<'a>(traits: impl IntoIterator<Item = &'a TraitInfo>) -> Self {
        let mut graph = Self::new();
        for info in traits {
            let node = graph.get_or_create_node(&info.name);
            for super_trait in &info.super_traits {
                let parent = graph.get_or_create_node(super_trait);
                graph.graph.update_edge(node, parent, ());
            }
        }
        graph
    }

    fn get_or_create_node(&mut self, name: &str) -> NodeIndex {
        if let Some(&node) = self.name_to_node.get(name) {
            return node;
        }
        let node = self.graph.add_node(name.to_string());
        self.name_to_node.insert(name.to_string(), node);
        node
    }

    /// Direct supertraits in declaration order
    fn parents(&self, node: NodeIndex) -> Vec<NodeIndex> {
        // petgraph yields the most recently added edge first
        let mut parents: Vec<_> = self
            .graph
            .neighbors_directed(node, Direction::Outgoing)
            .collect();
        parents.reverse();
        parents
    }

    /// Transitive supertraits, breadth first, each listed once
    pub fn ancestors(&self, name: &str) -> Vec<String> {
        let Some(&start) = self.name_to_node.get(name) else {
            return Vec::new();
        };

        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut result = Vec::new();

        while let Some(node) = queue.pop_front() {
            for parent in self.parents(node) {
                if seen.insert(parent) {
                    result.push(self.graph[parent].clone());
                    queue.push_back(parent);
                }
            }
        }
        result
    }

    /// Whether the hierarchy is acyclic
    pub fn is_acyclic(&self) -> bool {
        algo::toposort(&self.graph, None).is_ok()
    }

    /// The supertrait path leading from `name` back to itself, if any
    pub fn cycle_through(&self, name: &str) -> Option<Vec<String>> {
        let &start = self.name_to_node.get(name)?;

        let component = algo::tarjan_scc(&self.graph)
            .into_iter()
            .find(|component| component.contains(&start))?;
        let self_loop = self.graph.contains_edge(start, start);
        if component.len() == 1 && !self_loop {
            return None;
        }

        let members: HashSet<NodeIndex> = component.into_iter().collect();
        let mut path = vec![start];
        let mut visited = HashSet::from([start]);
        self.walk_cycle(start, start, &members, &mut visited, &mut path)
            .then(|| path.iter().map(|&node| self.graph[node].clone()).collect())
    }

    fn walk_cycle(
        &self,
        start: NodeIndex,
        node: NodeIndex,
        members: &HashSet<NodeIndex>,
        visited: &mut HashSet<NodeIndex>,
        path: &mut Vec<NodeIndex>,
    ) -> bool {
        for parent in self.parents(node) {
            if parent == start {
                path.push(start);
                return true;
            }
            if members.contains(&parent) && visited.insert(parent) {
                path.push(parent);
                if self.walk_cycle(start, parent, members, visited, path) {
                    return true;
                }
                path.pop();
            }
        }
        false
    }
}
