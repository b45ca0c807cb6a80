//! Direct target dependencies.
//!
//! [`TargetDepends`] resolves every declared `depends`/`link` name of every
//! target once, at the start of Compute, and keeps the result as a directed
//! graph where an edge `a -> b` means "a depends on b".

use std::collections::HashMap;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Topo;

use crate::core::errors::KilnError;
use crate::core::session::Session;
use crate::core::target::{TargetId, TargetKind};

/// Resolved direct dependencies of every target.
#[derive(Debug, Clone, Default)]
pub struct TargetDepends {
    graph: DiGraph<TargetId, ()>,
    nodes: HashMap<TargetId, NodeIndex>,
    /// Names that did not resolve to a target, kept as plain link items
    link_items: HashMap<TargetId, Vec<String>>,
}

impl TargetDepends {
    pub fn new() -> Self {
        TargetDepends::default()
    }

    /// Resolve the dependencies of every target in `session`.
    ///
    /// `traced` holds the extra edges found by custom-command tracing. A
    /// target that reaches itself is a [`KilnError::DependencyCycle`].
    pub fn compute(
        session: &Session,
        traced: &HashMap<TargetId, Vec<TargetId>>,
    ) -> Result<Self, KilnError> {
        let mut deps = TargetDepends::new();
        for (id, _) in session.targets.iter() {
            deps.add_target(id);
        }

        for (id, target) in session.targets.iter() {
            if target.imported || target.kind == TargetKind::Global {
                continue;
            }
            for name in target.depends.iter().chain(&target.link_items) {
                match session.find_target_to_use(target.directory, name) {
                    Some(dep) if dep == id => {
                        return Err(KilnError::DependencyCycle {
                            members: vec![target.name.clone()],
                        });
                    }
                    Some(dep) => deps.add_edge(id, dep),
                    None => {
                        let items = deps.link_items.entry(id).or_default();
                        if !items.contains(name) {
                            items.push(name.clone());
                        }
                    }
                }
            }
            for &dep in traced.get(&id).into_iter().flatten() {
                deps.add_edge(id, dep);
            }
        }

        deps.check_cycles(|id| session.target_name(id).to_string())?;
        Ok(deps)
    }

    /// Add a target node.
    pub fn add_target(&mut self, id: TargetId) {
        if self.nodes.contains_key(&id) {
            return;
        }
        let node = self.graph.add_node(id);
        self.nodes.insert(id, node);
    }

    /// Add a dependency edge.
    pub fn add_edge(&mut self, from: TargetId, to: TargetId) {
        self.add_target(from);
        self.add_target(to);
        let (from, to) = (self.nodes[&from], self.nodes[&to]);
        if !self.graph.contains_edge(from, to) {
            self.graph.add_edge(from, to, ());
        }
    }

    /// Fail on the first strongly connected component with more than one
    /// member. Members are reported sorted by name.
    pub fn check_cycles(&self, name: impl Fn(TargetId) -> String) -> Result<(), KilnError> {
        let mut cycles: Vec<Vec<String>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| {
                let mut members: Vec<String> = scc.iter().map(|&n| name(self.graph[n])).collect();
                members.sort();
                members
            })
            .collect();
        cycles.sort();

        match cycles.into_iter().next() {
            Some(members) => Err(KilnError::DependencyCycle { members }),
            None => Ok(()),
        }
    }

    /// Direct target dependencies of `id`, in declaration order.
    pub fn direct(&self, id: TargetId) -> Vec<TargetId> {
        let Some(&node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        // petgraph yields neighbors newest edge first
        let mut out: Vec<TargetId> = self.graph.neighbors(node).map(|n| self.graph[n]).collect();
        out.reverse();
        out
    }

    /// Targets that depend directly on `id`.
    pub fn dependents(&self, id: TargetId) -> Vec<TargetId> {
        let Some(&node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(node, petgraph::Direction::Incoming)
            .map(|n| self.graph[n])
            .collect()
    }

    /// Plain link items of `id`.
    pub fn link_items(&self, id: TargetId) -> &[String] {
        self.link_items.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every target, dependencies before dependents.
    pub fn topological_order(&self) -> Vec<TargetId> {
        let mut topo = Topo::new(&self.graph);
        let mut order = Vec::new();
        while let Some(node) = topo.next(&self.graph) {
            order.push(self.graph[node]);
        }
        order.reverse();
        order
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
