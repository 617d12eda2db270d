//! Directed workflow dependency graph.
//!
//! Nodes are workflows keyed by name; an edge `A -> B` means workflow A
//! contains at least one node invoking workflow B. Provides deterministic
//! topological ordering (Kahn's algorithm, name tie-break) and cycle
//! enumeration over the residual subgraph.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// A collapsed edge between two workflows.
///
/// Duplicate references between the same pair collapse into one edge;
/// `count` keeps the multiplicity for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub count: u32,
}

/// Aggregate graph statistics for the report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    /// Distinct (source, target) pairs.
    pub edge_count: usize,
    /// Total references including duplicates.
    pub reference_count: u32,
    pub cycle_count: usize,
}

/// Result of the ordering pass.
#[derive(Debug, Clone, Default)]
pub struct TopoResult {
    /// Upload order: every acyclic dependency precedes its dependents;
    /// cycle participants are appended at the end.
    pub order: Vec<String>,
    /// Concrete cycles found in the residual subgraph. Self-references
    /// appear as 1-element cycles.
    pub cycles: Vec<Vec<String>>,
}

/// Directed multigraph of inter-workflow references.
#[derive(Debug, Clone, Default)]
pub struct WorkflowGraph {
    /// Node names in insertion order.
    nodes: Vec<String>,
    /// `name -> names it references` (restricted to graph members).
    dependencies: BTreeMap<String, BTreeSet<String>>,
    /// `name -> names referencing it`.
    dependents: BTreeMap<String, BTreeSet<String>>,
    /// Collapsed multiplicity per (source, target).
    edge_counts: BTreeMap<(String, String), u32>,
}

impl WorkflowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a workflow node. Idempotent.
    pub fn add_node(&mut self, name: &str) {
        if !self.dependencies.contains_key(name) {
            self.nodes.push(name.to_string());
            self.dependencies.insert(name.to_string(), BTreeSet::new());
            self.dependents.insert(name.to_string(), BTreeSet::new());
        }
    }

    /// Add a reference edge `source -> target`. Both endpoints must have
    /// been added as nodes. Duplicate edges collapse with a count bump.
    pub fn add_edge(&mut self, source: &str, target: &str) {
        debug_assert!(self.contains(source) && self.contains(target));
        *self
            .edge_counts
            .entry((source.to_string(), target.to_string()))
            .or_insert(0) += 1;
        if let Some(deps) = self.dependencies.get_mut(source) {
            deps.insert(target.to_string());
        }
        if let Some(deps) = self.dependents.get_mut(target) {
            deps.insert(source.to_string());
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.dependencies.contains_key(name)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Distinct (source, target) pairs.
    pub fn edge_count(&self) -> usize {
        self.edge_counts.len()
    }

    /// Node names in insertion order.
    pub fn names(&self) -> &[String] {
        &self.nodes
    }

    /// Workflows the given workflow references.
    pub fn dependencies_of(&self, name: &str) -> impl Iterator<Item = &String> {
        self.dependencies.get(name).into_iter().flatten()
    }

    /// Collapsed edges, ordered by (source, target).
    pub fn edges(&self) -> Vec<GraphEdge> {
        self.edge_counts
            .iter()
            .map(|((source, target), count)| GraphEdge {
                source: source.clone(),
                target: target.clone(),
                count: *count,
            })
            .collect()
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            node_count: self.node_count(),
            edge_count: self.edge_count(),
            reference_count: self.edge_counts.values().sum(),
            cycle_count: self.topological_order().cycles.len(),
        }
    }

    /// Compute the upload order.
    ///
    /// Kahn's algorithm over dependency edges: a workflow becomes ready
    /// once every workflow it references has been emitted; ties break by
    /// name so two runs over the same batch produce the same order.
    /// Nodes left over after the pass participate in (or depend on) a
    /// cycle; they are appended in strongly-connected-component order,
    /// name-sorted within each component, with self-references last.
    pub fn topological_order(&self) -> TopoResult {
        let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
        for name in &self.nodes {
            let deps = &self.dependencies[name];
            in_degree.insert(name, deps.len());
        }

        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(name, _)| *name)
            .collect();

        let mut order: Vec<String> = Vec::with_capacity(self.nodes.len());
        while let Some(name) = ready.pop_first() {
            order.push(name.to_string());
            for dependent in &self.dependents[name] {
                if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        if order.len() == self.nodes.len() {
            return TopoResult {
                order,
                cycles: Vec::new(),
            };
        }

        // Residual subgraph: everything Kahn could not emit.
        let emitted: BTreeSet<&str> = order.iter().map(String::as_str).collect();
        let residual: Vec<&str> = {
            let mut r: Vec<&str> = self
                .nodes
                .iter()
                .map(String::as_str)
                .filter(|n| !emitted.contains(n))
                .collect();
            r.sort_unstable();
            r
        };

        let sccs = self.residual_sccs(&residual);

        let mut cycles = Vec::new();
        let mut self_loops: Vec<String> = Vec::new();
        for scc in sccs {
            let mut members: Vec<String> = scc.iter().map(|s| (*s).to_string()).collect();
            members.sort_unstable();

            let is_self_loop = members.len() == 1
                && self
                    .edge_counts
                    .contains_key(&(members[0].clone(), members[0].clone()));
            if is_self_loop {
                self_loops.push(members[0].clone());
                continue;
            }

            if members.len() > 1 {
                cycles.push(members.clone());
            }
            order.extend(members);
        }

        self_loops.sort_unstable();
        for name in self_loops {
            cycles.push(vec![name.clone()]);
            order.push(name);
        }

        TopoResult { order, cycles }
    }

    /// Tarjan's algorithm over the residual subgraph. Components complete
    /// dependencies-first, which is exactly the upload order we need for
    /// the condensation. Roots and neighbors iterate in name order.
    fn residual_sccs<'a>(&'a self, residual: &[&'a str]) -> Vec<Vec<&'a str>> {
        let residual_set: BTreeSet<&str> = residual.iter().copied().collect();
        let mut state = TarjanState {
            next_index: 0,
            indices: HashMap::new(),
            lowlinks: HashMap::new(),
            stack: Vec::new(),
            on_stack: BTreeSet::new(),
            sccs: Vec::new(),
        };

        for &name in residual {
            if !state.indices.contains_key(name) {
                self.tarjan_visit(name, &residual_set, &mut state);
            }
        }

        state.sccs
    }

    fn tarjan_visit<'a>(
        &'a self,
        node: &'a str,
        residual: &BTreeSet<&'a str>,
        state: &mut TarjanState<'a>,
    ) {
        let index = state.next_index;
        state.next_index += 1;
        state.indices.insert(node, index);
        state.lowlinks.insert(node, index);
        state.stack.push(node);
        state.on_stack.insert(node);

        for neighbor in self.dependencies_of(node) {
            let neighbor = neighbor.as_str();
            if !residual.contains(neighbor) {
                continue;
            }
            if !state.indices.contains_key(neighbor) {
                self.tarjan_visit(neighbor, residual, state);
                let low = state.lowlinks[neighbor].min(state.lowlinks[node]);
                state.lowlinks.insert(node, low);
            } else if state.on_stack.contains(neighbor) {
                let low = state.indices[neighbor].min(state.lowlinks[node]);
                state.lowlinks.insert(node, low);
            }
        }

        if state.lowlinks[node] == state.indices[node] {
            let mut component = Vec::new();
            while let Some(member) = state.stack.pop() {
                state.on_stack.remove(member);
                component.push(member);
                if member == node {
                    break;
                }
            }
            state.sccs.push(component);
        }
    }
}

struct TarjanState<'a> {
    next_index: usize,
    indices: HashMap<&'a str, usize>,
    lowlinks: HashMap<&'a str, usize>,
    stack: Vec<&'a str>,
    on_stack: BTreeSet<&'a str>,
    sccs: Vec<Vec<&'a str>>,
}
