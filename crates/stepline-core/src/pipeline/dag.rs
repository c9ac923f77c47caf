//! Graph builder, plan validation, and generation computation.
//!
//! Uses `petgraph` to model step dependencies as a directed graph with edges
//! pointing from dependency to dependent. Construction crawls backwards from
//! the root steps, validation checks name uniqueness, named references and
//! acyclicity, and depth-based grouping produces the generations every
//! compilation target consumes.

use std::collections::{BTreeMap, HashMap};

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use super::error::PlanError;
use super::step::Step;

// ---------------------------------------------------------------------------
// StepGraph
// ---------------------------------------------------------------------------

/// A validated, acyclic dependency graph of steps.
#[derive(Debug, Clone)]
pub struct StepGraph {
    graph: DiGraph<Step, ()>,
    /// Topological order found during validation.
    order: Vec<NodeIndex>,
}

impl StepGraph {
    /// Number of distinct steps.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Number of `dependency -> dependent` edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Steps in topological order.
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.order.iter().map(|&idx| &self.graph[idx])
    }

    /// Direct dependencies of the step at `idx`, including resolved named ones.
    fn dependencies(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(idx, Direction::Incoming)
    }
}

// ---------------------------------------------------------------------------
// Construction and validation
// ---------------------------------------------------------------------------

/// Build and validate the dependency graph reachable from `roots`.
///
/// 1. Crawl every step reachable through handle dependencies, deduplicating
///    by identity so shared sub-dependencies (diamonds) are visited once.
/// 2. Reject the graph if two distinct steps share a name.
/// 3. Resolve named dependencies against the step names.
/// 4. Reject the graph if it contains a cycle.
pub fn build_graph(roots: &[Step]) -> Result<StepGraph, PlanError> {
    let mut graph = DiGraph::<Step, ()>::new();
    let mut index_of: HashMap<uuid::Uuid, NodeIndex> = HashMap::new();

    let mut stack: Vec<Step> = Vec::new();
    for root in roots {
        if !index_of.contains_key(&root.id()) {
            index_of.insert(root.id(), graph.add_node(root.clone()));
            stack.push(root.clone());
        }
    }

    while let Some(step) = stack.pop() {
        let to_idx = index_of[&step.id()];
        for dep in step.depends_on() {
            let from_idx = match index_of.get(&dep.id()) {
                Some(&idx) => idx,
                None => {
                    let idx = graph.add_node(dep.clone());
                    index_of.insert(dep.id(), idx);
                    stack.push(dep);
                    idx
                }
            };
            graph.update_edge(from_idx, to_idx, ());
        }
    }

    // Name uniqueness, checked after identity deduplication so that diamond
    // sharing is never mistaken for a collision.
    let mut by_name: BTreeMap<&str, NodeIndex> = BTreeMap::new();
    let mut duplicates: Vec<&str> = Vec::new();
    for idx in graph.node_indices() {
        let name = graph[idx].name();
        if by_name.insert(name, idx).is_some() {
            duplicates.push(name);
        }
    }
    if let Some(first) = duplicates.into_iter().min() {
        return Err(PlanError::DuplicateStepName(first.to_string()));
    }

    let mut named_edges = Vec::new();
    for idx in graph.node_indices() {
        let step = &graph[idx];
        for dep_name in step.named_dependencies() {
            let from_idx = by_name.get(dep_name).copied().ok_or_else(|| {
                PlanError::UnknownDependency {
                    step: step.name().to_string(),
                    dependency: dep_name.to_string(),
                }
            })?;
            named_edges.push((from_idx, idx));
        }
    }
    drop(by_name);
    for (from_idx, to_idx) in named_edges {
        graph.update_edge(from_idx, to_idx, ());
    }

    let order = toposort(&graph, None).map_err(|cycle| {
        let step = &graph[cycle.node_id()];
        PlanError::CycleDetected(step.name().to_string())
    })?;

    Ok(StepGraph { graph, order })
}

// ---------------------------------------------------------------------------
// Generations
// ---------------------------------------------------------------------------

/// Group the graph's steps into generations of mutually independent steps.
///
/// A step's generation is 0 when it has no dependencies and otherwise one more
/// than the deepest of its dependencies. Within a generation, steps are sorted
/// by name (then identity) so repeated calls render identically.
pub fn compute_generations(graph: &StepGraph) -> Vec<Vec<Step>> {
    if graph.is_empty() {
        return vec![];
    }

    // Dependencies precede dependents in `order`, so every lookup is filled.
    let mut depths: HashMap<NodeIndex, usize> = HashMap::with_capacity(graph.len());
    for &idx in &graph.order {
        let depth = graph
            .dependencies(idx)
            .map(|dep| depths.get(&dep).copied().unwrap_or(0) + 1)
            .max()
            .unwrap_or(0);
        depths.insert(idx, depth);
    }

    let max_depth = depths.values().copied().max().unwrap_or(0);
    let mut generations: Vec<Vec<Step>> = vec![vec![]; max_depth + 1];
    for &idx in &graph.order {
        generations[depths[&idx]].push(graph.graph[idx].clone());
    }
    for layer in &mut generations {
        layer.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.id().cmp(&b.id())));
    }

    generations
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
