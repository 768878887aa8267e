//! Static dependency graph over components
//!
//! The graph is a DAG by construction. Readiness never special-cases cycles:
//! a node on a cycle simply never has all of its dependencies completed.

use crate::pipeline::{ComponentKey, Tier};
use crate::state::ComponentStatus;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGraph<K: Ord + Copy> {
    /// Nodes in insertion order
    nodes: Vec<K>,
    dependencies: BTreeMap<K, Vec<K>>,
}

impl<K: Ord + Copy> Default for DependencyGraph<K> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            dependencies: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Copy> DependencyGraph<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `node` with its prerequisites, replacing any previous entry
    pub fn add(&mut self, node: K, dependencies: impl IntoIterator<Item = K>) -> &mut Self {
        if !self.dependencies.contains_key(&node) {
            self.nodes.push(node);
        }
        self.dependencies
            .insert(node, dependencies.into_iter().collect());
        self
    }

    pub fn nodes(&self) -> &[K] {
        &self.nodes
    }

    pub fn contains(&self, node: K) -> bool {
        self.dependencies.contains_key(&node)
    }

    pub fn dependencies(&self, node: K) -> &[K] {
        self.dependencies
            .get(&node)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Nodes that may start now
    ///
    /// A node is ready when its own status is runnable (pending, failed or
    /// retrying) and every dependency is completed. A running node is never
    /// ready, so concurrent callers cannot start it twice.
    pub fn ready(&self, status_of: impl Fn(K) -> ComponentStatus) -> Vec<K> {
        self.nodes
            .iter()
            .copied()
            .filter(|&node| status_of(node).is_runnable())
            .filter(|&node| {
                self.dependencies(node)
                    .iter()
                    .all(|&dep| status_of(dep).is_completed())
            })
            .collect()
    }

    pub fn all_completed(&self, status_of: impl Fn(K) -> ComponentStatus) -> bool {
        self.nodes.iter().all(|&node| status_of(node).is_completed())
    }

    /// Nodes ordered so every node follows its dependencies
    ///
    /// Returns `None` if the graph has a cycle. Dependencies outside the graph
    /// are ignored.
    pub fn topological_order(&self) -> Option<Vec<K>> {
        let mut placed: BTreeSet<K> = BTreeSet::new();
        let mut order = Vec::with_capacity(self.nodes.len());

        while order.len() < self.nodes.len() {
            let next = self.nodes.iter().copied().find(|&node| {
                !placed.contains(&node)
                    && self
                        .dependencies(node)
                        .iter()
                        .all(|dep| placed.contains(dep) || !self.contains(*dep))
            })?;
            placed.insert(next);
            order.push(next);
        }

        Some(order)
    }
}

impl DependencyGraph<ComponentKey> {
    /// The full graph every non-restricted tier runs
    pub fn standard() -> Self {
        Self::for_tier(Tier::Agency)
    }

    /// The graph for one tier
    ///
    /// Restricted tiers drop external-data and AI components; the health
    /// score depends on whatever analysis components remain.
    pub fn for_tier(tier: Tier) -> Self {
        use ComponentKey::*;

        let mut graph = Self::new();
        graph
            .add(Crawl, [])
            .add(TechnicalIssues, [Crawl])
            .add(InternalLinking, [Crawl])
            .add(DuplicateContent, [Crawl]);

        if !tier.is_restricted() {
            graph
                .add(KeywordRankings, [Crawl])
                .add(Competitors, [KeywordRankings])
                .add(TopicClusters, [Crawl, KeywordRankings])
                .add(ContentBriefs, [TopicClusters, Competitors]);
        }

        let scored: Vec<ComponentKey> = graph
            .nodes()
            .iter()
            .copied()
            .filter(|&k| k != Crawl)
            .collect();
        graph.add(HealthScore, scored);

        graph
    }
}
