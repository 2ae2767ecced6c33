//! Associative Memory Graph.
//!
//! Stores text memories as an arena of [`MemoryNode`]s keyed by id.  Edges are
//! plain id references held in each node's `associations` list, which keeps
//! the graph trivially serialisable and makes cascading deletes a single scan.
//!
//! ## Integrity
//!
//! * Every association written through [`MemoryGraph::add`] or
//!   [`MemoryGraph::update`] must name an existing node.  The whole list is
//!   validated before anything is touched, so a bad id aborts the write.
//! * [`MemoryGraph::delete`] strips the removed id from every remaining node.
//!
//! ## Traversal
//!
//! [`MemoryGraph::get`] walks association edges breadth-first, one frontier
//! per hop, up to [`MAX_TRAVERSAL_DEPTH`] hops.  A node is reported once, at
//! the hop where it is first reached.
//!
//! # Example
//!
//! ```rust
//! use recall_memory::graph::MemoryGraph;
//!
//! let mut graph = MemoryGraph::default();
//! let hello = graph.add("hello", vec![]).unwrap();
//! let world = graph.add("world", vec![hello.clone()]).unwrap();
//!
//! let recall = graph.get(&world, Some(1)).unwrap();
//! assert_eq!(recall.associations.len(), 1);
//! assert_eq!(recall.associations[0].id, hello);
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Utc;
use recall_types::{MemoryNode, NodeRecall, RecallError, SearchHit};
use tracing::debug;

/// Hard ceiling on association traversal depth.
pub const MAX_TRAVERSAL_DEPTH: usize = 3;
/// Traversal depth used when the caller does not specify one.
pub const DEFAULT_TRAVERSAL_DEPTH: usize = 1;
/// Search result cap used when the caller does not specify one.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Full export of the graph, keyed by node id.
pub type NodeSnapshot = BTreeMap<String, MemoryNode>;

/// Caller-facing defaults applied by [`MemoryGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphLimits {
    /// Depth used by [`MemoryGraph::get`] when none is given (capped at
    /// [`MAX_TRAVERSAL_DEPTH`]).
    pub default_depth: usize,
    /// Result cap used by [`MemoryGraph::search`] when none is given.
    pub search_limit: usize,
}

impl Default for GraphLimits {
    fn default() -> Self {
        Self {
            default_depth: DEFAULT_TRAVERSAL_DEPTH,
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MemoryGraph
// ─────────────────────────────────────────────────────────────────────────────

/// Id-keyed arena of memories with dirty tracking for the persistence layer.
#[derive(Default)]
pub struct MemoryGraph {
    nodes: HashMap<String, MemoryNode>,
    /// Insertion order, used by search.
    order: Vec<String>,
    limits: GraphLimits,
    dirty: bool,
    /// Bumped on every dirtying mutation.
    revision: u64,
}

impl MemoryGraph {
    pub fn new(limits: GraphLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    /// Store a new memory and return its id.
    ///
    /// Fails with [`RecallError::Validation`] on blank text and
    /// [`RecallError::Integrity`] if any association is unknown; in both
    /// cases the graph is left untouched.
    pub fn add(&mut self, text: &str, associations: Vec<String>) -> Result<String, RecallError> {
        validate_text(text)?;
        self.validate_associations(&associations)?;

        let node = MemoryNode::new(text.to_string(), associations);
        let id = node.id.clone();
        self.order.push(id.clone());
        self.nodes.insert(id.clone(), node);
        self.mark_dirty();
        debug!(memory_id = %id, "memory added");
        Ok(id)
    }

    /// Read a memory and every node reachable from it within `depth` hops.
    ///
    /// `depth` defaults to [`GraphLimits::default_depth`] and is capped at
    /// [`MAX_TRAVERSAL_DEPTH`]; a depth of zero returns no associations.  The
    /// read bumps the node's access metadata.
    pub fn get(&mut self, id: &str, depth: Option<usize>) -> Result<NodeRecall, RecallError> {
        let depth = depth
            .unwrap_or(self.limits.default_depth)
            .min(MAX_TRAVERSAL_DEPTH);

        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| RecallError::not_found("memory", id))?;
        node.touch();
        let node = node.clone();
        self.mark_dirty();

        let associations = self.reachable(id, depth);
        debug!(memory_id = %id, depth, found = associations.len(), "memory recalled");
        Ok(NodeRecall { node, associations })
    }

    /// Breadth-first walk from `start`, excluding `start` itself.
    fn reachable(&self, start: &str, depth: usize) -> Vec<MemoryNode> {
        let mut visited: HashSet<&str> = HashSet::from([start]);
        let mut frontier: Vec<&str> = vec![start];
        let mut found = Vec::new();

        for _ in 0..depth {
            let mut next = Vec::new();
            for current in frontier {
                let Some(node) = self.nodes.get(current) else {
                    continue;
                };
                for assoc in &node.associations {
                    if !visited.insert(assoc.as_str()) {
                        continue;
                    }
                    // Dangling ids are skipped.
                    if let Some(target) = self.nodes.get(assoc) {
                        found.push(target.clone());
                        next.push(target.id.as_str());
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        found
    }

    /// Literal substring search in insertion order.
    ///
    /// Matching is case-insensitive unless `case_sensitive` is set.  Stops as
    /// soon as `limit` hits (default [`GraphLimits::search_limit`]) are found.
    pub fn search(
        &self,
        keyword: &str,
        limit: Option<usize>,
        case_sensitive: bool,
    ) -> Result<Vec<SearchHit>, RecallError> {
        if keyword.is_empty() {
            return Err(RecallError::Validation(
                "search keyword must not be empty".to_string(),
            ));
        }
        let limit = limit.unwrap_or(self.limits.search_limit);
        let needle = if case_sensitive {
            keyword.to_string()
        } else {
            keyword.to_lowercase()
        };

        let hits: Vec<SearchHit> = self
            .order
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(|node| {
                if case_sensitive {
                    node.text.contains(&needle)
                } else {
                    node.text.to_lowercase().contains(&needle)
                }
            })
            .take(limit)
            .map(|node| SearchHit {
                id: node.id.clone(),
                text: node.text.clone(),
            })
            .collect();
        debug!(keyword, hits = hits.len(), "memory search");
        Ok(hits)
    }

    /// Replace a memory's text and/or its whole association list.
    ///
    /// Every supplied field is validated before either is applied.
    pub fn update(
        &mut self,
        id: &str,
        text: Option<&str>,
        associations: Option<Vec<String>>,
    ) -> Result<MemoryNode, RecallError> {
        if !self.nodes.contains_key(id) {
            return Err(RecallError::not_found("memory", id));
        }
        if let Some(text) = text {
            validate_text(text)?;
        }
        if let Some(assocs) = &associations {
            self.validate_associations(assocs)?;
        }

        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| RecallError::not_found("memory", id))?;
        if let Some(text) = text {
            node.text = text.to_string();
        }
        if let Some(assocs) = associations {
            node.associations = assocs;
        }
        node.metadata.last_accessed = Utc::now();
        let updated = node.clone();
        self.mark_dirty();
        debug!(memory_id = %id, "memory updated");
        Ok(updated)
    }

    /// Remove a memory and strip its id from every other node.
    pub fn delete(&mut self, id: &str) -> Result<(), RecallError> {
        if self.nodes.remove(id).is_none() {
            return Err(RecallError::not_found("memory", id));
        }
        self.order.retain(|o| o != id);
        for node in self.nodes.values_mut() {
            node.associations.retain(|a| a != id);
        }
        self.mark_dirty();
        debug!(memory_id = %id, "memory deleted");
        Ok(())
    }

    /// Copy of the direct association list of `id`.
    pub fn get_associations(&self, id: &str) -> Result<Vec<String>, RecallError> {
        self.nodes
            .get(id)
            .map(|n| n.associations.clone())
            .ok_or_else(|| RecallError::not_found("memory", id))
    }

    /// Export every node for persistence.
    pub fn get_all_nodes(&self) -> NodeSnapshot {
        self.nodes
            .iter()
            .map(|(id, node)| (id.clone(), node.clone()))
            .collect()
    }

    /// Replace the whole store with `snapshot` and clear the dirty flag.
    ///
    /// Insertion order is rebuilt from `(created_at, id)`.
    pub fn load_nodes(&mut self, snapshot: NodeSnapshot) {
        let mut order: Vec<(chrono::DateTime<Utc>, String)> = snapshot
            .values()
            .map(|n| (n.metadata.created_at, n.id.clone()))
            .collect();
        order.sort();
        self.order = order.into_iter().map(|(_, id)| id).collect();
        self.nodes = snapshot.into_iter().collect();
        self.dirty = false;
    }

    fn validate_associations(&self, associations: &[String]) -> Result<(), RecallError> {
        match associations.iter().find(|a| !self.nodes.contains_key(a.as_str())) {
            Some(missing) => Err(RecallError::Integrity(format!(
                "association references unknown memory: {missing}"
            ))),
            None => Ok(()),
        }
    }

    // ── Dirty tracking ───────────────────────────────────────────────────────

    fn mark_dirty(&mut self) {
        self.dirty = true;
        self.revision += 1;
    }

    /// Clear the dirty flag after a successful save.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Counter of dirtying mutations since construction.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    // ── Introspection ────────────────────────────────────────────────────────

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Sum of every node's association list length.
    pub fn total_associations(&self) -> usize {
        self.nodes.values().map(|n| n.associations.len()).sum()
    }
}

fn validate_text(text: &str) -> Result<(), RecallError> {
    if text.trim().is_empty() {
        return Err(RecallError::Validation(
            "memory text must not be empty".to_string(),
        ));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// A → B → C
    fn chain_abc() -> (MemoryGraph, String, String, String) {
        let mut graph = MemoryGraph::default();
        let c = graph.add("C", vec![]).unwrap();
        let b = graph.add("B", vec![c.clone()]).unwrap();
        let a = graph.add("A", vec![b.clone()]).unwrap();
        (graph, a, b, c)
    }

    fn ids(nodes: &[MemoryNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.id.as_str()).collect()
    }

    // ── add ──────────────────────────────────────────────────────────────────

    #[test]
    fn add_marks_dirty_and_initialises_metadata() {
        let mut graph = MemoryGraph::default();
        assert!(!graph.is_dirty());
        let id = graph.add("hello", vec![]).unwrap();
        assert!(graph.is_dirty());
        let node = &graph.get_all_nodes()[&id];
        assert_eq!(node.metadata.access_count, 0);
        assert_eq!(node.metadata.created_at, node.metadata.last_accessed);
    }

    #[test]
    fn add_rejects_empty_text() {
        let mut graph = MemoryGraph::default();
        let err = graph.add("  ", vec![]).unwrap_err();
        assert!(matches!(err, RecallError::Validation(_)));
        assert!(graph.is_empty());
    }

    #[test]
    fn add_with_unknown_association_mutates_nothing() {
        let mut graph = MemoryGraph::default();
        let known = graph.add("known", vec![]).unwrap();
        graph.mark_clean();
        let before = graph.len();

        let err = graph
            .add("bad", vec![known, "missing".to_string()])
            .unwrap_err();
        assert!(matches!(err, RecallError::Integrity(_)));
        assert_eq!(graph.len(), before);
        assert!(!graph.is_dirty());
    }

    #[test]
    fn duplicate_and_self_like_associations_are_accepted() {
        let mut graph = MemoryGraph::default();
        let a = graph.add("a", vec![]).unwrap();
        let b = graph.add("b", vec![a.clone(), a.clone()]).unwrap();
        assert_eq!(graph.get_associations(&b).unwrap(), vec![a.clone(), a]);
    }

    // ── get / traversal ──────────────────────────────────────────────────────

    #[test]
    fn get_depth_one_returns_direct_neighbours() {
        let (mut graph, a, b, _) = chain_abc();
        let recall = graph.get(&a, Some(1)).unwrap();
        assert_eq!(recall.node.id, a);
        assert_eq!(ids(&recall.associations), vec![b.as_str()]);
    }

    #[test]
    fn get_depth_two_reaches_second_hop() {
        let (mut graph, a, b, c) = chain_abc();
        let recall = graph.get(&a, Some(2)).unwrap();
        assert_eq!(ids(&recall.associations), vec![b.as_str(), c.as_str()]);
    }

    #[test]
    fn get_depth_zero_returns_no_associations() {
        let (mut graph, a, _, _) = chain_abc();
        let recall = graph.get(&a, Some(0)).unwrap();
        assert!(recall.associations.is_empty());
    }

    #[test]
    fn get_depth_is_capped() {
        let mut graph = MemoryGraph::default();
        let mut prev = graph.add("n0", vec![]).unwrap();
        for i in 1..6 {
            prev = graph.add(&format!("n{i}"), vec![prev]).unwrap();
        }
        let recall = graph.get(&prev, Some(10)).unwrap();
        assert_eq!(recall.associations.len(), MAX_TRAVERSAL_DEPTH);
    }

    #[test]
    fn get_uses_configured_default_depth() {
        let (graph, a, _, _) = chain_abc();
        let mut graph = MemoryGraph {
            limits: GraphLimits {
                default_depth: 2,
                search_limit: DEFAULT_SEARCH_LIMIT,
            },
            ..graph
        };
        assert_eq!(graph.get(&a, None).unwrap().associations.len(), 2);
    }

    #[test]
    fn get_excludes_target_and_does_not_revisit() {
        let mut graph = MemoryGraph::default();
        let a = graph.add("a", vec![]).unwrap();
        let b = graph.add("b", vec![a.clone()]).unwrap();
        // a ↔ b cycle plus a diamond: c → {a, b}
        graph.update(&a, None, Some(vec![b.clone()])).unwrap();
        let c = graph.add("c", vec![a.clone(), b.clone()]).unwrap();

        let recall = graph.get(&c, Some(3)).unwrap();
        assert_eq!(ids(&recall.associations), vec![a.as_str(), b.as_str()]);

        let recall = graph.get(&a, Some(3)).unwrap();
        assert_eq!(ids(&recall.associations), vec![b.as_str()]);
    }

    #[test]
    fn get_bumps_access_metadata() {
        let (mut graph, a, _, _) = chain_abc();
        graph.mark_clean();
        graph.get(&a, None).unwrap();
        let recall = graph.get(&a, None).unwrap();
        assert_eq!(recall.node.metadata.access_count, 2);
        assert!(graph.is_dirty());
    }

    #[test]
    fn get_unknown_is_not_found() {
        let mut graph = MemoryGraph::default();
        assert!(matches!(
            graph.get("nope", None),
            Err(RecallError::NotFound { .. })
        ));
    }

    // ── search ───────────────────────────────────────────────────────────────

    #[test]
    fn search_is_case_insensitive_by_default() {
        let mut graph = MemoryGraph::default();
        graph.add("Rust ownership", vec![]).unwrap();
        graph.add("borrow checker", vec![]).unwrap();
        let hits = graph.search("rust", None, false).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "Rust ownership");
        assert!(graph.search("rust", None, true).unwrap().is_empty());
    }

    #[test]
    fn search_returns_insertion_order_and_honours_limit() {
        let mut graph = MemoryGraph::default();
        let first = graph.add("note one", vec![]).unwrap();
        let second = graph.add("note two", vec![]).unwrap();
        graph.add("note three", vec![]).unwrap();

        let hits = graph.search("note", Some(2), false).unwrap();
        let hit_ids: Vec<_> = hits.iter().map(|h| h.id.clone()).collect();
        assert_eq!(hit_ids, vec![first, second]);
    }

    #[test]
    fn search_rejects_empty_keyword() {
        let graph = MemoryGraph::default();
        assert!(matches!(
            graph.search("", None, false),
            Err(RecallError::Validation(_))
        ));
    }

    // ── update ───────────────────────────────────────────────────────────────

    #[test]
    fn update_replaces_associations_wholesale() {
        let mut graph = MemoryGraph::default();
        let a = graph.add("a", vec![]).unwrap();
        let b = graph.add("b", vec![]).unwrap();
        let c = graph.add("c", vec![a.clone()]).unwrap();
        let updated = graph.update(&c, Some("c2"), Some(vec![b.clone()])).unwrap();
        assert_eq!(updated.text, "c2");
        assert_eq!(updated.associations, vec![b]);
    }

    #[test]
    fn update_is_all_or_nothing() {
        let mut graph = MemoryGraph::default();
        let a = graph.add("a", vec![]).unwrap();
        let err = graph
            .update(&a, Some("changed"), Some(vec!["ghost".to_string()]))
            .unwrap_err();
        assert!(matches!(err, RecallError::Integrity(_)));
        assert_eq!(graph.get_all_nodes()[&a].text, "a");

        let err = graph.update(&a, Some(""), None).unwrap_err();
        assert!(matches!(err, RecallError::Validation(_)));
    }

    #[test]
    fn update_unknown_is_not_found() {
        let mut graph = MemoryGraph::default();
        assert!(matches!(
            graph.update("ghost", Some("x"), None),
            Err(RecallError::NotFound { .. })
        ));
    }

    #[test]
    fn update_bumps_last_accessed_and_marks_dirty() {
        let mut graph = MemoryGraph::default();
        let a = graph.add("a", vec![]).unwrap();
        let before = graph.get_all_nodes()[&a].metadata.last_accessed;
        graph.mark_clean();
        let rev = graph.revision();

        std::thread::sleep(std::time::Duration::from_millis(2));
        let updated = graph.update(&a, Some("a2"), None).unwrap();

        assert!(updated.metadata.last_accessed > before);
        assert_eq!(graph.get_all_nodes()[&a].metadata.last_accessed, updated.metadata.last_accessed);
        assert!(graph.is_dirty());
        assert!(graph.revision() > rev);
    }

    // ── delete ───────────────────────────────────────────────────────────────

    #[test]
    fn delete_cascades_to_referencing_nodes() {
        let mut graph = MemoryGraph::default();
        let x = graph.add("x", vec![]).unwrap();
        let other = graph.add("other", vec![]).unwrap();
        let y = graph.add("y", vec![x.clone(), other.clone(), x.clone()]).unwrap();

        graph.delete(&x).unwrap();

        assert!(!graph.contains(&x));
        assert_eq!(graph.get_associations(&y).unwrap(), vec![other]);
        assert!(matches!(
            graph.get(&x, None),
            Err(RecallError::NotFound { .. })
        ));
        assert!(graph.search("x", None, true).unwrap().is_empty());
    }

    #[test]
    fn delete_unknown_is_not_found() {
        let mut graph = MemoryGraph::default();
        assert!(matches!(
            graph.delete("ghost"),
            Err(RecallError::NotFound { .. })
        ));
    }

    #[test]
    fn get_associations_unknown_is_not_found() {
        let graph = MemoryGraph::default();
        assert!(matches!(
            graph.get_associations("ghost"),
            Err(RecallError::NotFound { .. })
        ));
    }

    // ── snapshot ─────────────────────────────────────────────────────────────

    #[test]
    fn load_nodes_of_export_is_identity() {
        let (mut graph, a, _, _) = chain_abc();
        graph.get(&a, Some(2)).unwrap();
        let snapshot = graph.get_all_nodes();

        let mut restored = MemoryGraph::default();
        restored.load_nodes(snapshot.clone());
        assert_eq!(restored.get_all_nodes(), snapshot);
        assert!(!restored.is_dirty());
    }

    #[test]
    fn load_nodes_restores_creation_order_for_search() {
        let mut graph = MemoryGraph::default();
        let first = graph.add("item first", vec![]).unwrap();
        let second = graph.add("item second", vec![]).unwrap();

        let mut restored = MemoryGraph::default();
        restored.load_nodes(graph.get_all_nodes());
        let hits = restored.search("item", None, false).unwrap();
        let hit_ids: Vec<_> = hits.into_iter().map(|h| h.id).collect();
        let mut expected = vec![first, second];
        // Equal timestamps fall back to id order.
        let nodes = graph.get_all_nodes();
        expected.sort_by_key(|id| (nodes[id].metadata.created_at, id.clone()));
        assert_eq!(hit_ids, expected);
    }

    #[test]
    fn load_nodes_replaces_existing_contents() {
        let mut source = MemoryGraph::default();
        let kept = source.add("incoming", vec![]).unwrap();
        let snapshot = source.get_all_nodes();

        let mut graph = MemoryGraph::default();
        let stale = graph.add("stale entry", vec![]).unwrap();
        graph.load_nodes(snapshot.clone());

        assert!(!graph.contains(&stale));
        assert!(graph.contains(&kept));
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.get_all_nodes(), snapshot);
        assert!(graph.search("stale", None, false).unwrap().is_empty());
        assert!(!graph.is_dirty());
    }

    #[test]
    fn mark_clean_and_revision() {
        let mut graph = MemoryGraph::default();
        let rev = graph.revision();
        graph.add("a", vec![]).unwrap();
        assert!(graph.revision() > rev);
        graph.mark_clean();
        assert!(!graph.is_dirty());
    }

    #[test]
    fn end_to_end_hello_world() {
        let mut graph = MemoryGraph::default();
        let id1 = graph.add("hello", vec![]).unwrap();
        let id2 = graph.add("world", vec![id1.clone()]).unwrap();
        let recall = graph.get(&id2, Some(1)).unwrap();
        assert_eq!(recall.node.id, id2);
        assert_eq!(ids(&recall.associations), vec![id1.as_str()]);
        assert_eq!(graph.total_associations(), 1);
    }
}
