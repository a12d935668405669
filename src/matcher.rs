//! Inexact graph matching.
//!
//! Best-first search over partial vertex mappings between two graphs under a
//! fixed edit-cost model. The search computes the minimum cost of
//! transforming the larger graph into an isomorph of the smaller, capped at
//! a caller-supplied threshold; with threshold zero it degenerates to exact
//! matching and takes a size-check fast path before searching at all.
//!
//! The queue holds partial mappings ordered by ascending cost, then
//! descending depth (more completed vertices first on equal cost). Once the
//! number of expansions exceeds `|V|^k` the search switches to greedy mode:
//! the queue is compressed to one node per distinct cost and only the best
//! candidate of each expansion is retained. `k` is a configuration knob;
//! zero disables the bound.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use fixedbitset::FixedBitSet;

use crate::graph::Graph;
use crate::instance::{Instance, InstanceRef, VertexMap, VERTEX_DELETED, VERTEX_UNMAPPED};
use crate::label::label_match_factor;

/// Default exponent bounding the search at `|V|^4` expansions.
pub const DEFAULT_GREEDY_EXPONENT: f64 = 4.0;

/// Costs of the graph edit operations. All default to 1.0; they are
/// centralized here so experiments can vary them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchCosts {
    pub insert_vertex: f64,
    pub delete_vertex: f64,
    pub substitute_vertex_label: f64,
    pub insert_edge: f64,
    pub insert_edge_with_vertex: f64,
    pub delete_edge: f64,
    pub delete_edge_with_vertex: f64,
    pub substitute_edge_label: f64,
    pub substitute_edge_direction: f64,
    pub reverse_edge_direction: f64,
}

impl Default for MatchCosts {
    fn default() -> MatchCosts {
        MatchCosts {
            insert_vertex: 1.0,
            delete_vertex: 1.0,
            substitute_vertex_label: 1.0,
            insert_edge: 1.0,
            insert_edge_with_vertex: 1.0,
            delete_edge: 1.0,
            delete_edge_with_vertex: 1.0,
            substitute_edge_label: 1.0,
            substitute_edge_direction: 1.0,
            reverse_edge_direction: 1.0,
        }
    }
}

/// A successful match: the edit cost and the mapping from the larger
/// graph's vertices to the smaller's (`VERTEX_DELETED` for deletions).
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub cost: f64,
    pub mapping: Vec<VertexMap>,
}

/// Matching context: the edit-cost model and the greedy cutoff exponent.
/// Label equality is index equality, since every graph being matched shares
/// one label table.
#[derive(Debug, Clone, Copy)]
pub struct Matcher {
    costs: MatchCosts,
    greedy_exponent: f64,
}

impl Default for Matcher {
    fn default() -> Matcher {
        Matcher::new()
    }
}

/// Node in the match search queue: a partial mapping of the first `depth`
/// ordered vertices, with its accumulated cost.
#[derive(Debug, Clone)]
struct MatchNode {
    cost: f64,
    depth: usize,
    mapping: Vec<VertexMap>,
}

impl PartialEq for MatchNode {
    fn eq(&self, other: &MatchNode) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MatchNode {}

impl PartialOrd for MatchNode {
    fn partial_cmp(&self, other: &MatchNode) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MatchNode {
    // Reversed on cost so that `BinaryHeap` pops the cheapest node first;
    // equal costs break toward greater depth.
    fn cmp(&self, other: &MatchNode) -> Ordering {
        match other.cost.partial_cmp(&self.cost) {
            Some(Ordering::Equal) | None => self.depth.cmp(&other.depth),
            Some(ordering) => ordering,
        }
    }
}

impl Matcher {
    pub fn new() -> Matcher {
        Matcher {
            costs: MatchCosts::default(),
            greedy_exponent: DEFAULT_GREEDY_EXPONENT,
        }
    }

    pub fn with_config(costs: MatchCosts, greedy_exponent: f64) -> Matcher {
        Matcher {
            costs,
            greedy_exponent,
        }
    }

    /// Match `g1` against `g2` within the given cost budget.
    ///
    /// Returns the edit cost and the vertex mapping of the larger graph
    /// onto the smaller, or `None` when no mapping fits the budget. When
    /// the budget is zero, graphs of unequal size are rejected without
    /// searching.
    pub fn graph_match(&self, g1: &Graph, g2: &Graph, threshold: f64) -> Option<MatchResult> {
        if threshold == 0.0
            && (g1.vertex_count() != g2.vertex_count() || g1.edge_count() != g2.edge_count())
        {
            return None;
        }
        let result = if g1.vertex_count() < g2.vertex_count() {
            self.inexact_match(g2, g1, threshold)
        } else {
            self.inexact_match(g1, g2, threshold)
        };
        result.filter(|r| r.cost <= threshold)
    }

    /// Minimum-cost transformation of `g1` (the larger graph) into an
    /// isomorph of `g2`, abandoning any partial mapping whose cost exceeds
    /// `threshold`.
    fn inexact_match(&self, g1: &Graph, g2: &Graph, threshold: f64) -> Option<MatchResult> {
        let nv1 = g1.vertex_count();
        let nv2 = g2.vertex_count();
        let quick_match_threshold = self.maximum_nodes(nv1);
        let ordered = order_vertices_by_degree(g1);

        let mut global = BinaryHeap::with_capacity(nv1 * nv1 + 1);
        global.push(MatchNode {
            cost: 0.0,
            depth: 0,
            mapping: Vec::new(),
        });
        let mut local: Vec<MatchNode> = Vec::with_capacity(nv2 + 1);
        let mut best: Option<MatchNode> = None;
        let mut best_cost = f64::MAX;
        let mut num_nodes: usize = 0;
        let mut quick_match = false;

        let mut mapped1 = vec![VERTEX_UNMAPPED; nv1];
        let mut mapped2 = vec![VERTEX_UNMAPPED; nv2];

        while let Some(node) = global.pop() {
            if node.cost < best_cost {
                if node.depth == nv1 {
                    // complete mapping found
                    best_cost = node.cost;
                    best = Some(node);
                    if !quick_match {
                        break;
                    }
                } else {
                    // rebuild the two direction maps from the partial mapping
                    mapped1.fill(VERTEX_UNMAPPED);
                    mapped2.fill(VERTEX_UNMAPPED);
                    for row in &node.mapping {
                        mapped1[row.v1] = row.v2;
                        if row.v2 != VERTEX_DELETED {
                            mapped2[row.v2] = row.v1;
                        }
                    }
                    let v1 = ordered[node.depth];

                    // first, try mapping v1 to nothing
                    let mut new_cost = node.cost + self.costs.delete_vertex;
                    for (_, edge) in g1.incident_edges(v1) {
                        let other = edge.other_endpoint(v1);
                        if mapped1[other] != VERTEX_DELETED || other == v1 {
                            new_cost += self.costs.delete_edge_with_vertex;
                        }
                    }
                    if node.depth == nv1 - 1 {
                        new_cost += self.inserted_vertices_cost(g2, &mapped2);
                    }
                    if new_cost <= threshold && new_cost < best_cost {
                        local.push(extend_node(&node, v1, VERTEX_DELETED, new_cost));
                    }

                    // second, try mapping v1 to each unmapped vertex in g2
                    for v2 in 0..nv2 {
                        if mapped2[v2] != VERTEX_UNMAPPED {
                            continue;
                        }
                        mapped1[v1] = v2;
                        mapped2[v2] = v1;
                        let mut new_cost = node.cost
                            + self.costs.substitute_vertex_label
                                * label_match_factor(g1.vertex(v1).label, g2.vertex(v2).label);
                        new_cost += self.reconcile_edges(g1, g2, v1, v2, &mapped1, &mapped2);
                        if node.depth == nv1 - 1 {
                            new_cost += self.inserted_vertices_cost(g2, &mapped2);
                        }
                        if new_cost <= threshold && new_cost < best_cost {
                            local.push(extend_node(&node, v1, v2, new_cost));
                        }
                        mapped1[v1] = VERTEX_UNMAPPED;
                        mapped2[v2] = VERTEX_UNMAPPED;
                    }

                    // merge this expansion's candidates into the global queue
                    if quick_match {
                        if let Some(best_local) = local.drain(..).max() {
                            global.push(best_local);
                        }
                    } else {
                        global.extend(local.drain(..));
                    }
                }
            }

            num_nodes += 1;
            if !quick_match && num_nodes > quick_match_threshold {
                compress_heap(&mut global, nv1);
                quick_match = true;
            }
        }

        best.map(|node| MatchResult {
            cost: node.cost,
            mapping: node.mapping,
        })
    }

    /// Number of expansions before the search goes greedy:
    /// `n^greedy_exponent`, or effectively unbounded when the exponent is
    /// zero.
    fn maximum_nodes(&self, n: usize) -> usize {
        if self.greedy_exponent == 0.0 {
            usize::MAX
        } else {
            (n as f64).powf(self.greedy_exponent) as usize
        }
    }

    /// Cost of reconciling the edges between `v1` and already-mapped
    /// vertices of `g1` against the corresponding edges of `g2`, given that
    /// `v1 -> v2` was just added to the mapping.
    ///
    /// Each such `g1` edge is paired greedily with the cheapest unclaimed
    /// `g2` edge between `v2` and the mapped image; unpaired `g1` edges pay
    /// a deletion, and unpaired `g2` edges between mapped endpoints pay an
    /// insertion. Parallel edges are handled by the claim marks.
    fn reconcile_edges(
        &self,
        g1: &Graph,
        g2: &Graph,
        v1: usize,
        v2: usize,
        mapped1: &[usize],
        mapped2: &[usize],
    ) -> f64 {
        let mut claimed = FixedBitSet::with_capacity(g2.edge_count());
        let mut total = 0.0;

        for (_, edge1) in g1.incident_edges(v1) {
            let other1 = edge1.other_endpoint(v1);
            let other2 = mapped1[other1];
            if other2 == VERTEX_UNMAPPED || other2 == VERTEX_DELETED {
                continue;
            }
            let mut best: Option<(usize, f64)> = None;
            for (e2, edge2) in g2.incident_edges(v2) {
                if claimed.contains(e2) {
                    continue;
                }
                let connects = (edge2.vertex1 == other2 && edge2.vertex2 == v2)
                    || (edge2.vertex1 == v2 && edge2.vertex2 == other2);
                if !connects {
                    continue;
                }
                let mut cost = 0.0;
                if edge1.directed != edge2.directed {
                    cost += self.costs.substitute_edge_direction;
                }
                if edge1.directed
                    && edge2.directed
                    && !edge1.is_self_edge()
                    && ((edge1.vertex1 == v1 && edge2.vertex1 == other2)
                        || (edge1.vertex1 == other1 && edge2.vertex1 == v2))
                {
                    cost += self.costs.reverse_edge_direction;
                }
                cost += self.costs.substitute_edge_label
                    * label_match_factor(edge1.label, edge2.label);
                if best.map_or(true, |(_, c)| cost < c) {
                    best = Some((e2, cost));
                }
            }
            match best {
                Some((e2, cost)) => {
                    claimed.insert(e2);
                    total += cost;
                }
                None => total += self.costs.delete_edge,
            }
        }

        for (e2, edge2) in g2.incident_edges(v2) {
            if !claimed.contains(e2)
                && mapped2[edge2.vertex1] != VERTEX_UNMAPPED
                && mapped2[edge2.vertex2] != VERTEX_UNMAPPED
            {
                total += self.costs.insert_edge;
            }
        }
        total
    }

    /// Once every `g1` vertex is mapped, the still-unmapped vertices of
    /// `g2` must be inserted, along with their edges to mapped vertices and
    /// their self-edges. An edge between two unmapped vertices is never
    /// charged twice.
    fn inserted_vertices_cost(&self, g2: &Graph, mapped2: &[usize]) -> f64 {
        let mut cost = 0.0;
        for v in 0..g2.vertex_count() {
            if mapped2[v] != VERTEX_UNMAPPED {
                continue;
            }
            cost += self.costs.insert_vertex;
            for (_, edge) in g2.incident_edges(v) {
                let other = edge.other_endpoint(v);
                if mapped2[other] != VERTEX_UNMAPPED || other == v {
                    cost += self.costs.insert_edge_with_vertex;
                }
            }
        }
        cost
    }

    /// Fast acceptance test for an extended instance whose parent is
    /// already known to match the pattern's parent: the single newly added
    /// edge (and vertex, if any) must agree on labels, directedness, and
    /// endpoint correspondence under the inherited parent mapping.
    ///
    /// `g1`/`inst1` are the pattern definition and its defining instance;
    /// `g2`/`inst2` the induced graph and instance being tested. On the
    /// fallback path the full matcher runs and `inst2`'s mapping is
    /// realigned to the pattern from the returned mapping.
    ///
    /// Only valid at threshold zero, where a successful match always costs
    /// nothing.
    pub fn new_edge_match(
        &self,
        g1: &Graph,
        inst1: &InstanceRef,
        g2: &Graph,
        inst2: &InstanceRef,
        threshold: f64,
    ) -> Option<f64> {
        {
            let i1 = inst1.borrow();
            let mut i2 = inst2.borrow_mut();
            let edge1 = g1.edge(i1.new_edge);
            let edge2 = g2.edge(i2.new_edge);
            let new_vertex_ok = match (i1.new_vertex, i2.new_vertex) {
                (None, None) => true,
                (Some(nv1), Some(nv2)) => g1.vertex(nv1).label == g2.vertex(nv2).label,
                _ => false,
            };
            if edge1.label == edge2.label && edge1.directed == edge2.directed && new_vertex_ok {
                // align inst2's rows with inst1's through their parents
                if i2.new_vertex.is_some() {
                    update_mapping(&i1, &mut i2);
                }
                let inst1_v1 = i1.mapping[i1.mapping_index1].v1;
                let inst1_v2 = i1.mapping[i1.mapping_index2].v1;
                let inst2_v1 = i2.mapping[i2.mapping_index1].v1;
                let inst2_v2 = i2.mapping[i2.mapping_index2].v1;
                let forward = edge1.vertex1 == edge2.vertex1
                    && edge1.vertex2 == edge2.vertex2
                    && inst1_v1 == inst2_v1
                    && inst1_v2 == inst2_v2;
                let flipped = !edge2.directed
                    && edge1.vertex1 == edge2.vertex2
                    && edge1.vertex2 == edge2.vertex1
                    && inst1_v1 == inst2_v2
                    && inst1_v2 == inst2_v1;
                if forward || flipped {
                    return Some(0.0);
                }
            }
        }

        // Last resort: the graphs may still match under a rotation. Run the
        // full matcher and realign inst2's mapping from the result.
        let result = self.graph_match(g1, g2, threshold)?;
        let mut i2 = inst2.borrow_mut();
        let n = i2.vertices.len();
        let mut pattern_to_position = vec![0usize; n];
        for row in &result.mapping {
            pattern_to_position[row.v1] = row.v2;
        }
        // i-th smallest current row value = host vertex at instance position i
        let mut positions: Vec<usize> = i2.mapping.iter().map(|m| m.v2).collect();
        positions.sort_unstable();
        for i in 0..n {
            i2.mapping[i].v2 = positions[pattern_to_position[i]];
        }
        Some(result.cost)
    }
}

/// Extend a partial mapping with `v1 -> v2` at the given accumulated cost.
fn extend_node(node: &MatchNode, v1: usize, v2: usize, cost: f64) -> MatchNode {
    let mut mapping = Vec::with_capacity(node.depth + 1);
    mapping.extend_from_slice(&node.mapping);
    mapping.push(VertexMap { v1, v2 });
    MatchNode {
        cost,
        depth: node.depth + 1,
        mapping,
    }
}

/// Vertex indices ordered by descending degree, ties by insertion order.
/// Vertices with more structural constraints are tried first.
fn order_vertices_by_degree(g: &Graph) -> Vec<usize> {
    let mut ordered: Vec<usize> = (0..g.vertex_count()).collect();
    ordered.sort_by_key(|&v| std::cmp::Reverse(g.degree(v)));
    ordered
}

/// Compress the queue for greedy search: keep the best `n` nodes, then one
/// node per distinct cost among the rest.
fn compress_heap(heap: &mut BinaryHeap<MatchNode>, n: usize) {
    let mut kept: Vec<MatchNode> = Vec::with_capacity(n);
    let mut last_cost = f64::MAX;
    while let Some(node) = heap.pop() {
        if kept.len() < n || node.cost != last_cost {
            last_cost = node.cost;
            kept.push(node);
        }
    }
    *heap = BinaryHeap::from(kept);
}

/// Realign `inst2`'s mapping rows to `inst1`'s row layout by matching their
/// parents' mappings slot for slot; the one slot left unset afterwards
/// receives the newly added vertex.
fn update_mapping(inst1: &Instance, inst2: &mut Instance) {
    let n = inst2.vertices.len();
    let mut map_set = vec![false; n];
    let first_index_value = inst2.mapping[inst2.mapping_index1].v2;
    let second_index_value = inst2.mapping[inst2.mapping_index2].v2;

    let parent1_ref = inst1.parent.as_ref().expect("new_edge_match on a seed instance");
    let parent2_ref = inst2.parent.as_ref().expect("new_edge_match on a seed instance");
    let parent1 = parent1_ref.borrow();
    let parent2 = parent2_ref.borrow();

    let mut counter = 0;
    for i in 0..parent2.vertices.len() {
        for j in 0..inst1.vertices.len() {
            if parent1.mapping[i].v2 == inst1.mapping[j].v2 {
                inst2.mapping[j].v1 = j;
                inst2.mapping[j].v2 = parent2.mapping[i].v2;
                map_set[j] = true;
                if inst2.mapping[j].v2 == first_index_value {
                    inst2.mapping_index1 = j;
                }
                if inst2.mapping[j].v2 == second_index_value {
                    inst2.mapping_index2 = j;
                }
                counter += 1;
                break;
            }
        }
    }

    // the one slot left unset is the new vertex
    if counter < n {
        let new_vertex = inst2.new_vertex.expect("update_mapping without a new vertex");
        let host_vertex = inst2.vertices[new_vertex];
        for i in 0..n {
            if !map_set[i] {
                inst2.mapping[i].v1 = i;
                inst2.mapping[i].v2 = host_vertex;
                if host_vertex == first_index_value {
                    inst2.mapping_index1 = i;
                }
                if host_vertex == second_index_value {
                    inst2.mapping_index2 = i;
                }
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::{Label, LabelList};

    fn path_graph(labels: &mut LabelList, names: &[&str], edge_label: &str) -> Graph {
        let edge = labels.store(Label::from(edge_label));
        let mut g = Graph::new();
        let mut prev = None;
        for name in names {
            let l = labels.store(Label::from(*name));
            let v = g.add_vertex(l);
            if let Some(p) = prev {
                g.add_edge(p, v, false, edge);
            }
            prev = Some(v);
        }
        g
    }

    #[test]
    fn identical_graphs_match_at_zero_cost() {
        let mut labels = LabelList::new();
        let g1 = path_graph(&mut labels, &["a", "b", "c"], "e");
        let g2 = path_graph(&mut labels, &["a", "b", "c"], "e");
        let matcher = Matcher::new();
        let result = matcher.graph_match(&g1, &g2, 0.0).unwrap();
        assert_eq!(result.cost, 0.0);
        assert_eq!(result.mapping.len(), 3);
        // mapping covers every vertex of the larger graph exactly once
        let mut seen = vec![false; 3];
        for row in &result.mapping {
            assert!(!seen[row.v1]);
            seen[row.v1] = true;
            assert!(row.v2 < 3);
        }
    }

    #[test]
    fn size_mismatch_fails_fast_at_zero_threshold() {
        let mut labels = LabelList::new();
        let g1 = path_graph(&mut labels, &["a", "b", "c"], "e");
        let g2 = path_graph(&mut labels, &["a", "b"], "e");
        let matcher = Matcher::new();
        assert!(matcher.graph_match(&g1, &g2, 0.0).is_none());
        // within a budget of two (delete vertex + delete edge) they match
        let result = matcher.graph_match(&g1, &g2, 2.0).unwrap();
        assert_eq!(result.cost, 2.0);
    }

    #[test]
    fn relabeled_vertex_costs_one() {
        let mut labels = LabelList::new();
        let g1 = path_graph(&mut labels, &["a", "b", "c"], "e");
        let g2 = path_graph(&mut labels, &["a", "b", "x"], "e");
        let matcher = Matcher::new();
        assert!(matcher.graph_match(&g1, &g2, 0.0).is_none());
        let result = matcher.graph_match(&g1, &g2, 1.0).unwrap();
        assert_eq!(result.cost, 1.0);
    }

    #[test]
    fn edge_direction_flip_costs_one() {
        let mut labels = LabelList::new();
        let a = labels.store(Label::from("a"));
        let b = labels.store(Label::from("b"));
        let e = labels.store(Label::from("e"));
        let mut g1 = Graph::new();
        let v0 = g1.add_vertex(a);
        let v1 = g1.add_vertex(b);
        g1.add_edge(v0, v1, true, e);
        let mut g2 = Graph::new();
        let w0 = g2.add_vertex(a);
        let w1 = g2.add_vertex(b);
        g2.add_edge(w1, w0, true, e);
        let matcher = Matcher::new();
        let result = matcher.graph_match(&g1, &g2, 1.0).unwrap();
        assert_eq!(result.cost, 1.0);
    }

    #[test]
    fn cost_is_never_negative_and_mapping_is_complete() {
        let mut labels = LabelList::new();
        let g1 = path_graph(&mut labels, &["a", "a", "a", "a"], "e");
        let g2 = path_graph(&mut labels, &["a", "a"], "e");
        let matcher = Matcher::new();
        let result = matcher.graph_match(&g1, &g2, 10.0).unwrap();
        assert!(result.cost >= 0.0);
        assert_eq!(result.mapping.len(), g1.vertex_count());
        for row in &result.mapping {
            assert!(row.v2 == VERTEX_DELETED || row.v2 < g2.vertex_count());
        }
    }

    #[test]
    fn greedy_cutoff_still_finds_a_mapping() {
        let mut labels = LabelList::new();
        let g1 = path_graph(&mut labels, &["a", "a", "a", "a", "a"], "e");
        let g2 = path_graph(&mut labels, &["a", "a", "a", "a", "a"], "e");
        // exponent 1 forces the greedy phase almost immediately
        let matcher = Matcher::with_config(MatchCosts::default(), 1.0);
        let result = matcher.graph_match(&g1, &g2, 4.0).unwrap();
        assert!(result.cost <= 4.0);
    }
}
