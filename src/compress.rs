//! Graph compression: replacing substructure instances with SUB vertices.
//!
//! The compressor builds a new graph in which each instance collapses to a
//! single SUB vertex, external edges are rewired to the SUB vertices, and
//! overlapping instances are stitched together with OVERLAP edges and
//! duplicated external edges. SUB vertices occupy the first `n` slots of
//! the output vertex array in instance-list order; the evaluator's
//! external-edge accounting depends on that contract.
//!
//! The SUB and OVERLAP label indices are assumed to be the next two slots
//! past the current label table. They are stored for real only when a
//! graph is compressed for good at the end of an iteration.

use fixedbitset::FixedBitSet;
use hashbrown::HashSet;
use tracing::debug;

use crate::graph::{Edge, Graph};
use crate::instance::{InstanceList, VERTEX_UNMAPPED};
use crate::label::{Label, LabelList, OVERLAP_LABEL_PREFIX, PREDEFINED_PREFIX, SUB_LABEL_PREFIX};
use crate::params::{Corpus, EvalMethod, Params};
use crate::sub::Substructure;

/// Compress `graph` by the given instances.
///
/// `labels_len` is the current label table length; the SUB label takes that
/// index and the OVERLAP label the next one.
pub fn compress_graph(
    graph: &Graph,
    instances: &InstanceList,
    allow_overlap: bool,
    labels_len: usize,
) -> Graph {
    let num_instances = instances.len();
    let mut used_v = FixedBitSet::with_capacity(graph.vertex_count());
    let mut used_e = FixedBitSet::with_capacity(graph.edge_count());
    let mut map = vec![VERTEX_UNMAPPED; graph.vertex_count()];

    // count unique structure; a shared vertex belongs to the first
    // instance that claims it
    let mut num_instance_vertices = 0;
    let mut num_instance_edges = 0;
    for (instance_no, instance) in instances.iter().enumerate() {
        let instance = instance.borrow();
        for &v in &instance.vertices {
            if !used_v.contains(v) {
                num_instance_vertices += 1;
                used_v.insert(v);
                map[v] = instance_no;
            }
        }
        for &e in &instance.edges {
            if !used_e.contains(e) {
                num_instance_edges += 1;
                used_e.insert(e);
            }
        }
    }

    let mut compressed = Graph::with_capacity(
        graph.vertex_count() - num_instance_vertices + num_instances,
        graph.edge_count() - num_instance_edges,
    );

    // one SUB vertex per instance, in instance-list order
    for _ in 0..num_instances {
        compressed.add_vertex(labels_len);
    }

    copy_unmarked(graph, &mut compressed, &used_v, &used_e, &mut map);

    if allow_overlap {
        add_overlap_edges(
            &mut compressed,
            graph,
            instances,
            labels_len + 1,
            &mut used_v,
            &used_e,
            &map,
        );
    }

    compressed
}

/// Copy every vertex and edge of `from` not claimed by an instance into
/// `to`, recording each vertex's new index in `map` and rewiring edge
/// endpoints through it.
fn copy_unmarked(
    from: &Graph,
    to: &mut Graph,
    used_v: &FixedBitSet,
    used_e: &FixedBitSet,
    map: &mut [usize],
) {
    for (v, vertex) in from.vertices().iter().enumerate() {
        if !used_v.contains(v) {
            map[v] = to.add_vertex(vertex.label);
        }
    }
    for (e, edge) in from.edges().iter().enumerate() {
        if !used_e.contains(e) {
            to.add_edge(map[edge.vertex1], map[edge.vertex2], edge.directed, edge.label);
        }
    }
}

/// Stitch overlapping instances together: one undirected OVERLAP edge per
/// overlapping pair, plus duplicates of every external edge bound to a
/// shared vertex, one per other instance sharing it.
///
/// On entry all instance vertices are marked in `used_v`; they are unmarked
/// as their sharing is resolved, so `used_v` is consumed by this pass.
fn add_overlap_edges(
    compressed: &mut Graph,
    graph: &Graph,
    instances: &InstanceList,
    overlap_label: usize,
    used_v: &mut FixedBitSet,
    used_e: &FixedBitSet,
    map: &[usize],
) {
    let mut overlap_edges: Vec<Edge> = Vec::new();
    let mut seen_pairs: HashSet<(usize, usize)> = HashSet::new();
    collect_overlap_edges(
        graph,
        instances,
        overlap_label,
        used_v,
        used_e,
        map,
        &mut overlap_edges,
        &mut seen_pairs,
    );
    for edge in overlap_edges {
        compressed.add_edge(edge.vertex1, edge.vertex2, edge.directed, edge.label);
    }
}

/// Shared enumeration behind both [`add_overlap_edges`] and
/// [`num_overlap_edges`]: walks every vertex shared between a pair of
/// instances and emits the OVERLAP edge and external-edge duplicates.
#[allow(clippy::too_many_arguments)]
fn collect_overlap_edges(
    graph: &Graph,
    instances: &InstanceList,
    overlap_label: usize,
    used_v: &mut FixedBitSet,
    used_e: &FixedBitSet,
    map: &[usize],
    overlap_edges: &mut Vec<Edge>,
    seen_pairs: &mut HashSet<(usize, usize)>,
) {
    let instance_refs: Vec<_> = instances.iter().collect();
    for (no1, instance1) in instance_refs.iter().enumerate() {
        let instance1 = instance1.borrow();
        for &v1 in &instance1.vertices {
            // still marked means not yet checked for sharing
            if !used_v.contains(v1) {
                continue;
            }
            for (no2, instance2) in instance_refs.iter().enumerate().skip(no1 + 1) {
                if !instance2.borrow().contains_vertex(v1) {
                    continue;
                }
                // overlapping pair: OVERLAP edge between their SUB
                // vertices, unless some edge already connects that pair
                if seen_pairs.insert((no1, no2)) {
                    overlap_edges.push(Edge {
                        vertex1: no1,
                        vertex2: no2,
                        label: overlap_label,
                        directed: false,
                    });
                }
                // duplicate external edges at the shared vertex for the
                // later instance
                for (e, edge) in graph.incident_edges(v1) {
                    if !used_e.contains(e) {
                        add_duplicate_edges(edge, map, used_v, no1, no2, overlap_edges, seen_pairs);
                    }
                }
            }
            used_v.set(v1, false);
        }
    }
}

/// Duplicate one external edge for the later instance of an overlapping
/// pair, following the case table for edges attached to SUB vertices.
fn add_duplicate_edges(
    edge: &Edge,
    map: &[usize],
    used_v: &FixedBitSet,
    sub1: usize,
    sub2: usize,
    overlap_edges: &mut Vec<Edge>,
    seen_pairs: &mut HashSet<(usize, usize)>,
) {
    let mut push = |v1: usize, v2: usize, label: usize, directed: bool| {
        seen_pairs.insert((v1, v2));
        overlap_edges.push(Edge {
            vertex1: v1,
            vertex2: v2,
            label,
            directed,
        });
    };

    if map[edge.vertex1] != sub1 {
        // edge from an external vertex into SUB_1
        push(map[edge.vertex1], sub2, edge.label, edge.directed);
    } else if map[edge.vertex2] != sub1 {
        // edge from SUB_1 out to an external vertex
        push(sub2, map[edge.vertex2], edge.label, edge.directed);
    } else {
        // edge connects SUB_1 to another (or the same) vertex of SUB_1
        push(sub1, sub2, edge.label, edge.directed);
        // other endpoint unmarked means it overlaps and was already
        // processed, which calls for a SUB_2 self-edge
        if !used_v.contains(edge.vertex1) || !used_v.contains(edge.vertex2) {
            push(sub2, sub2, edge.label, edge.directed);
        }
        if edge.is_self_edge() {
            push(sub2, sub2, edge.label, edge.directed);
            if edge.directed {
                push(sub2, sub1, edge.label, edge.directed);
            }
        }
    }
}

/// Size of `graph` as if compressed by `instances`, without materializing
/// the compressed graph: `|V'| + |E'|` exactly as [`compress_graph`] would
/// produce them.
pub fn size_if_compressed(graph: &Graph, instances: &InstanceList, allow_overlap: bool) -> usize {
    let mut size = graph.size();
    if !allow_overlap {
        // no overlap: instances are disjoint, so just subtract each one
        for instance in instances {
            let instance = instance.borrow();
            size += 1;
            size -= instance.vertices.len() + instance.edges.len();
        }
        return size;
    }

    let mut used_v = FixedBitSet::with_capacity(graph.vertex_count());
    let mut used_e = FixedBitSet::with_capacity(graph.edge_count());
    let mut map = vec![VERTEX_UNMAPPED; graph.vertex_count()];
    for (instance_no, instance) in instances.iter().enumerate() {
        let instance = instance.borrow();
        size += 1;
        for &v in &instance.vertices {
            if !used_v.contains(v) {
                size -= 1;
                used_v.insert(v);
                map[v] = instance_no;
            }
        }
        for &e in &instance.edges {
            if !used_e.contains(e) {
                size -= 1;
                used_e.insert(e);
            }
        }
    }
    size + num_overlap_edges(graph, instances, &mut used_v, &used_e, &map)
}

/// Number of OVERLAP and duplicate edges compression would add. Consumes
/// the vertex marks the same way the real pass does.
fn num_overlap_edges(
    graph: &Graph,
    instances: &InstanceList,
    used_v: &mut FixedBitSet,
    used_e: &FixedBitSet,
    map: &[usize],
) -> usize {
    let mut overlap_edges: Vec<Edge> = Vec::new();
    let mut seen_pairs: HashSet<(usize, usize)> = HashSet::new();
    // label index is irrelevant for counting
    collect_overlap_edges(
        graph,
        instances,
        0,
        used_v,
        used_e,
        map,
        &mut overlap_edges,
        &mut seen_pairs,
    );
    overlap_edges.len()
}

/// Compress the positive (and negative) graphs with `sub` for good:
/// replace the corpus graphs, add the `SUB_<iteration>` (and, if needed,
/// `OVERLAP_<iteration>`) labels, rebuild the label table to drop unused
/// labels, and refresh the cached description lengths.
///
/// The label rebuild is skipped for predefined substructures, whose later
/// siblings may still refer to labels the compressed graphs no longer use;
/// the caller rebuilds once after the whole predefined pass.
pub fn compress_final(
    sub: &Substructure,
    params: &Params,
    corpus: &mut Corpus,
    iteration: usize,
    predefined: bool,
) {
    let labels_len = corpus.labels.len();
    let compressed_pos = (sub.num_instances > 0).then(|| {
        compress_graph(
            &corpus.pos_graph,
            &sub.instances,
            params.allow_instance_overlap,
            labels_len,
        )
    });
    let compressed_neg = match &corpus.neg_graph {
        Some(neg) if sub.num_neg_instances > 0 => Some(compress_graph(
            neg,
            &sub.neg_instances,
            params.allow_instance_overlap,
            labels_len,
        )),
        _ => None,
    };

    let sub_label = if predefined {
        format!("{}_{}_{}", PREDEFINED_PREFIX, SUB_LABEL_PREFIX, iteration)
    } else {
        format!("{}_{}", SUB_LABEL_PREFIX, iteration)
    };
    corpus.labels.store(Label::Str(sub_label));
    if params.allow_instance_overlap
        && (sub.instances.any_pair_overlaps() || sub.neg_instances.any_pair_overlaps())
    {
        let overlap_label = if predefined {
            format!("{}_{}_{}", PREDEFINED_PREFIX, OVERLAP_LABEL_PREFIX, iteration)
        } else {
            format!("{}_{}", OVERLAP_LABEL_PREFIX, iteration)
        };
        corpus.labels.store(Label::Str(overlap_label));
    }

    if let Some(pos) = compressed_pos {
        debug!(
            vertices = pos.vertex_count(),
            edges = pos.edge_count(),
            iteration,
            "compressed positive graph"
        );
        corpus.pos_graph = pos;
    }
    if let Some(neg) = compressed_neg {
        corpus.neg_graph = Some(neg);
    }

    if !predefined {
        rebuild_label_list(corpus);
        if params.eval_method == EvalMethod::Mdl {
            corpus.recompute_description_lengths();
        }
    }
}

/// Rebuild the corpus label table to contain only labels still referenced
/// by some graph, rewriting graph label indices through the new table.
pub fn rebuild_label_list(corpus: &mut Corpus) {
    let mut new_labels = LabelList::new();
    let old_labels = &corpus.labels;
    corpus
        .pos_graph
        .translate_labels(|old| new_labels.store(old_labels.label_at(old).clone()));
    if let Some(neg) = &mut corpus.neg_graph {
        neg.translate_labels(|old| new_labels.store(old_labels.label_at(old).clone()));
    }
    corpus.labels = new_labels;
}

/// Set-cover compression: rebuild the positive graph from the examples not
/// covered by any instance of `sub`, renumbering example boundaries, then
/// rebuild the label table and refresh the description lengths.
pub fn remove_covered_examples(sub: &Substructure, params: &Params, corpus: &mut Corpus) {
    if sub.instances.is_empty() {
        return;
    }

    let pos = &corpus.pos_graph;
    let mut used_v = FixedBitSet::with_capacity(pos.vertex_count());
    let mut used_e = FixedBitSet::with_capacity(pos.edge_count());
    let mut new_starts: Vec<usize> = Vec::new();
    let mut new_num_egs = 0;
    let mut new_num_vertices = 0;

    for eg in 0..corpus.num_pos_egs {
        let start = corpus.pos_eg_starts[eg];
        let end = if eg + 1 < corpus.num_pos_egs {
            corpus.pos_eg_starts[eg + 1] - 1
        } else {
            pos.vertex_count() - 1
        };
        let covered = sub.instances.iter().any(|instance| {
            let first = instance.borrow().vertices[0];
            first >= start && first <= end
        });
        if covered {
            // mark the whole example for exclusion
            for v in start..=end {
                used_v.insert(v);
                for &e in &pos.vertex(v).edges {
                    used_e.insert(e);
                }
            }
        } else {
            new_num_egs += 1;
            new_starts.push(new_num_vertices);
            new_num_vertices += end - start + 1;
        }
    }

    let new_num_edges = (0..pos.edge_count()).filter(|&e| !used_e.contains(e)).count();
    let mut new_pos = Graph::with_capacity(new_num_vertices, new_num_edges);
    let mut map = vec![VERTEX_UNMAPPED; pos.vertex_count()];
    copy_unmarked(pos, &mut new_pos, &used_v, &used_e, &mut map);

    corpus.pos_graph = new_pos;
    corpus.pos_eg_starts = new_starts;
    corpus.num_pos_egs = new_num_egs;
    rebuild_label_list(corpus);
    if params.eval_method == EvalMethod::Mdl {
        corpus.recompute_description_lengths();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Instance;
    use crate::label::Label;

    /// Host used by the triangle tests: A1-A2, A2-A3, A1-A3, A1-B4, A2-B5.
    fn triangle_in_star() -> (LabelList, Graph) {
        let mut labels = LabelList::new();
        let a = labels.store(Label::from("A"));
        let b = labels.store(Label::from("B"));
        let on = labels.store(Label::from("e"));
        let mut g = Graph::new();
        for label in [a, a, a, b, b] {
            g.add_vertex(label);
        }
        g.add_edge(0, 1, false, on);
        g.add_edge(1, 2, false, on);
        g.add_edge(0, 2, false, on);
        g.add_edge(0, 3, false, on);
        g.add_edge(1, 4, false, on);
        (labels, g)
    }

    fn instance(vertices: &[usize], edges: &[usize]) -> Instance {
        let mut inst = Instance::new(vertices.len(), edges.len());
        inst.vertices.extend_from_slice(vertices);
        inst.edges.extend_from_slice(edges);
        inst
    }

    #[test]
    fn compression_collapses_each_instance_to_one_vertex() {
        let (labels, g) = triangle_in_star();
        let mut instances = InstanceList::new();
        instances.insert(instance(&[0, 1, 2], &[0, 1, 2]).into_ref(), false);
        let compressed = compress_graph(&g, &instances, false, labels.len());
        // |V'| = |V| - sum |V(inst)| + n
        assert_eq!(compressed.vertex_count(), 5 - 3 + 1);
        assert_eq!(compressed.edge_count(), 2);
        // SUB vertex first, carrying the next label index
        assert_eq!(compressed.vertex(0).label, labels.len());
        // both external edges are rewired to the SUB vertex
        for edge in compressed.edges() {
            assert!(edge.touches(0));
        }
    }

    #[test]
    fn size_if_compressed_matches_real_compression() {
        let (labels, g) = triangle_in_star();
        let mut instances = InstanceList::new();
        instances.insert(instance(&[0, 1, 2], &[0, 1, 2]).into_ref(), false);
        let compressed = compress_graph(&g, &instances, false, labels.len());
        assert_eq!(size_if_compressed(&g, &instances, false), compressed.size());
    }

    /// A-B-A-B-A chain with the two overlapping A-B-A instances.
    fn overlapping_chain() -> (LabelList, Graph, InstanceList) {
        let mut labels = LabelList::new();
        let a = labels.store(Label::from("A"));
        let b = labels.store(Label::from("B"));
        let on = labels.store(Label::from("e"));
        let mut g = Graph::new();
        for label in [a, b, a, b, a] {
            g.add_vertex(label);
        }
        g.add_edge(0, 1, false, on);
        g.add_edge(1, 2, false, on);
        g.add_edge(2, 3, false, on);
        g.add_edge(3, 4, false, on);
        let mut instances = InstanceList::new();
        // newest-first list: insert the later instance first so iteration
        // order is {0,1,2} then {2,3,4}
        instances.insert(instance(&[2, 3, 4], &[2, 3]).into_ref(), false);
        instances.insert(instance(&[0, 1, 2], &[0, 1]).into_ref(), false);
        (labels, g, instances)
    }

    #[test]
    fn overlap_adds_one_overlap_edge_per_pair() {
        let (labels, g, instances) = overlapping_chain();
        let compressed = compress_graph(&g, &instances, true, labels.len());
        // the two instances cover everything: two SUB vertices remain
        assert_eq!(compressed.vertex_count(), 2);
        // exactly one undirected OVERLAP edge between the SUB vertices
        let overlap_edges: Vec<_> = compressed
            .edges()
            .iter()
            .filter(|e| e.label == labels.len() + 1)
            .collect();
        assert_eq!(overlap_edges.len(), 1);
        assert!(!overlap_edges[0].directed);
        assert_eq!(
            (overlap_edges[0].vertex1, overlap_edges[0].vertex2),
            (0, 1)
        );
    }

    #[test]
    fn overlap_size_estimate_matches_real_compression() {
        let (labels, g, instances) = overlapping_chain();
        let compressed = compress_graph(&g, &instances, true, labels.len());
        assert_eq!(size_if_compressed(&g, &instances, true), compressed.size());
    }

    #[test]
    fn shared_vertices_are_counted_once() {
        let (labels, g, instances) = overlapping_chain();
        let compressed = compress_graph(&g, &instances, true, labels.len());
        // 5 vertices, 5 unique instance vertices (2 shared once), 2 SUBs
        assert_eq!(compressed.vertex_count(), 5 - 5 + 2);
    }
}
