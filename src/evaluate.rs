//! Substructure evaluation.
//!
//! Three competing objectives share one primitive, "compress this graph
//! with this substructure": minimum description length (the default),
//! plain vertices-plus-edges size, and set cover over examples. MDL and
//! size reward substructures whose replacement shrinks the positive graph
//! (and fails to shrink the negative graph); set cover ignores compression
//! quality and counts covered examples instead.

use std::cell::RefCell;

use fixedbitset::FixedBitSet;

use crate::compress::{compress_graph, size_if_compressed};
use crate::graph::Graph;
use crate::instance::InstanceList;
use crate::params::{Corpus, EvalMethod, Params};
use crate::sub::Substructure;

/// Memoized `lg(k!)` table, grown on demand.
///
/// The table owns its buffer behind a `RefCell` so scoring can stay a
/// read-only affair for everyone holding the corpus.
#[derive(Debug)]
pub struct Log2Cache {
    table: RefCell<Vec<f64>>,
}

impl Default for Log2Cache {
    fn default() -> Log2Cache {
        Log2Cache::new()
    }
}

impl Log2Cache {
    pub fn new() -> Log2Cache {
        Log2Cache {
            // lg(0!) and lg(1!)
            table: RefCell::new(vec![0.0, 0.0]),
        }
    }

    /// `lg(n!)`, extending the cache as needed.
    pub fn log2_factorial(&self, n: usize) -> f64 {
        let mut table = self.table.borrow_mut();
        while table.len() <= n {
            let next = log2(table.len()) + table[table.len() - 1];
            table.push(next);
        }
        table[n]
    }

    /// `lg C(n, k)` via the cached factorials.
    pub fn log2_binomial(&self, n: usize, k: usize) -> f64 {
        self.log2_factorial(n) - self.log2_factorial(k) - self.log2_factorial(n - k)
    }
}

/// Log base 2, with `lg(0) = 0` by convention.
pub fn log2(n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        (n as f64).log2()
    }
}

/// Set `sub.value` (and its example counts) according to the configured
/// evaluation method. Scoring is pure: the same substructure against the
/// same corpus always produces the same value.
pub fn evaluate_sub(sub: &mut Substructure, params: &Params, corpus: &Corpus) {
    sub.num_examples = examples_covered(
        &sub.instances,
        &corpus.pos_graph,
        corpus.num_pos_egs,
        &corpus.pos_eg_starts,
    );
    sub.num_neg_examples = match &corpus.neg_graph {
        Some(neg) => examples_covered(
            &sub.neg_instances,
            neg,
            corpus.num_neg_egs,
            &corpus.neg_eg_starts,
        ),
        None => 0,
    };

    // a recursive substructure is scored through a derived view of its
    // pattern with the recursive self-edge attached
    let augmented;
    let definition = match sub.recursive_edge_label.filter(|_| sub.recursive) {
        Some(label) => {
            let mut graph = sub.definition.clone();
            graph.add_edge(0, 0, true, label);
            augmented = graph;
            &augmented
        }
        None => &sub.definition,
    };

    sub.value = match params.eval_method {
        EvalMethod::Mdl => mdl_value(sub, definition, params, corpus),
        EvalMethod::Size => size_value(sub, definition, params, corpus),
        EvalMethod::SetCover => {
            let covered = sub.num_examples + (corpus.num_neg_egs - sub.num_neg_examples);
            covered as f64 / (corpus.num_pos_egs + corpus.num_neg_egs) as f64
        }
    };
}

fn mdl_value(sub: &Substructure, definition: &Graph, params: &Params, corpus: &Corpus) -> f64 {
    let mut num_labels = corpus.labels.len();
    let size_of_sub = mdl(definition, num_labels, &corpus.log2);

    let compressed_pos = compress_graph(
        &corpus.pos_graph,
        &sub.instances,
        params.allow_instance_overlap,
        corpus.labels.len(),
    );
    num_labels += 1; // the new SUB vertex label
    if params.allow_instance_overlap
        && (sub.instances.any_pair_overlaps() || sub.neg_instances.any_pair_overlaps())
    {
        num_labels += 1; // the new OVERLAP edge label
    }
    let compressed_pos_dl = mdl(&compressed_pos, num_labels, &corpus.log2)
        + external_edge_bits(&compressed_pos, definition, sub.instances.len());

    match &corpus.neg_graph {
        None => corpus.pos_graph_dl / (size_of_sub + compressed_pos_dl),
        Some(neg) => {
            let compressed_neg = compress_graph(
                neg,
                &sub.neg_instances,
                params.allow_instance_overlap,
                corpus.labels.len(),
            );
            let compressed_neg_dl = mdl(&compressed_neg, num_labels, &corpus.log2)
                + external_edge_bits(&compressed_neg, definition, sub.neg_instances.len());
            (corpus.pos_graph_dl + corpus.neg_graph_dl)
                / (size_of_sub + compressed_pos_dl + corpus.neg_graph_dl - compressed_neg_dl)
        }
    }
}

fn size_value(sub: &Substructure, definition: &Graph, params: &Params, corpus: &Corpus) -> f64 {
    let size_of_sub = definition.size() as f64;
    let size_of_pos = corpus.pos_graph.size() as f64;
    let compressed_pos = size_if_compressed(
        &corpus.pos_graph,
        &sub.instances,
        params.allow_instance_overlap,
    ) as f64;
    match &corpus.neg_graph {
        None => size_of_pos / (size_of_sub + compressed_pos),
        Some(neg) => {
            let size_of_neg = neg.size() as f64;
            let compressed_neg =
                size_if_compressed(neg, &sub.neg_instances, params.allow_instance_overlap) as f64;
            (size_of_pos + size_of_neg)
                / (size_of_sub + compressed_pos + size_of_neg - compressed_neg)
        }
    }
}

/// Description length of `graph` in bits, choosing labels out of
/// `num_labels`:
///
/// ```text
/// V(1 + lg L) + (V+1) lg(B+1) + sum_i lg C(V, k_i) + E(1 + lg L) + (K+1) lg M
/// ```
///
/// where `k_i` counts vertex `i`'s distinct neighbors (undirected edges
/// toward the higher-numbered endpoint only), `B = max k_i`, `K = sum k_i`,
/// and `M` is the largest parallel-edge multiplicity between any two
/// vertices.
pub fn mdl(graph: &Graph, num_labels: usize, cache: &Log2Cache) -> f64 {
    let v = graph.vertex_count();
    let e = graph.edge_count();
    let lg_labels = log2(num_labels);

    let vertex_bits = v as f64 * (1.0 + lg_labels);
    let mut edge_bits = e as f64 * (1.0 + lg_labels);

    let mut row_bits = 0.0;
    let mut b = 0; // max row count
    let mut k = 0; // total row count
    let mut m = 0; // max parallel edges between two vertices
    let mut neighbor_marks = FixedBitSet::with_capacity(v);
    for v1 in 0..v {
        let ki = num_unique_edges(graph, v1, &mut neighbor_marks);
        row_bits += cache.log2_binomial(v, ki);
        b = b.max(ki);
        k += ki;
        m = m.max(max_edges_to_single_vertex(graph, v1));
    }
    row_bits += (v + 1) as f64 * log2(b + 1);
    edge_bits += (k + 1) as f64 * log2(m);

    vertex_bits + row_bits + edge_bits
}

/// Number of distinct vertices that `v1` has an edge toward. Undirected
/// edges count only toward the larger-numbered endpoint (or self), so each
/// adjacency-matrix entry is counted once overall.
fn num_unique_edges(graph: &Graph, v1: usize, marks: &mut FixedBitSet) -> usize {
    let mut count = 0;
    for (_, edge) in graph.incident_edges(v1) {
        let v2 = edge.other_endpoint(v1);
        let outward = (edge.directed && edge.vertex1 == v1) || (!edge.directed && v2 >= v1);
        if outward && !marks.contains(v2) {
            count += 1;
            marks.insert(v2);
        }
    }
    for (_, edge) in graph.incident_edges(v1) {
        marks.set(edge.vertex1, false);
        marks.set(edge.vertex2, false);
    }
    count
}

/// Largest number of outward edges from `v1` to any single vertex.
fn max_edges_to_single_vertex(graph: &Graph, v1: usize) -> usize {
    let incident = &graph.vertex(v1).edges;
    let mut max_edges = 0;
    for (i, &e1) in incident.iter().enumerate() {
        let edge1 = graph.edge(e1);
        let v2 = edge1.other_endpoint(v1);
        let outward = (edge1.directed && edge1.vertex1 == v1) || (!edge1.directed && v2 >= v1);
        if !outward {
            continue;
        }
        let mut count = 1;
        for &e2 in &incident[i + 1..] {
            let edge2 = graph.edge(e2);
            if edge2.other_endpoint(v1) == v2
                && ((edge2.directed && edge2.vertex1 == v1) || (!edge2.directed && v2 >= v1))
            {
                count += 1;
            }
        }
        max_edges = max_edges.max(count);
    }
    max_edges
}

/// Bits needed to say which pattern vertex each edge incident to a SUB
/// vertex attaches to: `lg |V(pattern)|` per edge end, twice for
/// self-edges. Compression discards this information, so MDL has to pay
/// for it to stay quasi-lossless.
///
/// Relies on the SUB vertices being the first `num_instances` vertices of
/// the compressed graph.
pub fn external_edge_bits(compressed: &Graph, pattern: &Graph, num_instances: usize) -> f64 {
    let lg_sub_vertices = log2(pattern.vertex_count());
    let mut bits = 0.0;
    for v in 0..num_instances {
        for (_, edge) in compressed.incident_edges(v) {
            bits += lg_sub_vertices;
            if edge.is_self_edge() {
                bits += lg_sub_vertices;
            }
        }
    }
    bits
}

/// Number of examples containing at least one instance. An instance
/// belongs to the example whose vertex range holds its first vertex;
/// instances never span example boundaries.
pub fn examples_covered(
    instances: &InstanceList,
    graph: &Graph,
    num_egs: usize,
    eg_starts: &[usize],
) -> usize {
    let mut covered = 0;
    for eg in 0..num_egs {
        let start = eg_starts[eg];
        let end = if eg + 1 < num_egs {
            eg_starts[eg + 1] - 1
        } else {
            graph.vertex_count() - 1
        };
        let found = instances.iter().any(|instance| {
            let instance = instance.borrow();
            let first = instance.vertices[0];
            let in_range = first >= start && first <= end;
            if in_range {
                debug_assert!(
                    *instance.vertices.last().unwrap() <= end,
                    "instance spans example boundaries"
                );
            }
            in_range
        });
        if found {
            covered += 1;
        }
    }
    covered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Instance;
    use crate::label::{Label, LabelList};

    #[test]
    fn log2_factorial_cache_grows_on_demand() {
        let cache = Log2Cache::new();
        assert_eq!(cache.log2_factorial(0), 0.0);
        assert_eq!(cache.log2_factorial(1), 0.0);
        let lg24 = cache.log2_factorial(4);
        assert!((lg24 - 24f64.log2()).abs() < 1e-9);
        // binomial: C(5, 2) = 10
        assert!((cache.log2_binomial(5, 2) - 10f64.log2()).abs() < 1e-9);
    }

    #[test]
    fn mdl_of_single_labeled_vertex() {
        let cache = Log2Cache::new();
        let mut g = Graph::new();
        g.add_vertex(0);
        // V=1, E=0, k_0=0, B=0, K=0, M=0:
        // 1*(1+lg L) + 2*lg 1 + lg C(1,0) + 0 + 1*lg 0 = 1 + lg L
        let bits = mdl(&g, 2, &cache);
        assert!((bits - 2.0).abs() < 1e-9);
    }

    #[test]
    fn mdl_counts_undirected_edges_once() {
        let cache = Log2Cache::new();
        let mut g = Graph::new();
        g.add_vertex(0);
        g.add_vertex(0);
        g.add_edge(0, 1, false, 1);
        // V=2, E=1, L=2: k_0=1 (toward higher endpoint), k_1=0, B=1, K=1, M=1
        // vertex: 2*(1+1)=4; rows: 3*lg 2 + lg C(2,1) + lg C(2,0) = 3 + 1
        // edges: 1*(1+1) + 2*lg 1 = 2
        let bits = mdl(&g, 2, &cache);
        assert!((bits - 10.0).abs() < 1e-9, "got {bits}");
    }

    #[test]
    fn scoring_is_pure() {
        let mut labels = LabelList::new();
        let a = labels.store(Label::from("A"));
        let on = labels.store(Label::from("e"));
        let mut g = Graph::new();
        g.add_vertex(a);
        g.add_vertex(a);
        g.add_edge(0, 1, false, on);
        let mut corpus = Corpus {
            labels,
            pos_graph: g,
            num_pos_egs: 1,
            pos_eg_starts: vec![0],
            ..Corpus::default()
        };
        corpus.recompute_description_lengths();

        let mut pattern = Graph::new();
        pattern.add_vertex(a);
        let mut sub = Substructure::new(pattern);
        for v in [1, 0] {
            sub.instances.insert(Instance::single_vertex(v).into_ref(), false);
            sub.num_instances += 1;
        }

        let params = Params::default();
        evaluate_sub(&mut sub, &params, &corpus);
        let first = sub.value;
        evaluate_sub(&mut sub, &params, &corpus);
        assert_eq!(sub.value, first);
    }

    #[test]
    fn set_cover_counts_examples_not_instances() {
        let mut labels = LabelList::new();
        let a = labels.store(Label::from("A"));
        // two examples of two A vertices each
        let mut g = Graph::new();
        for _ in 0..4 {
            g.add_vertex(a);
        }
        let mut corpus = Corpus {
            labels,
            pos_graph: g,
            num_pos_egs: 2,
            pos_eg_starts: vec![0, 2],
            ..Corpus::default()
        };
        corpus.recompute_description_lengths();

        let mut pattern = Graph::new();
        pattern.add_vertex(a);
        let mut sub = Substructure::new(pattern);
        for v in [3, 2, 1, 0] {
            sub.instances.insert(Instance::single_vertex(v).into_ref(), false);
            sub.num_instances += 1;
        }
        let params = Params {
            eval_method: EvalMethod::SetCover,
            ..Params::default()
        };
        evaluate_sub(&mut sub, &params, &corpus);
        assert_eq!(sub.num_examples, 2);
        assert_eq!(sub.value, 1.0);
    }
}
