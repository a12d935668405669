//! Subgraph finder: locating every instance of a pattern in a host graph.
//!
//! The finder mimics the discovery loop in miniature. It seeds with every
//! host vertex matching the pattern's first vertex, then walks the
//! pattern's edges in BFS order (any vertex reached by a consumed edge
//! becomes eligible), extending each partial instance by every host edge
//! with matching label, directedness, and endpoint labels. Once all
//! pattern edges are consumed, candidates are filtered through the full
//! matcher at the configured threshold, and through the overlap rule.
//!
//! Equivalent to the NP-hard subgraph isomorphism problem, so it can be
//! slow on adversarial inputs; it is tuned for small patterns in large
//! hosts.

use fixedbitset::FixedBitSet;
use tracing::trace;

use crate::extend::create_extended_instance;
use crate::graph::{Edge, Graph};
use crate::instance::{Instance, InstanceList};
use crate::params::Params;

/// Find all instances of `pattern` in `host`, filtered for match threshold
/// and (unless overlap is allowed) vertex-disjointness. May be empty.
pub fn find_instances(pattern: &Graph, host: &Graph, params: &Params) -> InstanceList {
    let mut reached = FixedBitSet::with_capacity(pattern.vertex_count());
    let mut used_v = FixedBitSet::with_capacity(pattern.vertex_count());
    let mut used_e = FixedBitSet::with_capacity(pattern.edge_count());

    reached.insert(0);
    let mut instances = find_single_vertex_instances(host, pattern.vertex(0).label);
    let mut no_matches = instances.is_empty();

    let mut current = Some(0);
    while let (Some(v1), false) = (current, no_matches) {
        used_v.insert(v1);
        // extend by each unconsumed pattern edge at v1
        for &e1 in &pattern.vertex(v1).edges {
            if used_e.contains(e1) {
                continue;
            }
            let edge1 = pattern.edge(e1);
            reached.insert(edge1.vertex1);
            reached.insert(edge1.vertex2);
            instances = extend_instances_by_edge(instances, pattern, edge1, host);
            if instances.is_empty() {
                no_matches = true;
                break;
            }
            used_e.insert(e1);
        }
        // next unconsumed vertex already reached by a consumed edge
        current = (0..pattern.vertex_count()).find(|&v| !used_v.contains(v) && reached.contains(v));
    }

    trace!(
        candidates = instances.len(),
        pattern_vertices = pattern.vertex_count(),
        "filtering subgraph candidates"
    );
    filter_instances(pattern, instances, host, params)
}

/// One single-vertex instance per host vertex carrying the wanted label.
fn find_single_vertex_instances(host: &Graph, label: usize) -> InstanceList {
    let mut instances = InstanceList::new();
    for v in 0..host.vertex_count() {
        if host.vertex(v).label == label {
            let mut instance = Instance::single_vertex(v);
            instance.min_match_cost = 0.0;
            instances.insert(instance.into_ref(), false);
        }
    }
    instances
}

/// Extend every instance by one host edge matching `edge1`'s attributes.
/// The input list is consumed; the result holds only the extensions.
fn extend_instances_by_edge(
    instances: InstanceList,
    pattern: &Graph,
    edge1: &Edge,
    host: &Graph,
) -> InstanceList {
    let mut extended = InstanceList::new();
    let mut marks = FixedBitSet::with_capacity(host.edge_count());
    for instance in &instances {
        {
            let inst = instance.borrow();
            for &e in &inst.edges {
                marks.insert(e);
            }
        }
        let vertices = instance.borrow().vertices.clone();
        for v in vertices {
            for (e2, edge2) in host.incident_edges(v) {
                if !marks.contains(e2) && edges_match(pattern, edge1, host, edge2) {
                    extended.insert(create_extended_instance(instance, v, e2, host).into_ref(), true);
                }
            }
        }
        let inst = instance.borrow();
        for &e in &inst.edges {
            marks.set(e, false);
        }
    }
    extended
}

/// Edges match when their labels, directedness, and endpoint vertex labels
/// all agree; undirected edges may also match with endpoints swapped.
fn edges_match(g1: &Graph, edge1: &Edge, g2: &Graph, edge2: &Edge) -> bool {
    if edge1.label != edge2.label || edge1.directed != edge2.directed {
        return false;
    }
    let v11 = g1.vertex(edge1.vertex1).label;
    let v12 = g1.vertex(edge1.vertex2).label;
    let v21 = g2.vertex(edge2.vertex1).label;
    let v22 = g2.vertex(edge2.vertex2).label;
    (v11 == v21 && v12 == v22) || (!edge1.directed && v11 == v22 && v12 == v21)
}

/// Keep only candidates whose induced subgraph matches the pattern within
/// the fractional budget, recording the best cost seen on each instance.
/// With overlap disallowed an instance is admitted only if it shares no
/// vertex with an already-admitted one.
fn filter_instances(
    pattern: &Graph,
    instances: InstanceList,
    host: &Graph,
    params: &Params,
) -> InstanceList {
    let matcher = params.matcher();
    let mut filtered = InstanceList::new();
    for instance in &instances {
        let keep = {
            let inst = instance.borrow();
            if !params.allow_instance_overlap && filtered.overlaps(&inst) {
                None
            } else {
                let threshold_limit =
                    params.threshold * (inst.vertices.len() + inst.edges.len()) as f64;
                let instance_graph = inst.to_graph(host);
                matcher
                    .graph_match(pattern, &instance_graph, threshold_limit)
                    .map(|result| result.cost)
            }
        };
        if let Some(cost) = keep {
            let mut inst = instance.borrow_mut();
            if cost < inst.min_match_cost {
                inst.min_match_cost = cost;
            }
            drop(inst);
            filtered.insert(instance.clone(), false);
        }
    }
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::{Label, LabelList};

    /// 5 vertices A,A,A,B,B; undirected edges A1-A2, A2-A3, A1-A3, A1-B4,
    /// A2-B5.
    fn triangle_in_star() -> (LabelList, Graph) {
        let mut labels = LabelList::new();
        let a = labels.store(Label::from("A"));
        let b = labels.store(Label::from("B"));
        let e = labels.store(Label::from("e"));
        let mut g = Graph::new();
        for label in [a, a, a, b, b] {
            g.add_vertex(label);
        }
        g.add_edge(0, 1, false, e);
        g.add_edge(1, 2, false, e);
        g.add_edge(0, 2, false, e);
        g.add_edge(0, 3, false, e);
        g.add_edge(1, 4, false, e);
        (labels, g)
    }

    fn triangle_pattern(labels: &mut LabelList) -> Graph {
        let a = labels.store(Label::from("A"));
        let e = labels.store(Label::from("e"));
        let mut p = Graph::new();
        for _ in 0..3 {
            p.add_vertex(a);
        }
        p.add_edge(0, 1, false, e);
        p.add_edge(1, 2, false, e);
        p.add_edge(0, 2, false, e);
        p
    }

    #[test]
    fn triangle_in_star_has_exactly_one_instance() {
        let (mut labels, host) = triangle_in_star();
        let pattern = triangle_pattern(&mut labels);
        let params = Params::default();
        let instances = find_instances(&pattern, &host, &params);
        assert_eq!(instances.len(), 1);
        let instance = instances.first().unwrap().borrow();
        assert_eq!(instance.vertices, vec![0, 1, 2]);
        assert_eq!(instance.min_match_cost, 0.0);
    }

    #[test]
    fn missing_pattern_yields_empty_list() {
        let (mut labels, host) = triangle_in_star();
        let c = labels.store(Label::from("C"));
        let e = labels.store(Label::from("e"));
        let mut pattern = Graph::new();
        pattern.add_vertex(c);
        pattern.add_vertex(c);
        pattern.add_edge(0, 1, false, e);
        let params = Params::default();
        assert!(find_instances(&pattern, &host, &params).is_empty());
    }

    #[test]
    fn overlap_flag_controls_second_instance() {
        // A-B-A-B-A chain; pattern A-B-A
        let mut labels = LabelList::new();
        let a = labels.store(Label::from("A"));
        let b = labels.store(Label::from("B"));
        let e = labels.store(Label::from("e"));
        let mut host = Graph::new();
        for label in [a, b, a, b, a] {
            host.add_vertex(label);
        }
        for (v1, v2) in [(0, 1), (1, 2), (2, 3), (3, 4)] {
            host.add_edge(v1, v2, false, e);
        }
        let mut pattern = Graph::new();
        for label in [a, b, a] {
            pattern.add_vertex(label);
        }
        pattern.add_edge(0, 1, false, e);
        pattern.add_edge(1, 2, false, e);

        let exclusive = Params::default();
        assert_eq!(find_instances(&pattern, &host, &exclusive).len(), 1);

        let overlapping = Params {
            allow_instance_overlap: true,
            ..Params::default()
        };
        assert_eq!(find_instances(&pattern, &host, &overlapping).len(), 2);
    }

    #[test]
    fn directed_edges_do_not_match_reversed() {
        let mut labels = LabelList::new();
        let a = labels.store(Label::from("A"));
        let b = labels.store(Label::from("B"));
        let e = labels.store(Label::from("e"));
        let mut host = Graph::new();
        host.add_vertex(a);
        host.add_vertex(b);
        host.add_edge(1, 0, true, e);
        let mut pattern = Graph::new();
        pattern.add_vertex(a);
        pattern.add_vertex(b);
        pattern.add_edge(0, 1, true, e);
        let params = Params::default();
        assert!(find_instances(&pattern, &host, &params).is_empty());
    }
}
