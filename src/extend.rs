//! Extension strategy: growing substructures one edge at a time.
//!
//! Every positive instance of a substructure is extended by each incident
//! unconsumed edge (adding a new vertex when the edge leads outside the
//! instance). Extensions whose pattern graphs are isomorphic collapse into
//! one candidate substructure collecting all matching instances; at
//! threshold zero the per-instance match is the new-edge fast path rather
//! than a full graph match.

use std::rc::Rc;

use fixedbitset::FixedBitSet;
use tracing::trace;

use crate::evaluate::evaluate_sub;
use crate::graph::Graph;
use crate::instance::{Instance, InstanceList, InstanceRef, VertexMap, VERTEX_UNMAPPED};
use crate::params::{Corpus, Params};
use crate::sub::Substructure;

/// All single-edge extensions of `sub`, grouped into new candidate
/// substructures with their positive (and negative) instances collected.
pub fn extend_sub(sub: &Substructure, params: &Params, corpus: &Corpus) -> Vec<Substructure> {
    let matcher = params.matcher();
    let new_instances = extend_instances(&sub.instances, &corpus.pos_graph);
    let new_neg_instances = corpus
        .neg_graph
        .as_ref()
        .map(|neg| extend_instances(&sub.neg_instances, neg));

    let mut extended: Vec<Substructure> = Vec::new();
    for (index, new_instance) in new_instances.iter().enumerate() {
        // a zero-cost instance was already claimed by an earlier extension,
        // so a substructure seeded from it would be a duplicate
        if new_instance.borrow().min_match_cost == 0.0 {
            continue;
        }
        let mut new_sub = {
            let inst = new_instance.borrow();
            Substructure::new(inst.to_graph(&corpus.pos_graph))
        };
        if extended.iter().any(|s| {
            matcher
                .graph_match(&new_sub.definition, &s.definition, 0.0)
                .is_some()
        }) {
            continue;
        }
        add_pos_instances_to_sub(
            &mut new_sub,
            new_instance,
            &new_instances,
            index,
            params,
            corpus,
        );
        if let Some(neg_list) = &new_neg_instances {
            add_neg_instances_to_sub(&mut new_sub, new_instance, neg_list, params, corpus);
        }
        extended.insert(0, new_sub);
    }
    trace!(extensions = extended.len(), "extended substructure");
    extended
}

/// Extend every instance by one edge in all possible ways.
pub fn extend_instances(instances: &InstanceList, graph: &Graph) -> InstanceList {
    let mut extended = InstanceList::new();
    let mut marks = FixedBitSet::with_capacity(graph.edge_count());
    for instance in instances {
        {
            let inst = instance.borrow();
            for &e in &inst.edges {
                marks.insert(e);
            }
        }
        let vertices = instance.borrow().vertices.clone();
        for v in vertices {
            for &e in &graph.vertex(v).edges {
                if !marks.contains(e) {
                    extended.insert(create_extended_instance(instance, v, e, graph).into_ref(), true);
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

/// Copy `parent` extended by edge `e` along vertex `v`, which may bring in
/// one new vertex. Vertex and edge arrays stay sorted, and the mapping
/// rows shift with the insertion so the new-edge endpoints stay tracked.
pub fn create_extended_instance(
    parent: &InstanceRef,
    v: usize,
    e: usize,
    graph: &Graph,
) -> Instance {
    let p = parent.borrow();
    let edge = graph.edge(e);
    let v2 = if edge.vertex1 == v { edge.vertex2 } else { edge.vertex1 };
    let adds_vertex = !p.vertices.contains(&v2);

    let mut instance = Instance::new(
        p.vertices.len() + usize::from(adds_vertex),
        p.edges.len() + 1,
    );
    instance.parent = Some(Rc::clone(parent));
    instance.vertices.extend_from_slice(&p.vertices);
    instance.mapping.extend_from_slice(&p.mapping);
    for (i, row) in instance.mapping.iter().enumerate() {
        if row.v2 == edge.vertex2 {
            instance.mapping_index2 = i;
        }
        if row.v2 == edge.vertex1 {
            instance.mapping_index1 = i;
        }
    }

    if adds_vertex {
        instance.vertices.push(0);
        instance.mapping.push(VertexMap {
            v1: 0,
            v2: VERTEX_UNMAPPED,
        });
        let mut i = p.vertices.len();
        while i > 0 && v2 < instance.vertices[i - 1] {
            instance.vertices[i] = instance.vertices[i - 1];
            instance.mapping[i].v1 = i;
            instance.mapping[i].v2 = instance.mapping[i - 1].v2;
            if instance.mapping[i].v2 == edge.vertex2 {
                instance.mapping_index2 = i;
            }
            if instance.mapping[i].v2 == edge.vertex1 {
                instance.mapping_index1 = i;
            }
            i -= 1;
        }
        instance.vertices[i] = v2;
        instance.new_vertex = Some(i);
        instance.mapping[i] = VertexMap { v1: i, v2 };
        if v2 == edge.vertex2 {
            instance.mapping_index2 = i;
        }
        if v2 == edge.vertex1 {
            instance.mapping_index1 = i;
        }
    }

    instance.edges.extend_from_slice(&p.edges);
    instance.edges.push(0);
    let mut i = p.edges.len();
    while i > 0 && e < instance.edges[i - 1] {
        instance.edges[i] = instance.edges[i - 1];
        i -= 1;
    }
    instance.edges[i] = e;
    instance.new_edge = i;

    instance
}

/// Collect into `sub` the positive instances matching its definition. The
/// defining instance goes on first; candidates are admitted through the
/// overlap rule and either the new-edge fast path (threshold zero) or a
/// full graph match within the fractional budget.
fn add_pos_instances_to_sub(
    sub: &mut Substructure,
    sub_instance: &InstanceRef,
    instances: &InstanceList,
    index: usize,
    params: &Params,
    corpus: &Corpus,
) {
    let matcher = params.matcher();
    sub_instance.borrow_mut().used = true;
    sub.instances.insert(Rc::clone(sub_instance), false);
    sub.num_instances += 1;

    for (counter, instance) in instances.iter().enumerate() {
        let (threshold_limit, instance_graph, already_used) = {
            let inst = instance.borrow();
            if !params.allow_instance_overlap && sub.instances.overlaps(&inst) {
                continue;
            }
            let limit = params.threshold * (inst.vertices.len() + inst.edges.len()) as f64;
            (limit, inst.to_graph(&corpus.pos_graph), inst.used)
        };
        if params.threshold == 0.0 {
            // entries before the defining instance were compared on an
            // earlier extension's turn; entries claimed by another
            // substructure are spoken for
            if counter > index && !already_used {
                if let Some(cost) = matcher.new_edge_match(
                    &sub.definition,
                    sub_instance,
                    &instance_graph,
                    instance,
                    threshold_limit,
                ) {
                    let mut inst = instance.borrow_mut();
                    if cost < inst.min_match_cost {
                        inst.min_match_cost = cost;
                    }
                    inst.used = true;
                    drop(inst);
                    sub.instances.insert(Rc::clone(instance), false);
                    sub.num_instances += 1;
                }
            }
        } else if !Rc::ptr_eq(instance, sub_instance) {
            if let Some(result) = matcher.graph_match(&sub.definition, &instance_graph, threshold_limit)
            {
                let mut inst = instance.borrow_mut();
                if result.cost < inst.min_match_cost {
                    inst.min_match_cost = result.cost;
                }
                drop(inst);
                sub.instances.insert(Rc::clone(instance), false);
                sub.num_instances += 1;
            }
        }
    }
}

/// Negative-graph counterpart of [`add_pos_instances_to_sub`]; there is no
/// defining instance on the negative side.
fn add_neg_instances_to_sub(
    sub: &mut Substructure,
    sub_instance: &InstanceRef,
    instances: &InstanceList,
    params: &Params,
    corpus: &Corpus,
) {
    let Some(neg_graph) = &corpus.neg_graph else {
        return;
    };
    let matcher = params.matcher();
    for instance in instances {
        let (threshold_limit, instance_graph, already_used) = {
            let inst = instance.borrow();
            if !params.allow_instance_overlap && sub.neg_instances.overlaps(&inst) {
                continue;
            }
            let limit = params.threshold * (inst.vertices.len() + inst.edges.len()) as f64;
            (limit, inst.to_graph(neg_graph), inst.used)
        };
        if params.threshold == 0.0 {
            if !already_used {
                if let Some(cost) = matcher.new_edge_match(
                    &sub.definition,
                    sub_instance,
                    &instance_graph,
                    instance,
                    threshold_limit,
                ) {
                    let mut inst = instance.borrow_mut();
                    if cost < inst.min_match_cost {
                        inst.min_match_cost = cost;
                    }
                    inst.used = true;
                    drop(inst);
                    sub.neg_instances.insert(Rc::clone(instance), false);
                    sub.num_neg_instances += 1;
                }
            }
        } else if let Some(result) =
            matcher.graph_match(&sub.definition, &instance_graph, threshold_limit)
        {
            let mut inst = instance.borrow_mut();
            if result.cost < inst.min_match_cost {
                inst.min_match_cost = result.cost;
            }
            drop(inst);
            sub.neg_instances.insert(Rc::clone(instance), false);
            sub.num_neg_instances += 1;
        }
    }
}

/// Try to turn `sub` into a recursive substructure: possible when two or
/// more instances are connected by a same-labeled edge. One variant is
/// built per distinct connecting label; only the best-valued one is
/// returned.
pub fn recursify_sub(sub: &Substructure, params: &Params, corpus: &Corpus) -> Option<Substructure> {
    let graph = &corpus.pos_graph;
    let mut label_tried = FixedBitSet::with_capacity(corpus.labels.len());
    let mut edge_marks = FixedBitSet::with_capacity(graph.edge_count());
    for instance in &sub.instances {
        for &e in &instance.borrow().edges {
            edge_marks.insert(e);
        }
    }

    let instance_refs: Vec<_> = sub.instances.iter().collect();
    let mut best: Option<Substructure> = None;
    for (i1, instance1) in instance_refs.iter().enumerate() {
        let vertices = instance1.borrow().vertices.clone();
        for hv in vertices {
            for (e, edge) in graph.incident_edges(hv) {
                if edge_marks.contains(e) || label_tried.contains(edge.label) {
                    continue;
                }
                let v2 = if edge.vertex2 == hv { edge.vertex1 } else { edge.vertex2 };
                let found_pair = instance_refs[i1 + 1..]
                    .iter()
                    .any(|other| other.borrow().contains_vertex(v2));
                if found_pair {
                    label_tried.insert(edge.label);
                    let candidate = make_recursive_sub(sub, edge.label, &edge_marks, params, corpus);
                    best = match best {
                        Some(current) if current.value >= candidate.value => Some(current),
                        _ => Some(candidate),
                    };
                }
            }
        }
    }
    best
}

/// Build and evaluate the recursive variant of `sub` chained by
/// `edge_label`. Instances connected by such an edge merge into one
/// recursive instance.
fn make_recursive_sub(
    sub: &Substructure,
    edge_label: usize,
    edge_marks: &FixedBitSet,
    params: &Params,
    corpus: &Corpus,
) -> Substructure {
    let mut recursive = Substructure::new(sub.definition.clone());
    recursive.recursive = true;
    recursive.recursive_edge_label = Some(edge_label);
    recursive.instances =
        recursive_instances(&corpus.pos_graph, &sub.instances, edge_label, edge_marks);
    recursive.num_instances = recursive.instances.len();
    if let Some(neg_graph) = &corpus.neg_graph {
        // negative instance edges carry no marks at this point
        let no_marks = FixedBitSet::with_capacity(neg_graph.edge_count());
        recursive.neg_instances =
            recursive_instances(neg_graph, &sub.neg_instances, edge_label, &no_marks);
        recursive.num_neg_instances = recursive.neg_instances.len();
    }
    evaluate_sub(&mut recursive, params, corpus);
    recursive
}

/// Chain instances connected by `edge_label` edges into merged recursive
/// instances. `instance_map[i]` tracks which (possibly merged) instance
/// original `i` now belongs to.
fn recursive_instances(
    graph: &Graph,
    instances: &InstanceList,
    edge_label: usize,
    edge_marks: &FixedBitSet,
) -> InstanceList {
    let originals: Vec<InstanceRef> = instances.iter().cloned().collect();
    let mut instance_map: Vec<InstanceRef> = originals.clone();

    for (i1, instance1) in originals.iter().enumerate() {
        let vertices = instance1.borrow().vertices.clone();
        for hv in vertices {
            for (e, edge) in graph.incident_edges(hv) {
                if edge_marks.contains(e) || edge.label != edge_label {
                    continue;
                }
                let v2 = if edge.vertex2 == hv { edge.vertex1 } else { edge.vertex2 };
                for i2 in i1 + 1..originals.len() {
                    if originals[i2].borrow().contains_vertex(v2) {
                        join_recursive_pair(i1, i2, &originals, e, graph, &mut instance_map);
                    }
                }
            }
        }
    }

    // collect the unique merged instances, singletons included
    let mut result = InstanceList::new();
    let mut taken: Vec<InstanceRef> = Vec::new();
    for entry in &instance_map {
        if !taken.iter().any(|t| Rc::ptr_eq(t, entry)) {
            taken.push(Rc::clone(entry));
            result.insert(Rc::clone(entry), false);
        }
    }
    result
}

/// Record that originals `i1` and `i2` are linked by `edge_index`, merging
/// whatever recursive instances currently contain them.
fn join_recursive_pair(
    i1: usize,
    i2: usize,
    originals: &[InstanceRef],
    edge_index: usize,
    graph: &Graph,
    instance_map: &mut [InstanceRef],
) {
    let edge = graph.edge(edge_index);
    let unjoined1 = Rc::ptr_eq(&instance_map[i1], &originals[i1]);
    let unjoined2 = Rc::ptr_eq(&instance_map[i2], &originals[i2]);

    if unjoined1 && unjoined2 {
        // neither is part of a merged instance yet
        let mut merged = Instance::new(0, 0);
        merged.absorb(&originals[i1].borrow());
        merged.absorb(&originals[i2].borrow());
        merged.absorb_edge(edge_index, edge);
        let merged = merged.into_ref();
        instance_map[i1] = Rc::clone(&merged);
        instance_map[i2] = merged;
    } else if unjoined1 {
        instance_map[i2].borrow_mut().absorb(&originals[i1].borrow());
        instance_map[i2].borrow_mut().absorb_edge(edge_index, edge);
        instance_map[i1] = Rc::clone(&instance_map[i2]);
    } else if unjoined2 {
        instance_map[i1].borrow_mut().absorb(&originals[i2].borrow());
        instance_map[i1].borrow_mut().absorb_edge(edge_index, edge);
        instance_map[i2] = Rc::clone(&instance_map[i1]);
    } else if !Rc::ptr_eq(&instance_map[i1], &instance_map[i2]) {
        // both belong to different merged instances: fuse them
        let absorbed = Rc::clone(&instance_map[i2]);
        instance_map[i1].borrow_mut().absorb(&absorbed.borrow());
        instance_map[i1].borrow_mut().absorb_edge(edge_index, edge);
        let target = Rc::clone(&instance_map[i1]);
        for entry in instance_map.iter_mut() {
            if Rc::ptr_eq(entry, &absorbed) {
                *entry = Rc::clone(&target);
            }
        }
    } else {
        // already in the same merged instance; just take the edge
        instance_map[i1].borrow_mut().absorb_edge(edge_index, edge);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::{Label, LabelList};

    fn two_paths() -> (LabelList, Graph) {
        // two disjoint A-B-C paths
        let mut labels = LabelList::new();
        let a = labels.store(Label::from("A"));
        let b = labels.store(Label::from("B"));
        let c = labels.store(Label::from("C"));
        let e = labels.store(Label::from("e"));
        let mut g = Graph::new();
        for label in [a, b, c, a, b, c] {
            g.add_vertex(label);
        }
        g.add_edge(0, 1, false, e);
        g.add_edge(1, 2, false, e);
        g.add_edge(3, 4, false, e);
        g.add_edge(4, 5, false, e);
        (labels, g)
    }

    fn corpus_of(labels: LabelList, graph: Graph) -> Corpus {
        let mut corpus = Corpus {
            labels,
            pos_graph: graph,
            num_pos_egs: 1,
            pos_eg_starts: vec![0],
            ..Corpus::default()
        };
        corpus.recompute_description_lengths();
        corpus
    }

    #[test]
    fn extended_instance_stays_sorted_and_tracks_new_parts() {
        let (_, g) = two_paths();
        let seed = {
            let mut inst = Instance::single_vertex(1);
            inst.min_match_cost = 0.0;
            inst.into_ref()
        };
        // extend B(1) by edge 0 toward A(0): new vertex sorts in front
        let extended = create_extended_instance(&seed, 1, 0, &g);
        assert_eq!(extended.vertices, vec![0, 1]);
        assert_eq!(extended.edges, vec![0]);
        assert_eq!(extended.new_vertex, Some(0));
        assert_eq!(extended.new_edge, 0);
        assert!(extended.parent.is_some());
        // mapping rows follow the sorted order
        assert_eq!(extended.mapping[0], VertexMap { v1: 0, v2: 0 });
        assert_eq!(extended.mapping[1].v2, 1);
    }

    #[test]
    fn extend_instances_covers_every_incident_edge() {
        let (_, g) = two_paths();
        let mut list = InstanceList::new();
        let mut seed = Instance::single_vertex(1);
        seed.min_match_cost = 0.0;
        list.insert(seed.into_ref(), false);
        let extended = extend_instances(&list, &g);
        // B(1) has two incident edges, so two extensions
        assert_eq!(extended.len(), 2);
    }

    #[test]
    fn extensions_group_matching_instances() {
        let (labels, g) = two_paths();
        let corpus = corpus_of(labels, g);
        let params = Params::default().resolve(&corpus.pos_graph);

        // one-vertex substructure on label B with both instances
        let b = corpus.pos_graph.vertex(1).label;
        let mut def = Graph::new();
        def.add_vertex(b);
        let mut sub = Substructure::new(def);
        for v in [4, 1] {
            let mut inst = Instance::single_vertex(v);
            inst.min_match_cost = 0.0;
            sub.instances.insert(inst.into_ref(), false);
            sub.num_instances += 1;
        }

        let extended = extend_sub(&sub, &params, &corpus);
        // A-B and B-C, each with two instances collected
        assert_eq!(extended.len(), 2);
        for new_sub in &extended {
            assert_eq!(new_sub.num_instances, 2);
            assert_eq!(new_sub.definition.vertex_count(), 2);
        }
    }

    #[test]
    fn recursify_chains_instances_linked_by_one_label() {
        // chain of four X vertices joined by r edges
        let mut labels = LabelList::new();
        let x = labels.store(Label::from("X"));
        let r = labels.store(Label::from("r"));
        let mut g = Graph::new();
        for _ in 0..4 {
            g.add_vertex(x);
        }
        g.add_edge(0, 1, true, r);
        g.add_edge(1, 2, true, r);
        g.add_edge(2, 3, true, r);
        let corpus = corpus_of(labels, g);
        let params = Params {
            recursion: true,
            ..Params::default()
        }
        .resolve(&corpus.pos_graph);

        let mut def = Graph::new();
        def.add_vertex(x);
        let mut sub = Substructure::new(def);
        for v in [3, 2, 1, 0] {
            let mut inst = Instance::single_vertex(v);
            inst.min_match_cost = 0.0;
            sub.instances.insert(inst.into_ref(), false);
            sub.num_instances += 1;
        }
        evaluate_sub(&mut sub, &params, &corpus);

        let recursive = recursify_sub(&sub, &params, &corpus).expect("recursive variant");
        assert!(recursive.recursive);
        assert_eq!(recursive.recursive_edge_label, Some(r));
        // all four instances chain into one
        assert_eq!(recursive.num_instances, 1);
        let merged = recursive.instances.first().unwrap().borrow();
        assert_eq!(merged.vertices, vec![0, 1, 2, 3]);
        assert_eq!(merged.edges, vec![0, 1, 2]);
    }
}
