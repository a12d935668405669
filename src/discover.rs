//! The beam-search discovery engine.
//!
//! Discovery seeds with one-vertex substructures (one per vertex label
//! occurring at least twice in the positive graph), then repeatedly pops
//! each parent off the current generation, extends it by one edge in all
//! possible ways, evaluates the extensions, and inserts the survivors into
//! the next generation's beam. Parents worth keeping are emitted to the
//! discovered list as they retire; a one-vertex substructure that is
//! itself a previously compressed `SUB_<n>` vertex is never emitted, which
//! keeps compression from cycling.

use fixedbitset::FixedBitSet;
use tracing::debug;

use crate::evaluate::evaluate_sub;
use crate::extend::{extend_sub, recursify_sub};
use crate::graph::Graph;
use crate::instance::Instance;
use crate::label::LabelList;
use crate::params::{Corpus, EvalMethod, Params};
use crate::sub::{SubList, Substructure};

/// Discover the best substructures in the corpus under the given
/// parameters. `params` must already be resolved against the corpus.
pub fn discover_subs(params: &Params, corpus: &Corpus) -> SubList {
    let matcher = params.matcher();
    let mut limit = params.limit;
    let mut parent_list = initial_subs(params, corpus);
    let mut discovered = SubList::new();

    while limit > 0 && !parent_list.is_empty() {
        let mut child_list = SubList::new();
        for parent in parent_list {
            if params.output_level > 4 {
                println!("\nConsidering {}", parent.render(&corpus.labels, 1));
            }
            let expandable = (parent.num_instances > 1
                && params.eval_method != EvalMethod::SetCover)
                || parent.num_neg_instances > 0;
            if expandable && limit > 0 {
                limit -= 1;
                if params.output_level > 3 {
                    println!("{} substructures left to be considered", limit);
                }
                for mut extended in extend_sub(&parent, params, corpus) {
                    if extended.definition.vertex_count() <= params.max_vertices {
                        evaluate_sub(&mut extended, params, corpus);
                        if !(params.prune && extended.value < parent.value) {
                            child_list.insert(
                                extended,
                                params.beam_width,
                                params.value_based,
                                &matcher,
                            );
                        }
                    }
                }
            }
            // retire the parent onto the discovered list
            if parent.definition.vertex_count() >= params.min_vertices
                && !single_previous_sub(&parent, &corpus.labels)
            {
                let recursive = if params.recursion {
                    recursify_sub(&parent, params, corpus)
                } else {
                    None
                };
                if params.output_level > 3 {
                    print_new_best(&parent, &discovered, corpus, params);
                }
                discovered.insert(parent, params.num_best_subs, false, &matcher);
                if let Some(recursive) = recursive {
                    if params.output_level > 3 {
                        print_new_best(&recursive, &discovered, corpus, params);
                    }
                    discovered.insert(recursive, params.num_best_subs, false, &matcher);
                }
            }
        }
        parent_list = child_list;
    }

    if limit > 0 && params.output_level > 2 {
        println!("\nSubstructure queue empty.");
    }

    // drain whatever generation was left when the limit ran out
    for parent in parent_list {
        if parent.definition.vertex_count() >= params.min_vertices
            && !single_previous_sub(&parent, &corpus.labels)
        {
            if params.output_level > 3 {
                print_new_best(&parent, &discovered, corpus, params);
            }
            discovered.insert(parent, params.num_best_subs, false, &matcher);
        }
    }
    discovered
}

/// One substructure per vertex label occurring at least twice in the
/// positive graph, with every matching vertex (positive and negative) as
/// an instance.
pub fn initial_subs(params: &Params, corpus: &Corpus) -> SubList {
    let matcher = params.matcher();
    let pos = &corpus.pos_graph;
    let mut label_seen = FixedBitSet::with_capacity(corpus.labels.len());
    let mut initial = SubList::new();
    let mut num_initial = 0;

    for i in 0..pos.vertex_count() {
        let label = pos.vertex(i).label;
        if label_seen.contains(label) {
            continue;
        }
        label_seen.insert(label);

        let mut definition = Graph::with_capacity(1, 0);
        definition.add_vertex(label);
        let mut sub = Substructure::new(definition);
        // walk downward so the instance list ends up smallest-vertex-first
        for j in (i..pos.vertex_count()).rev() {
            if pos.vertex(j).label == label {
                let mut instance = Instance::single_vertex(j);
                instance.min_match_cost = 0.0;
                sub.instances.insert(instance.into_ref(), false);
                sub.num_instances += 1;
            }
        }

        // one-vertex substructures with a single instance never enter
        if sub.num_instances > 1 {
            if let Some(neg) = &corpus.neg_graph {
                for j in (0..neg.vertex_count()).rev() {
                    if neg.vertex(j).label == label {
                        let mut instance = Instance::single_vertex(j);
                        instance.min_match_cost = 0.0;
                        sub.neg_instances.insert(instance.into_ref(), false);
                        sub.num_neg_instances += 1;
                    }
                }
            }
            evaluate_sub(&mut sub, params, corpus);
            initial.insert(sub, 0, false, &matcher);
            num_initial += 1;
        }
    }

    debug!(count = num_initial, "seeded initial substructures");
    if params.output_level > 1 {
        println!("{} initial substructures", num_initial);
    }
    initial
}

/// True for a one-vertex substructure whose label is a previously
/// discovered `SUB_<n>`.
fn single_previous_sub(sub: &Substructure, labels: &LabelList) -> bool {
    sub.definition.vertex_count() == 1
        && labels
            .sub_label_number(sub.definition.vertex(0).label)
            .is_some()
}

fn print_new_best(sub: &Substructure, discovered: &SubList, corpus: &Corpus, params: &Params) {
    let is_new_best = discovered.first().map_or(true, |best| sub.value > best.value);
    if is_new_best {
        println!("\nNew best {}", sub.render(&corpus.labels, params.output_level.min(1)));
    }
}
