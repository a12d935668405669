//! The iteration driver: repeated discovery passes with compression in
//! between.
//!
//! Each pass runs the beam search, reports the ranked substructures, and
//! (when another pass follows) rewrites the corpus: under set-cover
//! evaluation the covered positive examples are removed, otherwise the
//! graphs are compressed by the best substructure and the label table is
//! rebuilt. Iteration stops early once no positive examples remain
//! (set-cover) or the positive graph has no edges left to mine.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use tracing::info;

use crate::compress::{compress_final, compress_graph, rebuild_label_list, remove_covered_examples};
use crate::discover::discover_subs;
use crate::graphio::{self, Examples};
use crate::instance::InstanceList;
use crate::label::{Label, LabelList, OVERLAP_LABEL_PREFIX, SUB_LABEL_PREFIX};
use crate::params::{Corpus, EvalMethod, Params};
use crate::sgiso::find_instances;
use crate::sub::{SubList, Substructure};
use crate::Error;

/// Frontend-facing outputs of a run.
#[derive(Debug, Default)]
pub struct RunOptions {
    /// Append the best pattern of each iteration here, machine-readable.
    pub out_path: Option<PathBuf>,
    /// Write the final compressed (or uncovered) graph here.
    pub compress_path: Option<PathBuf>,
}

/// What a run produced: the ranked substructures of every iteration.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub iterations_run: usize,
    pub discoveries: Vec<SubList>,
}

impl Corpus {
    /// Assemble a corpus from parsed examples and their label table.
    pub fn from_examples(labels: LabelList, examples: Examples) -> Corpus {
        let mut corpus = Corpus {
            labels,
            pos_graph: examples.pos_graph,
            neg_graph: examples.neg_graph,
            num_pos_egs: examples.num_pos_egs,
            num_neg_egs: examples.num_neg_egs,
            pos_eg_starts: examples.pos_eg_starts,
            neg_eg_starts: examples.neg_eg_starts,
            ..Corpus::default()
        };
        corpus.recompute_description_lengths();
        corpus
    }
}

/// Run up to `params.iterations` discovery passes over the corpus.
///
/// `params` should be unresolved; the derived limits are fixed against the
/// corpus once, before the first pass, so later compression does not
/// shrink them.
pub fn run(params: &Params, corpus: &mut Corpus, options: &RunOptions) -> Result<RunSummary, Error> {
    let params = params.resolve(&corpus.pos_graph);
    let mut summary = RunSummary::default();
    let mut iteration = 1;
    let mut done = false;

    if params.iterations > 1 {
        println!("----- Iteration 1 -----\n");
    }
    while iteration <= params.iterations && !done {
        let started = Instant::now();
        if iteration > 1 {
            println!("----- Iteration {} -----\n", iteration);
        }
        print_graph_stats(&params, corpus);

        let sub_list = discover_subs(&params, corpus);
        info!(
            iteration,
            discovered = sub_list.len(),
            best_value = sub_list.first().map(|s| s.value),
            "discovery pass finished"
        );

        if sub_list.is_empty() {
            done = true;
            println!("No substructures found.\n");
        } else {
            if params.output_level > 1 {
                println!("\nBest {} substructures:\n", sub_list.len());
                for sub in &sub_list {
                    println!("{}", sub.render(&corpus.labels, params.output_level));
                    if params.output_level > 2 {
                        print_instance_lists(sub, corpus);
                    }
                }
            } else {
                println!("\nBest substructure:\n");
                println!(
                    "{}",
                    sub_list.first().unwrap().render(&corpus.labels, params.output_level)
                );
            }

            if let Some(out_path) = &options.out_path {
                let best = sub_list.first().unwrap();
                let file = OpenOptions::new().append(true).create(true).open(out_path)?;
                let mut out = BufWriter::new(file);
                graphio::write_graph(
                    &mut out,
                    &best.definition,
                    &corpus.labels,
                    0,
                    0,
                    best.definition.vertex_count(),
                    true,
                )?;
            }

            if iteration < params.iterations {
                let best = sub_list.first().unwrap();
                if params.eval_method == EvalMethod::SetCover {
                    println!("Removing positive examples covered by best substructure.\n");
                    remove_covered_examples(best, &params, corpus);
                    if corpus.num_pos_egs == 0 {
                        done = true;
                        println!("Ending iterations - all positive examples covered.\n");
                    }
                } else {
                    compress_final(best, &params, corpus, iteration, false);
                    if corpus.pos_graph.edge_count() == 0 {
                        done = true;
                        println!("Ending iterations - graph fully compressed.\n");
                    }
                }
            }
            if iteration == params.iterations {
                if let Some(compress_path) = &options.compress_path {
                    let best = sub_list.first().unwrap();
                    if params.eval_method == EvalMethod::SetCover {
                        write_updated_graph(compress_path, best, &params, corpus)?;
                    } else {
                        write_compressed_graph(compress_path, best, &params, corpus, iteration)?;
                    }
                }
            }
            summary.discoveries.push(sub_list);
        }

        if params.iterations > 1 {
            println!(
                "Elapsed time for iteration {} = {:.2} seconds.\n",
                iteration,
                started.elapsed().as_secs_f64()
            );
        }
        summary.iterations_run = iteration;
        iteration += 1;
    }
    Ok(summary)
}

/// Print a substructure's instances, each located in its example and
/// renumbered relative to the example's first vertex.
fn print_instance_lists(sub: &Substructure, corpus: &Corpus) {
    println!("\n  Positive instances:");
    for (i, instance) in sub.instances.iter().enumerate() {
        let instance = instance.borrow();
        let example = instance.example_number(&corpus.pos_eg_starts);
        println!("    Instance {} in example {}:", i + 1, example);
        print_instance(&instance, corpus.pos_eg_starts[example - 1], &corpus.pos_graph, corpus);
    }
    if sub.num_neg_instances > 0 {
        if let Some(neg) = &corpus.neg_graph {
            println!("\n  Negative instances:");
            for (i, instance) in sub.neg_instances.iter().enumerate() {
                let instance = instance.borrow();
                let example = instance.example_number(&corpus.neg_eg_starts);
                println!("    Instance {} in example {}:", i + 1, example);
                print_instance(&instance, corpus.neg_eg_starts[example - 1], neg, corpus);
            }
        }
    }
}

fn print_instance(
    instance: &crate::instance::Instance,
    vertex_offset: usize,
    graph: &crate::graph::Graph,
    corpus: &Corpus,
) {
    for &v in &instance.vertices {
        println!(
            "      v {} {}",
            v - vertex_offset + 1,
            corpus.labels.label_at(graph.vertex(v).label)
        );
    }
    for &e in &instance.edges {
        let edge = graph.edge(e);
        println!(
            "      {} {} {} {}",
            if edge.directed { "d" } else { "u" },
            edge.vertex1 - vertex_offset + 1,
            edge.vertex2 - vertex_offset + 1,
            corpus.labels.label_at(edge.label)
        );
    }
}

fn print_graph_stats(params: &Params, corpus: &Corpus) {
    print!(
        "{} positive graphs: {} vertices, {} edges",
        corpus.num_pos_egs,
        corpus.pos_graph.vertex_count(),
        corpus.pos_graph.edge_count()
    );
    if params.eval_method == EvalMethod::Mdl {
        println!(", {:.0} bits", corpus.pos_graph_dl);
    } else {
        println!();
    }
    if let Some(neg) = &corpus.neg_graph {
        print!(
            "{} negative graphs: {} vertices, {} edges",
            corpus.num_neg_egs,
            neg.vertex_count(),
            neg.edge_count()
        );
        if params.eval_method == EvalMethod::Mdl {
            println!(", {:.0} bits", corpus.neg_graph_dl);
        } else {
            println!();
        }
    }
    println!("{} unique labels", corpus.labels.len());
    println!();
}

/// Search the corpus for each predefined pattern and compress the graphs
/// with every pattern that has instances. The label table is rebuilt once
/// after all patterns are processed, since an earlier rebuild could drop
/// labels a later pattern still refers to.
pub fn compress_with_predefined_subs(pre_subs: Vec<crate::graph::Graph>, params: &Params, corpus: &mut Corpus) {
    for (i, pre_sub) in pre_subs.into_iter().enumerate() {
        let pos_instances = find_instances(&pre_sub, &corpus.pos_graph, params);
        let neg_instances = match &corpus.neg_graph {
            Some(neg) => find_instances(&pre_sub, neg, params),
            None => InstanceList::new(),
        };
        if pos_instances.is_empty() && neg_instances.is_empty() {
            continue;
        }
        println!(
            "Found {} instances of predefined substructure {}:",
            pos_instances.len() + neg_instances.len(),
            i + 1
        );
        let mut sub = Substructure::new(pre_sub);
        if !pos_instances.is_empty() {
            println!("  {} instances in positive graph", pos_instances.len());
            sub.num_instances = pos_instances.len();
            sub.instances = pos_instances;
        }
        if !neg_instances.is_empty() {
            println!("  {} instances in negative graph", neg_instances.len());
            sub.num_neg_instances = neg_instances.len();
            sub.neg_instances = neg_instances;
        }
        println!("  Compressing...");
        compress_final(&sub, params, corpus, i + 1, true);
    }

    rebuild_label_list(corpus);
    if params.eval_method == EvalMethod::Mdl {
        corpus.recompute_description_lengths();
    }
}

/// Write the positive (and negative) graphs compressed by `sub`,
/// example-separated, to `path`. The SUB/OVERLAP labels this introduces
/// are stored in the corpus label table so the output resolves them.
fn write_compressed_graph(
    path: &PathBuf,
    sub: &Substructure,
    params: &Params,
    corpus: &mut Corpus,
    iteration: usize,
) -> Result<(), Error> {
    let labels_len = corpus.labels.len();
    let compressed_pos = if sub.num_instances > 0 {
        compress_graph(
            &corpus.pos_graph,
            &sub.instances,
            params.allow_instance_overlap,
            labels_len,
        )
    } else {
        corpus.pos_graph.clone()
    };
    let compressed_neg = match &corpus.neg_graph {
        Some(neg) if sub.num_neg_instances > 0 => Some(compress_graph(
            neg,
            &sub.neg_instances,
            params.allow_instance_overlap,
            labels_len,
        )),
        other => other.clone(),
    };

    corpus
        .labels
        .store(Label::Str(format!("{}_{}", SUB_LABEL_PREFIX, iteration)));
    if params.allow_instance_overlap
        && (sub.instances.any_pair_overlaps() || sub.neg_instances.any_pair_overlaps())
    {
        corpus
            .labels
            .store(Label::Str(format!("{}_{}", OVERLAP_LABEL_PREFIX, iteration)));
    }

    let file = std::fs::File::create(path)?;
    let mut out = BufWriter::new(file);
    writeln!(out, "{}", graphio::POS_EG_TOKEN)?;
    graphio::write_graph(
        &mut out,
        &compressed_pos,
        &corpus.labels,
        0,
        0,
        compressed_pos.vertex_count(),
        false,
    )?;
    if let Some(neg) = compressed_neg {
        writeln!(out, "{}", graphio::NEG_EG_TOKEN)?;
        graphio::write_graph(&mut out, &neg, &corpus.labels, 0, 0, neg.vertex_count(), false)?;
    }
    Ok(())
}

/// Set-cover output: remove the covered examples, then write the remaining
/// positive examples (and all negative examples), renumbered per example.
fn write_updated_graph(
    path: &PathBuf,
    sub: &Substructure,
    params: &Params,
    corpus: &mut Corpus,
) -> Result<(), Error> {
    remove_covered_examples(sub, params, corpus);

    let file = std::fs::File::create(path)?;
    let mut out = BufWriter::new(file);
    for eg in 0..corpus.num_pos_egs {
        let start = corpus.pos_eg_starts[eg];
        let finish = if eg + 1 < corpus.num_pos_egs {
            corpus.pos_eg_starts[eg + 1]
        } else {
            corpus.pos_graph.vertex_count()
        };
        writeln!(out, "{}", graphio::POS_EG_TOKEN)?;
        graphio::write_graph(&mut out, &corpus.pos_graph, &corpus.labels, 0, start, finish, false)?;
    }
    if let Some(neg) = &corpus.neg_graph {
        for eg in 0..corpus.num_neg_egs {
            let start = corpus.neg_eg_starts[eg];
            let finish = if eg + 1 < corpus.num_neg_egs {
                corpus.neg_eg_starts[eg + 1]
            } else {
                neg.vertex_count()
            };
            writeln!(out, "{}", graphio::NEG_EG_TOKEN)?;
            graphio::write_graph(&mut out, neg, &corpus.labels, 0, start, finish, false)?;
        }
    }
    Ok(())
}
