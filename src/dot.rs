//! Graphviz dot output for graphs and discovered substructures.

use std::io::Write;

use crate::graph::Graph;
use crate::instance::InstanceList;
use crate::label::{Label, LabelList, SUB_LABEL_PREFIX};
use crate::params::Corpus;

/// Label text for dot output: delimiting quotes are dropped since the
/// value is re-quoted inside the attribute.
fn dot_label(labels: &LabelList, index: usize) -> String {
    match labels.label_at(index) {
        Label::Str(s) => s
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(s)
            .to_owned(),
        Label::Num(n) => n.to_string(),
    }
}

fn write_vertex<W: Write>(
    out: &mut W,
    v: usize,
    offset: usize,
    graph: &Graph,
    labels: &LabelList,
    color: &str,
) -> std::io::Result<()> {
    writeln!(
        out,
        "  {} [label=\"{}\",color={color},fontcolor={color}];",
        v + offset + 1,
        dot_label(labels, graph.vertex(v).label)
    )
}

fn write_edge<W: Write>(
    out: &mut W,
    e: usize,
    offset: usize,
    graph: &Graph,
    labels: &LabelList,
    color: &str,
) -> std::io::Result<()> {
    let edge = graph.edge(e);
    let arrow = if edge.directed { "" } else { ",arrowhead=none" };
    writeln!(
        out,
        "  {} -> {} [label=\"{}\"{arrow},color={color},fontcolor={color}];",
        edge.vertex1 + offset + 1,
        edge.vertex2 + offset + 1,
        dot_label(labels, edge.label)
    )
}

/// Write the corpus graphs in dot format: positive in black, negative (if
/// present) in red.
pub fn write_corpus<W: Write>(out: &mut W, corpus: &Corpus) -> std::io::Result<()> {
    writeln!(out, "digraph SubdueGraph {{")?;
    for v in 0..corpus.pos_graph.vertex_count() {
        write_vertex(out, v, 0, &corpus.pos_graph, &corpus.labels, "black")?;
    }
    for e in 0..corpus.pos_graph.edge_count() {
        write_edge(out, e, 0, &corpus.pos_graph, &corpus.labels, "black")?;
    }
    if let Some(neg) = &corpus.neg_graph {
        let offset = corpus.pos_graph.vertex_count();
        for v in 0..neg.vertex_count() {
            write_vertex(out, v, offset, neg, &corpus.labels, "red")?;
        }
        for e in 0..neg.edge_count() {
            write_edge(out, e, offset, neg, &corpus.labels, "red")?;
        }
    }
    writeln!(out, "}}")
}

/// Write `graph` in dot format with the given instances highlighted in
/// blue.
pub fn write_graph_with_instances<W: Write>(
    out: &mut W,
    graph: &Graph,
    instances: &InstanceList,
    labels: &LabelList,
) -> std::io::Result<()> {
    let mut in_instance_v = vec![false; graph.vertex_count()];
    let mut in_instance_e = vec![false; graph.edge_count()];
    writeln!(out, "digraph SubdueGraph {{")?;
    for instance in instances {
        let instance = instance.borrow();
        for &v in &instance.vertices {
            write_vertex(out, v, 0, graph, labels, "blue")?;
            in_instance_v[v] = true;
        }
        for &e in &instance.edges {
            write_edge(out, e, 0, graph, labels, "blue")?;
            in_instance_e[e] = true;
        }
    }
    for v in 0..graph.vertex_count() {
        if !in_instance_v[v] {
            write_vertex(out, v, 0, graph, labels, "black")?;
        }
    }
    for e in 0..graph.edge_count() {
        if !in_instance_e[e] {
            write_edge(out, e, 0, graph, labels, "black")?;
        }
    }
    writeln!(out, "}}")
}

/// Write substructure definitions as dot cluster subgraphs, with edges
/// linking a substructure to any earlier one it references through a
/// `SUB_<n>` vertex.
pub fn write_subs<W: Write>(
    out: &mut W,
    subs: &[&Graph],
    labels: &LabelList,
) -> std::io::Result<()> {
    writeln!(out, "digraph Subdue {{\n")?;
    writeln!(out, "  compound=true;\n")?;
    let mut sub_vertex_indices = vec![0usize; subs.len()];
    let mut offset = 0;
    for (i, graph) in subs.iter().enumerate() {
        writeln!(out, "subgraph cluster_{}_{} {{", SUB_LABEL_PREFIX, i + 1)?;
        for v in 0..graph.vertex_count() {
            write_vertex(out, v, offset, graph, labels, "black")?;
        }
        for e in 0..graph.edge_count() {
            write_edge(out, e, offset, graph, labels, "black")?;
        }
        writeln!(out, "  label=\"{}_{}\";\n}}", SUB_LABEL_PREFIX, i + 1)?;

        for v in 0..graph.vertex_count() {
            if let Some(sub_number) = labels.sub_label_number(graph.vertex(v).label) {
                let sub_number = sub_number as usize;
                if sub_number <= i {
                    writeln!(
                        out,
                        "{} -> {} [ltail=cluster_{}_{},lhead=cluster_{}_{}];",
                        sub_vertex_indices[sub_number - 1],
                        offset + 1,
                        SUB_LABEL_PREFIX,
                        sub_number,
                        SUB_LABEL_PREFIX,
                        i + 1
                    )?;
                }
            }
        }
        writeln!(out)?;
        offset += graph.vertex_count();
        sub_vertex_indices[i] = offset;
    }
    writeln!(out, "}}")
}
