//! Randomized round-trip and copy laws.

use quickcheck::{quickcheck, Arbitrary, Gen};
use subdue::graphio::{parse_examples, write_graph};
use subdue::label::{Label, LabelList};
use subdue::matcher::Matcher;
use subdue::Graph;

const VERTEX_NAMES: [&str; 4] = ["a", "b", "c", "d"];
const EDGE_NAMES: [&str; 3] = ["e", "f", "1.5"];

/// A small random labeled graph together with its label table.
#[derive(Debug, Clone)]
struct TestGraph {
    labels: LabelList,
    graph: Graph,
}

impl Arbitrary for TestGraph {
    fn arbitrary(g: &mut Gen) -> TestGraph {
        let mut labels = LabelList::new();
        let mut graph = Graph::new();
        let num_vertices = usize::arbitrary(g) % 7 + 1;
        for _ in 0..num_vertices {
            let name = *g.choose(&VERTEX_NAMES).unwrap();
            let label = labels.store(Label::from_token(name));
            graph.add_vertex(label);
        }
        let num_edges = usize::arbitrary(g) % 10;
        for _ in 0..num_edges {
            let v1 = usize::arbitrary(g) % num_vertices;
            let v2 = usize::arbitrary(g) % num_vertices;
            let name = *g.choose(&EDGE_NAMES).unwrap();
            let label = labels.store(Label::from_token(name));
            graph.add_edge(v1, v2, bool::arbitrary(g), label);
        }
        TestGraph { labels, graph }
    }
}

quickcheck! {
    /// `parse(render(g)) == g` modulo the label-table rebuild.
    fn render_parse_round_trips(tg: TestGraph) -> bool {
        let mut rendered = Vec::new();
        write_graph(
            &mut rendered,
            &tg.graph,
            &tg.labels,
            0,
            0,
            tg.graph.vertex_count(),
            false,
        )
        .unwrap();
        let rendered = String::from_utf8(rendered).unwrap();
        let mut reparsed_labels = LabelList::new();
        let examples = parse_examples(&rendered, &mut reparsed_labels, true).unwrap();
        let reparsed = examples.pos_graph;

        if reparsed.vertex_count() != tg.graph.vertex_count()
            || reparsed.edge_count() != tg.graph.edge_count()
        {
            return false;
        }
        let same_vertices = (0..tg.graph.vertex_count()).all(|v| {
            reparsed_labels.label_at(reparsed.vertex(v).label)
                == tg.labels.label_at(tg.graph.vertex(v).label)
        });
        let same_edges = (0..tg.graph.edge_count()).all(|e| {
            let old = tg.graph.edge(e);
            let new = reparsed.edge(e);
            old.vertex1 == new.vertex1
                && old.vertex2 == new.vertex2
                && old.directed == new.directed
                && tg.labels.label_at(old.label) == reparsed_labels.label_at(new.label)
        });
        same_vertices && same_edges
    }

    /// A deep copy is indistinguishable from the original under exact
    /// isomorphism.
    fn copy_is_isomorphic(tg: TestGraph) -> bool {
        let copy = tg.graph.clone();
        let matcher = Matcher::new();
        match matcher.graph_match(&tg.graph, &copy, 0.0) {
            Some(result) => result.cost == 0.0,
            None => false,
        }
    }
}
