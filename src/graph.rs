//! The graph store: typed adjacency over flat vertex and edge arrays.
//!
//! `Graph` keeps one `Vec` of vertices and one of edges; each vertex holds
//! the indices of its incident edges. Indices are compact (`0..n`) and
//! stable, which the instance bookkeeping relies on: an instance is nothing
//! more than a sorted set of vertex indices and edge indices into its host
//! graph.

use std::fmt;

use crate::label::LabelList;

/// A vertex: a label index plus the indices of all incident edges.
///
/// A self-edge appears exactly once in `edges`.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub label: usize,
    pub edges: Vec<usize>,
}

/// An edge between `vertex1` and `vertex2`, directed or not.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub vertex1: usize,
    pub vertex2: usize,
    pub label: usize,
    pub directed: bool,
}

impl Edge {
    /// The endpoint that is not `v`; `v` itself for a self-edge.
    pub fn other_endpoint(&self, v: usize) -> usize {
        if self.vertex1 == v {
            self.vertex2
        } else {
            self.vertex1
        }
    }

    pub fn is_self_edge(&self) -> bool {
        self.vertex1 == self.vertex2
    }

    /// True if `v` is one of the endpoints.
    pub fn touches(&self, v: usize) -> bool {
        self.vertex1 == v || self.vertex2 == v
    }
}

/// A labeled graph with directed and undirected edges mixed freely.
///
/// All vertex and edge labels index a single shared [`LabelList`].
/// `Clone` produces a deep copy with identical indices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Graph {
        Graph {
            vertices: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Create a new `Graph` with estimated capacity.
    pub fn with_capacity(vertices: usize, edges: usize) -> Graph {
        Graph {
            vertices: Vec::with_capacity(vertices),
            edges: Vec::with_capacity(edges),
        }
    }

    /// Return the number of vertices in the graph.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Return the number of edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Size of the graph as vertices plus edges.
    pub fn size(&self) -> usize {
        self.vertices.len() + self.edges.len()
    }

    /// Add a vertex with the given label index; returns the vertex index.
    pub fn add_vertex(&mut self, label: usize) -> usize {
        self.vertices.push(Vertex {
            label,
            edges: Vec::new(),
        });
        self.vertices.len() - 1
    }

    /// Add an edge from `vertex1` to `vertex2`; returns the edge index.
    ///
    /// The edge index is appended to both endpoints' adjacency lists, or to
    /// the single list exactly once for a self-edge.
    ///
    /// **Panics** if either endpoint does not exist.
    pub fn add_edge(&mut self, vertex1: usize, vertex2: usize, directed: bool, label: usize) -> usize {
        assert!(
            vertex1 < self.vertices.len() && vertex2 < self.vertices.len(),
            "Graph::add_edge: vertex indices out of bounds"
        );
        let edge_index = self.edges.len();
        self.edges.push(Edge {
            vertex1,
            vertex2,
            label,
            directed,
        });
        self.vertices[vertex1].edges.push(edge_index);
        if vertex1 != vertex2 {
            self.vertices[vertex2].edges.push(edge_index);
        }
        edge_index
    }

    pub fn vertex(&self, index: usize) -> &Vertex {
        &self.vertices[index]
    }

    pub fn edge(&self, index: usize) -> &Edge {
        &self.edges[index]
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Number of edges incident to `v` (self-edges count once).
    pub fn degree(&self, v: usize) -> usize {
        self.vertices[v].edges.len()
    }

    /// Iterate over `(edge_index, &Edge)` for the edges incident to `v`.
    pub fn incident_edges(&self, v: usize) -> impl Iterator<Item = (usize, &Edge)> {
        self.vertices[v].edges.iter().map(move |&e| (e, &self.edges[e]))
    }

    /// Rewrite every label index through `translate`. Used when the label
    /// table is rebuilt between iterations.
    pub fn translate_labels(&mut self, mut translate: impl FnMut(usize) -> usize) {
        for vertex in &mut self.vertices {
            vertex.label = translate(vertex.label);
        }
        for edge in &mut self.edges {
            edge.label = translate(edge.label);
        }
    }

    /// Displayable rendering of the graph in the input format, one-based,
    /// with every line indented by two spaces.
    pub fn display<'a>(&'a self, labels: &'a LabelList) -> GraphDisplay<'a> {
        GraphDisplay { graph: self, labels }
    }
}

/// Adapter that prints a graph in the `v`/`d`/`u` line format.
pub struct GraphDisplay<'a> {
    graph: &'a Graph,
    labels: &'a LabelList,
}

impl fmt::Display for GraphDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (v, vertex) in self.graph.vertices.iter().enumerate() {
            writeln!(f, "  v {} {}", v + 1, self.labels.label_at(vertex.label))?;
        }
        for edge in &self.graph.edges {
            writeln!(
                f,
                "  {} {} {} {}",
                if edge.directed { "d" } else { "u" },
                edge.vertex1 + 1,
                edge.vertex2 + 1,
                self.labels.label_at(edge.label)
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::Label;

    #[test]
    fn adjacency_lists_reference_incident_edges() {
        let mut g = Graph::new();
        let a = g.add_vertex(0);
        let b = g.add_vertex(0);
        let c = g.add_vertex(1);
        g.add_edge(a, b, false, 2);
        g.add_edge(b, c, true, 2);
        for vertex_index in 0..g.vertex_count() {
            for &e in &g.vertex(vertex_index).edges {
                assert!(g.edge(e).touches(vertex_index));
            }
        }
        assert_eq!(g.degree(b), 2);
        assert_eq!(g.size(), 5);
    }

    #[test]
    fn self_edge_appears_once_in_adjacency() {
        let mut g = Graph::new();
        let a = g.add_vertex(0);
        let e = g.add_edge(a, a, true, 1);
        assert_eq!(g.vertex(a).edges, vec![e]);
        assert_eq!(g.edge(e).other_endpoint(a), a);
        assert!(g.edge(e).is_self_edge());
    }

    #[test]
    fn clone_is_deep() {
        let mut g = Graph::with_capacity(2, 1);
        let a = g.add_vertex(0);
        let b = g.add_vertex(1);
        g.add_edge(a, b, false, 2);
        let mut copy = g.clone();
        assert_eq!(copy, g);
        copy.add_vertex(3);
        assert_eq!(g.vertex_count(), 2);
        assert_eq!(copy.vertex_count(), 3);
    }

    #[test]
    fn display_round_trips_through_the_line_format() {
        let mut labels = LabelList::new();
        let a = labels.store(Label::from("a"));
        let on = labels.store(Label::from("on"));
        let mut g = Graph::new();
        let v1 = g.add_vertex(a);
        let v2 = g.add_vertex(a);
        g.add_edge(v1, v2, true, on);
        let text = g.display(&labels).to_string();
        assert_eq!(text, "  v 1 a\n  v 2 a\n  d 1 2 on\n");
    }
}
