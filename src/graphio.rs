//! Reading and writing the line-oriented graph format.
//!
//! The format is token-based: `XP`/`XN` open a positive or negative
//! example, `v <n> <label>` declares vertex `n` (one-based, monotonically
//! increasing within a stream), and `d`/`u`/`e` declare directed,
//! undirected, and default-directedness edges. `%` starts a comment;
//! double-quoted tokens keep their interior whitespace (and their quotes).
//! A file with no example headers is one positive example.
//!
//! Substructure files use the same grammar with `S` (or `PS` for
//! predefined patterns) separating the graphs; a missing separator before
//! the first pattern is tolerated.

use std::io::Write;
use std::iter::Peekable;
use std::path::Path;
use std::str::Chars;

use thiserror::Error;
use tracing::debug;

use crate::graph::Graph;
use crate::label::{Label, LabelList};

/// Token opening a substructure graph.
pub const SUB_TOKEN: &str = "S";
/// Token opening a predefined substructure graph.
pub const PREDEF_SUB_TOKEN: &str = "PS";
/// Token opening a positive example.
pub const POS_EG_TOKEN: &str = "XP";
/// Token opening a negative example.
pub const NEG_EG_TOKEN: &str = "XN";

/// A violation of the graph file grammar, reported with its line number.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}: unknown token `{token}`")]
    UnknownToken { token: String, line: u64 },
    #[error("line {line}: invalid vertex number (vertices are one-based and increasing)")]
    InvalidVertexNumber { line: u64 },
    #[error("line {line}: reference to undefined vertex number")]
    UndefinedVertex { line: u64 },
    #[error("line {line}: expecting integer")]
    ExpectedInteger { line: u64 },
    #[error("line {line}: unexpected end of input")]
    UnexpectedEof { line: u64 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The graphs read from an examples file.
#[derive(Debug, Default)]
pub struct Examples {
    pub pos_graph: Graph,
    pub neg_graph: Option<Graph>,
    pub num_pos_egs: usize,
    pub num_neg_egs: usize,
    /// Vertex index where each positive example begins.
    pub pos_eg_starts: Vec<usize>,
    /// Vertex index where each negative example begins.
    pub neg_eg_starts: Vec<usize>,
}

/// Tokenizer over the input text: whitespace-separated tokens, `%`
/// comments, double-quoted tokens kept verbatim (quotes included).
struct Tokenizer<'a> {
    chars: Peekable<Chars<'a>>,
    line: u64,
}

impl<'a> Tokenizer<'a> {
    fn new(text: &'a str) -> Tokenizer<'a> {
        Tokenizer {
            chars: text.chars().peekable(),
            line: 1,
        }
    }

    fn skip_comment(&mut self) {
        for c in self.chars.by_ref() {
            if c == '\n' {
                self.line += 1;
                break;
            }
        }
    }

    fn next_token(&mut self) -> Option<String> {
        loop {
            match self.chars.peek() {
                Some(' ' | '\t' | '\r') => {
                    self.chars.next();
                }
                Some('\n') => {
                    self.chars.next();
                    self.line += 1;
                }
                Some('%') => self.skip_comment(),
                _ => break,
            }
        }

        let mut token = String::new();
        match self.chars.peek() {
            None => return None,
            Some('"') => {
                token.push(self.chars.next().unwrap());
                for c in self.chars.by_ref() {
                    if c == '\n' {
                        self.line += 1;
                    }
                    token.push(c);
                    if c == '"' {
                        break;
                    }
                }
            }
            Some(_) => {
                while let Some(&c) = self.chars.peek() {
                    if c.is_whitespace() || c == '%' {
                        break;
                    }
                    token.push(c);
                    self.chars.next();
                }
            }
        }
        Some(token)
    }
}

/// Read a full examples file from `path`.
pub fn read_examples(
    path: &Path,
    labels: &mut LabelList,
    directed: bool,
) -> Result<Examples, ParseError> {
    let text = std::fs::read_to_string(path)?;
    let examples = parse_examples(&text, labels, directed)?;
    debug!(
        pos_egs = examples.num_pos_egs,
        neg_egs = examples.num_neg_egs,
        vertices = examples.pos_graph.vertex_count(),
        edges = examples.pos_graph.edge_count(),
        "read examples"
    );
    Ok(examples)
}

/// Parse examples from in-memory text. Each example's vertices start over
/// at 1; examples are therefore never connected to one another.
pub fn parse_examples(
    text: &str,
    labels: &mut LabelList,
    directed: bool,
) -> Result<Examples, ParseError> {
    let mut tokens = Tokenizer::new(text);
    let mut examples = Examples::default();
    let mut reading_positive = true;
    let mut vertex_offset = 0;
    let mut started = false;

    while let Some(token) = tokens.next_token() {
        match token.as_str() {
            POS_EG_TOKEN => {
                started = true;
                reading_positive = true;
                examples.num_pos_egs += 1;
                vertex_offset = examples.pos_graph.vertex_count();
                examples.pos_eg_starts.push(vertex_offset);
            }
            NEG_EG_TOKEN => {
                started = true;
                reading_positive = false;
                let neg = examples.neg_graph.get_or_insert_with(Graph::new);
                examples.num_neg_egs += 1;
                vertex_offset = neg.vertex_count();
                examples.neg_eg_starts.push(vertex_offset);
            }
            "v" => {
                if reading_positive && !started {
                    // headerless file: one positive example
                    started = true;
                    examples.num_pos_egs = 1;
                    vertex_offset = 0;
                    examples.pos_eg_starts.push(0);
                }
                let graph = current_graph(&mut examples, reading_positive);
                read_vertex(graph, &mut tokens, labels, vertex_offset)?;
            }
            "e" => {
                let graph = current_graph(&mut examples, reading_positive);
                read_edge(graph, &mut tokens, labels, directed, vertex_offset)?;
            }
            "u" => {
                let graph = current_graph(&mut examples, reading_positive);
                read_edge(graph, &mut tokens, labels, false, vertex_offset)?;
            }
            "d" => {
                let graph = current_graph(&mut examples, reading_positive);
                read_edge(graph, &mut tokens, labels, true, vertex_offset)?;
            }
            _ => {
                return Err(ParseError::UnknownToken {
                    token,
                    line: tokens.line,
                })
            }
        }
    }
    Ok(examples)
}

fn current_graph(examples: &mut Examples, reading_positive: bool) -> &mut Graph {
    if reading_positive {
        &mut examples.pos_graph
    } else {
        examples.neg_graph.get_or_insert_with(Graph::new)
    }
}

/// Read one or more substructure graphs from `path`, separated by
/// `separator` (`S` or `PS`).
pub fn read_substructures(
    path: &Path,
    separator: &str,
    labels: &mut LabelList,
    directed: bool,
) -> Result<Vec<Graph>, ParseError> {
    let text = std::fs::read_to_string(path)?;
    parse_substructures(&text, separator, labels, directed)
}

/// Parse substructure graphs from in-memory text.
pub fn parse_substructures(
    text: &str,
    separator: &str,
    labels: &mut LabelList,
    directed: bool,
) -> Result<Vec<Graph>, ParseError> {
    let mut tokens = Tokenizer::new(text);
    let mut graphs: Vec<Graph> = Vec::new();

    while let Some(token) = tokens.next_token() {
        match token.as_str() {
            t if t == separator => graphs.push(Graph::new()),
            "v" => {
                if graphs.is_empty() {
                    // first pattern not preceded by the separator
                    graphs.push(Graph::new());
                }
                read_vertex(graphs.last_mut().unwrap(), &mut tokens, labels, 0)?;
            }
            "e" => read_edge(last_graph(&mut graphs, &tokens)?, &mut tokens, labels, directed, 0)?,
            "u" => read_edge(last_graph(&mut graphs, &tokens)?, &mut tokens, labels, false, 0)?,
            "d" => read_edge(last_graph(&mut graphs, &tokens)?, &mut tokens, labels, true, 0)?,
            _ => {
                return Err(ParseError::UnknownToken {
                    token,
                    line: tokens.line,
                })
            }
        }
    }
    Ok(graphs)
}

fn last_graph<'g>(
    graphs: &'g mut Vec<Graph>,
    tokens: &Tokenizer<'_>,
) -> Result<&'g mut Graph, ParseError> {
    // an edge before any vertex can only reference undefined vertices
    graphs
        .last_mut()
        .ok_or(ParseError::UndefinedVertex { line: tokens.line })
}

fn read_vertex(
    graph: &mut Graph,
    tokens: &mut Tokenizer<'_>,
    labels: &mut LabelList,
    vertex_offset: usize,
) -> Result<(), ParseError> {
    let vertex_id = read_integer(tokens)? + vertex_offset;
    if vertex_id != graph.vertex_count() + 1 {
        return Err(ParseError::InvalidVertexNumber { line: tokens.line });
    }
    let label = read_label(tokens, labels)?;
    graph.add_vertex(label);
    Ok(())
}

fn read_edge(
    graph: &mut Graph,
    tokens: &mut Tokenizer<'_>,
    labels: &mut LabelList,
    directed: bool,
    vertex_offset: usize,
) -> Result<(), ParseError> {
    let source = read_integer(tokens)? + vertex_offset;
    if source < 1 || source > graph.vertex_count() {
        return Err(ParseError::UndefinedVertex { line: tokens.line });
    }
    let target = read_integer(tokens)? + vertex_offset;
    if target < 1 || target > graph.vertex_count() {
        return Err(ParseError::UndefinedVertex { line: tokens.line });
    }
    let label = read_label(tokens, labels)?;
    graph.add_edge(source - 1, target - 1, directed, label);
    Ok(())
}

fn read_integer(tokens: &mut Tokenizer<'_>) -> Result<usize, ParseError> {
    let token = tokens
        .next_token()
        .ok_or(ParseError::UnexpectedEof { line: tokens.line })?;
    token
        .parse::<usize>()
        .map_err(|_| ParseError::ExpectedInteger { line: tokens.line })
}

fn read_label(tokens: &mut Tokenizer<'_>, labels: &mut LabelList) -> Result<usize, ParseError> {
    let token = tokens
        .next_token()
        .ok_or(ParseError::UnexpectedEof { line: tokens.line })?;
    Ok(labels.store(Label::from_token(&token)))
}

/// Write the vertex range `start..finish` of `graph` and the edges rooted
/// in it, renumbered to start at `1 + v_offset`. With `with_sub_token` the
/// block is prefaced by `S` (the machine-readable best-pattern format).
pub fn write_graph<W: Write>(
    out: &mut W,
    graph: &Graph,
    labels: &LabelList,
    v_offset: usize,
    start: usize,
    finish: usize,
    with_sub_token: bool,
) -> std::io::Result<()> {
    if with_sub_token {
        writeln!(out, "{}", SUB_TOKEN)?;
    }
    for v in start..finish {
        writeln!(
            out,
            "v {} {}",
            v + 1 + v_offset - start,
            labels.label_at(graph.vertex(v).label)
        )?;
    }
    for edge in graph.edges() {
        if edge.vertex1 >= start && edge.vertex1 < finish {
            writeln!(
                out,
                "{} {} {} {}",
                if edge.directed { "d" } else { "u" },
                edge.vertex1 + 1 + v_offset - start,
                edge.vertex2 + 1 + v_offset - start,
                labels.label_at(edge.label)
            )?;
        }
    }
    if with_sub_token {
        writeln!(out)?;
    }
    Ok(())
}
