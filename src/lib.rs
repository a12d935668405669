//! **subdue** discovers repeated, structurally interesting subgraphs
//! ("substructures") in a labeled graph of examples, iteratively replacing
//! their occurrences with single abstract vertices to compress the graph.
//!
//! Given one graph of positive examples (and optionally a graph of negative
//! examples), discovery returns a ranked list of substructures that best
//! compress the positive graph while failing to compress the negative
//! graph, or that best cover the positive examples.
//!
//! The crate is organized around four cooperating subsystems:
//!
//! - a beam-search [`discover`]y engine that grows substructures one edge
//!   at a time with value-based pruning,
//! - [`instance`] bookkeeping that tracks every occurrence of a candidate
//!   in the host graph and supports fast extension,
//! - an [`evaluate`] module scoring candidates by minimum description
//!   length, plain size, or set cover, on top of the [`compress`]
//!   primitives,
//! - an inexact graph [`matcher`]: best-first search with bounded
//!   backtracking over partial vertex mappings, used everywhere
//!   substructure equality or containment is tested.
//!
//! ```
//! use subdue::graphio::parse_examples;
//! use subdue::label::LabelList;
//! use subdue::params::{Corpus, Params};
//!
//! let mut labels = LabelList::new();
//! let text = "v 1 a\nv 2 b\nv 3 a\nv 4 b\nu 1 2 e\nu 3 4 e\n";
//! let examples = parse_examples(text, &mut labels, true).unwrap();
//! let mut corpus = Corpus::from_examples(labels, examples);
//! let params = Params::default().resolve(&corpus.pos_graph);
//! let discovered = subdue::discover::discover_subs(&params, &corpus);
//! assert!(!discovered.is_empty());
//! ```

pub mod compress;
pub mod discover;
pub mod dot;
pub mod driver;
pub mod evaluate;
pub mod extend;
pub mod graph;
pub mod graphio;
pub mod instance;
pub mod label;
pub mod matcher;
pub mod params;
pub mod sgiso;
pub mod sub;

pub use graph::Graph;
pub use instance::{Instance, InstanceList};
pub use label::{Label, LabelList};
pub use matcher::{MatchCosts, Matcher};
pub use params::{Corpus, EvalMethod, Params};
pub use sub::{SubList, Substructure};

/// Errors a discovery run can surface: grammar violations in an input
/// file, or I/O failures reading inputs and writing outputs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] graphio::ParseError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
