//! Run configuration and corpus state.
//!
//! [`Params`] is an immutable configuration value threaded through every
//! component. [`Corpus`] owns the mutable state that discovery consumes
//! and compression rewrites between iterations: the label table, the
//! graphs, the example boundaries, and the cached description lengths.

use crate::evaluate::{mdl, Log2Cache};
use crate::graph::Graph;
use crate::label::LabelList;
use crate::matcher::{MatchCosts, Matcher, DEFAULT_GREEDY_EXPONENT};

/// Substructure evaluation methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvalMethod {
    /// Minimum description length (the default).
    #[default]
    Mdl,
    /// Plain vertices-plus-edges size.
    Size,
    /// Set cover over positive and negative examples.
    SetCover,
}

/// Immutable run configuration, consulted by every component.
#[derive(Debug, Clone)]
pub struct Params {
    /// Limit on the substructure queue between generations (> 0).
    pub beam_width: usize,
    /// Limit on the number of best substructures returned (> 0).
    pub num_best_subs: usize,
    /// Limit on substructures expanded; 0 means half the positive edge
    /// count, resolved at the start of a run.
    pub limit: usize,
    /// Maximum vertices in discovered substructures; 0 means the positive
    /// graph's vertex count, resolved at the start of a run.
    pub max_vertices: usize,
    /// Minimum vertices in discovered substructures.
    pub min_vertices: usize,
    /// Trim queues to the top `beam_width` *values* rather than entries.
    pub value_based: bool,
    /// Drop extended substructures valued below their parent.
    pub prune: bool,
    /// Allow instances of one substructure to share vertices.
    pub allow_instance_overlap: bool,
    /// Fractional edit budget per match, in [0, 1]; 0 means exact.
    pub threshold: f64,
    pub eval_method: EvalMethod,
    /// Number of discovery passes; `usize::MAX` for unbounded.
    pub iterations: usize,
    /// Allow recursive graph-grammar substructures.
    pub recursion: bool,
    /// Whether `e` edges in input files are directed.
    pub directed: bool,
    /// Screen output verbosity, 1..=5.
    pub output_level: u32,
    /// Graph-match edit costs.
    pub match_costs: MatchCosts,
    /// Exponent of the matcher's greedy cutoff; 0 disables it.
    pub greedy_match_exponent: f64,
}

impl Default for Params {
    fn default() -> Params {
        Params {
            beam_width: 4,
            num_best_subs: 3,
            limit: 0,
            max_vertices: 0,
            min_vertices: 1,
            value_based: false,
            prune: false,
            allow_instance_overlap: false,
            threshold: 0.0,
            eval_method: EvalMethod::Mdl,
            iterations: 1,
            recursion: false,
            directed: true,
            output_level: 2,
            match_costs: MatchCosts::default(),
            greedy_match_exponent: DEFAULT_GREEDY_EXPONENT,
        }
    }
}

impl Params {
    /// The matcher configured by these parameters.
    pub fn matcher(&self) -> Matcher {
        Matcher::with_config(self.match_costs, self.greedy_match_exponent)
    }

    /// Resolve the zero-means-derived knobs against the corpus: limit
    /// becomes half the positive edge count, the vertex cap becomes the
    /// positive vertex count.
    pub fn resolve(&self, pos_graph: &Graph) -> Params {
        let mut resolved = self.clone();
        if resolved.limit == 0 {
            resolved.limit = pos_graph.edge_count() / 2;
        }
        if resolved.max_vertices == 0 {
            resolved.max_vertices = pos_graph.vertex_count();
        }
        resolved
    }
}

/// The graphs being mined, their shared label table, per-example vertex
/// boundaries, and the cached description lengths.
///
/// Compression between iterations replaces the graphs and rebuilds the
/// label table; all references go through this one value so the swap is
/// atomic at iteration boundaries.
#[derive(Debug, Default)]
pub struct Corpus {
    pub labels: LabelList,
    pub pos_graph: Graph,
    pub neg_graph: Option<Graph>,
    pub num_pos_egs: usize,
    pub num_neg_egs: usize,
    /// Vertex index where each positive example begins.
    pub pos_eg_starts: Vec<usize>,
    /// Vertex index where each negative example begins.
    pub neg_eg_starts: Vec<usize>,
    /// Description length of the positive graph, cached for MDL scoring.
    pub pos_graph_dl: f64,
    /// Description length of the negative graph, cached for MDL scoring.
    pub neg_graph_dl: f64,
    /// Memoized `lg(k!)` table.
    pub log2: Log2Cache,
}

impl Corpus {
    /// Recompute the cached description lengths from the current graphs
    /// and label table.
    pub fn recompute_description_lengths(&mut self) {
        self.pos_graph_dl = mdl(&self.pos_graph, self.labels.len(), &self.log2);
        self.neg_graph_dl = match &self.neg_graph {
            Some(neg) => mdl(neg, self.labels.len(), &self.log2),
            None => 0.0,
        };
    }
}
