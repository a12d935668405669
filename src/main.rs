use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use subdue::driver::{self, RunOptions};
use subdue::graphio::{self, PREDEF_SUB_TOKEN};
use subdue::label::LabelList;
use subdue::params::{Corpus, EvalMethod, Params};

/// Discover the substructures that best compress a labeled graph.
#[derive(Debug, Parser)]
#[command(name = "subdue", version, about)]
struct Opts {
    /// Width of the beam between generations.
    #[arg(long, default_value_t = 4)]
    beam: usize,
    /// Number of best substructures reported per iteration.
    #[arg(long, default_value_t = 3)]
    nsubs: usize,
    /// Maximum substructures expanded (0: half the positive edge count).
    #[arg(long, default_value_t = 0)]
    limit: usize,
    /// Discovery passes, compressing in between (0: unbounded).
    #[arg(long, default_value_t = 1)]
    iterations: usize,
    /// Minimum vertices in reported substructures.
    #[arg(long, default_value_t = 1)]
    minsize: usize,
    /// Maximum vertices in reported substructures (0: no bound).
    #[arg(long, default_value_t = 0)]
    maxsize: usize,
    /// Evaluation method: 1 = MDL, 2 = size, 3 = set cover.
    #[arg(long, default_value_t = 1)]
    eval: u32,
    /// Fractional edit budget per match, 0.0 to 1.0.
    #[arg(long, default_value_t = 0.0)]
    threshold: f64,
    /// Allow instances of a substructure to overlap.
    #[arg(long)]
    overlap: bool,
    /// Discard extended substructures valued below their parent.
    #[arg(long)]
    prune: bool,
    /// Bound the beam by distinct values instead of entries.
    #[arg(long)]
    valuebased: bool,
    /// Treat `e` edges in input files as undirected.
    #[arg(long)]
    undirected: bool,
    /// Allow recursive substructures.
    #[arg(long)]
    recursion: bool,
    /// Output verbosity, 1 to 5.
    #[arg(long, default_value_t = 2)]
    output: u32,
    /// Append the best pattern per iteration to this file.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Predefined substructures file; the graphs are compressed with these
    /// before discovery starts.
    #[arg(long)]
    ps: Option<PathBuf>,
    /// Write the final compressed graph to `<input>.cmp`.
    #[arg(long)]
    compress: bool,
    /// Input graph file.
    graph_file: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(Opts::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("subdue: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(opts: Opts) -> anyhow::Result<()> {
    let started = Instant::now();
    println!("subdue {}\n", env!("CARGO_PKG_VERSION"));

    let params = params_from_opts(&opts)?;
    let mut labels = LabelList::new();
    let examples = graphio::read_examples(&opts.graph_file, &mut labels, params.directed)
        .with_context(|| format!("reading {}", opts.graph_file.display()))?;
    if examples.num_pos_egs == 0 {
        bail!("no positive graphs defined");
    }
    let mut corpus = Corpus::from_examples(labels, examples);

    // compress with predefined substructures before discovery, if given
    if let Some(ps_path) = &opts.ps {
        let pre_subs =
            graphio::read_substructures(ps_path, PREDEF_SUB_TOKEN, &mut corpus.labels, params.directed)
                .with_context(|| format!("reading {}", ps_path.display()))?;
        println!("Read {} predefined substructures\n", pre_subs.len());
        driver::compress_with_predefined_subs(pre_subs, &params, &mut corpus);
    }

    print_params(&opts, &params, &corpus);

    if let Some(out_path) = &opts.out {
        // start the machine-readable output fresh; iterations append
        std::fs::File::create(out_path)
            .with_context(|| format!("creating {}", out_path.display()))?;
    }

    let options = RunOptions {
        out_path: opts.out.clone(),
        compress_path: opts
            .compress
            .then(|| PathBuf::from(format!("{}.cmp", opts.graph_file.display()))),
    };
    driver::run(&params, &mut corpus, &options)?;

    println!(
        "\nsubdue done (elapsed time = {:.2} seconds).",
        started.elapsed().as_secs_f64()
    );
    Ok(())
}

fn params_from_opts(opts: &Opts) -> anyhow::Result<Params> {
    if opts.beam == 0 {
        bail!("beam must be greater than zero");
    }
    if opts.nsubs == 0 {
        bail!("nsubs must be greater than zero");
    }
    if opts.minsize == 0 {
        bail!("minsize must be greater than zero");
    }
    if opts.maxsize != 0 && opts.maxsize < opts.minsize {
        bail!("minsize exceeds maxsize");
    }
    if !(1..=3).contains(&opts.eval) {
        bail!("eval must be 1-3");
    }
    if !(0.0..=1.0).contains(&opts.threshold) {
        bail!("threshold must be 0.0-1.0");
    }
    if !(1..=5).contains(&opts.output) {
        bail!("output must be 1-5");
    }
    Ok(Params {
        beam_width: opts.beam,
        num_best_subs: opts.nsubs,
        limit: opts.limit,
        max_vertices: opts.maxsize,
        min_vertices: opts.minsize,
        value_based: opts.valuebased,
        prune: opts.prune,
        allow_instance_overlap: opts.overlap,
        threshold: opts.threshold,
        eval_method: match opts.eval {
            1 => EvalMethod::Mdl,
            2 => EvalMethod::Size,
            _ => EvalMethod::SetCover,
        },
        iterations: if opts.iterations == 0 {
            usize::MAX
        } else {
            opts.iterations
        },
        recursion: opts.recursion,
        directed: !opts.undirected,
        output_level: opts.output,
        ..Params::default()
    })
}

fn print_params(opts: &Opts, params: &Params, corpus: &Corpus) {
    let path_or_none = |p: &Option<PathBuf>| {
        p.as_ref()
            .map_or_else(|| "none".to_owned(), |p| p.display().to_string())
    };
    println!("Parameters:");
    println!("  Input file..................... {}", opts.graph_file.display());
    println!("  Predefined substructure file... {}", path_or_none(&opts.ps));
    println!("  Output file.................... {}", path_or_none(&opts.out));
    println!("  Beam width..................... {}", params.beam_width);
    println!("  Compress....................... {}", opts.compress);
    println!(
        "  Evaluation method.............. {}",
        match params.eval_method {
            EvalMethod::Mdl => "MDL",
            EvalMethod::Size => "size",
            EvalMethod::SetCover => "setcover",
        }
    );
    println!("  'e' edges directed............. {}", params.directed);
    println!(
        "  Iterations..................... {}",
        if params.iterations == usize::MAX {
            "infinite".to_owned()
        } else {
            params.iterations.to_string()
        }
    );
    println!("  Limit.......................... {}", params.limit);
    println!("  Minimum size of substructures.. {}", params.min_vertices);
    println!("  Maximum size of substructures.. {}", params.max_vertices);
    println!("  Number of best substructures... {}", params.num_best_subs);
    println!("  Output level................... {}", params.output_level);
    println!("  Allow overlapping instances.... {}", params.allow_instance_overlap);
    println!("  Prune.......................... {}", params.prune);
    println!("  Threshold...................... {}", params.threshold);
    println!("  Value-based queue.............. {}", params.value_based);
    println!("  Recursion...................... {}", params.recursion);
    println!();
    println!("Read {} total positive graphs", corpus.num_pos_egs);
    if corpus.num_neg_egs > 0 {
        println!("Read {} total negative graphs", corpus.num_neg_egs);
    }
    println!();
}
