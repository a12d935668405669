//! File-level input and output.

use std::io::Write;

use subdue::driver::{run, RunOptions};
use subdue::graphio::{read_examples, read_substructures, ParseError, PREDEF_SUB_TOKEN};
use subdue::label::LabelList;
use subdue::params::{Corpus, Params};

fn write_temp(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn reads_examples_from_disk() {
    let file = write_temp("XP\nv 1 a\nv 2 b\nd 1 2 e\nXN\nv 1 a\n");
    let mut labels = LabelList::new();
    let examples = read_examples(file.path(), &mut labels, true).unwrap();
    assert_eq!(examples.num_pos_egs, 1);
    assert_eq!(examples.num_neg_egs, 1);
    assert_eq!(examples.pos_graph.vertex_count(), 2);
    assert!(examples.neg_graph.is_some());
}

#[test]
fn missing_file_is_an_io_error() {
    let mut labels = LabelList::new();
    let err = read_examples(std::path::Path::new("/nonexistent/input.g"), &mut labels, true)
        .unwrap_err();
    assert!(matches!(err, ParseError::Io(_)));
}

#[test]
fn reads_predefined_substructures() {
    let file = write_temp("PS\nv 1 a\nv 2 a\nu 1 2 e\nPS\nv 1 b\n");
    let mut labels = LabelList::new();
    let graphs = read_substructures(file.path(), PREDEF_SUB_TOKEN, &mut labels, true).unwrap();
    assert_eq!(graphs.len(), 2);
    assert_eq!(graphs[0].edge_count(), 1);
    assert_eq!(graphs[1].vertex_count(), 1);
}

#[test]
fn out_file_collects_one_pattern_per_iteration() {
    let input = "XP\nv 1 A\nv 2 B\nu 1 2 e\nXP\nv 1 A\nv 2 B\nu 1 2 e\n";
    let mut labels = LabelList::new();
    let file = write_temp(input);
    let examples = read_examples(file.path(), &mut labels, true).unwrap();
    let mut corpus = Corpus::from_examples(labels, examples);

    let out_file = tempfile::NamedTempFile::new().unwrap();
    let params = Params {
        output_level: 1,
        ..Params::default()
    };
    let options = RunOptions {
        out_path: Some(out_file.path().to_path_buf()),
        compress_path: None,
    };
    run(&params, &mut corpus, &options).unwrap();

    let written = std::fs::read_to_string(out_file.path()).unwrap();
    // an S-prefaced block holding the best pattern
    assert!(written.starts_with("S\n"));
    assert!(written.contains("v 1 "));
}
