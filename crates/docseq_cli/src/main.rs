//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `docseq_core` linkage.
//! - Run a text file through resegmentation and TOC generation offline.

use docseq_core::{
    core_version, open_db_in_memory, SegmentService, SequenceService, SqliteNodeRepository,
    TocService, UnavailableService,
};
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None | Some("version") => {
            println!("docseq_core version={}", core_version());
            ExitCode::SUCCESS
        }
        Some("outline") => match args.get(1) {
            Some(path) => match outline_file(path) {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    eprintln!("error: {err}");
                    ExitCode::FAILURE
                }
            },
            None => usage(),
        },
        Some(_) => usage(),
    }
}

fn usage() -> ExitCode {
    eprintln!("usage: docseq_cli [version | outline <text-file>]");
    ExitCode::from(2)
}

/// Splits the file into nodes, prepends a heuristic TOC, prints the result.
fn outline_file(path: &str) -> Result<(), Box<dyn Error>> {
    let raw = std::fs::read_to_string(path)?;
    let conn = open_db_in_memory()?;

    let documents = SequenceService::new(SqliteNodeRepository::try_new(&conn)?);
    let document = documents.create_document(path, &raw)?;

    let segmenter = SegmentService::new(
        SequenceService::new(SqliteNodeRepository::try_new(&conn)?),
        UnavailableService,
    );
    let resegmented = segmenter.resegment(document.document_uuid)?;
    println!("nodes_created={}", resegmented.nodes_created);

    if resegmented.nodes_created >= 2 {
        let toc = TocService::new(
            SequenceService::new(SqliteNodeRepository::try_new(&conn)?),
            UnavailableService,
        );
        let result = toc.generate_table_of_contents(document.document_uuid, false)?;
        println!("toc_sections={}", result.sections_created);
    }

    for node in documents.list_nodes(document.document_uuid)? {
        println!("--- [{}] {:?} ({} chars)", node.position, node.kind, node.character_count);
        println!("{}", node.content);
    }
    Ok(())
}
