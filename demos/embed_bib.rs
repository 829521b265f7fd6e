//! Minimal example that embeds a BibTeX file as `main.bib` into a PDF.
//!
//! Usage:
//!   cargo run --example embed_bib -- paper.pdf references.bib

use embedbibpdf::{embed, EmbedOutcome, BIBTEX_SUBTYPE, EMBEDDED_FILE_NAME};
use std::{env, fs, process};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: {} <pdf_file> <bib_file>", args[0]);
        process::exit(1);
    }

    let bib = fs::read(&args[2]).unwrap_or_else(|e| {
        eprintln!("Cannot read {}: {e}", args[2]);
        process::exit(1);
    });

    match embed(&args[1], EMBEDDED_FILE_NAME, &bib, BIBTEX_SUBTYPE) {
        Ok(EmbedOutcome::Skipped) => println!("⚠ {} is not a PDF, skipped", args[1]),
        Ok(EmbedOutcome::Created) => println!("✓ {EMBEDDED_FILE_NAME} added ({} bytes)", bib.len()),
        Ok(EmbedOutcome::Replaced) => println!("✓ {EMBEDDED_FILE_NAME} replaced ({} bytes)", bib.len()),
        Err(e) => {
            eprintln!("✗ {e}");
            process::exit(1);
        }
    }
}
