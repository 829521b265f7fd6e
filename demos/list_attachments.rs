//! Lists the embedded-files name tree of a PDF and prints the `main.bib`
//! attachment when present.
//!
//! Usage:
//!   cargo run --example list_attachments -- paper.pdf

use embedbibpdf::{AttachmentSynchronizer, EMBEDDED_FILE_NAME};
use std::{env, process};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <pdf_file>", args[0]);
        process::exit(1);
    }

    let sync = AttachmentSynchronizer::from_path(&args[1]).unwrap_or_else(|e| {
        eprintln!("Cannot load PDF: {e}");
        process::exit(1);
    });

    let names = sync.attachments();
    println!("{} embedded file(s)", names.len());
    for name in &names {
        println!("  {name}");
    }

    match sync.read_attachment(EMBEDDED_FILE_NAME) {
        Ok(Some(file)) => {
            if let Some(size) = file.metadata.size {
                println!("\n{EMBEDDED_FILE_NAME} declares {size} bytes");
            }
            match file.text() {
                Some(text) => println!("{text}"),
                None => println!("({} bytes of binary data)", file.data.len()),
            }
        }
        Ok(None) => println!("\nNo {EMBEDDED_FILE_NAME} attachment."),
        Err(e) => eprintln!("\n{EMBEDDED_FILE_NAME} is unreadable: {e}"),
    }
}
