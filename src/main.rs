//! CLI tool for embedding a BibTeX file into a PDF document.
//!
//! Set `RUST_LOG=embedbibpdf=debug` to trace every name-tree level that is
//! reused or created.

use embedbibpdf::{
    embed_with_config, AttachmentSynchronizer, DeclaredSize, EmbedConfig, EmbedOutcome, Payload,
    Result, BIBTEX_SUBTYPE, EMBEDDED_FILE_NAME,
};
use std::{env, fs, process};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("embedbibpdf");

    if args.contains(&"--help".to_string()) || args.contains(&"-h".to_string()) {
        print_usage(program);
        process::exit(0);
    }

    let positional: Vec<&String> = positional_args(&args[1..]);
    if positional.len() < 2 {
        print_usage(program);
        process::exit(1);
    }

    let options = Options {
        pdf_path: positional[0].clone(),
        bib_path: positional[1].clone(),
        name: flag_value(&args, "--name").unwrap_or(EMBEDDED_FILE_NAME).to_string(),
        mime: flag_value(&args, "--mime").unwrap_or(BIBTEX_SUBTYPE).to_string(),
        config: EmbedConfig {
            declared_size: if args.contains(&"--text-length".to_string()) {
                DeclaredSize::TextLength
            } else {
                DeclaredSize::ByteLength
            },
            compress: args.contains(&"--compress".to_string()),
            ..Default::default()
        },
    };

    if let Err(e) = run(&options) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

struct Options {
    pdf_path: String,
    bib_path: String,
    name: String,
    mime: String,
    config: EmbedConfig,
}

fn print_usage(program_name: &str) {
    println!("embedbibpdf - keep a BibTeX attachment inside a PDF");
    println!();
    println!("USAGE:");
    println!("    {program_name} <pdf_file> <bib_file> [OPTIONS]");
    println!();
    println!("ARGUMENTS:");
    println!("    <pdf_file>        PDF document to update in place");
    println!("    <bib_file>        BibTeX file to embed");
    println!();
    println!("OPTIONS:");
    println!("    --name <name>     Attachment name (default: '{EMBEDDED_FILE_NAME}')");
    println!("    --mime <subtype>  Stream subtype (default: '{BIBTEX_SUBTYPE}')");
    println!("    --text-length     Declare the size in UTF-16 units instead of bytes");
    println!("    --compress        Flate-compress the embedded stream");
    println!("    -h, --help        Show this help message");
}

/// Arguments that are neither flags nor the value of a flag.
fn positional_args(args: &[String]) -> Vec<&String> {
    let mut out = Vec::new();
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
        } else if arg == "--name" || arg == "--mime" {
            skip_next = true;
        } else if !arg.starts_with("--") {
            out.push(arg);
        }
    }
    out
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn run(options: &Options) -> Result<()> {
    let text = fs::read_to_string(&options.bib_path)?;

    let outcome = embed_with_config(
        &options.pdf_path,
        &options.name,
        Payload::text(&text),
        &options.mime,
        options.config.clone(),
    )?;

    match outcome {
        EmbedOutcome::Skipped => {
            println!("{} is not a PDF file, nothing embedded", options.pdf_path);
            return Ok(());
        }
        EmbedOutcome::Created => println!("Added '{}' to {}", options.name, options.pdf_path),
        EmbedOutcome::Replaced => println!("Updated '{}' in {}", options.name, options.pdf_path),
    }

    let sync = AttachmentSynchronizer::from_path(&options.pdf_path)?;
    println!("Embedded files:");
    for name in sync.attachments() {
        match sync.read_attachment(&name) {
            Ok(Some(file)) => println!("  {name} ({} bytes)", file.data.len()),
            Ok(None) => println!("  {name}"),
            Err(e) => println!("  {name} (unreadable: {e})"),
        }
    }

    Ok(())
}
