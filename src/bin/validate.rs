//! Validation CLI
//!
//! Validates a tree document against a schema and reports every
//! conformance error. Exit codes: 0 valid, 1 invalid, 2 schema or I/O
//! failure.

use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use treeschema::{validate, MemoryTree, SchemaDoc};

#[derive(Parser)]
#[command(name = "validate")]
#[command(about = "Validate a tree document against a schema")]
struct Cli {
    /// Path to the tree document (JSON)
    tree: PathBuf,

    /// Path to the schema document (JSON)
    schema: PathBuf,

    /// Emit the error list as JSON
    #[arg(long)]
    json: bool,

    /// Suppress output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    }
}

fn run(cli: Cli) -> treeschema::Result<bool> {
    let schema = SchemaDoc::from_path(&cli.schema)?;
    let tree = MemoryTree::from_path(&cli.tree)?;

    let errors = validate(tree.root(), &schema);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&errors)?);
        return Ok(errors.is_empty());
    }

    if errors.is_empty() {
        if !cli.quiet {
            println!("✅ {} is valid", cli.tree.display());
        }
        Ok(true)
    } else {
        eprintln!("❌ {} validation errors:", errors.len());
        for (i, error) in errors.iter().enumerate() {
            eprintln!("  {}. {}", i + 1, error);
            for sub in &error.sub_errors {
                eprintln!("     └─ {}", sub);
            }
        }
        Ok(false)
    }
}
