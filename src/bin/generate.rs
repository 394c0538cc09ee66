//! Schema generation CLI
//!
//! Synthesizes a schema document from an existing tree. The output
//! validates the input tree exactly and is meant as a starting point for
//! hand-editing in patterns and optional members.

use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use treeschema::{generate, MemoryTree};

#[derive(Parser)]
#[command(name = "generate")]
#[command(about = "Generate a schema from a tree document")]
struct Cli {
    /// Path to the tree document (JSON)
    tree: PathBuf,

    /// Write the schema to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pretty-print the JSON
    #[arg(long)]
    pretty: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(2);
    }
}

fn run(cli: Cli) -> treeschema::Result<()> {
    let tree = MemoryTree::from_path(&cli.tree)?;
    let schema = generate::schema_for(tree.root());

    let text = if cli.pretty {
        serde_json::to_string_pretty(&schema)?
    } else {
        serde_json::to_string(&schema)?
    };

    match cli.output {
        Some(path) => {
            std::fs::write(&path, text + "\n")?;
            println!("✅ Schema written to {}", path.display());
        }
        None => println!("{}", text),
    }

    Ok(())
}
